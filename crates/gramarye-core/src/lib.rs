//! Core data structures for gramarye.
//!
//! This crate holds pure data, no pipeline logic:
//! - `grammar` - the grammar model (rules, expression trees, declared types)
//! - `types` - the AST type model (interfaces, unions, properties)
//! - `syntax` - the runtime syntax tree (AST node arena, CST arena, references)

pub mod grammar;
pub mod syntax;
pub mod types;

#[cfg(test)]
mod grammar_tests;
#[cfg(test)]
mod types_tests;

pub use grammar::{Cardinality, Grammar, Operator, ParserRule, TerminalRule};
pub use syntax::{AstNode, CstArena, CstId, NodeArena, NodeId, Reference, Value};
pub use types::{AstTypes, InterfaceType, Property, PropertyType, UnionType};
