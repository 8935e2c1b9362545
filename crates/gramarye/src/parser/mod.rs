//! Grammar-driven parsing: the rule compiler and the parse-time
//! interpreter that materializes AST nodes over a growing CST.

mod builder;
mod cst_builder;
mod runtime;

#[cfg(test)]
mod builder_tests;

pub use builder::{AssignInfo, CompiledRule, CompiledRules, ParseOp, RuleResult};
pub use cst_builder::CstBuilder;
pub use runtime::{ParseOutput, Parser};
