//! Gramarye: a language toolkit driven by declarative grammar descriptions.
//!
//! From a single grammar text, gramarye derives a typed AST schema
//! (inferred from rule bodies or declared explicitly), a token
//! vocabulary, and a recursive-descent parser with error recovery. The
//! grammar description language is itself a gramarye grammar, parsed by
//! the same machinery.
//!
//! # Example
//!
//! ```
//! use gramarye::Language;
//!
//! let source = r#"
//!     grammar Hello
//!     entry Model: greetings+=Greeting*;
//!     Greeting: 'Hello' name=ID '!';
//!     hidden terminal WS: /\s+/;
//!     terminal ID: /[_a-zA-Z][\w_]*/;
//! "#;
//!
//! let (language, diagnostics) = Language::compile_source(source).expect("grammar compiles");
//! assert!(!diagnostics.has_errors());
//! let document = language.parse("Hello World!", "hello.txt");
//! assert!(!document.diagnostics.has_errors());
//! ```

pub mod bootstrap;
pub mod diagnostics;
pub mod language;
pub mod lexer;
pub mod linker;
pub mod lower;
pub mod parser;
pub mod tokens;
pub mod types;

#[cfg(test)]
mod language_tests;
#[cfg(test)]
mod linker_tests;
#[cfg(test)]
mod tokens_tests;

/// Result type for pipeline stages that produce output plus diagnostics.
///
/// Recoverable findings go into `Diagnostics`; conditions the pipeline
/// cannot proceed past use the outer `Result`.
pub type PassResult<T> = std::result::Result<(T, Diagnostics), Error>;

pub use diagnostics::{Diagnostic, Diagnostics, Severity};
pub use language::{CompileOptions, Document, ImportResolver, Language, NoImports};
pub use tokens::TokenVocabulary;
pub use types::collect_ast_types;

/// Fatal compilation errors. Anything recoverable is a [`Diagnostic`].
#[derive(Debug, Clone, thiserror::Error)]
pub enum Error {
    #[error("grammar parsing failed with {} errors", .0.error_count())]
    GrammarParse(Diagnostics),

    #[error("grammar has no entry rule")]
    MissingEntryRule,

    #[error("undefined rule '{0}'")]
    UndefinedRule(String),

    #[error("undefined terminal '{0}'")]
    UndefinedTerminal(String),

    #[error("unordered groups are not supported by the parser builder")]
    UnorderedGroup,

    #[error("terminal '{name}' has an invalid pattern: {message}")]
    InvalidTerminal { name: String, message: String },

    #[error("interface hierarchy contains a cycle through '{0}'")]
    TypeCycle(String),

    #[error("could not resolve import '{0}'")]
    UnresolvedImport(String),

    #[error("import cycle through '{0}'")]
    ImportCycle(String),
}

pub type Result<T> = std::result::Result<T, Error>;
