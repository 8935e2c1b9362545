//! The compiled language facade: from grammar to vocabulary, rules,
//! types and documents.

use gramarye_core::grammar::{Grammar, GrammarExpr, ParserRule};
use gramarye_core::syntax::{CstArena, CstId, NodeArena, NodeId};
use gramarye_core::types::AstTypes;
use indexmap::{IndexMap, IndexSet};
use rowan::{TextRange, TextSize};

use crate::bootstrap;
use crate::diagnostics::Diagnostics;
use crate::linker::{Linker, Scopes};
use crate::lower::lower_grammar;
use crate::parser::{CompiledRules, Parser};
use crate::tokens::TokenVocabulary;
use crate::types::{collect_ast_types, validate_types, Reflection};
use crate::{Error, PassResult, Result};

#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    /// Match keywords case-insensitively.
    pub case_insensitive: bool,
}

/// Supplies the text behind grammar import paths.
pub trait ImportResolver {
    fn resolve(&self, path: &str) -> Option<String>;
}

/// Resolver for grammars without imports.
pub struct NoImports;

impl ImportResolver for NoImports {
    fn resolve(&self, _path: &str) -> Option<String> {
        None
    }
}

/// Everything derived from one grammar: the token vocabulary, compiled
/// parser rules, the collected type schema and its reflection table.
pub struct Language {
    pub grammar: Grammar,
    pub vocabulary: TokenVocabulary,
    pub rules: CompiledRules,
    pub types: AstTypes,
    pub reflection: Reflection,
    /// `"<Type>:<prop>"` to expected cross-reference target type.
    pub ref_targets: IndexMap<String, String>,
}

/// One parsed source text with its trees and findings.
pub struct Document {
    pub uri: String,
    pub source: String,
    pub root: Option<NodeId>,
    pub nodes: NodeArena,
    pub cst: CstArena,
    pub cst_root: CstId,
    pub diagnostics: Diagnostics,
}

impl Language {
    pub fn compile(grammar: Grammar) -> Result<Language> {
        Language::compile_with(grammar, CompileOptions::default())
    }

    pub fn compile_with(grammar: Grammar, options: CompileOptions) -> Result<Language> {
        let vocabulary = TokenVocabulary::build_with(&grammar, options.case_insensitive)?;
        let rules = CompiledRules::build(&grammar, &vocabulary)?;
        let types = collect_ast_types(&grammar)?;
        let reflection = Reflection::build(&types);
        let ref_targets = reference_targets(&grammar);
        Ok(Language {
            grammar,
            vocabulary,
            rules,
            types,
            reflection,
            ref_targets,
        })
    }

    /// Compiles grammar text through the self-hosted pipeline. Type
    /// conflicts come back as diagnostics; the declared types stay
    /// authoritative and compilation proceeds.
    pub fn compile_source(source: &str) -> PassResult<Language> {
        Language::compile_source_with(source, CompileOptions::default(), &NoImports)
    }

    pub fn compile_source_with(
        source: &str,
        options: CompileOptions,
        resolver: &dyn ImportResolver,
    ) -> PassResult<Language> {
        let grammar_language = Language::compile(bootstrap::grammar_language())?;
        let mut loading = IndexSet::new();
        let grammar = load_grammar(&grammar_language, source, "<root>", resolver, &mut loading)?;

        let mut diagnostics = Diagnostics::new();
        for conflict in validate_types(&grammar) {
            diagnostics.error(
                conflict.message,
                TextRange::empty(TextSize::new(0)),
            );
        }
        let language = Language::compile_with(grammar, options)?;
        Ok((language, diagnostics))
    }

    pub fn parse(&self, source: &str, uri: &str) -> Document {
        let parser = Parser::new(&self.grammar, &self.vocabulary, &self.rules);
        let output = parser.parse(source);
        Document {
            uri: uri.to_string(),
            source: source.to_string(),
            root: output.root,
            nodes: output.nodes,
            cst: output.cst,
            cst_root: output.cst_root,
            diagnostics: output.diagnostics,
        }
    }
}

impl Document {
    pub fn scopes(&self) -> Scopes {
        match self.root {
            Some(root) => Scopes::compute(&self.nodes, root),
            None => Scopes::default(),
        }
    }

    /// Resolves every reference in the document, returning the failure
    /// messages.
    pub fn link(&self, language: &Language) -> Vec<String> {
        let Some(root) = self.root else {
            return Vec::new();
        };
        let scopes = Scopes::compute(&self.nodes, root);
        let linker = Linker {
            nodes: &self.nodes,
            scopes: &scopes,
            reflection: &language.reflection,
            ref_targets: &language.ref_targets,
        };
        linker.link_all(root)
    }
}

/// The grammar description language itself, ready to parse grammar
/// texts.
pub fn grammar_language() -> Result<Language> {
    Language::compile(bootstrap::grammar_language())
}

/// Parses and lowers one grammar text, then folds in its imports.
/// Imports form a DAG; the importing grammar's rules and declarations
/// come first and win on name clashes.
fn load_grammar(
    grammar_language: &Language,
    source: &str,
    path: &str,
    resolver: &dyn ImportResolver,
    loading: &mut IndexSet<String>,
) -> Result<Grammar> {
    if !loading.insert(path.to_string()) {
        return Err(Error::ImportCycle(path.to_string()));
    }

    let document = grammar_language.parse(source, path);
    if document.diagnostics.has_errors() {
        return Err(Error::GrammarParse(document.diagnostics));
    }
    let root = document
        .root
        .ok_or_else(|| Error::GrammarParse(document.diagnostics.clone()))?;
    let mut grammar = lower_grammar(&document.nodes, root);

    let imports = std::mem::take(&mut grammar.imports);
    for import in imports {
        let imported_source = resolver
            .resolve(&import)
            .ok_or_else(|| Error::UnresolvedImport(import.clone()))?;
        let imported = load_grammar(grammar_language, &imported_source, &import, resolver, loading)?;
        merge_grammar(&mut grammar, imported);
    }

    loading.shift_remove(path);
    Ok(grammar)
}

fn merge_grammar(target: &mut Grammar, imported: Grammar) {
    for rule in imported.rules {
        if !target.rules.iter().any(|r| r.name() == rule.name()) {
            target.rules.push(rule);
        }
    }
    for interface in imported.interfaces {
        if !target.interfaces.iter().any(|i| i.name == interface.name) {
            target.interfaces.push(interface);
        }
    }
    for union in imported.unions {
        if !target.unions.iter().any(|u| u.name == union.name) {
            target.unions.push(union);
        }
    }
}

/// Builds the cross-reference registry: for every rule, each reference
/// assignment is recorded under all type names the rule can produce.
/// Fragment bodies are followed from their callers.
fn reference_targets(grammar: &Grammar) -> IndexMap<String, String> {
    let mut targets = IndexMap::new();
    for rule in grammar.parser_rules().filter(|r| !r.fragment) {
        let mut crossrefs = Vec::new();
        collect_crossrefs(grammar, rule, &mut crossrefs, &mut IndexSet::new());
        if crossrefs.is_empty() {
            continue;
        }
        let mut type_names = vec![rule.returns.clone().unwrap_or_else(|| rule.name.clone())];
        rule.body.walk(&mut |e| {
            if let GrammarExpr::Action { type_name, .. } = e {
                type_names.push(type_name.clone());
            }
        });
        for (feature, target) in &crossrefs {
            for type_name in &type_names {
                targets.insert(format!("{type_name}:{feature}"), target.clone());
            }
        }
    }
    targets
}

fn collect_crossrefs(
    grammar: &Grammar,
    rule: &ParserRule,
    out: &mut Vec<(String, String)>,
    visited: &mut IndexSet<String>,
) {
    if !visited.insert(rule.name.clone()) {
        return;
    }
    rule.body.walk(&mut |e| match e {
        GrammarExpr::Assignment {
            feature, terminal, ..
        } => {
            if let GrammarExpr::CrossReference { target_type, .. } = terminal.as_ref() {
                out.push((feature.clone(), target_type.clone()));
            }
        }
        GrammarExpr::RuleCall { rule: callee, .. } => {
            if let Some(target) = grammar.parser_rule(callee)
                && target.fragment
            {
                collect_crossrefs(grammar, target, out, visited);
            }
        }
        _ => {}
    });
}
