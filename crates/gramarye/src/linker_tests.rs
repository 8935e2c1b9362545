use gramarye_core::syntax::{NodeId, Value};
use indoc::indoc;

use crate::language::Document;
use crate::Language;

const REFS: &str = indoc! {r#"
    grammar Refs
    entry Model: defs+=Def* uses+=Use*;
    Def: 'def' name=ID ';';
    Use: 'use' target=[Def] ';';
    hidden terminal WS: /\s+/;
    terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
"#};

fn compile(source: &str) -> Language {
    let (language, diagnostics) = Language::compile_source(source).expect("grammar compiles");
    assert!(!diagnostics.has_errors(), "{}", diagnostics.render(source));
    language
}

fn parse_clean(language: &Language, text: &str) -> Document {
    let document = language.parse(text, "test.txt");
    assert!(
        !document.diagnostics.has_errors(),
        "{}",
        document.diagnostics.render(text)
    );
    document
}

fn nodes_in(document: &Document, id: NodeId, property: &str) -> Vec<NodeId> {
    document
        .nodes
        .get(id)
        .get(property)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(Value::as_node).collect())
        .unwrap_or_default()
}

#[test]
fn scope_lookup_filters_by_name_within_a_container() {
    let language = compile(REFS);
    let document = parse_clean(&language, "def a; def b; use a;");
    let scopes = document.scopes();
    let root = document.root.unwrap();
    let defs = nodes_in(&document, root, "defs");

    let hits: Vec<NodeId> = scopes.lookup(Some(root), "a").collect();
    assert_eq!(hits, vec![defs[0]]);
    assert!(scopes.lookup(Some(root), "missing").next().is_none());
}

#[test]
fn references_resolve_to_named_definitions() {
    let language = compile(REFS);
    let document = parse_clean(&language, "def a; use a;");
    let errors = document.link(&language);
    assert!(errors.is_empty(), "{errors:?}");

    let root = document.root.unwrap();
    let defs = nodes_in(&document, root, "defs");
    let uses = nodes_in(&document, root, "uses");
    match document.nodes.get(uses[0]).get("target") {
        Some(Value::Reference(reference)) => {
            assert!(reference.is_resolved());
            assert_eq!(reference.target(), Some(defs[0]));
        }
        other => panic!("expected reference, got {other:?}"),
    }
}

#[test]
fn unresolved_references_keep_their_message() {
    let language = compile(REFS);
    let document = parse_clean(&language, "def a; use b;");
    let errors = document.link(&language);
    assert_eq!(errors, vec!["Could not resolve reference to 'b'.".to_string()]);
}

#[test]
fn candidates_of_the_wrong_type_are_rejected() {
    let language = compile(indoc! {r#"
        grammar Calls
        entry Model: items+=(Func|Var|Call)*;
        Func: 'func' name=ID ';';
        Var: 'var' name=ID ';';
        Call: 'call' target=[Func] ';';
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#});

    let document = parse_clean(&language, "var f; call f;");
    let errors = document.link(&language);
    assert_eq!(errors, vec!["Could not resolve reference to 'f'.".to_string()]);

    let document = parse_clean(&language, "func f; call f;");
    assert!(document.link(&language).is_empty());
}

#[test]
fn references_assigned_in_fragments_carry_the_calling_rule_type() {
    let language = compile(indoc! {r#"
        grammar Targets
        entry Model: funcs+=Func* vars+=Var* calls+=Call*;
        Func: 'func' name=ID ';';
        Var: 'var' name=ID ';';
        Call: 'call' Target ';';
        fragment Target: target=[Func];
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#});

    let document = parse_clean(&language, "func f; call f;");
    let calls = nodes_in(&document, document.root.unwrap(), "calls");
    match document.nodes.get(calls[0]).get("target") {
        Some(Value::Reference(reference)) => assert_eq!(reference.ref_id, "Call:target"),
        other => panic!("expected reference, got {other:?}"),
    }
    assert!(document.link(&language).is_empty());

    // The target type filter still applies through the fragment.
    let document = parse_clean(&language, "var f; call f;");
    let errors = document.link(&language);
    assert_eq!(errors, vec!["Could not resolve reference to 'f'.".to_string()]);
}

#[test]
fn resolution_walks_the_container_chain() {
    let language = compile(indoc! {r#"
        grammar Pkg
        entry Model: packages+=Package*;
        Package: 'package' name=ID '{' defs+=Def* uses+=Use* '}';
        Def: 'def' name=ID ';';
        Use: 'use' target=[Def] ';';
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#});
    let document = parse_clean(
        &language,
        "package p1 { def a; use a; } package p2 { use a; }",
    );
    // The first use finds the sibling definition; the second is in a
    // package without one and fails.
    let errors = document.link(&language);
    assert_eq!(errors, vec!["Could not resolve reference to 'a'.".to_string()]);
}
