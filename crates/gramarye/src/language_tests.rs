use indexmap::IndexMap;
use indoc::indoc;

use crate::language::{grammar_language, ImportResolver};
use crate::{Error, Language};

const HELLO: &str = indoc! {r#"
    grammar Hello
    entry Model: greetings+=Greeting*;
    Greeting: 'Hello' name=ID '!';
    hidden terminal WS: /\s+/;
    terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
"#};

struct MapResolver(IndexMap<String, String>);

impl MapResolver {
    fn new(entries: &[(&str, &str)]) -> Self {
        MapResolver(
            entries
                .iter()
                .map(|(path, source)| (path.to_string(), source.to_string()))
                .collect(),
        )
    }
}

impl ImportResolver for MapResolver {
    fn resolve(&self, path: &str) -> Option<String> {
        self.0.get(path).cloned()
    }
}

#[test]
fn compiles_and_parses_end_to_end() {
    let (language, diagnostics) = Language::compile_source(HELLO).expect("grammar compiles");
    assert!(!diagnostics.has_errors());
    assert_eq!(language.vocabulary.tokens.len(), 4);
    assert!(language.types.interfaces.contains_key("Greeting"));

    let document = language.parse("Hello World!", "hello.txt");
    assert!(!document.diagnostics.has_errors());
    assert!(document.root.is_some());
}

#[test]
fn unparsable_grammar_text_is_fatal() {
    let error = Language::compile_source(indoc! {r#"
        grammar Broken
        entry Model: ;
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#})
    .map(|_| ())
    .unwrap_err();
    assert!(matches!(error, Error::GrammarParse(_)));
}

#[test]
fn imported_grammars_contribute_their_rules() {
    let resolver = MapResolver::new(&[(
        "greetings",
        indoc! {r#"
            grammar Greetings
            Greeting: 'Hello' name=ID '!';
        "#},
    )]);
    let source = indoc! {r#"
        grammar Main
        import 'greetings';
        entry Model: greetings+=Greeting*;
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#};
    let (language, diagnostics) =
        Language::compile_source_with(source, Default::default(), &resolver)
            .expect("grammar compiles");
    assert!(!diagnostics.has_errors());
    assert!(language.grammar.parser_rule("Greeting").is_some());

    let document = language.parse("Hello World!", "hello.txt");
    assert!(!document.diagnostics.has_errors());
}

#[test]
fn unresolved_imports_are_fatal() {
    let source = indoc! {r#"
        grammar Main
        import 'missing';
        entry Model: name=ID;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#};
    let error = Language::compile_source(source).map(|_| ()).unwrap_err();
    match error {
        Error::UnresolvedImport(path) => assert_eq!(path, "missing"),
        other => panic!("expected unresolved import, got {other:?}"),
    }
}

#[test]
fn import_cycles_are_detected() {
    let resolver = MapResolver::new(&[
        ("a", "grammar A\nimport 'b';\n"),
        ("b", "grammar B\nimport 'a';\n"),
    ]);
    let source = indoc! {r#"
        grammar Main
        import 'a';
        entry Model: name=ID;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#};
    let error = Language::compile_source_with(source, Default::default(), &resolver)
        .map(|_| ())
        .unwrap_err();
    match error {
        Error::ImportCycle(path) => assert_eq!(path, "a"),
        other => panic!("expected import cycle, got {other:?}"),
    }
}

#[test]
fn reference_targets_are_registered_per_type_and_property() {
    let (language, _) = Language::compile_source(indoc! {r#"
        grammar Refs
        entry Model: defs+=Def* uses+=Use*;
        Def: 'def' name=ID ';';
        Use: 'use' target=[Def] ';';
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#})
    .expect("grammar compiles");
    assert_eq!(
        language.ref_targets.get("Use:target").map(String::as_str),
        Some("Def")
    );
    assert!(!language.ref_targets.contains_key("Def:target"));
}

#[test]
fn the_grammar_language_parses_grammar_texts() {
    let language = grammar_language().expect("bootstrap grammar compiles");
    let document = language.parse(HELLO, "hello.gram");
    assert!(
        !document.diagnostics.has_errors(),
        "{}",
        document.diagnostics.render(HELLO)
    );

    let root = document.root.unwrap();
    let node = document.nodes.get(root);
    assert_eq!(node.type_name, "Grammar");
    assert_eq!(node.get("name").and_then(|v| v.as_str()), Some("Hello"));
    let rules = node.get("rules").and_then(|v| v.as_array()).unwrap();
    assert_eq!(rules.len(), 4);
}

#[test]
fn type_conflicts_surface_as_diagnostics() {
    let source = indoc! {r#"
        grammar Conflicted
        entry Model: items+=Item*;
        Item: name=ID extra=ID;
        interface Item { name: string; }
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#};
    let (_, diagnostics) = Language::compile_source(source).expect("grammar compiles");
    assert!(diagnostics.has_errors());
    assert!(diagnostics
        .render(source)
        .contains("A property 'extra' is not expected."));
}
