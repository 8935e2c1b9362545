use gramarye_core::grammar::{
    Cardinality, Grammar, GrammarExpr, Operator, ParserRule, Rule, TerminalExpr, TerminalRule,
};
use indoc::indoc;

use crate::parser::CompiledRules;
use crate::tokens::TokenVocabulary;
use crate::{Error, Language};

const HELLO: &str = indoc! {r#"
    grammar Hello
    entry Model: greetings+=Greeting*;
    Greeting: 'Hello' name=ID '!';
    hidden terminal WS: /\s+/;
    terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
"#};

fn compile(source: &str) -> Language {
    let (language, diagnostics) = Language::compile_source(source).expect("grammar compiles");
    assert!(!diagnostics.has_errors(), "{}", diagnostics.render(source));
    language
}

#[test]
fn repetition_compiles_to_many() {
    let language = compile(HELLO);
    insta::assert_snapshot!(language.rules.dump(&language.vocabulary, "Model"), @r"
    Model:
      many1
        subrule1 Greeting -> greetings+=
    ");
}

#[test]
fn keywords_and_assignments_compile_to_consumes() {
    let language = compile(HELLO);
    insta::assert_snapshot!(language.rules.dump(&language.vocabulary, "Greeting"), @r"
    Greeting:
      consume1 Hello
      consume2 ID -> name=
      consume3 !
    ");
}

#[test]
fn append_assignments_are_collected_as_arrays() {
    let language = compile(HELLO);
    let model = language.rules.get(language.rules.index_of("Model").unwrap());
    assert_eq!(model.arrays, vec!["greetings"]);

    let greeting = language.rules.get(language.rules.index_of("Greeting").unwrap());
    assert!(greeting.arrays.is_empty());
}

#[test]
fn cross_references_consume_id_by_default() {
    let language = compile(indoc! {r#"
        grammar Refs
        entry Model: defs+=Def* uses+=Use*;
        Def: 'def' name=ID ';';
        Use: 'use' target=[Def] ';';
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#});
    insta::assert_snapshot!(language.rules.dump(&language.vocabulary, "Use"), @r"
    Use:
      consume1 use
      consume2 ID -> target= [@Def]
      consume3 ;
    ");
}

#[test]
fn missing_entry_rule_is_fatal() {
    let error = Language::compile_source(indoc! {r#"
        grammar NoEntry
        Model: name=ID;
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#})
    .map(|_| ())
    .unwrap_err();
    assert!(matches!(error, Error::MissingEntryRule));
}

#[test]
fn undefined_rule_is_fatal() {
    let error = Language::compile_source(indoc! {r#"
        grammar Dangling
        entry Model: value=Missing;
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#})
    .map(|_| ())
    .unwrap_err();
    match error {
        Error::UndefinedRule(name) => assert_eq!(name, "Missing"),
        other => panic!("expected undefined rule, got {other:?}"),
    }
}

#[test]
fn unordered_groups_are_rejected() {
    let body = GrammarExpr::UnorderedGroup {
        elements: vec![GrammarExpr::Assignment {
            feature: "name".to_string(),
            operator: Operator::Assign,
            terminal: Box::new(GrammarExpr::RuleCall {
                rule: "ID".to_string(),
                cardinality: Cardinality::One,
            }),
            cardinality: Cardinality::One,
        }],
        cardinality: Cardinality::One,
    };
    let grammar = Grammar {
        name: "Unordered".to_string(),
        rules: vec![
            Rule::Parser(ParserRule {
                name: "Model".to_string(),
                entry: true,
                fragment: false,
                returns: None,
                body,
            }),
            Rule::Terminal(TerminalRule {
                name: "ID".to_string(),
                hidden: false,
                fragment: false,
                returns: None,
                body: TerminalExpr::Regex {
                    pattern: "[a-z]+".to_string(),
                    cardinality: Cardinality::One,
                },
            }),
        ],
        ..Default::default()
    };
    let vocabulary = TokenVocabulary::build(&grammar).unwrap();
    assert!(matches!(
        CompiledRules::build(&grammar, &vocabulary),
        Err(Error::UnorderedGroup)
    ));
}
