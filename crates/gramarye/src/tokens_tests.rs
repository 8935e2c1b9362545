use indoc::indoc;

use crate::language::CompileOptions;
use crate::tokens::{TokenGroup, TokenKind};
use crate::{Error, Language, NoImports};

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
fn hidden_first_then_keywords_then_terminals() {
    let language = compile(HELLO);
    let names: Vec<&str> = language
        .vocabulary
        .tokens
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(names, ["WS", "Hello", "!", "ID"]);

    assert_eq!(language.vocabulary.tokens[0].group, TokenGroup::Skipped);
    assert!(matches!(
        language.vocabulary.tokens[1].kind,
        TokenKind::Keyword(_)
    ));
    assert!(matches!(
        language.vocabulary.tokens[3].kind,
        TokenKind::Terminal
    ));
}

#[test]
fn keywords_sort_longest_first() {
    let language = compile(indoc! {r#"
        grammar Cmp
        entry Model: exprs+=Expr*;
        Expr: left=ID op=CmpOp right=ID ';';
        CmpOp: '<=' | '<';
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#});
    let names: Vec<&str> = language
        .vocabulary
        .tokens
        .iter()
        .map(|t| t.name.as_str())
        .collect();
    assert_eq!(names, ["WS", "<=", ";", "<", "ID"]);
}

#[test]
fn keyword_records_outmunching_terminals() {
    let language = compile(indoc! {r#"
        grammar Doge
        entry Model: stmts+=Stmt*;
        Stmt: 'do' name=ID ';';
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#});
    let id = language.vocabulary.index_of("ID").unwrap();
    let do_kw = language.vocabulary.index_of("do").unwrap();
    assert_eq!(language.vocabulary.get(do_kw).longer_alts, vec![id]);

    let semi = language.vocabulary.index_of(";").unwrap();
    assert!(language.vocabulary.get(semi).longer_alts.is_empty());
}

#[test]
fn hidden_comment_terminal_stays_in_the_stream() {
    let language = compile(indoc! {r#"
        grammar Commented
        entry Model: name=ID;
        hidden terminal WS: /\s+/;
        hidden terminal SL_COMMENT: /\/\/[^\n]*/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#});
    let ws = language.vocabulary.index_of("WS").unwrap();
    let comment = language.vocabulary.index_of("SL_COMMENT").unwrap();
    assert_eq!(language.vocabulary.get(ws).group, TokenGroup::Skipped);
    assert_eq!(language.vocabulary.get(comment).group, TokenGroup::Hidden);
}

#[test]
fn negation_compiles_to_a_complement_class() {
    let language = compile(indoc! {r#"
        grammar Str
        entry Model: value=STR;
        hidden terminal WS: /\s+/;
        terminal STR: '"' !'"'* '"';
    "#});
    let token = language.vocabulary.get(language.vocabulary.index_of("STR").unwrap());
    assert_eq!(token.match_len(r#""abc" rest"#, 0), Some(5));
    assert_eq!(token.match_len(r#""""#, 0), Some(2));
    assert_eq!(token.match_len("abc", 0), None);
}

#[test]
fn negation_of_multiple_characters_is_invalid() {
    let error = Language::compile_source(indoc! {r#"
        grammar Bad
        entry Model: name=ID;
        terminal BAD: !'ab';
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#})
    .map(|_| ())
    .unwrap_err();
    match error {
        Error::InvalidTerminal { name, .. } => assert_eq!(name, "BAD"),
        other => panic!("expected invalid terminal, got {other:?}"),
    }
}

#[test]
fn case_insensitive_keywords() {
    let options = CompileOptions {
        case_insensitive: true,
    };
    let (language, diagnostics) =
        Language::compile_source_with(HELLO, options, &NoImports).expect("grammar compiles");
    assert!(!diagnostics.has_errors());
    let hello = language.vocabulary.get(language.vocabulary.index_of("Hello").unwrap());
    assert_eq!(hello.match_len("HELLO there", 0), Some(5));
    assert_eq!(hello.match_len("hello there", 0), Some(5));
}
