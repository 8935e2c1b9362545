use gramarye_core::grammar::Grammar;
use indoc::indoc;

use crate::language::grammar_language;
use crate::lower::lower_grammar;
use crate::types::{collect_ast_types, print_ast_types, Reflection};
use crate::Error;

fn grammar_of(source: &str) -> Grammar {
    let language = grammar_language().expect("bootstrap grammar compiles");
    let document = language.parse(source, "test.gram");
    assert!(
        !document.diagnostics.has_errors(),
        "{}",
        document.diagnostics.render(source)
    );
    lower_grammar(&document.nodes, document.root.expect("document has a root"))
}

fn printed(source: &str) -> String {
    let types = collect_ast_types(&grammar_of(source)).expect("types collect");
    print_ast_types(&types)
}

#[test]
fn assignments_become_interface_properties() {
    let types = printed(indoc! {r#"
        grammar Hello
        entry Model: greetings+=Greeting*;
        Greeting: 'Hello' name=ID '!';
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#});
    insta::assert_snapshot!(types, @r"
    interface Greeting {
        name: string
    }
    interface Model {
        greetings: Greeting[]
    }
    ");
}

#[test]
fn properties_missing_in_a_branch_become_optional() {
    let types = printed(indoc! {r#"
        grammar Branch
        entry Model: items+=X*;
        X: 'a' a=ID b=ID | 'b' b=ID | 'c' b=ID c=ID;
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#});
    insta::assert_snapshot!(types, @r"
    interface Model {
        items: X[]
    }
    interface X {
        a?: string
        b: string
        c?: string
    }
    ");
}

#[test]
fn rule_alternatives_become_a_union() {
    let source = indoc! {r#"
        grammar Stmts
        entry Model: items+=Stmt*;
        Stmt: Def | Use;
        Def: 'def' name=ID ';';
        Use: 'use' target=[Def] ';';
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#};
    insta::assert_snapshot!(printed(source), @r"
    interface Def {
        name: string
    }
    interface Model {
        items: Stmt[]
    }
    interface Use {
        target: @Def
    }
    type Stmt = Def | Use;
    ");

    let types = collect_ast_types(&grammar_of(source)).unwrap();
    let reflection = Reflection::build(&types);
    assert!(reflection.is_subtype("Def", "Stmt"));
    assert!(reflection.is_subtype("Use", "Stmt"));
    assert!(!reflection.is_subtype("Model", "Stmt"));
}

#[test]
fn datatype_rules_union_their_literals() {
    let types = printed(indoc! {r#"
        grammar Signs
        entry Model: items+=Item*;
        Item: name=ID op=Sign ';';
        Sign: '+' | '-';
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#});
    insta::assert_snapshot!(types, @r"
    interface Item {
        name: string
        op: Sign
    }
    interface Model {
        items: Item[]
    }
    type Sign = '+' | '-';
    ");
}

#[test]
fn actions_split_one_rule_into_several_types() {
    let types = collect_ast_types(&grammar_of(indoc! {r#"
        grammar Math
        entry Model: expr=Expr;
        Expr: Primary ({Binary.left=current} op=('+'|'-') right=Primary)*;
        Primary: value=INT;
        hidden terminal WS: /\s+/;
        terminal INT returns number: /[0-9]+/;
    "#}))
    .unwrap();

    let binary = types.interfaces.get("Binary").expect("Binary is inferred");
    let names: Vec<&str> = binary.properties.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, ["left", "op", "right"]);

    let primary = types.interfaces.get("Primary").expect("Primary is inferred");
    assert_eq!(primary.properties[0].canonical(), "number");

    let expr = types.unions.get("Expr").expect("Expr becomes a union");
    assert_eq!(expr.canonical(), "Binary | Primary");
}

#[test]
fn declared_types_replace_inferred_ones() {
    let source = indoc! {r#"
        grammar Decl
        entry Model: items+=Item*;
        Item: name=ID ';';
        interface Item { name: string; count?: number; }
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#};
    let types = collect_ast_types(&grammar_of(source)).unwrap();
    assert!(types.interfaces["Item"].declared);
    insta::assert_snapshot!(print_ast_types(&types), @r"
    interface Item {
        name: string
        count?: number
    }
    interface Model {
        items: Item[]
    }
    ");
}

#[test]
fn collection_is_stable_across_runs() {
    let grammar = grammar_of(indoc! {r#"
        grammar Stable
        entry Model: items+=Stmt*;
        Stmt: Def | Use;
        Def: 'def' name=ID ';';
        Use: 'use' target=[Def] ';';
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#});
    let first = collect_ast_types(&grammar).unwrap();
    let second = collect_ast_types(&grammar).unwrap();
    assert_eq!(print_ast_types(&first), print_ast_types(&second));

    let names: Vec<&String> = first.interfaces.keys().chain(first.unions.keys()).collect();
    let again: Vec<&String> = second.interfaces.keys().chain(second.unions.keys()).collect();
    assert_eq!(names, again);
}

#[test]
fn branches_with_different_shapes_keep_both_alternatives() {
    let grammar = grammar_of(indoc! {r#"
        grammar Mixed
        entry Model: items+=X* others+=Y*;
        X: 'a' v=ID | 'b' v+=ID v+=ID;
        Y: 'c' t=[X] | 'd' t=ID;
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#});
    let types = collect_ast_types(&grammar).unwrap();

    let v = types.interfaces["X"].property("v").unwrap();
    assert_eq!(v.alternatives.len(), 2);
    assert_eq!(v.canonical(), "string | string[]");
    assert!(!v.optional);

    let t = types.interfaces["Y"].property("t").unwrap();
    assert_eq!(t.alternatives.len(), 2);
    assert_eq!(t.canonical(), "@X | string");
}

#[test]
fn declared_inheritance_cycles_are_fatal() {
    let result = collect_ast_types(&grammar_of(indoc! {r#"
        grammar Cyclic
        entry Model: name=ID;
        interface A extends B { }
        interface B extends A { }
        hidden terminal WS: /\s+/;
        terminal ID: /[_a-zA-Z][_a-zA-Z0-9]*/;
    "#}));
    assert!(matches!(result, Err(Error::TypeCycle(_))));
}
