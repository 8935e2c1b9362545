//! The hand-written grammar of the grammar description language.
//!
//! This is the fixed point of the self-hosted pipeline: the one model
//! instance not produced by parsing. Everything else, including this
//! language's own textual description, goes through the ordinary
//! compile path built from it. Rule and property names here determine
//! the node types [`crate::lower`] reads.

use gramarye_core::grammar::{
    Cardinality, Grammar, GrammarExpr, Operator, ParserRule, Rule, TerminalExpr, TerminalRule,
};

/// The grammar language, as a ready-to-compile grammar model.
pub fn grammar_language() -> Grammar {
    let rules = vec![
        parser_entry(
            "Grammar",
            group(vec![
                kw("grammar"),
                assign("name", Operator::Assign, call("ID")),
                card(
                    assign("imports", Operator::Append, call("GrammarImport")),
                    Cardinality::ZeroOrMore,
                ),
                card(
                    alts(vec![
                        assign("rules", Operator::Append, call("AbstractRule")),
                        assign("interfaces", Operator::Append, call("InterfaceDecl")),
                        assign("types", Operator::Append, call("TypeDecl")),
                    ]),
                    Cardinality::ZeroOrMore,
                ),
            ]),
        ),
        parser(
            "GrammarImport",
            group(vec![
                kw("import"),
                assign("path", Operator::Assign, call("STRING")),
                kw(";"),
            ]),
        ),
        parser(
            "AbstractRule",
            alts(vec![call("ParserRule"), call("TerminalRule")]),
        ),
        parser(
            "ParserRule",
            group(vec![
                card(flag("entry", "entry"), Cardinality::Optional),
                card(flag("fragment", "fragment"), Cardinality::Optional),
                assign("name", Operator::Assign, call("ID")),
                card(
                    group(vec![
                        kw("returns"),
                        assign("returnType", Operator::Assign, call("ID")),
                    ]),
                    Cardinality::Optional,
                ),
                kw(":"),
                assign("body", Operator::Assign, call("Alternatives")),
                kw(";"),
            ]),
        ),
        parser(
            "Alternatives",
            group(vec![
                assign("groups", Operator::Append, call("Group")),
                card(
                    group(vec![
                        kw("|"),
                        assign("groups", Operator::Append, call("Group")),
                    ]),
                    Cardinality::ZeroOrMore,
                ),
            ]),
        ),
        parser(
            "Group",
            card(
                assign("elements", Operator::Append, call("AbstractToken")),
                Cardinality::OneOrMore,
            ),
        ),
        parser(
            "AbstractToken",
            alts(vec![
                call("Assignment"),
                call("ActionElem"),
                call("CrossRefElem"),
                call("ParenGroup"),
                call("KeywordElem"),
                call("RuleCallElem"),
            ]),
        ),
        parser(
            "Assignment",
            group(vec![
                assign("feature", Operator::Assign, call("ID")),
                assign("operator", Operator::Assign, call("AssignOp")),
                assign("terminal", Operator::Assign, call("AssignableTerminal")),
                card(
                    assign("cardinality", Operator::Assign, call("Card")),
                    Cardinality::Optional,
                ),
            ]),
        ),
        parser(
            "AssignableTerminal",
            alts(vec![
                call("CrossRefElem"),
                call("ParenGroup"),
                call("KeywordElem"),
                call("RuleCallElem"),
            ]),
        ),
        parser(
            "CrossRefElem",
            group(vec![
                kw("["),
                assign("type", Operator::Assign, call("ID")),
                card(
                    group(vec![
                        kw(":"),
                        assign("terminal", Operator::Assign, call("ID")),
                    ]),
                    Cardinality::Optional,
                ),
                kw("]"),
                card(
                    assign("cardinality", Operator::Assign, call("Card")),
                    Cardinality::Optional,
                ),
            ]),
        ),
        parser(
            "ActionElem",
            group(vec![
                kw("{"),
                assign("type", Operator::Assign, call("ID")),
                card(
                    group(vec![
                        kw("."),
                        assign("feature", Operator::Assign, call("ID")),
                        assign("operator", Operator::Assign, call("ActionOp")),
                        kw("current"),
                    ]),
                    Cardinality::Optional,
                ),
                kw("}"),
            ]),
        ),
        parser(
            "ParenGroup",
            group(vec![
                kw("("),
                assign("body", Operator::Assign, call("Alternatives")),
                kw(")"),
                card(
                    assign("cardinality", Operator::Assign, call("Card")),
                    Cardinality::Optional,
                ),
            ]),
        ),
        parser(
            "KeywordElem",
            group(vec![
                assign("value", Operator::Assign, call("STRING")),
                card(
                    assign("cardinality", Operator::Assign, call("Card")),
                    Cardinality::Optional,
                ),
            ]),
        ),
        parser(
            "RuleCallElem",
            group(vec![
                assign("rule", Operator::Assign, call("ID")),
                card(
                    assign("cardinality", Operator::Assign, call("Card")),
                    Cardinality::Optional,
                ),
            ]),
        ),
        datatype("AssignOp", alts(vec![kw("="), kw("+="), kw("?=")])),
        datatype("ActionOp", alts(vec![kw("="), kw("+=")])),
        datatype("Card", alts(vec![kw("?"), kw("*"), kw("+")])),
        parser(
            "TerminalRule",
            group(vec![
                card(flag("hidden", "hidden"), Cardinality::Optional),
                card(flag("fragment", "fragment"), Cardinality::Optional),
                kw("terminal"),
                assign("name", Operator::Assign, call("ID")),
                card(
                    group(vec![
                        kw("returns"),
                        assign("returnType", Operator::Assign, call("ID")),
                    ]),
                    Cardinality::Optional,
                ),
                kw(":"),
                assign("body", Operator::Assign, call("TerminalAlternatives")),
                kw(";"),
            ]),
        ),
        parser(
            "TerminalAlternatives",
            group(vec![
                assign("elements", Operator::Append, call("TerminalGroup")),
                card(
                    group(vec![
                        kw("|"),
                        assign("elements", Operator::Append, call("TerminalGroup")),
                    ]),
                    Cardinality::ZeroOrMore,
                ),
            ]),
        ),
        parser(
            "TerminalGroup",
            card(
                assign("elements", Operator::Append, call("TerminalToken")),
                Cardinality::OneOrMore,
            ),
        ),
        parser(
            "TerminalToken",
            alts(vec![
                call("CharRange"),
                call("RegexTok"),
                call("NegatedToken"),
                call("UntilToken"),
                call("WildcardTok"),
                call("ParenTerminal"),
                call("TerminalRuleCall"),
            ]),
        ),
        parser(
            "CharRange",
            group(vec![
                assign("left", Operator::Assign, call("STRING")),
                card(
                    group(vec![
                        kw(".."),
                        assign("right", Operator::Assign, call("STRING")),
                    ]),
                    Cardinality::Optional,
                ),
                card(
                    assign("cardinality", Operator::Assign, call("Card")),
                    Cardinality::Optional,
                ),
            ]),
        ),
        parser(
            "NegatedToken",
            group(vec![
                kw("!"),
                assign("inner", Operator::Assign, call("TerminalToken")),
                card(
                    assign("cardinality", Operator::Assign, call("Card")),
                    Cardinality::Optional,
                ),
            ]),
        ),
        parser(
            "UntilToken",
            group(vec![
                kw("->"),
                assign("inner", Operator::Assign, call("TerminalToken")),
                card(
                    assign("cardinality", Operator::Assign, call("Card")),
                    Cardinality::Optional,
                ),
            ]),
        ),
        parser(
            "WildcardTok",
            group(vec![
                flag("wildcard", "."),
                card(
                    assign("cardinality", Operator::Assign, call("Card")),
                    Cardinality::Optional,
                ),
            ]),
        ),
        parser(
            "RegexTok",
            group(vec![
                assign("pattern", Operator::Assign, call("REGEX_LIT")),
                card(
                    assign("cardinality", Operator::Assign, call("Card")),
                    Cardinality::Optional,
                ),
            ]),
        ),
        parser(
            "ParenTerminal",
            group(vec![
                kw("("),
                assign("body", Operator::Assign, call("TerminalAlternatives")),
                kw(")"),
                card(
                    assign("cardinality", Operator::Assign, call("Card")),
                    Cardinality::Optional,
                ),
            ]),
        ),
        parser(
            "TerminalRuleCall",
            group(vec![
                assign("rule", Operator::Assign, call("ID")),
                card(
                    assign("cardinality", Operator::Assign, call("Card")),
                    Cardinality::Optional,
                ),
            ]),
        ),
        parser(
            "InterfaceDecl",
            group(vec![
                kw("interface"),
                assign("name", Operator::Assign, call("ID")),
                card(
                    group(vec![
                        kw("extends"),
                        assign("superTypes", Operator::Append, call("ID")),
                        card(
                            group(vec![
                                kw(","),
                                assign("superTypes", Operator::Append, call("ID")),
                            ]),
                            Cardinality::ZeroOrMore,
                        ),
                    ]),
                    Cardinality::Optional,
                ),
                kw("{"),
                card(
                    assign("attributes", Operator::Append, call("AttributeDecl")),
                    Cardinality::ZeroOrMore,
                ),
                kw("}"),
            ]),
        ),
        parser(
            "AttributeDecl",
            group(vec![
                assign("name", Operator::Assign, call("ID")),
                card(flag("optional", "?"), Cardinality::Optional),
                kw(":"),
                assign("types", Operator::Append, call("AtomTypeDecl")),
                card(
                    group(vec![
                        kw("|"),
                        assign("types", Operator::Append, call("AtomTypeDecl")),
                    ]),
                    Cardinality::ZeroOrMore,
                ),
                kw(";"),
            ]),
        ),
        parser(
            "AtomTypeDecl",
            group(vec![
                card(flag("isRef", "@"), Cardinality::Optional),
                assign(
                    "value",
                    Operator::Assign,
                    alts(vec![call("ID"), call("STRING")]),
                ),
                card(flag("isArray", "[]"), Cardinality::Optional),
            ]),
        ),
        parser(
            "TypeDecl",
            group(vec![
                kw("type"),
                assign("name", Operator::Assign, call("ID")),
                kw("="),
                assign("alternatives", Operator::Append, call("AtomTypeDecl")),
                card(
                    group(vec![
                        kw("|"),
                        assign("alternatives", Operator::Append, call("AtomTypeDecl")),
                    ]),
                    Cardinality::ZeroOrMore,
                ),
                kw(";"),
            ]),
        ),
        hidden_terminal("WS", r"\s+"),
        hidden_terminal("SL_COMMENT", r"//[^\n]*"),
        hidden_terminal("ML_COMMENT", r"/\*.*?\*/"),
        terminal("ID", r"[_a-zA-Z][_a-zA-Z0-9]*"),
        terminal("STRING", r#"'[^']*'|"[^"]*""#),
        terminal("REGEX_LIT", r"/(?:[^/\\\n]|\\.)+/"),
    ];

    Grammar {
        name: "GramaryeGrammar".to_string(),
        imports: Vec::new(),
        rules,
        interfaces: Vec::new(),
        unions: Vec::new(),
    }
}

fn parser(name: &str, body: GrammarExpr) -> Rule {
    Rule::Parser(ParserRule {
        name: name.to_string(),
        entry: false,
        fragment: false,
        returns: None,
        body,
    })
}

fn parser_entry(name: &str, body: GrammarExpr) -> Rule {
    let Rule::Parser(mut rule) = parser(name, body) else {
        unreachable!()
    };
    rule.entry = true;
    Rule::Parser(rule)
}

fn datatype(name: &str, body: GrammarExpr) -> Rule {
    parser(name, body)
}

fn terminal(name: &str, pattern: &str) -> Rule {
    Rule::Terminal(TerminalRule {
        name: name.to_string(),
        hidden: false,
        fragment: false,
        returns: None,
        body: TerminalExpr::Regex {
            pattern: pattern.to_string(),
            cardinality: Cardinality::One,
        },
    })
}

fn hidden_terminal(name: &str, pattern: &str) -> Rule {
    let Rule::Terminal(mut rule) = terminal(name, pattern) else {
        unreachable!()
    };
    rule.hidden = true;
    Rule::Terminal(rule)
}

fn kw(value: &str) -> GrammarExpr {
    GrammarExpr::Keyword {
        value: value.to_string(),
        cardinality: Cardinality::One,
    }
}

fn call(rule: &str) -> GrammarExpr {
    GrammarExpr::RuleCall {
        rule: rule.to_string(),
        cardinality: Cardinality::One,
    }
}

fn assign(feature: &str, operator: Operator, terminal: GrammarExpr) -> GrammarExpr {
    GrammarExpr::Assignment {
        feature: feature.to_string(),
        operator,
        terminal: Box::new(terminal),
        cardinality: Cardinality::One,
    }
}

/// `feature?='keyword'`
fn flag(feature: &str, keyword: &str) -> GrammarExpr {
    assign(feature, Operator::Flag, kw(keyword))
}

fn group(elements: Vec<GrammarExpr>) -> GrammarExpr {
    GrammarExpr::Group {
        elements,
        cardinality: Cardinality::One,
    }
}

fn alts(elements: Vec<GrammarExpr>) -> GrammarExpr {
    GrammarExpr::Alternatives {
        elements,
        cardinality: Cardinality::One,
    }
}

fn card(expr: GrammarExpr, cardinality: Cardinality) -> GrammarExpr {
    expr.with_cardinality(cardinality)
}
