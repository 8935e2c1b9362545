use crate::grammar::*;

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

fn assign(feature: &str, terminal: GrammarExpr) -> GrammarExpr {
    GrammarExpr::Assignment {
        feature: feature.to_string(),
        operator: Operator::Assign,
        terminal: Box::new(terminal),
        cardinality: Cardinality::One,
    }
}

fn group(elements: Vec<GrammarExpr>) -> GrammarExpr {
    GrammarExpr::Group {
        elements,
        cardinality: Cardinality::One,
    }
}

fn parser_rule(name: &str, body: GrammarExpr) -> Rule {
    Rule::Parser(ParserRule {
        name: name.to_string(),
        entry: false,
        fragment: false,
        returns: None,
        body,
    })
}

#[test]
fn datatype_rule_detection() {
    let grammar = Grammar {
        name: "Test".to_string(),
        rules: vec![
            // QualifiedName: ID ('.' ID)*;
            parser_rule(
                "QualifiedName",
                group(vec![
                    call("ID"),
                    GrammarExpr::Group {
                        elements: vec![kw("."), call("ID")],
                        cardinality: Cardinality::ZeroOrMore,
                    },
                ]),
            ),
            // Decl: name=ID;
            parser_rule("Decl", assign("name", call("ID"))),
            // Alias: QualifiedName;
            parser_rule("Alias", call("QualifiedName")),
        ],
        ..Default::default()
    };

    let qualified = grammar.parser_rule("QualifiedName").unwrap();
    let decl = grammar.parser_rule("Decl").unwrap();
    let alias = grammar.parser_rule("Alias").unwrap();
    assert!(grammar.is_data_type_rule(qualified));
    assert!(!grammar.is_data_type_rule(decl));
    assert!(grammar.is_data_type_rule(alias));
}

#[test]
fn datatype_rule_cycles_count_as_datatype() {
    // A: 'a' B?;  B: 'b' A;
    let grammar = Grammar {
        name: "Test".to_string(),
        rules: vec![
            parser_rule(
                "A",
                group(vec![
                    kw("a"),
                    GrammarExpr::RuleCall {
                        rule: "B".to_string(),
                        cardinality: Cardinality::Optional,
                    },
                ]),
            ),
            parser_rule("B", group(vec![kw("b"), call("A")])),
        ],
        ..Default::default()
    };
    let a = grammar.parser_rule("A").unwrap();
    assert!(grammar.is_data_type_rule(a));
}

#[test]
fn explicit_object_returns_is_never_a_datatype_rule() {
    // Anon returns Item: 'anon';  Name returns string: ID;
    let grammar = Grammar {
        name: "Test".to_string(),
        rules: vec![
            Rule::Parser(ParserRule {
                name: "Anon".to_string(),
                entry: false,
                fragment: false,
                returns: Some("Item".to_string()),
                body: kw("anon"),
            }),
            Rule::Parser(ParserRule {
                name: "Name".to_string(),
                entry: false,
                fragment: false,
                returns: Some("string".to_string()),
                body: call("ID"),
            }),
        ],
        ..Default::default()
    };
    let anon = grammar.parser_rule("Anon").unwrap();
    let name = grammar.parser_rule("Name").unwrap();
    assert!(!grammar.is_data_type_rule(anon));
    assert!(grammar.is_data_type_rule(name));
    assert_eq!(grammar.rule_value_type(&grammar.rules[0]), "Item");
}

#[test]
fn rule_value_type_prefers_returns() {
    let grammar = Grammar {
        name: "Test".to_string(),
        rules: vec![
            Rule::Parser(ParserRule {
                name: "FunctionDecl".to_string(),
                entry: false,
                fragment: false,
                returns: Some("Declaration".to_string()),
                body: assign("name", call("ID")),
            }),
            Rule::Terminal(TerminalRule {
                name: "INT".to_string(),
                hidden: false,
                fragment: false,
                returns: Some("number".to_string()),
                body: TerminalExpr::Regex {
                    pattern: "[0-9]+".to_string(),
                    cardinality: Cardinality::One,
                },
            }),
            Rule::Terminal(TerminalRule {
                name: "ID".to_string(),
                hidden: false,
                fragment: false,
                returns: None,
                body: TerminalExpr::Regex {
                    pattern: "[a-zA-Z_]\\w*".to_string(),
                    cardinality: Cardinality::One,
                },
            }),
        ],
        ..Default::default()
    };

    let func = grammar.rules[0].clone();
    let int = grammar.rules[1].clone();
    let id = grammar.rules[2].clone();
    assert_eq!(grammar.rule_value_type(&func), "Declaration");
    assert_eq!(grammar.rule_value_type(&int), "number");
    assert_eq!(grammar.rule_value_type(&id), "string");
}

#[test]
fn keywords_are_collected_in_first_seen_order() {
    let grammar = Grammar {
        name: "Test".to_string(),
        rules: vec![
            parser_rule("A", group(vec![kw("var"), assign("name", call("ID"))])),
            parser_rule("B", group(vec![kw("let"), kw("var")])),
        ],
        ..Default::default()
    };
    let keywords: Vec<_> = grammar.keywords().into_iter().collect();
    assert_eq!(keywords, vec!["var".to_string(), "let".to_string()]);
}

#[test]
fn grammar_survives_a_serde_round_trip() {
    let grammar = Grammar {
        name: "Test".to_string(),
        rules: vec![
            parser_rule("Decl", group(vec![kw("def"), assign("name", call("ID"))])),
            Rule::Terminal(TerminalRule {
                name: "ID".to_string(),
                hidden: false,
                fragment: false,
                returns: None,
                body: TerminalExpr::Regex {
                    pattern: "[a-zA-Z_]\\w*".to_string(),
                    cardinality: Cardinality::One,
                },
            }),
        ],
        interfaces: vec![InterfaceDecl {
            name: "Decl".to_string(),
            super_types: Vec::new(),
            attributes: vec![AttributeDecl {
                name: "name".to_string(),
                optional: false,
                types: vec![AtomType {
                    is_ref: false,
                    is_array: false,
                    kind: AtomKind::Primitive("string".to_string()),
                }],
            }],
        }],
        ..Default::default()
    };

    let json = serde_json::to_string(&grammar).unwrap();
    let back: Grammar = serde_json::from_str(&json).unwrap();
    assert_eq!(back.name, "Test");
    assert_eq!(back.rules.len(), 2);
    assert!(back.parser_rule("Decl").is_some());
    assert!(back.terminal_rule("ID").is_some());
    assert_eq!(back.interfaces[0].attributes[0].name, "name");
}

#[test]
fn extract_assignments_descends_into_alternatives() {
    let body = GrammarExpr::Alternatives {
        elements: vec![
            assign("name", call("ID")),
            group(vec![kw("("), assign("value", call("INT")), kw(")")]),
        ],
        cardinality: Cardinality::One,
    };
    let assignments = Grammar::extract_assignments(&body);
    assert_eq!(assignments.len(), 2);
    assert_eq!(assignments[0].0, "name");
    assert_eq!(assignments[1].0, "value");
}
