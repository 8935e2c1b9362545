//! Lowers a parsed grammar document into the grammar model.
//!
//! The input is the dynamic AST produced by parsing grammar text with
//! the bootstrap language; node type and property names match the rule
//! names in [`crate::bootstrap`]. Lowering is total: malformed shapes
//! degrade to neutral values because parse errors were already
//! reported upstream.

use gramarye_core::grammar::{
    is_primitive_type, AtomKind, AtomType, AttributeDecl, Cardinality, Grammar, GrammarExpr,
    InterfaceDecl, Operator, ParserRule, Rule, TerminalExpr, TerminalRule, TypeDecl,
};
use gramarye_core::syntax::{NodeArena, NodeId, Value};

pub fn lower_grammar(nodes: &NodeArena, root: NodeId) -> Grammar {
    let ctx = Lower { nodes };
    let mut grammar = Grammar {
        name: ctx.string(root, "name").unwrap_or_default(),
        ..Default::default()
    };
    for import in ctx.node_array(root, "imports") {
        if let Some(path) = ctx.string(import, "path") {
            grammar.imports.push(unquote(&path));
        }
    }
    for rule in ctx.node_array(root, "rules") {
        match nodes.get(rule).type_name.as_str() {
            "ParserRule" => grammar.rules.push(Rule::Parser(ctx.parser_rule(rule))),
            "TerminalRule" => grammar.rules.push(Rule::Terminal(ctx.terminal_rule(rule))),
            _ => {}
        }
    }
    for decl in ctx.node_array(root, "interfaces") {
        grammar.interfaces.push(ctx.interface_decl(decl));
    }
    for decl in ctx.node_array(root, "types") {
        grammar.unions.push(ctx.type_decl(decl));
    }
    grammar
}

struct Lower<'a> {
    nodes: &'a NodeArena,
}

impl Lower<'_> {
    fn parser_rule(&self, id: NodeId) -> ParserRule {
        ParserRule {
            name: self.string(id, "name").unwrap_or_default(),
            entry: self.flag(id, "entry"),
            fragment: self.flag(id, "fragment"),
            returns: self.string(id, "returnType"),
            body: self
                .node_prop(id, "body")
                .map(|b| self.alternatives(b))
                .unwrap_or_else(empty_group),
        }
    }

    fn alternatives(&self, id: NodeId) -> GrammarExpr {
        let mut elements: Vec<GrammarExpr> = self
            .node_array(id, "groups")
            .into_iter()
            .map(|g| self.group(g))
            .collect();
        if elements.len() == 1 {
            elements.remove(0)
        } else {
            GrammarExpr::Alternatives {
                elements,
                cardinality: Cardinality::One,
            }
        }
    }

    fn group(&self, id: NodeId) -> GrammarExpr {
        let mut elements: Vec<GrammarExpr> = self
            .node_array(id, "elements")
            .into_iter()
            .map(|e| self.token(e))
            .collect();
        if elements.len() == 1 {
            elements.remove(0)
        } else {
            GrammarExpr::Group {
                elements,
                cardinality: Cardinality::One,
            }
        }
    }

    fn token(&self, id: NodeId) -> GrammarExpr {
        let cardinality = self.cardinality(id);
        match self.nodes.get(id).type_name.as_str() {
            "Assignment" => GrammarExpr::Assignment {
                feature: self.string(id, "feature").unwrap_or_default(),
                operator: operator(&self.string(id, "operator").unwrap_or_default()),
                terminal: Box::new(
                    self.node_prop(id, "terminal")
                        .map(|t| self.token(t))
                        .unwrap_or_else(empty_group),
                ),
                cardinality,
            },
            "CrossRefElem" => GrammarExpr::CrossReference {
                target_type: self.string(id, "type").unwrap_or_default(),
                terminal: self.string(id, "terminal").map(|name| {
                    Box::new(GrammarExpr::RuleCall {
                        rule: name,
                        cardinality: Cardinality::One,
                    })
                }),
                cardinality,
            },
            "ActionElem" => GrammarExpr::Action {
                type_name: self.string(id, "type").unwrap_or_default(),
                feature: self.string(id, "feature"),
                operator: self.string(id, "operator").map(|op| operator(&op)),
            },
            "ParenGroup" => self
                .node_prop(id, "body")
                .map(|b| self.alternatives(b))
                .unwrap_or_else(empty_group)
                .with_cardinality(cardinality),
            "KeywordElem" => GrammarExpr::Keyword {
                value: unquote(&self.string(id, "value").unwrap_or_default()),
                cardinality,
            },
            "RuleCallElem" => GrammarExpr::RuleCall {
                rule: self.string(id, "rule").unwrap_or_default(),
                cardinality,
            },
            _ => empty_group(),
        }
    }

    fn terminal_rule(&self, id: NodeId) -> TerminalRule {
        TerminalRule {
            name: self.string(id, "name").unwrap_or_default(),
            hidden: self.flag(id, "hidden"),
            fragment: self.flag(id, "fragment"),
            returns: self.string(id, "returnType"),
            body: self
                .node_prop(id, "body")
                .map(|b| self.terminal_alternatives(b))
                .unwrap_or(TerminalExpr::Wildcard {
                    cardinality: Cardinality::One,
                }),
        }
    }

    fn terminal_alternatives(&self, id: NodeId) -> TerminalExpr {
        let mut elements: Vec<TerminalExpr> = self
            .node_array(id, "elements")
            .into_iter()
            .map(|g| self.terminal_group(g))
            .collect();
        if elements.len() == 1 {
            elements.remove(0)
        } else {
            TerminalExpr::Alternatives {
                elements,
                cardinality: Cardinality::One,
            }
        }
    }

    fn terminal_group(&self, id: NodeId) -> TerminalExpr {
        let mut elements: Vec<TerminalExpr> = self
            .node_array(id, "elements")
            .into_iter()
            .map(|e| self.terminal_token(e))
            .collect();
        if elements.len() == 1 {
            elements.remove(0)
        } else {
            TerminalExpr::Group {
                elements,
                cardinality: Cardinality::One,
            }
        }
    }

    fn terminal_token(&self, id: NodeId) -> TerminalExpr {
        let cardinality = self.cardinality(id);
        match self.nodes.get(id).type_name.as_str() {
            "CharRange" => TerminalExpr::CharRange {
                left: unquote(&self.string(id, "left").unwrap_or_default()),
                right: self.string(id, "right").map(|r| unquote(&r)),
                cardinality,
            },
            "NegatedToken" => {
                let inner = self
                    .node_prop(id, "inner")
                    .map(|i| self.terminal_token(i))
                    .unwrap_or(TerminalExpr::Wildcard {
                        cardinality: Cardinality::One,
                    });
                // `!` binds tighter than a trailing cardinality, but the
                // syntax hangs the cardinality of `!'x'*` on the operand.
                // Hoist it onto the negation.
                let (inner, cardinality) = if matches!(cardinality, Cardinality::One) {
                    let hoisted = inner.cardinality();
                    (inner.with_cardinality(Cardinality::One), hoisted)
                } else {
                    (inner, cardinality)
                };
                TerminalExpr::Negation {
                    inner: Box::new(inner),
                    cardinality,
                }
            }
            "UntilToken" => TerminalExpr::Until {
                inner: Box::new(
                    self.node_prop(id, "inner")
                        .map(|i| self.terminal_token(i))
                        .unwrap_or(TerminalExpr::Wildcard {
                            cardinality: Cardinality::One,
                        }),
                ),
                cardinality,
            },
            "WildcardTok" => TerminalExpr::Wildcard { cardinality },
            "RegexTok" => TerminalExpr::Regex {
                pattern: unslash(&self.string(id, "pattern").unwrap_or_default()),
                cardinality,
            },
            "ParenTerminal" => match self.node_prop(id, "body") {
                Some(body) => {
                    let inner = self.terminal_alternatives(body);
                    wrap_terminal(inner, cardinality)
                }
                None => TerminalExpr::Wildcard { cardinality },
            },
            "TerminalRuleCall" => TerminalExpr::RuleCall {
                rule: self.string(id, "rule").unwrap_or_default(),
                cardinality,
            },
            _ => TerminalExpr::Wildcard { cardinality },
        }
    }

    fn interface_decl(&self, id: NodeId) -> InterfaceDecl {
        InterfaceDecl {
            name: self.string(id, "name").unwrap_or_default(),
            super_types: self.string_array(id, "superTypes"),
            attributes: self
                .node_array(id, "attributes")
                .into_iter()
                .map(|a| AttributeDecl {
                    name: self.string(a, "name").unwrap_or_default(),
                    optional: self.flag(a, "optional"),
                    types: self
                        .node_array(a, "types")
                        .into_iter()
                        .map(|t| self.atom_type(t))
                        .collect(),
                })
                .collect(),
        }
    }

    fn type_decl(&self, id: NodeId) -> TypeDecl {
        TypeDecl {
            name: self.string(id, "name").unwrap_or_default(),
            alternatives: self
                .node_array(id, "alternatives")
                .into_iter()
                .map(|t| self.atom_type(t))
                .collect(),
        }
    }

    fn atom_type(&self, id: NodeId) -> AtomType {
        let raw = self.string(id, "value").unwrap_or_default();
        let kind = if raw.starts_with('\'') || raw.starts_with('"') {
            AtomKind::Literal(unquote(&raw))
        } else if is_primitive_type(&raw) {
            AtomKind::Primitive(raw)
        } else {
            AtomKind::TypeRef(raw)
        };
        AtomType {
            is_ref: self.flag(id, "isRef"),
            is_array: self.flag(id, "isArray"),
            kind,
        }
    }

    fn cardinality(&self, id: NodeId) -> Cardinality {
        match self.string(id, "cardinality").as_deref() {
            Some("?") => Cardinality::Optional,
            Some("*") => Cardinality::ZeroOrMore,
            Some("+") => Cardinality::OneOrMore,
            _ => Cardinality::One,
        }
    }

    fn string(&self, id: NodeId, property: &str) -> Option<String> {
        match self.nodes.get(id).get(property)? {
            Value::String(s) => Some(s.clone()),
            _ => None,
        }
    }

    fn flag(&self, id: NodeId, property: &str) -> bool {
        matches!(self.nodes.get(id).get(property), Some(Value::Boolean(true)))
    }

    fn node_prop(&self, id: NodeId, property: &str) -> Option<NodeId> {
        self.nodes.get(id).get(property)?.as_node()
    }

    fn node_array(&self, id: NodeId, property: &str) -> Vec<NodeId> {
        self.nodes
            .get(id)
            .get(property)
            .and_then(Value::as_array)
            .map(|items| items.iter().filter_map(Value::as_node).collect())
            .unwrap_or_default()
    }

    fn string_array(&self, id: NodeId, property: &str) -> Vec<String> {
        self.nodes
            .get(id)
            .get(property)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn operator(text: &str) -> Operator {
    match text {
        "+=" => Operator::Append,
        "?=" => Operator::Flag,
        _ => Operator::Assign,
    }
}

fn empty_group() -> GrammarExpr {
    GrammarExpr::Group {
        elements: Vec::new(),
        cardinality: Cardinality::One,
    }
}

fn wrap_terminal(inner: TerminalExpr, cardinality: Cardinality) -> TerminalExpr {
    TerminalExpr::Group {
        elements: vec![inner],
        cardinality,
    }
}

/// Strips matching quotes from a STRING token image.
fn unquote(text: &str) -> String {
    let trimmed = text
        .strip_prefix('\'')
        .and_then(|t| t.strip_suffix('\''))
        .or_else(|| text.strip_prefix('"').and_then(|t| t.strip_suffix('"')))
        .unwrap_or(text);
    trimmed.to_string()
}

/// Strips the slash delimiters from a REGEX_LIT token image.
fn unslash(text: &str) -> String {
    let inner = text
        .strip_prefix('/')
        .and_then(|t| t.strip_suffix('/'))
        .unwrap_or(text);
    inner.replace("\\/", "/")
}
