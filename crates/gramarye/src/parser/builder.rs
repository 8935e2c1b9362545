//! Compiles a grammar into executable per-rule op trees.
//!
//! Name resolution happens here, once: rule calls and terminals become
//! indices, undefined targets are fatal. Each rule carries numbered
//! decision points (consume/or/option/many slots) so op dumps are
//! stable and debuggable.

use std::fmt;

use gramarye_core::grammar::{Cardinality, Grammar, GrammarExpr, Operator, ParserRule};
use indexmap::IndexMap;

use crate::tokens::TokenVocabulary;
use crate::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignInfo {
    pub feature: String,
    pub operator: Operator,
}

#[derive(Debug, Clone)]
pub enum ParseOp {
    Consume {
        /// Vocabulary index.
        token: usize,
        idx: u32,
        assign: Option<AssignInfo>,
        /// Target type name when this consume captures a cross-reference.
        crossref: Option<String>,
    },
    Subrule {
        /// Index into the compiled rule list.
        rule: usize,
        idx: u32,
        assign: Option<AssignInfo>,
    },
    Action {
        type_name: String,
        feature: Option<(String, Operator)>,
    },
    Group(Vec<ParseOp>),
    Alternatives {
        idx: u32,
        alts: Vec<ParseOp>,
    },
    Optional {
        idx: u32,
        body: Box<ParseOp>,
    },
    Many {
        idx: u32,
        at_least_one: bool,
        body: Box<ParseOp>,
    },
}

/// What a rule produces when it finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RuleResult {
    /// An AST node of the given type.
    Node { type_name: String },
    /// A primitive value from the matched text.
    Datatype { number: bool },
    /// Properties merged into the calling rule's node.
    Fragment,
}

#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub name: String,
    pub entry: bool,
    pub result: RuleResult,
    /// Features assigned with `+=` anywhere in the rule; initialized to
    /// empty arrays when a node frame opens.
    pub arrays: Vec<String>,
    pub body: ParseOp,
}

#[derive(Debug, Clone, Default)]
pub struct CompiledRules {
    pub rules: Vec<CompiledRule>,
    index: IndexMap<String, usize>,
}

impl CompiledRules {
    pub fn build(grammar: &Grammar, vocabulary: &TokenVocabulary) -> Result<CompiledRules> {
        let mut compiled = CompiledRules::default();
        for (i, rule) in grammar.parser_rules().enumerate() {
            compiled.index.insert(rule.name.clone(), i);
        }
        if grammar.entry_rule().is_none() {
            return Err(Error::MissingEntryRule);
        }

        for rule in grammar.parser_rules() {
            let result = if rule.fragment {
                RuleResult::Fragment
            } else if grammar.is_data_type_rule(rule) {
                let number = rule.returns.as_deref() == Some("number");
                RuleResult::Datatype { number }
            } else {
                RuleResult::Node {
                    type_name: rule
                        .returns
                        .clone()
                        .unwrap_or_else(|| rule.name.clone()),
                }
            };
            let mut arrays = Vec::new();
            rule.body.walk(&mut |e| match e {
                GrammarExpr::Assignment {
                    feature,
                    operator: Operator::Append,
                    ..
                } => {
                    if !arrays.contains(feature) {
                        arrays.push(feature.clone());
                    }
                }
                GrammarExpr::Action {
                    feature: Some(feature),
                    operator: Some(Operator::Append),
                    ..
                } => {
                    if !arrays.contains(feature) {
                        arrays.push(feature.clone());
                    }
                }
                _ => {}
            });

            let mut ctx = RuleContext::new(grammar, vocabulary, &compiled.index);
            let body = ctx.compile(rule, &rule.body, None)?;
            compiled.rules.push(CompiledRule {
                name: rule.name.clone(),
                entry: rule.entry,
                result,
                arrays,
                body,
            });
        }
        Ok(compiled)
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn entry(&self) -> usize {
        self.rules
            .iter()
            .position(|r| r.entry)
            .expect("checked during build")
    }

    pub fn get(&self, index: usize) -> &CompiledRule {
        &self.rules[index]
    }
}

/// Per-rule compilation state: the slot counters restart at 1 for every
/// rule.
struct RuleContext<'a> {
    grammar: &'a Grammar,
    vocabulary: &'a TokenVocabulary,
    rule_index: &'a IndexMap<String, usize>,
    consume: u32,
    or: u32,
    option: u32,
    many: u32,
    subrule: u32,
}

impl<'a> RuleContext<'a> {
    fn new(
        grammar: &'a Grammar,
        vocabulary: &'a TokenVocabulary,
        rule_index: &'a IndexMap<String, usize>,
    ) -> Self {
        RuleContext {
            grammar,
            vocabulary,
            rule_index,
            consume: 1,
            or: 1,
            option: 1,
            many: 1,
            subrule: 1,
        }
    }

    fn compile(
        &mut self,
        rule: &ParserRule,
        expr: &GrammarExpr,
        assign: Option<&AssignInfo>,
    ) -> Result<ParseOp> {
        let op = match expr {
            GrammarExpr::Keyword { value, .. } => {
                let token = self
                    .vocabulary
                    .index_of(value)
                    .ok_or_else(|| Error::UndefinedTerminal(value.clone()))?;
                self.consume_op(token, assign.cloned(), None)
            }
            GrammarExpr::RuleCall { rule: callee, .. } => {
                if let Some(&target) = self.rule_index.get(callee) {
                    let idx = self.subrule;
                    self.subrule += 1;
                    ParseOp::Subrule {
                        rule: target,
                        idx,
                        assign: assign.cloned(),
                    }
                } else if self.grammar.terminal_rule(callee).is_some() {
                    let token = self
                        .vocabulary
                        .index_of(callee)
                        .ok_or_else(|| Error::UndefinedTerminal(callee.clone()))?;
                    self.consume_op(token, assign.cloned(), None)
                } else {
                    return Err(Error::UndefinedRule(callee.clone()));
                }
            }
            GrammarExpr::Assignment {
                feature,
                operator,
                terminal,
                ..
            } => {
                let info = AssignInfo {
                    feature: feature.clone(),
                    operator: *operator,
                };
                self.compile(rule, terminal, Some(&info))?
            }
            GrammarExpr::CrossReference {
                target_type,
                terminal,
                ..
            } => {
                // The reference text comes from an explicit terminal or,
                // by convention, from the `ID` terminal.
                let token_name = match terminal.as_deref() {
                    Some(GrammarExpr::RuleCall { rule, .. }) => rule.clone(),
                    Some(GrammarExpr::Keyword { value, .. }) => value.clone(),
                    _ => "ID".to_string(),
                };
                let token = self
                    .vocabulary
                    .index_of(&token_name)
                    .ok_or_else(|| Error::UndefinedTerminal(token_name.clone()))?;
                self.consume_op(token, assign.cloned(), Some(target_type.clone()))
            }
            GrammarExpr::Action {
                type_name,
                feature,
                operator,
            } => ParseOp::Action {
                type_name: type_name.clone(),
                feature: feature
                    .clone()
                    .map(|f| (f, operator.unwrap_or(Operator::Assign))),
            },
            GrammarExpr::Group { elements, .. } => {
                let ops = elements
                    .iter()
                    .map(|e| self.compile(rule, e, assign))
                    .collect::<Result<Vec<_>>>()?;
                ParseOp::Group(ops)
            }
            GrammarExpr::UnorderedGroup { .. } => return Err(Error::UnorderedGroup),
            GrammarExpr::Alternatives { elements, .. } => {
                let idx = self.or;
                self.or += 1;
                let alts = elements
                    .iter()
                    .map(|e| self.compile(rule, e, assign))
                    .collect::<Result<Vec<_>>>()?;
                ParseOp::Alternatives { idx, alts }
            }
        };
        Ok(self.wrap(op, expr.cardinality()))
    }

    fn consume_op(&mut self, token: usize, assign: Option<AssignInfo>, crossref: Option<String>) -> ParseOp {
        let idx = self.consume;
        self.consume += 1;
        ParseOp::Consume {
            token,
            idx,
            assign,
            crossref,
        }
    }

    fn wrap(&mut self, op: ParseOp, cardinality: Cardinality) -> ParseOp {
        match cardinality {
            Cardinality::One => op,
            Cardinality::Optional => {
                let idx = self.option;
                self.option += 1;
                ParseOp::Optional {
                    idx,
                    body: Box::new(op),
                }
            }
            Cardinality::ZeroOrMore => {
                let idx = self.many;
                self.many += 1;
                ParseOp::Many {
                    idx,
                    at_least_one: false,
                    body: Box::new(op),
                }
            }
            Cardinality::OneOrMore => {
                let idx = self.many;
                self.many += 1;
                ParseOp::Many {
                    idx,
                    at_least_one: true,
                    body: Box::new(op),
                }
            }
        }
    }
}

impl CompiledRules {
    /// Stable, indented op dump for a single rule.
    pub fn dump(&self, vocabulary: &TokenVocabulary, name: &str) -> String {
        let Some(index) = self.index_of(name) else {
            return format!("<no rule {name}>");
        };
        let rule = self.get(index);
        let mut out = format!("{name}:\n");
        self.dump_op(vocabulary, &rule.body, 1, &mut out);
        out
    }

    fn dump_op(&self, vocabulary: &TokenVocabulary, op: &ParseOp, depth: usize, out: &mut String) {
        use fmt::Write;
        let pad = "  ".repeat(depth);
        match op {
            ParseOp::Consume {
                token,
                idx,
                assign,
                crossref,
            } => {
                let _ = write!(out, "{pad}consume{idx} {}", vocabulary.get(*token).name);
                if let Some(a) = assign {
                    let _ = write!(out, " -> {}{}", a.feature, operator_symbol(a.operator));
                }
                if let Some(target) = crossref {
                    let _ = write!(out, " [@{target}]");
                }
                out.push('\n');
            }
            ParseOp::Subrule { rule, idx, assign } => {
                let _ = write!(out, "{pad}subrule{idx} {}", self.get(*rule).name);
                if let Some(a) = assign {
                    let _ = write!(out, " -> {}{}", a.feature, operator_symbol(a.operator));
                }
                out.push('\n');
            }
            ParseOp::Action { type_name, feature } => {
                let _ = write!(out, "{pad}action {{{type_name}}}");
                if let Some((f, op)) = feature {
                    let _ = write!(out, " .{f}{}", operator_symbol(*op));
                }
                out.push('\n');
            }
            ParseOp::Group(ops) => {
                for op in ops {
                    self.dump_op(vocabulary, op, depth, out);
                }
            }
            ParseOp::Alternatives { idx, alts } => {
                let _ = writeln!(out, "{pad}or{idx}");
                for alt in alts {
                    self.dump_op(vocabulary, alt, depth + 1, out);
                }
            }
            ParseOp::Optional { idx, body } => {
                let _ = writeln!(out, "{pad}option{idx}");
                self.dump_op(vocabulary, body, depth + 1, out);
            }
            ParseOp::Many {
                idx,
                at_least_one,
                body,
            } => {
                let kind = if *at_least_one { "at-least-one" } else { "many" };
                let _ = writeln!(out, "{pad}{kind}{idx}");
                self.dump_op(vocabulary, body, depth + 1, out);
            }
        }
    }
}

fn operator_symbol(op: Operator) -> &'static str {
    match op {
        Operator::Assign => "=",
        Operator::Append => "+=",
        Operator::Flag => "?=",
    }
}
