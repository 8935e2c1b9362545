//! The token builder: compiles terminal rules into anchored regexes and
//! arranges the full vocabulary in matching order.
//!
//! Ordering rules:
//! 1. skipped and hidden terminals come first,
//! 2. then keywords, longest first, so `<=` wins over `<`,
//! 3. then the remaining terminals in declaration order.
//!
//! Each keyword records `longer_alts`: terminals whose pattern fully
//! matches the keyword text. The lexer lets such a terminal win when it
//! matches strictly more input, so `doge` lexes as one identifier
//! instead of the keyword `do` plus `ge`.

use gramarye_core::grammar::{Cardinality, Grammar, TerminalExpr, TerminalRule};
use indexmap::IndexSet;
use regex_automata::meta::Regex;
use regex_automata::{Anchored, Input};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenGroup {
    /// Participates in parsing.
    Default,
    /// Dropped entirely (whitespace).
    Skipped,
    /// Kept in the CST, invisible to the parser (comments).
    Hidden,
}

#[derive(Debug, Clone)]
pub enum TokenKind {
    Keyword(String),
    Terminal,
}

#[derive(Debug, Clone)]
pub struct TokenType {
    pub name: String,
    pub kind: TokenKind,
    pub pattern: Regex,
    pub group: TokenGroup,
    /// Vocabulary indices of terminals that may out-munch this keyword.
    pub longer_alts: Vec<usize>,
}

impl TokenType {
    /// Length of the anchored match at `pos`, if any.
    pub fn match_len(&self, text: &str, pos: usize) -> Option<usize> {
        let input = Input::new(text).anchored(Anchored::Yes).range(pos..);
        self.pattern.find(input).map(|m| m.len())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TokenVocabulary {
    pub tokens: Vec<TokenType>,
}

impl TokenVocabulary {
    pub fn build(grammar: &Grammar) -> Result<TokenVocabulary> {
        TokenVocabulary::build_with(grammar, false)
    }

    pub fn build_with(grammar: &Grammar, case_insensitive: bool) -> Result<TokenVocabulary> {
        let mut skipped = Vec::new();
        let mut terminals = Vec::new();

        for rule in grammar.terminal_rules().filter(|t| !t.fragment) {
            let pattern = compile_terminal(grammar, rule)?;
            let regex = Regex::new(&format!("(?s){pattern}")).map_err(|e| Error::InvalidTerminal {
                name: rule.name.clone(),
                message: e.to_string(),
            })?;
            let group = if rule.hidden {
                if matches_whitespace(&regex) {
                    TokenGroup::Skipped
                } else {
                    TokenGroup::Hidden
                }
            } else {
                TokenGroup::Default
            };
            let token = TokenType {
                name: rule.name.clone(),
                kind: TokenKind::Terminal,
                pattern: regex,
                group,
                longer_alts: Vec::new(),
            };
            if rule.hidden {
                skipped.push(token);
            } else {
                terminals.push(token);
            }
        }

        let mut keywords: Vec<String> = grammar.keywords().into_iter().collect();
        keywords.sort_by_key(|k| std::cmp::Reverse(k.len()));

        let mut tokens = skipped;
        let keyword_base = tokens.len();
        let terminal_base = keyword_base + keywords.len();
        for keyword in &keywords {
            let escaped = regex_syntax::escape(keyword);
            let source = if case_insensitive {
                format!("(?i){escaped}")
            } else {
                escaped
            };
            let regex = Regex::new(&source).map_err(|e| Error::InvalidTerminal {
                name: keyword.clone(),
                message: e.to_string(),
            })?;
            let longer_alts = terminals
                .iter()
                .enumerate()
                .filter(|(_, t)| fully_matches(&t.pattern, keyword))
                .map(|(i, _)| terminal_base + i)
                .collect();
            tokens.push(TokenType {
                name: keyword.clone(),
                kind: TokenKind::Keyword(keyword.clone()),
                pattern: regex,
                group: TokenGroup::Default,
                longer_alts,
            });
        }
        tokens.extend(terminals);

        Ok(TokenVocabulary { tokens })
    }

    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.tokens.iter().position(|t| t.name == name)
    }

    pub fn get(&self, index: usize) -> &TokenType {
        &self.tokens[index]
    }
}

fn matches_whitespace(regex: &Regex) -> bool {
    fully_matches(regex, " ")
}

fn fully_matches(regex: &Regex, text: &str) -> bool {
    let input = Input::new(text).anchored(Anchored::Yes);
    regex.find(input).is_some_and(|m| m.len() == text.len())
}

/// Compiles a terminal rule body into a regex pattern, inlining fragment
/// rule calls. Cycles between terminal rules are rejected.
pub fn compile_terminal(grammar: &Grammar, rule: &TerminalRule) -> Result<String> {
    let mut visiting = IndexSet::new();
    visiting.insert(rule.name.clone());
    compile_expr(grammar, &rule.name, &rule.body, &mut visiting)
}

fn compile_expr(
    grammar: &Grammar,
    rule_name: &str,
    expr: &TerminalExpr,
    visiting: &mut IndexSet<String>,
) -> Result<String> {
    let invalid = |message: String| Error::InvalidTerminal {
        name: rule_name.to_string(),
        message,
    };
    let pattern = match expr {
        TerminalExpr::Alternatives {
            elements,
            cardinality,
        } => {
            let parts: Vec<String> = elements
                .iter()
                .map(|e| compile_expr(grammar, rule_name, e, visiting))
                .collect::<Result<_>>()?;
            wrap(format!("(?:{})", parts.join("|")), *cardinality)
        }
        TerminalExpr::Group {
            elements,
            cardinality,
        } => {
            let parts: Vec<String> = elements
                .iter()
                .map(|e| compile_expr(grammar, rule_name, e, visiting))
                .collect::<Result<_>>()?;
            wrap(format!("(?:{})", parts.concat()), *cardinality)
        }
        TerminalExpr::CharRange {
            left,
            right,
            cardinality,
        } => match right {
            Some(right) => wrap(
                format!("[{}-{}]", escape_in_class(left), escape_in_class(right)),
                *cardinality,
            ),
            None => wrap(regex_syntax::escape(left), *cardinality),
        },
        TerminalExpr::RuleCall { rule, cardinality } => {
            let target = grammar
                .terminal_rule(rule)
                .ok_or_else(|| Error::UndefinedTerminal(rule.clone()))?;
            if !visiting.insert(target.name.clone()) {
                return Err(invalid(format!("cyclic call of terminal '{}'", target.name)));
            }
            let inner = compile_expr(grammar, rule_name, &target.body, visiting)?;
            visiting.shift_remove(&target.name);
            wrap(format!("(?:{inner})"), *cardinality)
        }
        TerminalExpr::Negation { inner, cardinality } => {
            // No lookarounds in the regex engine; negation is supported
            // for single characters and ranges via class complement.
            let class = negated_class(grammar, rule_name, inner, visiting)?;
            wrap(format!("[^{class}]"), *cardinality)
        }
        TerminalExpr::Until { inner, cardinality } => {
            let stop = compile_expr(grammar, rule_name, inner, visiting)?;
            wrap(format!("(?:.*?(?:{stop}))"), *cardinality)
        }
        TerminalExpr::Regex {
            pattern,
            cardinality,
        } => wrap(format!("(?:{pattern})"), *cardinality),
        TerminalExpr::Wildcard { cardinality } => wrap(".".to_string(), *cardinality),
    };
    Ok(pattern)
}

/// Character-class body for a negated element.
fn negated_class(
    grammar: &Grammar,
    rule_name: &str,
    expr: &TerminalExpr,
    visiting: &mut IndexSet<String>,
) -> Result<String> {
    let invalid = || Error::InvalidTerminal {
        name: rule_name.to_string(),
        message: "negation is only supported for single characters and ranges".to_string(),
    };
    match expr {
        TerminalExpr::CharRange {
            left,
            right,
            cardinality: Cardinality::One,
        } => match right {
            Some(right) => Ok(format!(
                "{}-{}",
                escape_in_class(left),
                escape_in_class(right)
            )),
            None if left.chars().count() == 1 => Ok(escape_in_class(left)),
            None => Err(invalid()),
        },
        TerminalExpr::Alternatives {
            elements,
            cardinality: Cardinality::One,
        } => {
            let parts: Vec<String> = elements
                .iter()
                .map(|e| negated_class(grammar, rule_name, e, visiting))
                .collect::<Result<_>>()?;
            Ok(parts.concat())
        }
        _ => Err(invalid()),
    }
}

fn wrap(pattern: String, cardinality: Cardinality) -> String {
    match cardinality {
        Cardinality::One => pattern,
        Cardinality::Optional => format!("(?:{pattern})?"),
        Cardinality::ZeroOrMore => format!("(?:{pattern})*"),
        Cardinality::OneOrMore => format!("(?:{pattern})+"),
    }
}

fn escape_in_class(text: &str) -> String {
    text.chars()
        .map(|c| match c {
            '^' | '-' | ']' | '\\' | '[' => format!("\\{c}"),
            _ => c.to_string(),
        })
        .collect()
}
