//! The grammar model: the parsed representation of a grammar description.
//!
//! Produced either by hand (the bootstrap grammar for the grammar language
//! itself) or by lowering a parsed grammar document. Immutable once built;
//! every later stage (type collection, token building, parser construction)
//! only reads it.

use indexmap::IndexSet;
use serde::{Deserialize, Serialize};

/// Repetition marker on a grammar element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Cardinality {
    #[default]
    One,
    /// `?`
    Optional,
    /// `*`
    ZeroOrMore,
    /// `+`
    OneOrMore,
}

impl Cardinality {
    /// True for `?` and `*`: the element may be absent entirely.
    pub fn is_optional(self) -> bool {
        matches!(self, Cardinality::Optional | Cardinality::ZeroOrMore)
    }

    pub fn is_many(self) -> bool {
        matches!(self, Cardinality::ZeroOrMore | Cardinality::OneOrMore)
    }

    pub fn suffix(self) -> &'static str {
        match self {
            Cardinality::One => "",
            Cardinality::Optional => "?",
            Cardinality::ZeroOrMore => "*",
            Cardinality::OneOrMore => "+",
        }
    }
}

/// Assignment operator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operator {
    /// `=` - plain assignment
    Assign,
    /// `+=` - append to array
    Append,
    /// `?=` - boolean flag, true when matched
    Flag,
}

/// A complete grammar: rules plus explicitly declared types.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Grammar {
    pub name: String,
    /// Import paths, resolved by the caller before compilation.
    pub imports: Vec<String>,
    pub rules: Vec<Rule>,
    pub interfaces: Vec<InterfaceDecl>,
    pub unions: Vec<TypeDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum Rule {
    Parser(ParserRule),
    Terminal(TerminalRule),
}

impl Rule {
    pub fn name(&self) -> &str {
        match self {
            Rule::Parser(r) => &r.name,
            Rule::Terminal(r) => &r.name,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ParserRule {
    pub name: String,
    pub entry: bool,
    pub fragment: bool,
    /// Explicit `returns` type name, if any.
    pub returns: Option<String>,
    pub body: GrammarExpr,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TerminalRule {
    pub name: String,
    /// Hidden terminals are skipped or kept as non-AST CST leaves.
    pub hidden: bool,
    pub fragment: bool,
    /// Primitive value type, `string` when absent.
    pub returns: Option<String>,
    pub body: TerminalExpr,
}

/// Expression tree of a parser rule.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum GrammarExpr {
    Keyword {
        value: String,
        cardinality: Cardinality,
    },
    RuleCall {
        rule: String,
        cardinality: Cardinality,
    },
    Assignment {
        feature: String,
        operator: Operator,
        terminal: Box<GrammarExpr>,
        cardinality: Cardinality,
    },
    CrossReference {
        target_type: String,
        /// Terminal consumed for the reference text; the `ID` terminal when absent.
        terminal: Option<Box<GrammarExpr>>,
        cardinality: Cardinality,
    },
    /// `{Type}` or `{Type.feature=current}` - redirects node construction.
    Action {
        type_name: String,
        feature: Option<String>,
        operator: Option<Operator>,
    },
    Group {
        elements: Vec<GrammarExpr>,
        cardinality: Cardinality,
    },
    UnorderedGroup {
        elements: Vec<GrammarExpr>,
        cardinality: Cardinality,
    },
    Alternatives {
        elements: Vec<GrammarExpr>,
        cardinality: Cardinality,
    },
}

impl GrammarExpr {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            GrammarExpr::Keyword { cardinality, .. }
            | GrammarExpr::RuleCall { cardinality, .. }
            | GrammarExpr::Assignment { cardinality, .. }
            | GrammarExpr::CrossReference { cardinality, .. }
            | GrammarExpr::Group { cardinality, .. }
            | GrammarExpr::UnorderedGroup { cardinality, .. }
            | GrammarExpr::Alternatives { cardinality, .. } => *cardinality,
            GrammarExpr::Action { .. } => Cardinality::One,
        }
    }

    /// The same expression with a different cardinality. Actions carry
    /// none and are returned unchanged.
    pub fn with_cardinality(self, cardinality: Cardinality) -> GrammarExpr {
        match self {
            GrammarExpr::Keyword { value, .. } => GrammarExpr::Keyword { value, cardinality },
            GrammarExpr::RuleCall { rule, .. } => GrammarExpr::RuleCall { rule, cardinality },
            GrammarExpr::Assignment {
                feature,
                operator,
                terminal,
                ..
            } => GrammarExpr::Assignment {
                feature,
                operator,
                terminal,
                cardinality,
            },
            GrammarExpr::CrossReference {
                target_type,
                terminal,
                ..
            } => GrammarExpr::CrossReference {
                target_type,
                terminal,
                cardinality,
            },
            GrammarExpr::Group { elements, .. } => GrammarExpr::Group {
                elements,
                cardinality,
            },
            GrammarExpr::UnorderedGroup { elements, .. } => GrammarExpr::UnorderedGroup {
                elements,
                cardinality,
            },
            GrammarExpr::Alternatives { elements, .. } => GrammarExpr::Alternatives {
                elements,
                cardinality,
            },
            action @ GrammarExpr::Action { .. } => action,
        }
    }

    /// Depth-first walk over this expression and all nested elements.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a GrammarExpr)) {
        visit(self);
        match self {
            GrammarExpr::Assignment { terminal, .. } => terminal.walk(visit),
            GrammarExpr::CrossReference {
                terminal: Some(terminal),
                ..
            } => terminal.walk(visit),
            GrammarExpr::Group { elements, .. }
            | GrammarExpr::UnorderedGroup { elements, .. }
            | GrammarExpr::Alternatives { elements, .. } => {
                for element in elements {
                    element.walk(visit);
                }
            }
            _ => {}
        }
    }
}

/// Expression tree of a terminal rule, compiled to a regex by the token builder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum TerminalExpr {
    Alternatives {
        elements: Vec<TerminalExpr>,
        cardinality: Cardinality,
    },
    Group {
        elements: Vec<TerminalExpr>,
        cardinality: Cardinality,
    },
    /// `'a'..'z'`, or a single literal when `right` is absent.
    CharRange {
        left: String,
        right: Option<String>,
        cardinality: Cardinality,
    },
    /// Call to another terminal rule, inlined during regex compilation.
    RuleCall {
        rule: String,
        cardinality: Cardinality,
    },
    /// `!x` - anything but `x`.
    Negation {
        inner: Box<TerminalExpr>,
        cardinality: Cardinality,
    },
    /// `->x` - non-greedy anything up to and including `x`.
    Until {
        inner: Box<TerminalExpr>,
        cardinality: Cardinality,
    },
    /// Verbatim regex fragment.
    Regex {
        pattern: String,
        cardinality: Cardinality,
    },
    /// `.` - any single character.
    Wildcard { cardinality: Cardinality },
}

impl TerminalExpr {
    pub fn cardinality(&self) -> Cardinality {
        match self {
            TerminalExpr::Alternatives { cardinality, .. }
            | TerminalExpr::Group { cardinality, .. }
            | TerminalExpr::CharRange { cardinality, .. }
            | TerminalExpr::RuleCall { cardinality, .. }
            | TerminalExpr::Negation { cardinality, .. }
            | TerminalExpr::Until { cardinality, .. }
            | TerminalExpr::Regex { cardinality, .. }
            | TerminalExpr::Wildcard { cardinality } => *cardinality,
        }
    }

    /// The same expression with a different cardinality.
    pub fn with_cardinality(self, cardinality: Cardinality) -> TerminalExpr {
        match self {
            TerminalExpr::Alternatives { elements, .. } => TerminalExpr::Alternatives {
                elements,
                cardinality,
            },
            TerminalExpr::Group { elements, .. } => TerminalExpr::Group {
                elements,
                cardinality,
            },
            TerminalExpr::CharRange { left, right, .. } => TerminalExpr::CharRange {
                left,
                right,
                cardinality,
            },
            TerminalExpr::RuleCall { rule, .. } => TerminalExpr::RuleCall { rule, cardinality },
            TerminalExpr::Negation { inner, .. } => TerminalExpr::Negation { inner, cardinality },
            TerminalExpr::Until { inner, .. } => TerminalExpr::Until { inner, cardinality },
            TerminalExpr::Regex { pattern, .. } => TerminalExpr::Regex {
                pattern,
                cardinality,
            },
            TerminalExpr::Wildcard { .. } => TerminalExpr::Wildcard { cardinality },
        }
    }
}

/// Explicitly declared interface: `interface X extends Y { ... }`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceDecl {
    pub name: String,
    pub super_types: Vec<String>,
    pub attributes: Vec<AttributeDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AttributeDecl {
    pub name: String,
    pub optional: bool,
    /// One alternative per declared atom type.
    pub types: Vec<AtomType>,
}

/// Explicitly declared union: `type X = A | B;`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TypeDecl {
    pub name: String,
    pub alternatives: Vec<AtomType>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AtomType {
    pub is_ref: bool,
    pub is_array: bool,
    pub kind: AtomKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AtomKind {
    /// `string`, `number`, `boolean`, `bigint`, `Date`
    Primitive(String),
    /// Quoted keyword literal type.
    Literal(String),
    /// Reference to a rule, interface or type by name.
    TypeRef(String),
}

pub const PRIMITIVE_TYPES: &[&str] = &["string", "number", "boolean", "bigint", "Date"];

pub fn is_primitive_type(name: &str) -> bool {
    PRIMITIVE_TYPES.contains(&name)
}

impl Grammar {
    pub fn parser_rule(&self, name: &str) -> Option<&ParserRule> {
        self.rules.iter().find_map(|r| match r {
            Rule::Parser(p) if p.name == name => Some(p),
            _ => None,
        })
    }

    pub fn terminal_rule(&self, name: &str) -> Option<&TerminalRule> {
        self.rules.iter().find_map(|r| match r {
            Rule::Terminal(t) if t.name == name => Some(t),
            _ => None,
        })
    }

    pub fn parser_rules(&self) -> impl Iterator<Item = &ParserRule> {
        self.rules.iter().filter_map(|r| match r {
            Rule::Parser(p) => Some(p),
            _ => None,
        })
    }

    pub fn terminal_rules(&self) -> impl Iterator<Item = &TerminalRule> {
        self.rules.iter().filter_map(|r| match r {
            Rule::Terminal(t) => Some(t),
            _ => None,
        })
    }

    pub fn entry_rule(&self) -> Option<&ParserRule> {
        self.parser_rules().find(|r| r.entry)
    }

    /// A datatype rule combines only keywords and terminal/datatype rule calls,
    /// never assignments or actions. It produces a primitive value, not a node.
    pub fn is_data_type_rule(&self, rule: &ParserRule) -> bool {
        self.is_data_type_rule_impl(rule, &mut IndexSet::new())
    }

    fn is_data_type_rule_impl(&self, rule: &ParserRule, visited: &mut IndexSet<String>) -> bool {
        if !visited.insert(rule.name.clone()) {
            return true;
        }
        // An explicit object return type always produces a node, even
        // when the body has no assignments.
        if let Some(returns) = &rule.returns
            && !is_primitive_type(returns)
        {
            return false;
        }
        let mut data_type = true;
        rule.body.walk(&mut |element| match element {
            GrammarExpr::Assignment { .. } | GrammarExpr::Action { .. } => data_type = false,
            GrammarExpr::RuleCall { rule: callee, .. } => {
                if let Some(target) = self.parser_rule(callee)
                    && !self.is_data_type_rule_impl(target, visited)
                {
                    data_type = false;
                }
            }
            _ => {}
        });
        data_type
    }

    /// The AST type name a rule's result carries.
    ///
    /// Datatype rules are named after themselves (they alias a primitive);
    /// other parser rules use their explicit `returns` type or their name;
    /// terminal rules use their declared primitive or `string`.
    pub fn rule_value_type(&self, rule: &Rule) -> String {
        match rule {
            Rule::Terminal(t) => t.returns.clone().unwrap_or_else(|| "string".to_string()),
            Rule::Parser(p) => {
                if self.is_data_type_rule(p) {
                    p.name.clone()
                } else {
                    p.returns.clone().unwrap_or_else(|| p.name.clone())
                }
            }
        }
    }

    /// All assignments appearing anywhere in an expression tree.
    pub fn extract_assignments(element: &GrammarExpr) -> Vec<(&str, Operator)> {
        let mut assignments = Vec::new();
        element.walk(&mut |e| {
            if let GrammarExpr::Assignment {
                feature, operator, ..
            } = e
            {
                assignments.push((feature.as_str(), *operator));
            }
        });
        assignments
    }

    /// Every distinct keyword literal used by parser rules, in first-seen order.
    pub fn keywords(&self) -> IndexSet<String> {
        let mut keywords = IndexSet::new();
        for rule in self.parser_rules() {
            rule.body.walk(&mut |element| {
                if let GrammarExpr::Keyword { value, .. } = element {
                    keywords.insert(value.clone());
                }
            });
        }
        keywords
    }
}
