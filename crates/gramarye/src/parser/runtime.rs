//! The parse-time interpreter.
//!
//! Executes compiled op trees over the token stream, materializing AST
//! nodes bottom-up. Decision points (alternatives, options, loops) are
//! explored speculatively with full snapshots; once parsing is
//! committed, a failed consume recovers by deleting or inserting a
//! single token so a partial AST always comes out.

use gramarye_core::grammar::{Grammar, Operator};
use gramarye_core::syntax::{AstNode, CstArena, CstId, NodeArena, NodeId, Reference, Value};
use indexmap::IndexMap;
use rowan::{TextRange, TextSize};

use crate::diagnostics::Diagnostics;
use crate::lexer::{tokenize, Token};
use crate::parser::builder::{AssignInfo, CompiledRules, ParseOp, RuleResult};
use crate::parser::cst_builder::CstBuilder;
use crate::tokens::{TokenKind, TokenVocabulary};

pub struct Parser<'a> {
    vocabulary: &'a TokenVocabulary,
    rules: &'a CompiledRules,
    /// Vocabulary indices of terminals that produce numbers.
    number_tokens: Vec<bool>,
}

#[derive(Debug)]
pub struct ParseOutput {
    pub root: Option<NodeId>,
    pub nodes: NodeArena,
    pub cst: CstArena,
    pub cst_root: CstId,
    pub diagnostics: Diagnostics,
}

impl<'a> Parser<'a> {
    pub fn new(grammar: &Grammar, vocabulary: &'a TokenVocabulary, rules: &'a CompiledRules) -> Self {
        let number_tokens = vocabulary
            .tokens
            .iter()
            .map(|t| {
                matches!(t.kind, TokenKind::Terminal)
                    && grammar
                        .terminal_rule(&t.name)
                        .is_some_and(|r| r.returns.as_deref() == Some("number"))
            })
            .collect();
        Parser {
            vocabulary,
            rules,
            number_tokens,
        }
    }

    pub fn parse(&self, source: &str) -> ParseOutput {
        let (tokens, diagnostics) = tokenize(self.vocabulary, source);
        let mut state = State {
            source,
            tokens,
            pos: 0,
            nodes: NodeArena::new(),
            cst: CstBuilder::new(),
            diagnostics,
            speculating: 0,
            parser: self,
        };

        let root = match state.parse_rule(self.rules.entry(), "") {
            Ok(Outcome::Node(id)) => Some(id),
            Ok(_) => None,
            // Committed parsing always recovers; this arm is unreachable
            // at speculation depth zero but kept total.
            Err(_) => None,
        };

        state.drain_hidden();
        if state.pos < state.tokens.len() {
            let range = state.tokens[state.pos].range;
            state
                .diagnostics
                .error("expected end of input".to_string(), range);
        }
        let cst_root = state.cst.finish();

        ParseOutput {
            root,
            nodes: state.nodes,
            cst: state.cst.arena,
            cst_root,
            diagnostics: state.diagnostics,
        }
    }
}

/// Construction-in-progress for one rule invocation.
#[derive(Debug, Clone)]
enum Frame {
    /// Properties collected locally, node not yet allocated.
    Fresh {
        type_name: String,
        properties: IndexMap<String, Value>,
    },
    /// An unassigned subrule result took over as the current node.
    Adopted(NodeId),
}

#[derive(Debug)]
enum Outcome {
    Node(NodeId),
    Value(Value),
    Properties(IndexMap<String, Value>),
}

/// Speculative execution failure; committed execution recovers instead.
struct Fail;

type OpResult = std::result::Result<(), Fail>;

struct State<'a, 'p> {
    source: &'a str,
    tokens: Vec<Token>,
    pos: usize,
    nodes: NodeArena,
    cst: CstBuilder,
    diagnostics: Diagnostics,
    speculating: u32,
    parser: &'p Parser<'p>,
}

impl State<'_, '_> {
    fn parse_rule(
        &mut self,
        rule_index: usize,
        caller_type: &str,
    ) -> std::result::Result<Outcome, Fail> {
        let rule = self.parser.rules.get(rule_index);
        self.cst.open_composite(&rule.name);

        let mut frame = match &rule.result {
            RuleResult::Node { type_name } => {
                let mut properties = IndexMap::new();
                for array in &rule.arrays {
                    properties.insert(array.clone(), Value::Array(Vec::new()));
                }
                Frame::Fresh {
                    type_name: type_name.clone(),
                    properties,
                }
            }
            // Fragments build into the caller's node; references
            // assigned here must name the caller's type as owner.
            _ => Frame::Fresh {
                type_name: caller_type.to_string(),
                properties: IndexMap::new(),
            },
        };

        self.exec(&rule.body, &mut frame)?;

        match &rule.result {
            RuleResult::Node { .. } => {
                let id = self.finalize(frame);
                let cst_id = self.cst.close_composite(Some(id));
                self.nodes.get_mut(id).cst = Some(cst_id);
                Ok(Outcome::Node(id))
            }
            RuleResult::Datatype { number } => {
                let cst_id = self.cst.close_composite(None);
                let range = self.cst.arena.get(cst_id).range;
                let text = &self.source[usize::from(range.start())..usize::from(range.end())];
                let value = if *number {
                    Value::Number(text.trim().parse().unwrap_or(f64::NAN))
                } else {
                    Value::String(text.to_string())
                };
                Ok(Outcome::Value(value))
            }
            RuleResult::Fragment => {
                self.cst.close_composite(None);
                let properties = match frame {
                    Frame::Fresh { properties, .. } => properties,
                    Frame::Adopted(_) => IndexMap::new(),
                };
                Ok(Outcome::Properties(properties))
            }
        }
    }

    fn exec(&mut self, op: &ParseOp, frame: &mut Frame) -> OpResult {
        match op {
            ParseOp::Consume {
                token,
                assign,
                crossref,
                ..
            } => self.consume(*token, assign.as_ref(), crossref.as_deref(), frame),
            ParseOp::Subrule { rule, assign, .. } => {
                let caller_type = self.frame_type(frame);
                let outcome = self.parse_rule(*rule, &caller_type)?;
                self.apply_subrule(outcome, assign.as_ref(), frame);
                Ok(())
            }
            ParseOp::Action { type_name, feature } => {
                self.execute_action(type_name, feature.as_ref(), frame);
                Ok(())
            }
            ParseOp::Group(ops) => {
                for op in ops {
                    self.exec(op, frame)?;
                }
                Ok(())
            }
            ParseOp::Alternatives { alts, .. } => self.alternatives(alts, frame),
            ParseOp::Optional { body, .. } => {
                self.try_exec(body, frame);
                Ok(())
            }
            ParseOp::Many {
                at_least_one, body, ..
            } => {
                if *at_least_one {
                    self.exec(body, frame)?;
                }
                loop {
                    let before = self.pos;
                    if !self.try_exec(body, frame) || self.pos == before {
                        break;
                    }
                }
                Ok(())
            }
        }
    }

    fn alternatives(&mut self, alts: &[ParseOp], frame: &mut Frame) -> OpResult {
        for alt in alts {
            if self.try_exec(alt, frame) {
                return Ok(());
            }
        }
        if self.speculating > 0 {
            return Err(Fail);
        }
        // Committed: report, drop one token and retry, then force the
        // first alternative with per-token recovery.
        let range = self.current_range();
        self.diagnostics
            .error("no viable alternative".to_string(), range);
        if self.pos < self.tokens.len() {
            self.pos += 1;
            for alt in alts {
                if self.try_exec(alt, frame) {
                    return Ok(());
                }
            }
        }
        if let Some(first) = alts.first() {
            self.exec(first, frame)?;
        }
        Ok(())
    }

    /// Runs an op speculatively, restoring every piece of state on
    /// failure.
    fn try_exec(&mut self, op: &ParseOp, frame: &mut Frame) -> bool {
        let snap_pos = self.pos;
        let snap_nodes = self.nodes.len();
        let snap_cst = self.cst.checkpoint();
        let snap_frame = frame.clone();
        let snap_adopted = match frame {
            Frame::Adopted(id) => Some((*id, self.nodes.get(*id).clone())),
            Frame::Fresh { .. } => None,
        };

        self.speculating += 1;
        let ok = self.exec(op, frame).is_ok();
        self.speculating -= 1;

        if !ok {
            self.pos = snap_pos;
            self.nodes.truncate(snap_nodes);
            self.cst.restore(&snap_cst);
            *frame = snap_frame;
            if let Some((id, node)) = snap_adopted
                && (id.0 as usize) < snap_nodes
            {
                *self.nodes.get_mut(id) = node;
            }
        }
        ok
    }

    fn consume(
        &mut self,
        expected: usize,
        assign: Option<&AssignInfo>,
        crossref: Option<&str>,
        frame: &mut Frame,
    ) -> OpResult {
        self.drain_hidden();
        if !self.token_matches(expected) {
            if self.speculating > 0 {
                return Err(Fail);
            }
            self.report_mismatch(expected);
            // Single-token deletion when the expected token comes right
            // after the stray one; otherwise continue as if the expected
            // token had been present.
            let mut next = self.pos + 1;
            while next < self.tokens.len() && self.tokens[next].hidden {
                next += 1;
            }
            if next < self.tokens.len() && self.tokens[next].token == expected {
                self.pos += 1;
                self.drain_hidden();
            } else {
                return Ok(());
            }
        }

        let token = self.tokens[self.pos];
        self.pos += 1;
        let name = self.parser.vocabulary.get(token.token).name.clone();
        self.cst.leaf(&name, false, token.range);

        if let Some(info) = assign {
            let text = self.source
                [usize::from(token.range.start())..usize::from(token.range.end())]
                .to_string();
            let value = if info.operator == Operator::Flag {
                Value::Boolean(true)
            } else if crossref.is_some() {
                let ref_id = format!("{}:{}", self.frame_type(frame), info.feature);
                Value::Reference(Reference::new(text, ref_id))
            } else if self.parser.number_tokens[token.token] {
                Value::Number(text.parse().unwrap_or(f64::NAN))
            } else {
                Value::String(text)
            };
            self.assign(frame, info, value);
        }
        Ok(())
    }

    fn token_matches(&self, expected: usize) -> bool {
        self.pos < self.tokens.len() && self.tokens[self.pos].token == expected
    }

    /// Moves hidden tokens into the CST without surfacing them to ops.
    fn drain_hidden(&mut self) {
        while self.pos < self.tokens.len() && self.tokens[self.pos].hidden {
            let token = self.tokens[self.pos];
            let name = self.parser.vocabulary.get(token.token).name.clone();
            self.cst.leaf(&name, true, token.range);
            self.pos += 1;
        }
    }

    fn apply_subrule(&mut self, outcome: Outcome, assign: Option<&AssignInfo>, frame: &mut Frame) {
        match (outcome, assign) {
            (Outcome::Node(id), Some(info)) => self.assign(frame, info, Value::Node(id)),
            (Outcome::Node(id), None) => self.adopt(id, frame),
            (Outcome::Value(value), Some(info)) => self.assign(frame, info, value),
            // Unassigned datatype calls only contribute matched text.
            (Outcome::Value(_), None) => {}
            (Outcome::Properties(properties), _) => self.merge_fragment(properties, frame),
        }
    }

    /// An unassigned rule call produced a node: it becomes the current
    /// one. Locally collected properties win over the result's, except
    /// that an untouched empty array never clobbers a populated one.
    fn adopt(&mut self, id: NodeId, frame: &mut Frame) {
        if let Frame::Fresh { properties, .. } = frame {
            let incoming = std::mem::take(properties);
            let node = self.nodes.get_mut(id);
            for (key, value) in incoming {
                if let Value::Array(items) = &value
                    && items.is_empty()
                    && node.properties.contains_key(&key)
                {
                    continue;
                }
                node.properties.insert(key, value);
            }
        }
        *frame = Frame::Adopted(id);
    }

    fn merge_fragment(&mut self, properties: IndexMap<String, Value>, frame: &mut Frame) {
        let target = self.frame_properties(frame);
        for (key, value) in properties {
            if let Value::Array(items) = value {
                if let Some(Value::Array(existing)) = target.get_mut(&key) {
                    existing.extend(items);
                    continue;
                }
                target.insert(key, Value::Array(items));
            } else {
                target.insert(key, value);
            }
        }
    }

    /// `{Type}` and `{Type.feature=current}`: the node built so far is
    /// finished and a fresh frame takes over, optionally holding the
    /// old node in `feature`.
    fn execute_action(
        &mut self,
        type_name: &str,
        feature: Option<&(String, Operator)>,
        frame: &mut Frame,
    ) {
        if let Some((feature, operator)) = feature {
            let old = std::mem::replace(
                frame,
                Frame::Fresh {
                    type_name: type_name.to_string(),
                    properties: IndexMap::new(),
                },
            );
            let old_id = self.finalize(old);
            let composite = self.cst.current();
            self.cst.set_ast(composite, old_id);
            self.nodes.get_mut(old_id).cst = Some(composite);
            self.assign(
                frame,
                &AssignInfo {
                    feature: feature.clone(),
                    operator: *operator,
                },
                Value::Node(old_id),
            );
        } else {
            // A featureless action only retypes; it appears before
            // anything feature-bearing was collected.
            match frame {
                Frame::Fresh {
                    type_name: current, ..
                } => *current = type_name.to_string(),
                Frame::Adopted(id) => {
                    self.nodes.get_mut(*id).type_name = type_name.to_string();
                }
            }
        }
    }

    /// Materializes a frame into the node arena and wires container
    /// links for every node-valued property.
    fn finalize(&mut self, frame: Frame) -> NodeId {
        let id = match frame {
            Frame::Adopted(id) => id,
            Frame::Fresh {
                type_name,
                properties,
            } => self.nodes.alloc(AstNode {
                type_name,
                properties,
                container: None,
                container_property: None,
                cst: None,
            }),
        };
        let links: Vec<(NodeId, String)> = self
            .nodes
            .get(id)
            .properties
            .iter()
            .flat_map(|(key, value)| {
                let mut children = Vec::new();
                collect_node_ids(value, &mut children);
                children.into_iter().map(move |c| (c, key.clone()))
            })
            .collect();
        for (child, property) in links {
            let child_node = self.nodes.get_mut(child);
            child_node.container = Some(id);
            child_node.container_property = Some(property);
        }
        id
    }

    fn assign(&mut self, frame: &mut Frame, info: &AssignInfo, value: Value) {
        let properties = self.frame_properties(frame);
        match info.operator {
            Operator::Assign | Operator::Flag => {
                properties.insert(info.feature.clone(), value);
            }
            Operator::Append => {
                match properties
                    .entry(info.feature.clone())
                    .or_insert_with(|| Value::Array(Vec::new()))
                {
                    Value::Array(items) => items.push(value),
                    slot => *slot = Value::Array(vec![value]),
                }
            }
        }
    }

    fn frame_properties<'f>(
        &'f mut self,
        frame: &'f mut Frame,
    ) -> &'f mut IndexMap<String, Value> {
        match frame {
            Frame::Fresh { properties, .. } => properties,
            Frame::Adopted(id) => &mut self.nodes.get_mut(*id).properties,
        }
    }

    fn frame_type(&self, frame: &Frame) -> String {
        match frame {
            Frame::Fresh { type_name, .. } => type_name.clone(),
            Frame::Adopted(id) => self.nodes.get(*id).type_name.clone(),
        }
    }

    fn report_mismatch(&mut self, expected: usize) {
        let expected_name = &self.parser.vocabulary.get(expected).name;
        let (found, range) = if self.pos < self.tokens.len() {
            let token = self.tokens[self.pos];
            (
                format!("'{}'", self.parser.vocabulary.get(token.token).name),
                token.range,
            )
        } else {
            ("end of input".to_string(), self.current_range())
        };
        self.diagnostics.error(
            format!("expected '{expected_name}' but found {found}"),
            range,
        );
    }

    fn current_range(&self) -> TextRange {
        if self.pos < self.tokens.len() {
            self.tokens[self.pos].range
        } else {
            let end = TextSize::new(self.source.len() as u32);
            TextRange::empty(end)
        }
    }
}

fn collect_node_ids(value: &Value, out: &mut Vec<NodeId>) {
    match value {
        Value::Node(id) => out.push(*id),
        Value::Array(items) => {
            for item in items {
                collect_node_ids(item, out);
            }
        }
        _ => {}
    }
}
