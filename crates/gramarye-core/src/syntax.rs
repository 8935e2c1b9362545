//! Runtime syntax trees: the dynamic AST node arena, the CST arena and
//! lazily resolved cross-references.
//!
//! Nodes are untyped at the Rust level; their `type_name` and property
//! map carry the schema the type collector derived. Arenas use plain
//! `u32` id newtypes, parent links only, no interior pointers.

use std::cell::OnceCell;
use std::fmt;

use indexmap::IndexMap;
use rowan::{TextRange, TextSize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CstId(pub u32);

/// A property value on an AST node.
#[derive(Debug, Clone)]
pub enum Value {
    String(String),
    Number(f64),
    Boolean(bool),
    Node(NodeId),
    Reference(Reference),
    Array(Vec<Value>),
}

impl Value {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_node(&self) -> Option<NodeId> {
        match self {
            Value::Node(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }
}

/// A cross-reference captured during parsing and resolved on demand.
///
/// `ref_id` identifies the referencing property as `"<Type>:<prop>"`;
/// the linker maps it to the expected target type. Resolution happens
/// at most once; a failed resolution stores its message instead.
#[derive(Debug, Clone)]
pub struct Reference {
    pub ref_text: String,
    pub ref_id: String,
    target: OnceCell<Option<NodeId>>,
    error: OnceCell<String>,
}

impl Reference {
    pub fn new(ref_text: impl Into<String>, ref_id: impl Into<String>) -> Self {
        Reference {
            ref_text: ref_text.into(),
            ref_id: ref_id.into(),
            target: OnceCell::new(),
            error: OnceCell::new(),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.target.get().is_some()
    }

    /// The resolved target, resolving through `resolve` on first access.
    pub fn resolve_with(&self, resolve: impl FnOnce(&Reference) -> Option<NodeId>) -> Option<NodeId> {
        let target = *self.target.get_or_init(|| resolve(self));
        if target.is_none() {
            let _ = self
                .error
                .set(format!("Could not resolve reference to '{}'.", self.ref_text));
        }
        target
    }

    /// The resolved target if resolution has already run.
    pub fn target(&self) -> Option<NodeId> {
        self.target.get().copied().flatten()
    }

    pub fn error(&self) -> Option<&str> {
        self.error.get().map(String::as_str)
    }
}

/// One AST node: a type name, a property map and container back-links.
#[derive(Debug, Clone, Default)]
pub struct AstNode {
    pub type_name: String,
    pub properties: IndexMap<String, Value>,
    pub container: Option<NodeId>,
    /// Name of the property on the container that holds this node.
    pub container_property: Option<String>,
    pub cst: Option<CstId>,
}

impl AstNode {
    pub fn new(type_name: impl Into<String>) -> Self {
        AstNode {
            type_name: type_name.into(),
            ..Default::default()
        }
    }

    pub fn get(&self, property: &str) -> Option<&Value> {
        self.properties.get(property)
    }
}

#[derive(Debug, Clone, Default)]
pub struct NodeArena {
    nodes: Vec<AstNode>,
}

impl NodeArena {
    pub fn new() -> Self {
        NodeArena::default()
    }

    pub fn alloc(&mut self, node: AstNode) -> NodeId {
        let id = NodeId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: NodeId) -> &AstNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: NodeId) -> &mut AstNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Rolls back to a previous length, discarding speculative nodes.
    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &AstNode)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, n)| (NodeId(i as u32), n))
    }

    /// Depth-first walk from a root, visiting every contained node.
    pub fn walk(&self, root: NodeId, visit: &mut impl FnMut(NodeId, &AstNode)) {
        let node = self.get(root);
        visit(root, node);
        for value in node.properties.values() {
            self.walk_value(value, visit);
        }
    }

    fn walk_value(&self, value: &Value, visit: &mut impl FnMut(NodeId, &AstNode)) {
        match value {
            Value::Node(id) => self.walk(*id, visit),
            Value::Array(items) => {
                for item in items {
                    self.walk_value(item, visit);
                }
            }
            _ => {}
        }
    }
}

/// Kind of a concrete syntax tree node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CstKind {
    Root,
    Composite,
    Leaf { token_name: String, hidden: bool },
}

#[derive(Debug, Clone)]
pub struct CstNode {
    pub kind: CstKind,
    pub range: TextRange,
    pub parent: Option<CstId>,
    pub children: Vec<CstId>,
    /// The AST node this subtree materialized, if any.
    pub ast: Option<NodeId>,
    /// Name of the grammar element that produced this node.
    pub grammar_source: Option<String>,
}

/// Flat CST storage; the builder fills it during parsing.
#[derive(Debug, Clone, Default)]
pub struct CstArena {
    nodes: Vec<CstNode>,
}

impl CstArena {
    pub fn new() -> Self {
        CstArena::default()
    }

    pub fn alloc(&mut self, node: CstNode) -> CstId {
        let id = CstId(self.nodes.len() as u32);
        self.nodes.push(node);
        id
    }

    pub fn get(&self, id: CstId) -> &CstNode {
        &self.nodes[id.0 as usize]
    }

    pub fn get_mut(&mut self, id: CstId) -> &mut CstNode {
        &mut self.nodes[id.0 as usize]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn truncate(&mut self, len: usize) {
        self.nodes.truncate(len);
    }

    /// The source text covered by a node.
    pub fn text<'a>(&self, id: CstId, source: &'a str) -> &'a str {
        let range = self.get(id).range;
        &source[usize::from(range.start())..usize::from(range.end())]
    }
}

/// 0-based line and column of an offset within `source`.
pub fn line_col(source: &str, offset: TextSize) -> (u32, u32) {
    let offset = usize::from(offset).min(source.len());
    let before = &source[..offset];
    let line = before.matches('\n').count() as u32;
    let col = before.rfind('\n').map_or(offset, |i| offset - i - 1) as u32;
    (line, col)
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
