//! Incremental concrete syntax tree construction.
//!
//! Composites open when a rule starts and close when it finishes. A
//! closed composite with exactly one composite child collapses into
//! that child, so trivial single-call rules do not stack up wrapper
//! nodes.

use gramarye_core::syntax::{CstArena, CstId, CstKind, CstNode, NodeId};
use rowan::{TextRange, TextSize};

#[derive(Debug, Default)]
pub struct CstBuilder {
    pub arena: CstArena,
    open: Vec<CstId>,
}

/// Rollback point for speculative parsing.
#[derive(Debug, Clone)]
pub struct CstCheckpoint {
    arena_len: usize,
    open: Vec<(CstId, usize)>,
}

impl CstBuilder {
    pub fn new() -> Self {
        let mut builder = CstBuilder::default();
        let root = builder.arena.alloc(CstNode {
            kind: CstKind::Root,
            range: TextRange::empty(TextSize::new(0)),
            parent: None,
            children: Vec::new(),
            ast: None,
            grammar_source: None,
        });
        builder.open.push(root);
        builder
    }

    pub fn root(&self) -> CstId {
        CstId(0)
    }

    pub fn open_composite(&mut self, grammar_source: &str) -> CstId {
        let parent = *self.open.last().unwrap();
        let id = self.arena.alloc(CstNode {
            kind: CstKind::Composite,
            range: TextRange::empty(TextSize::new(0)),
            parent: Some(parent),
            children: Vec::new(),
            ast: None,
            grammar_source: Some(grammar_source.to_string()),
        });
        self.arena.get_mut(parent).children.push(id);
        self.open.push(id);
        id
    }

    pub fn leaf(&mut self, token_name: &str, hidden: bool, range: TextRange) -> CstId {
        let parent = *self.open.last().unwrap();
        let id = self.arena.alloc(CstNode {
            kind: CstKind::Leaf {
                token_name: token_name.to_string(),
                hidden,
            },
            range,
            parent: Some(parent),
            children: Vec::new(),
            ast: None,
            grammar_source: None,
        });
        self.arena.get_mut(parent).children.push(id);
        id
    }

    /// Closes the innermost composite, fixing its range and collapsing a
    /// lone composite child into its place. Returns the surviving node.
    pub fn close_composite(&mut self, ast: Option<NodeId>) -> CstId {
        let id = self.open.pop().expect("unbalanced composite");
        let range = self.span_of_children(id);
        self.arena.get_mut(id).range = range;

        // Collapse only when the child stands for the same AST node; a
        // child attributed elsewhere keeps its wrapper.
        let collapse = match self.arena.get(id).children.as_slice() {
            [only] => Some(*only),
            _ => None,
        }
        .filter(|&only| {
            let child = self.arena.get(only);
            child.kind == CstKind::Composite && (child.ast.is_none() || child.ast == ast)
        });
        let result = if let Some(child) = collapse {
            let parent = self.arena.get(id).parent;
            self.arena.get_mut(child).parent = parent;
            if let Some(parent) = parent {
                let siblings = &mut self.arena.get_mut(parent).children;
                if let Some(slot) = siblings.iter().position(|&c| c == id) {
                    siblings[slot] = child;
                }
            }
            child
        } else {
            id
        };
        if let Some(ast) = ast {
            self.arena.get_mut(result).ast = Some(ast);
        }
        result
    }

    pub fn finish(&mut self) -> CstId {
        debug_assert_eq!(self.open.len(), 1);
        let root = self.root();
        let range = self.span_of_children(root);
        self.arena.get_mut(root).range = range;
        root
    }

    /// Re-points the AST backlink, for frames adopted mid-rule.
    pub fn set_ast(&mut self, id: CstId, ast: NodeId) {
        self.arena.get_mut(id).ast = Some(ast);
    }

    pub fn current(&self) -> CstId {
        *self.open.last().unwrap()
    }

    pub fn checkpoint(&self) -> CstCheckpoint {
        CstCheckpoint {
            arena_len: self.arena.len(),
            open: self
                .open
                .iter()
                .map(|&id| (id, self.arena.get(id).children.len()))
                .collect(),
        }
    }

    pub fn restore(&mut self, checkpoint: &CstCheckpoint) {
        self.arena.truncate(checkpoint.arena_len);
        self.open = checkpoint.open.iter().map(|&(id, _)| id).collect();
        for &(id, children_len) in &checkpoint.open {
            self.arena.get_mut(id).children.truncate(children_len);
        }
    }

    fn span_of_children(&self, id: CstId) -> TextRange {
        let node = self.arena.get(id);
        let mut iter = node.children.iter().map(|&c| self.arena.get(c).range);
        match iter.next() {
            Some(first) => iter.fold(first, |acc, r| acc.cover(r)),
            None => TextRange::empty(TextSize::new(0)),
        }
    }
}
