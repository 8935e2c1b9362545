//! Scope computation and the default cross-reference linker.
//!
//! Scopes are precomputed per container: every node carrying a string
//! `name` property is visible in the scope of its container, and outer
//! scopes shadow nothing (lookup walks outward until a fit is found).
//! References stay lazy; the linker resolves them on demand and caches
//! the result inside the reference itself.

use gramarye_core::syntax::{NodeArena, NodeId, Reference, Value};
use indexmap::IndexMap;

use crate::types::Reflection;

/// Visible named nodes, grouped by the container they live in directly.
#[derive(Debug, Clone, Default)]
pub struct Scopes {
    entries: IndexMap<Option<NodeId>, Vec<(String, NodeId)>>,
}

impl Scopes {
    /// Indexes every named node under `root` into its container's
    /// scope. The root itself lands in the outermost (`None`) scope.
    pub fn compute(nodes: &NodeArena, root: NodeId) -> Scopes {
        let mut scopes = Scopes::default();
        nodes.walk(root, &mut |id, node| {
            if let Some(Value::String(name)) = node.get("name") {
                scopes
                    .entries
                    .entry(node.container)
                    .or_default()
                    .push((name.clone(), id));
            }
        });
        scopes
    }

    pub fn lookup<'a>(
        &'a self,
        container: Option<NodeId>,
        name: &'a str,
    ) -> impl Iterator<Item = NodeId> + 'a {
        self.entries
            .get(&container)
            .into_iter()
            .flatten()
            .filter(move |(n, _)| n == name)
            .map(|&(_, id)| id)
    }
}

/// Resolves references against precomputed scopes, filtered by the
/// expected target type from the reference registry.
pub struct Linker<'a> {
    pub nodes: &'a NodeArena,
    pub scopes: &'a Scopes,
    pub reflection: &'a Reflection,
    /// `"<Type>:<prop>"` to expected target type name.
    pub ref_targets: &'a IndexMap<String, String>,
}

impl Linker<'_> {
    /// Resolves one reference from its containing node, walking the
    /// container chain outward. Caches inside the reference.
    pub fn link(&self, reference: &Reference, from: NodeId) -> Option<NodeId> {
        reference.resolve_with(|reference| {
            let expected = self.ref_targets.get(&reference.ref_id);
            let mut container = Some(from);
            while let Some(current) = container {
                let node = self.nodes.get(current);
                for candidate in self.scopes.lookup(Some(current), &reference.ref_text) {
                    if self.accepts(candidate, expected) {
                        return Some(candidate);
                    }
                }
                container = node.container;
            }
            // Outermost scope holds the document root.
            self.scopes
                .lookup(None, &reference.ref_text)
                .find(|&candidate| self.accepts(candidate, expected))
        })
    }

    /// Resolves every reference reachable from `root`, returning the
    /// messages of the ones that failed.
    pub fn link_all(&self, root: NodeId) -> Vec<String> {
        let mut errors = Vec::new();
        self.nodes.walk(root, &mut |id, node| {
            for value in node.properties.values() {
                collect_references(value, &mut |reference| {
                    if self.link(reference, id).is_none()
                        && let Some(error) = reference.error()
                    {
                        errors.push(error.to_string());
                    }
                });
            }
        });
        errors
    }

    fn accepts(&self, candidate: NodeId, expected: Option<&String>) -> bool {
        match expected {
            Some(expected) => self
                .reflection
                .is_subtype(&self.nodes.get(candidate).type_name, expected),
            None => true,
        }
    }
}

fn collect_references(value: &Value, visit: &mut impl FnMut(&Reference)) {
    match value {
        Value::Reference(reference) => visit(reference),
        Value::Array(items) => {
            for item in items {
                collect_references(item, visit);
            }
        }
        _ => {}
    }
}
