//! Precomputed subtype table for runtime type tests.
//!
//! Built once per compiled language; linking and scope filtering query
//! it instead of re-walking the hierarchy.

use gramarye_core::types::AstTypes;
use indexmap::{IndexMap, IndexSet};

#[derive(Debug, Clone, Default)]
pub struct Reflection {
    /// Transitive supertypes per type name, not including the type
    /// itself.
    ancestors: IndexMap<String, IndexSet<String>>,
}

impl Reflection {
    pub fn build(types: &AstTypes) -> Reflection {
        let mut ancestors = IndexMap::new();
        for name in types.interfaces.keys().chain(types.unions.keys()) {
            ancestors.insert(name.clone(), types.super_types_of(name));
        }
        Reflection { ancestors }
    }

    pub fn is_known(&self, type_name: &str) -> bool {
        self.ancestors.contains_key(type_name)
    }

    /// True when `sub` is `sup` or transitively below it.
    pub fn is_subtype(&self, sub: &str, sup: &str) -> bool {
        if sub == sup {
            return true;
        }
        self.ancestors
            .get(sub)
            .is_some_and(|set| set.contains(sup))
    }

    pub fn ancestors_of(&self, type_name: &str) -> impl Iterator<Item = &str> {
        self.ancestors
            .get(type_name)
            .into_iter()
            .flat_map(|set| set.iter().map(String::as_str))
    }
}
