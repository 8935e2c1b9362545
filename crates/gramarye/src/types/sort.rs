//! Deterministic interface ordering: alphabetical within each level of
//! the inheritance hierarchy, supertypes first.

use gramarye_core::types::AstTypes;
use indexmap::{IndexMap, IndexSet};

use crate::{Error, Result};

/// Reorders `types.interfaces` topologically by supertype edges,
/// alphabetically among unrelated interfaces. A cycle among interfaces
/// is fatal.
pub fn sort_interfaces_topologically(types: &mut AstTypes) -> Result<()> {
    let mut names: Vec<String> = types.interfaces.keys().cloned().collect();
    names.sort();

    // In-degree counts only supertype edges between interfaces.
    let mut in_degree: IndexMap<String, usize> = names.iter().map(|n| (n.clone(), 0)).collect();
    for name in &names {
        let interface = &types.interfaces[name];
        let count = interface
            .super_types
            .iter()
            .filter(|s| types.interfaces.contains_key(*s))
            .count();
        in_degree[name] = count;
    }

    let mut sorted = Vec::with_capacity(names.len());
    let mut done: IndexSet<String> = IndexSet::new();
    while done.len() < names.len() {
        let next = names
            .iter()
            .find(|n| !done.contains(*n) && in_degree[*n] == 0)
            .cloned();
        let Some(next) = next else {
            let stuck = names
                .iter()
                .find(|n| !done.contains(*n))
                .cloned()
                .unwrap_or_default();
            return Err(Error::TypeCycle(stuck));
        };
        done.insert(next.clone());
        for name in &names {
            if done.contains(name) {
                continue;
            }
            if types.interfaces[name].super_types.contains(&next) {
                let degree = &mut in_degree[name];
                *degree = degree.saturating_sub(1);
            }
        }
        sorted.push(next);
    }

    let mut reordered = IndexMap::with_capacity(sorted.len());
    for name in sorted {
        let (name, interface) = types
            .interfaces
            .shift_remove_entry(&name)
            .expect("sorted name exists");
        reordered.insert(name, interface);
    }
    types.interfaces = reordered;
    Ok(())
}
