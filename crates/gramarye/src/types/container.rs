//! Container type computation: which types may appear as a node's
//! `$container`.
//!
//! A non-reference property of type T on interface I means instances
//! of T can be contained in I. Types connected through sub/supertype
//! edges can stand in for each other at parse time, so every connected
//! component shares the merged container set.

use gramarye_core::types::AstTypes;
use indexmap::{IndexMap, IndexSet};

pub fn add_container_types(types: &mut AstTypes) {
    let mut containers: IndexMap<String, IndexSet<String>> = IndexMap::new();
    for interface in types.interfaces.values() {
        for property in &interface.properties {
            for alternative in &property.alternatives {
                if alternative.reference {
                    continue;
                }
                for member in &alternative.types {
                    if types.contains(member) {
                        containers
                            .entry(member.clone())
                            .or_default()
                            .insert(interface.name.clone());
                    }
                }
            }
        }
    }

    for component in connected_components(types) {
        let mut merged = IndexSet::new();
        for name in &component {
            if let Some(set) = containers.get(name) {
                merged.extend(set.iter().cloned());
            }
        }
        for name in &component {
            if let Some(interface) = types.interfaces.get_mut(name) {
                interface.container_types = merged.clone();
            } else if let Some(union) = types.unions.get_mut(name) {
                union.container_types = merged.clone();
            }
        }
    }
}

/// Components over the undirected closure of sub and supertype edges.
fn connected_components(types: &AstTypes) -> Vec<Vec<String>> {
    let mut neighbours: IndexMap<String, IndexSet<String>> = IndexMap::new();
    let add_edge = |a: &str, b: &str, neighbours: &mut IndexMap<String, IndexSet<String>>| {
        neighbours
            .entry(a.to_string())
            .or_default()
            .insert(b.to_string());
        neighbours
            .entry(b.to_string())
            .or_default()
            .insert(a.to_string());
    };
    for interface in types.interfaces.values() {
        neighbours.entry(interface.name.clone()).or_default();
        for other in interface.super_types.iter().chain(&interface.sub_types) {
            add_edge(&interface.name, other, &mut neighbours);
        }
    }
    for union in types.unions.values() {
        neighbours.entry(union.name.clone()).or_default();
        for other in union.super_types.iter().chain(&union.sub_types) {
            add_edge(&union.name, other, &mut neighbours);
        }
    }

    let mut visited = IndexSet::new();
    let mut components = Vec::new();
    for start in neighbours.keys() {
        if visited.contains(start) {
            continue;
        }
        let mut component = Vec::new();
        let mut queue = vec![start.clone()];
        while let Some(current) = queue.pop() {
            if !visited.insert(current.clone()) {
                continue;
            }
            component.push(current.clone());
            if let Some(next) = neighbours.get(&current) {
                queue.extend(next.iter().cloned());
            }
        }
        components.push(component);
    }
    components
}
