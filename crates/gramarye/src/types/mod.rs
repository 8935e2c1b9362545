//! Type collection: derives the AST type schema from a grammar.
//!
//! Inference walks rule bodies and builds interfaces from assignments
//! and actions; declared interfaces and unions come straight from the
//! grammar text. Both are merged (declared wins on name clashes) and
//! finalized into a consistent hierarchy with container information
//! and a reflection table. The validator separately cross-checks
//! inferred against declared shapes.

mod container;
mod declared;
mod infer;
mod printer;
mod reflection;
mod sort;
mod validator;

#[cfg(test)]
mod infer_tests;

pub use declared::collect_declared_types;
pub use infer::collect_inferred_types;
pub use printer::print_ast_types;
pub use reflection::Reflection;
pub use sort::sort_interfaces_topologically;
pub use validator::{validate_types, TypeConflict};

use gramarye_core::grammar::Grammar;
use gramarye_core::types::AstTypes;
use indexmap::IndexSet;

use crate::Result;

/// Collects the complete type schema: inferred types overridden by
/// declared ones, hierarchy edges wired both ways, interfaces in
/// topological order and container types computed.
pub fn collect_ast_types(grammar: &Grammar) -> Result<AstTypes> {
    let inferred = collect_inferred_types(grammar);
    let declared = collect_declared_types(grammar);

    let mut types = inferred;
    for (name, interface) in declared.interfaces {
        types.unions.shift_remove(&name);
        types.interfaces.insert(name, interface);
    }
    for (name, union) in declared.unions {
        types.interfaces.shift_remove(&name);
        types.unions.insert(name, union);
    }

    finalize(&mut types)?;
    Ok(types)
}

fn finalize(types: &mut AstTypes) -> Result<()> {
    // Union alternatives over known type names are subtype edges.
    let union_edges: Vec<(String, String)> = types
        .unions
        .values()
        .flat_map(|union| {
            let name = union.name.clone();
            union
                .alternatives
                .iter()
                .filter(|alt| !alt.reference && !alt.array)
                .flat_map(|alt| alt.types.clone())
                .filter(|member| types.contains(member))
                .map(move |member| (name.clone(), member))
        })
        .collect();
    for (union, member) in union_edges {
        if let Some(interface) = types.interfaces.get_mut(&member) {
            interface.super_types.insert(union.clone());
        } else if let Some(inner) = types.unions.get_mut(&member) {
            inner.super_types.insert(union.clone());
        }
        types
            .unions
            .get_mut(&union)
            .expect("edge source exists")
            .sub_types
            .insert(member);
    }

    // Mirror supertype edges as subtype edges.
    let super_edges: Vec<(String, String)> = types
        .interfaces
        .values()
        .map(|i| (i.name.clone(), &i.super_types))
        .chain(types.unions.values().map(|u| (u.name.clone(), &u.super_types)))
        .flat_map(|(name, supers)| supers.iter().map(move |s| (s.clone(), name.clone())))
        .collect();
    for (parent, child) in super_edges {
        if let Some(interface) = types.interfaces.get_mut(&parent) {
            interface.sub_types.insert(child);
        } else if let Some(union) = types.unions.get_mut(&parent) {
            union.sub_types.insert(child);
        }
    }

    // Supertype sets become transitive closures.
    let names: Vec<String> = types.interfaces.keys().cloned().collect();
    for name in &names {
        let closure = types.super_types_of(name);
        types.interfaces.get_mut(name).expect("known name").super_types = closure;
    }
    let union_names: Vec<String> = types.unions.keys().cloned().collect();
    for name in &union_names {
        let closure = types.super_types_of(name);
        types.unions.get_mut(name).expect("known name").super_types = closure;
    }

    // Converted and declared unions are not printable supertypes.
    let union_set: IndexSet<String> = types.unions.keys().cloned().collect();
    for interface in types.interfaces.values_mut() {
        interface.printable_super_types = interface
            .super_types
            .iter()
            .filter(|s| !union_set.contains(*s))
            .cloned()
            .collect();
    }

    sort::sort_interfaces_topologically(types)?;
    types.unions.sort_keys();
    container::add_container_types(types);
    Ok(())
}
