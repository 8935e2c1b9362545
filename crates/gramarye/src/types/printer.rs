//! Renders a collected type schema as a stable, human-readable listing.

use std::fmt::Write;

use gramarye_core::types::AstTypes;

/// Interfaces in their topological order, then unions alphabetically.
pub fn print_ast_types(types: &AstTypes) -> String {
    let mut out = String::new();
    for interface in types.interfaces.values() {
        let _ = write!(out, "interface {}", interface.name);
        if !interface.printable_super_types.is_empty() {
            let mut supers = interface.printable_super_types.clone();
            supers.sort();
            let _ = write!(out, " extends {}", supers.join(", "));
        }
        if interface.properties.is_empty() {
            out.push_str(" {}\n");
            continue;
        }
        out.push_str(" {\n");
        for property in &interface.properties {
            let marker = if property.optional { "?" } else { "" };
            let _ = writeln!(out, "    {}{}: {}", property.name, marker, property.canonical());
        }
        out.push_str("}\n");
    }
    for union in types.unions.values() {
        let _ = writeln!(out, "type {} = {};", union.name, union.canonical());
    }
    out
}
