//! Conversion of explicitly declared interfaces and unions into the
//! type model.

use gramarye_core::grammar::{AtomKind, AtomType, Grammar};
use gramarye_core::types::{AstTypes, InterfaceType, Property, PropertyType, UnionType};

pub fn collect_declared_types(grammar: &Grammar) -> AstTypes {
    let mut types = AstTypes::default();

    for decl in &grammar.interfaces {
        let mut interface = InterfaceType::new(decl.name.clone());
        interface.declared = true;
        interface.super_types = decl.super_types.iter().cloned().collect();
        interface.printable_super_types = decl.super_types.clone();
        interface.properties = decl
            .attributes
            .iter()
            .map(|attribute| {
                Property::new(
                    attribute.name.clone(),
                    attribute.optional,
                    attribute.types.iter().map(atom_to_property_type).collect(),
                )
            })
            .collect();
        types.interfaces.insert(decl.name.clone(), interface);
    }

    for decl in &grammar.unions {
        let mut union = UnionType::new(
            decl.name.clone(),
            decl.alternatives.iter().map(atom_to_property_type).collect(),
        );
        union.declared = true;
        // A union over other AST types groups them for runtime type
        // tests; a union of primitives and literals is a plain alias.
        union.reflection = decl
            .alternatives
            .iter()
            .any(|atom| matches!(atom.kind, AtomKind::TypeRef(_)));
        types.unions.insert(decl.name.clone(), union);
    }

    types
}

fn atom_to_property_type(atom: &AtomType) -> PropertyType {
    let name = match &atom.kind {
        AtomKind::Primitive(p) => p.clone(),
        AtomKind::Literal(value) => format!("'{value}'"),
        AtomKind::TypeRef(name) => name.clone(),
    };
    PropertyType::new(vec![name], atom.is_ref, atom.is_array)
}
