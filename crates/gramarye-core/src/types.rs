//! The AST type model: interfaces, unions and their properties.
//!
//! Produced by type collection from a grammar, consumed by the validator,
//! the reflection table and the type listing printer.

use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// One alternative a property value may take.
///
/// `types` holds plain type names; rendering and comparison always go
/// through the sorted, deduplicated canonical form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyType {
    pub types: Vec<String>,
    pub reference: bool,
    pub array: bool,
}

impl PropertyType {
    pub fn new(types: Vec<String>, reference: bool, array: bool) -> Self {
        PropertyType {
            types,
            reference,
            array,
        }
    }

    pub fn plain(name: impl Into<String>) -> Self {
        PropertyType::new(vec![name.into()], false, false)
    }

    /// Sorted, deduplicated member names.
    pub fn sorted_types(&self) -> Vec<&str> {
        distinct_and_sorted(self.types.iter().map(String::as_str))
    }

    /// Canonical rendering: sorted members joined by `|`, wrapped in
    /// `@` for references and `[]` for arrays. Multi-member sets are
    /// parenthesized before wrapping.
    pub fn canonical(&self) -> String {
        let members = self.sorted_types();
        let mut inner = members.join(" | ");
        if (self.reference || self.array) && members.len() > 1 {
            inner = format!("({inner})");
        }
        if self.reference {
            inner = format!("@{inner}");
        }
        if self.array {
            inner = format!("{inner}[]");
        }
        inner
    }

    /// Structural equality: same array/reference flags and the same set
    /// of member names, order-insensitively.
    pub fn same_shape(&self, other: &PropertyType) -> bool {
        self.array == other.array
            && self.reference == other.reference
            && self.sorted_types() == other.sorted_types()
    }
}

impl fmt::Display for PropertyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonical())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub optional: bool,
    pub alternatives: Vec<PropertyType>,
}

impl Property {
    pub fn new(name: impl Into<String>, optional: bool, alternatives: Vec<PropertyType>) -> Self {
        Property {
            name: name.into(),
            optional,
            alternatives,
        }
    }

    pub fn canonical(&self) -> String {
        let alts = distinct_and_sorted(self.alternatives.iter().map(PropertyType::canonical));
        alts.join(" | ")
    }

    pub fn same_shape(&self, other: &Property) -> bool {
        self.name == other.name && self.canonical() == other.canonical()
    }
}

/// An object type with named properties, plus its place in the hierarchy.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InterfaceType {
    pub name: String,
    /// Transitive supertype closure.
    pub super_types: IndexSet<String>,
    /// Direct supertypes as written or inferred, used for display.
    pub printable_super_types: Vec<String>,
    pub sub_types: IndexSet<String>,
    /// Interfaces whose properties may hold this type, so whose instances
    /// may appear as its container.
    pub container_types: IndexSet<String>,
    /// Whether the type was declared explicitly rather than inferred.
    pub declared: bool,
    pub properties: Vec<Property>,
}

impl InterfaceType {
    pub fn new(name: impl Into<String>) -> Self {
        InterfaceType {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Own properties plus those inherited from `super_types`, own first.
    pub fn all_properties<'a>(&'a self, types: &'a AstTypes) -> Vec<&'a Property> {
        let mut seen = IndexSet::new();
        let mut result = Vec::new();
        for prop in &self.properties {
            if seen.insert(prop.name.as_str()) {
                result.push(prop);
            }
        }
        for super_name in &self.super_types {
            if let Some(parent) = types.interfaces.get(super_name) {
                for prop in &parent.properties {
                    if seen.insert(prop.name.as_str()) {
                        result.push(prop);
                    }
                }
            }
        }
        result
    }
}

/// A named alternative over other types, possibly a pure reflection
/// union synthesized from a supertype with no properties of its own.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UnionType {
    pub name: String,
    pub alternatives: Vec<PropertyType>,
    /// True when the union only exists to group subtypes for reflection.
    pub reflection: bool,
    pub super_types: IndexSet<String>,
    pub sub_types: IndexSet<String>,
    pub container_types: IndexSet<String>,
    pub declared: bool,
}

impl UnionType {
    pub fn new(name: impl Into<String>, alternatives: Vec<PropertyType>) -> Self {
        UnionType {
            name: name.into(),
            alternatives,
            ..Default::default()
        }
    }

    pub fn canonical(&self) -> String {
        let alts = distinct_and_sorted(self.alternatives.iter().map(PropertyType::canonical));
        alts.join(" | ")
    }
}

/// The full collected type schema of a grammar.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AstTypes {
    pub interfaces: IndexMap<String, InterfaceType>,
    pub unions: IndexMap<String, UnionType>,
}

impl AstTypes {
    pub fn contains(&self, name: &str) -> bool {
        self.interfaces.contains_key(name) || self.unions.contains_key(name)
    }

    /// Transitive supertype closure of a named type, not including itself.
    pub fn super_types_of(&self, name: &str) -> IndexSet<String> {
        let mut result = IndexSet::new();
        let mut queue = vec![name.to_string()];
        while let Some(current) = queue.pop() {
            let supers = if let Some(i) = self.interfaces.get(&current) {
                &i.super_types
            } else if let Some(u) = self.unions.get(&current) {
                &u.super_types
            } else {
                continue;
            };
            for s in supers {
                if result.insert(s.clone()) {
                    queue.push(s.clone());
                }
            }
        }
        result
    }
}

/// Builds the property-type alternatives for an assignment or attribute.
///
/// Arrays and references keep all member names in a single alternative;
/// otherwise each name becomes its own alternative.
pub fn to_property_type(array: bool, reference: bool, types: Vec<String>) -> Vec<PropertyType> {
    if array || reference {
        vec![PropertyType::new(types, reference, array)]
    } else {
        types
            .into_iter()
            .map(|t| PropertyType::new(vec![t], false, false))
            .collect()
    }
}

pub fn distinct_and_sorted<T: Ord>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut result: Vec<T> = items.into_iter().collect();
    result.sort();
    result.dedup();
    result
}
