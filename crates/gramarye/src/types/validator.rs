//! Consistency checks between inferred and declared types.
//!
//! Never fatal: every finding is a [`TypeConflict`] tied to the type it
//! concerns. The messages follow a fixed decision table so the same
//! mismatch always reads the same way.

use gramarye_core::grammar::{Grammar, Rule};
use gramarye_core::types::{distinct_and_sorted, AstTypes, Property, PropertyType};
use indexmap::{IndexMap, IndexSet};

use crate::types::{collect_declared_types, collect_inferred_types};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TypeConflict {
    pub type_name: String,
    pub message: String,
}

pub fn validate_types(grammar: &Grammar) -> Vec<TypeConflict> {
    let inferred = collect_inferred_types(grammar);
    let declared = collect_declared_types(grammar);
    let mut conflicts = Vec::new();

    for interface in declared.interfaces.values() {
        check_declared_interface(interface, &declared, &mut conflicts);
    }

    let declared_names: Vec<&String> = declared
        .interfaces
        .keys()
        .chain(declared.unions.keys())
        .collect();
    for name in declared_names {
        let inferred_interface = inferred.interfaces.get(name);
        let inferred_union = inferred.unions.get(name);
        let declared_interface = declared.interfaces.get(name);
        let declared_union = declared.unions.get(name);

        match (
            inferred_interface,
            inferred_union,
            declared_interface,
            declared_union,
        ) {
            (Some(inf), None, Some(dec), None) => {
                let inferred_props = all_super_properties(inf.name.as_str(), &inferred);
                let declared_props = all_super_properties(dec.name.as_str(), &declared);
                check_properties(
                    grammar,
                    name,
                    &inferred_props,
                    &declared_props,
                    &mut conflicts,
                );
            }
            (None, Some(inf), None, Some(dec)) => {
                for error in alternative_errors(&inf.alternatives, &dec.alternatives) {
                    conflicts.push(TypeConflict {
                        type_name: name.clone(),
                        message: format!(
                            "A type '{}' {} in a rule that returns type '{name}'.",
                            error.type_string, error.message
                        ),
                    });
                }
            }
            (None, None, _, _) => {}
            _ => conflicts.push(TypeConflict {
                type_name: name.clone(),
                message: format!(
                    "Inferred and declared versions of type {name} both have to be interfaces or unions."
                ),
            }),
        }
    }
    conflicts
}

fn check_declared_interface(
    interface: &gramarye_core::types::InterfaceType,
    declared: &AstTypes,
    conflicts: &mut Vec<TypeConflict>,
) {
    let supers: Vec<&String> = interface.super_types.iter().collect();
    for (i, outer) in supers.iter().enumerate() {
        for inner in &supers[i + 1..] {
            let outer_props = all_super_properties(outer, declared);
            let inner_props = all_super_properties(inner, declared);
            let non_identical: Vec<String> = outer_props
                .iter()
                .filter(|(name, prop)| {
                    inner_props
                        .get(*name)
                        .is_some_and(|other| !identical_properties(prop, other))
                })
                .map(|(name, _)| format!("'{name}'"))
                .collect();
            if !non_identical.is_empty() {
                conflicts.push(TypeConflict {
                    type_name: interface.name.clone(),
                    message: format!(
                        "Cannot simultaneously inherit from '{outer}' and '{inner}'. Their {} properties are not identical.",
                        non_identical.join(", ")
                    ),
                });
            }
        }
    }

    let mut inherited = IndexSet::new();
    for super_type in &interface.super_types {
        inherited.extend(all_super_properties(super_type, declared).into_keys());
    }
    for property in &interface.properties {
        if inherited.contains(&property.name) {
            conflicts.push(TypeConflict {
                type_name: interface.name.clone(),
                message: format!(
                    "Cannot redeclare property '{}'. It is already inherited from another interface.",
                    property.name
                ),
            });
        }
    }
}

fn check_properties(
    grammar: &Grammar,
    type_name: &str,
    inferred: &IndexMap<String, Property>,
    declared: &IndexMap<String, Property>,
    conflicts: &mut Vec<TypeConflict>,
) {
    for (name, found) in inferred {
        let Some(expected) = declared.get(name) else {
            conflicts.push(TypeConflict {
                type_name: type_name.to_string(),
                message: format!("A property '{name}' is not expected."),
            });
            continue;
        };
        if found.canonical() != expected.canonical() {
            let errors = alternative_errors(&found.alternatives, &expected.alternatives);
            if !errors.is_empty() {
                let mut message = format!(
                    "The assigned type '{}' is not compatible with the declared property '{name}' of type '{}'.",
                    found.canonical(),
                    expected.canonical()
                );
                for error in &errors {
                    message.push_str(&format!(" '{}' {};", error.type_string, error.message));
                }
                if message.ends_with(';') {
                    message.pop();
                    message.push('.');
                }
                conflicts.push(TypeConflict {
                    type_name: type_name.to_string(),
                    message,
                });
            }
        }
        let array_only = |p: &Property| p.alternatives.len() == 1 && p.alternatives[0].array;
        if !array_only(found) && !array_only(expected) && !expected.optional && found.optional {
            for rule_name in rules_missing_assignment(grammar, type_name, name) {
                conflicts.push(TypeConflict {
                    type_name: type_name.to_string(),
                    message: format!(
                        "Property '{name}' is missing in rule '{rule_name}', but is required in type '{type_name}'."
                    ),
                });
            }
        }
    }
    for (name, expected) in declared {
        if !inferred.contains_key(name) && !expected.optional {
            conflicts.push(TypeConflict {
                type_name: type_name.to_string(),
                message: format!(
                    "A property '{name}' is expected in a rule that returns type '{type_name}'."
                ),
            });
        }
    }
}

/// Rules producing `type_name` whose bodies never assign `property`.
fn rules_missing_assignment(grammar: &Grammar, type_name: &str, property: &str) -> Vec<String> {
    grammar
        .parser_rules()
        .filter(|rule| {
            !rule.fragment
                && grammar.rule_value_type(&Rule::Parser((*rule).clone())) == type_name
                && !Grammar::extract_assignments(&rule.body)
                    .iter()
                    .any(|(feature, _)| *feature == property)
        })
        .map(|rule| rule.name.clone())
        .collect()
}

/// Own plus inherited properties, nearest definition first.
fn all_super_properties(name: &str, types: &AstTypes) -> IndexMap<String, Property> {
    let mut result = IndexMap::new();
    let mut visited = IndexSet::new();
    collect_properties(name, types, &mut result, &mut visited);
    result
}

fn collect_properties(
    name: &str,
    types: &AstTypes,
    result: &mut IndexMap<String, Property>,
    visited: &mut IndexSet<String>,
) {
    if !visited.insert(name.to_string()) {
        return;
    }
    let Some(interface) = types.interfaces.get(name) else {
        return;
    };
    for property in &interface.properties {
        result
            .entry(property.name.clone())
            .or_insert_with(|| property.clone());
    }
    for super_type in &interface.super_types {
        collect_properties(super_type, types, result, visited);
    }
}

fn identical_properties(a: &Property, b: &Property) -> bool {
    a.optional == b.optional
        && a.alternatives.len() == b.alternatives.len()
        && a.alternatives
            .iter()
            .all(|alt| b.alternatives.iter().any(|other| other.same_shape(alt)))
}

struct AlternativeError {
    type_string: String,
    message: &'static str,
}

/// Compares inferred against declared alternatives by their canonical
/// member lists, reporting extras and array/reference flag mismatches.
fn alternative_errors(
    found: &[PropertyType],
    expected: &[PropertyType],
) -> Vec<AlternativeError> {
    let by_members = |list: &[PropertyType]| -> IndexMap<String, PropertyType> {
        list.iter()
            .map(|t| {
                (
                    distinct_and_sorted(t.types.iter().map(String::as_str)).join(" | "),
                    t.clone(),
                )
            })
            .collect()
    };
    let found_map = by_members(found);
    let expected_map = by_members(expected);

    let mut errors = Vec::new();
    for (type_string, found_type) in &found_map {
        match expected_map.get(type_string) {
            None => errors.push(AlternativeError {
                type_string: type_string.clone(),
                message: "is not expected",
            }),
            Some(expected_type)
                if expected_type.array != found_type.array
                    || expected_type.reference != found_type.reference =>
            {
                errors.push(AlternativeError {
                    type_string: type_string.clone(),
                    message: flag_error(found_type, expected_type),
                });
            }
            Some(_) => {}
        }
    }
    errors
}

fn flag_error(found: &PropertyType, expected: &PropertyType) -> &'static str {
    match (
        found.array,
        expected.array,
        found.reference,
        expected.reference,
    ) {
        (true, false, true, false) => "can't be an array and a reference",
        (false, true, false, true) => "has to be an array and a reference",
        (true, false, _, _) => "can't be an array",
        (false, true, _, _) => "has to be an array",
        (_, _, true, false) => "can't be a reference",
        (_, _, false, true) => "has to be a reference",
        _ => "",
    }
}
