use crate::types::*;

#[test]
fn canonical_sorts_and_dedups_members() {
    let ty = PropertyType::new(
        vec!["B".to_string(), "A".to_string(), "B".to_string()],
        false,
        false,
    );
    assert_eq!(ty.canonical(), "A | B");
}

#[test]
fn canonical_wraps_reference_and_array() {
    let reference = PropertyType::new(vec!["Decl".to_string()], true, false);
    assert_eq!(reference.canonical(), "@Decl");

    let array = PropertyType::new(vec!["Stmt".to_string()], false, true);
    assert_eq!(array.canonical(), "Stmt[]");

    let both = PropertyType::new(vec!["Decl".to_string()], true, true);
    assert_eq!(both.canonical(), "@Decl[]");

    let multi = PropertyType::new(vec!["B".to_string(), "A".to_string()], false, true);
    assert_eq!(multi.canonical(), "(A | B)[]");

    let multi_ref = PropertyType::new(vec!["B".to_string(), "A".to_string()], true, false);
    assert_eq!(multi_ref.canonical(), "@(A | B)");
}

#[test]
fn same_shape_ignores_member_order() {
    let a = PropertyType::new(vec!["X".to_string(), "Y".to_string()], false, false);
    let b = PropertyType::new(vec!["Y".to_string(), "X".to_string()], false, false);
    assert!(a.same_shape(&b));

    let c = PropertyType::new(vec!["X".to_string(), "Y".to_string()], false, true);
    assert!(!a.same_shape(&c));
}

#[test]
fn to_property_type_splits_plain_unions() {
    // Plain assignment of A|B yields two alternatives.
    let plain = to_property_type(false, false, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(plain.len(), 2);

    // Arrays and references keep the whole set in one alternative.
    let array = to_property_type(true, false, vec!["A".to_string(), "B".to_string()]);
    assert_eq!(array.len(), 1);
    assert_eq!(array[0].canonical(), "(A | B)[]");

    let reference = to_property_type(false, true, vec!["A".to_string()]);
    assert_eq!(reference.len(), 1);
    assert!(reference[0].reference);
}

#[test]
fn all_properties_deduplicates_inherited() {
    let mut types = AstTypes::default();

    let mut base = InterfaceType::new("Base");
    base.properties = vec![
        Property::new("name", false, vec![PropertyType::plain("string")]),
        Property::new("doc", true, vec![PropertyType::plain("string")]),
    ];
    types.interfaces.insert("Base".to_string(), base);

    let mut derived = InterfaceType::new("Derived");
    derived.super_types.insert("Base".to_string());
    // Shadows the inherited `name`.
    derived.properties = vec![Property::new(
        "name",
        false,
        vec![PropertyType::plain("string")],
    )];
    types.interfaces.insert("Derived".to_string(), derived);

    let derived = &types.interfaces["Derived"];
    let all: Vec<_> = derived
        .all_properties(&types)
        .into_iter()
        .map(|p| p.name.clone())
        .collect();
    assert_eq!(all, vec!["name".to_string(), "doc".to_string()]);
}

#[test]
fn super_types_of_is_transitive() {
    let mut types = AstTypes::default();
    let mut a = InterfaceType::new("A");
    a.super_types.insert("B".to_string());
    types.interfaces.insert("A".to_string(), a);
    let mut b = InterfaceType::new("B");
    b.super_types.insert("C".to_string());
    types.interfaces.insert("B".to_string(), b);
    types.interfaces.insert("C".to_string(), InterfaceType::new("C"));

    let supers = types.super_types_of("A");
    assert!(supers.contains("B"));
    assert!(supers.contains("C"));
    assert!(!supers.contains("A"));
}
