//! Type inference over parser rule bodies.
//!
//! Every rule grows a part graph: alternatives split the current part,
//! groups thread through it, actions start a new named part. Walking
//! all root-to-leaf paths yields the type branches, which are flattened
//! by name into interfaces. Unassigned rule calls become subtype edges,
//! and property-less supertypes collapse into synthetic unions.

use gramarye_core::grammar::{Grammar, GrammarExpr, Operator, ParserRule, Rule};
use gramarye_core::types::{
    to_property_type, AstTypes, InterfaceType, Property, PropertyType, UnionType,
};
use indexmap::{IndexMap, IndexSet};

type PartId = usize;

#[derive(Debug, Default)]
struct TypePart {
    name: Option<String>,
    properties: Vec<Property>,
    rule_calls: Vec<String>,
    parents: Vec<PartId>,
    children: Vec<PartId>,
    action_with_assignment: bool,
}

#[derive(Debug, Clone)]
struct TypeBranch {
    name: String,
    supers: Vec<String>,
    properties: Vec<Property>,
    rule_calls: Vec<String>,
}

#[derive(Debug, Clone)]
struct TypePath {
    branch: TypeBranch,
    next: Vec<PartId>,
}

pub fn collect_inferred_types(grammar: &Grammar) -> AstTypes {
    let mut inference = Inference {
        grammar,
        fragments: IndexMap::new(),
    };

    let mut all_paths = Vec::new();
    let mut datatype_rules = Vec::new();
    for rule in grammar.parser_rules() {
        if rule.fragment {
            continue;
        }
        if grammar.is_data_type_rule(rule) {
            datatype_rules.push(rule);
        } else {
            all_paths.extend(inference.rule_types(rule));
        }
    }

    let interfaces = calculate_interfaces(all_paths);
    let unions = build_super_unions(&interfaces);
    let mut types = extract_unions(interfaces, unions);

    for rule in datatype_rules {
        let alternatives = datatype_alternatives(rule);
        types.unions.insert(
            rule.name.clone(),
            UnionType::new(rule.name.clone(), to_property_type(false, false, alternatives)),
        );
    }
    types
}

/// A datatype rule of pure keyword alternatives becomes a union of
/// string literals; anything else aliases its declared primitive.
fn datatype_alternatives(rule: &ParserRule) -> Vec<String> {
    if let GrammarExpr::Alternatives { elements, .. } = &rule.body {
        let keywords: Vec<String> = elements
            .iter()
            .filter_map(|e| match e {
                GrammarExpr::Keyword { value, .. } => Some(format!("'{value}'")),
                _ => None,
            })
            .collect();
        if keywords.len() == elements.len() {
            return keywords;
        }
    }
    vec![rule.returns.clone().unwrap_or_else(|| "string".to_string())]
}

struct Inference<'g> {
    grammar: &'g Grammar,
    /// Memoized fragment properties, keyed by rule name. An entry is
    /// inserted before recursing so fragment cycles terminate.
    fragments: IndexMap<String, Vec<Property>>,
}

impl Inference<'_> {
    fn rule_types(&mut self, rule: &ParserRule) -> Vec<TypePath> {
        let type_name = if rule.fragment {
            rule.name.clone()
        } else {
            rule.returns.clone().unwrap_or_else(|| rule.name.clone())
        };
        let mut graph = TypeGraph::new(type_name);
        let root = graph.root;
        graph.collect_element(self, root, &rule.body);
        graph.into_paths()
    }

    fn fragment_properties(&mut self, name: &str) -> Vec<Property> {
        if let Some(existing) = self.fragments.get(name) {
            return existing.clone();
        }
        self.fragments.insert(name.to_string(), Vec::new());
        let Some(rule) = self.grammar.parser_rule(name) else {
            return Vec::new();
        };
        let rule = rule.clone();
        let paths = self.rule_types(&rule);
        let properties: Vec<Property> = paths
            .into_iter()
            .filter(|p| p.branch.name == name)
            .flat_map(|p| p.branch.properties)
            .collect();
        self.fragments.insert(name.to_string(), properties.clone());
        properties
    }
}

struct TypeGraph {
    parts: Vec<TypePart>,
    root: PartId,
}

impl TypeGraph {
    fn new(root_name: String) -> Self {
        let root_part = TypePart {
            name: Some(root_name),
            ..Default::default()
        };
        TypeGraph {
            parts: vec![root_part],
            root: 0,
        }
    }

    fn new_part(&mut self, name: Option<String>) -> PartId {
        self.parts.push(TypePart {
            name,
            ..Default::default()
        });
        self.parts.len() - 1
    }

    fn connect(&mut self, parent: PartId, child: PartId) -> PartId {
        self.parts[child].parents.push(parent);
        self.parts[parent].children.push(child);
        child
    }

    fn merge(&mut self, parts: Vec<PartId>) -> PartId {
        if parts.len() == 1 {
            return parts[0];
        }
        let node = self.new_part(None);
        self.parts[node].parents = parts.clone();
        for parent in parts {
            self.parts[parent].children.push(node);
        }
        node
    }

    fn collect_element(
        &mut self,
        inference: &mut Inference<'_>,
        current: PartId,
        element: &GrammarExpr,
    ) -> PartId {
        let optional = element.cardinality().is_optional();
        match element {
            GrammarExpr::Alternatives { elements, .. } => {
                let mut children = Vec::new();
                if optional {
                    let empty = self.new_part(None);
                    children.push(self.connect(current, empty));
                }
                for alt in elements {
                    let part = self.new_part(None);
                    let alt_part = self.connect(current, part);
                    children.push(self.collect_element(inference, alt_part, alt));
                }
                self.merge(children)
            }
            GrammarExpr::Group { elements, .. } | GrammarExpr::UnorderedGroup { elements, .. } => {
                let part = self.new_part(None);
                let mut group = self.connect(current, part);
                for item in elements {
                    group = self.collect_element(inference, group, item);
                }
                if optional {
                    let part = self.new_part(None);
                    let skip = self.connect(current, part);
                    self.merge(vec![skip, group])
                } else {
                    group
                }
            }
            GrammarExpr::Action {
                type_name,
                feature,
                operator,
            } => self.add_action(type_name, feature.as_deref(), *operator, current),
            GrammarExpr::Assignment { .. } => {
                self.add_assignment(inference.grammar, current, element);
                current
            }
            GrammarExpr::RuleCall { rule, .. } => {
                self.add_rule_call(inference, current, rule, optional);
                current
            }
            _ => current,
        }
    }

    fn add_action(
        &mut self,
        type_name: &str,
        feature: Option<&str>,
        operator: Option<Operator>,
        parent: PartId,
    ) -> PartId {
        let part = self.new_part(Some(type_name.to_string()));
        let type_node = self.connect(parent, part);

        if let (Some(feature), Some(operator)) = (feature, operator) {
            self.parts[type_node].action_with_assignment = true;
            let root_rule_calls = self.parts[self.root].rule_calls.clone();
            let types = if root_rule_calls.is_empty() {
                self.super_types_of(type_node)
            } else {
                root_rule_calls
            };
            let alternatives = to_property_type(operator == Operator::Append, false, types);
            self.parts[type_node].properties.push(Property::new(
                feature,
                false,
                alternatives,
            ));
        }
        type_node
    }

    fn add_assignment(&mut self, grammar: &Grammar, current: PartId, element: &GrammarExpr) {
        let GrammarExpr::Assignment {
            feature,
            operator,
            terminal,
            cardinality,
        } = element
        else {
            return;
        };
        let mut types = IndexSet::new();
        let mut reference = false;
        find_types(grammar, terminal, &mut types, &mut reference);

        let member_types = if *operator == Operator::Flag {
            vec!["boolean".to_string()]
        } else {
            types.into_iter().collect()
        };
        let alternatives =
            to_property_type(*operator == Operator::Append, reference, member_types);
        self.parts[current].properties.push(Property::new(
            feature.clone(),
            cardinality.is_optional(),
            alternatives,
        ));
    }

    fn add_rule_call(
        &mut self,
        inference: &mut Inference<'_>,
        current: PartId,
        rule_name: &str,
        optional: bool,
    ) {
        match inference.grammar.parser_rule(rule_name) {
            Some(rule) if rule.fragment => {
                let mut properties = inference.fragment_properties(rule_name);
                if optional {
                    for property in &mut properties {
                        property.optional = true;
                    }
                }
                self.parts[current].properties.extend(properties);
            }
            Some(rule) => {
                let called = inference
                    .grammar
                    .rule_value_type(&Rule::Parser(rule.clone()));
                self.parts[current].rule_calls.push(called);
            }
            None => {}
        }
    }

    /// Walks up to named ancestors; unassigned rule calls short-circuit
    /// as supertypes.
    fn super_types_of(&self, node: PartId) -> Vec<String> {
        let mut set = IndexSet::new();
        self.collect_super_types(node, node, &mut set);
        set.into_iter().collect()
    }

    fn collect_super_types(&self, original: PartId, part: PartId, set: &mut IndexSet<String>) {
        if !self.parts[part].rule_calls.is_empty() {
            for rule_call in &self.parts[part].rule_calls {
                set.insert(rule_call.clone());
            }
            return;
        }
        for &parent in &self.parts[part].parents {
            if self.parts[original].name.is_none() {
                self.collect_super_types(parent, parent, set);
            } else if self.parts[parent].name.is_some()
                && self.parts[parent].name != self.parts[original].name
            {
                set.insert(self.parts[parent].name.clone().expect("checked above"));
            } else {
                self.collect_super_types(original, parent, set);
            }
        }
        if self.parts[part].parents.is_empty()
            && let Some(name) = &self.parts[part].name
        {
            set.insert(name.clone());
        }
    }

    fn into_paths(self) -> Vec<TypePath> {
        let root = &self.parts[self.root];
        let root_branch = TypeBranch {
            name: root.name.clone().expect("root is named"),
            supers: Vec::new(),
            properties: root.properties.clone(),
            rule_calls: root.rule_calls.clone(),
        };
        if root.children.is_empty() {
            vec![TypePath {
                branch: root_branch,
                next: Vec::new(),
            }]
        } else {
            let next = root.children.clone();
            self.apply_next(TypePath {
                branch: root_branch,
                next,
            })
        }
    }

    fn apply_next(&self, path: TypePath) -> Vec<TypePath> {
        let root_name = self.parts[self.root].name.clone().expect("root is named");
        let mut paths = Vec::new();
        for &part_id in &path.next {
            let part = &self.parts[part_id];
            let mut split = path.branch.clone();
            if part.action_with_assignment {
                // The following parts belong to a new inferred type; the
                // branch so far stands on its own.
                paths.push(TypePath {
                    branch: split.clone(),
                    next: Vec::new(),
                });
            }
            if let Some(part_name) = &part.name
                && *part_name != split.name
            {
                if part.action_with_assignment {
                    split.properties = Vec::new();
                    split.rule_calls = Vec::new();
                    split.supers = vec![root_name.clone()];
                    split.name = part_name.clone();
                } else {
                    let mut supers = vec![split.name.clone()];
                    supers.extend(split.rule_calls.iter().cloned());
                    split.supers = supers;
                    split.properties = Vec::new();
                    split.rule_calls = Vec::new();
                    split.name = part_name.clone();
                }
            }
            split.properties.extend(part.properties.iter().cloned());
            split.rule_calls.extend(part.rule_calls.iter().cloned());
            let next_path = TypePath {
                branch: split,
                next: part.children.clone(),
            };
            if next_path.next.is_empty() {
                let mut done = next_path;
                let name = done.branch.name.clone();
                done.branch.supers.retain(|s| *s != name);
                paths.push(done);
            } else {
                paths.extend(self.apply_next(next_path));
            }
        }
        flatten_types(paths)
    }
}

fn find_types(
    grammar: &Grammar,
    terminal: &GrammarExpr,
    types: &mut IndexSet<String>,
    reference: &mut bool,
) {
    match terminal {
        GrammarExpr::Alternatives { elements, .. }
        | GrammarExpr::Group { elements, .. }
        | GrammarExpr::UnorderedGroup { elements, .. } => {
            for element in elements {
                find_types(grammar, element, types, reference);
            }
        }
        GrammarExpr::Keyword { value, .. } => {
            types.insert(format!("'{value}'"));
        }
        GrammarExpr::RuleCall { rule, .. } => {
            if let Some(parser) = grammar.parser_rule(rule) {
                types.insert(grammar.rule_value_type(&Rule::Parser(parser.clone())));
            } else if let Some(terminal) = grammar.terminal_rule(rule) {
                types.insert(grammar.rule_value_type(&Rule::Terminal(terminal.clone())));
            }
        }
        GrammarExpr::CrossReference { target_type, .. } => {
            types.insert(target_type.clone());
            *reference = true;
        }
        _ => {}
    }
}

/// Merges branches by name: properties union, a property absent from a
/// branch without rule calls becomes optional.
fn flatten_types(paths: Vec<TypePath>) -> Vec<TypePath> {
    let mut by_name: IndexMap<String, Vec<TypePath>> = IndexMap::new();
    for path in paths {
        by_name.entry(path.branch.name.clone()).or_default().push(path);
    }

    let mut result = Vec::new();
    for (name, named_paths) in by_name {
        let mut properties: Vec<Property> = Vec::new();
        let mut supers = Vec::new();
        let mut next = Vec::new();
        let mut rule_calls = IndexSet::new();
        for path in &named_paths {
            supers.extend(path.branch.supers.iter().cloned());
            next.extend(path.next.iter().copied());
            for property in &path.branch.properties {
                if let Some(existing) = properties.iter_mut().find(|p| p.name == property.name) {
                    for alternative in &property.alternatives {
                        if !existing
                            .alternatives
                            .iter()
                            .any(|e| e.same_shape(alternative))
                        {
                            existing.alternatives.push(alternative.clone());
                        }
                    }
                } else {
                    properties.push(property.clone());
                }
            }
            for rule_call in &path.branch.rule_calls {
                rule_calls.insert(rule_call.clone());
            }
        }
        for path in &named_paths {
            // A branch that is just an unassigned rule call is not a
            // real member of the type; its missing properties do not
            // make anything optional.
            if path.branch.rule_calls.is_empty() {
                for property in &mut properties {
                    if !path.branch.properties.iter().any(|p| p.name == property.name) {
                        property.optional = true;
                    }
                }
            }
        }
        result.push(TypePath {
            branch: TypeBranch {
                name,
                supers,
                properties,
                rule_calls: rule_calls.into_iter().collect(),
            },
            next,
        });
    }
    result
}

fn calculate_interfaces(paths: Vec<TypePath>) -> IndexMap<String, InterfaceType> {
    let mut interfaces: IndexMap<String, InterfaceType> = IndexMap::new();
    let mut rule_call_branches: Vec<TypeBranch> = Vec::new();

    for path in flatten_types(paths) {
        let branch = path.branch;
        let mut interface = InterfaceType::new(branch.name.clone());
        interface.super_types = branch.supers.iter().cloned().collect();
        interface.properties = branch.properties.clone();
        for rule_call in &branch.rule_calls {
            if *rule_call != interface.name {
                interface.sub_types.insert(rule_call.clone());
            }
        }
        interfaces.insert(interface.name.clone(), interface);
        if !branch.rule_calls.is_empty() {
            rule_call_branches.push(branch);
        }
    }

    for branch in rule_call_branches {
        for rule_call in &branch.rule_calls {
            if let Some(called) = interfaces.get_mut(rule_call)
                && called.name != branch.name
            {
                called.super_types.insert(branch.name.clone());
            }
        }
    }
    interfaces
}

/// Supertypes that never got an interface of their own become
/// reflection unions over their subtypes.
fn build_super_unions(interfaces: &IndexMap<String, InterfaceType>) -> IndexMap<String, UnionType> {
    let mut subtypes_by_super: IndexMap<String, Vec<String>> = IndexMap::new();
    for interface in interfaces.values() {
        for super_type in &interface.super_types {
            subtypes_by_super
                .entry(super_type.clone())
                .or_default()
                .push(interface.name.clone());
        }
    }
    let mut unions = IndexMap::new();
    for (super_type, types) in subtypes_by_super {
        if !interfaces.contains_key(&super_type) {
            let mut union = UnionType::new(super_type.clone(), to_property_type(false, false, types));
            union.reflection = true;
            unions.insert(super_type, union);
        }
    }
    unions
}

/// Interfaces without properties but with subtypes become unions.
fn extract_unions(
    interfaces: IndexMap<String, InterfaceType>,
    mut unions: IndexMap<String, UnionType>,
) -> AstTypes {
    let mut interfaces = interfaces;
    let edges: Vec<(String, String)> = interfaces
        .values()
        .flat_map(|i| {
            i.super_types
                .iter()
                .map(move |s| (s.clone(), i.name.clone()))
        })
        .collect();
    for (super_name, sub_name) in edges {
        if let Some(super_interface) = interfaces.get_mut(&super_name) {
            super_interface.sub_types.insert(sub_name);
        }
    }

    let mut result = AstTypes::default();
    let mut union_names: IndexSet<String> = unions.keys().cloned().collect();
    for (name, interface) in interfaces {
        if interface.properties.is_empty() && !interface.sub_types.is_empty() {
            let alternatives = to_property_type(
                false,
                false,
                interface.sub_types.iter().cloned().collect(),
            );
            if let Some(existing) = unions.get_mut(&name) {
                existing.alternatives.extend(alternatives);
            } else {
                let mut union = UnionType::new(name.clone(), alternatives);
                union.reflection = true;
                union.super_types = interface.super_types;
                unions.insert(name.clone(), union);
                union_names.insert(name);
            }
        } else {
            result.interfaces.insert(name, interface);
        }
    }
    for interface in result.interfaces.values_mut() {
        interface.printable_super_types = interface
            .super_types
            .iter()
            .filter(|s| !union_names.contains(*s))
            .cloned()
            .collect();
    }
    result.unions = unions;
    result
}
