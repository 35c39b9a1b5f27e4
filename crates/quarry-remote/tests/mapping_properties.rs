//! Property-based tests for emitted mappings and their validation.

use proptest::prelude::*;
use proptest::sample::Index;
use serde_json::{Value, json};

use quarry_core::Result;
use quarry_remote::{Elastic6Dialect, Elastic7Dialect, MappingEmitter, MappingValidator, TypeNameMapping};
use quarry_schema::{
    AnalysisDefinitions, FieldType, KindRegistry, ObjectStorage, PropertyMapping, SchemaTree, Toggle, TypeFactory,
};

#[derive(Debug, Clone, Copy)]
enum Leaf {
    Text,
    Keyword,
    SortableKeyword,
    Integer,
    Long,
    Double,
    Boolean,
    LocalDate,
    Instant,
}

fn leaf() -> impl Strategy<Value = Leaf> {
    prop_oneof![
        Just(Leaf::Text),
        Just(Leaf::Keyword),
        Just(Leaf::SortableKeyword),
        Just(Leaf::Integer),
        Just(Leaf::Long),
        Just(Leaf::Double),
        Just(Leaf::Boolean),
        Just(Leaf::LocalDate),
        Just(Leaf::Instant),
    ]
}

/// Leaves, each flagged as living under the `obj` object or at the root.
fn layout() -> impl Strategy<Value = Vec<(Leaf, bool)>> {
    prop::collection::vec((leaf(), any::<bool>()), 1..8)
}

fn storage() -> impl Strategy<Value = ObjectStorage> {
    prop_oneof![Just(ObjectStorage::Flattened), Just(ObjectStorage::Nested)]
}

fn emitter() -> impl Strategy<Value = MappingEmitter> {
    (
        prop_oneof![Just(TypeNameMapping::IndexName), Just(TypeNameMapping::Discriminator)],
        any::<bool>(),
    )
        .prop_map(|(mapping, tenancy)| MappingEmitter::new(mapping, tenancy))
}

fn leaf_type(t: &TypeFactory<'_>, leaf: Leaf) -> Result<FieldType> {
    match leaf {
        Leaf::Text => t.as_string().analyzer("english").build(),
        Leaf::Keyword => t.as_string().build(),
        Leaf::SortableKeyword => t.as_string().normalizer("lowercase").sortable(Toggle::Yes).build(),
        Leaf::Integer => t.as_integer().build(),
        Leaf::Long => t.as_long().sortable(Toggle::Yes).build(),
        Leaf::Double => t.as_double().build(),
        Leaf::Boolean => t.as_boolean().build(),
        Leaf::LocalDate => t.as_local_date().build(),
        Leaf::Instant => t.as_instant().sortable(Toggle::Yes).build(),
    }
}

fn build(layout: &[(Leaf, bool)], storage: ObjectStorage) -> SchemaTree {
    let registry = KindRegistry::default();
    let analysis = AnalysisDefinitions::default();
    let mut builder = SchemaTree::builder(&registry, &analysis);
    for (i, (leaf, _)) in layout.iter().enumerate().filter(|(_, (_, nested))| !nested) {
        builder = builder.field(&format!("f{i}"), |t| leaf_type(t, *leaf)).unwrap();
    }
    if layout.iter().any(|(_, nested)| *nested) {
        builder = builder
            .object_field("obj", storage, |object| {
                layout
                    .iter()
                    .enumerate()
                    .filter(|(_, (_, nested))| *nested)
                    .try_fold(object, |object, (i, (leaf, _))| {
                        object.field(&format!("f{i}"), |t| leaf_type(t, *leaf))
                    })
            })
            .unwrap();
    }
    builder.build()
}

/// The JSON object of the property at `path` inside a root mapping.
fn property_mut<'v>(mapping: &'v mut Value, path: &str) -> &'v mut Value {
    path.split('.')
        .fold(mapping, |current, segment| &mut current["properties"][segment])
}

/// Apply `f` to every leaf property of a mapping.
fn for_each_leaf(mapping: &mut Value, f: &dyn Fn(&mut serde_json::Map<String, Value>)) {
    if let Some(properties) = mapping.get_mut("properties").and_then(Value::as_object_mut) {
        for property in properties.values_mut() {
            if property.get("properties").is_some() {
                for_each_leaf(property, f);
            } else if let Some(object) = property.as_object_mut() {
                f(object);
            }
        }
    }
}

fn validate(expected: &PropertyMapping, observed: &Value) -> quarry_core::FailureReport {
    MappingValidator::new(&Elastic7Dialect).validate_json("index1", expected, Some(observed))
}

proptest! {
    #[test]
    fn test_emit_is_deterministic(layout in layout(), storage in storage(), emitter in emitter()) {
        let first = emitter.emit_json(&build(&layout, storage)).to_string();
        let second = emitter.emit_json(&build(&layout, storage)).to_string();
        prop_assert_eq!(first, second);
    }

    #[test]
    fn test_emitted_mapping_validates(layout in layout(), storage in storage(), emitter in emitter()) {
        let tree = build(&layout, storage);
        let expected = emitter.emit(&tree);
        let report = validate(&expected, &expected.to_json());
        prop_assert!(report.is_empty(), "{}", report);

        let legacy = MappingValidator::new(&Elastic6Dialect)
            .validate_json("index1", &expected, Some(&expected.to_json()));
        prop_assert!(legacy.is_empty(), "{}", legacy);
    }

    #[test]
    fn test_validation_is_lenient(layout in layout(), storage in storage(), emitter in emitter()) {
        let tree = build(&layout, storage);
        let expected = emitter.emit(&tree);
        let mut observed = expected.to_json();
        for_each_leaf(&mut observed, &|leaf| {
            leaf.insert("store".into(), json!(true));
            leaf.insert("norms".into(), json!(true));
            leaf.insert("ignore_malformed".into(), json!(true));
        });
        observed["properties"]["NOTmyField"] = json!({"type": "date", "index": true});

        let report = validate(&expected, &observed);
        prop_assert!(report.is_empty(), "{}", report);
    }

    #[test]
    fn test_validation_rejects_non_strict_root(
        layout in layout(),
        storage in storage(),
        dynamic in prop_oneof![Just(json!(true)), Just(json!(false)), Just(json!("true"))],
    ) {
        let tree = build(&layout, storage);
        let expected = MappingEmitter::default().emit(&tree);
        let mut observed = expected.to_json();
        observed["dynamic"] = dynamic;

        let report = validate(&expected, &observed);
        prop_assert_eq!(report.len(), 1);
        prop_assert_eq!(report.records()[0].attribute(), Some("dynamic"));
    }

    #[test]
    fn test_validation_rejects_changed_type(layout in layout(), storage in storage(), pick in any::<Index>()) {
        let tree = build(&layout, storage);
        let expected = MappingEmitter::default().emit(&tree);
        let paths: Vec<&str> = tree.fields().map(|f| f.path()).collect();
        let path = *pick.get(&paths);

        let mut observed = expected.to_json();
        let property = property_mut(&mut observed, path);
        let replacement = if property["type"] == "keyword" { "long" } else { "keyword" };
        property["type"] = json!(replacement);

        let report = validate(&expected, &observed);
        prop_assert!(!report.is_empty());
        let record = &report.records()[0];
        prop_assert_eq!(record.field(), Some(path));
        prop_assert_eq!(record.attribute(), Some("type"));
    }

    #[test]
    fn test_validation_rejects_changed_analyzer(storage in storage(), nested in any::<bool>()) {
        let tree = build(&[(Leaf::Text, nested)], storage);
        let expected = MappingEmitter::default().emit(&tree);
        let path = if nested { "obj.f0" } else { "f0" };

        let mut observed = expected.to_json();
        property_mut(&mut observed, path)["analyzer"] = json!("standard");

        let report = validate(&expected, &observed);
        prop_assert_eq!(report.len(), 1);
        prop_assert_eq!(report.records()[0].message(), "Invalid value. Expected 'english', actual is 'standard'");
    }

    #[test]
    fn test_validation_rejects_changed_format(
        leaf in prop_oneof![Just(Leaf::LocalDate), Just(Leaf::Instant)],
        storage in storage(),
        nested in any::<bool>(),
        format in prop_oneof![Just("epoch_millis"), Just("yyyy-MM-dd"), Just("basic_date_time")],
    ) {
        let tree = build(&[(leaf, nested)], storage);
        let expected = MappingEmitter::default().emit(&tree);
        let path = if nested { "obj.f0" } else { "f0" };

        let mut observed = expected.to_json();
        let property = property_mut(&mut observed, path);
        let emitted = property["format"].as_str().map(str::to_string);
        prop_assume!(emitted.as_deref() != Some(format));
        property["format"] = json!(format);

        let report = validate(&expected, &observed);
        prop_assert_eq!(report.len(), 1, "{}", report);
        let record = &report.records()[0];
        prop_assert_eq!(record.field(), Some(path));
        prop_assert_eq!(record.attribute(), Some("format"));
    }

    #[test]
    fn test_validation_rejects_changed_normalizer(
        storage in storage(),
        nested in any::<bool>(),
        normalizer in prop_oneof![Just("asciifolding"), Just("code-normalizer")],
    ) {
        let tree = build(&[(Leaf::SortableKeyword, nested)], storage);
        let expected = MappingEmitter::default().emit(&tree);
        let path = if nested { "obj.f0" } else { "f0" };

        let mut observed = expected.to_json();
        property_mut(&mut observed, path)["normalizer"] = json!(normalizer);

        let report = validate(&expected, &observed);
        prop_assert_eq!(report.len(), 1, "{}", report);
        let record = &report.records()[0];
        prop_assert_eq!(record.attribute(), Some("normalizer"));
        prop_assert_eq!(
            record.message(),
            format!("Invalid value. Expected 'lowercase', actual is '{normalizer}'")
        );
    }
}
