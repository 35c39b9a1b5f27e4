//! Schema validation against preexisting indexes, end to end.

use serde_json::{Value, json};
use std::sync::Arc;

use quarry_core::Error;
use quarry_remote::{
    Elastic7Dialect, IndexIdentity, InMemoryCluster, LifecycleController, LifecycleStrategy, MappingEmitter,
    TypeNameMapping,
};
use quarry_schema::{AnalysisDefinitions, KindRegistry, ObjectStorage, SchemaTree, Toggle};

fn controller(cluster: &Arc<InMemoryCluster>) -> LifecycleController {
    LifecycleController::new(
        cluster.clone(),
        Arc::new(Elastic7Dialect),
        LifecycleStrategy::Validate,
        MappingEmitter::new(TypeNameMapping::IndexName, false),
        AnalysisDefinitions::default(),
    )
}

fn preexisting(cluster: &InMemoryCluster, base: &str, mapping: Value) {
    let identity = IndexIdentity::new(base, base);
    cluster
        .create_raw(
            identity.primary(),
            &[(identity.write_alias(), true), (identity.read_alias(), false)],
            Some(mapping),
        )
        .unwrap();
}

#[tokio::test]
async fn test_validate_success_with_extra_attributes_and_properties() {
    let registry = KindRegistry::default();
    let analysis = AnalysisDefinitions::default();
    let tree = SchemaTree::builder(&registry, &analysis)
        .field("myField", |t| t.as_local_date().build())
        .unwrap()
        .build();

    let cluster = Arc::new(InMemoryCluster::default());
    preexisting(
        &cluster,
        "index1",
        json!({
            "dynamic": "strict",
            "properties": {
                "myField": {
                    "type": "date",
                    "index": true,
                    "format": "yyyy-MM-dd||yyyy-MM-dd'T'HH:mm:ssZ",
                    "ignore_malformed": true
                },
                "NOTmyField": {"type": "date", "index": true}
            }
        }),
    );

    let mut controller = controller(&cluster);
    controller
        .add_index(IndexIdentity::new("index1", "Type1"), Arc::new(tree))
        .unwrap();
    controller.start().await.unwrap();
}

#[tokio::test]
async fn test_validate_missing_property() {
    let registry = KindRegistry::default();
    let analysis = AnalysisDefinitions::default();
    let tree = SchemaTree::builder(&registry, &analysis)
        .field("myField", |t| t.as_integer().build())
        .unwrap()
        .build();

    let cluster = Arc::new(InMemoryCluster::default());
    preexisting(
        &cluster,
        "index1",
        json!({"dynamic": "strict", "properties": {"notMyField": {"type": "integer", "index": true}}}),
    );

    let mut controller = controller(&cluster);
    controller
        .add_index(IndexIdentity::new("index1", "Type1"), Arc::new(tree))
        .unwrap();
    let err = controller.start().await.unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.len(), 1);
    assert_eq!(
        report.records()[0].to_string(),
        "index index1 > schema validation > field myField: Missing property mapping"
    );
}

#[tokio::test]
async fn test_validate_nested_attribute_invalid() {
    let registry = KindRegistry::default();
    let analysis = AnalysisDefinitions::default();
    let tree = SchemaTree::builder(&registry, &analysis)
        .object_field("myObjectField", ObjectStorage::Flattened, |o| {
            o.field("myField", |t| t.as_local_date().build())
        })
        .unwrap()
        .build();

    let cluster = Arc::new(InMemoryCluster::default());
    preexisting(
        &cluster,
        "index1",
        json!({
            "dynamic": "strict",
            "properties": {
                "myObjectField": {
                    "type": "object",
                    "dynamic": "strict",
                    "properties": {
                        "myField": {
                            "type": "date",
                            "index": false,
                            "format": "yyyy-MM-dd||yyyy-MM-dd'T'HH:mm:ssZ"
                        }
                    }
                }
            }
        }),
    );

    let mut controller = controller(&cluster);
    controller
        .add_index(IndexIdentity::new("index1", "Type1"), Arc::new(tree))
        .unwrap();
    let err = controller.start().await.unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.len(), 1, "{report}");
    assert_eq!(
        report.records()[0].to_string(),
        "index index1 > schema validation > field myObjectField.myField > attribute index: \
         Invalid value. Expected 'true', actual is 'false'"
    );
}

#[tokio::test]
async fn test_validate_multiple_indexes_multiple_errors() {
    let registry = KindRegistry::default();
    let analysis = AnalysisDefinitions::default();
    let tree = Arc::new(
        SchemaTree::builder(&registry, &analysis)
            .field("myField", |t| t.as_string().build())
            .unwrap()
            .build(),
    );

    let cluster = Arc::new(InMemoryCluster::default());
    preexisting(
        &cluster,
        "index1",
        json!({"dynamic": false, "properties": {"myField": {"type": "keyword"}}}),
    );
    preexisting(
        &cluster,
        "index2",
        json!({"dynamic": false, "properties": {"myField": {"type": "integer"}}}),
    );

    let mut controller = controller(&cluster);
    controller
        .add_index(IndexIdentity::new("index1", "Type1"), tree.clone())
        .unwrap();
    controller
        .add_index(IndexIdentity::new("index2", "Type2"), tree)
        .unwrap();

    let err = controller.start().await.unwrap_err();
    let Error::Validation(report) = err else {
        panic!("expected a validation report, got {err}");
    };
    let lines: Vec<String> = report.iter().map(ToString::to_string).collect();
    assert_eq!(
        lines,
        vec![
            "index index1 > schema validation > attribute dynamic: Invalid value. Expected 'STRICT', actual is 'FALSE'",
            "index index2 > schema validation > attribute dynamic: Invalid value. Expected 'STRICT', actual is 'FALSE'",
            "index index2 > schema validation > field myField > attribute type: Invalid value. Expected 'keyword', actual is 'integer'",
        ]
    );
    for index in controller.indexes() {
        assert!(!index.state().state().is_ready());
    }
}

#[tokio::test]
async fn test_validate_reports_sortable_without_doc_values() {
    let registry = KindRegistry::default();
    let analysis = AnalysisDefinitions::default();
    let tree = SchemaTree::builder(&registry, &analysis)
        .field("rank", |t| t.as_long().sortable(Toggle::Yes).build())
        .unwrap()
        .build();

    let cluster = Arc::new(InMemoryCluster::default());
    preexisting(
        &cluster,
        "index1",
        json!({"dynamic": "strict", "properties": {"rank": {"type": "long", "doc_values": false}}}),
    );

    let mut controller = controller(&cluster);
    controller
        .add_index(IndexIdentity::new("index1", "Type1"), Arc::new(tree))
        .unwrap();
    let err = controller.validate().await.unwrap_err();
    let report = err.report().unwrap();
    assert_eq!(report.records()[0].attribute(), Some("doc_values"));
}
