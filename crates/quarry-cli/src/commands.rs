//! Command implementations.
//!
//! Each command loads the backend settings and one schema description,
//! then drives the emitter or the lifecycle controller.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::{Value, json};

use quarry_remote::{
    BackendSettings, IndexAdminClient, IndexIdentity, InMemoryCluster, LifecycleController, LifecycleStrategy,
    StartReport,
};
use quarry_schema::{AnalysisDefinitions, SchemaDescription, SchemaTree};

use crate::cli::IndexArgs;

/// Settings, analysis, and the schema tree of one index.
pub struct Loaded {
    pub settings: BackendSettings,
    pub analysis: AnalysisDefinitions,
    pub tree: Arc<SchemaTree>,
    pub identity: IndexIdentity,
}

impl Loaded {
    /// Load settings (or defaults) and build the schema of `target`.
    pub fn load(settings: Option<&Path>, target: &IndexArgs) -> Result<Self> {
        let settings = match settings {
            Some(path) => BackendSettings::load(path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?,
            None => BackendSettings::default(),
        };
        let description = SchemaDescription::load(&target.schema)
            .with_context(|| format!("Failed to load schema from {}", target.schema.display()))?;

        let mut analysis = settings.analysis_definitions(None);
        analysis.merge(description.analysis.clone());
        let registry = settings.registry()?;
        let tree = description.build(&registry, &analysis)?;
        let identity = settings.identity(&target.base(), &target.type_name());
        tracing::debug!(
            index = identity.base(),
            fields = tree.len(),
            "Loaded schema description"
        );

        Ok(Self {
            settings,
            analysis,
            tree: Arc::new(tree),
            identity,
        })
    }

    /// A controller managing this index through `client`.
    pub fn controller(
        &self,
        client: Arc<dyn IndexAdminClient>,
        strategy: Option<LifecycleStrategy>,
    ) -> Result<LifecycleController> {
        let mut settings = self.settings.clone();
        if let Some(strategy) = strategy {
            settings.lifecycle.strategy = strategy;
        }
        let mut controller = settings.controller(client, self.analysis.clone())?;
        controller.add_index(self.identity.clone(), self.tree.clone())?;
        Ok(controller)
    }

    fn http_controller(&self, strategy: Option<LifecycleStrategy>) -> Result<LifecycleController> {
        let client = self.settings.http_client()?;
        self.controller(Arc::new(client), strategy)
    }
}

/// The mapping, or the full creation request, for the loaded index.
pub fn emit(loaded: &Loaded, create_request: bool) -> Result<Value> {
    let emitter = loaded.settings.emitter()?;
    if !create_request {
        return Ok(emitter.emit_json(&loaded.tree));
    }
    let dialect = loaded.settings.dialect()?;
    let request = emitter.create_index_request(
        dialect.as_ref(),
        &loaded.identity,
        &loaded.tree,
        &loaded.analysis,
    );
    Ok(json!({
        "method": request.method.to_string(),
        "path": request.path_and_query(),
        "body": request.body,
    }))
}

/// Validate the existing index, whatever the configured strategy.
pub async fn validate(loaded: &Loaded) -> Result<()> {
    let controller = loaded.http_controller(None)?;
    controller.validate().await?;
    tracing::info!(index = loaded.identity.base(), "Index matches its schema");
    Ok(())
}

/// Run the start half of the strategy against the configured cluster.
pub async fn start(loaded: &Loaded, strategy: Option<LifecycleStrategy>) -> Result<StartReport> {
    let controller = loaded.http_controller(strategy)?;
    Ok(controller.start().await?)
}

/// Run the start half of the strategy against an empty in-memory cluster
/// and return the requests it sent.
pub async fn dry_run(loaded: &Loaded, strategy: Option<LifecycleStrategy>) -> Result<Vec<String>> {
    let cluster = Arc::new(InMemoryCluster::new(loaded.settings.dialect()?));
    let controller = loaded.controller(cluster.clone(), strategy)?;
    controller.start().await?;
    Ok(cluster.request_log())
}

/// Run the stop half of the strategy against the configured cluster.
pub async fn stop(loaded: &Loaded, strategy: Option<LifecycleStrategy>) -> Result<()> {
    let controller = loaded.http_controller(strategy)?;
    controller.stop().await?;
    Ok(())
}

/// One `base: action` line per index.
pub fn describe(report: &StartReport) -> Vec<String> {
    report
        .actions
        .iter()
        .map(|(base, action)| format!("{base}: {action:?}"))
        .collect()
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;
    use tempfile::TempDir;

    const BOOKS: &str = r#"
[analysis.normalizer.code-normalizer]
filter = ["lowercase"]

[[fields]]
name = "title"
type = "string"
analyzer = "english"

[[fields]]
name = "code"
type = "string"
normalizer = "code-normalizer"
sortable = "yes"
"#;

    fn setup(settings: Option<&str>) -> (TempDir, IndexArgs, Option<PathBuf>) {
        let dir = TempDir::new().unwrap();
        let schema = dir.path().join("books.toml");
        fs::write(&schema, BOOKS).unwrap();
        let settings = settings.map(|content| {
            let path = dir.path().join("quarry.toml");
            fs::write(&path, content).unwrap();
            path
        });
        let target = IndexArgs {
            schema,
            index: None,
            type_name: Some("Book".to_string()),
        };
        (dir, target, settings)
    }

    #[test]
    fn test_emit_mapping() {
        let (_dir, target, _) = setup(None);
        let loaded = Loaded::load(None, &target).unwrap();
        assert_eq!(loaded.identity.primary(), "books-000001");

        let mapping = emit(&loaded, false).unwrap();
        assert_eq!(mapping["dynamic"], "strict");
        assert_eq!(mapping["properties"]["code"]["normalizer"], "code-normalizer");
        assert!(mapping["properties"].get("_entity_type").is_some());
    }

    #[test]
    fn test_emit_create_request_with_settings() {
        let (_dir, target, settings) = setup(Some(
            r#"
[mapping.type_name]
strategy = "index-name"

[index.aliases]
read = "{base}-search"
"#,
        ));
        let loaded = Loaded::load(settings.as_deref(), &target).unwrap();
        let request = emit(&loaded, true).unwrap();
        assert_eq!(request["method"], "PUT");
        assert_eq!(request["path"], "/books-000001");
        let body = &request["body"];
        assert!(body["aliases"].get("books-search").is_some());
        assert!(body["mappings"]["properties"].get("_entity_type").is_none());
        assert_eq!(
            body["settings"]["index"]["analysis"]["normalizer"]["code-normalizer"]["filter"],
            json!(["lowercase"])
        );
    }

    #[test]
    fn test_missing_schema_file() {
        let target = IndexArgs {
            schema: PathBuf::from("/nonexistent/books.toml"),
            index: None,
            type_name: None,
        };
        let err = Loaded::load(None, &target).err().unwrap();
        assert!(err.to_string().contains("Failed to load schema"));
    }

    #[tokio::test]
    async fn test_dry_run_creates_index() {
        let (_dir, target, _) = setup(None);
        let loaded = Loaded::load(None, &target).unwrap();
        let requests = dry_run(&loaded, None).await.unwrap();
        assert_eq!(requests, vec!["PUT /books-000001".to_string()]);
    }

    #[tokio::test]
    async fn test_dry_run_validate_reports_missing_index() {
        let (_dir, target, _) = setup(None);
        let loaded = Loaded::load(None, &target).unwrap();
        let err = dry_run(&loaded, Some(LifecycleStrategy::Validate))
            .await
            .unwrap_err();
        let report = err.downcast_ref::<quarry_core::Error>().and_then(|e| e.report());
        assert_eq!(report.map(|r| r.len()), Some(1));
    }
}
