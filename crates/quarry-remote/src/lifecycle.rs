//! Index lifecycle.
//!
//! The [`LifecycleController`] owns the managed indexes and runs the
//! configured [`LifecycleStrategy`] when the application starts and stops:
//!
//! | Strategy | On start | On stop |
//! |---|---|---|
//! | `none` | nothing | nothing |
//! | `validate` | validate the mapping | nothing |
//! | `update` | create if missing, else validate and patch | nothing |
//! | `create` | create, failing if the index exists | nothing |
//! | `drop-and-create` | delete if it exists, then create | nothing |
//! | `drop-and-create-and-drop` | delete if it exists, then create | delete |
//!
//! Indexes are processed concurrently; the requests for one index are
//! sequential. Validation failures of every index are gathered into a
//! single [`FailureReport`] ordered by index declaration.

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use crate::client::IndexAdminClient;
use crate::dialect::Dialect;
use crate::emitter::MappingEmitter;
use crate::names::IndexIdentity;
use crate::validator::{MappingValidator, is_patchable};
use crate::work::{self, Request};
use quarry_core::{
    ContextFrame, Error, FailureCollector, FailureKind, FailureReport, IndexState, IndexStateHandle, Result,
};
use quarry_schema::analysis::AnalysisDefinitions;
use quarry_schema::tree::SchemaTree;

// ============================================================================
// Strategy
// ============================================================================

/// What happens to indexes on start and stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LifecycleStrategy {
    /// Leave indexes alone.
    None,
    /// Check that existing indexes match the schema.
    Validate,
    /// Create missing indexes and patch compatible differences.
    Update,
    /// Create indexes; fail if they already exist.
    #[default]
    Create,
    /// Recreate indexes on start.
    DropAndCreate,
    /// Recreate indexes on start and delete them on stop.
    DropAndCreateAndDrop,
}

impl LifecycleStrategy {
    /// External name.
    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleStrategy::None => "none",
            LifecycleStrategy::Validate => "validate",
            LifecycleStrategy::Update => "update",
            LifecycleStrategy::Create => "create",
            LifecycleStrategy::DropAndCreate => "drop-and-create",
            LifecycleStrategy::DropAndCreateAndDrop => "drop-and-create-and-drop",
        }
    }

    /// Whether indexes are deleted on stop.
    pub fn drops_on_stop(&self) -> bool {
        matches!(self, LifecycleStrategy::DropAndCreateAndDrop)
    }
}

impl fmt::Display for LifecycleStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for LifecycleStrategy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" => Ok(LifecycleStrategy::None),
            "validate" => Ok(LifecycleStrategy::Validate),
            "update" => Ok(LifecycleStrategy::Update),
            "create" => Ok(LifecycleStrategy::Create),
            "drop-and-create" => Ok(LifecycleStrategy::DropAndCreate),
            "drop-and-create-and-drop" => Ok(LifecycleStrategy::DropAndCreateAndDrop),
            other => Err(Error::config(format!(
                "Invalid lifecycle strategy '{other}'. Valid strategies are: none, validate, \
                 update, create, drop-and-create, drop-and-create-and-drop"
            ))),
        }
    }
}

// ============================================================================
// Start outcome
// ============================================================================

/// What the controller did to one index on start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IndexAction {
    /// The strategy does not touch indexes.
    Skipped,
    /// The existing mapping matched.
    Validated,
    /// The index did not exist and was created.
    Created,
    /// The mapping was patched to fix `patched` discrepancies.
    Updated {
        /// Number of discrepancies fixed.
        patched: usize,
    },
    /// An existing index was deleted and created again.
    Recreated,
}

/// Outcome of a successful start, one entry per index in declaration order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StartReport {
    /// `(base name, action)` pairs.
    pub actions: Vec<(String, IndexAction)>,
}

impl StartReport {
    /// Action taken for the index with base name `base`.
    pub fn action(&self, base: &str) -> Option<&IndexAction> {
        self.actions
            .iter()
            .find_map(|(name, action)| (name == base).then_some(action))
    }
}

// ============================================================================
// Controller
// ============================================================================

/// An index under lifecycle management.
#[derive(Clone)]
pub struct ManagedIndex {
    identity: IndexIdentity,
    tree: Arc<SchemaTree>,
    state: IndexStateHandle,
}

impl ManagedIndex {
    /// Names of the index.
    pub fn identity(&self) -> &IndexIdentity {
        &self.identity
    }

    /// Schema of the index.
    pub fn tree(&self) -> &SchemaTree {
        &self.tree
    }

    /// State of the index.
    pub fn state(&self) -> &IndexStateHandle {
        &self.state
    }
}

impl fmt::Debug for ManagedIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagedIndex")
            .field("identity", &self.identity)
            .field("fields", &self.tree.len())
            .field("state", &self.state.state())
            .finish()
    }
}

/// Runs a lifecycle strategy over a set of indexes.
pub struct LifecycleController {
    client: Arc<dyn IndexAdminClient>,
    dialect: Arc<dyn Dialect>,
    strategy: LifecycleStrategy,
    emitter: MappingEmitter,
    analysis: AnalysisDefinitions,
    indexes: Vec<ManagedIndex>,
}

impl LifecycleController {
    /// A controller with no indexes yet.
    pub fn new(
        client: Arc<dyn IndexAdminClient>,
        dialect: Arc<dyn Dialect>,
        strategy: LifecycleStrategy,
        emitter: MappingEmitter,
        analysis: AnalysisDefinitions,
    ) -> Self {
        Self {
            client,
            dialect,
            strategy,
            emitter,
            analysis,
            indexes: Vec::new(),
        }
    }

    /// The strategy in use.
    pub fn strategy(&self) -> LifecycleStrategy {
        self.strategy
    }

    /// The emitter in use.
    pub fn emitter(&self) -> &MappingEmitter {
        &self.emitter
    }

    /// Managed indexes in declaration order.
    pub fn indexes(&self) -> &[ManagedIndex] {
        &self.indexes
    }

    /// The managed index with base name `base`.
    pub fn index(&self, base: &str) -> Option<&ManagedIndex> {
        self.indexes.iter().find(|i| i.identity.base() == base)
    }

    /// Put an index under management.
    ///
    /// Fails if any of its names is already used by another managed index.
    pub fn add_index(&mut self, identity: IndexIdentity, tree: Arc<SchemaTree>) -> Result<IndexStateHandle> {
        for existing in &self.indexes {
            let taken = existing.identity.names();
            if let Some(name) = identity.names().into_iter().find(|n| taken.contains(n)) {
                return Err(Error::config(format!(
                    "Name '{name}' of index '{}' is already used by index '{}'",
                    identity.base(),
                    existing.identity.base()
                )));
            }
        }
        let state = IndexStateHandle::new(identity.base());
        self.indexes.push(ManagedIndex {
            identity,
            tree,
            state: state.clone(),
        });
        Ok(state)
    }

    /// Run the start half of the strategy on every index.
    ///
    /// Validation failures across all indexes are returned together as
    /// [`Error::Validation`]; any other error wins over them.
    pub async fn start(&self) -> Result<StartReport> {
        log::info!(
            "Starting {} index(es) with lifecycle strategy '{}'",
            self.indexes.len(),
            self.strategy
        );
        let outcomes = join_all(self.indexes.iter().map(|index| async move {
            index.state.set_state(IndexState::Starting);
            let outcome = self.start_index(index).await;
            match &outcome {
                Ok(action) => {
                    log::info!("Index '{}': {action:?}", index.identity.base());
                    index.state.set_state(IndexState::Ready);
                }
                Err(e) => index.state.set_state(IndexState::Failed(e.to_string())),
            }
            outcome
        }))
        .await;

        let mut report = StartReport::default();
        let mut failures = Vec::new();
        let mut first_error = None;
        for (index, outcome) in self.indexes.iter().zip(outcomes) {
            match outcome {
                Ok(action) => report.actions.push((index.identity.base().to_string(), action)),
                Err(Error::Validation(failure)) => failures.push(failure),
                Err(e) => {
                    first_error.get_or_insert(e);
                }
            }
        }
        if let Some(e) = first_error {
            return Err(e);
        }
        FailureReport::concat(failures).into_result()?;
        Ok(report)
    }

    /// Run the stop half of the strategy on every index.
    pub async fn stop(&self) -> Result<()> {
        let outcomes = join_all(self.indexes.iter().map(|index| async move {
            index.state.set_state(IndexState::Stopping);
            let outcome = if self.strategy.drops_on_stop() {
                self.drop_existing(&index.identity).await.map(|_| ())
            } else {
                Ok(())
            };
            index.state.set_state(IndexState::Stopped);
            outcome
        }))
        .await;
        outcomes.into_iter().collect()
    }

    /// Validate every index without changing anything, whatever the strategy.
    pub async fn validate(&self) -> Result<()> {
        let reports = join_all(self.indexes.iter().map(|index| self.validation_report(index))).await;
        let reports: Result<Vec<FailureReport>> = reports.into_iter().collect();
        FailureReport::concat(reports?).into_result()
    }

    async fn start_index(&self, index: &ManagedIndex) -> Result<IndexAction> {
        match self.strategy {
            LifecycleStrategy::None => Ok(IndexAction::Skipped),
            LifecycleStrategy::Validate => {
                self.validation_report(index).await?.into_result()?;
                Ok(IndexAction::Validated)
            }
            LifecycleStrategy::Update => self.update(index).await,
            LifecycleStrategy::Create => {
                self.create(index).await?;
                Ok(IndexAction::Created)
            }
            LifecycleStrategy::DropAndCreate | LifecycleStrategy::DropAndCreateAndDrop => {
                let dropped = self.drop_existing(&index.identity).await?;
                self.create(index).await?;
                Ok(if dropped { IndexAction::Recreated } else { IndexAction::Created })
            }
        }
    }

    async fn update(&self, index: &ManagedIndex) -> Result<IndexAction> {
        if self.existing_primaries(&index.identity).await?.is_empty() {
            self.create(index).await?;
            return Ok(IndexAction::Created);
        }
        let report = self.validation_report(index).await?;
        if report.is_empty() {
            return Ok(IndexAction::Validated);
        }
        if !report.iter().all(is_patchable) {
            return Err(Error::Validation(report));
        }
        let patched = report.len();
        log::info!(
            "Patching mapping of index '{}' ({patched} discrepancies)",
            index.identity.base()
        );
        let request = work::put_mapping(
            self.dialect.as_ref(),
            index.identity.write_alias(),
            self.emitter.emit_json(&index.tree),
        );
        self.send(request).await?;
        Ok(IndexAction::Updated { patched })
    }

    async fn create(&self, index: &ManagedIndex) -> Result<()> {
        log::info!(
            "Creating index '{}' with aliases '{}' and '{}'",
            index.identity.primary(),
            index.identity.write_alias(),
            index.identity.read_alias()
        );
        let request = self.emitter.create_index_request(
            self.dialect.as_ref(),
            &index.identity,
            &index.tree,
            &self.analysis,
        );
        self.send(request).await.map(|_| ())
    }

    /// Delete every primary index behind the identity; `true` if any existed.
    async fn drop_existing(&self, identity: &IndexIdentity) -> Result<bool> {
        let primaries = self.existing_primaries(identity).await?;
        for primary in &primaries {
            log::info!("Dropping index '{primary}'");
            self.send(work::delete_index(self.dialect.as_ref(), primary)).await?;
        }
        Ok(!primaries.is_empty())
    }

    async fn existing_primaries(&self, identity: &IndexIdentity) -> Result<Vec<String>> {
        for name in [identity.write_alias(), identity.primary()] {
            let request = work::get_index(self.dialect.as_ref(), name);
            let response = self.client.execute(request.clone()).await?;
            if response.is_not_found() {
                continue;
            }
            let body = response.into_success(&request)?;
            return Ok(body
                .as_object()
                .map(|indexes| indexes.keys().cloned().collect())
                .unwrap_or_default());
        }
        Ok(Vec::new())
    }

    async fn validation_report(&self, index: &ManagedIndex) -> Result<FailureReport> {
        let base = index.identity.base();
        log::info!("Validating mapping of index '{base}'");
        let request = work::get_mapping(self.dialect.as_ref(), index.identity.write_alias());
        let response = self.client.execute(request.clone()).await?;
        if response.is_not_found() {
            let mut collector = FailureCollector::new();
            collector.within(ContextFrame::index(base), |c| c.record(FailureKind::missing("index")));
            return Ok(collector.finish());
        }
        let body = response.into_success(&request)?;
        let observed = work::parse_mapping_response(self.dialect.as_ref(), &body);
        let expected = self.emitter.emit(&index.tree);
        Ok(MappingValidator::new(self.dialect.as_ref()).validate_json(base, &expected, observed.as_ref()))
    }

    async fn send(&self, request: Request) -> Result<Value> {
        let response = self.client.execute(request.clone()).await?;
        response.into_success(&request)
    }
}

impl fmt::Debug for LifecycleController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifecycleController")
            .field("client", &self.client.name())
            .field("dialect", &self.dialect.name())
            .field("strategy", &self.strategy)
            .field("indexes", &self.indexes)
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dialect::Elastic7Dialect;
    use crate::memory::InMemoryCluster;
    use quarry_schema::registry::KindRegistry;
    use serde_json::json;

    fn books_tree() -> Arc<SchemaTree> {
        let registry = KindRegistry::default();
        let analysis = AnalysisDefinitions::default();
        let tree = SchemaTree::builder(&registry, &analysis)
            .field("title", |t| t.as_string().analyzer("english").build())
            .unwrap()
            .field("pages", |t| t.as_integer().build())
            .unwrap()
            .build();
        Arc::new(tree)
    }

    fn controller(cluster: Arc<InMemoryCluster>, strategy: LifecycleStrategy) -> LifecycleController {
        let mut controller = LifecycleController::new(
            cluster,
            Arc::new(Elastic7Dialect),
            strategy,
            MappingEmitter::default(),
            AnalysisDefinitions::default(),
        );
        controller
            .add_index(IndexIdentity::new("books", "Book"), books_tree())
            .unwrap();
        controller
    }

    #[test]
    fn test_strategy_names() {
        for strategy in [
            LifecycleStrategy::None,
            LifecycleStrategy::Validate,
            LifecycleStrategy::Update,
            LifecycleStrategy::Create,
            LifecycleStrategy::DropAndCreate,
            LifecycleStrategy::DropAndCreateAndDrop,
        ] {
            assert_eq!(strategy.as_str().parse::<LifecycleStrategy>().unwrap(), strategy);
        }
        assert!("recreate".parse::<LifecycleStrategy>().is_err());
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let mut controller = controller(Arc::new(InMemoryCluster::default()), LifecycleStrategy::None);
        let clash = IndexIdentity::new("novels", "Novel").with_alias_templates(Some("books-read"), None);
        let err = controller.add_index(clash, books_tree()).unwrap_err();
        assert!(err.to_string().contains("books-read"));
    }

    #[tokio::test]
    async fn test_create_then_validate() {
        let cluster = Arc::new(InMemoryCluster::default());
        let create = controller(cluster.clone(), LifecycleStrategy::Create);
        let report = create.start().await.unwrap();
        assert_eq!(report.action("books"), Some(&IndexAction::Created));
        assert!(create.index("books").unwrap().state().state().is_ready());

        let validate = controller(cluster.clone(), LifecycleStrategy::Validate);
        let report = validate.start().await.unwrap();
        assert_eq!(report.action("books"), Some(&IndexAction::Validated));

        let err = create.start().await.unwrap_err();
        assert!(matches!(err, Error::RemoteProtocol { status: 400, .. }));
        assert!(matches!(
            create.index("books").unwrap().state().state(),
            IndexState::Failed(_)
        ));
    }

    #[tokio::test]
    async fn test_validate_missing_index() {
        let cluster = Arc::new(InMemoryCluster::default());
        let err = controller(cluster, LifecycleStrategy::Validate)
            .start()
            .await
            .unwrap_err();
        let report = err.report().unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report.records()[0].to_string(), "index books: Missing index");
    }

    #[tokio::test]
    async fn test_update_patches_missing_property() {
        let cluster = Arc::new(InMemoryCluster::default());
        cluster
            .create_raw(
                "books-000001",
                &[("books-write", true), ("books-read", false)],
                Some(json!({
                    "dynamic": "strict",
                    "properties": {
                        "_entity_type": {"type": "keyword", "index": false},
                        "title": {"type": "text", "analyzer": "english"}
                    }
                })),
            )
            .unwrap();
        let controller = controller(cluster.clone(), LifecycleStrategy::Update);
        let report = controller.start().await.unwrap();
        assert_eq!(report.action("books"), Some(&IndexAction::Updated { patched: 1 }));
        let mapping = cluster.mapping("books-write").unwrap();
        assert_eq!(mapping["properties"]["pages"]["type"], "integer");
    }

    #[tokio::test]
    async fn test_update_refuses_breaking_change() {
        let cluster = Arc::new(InMemoryCluster::default());
        cluster
            .create_raw(
                "books-000001",
                &[("books-write", true), ("books-read", false)],
                Some(json!({
                    "dynamic": "strict",
                    "properties": {
                        "_entity_type": {"type": "keyword", "index": false},
                        "title": {"type": "keyword"},
                        "pages": {"type": "integer"}
                    }
                })),
            )
            .unwrap();
        let err = controller(cluster, LifecycleStrategy::Update)
            .start()
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("Expected 'text', actual is 'keyword'"));
    }

    #[tokio::test]
    async fn test_drop_and_create_and_drop() {
        let cluster = Arc::new(InMemoryCluster::default());
        cluster
            .create_raw("books-legacy", &[("books-write", true)], None)
            .unwrap();
        let controller = controller(cluster.clone(), LifecycleStrategy::DropAndCreateAndDrop);
        let report = controller.start().await.unwrap();
        assert_eq!(report.action("books"), Some(&IndexAction::Recreated));
        assert_eq!(cluster.index_names(), vec!["books-000001"]);

        controller.stop().await.unwrap();
        assert!(cluster.index_names().is_empty());
        assert_eq!(
            controller.index("books").unwrap().state().state(),
            IndexState::Stopped
        );
    }

    #[tokio::test]
    async fn test_none_sends_nothing() {
        let cluster = Arc::new(InMemoryCluster::default());
        let controller = controller(cluster.clone(), LifecycleStrategy::None);
        let report = controller.start().await.unwrap();
        assert_eq!(report.action("books"), Some(&IndexAction::Skipped));
        controller.stop().await.unwrap();
        assert!(cluster.request_log().is_empty());
    }
}
