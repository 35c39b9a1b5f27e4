//! Remote cluster support for Quarry.
//!
//! Turns schema trees into index mappings, checks existing indexes against
//! them, and manages index lifecycles over the cluster's HTTP/JSON protocol.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      quarry-remote                          │
//! ├─────────────────────────────────────────────────────────────┤
//! │  BackendSettings (TOML / dotted properties)                 │
//! │  Dialect (6.x / 7.x protocol details)                       │
//! │  IndexIdentity (primary name, read/write aliases)           │
//! ├─────────────────────────────────────────────────────────────┤
//! │  MappingEmitter (SchemaTree → root mapping)                 │
//! │  MappingValidator (expected vs observed → FailureReport)    │
//! │  LifecycleController (create/validate/update/drop)          │
//! │  IndexingPlan, TypeNameExtractor                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  work (request builders)                                    │
//! │  IndexAdminClient trait                                     │
//! │  ├── HttpAdminClient (reqwest)                              │
//! │  └── InMemoryCluster (tests, dry runs)                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use quarry_remote::{BackendSettings, InMemoryCluster, LifecycleStrategy};
//! use quarry_schema::SchemaTree;
//!
//! # tokio_test::block_on(async {
//! let settings = BackendSettings::from_properties([("lifecycle.strategy", "drop-and-create")])?;
//! let registry = settings.registry()?;
//! let analysis = settings.analysis_definitions(None);
//! let tree = SchemaTree::builder(&registry, &analysis)
//!     .field("title", |t| t.as_string().analyzer("english").build())?
//!     .build();
//!
//! let cluster = Arc::new(InMemoryCluster::default());
//! let mut controller = settings.controller(cluster.clone(), analysis.clone())?;
//! controller.add_index(settings.identity("books", "Book"), Arc::new(tree))?;
//! controller.start().await?;
//!
//! assert_eq!(controller.strategy(), LifecycleStrategy::DropAndCreate);
//! assert_eq!(cluster.index_names(), vec!["books-000001"]);
//! # Ok::<(), quarry_core::Error>(())
//! # }).unwrap();
//! ```

pub mod client;
pub mod dialect;
pub mod emitter;
pub mod indexing;
pub mod lifecycle;
pub mod memory;
pub mod names;
pub mod settings;
pub mod type_name;
pub mod validator;
pub mod work;

// Re-export key types at crate root for convenience
pub use client::{HttpAdminClient, IndexAdminClient};
pub use dialect::{Dialect, Elastic6Dialect, Elastic7Dialect, dialect_for_version};
pub use emitter::MappingEmitter;
pub use indexing::{DocumentBuilder, IndexingPlan};
pub use lifecycle::{IndexAction, LifecycleController, LifecycleStrategy, ManagedIndex, StartReport};
pub use memory::InMemoryCluster;
pub use names::IndexIdentity;
pub use settings::BackendSettings;
pub use type_name::{DocumentReference, TypeNameExtractor, TypeNameMapping};
pub use validator::MappingValidator;
pub use work::{Method, Request, Response};
