//! Index manager lifecycle state.
//!
//! Provides [`IndexState`] and [`IndexStateHandle`] for observing where each
//! managed index is in its start/stop protocol.
//!
//! # Usage
//!
//! ```rust
//! use quarry_core::state::{IndexStateHandle, IndexState};
//!
//! let handle = IndexStateHandle::new("books");
//! assert_eq!(handle.state(), IndexState::Stopped);
//!
//! handle.set_state(IndexState::Starting);
//! handle.set_state(IndexState::Ready);
//! assert!(handle.state().is_ready());
//! ```

use std::fmt;
use std::sync::Arc;
use tokio::sync::watch;

// ============================================================================
// IndexState
// ============================================================================

/// State of a managed index.
#[derive(Clone, Debug, PartialEq)]
pub enum IndexState {
    /// Not started, or stopped.
    Stopped,
    /// The lifecycle strategy is running (create, validate, update...).
    Starting,
    /// The index is usable.
    Ready,
    /// Shutdown actions are running.
    Stopping,
    /// Start failed.
    Failed(String),
}

impl IndexState {
    /// Returns `true` if the index is usable.
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    /// Returns `true` for states that will not change on their own.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Stopped | Self::Ready | Self::Failed(_))
    }
}

impl fmt::Display for IndexState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Starting => write!(f, "starting"),
            Self::Ready => write!(f, "ready"),
            Self::Stopping => write!(f, "stopping"),
            Self::Failed(reason) => write!(f, "failed: {reason}"),
        }
    }
}

// ============================================================================
// IndexStateHandle
// ============================================================================

/// Shared handle for observing and updating one index's state.
///
/// Cheap to clone. Changes are broadcast to subscribers through a watch
/// channel.
#[derive(Clone)]
pub struct IndexStateHandle {
    inner: Arc<Inner>,
}

struct Inner {
    index_name: String,
    tx: watch::Sender<IndexState>,
}

impl IndexStateHandle {
    /// Create a handle for `index_name`, initially [`IndexState::Stopped`].
    pub fn new(index_name: impl Into<String>) -> Self {
        let (tx, _rx) = watch::channel(IndexState::Stopped);
        Self {
            inner: Arc::new(Inner {
                index_name: index_name.into(),
                tx,
            }),
        }
    }

    /// The index this handle tracks.
    pub fn index_name(&self) -> &str {
        &self.inner.index_name
    }

    /// Current state.
    pub fn state(&self) -> IndexState {
        self.inner.tx.borrow().clone()
    }

    /// Update the state and notify subscribers.
    pub fn set_state(&self, state: IndexState) {
        log::info!("Index '{}' -> {state}", self.inner.index_name);
        self.inner.tx.send_replace(state);
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<IndexState> {
        self.inner.tx.subscribe()
    }
}

impl fmt::Debug for IndexStateHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IndexStateHandle")
            .field("index_name", &self.inner.index_name)
            .field("state", &self.state())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
