//! Collaborator traits: the southbound flow store and the topology
//! source.
//!
//! The engine decides everything from its own snapshot pair and never
//! reads installed state back; it only depends on the installation
//! contract below. Implementations live outside this crate (the REST
//! southbound in `sroof-client`, recording mocks in tests).

use async_trait::async_trait;

use crate::error::SrResult;
use crate::flow::FlowRule;
use crate::topology::{RawTopology, SwitchId};

/// Southbound sink for rule directives, keyed by (switch, rule id).
///
/// Both operations must be idempotent: upserting an identical
/// directive twice, or removing an already-absent rule, succeeds
/// without error. Retry policy lives behind this trait, not in the
/// engine.
#[async_trait]
pub trait FlowStore: Send + Sync {
    /// Installs or replaces a directive. An upsert with an unchanged
    /// directive is a no-op on the switch.
    async fn upsert(&self, rule: &FlowRule) -> SrResult<()>;

    /// Removes the directive with the given key, succeeding if it is
    /// already absent.
    async fn remove(&self, switch: &SwitchId, rule_id: &str) -> SrResult<()>;
}

/// Supplier of topology snapshots.
#[async_trait]
pub trait TopologySource: Send + Sync {
    /// Fetches the current raw topology listing.
    ///
    /// Fails with [`crate::SrError::Transport`] when the controller
    /// is unreachable; the driving loop backs off and retries rather
    /// than reconciling against partial data.
    async fn fetch_topology(&self) -> SrResult<RawTopology>;
}
