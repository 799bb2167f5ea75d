//! Error types for the control-plane engine.
//!
//! All errors implement `std::error::Error` via `thiserror`. Two of
//! them are expected decision branches rather than defects:
//! [`SrError::NoPathFound`] (disconnected switch pair) and skipped
//! malformed topology records.

use thiserror::Error;

use crate::topology::SwitchId;

/// Result type alias for engine operations.
pub type SrResult<T> = Result<T, SrError>;

/// Errors that can occur in the control-plane engine and its
/// collaborators.
#[derive(Debug, Clone, Error)]
pub enum SrError {
    /// A raw topology record could not be parsed into a switch or
    /// link. The record is skipped; never fatal for the snapshot.
    #[error("malformed topology record: {reason}")]
    MalformedTopologyData {
        /// What was wrong with the record.
        reason: String,
    },

    /// A switch identifier does not carry a parseable numeric suffix,
    /// so no segment ID can be derived from it.
    #[error("invalid switch identifier '{id}': {reason}")]
    InvalidSwitchIdentifier {
        /// The offending identifier.
        id: String,
        /// Why it could not be parsed.
        reason: String,
    },

    /// No path exists between two switches. An expected outcome on a
    /// disconnected graph; callers branch on it instead of logging it
    /// above informational level.
    #[error("no path from '{src}' to '{dst}'")]
    NoPathFound {
        /// Path source.
        src: SwitchId,
        /// Path destination.
        dst: SwitchId,
    },

    /// The topology carries no egress port annotation for a link the
    /// compiler needs.
    #[error("no egress port on link {src} -> {dst}")]
    MissingEgressPort {
        /// Link source.
        src: SwitchId,
        /// Link destination.
        dst: SwitchId,
    },

    /// A southbound install or removal failed. Logged per directive;
    /// never aborts a reconciliation pass.
    #[error("flow store {operation} failed for {switch}/{rule_id}: {reason}")]
    FlowStoreFailure {
        /// "upsert" or "remove".
        operation: String,
        /// Target switch.
        switch: SwitchId,
        /// Rule identifier.
        rule_id: String,
        /// Reason reported by the store.
        reason: String,
    },

    /// The topology fetch failed. Propagated to the driving loop,
    /// which backs off and retries instead of reconciling against
    /// partial data.
    #[error("topology transport failed: {reason}")]
    Transport {
        /// Reason reported by the transport.
        reason: String,
    },
}

impl SrError {
    /// Creates a malformed-topology-record error.
    pub fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedTopologyData {
            reason: reason.into(),
        }
    }

    /// Creates an invalid-switch-identifier error.
    pub fn invalid_switch_id(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSwitchIdentifier {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a flow store failure.
    pub fn flow_store(
        operation: impl Into<String>,
        switch: SwitchId,
        rule_id: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::FlowStoreFailure {
            operation: operation.into(),
            switch,
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    /// Creates a transport error.
    pub fn transport(reason: impl Into<String>) -> Self {
        Self::Transport {
            reason: reason.into(),
        }
    }

    /// Returns true if this error indicates a transient condition
    /// that may succeed on a later pass.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            SrError::FlowStoreFailure { .. } | SrError::Transport { .. }
        )
    }

    /// Returns true if this error is an expected decision branch
    /// rather than a defect (disconnected pair).
    pub fn is_no_path(&self) -> bool {
        matches!(self, SrError::NoPathFound { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SrError::invalid_switch_id("openflow:x", "suffix is not an integer");
        assert_eq!(
            err.to_string(),
            "invalid switch identifier 'openflow:x': suffix is not an integer"
        );
    }

    #[test]
    fn test_flow_store_display() {
        let err = SrError::flow_store(
            "upsert",
            SwitchId::new("openflow:1"),
            "sr-transit-16003",
            "connection refused",
        );
        assert!(err.to_string().contains("openflow:1/sr-transit-16003"));
        assert!(err.to_string().contains("connection refused"));
    }

    #[test]
    fn test_is_retryable() {
        assert!(SrError::transport("timeout").is_retryable());
        assert!(!SrError::malformed("missing source-tp").is_retryable());
        assert!(!SrError::invalid_switch_id("x", "no delimiter").is_retryable());
    }

    #[test]
    fn test_no_path_is_expected() {
        let err = SrError::NoPathFound {
            src: SwitchId::new("openflow:1"),
            dst: SwitchId::new("openflow:9"),
        };
        assert!(err.is_no_path());
        assert!(!err.is_retryable());
    }
}
