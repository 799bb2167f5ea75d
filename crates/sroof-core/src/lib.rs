//! Control-plane engine for Segment Routing over OpenFlow.
//!
//! This crate maintains an in-memory model of a switched network's
//! topology, computes shortest forwarding paths between all switch
//! pairs, compiles those paths into per-switch MPLS flow rules, and
//! keeps the rules installed on the switches synchronized with
//! topology changes using a minimal-update reconciliation strategy.
//!
//! # Architecture
//!
//! 1. A [`TopologySource`] supplies raw node/link listings
//! 2. [`TopologyGraph`] filters and indexes them into an immutable
//!    snapshot
//! 3. The path engine ([`shortest_path`]) computes hop-count shortest
//!    paths with deterministic tie-breaking
//! 4. The flow compiler ([`compile_transit`], [`compile_default`],
//!    [`compile_service`]) turns routing decisions into
//!    [`FlowRule`] directives
//! 5. The [`Reconciler`] diffs two snapshots and pushes the minimal
//!    set of installs/removals through a [`FlowStore`]
//!
//! The crate performs no I/O of its own; the southbound and the
//! topology transport are reached only through the [`FlowStore`] and
//! [`TopologySource`] traits.
//!
//! # Example
//!
//! ```
//! use sroof_core::{RawTopology, Srgb, TopologyGraph, SwitchId, shortest_path};
//!
//! let raw: RawTopology = serde_json::from_str(r#"{
//!     "node": [{"node-id": "openflow:1"}, {"node-id": "openflow:2"}],
//!     "link": [
//!         {"link-id": "openflow:1:2",
//!          "source": {"source-node": "openflow:1", "source-tp": "openflow:1:2"},
//!          "destination": {"dest-node": "openflow:2"}},
//!         {"link-id": "openflow:2:1",
//!          "source": {"source-node": "openflow:2", "source-tp": "openflow:2:1"},
//!          "destination": {"dest-node": "openflow:1"}}
//!     ]
//! }"#).unwrap();
//!
//! let graph = TopologyGraph::from_raw(&raw);
//! let src = SwitchId::new("openflow:1");
//! let dst = SwitchId::new("openflow:2");
//! assert_eq!(shortest_path(&graph, &src, &dst).unwrap().len(), 2);
//! assert_eq!(Srgb::default().sid_for(&dst).unwrap(), 16002);
//! ```

mod error;
mod flow;
mod path;
mod reconcile;
mod sid;
mod store;
mod topology;

pub use error::{SrError, SrResult};
pub use flow::{
    compile_default, compile_service, compile_transit, default_rule_id, is_sr_rule_id,
    service_rule_keys, transit_rule_id, FlowAction, FlowMatch, FlowRule, ServiceRequest,
    ARP_ETHERTYPE, DEFAULT_ARP_LABEL, DEFAULT_IP_LABEL, DEFAULT_RULE_PRIORITY, IPV4_ETHERTYPE,
    MPLS_ETHERTYPE, SERVICE_RULE_PRIORITY, SR_TABLE, TABLE_CLASSIFIER, TRANSIT_RULE_PRIORITY,
};
pub use path::{next_hop, shortest_path};
pub use reconcile::{ReconcileReport, Reconciler};
pub use sid::{Srgb, DEFAULT_SRGB_START};
pub use store::{FlowStore, TopologySource};
pub use topology::{
    is_host_id, RawLink, RawLinkDestination, RawLinkSource, RawNode, RawTopology, SwitchId,
    TopologyGraph,
};
