//! RESTCONF southbound for the sroof control plane.
//!
//! This crate holds everything that talks to the OpenFlow controller
//! over HTTP: endpoint configuration, the thin RESTCONF client, the
//! mapping between [`sroof_core::FlowRule`] directives and
//! OpenDaylight `flow-node-inventory` payloads, and the
//! [`sroof_core::FlowStore`] / [`sroof_core::TopologySource`]
//! implementations the engine is driven with.
//!
//! None of the algorithmic content lives here; this is deliberately a
//! thin I/O wrapper around `sroof-core`'s collaborator contracts.

mod config;
mod payload;
mod rest;

pub use config::{ConfigError, ControllerConfig};
pub use payload::{FlowEnvelope, FlowSummary, OdlFlow, TopologyEnvelope};
pub use rest::{RestClient, RestFlowStore, RestTopologySource};
