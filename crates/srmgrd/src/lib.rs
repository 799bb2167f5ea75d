//! Segment-routing manager daemon.
//!
//! `srmgrd` drives the `sroof-core` engine against a live controller:
//! it starts from a full installation (no prior installed state is
//! trusted), then polls the topology and runs one reconciliation pass
//! per observed change. Passes are strictly sequential — the loop
//! never starts a pass on a snapshot older than one already
//! reconciled.

mod daemon;

pub use daemon::{DaemonConfig, SrDaemon};
