//! Snapshot-to-snapshot reconciliation: the diff-and-patch engine.
//!
//! Given an old and a new topology snapshot, the reconciler emits the
//! minimal set of rule installs and removals that brings installed
//! switch state in line with the new snapshot's shortest-path plan.
//! Switches fall into three cases per pass:
//!
//! - *removed* (in old only): every directive previously installed
//!   there is removed
//! - *added* (in new only): full installation, default directive
//!   first, then one transit directive per reachable destination
//! - *retained* (in both): per destination, the next hop computed
//!   from old is compared against the one computed from new; only
//!   changed pairs result in a store call
//!
//! The common case after a small topology change is that most next
//! hops are unchanged, which is why the engine diffs instead of
//! re-flushing everything.
//!
//! A directive failure is logged and skipped; the pass continues so
//! partial failure never blocks convergence of the unaffected part of
//! the network. Retry happens on the next pass, through the store's
//! own policy. Passes over one topology stream must be serialized by
//! the caller; a stale pass could otherwise undo a newer one.

use std::collections::BTreeSet;

use tracing::{debug, info, warn};

use crate::flow::{compile_default, compile_transit, default_rule_id, transit_rule_id, FlowRule};
use crate::path::next_hop;
use crate::sid::Srgb;
use crate::store::FlowStore;
use crate::topology::{SwitchId, TopologyGraph};

/// Outcome counters of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Directives successfully installed or overwritten.
    pub installed: usize,
    /// Directives successfully removed.
    pub removed: usize,
    /// Directives that failed to compile, install or remove.
    pub failed: usize,
    /// True if the pass was short-circuited because the snapshots
    /// were structurally equal.
    pub skipped: bool,
}

impl ReconcileReport {
    /// Total number of store calls that succeeded.
    pub fn changes(&self) -> usize {
        self.installed + self.removed
    }
}

/// The reconciliation engine. Holds only the SRGB configuration; all
/// per-pass state lives on the stack, so a pass is a synchronous
/// computation over the immutable snapshot pair, with the store calls
/// as its only suspension points.
#[derive(Debug, Clone, Copy, Default)]
pub struct Reconciler {
    srgb: Srgb,
}

impl Reconciler {
    /// Creates a reconciler allocating SIDs from the given block.
    pub fn new(srgb: Srgb) -> Self {
        Self { srgb }
    }

    /// Returns the SRGB in use.
    pub fn srgb(&self) -> &Srgb {
        &self.srgb
    }

    /// Full installation against `new`, trusting no prior installed
    /// state: every switch goes through the added-switch path.
    ///
    /// Used at startup and for initial convergence.
    pub async fn full_sync(&self, new: &TopologyGraph, store: &dyn FlowStore) -> ReconcileReport {
        self.run(&TopologyGraph::new(), new, store, false).await
    }

    /// One incremental pass from `old` to `new`.
    ///
    /// Structurally equal snapshots short-circuit the pass with zero
    /// store calls.
    pub async fn reconcile(
        &self,
        old: &TopologyGraph,
        new: &TopologyGraph,
        store: &dyn FlowStore,
    ) -> ReconcileReport {
        self.run(old, new, store, true).await
    }

    async fn run(
        &self,
        old: &TopologyGraph,
        new: &TopologyGraph,
        store: &dyn FlowStore,
        skip_if_equal: bool,
    ) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        if skip_if_equal && old == new {
            debug!("snapshots structurally equal, nothing to reconcile");
            report.skipped = true;
            return report;
        }

        for switch in old.switches() {
            if !new.contains(switch) {
                self.teardown_switch(old, switch, store, &mut report).await;
            }
        }

        for switch in new.switches() {
            if old.contains(switch) {
                self.update_switch(old, new, switch, store, &mut report).await;
            } else {
                self.install_switch(new, switch, store, &mut report).await;
            }
        }

        info!(
            installed = report.installed,
            removed = report.removed,
            failed = report.failed,
            "reconciliation pass complete"
        );
        report
    }

    /// Removed switch: delete its default directive and every transit
    /// directive it previously carried.
    async fn teardown_switch(
        &self,
        old: &TopologyGraph,
        switch: &SwitchId,
        store: &dyn FlowStore,
        report: &mut ReconcileReport,
    ) {
        debug!(%switch, "switch removed from topology, tearing down its rules");
        self.remove(store, switch, &default_rule_id(), report).await;

        for dst in old.switches() {
            if dst == switch || next_hop(old, switch, dst).is_none() {
                continue;
            }
            match self.srgb.sid_for(dst) {
                Ok(sid) => {
                    self.remove(store, switch, &transit_rule_id(sid), report)
                        .await;
                }
                Err(err) => {
                    warn!(%switch, %dst, %err, "cannot derive SID for teardown");
                    report.failed += 1;
                }
            }
        }
    }

    /// Added switch: default directive first, then a transit
    /// directive for every reachable destination.
    async fn install_switch(
        &self,
        new: &TopologyGraph,
        switch: &SwitchId,
        store: &dyn FlowStore,
        report: &mut ReconcileReport,
    ) {
        debug!(%switch, "new switch, running full installation");
        // The default (goto) rule must be in place before the transit
        // rules are relied upon.
        self.upsert(store, &compile_default(switch), report).await;

        for dst in new.switches() {
            if dst == switch {
                continue;
            }
            match next_hop(new, switch, dst) {
                Some(nh) => self.install_transit(new, switch, dst, &nh, store, report).await,
                None => debug!(%switch, %dst, "no path, no transit rule"),
            }
        }
    }

    /// Retained switch: per destination, compare old and new next
    /// hops and only touch the pairs that changed.
    async fn update_switch(
        &self,
        old: &TopologyGraph,
        new: &TopologyGraph,
        switch: &SwitchId,
        store: &dyn FlowStore,
        report: &mut ReconcileReport,
    ) {
        let destinations: BTreeSet<&SwitchId> = old
            .switches()
            .chain(new.switches())
            .filter(|dst| *dst != switch)
            .collect();

        for dst in destinations {
            let old_nh = next_hop(old, switch, dst);
            let new_nh = next_hop(new, switch, dst);
            match (old_nh, new_nh) {
                (Some(o), Some(n)) if o == n => {
                    // Unchanged routing; the installed directive is
                    // still correct. The common case.
                }
                (Some(_), None) => match self.srgb.sid_for(dst) {
                    Ok(sid) => {
                        debug!(%switch, %dst, "destination unreachable, removing transit rule");
                        self.remove(store, switch, &transit_rule_id(sid), report)
                            .await;
                    }
                    Err(err) => {
                        warn!(%switch, %dst, %err, "cannot derive SID for removal");
                        report.failed += 1;
                    }
                },
                (_, Some(nh)) => {
                    self.install_transit(new, switch, dst, &nh, store, report)
                        .await;
                }
                (None, None) => {}
            }
        }
    }

    async fn install_transit(
        &self,
        new: &TopologyGraph,
        switch: &SwitchId,
        dst: &SwitchId,
        nh: &SwitchId,
        store: &dyn FlowStore,
        report: &mut ReconcileReport,
    ) {
        match compile_transit(new, switch, dst, nh, &self.srgb) {
            Ok(rule) => self.upsert(store, &rule, report).await,
            Err(err) => {
                warn!(%switch, %dst, %err, "cannot compile transit rule");
                report.failed += 1;
            }
        }
    }

    async fn upsert(&self, store: &dyn FlowStore, rule: &FlowRule, report: &mut ReconcileReport) {
        match store.upsert(rule).await {
            Ok(()) => {
                debug!(switch = %rule.switch, rule = %rule.id, "installed");
                report.installed += 1;
            }
            Err(err) => {
                warn!(switch = %rule.switch, rule = %rule.id, %err, "install failed, continuing");
                report.failed += 1;
            }
        }
    }

    async fn remove(
        &self,
        store: &dyn FlowStore,
        switch: &SwitchId,
        rule_id: &str,
        report: &mut ReconcileReport,
    ) {
        match store.remove(switch, rule_id).await {
            Ok(()) => {
                debug!(%switch, rule = %rule_id, "removed");
                report.removed += 1;
            }
            Err(err) => {
                warn!(%switch, rule = %rule_id, %err, "removal failed, continuing");
                report.failed += 1;
            }
        }
    }
}
