//! Topology model: raw RESTCONF records and the switch graph.
//!
//! Raw records mirror the `network-topology` model exposed by the
//! controller. They are validated at this boundary and turned into a
//! [`TopologyGraph`]: an immutable directed graph of switches and
//! links, where every edge carries the egress port of its source
//! switch. Host-attachment nodes and links are filtered out; the
//! graph only models the switch-to-switch fabric.
//!
//! A new graph is built for every topology observation and never
//! mutated in place, so a reconciliation pass always works on a
//! stable pair of snapshots.

use std::collections::BTreeMap;
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Marker substring identifying host-attachment nodes and links in
/// controller topology data (e.g. `host:aa:bb:cc:dd:ee:ff`).
const HOST_ID_MARKER: &str = "host";

/// Unique switch identifier, e.g. `openflow:1`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwitchId(String);

impl SwitchId {
    /// Creates a switch identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Returns the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SwitchId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SwitchId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

/// Returns true if a topology identifier denotes an end host rather
/// than a switch.
///
/// The controller reports host attachment points as nodes/links whose
/// identifier contains a `host` marker; those never take part in the
/// switch fabric.
pub fn is_host_id(id: &str) -> bool {
    id.contains(HOST_ID_MARKER)
}

/// Raw topology listing as fetched from the controller.
///
/// Both lists default to empty: a snapshot with zero switches is a
/// valid (empty) topology, not an error.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTopology {
    /// Raw node entries.
    #[serde(default)]
    pub node: Vec<RawNode>,
    /// Raw link entries.
    #[serde(default)]
    pub link: Vec<RawLink>,
}

/// Raw node entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawNode {
    /// Node identifier (`openflow:<n>` for switches).
    #[serde(rename = "node-id")]
    pub node_id: String,
}

/// Raw link entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLink {
    /// Link identifier.
    #[serde(rename = "link-id")]
    pub link_id: String,
    /// Source endpoint.
    pub source: RawLinkSource,
    /// Destination endpoint.
    pub destination: RawLinkDestination,
}

/// Source endpoint of a raw link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLinkSource {
    /// Source switch identifier.
    #[serde(rename = "source-node")]
    pub source_node: String,
    /// Egress port on the source switch. Links without it are
    /// invalid and excluded from the graph.
    #[serde(rename = "source-tp", default)]
    pub source_tp: Option<String>,
}

/// Destination endpoint of a raw link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawLinkDestination {
    /// Destination switch identifier.
    #[serde(rename = "dest-node")]
    pub dest_node: String,
}

/// Immutable snapshot of the switch fabric at one point in time.
///
/// Vertices are switches; edges are directed links annotated with the
/// source switch's egress port. Construction never fails: records
/// lacking required fields are skipped.
#[derive(Debug, Clone, Default)]
pub struct TopologyGraph {
    graph: DiGraph<SwitchId, String>,
    index: BTreeMap<SwitchId, NodeIndex>,
}

impl TopologyGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a graph from a raw topology listing.
    ///
    /// Host nodes and host links are filtered out. Links without an
    /// egress port, with unknown endpoints, or forming self-loops are
    /// skipped with a debug log. If the source data contains
    /// duplicate links for the same ordered switch pair, the last one
    /// wins.
    pub fn from_raw(raw: &RawTopology) -> Self {
        let mut g = Self::new();

        for node in &raw.node {
            if is_host_id(&node.node_id) {
                continue;
            }
            g.insert_switch(SwitchId::new(&node.node_id));
        }

        for link in &raw.link {
            if is_host_id(&link.link_id) {
                continue;
            }
            let Some(source_tp) = link.source.source_tp.as_deref() else {
                debug!(link = %link.link_id, "skipping link without source-tp");
                continue;
            };
            let src = SwitchId::new(&link.source.source_node);
            let dst = SwitchId::new(&link.destination.dest_node);
            if !g.insert_link(&src, &dst, source_tp) {
                debug!(link = %link.link_id, "skipping link with unknown endpoint or self-loop");
            }
        }

        g
    }

    fn insert_switch(&mut self, id: SwitchId) -> NodeIndex {
        match self.index.get(&id) {
            Some(ix) => *ix,
            None => {
                let ix = self.graph.add_node(id.clone());
                self.index.insert(id, ix);
                ix
            }
        }
    }

    fn insert_link(&mut self, src: &SwitchId, dst: &SwitchId, source_tp: &str) -> bool {
        if src == dst {
            return false;
        }
        let (Some(&six), Some(&dix)) = (self.index.get(src), self.index.get(dst)) else {
            return false;
        };
        // Last write wins on duplicate ordered pairs.
        self.graph.update_edge(six, dix, source_tp.to_string());
        true
    }

    /// Returns true if the switch is a vertex of this graph.
    pub fn contains(&self, id: &SwitchId) -> bool {
        self.index.contains_key(id)
    }

    /// Number of switches in the graph.
    pub fn switch_count(&self) -> usize {
        self.index.len()
    }

    /// Returns true if the graph has no switches.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Enumerates the switches in lexicographic order.
    pub fn switches(&self) -> impl Iterator<Item = &SwitchId> {
        self.index.keys()
    }

    /// Out-neighbors of a switch with the egress ports toward them,
    /// in lexicographic order of the neighbor identifier.
    ///
    /// The fixed order keeps everything downstream (path tie-breaks,
    /// reconciliation) deterministic for a given graph.
    pub fn neighbors(&self, id: &SwitchId) -> Vec<(&SwitchId, &str)> {
        let Some(&ix) = self.index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<(&SwitchId, &str)> = self
            .graph
            .edges(ix)
            .map(|e| (&self.graph[e.target()], e.weight().as_str()))
            .collect();
        out.sort_by(|a, b| a.0.cmp(b.0));
        out
    }

    /// Egress port on `src` for the direct link to `dst`, if one
    /// exists.
    pub fn egress_port(&self, src: &SwitchId, dst: &SwitchId) -> Option<&str> {
        let (&six, &dix) = (self.index.get(src)?, self.index.get(dst)?);
        self.graph
            .find_edge(six, dix)
            .map(|e| self.graph[e].as_str())
    }

    fn edge_map(&self, id: &SwitchId) -> BTreeMap<&SwitchId, &str> {
        self.neighbors(id).into_iter().collect()
    }
}

/// Structural equality: same vertex set and, for every vertex, the
/// same edge-to-port mapping. Independent of enumeration or insertion
/// order.
impl PartialEq for TopologyGraph {
    fn eq(&self, other: &Self) -> bool {
        if self.index.len() != other.index.len() {
            return false;
        }
        self.index.keys().all(|id| {
            other.index.contains_key(id) && self.edge_map(id) == other.edge_map(id)
        })
    }
}

impl Eq for TopologyGraph {}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn raw_link(id: &str, src: &str, tp: Option<&str>, dst: &str) -> RawLink {
        RawLink {
            link_id: id.to_string(),
            source: RawLinkSource {
                source_node: src.to_string(),
                source_tp: tp.map(str::to_string),
            },
            destination: RawLinkDestination {
                dest_node: dst.to_string(),
            },
        }
    }

    fn raw(nodes: &[&str], links: Vec<RawLink>) -> RawTopology {
        RawTopology {
            node: nodes
                .iter()
                .map(|n| RawNode {
                    node_id: n.to_string(),
                })
                .collect(),
            link: links,
        }
    }

    #[test]
    fn test_host_predicate() {
        assert!(is_host_id("host:62:59:82:1a:b6:95"));
        assert!(is_host_id("openflow:1/host:2"));
        assert!(!is_host_id("openflow:1"));
        assert!(!is_host_id("openflow:1:2"));
    }

    #[test]
    fn test_empty_snapshot_is_valid() {
        let g = TopologyGraph::from_raw(&RawTopology::default());
        assert!(g.is_empty());
        assert_eq!(g.switch_count(), 0);
    }

    #[test]
    fn test_hosts_filtered_out() {
        let g = TopologyGraph::from_raw(&raw(
            &["openflow:1", "host:aa:bb"],
            vec![
                raw_link("host:aa:bb/1", "host:aa:bb", Some("p"), "openflow:1"),
                raw_link("openflow:1:1", "openflow:1", Some("openflow:1:1"), "host:aa:bb"),
            ],
        ));
        assert_eq!(g.switch_count(), 1);
        assert!(g.contains(&SwitchId::new("openflow:1")));
        assert!(g.neighbors(&SwitchId::new("openflow:1")).is_empty());
    }

    #[test]
    fn test_link_without_port_skipped() {
        let g = TopologyGraph::from_raw(&raw(
            &["openflow:1", "openflow:2"],
            vec![raw_link("l1", "openflow:1", None, "openflow:2")],
        ));
        assert_eq!(g.switch_count(), 2);
        assert!(g
            .egress_port(&"openflow:1".into(), &"openflow:2".into())
            .is_none());
    }

    #[test]
    fn test_self_loop_and_unknown_endpoint_skipped() {
        let g = TopologyGraph::from_raw(&raw(
            &["openflow:1"],
            vec![
                raw_link("l1", "openflow:1", Some("p1"), "openflow:1"),
                raw_link("l2", "openflow:1", Some("p1"), "openflow:9"),
            ],
        ));
        assert!(g.neighbors(&"openflow:1".into()).is_empty());
    }

    #[test]
    fn test_duplicate_link_last_write_wins() {
        let g = TopologyGraph::from_raw(&raw(
            &["openflow:1", "openflow:2"],
            vec![
                raw_link("l1", "openflow:1", Some("openflow:1:1"), "openflow:2"),
                raw_link("l2", "openflow:1", Some("openflow:1:2"), "openflow:2"),
            ],
        ));
        assert_eq!(
            g.egress_port(&"openflow:1".into(), &"openflow:2".into()),
            Some("openflow:1:2")
        );
    }

    #[test]
    fn test_neighbors_sorted() {
        let g = TopologyGraph::from_raw(&raw(
            &["openflow:2", "openflow:1", "openflow:10"],
            vec![
                raw_link("a", "openflow:2", Some("p1"), "openflow:1"),
                raw_link("b", "openflow:2", Some("p2"), "openflow:10"),
            ],
        ));
        let n: Vec<&str> = g
            .neighbors(&"openflow:2".into())
            .into_iter()
            .map(|(s, _)| s.as_str())
            .collect();
        // Lexicographic, not numeric: "openflow:1" < "openflow:10".
        assert_eq!(n, vec!["openflow:1", "openflow:10"]);
    }

    #[test]
    fn test_structural_equality_ignores_order() {
        let a = TopologyGraph::from_raw(&raw(
            &["openflow:1", "openflow:2"],
            vec![
                raw_link("l1", "openflow:1", Some("p1"), "openflow:2"),
                raw_link("l2", "openflow:2", Some("p2"), "openflow:1"),
            ],
        ));
        let b = TopologyGraph::from_raw(&raw(
            &["openflow:2", "openflow:1"],
            vec![
                raw_link("l2", "openflow:2", Some("p2"), "openflow:1"),
                raw_link("l1", "openflow:1", Some("p1"), "openflow:2"),
            ],
        ));
        assert_eq!(a, b);
    }

    #[test]
    fn test_structural_inequality() {
        let a = TopologyGraph::from_raw(&raw(
            &["openflow:1", "openflow:2"],
            vec![raw_link("l1", "openflow:1", Some("p1"), "openflow:2")],
        ));
        let b = TopologyGraph::from_raw(&raw(
            &["openflow:1", "openflow:2"],
            vec![raw_link("l1", "openflow:1", Some("p9"), "openflow:2")],
        ));
        let c = TopologyGraph::from_raw(&raw(&["openflow:1"], vec![]));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_from_restconf_json() {
        let raw: RawTopology = serde_json::from_str(
            r#"{
                "topology-id": "flow:1",
                "node": [
                    {"node-id": "openflow:1"},
                    {"node-id": "openflow:2"},
                    {"node-id": "host:32:99:81:94:b9:c2"}
                ],
                "link": [
                    {"link-id": "openflow:1:2",
                     "source": {"source-node": "openflow:1", "source-tp": "openflow:1:2"},
                     "destination": {"dest-node": "openflow:2", "dest-tp": "openflow:2:1"}}
                ]
            }"#,
        )
        .unwrap();
        let g = TopologyGraph::from_raw(&raw);
        assert_eq!(g.switch_count(), 2);
        assert_eq!(
            g.egress_port(&"openflow:1".into(), &"openflow:2".into()),
            Some("openflow:1:2")
        );
    }
}
