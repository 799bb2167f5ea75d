//! Flow-rule directives and the path-to-rule compiler.
//!
//! A [`FlowRule`] is the unit of installed forwarding state: target
//! switch, deterministic rule id, match criteria, ordered action
//! list, priority and table. Three directive families exist:
//!
//! - *transit*: routes already-labeled traffic toward the switch the
//!   label identifies, popping the outer label at the penultimate hop
//! - *default*: low-priority per-switch rule steering unmatched
//!   MPLS traffic from the classifier table into the SR table
//! - *service*: ingress rules imposing the label stack for a traffic
//!   flow, and the mirrored egress rules removing it
//!
//! Compilation performs no I/O and never produces a partially filled
//! directive; malformed input is reported as a typed error.

use serde::{Deserialize, Serialize};

use crate::error::{SrError, SrResult};
use crate::sid::Srgb;
use crate::topology::{SwitchId, TopologyGraph};

/// MPLS unicast ethertype (0x8847).
pub const MPLS_ETHERTYPE: u16 = 34887;
/// IPv4 ethertype (0x0800).
pub const IPV4_ETHERTYPE: u16 = 2048;
/// ARP ethertype (0x0806).
pub const ARP_ETHERTYPE: u16 = 2054;

/// Classifier table every packet enters first.
pub const TABLE_CLASSIFIER: u8 = 0;
/// Table holding the segment-routing rules. Keeping SR rules out of
/// table 0 leaves room for feature rules that must win first.
pub const SR_TABLE: u8 = 1;

/// Priority of transit rules.
pub const TRANSIT_RULE_PRIORITY: u16 = 32767;
/// Priority of service ingress/egress rules.
pub const SERVICE_RULE_PRIORITY: u16 = 32000;
/// Priority of the per-switch default (goto) rule. Must lose against
/// everything else in the classifier table.
pub const DEFAULT_RULE_PRIORITY: u16 = 1;

/// Default MPLS label for a service's IP traffic.
pub const DEFAULT_IP_LABEL: u32 = 1001;
/// Default MPLS label for a service's ARP traffic.
pub const DEFAULT_ARP_LABEL: u32 = 1002;

/// Prefix shared by every rule id this engine installs. Rules not
/// carrying it are owned by somebody else and never touched.
const SR_RULE_ID_PREFIX: &str = "sr-";

/// Returns true if a rule id belongs to the segment-routing engine.
pub fn is_sr_rule_id(id: &str) -> bool {
    id.starts_with(SR_RULE_ID_PREFIX)
}

/// Rule id of the transit directive for a destination segment ID.
///
/// Derived from the destination SID only, so recompiling the same
/// (switch, destination) pair yields the same id and an upsert
/// replaces the previous directive in place.
pub fn transit_rule_id(dst_sid: u32) -> String {
    format!("{SR_RULE_ID_PREFIX}transit-{dst_sid}")
}

/// Rule id of the per-switch default (goto) directive.
pub fn default_rule_id() -> String {
    format!("{SR_RULE_ID_PREFIX}default-goto")
}

fn service_rule_id(label: u32, side: &str) -> String {
    format!("{SR_RULE_ID_PREFIX}service-{label}-{side}")
}

/// Match criteria of a flow rule. Unset fields are wildcards.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowMatch {
    /// Ethertype to match.
    pub ethertype: Option<u16>,
    /// MPLS label to match.
    pub mpls_label: Option<u32>,
    /// Ingress port to match.
    pub in_port: Option<String>,
}

impl FlowMatch {
    fn ethertype(ethertype: u16) -> Self {
        Self {
            ethertype: Some(ethertype),
            ..Self::default()
        }
    }

    fn mpls_label(label: u32) -> Self {
        Self {
            ethertype: Some(MPLS_ETHERTYPE),
            mpls_label: Some(label),
            in_port: None,
        }
    }

    fn ingress(ethertype: u16, in_port: &str) -> Self {
        Self {
            ethertype: Some(ethertype),
            mpls_label: None,
            in_port: Some(in_port.to_string()),
        }
    }
}

/// One forwarding action. Actions are applied in list order; label
/// pushes therefore stack LIFO, the last pushed label ending
/// outermost.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    /// Push an MPLS label onto the stack.
    PushMpls {
        /// The label value.
        label: u32,
    },
    /// Pop the outer MPLS label, exposing a payload of the given
    /// ethertype.
    PopMpls {
        /// Ethertype of the exposed payload.
        ethertype: u16,
    },
    /// Output on a port.
    Output {
        /// Port identifier (e.g. `openflow:1:2`).
        port: String,
    },
    /// Continue processing in another table.
    GotoTable {
        /// Target table id.
        table: u8,
    },
}

/// A forwarding-rule directive: derived state, recomputed on every
/// reconciliation pass and installed/removed through the flow store,
/// keyed by (switch, id) for idempotent upsert and delete.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FlowRule {
    /// Switch the rule is installed on.
    pub switch: SwitchId,
    /// Deterministic rule identifier.
    pub id: String,
    /// OpenFlow table the rule lives in.
    pub table: u8,
    /// Rule priority.
    pub priority: u16,
    /// Match criteria.
    pub matches: FlowMatch,
    /// Ordered action list.
    pub actions: Vec<FlowAction>,
}

/// A request to steer one traffic flow across the fabric, optionally
/// through explicit waypoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRequest {
    /// Switch the traffic enters the fabric on.
    pub ingress_switch: SwitchId,
    /// Port the traffic enters on.
    pub ingress_port: String,
    /// Switch the traffic leaves the fabric on.
    pub egress_switch: SwitchId,
    /// Port the traffic leaves on.
    pub egress_port: String,
    /// Service label for IP traffic.
    #[serde(default = "default_ip_label")]
    pub ip_label: u32,
    /// Service label for ARP traffic.
    #[serde(default = "default_arp_label")]
    pub arp_label: u32,
    /// Switches the path is explicitly steered through, in traversal
    /// order.
    #[serde(default)]
    pub waypoints: Vec<SwitchId>,
}

fn default_ip_label() -> u32 {
    DEFAULT_IP_LABEL
}

fn default_arp_label() -> u32 {
    DEFAULT_ARP_LABEL
}

/// Compiles the transit directive installed at `src` for traffic
/// labeled with `dst`'s segment ID.
///
/// The rule matches the destination SID and outputs on the egress
/// port toward `next_hop`. When `next_hop` is the destination itself
/// this switch is the penultimate hop and the rule additionally pops
/// the outer label first, so the destination receives an unwrapped
/// packet.
pub fn compile_transit(
    graph: &TopologyGraph,
    src: &SwitchId,
    dst: &SwitchId,
    next_hop: &SwitchId,
    srgb: &Srgb,
) -> SrResult<FlowRule> {
    let dst_sid = srgb.sid_for(dst)?;
    let port = graph
        .egress_port(src, next_hop)
        .ok_or_else(|| SrError::MissingEgressPort {
            src: src.clone(),
            dst: next_hop.clone(),
        })?;

    let mut actions = Vec::with_capacity(2);
    if next_hop == dst {
        actions.push(FlowAction::PopMpls {
            ethertype: MPLS_ETHERTYPE,
        });
    }
    actions.push(FlowAction::Output {
        port: port.to_string(),
    });

    Ok(FlowRule {
        switch: src.clone(),
        id: transit_rule_id(dst_sid),
        table: SR_TABLE,
        priority: TRANSIT_RULE_PRIORITY,
        matches: FlowMatch::mpls_label(dst_sid),
        actions,
    })
}

/// Compiles the per-switch default directive: a low-priority
/// classifier-table rule sending otherwise-unmatched MPLS traffic
/// into the SR table. Topology independent; one per switch.
pub fn compile_default(switch: &SwitchId) -> FlowRule {
    FlowRule {
        switch: switch.clone(),
        id: default_rule_id(),
        table: TABLE_CLASSIFIER,
        priority: DEFAULT_RULE_PRIORITY,
        matches: FlowMatch::ethertype(MPLS_ETHERTYPE),
        actions: vec![FlowAction::GotoTable { table: SR_TABLE }],
    }
}

/// Compiles a service request into its four directives: ingress-IP,
/// ingress-ARP, egress-IP, egress-ARP.
///
/// The ingress rules impose the label stack. Pushes are LIFO, so the
/// stack is built from the inside out: the service label first
/// (innermost, consumed at egress), then the egress switch's SID,
/// then the waypoint SIDs iterated in reverse traversal order so
/// that the first waypoint ends outermost and steers the packet
/// first. The egress rules pop the service label and output on the
/// egress port.
pub fn compile_service(req: &ServiceRequest, srgb: &Srgb) -> SrResult<Vec<FlowRule>> {
    let egress_sid = srgb.sid_for(&req.egress_switch)?;
    let mut waypoint_sids = Vec::with_capacity(req.waypoints.len());
    for wp in req.waypoints.iter().rev() {
        waypoint_sids.push(srgb.sid_for(wp)?);
    }

    let ingress = |service_label: u32, ethertype: u16, side: &str| -> FlowRule {
        let mut actions = vec![FlowAction::PushMpls {
            label: service_label,
        }];
        actions.push(FlowAction::PushMpls { label: egress_sid });
        actions.extend(
            waypoint_sids
                .iter()
                .map(|&label| FlowAction::PushMpls { label }),
        );
        actions.push(FlowAction::GotoTable { table: SR_TABLE });
        FlowRule {
            switch: req.ingress_switch.clone(),
            id: service_rule_id(service_label, side),
            table: TABLE_CLASSIFIER,
            priority: SERVICE_RULE_PRIORITY,
            matches: FlowMatch::ingress(ethertype, &req.ingress_port),
            actions,
        }
    };

    let egress = |service_label: u32, payload_ethertype: u16, side: &str| -> FlowRule {
        FlowRule {
            switch: req.egress_switch.clone(),
            id: service_rule_id(service_label, side),
            table: SR_TABLE,
            priority: SERVICE_RULE_PRIORITY,
            matches: FlowMatch::mpls_label(service_label),
            actions: vec![
                FlowAction::PopMpls {
                    ethertype: payload_ethertype,
                },
                FlowAction::Output {
                    port: req.egress_port.clone(),
                },
            ],
        }
    };

    Ok(vec![
        ingress(req.ip_label, IPV4_ETHERTYPE, "ingress"),
        ingress(req.arp_label, ARP_ETHERTYPE, "ingress"),
        egress(req.ip_label, IPV4_ETHERTYPE, "egress"),
        egress(req.arp_label, ARP_ETHERTYPE, "egress"),
    ])
}

/// The (switch, rule id) keys of the four directives a service
/// request compiles to. Teardown removes exactly these keys.
pub fn service_rule_keys(req: &ServiceRequest) -> Vec<(SwitchId, String)> {
    vec![
        (
            req.ingress_switch.clone(),
            service_rule_id(req.ip_label, "ingress"),
        ),
        (
            req.ingress_switch.clone(),
            service_rule_id(req.arp_label, "ingress"),
        ),
        (
            req.egress_switch.clone(),
            service_rule_id(req.ip_label, "egress"),
        ),
        (
            req.egress_switch.clone(),
            service_rule_id(req.arp_label, "egress"),
        ),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::topology::{RawLink, RawLinkDestination, RawLinkSource, RawNode, RawTopology};
    use pretty_assertions::assert_eq;

    fn chain() -> TopologyGraph {
        // openflow:1 -- openflow:2 -- openflow:3, both directions.
        let edges = [
            ("openflow:1", "openflow:2"),
            ("openflow:2", "openflow:1"),
            ("openflow:2", "openflow:3"),
            ("openflow:3", "openflow:2"),
        ];
        TopologyGraph::from_raw(&RawTopology {
            node: ["openflow:1", "openflow:2", "openflow:3"]
                .into_iter()
                .map(|n| RawNode {
                    node_id: n.to_string(),
                })
                .collect(),
            link: edges
                .into_iter()
                .map(|(a, b)| RawLink {
                    link_id: format!("{a}->{b}"),
                    source: RawLinkSource {
                        source_node: a.to_string(),
                        source_tp: Some(format!("{a}:{b}")),
                    },
                    destination: RawLinkDestination {
                        dest_node: b.to_string(),
                    },
                })
                .collect(),
        })
    }

    #[test]
    fn test_rule_id_predicate() {
        assert!(is_sr_rule_id(&transit_rule_id(16_003)));
        assert!(is_sr_rule_id(&default_rule_id()));
        assert!(is_sr_rule_id("sr-service-1001-ingress"));
        assert!(!is_sr_rule_id("lldp-flood"));
        assert!(!is_sr_rule_id(""));
    }

    #[test]
    fn test_transit_penultimate_hop_pops() {
        let g = chain();
        let srgb = Srgb::default();
        // openflow:2 is penultimate toward openflow:3.
        let rule = compile_transit(
            &g,
            &"openflow:2".into(),
            &"openflow:3".into(),
            &"openflow:3".into(),
            &srgb,
        )
        .unwrap();
        assert_eq!(rule.switch, "openflow:2".into());
        assert_eq!(rule.id, "sr-transit-16003");
        assert_eq!(rule.matches.mpls_label, Some(16_003));
        assert_eq!(rule.matches.ethertype, Some(MPLS_ETHERTYPE));
        assert_eq!(
            rule.actions,
            vec![
                FlowAction::PopMpls {
                    ethertype: MPLS_ETHERTYPE
                },
                FlowAction::Output {
                    port: "openflow:2:openflow:3".to_string()
                },
            ]
        );
    }

    #[test]
    fn test_transit_intermediate_hop_does_not_pop() {
        let g = chain();
        let rule = compile_transit(
            &g,
            &"openflow:1".into(),
            &"openflow:3".into(),
            &"openflow:2".into(),
            &Srgb::default(),
        )
        .unwrap();
        assert_eq!(
            rule.actions,
            vec![FlowAction::Output {
                port: "openflow:1:openflow:2".to_string()
            }]
        );
    }

    #[test]
    fn test_transit_is_deterministic() {
        let g = chain();
        let srgb = Srgb::default();
        let a = compile_transit(
            &g,
            &"openflow:1".into(),
            &"openflow:3".into(),
            &"openflow:2".into(),
            &srgb,
        )
        .unwrap();
        let b = compile_transit(
            &g,
            &"openflow:1".into(),
            &"openflow:3".into(),
            &"openflow:2".into(),
            &srgb,
        )
        .unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_transit_missing_port_is_typed_error() {
        let g = chain();
        let err = compile_transit(
            &g,
            &"openflow:1".into(),
            &"openflow:3".into(),
            &"openflow:3".into(),
            &Srgb::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SrError::MissingEgressPort { .. }));
    }

    #[test]
    fn test_transit_invalid_switch_id() {
        let g = chain();
        let err = compile_transit(
            &g,
            &"openflow:1".into(),
            &"weird".into(),
            &"openflow:2".into(),
            &Srgb::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SrError::InvalidSwitchIdentifier { .. }));
    }

    #[test]
    fn test_default_rule() {
        let rule = compile_default(&"openflow:5".into());
        assert_eq!(rule.id, "sr-default-goto");
        assert_eq!(rule.table, TABLE_CLASSIFIER);
        assert_eq!(rule.priority, DEFAULT_RULE_PRIORITY);
        assert_eq!(rule.actions, vec![FlowAction::GotoTable { table: SR_TABLE }]);
    }

    fn service_request(waypoints: &[&str]) -> ServiceRequest {
        ServiceRequest {
            ingress_switch: "openflow:1".into(),
            ingress_port: "openflow:1:9".to_string(),
            egress_switch: "openflow:4".into(),
            egress_port: "openflow:4:9".to_string(),
            ip_label: DEFAULT_IP_LABEL,
            arp_label: DEFAULT_ARP_LABEL,
            waypoints: waypoints.iter().map(|w| SwitchId::new(*w)).collect(),
        }
    }

    /// Returns the pushed labels of a rule, in push order.
    fn pushed_labels(rule: &FlowRule) -> Vec<u32> {
        rule.actions
            .iter()
            .filter_map(|a| match a {
                FlowAction::PushMpls { label } => Some(*label),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_service_label_stacking_order() {
        // Waypoints [W1=openflow:2, W2=openflow:3]: destination SID
        // is pushed before any waypoint, SID(W2) ends innermost of
        // the waypoints and SID(W1) outermost (pushed last).
        let rules = compile_service(&service_request(&["openflow:2", "openflow:3"]), &Srgb::default())
            .unwrap();
        let ingress_ip = &rules[0];
        assert_eq!(
            pushed_labels(ingress_ip),
            vec![DEFAULT_IP_LABEL, 16_004, 16_003, 16_002]
        );
    }

    #[test]
    fn test_service_empty_waypoints_degenerates() {
        let rules = compile_service(&service_request(&[]), &Srgb::default()).unwrap();
        assert_eq!(pushed_labels(&rules[0]), vec![DEFAULT_IP_LABEL, 16_004]);
        assert_eq!(pushed_labels(&rules[1]), vec![DEFAULT_ARP_LABEL, 16_004]);
    }

    #[test]
    fn test_service_push_pop_round_trip() {
        // Simulate the forwarding path: pop the stack LIFO and check
        // the traversal order matches the waypoint list, then the
        // egress switch, then the service label.
        let rules = compile_service(&service_request(&["openflow:2", "openflow:3"]), &Srgb::default())
            .unwrap();
        let mut stack = pushed_labels(&rules[0]);
        let mut visited = Vec::new();
        while let Some(label) = stack.pop() {
            visited.push(label);
        }
        assert_eq!(visited, vec![16_002, 16_003, 16_004, DEFAULT_IP_LABEL]);
    }

    #[test]
    fn test_service_four_rules_and_sides() {
        let req = service_request(&[]);
        let rules = compile_service(&req, &Srgb::default()).unwrap();
        assert_eq!(rules.len(), 4);

        // Ingress rules live on the ingress switch and match the
        // ingress port; egress rules mirror on the egress switch.
        assert_eq!(rules[0].switch, req.ingress_switch);
        assert_eq!(rules[0].matches.ethertype, Some(IPV4_ETHERTYPE));
        assert_eq!(rules[0].matches.in_port.as_deref(), Some("openflow:1:9"));
        assert_eq!(rules[1].matches.ethertype, Some(ARP_ETHERTYPE));

        assert_eq!(rules[2].switch, req.egress_switch);
        assert_eq!(rules[2].matches.mpls_label, Some(DEFAULT_IP_LABEL));
        assert_eq!(
            rules[2].actions,
            vec![
                FlowAction::PopMpls {
                    ethertype: IPV4_ETHERTYPE
                },
                FlowAction::Output {
                    port: "openflow:4:9".to_string()
                },
            ]
        );
        assert_eq!(rules[3].matches.mpls_label, Some(DEFAULT_ARP_LABEL));
    }

    #[test]
    fn test_service_rule_keys_mirror_compiled_rules() {
        let req = service_request(&["openflow:2"]);
        let rules = compile_service(&req, &Srgb::default()).unwrap();
        let keys = service_rule_keys(&req);
        let compiled: Vec<(SwitchId, String)> = rules
            .iter()
            .map(|r| (r.switch.clone(), r.id.clone()))
            .collect();
        assert_eq!(keys, compiled);
    }
}
