//! OpenDaylight `flow-node-inventory` payload mapping.
//!
//! [`sroof_core::FlowRule`] is the engine's own directive type; the
//! controller wants the RESTCONF flow model. The structs here are the
//! wire shape, with explicit fields instead of nested dictionaries so
//! a missing required field fails at this boundary.

use serde::{Deserialize, Serialize};

use sroof_core::{is_sr_rule_id, FlowAction, FlowRule, MPLS_ETHERTYPE};

/// Envelope around one or more flows, as PUT to and GET from
/// `.../table/{t}/flow/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowEnvelope {
    /// The flows.
    #[serde(rename = "flow-node-inventory:flow")]
    pub flow: Vec<OdlFlow>,
}

impl FlowEnvelope {
    /// Wraps a single directive for a PUT.
    pub fn single(rule: &FlowRule) -> Self {
        Self {
            flow: vec![OdlFlow::from_rule(rule)],
        }
    }
}

/// Envelope around a table listing, as GET from `.../table/{t}`.
#[derive(Debug, Clone, Deserialize)]
pub struct TableEnvelope {
    /// The table objects (RESTCONF wraps a single table in a list).
    #[serde(rename = "flow-node-inventory:table", default)]
    pub table: Vec<OdlTable>,
}

/// One flow table with its flows.
#[derive(Debug, Clone, Deserialize)]
pub struct OdlTable {
    /// Installed flows, absent when the table is empty.
    #[serde(default)]
    pub flow: Vec<OdlFlow>,
}

/// Envelope around the network topology listing.
#[derive(Debug, Clone, Deserialize)]
pub struct TopologyEnvelope {
    /// The topology instances (the query names one, so one entry).
    #[serde(default)]
    pub topology: Vec<sroof_core::RawTopology>,
}

/// One flow in the RESTCONF model.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdlFlow {
    /// Flow id.
    pub id: String,
    /// Table the flow lives in.
    #[serde(rename = "table_id")]
    pub table_id: u8,
    /// Priority.
    pub priority: u16,
    /// Hard timeout; 0 keeps the rule until removed.
    #[serde(rename = "hard-timeout", default)]
    pub hard_timeout: u32,
    /// Idle timeout; 0 keeps the rule until removed.
    #[serde(rename = "idle-timeout", default)]
    pub idle_timeout: u32,
    /// Match criteria.
    #[serde(rename = "match", default)]
    pub matches: OdlMatch,
    /// Instruction list.
    #[serde(default)]
    pub instructions: OdlInstructions,
}

/// Match criteria in the RESTCONF model.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OdlMatch {
    /// Ethernet match.
    #[serde(
        rename = "ethernet-match",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub ethernet_match: Option<EthernetMatch>,
    /// MPLS label match.
    #[serde(
        rename = "protocol-match-fields",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub protocol_match_fields: Option<ProtocolMatchFields>,
    /// Ingress port match.
    #[serde(rename = "in-port", default, skip_serializing_if = "Option::is_none")]
    pub in_port: Option<String>,
}

/// Ethernet match wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthernetMatch {
    /// Ethertype wrapper.
    #[serde(rename = "ethernet-type")]
    pub ethernet_type: EthernetType,
}

/// Ethertype wrapper.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EthernetType {
    /// The ethertype value.
    #[serde(rename = "type")]
    pub value: u16,
}

/// MPLS protocol match fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProtocolMatchFields {
    /// The label to match.
    #[serde(rename = "mpls-label")]
    pub mpls_label: u32,
}

/// Instruction list wrapper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OdlInstructions {
    /// The instructions.
    #[serde(default)]
    pub instruction: Vec<OdlInstruction>,
}

/// One instruction: either an apply-actions block or a goto-table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OdlInstruction {
    /// Evaluation order.
    pub order: u32,
    /// Apply-actions block.
    #[serde(
        rename = "apply-actions",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub apply_actions: Option<ApplyActions>,
    /// Goto-table block.
    #[serde(
        rename = "go-to-table",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub go_to_table: Option<GoToTable>,
}

/// Apply-actions wrapper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApplyActions {
    /// The ordered actions.
    #[serde(default)]
    pub action: Vec<OdlAction>,
}

/// Goto-table block.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GoToTable {
    /// Target table.
    #[serde(rename = "table_id")]
    pub table_id: u8,
}

/// One action. Exactly one of the optional blocks is set.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OdlAction {
    /// Position in the action list.
    pub order: u32,
    /// Output action.
    #[serde(
        rename = "output-action",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub output_action: Option<OutputAction>,
    /// MPLS pop.
    #[serde(
        rename = "pop-mpls-action",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub pop_mpls_action: Option<PopMplsAction>,
    /// MPLS push.
    #[serde(
        rename = "push-mpls-action",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub push_mpls_action: Option<PushMplsAction>,
    /// Set-field (carries the pushed label value).
    #[serde(rename = "set-field", default, skip_serializing_if = "Option::is_none")]
    pub set_field: Option<SetField>,
}

/// Output action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputAction {
    /// Port to output on.
    #[serde(rename = "output-node-connector")]
    pub output_node_connector: String,
}

/// MPLS pop action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PopMplsAction {
    /// Ethertype of the exposed payload.
    #[serde(rename = "ethernet-type")]
    pub ethernet_type: u16,
}

/// MPLS push action. The label value itself travels in a following
/// set-field action, per the OpenFlow split between push and set.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushMplsAction {
    /// Ethertype of the pushed header (MPLS unicast).
    #[serde(rename = "ethernet-type")]
    pub ethernet_type: u16,
}

/// Set-field action carrying an MPLS label.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetField {
    /// The label fields.
    #[serde(rename = "protocol-match-fields")]
    pub protocol_match_fields: ProtocolMatchFields,
}

impl OdlFlow {
    /// Maps an engine directive to the wire shape.
    ///
    /// Actions keep their list order; a push becomes the
    /// push-mpls/set-field pair; a goto-table leaves the apply-actions
    /// block and becomes its own instruction, ordered after it.
    pub fn from_rule(rule: &FlowRule) -> Self {
        let mut actions = Vec::new();
        let mut goto = None;
        for a in &rule.actions {
            match a {
                FlowAction::Output { port } => actions.push(OdlAction {
                    order: actions.len() as u32,
                    output_action: Some(OutputAction {
                        output_node_connector: port.clone(),
                    }),
                    ..OdlAction::default()
                }),
                FlowAction::PopMpls { ethertype } => actions.push(OdlAction {
                    order: actions.len() as u32,
                    pop_mpls_action: Some(PopMplsAction {
                        ethernet_type: *ethertype,
                    }),
                    ..OdlAction::default()
                }),
                FlowAction::PushMpls { label } => {
                    actions.push(OdlAction {
                        order: actions.len() as u32,
                        push_mpls_action: Some(PushMplsAction {
                            ethernet_type: MPLS_ETHERTYPE,
                        }),
                        ..OdlAction::default()
                    });
                    actions.push(OdlAction {
                        order: actions.len() as u32,
                        set_field: Some(SetField {
                            protocol_match_fields: ProtocolMatchFields { mpls_label: *label },
                        }),
                        ..OdlAction::default()
                    });
                }
                FlowAction::GotoTable { table } => {
                    goto = Some(GoToTable { table_id: *table });
                }
            }
        }

        let mut instruction = Vec::new();
        if !actions.is_empty() {
            instruction.push(OdlInstruction {
                order: 0,
                apply_actions: Some(ApplyActions { action: actions }),
                go_to_table: None,
            });
        }
        if let Some(goto) = goto {
            instruction.push(OdlInstruction {
                order: instruction.len() as u32,
                apply_actions: None,
                go_to_table: Some(goto),
            });
        }

        Self {
            id: rule.id.clone(),
            table_id: rule.table,
            priority: rule.priority,
            hard_timeout: 0,
            idle_timeout: 0,
            matches: OdlMatch {
                ethernet_match: rule.matches.ethertype.map(|value| EthernetMatch {
                    ethernet_type: EthernetType { value },
                }),
                protocol_match_fields: rule
                    .matches
                    .mpls_label
                    .map(|mpls_label| ProtocolMatchFields { mpls_label }),
                in_port: rule.matches.in_port.clone(),
            },
            instructions: OdlInstructions { instruction },
        }
    }

    /// The matched MPLS label, if any.
    pub fn mpls_label(&self) -> Option<u32> {
        self.matches
            .protocol_match_fields
            .as_ref()
            .map(|p| p.mpls_label)
    }

    /// True if any action pops the outer label.
    pub fn pops_label(&self) -> bool {
        self.instructions.instruction.iter().any(|i| {
            i.apply_actions
                .as_ref()
                .is_some_and(|aa| aa.action.iter().any(|a| a.pop_mpls_action.is_some()))
        })
    }

    /// True if the flow was installed by the segment-routing engine.
    pub fn is_sr_flow(&self) -> bool {
        is_sr_rule_id(&self.id)
    }
}

/// Operator-facing digest of an installed flow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FlowSummary {
    /// Flow id.
    pub id: String,
    /// Switch the flow is installed on.
    pub switch: String,
    /// Matched MPLS label, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<u32>,
    /// Whether the flow pops the outer label (penultimate hop).
    pub penultimate: bool,
}

impl FlowSummary {
    /// Digests a wire flow for display.
    pub fn from_flow(switch: &str, flow: &OdlFlow) -> Self {
        Self {
            id: flow.id.clone(),
            switch: switch.to_string(),
            label: flow.mpls_label(),
            penultimate: flow.pops_label(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sroof_core::{compile_default, compile_transit, FlowMatch, Srgb, SwitchId};

    fn transit_rule() -> FlowRule {
        FlowRule {
            switch: SwitchId::new("openflow:2"),
            id: "sr-transit-16003".to_string(),
            table: 1,
            priority: 32767,
            matches: FlowMatch {
                ethertype: Some(MPLS_ETHERTYPE),
                mpls_label: Some(16_003),
                in_port: None,
            },
            actions: vec![
                FlowAction::PopMpls {
                    ethertype: MPLS_ETHERTYPE,
                },
                FlowAction::Output {
                    port: "openflow:2:2".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_transit_wire_shape() {
        let v = serde_json::to_value(FlowEnvelope::single(&transit_rule())).unwrap();
        let flow = &v["flow-node-inventory:flow"][0];
        assert_eq!(flow["id"], "sr-transit-16003");
        assert_eq!(flow["table_id"], 1);
        assert_eq!(flow["priority"], 32767);
        assert_eq!(flow["hard-timeout"], 0);
        assert_eq!(flow["match"]["protocol-match-fields"]["mpls-label"], 16_003);
        assert_eq!(
            flow["match"]["ethernet-match"]["ethernet-type"]["type"],
            34887
        );

        let actions = &flow["instructions"]["instruction"][0]["apply-actions"]["action"];
        assert_eq!(actions[0]["order"], 0);
        assert_eq!(actions[0]["pop-mpls-action"]["ethernet-type"], 34887);
        assert_eq!(actions[1]["order"], 1);
        assert_eq!(
            actions[1]["output-action"]["output-node-connector"],
            "openflow:2:2"
        );
    }

    #[test]
    fn test_push_becomes_push_and_set_field() {
        let rule = FlowRule {
            actions: vec![
                FlowAction::PushMpls { label: 16_004 },
                FlowAction::Output {
                    port: "p".to_string(),
                },
            ],
            ..transit_rule()
        };
        let flow = OdlFlow::from_rule(&rule);
        let actions = &flow.instructions.instruction[0].apply_actions.as_ref().unwrap().action;
        assert_eq!(actions.len(), 3);
        assert!(actions[0].push_mpls_action.is_some());
        assert_eq!(
            actions[1]
                .set_field
                .as_ref()
                .unwrap()
                .protocol_match_fields
                .mpls_label,
            16_004
        );
        assert!(actions[2].output_action.is_some());
        // Orders stay dense and sequential.
        let orders: Vec<u32> = actions.iter().map(|a| a.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_goto_table_becomes_instruction() {
        let flow = OdlFlow::from_rule(&compile_default(&SwitchId::new("openflow:1")));
        assert_eq!(flow.instructions.instruction.len(), 1);
        let goto = flow.instructions.instruction[0]
            .go_to_table
            .as_ref()
            .unwrap();
        assert_eq!(goto.table_id, 1);
        // No empty apply-actions block is emitted alongside it.
        assert!(flow.instructions.instruction[0].apply_actions.is_none());
    }

    #[test]
    fn test_summary_round_trip_through_wire_shape() {
        let raw = sroof_core::RawTopology {
            node: vec![
                sroof_core::RawNode {
                    node_id: "openflow:2".to_string(),
                },
                sroof_core::RawNode {
                    node_id: "openflow:3".to_string(),
                },
            ],
            link: vec![sroof_core::RawLink {
                link_id: "l".to_string(),
                source: sroof_core::RawLinkSource {
                    source_node: "openflow:2".to_string(),
                    source_tp: Some("openflow:2:2".to_string()),
                },
                destination: sroof_core::RawLinkDestination {
                    dest_node: "openflow:3".to_string(),
                },
            }],
        };
        let g = sroof_core::TopologyGraph::from_raw(&raw);
        let rule = compile_transit(
            &g,
            &SwitchId::new("openflow:2"),
            &SwitchId::new("openflow:3"),
            &SwitchId::new("openflow:3"),
            &Srgb::default(),
        )
        .unwrap();

        let json = serde_json::to_string(&FlowEnvelope::single(&rule)).unwrap();
        let parsed: FlowEnvelope = serde_json::from_str(&json).unwrap();
        let summary = FlowSummary::from_flow("openflow:2", &parsed.flow[0]);
        assert_eq!(
            summary,
            FlowSummary {
                id: "sr-transit-16003".to_string(),
                switch: "openflow:2".to_string(),
                label: Some(16_003),
                penultimate: true,
            }
        );
        assert!(parsed.flow[0].is_sr_flow());
    }

    #[test]
    fn test_topology_envelope_parses_controller_response() {
        let body = r#"{
            "topology": [{
                "topology-id": "flow:1",
                "node": [{"node-id": "openflow:1"}],
                "link": []
            }]
        }"#;
        let env: TopologyEnvelope = serde_json::from_str(body).unwrap();
        assert_eq!(env.topology.len(), 1);
        assert_eq!(env.topology[0].node[0].node_id, "openflow:1");
    }
}
