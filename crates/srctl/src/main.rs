//! srctl: operator command line for the sroof controller.
//!
//! Wraps the RESTCONF client so an operator can inspect and edit the
//! segment-routing state by hand: list installed SR flows, add or
//! remove individual flows and default rules, set up and tear down
//! services, query shortest paths, and dump the switch topology.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use tracing::error;
use tracing_subscriber::EnvFilter;

use sroof_client::{ControllerConfig, RestClient, RestFlowStore, RestTopologySource};
use sroof_core::{
    compile_default, compile_service, service_rule_keys, shortest_path, FlowAction, FlowMatch,
    FlowRule, FlowStore, ServiceRequest, Srgb, SwitchId, TopologyGraph, TopologySource,
    DEFAULT_ARP_LABEL, DEFAULT_IP_LABEL, DEFAULT_SRGB_START, MPLS_ETHERTYPE, SR_TABLE,
    TRANSIT_RULE_PRIORITY,
};

/// Segment-routing manager command line tool.
#[derive(Debug, Parser)]
#[command(name = "srctl", version, about)]
struct Args {
    /// Path to the controller configuration file.
    #[arg(short = 'C', long, default_value = "./ctrl.yml")]
    config: PathBuf,

    /// Log filter (tracing env-filter syntax).
    #[arg(long, default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List the SR flows installed at a switch, or show one flow.
    GetFlow {
        /// Switch name (format: openflow:1).
        #[arg(short, long)]
        name: String,
        /// Flow id; all SR flows when omitted.
        #[arg(short, long)]
        id: Option<String>,
        /// Table to look in when --id is given.
        #[arg(short, long, default_value_t = SR_TABLE)]
        table: u8,
    },

    /// Add a single MPLS match/output flow.
    AddFlow {
        /// Switch name (format: openflow:1).
        #[arg(short, long)]
        name: String,
        /// Output port (format: openflow:1:2).
        #[arg(short, long)]
        port: String,
        /// MPLS label to match.
        #[arg(short, long)]
        label: u32,
        /// Pop the label before output (penultimate hop).
        #[arg(short = 'u', long)]
        penultimate: bool,
    },

    /// Delete one flow by id.
    DelFlow {
        /// Switch name.
        #[arg(short, long)]
        name: String,
        /// Flow id.
        #[arg(short, long)]
        id: String,
    },

    /// Delete every SR flow at a switch.
    DelFlows {
        /// Switch name.
        #[arg(short, long)]
        name: String,
    },

    /// Install the default goto-SR-table rule at a switch.
    AddDefault {
        /// Switch name.
        #[arg(short, long)]
        name: String,
    },

    /// Remove the default goto-SR-table rule from a switch.
    DelDefault {
        /// Switch name.
        #[arg(short, long)]
        name: String,
    },

    /// Set up a service: label-imposition rules at ingress, mirrored
    /// pop rules at egress.
    AddService(ServiceArgs),

    /// Tear down a service previously set up with add-service.
    DelService(ServiceArgs),

    /// Compute the shortest path between two switches.
    Spf {
        /// Source switch.
        src: String,
        /// Destination switch.
        dst: String,
    },

    /// List the switches and links of the current topology.
    Topology,
}

#[derive(Debug, clap::Args)]
struct ServiceArgs {
    /// Ingress switch (format: openflow:1).
    #[arg(short = 'i', long)]
    ingress_switch: String,
    /// Ingress port (format: openflow:1:1).
    #[arg(short = 'p', long)]
    ingress_port: String,
    /// Egress switch.
    #[arg(short = 'e', long)]
    egress_switch: String,
    /// Egress port.
    #[arg(short = 'l', long)]
    egress_port: String,
    /// MPLS label for the service's IP traffic.
    #[arg(short = 'x', long, default_value_t = DEFAULT_IP_LABEL)]
    ip_label: u32,
    /// MPLS label for the service's ARP traffic.
    #[arg(short = 'y', long, default_value_t = DEFAULT_ARP_LABEL)]
    arp_label: u32,
    /// Waypoint switches, in traversal order.
    #[arg(short = 'w', long, num_args = 0..)]
    waypoint: Vec<String>,
    /// Start of the Segment Routing Global Block.
    #[arg(long, default_value_t = DEFAULT_SRGB_START)]
    srgb_start: u32,
}

impl From<&ServiceArgs> for ServiceRequest {
    fn from(a: &ServiceArgs) -> Self {
        ServiceRequest {
            ingress_switch: SwitchId::new(&a.ingress_switch),
            ingress_port: a.ingress_port.clone(),
            egress_switch: SwitchId::new(&a.egress_switch),
            egress_port: a.egress_port.clone(),
            ip_label: a.ip_label,
            arp_label: a.arp_label,
            waypoints: a.waypoint.iter().map(SwitchId::new).collect(),
        }
    }
}

async fn fetch_graph(source: &RestTopologySource) -> anyhow::Result<TopologyGraph> {
    let raw = source.fetch_topology().await?;
    Ok(TopologyGraph::from_raw(&raw))
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = ControllerConfig::load(Some(&args.config))
        .context("unusable controller configuration")?;
    let client = RestClient::new(config)?;
    let store = RestFlowStore::new(client.clone());
    let source = RestTopologySource::new(client);

    match args.command {
        Command::GetFlow { name, id, table } => {
            let switch = SwitchId::new(name);
            match id {
                Some(id) => match store.get_flow(&switch, table, &id).await? {
                    Some(flow) => println!("{}", serde_json::to_string_pretty(&flow)?),
                    None => bail!("flow {id} not found on {switch}"),
                },
                None => {
                    let flows = store.get_sr_flows(&switch).await?;
                    if flows.is_empty() {
                        println!("no SR flows found on {switch}");
                    } else {
                        println!("{}", serde_json::to_string_pretty(&flows)?);
                    }
                }
            }
        }

        Command::AddFlow {
            name,
            port,
            label,
            penultimate,
        } => {
            let mut actions = Vec::new();
            if penultimate {
                actions.push(FlowAction::PopMpls {
                    ethertype: MPLS_ETHERTYPE,
                });
            }
            actions.push(FlowAction::Output { port });
            let rule = FlowRule {
                switch: SwitchId::new(name),
                id: format!("sr-manual-{label}"),
                table: SR_TABLE,
                priority: TRANSIT_RULE_PRIORITY,
                matches: FlowMatch {
                    ethertype: Some(MPLS_ETHERTYPE),
                    mpls_label: Some(label),
                    in_port: None,
                },
                actions,
            };
            store.upsert(&rule).await?;
            println!("flow {} added to {}", rule.id, rule.switch);
        }

        Command::DelFlow { name, id } => {
            let switch = SwitchId::new(name);
            store.remove(&switch, &id).await?;
            println!("flow {id} removed from {switch}");
        }

        Command::DelFlows { name } => {
            let switch = SwitchId::new(name);
            let removed = store.remove_sr_flows(&switch).await?;
            println!("{removed} SR flows removed from {switch}");
        }

        Command::AddDefault { name } => {
            let rule = compile_default(&SwitchId::new(name));
            store.upsert(&rule).await?;
            println!("default rule added to {}", rule.switch);
        }

        Command::DelDefault { name } => {
            let switch = SwitchId::new(name);
            store.remove(&switch, &sroof_core::default_rule_id()).await?;
            println!("default rule removed from {switch}");
        }

        Command::AddService(service) => {
            let req = ServiceRequest::from(&service);
            let rules = compile_service(&req, &Srgb::new(service.srgb_start))?;
            for rule in &rules {
                store.upsert(rule).await?;
                println!("service rule {} added to {}", rule.id, rule.switch);
            }
        }

        Command::DelService(service) => {
            let req = ServiceRequest::from(&service);
            for (switch, rule_id) in service_rule_keys(&req) {
                store.remove(&switch, &rule_id).await?;
                println!("service rule {rule_id} removed from {switch}");
            }
        }

        Command::Spf { src, dst } => {
            let graph = fetch_graph(&source).await?;
            match shortest_path(&graph, &SwitchId::new(src), &SwitchId::new(dst)) {
                Ok(path) => {
                    let hops: Vec<&str> = path.iter().map(SwitchId::as_str).collect();
                    println!("shortest path ({} hops): {}", hops.len() - 1, hops.join(" -> "));
                }
                Err(err) => bail!("{err}"),
            }
        }

        Command::Topology => {
            let graph = fetch_graph(&source).await?;
            println!("{} switches", graph.switch_count());
            for switch in graph.switches() {
                println!("{switch}");
                for (neighbor, port) in graph.neighbors(switch) {
                    println!("  -> {neighbor} via {port}");
                }
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_new(&args.log).unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(%err, "srctl failed");
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}
