//! RESTCONF client and the FlowStore/TopologySource implementations.
//!
//! The client is a thin wrapper over reqwest with basic auth and the
//! status handling the RESTCONF API needs: PUT replaces a flow in
//! place (which is what makes the store's upsert idempotent) and
//! DELETE of an absent flow answers 404, which counts as success.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{debug, error};

use sroof_core::{
    FlowRule, FlowStore, RawTopology, SrError, SrResult, SwitchId, TopologySource,
    SR_TABLE, TABLE_CLASSIFIER,
};

use crate::config::ControllerConfig;
use crate::payload::{FlowEnvelope, FlowSummary, OdlFlow, TableEnvelope, TopologyEnvelope};

/// Thin RESTCONF client for the controller.
#[derive(Debug, Clone)]
pub struct RestClient {
    http: reqwest::Client,
    config: ControllerConfig,
}

impl RestClient {
    /// Builds a client for the given controller endpoint.
    pub fn new(config: ControllerConfig) -> SrResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SrError::transport(e.to_string()))?;
        Ok(Self { http, config })
    }

    /// The endpoint configuration in use.
    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    fn flow_url(&self, switch: &SwitchId, table: u8, rule_id: &str) -> String {
        format!(
            "{}/opendaylight-inventory:nodes/node/{}/table/{}/flow/{}",
            self.config.config_url(),
            switch,
            table,
            rule_id
        )
    }

    fn table_url(&self, switch: &SwitchId, table: u8) -> String {
        format!(
            "{}/opendaylight-inventory:nodes/node/{}/table/{}",
            self.config.config_url(),
            switch,
            table
        )
    }

    fn topology_url(&self) -> String {
        format!(
            "{}/network-topology:network-topology/topology/{}",
            self.config.operational_url(),
            self.config.topology_id
        )
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str) -> SrResult<Option<T>> {
        let resp = self
            .http
            .get(url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| SrError::transport(format!("GET {url}: {e}")))?;
        match resp.status() {
            StatusCode::OK => {
                debug!(%url, "found");
                let body = resp
                    .json::<T>()
                    .await
                    .map_err(|e| SrError::transport(format!("GET {url}: bad body: {e}")))?;
                Ok(Some(body))
            }
            StatusCode::NOT_FOUND => {
                debug!(%url, "not found");
                Ok(None)
            }
            status => {
                error!(%url, %status, "unexpected GET status");
                Err(SrError::transport(format!("GET {url}: status {status}")))
            }
        }
    }

    async fn put_json<T: Serialize + Sync>(&self, url: &str, body: &T) -> SrResult<()> {
        let resp = self
            .http
            .put(url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .json(body)
            .send()
            .await
            .map_err(|e| SrError::transport(format!("PUT {url}: {e}")))?;
        match resp.status() {
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT => {
                debug!(%url, "stored");
                Ok(())
            }
            status => {
                error!(%url, %status, "unexpected PUT status");
                Err(SrError::transport(format!("PUT {url}: status {status}")))
            }
        }
    }

    async fn delete(&self, url: &str) -> SrResult<()> {
        let resp = self
            .http
            .delete(url)
            .basic_auth(&self.config.username, Some(&self.config.password))
            .send()
            .await
            .map_err(|e| SrError::transport(format!("DELETE {url}: {e}")))?;
        match resp.status() {
            // 404 means already absent, which is what we wanted.
            StatusCode::OK | StatusCode::NO_CONTENT | StatusCode::NOT_FOUND => {
                debug!(%url, "deleted");
                Ok(())
            }
            status => {
                error!(%url, %status, "unexpected DELETE status");
                Err(SrError::transport(format!("DELETE {url}: status {status}")))
            }
        }
    }
}

/// [`FlowStore`] over the controller's config datastore.
#[derive(Debug, Clone)]
pub struct RestFlowStore {
    client: RestClient,
}

impl RestFlowStore {
    /// Wraps a REST client as the southbound flow store.
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }

    /// Fetches one installed flow, if present.
    pub async fn get_flow(
        &self,
        switch: &SwitchId,
        table: u8,
        rule_id: &str,
    ) -> SrResult<Option<OdlFlow>> {
        let url = self.client.flow_url(switch, table, rule_id);
        Ok(self
            .client
            .get_json::<FlowEnvelope>(&url)
            .await?
            .and_then(|env| env.flow.into_iter().next()))
    }

    /// Lists the segment-routing flows installed at a switch, across
    /// the classifier and SR tables. Flows not carrying the SR rule-id
    /// prefix belong to somebody else and are not reported.
    pub async fn get_sr_flows(&self, switch: &SwitchId) -> SrResult<Vec<FlowSummary>> {
        let mut out = Vec::new();
        for table in [TABLE_CLASSIFIER, SR_TABLE] {
            let url = self.client.table_url(switch, table);
            let Some(env) = self.client.get_json::<TableEnvelope>(&url).await? else {
                continue;
            };
            out.extend(
                env.table
                    .into_iter()
                    .flat_map(|t| t.flow)
                    .filter(OdlFlow::is_sr_flow)
                    .map(|f| FlowSummary::from_flow(switch.as_str(), &f)),
            );
        }
        Ok(out)
    }

    /// Removes every segment-routing flow installed at a switch.
    pub async fn remove_sr_flows(&self, switch: &SwitchId) -> SrResult<usize> {
        let flows = self.get_sr_flows(switch).await?;
        let mut removed = 0;
        for summary in &flows {
            self.remove(switch, &summary.id).await?;
            removed += 1;
        }
        Ok(removed)
    }
}

#[async_trait]
impl FlowStore for RestFlowStore {
    async fn upsert(&self, rule: &FlowRule) -> SrResult<()> {
        let url = self.client.flow_url(&rule.switch, rule.table, &rule.id);
        self.client
            .put_json(&url, &FlowEnvelope::single(rule))
            .await
            .map_err(|e| {
                SrError::flow_store("upsert", rule.switch.clone(), &rule.id, e.to_string())
            })
    }

    async fn remove(&self, switch: &SwitchId, rule_id: &str) -> SrResult<()> {
        // The table is encoded in neither the key nor the API answer
        // for a blind delete, so try both tables we install into.
        for table in [TABLE_CLASSIFIER, SR_TABLE] {
            let url = self.client.flow_url(switch, table, rule_id);
            self.client.delete(&url).await.map_err(|e| {
                SrError::flow_store("remove", switch.clone(), rule_id, e.to_string())
            })?;
        }
        Ok(())
    }
}

/// [`TopologySource`] over the controller's operational datastore.
#[derive(Debug, Clone)]
pub struct RestTopologySource {
    client: RestClient,
}

impl RestTopologySource {
    /// Wraps a REST client as the topology source.
    pub fn new(client: RestClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl TopologySource for RestTopologySource {
    async fn fetch_topology(&self) -> SrResult<RawTopology> {
        let url = self.client.topology_url();
        let env = self
            .client
            .get_json::<TopologyEnvelope>(&url)
            .await?
            .ok_or_else(|| SrError::transport(format!("no topology at {url}")))?;
        env.topology
            .into_iter()
            .next()
            .ok_or_else(|| SrError::transport("topology listing is empty".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn client() -> RestClient {
        RestClient::new(ControllerConfig::default()).unwrap()
    }

    #[test]
    fn test_flow_url() {
        let url = client().flow_url(&SwitchId::new("openflow:1"), 1, "sr-transit-16003");
        assert_eq!(
            url,
            "http://127.0.0.1:8181/restconf/config/opendaylight-inventory:nodes/node/openflow:1/table/1/flow/sr-transit-16003"
        );
    }

    #[test]
    fn test_table_url() {
        let url = client().table_url(&SwitchId::new("openflow:2"), 0);
        assert_eq!(
            url,
            "http://127.0.0.1:8181/restconf/config/opendaylight-inventory:nodes/node/openflow:2/table/0"
        );
    }

    #[test]
    fn test_topology_url_uses_operational_store() {
        let url = client().topology_url();
        assert_eq!(
            url,
            "http://127.0.0.1:8181/restconf/operational/network-topology:network-topology/topology/flow:1"
        );
    }
}
