use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue, USER_AGENT};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::config::normalize_endpoint;
use crate::domain::{Query, TaskId};
use crate::error::IqueryError;

#[derive(Debug, Clone, Serialize)]
pub struct ServiceStatus {
    pub status: Option<String>,
    pub rest_version: Option<String>,
    pub pc_disk_full: Option<i64>,
    pub load: Vec<f64>,
    pub raw_json: Value,
}

impl ServiceStatus {
    pub fn from_json(raw_json: Value) -> Self {
        let status = raw_json
            .get("status")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string());
        let rest_version = raw_json
            .get("restVersion")
            .and_then(|value| value.as_str())
            .map(|value| value.to_string());
        let pc_disk_full = raw_json.get("pcDiskFull").and_then(|value| value.as_i64());
        let load = raw_json
            .get("load")
            .and_then(|value| value.as_array())
            .map(|array| array.iter().filter_map(|value| value.as_f64()).collect())
            .unwrap_or_default();
        Self {
            status,
            rest_version,
            pc_disk_full,
            load,
            raw_json,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceInfo {
    pub name: String,
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub number_of_networks: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub end_point: Option<String>,
    #[serde(default)]
    pub version: Option<String>,
}

#[derive(Debug, Deserialize)]
struct SourceCatalog {
    results: Vec<SourceInfo>,
}

#[derive(Debug, Deserialize)]
struct TaskCreated {
    id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    #[serde(default)]
    pub source_name: Option<String>,
    #[serde(default, rename = "sourceUUID")]
    pub source_uuid: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    pub progress: u32,
    #[serde(default)]
    pub number_of_hits: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskStatus {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub wall_time: Option<i64>,
    #[serde(default)]
    pub number_of_hits: Option<u64>,
    pub sources: Vec<SourceStatus>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSummary {
    #[serde(rename = "networkUUID")]
    pub network_uuid: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub nodes: u64,
    #[serde(default)]
    pub edges: Option<u64>,
    #[serde(default)]
    pub percent_overlap: Option<i64>,
    #[serde(default)]
    pub rank: Option<i64>,
    #[serde(default)]
    pub hit_genes: Vec<String>,
    #[serde(default)]
    pub details: Value,
    #[serde(default, rename = "imageURL", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceResult {
    pub source_name: String,
    #[serde(rename = "sourceUUID")]
    pub source_uuid: String,
    #[serde(default)]
    pub number_of_hits: u64,
    #[serde(default)]
    pub source_rank: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub results: Vec<NetworkSummary>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub progress: Option<u32>,
    #[serde(default)]
    pub start_time: Option<i64>,
    #[serde(default)]
    pub wall_time: Option<i64>,
    #[serde(default)]
    pub number_of_hits: Option<u64>,
    #[serde(default)]
    pub query: Vec<String>,
    #[serde(default)]
    pub input_source_list: Vec<String>,
    #[serde(default)]
    pub sources: Vec<SourceResult>,
}

/// CX payload: an ordered list of aspects, kept opaque.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayNetwork {
    aspects: Vec<Value>,
}

impl OverlayNetwork {
    pub fn new(aspects: Vec<Value>) -> Self {
        Self { aspects }
    }

    pub fn aspects(&self) -> &[Value] {
        &self.aspects
    }

    pub fn len(&self) -> usize {
        self.aspects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.aspects.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationFrequencies {
    #[serde(default)]
    pub mutation_frequencies: BTreeMap<String, f64>,
}

pub trait SearchClient: Send + Sync {
    fn check_service_alive(&self) -> Result<ServiceStatus, IqueryError>;
    fn list_sources(&self) -> Result<Vec<SourceInfo>, IqueryError>;
    fn submit_query(&self, query: &Query) -> Result<TaskId, IqueryError>;
    fn task_status(&self, task_id: &TaskId) -> Result<TaskStatus, IqueryError>;
    fn fetch_full_results(&self, task_id: &TaskId) -> Result<TaskResult, IqueryError>;
    fn fetch_overlay_network(
        &self,
        task_id: &TaskId,
        source_id: &str,
        network_id: &str,
    ) -> Result<OverlayNetwork, IqueryError>;
    fn delete_task(&self, task_id: &TaskId) -> Result<(), IqueryError>;
    fn mutation_frequencies(&self, genes: &[String]) -> Result<MutationFrequencies, IqueryError>;
}

#[derive(Clone)]
pub struct SearchHttpClient {
    client: Client,
    base_url: String,
}

impl SearchHttpClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, IqueryError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&format!("iquery-tools/{}", env!("CARGO_PKG_VERSION")))
                .map_err(|err| IqueryError::SearchHttp(err.to_string()))?,
        );
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .map_err(|err| IqueryError::SearchHttp(err.to_string()))?;

        Ok(Self {
            client,
            base_url: normalize_endpoint(endpoint)?,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn task_url(&self, task_id: &TaskId) -> String {
        format!("{}/{}", self.base_url, task_id.as_str())
    }

    fn send(&self, request: RequestBuilder) -> Result<Response, IqueryError> {
        request
            .send()
            .map_err(|err| IqueryError::SearchHttp(err.to_string()))
    }

    fn handle_status(response: Response) -> Result<Response, IqueryError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let (status, message) = status_and_message(response);
        Err(IqueryError::SearchStatus { status, message })
    }
}

impl SearchClient for SearchHttpClient {
    fn check_service_alive(&self) -> Result<ServiceStatus, IqueryError> {
        let url = format!("{}/status", self.base_url);
        debug!(%url, "status probe");
        let response = self.send(self.client.get(&url))?;
        if response.status() != StatusCode::OK {
            let (status, message) = status_and_message(response);
            return Err(IqueryError::ServiceUnavailable { status, message });
        }
        let raw_json: Value = parse_json(response)?;
        Ok(ServiceStatus::from_json(raw_json))
    }

    fn list_sources(&self) -> Result<Vec<SourceInfo>, IqueryError> {
        let url = format!("{}/source", self.base_url);
        debug!(%url, "listing sources");
        let response = self.send(self.client.get(&url))?;
        if response.status() != StatusCode::OK {
            let (status, message) = status_and_message(response);
            return Err(IqueryError::SourceList { status, message });
        }
        let catalog: SourceCatalog = parse_json(response)?;
        Ok(catalog.results)
    }

    fn submit_query(&self, query: &Query) -> Result<TaskId, IqueryError> {
        debug!(url = %self.base_url, genes = ?query.genes(), "submitting query");
        let response = self.send(self.client.post(&self.base_url).json(query))?;
        if response.status() != StatusCode::ACCEPTED {
            let (status, message) = status_and_message(response);
            return Err(IqueryError::QueryRejected { status, message });
        }
        let created: TaskCreated = parse_json(response)?;
        created
            .id
            .parse()
            .map_err(|_| IqueryError::MalformedResponse(format!("task id {:?}", created.id)))
    }

    fn task_status(&self, task_id: &TaskId) -> Result<TaskStatus, IqueryError> {
        let url = format!("{}/status", self.task_url(task_id));
        let response = Self::handle_status(self.send(self.client.get(&url))?)?;
        parse_json(response)
    }

    fn fetch_full_results(&self, task_id: &TaskId) -> Result<TaskResult, IqueryError> {
        let url = self.task_url(task_id);
        debug!(%url, "fetching full results");
        let response = Self::handle_status(self.send(self.client.get(&url))?)?;
        parse_json(response)
    }

    fn fetch_overlay_network(
        &self,
        task_id: &TaskId,
        source_id: &str,
        network_id: &str,
    ) -> Result<OverlayNetwork, IqueryError> {
        let url = format!("{}/overlaynetwork", self.task_url(task_id));
        debug!(%url, source_id, network_id, "fetching overlay network");
        let request = self
            .client
            .get(&url)
            .query(&[("sourceUUID", source_id), ("networkUUID", network_id)]);
        let response = Self::handle_status(self.send(request)?)?;
        parse_json(response)
    }

    fn delete_task(&self, task_id: &TaskId) -> Result<(), IqueryError> {
        let url = self.task_url(task_id);
        debug!(%url, "deleting task");
        let response = self.send(self.client.delete(&url))?;
        if response.status() != StatusCode::OK {
            let (status, message) = status_and_message(response);
            return Err(IqueryError::TaskDelete {
                task_id: task_id.to_string(),
                status,
                message,
            });
        }
        Ok(())
    }

    fn mutation_frequencies(&self, genes: &[String]) -> Result<MutationFrequencies, IqueryError> {
        let url = format!("{}/mutationfrequency", self.base_url);
        let body = serde_json::json!({ "genes": genes });
        let response = Self::handle_status(self.send(self.client.post(&url).json(&body))?)?;
        parse_json(response)
    }
}

fn status_and_message(response: Response) -> (u16, String) {
    let status = response.status().as_u16();
    let message = response
        .text()
        .unwrap_or_else(|_| "search request failed".to_string());
    (status, message)
}

fn parse_json<T: DeserializeOwned>(response: Response) -> Result<T, IqueryError> {
    response
        .json()
        .map_err(|err| IqueryError::MalformedResponse(err.to_string()))
}
