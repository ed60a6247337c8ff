use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::info;

use crate::domain::{AlterationData, Query, TaskId};
use crate::error::IqueryError;
use crate::poll::{PollPolicy, Sleeper, ThreadSleeper, poll_until_complete};
use crate::search::{
    MutationFrequencies, OverlayNetwork, SearchClient, ServiceStatus, SourceInfo, TaskResult,
};

#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub genes: Vec<String>,
    /// Sources to search; the whole catalog when `None`.
    pub sources: Option<Vec<String>>,
    pub alteration_data: Option<Vec<AlterationData>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RepresentativeIds {
    pub source_id: String,
    pub network_id: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct QueryReport {
    pub service_status: ServiceStatus,
    pub sources: Vec<String>,
    pub task_id: TaskId,
    pub poll_attempts: u32,
    pub failed_poll_attempts: u32,
    pub result: TaskResult,
    pub representative: RepresentativeIds,
    pub overlay_aspects: usize,
    #[serde(skip)]
    pub overlay: OverlayNetwork,
}

#[derive(Debug, Clone, Serialize)]
pub struct SourcesResult {
    pub sources: Vec<SourceInfo>,
}

#[derive(Debug, Clone, Serialize)]
pub struct DeleteResult {
    pub task_id: TaskId,
    pub deleted: bool,
}

#[derive(Debug, Clone)]
pub struct ProgressEvent {
    pub message: String,
    pub elapsed: Option<Duration>,
}

impl ProgressEvent {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            elapsed: None,
        }
    }

    pub fn timed(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            message: message.into(),
            elapsed: Some(elapsed),
        }
    }
}

pub trait ProgressSink {
    fn event(&self, event: ProgressEvent);
}

/// Source id of the first source in response order, paired with the first
/// network met walking every source's results in order. The two need not
/// belong together when the first source has no networks.
pub fn pick_representative_ids(result: &TaskResult) -> Option<RepresentativeIds> {
    let source = result.sources.first()?;
    let network = result
        .sources
        .iter()
        .flat_map(|source| source.results.iter())
        .next()?;
    Some(RepresentativeIds {
        source_id: source.source_uuid.clone(),
        network_id: network.network_uuid.clone(),
    })
}

#[derive(Clone)]
pub struct App<C: SearchClient, Z: Sleeper = ThreadSleeper> {
    client: C,
    sleeper: Z,
    policy: PollPolicy,
}

impl<C: SearchClient> App<C, ThreadSleeper> {
    pub fn new(client: C, policy: PollPolicy) -> Self {
        Self::with_sleeper(client, policy, ThreadSleeper)
    }
}

impl<C: SearchClient, Z: Sleeper> App<C, Z> {
    pub fn with_sleeper(client: C, policy: PollPolicy, sleeper: Z) -> Self {
        Self {
            client,
            sleeper,
            policy,
        }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn status(&self, sink: &dyn ProgressSink) -> Result<ServiceStatus, IqueryError> {
        sink.event(ProgressEvent::new("phase=Status; checking service"));
        self.client.check_service_alive()
    }

    pub fn sources(&self, sink: &dyn ProgressSink) -> Result<SourcesResult, IqueryError> {
        sink.event(ProgressEvent::new("phase=Sources; listing sources"));
        let sources = self.client.list_sources()?;
        Ok(SourcesResult { sources })
    }

    pub fn mutation_frequencies(
        &self,
        genes: &[String],
        sink: &dyn ProgressSink,
    ) -> Result<MutationFrequencies, IqueryError> {
        if genes.is_empty() {
            return Err(IqueryError::EmptyGeneList);
        }
        sink.event(ProgressEvent::new(format!(
            "phase=MutationFrequency; {} genes",
            genes.len()
        )));
        self.client.mutation_frequencies(genes)
    }

    /// Runs a query from status probe through overlay retrieval. The task is
    /// left on the server; call [`App::cleanup`] once the report is out.
    pub fn execute(
        &self,
        request: QueryRequest,
        sink: &dyn ProgressSink,
    ) -> Result<QueryReport, IqueryError> {
        let service_status = self.status(sink)?;
        sink.event(ProgressEvent::new(format!(
            "status output: {}",
            service_status.raw_json
        )));

        let catalog = self.sources(sink)?.sources;
        let catalog_names = catalog
            .into_iter()
            .map(|source| source.name)
            .collect::<Vec<_>>();
        sink.event(ProgressEvent::new(format!(
            "source list: {}",
            catalog_names.join(", ")
        )));

        let sources = request.sources.unwrap_or_else(|| catalog_names.clone());
        let mut query = Query::new(&request.genes, &sources)?;
        if let Some(data) = request.alteration_data {
            query = query.with_alteration_data(data);
        }

        sink.event(ProgressEvent::new(format!(
            "phase=Submit; genes {}",
            query.genes().join(", ")
        )));
        let task_id = self.client.submit_query(&query)?;
        info!(%task_id, "query accepted");

        let started = Instant::now();
        let outcome =
            poll_until_complete(&self.client, &task_id, &self.policy, &self.sleeper, sink)?;
        sink.event(ProgressEvent::timed(
            format!("phase=Poll; task {task_id} complete"),
            started.elapsed(),
        ));

        sink.event(ProgressEvent::new("phase=Fetch; retrieving full results"));
        let result = self.client.fetch_full_results(&task_id)?;

        let representative = pick_representative_ids(&result)
            .ok_or_else(|| IqueryError::NoNetworks(task_id.to_string()))?;

        sink.event(ProgressEvent::new(format!(
            "phase=Overlay; network {} under source {}",
            representative.network_id, representative.source_id
        )));
        let overlay = self.client.fetch_overlay_network(
            &task_id,
            &representative.source_id,
            &representative.network_id,
        )?;
        info!(%task_id, aspects = overlay.len(), "overlay network retrieved");

        Ok(QueryReport {
            service_status,
            sources: query.sources().to_vec(),
            task_id,
            poll_attempts: outcome.attempts,
            failed_poll_attempts: outcome.failed_attempts,
            result,
            representative,
            overlay_aspects: overlay.len(),
            overlay,
        })
    }

    pub fn cleanup(
        &self,
        task_id: &TaskId,
        sink: &dyn ProgressSink,
    ) -> Result<DeleteResult, IqueryError> {
        sink.event(ProgressEvent::new(format!(
            "phase=Delete; deleting task {task_id}"
        )));
        self.client.delete_task(task_id)?;
        info!(%task_id, "task deleted");
        Ok(DeleteResult {
            task_id: task_id.clone(),
            deleted: true,
        })
    }
}
