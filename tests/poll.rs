use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use assert_matches::assert_matches;

use iquery_tools::app::{ProgressEvent, ProgressSink};
use iquery_tools::domain::{Query, TaskId};
use iquery_tools::error::IqueryError;
use iquery_tools::poll::{PollPolicy, Sleeper, poll_until_complete};
use iquery_tools::search::{
    MutationFrequencies, OverlayNetwork, SearchClient, ServiceStatus, SourceInfo, SourceStatus,
    TaskResult, TaskStatus,
};

struct NoopSink;

impl ProgressSink for NoopSink {
    fn event(&self, _event: ProgressEvent) {}
}

#[derive(Default)]
struct RecordingSink {
    messages: Mutex<Vec<String>>,
}

impl ProgressSink for RecordingSink {
    fn event(&self, event: ProgressEvent) {
        self.messages.lock().unwrap().push(event.message);
    }
}

#[derive(Default)]
struct RecordingSleeper {
    naps: Mutex<Vec<Duration>>,
}

impl Sleeper for RecordingSleeper {
    fn sleep(&self, duration: Duration) {
        self.naps.lock().unwrap().push(duration);
    }
}

/// Serves scripted status responses; `None` entries are failed fetches.
struct ScriptedStatus {
    script: Mutex<VecDeque<Option<Vec<u32>>>>,
    calls: Mutex<usize>,
}

impl ScriptedStatus {
    fn new(script: Vec<Option<Vec<u32>>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(0),
        }
    }

    fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

fn status(progress: &[u32]) -> TaskStatus {
    TaskStatus {
        status: None,
        message: None,
        progress: None,
        start_time: None,
        wall_time: None,
        number_of_hits: None,
        sources: progress
            .iter()
            .map(|&progress| SourceStatus {
                source_name: None,
                source_uuid: None,
                status: None,
                progress,
                number_of_hits: None,
            })
            .collect(),
    }
}

impl SearchClient for ScriptedStatus {
    fn check_service_alive(&self) -> Result<ServiceStatus, IqueryError> {
        unreachable!("not used by the poller")
    }

    fn list_sources(&self) -> Result<Vec<SourceInfo>, IqueryError> {
        unreachable!("not used by the poller")
    }

    fn submit_query(&self, _query: &Query) -> Result<TaskId, IqueryError> {
        unreachable!("not used by the poller")
    }

    fn task_status(&self, _task_id: &TaskId) -> Result<TaskStatus, IqueryError> {
        *self.calls.lock().unwrap() += 1;
        match self.script.lock().unwrap().pop_front() {
            Some(Some(progress)) => Ok(status(&progress)),
            Some(None) => Err(IqueryError::SearchStatus {
                status: 500,
                message: "boom".to_string(),
            }),
            None => panic!("poller kept going after the script ended"),
        }
    }

    fn fetch_full_results(&self, _task_id: &TaskId) -> Result<TaskResult, IqueryError> {
        unreachable!("not used by the poller")
    }

    fn fetch_overlay_network(
        &self,
        _task_id: &TaskId,
        _source_id: &str,
        _network_id: &str,
    ) -> Result<OverlayNetwork, IqueryError> {
        unreachable!("not used by the poller")
    }

    fn delete_task(&self, _task_id: &TaskId) -> Result<(), IqueryError> {
        unreachable!("not used by the poller")
    }

    fn mutation_frequencies(&self, _genes: &[String]) -> Result<MutationFrequencies, IqueryError> {
        unreachable!("not used by the poller")
    }
}

fn task() -> TaskId {
    "task-1".parse().unwrap()
}

#[test]
fn waits_for_slowest_source() {
    let client = ScriptedStatus::new(vec![
        Some(vec![100, 50, 100]),
        Some(vec![100, 99, 100]),
        Some(vec![100, 100, 100]),
    ]);
    let sleeper = RecordingSleeper::default();

    let outcome = poll_until_complete(
        &client,
        &task(),
        &PollPolicy::default(),
        &sleeper,
        &NoopSink,
    )
    .unwrap();

    assert_eq!(outcome.attempts, 3);
    assert_eq!(outcome.failed_attempts, 0);
    assert_eq!(outcome.status.overall_progress(), Some(100));
    assert_eq!(
        *sleeper.naps.lock().unwrap(),
        vec![Duration::from_secs(1); 3]
    );
}

#[test]
fn streak_reset_by_success_delays_abort() {
    let mut script = vec![None; 4];
    script.push(Some(vec![40]));
    script.extend(vec![None; 5]);
    let client = ScriptedStatus::new(script);

    let err = poll_until_complete(
        &client,
        &task(),
        &PollPolicy::default(),
        &RecordingSleeper::default(),
        &NoopSink,
    )
    .unwrap_err();

    assert_matches!(err, IqueryError::PollExhausted { failures: 5, .. });
    assert_eq!(client.calls(), 10);
}

#[test]
fn five_straight_failures_abort() {
    let client = ScriptedStatus::new(vec![None; 5]);
    let err = poll_until_complete(
        &client,
        &task(),
        &PollPolicy::default(),
        &RecordingSleeper::default(),
        &NoopSink,
    )
    .unwrap_err();

    assert_matches!(err, IqueryError::PollExhausted { failures: 5, .. });
    assert_eq!(client.calls(), 5);
}

#[test]
fn failures_then_completion_succeeds() {
    let client = ScriptedStatus::new(vec![
        None,
        None,
        None,
        None,
        Some(vec![100, 100]),
    ]);
    let outcome = poll_until_complete(
        &client,
        &task(),
        &PollPolicy::default(),
        &RecordingSleeper::default(),
        &NoopSink,
    )
    .unwrap();

    assert_eq!(outcome.attempts, 5);
    assert_eq!(outcome.failed_attempts, 4);
}

#[test]
fn empty_source_list_counts_as_failure() {
    let client = ScriptedStatus::new(vec![Some(vec![]), Some(vec![100])]);
    let outcome = poll_until_complete(
        &client,
        &task(),
        &PollPolicy {
            interval: Duration::ZERO,
            max_consecutive_failures: 2,
        },
        &RecordingSleeper::default(),
        &NoopSink,
    )
    .unwrap();

    assert_eq!(outcome.failed_attempts, 1);
}

#[test]
fn failed_polls_report_under_poll_phase() {
    let client = ScriptedStatus::new(vec![None, Some(vec![]), Some(vec![100])]);
    let sink = RecordingSink::default();

    poll_until_complete(
        &client,
        &task(),
        &PollPolicy::default(),
        &RecordingSleeper::default(),
        &sink,
    )
    .unwrap();

    let messages = sink.messages.lock().unwrap();
    assert_eq!(messages.len(), 3);
    assert!(messages.iter().all(|message| message.starts_with("phase=Poll; ")));
    assert!(messages[0].contains("ran into some error"));
    assert!(messages[1].contains("status listed no sources"));
}
