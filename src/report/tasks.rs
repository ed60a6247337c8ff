use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Datelike, Local};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::error::IqueryError;
use crate::report::monthly::MonthlyCounts;

pub const RESULTS_FILE: &str = "queryresults.json";

pub const TASK_HEADERS: [&str; 3] = [
    "# Jobs",
    "# Enrichment only jobs (CDAPS)",
    "# Jobs failed or never finished",
];

const COMPLETE_COLUMN: usize = 0;
const ENRICHMENT_COLUMN: usize = 1;
const UNFINISHED_COLUMN: usize = 2;

/// The subset of a persisted `queryresults.json` the report needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskRecord {
    pub start_time: i64,
    pub status: String,
    #[serde(default)]
    pub input_source_list: Option<Vec<String>>,
    #[serde(default)]
    pub query: Option<Vec<String>>,
}

impl TaskRecord {
    pub fn is_complete(&self) -> bool {
        self.status.contains("complete")
    }

    pub fn is_enrichment_only(&self) -> bool {
        matches!(self.input_source_list.as_deref(), Some([only]) if only.contains("enrichment"))
    }

    pub fn started_at(&self) -> Option<DateTime<Local>> {
        DateTime::from_timestamp_millis(self.start_time).map(|utc| utc.with_timezone(&Local))
    }
}

/// Gene lists of known demo queries that should not count as usage.
/// Matching ignores case, order and duplicates.
#[derive(Debug, Clone, Default)]
pub struct Exclusions {
    signatures: Vec<BTreeSet<String>>,
}

impl Exclusions {
    pub fn new(signatures: &[Vec<String>]) -> Self {
        Self {
            signatures: signatures
                .iter()
                .map(|genes| normalize(genes))
                .filter(|set| !set.is_empty())
                .collect(),
        }
    }

    pub fn matches(&self, genes: &[String]) -> bool {
        let set = normalize(genes);
        self.signatures.iter().any(|signature| *signature == set)
    }
}

fn normalize(genes: &[String]) -> BTreeSet<String> {
    genes
        .iter()
        .map(|gene| gene.trim().to_uppercase())
        .filter(|gene| !gene.is_empty())
        .collect()
}

/// Counts tasks per month from every `<task>/queryresults.json` under
/// `tasks_dir`.
pub fn scan_tasks(tasks_dir: &Path, exclusions: &Exclusions) -> Result<MonthlyCounts, IqueryError> {
    let entries = fs::read_dir(tasks_dir).map_err(|err| {
        IqueryError::Filesystem(format!("read {}: {err}", tasks_dir.display()))
    })?;

    let mut counts = MonthlyCounts::new(TASK_HEADERS);
    let mut excluded = 0usize;
    for entry in entries {
        let entry = entry.map_err(|err| IqueryError::Filesystem(err.to_string()))?;
        let results_path = entry.path().join(RESULTS_FILE);
        if !entry.path().is_dir() || !results_path.is_file() {
            continue;
        }

        let record = match read_record(&results_path) {
            Ok(record) => record,
            Err(err) => {
                warn!(path = %results_path.display(), %err, "skipping task");
                continue;
            }
        };
        if record
            .query
            .as_deref()
            .is_some_and(|genes| exclusions.matches(genes))
        {
            excluded += 1;
            continue;
        }
        let Some(started) = record.started_at() else {
            warn!(path = %results_path.display(), "start time out of range");
            continue;
        };

        let (year, month) = (started.year(), started.month());
        if record.is_complete() {
            counts.increment(year, month, COMPLETE_COLUMN);
        } else {
            counts.increment(year, month, UNFINISHED_COLUMN);
        }
        if record.is_enrichment_only() {
            counts.increment(year, month, ENRICHMENT_COLUMN);
        }
    }
    debug!(excluded, "demo queries excluded");
    Ok(counts)
}

fn read_record(path: &Path) -> Result<TaskRecord, IqueryError> {
    let content = fs::read_to_string(path)
        .map_err(|err| IqueryError::Filesystem(format!("read {}: {err}", path.display())))?;
    serde_json::from_str(&content).map_err(|err| IqueryError::MalformedResponse(err.to_string()))
}
