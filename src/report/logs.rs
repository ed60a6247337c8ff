use std::fs;
use std::path::Path;
use std::sync::LazyLock;

use camino::Utf8PathBuf;
use chrono::{Datelike, NaiveDate, NaiveTime};
use regex::Regex;
use tracing::{debug, warn};

use crate::error::IqueryError;
use crate::report::monthly::MonthlyCounts;

pub const SEARCH_LOG_PREFIX: &str = "ndexsearch_";
pub const REQUEST_LOG_PREFIX: &str = "requests_";
pub const QUERY_MARKER: &str = "- Query ";
pub const OVERLAY_MARKER: &str = "/overlaynetwork]";

pub const JOB_HEADERS: [&str; 2] = [
    "# Jobs",
    "# Failed Jobs (does not count jobs that never finished)",
];
pub const REQUEST_HEADERS: [&str; 1] = ["# Overlay network requests"];

static QUERY_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<time>\d{2}:\d{2}:\d{2})(?:\.\d+)?\s.*?- Query (?P<task>\S+)")
        .expect("query line pattern")
});

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEventKind {
    Submitted,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryEvent {
    pub kind: QueryEventKind,
    pub task_id: Option<String>,
    pub time: Option<NaiveTime>,
}

impl QueryEvent {
    /// Column of [`JOB_HEADERS`] this event counts towards. Jobs still
    /// submitted or processing land with the failures.
    pub fn column(&self) -> usize {
        match self.kind {
            QueryEventKind::Completed => 0,
            QueryEventKind::Submitted | QueryEventKind::Failed => 1,
        }
    }
}

/// Maps a search log line to a query event; lines without the query
/// marker yield `None`.
pub fn parse_query_line(line: &str) -> Option<QueryEvent> {
    if !line.contains(QUERY_MARKER) {
        return None;
    }

    let kind = if line.contains("failed") {
        QueryEventKind::Failed
    } else if line.contains("submitted") || line.contains("processing") {
        QueryEventKind::Submitted
    } else {
        QueryEventKind::Completed
    };

    let captures = QUERY_LINE.captures(line);
    let time = captures
        .as_ref()
        .and_then(|caps| caps.name("time"))
        .and_then(|value| NaiveTime::parse_from_str(value.as_str(), "%H:%M:%S").ok());
    let task_id = captures
        .as_ref()
        .and_then(|caps| caps.name("task"))
        .map(|value| value.as_str().to_string());

    Some(QueryEvent {
        kind,
        task_id,
        time,
    })
}

/// Date encoded in a `<prefix>YYYY_MM_DD.log` file name.
pub fn parse_log_date(prefix: &str, file_name: &str) -> Result<NaiveDate, IqueryError> {
    file_name
        .strip_prefix(prefix)
        .and_then(|rest| rest.strip_suffix(".log"))
        .and_then(|stamp| NaiveDate::parse_from_str(stamp, "%Y_%m_%d").ok())
        .ok_or_else(|| IqueryError::InvalidLogName(file_name.to_string()))
}

/// Counts query events per month across `ndexsearch_*.log` files.
pub fn scan_search_logs(log_dir: &Path) -> Result<MonthlyCounts, IqueryError> {
    let mut counts = MonthlyCounts::new(JOB_HEADERS);
    for (date, path) in dated_logs(log_dir, SEARCH_LOG_PREFIX)? {
        let Some(content) = read_lossy(&path) else {
            continue;
        };
        for event in content.lines().filter_map(parse_query_line) {
            debug!(
                %date,
                task = event.task_id.as_deref().unwrap_or("-"),
                time = ?event.time,
                kind = ?event.kind,
                "query event"
            );
            counts.increment(date.year(), date.month(), event.column());
        }
    }
    Ok(counts)
}

/// Counts overlay network requests per month across `requests_*.log`
/// files. `None` when the directory holds no request logs.
pub fn scan_request_logs(log_dir: &Path) -> Result<Option<MonthlyCounts>, IqueryError> {
    let logs = dated_logs(log_dir, REQUEST_LOG_PREFIX)?;
    if logs.is_empty() {
        return Ok(None);
    }

    let mut counts = MonthlyCounts::new(REQUEST_HEADERS);
    for (date, path) in logs {
        let Some(content) = read_lossy(&path) else {
            continue;
        };
        for _ in content.lines().filter(|line| line.contains(OVERLAY_MARKER)) {
            counts.increment(date.year(), date.month(), 0);
        }
    }
    Ok(Some(counts))
}

fn dated_logs(
    log_dir: &Path,
    prefix: &str,
) -> Result<Vec<(NaiveDate, Utf8PathBuf)>, IqueryError> {
    let entries = fs::read_dir(log_dir)
        .map_err(|err| IqueryError::Filesystem(format!("read {}: {err}", log_dir.display())))?;

    let mut logs = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| IqueryError::Filesystem(err.to_string()))?;
        let Ok(path) = Utf8PathBuf::from_path_buf(entry.path()) else {
            continue;
        };
        let Some(name) = path.file_name() else {
            continue;
        };
        if !name.starts_with(prefix) || !name.ends_with(".log") || !path.is_file() {
            continue;
        }
        match parse_log_date(prefix, name) {
            Ok(date) => logs.push((date, path)),
            Err(err) => warn!(%err, "skipping log file"),
        }
    }
    logs.sort();
    debug!(count = logs.len(), prefix, "log files found");
    Ok(logs)
}

fn read_lossy(path: &Utf8PathBuf) -> Option<String> {
    match fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(err) => {
            warn!(%path, error = %err, "unable to read log file");
            None
        }
    }
}
