//! Monthly usage statistics from service log files and persisted tasks.

pub mod logs;
pub mod mail;
pub mod monthly;
pub mod tasks;

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use tracing::info;

use crate::error::IqueryError;
use crate::report::monthly::MonthlyCounts;
use crate::report::tasks::Exclusions;

#[derive(Debug, Clone)]
pub struct ReportSection {
    pub title: &'static str,
    pub counts: MonthlyCounts,
}

#[derive(Debug, Clone, Default)]
pub struct UsageReport {
    pub sections: Vec<ReportSection>,
}

impl UsageReport {
    /// Each section title followed by its monthly CSV, blank line between.
    pub fn write_to<W: Write>(&self, out: &mut W, today: NaiveDate) -> io::Result<()> {
        for (index, section) in self.sections.iter().enumerate() {
            if index > 0 {
                writeln!(out)?;
            }
            writeln!(out, "{}", section.title)?;
            section.counts.write_csv(out, today)?;
        }
        Ok(())
    }

    pub fn render(&self, today: NaiveDate) -> io::Result<String> {
        let mut buffer = Vec::new();
        self.write_to(&mut buffer, today)?;
        String::from_utf8(buffer).map_err(io::Error::other)
    }
}

pub fn build_report(
    log_dir: &Path,
    task_dir: Option<&Path>,
    exclusions: &Exclusions,
) -> Result<UsageReport, IqueryError> {
    require_dir(log_dir)?;
    let mut sections = vec![ReportSection {
        title: "Report taken by parsing log files",
        counts: logs::scan_search_logs(log_dir)?,
    }];

    if let Some(counts) = logs::scan_request_logs(log_dir)? {
        sections.push(ReportSection {
            title: "Report taken by parsing request logs",
            counts,
        });
    }

    if let Some(task_dir) = task_dir {
        require_dir(task_dir)?;
        sections.push(ReportSection {
            title: "Report taken by directly parsing tasks",
            counts: tasks::scan_tasks(task_dir, exclusions)?,
        });
    }

    info!(sections = sections.len(), "usage report built");
    Ok(UsageReport { sections })
}

fn require_dir(path: &Path) -> Result<(), IqueryError> {
    if !path.is_dir() {
        return Err(IqueryError::NotADirectory(PathBuf::from(path)));
    }
    Ok(())
}
