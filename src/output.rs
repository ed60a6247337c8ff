use std::io::{self, Write};

use serde::Serialize;

use crate::app::{
    DeleteResult, ProgressEvent, ProgressSink, QueryReport, RepresentativeIds, SourcesResult,
};
use crate::search::{MutationFrequencies, ServiceStatus, TaskResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_status(result: &ServiceStatus) -> io::Result<()> {
        Self::print_json(&result.raw_json)
    }

    pub fn print_sources(result: &SourcesResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_query(result: &QueryReport) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_delete(result: &DeleteResult) -> io::Result<()> {
        Self::print_json(result)
    }

    pub fn print_mutation_frequencies(result: &MutationFrequencies) -> io::Result<()> {
        Self::print_json(result)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}

/// Line-oriented output for humans; progress events go to stdout as they
/// happen.
pub struct TextOutput;

impl TextOutput {
    pub fn print_status(result: &ServiceStatus) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "Status output:")?;
        writeln!(stdout, "\t{}", result.raw_json)
    }

    pub fn print_sources(result: &SourcesResult) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        writeln!(stdout, "Source list:")?;
        for source in &result.sources {
            match &source.description {
                Some(description) => writeln!(stdout, "\t{}: {}", source.name, description)?,
                None => writeln!(stdout, "\t{}", source.name)?,
            }
        }
        Ok(())
    }

    pub fn print_query(result: &QueryReport) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        write_task_result(&mut stdout, &result.result)?;
        write_overlay_summary(&mut stdout, &result.representative, result.overlay_aspects)
    }

    pub fn print_delete(result: &DeleteResult) -> io::Result<()> {
        println!("Deleted task {}", result.task_id);
        Ok(())
    }

    pub fn print_mutation_frequencies(result: &MutationFrequencies) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        for (gene, frequency) in &result.mutation_frequencies {
            writeln!(stdout, "{gene}\t{frequency:.2}")?;
        }
        Ok(())
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        println!("{}", progress_line(&event));
    }
}

/// Payload of a `phase=<Name>; <payload>` message, with elapsed time if any.
pub fn progress_line(event: &ProgressEvent) -> String {
    let message = event
        .message
        .strip_prefix("phase=")
        .and_then(|rest| rest.split_once("; "))
        .map(|(_, payload)| payload)
        .unwrap_or(&event.message);
    match event.elapsed {
        Some(elapsed) => format!("{message} ({:.1}s)", elapsed.as_secs_f64()),
        None => message.to_string(),
    }
}

pub fn write_task_result<W: Write>(out: &mut W, result: &TaskResult) -> io::Result<()> {
    for source in &result.sources {
        writeln!(out, "\nFor source: {}", source.source_name)?;
        writeln!(out, "\tSourceUUID: {}", source.source_uuid)?;
        writeln!(out, "\tNum hits: {}", source.number_of_hits)?;
        for network in &source.results {
            writeln!(out, "\t\tDescription: {}", network.description)?;
            writeln!(out, "\t\tNumNodes: {}", network.nodes)?;
            writeln!(out, "\t\tHitGenes: {}", network.hit_genes.join(", "))?;
            writeln!(out, "\t\tNetworkUUID: {}", network.network_uuid)?;
            writeln!(out, "\t\tDetails: {}\n", network.details)?;
        }
    }
    Ok(())
}

pub fn write_overlay_summary<W: Write>(
    out: &mut W,
    ids: &RepresentativeIds,
    aspects: usize,
) -> io::Result<()> {
    writeln!(
        out,
        "For network {} under source {}",
        ids.network_id, ids.source_id
    )?;
    writeln!(out, "Got CX with {aspects} aspects")
}
