use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IqueryError;

pub const DEFAULT_GENES: &[&str] = &["mtor", "tp53"];

/// Opaque identifier of a search task, as returned by the service on submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct TaskId(String);

impl TaskId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for TaskId {
    type Err = IqueryError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        let is_valid = !trimmed.is_empty()
            && !trimmed
                .chars()
                .any(|ch| ch.is_whitespace() || matches!(ch, '/' | '?' | '#'));
        if !is_valid {
            return Err(IqueryError::InvalidTaskId(value.to_string()));
        }
        Ok(Self(trimmed.to_string()))
    }
}

impl TryFrom<String> for TaskId {
    type Error = IqueryError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<TaskId> for String {
    fn from(value: TaskId) -> Self {
        value.0
    }
}

/// Per-gene alteration counts that can ride along with a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlterationData {
    pub gene: String,
    pub altered: u64,
    pub sequenced: u64,
    pub percent_altered: String,
}

impl AlterationData {
    /// Reads a JSON array of alteration entries, as passed to
    /// `query --alteration-data`.
    pub fn read_json(path: &Path) -> Result<Vec<AlterationData>, IqueryError> {
        let content = fs::read_to_string(path).map_err(|err| IqueryError::AlterationData {
            path: path.to_path_buf(),
            message: err.to_string(),
        })?;
        serde_json::from_str(&content).map_err(|err| IqueryError::AlterationData {
            path: path.to_path_buf(),
            message: err.to_string(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Query {
    gene_list: Vec<String>,
    source_list: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    alteration_data: Option<Vec<AlterationData>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    gene_annotation_services: Option<BTreeMap<String, String>>,
}

impl Query {
    pub fn new<G, S>(genes: G, sources: S) -> Result<Self, IqueryError>
    where
        G: IntoIterator,
        G::Item: AsRef<str>,
        S: IntoIterator,
        S::Item: AsRef<str>,
    {
        let gene_list = genes
            .into_iter()
            .map(|gene| parse_gene(gene.as_ref()))
            .collect::<Result<Vec<_>, IqueryError>>()?;
        if gene_list.is_empty() {
            return Err(IqueryError::EmptyGeneList);
        }

        let source_list = sources
            .into_iter()
            .map(|source| source.as_ref().trim().to_string())
            .filter(|source| !source.is_empty())
            .collect::<Vec<_>>();
        if source_list.is_empty() {
            return Err(IqueryError::EmptySourceList);
        }

        Ok(Self {
            gene_list,
            source_list,
            alteration_data: None,
            gene_annotation_services: None,
        })
    }

    pub fn with_alteration_data(mut self, data: Vec<AlterationData>) -> Self {
        self.alteration_data = Some(data);
        self
    }

    pub fn with_gene_annotation_services(mut self, services: BTreeMap<String, String>) -> Self {
        self.gene_annotation_services = Some(services);
        self
    }

    pub fn genes(&self) -> &[String] {
        &self.gene_list
    }

    pub fn sources(&self) -> &[String] {
        &self.source_list
    }

    pub fn alteration_data(&self) -> Option<&[AlterationData]> {
        self.alteration_data.as_deref()
    }
}

fn parse_gene(value: &str) -> Result<String, IqueryError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.chars().any(char::is_whitespace) {
        return Err(IqueryError::InvalidGene(value.to_string()));
    }
    Ok(trimmed.to_string())
}
