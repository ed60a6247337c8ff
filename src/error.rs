use std::path::PathBuf;

use miette::Diagnostic;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum IqueryError {
    #[error("invalid gene name: {0:?}")]
    InvalidGene(String),

    #[error("query needs at least one gene")]
    EmptyGeneList,

    #[error("query needs at least one source")]
    EmptySourceList,

    #[error("invalid task id: {0:?}")]
    InvalidTaskId(String),

    #[error("failed to load alteration data from {path}: {message}")]
    AlterationData { path: PathBuf, message: String },

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),

    #[error("failed to read config file at {0}")]
    ConfigRead(PathBuf),

    #[error("failed to parse JSON config: {0}")]
    ConfigParse(String),

    #[error("search request failed: {0}")]
    SearchHttp(String),

    #[error("search service returned status {status}: {message}")]
    SearchStatus { status: u16, message: String },

    #[error("malformed response from search service: {0}")]
    MalformedResponse(String),

    #[error("there was an error getting status ({status}): {message}")]
    #[diagnostic(help("check the endpoint and that the service is up"))]
    ServiceUnavailable { status: u16, message: String },

    #[error("there was an error listing sources ({status}): {message}")]
    SourceList { status: u16, message: String },

    #[error("query was not accepted ({status}): {message}")]
    QueryRejected { status: u16, message: String },

    #[error("received {failures} consecutive errors polling task {task_id}")]
    #[diagnostic(help("is your net connection down?"))]
    PollExhausted { task_id: String, failures: u32 },

    #[error("task {0} has no networks in any source")]
    NoNetworks(String),

    #[error("got non 200 for delete of task {task_id} ({status}): {message}")]
    TaskDelete {
        task_id: String,
        status: u16,
        message: String,
    },

    #[error("filesystem error: {0}")]
    Filesystem(String),

    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),

    #[error("invalid log file name: {0}")]
    InvalidLogName(String),

    #[error("invalid email address: {0}")]
    InvalidAddress(String),

    #[error("failed to send report email: {0}")]
    Mail(String),
}
