use std::path::PathBuf;
use std::process::ExitCode;

use chrono::Local;
use clap::{Args, Parser, Subcommand};
use miette::IntoDiagnostic;
use tracing_subscriber::EnvFilter;

use iquery_tools::app::{App, QueryRequest};
use iquery_tools::config::{ConfigLoader, ResolvedConfig, normalize_endpoint};
use iquery_tools::domain::{AlterationData, DEFAULT_GENES};
use iquery_tools::error::IqueryError;
use iquery_tools::output::{JsonOutput, OutputMode, TextOutput};
use iquery_tools::poll::PollPolicy;
use iquery_tools::report::build_report;
use iquery_tools::report::mail::{
    MailTransport, SmtpRelay, build_report_message, parse_recipients, report_subject,
};
use iquery_tools::report::tasks::Exclusions;
use iquery_tools::search::SearchHttpClient;

#[derive(Parser)]
#[command(name = "iquery")]
#[command(about = "Client and usage reports for the NDEx integrated search (IQuery) service")]
#[command(version, author)]
struct Cli {
    /// Path to an iquery.json config file
    #[arg(long, global = true)]
    config: Option<String>,

    /// Base URL of the search service, e.g. http://localhost:8290/v1
    #[arg(long, global = true)]
    endpoint: Option<String>,

    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(about = "Check that the service is alive")]
    Status,
    #[command(about = "List searchable sources")]
    Sources,
    #[command(about = "Run a query, wait for it, fetch one overlay network and delete the task")]
    Query(QueryArgs),
    #[command(about = "Look up mutation frequencies for genes")]
    Mutfreq(MutfreqArgs),
    #[command(about = "Monthly usage report from log files and task directories")]
    Report(ReportArgs),
}

#[derive(Args)]
struct QueryArgs {
    /// Gene to search for (repeatable); defaults to mtor and tp53
    #[arg(long = "gene")]
    genes: Vec<String>,

    /// Source to search (repeatable); defaults to every listed source
    #[arg(long = "source")]
    sources: Vec<String>,

    /// JSON file holding an array of {gene, altered, sequenced, percentAltered}
    #[arg(long)]
    alteration_data: Option<PathBuf>,

    #[arg(long)]
    poll_interval_ms: Option<u64>,

    #[arg(long)]
    max_failures: Option<u32>,
}

#[derive(Args)]
struct MutfreqArgs {
    #[arg(required = true)]
    genes: Vec<String>,
}

#[derive(Args)]
struct ReportArgs {
    /// Directory containing log files
    logdir: PathBuf,

    /// Directory containing tasks
    #[arg(long)]
    taskdir: Option<PathBuf>,

    /// Comma delimited email addresses; mails the report instead of printing it
    #[arg(long)]
    emails: Option<String>,

    /// SMTP server
    #[arg(long)]
    smtpserver: Option<String>,

    /// Label used in the subject line of the email report
    #[arg(long)]
    label: Option<String>,
}

fn main() -> ExitCode {
    if let Err(report) = run() {
        eprintln!("{report:?}");
        if let Some(error) = report.downcast_ref::<IqueryError>() {
            return ExitCode::from(map_exit_code(error));
        }
        return ExitCode::from(1);
    }
    ExitCode::SUCCESS
}

fn map_exit_code(error: &IqueryError) -> u8 {
    match error {
        IqueryError::InvalidGene(_)
        | IqueryError::EmptyGeneList
        | IqueryError::EmptySourceList
        | IqueryError::InvalidTaskId(_)
        | IqueryError::InvalidEndpoint(_)
        | IqueryError::AlterationData { .. }
        | IqueryError::ConfigRead(_)
        | IqueryError::ConfigParse(_)
        | IqueryError::NotADirectory(_)
        | IqueryError::InvalidAddress(_) => 2,
        IqueryError::SearchHttp(_)
        | IqueryError::SearchStatus { .. }
        | IqueryError::MalformedResponse(_)
        | IqueryError::ServiceUnavailable { .. }
        | IqueryError::SourceList { .. }
        | IqueryError::QueryRejected { .. }
        | IqueryError::NoNetworks(_) => 3,
        IqueryError::PollExhausted { .. } => 4,
        IqueryError::TaskDelete { .. } => 5,
        _ => 1,
    }
}

fn run() -> miette::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let output_mode = if cli.json {
        OutputMode::Json
    } else {
        OutputMode::Text
    };

    let mut config = ConfigLoader::resolve(cli.config.as_deref())?;
    if let Some(endpoint) = cli.endpoint.as_deref() {
        config.endpoint = normalize_endpoint(endpoint)?;
    }

    match cli.command {
        Commands::Status => run_status(&config, output_mode),
        Commands::Sources => run_sources(&config, output_mode),
        Commands::Query(args) => run_query(args, &config, output_mode),
        Commands::Mutfreq(args) => run_mutfreq(args, &config, output_mode),
        Commands::Report(args) => run_report(args, &config),
    }
}

fn build_app(
    config: &ResolvedConfig,
    policy: PollPolicy,
) -> Result<App<SearchHttpClient>, IqueryError> {
    let client = SearchHttpClient::new(&config.endpoint, config.timeout)?;
    Ok(App::new(client, policy))
}

fn default_policy(config: &ResolvedConfig) -> PollPolicy {
    PollPolicy {
        interval: config.poll_interval,
        max_consecutive_failures: config.max_consecutive_failures,
    }
}

fn run_status(config: &ResolvedConfig, output_mode: OutputMode) -> miette::Result<()> {
    let app = build_app(config, default_policy(config))?;
    match output_mode {
        OutputMode::Json => {
            let status = app.status(&JsonOutput)?;
            JsonOutput::print_status(&status).into_diagnostic()
        }
        OutputMode::Text => {
            let status = app.status(&TextOutput)?;
            TextOutput::print_status(&status).into_diagnostic()
        }
    }
}

fn run_sources(config: &ResolvedConfig, output_mode: OutputMode) -> miette::Result<()> {
    let app = build_app(config, default_policy(config))?;
    match output_mode {
        OutputMode::Json => {
            let result = app.sources(&JsonOutput)?;
            JsonOutput::print_sources(&result).into_diagnostic()
        }
        OutputMode::Text => {
            let result = app.sources(&TextOutput)?;
            TextOutput::print_sources(&result).into_diagnostic()
        }
    }
}

fn run_query(
    args: QueryArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let QueryArgs {
        genes,
        sources,
        alteration_data,
        poll_interval_ms,
        max_failures,
    } = args;

    let mut policy = default_policy(config);
    if let Some(interval) = poll_interval_ms {
        policy.interval = std::time::Duration::from_millis(interval);
    }
    if let Some(max_failures) = max_failures {
        if max_failures == 0 {
            return Err(miette::Report::msg("--max-failures must be at least 1"));
        }
        policy.max_consecutive_failures = max_failures;
    }

    let genes = if genes.is_empty() {
        DEFAULT_GENES.iter().map(|gene| gene.to_string()).collect()
    } else {
        genes
    };
    let alteration_data = alteration_data
        .as_deref()
        .map(AlterationData::read_json)
        .transpose()?;
    let request = QueryRequest {
        genes,
        sources: (!sources.is_empty()).then_some(sources),
        alteration_data,
    };

    let app = build_app(config, policy)?;
    match output_mode {
        OutputMode::Json => {
            let report = app.execute(request, &JsonOutput)?;
            JsonOutput::print_query(&report).into_diagnostic()?;
            let deleted = app.cleanup(&report.task_id, &JsonOutput)?;
            JsonOutput::print_delete(&deleted).into_diagnostic()
        }
        OutputMode::Text => {
            let report = app.execute(request, &TextOutput)?;
            TextOutput::print_query(&report).into_diagnostic()?;
            let deleted = app.cleanup(&report.task_id, &TextOutput)?;
            TextOutput::print_delete(&deleted).into_diagnostic()
        }
    }
}

fn run_mutfreq(
    args: MutfreqArgs,
    config: &ResolvedConfig,
    output_mode: OutputMode,
) -> miette::Result<()> {
    let app = build_app(config, default_policy(config))?;
    match output_mode {
        OutputMode::Json => {
            let result = app.mutation_frequencies(&args.genes, &JsonOutput)?;
            JsonOutput::print_mutation_frequencies(&result).into_diagnostic()
        }
        OutputMode::Text => {
            let result = app.mutation_frequencies(&args.genes, &TextOutput)?;
            TextOutput::print_mutation_frequencies(&result).into_diagnostic()
        }
    }
}

fn run_report(args: ReportArgs, config: &ResolvedConfig) -> miette::Result<()> {
    let exclusions = Exclusions::new(&config.report.excluded_queries);
    let report = build_report(&args.logdir, args.taskdir.as_deref(), &exclusions)?;
    let now = Local::now();
    let body = report.render(now.date_naive()).into_diagnostic()?;

    let Some(emails) = args.emails else {
        print!("{body}");
        return Ok(());
    };

    let label = args.label.as_deref().unwrap_or(&config.report.label);
    let server = args
        .smtpserver
        .unwrap_or_else(|| config.report.smtp_server.clone());
    let recipients = parse_recipients(&emails)?;
    let message = build_report_message(
        &config.report.from,
        recipients,
        report_subject(label, now.naive_local()),
        body,
    )?;
    SmtpRelay::new(server).send(&message)?;
    Ok(())
}
