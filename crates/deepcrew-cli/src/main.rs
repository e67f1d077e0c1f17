mod client;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use clap::{Args, Parser, Subcommand};
use client::{DEFAULT_API_URL, ResearchClient};
use deepcrew_agents::QueryService;
use deepcrew_core::{
    ConfigLoader, ReportCheck, TelemetryOptions, check_report, compose_query, init_telemetry,
    metrics, redact,
};
use tokio::runtime::Runtime;
use tracing::info;

#[derive(Parser, Debug)]
#[command(
    name = "deepcrew",
    version,
    about = "Search, analyze and write a cited research report"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the research pipeline in-process.
    Run(RunArgs),
    /// Send a query to a running deepcrew-api server.
    Ask(AskArgs),
    /// Check an existing markdown report for structure and citation problems.
    Check(CheckArgs),
}

#[derive(Args, Debug)]
struct QueryArgs {
    /// Research question.
    #[arg(long, default_value = "")]
    query: String,

    /// Text file whose contents are attached to the question.
    #[arg(long)]
    file: Option<PathBuf>,

    /// Write the result here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct RunArgs {
    #[command(flatten)]
    query: QueryArgs,

    /// Path to a TOML config file (otherwise `DEEPCREW_CONFIG` or built-in defaults).
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print report check findings to stderr.
    #[arg(long)]
    check: bool,

    /// Emit the full outcome (stages, events, check) as JSON instead of the report.
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
struct AskArgs {
    #[command(flatten)]
    query: QueryArgs,

    /// Query endpoint of the API server.
    #[arg(long, env = "RESEARCH_API_URL", default_value = DEFAULT_API_URL)]
    api_url: String,
}

#[derive(Args, Debug)]
struct CheckArgs {
    /// Markdown report to inspect.
    #[arg(long)]
    report: PathBuf,
}

fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let rt = Runtime::new()?;
    rt.block_on(async move {
        match cli.command {
            Command::Run(args) => run_command(args).await?,
            Command::Ask(args) => ask_command(args).await?,
            Command::Check(args) => check_command(args)?,
        }
        Ok::<(), anyhow::Error>(())
    })?;

    Ok(())
}

async fn run_command(args: RunArgs) -> Result<()> {
    let config = ConfigLoader::load(args.config.clone())?;
    init_telemetry(TelemetryOptions {
        to_stderr: true,
        ..TelemetryOptions::with_default_level(&config.logging.level)
    })?;
    metrics::init_metrics_from_env("deepcrew-cli");

    let query = read_query(&args.query)?;
    info!(chars = query.len(), model = %config.llm.model, "starting research run");

    let service = QueryService::from_config(&config)?;
    let outcome = service
        .run_detailed(&query)
        .await
        .map_err(|err| anyhow!(redact(&err.to_string())))?;
    info!(run_id = %outcome.run_id, stages = outcome.stages.len(), "research run finished");

    if args.json {
        let rendered = serde_json::to_string_pretty(&outcome)?;
        write_output(&rendered, args.query.output.as_deref())?;
    } else {
        write_output(&outcome.report, args.query.output.as_deref())?;
    }

    if args.check {
        eprint!("{}", describe_check(&outcome.check));
    }

    Ok(())
}

async fn ask_command(args: AskArgs) -> Result<()> {
    init_telemetry(TelemetryOptions {
        to_stderr: true,
        ..TelemetryOptions::with_default_level("warn")
    })?;

    let query = read_query(&args.query)?;
    let client = ResearchClient::new(args.api_url);
    let result = client.ask(&query).await;
    write_output(&result, args.query.output.as_deref())
}

fn check_command(args: CheckArgs) -> Result<()> {
    let markdown = fs::read_to_string(&args.report)
        .with_context(|| format!("failed to read {}", args.report.display()))?;
    let check = check_report(&markdown);
    print!("{}", describe_check(&check));

    if !check.is_clean() {
        bail!("{} issue(s) found in {}", check.issues.len(), args.report.display());
    }
    Ok(())
}

fn read_query(args: &QueryArgs) -> Result<String> {
    let attachment = args
        .file
        .as_deref()
        .map(|path| {
            fs::read_to_string(path)
                .with_context(|| format!("failed to read attachment {}", path.display()))
        })
        .transpose()?;
    Ok(compose_query(&args.query, attachment.as_deref()))
}

fn write_output(text: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
            info!(path = %path.display(), "result written");
        }
        None => println!("{text}"),
    }
    Ok(())
}

fn describe_check(check: &ReportCheck) -> String {
    if check.is_clean() {
        return "report check: no issues\n".to_string();
    }
    let mut out = format!("report check: {} issue(s)\n", check.issues.len());
    for issue in &check.issues {
        out.push_str(&format!("- {issue}\n"));
    }
    out
}
