//! gwlog - API-gateway access-log ingestion CLI.
//!
//! `gwlog fetch` stages the logs of a date range locally; `gwlog load` writes
//! staged records to the database. Logs go to stderr, the JSON run summary to
//! stdout.

use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use gwlog_common::schema::access_log_json_schema;
use gwlog_common::{DateRange, Error, Marker, ResumePoint, SCHEMA_VERSION};
use gwlog_config::{resolve_config, ConfigOverrides, IngestConfig, ValidationPolicy};
use gwlog_core::exit_codes::ExitCode;
use gwlog_core::logging::{init_logging, LogFormat};
use gwlog_core::pipeline::{run_fetch, run_load, FetchRequest};
use gwlog_core::prefix::parse_day_prefix;
use gwlog_core::store::{create_s3_client, S3Config, S3ObjectStore};
use gwlog_core::PgAccessLogStore;
use serde_json::json;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::error;

#[derive(Parser, Debug)]
#[command(name = "gwlog")]
#[command(author, version, about = "API-gateway access-log ingestion")]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    global: GlobalOpts,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug)]
struct GlobalOpts {
    /// JSON config file
    #[arg(long, global = true, env = "GWLOG_CONFIG")]
    config: Option<PathBuf>,

    /// Directory holding staged files
    #[arg(long, global = true)]
    staging_dir: Option<PathBuf>,

    /// Log output format
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Download and stage the logs of a date range
    Fetch(FetchArgs),

    /// Load staged logs into the database
    Load(LoadArgs),

    /// Print the JSON Schema of an access-log record
    Schema,
}

#[derive(Args, Debug)]
struct FetchArgs {
    /// Environment name (prod, stg, dev); selects the bucket
    #[arg(long = "env")]
    environment: String,

    /// First day to fetch (YYYY-MM-DD)
    #[arg(long)]
    start: NaiveDate,

    /// Day after the last day to fetch (YYYY-MM-DD, exclusive)
    #[arg(long)]
    end: NaiveDate,

    /// Resume after this key
    #[arg(long, default_value = "")]
    marker: String,

    /// AWS region of the bucket
    #[arg(long)]
    region: Option<String>,

    /// Custom S3 endpoint (MinIO, LocalStack)
    #[arg(long)]
    endpoint_url: Option<String>,

    /// Named AWS profile
    #[arg(long, env = "AWS_PROFILE")]
    profile: Option<String>,
}

#[derive(Args, Debug)]
struct LoadArgs {
    /// Create the table if it does not exist
    #[arg(long)]
    create_table: bool,

    /// Database connection URL
    #[arg(long)]
    database_url: Option<String>,

    /// What to do with records that fail validation (abort, skip)
    #[arg(long, value_parser = parse_policy)]
    validation_policy: Option<ValidationPolicy>,
}

fn parse_policy(s: &str) -> Result<ValidationPolicy, String> {
    ValidationPolicy::parse(s)
        .ok_or_else(|| format!("unknown policy {s:?} (expected abort or skip)"))
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = init_logging(cli.global.log_format, cli.global.verbose) {
        eprintln!("gwlog: failed to initialize logging: {e}");
        std::process::exit(ExitCode::InternalError.as_i32());
    }

    let code = match run(&cli).await {
        Ok(()) => ExitCode::Clean,
        Err(err) => report_error(&cli, &err),
    };
    std::process::exit(code.as_i32());
}

async fn run(cli: &Cli) -> Result<(), Error> {
    match &cli.command {
        Commands::Fetch(args) => run_fetch_command(&cli.global, args).await,
        Commands::Load(args) => run_load_command(&cli.global, args).await,
        Commands::Schema => print_json(&json!({
            "schema_version": SCHEMA_VERSION,
            "record": access_log_json_schema(),
        })),
    }
}

fn load_config(global: &GlobalOpts, overrides: ConfigOverrides) -> Result<IngestConfig, Error> {
    let overrides = ConfigOverrides {
        staging_dir: global.staging_dir.clone(),
        ..overrides
    };
    resolve_config(global.config.as_deref(), &overrides).map_err(|e| Error::Config(e.to_string()))
}

async fn run_fetch_command(global: &GlobalOpts, args: &FetchArgs) -> Result<(), Error> {
    let range = DateRange::new(args.start, args.end)?;
    let config = load_config(
        global,
        ConfigOverrides {
            region: args.region.clone(),
            endpoint_url: args.endpoint_url.clone(),
            ..Default::default()
        },
    )?;

    let mut s3 = S3Config::new().with_region(config.region.clone());
    if let Some(endpoint) = &config.endpoint_url {
        s3 = s3.with_endpoint(endpoint.clone());
    }
    if let Some(profile) = &args.profile {
        s3 = s3.with_profile(profile.clone());
    }
    let store = Arc::new(S3ObjectStore::new(create_s3_client(&s3).await));

    let request = FetchRequest {
        environment: args.environment.clone(),
        range,
        marker: Marker::from(args.marker.as_str()),
    };
    let report = run_fetch(&config, store, &request).await?;
    print_json(&json!({
        "schema_version": SCHEMA_VERSION,
        "command": "fetch",
        "result": report,
    }))
}

async fn run_load_command(global: &GlobalOpts, args: &LoadArgs) -> Result<(), Error> {
    let config = load_config(
        global,
        ConfigOverrides {
            database_url: args.database_url.clone(),
            validation_policy: args.validation_policy,
            ..Default::default()
        },
    )?;

    let store = PgAccessLogStore::connect(
        &config.database_url,
        config.max_connections,
        &config.table_name,
    )
    .await?;
    if args.create_table {
        store.ensure_table().await?;
    }
    let result = run_load(&config, store.clone()).await;
    store.close().await;
    let report = result?;

    print_json(&json!({
        "schema_version": SCHEMA_VERSION,
        "command": "load",
        "result": report,
    }))
}

fn print_json(value: &serde_json::Value) -> Result<(), Error> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|e| Error::Config(format!("failed to render output: {e}")))?;
    println!("{text}");
    Ok(())
}

/// Log the failure, print restart instructions when there are any, and pick
/// the exit code.
fn report_error(cli: &Cli, err: &Error) -> ExitCode {
    error!(code = err.code(), "{err}");
    eprintln!("gwlog: {err}");

    if let Commands::Fetch(args) = &cli.command {
        for line in resume_hints(args, err) {
            eprintln!("{line}");
        }
    }
    ExitCode::from(err)
}

/// Commands that restart an interrupted fetch. A format error also gets a
/// command that skips the unreadable object.
fn resume_hints(args: &FetchArgs, err: &Error) -> Vec<String> {
    let mut hints = Vec::new();
    if let Some(resume) = err.resume_point() {
        hints.push(format!("resume with: {}", fetch_command(args, resume)));
    }
    if let Some(skip) = err.skip_point() {
        hints.push(format!("skip the object with: {}", fetch_command(args, &skip)));
    }
    hints
}

fn fetch_command(args: &FetchArgs, resume: &ResumePoint) -> String {
    let start = parse_day_prefix(&resume.prefix).unwrap_or(args.start);
    let mut command = format!(
        "gwlog fetch --env {} --start {} --end {}",
        args.environment, start, args.end
    );
    if !resume.marker.is_start() {
        command.push_str(&format!(" --marker {}", resume.marker));
    }
    command
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    fn fetch_args() -> FetchArgs {
        let cli = Cli::parse_from([
            "gwlog", "fetch", "--env", "prod", "--start", "2024-01-01", "--end", "2024-01-05",
        ]);
        let Commands::Fetch(args) = cli.command else {
            panic!("expected fetch");
        };
        args
    }

    #[test]
    fn test_resume_hint_uses_prefix_date() {
        let err = Error::Credential {
            message: "ExpiredToken".into(),
            resume: ResumePoint::new("2024/1/3/", Marker::from("2024/1/3/x.gz")),
        };
        assert_eq!(
            resume_hints(&fetch_args(), &err),
            vec!["resume with: gwlog fetch --env prod --start 2024-01-03 --end 2024-01-05 --marker 2024/1/3/x.gz"]
        );
    }

    #[test]
    fn test_format_error_offers_skip_command() {
        let err = Error::Format {
            key: "2024/1/2/bad.gz".into(),
            resume: ResumePoint::new("2024/1/2/", Marker::start()),
        };
        assert_eq!(
            resume_hints(&fetch_args(), &err),
            vec![
                "resume with: gwlog fetch --env prod --start 2024-01-02 --end 2024-01-05",
                "skip the object with: gwlog fetch --env prod --start 2024-01-02 --end 2024-01-05 --marker 2024/1/2/bad.gz",
            ]
        );
    }

    #[test]
    fn test_load_errors_have_no_hint() {
        let err = Error::Database("connection refused".into());
        assert!(resume_hints(&fetch_args(), &err).is_empty());
    }

    #[test]
    fn test_parse_policy() {
        assert_eq!(parse_policy("skip"), Ok(ValidationPolicy::Skip));
        assert!(parse_policy("later").is_err());
    }
}
