//! OpenForms CLI - Main Entry Point
//!
//! Runs YAML submission plans against an OpenForms instance, e.g. to seed a
//! test environment or reproduce a submission by hand.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use openforms_client::{
    OpenFormsClient, OpenFormsConfig, SessionCookies, SubmissionOutcome, SubmissionPlan,
};

mod output;

use output::OutputFormat;

/// OpenForms CLI - create form submissions through the API
#[derive(Parser)]
#[command(name = "openforms")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Configuration file (defaults to $OPENFORMS_CONFIG or ./openforms.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Override base.uri from the configuration
    #[arg(long, env = "OPENFORMS_BASE_URI", global = true)]
    base_uri: Option<String>,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and complete the submission described by a plan
    Submit(SubmitArgs),

    /// Run every plan in a directory
    RunAll(RunAllArgs),

    /// Show the effective configuration
    Config,
}

#[derive(Args)]
struct SubmitArgs {
    /// Path to the YAML submission plan
    #[arg(short, long)]
    plan: PathBuf,

    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args)]
struct RunAllArgs {
    /// Directory containing YAML submission plans
    #[arg(short, long, default_value = "tests/openforms/plans")]
    dir: PathBuf,

    #[command(flatten)]
    auth: AuthArgs,
}

#[derive(Args)]
struct AuthArgs {
    /// Cookie of an authenticated session, as NAME=VALUE (repeatable)
    #[arg(long = "cookie", value_parser = parse_cookie)]
    cookies: Vec<(String, String)>,

    /// Require data for every step of the form
    #[arg(long)]
    strict: bool,
}

fn parse_cookie(s: &str) -> std::result::Result<(String, String), String> {
    let (name, value) = s
        .split_once('=')
        .ok_or_else(|| format!("expected NAME=VALUE, got '{}'", s))?;
    if name.trim().is_empty() {
        return Err(format!("cookie name is empty in '{}'", s));
    }
    Ok((name.trim().to_string(), value.to_string()))
}

fn load_config(cli: &Cli) -> Result<OpenFormsConfig> {
    let config = match &cli.config {
        Some(path) => OpenFormsConfig::from_file(path)?.apply_env()?,
        None => OpenFormsConfig::load()?,
    };

    Ok(match &cli.base_uri {
        Some(uri) => config.with_base_uri(uri.clone()),
        None => config,
    })
}

async fn run_plan(
    config: &OpenFormsConfig,
    plan: &SubmissionPlan,
    auth: &AuthArgs,
) -> Result<SubmissionOutcome> {
    let client = OpenFormsClient::new(plan.form.clone(), config.clone())?;
    let strict = plan.strict || auth.strict;

    let outcome = if auth.cookies.is_empty() {
        if !plan.anonymous {
            bail!(
                "plan for form '{}' requires an authenticated session; pass --cookie",
                plan.form
            );
        }
        client.start_anonymous_submission(&plan.steps, strict).await?
    } else {
        let cookies = SessionCookies::from_pairs(config, auth.cookies.iter().cloned())?;
        client.start_submission(cookies, &plan.steps, strict).await?
    };

    Ok(outcome)
}

async fn submit(config: &OpenFormsConfig, args: &SubmitArgs, format: OutputFormat) -> Result<bool> {
    let plan = load_plan(&args.plan)?;

    match run_plan(config, &plan, &args.auth).await {
        Ok(outcome) => {
            output::print_item(&outcome, format);
            if matches!(format, OutputFormat::Table) {
                output::print_list(&outcome.steps, format);
                output::print_success(&format!(
                    "Submission {} of form '{}' completed",
                    outcome.submission_id, outcome.form_name
                ));
            }
            Ok(true)
        }
        Err(e) => {
            output::print_error(&format!("Submission of form '{}' failed: {:#}", plan.form, e));
            Ok(false)
        }
    }
}

async fn run_all(config: &OpenFormsConfig, args: &RunAllArgs, format: OutputFormat) -> Result<bool> {
    let plans = SubmissionPlan::load_all(&args.dir)
        .with_context(|| format!("loading plans from {}", args.dir.display()))?;

    info!("Running {} plan(s)...", plans.len());

    let mut outcomes = Vec::new();
    let mut failed = 0;
    for plan in &plans {
        match run_plan(config, plan, &args.auth).await {
            Ok(outcome) => {
                info!("✓ {} ({} ms)", plan.form, outcome.duration_ms);
                outcomes.push(outcome);
            }
            Err(e) => {
                failed += 1;
                error!("✗ {} - {:#}", plan.form, e);
            }
        }
    }

    output::print_list(&outcomes, format);
    info!("Results: {} completed, {} failed", outcomes.len(), failed);

    Ok(failed == 0)
}

fn load_plan(path: &Path) -> Result<SubmissionPlan> {
    SubmissionPlan::from_file(path).with_context(|| format!("reading plan {}", path.display()))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .init();

    let config = load_config(&cli)?;

    let success = match &cli.command {
        Commands::Submit(args) => submit(&config, args, cli.format).await?,
        Commands::RunAll(args) => run_all(&config, args, cli.format).await?,
        Commands::Config => {
            output::print_config(&config, cli.format);
            true
        }
    };

    if !success {
        std::process::exit(1);
    }
    Ok(())
}
