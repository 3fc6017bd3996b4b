//! Command-line entry point for a single collection run.
//!
//! Configuration comes from the environment (see [`Settings`]); flags of the
//! same name exist for local runs. The process exits with status 1 on any
//! fatal error.

use std::process;

use clap::Parser;
use github_metrics::{Config, Error, GitHubClient, Settings, Sink, execute};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Collect GitHub repository and instrumentation metrics and export them over OTLP.
#[derive(Debug, Parser,)]
#[command(name = "github-metrics", version, about)]
struct Cli
{
    #[command(flatten)]
    settings: Settings,
}

/// Entry point that reports errors and sets the appropriate exit status.
#[tokio::main(flavor = "current_thread")]
async fn main()
{
    init_tracing();

    if let Err(error,) = run(Cli::parse(),).await {
        error!("Run failed: {}", error);
        eprintln!("{}", error.to_display_string());
        process::exit(1,);
    }
}

fn init_tracing()
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info",),);
    tracing_subscriber::fmt().with_env_filter(filter,).with_writer(std::io::stderr,).init();
}

/// Executes one run with the production collaborators.
///
/// # Errors
///
/// Propagates configuration, fetch, parse and export errors.
async fn run(cli: Cli,) -> Result<(), Error,>
{
    let report = execute(&cli.settings, connect,).await?;

    if !report.is_complete() {
        for failure in &report.failed_repositories {
            warn!("{} was skipped: {}", failure.repository, failure.error);
        }
        for failure in &report.failed_benchmarks {
            warn!("{} benchmarks were skipped: {}", failure.test_type, failure.error);
        }
        warn!("Run completed with skipped sources");
    }
    info!("Exported {} observations", report.observations.len());

    Ok((),)
}

fn connect(config: &Config,) -> Result<(GitHubClient, Sink,), Error,>
{
    Ok((GitHubClient::new(config,)?, Sink::for_config(config,),),)
}
