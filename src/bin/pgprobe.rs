//! pgprobe CLI: check the database environment, connect once, report.

use anyhow::Context as _;
use clap::Parser;
use pgprobe::config::ProbeConfig;
use pgprobe::probe::{self, Outcome};
use pgprobe::report::{self, Report};
use pgprobe::telemetry::{TelemetryConfig, init_telemetry};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;
use tracing::error;

#[derive(Parser)]
#[command(
    name = "pgprobe",
    about = "Verify connectivity to a PostgreSQL database",
    long_about = "Reads DB_HOST, DB_PORT, DB_NAME, DB_USER, DB_PASSWORD and DB_SSL from the \
                  environment (or a .env file), makes one connection attempt, runs one \
                  introspection query, and reports the result. Exits non-zero on failure."
)]
struct Cli {
    /// Environment file to load instead of ./.env
    #[arg(long, value_name = "PATH")]
    env_file: Option<PathBuf>,
    /// Print the report as JSON
    #[arg(long)]
    json: bool,
    /// Include the full provider error in the report
    #[arg(long)]
    debug: bool,
    /// Connect timeout in seconds (overrides DB_CONNECT_TIMEOUT_SECS)
    #[arg(long, value_name = "SECS", value_parser = clap::value_parser!(u64).range(1..))]
    connect_timeout: Option<u64>,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    match cli.env_file {
        Some(ref path) => {
            dotenvy::from_path(path)
                .with_context(|| format!("failed to load environment file {}", path.display()))?;
        }
        None => {
            dotenvy::dotenv().ok();
        }
    }

    let mut config = match ProbeConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return Ok(ExitCode::from(Outcome::ConfigurationError.exit_code()));
        }
    };
    if cli.debug {
        config.debug = true;
    }
    if let Some(secs) = cli.connect_timeout {
        config.connect_timeout = Duration::from_secs(secs);
    }

    let _guard = init_telemetry(TelemetryConfig {
        endpoint: config.otel_endpoint.clone(),
        service_name: "pgprobe".to_string(),
        log_level: config.log_level.clone(),
    })?;

    // A panic inside the probe surfaces here as a JoinError, not a crash.
    let probe_config = config.clone();
    let result = match tokio::spawn(async move { probe::run(&probe_config).await }).await {
        Ok(result) => result,
        Err(e) => {
            error!(error = %e, "probe task failed");
            eprintln!("❌ Unexpected failure during probe: {e}");
            return Ok(ExitCode::FAILURE);
        }
    };

    if cli.json {
        println!("{}", report::to_json(&config, &result)?);
    } else {
        print!("{}", Report::new(&config, &result));
    }

    Ok(ExitCode::from(result.outcome().exit_code()))
}
