mod config;
mod error;
mod message;
mod metrics;
mod models;
mod report;
mod sigv4;
mod slack;
#[cfg(test)]
mod testsupport;

use chrono::{Local, NaiveDate};
use clap::{Parser, Subcommand};
use config::{aws_credentials, ensure_initialized, load_config, set_aws_credentials};
use error::AppError;
use metrics::cloudwatch::CloudWatchSource;
use report::BillingReporter;
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "billing-reporter")]
#[command(about = "Posts yesterday's AWS estimated charges to a Slack channel")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Init,
    SetCredentials {
        access_key_id: String,
        #[arg(long)]
        secret_access_key: String,
        #[arg(long)]
        session_token: Option<String>,
    },
    Report {
        /// Build and print the message instead of posting it.
        #[arg(long)]
        dry_run: bool,
        /// Report for the day before this date instead of before today.
        #[arg(long)]
        date: Option<NaiveDate>,
    },
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            ensure_initialized()?;
            println!(
                "Initialized billing-reporter config at {}.",
                config::config_path()?.display()
            );
        }
        Commands::SetCredentials {
            access_key_id,
            secret_access_key,
            session_token,
        } => {
            ensure_initialized()?;
            set_aws_credentials(&access_key_id, &secret_access_key, session_token.as_deref())?;
            println!("AWS credentials stored.");
        }
        Commands::Report { dry_run, date } => {
            ensure_initialized()?;
            let cfg = load_config()?;
            let base_date = date.unwrap_or_else(|| Local::now().date_naive());

            let source = CloudWatchSource::new(cfg.region.clone(), aws_credentials()?);
            let reporter = BillingReporter::new()?;

            if dry_run {
                let message = reporter.preview(&cfg, &source, base_date).await?;
                println!("{}", serde_json::to_string_pretty(&message)?);
            } else {
                cfg.validate()?;
                let receipt = reporter.report(&cfg, &source, base_date).await?;
                println!(
                    "Posted {} billing fields to {} (HTTP {}).",
                    receipt.field_count, cfg.channel, receipt.status
                );
            }
        }
    }

    Ok(())
}
