//! rostersync - apply roster CSV files to a Directory project
//!
//! Each roster row names a login, the action to take (ENABLE, DISABLE,
//! INVITE, REMOVE), a platform role and optional data filters. Every step
//! taken is recorded in a status CSV.

use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use rostersync_client::{
    resolve_directory_url, ClientError, DirectoryAuth, DirectoryClient, DirectoryCredentials,
    ProvisioningClient,
};
use rostersync_engine::audit::CsvAuditSink;
use rostersync_engine::roster::read_roster_file;
use rostersync_engine::runner::SyncRunner;

mod config;
mod error;

use config::{Overrides, SyncConfig};
use error::{CliError, CliResult};

/// rostersync - roster-driven membership sync
#[derive(Parser)]
#[command(name = "rostersync")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Roster CSV files, processed in the order given
    #[arg(required = true, value_name = "ROSTER")]
    rosters: Vec<PathBuf>,

    /// Directory Service base URL
    #[arg(long)]
    directory_url: Option<String>,

    /// White-labelled Directory domain; overrides the base URL when set
    #[arg(long)]
    custom_domain: Option<String>,

    /// Administrator login used to authenticate
    #[arg(long)]
    login: Option<String>,

    /// Target Directory project id
    #[arg(long)]
    project_id: Option<String>,

    /// Provisioning Service base URL
    #[arg(long)]
    provisioning_url: Option<String>,

    /// Create organization accounts for logins unknown everywhere
    #[arg(long, value_name = "BOOL")]
    org_owned_project: Option<bool>,

    /// Re-send invitations that are still pending
    #[arg(long)]
    reinvite: bool,

    /// Exit with status 3 when any row failed
    #[arg(long)]
    fail_on_error: bool,

    /// Path of the status CSV
    #[arg(long)]
    status_file: Option<PathBuf>,

    /// Write a manifest next to the status CSV
    #[arg(long, value_name = "BOOL")]
    manifest: Option<bool>,

    /// Identifier stamped on every status row
    #[arg(long)]
    run_id: Option<String>,

    /// Classify rows and record the plans without changing anything
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            directory_url: self.directory_url.clone(),
            custom_domain: self.custom_domain.clone(),
            login: self.login.clone(),
            project_id: self.project_id.clone(),
            provisioning_url: self.provisioning_url.clone(),
            org_owned_project: self.org_owned_project,
            reinvite: self.reinvite.then_some(true),
            fail_on_error: self.fail_on_error.then_some(true),
            status_file: self.status_file.clone(),
            write_manifest: self.manifest,
            run_id: self.run_id.clone(),
            dry_run: self.dry_run,
        }
    }
}

#[tokio::main]
async fn main() {
    // Load .env if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let default_filter = if cli.verbose {
        "debug"
    } else {
        "info,rostersync_engine=info,rostersync_client=info"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            error!(error = %e, "roster sync aborted");
            e.print();
            std::process::exit(e.exit_code());
        }
    }
}

async fn run(cli: Cli) -> CliResult<()> {
    let config = SyncConfig::from_env(&cli.overrides())?;

    info!(
        project_id = %config.project_id,
        run_id = %config.run_id,
        dry_run = config.dry_run,
        rosters = cli.rosters.len(),
        "starting roster sync"
    );

    // Every roster is validated before the first remote call.
    let mut records = Vec::new();
    for path in &cli.rosters {
        let rows = read_roster_file(path)?;
        info!(path = %path.display(), rows = rows.len(), "roster loaded");
        records.extend(rows);
    }

    let timeout = Duration::from_secs(config.request_timeout_secs);
    let directory_url =
        resolve_directory_url(&config.directory_url, config.custom_domain.as_deref());
    info!(directory_url = %directory_url, "Directory domain set");

    let session_client = reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| ClientError::InvalidConfig(format!("Failed to build HTTP client: {e}")))?;
    let auth = DirectoryAuth::new(
        directory_url.clone(),
        DirectoryCredentials {
            login: config.login.clone(),
            password: config.password.clone(),
        },
        session_client,
    );
    auth.login().await?;

    let directory = DirectoryClient::new(
        directory_url,
        config.project_id.clone(),
        auth,
        timeout,
    )?;
    let provisioning = ProvisioningClient::new(
        config.provisioning_url.clone(),
        config.project_id.clone(),
        config.provisioning_token.clone(),
        timeout,
    )?;

    let mut sink = CsvAuditSink::create(&config.status_file)?;
    let runner = SyncRunner::new(&directory, &provisioning, config.sync_options());
    let outcome = runner.run(&records, &mut sink).await;

    if config.write_manifest {
        let manifest = sink.write_manifest()?;
        info!(path = %manifest.display(), "manifest written");
    }

    let summary = outcome?;
    info!(
        status_file = %config.status_file.display(),
        processed = summary.processed,
        succeeded = summary.succeeded,
        skipped = summary.skipped,
        failed = summary.failed,
        "roster sync finished"
    );

    if summary.has_failures() {
        warn!(failed = summary.failed, "some rows failed, see the status file");
        if config.fail_on_error {
            return Err(CliError::RowFailures {
                failed: summary.failed,
                processed: summary.processed,
            });
        }
    }
    Ok(())
}
