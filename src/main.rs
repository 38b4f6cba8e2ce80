//! uplink CLI - publish CI test reports to the Test Outcome Database.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, info};

use uplink::config::{self, Settings};
use uplink::pipeline::{self, Pipeline};
use uplink::publish::HttpTod;
use uplink::release::{GithubReleases, ReleaseLookup};
use uplink::report::{self, Provenance, ReportDocument};
use uplink::secrets::VaultKv;
use uplink::storage::LinodeCliStore;

/// Timeout for database submissions.
const SUBMIT_TIMEOUT: Duration = Duration::from_secs(10);

/// Vault path holding the object-storage credentials.
const SECRET_PATH: &str = "dx";

#[derive(Parser)]
#[command(name = "uplink")]
#[command(about = "Publish CI test reports to the Test Outcome Database", long_about = None)]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Directory for timestamped log files
    #[arg(long, default_value = "logs")]
    log_dir: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full batch: list, download, normalize, publish, delete
    Run,

    /// Merge a directory of shard reports into one timestamped file
    Merge {
        /// Directory containing the shard XML files
        #[arg(short, long)]
        input_dir: PathBuf,

        /// Label used in the output file name and suite name
        #[arg(short, long)]
        label: String,

        /// Directory the merged file is written to
        #[arg(short, long, default_value = ".")]
        output_dir: PathBuf,
    },

    /// Stamp CI provenance fields onto a report file
    Stamp {
        #[arg(long)]
        branch_name: String,

        #[arg(long)]
        gha_run_id: String,

        #[arg(long)]
        gha_run_number: String,

        /// Release tag; looked up from the latest release when omitted
        #[arg(long)]
        release_tag: Option<String>,

        /// Report file to modify in place
        xml_file: PathBuf,
    },

    /// Print a summary of one report file
    Summary {
        xml_file: PathBuf,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = uplink::logging::init(cli.verbose, &cli.log_dir) {
        // No log file yet, so this one goes to stderr directly.
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }

    // Any unhandled failure ends up in the log, never as a panic.
    let exit_code = match dispatch(cli.command).await {
        Ok(code) => code,
        Err(e) => {
            error!("an error occurred: {e:#}");
            1
        }
    };

    std::process::exit(exit_code);
}

async fn dispatch(command: Commands) -> Result<i32> {
    match command {
        Commands::Run => run_batch().await,
        Commands::Merge {
            input_dir,
            label,
            output_dir,
        } => merge_shards(&input_dir, &label, &output_dir),
        Commands::Stamp {
            branch_name,
            gha_run_id,
            gha_run_number,
            release_tag,
            xml_file,
        } => stamp_report(branch_name, gha_run_id, gha_run_number, release_tag, &xml_file).await,
        Commands::Summary { xml_file } => summarize(&xml_file),
    }
}

async fn run_batch() -> Result<i32> {
    let mut env = config::environment_snapshot();

    if let Some(vault) = VaultKv::from_env()? {
        config::bootstrap_credentials(&mut env, &vault, SECRET_PATH)
            .await
            .context("credential bootstrap failed")?;
    }

    let settings = Settings::from_lookup(|key| env.get(key).cloned())?;
    info!(
        "publishing reports from bucket {} to {}",
        settings.bucket, settings.url
    );

    let store = LinodeCliStore::new(&settings.cluster, &settings.bucket)
        .with_env(settings.credentials.clone());
    store.ensure_installed().await;

    let sink = HttpTod::new(&settings.url, SUBMIT_TIMEOUT)?;
    let releases = GithubReleases::new()?;

    let outcome = Pipeline::new(settings, store, sink, releases).run().await?;
    pipeline::print_summary(&outcome);

    Ok(if outcome.success() { 0 } else { 1 })
}

fn merge_shards(input_dir: &Path, label: &str, output_dir: &Path) -> Result<i32> {
    let merged = report::merge_directory(input_dir, label)
        .with_context(|| format!("failed to merge reports in {}", input_dir.display()))?;

    std::fs::create_dir_all(output_dir)?;
    let path = report::write_merged(&merged, output_dir, label)?;

    info!(
        "merged {} file(s), {} test(s), into {}",
        merged.files_merged,
        merged.totals.tests,
        path.display()
    );
    println!("{}", path.display());

    Ok(0)
}

async fn stamp_report(
    branch_name: String,
    gha_run_id: String,
    gha_run_number: String,
    release_tag: Option<String>,
    xml_file: &Path,
) -> Result<i32> {
    let mut doc = ReportDocument::parse(xml_file)
        .with_context(|| format!("failed to parse {}", xml_file.display()))?;

    let release_tag = match release_tag {
        Some(tag) => tag,
        None => {
            let file_name = xml_file.to_string_lossy();
            GithubReleases::new()?
                .latest_version(&file_name)
                .await
                .unwrap_or_default()
        }
    };

    let provenance = Provenance {
        branch_name,
        gha_run_id,
        gha_run_number,
        release_tag,
    };
    provenance.stamp(&mut doc);
    doc.write_to(xml_file)?;

    info!("stamped provenance onto {}", xml_file.display());
    Ok(0)
}

fn summarize(xml_file: &Path) -> Result<i32> {
    let doc = ReportDocument::parse(xml_file)
        .with_context(|| format!("failed to parse {}", xml_file.display()))?;
    println!("{}", report::summary::render(&doc));
    Ok(0)
}
