//! Container Backup - Main entry point
//!
//! Snapshot containers to loose or archive backups and restore them.

use anyhow::Result;
use clap::{Parser, Subcommand};
use container_backup::executor::{self, BackupOptions, RestoreOptions};
use container_backup::runtime::DockerRuntime;
use container_backup::sync::RsyncSync;
use container_backup::{config::Config, config::UnsupportedEntryPolicy, utils};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Snapshot one container, or all of them with --all
    Backup {
        /// Container ID or name
        #[arg(required_unless_present = "all", conflicts_with = "all")]
        container: Option<String>,

        /// Back up every running container
        #[arg(short, long)]
        all: bool,

        /// With --all: include stopped containers
        #[arg(long, requires = "all")]
        stopped: bool,

        /// Write a single tar archive
        #[arg(short, long)]
        tar: bool,

        /// Compress the archive with zstd (implies --tar)
        #[arg(long)]
        compress: bool,

        /// Command run after a loose backup; %tag and %list are substituted
        #[arg(long, value_name = "CMD")]
        launch: Option<String>,

        /// Output directory
        #[arg(short, long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Print every archived path
        #[arg(short, long)]
        verbose: bool,

        /// With --all: continue after a failed container
        #[arg(long, requires = "all")]
        keep_going: bool,

        /// Keep untagged image references as they are
        #[arg(long)]
        no_resolve_tags: bool,
    },

    /// Restore a backup into a new container
    Restore {
        /// `.backup.json`, `.tar` or `.tar.zst` artifact
        artifact: PathBuf,

        /// Start the container once restored
        #[arg(short, long)]
        start: bool,

        /// Skip mounts whose source starts with PREFIX (loose backups)
        #[arg(short, long, value_name = "PREFIX")]
        exclude: Vec<String>,

        /// Keep replaying after a failed archive entry
        #[arg(long)]
        continue_on_error: bool,

        /// Do not apply archived ownership
        #[arg(long)]
        no_chown: bool,

        /// Fail on archive entries that are neither files nor directories
        #[arg(long)]
        strict: bool,
    },

    /// Show what a backup contains
    Inspect {
        artifact: PathBuf,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<()> {
    let args = Args::parse();

    // Load configuration
    let mut config = if let Some(config_path) = &args.config {
        Config::from_file(config_path)?
    } else {
        Config::default()
    };

    // Initialize logging
    let log_level = args.log_level.as_deref().unwrap_or(&config.log.level);
    utils::logger::init(log_level)?;

    tracing::debug!("container-backup v{}", env!("CARGO_PKG_VERSION"));

    match args.command {
        Command::Backup {
            container,
            all,
            stopped,
            tar,
            compress,
            launch,
            output,
            verbose,
            keep_going,
            no_resolve_tags,
        } => {
            let backup = &mut config.backup;
            backup.tar |= tar || compress;
            backup.compress |= compress;
            backup.verbose |= verbose;
            backup.include_stopped |= stopped;
            backup.keep_going |= keep_going;
            if no_resolve_tags {
                backup.resolve_tags = false;
            }
            if let Some(output) = output {
                backup.output_dir = output;
            }
            if launch.is_some() {
                backup.launch = launch;
            }

            let runtime = DockerRuntime::connect(config.runtime.socket.as_deref())?;
            let options = BackupOptions::from(&config.backup);

            if all {
                let artifacts = executor::backup_all(
                    &runtime,
                    config.backup.include_stopped,
                    config.backup.keep_going,
                    &options,
                )
                .await?;
                tracing::info!("Backed up {} containers", artifacts.len());
            } else if let Some(container) = container {
                let artifact = executor::backup_container(&runtime, &container, &options).await?;
                tracing::debug!("Backup of {} written to {}", container, artifact.path().display());
            }
        }

        Command::Restore {
            artifact,
            start,
            exclude,
            continue_on_error,
            no_chown,
            strict,
        } => {
            let restore = &mut config.restore;
            restore.start |= start;
            restore.exclude.extend(exclude);
            restore.continue_on_error |= continue_on_error;
            if no_chown {
                restore.preserve_ownership = false;
            }
            if strict {
                restore.unsupported_entries = UnsupportedEntryPolicy::Error;
            }

            let runtime = DockerRuntime::connect(config.runtime.socket.as_deref())?;
            let sync = RsyncSync::new(config.sync.rsync_path.clone(), config.sync.extra_args.clone());
            let options = RestoreOptions::from_config(&config);

            let report = executor::restore(&runtime, &sync, &artifact, &options).await?;
            tracing::info!(
                "Restore of {} finished at {:?}",
                artifact.display(),
                report.stage
            );
        }

        Command::Inspect { artifact } => {
            let info = tokio::task::spawn_blocking(move || executor::inspect_artifact(&artifact)).await??;
            print!("{}", info);
        }
    }

    Ok(())
}
