//! Mount a music library as a read-only filesystem that transcodes audio files on open.
use std::path::PathBuf;

use clap::Parser;
use tracing::{debug, error};

mod app_config;
mod daemon;
mod fuse_check;
mod trc;

use crate::app_config::Config;
use crate::trc::Trc;

#[derive(Parser)]
#[command(
    version,
    about = "Presents a music library with every audio file transcoded to one format."
)]
struct Args {
    /// The directory holding the music library.
    #[arg(value_parser)]
    source_dir: PathBuf,

    #[arg(
        short,
        long,
        value_parser,
        help = "Optional path to a codec-fs config TOML."
    )]
    config_path: Option<PathBuf>,

    #[arg(
        short,
        long,
        value_parser,
        help = "Where to mount the filesystem. Overrides the config file."
    )]
    mount_point: Option<PathBuf>,

    /// Run the daemon in the background.
    #[arg(short, long, help = "Run the daemon in the background.")]
    daemonize: bool,
}

fn exit_with(msg: impl std::fmt::Display) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}

/// Main entry point for the application.
fn main() {
    let args = Args::parse();

    // Errors use eprintln until tracing is initialized.
    let mut config = Config::load_or_default(args.config_path.as_deref())
        .unwrap_or_else(|e| exit_with(format_args!("Failed to load configuration: {e}")));
    if let Some(mount_point) = args.mount_point {
        config.mount_point = mount_point;
    }
    if let Err(error_messages) = config.validate() {
        eprintln!("Configuration is invalid.");
        for msg in &error_messages {
            eprintln!(" - {msg}");
        }
        std::process::exit(1);
    }

    let source_root = match std::fs::canonicalize(&args.source_dir) {
        Ok(path) if path.is_dir() => path,
        Ok(path) => exit_with(format_args!("{} is not a directory.", path.display())),
        Err(e) => exit_with(format_args!(
            "Cannot open {}: {e}",
            args.source_dir.display()
        )),
    };

    if let Err(e) = fuse_check::ensure_fuse() {
        exit_with(e);
    }

    let mut trc = Trc::default();
    if args.daemonize {
        if let Err(e) = daemonize(&config) {
            exit_with(format_args!("Failed to spawn the daemon: {e}"));
        }
        // stderr now points at the log file, if any.
        trc = trc.daemonized(trc::should_use_color(&std::io::stderr()));
    }

    trc.init().unwrap_or_else(|e| {
        exit_with(format_args!(
            "Failed to initialize logging. Without logging, we can't provide any useful error \
             messages, so we have to exit: {e}"
        ))
    });

    debug!(config = ?config, source = %source_root.display(), "Starting...");
    if let Err(e) = daemon::spawn(config, source_root) {
        error!("Daemon failed: {e}");
        std::process::exit(1);
    }
}

#[derive(Debug, thiserror::Error)]
enum DaemonizeError {
    #[error("Failed to create PID file directory: {0}")]
    PidDir(std::io::Error),

    #[error("Failed to open log file: {0}")]
    LogFile(std::io::Error),

    #[error(transparent)]
    Start(#[from] daemonize::Error),
}

/// Fork into the background. Returns in the child only.
fn daemonize(config: &Config) -> Result<(), DaemonizeError> {
    if let Some(pid_file_parent) = config.daemon.pid_file.parent() {
        std::fs::create_dir_all(pid_file_parent).map_err(DaemonizeError::PidDir)?;
    }

    let mut daemonize = daemonize::Daemonize::new()
        .pid_file(&config.daemon.pid_file)
        .chown_pid_file(true)
        .user(config.uid)
        .group(config.gid);

    if let Some(path) = &config.daemon.log_file {
        let file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(DaemonizeError::LogFile)?;
        let clone = file.try_clone().map_err(DaemonizeError::LogFile)?;
        daemonize = daemonize.stdout(file).stderr(clone);
    }

    daemonize.start()?;
    Ok(())
}
