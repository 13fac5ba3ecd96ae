//! vrlinkd - desktop receiver for the Voice Recorder Companion protocol
//!
//! Listens for the unmodified mobile client, impersonates the original
//! desktop application during the handshake, and writes the transferred
//! file into the destination directory.

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::PathBuf;

use vrlink::net::{serve, ServerConfig};
use vrlink::protocol::DEFAULT_BIND;

/// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "vrlinkd - receive files from the Voice Recorder Companion mobile app"
)]
struct Args {
    /// Bind address (host:port)
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: String,

    /// Directory received files are written into
    #[arg(long, default_value = ".")]
    dir: PathBuf,

    /// Write JSONL log entries to file
    #[arg(long = "log-file")]
    log_file: Option<PathBuf>,

    /// Suppress the per-transfer progress bar
    #[arg(short, long)]
    quiet: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Validate destination directory exists and is a directory
    if !args.dir.exists() {
        anyhow::bail!(
            "Error: Destination directory does not exist: {}",
            args.dir.display()
        );
    }
    if !args.dir.is_dir() {
        anyhow::bail!(
            "Error: Destination path is not a directory: {}",
            args.dir.display()
        );
    }

    // Canonicalize the path for better logging
    let canonical_dir = std::fs::canonicalize(&args.dir)
        .with_context(|| format!("Failed to canonicalize destination: {}", args.dir.display()))?;

    println!("Starting vrlink daemon:");
    println!("  Dest: {}", canonical_dir.display());
    println!("  Bind: {}", args.bind);
    if let Some(ref log_file) = args.log_file {
        println!("  Log:  {}", log_file.display());
    }

    // Security warning for 0.0.0.0 binding
    if args.bind.starts_with("0.0.0.0") {
        eprintln!("WARNING: binding to 0.0.0.0 exposes the daemon to all network interfaces");
        eprintln!("   This protocol is unencrypted and unauthenticated");
        eprintln!("   Only use on trusted networks (LAN)");
    }

    let mut config = ServerConfig::new(args.bind, canonical_dir);
    config.log_file = args.log_file;
    config.show_progress = !args.quiet && std::io::stderr().is_terminal();

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("Failed to build tokio runtime")?;

    rt.block_on(async {
        tokio::select! {
            res = serve(config) => res,
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nShutting down");
                Ok(())
            }
        }
    })
}
