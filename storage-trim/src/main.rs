// SPDX-License-Identifier: GPL-3.0-only

//! storage-trim - enable TRIM on a SCSI or USB-attached block device
//!
//! Checks whether discard is already active for the device and otherwise
//! switches its driver to the "unmap" provisioning mode and sets the block
//! queue discard limit from the firmware's unmap limits.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use storage_sys::device::{DEFAULT_CLASS_BLOCK_DIR, DEFAULT_DEV_DIR};
use storage_sys::{SgTools, SysfsLayout, ToolRegistry, TrimError, TrimOptions, TrimReport};
use tracing_subscriber::{EnvFilter, fmt};

mod report;

#[derive(Debug, Parser)]
#[command(name = "storage-trim", version)]
#[command(about = "Enable TRIM on a block device. Example: storage-trim sda")]
struct Args {
    /// The device to enable TRIM on, e.g. `sda`
    device: String,

    /// Check and report, but do not write any control file
    #[arg(long)]
    dry_run: bool,

    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(long, default_value = DEFAULT_DEV_DIR)]
    dev_dir: PathBuf,

    #[arg(long, default_value = DEFAULT_CLASS_BLOCK_DIR)]
    class_block_dir: PathBuf,
}

impl Args {
    fn log_directive(&self) -> &'static str {
        match self.verbose {
            0 => "storage_trim=info,storage_sys=info,warn",
            1 => "storage_trim=debug,storage_sys=debug,info",
            _ => "trace",
        }
    }

    fn layout(&self) -> SysfsLayout {
        SysfsLayout {
            dev_dir: self.dev_dir.clone(),
            class_block_dir: self.class_block_dir.clone(),
        }
    }
}

fn main() -> Result<()> {
    let args = Args::parse();

    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(args.log_directive())),
        )
        .with_writer(std::io::stderr)
        .init();

    if !args.dry_run && unsafe { libc::geteuid() } != 0 {
        tracing::warn!("Not running as root; writing sysfs control files will likely fail");
    }

    let options = TrimOptions {
        dry_run: args.dry_run,
    };
    let report = match execute(&args, options) {
        Ok(report) => report,
        Err(error) => {
            tracing::error!(kind = ?error.kind(), "{error}");
            if args.json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&failure_json(&args.device, &error))?
                );
            }
            return Err(error)
                .with_context(|| format!("failed to enable TRIM on {}", args.device));
        }
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    for line in report::render(&report) {
        println!("{line}");
    }

    Ok(())
}

fn execute(args: &Args, options: TrimOptions) -> storage_sys::Result<TrimReport> {
    let tools = SgTools::new(ToolRegistry::discover()?);
    storage_sys::run(&args.layout(), &args.device, &tools, options)
}

/// JSON body printed for `--json` when the run fails.
fn failure_json(device: &str, error: &TrimError) -> serde_json::Value {
    serde_json::json!({
        "device": device,
        "kind": error.kind(),
        "error": error.to_string(),
    })
}
