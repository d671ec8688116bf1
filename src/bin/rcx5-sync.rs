//! Thin CLI front end: connect to a Polar RCX5 DataLink dongle, pull
//! every stored session, decode it, and write it out in one or more
//! formats. All protocol/decode logic lives in the library; this binary
//! only wires `clap` args to it, the way the reference crate's
//! `src/bin/*.rs` entries wire args to their driver crate.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use polar_rcx5_datalink::decoder::{decode_metadata, decode_samples};
use polar_rcx5_datalink::emit::{binary, json, tcx};
use polar_rcx5_datalink::DataLink;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Format {
    Tcx,
    Json,
    Bin,
}

/// Sync recorded sessions off a Polar RCX5 "DataLink" USB dongle.
#[derive(Debug, Parser)]
#[command(name = "rcx5-sync")]
#[command(about = "Export Polar RCX5 training sessions")]
struct Args {
    /// Directory to write exported session files into.
    #[arg(long, default_value = ".")]
    out: PathBuf,

    /// Output format; may be repeated to emit several formats per session.
    #[arg(long = "format", value_enum, default_values_t = vec![Format::Tcx])]
    formats: Vec<Format>,

    /// USB device identifier. The DataLink exposes exactly one bulk
    /// interface, so "auto" (the only supported value today) is
    /// reserved for future multi-dongle setups.
    #[arg(long, default_value = "auto")]
    device: String,

    /// Activity sport tag written into TCX output.
    #[arg(long, default_value = "Other")]
    sport: String,
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.device != "auto" {
        log::warn!("--device {} ignored; only \"auto\" is supported", args.device);
    }

    std::fs::create_dir_all(&args.out)
        .with_context(|| format!("creating output directory {}", args.out.display()))?;

    let interrupted = Arc::new(AtomicBool::new(false));
    {
        let interrupted = interrupted.clone();
        ctrlc::set_handler(move || interrupted.store(true, Ordering::SeqCst))
            .context("installing Ctrl-C handler")?;
    }

    log::info!("Connecting to DataLink dongle");
    let mut link = DataLink::connect().context("connecting to DataLink dongle")?;

    let raw_sessions = link.sessions().context("enumerating sessions")?;
    log::info!("Found {} session(s)", raw_sessions.len());

    let mut exported = 0usize;
    for (index, raw) in raw_sessions.iter().enumerate() {
        if interrupted.load(Ordering::SeqCst) {
            log::info!("Interrupted after {} session(s)", exported);
            break;
        }

        match export_session(raw, &args) {
            Ok(()) => exported += 1,
            Err(err) => log::warn!("Skipping session #{}: {:#}", index + 1, err),
        }
    }

    link.disconnect().context("disconnecting from DataLink dongle")?;
    println!("Exported {} of {} session(s)", exported, raw_sessions.len());
    Ok(())
}

fn export_session(raw: &polar_rcx5_datalink::RawSession, args: &Args) -> Result<()> {
    let metadata = decode_metadata(raw).context("decoding session metadata")?;
    let samples = decode_samples(&metadata, raw).context("decoding session samples")?;

    for format in &args.formats {
        match format {
            Format::Tcx => tcx::write(&metadata, &samples, &args.sport, &args.out)
                .context("writing TCX output")?,
            Format::Json => json::write(raw, &metadata, &args.out).context("writing JSON output")?,
            Format::Bin => binary::write(raw, &metadata, &args.out).context("writing binary output")?,
        }
    }

    Ok(())
}
