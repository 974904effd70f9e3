//! Sentinel Replay CLI
//!
//! Replay an analysis payload (or a seeded synthetic one) through the
//! playback engine and report what the views would have shown.

use anyhow::{Context, Result};
use clap::Parser;
use sentinel_core::timeline_from_json;
use sentinel_env::TokioClock;
use sentinel_replay::{ReplayConfig, ReplayOutcome, ReplayRunner, ReplaySource};
use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Sentinel annotation replay CLI
#[derive(Parser, Debug)]
#[command(name = "sentinel-replay")]
#[command(about = "Replay annotated media through the Sentinel playback engine", long_about = None)]
struct Args {
    /// Analysis payload JSON. A synthetic payload is generated when omitted.
    input: Option<PathBuf>,

    /// Seed for the synthetic payload (0 = random from time)
    #[arg(short, long, default_value = "42")]
    seed: u64,

    /// Stop after this many media seconds
    #[arg(short, long)]
    duration: Option<f64>,

    /// Staleness tolerance in seconds
    #[arg(short, long, default_value = "0.5")]
    tolerance: f64,

    /// Clock ticks per second
    #[arg(short, long, default_value = "30")]
    rate: f64,

    /// Playback speed multiplier
    #[arg(long, default_value = "1.0")]
    speed: f64,

    /// Jump to every fused segment before playing
    #[arg(long)]
    jump_segments: bool,

    /// Pace ticks against the wall clock instead of a virtual clock
    #[arg(long)]
    realtime: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// JSON output for scripting
    #[arg(long)]
    json: bool,

    /// Export every published frame to a JSON file
    #[arg(long)]
    export: Option<PathBuf>,
}

/// Scripted runs only hear about problems unless asked for more.
fn log_level(verbose: bool, json: bool) -> Level {
    match (verbose, json) {
        (true, _) => Level::DEBUG,
        (false, true) => Level::WARN,
        (false, false) => Level::INFO,
    }
}

fn json_summary(config: &ReplayConfig, outcome: &ReplayOutcome) -> Result<String> {
    let summary = serde_json::json!({
        "config": config,
        "report": outcome.report,
        "frames": outcome.export.frames.len(),
    });
    Ok(serde_json::to_string_pretty(&summary)?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging; stdout is reserved for the JSON summary
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level(args.verbose, args.json))
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set tracing subscriber")?;

    if !args.json {
        info!("Sentinel Replay v{}", env!("CARGO_PKG_VERSION"));
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    }

    let seed = if args.seed == 0 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos() as u64)
            .unwrap_or_default()
    } else {
        args.seed
    };

    let config = ReplayConfig {
        seed,
        tick_rate_hz: args.rate,
        speed: args.speed,
        duration_override: args.duration,
        tolerance: args.tolerance,
        jump_segments: args.jump_segments,
        ..Default::default()
    };

    let source = match &args.input {
        Some(path) => {
            let json = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            let timeline = timeline_from_json(&json)
                .with_context(|| format!("Failed to load payload {}", path.display()))?;
            info!(
                "Loaded '{}': {} telemetry, {} detections, {} segments ({:?})",
                timeline.asset_id(),
                timeline.telemetry().len(),
                timeline.detections().len(),
                timeline.segments().len(),
                timeline.shape()
            );
            ReplaySource::Timeline(timeline)
        }
        None => {
            info!("No payload given, generating synthetic asset (seed={})", seed);
            ReplaySource::Synthetic
        }
    };

    let runner = if args.realtime {
        ReplayRunner::with_clock(config, TokioClock::shared())
    } else {
        ReplayRunner::new(config)
    };
    let outcome = runner.run(source).await.context("Replay failed")?;
    let report = &outcome.report;

    if let Some(path) = &args.export {
        outcome
            .export
            .write_to_file(path)
            .with_context(|| format!("Failed to write export {}", path.display()))?;
        info!("Exported {} frames to {}", outcome.export.frames.len(), path.display());
    }

    if args.json {
        println!("{}", json_summary(runner.config(), &outcome)?);
    } else {
        info!("");
        info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
        info!(
            "'{}' replayed to {:.2}s / {:.2}s",
            report.asset_id, report.final_time, report.duration_sec
        );
        info!(
            "  ticks: {} published, {} resolved, {} superseded",
            report.published, report.resolved, report.superseded
        );
        info!(
            "  frames with telemetry={} detection={} segment={}",
            report.frames_with_telemetry, report.frames_with_detection, report.frames_with_segment
        );
        if report.off_map_markers > 0 || report.truncated_boxes > 0 {
            info!(
                "  off-map markers={} truncated boxes={}",
                report.off_map_markers, report.truncated_boxes
            );
        }
        if report.segment_jumps > 0 {
            info!("  segment jumps={}", report.segment_jumps);
        }
    }

    Ok(())
}
