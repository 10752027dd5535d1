//! replay - run a recorded sequence of model outputs through a pipeline
//!
//! The recording is a JSON array with one raw output tensor (array of floats)
//! per frame. Frames are stamped on a simulated clock at `--fps`, so a replay
//! is deterministic and runs as fast as the machine allows.
//!
//! Output is one JSON object per line: every change of stable word and every
//! confirmed keyword.

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::time::Instant;

use handsign_kernel::{DetectionContext, EngineConfig, LabelTable, Pipeline};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Recording to replay (JSON array of output tensors).
    #[arg(long)]
    input: PathBuf,
    /// Engine config file (JSON, or TOML by extension). Falls back to HANDSIGN_CONFIG.
    #[arg(long)]
    config: Option<PathBuf>,
    /// Label file overriding the configured one.
    #[arg(long, env = "HANDSIGN_LABELS")]
    labels: Option<PathBuf>,
    /// navigation, spelling or conversation.
    #[arg(long, default_value = "spelling")]
    context: DetectionContext,
    /// Simulated frame rate; defaults to the configured target rate.
    #[arg(long)]
    fps: Option<u32>,
    /// Also print every frame's raw label and overlay boxes.
    #[arg(long)]
    verbose_frames: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let mut cfg = match &args.config {
        Some(path) => EngineConfig::from_path(path)?,
        None => EngineConfig::load()?,
    };
    if let Some(path) = &args.labels {
        cfg.labels.path = Some(path.clone());
    }
    if let Some(fps) = args.fps {
        if fps == 0 {
            return Err(anyhow!("fps must be >= 1"));
        }
        cfg.schedule.target_hz = fps;
    }
    let schedule = cfg.schedule.clone();

    let raw = std::fs::read_to_string(&args.input)
        .with_context(|| format!("failed to read recording {}", args.input.display()))?;
    let frames: Vec<Vec<f32>> = serde_json::from_str(&raw)
        .map_err(|e| anyhow!("invalid recording {}: {}", args.input.display(), e))?;

    let labels: LabelTable = cfg.label_table()?;
    let mut pipeline = Pipeline::for_context(args.context, &cfg, labels)?;
    let keywords = pipeline.subscribe();
    log::info!(
        "replaying {} frames at {} fps in {} context",
        frames.len(),
        schedule.target_hz,
        args.context
    );

    let start = Instant::now();
    let mut last_stable: Option<String> = None;
    for (index, output) in frames.iter().enumerate() {
        let offset = schedule.frame_offset(index)?;
        let outcome = pipeline.process_output(output, start + offset);

        if args.verbose_frames {
            println!(
                "{}",
                serde_json::json!({
                    "frame": index,
                    "t_ms": offset.as_millis() as u64,
                    "raw": outcome.raw,
                    "overlays": pipeline.current_state().overlays,
                })
            );
        }
        if outcome.stable != last_stable {
            println!(
                "{}",
                serde_json::json!({
                    "frame": index,
                    "t_ms": offset.as_millis() as u64,
                    "stable": outcome.stable,
                })
            );
            last_stable = outcome.stable.clone();
        }
        for event in keywords.try_iter() {
            println!(
                "{}",
                serde_json::json!({
                    "frame": index,
                    "t_ms": event.at.duration_since(start).as_millis() as u64,
                    "confirmed": event.keyword,
                    "context": event.context.as_str(),
                })
            );
        }
    }

    let state = pipeline.current_state();
    log::info!(
        "replay finished: frames={} last_confirmed={:?}",
        state.frames_processed,
        state.last_confirmed
    );
    Ok(())
}
