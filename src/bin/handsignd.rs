//! handsignd - real-time hand-sign recognition daemon
//!
//! This daemon:
//! 1. Loads the engine config (HANDSIGN_CONFIG plus env overrides)
//! 2. Starts an inference worker (ONNX model with `backend-tract`, or a
//!    scripted recording otherwise)
//! 3. Runs the detection loop at the configured rate until Ctrl-C
//! 4. Logs every confirmed keyword

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use handsign_kernel::{
    DetectionContext, DetectionLoop, EngineConfig, InferenceBackend, InferenceWorker, Pipeline,
    RgbFrame, StubBackend,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// navigation, spelling or conversation.
    #[arg(long, env = "HANDSIGN_CONTEXT", default_value = "navigation")]
    context: DetectionContext,
    /// Recorded output tensors to loop through instead of a model.
    #[arg(long)]
    recording: Option<PathBuf>,
    /// Width and height of the synthetic camera frame.
    #[arg(long, default_value_t = 640)]
    frame_size: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = EngineConfig::load()?;
    let labels = cfg.label_table()?;
    if labels.is_empty() {
        log::warn!(
            "no label file configured; classes render as numeric ids ({} assumed)",
            cfg.detection
                .num_classes
                .unwrap_or_else(|| args.context.model_classes())
        );
    }

    let backend = select_backend(&cfg, args.recording.as_deref())?;
    let worker = InferenceWorker::spawn(backend)?;

    let mut pipeline = Pipeline::for_context(args.context, &cfg, labels)?;
    let keywords = pipeline.subscribe();
    std::thread::Builder::new()
        .name("keyword-log".into())
        .spawn(move || {
            for event in keywords {
                log::info!("confirmed [{}] {}", event.context, event.keyword);
            }
        })
        .context("failed to spawn keyword logger")?;

    let frame = RgbFrame::filled(args.frame_size, args.frame_size, [0, 0, 0])?;
    let source = move || Some(frame.clone());
    let mut detection = DetectionLoop::new(pipeline, source, worker, &cfg.schedule);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_handler = stop.clone();
    ctrlc::set_handler(move || {
        stop_handler.store(true, Ordering::SeqCst);
    })
    .context("error setting Ctrl-C handler")?;

    log::info!("handsignd running in {} context (Ctrl-C to stop)", args.context);
    detection.run(&stop);

    let stats = detection.stats();
    log::info!(
        "shutdown: submitted={} applied={} failures={}",
        stats.frames_submitted,
        stats.results_applied,
        stats.inference_failures
    );
    Ok(())
}

fn select_backend(
    cfg: &EngineConfig,
    recording: Option<&Path>,
) -> Result<Box<dyn InferenceBackend>> {
    let input_size = cfg.detection.input_size;
    if let Some(path) = recording {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read recording {}", path.display()))?;
        let frames: Vec<Vec<f32>> = serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid recording {}: {}", path.display(), e))?;
        log::info!("looping {} recorded frames from {}", frames.len(), path.display());
        return Ok(Box::new(StubBackend::with_outputs(input_size, frames).looping()));
    }

    #[cfg(feature = "backend-tract")]
    if let Some(model) = &cfg.model_path {
        let backend = handsign_kernel::detect::TractBackend::new(model, input_size)?;
        return Ok(Box::new(backend));
    }

    if cfg.model_path.is_some() {
        log::warn!("model path configured but backend-tract is disabled; using stub backend");
    }
    Ok(Box::new(StubBackend::new(input_size)))
}
