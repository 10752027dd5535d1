//! Hand-Sign Recognition Kernel
//!
//! Postprocessing core for camera-based sign language recognition. A
//! single-class-per-box object detector produces a raw output tensor each
//! frame; this crate turns that tensor into stable, confirmed keywords.
//!
//! # Architecture
//!
//! Each frame flows through a fixed chain:
//!
//! 1. **Decode**: channel-major model output to normalized boxes, thresholded.
//! 2. **NMS**: greedy non-maximum suppression by IoU.
//! 3. **Route**: largest box wins; motion symbols need a trajectory, two-hand
//!    symbols need a stacked pair of detections.
//! 4. **Zone**: in navigation, screen position overrides the letter.
//! 5. **Smooth**: strict majority over a sliding window.
//! 6. **Confirm**: a stable word held long enough fires exactly once.
//!
//! Inference itself runs behind the `InferenceBackend` trait on a dedicated
//! worker thread owned by the `runtime` loop.
//!
//! # Module Structure
//!
//! - `detect`: output decoding, NMS, inference backends
//! - `recognize`: classification router, trajectories, composite and zone rules
//! - `temporal`: majority smoother and hold-to-confirm debouncer
//! - `pipeline`: per-context composition of the above
//! - `runtime`: fixed-rate loop with in-flight guard and cooldown
//! - `config`, `labels`, `frame`: configuration, label tables, input frames

pub mod config;
pub mod detect;
pub mod frame;
pub mod labels;
pub mod pipeline;
pub mod recognize;
pub mod runtime;
pub mod temporal;

pub use config::EngineConfig;
pub use detect::{
    BoundingBox, Detection, DetectionSet, InferenceBackend, Overlay, StubBackend, StubOutput,
};
pub use frame::{InputTensor, RgbFrame};
pub use labels::{LabelTable, SymbolKind};
pub use pipeline::{
    ConfirmedKeyword, DetectionContext, FrameOutcome, Pipeline, PipelineSettings,
    RecognitionState,
};
pub use runtime::{DetectionLoop, FrameSource, InferenceWorker, LoopStats, TickOutcome};
pub use temporal::{AbsentPolicy, HoldToConfirm, TemporalSmoother};
