//! Fixed-rate detection loop.
//!
//! Inference runs on a dedicated worker thread that owns the backend. The
//! loop keeps at most one request in flight: while a result is pending, new
//! frames are not even fetched. Everything after inference (decode through
//! confirm) runs synchronously on the loop thread, so the pipeline needs no
//! locking.
//!
//! Each request carries a generation number. Deactivating the loop bumps the
//! generation, so a result that arrives afterwards is dropped without touching
//! the pipeline.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};

use crate::config::ScheduleSettings;
use crate::detect::InferenceBackend;
use crate::frame::RgbFrame;
use crate::pipeline::{FrameOutcome, Pipeline};

/// Supplies the most recent camera frame, if one is available.
pub trait FrameSource {
    fn next_frame(&mut self) -> Option<RgbFrame>;
}

impl<F> FrameSource for F
where
    F: FnMut() -> Option<RgbFrame>,
{
    fn next_frame(&mut self) -> Option<RgbFrame> {
        self()
    }
}

struct InferenceJob {
    generation: u64,
    frame: RgbFrame,
}

struct InferenceReply {
    generation: u64,
    output: Result<Vec<f32>>,
}

/// Worker thread owning an inference backend.
pub struct InferenceWorker {
    backend_name: &'static str,
    jobs: Option<Sender<InferenceJob>>,
    replies: Receiver<InferenceReply>,
    join: Option<JoinHandle<()>>,
}

impl InferenceWorker {
    /// Warm up the backend and move it onto its own thread.
    pub fn spawn<B: InferenceBackend + 'static>(mut backend: B) -> Result<Self> {
        let backend_name = backend.name();
        backend
            .warm_up()
            .with_context(|| format!("backend '{}' failed to warm up", backend_name))?;

        let (job_tx, job_rx) = mpsc::channel::<InferenceJob>();
        let (reply_tx, reply_rx) = mpsc::channel();
        let join = std::thread::Builder::new()
            .name(format!("inference-{}", backend_name))
            .spawn(move || {
                for job in job_rx {
                    let output = backend
                        .tensor_from_image(&job.frame)
                        .and_then(|tensor| backend.infer(&tensor));
                    let reply = InferenceReply {
                        generation: job.generation,
                        output,
                    };
                    if reply_tx.send(reply).is_err() {
                        break;
                    }
                }
            })
            .context("failed to spawn inference worker")?;

        log::info!("inference worker started (backend={})", backend_name);
        Ok(Self {
            backend_name,
            jobs: Some(job_tx),
            replies: reply_rx,
            join: Some(join),
        })
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend_name
    }

    fn submit(&self, job: InferenceJob) -> Result<()> {
        let jobs = self
            .jobs
            .as_ref()
            .ok_or_else(|| anyhow!("inference worker is shut down"))?;
        jobs.send(job)
            .map_err(|_| anyhow!("inference worker '{}' has stopped", self.backend_name))
    }
}

impl Drop for InferenceWorker {
    fn drop(&mut self) {
        self.jobs.take();
        if let Some(join) = self.join.take() {
            if join.join().is_err() {
                log::error!("inference worker '{}' panicked", self.backend_name);
            }
        }
    }
}

/// Counters for health logging.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames_submitted: u64,
    pub results_applied: u64,
    pub results_discarded: u64,
    pub inference_failures: u64,
    pub skipped_busy: u64,
    pub cooldowns: u64,
}

/// What one tick of the loop did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TickOutcome {
    /// The active flag is cleared; nothing was done.
    Inactive,
    /// Paused after a stable detection.
    CoolingDown,
    /// A request is still in flight; this frame was skipped.
    Busy,
    /// The frame source had nothing.
    NoFrame,
    /// A new frame was handed to the worker.
    Submitted,
    /// The worker is gone; no detection is possible.
    WorkerUnavailable,
}

pub struct DetectionLoop<S> {
    pipeline: Pipeline,
    source: S,
    worker: InferenceWorker,
    active: Arc<AtomicBool>,
    interval: Duration,
    cooldown: Duration,
    generation: u64,
    in_flight: Option<u64>,
    was_active: bool,
    cooldown_pending: bool,
    cooldown_until: Option<Instant>,
    worker_lost: bool,
    last_outcome: Option<FrameOutcome>,
    stats: LoopStats,
}

impl<S: FrameSource> DetectionLoop<S> {
    pub fn new(
        pipeline: Pipeline,
        source: S,
        worker: InferenceWorker,
        schedule: &ScheduleSettings,
    ) -> Self {
        Self {
            pipeline,
            source,
            worker,
            active: Arc::new(AtomicBool::new(true)),
            interval: schedule.interval(),
            cooldown: schedule.cooldown,
            generation: 0,
            in_flight: None,
            was_active: true,
            cooldown_pending: false,
            cooldown_until: None,
            worker_lost: false,
            last_outcome: None,
            stats: LoopStats::default(),
        }
    }

    /// Flag consumers clear to pause detection.
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline {
        &mut self.pipeline
    }

    pub fn stats(&self) -> &LoopStats {
        &self.stats
    }

    pub fn in_flight(&self) -> bool {
        self.in_flight.is_some()
    }

    /// Outcome of the most recently applied inference result.
    pub fn last_outcome(&self) -> Option<&FrameOutcome> {
        self.last_outcome.as_ref()
    }

    /// One scheduling step: collect any finished result, then submit a new
    /// frame when allowed.
    pub fn tick(&mut self, now: Instant) -> TickOutcome {
        let active = self.active.load(Ordering::SeqCst);
        if !active {
            if self.was_active {
                self.deactivate();
            }
            self.drain_replies(now, None);
            return TickOutcome::Inactive;
        }
        self.was_active = true;

        self.drain_replies(now, None);

        if self.cooldown_pending {
            self.cooldown_pending = false;
            self.pipeline.clear_outputs();
            self.cooldown_until = Some(now + self.cooldown);
            self.stats.cooldowns += 1;
            log::debug!("cooling down for {:?}", self.cooldown);
        }
        if let Some(until) = self.cooldown_until {
            if now < until {
                return TickOutcome::CoolingDown;
            }
            self.cooldown_until = None;
        }

        if self.worker_lost {
            return TickOutcome::WorkerUnavailable;
        }
        if self.in_flight.is_some() {
            self.stats.skipped_busy += 1;
            return TickOutcome::Busy;
        }

        let Some(frame) = self.source.next_frame() else {
            return TickOutcome::NoFrame;
        };
        let job = InferenceJob {
            generation: self.generation,
            frame,
        };
        match self.worker.submit(job) {
            Ok(()) => {
                self.in_flight = Some(self.generation);
                self.stats.frames_submitted += 1;
                TickOutcome::Submitted
            }
            Err(e) => {
                log::error!("{}", e);
                self.worker_lost = true;
                TickOutcome::WorkerUnavailable
            }
        }
    }

    /// Block up to `timeout` for the in-flight result and apply it. Returns
    /// true when nothing is left in flight.
    pub fn settle(&mut self, timeout: Duration) -> bool {
        if self.in_flight.is_some() {
            self.drain_replies(Instant::now(), Some(timeout));
        }
        self.in_flight.is_none()
    }

    /// Run at the configured rate until `stop` is set.
    pub fn run(&mut self, stop: &AtomicBool) {
        log::info!(
            "detection loop running: context={} interval={:?} backend={}",
            self.pipeline.context(),
            self.interval,
            self.worker.backend_name()
        );
        let mut last_health_log = Instant::now();
        while !stop.load(Ordering::SeqCst) {
            let started = Instant::now();
            self.tick(started);

            if last_health_log.elapsed() >= Duration::from_secs(5) {
                log::info!(
                    "loop health: submitted={} applied={} discarded={} failures={} busy={}",
                    self.stats.frames_submitted,
                    self.stats.results_applied,
                    self.stats.results_discarded,
                    self.stats.inference_failures,
                    self.stats.skipped_busy
                );
                last_health_log = Instant::now();
            }

            let elapsed = started.elapsed();
            if elapsed < self.interval {
                std::thread::sleep(self.interval - elapsed);
            }
        }
        log::info!("detection loop stopped");
    }

    fn deactivate(&mut self) {
        self.was_active = false;
        self.generation = self.generation.wrapping_add(1);
        self.cooldown_pending = false;
        self.cooldown_until = None;
        self.pipeline.clear_outputs();
        log::debug!(
            "detection inactive; discarding results older than generation {}",
            self.generation
        );
    }

    fn drain_replies(&mut self, now: Instant, wait: Option<Duration>) {
        let mut wait = wait;
        loop {
            let reply = match wait.take() {
                Some(timeout) => match self.worker.replies.recv_timeout(timeout) {
                    Ok(reply) => reply,
                    Err(RecvTimeoutError::Timeout) => return,
                    Err(RecvTimeoutError::Disconnected) => {
                        self.on_worker_lost();
                        return;
                    }
                },
                None => match self.worker.replies.try_recv() {
                    Ok(reply) => reply,
                    Err(TryRecvError::Empty) => return,
                    Err(TryRecvError::Disconnected) => {
                        self.on_worker_lost();
                        return;
                    }
                },
            };
            self.handle_reply(reply, now);
        }
    }

    fn handle_reply(&mut self, reply: InferenceReply, now: Instant) {
        if self.in_flight == Some(reply.generation) {
            self.in_flight = None;
        }
        let current = reply.generation == self.generation && self.was_active;
        match reply.output {
            _ if !current => {
                self.stats.results_discarded += 1;
                log::debug!(
                    "discarding stale inference result (generation {})",
                    reply.generation
                );
            }
            Ok(output) => {
                let outcome = self.pipeline.process_output(&output, now);
                self.stats.results_applied += 1;
                if self.pipeline.wants_cooldown() && !self.cooldown.is_zero() {
                    self.cooldown_pending = true;
                }
                self.last_outcome = Some(outcome);
            }
            Err(e) => {
                self.stats.inference_failures += 1;
                log::warn!("inference failed, skipping frame: {:#}", e);
            }
        }
    }

    fn on_worker_lost(&mut self) {
        if !self.worker_lost {
            log::error!(
                "inference worker '{}' disconnected; no further detections",
                self.worker.backend_name()
            );
        }
        self.worker_lost = true;
        self.in_flight = None;
    }
}
