use std::collections::VecDeque;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::detect::backend::InferenceBackend;
use crate::frame::InputTensor;

/// One scripted inference outcome.
#[derive(Clone, Debug, PartialEq)]
pub enum StubOutput {
    Tensor(Vec<f32>),
    Failure(String),
}

/// Deterministic backend for tests and replays.
///
/// Returns scripted outputs in order, ignoring the input tensor. Once the
/// script is exhausted it returns an empty output (zero detections), or loops
/// when built with `looping`.
pub struct StubBackend {
    input_size: u32,
    script: VecDeque<StubOutput>,
    looping: bool,
    latency: Duration,
    calls: usize,
}

impl StubBackend {
    pub fn new(input_size: u32) -> Self {
        Self {
            input_size,
            script: VecDeque::new(),
            looping: false,
            latency: Duration::ZERO,
            calls: 0,
        }
    }

    /// Script a sequence of successful outputs.
    pub fn with_outputs<I>(input_size: u32, outputs: I) -> Self
    where
        I: IntoIterator<Item = Vec<f32>>,
    {
        let mut backend = Self::new(input_size);
        backend.script = outputs.into_iter().map(StubOutput::Tensor).collect();
        backend
    }

    pub fn push(&mut self, output: StubOutput) {
        self.script.push_back(output);
    }

    /// Replay the script forever instead of going quiet.
    pub fn looping(mut self) -> Self {
        self.looping = true;
        self
    }

    /// Simulated per-call inference latency.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls
    }
}

impl InferenceBackend for StubBackend {
    fn name(&self) -> &'static str {
        "stub"
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn infer(&mut self, tensor: &InputTensor) -> Result<Vec<f32>> {
        if tensor.size != self.input_size {
            return Err(anyhow!(
                "tensor size {} does not match model input {}",
                tensor.size,
                self.input_size
            ));
        }
        self.calls += 1;
        if !self.latency.is_zero() {
            std::thread::sleep(self.latency);
        }

        let Some(next) = self.script.pop_front() else {
            return Ok(Vec::new());
        };
        if self.looping {
            self.script.push_back(next.clone());
        }
        match next {
            StubOutput::Tensor(values) => Ok(values),
            StubOutput::Failure(message) => Err(anyhow!("stub inference failure: {}", message)),
        }
    }
}
