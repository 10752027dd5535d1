#![cfg(feature = "backend-tract")]

use std::path::Path;

use anyhow::{anyhow, Context, Result};
use tract_onnx::prelude::*;

use crate::detect::backend::InferenceBackend;
use crate::frame::InputTensor;

/// Tract-based backend for ONNX detection models.
///
/// Loads a local model with a `[1, 3, S, S]` input and returns its first output
/// flattened in row-major order.
pub struct TractBackend {
    model: TypedRunnableModel<TypedModel>,
    input_size: u32,
}

impl TractBackend {
    /// Load an ONNX model from disk and prepare it for inference.
    pub fn new<P: AsRef<Path>>(model_path: P, input_size: u32) -> Result<Self> {
        let model_path = model_path.as_ref();
        let side = input_size as usize;
        let model = tract_onnx::onnx()
            .model_for_path(model_path)
            .with_context(|| format!("failed to load ONNX model from {}", model_path.display()))?
            .with_input_fact(
                0,
                InferenceFact::dt_shape(f32::datum_type(), tvec!(1, 3, side, side)),
            )
            .context("failed to set input fact")?
            .into_optimized()
            .context("failed to optimize ONNX model")?
            .into_runnable()
            .context("failed to build runnable ONNX model")?;

        Ok(Self { model, input_size })
    }

    fn build_input(&self, tensor: &InputTensor) -> Result<Tensor> {
        if tensor.size != self.input_size {
            return Err(anyhow!(
                "tensor size {} does not match model input {}",
                tensor.size,
                self.input_size
            ));
        }
        let side = self.input_size as usize;
        let input = tract_ndarray::Array4::from_shape_vec((1, 3, side, side), tensor.data().to_vec())
            .context("input tensor has the wrong element count")?;
        Ok(input.into_tensor())
    }
}

impl InferenceBackend for TractBackend {
    fn name(&self) -> &'static str {
        "tract"
    }

    fn input_size(&self) -> u32 {
        self.input_size
    }

    fn infer(&mut self, tensor: &InputTensor) -> Result<Vec<f32>> {
        let input = self.build_input(tensor)?;
        let outputs = self
            .model
            .run(tvec!(input.into()))
            .context("ONNX inference failed")?;
        let output = outputs
            .first()
            .ok_or_else(|| anyhow!("model produced no outputs"))?;
        let values = output
            .to_array_view::<f32>()
            .context("model output tensor was not f32")?;
        Ok(values.iter().copied().collect())
    }
}
