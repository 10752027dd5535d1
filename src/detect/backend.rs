use anyhow::Result;

use crate::frame::{tensor_from_image, InputTensor, RgbFrame};

/// Inference capability: a fixed-size image tensor in, a flat float array out.
///
/// # Contract
///
/// Implementations own their model and run on the inference worker thread.
/// They must not retain the input tensor beyond the `infer` call. The output
/// layout is channel-major `(4 + classes) x anchors`; the kernel tolerates
/// malformed output, so backends should return what the model produced
/// rather than attempt to repair it.
pub trait InferenceBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Side length of the square model input.
    fn input_size(&self) -> u32;

    /// Run inference on one tensor.
    fn infer(&mut self, tensor: &InputTensor) -> Result<Vec<f32>>;

    /// Build the model input for a frame.
    fn tensor_from_image(&self, frame: &RgbFrame) -> Result<InputTensor> {
        tensor_from_image(frame, self.input_size())
    }

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}

impl<B: InferenceBackend + ?Sized> InferenceBackend for Box<B> {
    fn name(&self) -> &'static str {
        (**self).name()
    }

    fn input_size(&self) -> u32 {
        (**self).input_size()
    }

    fn infer(&mut self, tensor: &InputTensor) -> Result<Vec<f32>> {
        (**self).infer(tensor)
    }

    fn tensor_from_image(&self, frame: &RgbFrame) -> Result<InputTensor> {
        (**self).tensor_from_image(frame)
    }

    fn warm_up(&mut self) -> Result<()> {
        (**self).warm_up()
    }
}
