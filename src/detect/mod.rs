mod backend;
mod backends;
mod decode;
mod nms;
mod result;

pub use backend::InferenceBackend;
#[cfg(feature = "backend-tract")]
pub use backends::TractBackend;
pub use backends::{StubBackend, StubOutput};
pub use decode::{decode, DecoderSettings, BOX_CHANNELS};
pub use nms::non_max_suppression;
pub use result::{BoundingBox, Detection, DetectionSet, Overlay, Point};
