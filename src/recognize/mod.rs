//! Per-frame recognition: detections in, one raw label out.

mod composite;
mod router;
mod trajectory;
mod zone;

pub use composite::{is_stacked_pair, STACK_RATIO};
pub use router::{primary_detection, RouteDecision, Router};
pub use trajectory::{TrajectorySettings, TrajectoryTracker};
pub use zone::{Zone, ZoneMapper, DEFAULT_LEFT_COMMAND, DEFAULT_RIGHT_COMMAND};
