use std::cmp::Ordering;
use std::collections::HashMap;

use crate::detect::Detection;
use crate::labels::{LabelTable, SymbolKind};

use super::composite::is_stacked_pair;
use super::trajectory::{TrajectorySettings, TrajectoryTracker};

/// Outcome of routing one frame's detections.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct RouteDecision {
    /// Largest detection, if any.
    pub primary: Option<Detection>,
    /// Raw per-frame label; `None` means absent.
    pub label: Option<String>,
}

/// Decides how the dominant detection becomes a raw label.
///
/// The primary detection is the largest box: the active hand is the one
/// closest to the camera. Static symbols pass through, motion symbols go to a
/// per-symbol trajectory tracker, and when nothing resolved the two-hand
/// composite check runs as a fallback.
pub struct Router {
    labels: LabelTable,
    trajectory: TrajectorySettings,
    trackers: HashMap<usize, TrajectoryTracker>,
}

impl Router {
    pub fn new(labels: LabelTable, trajectory: TrajectorySettings) -> Self {
        Self {
            labels,
            trajectory,
            trackers: HashMap::new(),
        }
    }

    pub fn labels(&self) -> &LabelTable {
        &self.labels
    }

    /// Route an NMS-filtered detection set.
    pub fn route(&mut self, detections: &[Detection]) -> RouteDecision {
        let Some(primary) = primary_detection(detections) else {
            return RouteDecision::default();
        };

        let mut label = match self.labels.kind(primary.class_id) {
            SymbolKind::Static | SymbolKind::Directional => {
                Some(self.labels.name(primary.class_id).into_owned())
            }
            SymbolKind::Motion => {
                let settings = self.trajectory;
                let tracker = self
                    .trackers
                    .entry(primary.class_id)
                    .or_insert_with(|| TrajectoryTracker::new(settings));
                if tracker.observe(primary.bbox.center()) {
                    log::debug!(
                        "trajectory confirmed {}",
                        self.labels.name(primary.class_id)
                    );
                    Some(self.labels.name(primary.class_id).into_owned())
                } else {
                    None
                }
            }
            SymbolKind::Composite => None,
        };

        if label.is_none() && detections.len() >= 2 {
            if let Some(symbol) = self.labels.first_of(SymbolKind::Composite) {
                if is_stacked_pair(detections) {
                    label = Some(symbol.to_string());
                }
            }
        }

        RouteDecision {
            primary: Some(primary),
            label,
        }
    }

    /// Points buffered for a motion symbol's class id.
    pub fn trajectory_len(&self, class_id: usize) -> usize {
        self.trackers.get(&class_id).map_or(0, TrajectoryTracker::len)
    }

    /// Clear every trajectory buffer.
    pub fn reset(&mut self) {
        for tracker in self.trackers.values_mut() {
            tracker.reset();
        }
    }
}

/// Largest-area detection. Equal areas keep the earlier (more confident) one.
pub fn primary_detection(detections: &[Detection]) -> Option<Detection> {
    let mut ranked: Vec<Detection> = detections.to_vec();
    ranked.sort_by(|a, b| {
        b.bbox
            .area()
            .partial_cmp(&a.bbox.area())
            .unwrap_or(Ordering::Equal)
    });
    ranked.first().copied()
}
