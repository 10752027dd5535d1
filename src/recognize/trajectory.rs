use std::collections::VecDeque;

use crate::detect::Point;

/// Trajectory gate settings, in normalized image units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrajectorySettings {
    /// Buffer capacity.
    pub length: usize,
    /// Points required before any decision is made.
    pub min_samples: usize,
    /// Required downward travel, oldest to newest point.
    pub drop_threshold: f32,
    /// Required rightward hook, midpoint to newest point.
    pub curve_threshold: f32,
}

impl Default for TrajectorySettings {
    fn default() -> Self {
        Self {
            length: 30,
            min_samples: 15,
            drop_threshold: 0.047,
            curve_threshold: 0.023,
        }
    }
}

/// Box-center history for one motion symbol.
///
/// Confirms a "drop then hook" stroke: the newest point must sit below the
/// oldest by more than the drop threshold and to the right of the midpoint by
/// more than the curve threshold. Anything else is "no decision yet".
#[derive(Clone, Debug)]
pub struct TrajectoryTracker {
    settings: TrajectorySettings,
    points: VecDeque<Point>,
}

impl TrajectoryTracker {
    pub fn new(settings: TrajectorySettings) -> Self {
        Self {
            points: VecDeque::with_capacity(settings.length),
            settings,
        }
    }

    /// Record the center of this frame's primary detection.
    pub fn push(&mut self, center: Point) {
        self.points.push_back(center);
        while self.points.len() > self.settings.length {
            self.points.pop_front();
        }
    }

    /// True when the buffered stroke matches the motion symbol.
    pub fn confirms(&self) -> bool {
        let len = self.points.len();
        if len == 0 || len < self.settings.min_samples {
            return false;
        }
        let (Some(start), Some(mid), Some(end)) = (
            self.points.front(),
            self.points.get(len / 2),
            self.points.back(),
        ) else {
            return false;
        };

        let dy = end.y - start.y;
        let dx = end.x - mid.x;
        dy > self.settings.drop_threshold && dx > self.settings.curve_threshold
    }

    /// Push a point and evaluate in one step.
    pub fn observe(&mut self, center: Point) -> bool {
        self.push(center);
        self.confirms()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn reset(&mut self) {
        self.points.clear();
    }
}
