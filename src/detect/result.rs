use serde::Serialize;

/// Axis-aligned box in normalized 0..1 image coordinates (top-left origin).
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl BoundingBox {
    pub fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    pub fn area(&self) -> f32 {
        self.w * self.h
    }

    pub fn center(&self) -> Point {
        Point {
            x: self.x + self.w / 2.0,
            y: self.y + self.h / 2.0,
        }
    }

    pub fn x_max(&self) -> f32 {
        self.x + self.w
    }

    pub fn y_max(&self) -> f32 {
        self.y + self.h
    }

    /// Intersection-over-union. A zero-area union yields 0.
    pub fn iou(&self, other: &BoundingBox) -> f32 {
        let x_overlap = (self.x_max().min(other.x_max()) - self.x.max(other.x)).max(0.0);
        let y_overlap = (self.y_max().min(other.y_max()) - self.y.max(other.y)).max(0.0);
        let intersection = x_overlap * y_overlap;
        let union = self.area() + other.area() - intersection;
        if union > 0.0 {
            intersection / union
        } else {
            0.0
        }
    }
}

/// A point in normalized image coordinates.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// One decoded candidate. Created fresh every frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Detection {
    pub bbox: BoundingBox,
    pub confidence: f32,
    pub class_id: usize,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f32, class_id: usize) -> Self {
        Self {
            bbox,
            confidence,
            class_id,
        }
    }
}

/// Detections for a single frame.
pub type DetectionSet = Vec<Detection>;

/// Box/label/confidence tuple handed to overlay renderers. Serializes as
/// `{"bbox": {"x", "y", "w", "h"}, "label", "confidence"}`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Overlay {
    pub bbox: BoundingBox,
    pub label: String,
    pub confidence: f32,
}
