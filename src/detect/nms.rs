use std::cmp::Ordering;

use crate::detect::result::DetectionSet;

/// Greedy non-max suppression.
///
/// Detections are stably sorted by confidence (ties keep input order); each kept
/// detection removes every remaining one whose IoU with it exceeds `iou_threshold`.
/// The result is confidence-ordered and pairwise IoU never exceeds the threshold.
pub fn non_max_suppression(mut detections: DetectionSet, iou_threshold: f32) -> DetectionSet {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let mut kept: DetectionSet = Vec::with_capacity(detections.len());
    for candidate in detections {
        let suppressed = kept
            .iter()
            .any(|best| best.bbox.iou(&candidate.bbox) > iou_threshold);
        if !suppressed {
            kept.push(candidate);
        }
    }
    kept
}
