use std::cmp::Ordering;

use crate::detect::Detection;

/// Vertical separation must exceed this multiple of horizontal separation.
pub const STACK_RATIO: f32 = 1.5;

/// Two-hand stacked pose check.
///
/// Takes the two most confident detections and reports a stack when their
/// centers are separated mostly vertically.
pub fn is_stacked_pair(detections: &[Detection]) -> bool {
    if detections.len() < 2 {
        return false;
    }
    let mut ranked: Vec<&Detection> = detections.iter().collect();
    ranked.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(Ordering::Equal)
    });

    let c1 = ranked[0].bbox.center();
    let c2 = ranked[1].bbox.center();
    let dx = (c1.x - c2.x).abs();
    let dy = (c1.y - c2.y).abs();
    dy > STACK_RATIO * dx
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::BoundingBox;

    fn centered(cx: f32, cy: f32, confidence: f32) -> Detection {
        Detection::new(BoundingBox::new(cx - 0.05, cy - 0.05, 0.1, 0.1), confidence, 0)
    }

    #[test]
    fn vertical_offset_three_times_horizontal_is_stacked() {
        let dets = [centered(0.5, 0.2, 0.9), centered(0.6, 0.5, 0.8)];
        assert!(is_stacked_pair(&dets));
    }

    #[test]
    fn equal_offsets_are_not_stacked() {
        let dets = [centered(0.5, 0.2, 0.9), centered(0.7, 0.4, 0.8)];
        assert!(!is_stacked_pair(&dets));
    }

    #[test]
    fn uses_two_most_confident_boxes() {
        // The low-confidence third box sits directly below the first.
        let dets = [
            centered(0.2, 0.5, 0.9),
            centered(0.2, 0.9, 0.3),
            centered(0.8, 0.5, 0.85),
        ];
        assert!(!is_stacked_pair(&dets));
    }

    #[test]
    fn single_detection_is_never_stacked() {
        assert!(!is_stacked_pair(&[centered(0.5, 0.5, 0.9)]));
    }
}
