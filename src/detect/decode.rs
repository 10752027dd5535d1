use crate::detect::result::{BoundingBox, Detection, DetectionSet};

/// Number of box rows (cx, cy, w, h) that precede the class rows.
pub const BOX_CHANNELS: usize = 4;

/// Decoder settings for a channel-major `(4 + classes) x anchors` output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DecoderSettings {
    pub num_classes: usize,
    pub input_size: u32,
    pub confidence_threshold: f32,
    pub flip_x: bool,
}

/// Decodes a flat model output into candidate detections.
///
/// Anchors whose best class score does not exceed the confidence threshold are
/// dropped. Empty or malformed outputs decode to an empty set.
pub fn decode(output: &[f32], settings: &DecoderSettings) -> DetectionSet {
    if output.is_empty() {
        return Vec::new();
    }
    let num_channels = BOX_CHANNELS + settings.num_classes;
    if settings.num_classes == 0 || output.len() % num_channels != 0 {
        log::warn!(
            "malformed model output: {} values is not a multiple of {} channels",
            output.len(),
            num_channels
        );
        return Vec::new();
    }
    let num_anchors = output.len() / num_channels;
    let size = settings.input_size as f32;
    if size <= 0.0 {
        return Vec::new();
    }

    let mut detections = Vec::new();
    for anchor in 0..num_anchors {
        let mut max_conf = 0.0f32;
        let mut max_class = None;
        for class in 0..settings.num_classes {
            let conf = output[(BOX_CHANNELS + class) * num_anchors + anchor];
            if conf > max_conf {
                max_conf = conf;
                max_class = Some(class);
            }
        }

        let Some(class_id) = max_class else {
            continue;
        };
        if max_conf <= settings.confidence_threshold {
            continue;
        }

        let mut cx = output[anchor];
        let cy = output[num_anchors + anchor];
        let w = output[2 * num_anchors + anchor];
        let h = output[3 * num_anchors + anchor];
        if settings.flip_x {
            cx = size - cx;
        }

        let bbox = BoundingBox::new(
            (cx - w / 2.0) / size,
            (cy - h / 2.0) / size,
            w / size,
            h / size,
        );
        detections.push(Detection::new(bbox, max_conf, class_id));
    }
    detections
}
