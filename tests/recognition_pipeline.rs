//! End-to-end recognition from raw model output tensors.

use std::time::{Duration, Instant};

use handsign_kernel::{DetectionContext, EngineConfig, LabelTable, Pipeline};

const INPUT: f32 = 320.0;
const FRAME: Duration = Duration::from_millis(66);

/// One anchor in model pixel space.
struct Anchor {
    cx: f32,
    cy: f32,
    size: f32,
    class_id: usize,
    score: f32,
}

fn anchor(x: f32, y: f32, class_id: usize, score: f32) -> Anchor {
    Anchor {
        cx: x * INPUT,
        cy: y * INPUT,
        size: 0.2 * INPUT,
        class_id,
        score,
    }
}

/// Channel-major `(4 + classes) x anchors` tensor.
fn tensor(anchors: &[Anchor], num_classes: usize) -> Vec<f32> {
    let n = anchors.len();
    let mut out = vec![0.0; (4 + num_classes) * n];
    for (i, a) in anchors.iter().enumerate() {
        out[i] = a.cx;
        out[n + i] = a.cy;
        out[2 * n + i] = a.size;
        out[3 * n + i] = a.size;
        out[(4 + a.class_id) * n + i] = a.score;
    }
    out
}

fn spelling_labels() -> LabelTable {
    LabelTable::parse("A\nB\nG\nJ\n")
        .with_motion(&["J"])
        .with_composite(&["G"])
}

fn unflipped() -> EngineConfig {
    let mut cfg = EngineConfig::default();
    cfg.detection.flip_x = false;
    cfg
}

/// Drop straight down, then hook right.
fn j_stroke(n: usize) -> Vec<(f32, f32)> {
    (0..n)
        .map(|i| {
            let t = i as f32 / (n - 1) as f32;
            if t <= 0.5 {
                (0.5, 0.3 + t * 0.4)
            } else {
                (0.5 + (t - 0.5) * 0.3, 0.5)
            }
        })
        .collect()
}

#[test]
fn spelling_confirms_j_after_trajectory() {
    let mut pipeline =
        Pipeline::for_context(DetectionContext::Spelling, &unflipped(), spelling_labels())
            .expect("pipeline");
    let t0 = Instant::now();

    let mut confirmed = Vec::new();
    for (i, (x, y)) in j_stroke(20).into_iter().enumerate() {
        let out = pipeline.process_output(&tensor(&[anchor(x, y, 3, 0.9)], 4), t0 + FRAME * i as u32);
        if i < 14 {
            assert_eq!(out.raw, None, "frame {} decided too early", i);
            assert_eq!(out.stable, None);
        }
        if let Some(word) = out.confirmed {
            confirmed.push((i, word));
        }
    }

    assert_eq!(confirmed, vec![(19, "J".to_string())]);
    assert_eq!(pipeline.current_state().last_confirmed, None);
}

#[test]
fn spelling_without_motion_never_emits_j() {
    let mut pipeline =
        Pipeline::for_context(DetectionContext::Spelling, &unflipped(), spelling_labels())
            .expect("pipeline");
    let t0 = Instant::now();
    for i in 0..40u32 {
        let out = pipeline.process_output(&tensor(&[anchor(0.5, 0.5, 3, 0.9)], 4), t0 + FRAME * i);
        assert_eq!(out.raw, None);
        assert_eq!(out.confirmed, None);
    }
}

#[test]
fn spelling_stacked_hands_confirm_g() {
    let mut pipeline =
        Pipeline::for_context(DetectionContext::Spelling, &unflipped(), spelling_labels())
            .expect("pipeline");
    let t0 = Instant::now();
    let stacked = tensor(&[anchor(0.5, 0.25, 2, 0.9), anchor(0.53, 0.75, 2, 0.8)], 4);

    let mut confirmations = Vec::new();
    for i in 0..10u32 {
        let out = pipeline.process_output(&stacked, t0 + FRAME * i);
        assert_eq!(out.raw.as_deref(), Some("G"));
        if let Some(word) = out.confirmed {
            confirmations.push(word);
        }
    }
    assert_eq!(confirmations, vec!["G".to_string()]);
    assert_eq!(pipeline.current_state().overlays.len(), 2);
}

#[test]
fn side_by_side_hands_are_not_g() {
    let mut pipeline =
        Pipeline::for_context(DetectionContext::Spelling, &unflipped(), spelling_labels())
            .expect("pipeline");
    let pair = tensor(&[anchor(0.25, 0.5, 2, 0.9), anchor(0.75, 0.55, 2, 0.8)], 4);
    let out = pipeline.process_output(&pair, Instant::now());
    assert_eq!(out.raw, None);
}

#[test]
fn spelling_switch_clears_confirmation() {
    let mut pipeline =
        Pipeline::for_context(DetectionContext::Spelling, &unflipped(), spelling_labels())
            .expect("pipeline");
    let t0 = Instant::now();
    let a = tensor(&[anchor(0.5, 0.5, 0, 0.9)], 4);
    let b = tensor(&[anchor(0.5, 0.5, 1, 0.9)], 4);

    let mut i = 0u32;
    let mut next = |p: &mut Pipeline, frame: &[f32]| {
        let out = p.process_output(frame, t0 + FRAME * i);
        i += 1;
        out
    };
    for _ in 0..8 {
        next(&mut pipeline, a.as_slice());
    }
    assert_eq!(pipeline.confirmed_keyword(), Some("A"));

    // B takes the window majority on its fifth frame
    let mut confirmed_b = false;
    for _ in 0..16 {
        if next(&mut pipeline, b.as_slice()).confirmed.as_deref() == Some("B") {
            confirmed_b = true;
        }
    }
    assert!(confirmed_b);
    let state = pipeline.current_state();
    assert_eq!(state.confirmed_keyword.as_deref(), Some("B"));
    assert_eq!(state.last_confirmed.as_deref(), Some("A"));
}

#[test]
fn navigation_maps_screen_position() {
    // default config mirrors x: model-right appears on the user's left
    let cfg = EngineConfig::default();
    let mut pipeline =
        Pipeline::for_context(DetectionContext::Navigation, &cfg, spelling_labels())
            .expect("pipeline");
    let now = Instant::now();

    let out = pipeline.process_output(&tensor(&[anchor(0.875, 0.5, 0, 0.9)], 4), now);
    assert_eq!(out.raw.as_deref(), Some("KIRI"));
    assert_eq!(out.stable.as_deref(), Some("KIRI"));
    assert!(pipeline.wants_cooldown());

    pipeline.clear_outputs();
    let out = pipeline.process_output(&tensor(&[anchor(0.125, 0.5, 0, 0.9)], 4), now);
    assert_eq!(out.raw.as_deref(), Some("KANAN"));

    pipeline.clear_outputs();
    let out = pipeline.process_output(&tensor(&[anchor(0.5, 0.5, 1, 0.9)], 4), now);
    assert_eq!(out.raw.as_deref(), Some("B"));
}

#[test]
fn navigation_largest_hand_wins() {
    let cfg = unflipped();
    let mut pipeline =
        Pipeline::for_context(DetectionContext::Navigation, &cfg, spelling_labels())
            .expect("pipeline");
    let mut big = anchor(0.85, 0.5, 1, 0.6);
    big.size = 0.3 * INPUT;
    let small = anchor(0.15, 0.5, 0, 0.95);
    let out = pipeline.process_output(&tensor(&[small, big], 4), Instant::now());
    assert_eq!(out.raw.as_deref(), Some("KANAN"));
}

#[test]
fn conversation_keywords_are_uppercased() {
    let labels = LabelTable::parse("halo\nterima kasih\n");
    let mut pipeline =
        Pipeline::for_context(DetectionContext::Conversation, &unflipped(), labels)
            .expect("pipeline");
    let keywords = pipeline.subscribe();
    let t0 = Instant::now();
    for i in 0..10u32 {
        pipeline.process_output(&tensor(&[anchor(0.5, 0.5, 1, 0.9)], 2), t0 + FRAME * i);
    }
    let event = keywords.try_recv().expect("confirmed keyword");
    assert_eq!(event.keyword, "TERIMA KASIH");
    assert!(keywords.try_recv().is_err());
}

#[test]
fn low_confidence_and_overlaps_are_filtered() {
    let mut pipeline =
        Pipeline::for_context(DetectionContext::Conversation, &unflipped(), spelling_labels())
            .expect("pipeline");
    let weak = tensor(&[anchor(0.5, 0.5, 0, 0.5)], 4);
    let out = pipeline.process_output(&weak, Instant::now());
    assert_eq!(out.raw, None);

    let twins = tensor(&[anchor(0.5, 0.5, 0, 0.9), anchor(0.51, 0.5, 1, 0.8)], 4);
    pipeline.process_output(&twins, Instant::now());
    let overlays = pipeline.current_state().overlays;
    assert_eq!(overlays.len(), 1);
    assert_eq!(overlays[0].label, "A");
}

#[test]
fn spelling_absence_clears_and_repeated_letter_confirms_again() {
    let mut pipeline =
        Pipeline::for_context(DetectionContext::Spelling, &unflipped(), spelling_labels())
            .expect("pipeline");
    let keywords = pipeline.subscribe();
    let t0 = Instant::now();
    let a = tensor(&[anchor(0.5, 0.5, 0, 0.9)], 4);
    let empty: Vec<f32> = Vec::new();

    let mut confirmations = Vec::new();
    let mut frame = 0u32;
    for output in [&a; 15]
        .into_iter()
        .chain([&empty; 30])
        .chain([&a; 15])
    {
        let out = pipeline.process_output(output, t0 + FRAME * frame);
        if let Some(word) = out.confirmed {
            confirmations.push((frame, word));
        }
        if frame == 44 {
            let state = pipeline.current_state();
            assert_eq!(state.confirmed_keyword, None);
            assert_eq!(state.last_confirmed.as_deref(), Some("A"));
        }
        frame += 1;
    }

    assert_eq!(
        confirmations,
        vec![(5, "A".to_string()), (50, "A".to_string())]
    );
    assert_eq!(keywords.try_iter().count(), 2);
}

#[test]
fn spelling_short_dropout_keeps_confirmation() {
    let mut pipeline =
        Pipeline::for_context(DetectionContext::Spelling, &unflipped(), spelling_labels())
            .expect("pipeline");
    let t0 = Instant::now();
    let a = tensor(&[anchor(0.5, 0.5, 0, 0.9)], 4);
    let empty: Vec<f32> = Vec::new();

    let mut confirmations = 0;
    // three empty frames stay inside the grace period
    for (i, output) in [&a; 8]
        .into_iter()
        .chain([&empty; 3])
        .chain([&a; 8])
        .enumerate()
    {
        if pipeline
            .process_output(output, t0 + FRAME * i as u32)
            .confirmed
            .is_some()
        {
            confirmations += 1;
        }
    }
    assert_eq!(confirmations, 1);
    assert_eq!(pipeline.confirmed_keyword(), Some("A"));
}
