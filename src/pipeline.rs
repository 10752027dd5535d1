//! Per-context recognition pipeline.
//!
//! One `Pipeline` owns every long-lived buffer for a single detection context
//! (trajectories, smoothing window, confirmation state). Pipelines never share
//! state; switching context means building a new pipeline or calling `reset`.
//!
//! Frame flow: decode → NMS → route → zone override → smooth → confirm.
//!
//! Consumers either poll `current_state()` every frame or `subscribe()` to
//! receive each confirmed keyword exactly once.

use std::fmt;
use std::str::FromStr;
use std::sync::mpsc::{self, Receiver, Sender};
use std::time::{Duration, Instant};

use anyhow::Result;

use crate::config::EngineConfig;
use crate::detect::{decode, non_max_suppression, DecoderSettings, DetectionSet, Overlay};
use crate::labels::LabelTable;
use crate::recognize::{Router, TrajectorySettings, ZoneMapper};
use crate::temporal::{AbsentPolicy, HoldToConfirm, TemporalSmoother};

/// Class count of the alphabet model (A to Z).
pub const SPELLING_MODEL_CLASSES: usize = 26;
/// Class count of the navigation and conversation models.
pub const KEYWORD_MODEL_CLASSES: usize = 10;

/// Detection context a pipeline is built for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DetectionContext {
    /// Left/right selection by hand position, letters in the middle zone.
    Navigation,
    /// Letter spelling with motion and two-hand symbols.
    Spelling,
    /// Conversation keywords confirmed by holding a sign.
    Conversation,
}

impl DetectionContext {
    pub fn as_str(&self) -> &'static str {
        match self {
            DetectionContext::Navigation => "navigation",
            DetectionContext::Spelling => "spelling",
            DetectionContext::Conversation => "conversation",
        }
    }

    /// Classes the context's model emits; used when no label table is loaded.
    pub fn model_classes(&self) -> usize {
        match self {
            DetectionContext::Spelling => SPELLING_MODEL_CLASSES,
            DetectionContext::Navigation | DetectionContext::Conversation => {
                KEYWORD_MODEL_CLASSES
            }
        }
    }
}

impl fmt::Display for DetectionContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DetectionContext {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "navigation" | "nav" => Ok(DetectionContext::Navigation),
            "spelling" | "alphabet" => Ok(DetectionContext::Spelling),
            "conversation" | "chat" => Ok(DetectionContext::Conversation),
            other => Err(format!(
                "unknown detection context '{}' (expected navigation, spelling or conversation)",
                other
            )),
        }
    }
}

/// Hold-to-confirm parameters.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ConfirmOptions {
    pub hold_time: Duration,
    pub grace: Duration,
    pub uppercase: bool,
}

/// Fully resolved settings for one pipeline.
#[derive(Clone, Debug)]
pub struct PipelineSettings {
    pub context: DetectionContext,
    pub decoder: DecoderSettings,
    pub iou_threshold: f32,
    pub smoothing_length: usize,
    pub absent_policy: AbsentPolicy,
    pub trajectory: TrajectorySettings,
    /// Honor motion and composite symbol kinds from the label table.
    pub symbol_routing: bool,
    pub zone: Option<ZoneMapper>,
    pub confirm: Option<ConfirmOptions>,
    /// Ask the detection loop to pause after a stable word.
    pub cooldown_after_stable: bool,
}

impl PipelineSettings {
    /// Apply the context preset to the engine configuration.
    ///
    /// | context      | zone | motion/composite | smoother absent | confirm      | cooldown |
    /// |--------------|------|------------------|-----------------|--------------|----------|
    /// | navigation   | yes  | no               | count           | no           | yes      |
    /// | spelling     | no   | yes              | skip            | yes          | no       |
    /// | conversation | no   | no               | count           | yes, upper   | no       |
    ///
    /// `smoothing.absent_policy` in the configuration overrides the preset. It
    /// only shapes the stable word: a frame with no raw label is always absent
    /// input for hold-to-confirm, so the grace period applies under either policy.
    ///
    /// Without a label table the decoder assumes the context's model class count
    /// (26 letters for spelling, 10 keywords otherwise) unless
    /// `detection.num_classes` is configured.
    pub fn for_context(
        context: DetectionContext,
        cfg: &EngineConfig,
        labels: &LabelTable,
    ) -> Result<Self> {
        let zone = match context {
            DetectionContext::Navigation => Some(
                ZoneMapper::new(cfg.zone.left_barrier, cfg.zone.right_barrier)?
                    .with_commands(cfg.zone.left_command.clone(), cfg.zone.right_command.clone()),
            ),
            _ => None,
        };
        let default_policy = match context {
            DetectionContext::Spelling => AbsentPolicy::Skip,
            _ => AbsentPolicy::Count,
        };
        let confirm = match context {
            DetectionContext::Navigation => None,
            DetectionContext::Spelling | DetectionContext::Conversation => Some(ConfirmOptions {
                hold_time: cfg.confirm.hold_time,
                grace: cfg.confirm.grace,
                uppercase: context == DetectionContext::Conversation,
            }),
        };

        Ok(Self {
            context,
            decoder: cfg.decoder_settings(labels, context.model_classes()),
            iou_threshold: cfg.detection.iou_threshold,
            smoothing_length: cfg.smoothing.length,
            absent_policy: cfg.smoothing.absent_policy.unwrap_or(default_policy),
            trajectory: cfg.trajectory,
            symbol_routing: context == DetectionContext::Spelling,
            zone,
            confirm,
            cooldown_after_stable: context == DetectionContext::Navigation,
        })
    }
}

/// Edge event sent once per confirmation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConfirmedKeyword {
    pub context: DetectionContext,
    pub keyword: String,
    pub at: Instant,
}

/// Result of processing one frame.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FrameOutcome {
    /// Per-frame label after routing and zone override.
    pub raw: Option<String>,
    /// Majority-smoothed label.
    pub stable: Option<String>,
    /// Set only on the frame a keyword becomes confirmed.
    pub confirmed: Option<String>,
}

/// Polled view of the pipeline.
#[derive(Clone, Debug, PartialEq)]
pub struct RecognitionState {
    pub context: DetectionContext,
    pub raw_word: Option<String>,
    pub stable_word: Option<String>,
    pub confirmed_keyword: Option<String>,
    pub last_confirmed: Option<String>,
    pub overlays: Vec<Overlay>,
    pub frames_processed: u64,
}

impl RecognitionState {
    fn empty(context: DetectionContext) -> Self {
        Self {
            context,
            raw_word: None,
            stable_word: None,
            confirmed_keyword: None,
            last_confirmed: None,
            overlays: Vec::new(),
            frames_processed: 0,
        }
    }
}

pub struct Pipeline {
    settings: PipelineSettings,
    router: Router,
    smoother: TemporalSmoother,
    confirm: Option<HoldToConfirm>,
    state: RecognitionState,
    subscribers: Vec<Sender<ConfirmedKeyword>>,
}

impl Pipeline {
    pub fn new(settings: PipelineSettings, labels: LabelTable) -> Self {
        let labels = if settings.symbol_routing {
            labels
        } else {
            labels.static_only()
        };
        let router = Router::new(labels, settings.trajectory);
        let smoother = TemporalSmoother::new(settings.smoothing_length, settings.absent_policy);
        let confirm = settings
            .confirm
            .map(|opts| HoldToConfirm::new(opts.hold_time, opts.grace).uppercase(opts.uppercase));
        let state = RecognitionState::empty(settings.context);
        log::debug!(
            "pipeline for {} context: smoothing={} ({:?}), confirm={}, zone={}",
            settings.context,
            settings.smoothing_length,
            settings.absent_policy,
            confirm.is_some(),
            settings.zone.is_some()
        );
        Self {
            settings,
            router,
            smoother,
            confirm,
            state,
            subscribers: Vec::new(),
        }
    }

    /// Build a pipeline from configuration for one context.
    pub fn for_context(
        context: DetectionContext,
        cfg: &EngineConfig,
        labels: LabelTable,
    ) -> Result<Self> {
        let settings = PipelineSettings::for_context(context, cfg, &labels)?;
        Ok(Self::new(settings, labels))
    }

    pub fn context(&self) -> DetectionContext {
        self.settings.context
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    /// Process one raw model output. Malformed output counts as an empty frame.
    pub fn process_output(&mut self, output: &[f32], now: Instant) -> FrameOutcome {
        let candidates = decode(output, &self.settings.decoder);
        let detections = non_max_suppression(candidates, self.settings.iou_threshold);
        self.process_detections(detections, now)
    }

    /// Process one frame of already decoded, NMS-filtered detections.
    pub fn process_detections(&mut self, detections: DetectionSet, now: Instant) -> FrameOutcome {
        let decision = self.router.route(&detections);
        let raw = match (&self.settings.zone, decision.primary) {
            (Some(zone), Some(primary)) => zone.map(primary.bbox.center().x, decision.label),
            _ => decision.label,
        };

        let stable = self.smoother.push(raw.as_deref());
        // A frame without a raw label is absent input for the debouncer, even
        // when the smoother still holds a stable word.
        let held = raw.as_ref().and(stable.as_deref());
        let confirmed = self
            .confirm
            .as_mut()
            .and_then(|confirm| confirm.observe(held, now));

        if let Some(keyword) = &confirmed {
            self.router.reset();
            self.notify(keyword, now);
        }

        let labels = self.router.labels();
        self.state.overlays = detections
            .iter()
            .map(|det| Overlay {
                bbox: det.bbox,
                label: labels.name(det.class_id).into_owned(),
                confidence: det.confidence,
            })
            .collect();
        self.state.raw_word = raw.clone();
        self.state.stable_word = stable.clone();
        if let Some(confirm) = &self.confirm {
            self.state.confirmed_keyword = confirm.confirmed().map(str::to_string);
            self.state.last_confirmed = confirm.last_confirmed().map(str::to_string);
        }
        self.state.frames_processed += 1;

        FrameOutcome {
            raw,
            stable,
            confirmed,
        }
    }

    fn notify(&mut self, keyword: &str, now: Instant) {
        let event = ConfirmedKeyword {
            context: self.settings.context,
            keyword: keyword.to_string(),
            at: now,
        };
        self.subscribers
            .retain(|subscriber| subscriber.send(event.clone()).is_ok());
    }

    /// Receive every future confirmed keyword.
    pub fn subscribe(&mut self) -> Receiver<ConfirmedKeyword> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn current_state(&self) -> RecognitionState {
        self.state.clone()
    }

    pub fn stable_word(&self) -> Option<&str> {
        self.state.stable_word.as_deref()
    }

    pub fn confirmed_keyword(&self) -> Option<&str> {
        self.state.confirmed_keyword.as_deref()
    }

    /// True when the detection loop should pause before the next frame.
    pub fn wants_cooldown(&self) -> bool {
        self.settings.cooldown_after_stable && self.state.stable_word.is_some()
    }

    /// Drop per-frame outputs and the smoothing window. Trajectories and
    /// confirmation state survive.
    pub fn clear_outputs(&mut self) {
        self.smoother.clear();
        self.state.raw_word = None;
        self.state.stable_word = None;
        self.state.overlays.clear();
    }

    /// Return every buffer to its initial state.
    pub fn reset(&mut self) {
        self.clear_outputs();
        self.router.reset();
        if let Some(confirm) = self.confirm.as_mut() {
            confirm.reset();
        }
        self.state.confirmed_keyword = None;
        self.state.last_confirmed = None;
        log::debug!("{} pipeline reset", self.settings.context);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::{BoundingBox, Detection};

    fn labels() -> LabelTable {
        LabelTable::new(["A", "B", "G", "J"])
            .with_motion(&["J"])
            .with_composite(&["G"])
    }

    fn pipeline(context: DetectionContext) -> Pipeline {
        Pipeline::for_context(context, &EngineConfig::default(), labels()).unwrap()
    }

    fn hand(cx: f32, class_id: usize) -> DetectionSet {
        vec![Detection::new(
            BoundingBox::new(cx - 0.1, 0.4, 0.2, 0.2),
            0.9,
            class_id,
        )]
    }

    #[test]
    fn context_names_round_trip() {
        for context in [
            DetectionContext::Navigation,
            DetectionContext::Spelling,
            DetectionContext::Conversation,
        ] {
            assert_eq!(context.as_str().parse::<DetectionContext>(), Ok(context));
        }
        assert!("battle".parse::<DetectionContext>().is_err());
    }

    #[test]
    fn presets_follow_context() {
        let nav = pipeline(DetectionContext::Navigation);
        assert!(nav.settings().zone.is_some());
        assert!(nav.settings().confirm.is_none());
        assert_eq!(nav.settings().absent_policy, AbsentPolicy::Count);

        let spell = pipeline(DetectionContext::Spelling);
        assert!(spell.settings().symbol_routing);
        assert_eq!(spell.settings().absent_policy, AbsentPolicy::Skip);

        let conv = pipeline(DetectionContext::Conversation);
        assert!(conv.settings().confirm.unwrap().uppercase);
        assert!(!conv.settings().cooldown_after_stable);
    }

    #[test]
    fn configured_absent_policy_overrides_preset() {
        let mut cfg = EngineConfig::default();
        cfg.smoothing.absent_policy = Some(AbsentPolicy::Count);
        let p = Pipeline::for_context(DetectionContext::Spelling, &cfg, labels()).unwrap();
        assert_eq!(p.settings().absent_policy, AbsentPolicy::Count);
    }

    #[test]
    fn navigation_zone_overrides_label() {
        let mut p = pipeline(DetectionContext::Navigation);
        let t0 = Instant::now();
        let out = p.process_detections(hand(0.1, 0), t0);
        assert_eq!(out.raw.as_deref(), Some("KIRI"));
        let out = p.process_detections(hand(0.5, 0), t0);
        assert_eq!(out.raw.as_deref(), Some("A"));
        let out = p.process_detections(hand(0.9, 1), t0);
        assert_eq!(out.raw.as_deref(), Some("KANAN"));
    }

    #[test]
    fn navigation_ignores_motion_kinds() {
        let mut p = pipeline(DetectionContext::Navigation);
        let out = p.process_detections(hand(0.5, 3), Instant::now());
        assert_eq!(out.raw.as_deref(), Some("J"));
    }

    #[test]
    fn stable_word_needs_majority() {
        let mut p = pipeline(DetectionContext::Conversation);
        let t0 = Instant::now();
        assert_eq!(p.process_detections(hand(0.5, 0), t0).stable.as_deref(), Some("A"));
        assert_eq!(p.process_detections(hand(0.5, 1), t0).stable, None);
        assert_eq!(p.process_detections(hand(0.5, 0), t0).stable.as_deref(), Some("A"));
    }

    #[test]
    fn conversation_confirms_once_and_notifies() {
        let mut p = pipeline(DetectionContext::Conversation);
        let rx = p.subscribe();
        let t0 = Instant::now();
        let mut confirmations = 0;
        for i in 0..30 {
            let now = t0 + Duration::from_millis(i * 66);
            if p.process_detections(hand(0.5, 1), now).confirmed.is_some() {
                confirmations += 1;
            }
        }
        assert_eq!(confirmations, 1);
        assert_eq!(p.confirmed_keyword(), Some("B"));
        let event = rx.try_recv().unwrap();
        assert_eq!(event.keyword, "B");
        assert_eq!(event.context, DetectionContext::Conversation);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn dropped_subscribers_are_pruned() {
        let mut p = pipeline(DetectionContext::Conversation);
        drop(p.subscribe());
        let t0 = Instant::now();
        for i in 0..10 {
            p.process_detections(hand(0.5, 0), t0 + Duration::from_millis(i * 100));
        }
        assert!(p.subscribers.is_empty());
    }

    #[test]
    fn overlays_carry_resolved_labels() {
        let mut p = pipeline(DetectionContext::Spelling);
        let mut dets = hand(0.3, 1);
        dets.extend(hand(0.8, 9));
        p.process_detections(dets, Instant::now());
        let labels: Vec<_> = p
            .current_state()
            .overlays
            .into_iter()
            .map(|o| o.label)
            .collect();
        assert_eq!(labels, vec!["B".to_string(), "9".to_string()]);
    }

    #[test]
    fn reset_clears_everything() {
        let mut p = pipeline(DetectionContext::Conversation);
        let t0 = Instant::now();
        for i in 0..10 {
            p.process_detections(hand(0.5, 0), t0 + Duration::from_millis(i * 100));
        }
        assert!(p.confirmed_keyword().is_some());
        p.reset();
        let state = p.current_state();
        assert_eq!(state.stable_word, None);
        assert_eq!(state.confirmed_keyword, None);
        assert!(state.overlays.is_empty());
    }

    #[test]
    fn navigation_requests_cooldown_on_stable_word() {
        let mut p = pipeline(DetectionContext::Navigation);
        assert!(!p.wants_cooldown());
        p.process_detections(hand(0.5, 0), Instant::now());
        assert!(p.wants_cooldown());
        p.clear_outputs();
        assert!(!p.wants_cooldown());
    }

    fn one_anchor(class_id: usize, num_classes: usize) -> Vec<f32> {
        let mut out = vec![160.0, 160.0, 64.0, 64.0];
        out.extend((0..num_classes).map(|c| if c == class_id { 0.9 } else { 0.0 }));
        out
    }

    #[test]
    fn unlabelled_spelling_decodes_alphabet_classes() {
        let cfg = EngineConfig::default();
        let mut p =
            Pipeline::for_context(DetectionContext::Spelling, &cfg, LabelTable::default()).unwrap();
        assert_eq!(p.settings().decoder.num_classes, SPELLING_MODEL_CLASSES);

        let out = p.process_output(&one_anchor(25, 26), Instant::now());
        assert_eq!(out.raw.as_deref(), Some("25"));

        let keyword_sized = one_anchor(3, KEYWORD_MODEL_CLASSES);
        let out = p.process_output(&keyword_sized, Instant::now());
        assert_eq!(out.raw, None);
        assert!(p.current_state().overlays.is_empty());
    }

    #[test]
    fn unlabelled_keyword_contexts_decode_ten_classes() {
        let cfg = EngineConfig::default();
        for context in [DetectionContext::Navigation, DetectionContext::Conversation] {
            let mut p = Pipeline::for_context(context, &cfg, LabelTable::default()).unwrap();
            assert_eq!(p.settings().decoder.num_classes, KEYWORD_MODEL_CLASSES);
            let out = p.process_output(&one_anchor(25, 26), Instant::now());
            assert_eq!(out.raw, None);
        }
    }

    #[test]
    fn configured_class_count_overrides_context() {
        let mut cfg = EngineConfig::default();
        cfg.detection.num_classes = Some(5);
        let p =
            Pipeline::for_context(DetectionContext::Spelling, &cfg, LabelTable::default()).unwrap();
        assert_eq!(p.settings().decoder.num_classes, 5);
    }

    #[test]
    fn malformed_output_is_an_empty_frame() {
        let mut p = pipeline(DetectionContext::Navigation);
        let out = p.process_output(&[1.0, 2.0, 3.0], Instant::now());
        assert_eq!(out, FrameOutcome::default());
        assert_eq!(p.current_state().frames_processed, 1);
    }
}
