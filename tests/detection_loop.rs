use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use handsign_kernel::{
    DetectionContext, DetectionLoop, EngineConfig, InferenceWorker, LabelTable, Pipeline,
    RgbFrame, StubBackend, StubOutput, TickOutcome,
};

fn centered_hand(class_id: usize, num_classes: usize) -> Vec<f32> {
    let mut out = vec![160.0, 160.0, 64.0, 64.0];
    out.extend((0..num_classes).map(|c| if c == class_id { 0.9 } else { 0.0 }));
    out
}

fn frame_source() -> impl FnMut() -> Option<RgbFrame> {
    let frame = RgbFrame::filled(8, 8, [128, 64, 32]).expect("frame");
    move || Some(frame.clone())
}

#[test]
fn running_loop_delivers_confirmed_keyword() {
    let mut cfg = EngineConfig::default();
    cfg.schedule.target_hz = 60;

    let backend = StubBackend::with_outputs(320, vec![centered_hand(0, 2)]).looping();
    let worker = InferenceWorker::spawn(backend).expect("worker");
    let mut pipeline = Pipeline::for_context(
        DetectionContext::Conversation,
        &cfg,
        LabelTable::new(["halo", "maaf"]),
    )
    .expect("pipeline");
    let keywords = pipeline.subscribe();
    let mut detection = DetectionLoop::new(pipeline, frame_source(), worker, &cfg.schedule);

    let stop = Arc::new(AtomicBool::new(false));
    let stop_loop = stop.clone();
    let handle = std::thread::spawn(move || {
        detection.run(&stop_loop);
        detection.stats().clone()
    });

    let event = keywords
        .recv_timeout(Duration::from_secs(5))
        .expect("keyword confirmed");
    stop.store(true, Ordering::SeqCst);
    let stats = handle.join().expect("loop thread");

    assert_eq!(event.keyword, "HALO");
    assert!(stats.results_applied >= 5);
    assert_eq!(stats.inference_failures, 0);
}

#[test]
fn failures_do_not_stall_the_loop() {
    let cfg = EngineConfig::default();
    let mut backend = StubBackend::new(320);
    backend.push(StubOutput::Failure("transient".into()));
    backend.push(StubOutput::Tensor(centered_hand(1, 2)));
    let worker = InferenceWorker::spawn(backend).expect("worker");
    let pipeline = Pipeline::for_context(
        DetectionContext::Conversation,
        &cfg,
        LabelTable::new(["halo", "maaf"]),
    )
    .expect("pipeline");
    let mut detection = DetectionLoop::new(pipeline, frame_source(), worker, &cfg.schedule);

    for _ in 0..2 {
        assert_eq!(detection.tick(Instant::now()), TickOutcome::Submitted);
        assert!(detection.settle(Duration::from_secs(2)));
    }
    assert_eq!(detection.stats().inference_failures, 1);
    assert_eq!(detection.stats().results_applied, 1);
    assert_eq!(detection.pipeline().stable_word(), Some("maaf"));
}

#[test]
fn missing_frames_submit_nothing() {
    let cfg = EngineConfig::default();
    let worker = InferenceWorker::spawn(StubBackend::new(320)).expect("worker");
    let pipeline = Pipeline::for_context(
        DetectionContext::Navigation,
        &cfg,
        LabelTable::new(["A"]),
    )
    .expect("pipeline");
    let no_frames = || -> Option<RgbFrame> { None };
    let mut detection = DetectionLoop::new(pipeline, no_frames, worker, &cfg.schedule);

    assert_eq!(detection.tick(Instant::now()), TickOutcome::NoFrame);
    assert!(!detection.in_flight());
    assert_eq!(detection.stats().frames_submitted, 0);
}

#[test]
fn reactivation_resumes_detection() {
    let cfg = EngineConfig::default();
    let backend = StubBackend::with_outputs(320, vec![centered_hand(0, 1)]).looping();
    let worker = InferenceWorker::spawn(backend).expect("worker");
    let pipeline = Pipeline::for_context(
        DetectionContext::Conversation,
        &cfg,
        LabelTable::new(["halo"]),
    )
    .expect("pipeline");
    let mut detection = DetectionLoop::new(pipeline, frame_source(), worker, &cfg.schedule);
    let active = detection.active_flag();

    detection.tick(Instant::now());
    assert!(detection.settle(Duration::from_secs(2)));
    assert_eq!(detection.pipeline().stable_word(), Some("halo"));

    active.store(false, Ordering::SeqCst);
    assert_eq!(detection.tick(Instant::now()), TickOutcome::Inactive);
    assert_eq!(detection.pipeline().stable_word(), None);

    active.store(true, Ordering::SeqCst);
    assert_eq!(detection.tick(Instant::now()), TickOutcome::Submitted);
    assert!(detection.settle(Duration::from_secs(2)));
    assert_eq!(detection.stats().results_applied, 2);
}
