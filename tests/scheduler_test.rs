use std::rc::Rc;

use canvas_host::{
    Command, HostConfig, ManualFrames, PageState, RenderError, SchedulerState,
    scheduler::FrameTick,
};

use crate::common::test_utils::{
    Call, CallLog, FlakyFrames, Harness, RecordingEngine, constructor_of,
};

mod common;

#[test]
fn each_refresh_renders_exactly_once_then_requests_the_next_frame() {
    let log = CallLog::default();
    let mut harness = Harness::new(constructor_of(RecordingEngine::new(log.clone())));
    harness.init().expect("engine should load");

    for frame in 1..=5 {
        harness.refresh().expect("render");
        assert_eq!(log.renders(), frame);
        assert_eq!(harness.frames.requested(), frame as u64 + 1);
        assert!(harness.frames.outstanding());
    }

    let scheduler = harness.page.scheduler().expect("loop is running");
    assert_eq!(scheduler.state(), SchedulerState::Scheduled);
    assert_eq!(scheduler.frames_rendered(), 5);
}

#[test]
fn next_frame_is_requested_only_after_the_render_returns() {
    let frames = ManualFrames::new();
    let frame_log = frames.log();
    let seen_outstanding = Rc::new(std::cell::RefCell::new(Vec::new()));

    let engine = {
        let frame_log = Rc::clone(&frame_log);
        let seen_outstanding = Rc::clone(&seen_outstanding);
        RecordingEngine::with_render(CallLog::default(), move |_| {
            seen_outstanding.borrow_mut().push(frame_log.outstanding());
            Ok(())
        })
    };
    let mut harness = Harness::with(HostConfig::default(), frames, constructor_of(engine));
    harness.init().expect("engine should load");

    harness.refresh().expect("render");
    harness.refresh().expect("render");

    assert_eq!(*seen_outstanding.borrow(), vec![false, false]);
    assert!(frame_log.outstanding());
}

#[test]
fn refresh_without_an_outstanding_request_renders_nothing() {
    let log = CallLog::default();
    let mut harness = Harness::new(constructor_of(RecordingEngine::new(log.clone())));

    harness.refresh().expect("no loop yet");
    assert_eq!(log.renders(), 0);

    harness.init().expect("engine should load");
    harness.refresh().expect("render");
    assert_eq!(log.renders(), 1);
}

#[test]
fn render_error_halts_the_loop_for_good() {
    let log = CallLog::default();
    let engine = RecordingEngine::with_render(log.clone(), |frame| {
        if frame == 2 {
            anyhow::bail!("device lost");
        }
        Ok(())
    });
    let mut harness = Harness::new(constructor_of(engine));
    harness.init().expect("engine should load");

    harness.refresh().expect("frame 0");
    harness.refresh().expect("frame 1");
    let error = harness.refresh().expect_err("frame 2 fails");
    assert!(matches!(error, RenderError::Engine { frame: 2, .. }));
    assert!(error.to_string().contains("device lost"));

    let scheduler = harness.page.scheduler().expect("loop existed");
    assert_eq!(scheduler.state(), SchedulerState::Halted);
    assert_eq!(scheduler.frames_rendered(), 2);
    assert_eq!(harness.frames.requested(), 3);
    assert!(!harness.frames.outstanding());

    harness.refresh().expect("halted loop ignores refreshes");
    harness.page.on_refresh(FrameTick::at(1_000.0)).expect("still ignored");
    assert_eq!(log.renders(), 3);
    assert_eq!(harness.frames.requested(), 3);

    // Input keeps working without the loop.
    assert!(harness.page.activate("right-button").is_delivered());
    assert_eq!(log.commands(), vec![Command::RotateCameraRight]);
}

#[test]
fn teardown_cancels_the_outstanding_frame() {
    let log = CallLog::default();
    let mut harness = Harness::new(constructor_of(RecordingEngine::new(log.clone())));
    harness.init().expect("engine should load");
    harness.refresh().expect("render");

    harness.page.teardown();
    assert_eq!(harness.page.state(), PageState::TornDown);
    assert_eq!(harness.frames.cancelled(), 1);
    assert!(!harness.frames.outstanding());
    let scheduler = harness.page.scheduler().expect("loop existed");
    assert_eq!(scheduler.state(), SchedulerState::Stopped);

    harness.refresh().expect("stopped loop ignores refreshes");
    assert_eq!(log.calls(), vec![Call::Render]);

    harness.page.teardown();
    assert_eq!(harness.frames.cancelled(), 1, "teardown is idempotent");
}

#[test]
fn refused_frame_request_halts_the_loop() {
    let log = CallLog::default();
    let frames = FlakyFrames::new(1);
    let requests = frames.requests();
    let mut harness = Harness::new(constructor_of(RecordingEngine::new(log.clone())));
    harness.init_with(frames).expect("engine should load");
    assert_eq!(requests.get(), 1);

    let error = harness.refresh().expect_err("next frame is refused");
    assert!(matches!(error, RenderError::Schedule(_)));
    assert!(error.to_string().contains("display is gone"));
    assert_eq!(log.renders(), 1, "the frame itself was drawn");

    let scheduler = harness.page.scheduler().expect("loop existed");
    assert_eq!(scheduler.state(), SchedulerState::Halted);
    assert_eq!(scheduler.frames_rendered(), 1);

    harness.refresh().expect("halted loop ignores refreshes");
    harness.refresh().expect("halted loop ignores refreshes");
    assert_eq!(log.renders(), 1);
    assert_eq!(requests.get(), 2);
}

#[test]
fn page_runs_without_a_loop_when_the_first_frame_is_refused() {
    let log = CallLog::default();
    let frames = FlakyFrames::new(0);
    let requests = frames.requests();
    let mut harness = Harness::new(constructor_of(RecordingEngine::new(log.clone())));
    harness.init_with(frames).expect("a refused first frame does not fail the load");

    assert_eq!(harness.page.state(), PageState::Running);
    let scheduler = harness.page.scheduler().expect("loop exists");
    assert_eq!(scheduler.state(), SchedulerState::Halted);
    assert_eq!(requests.get(), 1);

    harness.refresh().expect("no loop to drive");
    assert_eq!(log.renders(), 0);

    assert!(harness.page.activate("left-button").is_delivered());
    assert_eq!(log.commands(), vec![Command::RotateCameraLeft]);
    assert_eq!(requests.get(), 1);
}
