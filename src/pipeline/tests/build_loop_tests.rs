//! Tests for target event ordering and queued rebuild behavior.

use super::{
    BuildCycleReport, WatchSettings, run_builds_until_stable, run_initial_build,
    run_single_build_cycle, run_watch_build_loop, watch_settings_for,
};
use crate::pipeline::command::BuildExecutor;
use crate::pipeline::{CompilationTarget, TargetHandle, TargetKind, watch};
use crate::relay::status::CompilationResult;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

struct FakeExecutor {
    responses: Vec<CompilationResult>,
    call_count: Arc<AtomicUsize>,
    on_call: Option<Box<dyn Fn(usize) + Send>>,
}

impl FakeExecutor {
    fn new(responses: Vec<CompilationResult>) -> Self {
        Self {
            responses,
            call_count: Arc::new(AtomicUsize::new(0)),
            on_call: None,
        }
    }

    fn with_on_call(
        responses: Vec<CompilationResult>,
        on_call: Box<dyn Fn(usize) + Send>,
    ) -> Self {
        Self {
            on_call: Some(on_call),
            ..Self::new(responses)
        }
    }
}

impl BuildExecutor for FakeExecutor {
    fn build(&mut self) -> CompilationResult {
        let call_index = self.call_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(ref callback) = self.on_call {
            callback(call_index);
        }

        if self.responses.is_empty() {
            return CompilationResult::success(format!("build-{call_index}"));
        }
        self.responses.remove(0)
    }
}

fn recorded_target(kind: TargetKind) -> (Arc<TargetHandle>, Arc<Mutex<Vec<String>>>) {
    let target = Arc::new(TargetHandle::new(kind));
    let events = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&events);
    target.on_invalidated(Box::new(move || {
        sink.lock()
            .expect("events mutex should not be poisoned")
            .push(String::from("invalid"));
    }));

    let sink = Arc::clone(&events);
    target.on_done(Box::new(move |result| {
        sink.lock()
            .expect("events mutex should not be poisoned")
            .push(format!("done:{}", result.hash));
    }));

    (target, events)
}

fn events_of(events: &Arc<Mutex<Vec<String>>>) -> Vec<String> {
    events
        .lock()
        .expect("events mutex should not be poisoned")
        .clone()
}

fn settings(watch_root: &Path) -> WatchSettings {
    watch_settings_for(watch_root, None, Duration::from_millis(20))
}

fn wait_until(deadline: Duration, condition: impl Fn() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(10));
    }
    condition()
}

#[test]
fn initial_build_only_reports_done() {
    let (target, events) = recorded_target(TargetKind::Client);
    let mut executor = FakeExecutor::new(vec![CompilationResult::success("h1")]);

    let report = run_initial_build(&target, &mut executor);

    assert_eq!(
        report,
        BuildCycleReport {
            build_number: 1,
            has_errors: false,
            hash: String::from("h1"),
        }
    );
    assert_eq!(events_of(&events), vec!["done:h1"]);
}

#[test]
fn build_cycle_invalidates_before_finishing() {
    let (target, events) = recorded_target(TargetKind::Server);
    let mut executor = FakeExecutor::new(vec![
        CompilationResult::failed("bad", vec![String::from("boom")]),
        CompilationResult::success("good"),
    ]);

    let failed = run_single_build_cycle(&target, &mut executor, 2);
    let fixed = run_single_build_cycle(&target, &mut executor, 3);

    assert!(failed.has_errors);
    assert_eq!(failed.build_number, 2);
    assert!(!fixed.has_errors);
    assert_eq!(
        events_of(&events),
        vec!["invalid", "done:bad", "invalid", "done:good"]
    );
}

#[test]
fn edits_during_a_build_queue_one_follow_up() {
    let root = tempfile::tempdir().expect("should create temp dir");
    let source = root.path().join("main.ts");
    fs::write(&source, "v1").expect("should write source");

    let edit_path = source.clone();
    let mut executor = FakeExecutor::with_on_call(
        Vec::new(),
        Box::new(move |call_index| {
            if call_index == 1 {
                fs::write(&edit_path, "version two").expect("should edit source");
            }
        }),
    );

    let (target, events) = recorded_target(TargetKind::Client);
    let settings = settings(root.path());
    let mut builds_so_far = 1;
    let mut baseline = watch::collect_fingerprints(root.path(), &[]).expect("should scan");

    let build_count = run_builds_until_stable(
        &target,
        &mut executor,
        &settings,
        &mut builds_so_far,
        &mut baseline,
    )
    .expect("rebuild cycle should succeed");

    assert_eq!(build_count, 2);
    assert_eq!(builds_so_far, 3);
    assert_eq!(
        events_of(&events),
        vec!["invalid", "done:build-1", "invalid", "done:build-2"]
    );
    assert_eq!(
        baseline,
        watch::collect_fingerprints(root.path(), &[]).expect("should scan")
    );
}

#[test]
fn output_dir_is_excluded_from_watching() {
    let settings = watch_settings_for(
        Path::new("app/src"),
        Some(PathBuf::from("app/dist")),
        Duration::from_millis(5),
    );
    assert_eq!(settings.ignored_dirs, vec![PathBuf::from("app/dist")]);
    assert_eq!(settings.watch_root, PathBuf::from("app/src"));
}

#[test]
fn watch_loop_stops_when_flag_is_set() {
    let root = tempfile::tempdir().expect("should create temp dir");
    let (target, events) = recorded_target(TargetKind::Client);
    let stop = Arc::new(AtomicBool::new(false));

    let stop_after_first = Arc::clone(&stop);
    let executor = FakeExecutor::with_on_call(
        Vec::new(),
        Box::new(move |_| stop_after_first.store(true, Ordering::SeqCst)),
    );

    run_watch_build_loop(
        Arc::clone(&target),
        Box::new(executor),
        settings(root.path()),
        Arc::clone(&stop),
    );

    assert_eq!(events_of(&events), vec!["done:build-1"]);
}

#[test]
fn watch_loop_rebuilds_after_source_changes() {
    let root = tempfile::tempdir().expect("should create temp dir");
    fs::write(root.path().join("main.ts"), "v1").expect("should write source");

    let (target, events) = recorded_target(TargetKind::Server);
    let stop = Arc::new(AtomicBool::new(false));
    let executor = FakeExecutor::new(Vec::new());
    let calls = Arc::clone(&executor.call_count);

    let loop_target = Arc::clone(&target);
    let loop_stop = Arc::clone(&stop);
    let loop_settings = settings(root.path());
    let handle = thread::spawn(move || {
        run_watch_build_loop(loop_target, Box::new(executor), loop_settings, loop_stop);
    });

    assert!(wait_until(Duration::from_secs(5), || calls.load(Ordering::SeqCst) >= 1));
    fs::write(root.path().join("extra.ts"), "new file").expect("should add source");
    assert!(wait_until(Duration::from_secs(5), || calls.load(Ordering::SeqCst) >= 2));

    stop.store(true, Ordering::SeqCst);
    handle.join().expect("watch loop thread should exit cleanly");

    let events = events_of(&events);
    assert_eq!(events[0], "done:build-1");
    assert_eq!(events[1], "invalid");
    assert_eq!(events[2], "done:build-2");
}

#[test]
fn scan_failures_do_not_end_the_loop() {
    let root = tempfile::tempdir().expect("should create temp dir");
    let missing_root = root.path().join("not-created-yet");
    let (target, events) = recorded_target(TargetKind::Client);
    let stop = Arc::new(AtomicBool::new(false));

    let loop_target = Arc::clone(&target);
    let loop_stop = Arc::clone(&stop);
    let loop_settings = settings(&missing_root);
    let handle = thread::spawn(move || {
        run_watch_build_loop(
            loop_target,
            Box::new(FakeExecutor::new(Vec::new())),
            loop_settings,
            loop_stop,
        );
    });

    let first_build_done = wait_until(Duration::from_secs(5), || !events_of(&events).is_empty());
    assert!(first_build_done);
    thread::sleep(Duration::from_millis(60));
    stop.store(true, Ordering::SeqCst);
    handle.join().expect("watch loop thread should exit cleanly");

    assert_eq!(events_of(&events), vec!["done:build-1"]);
}
