//! Watch-triggered rebuilds for one compilation target.
//!
//! Every build is bracketed by the target's events: `invalidate()` before the command runs and
//! `finish(result)` after it. The relay only ever sees those two events.

use crate::pipeline::command::BuildExecutor;
use crate::pipeline::{TargetHandle, watch};
use saying::say;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildCycleReport {
    pub build_number: u64,
    pub has_errors: bool,
    pub hash: String,
}

/// Where a target's sources live and which directories the watcher skips.
#[derive(Debug, Clone)]
pub struct WatchSettings {
    pub watch_root: PathBuf,
    pub ignored_dirs: Vec<PathBuf>,
    pub poll_interval: Duration,
}

/// The first build of a target. There is no earlier state to invalidate, so only `finish` runs.
pub fn run_initial_build(
    target: &TargetHandle,
    executor: &mut dyn BuildExecutor,
) -> BuildCycleReport {
    let result = executor.build();
    target.finish(&result);

    let report = BuildCycleReport {
        build_number: 1,
        has_errors: result.has_errors,
        hash: result.hash,
    };
    log_build_report(target, &report);
    report
}

pub fn run_single_build_cycle(
    target: &TargetHandle,
    executor: &mut dyn BuildExecutor,
    build_number: u64,
) -> BuildCycleReport {
    target.invalidate();
    let result = executor.build();
    target.finish(&result);

    let report = BuildCycleReport {
        build_number,
        has_errors: result.has_errors,
        hash: result.hash,
    };
    log_build_report(target, &report);
    report
}

/// Rebuilds until the sources stop changing underneath the build. Returns how many builds ran.
pub fn run_builds_until_stable(
    target: &TargetHandle,
    executor: &mut dyn BuildExecutor,
    settings: &WatchSettings,
    builds_so_far: &mut u64,
    baseline_fingerprints: &mut watch::Fingerprints,
) -> io::Result<usize> {
    let mut build_count = 0usize;

    loop {
        let before_build =
            watch::collect_fingerprints(&settings.watch_root, &settings.ignored_dirs)?;
        *builds_so_far = builds_so_far.saturating_add(1);
        run_single_build_cycle(target, executor, *builds_so_far);
        build_count += 1;

        let after_build =
            watch::collect_fingerprints(&settings.watch_root, &settings.ignored_dirs)?;
        *baseline_fingerprints = after_build.clone();

        // One follow-up build when files changed while the previous build was running.
        if !watch::detect_changes(&before_build, &after_build) {
            break;
        }
    }

    Ok(build_count)
}

/// Runs the initial build, then polls for source changes until `stop` is set.
pub fn run_watch_build_loop(
    target: Arc<TargetHandle>,
    mut executor: Box<dyn BuildExecutor>,
    settings: WatchSettings,
    stop: Arc<AtomicBool>,
) {
    let debounce_window = settings.poll_interval;

    let mut known_fingerprints =
        match watch::collect_fingerprints(&settings.watch_root, &settings.ignored_dirs) {
            Ok(fingerprints) => fingerprints,
            Err(error) => {
                say!(
                    Yellow "Watch warning (",
                    Yellow target.kind().to_string(),
                    Yellow "): failed to collect initial fingerprints: ",
                    Yellow error.to_string()
                );
                watch::Fingerprints::default()
            }
        };

    if stop.load(Ordering::SeqCst) {
        return;
    }

    let mut builds_so_far = run_initial_build(&target, executor.as_mut()).build_number;
    let mut dirty_since: Option<Instant> = None;

    while !stop.load(Ordering::SeqCst) {
        thread::sleep(settings.poll_interval);
        if stop.load(Ordering::SeqCst) {
            break;
        }

        let current_fingerprints =
            match watch::collect_fingerprints(&settings.watch_root, &settings.ignored_dirs) {
                Ok(fingerprints) => fingerprints,
                Err(error) => {
                    say!(
                        Yellow "Watch warning (",
                        Yellow target.kind().to_string(),
                        Yellow "): scan failed: ",
                        Yellow error.to_string()
                    );
                    continue;
                }
            };

        if watch::detect_changes(&known_fingerprints, &current_fingerprints) {
            known_fingerprints = current_fingerprints;
            dirty_since = Some(Instant::now());
        }

        if !watch::debounce_elapsed(dirty_since, debounce_window) {
            continue;
        }

        if let Err(error) = run_builds_until_stable(
            &target,
            executor.as_mut(),
            &settings,
            &mut builds_so_far,
            &mut known_fingerprints,
        ) {
            say!(
                Yellow "Watch warning (",
                Yellow target.kind().to_string(),
                Yellow "): rebuild cycle failed: ",
                Yellow error.to_string()
            );
        }

        dirty_since = None;
    }
}

fn log_build_report(target: &TargetHandle, report: &BuildCycleReport) {
    if report.has_errors {
        say!(
            Yellow "Build #",
            Yellow report.build_number,
            Yellow " of the ",
            Yellow target.kind().to_string(),
            Yellow " failed (",
            Yellow report.hash.as_str(),
            Yellow ")."
        );
    } else {
        say!(
            Green "Build #",
            Green report.build_number,
            Green " of the ",
            Green target.kind().to_string(),
            Green " finished (",
            Green report.hash.as_str(),
            Green ")."
        );
    }
}

/// Source and output paths for one target, with the output excluded from watching.
pub fn watch_settings_for(
    watch_root: &Path,
    output_dir: Option<PathBuf>,
    poll_interval: Duration,
) -> WatchSettings {
    WatchSettings {
        watch_root: watch_root.to_path_buf(),
        ignored_dirs: output_dir.into_iter().collect(),
        poll_interval,
    }
}

#[cfg(test)]
#[path = "tests/build_loop_tests.rs"]
mod tests;
