//! Runs a target's configured shell command and turns its outcome into a `CompilationResult`.

use crate::pipeline::TargetKind;
use crate::pipeline::watch;
use crate::relay::status::CompilationResult;
use crate::settings::TargetConfig;
use crate::timer_log;
use rustc_hash::FxHasher;
use saying::say;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

/// Produces one build result per call.
///
/// The watch loop only needs this much, so tests can script build outcomes without spawning
/// processes.
pub trait BuildExecutor: Send {
    fn build(&mut self) -> CompilationResult;
}

#[derive(Debug, Clone)]
pub struct CommandTarget {
    pub kind: TargetKind,
    pub command: String,
    pub working_dir: PathBuf,
    pub output_dir: Option<PathBuf>,
}

impl CommandTarget {
    pub fn from_config(kind: TargetKind, config: &TargetConfig, project_root: &Path) -> Self {
        Self {
            kind,
            command: config.command.to_owned(),
            working_dir: project_root.to_path_buf(),
            output_dir: config.output_dir(project_root),
        }
    }

    pub fn run(&self) -> CompilationResult {
        let start = Instant::now();
        let output = shell_command(&self.command)
            .current_dir(&self.working_dir)
            .output();
        timer_log!(start, "Target command finished in: ");

        let output = match output {
            Ok(output) => output,
            Err(error) => {
                say!(
                    Yellow "Failed to start ",
                    Yellow self.kind.to_string(),
                    Yellow " command: ",
                    Yellow error.to_string()
                );
                return CompilationResult::failed(
                    content_hash(&[], 0),
                    vec![format!("Failed to start '{}': {error}", self.command)],
                );
            }
        };

        summarize_output(
            output.status.success(),
            output.status.code(),
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
            self.output_digest(),
        )
    }

    fn output_digest(&self) -> u64 {
        let Some(output_dir) = &self.output_dir else {
            return 0;
        };

        // No output yet is a valid state before the first successful build.
        match watch::collect_fingerprints(output_dir, &[]) {
            Ok(fingerprints) => watch::fingerprint_digest(&fingerprints),
            Err(_) => 0,
        }
    }
}

impl BuildExecutor for CommandTarget {
    fn build(&mut self) -> CompilationResult {
        self.run()
    }
}

#[cfg(not(windows))]
fn shell_command(command: &str) -> Command {
    let mut shell = Command::new("sh");
    shell.arg("-c").arg(command);
    shell
}

#[cfg(windows)]
fn shell_command(command: &str) -> Command {
    let mut shell = Command::new("cmd");
    shell.arg("/C").arg(command);
    shell
}

pub fn summarize_output(
    success: bool,
    status_code: Option<i32>,
    stdout: &str,
    stderr: &str,
    output_digest: u64,
) -> CompilationResult {
    let hash = content_hash(stdout.as_bytes(), output_digest);
    let lines: Vec<String> = stderr
        .lines()
        .map(str::trim_end)
        .filter(|line| !line.trim().is_empty())
        .map(String::from)
        .collect();

    if success {
        return CompilationResult::success(hash).with_warnings(lines);
    }

    let errors = if lines.is_empty() {
        match status_code {
            Some(code) => vec![format!("Command exited with status {code}.")],
            None => vec![String::from("Command was terminated by a signal.")],
        }
    } else {
        lines
    };

    CompilationResult::failed(hash, errors)
}

pub fn content_hash(stdout: &[u8], output_digest: u64) -> String {
    let mut hasher = FxHasher::default();
    stdout.hash(&mut hasher);
    output_digest.hash(&mut hasher);
    format!("{:016x}", hasher.finish())
}

#[cfg(test)]
#[path = "tests/command_tests.rs"]
mod tests;
