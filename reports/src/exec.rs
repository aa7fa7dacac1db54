//! Command seam for the report builder.
//!
//! Build phases describe the commands they need as [`Invocation`]s; the
//! [`CommandRunner`] trait executes them. Tests script canned outputs
//! instead of spawning anything.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use anyhow::Result;

use crate::config::ReportsConfig;
use crate::process::{CaptureLimits, Captured, capture_command};

/// One command to run from the repo root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub program: String,
    pub args: Vec<String>,
}

impl Invocation {
    pub fn new(program: &str, args: &[&str]) -> Self {
        Self {
            program: program.to_string(),
            args: args.iter().map(|a| (*a).to_string()).collect(),
        }
    }
}

impl fmt::Display for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Executes invocations on behalf of the build phases.
pub trait CommandRunner {
    fn run(&self, invocation: &Invocation) -> Result<Captured>;
}

/// Real runner: spawns the invocation in the repo root with the configured
/// limits.
pub struct ShellRunner {
    repo_root: PathBuf,
    limits: CaptureLimits,
}

impl ShellRunner {
    pub fn new(repo_root: &Path, config: &ReportsConfig) -> Self {
        Self {
            repo_root: repo_root.to_path_buf(),
            limits: CaptureLimits {
                timeout: Duration::from_secs(config.command_timeout_secs),
                output_limit_bytes: config.output_limit_bytes,
            },
        }
    }
}

impl CommandRunner for ShellRunner {
    fn run(&self, invocation: &Invocation) -> Result<Captured> {
        let mut cmd = Command::new(&invocation.program);
        cmd.args(&invocation.args).current_dir(&self.repo_root);
        capture_command(cmd, self.limits)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_runner_executes_in_the_repo_root() {
        let temp = tempfile::tempdir().expect("tempdir");
        std::fs::write(temp.path().join("marker.txt"), "here").expect("write");

        let runner = ShellRunner::new(temp.path(), &ReportsConfig::default());
        let captured = runner
            .run(&Invocation::new("sh", &["-c", "cat marker.txt"]))
            .expect("run");

        assert!(captured.success);
        assert_eq!(captured.stdout, "here");
    }

    #[test]
    fn display_joins_program_and_args() {
        let invocation = Invocation::new("cargo", &["test", "--workspace"]);
        assert_eq!(invocation.to_string(), "cargo test --workspace");
    }
}
