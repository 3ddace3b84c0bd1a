//! Synchronous subprocess execution shared by the `occ` and system layers.

use std::io::Write;
use std::path::Path;
use std::process::{Command, Stdio};

use serde::Serialize;

/// Exit status and captured output of one external command.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CommandOutput {
    pub code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            code: 0,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            code,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    pub fn success(&self) -> bool {
        self.code == 0
    }

    /// Stdout if present, otherwise stderr. Used for action results.
    pub fn text(&self) -> String {
        if self.stdout.trim().is_empty() {
            self.stderr.trim().to_string()
        } else {
            self.stdout.trim().to_string()
        }
    }
}

/// Runs `program` with `args`, blocking until it exits.
///
/// A process killed by a signal reports exit code -1.
pub fn run(program: &str, args: &[String], cwd: Option<&Path>) -> std::io::Result<CommandOutput> {
    spawn(program, args, cwd, None)
}

/// Like [`run`], feeding `input` to the child's stdin.
pub fn run_with_input(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    input: &str,
) -> std::io::Result<CommandOutput> {
    spawn(program, args, cwd, Some(input))
}

fn spawn(
    program: &str,
    args: &[String],
    cwd: Option<&Path>,
    input: Option<&str>,
) -> std::io::Result<CommandOutput> {
    let mut command = Command::new(program);
    command
        .args(args)
        .stdin(if input.is_some() {
            Stdio::piped()
        } else {
            Stdio::null()
        })
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        command.current_dir(dir);
    }

    let mut child = command.spawn()?;
    if let (Some(input), Some(mut stdin)) = (input, child.stdin.take()) {
        stdin.write_all(input.as_bytes())?;
    }
    let output = child.wait_with_output()?;

    Ok(CommandOutput {
        code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}
