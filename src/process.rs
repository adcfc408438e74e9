//! External program plumbing
//!
//! The archiver and cipher adapters drive separate worker processes. This
//! module owns the mechanics:
//!
//! - [`require_programs`] checks that every needed program is on `PATH`
//! - [`run_captured`] runs a program to completion, optionally feeding a
//!   payload on stdin, and captures its output
//! - [`run_streaming`] runs a program while consuming its stdout line by
//!   line; stderr is drained on a helper thread so neither pipe can fill up
//!   and stall the worker
//!
//! No call has a timeout.

use crate::error::{Result, StashError};
use std::io::{self, BufRead, BufReader, Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use tracing::{debug, trace};

/// Exit status and diagnostics of a finished program
#[derive(Debug)]
pub struct ToolOutput {
    /// Exit status
    pub status: ExitStatus,
    /// Captured standard output (empty when streamed)
    pub stdout: String,
    /// Captured standard error
    pub stderr: String,
}

impl ToolOutput {
    /// Whether the program exited with status zero
    pub fn success(&self) -> bool {
        self.status.success()
    }

    /// Diagnostic text for error messages
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        if stderr.is_empty() {
            format!("{} ({})", self.stdout.trim(), self.status)
                .trim()
                .to_string()
        } else {
            stderr.to_string()
        }
    }
}

/// Fail with [`StashError::DependencyMissing`] unless every program is on `PATH`
///
/// All missing programs are reported together.
pub fn require_programs<S: AsRef<str>>(programs: &[S]) -> Result<()> {
    let mut missing: Vec<String> = Vec::new();
    for program in programs {
        let program = program.as_ref();
        match which::which(program) {
            Ok(path) => trace!("Found {} at {:?}", program, path),
            Err(_) => {
                if !missing.iter().any(|m| m == program) {
                    missing.push(program.to_string());
                }
            }
        }
    }

    if missing.is_empty() {
        Ok(())
    } else {
        Err(StashError::DependencyMissing(missing))
    }
}

fn program_name(cmd: &Command) -> String {
    cmd.get_program().to_string_lossy().to_string()
}

fn spawn_error(tool: &str) -> impl Fn(std::io::Error) -> StashError + '_ {
    move |source| StashError::ToolSpawn {
        tool: tool.to_string(),
        source,
    }
}

/// Run `cmd` to completion, writing `input` to its stdin first
///
/// The payload is written and stdin closed before output is collected. A
/// program that exits without reading its input is still waited on, so its
/// exit status and diagnostics are reported instead of the broken pipe.
pub fn run_captured(cmd: &mut Command, input: Option<&[u8]>) -> Result<ToolOutput> {
    let tool = program_name(cmd);
    debug!("Running {} {:?}", tool, cmd.get_args().collect::<Vec<_>>());

    cmd.stdin(if input.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    })
    .stdout(Stdio::piped())
    .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(spawn_error(&tool))?;

    if let (Some(payload), Some(mut stdin)) = (input, child.stdin.take()) {
        match stdin.write_all(payload) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::BrokenPipe => {
                debug!("{} closed its input before reading it", tool);
            }
            Err(e) => {
                drop(stdin);
                let _ = child.kill();
                let _ = child.wait();
                return Err(spawn_error(&tool)(e));
            }
        }
    }

    let output = child.wait_with_output().map_err(spawn_error(&tool))?;
    Ok(ToolOutput {
        status: output.status,
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Run `cmd`, handing each non-blank stdout line to `on_line` as it arrives
///
/// Returns once stdout is exhausted and the program has exited.
pub fn run_streaming<F>(cmd: &mut Command, mut on_line: F) -> Result<ToolOutput>
where
    F: FnMut(&str),
{
    let tool = program_name(cmd);
    debug!("Streaming {} {:?}", tool, cmd.get_args().collect::<Vec<_>>());

    cmd.stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = cmd.spawn().map_err(spawn_error(&tool))?;

    let stderr_drain = child.stderr.take().map(|mut stderr| {
        thread::spawn(move || {
            let mut buf = Vec::new();
            if let Err(e) = stderr.read_to_end(&mut buf) {
                debug!("Failed to read diagnostics: {}", e);
            }
            String::from_utf8_lossy(&buf).to_string()
        })
    });

    let mut read_error = None;
    if let Some(stdout) = child.stdout.take() {
        for line in BufReader::new(stdout).lines() {
            match line {
                Ok(line) => {
                    let line = line.trim();
                    if !line.is_empty() {
                        on_line(line);
                    }
                }
                Err(e) => {
                    read_error = Some(e);
                    break;
                }
            }
        }
    }

    let status = child.wait().map_err(spawn_error(&tool))?;
    let stderr = stderr_drain
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default();

    if let Some(e) = read_error {
        return Err(spawn_error(&tool)(e));
    }

    Ok(ToolOutput {
        status,
        stdout: String::new(),
        stderr,
    })
}
