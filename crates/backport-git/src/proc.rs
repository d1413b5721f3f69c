//! Deadline-bounded subprocess execution.
//!
//! Every external call the engine makes (git, gh) is a blocking subprocess
//! that must be bounded by a timeout. The runner spawns the child with piped
//! output, drains stdout/stderr on background threads (so a chatty child can
//! never deadlock on a full pipe), and polls for exit until the deadline.
//! On expiry the child is killed and reaped.

use std::io::Read;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use thiserror::Error;

/// How often to poll the child for exit while waiting.
const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Captured output of a finished subprocess.
#[derive(Debug)]
pub struct ProcOutput {
    /// Stdout, lossily decoded.
    pub stdout: String,
    /// Stderr, lossily decoded and trimmed.
    pub stderr: String,
    /// The exit code, if the process exited normally.
    pub exit_code: Option<i32>,
    /// Whether the process exited with status zero.
    pub success: bool,
}

/// Errors from the subprocess runner itself (not from the child's exit
/// status — a non-zero exit is reported through [`ProcOutput`]).
#[derive(Debug, Error)]
pub enum ProcError {
    /// The child did not finish before the deadline and was killed.
    #[error("`{command}` timed out after {timeout:?}")]
    Timeout {
        /// The command line that was killed.
        command: String,
        /// The deadline that was exceeded.
        timeout: Duration,
    },

    /// Spawning or reaping the child failed.
    #[error("failed to run `{command}`: {source}")]
    Io {
        /// The command line that could not be run.
        command: String,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

/// Render a program + args as a single human-readable command line.
#[must_use]
pub fn render_command(program: &str, args: &[&str]) -> String {
    let mut line = String::from(program);
    for arg in args {
        line.push(' ');
        line.push_str(arg);
    }
    line
}

/// Run `program` with `args`, capturing output, killing the child if it
/// exceeds `timeout`.
///
/// # Errors
/// Returns [`ProcError::Timeout`] if the deadline expires, or
/// [`ProcError::Io`] if the child cannot be spawned or reaped. A non-zero
/// exit status is **not** an error here; inspect [`ProcOutput::success`].
pub fn run(
    program: &str,
    args: &[&str],
    cwd: Option<&Path>,
    timeout: Duration,
) -> Result<ProcOutput, ProcError> {
    let command = render_command(program, args);
    tracing::debug!(%command, cwd = ?cwd, "running subprocess");

    let mut cmd = Command::new(program);
    cmd.args(args)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    if let Some(dir) = cwd {
        cmd.current_dir(dir);
    }

    let mut child = cmd.spawn().map_err(|source| ProcError::Io {
        command: command.clone(),
        source,
    })?;

    let stdout_reader = drain(child.stdout.take());
    let stderr_reader = drain(child.stderr.take());

    let status = wait_with_deadline(&mut child, &command, timeout)?;

    let stdout = stdout_reader.join().unwrap_or_default();
    let stderr = stderr_reader.join().unwrap_or_default();

    Ok(ProcOutput {
        stdout,
        stderr: stderr.trim().to_owned(),
        exit_code: status.code(),
        success: status.success(),
    })
}

fn wait_with_deadline(
    child: &mut Child,
    command: &str,
    timeout: Duration,
) -> Result<std::process::ExitStatus, ProcError> {
    let deadline = Instant::now() + timeout;
    loop {
        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {
                if Instant::now() >= deadline {
                    // Past the deadline: kill and reap. A kill race with
                    // normal exit is fine; the reap below settles it.
                    let _ = child.kill();
                    let _ = child.wait();
                    return Err(ProcError::Timeout {
                        command: command.to_owned(),
                        timeout,
                    });
                }
                thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                return Err(ProcError::Io {
                    command: command.to_owned(),
                    source,
                });
            }
        }
    }
}

fn drain<R: Read + Send + 'static>(pipe: Option<R>) -> thread::JoinHandle<String> {
    thread::spawn(move || {
        let mut buf = Vec::new();
        if let Some(mut pipe) = pipe {
            let _ = pipe.read_to_end(&mut buf);
        }
        String::from_utf8_lossy(&buf).into_owned()
    })
}
