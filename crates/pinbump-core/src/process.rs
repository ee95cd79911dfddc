//! Bounded subprocess execution with captured output.
//!
//! stdout and stderr are drained on dedicated threads so a chatty child cannot
//! deadlock on a full pipe. With a timeout, the wait happens on a waiter
//! thread and the parent blocks on `recv_timeout`; on expiry the child is
//! killed along with everything it started. On unix the child leads its own
//! process group so the whole group can be signalled.

use crate::error::{PinError, Result};
use std::io::Read;
use std::path::Path;
use std::process::{Command, ExitStatus, Stdio};
use std::time::Duration;

/// Cap on captured stream size, keeping the tail.
const MAX_CAPTURE: usize = 16 * 1024;

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }

    /// stderr when present, otherwise stdout. Used for diagnostics.
    pub fn diagnostics(&self) -> &str {
        if self.stderr.trim().is_empty() {
            self.stdout.trim()
        } else {
            self.stderr.trim()
        }
    }
}

/// Run `argv` in `cwd`, capturing both streams.
///
/// A non-zero exit is returned as `Ok` with the exit code; only failures to
/// spawn, wait, or finish within `timeout` are errors. `None` waits forever.
pub fn run_captured(argv: &[String], cwd: &Path, timeout: Option<Duration>) -> Result<CommandOutput> {
    let (program, args) = argv.split_first().ok_or(PinError::EmptyCommand)?;
    if program.trim().is_empty() {
        return Err(PinError::EmptyCommand);
    }

    tracing::debug!(command = %argv.join(" "), cwd = %cwd.display(), "spawning");

    let mut command = Command::new(program);
    command
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        command.process_group(0);
    }
    let mut child = command
        .spawn()
        .map_err(|e| PinError::SpawnFailed {
            program: program.clone(),
            reason: e.to_string(),
        })?;

    let child_pid = child.id();

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let stdout_thread = std::thread::spawn(move || drain(stdout_handle));
    let stderr_thread = std::thread::spawn(move || drain(stderr_handle));

    let wait_result: std::io::Result<ExitStatus> = match timeout {
        None => child.wait(),
        Some(limit) => {
            let (tx, rx) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let _ = tx.send(child.wait());
            });
            match rx.recv_timeout(limit) {
                Ok(result) => result,
                Err(_) => {
                    // Reader threads see EOF once the killed child's pipes close.
                    kill_process_tree(child_pid);
                    return Err(PinError::CommandTimedOut {
                        program: program.clone(),
                        seconds: limit.as_secs(),
                    });
                }
            }
        }
    };

    let stdout = stdout_thread.join().unwrap_or_default();
    let stderr = stderr_thread.join().unwrap_or_default();

    let status = wait_result.map_err(|e| PinError::SpawnFailed {
        program: program.clone(),
        reason: format!("wait failed: {e}"),
    })?;

    Ok(CommandOutput {
        code: status.code(),
        stdout: cap_tail(stdout),
        stderr: cap_tail(stderr),
    })
}

/// Seconds-to-`Duration`, where `0` means unbounded.
pub fn timeout_from_secs(seconds: u64) -> Option<Duration> {
    (seconds > 0).then(|| Duration::from_secs(seconds))
}

fn drain<R: Read>(handle: Option<R>) -> String {
    let mut buf = Vec::new();
    if let Some(mut r) = handle {
        let _ = r.read_to_end(&mut buf);
    }
    String::from_utf8_lossy(&buf).into_owned()
}

fn cap_tail(s: String) -> String {
    if s.len() <= MAX_CAPTURE {
        return s;
    }
    let mut start = s.len() - MAX_CAPTURE;
    while !s.is_char_boundary(start) {
        start += 1;
    }
    s[start..].to_string()
}

/// Force-kill `pid` and its descendants. On unix `pid` is also the process
/// group id, so the negated id signals the whole group. Best-effort.
fn kill_process_tree(pid: u32) {
    let mut cmd = if cfg!(windows) {
        let mut c = Command::new("taskkill");
        c.args(["/F", "/T", "/PID"]).arg(pid.to_string());
        c
    } else {
        let mut c = Command::new("kill");
        c.args(["-9", "--"]).arg(format!("-{pid}"));
        c
    };
    let _ = cmd
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
}
