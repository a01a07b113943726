use crate::config::ValidatorCommand;
use std::fmt;
use std::io::{self, Read, Write};
use std::process::{Child, ChildStderr, ChildStdin, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Exit code a validator uses to deny a command (Claude Code hook protocol)
pub const DENY_EXIT_CODE: i32 = 2;

/// Reason used when a validator denies without writing anything to stderr
pub const DEFAULT_DENY_REASON: &str = "Blocked by git safety hook";

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// How long to keep reading pipes after the validator exits. Output it wrote
/// before exiting is already buffered; only inherited handles outlive this.
const DRAIN_GRACE: Duration = Duration::from_millis(250);

/// Outcome of one validator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Allowed,
    /// Validator exited with the deny code; carries the reason to show the agent
    Denied(String),
    /// Validator could not give an answer
    ValidatorError(ValidatorFailure),
}

/// Ways a validator run can fail without producing a verdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidatorFailure {
    /// The process could not be started
    Spawn(String),
    /// Talking to the process failed
    Io(String),
    /// Exited with a code other than 0 or the deny code
    Exited { code: i32, stderr: String },
    /// Terminated by a signal
    Signaled { stderr: String },
    /// Did not finish in time and was killed
    TimedOut { after: Duration },
}

impl fmt::Display for ValidatorFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ValidatorFailure::Spawn(e) => write!(f, "failed to run validator: {}", e),
            ValidatorFailure::Io(e) => write!(f, "validator I/O error: {}", e),
            ValidatorFailure::Exited { stderr, .. } | ValidatorFailure::Signaled { stderr }
                if !stderr.is_empty() =>
            {
                f.write_str(stderr)
            }
            ValidatorFailure::Exited { code, .. } => {
                write!(f, "validator exited with status {}", code)
            }
            ValidatorFailure::Signaled { .. } => f.write_str("validator was killed by a signal"),
            ValidatorFailure::TimedOut { after } => {
                write!(f, "validator timed out after {}ms", after.as_millis())
            }
        }
    }
}

/// An external validator process, invoked once per command
#[derive(Debug, Clone)]
pub struct Validator {
    command: ValidatorCommand,
    timeout: Option<Duration>,
}

impl Validator {
    pub fn new(command: ValidatorCommand, timeout: Option<Duration>) -> Self {
        Self { command, timeout }
    }

    /// Run the validator with `input` on stdin and classify how it exits.
    /// Stdout is discarded; stderr is captured for the deny reason.
    pub fn run(&self, input: &str) -> Verdict {
        let spawned = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn();

        let mut child = match spawned {
            Ok(child) => child,
            Err(e) => {
                warn!(program = %self.command.program, error = %e, "failed to spawn validator");
                return Verdict::ValidatorError(ValidatorFailure::Spawn(format!(
                    "{}: {}",
                    self.command.program, e
                )));
            }
        };
        debug!(pid = child.id(), program = %self.command.program, "validator spawned");

        // Pipes are serviced on detached threads that report over channels.
        // A grandchild holding a pipe open must not extend the wait.
        let stderr_rx = spawn_stderr_reader(child.stderr.take());
        let stdin_rx = spawn_stdin_writer(child.stdin.take(), input);

        let status = match wait_with_deadline(&mut child, self.timeout) {
            Ok(Some(status)) => status,
            Ok(None) => {
                let after = self.timeout.unwrap_or_default();
                warn!(
                    timeout_ms = u64::try_from(after.as_millis()).unwrap_or(u64::MAX),
                    "validator timed out, killed"
                );
                return Verdict::ValidatorError(ValidatorFailure::TimedOut { after });
            }
            Err(e) => {
                warn!(error = %e, "failed waiting for validator");
                return Verdict::ValidatorError(ValidatorFailure::Io(e.to_string()));
            }
        };

        let drain_until = Instant::now() + DRAIN_GRACE;

        let remaining = drain_until.saturating_duration_since(Instant::now());
        if let Ok(Err(e)) = stdin_rx.recv_timeout(remaining) {
            // A validator may legitimately exit without reading its input
            if e.kind() != io::ErrorKind::BrokenPipe {
                warn!(error = %e, "failed to write validator input");
                return Verdict::ValidatorError(ValidatorFailure::Io(e.to_string()));
            }
        }

        let stderr = collect_stderr(&stderr_rx, drain_until);
        let stderr = String::from_utf8_lossy(&stderr).trim().to_string();

        classify(status, stderr)
    }
}

fn spawn_stderr_reader(pipe: Option<ChildStderr>) -> Receiver<Vec<u8>> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let Some(mut pipe) = pipe else { return };
        let mut chunk = [0u8; 4096];
        loop {
            match pipe.read(&mut chunk) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if tx.send(chunk[..n].to_vec()).is_err() {
                        break;
                    }
                }
            }
        }
    });
    rx
}

fn spawn_stdin_writer(pipe: Option<ChildStdin>, input: &str) -> Receiver<io::Result<()>> {
    let (tx, rx) = mpsc::channel();
    let mut payload = input.as_bytes().to_vec();
    payload.push(b'\n');
    thread::spawn(move || {
        if let Some(mut pipe) = pipe {
            let _ = tx.send(pipe.write_all(&payload));
        }
    });
    rx
}

/// Gather stderr until the pipe closes or `until` passes, whichever is first
fn collect_stderr(rx: &Receiver<Vec<u8>>, until: Instant) -> Vec<u8> {
    let mut buf = Vec::new();
    loop {
        match rx.recv_timeout(until.saturating_duration_since(Instant::now())) {
            Ok(chunk) => buf.extend_from_slice(&chunk),
            Err(RecvTimeoutError::Disconnected) => break,
            Err(RecvTimeoutError::Timeout) => {
                debug!("validator stderr still held open, not waiting for it");
                break;
            }
        }
    }
    buf
}

/// Wait for the child, killing it once the deadline passes.
/// Returns `Ok(None)` on timeout.
fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> io::Result<Option<ExitStatus>> {
    let Some(timeout) = timeout else {
        return child.wait().map(Some);
    };

    let deadline = Instant::now() + timeout;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok(Some(status));
        }
        if Instant::now() >= deadline {
            let _ = child.kill();
            child.wait()?;
            return Ok(None);
        }
        thread::sleep(POLL_INTERVAL);
    }
}

fn classify(status: ExitStatus, stderr: String) -> Verdict {
    match status.code() {
        Some(0) => Verdict::Allowed,
        Some(DENY_EXIT_CODE) if stderr.is_empty() => {
            Verdict::Denied(DEFAULT_DENY_REASON.to_string())
        }
        Some(DENY_EXIT_CODE) => Verdict::Denied(stderr),
        Some(code) => Verdict::ValidatorError(ValidatorFailure::Exited { code, stderr }),
        None => Verdict::ValidatorError(ValidatorFailure::Signaled { stderr }),
    }
}
