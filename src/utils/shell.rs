//! Subprocess discipline for hardware probes.
//!
//! Every probe command goes through [`CommandRunner`] so tests can stub the
//! host system. The system runner spawns tools directly (no shell, so no
//! profile scripts or banners get a chance to run) with a bounded timeout.
//! The token parsers pull the first well-formed numeric or JSON token out of
//! output that may still carry vendor banners or units.

use std::fmt;
use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use once_cell::sync::Lazy;
use regex::Regex;

/// Default per-command timeout for hardware probes.
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// A probe command that failed to run or produced unusable output.
#[derive(Debug, Clone)]
pub struct ShellError {
    pub command: String,
    pub cause: String,
}

impl fmt::Display for ShellError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "`{}`: {}", self.command, self.cause)
    }
}

impl std::error::Error for ShellError {}

fn render_command(program: &str, args: &[&str]) -> String {
    if args.is_empty() {
        program.to_string()
    } else {
        format!("{} {}", program, args.join(" "))
    }
}

/// Runs a probe command and returns its stdout.
pub trait CommandRunner: Send + Sync {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<String, ShellError>;
}

/// [`CommandRunner`] backed by the host system.
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run(&self, program: &str, args: &[&str], timeout: Duration) -> Result<String, ShellError> {
        let command = render_command(program, args);

        let mut child = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| ShellError {
                command: command.clone(),
                cause: e.to_string(),
            })?;

        // Drain stdout on a separate thread so a chatty tool cannot block on
        // a full pipe before we observe its exit.
        let stdout = child.stdout.take();
        let reader = std::thread::spawn(move || {
            let mut buf = String::new();
            if let Some(mut pipe) = stdout {
                let _ = pipe.read_to_string(&mut buf);
            }
            buf
        });

        let deadline = Instant::now() + timeout;
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if Instant::now() >= deadline {
                        let _ = child.kill();
                        let _ = child.wait();
                        let _ = reader.join();
                        return Err(ShellError {
                            command,
                            cause: format!("timed out after {:.0?}", timeout),
                        });
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(e) => {
                    let _ = reader.join();
                    return Err(ShellError {
                        command,
                        cause: e.to_string(),
                    });
                }
            }
        };

        let output = reader.join().unwrap_or_default();
        if !status.success() {
            return Err(ShellError {
                command,
                cause: format!("exited with {} ({})", status, payload_head(&output)),
            });
        }
        Ok(output)
    }
}

static NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"-?\d+(?:\.\d+)?").unwrap());

/// First numeric token in `payload`, ignoring banners and units.
pub fn first_number(payload: &str) -> Option<f64> {
    NUMBER.find(payload).and_then(|m| m.as_str().parse().ok())
}

/// First JSON value embedded in `payload`, ignoring leading banner text.
pub fn first_json(payload: &str) -> Option<serde_json::Value> {
    let start = payload.find(|c| c == '{' || c == '[')?;
    serde_json::Deserializer::from_str(&payload[start..])
        .into_iter::<serde_json::Value>()
        .next()
        .and_then(Result::ok)
}

/// Split one line of `--format=csv,noheader` output into trimmed fields.
pub fn csv_fields(line: &str) -> Vec<String> {
    line.split(',').map(|f| f.trim().to_string()).collect()
}

/// Head of a payload for error messages, bounded so errors stay readable.
pub fn payload_head(payload: &str) -> String {
    const HEAD: usize = 80;
    let trimmed = payload.trim();
    if trimmed.len() <= HEAD {
        trimmed.to_string()
    } else {
        let mut end = HEAD;
        while !trimmed.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &trimmed[..end])
    }
}

/// Run a command and extract the first numeric token, or fail with an error
/// naming the command and the payload head.
pub fn run_number(
    runner: &dyn CommandRunner,
    program: &str,
    args: &[&str],
) -> Result<f64, ShellError> {
    let output = runner.run(program, args, PROBE_TIMEOUT)?;
    first_number(&output).ok_or_else(|| ShellError {
        command: render_command(program, args),
        cause: format!("no numeric token in output: {:?}", payload_head(&output)),
    })
}
