use serde::Deserialize;
use std::io::Read;
use std::path::Path;
use std::process::{Command, Output, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crate::video::engine::EngineError;

const POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    format: Option<ProbeFormat>,
}

#[derive(Debug, Deserialize)]
struct ProbeFormat {
    duration: Option<String>,
}

/// Makes sure `program` can be executed at all.
pub fn check_available(program: &Path) -> Result<(), EngineError> {
    let status = Command::new(program)
        .arg("-version")
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map_err(|e| EngineError::Spawn {
            program: program.display().to_string(),
            source: e,
        })?;

    if status.success() {
        Ok(())
    } else {
        Err(EngineError::Unavailable {
            program: program.display().to_string(),
            reason: format!("-version exited with {}", status),
        })
    }
}

/// Runs `command` to completion and collects its output.
///
/// The child is killed once `timeout` passes or `cancel` is set, so a stalled
/// network source cannot hold the caller forever.
pub fn run_bounded(command: &mut Command, timeout: Duration, cancel: &AtomicBool) -> Result<Output, EngineError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| EngineError::Spawn {
            program: program.clone(),
            source: e,
        })?;

    // Both pipes drain on their own threads; a full pipe would stall the child
    let stdout = child.stdout.take().map(|pipe| thread::spawn(move || read_all(pipe)));
    let stderr = child.stderr.take().map(|pipe| thread::spawn(move || read_all(pipe)));

    let deadline = Instant::now() + timeout;
    let outcome = loop {
        match child.try_wait() {
            Ok(Some(status)) => break Ok(status),
            Ok(None) if cancel.load(Ordering::SeqCst) => break Err(EngineError::Shutdown),
            Ok(None) if Instant::now() >= deadline => {
                break Err(EngineError::TimedOut {
                    program: program.clone(),
                    timeout,
                })
            }
            Ok(None) => thread::sleep(POLL_INTERVAL),
            Err(e) => {
                break Err(EngineError::Unavailable {
                    program: program.clone(),
                    reason: e.to_string(),
                })
            }
        }
    };

    if outcome.is_err() {
        log::debug!("Killing {} (pid {})", program, child.id());
        let _ = child.kill();
        let _ = child.wait();
    }

    let stdout = join_pipe(stdout);
    let stderr = join_pipe(stderr);
    outcome.map(|status| Output { status, stdout, stderr })
}

fn read_all<R: Read>(mut pipe: R) -> Vec<u8> {
    let mut buffer = Vec::new();
    let _ = pipe.read_to_end(&mut buffer);
    buffer
}

fn join_pipe(handle: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    handle.and_then(|handle| handle.join().ok()).unwrap_or_default()
}

/// Asks ffprobe for the container duration of `source`, in seconds.
///
/// `Ok(None)` means ffprobe opened the source but it has no known length,
/// as with live or still-growing streams.
pub fn probe_duration(
    ffprobe: &Path,
    source: &str,
    timeout: Duration,
    cancel: &AtomicBool,
) -> Result<Option<f64>, EngineError> {
    let mut command = Command::new(ffprobe);
    command
        .args(["-v", "quiet", "-print_format", "json", "-show_format"])
        .arg(source);
    let output = run_bounded(&mut command, timeout, cancel)?;

    if !output.status.success() {
        return Err(EngineError::Probe {
            source_url: source.to_string(),
            reason: format!("ffprobe exited with {}", output.status),
        });
    }

    let probe: ProbeOutput = serde_json::from_slice(&output.stdout).map_err(|e| EngineError::Probe {
        source_url: source.to_string(),
        reason: format!("unreadable ffprobe output: {}", e),
    })?;
    Ok(probe.format.and_then(|format| parse_duration(format.duration.as_deref())))
}

fn parse_duration(duration: Option<&str>) -> Option<f64> {
    let duration = duration?.trim().parse::<f64>().ok()?;
    (duration.is_finite() && duration >= 0.0).then_some(duration)
}
