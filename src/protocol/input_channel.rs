use std::io::{BufRead, BufReader};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use crate::core::SharedPlaybackState;
use crate::protocol::{decode_line, DecodedCommand};
use crate::video::{CommandDispatcher, PendingCommand};

/// Owns the thread that reads control lines from the external controller.
///
/// The thread blocks in the read. It stops at end of input, on a read error,
/// or when asked to between two lines.
pub struct InputChannel {
    thread_handle: Option<JoinHandle<()>>,
    stop_flag: Arc<AtomicBool>,
    closed: Arc<AtomicBool>,
}

impl InputChannel {
    pub fn stdin(state: SharedPlaybackState, dispatcher: CommandDispatcher) -> anyhow::Result<Self> {
        Self::spawn(BufReader::new(std::io::stdin()), state, dispatcher)
    }

    pub fn spawn<R>(reader: R, state: SharedPlaybackState, dispatcher: CommandDispatcher) -> anyhow::Result<Self>
    where
        R: BufRead + Send + 'static,
    {
        let stop_flag = Arc::new(AtomicBool::new(false));
        let closed = Arc::new(AtomicBool::new(false));

        let thread_stop = stop_flag.clone();
        let thread_closed = closed.clone();
        let thread_handle = thread::Builder::new()
            .name("control-input".to_string())
            .spawn(move || {
                read_lines(reader, &state, &dispatcher, &thread_stop);
                thread_closed.store(true, Ordering::SeqCst);
            })
            .map_err(|e| anyhow::anyhow!("Failed to spawn input thread: {}", e))?;

        Ok(Self {
            thread_handle: Some(thread_handle),
            stop_flag,
            closed,
        })
    }

    /// True once the reader thread has finished.
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Asks the thread to stop and waits briefly for it. A thread parked in a
    /// blocking read is left behind and dies with the process.
    pub fn shutdown(&mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);

        if let Some(handle) = self.thread_handle.take() {
            for _ in 0..5 {
                if handle.is_finished() {
                    let _ = handle.join();
                    return;
                }
                thread::sleep(Duration::from_millis(20));
            }
            log::debug!("Input thread still blocked in read, detaching");
        }
    }
}

impl Drop for InputChannel {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn read_lines<R: BufRead>(
    mut reader: R,
    state: &SharedPlaybackState,
    dispatcher: &CommandDispatcher,
    stop_flag: &AtomicBool,
) {
    log::debug!("Input thread started");
    let mut buffer = Vec::new();
    let mut line_count = 0u64;

    while !stop_flag.load(Ordering::SeqCst) {
        buffer.clear();
        match reader.read_until(b'\n', &mut buffer) {
            Ok(0) => {
                log::info!("Controller closed the input stream after {} lines", line_count);
                return;
            }
            Ok(_) => {
                line_count += 1;
                let line = String::from_utf8_lossy(trim_line_ending(&buffer));
                handle_line(&line, state, dispatcher);
            }
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            Err(e) => {
                log::warn!("Failed to read from controller: {}", e);
                return;
            }
        }
    }

    log::debug!("Input thread stopped");
}

fn trim_line_ending(bytes: &[u8]) -> &[u8] {
    let bytes = bytes.strip_suffix(b"\n").unwrap_or(bytes);
    bytes.strip_suffix(b"\r").unwrap_or(bytes)
}

/// Decodes one line and applies it. `url:` additionally reaches the engine.
pub fn handle_line(line: &str, state: &SharedPlaybackState, dispatcher: &CommandDispatcher) -> DecodedCommand {
    let command = decode_line(line);
    match &command {
        DecodedCommand::LoadUrl(url) => {
            log::info!("Controller requested source: {}", url);
            dispatcher.dispatch(PendingCommand::LoadUrl { url: url.clone() });
        }
        DecodedCommand::Unknown => {
            log::trace!("Ignoring unknown control line: {}", line);
        }
        other => {
            if state.apply(other) {
                log::debug!("Applied control line: {:?}", other);
            }
        }
    }
    command
}
