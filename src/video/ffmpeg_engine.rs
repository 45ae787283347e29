use std::collections::{HashSet, VecDeque};
use std::io::{BufRead, BufReader, Read};
use std::process::{Child, ChildStderr, ChildStdout, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use crate::core::EngineConfig;
use crate::video::dispatcher::{PendingCommand, SeekMode};
use crate::video::engine::{
    EndFileReason, EngineCallback, EngineError, EngineEvent, LogLevel, MediaEngine, PropertyValue, VideoFrame,
    DURATION_PROPERTY, PLAYBACK_TIME_PROPERTY,
};
use crate::video::probe;

const PAUSE_PROPERTY: &str = "pause";
const LOG_PREFIX: &str = "ffmpeg";

enum ControlMessage {
    Command { reply_id: u64, command: PendingCommand },
    Shutdown,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// State reachable from both the caller and the engine threads.
#[derive(Default)]
struct EngineShared {
    events: Mutex<VecDeque<EngineEvent>>,
    wakeup: Mutex<Option<EngineCallback>>,
    render_update: Mutex<Option<EngineCallback>>,
    observed: Mutex<HashSet<String>>,
    latest_frame: Mutex<Option<Arc<VideoFrame>>>,
    frame_ready: AtomicBool,
    /// Set before the control thread is asked to stop; aborts ffprobe runs
    shutting_down: AtomicBool,
}

impl EngineShared {
    fn push_event(&self, event: EngineEvent) {
        lock(&self.events).push_back(event);
        // Callbacks run with no engine lock held
        let wakeup = lock(&self.wakeup).clone();
        if let Some(wakeup) = wakeup {
            wakeup();
        }
    }

    fn property_changed(&self, name: &str, value: PropertyValue) {
        if lock(&self.observed).contains(name) {
            self.push_event(EngineEvent::PropertyChange {
                name: name.to_string(),
                value,
            });
        }
    }

    fn log_message(&self, level: LogLevel, text: impl Into<String>) {
        self.push_event(EngineEvent::LogMessage {
            level,
            prefix: LOG_PREFIX.to_string(),
            text: text.into(),
        });
    }

    fn publish_frame(&self, frame: VideoFrame) {
        *lock(&self.latest_frame) = Some(Arc::new(frame));
        self.frame_ready.store(true, Ordering::Release);
        let render_update = lock(&self.render_update).clone();
        if let Some(render_update) = render_update {
            render_update();
        }
    }
}

/// Output geometry of the decode pipeline.
#[derive(Debug, Clone, Copy, PartialEq)]
struct FrameLayout {
    width: u32,
    height: u32,
    frame_rate: f64,
}

impl FrameLayout {
    fn from_config(config: &EngineConfig) -> Self {
        Self {
            width: config.frame_width.max(16),
            height: config.frame_height.max(16),
            frame_rate: config.max_frame_rate.clamp(1.0, 120.0),
        }
    }

    fn frame_size(&self) -> usize {
        self.width as usize * self.height as usize * 4
    }

    /// Scales into the layout keeping the aspect ratio, padding the rest.
    fn filter(&self) -> String {
        format!(
            "scale={w}:{h}:force_original_aspect_ratio=decrease,pad={w}:{h}:(ow-iw)/2:(oh-ih)/2",
            w = self.width,
            h = self.height
        )
    }
}

fn decode_args(source: &str, start: f64, layout: &FrameLayout) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        // Tag every stderr line with its level so it can be classified
        "-loglevel".into(),
        "level+warning".into(),
        "-nostdin".into(),
        "-ss".into(),
        format!("{:.3}", start),
        // Read the input at its native rate
        "-re".into(),
        "-i".into(),
        source.into(),
        "-map".into(),
        "0:v:0".into(),
        "-an".into(),
        "-sn".into(),
        "-vf".into(),
        layout.filter(),
        "-r".into(),
        format!("{:.3}", layout.frame_rate),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "pipe:1".into(),
    ]
}

fn still_args(source: &str, timestamp: f64, layout: &FrameLayout) -> Vec<String> {
    vec![
        "-hide_banner".into(),
        "-loglevel".into(),
        "error".into(),
        "-nostdin".into(),
        "-ss".into(),
        format!("{:.3}", timestamp),
        "-i".into(),
        source.into(),
        "-frames:v".into(),
        "1".into(),
        "-vf".into(),
        layout.filter(),
        "-f".into(),
        "rawvideo".into(),
        "-pix_fmt".into(),
        "rgba".into(),
        "pipe:1".into(),
    ]
}

/// Splits the `[level]` tag off an ffmpeg stderr line.
fn classify_log_line(line: &str) -> (LogLevel, String) {
    const TAGS: [(&str, LogLevel); 7] = [
        ("[fatal] ", LogLevel::Error),
        ("[error] ", LogLevel::Error),
        ("[warning] ", LogLevel::Warn),
        ("[info] ", LogLevel::Info),
        ("[verbose] ", LogLevel::Debug),
        ("[debug] ", LogLevel::Debug),
        ("[trace] ", LogLevel::Debug),
    ];

    for (tag, level) in TAGS {
        if let Some(index) = line.find(tag) {
            return (level, format!("{}{}", &line[..index], &line[index + tag.len()..]));
        }
    }
    // Untagged output only shows up when something went wrong early
    (LogLevel::Error, line.to_string())
}

/// Where a seek lands, kept inside the media when its length is known.
fn seek_target(current: f64, duration: f64, value: f64, mode: SeekMode) -> f64 {
    let target = match mode {
        SeekMode::Relative => current + value,
        SeekMode::Absolute => value,
    };
    let target = if target.is_finite() { target.max(0.0) } else { current };
    if duration > 0.0 {
        target.min(duration)
    } else {
        target
    }
}

/// A running ffmpeg decode process and its reader threads.
struct Pipeline {
    child: Child,
    stop_flag: Arc<AtomicBool>,
    finished: Arc<AtomicBool>,
    readers: Vec<JoinHandle<()>>,
}

impl Pipeline {
    fn stop(mut self) {
        self.stop_flag.store(true, Ordering::SeqCst);
        log::debug!("Stopping ffmpeg pipeline");
        let _ = self.child.kill();
        let _ = self.child.wait();
        for reader in self.readers.drain(..) {
            let _ = reader.join();
        }
    }

    /// Collects a pipeline whose output ran dry and says why it ended.
    fn finish(mut self) -> EndFileReason {
        // stdout is closed, so the process is exiting; give it a moment
        let mut status = None;
        for _ in 0..10 {
            match self.child.try_wait() {
                Ok(Some(exit)) => {
                    status = Some(exit);
                    break;
                }
                Ok(None) => thread::sleep(Duration::from_millis(20)),
                Err(e) => {
                    log::debug!("Failed to query ffmpeg exit status: {}", e);
                    break;
                }
            }
        }
        self.stop();

        match status {
            Some(exit) if !exit.success() => EndFileReason::Error(format!("ffmpeg exited with {}", exit)),
            _ => EndFileReason::Eof,
        }
    }
}

/// Playback position bookkeeping, owned by the control thread.
struct Playback {
    config: EngineConfig,
    layout: FrameLayout,
    source: Option<String>,
    /// 0 when the length is unknown
    duration: f64,
    position: f64,
    paused: bool,
    started_at: Option<Instant>,
    started_from: f64,
    pipeline: Option<Pipeline>,
    reported_seconds: Option<i64>,
}

impl Playback {
    fn new(config: EngineConfig) -> Self {
        Self {
            layout: FrameLayout::from_config(&config),
            config,
            source: None,
            duration: 0.0,
            position: 0.0,
            paused: false,
            started_at: None,
            started_from: 0.0,
            pipeline: None,
            reported_seconds: None,
        }
    }

    fn current_position(&self) -> f64 {
        match self.started_at {
            Some(started_at) => {
                let position = self.started_from + started_at.elapsed().as_secs_f64();
                if self.duration > 0.0 {
                    position.min(self.duration)
                } else {
                    position
                }
            }
            None => self.position,
        }
    }

    fn handle(&mut self, command: PendingCommand, shared: &Arc<EngineShared>) -> Result<(), EngineError> {
        match command {
            PendingCommand::LoadUrl { url } => self.load(url, shared),
            PendingCommand::Seek { value, mode } => self.seek(value, mode, shared),
            PendingCommand::PlayPause => self.toggle_pause(shared),
        }
    }

    /// Drops the current source and reports zeroed timing.
    fn unload(&mut self, shared: &Arc<EngineShared>) {
        self.stop_pipeline();
        if self.source.take().is_some() {
            shared.push_event(EngineEvent::EndFile(EndFileReason::Stop));
        }

        self.duration = 0.0;
        self.position = 0.0;
        self.reported_seconds = Some(0);
        shared.property_changed(DURATION_PROPERTY, PropertyValue::Int(0));
        shared.property_changed(PLAYBACK_TIME_PROPERTY, PropertyValue::Int(0));
    }

    fn load(&mut self, url: String, shared: &Arc<EngineShared>) -> Result<(), EngineError> {
        self.unload(shared);
        shared.push_event(EngineEvent::StartFile);

        let probed = probe::probe_duration(
            &self.config.ffprobe_program(),
            &url,
            self.config.probe_timeout(),
            &shared.shutting_down,
        );
        let duration = match probed {
            Ok(duration) => duration,
            Err(e) => {
                shared.push_event(EngineEvent::EndFile(EndFileReason::Error(e.to_string())));
                return Err(e);
            }
        };

        match duration {
            Some(duration) => {
                log::info!("Loaded {} ({:.2}s)", url, duration);
                self.duration = duration;
                shared.property_changed(DURATION_PROPERTY, PropertyValue::Double(duration));
            }
            None => {
                log::info!("Loaded {} (unknown length, playing as a stream)", url);
                shared.property_changed(DURATION_PROPERTY, PropertyValue::None);
            }
        }

        self.source = Some(url);
        shared.push_event(EngineEvent::FileLoaded);
        self.resume_or_preview(shared)
    }

    fn seek(&mut self, value: f64, mode: SeekMode, shared: &Arc<EngineShared>) -> Result<(), EngineError> {
        if self.source.is_none() {
            return Err(EngineError::NothingLoaded);
        }
        let target = seek_target(self.current_position(), self.duration, value, mode);
        log::debug!("Seeking to {:.3}s", target);

        // ffmpeg cannot seek a running pipe; restart it at the target
        self.stop_pipeline();
        self.position = target;
        shared.push_event(EngineEvent::Seek);
        self.report_position(shared, target);
        self.resume_or_preview(shared)?;
        shared.push_event(EngineEvent::PlaybackRestart);
        Ok(())
    }

    fn toggle_pause(&mut self, shared: &Arc<EngineShared>) -> Result<(), EngineError> {
        self.paused = !self.paused;
        shared.property_changed(PAUSE_PROPERTY, PropertyValue::Flag(self.paused));
        if self.source.is_none() {
            return Ok(());
        }

        if self.paused {
            self.stop_pipeline();
            Ok(())
        } else {
            if self.duration > 0.0 && self.position >= self.duration {
                self.position = 0.0;
            }
            self.start_pipeline(shared)
        }
    }

    fn resume_or_preview(&mut self, shared: &Arc<EngineShared>) -> Result<(), EngineError> {
        if !self.paused {
            return self.start_pipeline(shared);
        }
        let Some(source) = &self.source else {
            return Ok(());
        };

        // Paused: show the frame at the new position without starting playback
        match extract_still(&self.config, &self.layout, source, self.position, &shared.shutting_down) {
            Ok(frame) => shared.publish_frame(frame),
            Err(reason) => shared.log_message(LogLevel::Warn, format!("Still frame unavailable: {}", reason)),
        }
        Ok(())
    }

    fn start_pipeline(&mut self, shared: &Arc<EngineShared>) -> Result<(), EngineError> {
        let Some(source) = &self.source else {
            return Err(EngineError::NothingLoaded);
        };
        let program = self.config.ffmpeg_program();
        let mut child = Command::new(&program)
            .args(decode_args(source, self.position, &self.layout))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| EngineError::Spawn {
                program: program.display().to_string(),
                source: e,
            })?;

        let stop_flag = Arc::new(AtomicBool::new(false));
        let finished = Arc::new(AtomicBool::new(false));
        let started_at = Instant::now();
        let mut readers = Vec::new();

        if let Some(stdout) = child.stdout.take() {
            let shared = shared.clone();
            let stop_flag = stop_flag.clone();
            let finished = finished.clone();
            let layout = self.layout;
            let start_position = self.position;
            readers.push(thread::spawn(move || {
                video_reader_thread(stdout, &shared, &stop_flag, layout, start_position, started_at);
                finished.store(true, Ordering::SeqCst);
            }));
        }
        if let Some(stderr) = child.stderr.take() {
            let shared = shared.clone();
            readers.push(thread::spawn(move || stderr_reader_thread(stderr, &shared)));
        }

        log::debug!("ffmpeg pipeline started at {:.3}s (pid {})", self.position, child.id());
        self.started_at = Some(started_at);
        self.started_from = self.position;
        self.pipeline = Some(Pipeline {
            child,
            stop_flag,
            finished,
            readers,
        });
        Ok(())
    }

    fn stop_pipeline(&mut self) {
        self.position = self.current_position();
        self.started_at = None;
        if let Some(pipeline) = self.pipeline.take() {
            pipeline.stop();
        }
    }

    fn tick(&mut self, shared: &Arc<EngineShared>) {
        if self.started_at.is_none() {
            return;
        }
        let position = self.current_position();
        let drained = self
            .pipeline
            .as_ref()
            .map_or(true, |pipeline| pipeline.finished.load(Ordering::SeqCst));
        let reached_end = self.duration > 0.0 && position >= self.duration;

        if !(reached_end || drained) {
            self.report_position(shared, position);
            return;
        }

        let reason = if drained {
            // Output ran dry before the clock did; the exit status tells why
            self.position = position;
            self.started_at = None;
            self.pipeline.take().map_or(EndFileReason::Eof, Pipeline::finish)
        } else {
            self.stop_pipeline();
            EndFileReason::Eof
        };

        self.report_position(shared, self.position);
        self.paused = true;
        shared.property_changed(PAUSE_PROPERTY, PropertyValue::Flag(true));
        match &reason {
            EndFileReason::Error(e) => log::warn!("Playback stopped at {:.2}s: {}", self.position, e),
            _ => log::info!("Playback reached the end at {:.2}s", self.position),
        }
        shared.push_event(EngineEvent::EndFile(reason));
    }

    /// Emits the playback time whenever the whole second changes.
    fn report_position(&mut self, shared: &EngineShared, seconds: f64) {
        let whole = seconds.trunc() as i64;
        if self.reported_seconds != Some(whole) {
            self.reported_seconds = Some(whole);
            shared.property_changed(PLAYBACK_TIME_PROPERTY, PropertyValue::Double(seconds));
        }
    }
}

fn extract_still(
    config: &EngineConfig,
    layout: &FrameLayout,
    source: &str,
    timestamp: f64,
    cancel: &AtomicBool,
) -> Result<VideoFrame, String> {
    let mut command = Command::new(config.ffmpeg_program());
    command.args(still_args(source, timestamp, layout));
    let output = probe::run_bounded(&mut command, config.probe_timeout(), cancel).map_err(|e| e.to_string())?;

    if !output.status.success() {
        return Err(String::from_utf8_lossy(&output.stderr).trim().to_string());
    }
    if output.stdout.len() != layout.frame_size() {
        return Err(format!(
            "unexpected frame size: {} (expected {})",
            output.stdout.len(),
            layout.frame_size()
        ));
    }

    Ok(VideoFrame {
        pixels: output.stdout,
        width: layout.width,
        height: layout.height,
        timestamp,
    })
}

fn video_reader_thread(
    mut stdout: ChildStdout,
    shared: &EngineShared,
    stop_flag: &AtomicBool,
    layout: FrameLayout,
    start_position: f64,
    started_at: Instant,
) {
    let frame_duration = 1.0 / layout.frame_rate;
    let mut frame_index = 0u64;
    let mut buffer = vec![0u8; layout.frame_size()];

    log::debug!("Video reader started (fps: {:.2})", layout.frame_rate);

    while !stop_flag.load(Ordering::Relaxed) {
        match stdout.read_exact(&mut buffer) {
            Ok(()) => {
                // Hold each frame until its presentation time
                let offset = frame_index as f64 * frame_duration;
                let due = started_at + Duration::from_secs_f64(offset);
                let now = Instant::now();
                if due > now {
                    thread::sleep(due - now);
                }
                if stop_flag.load(Ordering::Relaxed) {
                    break;
                }

                shared.publish_frame(VideoFrame {
                    pixels: buffer.clone(),
                    width: layout.width,
                    height: layout.height,
                    timestamp: start_position + offset,
                });
                frame_index += 1;
            }
            Err(e) => {
                if e.kind() != std::io::ErrorKind::UnexpectedEof {
                    log::debug!("Video reader error: {}", e);
                }
                break;
            }
        }
    }

    log::debug!("Video reader stopped (read {} frames)", frame_index);
}

fn stderr_reader_thread(stderr: ChildStderr, shared: &EngineShared) {
    for line in BufReader::new(stderr).lines() {
        match line {
            Ok(line) if line.trim().is_empty() => {}
            Ok(line) => {
                let (level, text) = classify_log_line(&line);
                shared.log_message(level, text);
            }
            Err(_) => break,
        }
    }
}

fn control_thread(receiver: mpsc::Receiver<ControlMessage>, shared: Arc<EngineShared>, config: EngineConfig) {
    let mut playback = Playback::new(config);

    loop {
        // Tick faster while a pipeline runs so position updates stay close
        let timeout = if playback.started_at.is_some() {
            Duration::from_millis(50)
        } else {
            Duration::from_millis(250)
        };

        match receiver.recv_timeout(timeout) {
            Ok(ControlMessage::Command { reply_id, command }) => {
                let result = playback.handle(command, &shared);
                if let Err(e) = &result {
                    log::debug!("Command #{} failed: {}", reply_id, e);
                }
                shared.push_event(EngineEvent::CommandReply {
                    reply_id,
                    error: result.err().map(|e| e.to_string()),
                });
            }
            Ok(ControlMessage::Shutdown) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => playback.tick(&shared),
        }
    }

    playback.stop_pipeline();
    shared.push_event(EngineEvent::Shutdown);
    log::info!("Engine control thread exited");
}

/// [`MediaEngine`] backed by ffmpeg and ffprobe subprocesses.
///
/// Commands are executed in order on a dedicated control thread. Decoded
/// frames are paced to real time by a reader thread and published as the
/// latest frame.
pub struct FfmpegEngine {
    shared: Arc<EngineShared>,
    command_sender: mpsc::Sender<ControlMessage>,
    thread_handle: Mutex<Option<JoinHandle<()>>>,
}

impl FfmpegEngine {
    pub fn new(config: EngineConfig) -> Result<Self, EngineError> {
        probe::check_available(&config.ffmpeg_program())?;
        probe::check_available(&config.ffprobe_program())?;

        let shared = Arc::new(EngineShared::default());
        let (command_sender, receiver) = mpsc::channel();

        let thread_shared = shared.clone();
        let thread_handle = thread::Builder::new()
            .name("engine-control".to_string())
            .spawn(move || control_thread(receiver, thread_shared, config))
            .map_err(|e| EngineError::Spawn {
                program: "engine control thread".to_string(),
                source: e,
            })?;

        Ok(Self {
            shared,
            command_sender,
            thread_handle: Mutex::new(Some(thread_handle)),
        })
    }

    fn is_running(&self) -> bool {
        lock(&self.thread_handle)
            .as_ref()
            .is_some_and(|handle| !handle.is_finished())
    }
}

impl MediaEngine for FfmpegEngine {
    fn set_wakeup_callback(&self, callback: EngineCallback) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::CallbackRegistration("wakeup"));
        }
        *lock(&self.shared.wakeup) = Some(callback);
        Ok(())
    }

    fn set_render_update_callback(&self, callback: EngineCallback) -> Result<(), EngineError> {
        if !self.is_running() {
            return Err(EngineError::CallbackRegistration("render update"));
        }
        *lock(&self.shared.render_update) = Some(callback);
        Ok(())
    }

    fn observe_property(&self, name: &str) -> Result<(), EngineError> {
        lock(&self.shared.observed).insert(name.to_string());
        Ok(())
    }

    fn poll_event(&self) -> Option<EngineEvent> {
        lock(&self.shared.events).pop_front()
    }

    fn render_update(&self) -> bool {
        self.shared.frame_ready.swap(false, Ordering::AcqRel)
    }

    fn render(&self) -> Option<Arc<VideoFrame>> {
        lock(&self.shared.latest_frame).clone()
    }

    fn command_async(&self, reply_id: u64, command: &PendingCommand) -> Result<(), EngineError> {
        self.command_sender
            .send(ControlMessage::Command {
                reply_id,
                command: command.clone(),
            })
            .map_err(|_| EngineError::Shutdown)
    }

    fn shutdown(&self) {
        // Kills a running ffprobe so the control thread sees the message
        self.shared.shutting_down.store(true, Ordering::SeqCst);
        let _ = self.command_sender.send(ControlMessage::Shutdown);

        if let Some(handle) = lock(&self.thread_handle).take() {
            for _ in 0..10 {
                if handle.is_finished() {
                    let _ = handle.join();
                    return;
                }
                thread::sleep(Duration::from_millis(100));
            }
            log::warn!("Engine control thread did not shut down cleanly");
        }
    }
}

impl Drop for FfmpegEngine {
    fn drop(&mut self) {
        log::debug!("FfmpegEngine dropping");
        self.shutdown();
    }
}
