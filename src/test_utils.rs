//! Shared fakes for unit tests.

use std::collections::VecDeque;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use crate::video::dispatcher::PendingCommand;
use crate::video::engine::{EngineCallback, EngineError, EngineEvent, MediaEngine, VideoFrame};

/// `Write` sink whose contents stay readable after being boxed away.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    bytes: Arc<Mutex<Vec<u8>>>,
}

impl SharedBuffer {
    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.bytes.lock().unwrap()).into_owned()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.bytes.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

/// Writes an executable shell script standing in for an external tool.
#[cfg(unix)]
pub fn stub_program(name: &str, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let dir = std::env::temp_dir().join(format!("syncwatch-stub-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// Engine stand-in that records commands and replays scripted events.
#[derive(Default)]
pub struct RecordingEngine {
    commands: Mutex<Vec<(u64, PendingCommand)>>,
    events: Mutex<VecDeque<EngineEvent>>,
    observed: Mutex<Vec<String>>,
    wakeup: Mutex<Option<EngineCallback>>,
    render_update: Mutex<Option<EngineCallback>>,
    frame: Mutex<Option<Arc<VideoFrame>>>,
    frame_ready: AtomicBool,
    shut_down: AtomicBool,
    render_update_calls: AtomicUsize,
    reject_commands: AtomicBool,
    fail_registration: AtomicBool,
}

impl RecordingEngine {
    pub fn commands(&self) -> Vec<PendingCommand> {
        self.commands.lock().unwrap().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn reply_ids(&self) -> Vec<u64> {
        self.commands.lock().unwrap().iter().map(|(id, _)| *id).collect()
    }

    pub fn observed(&self) -> Vec<String> {
        self.observed.lock().unwrap().clone()
    }

    pub fn queue_event(&self, event: EngineEvent) {
        self.events.lock().unwrap().push_back(event);
    }

    pub fn pending_events(&self) -> usize {
        self.events.lock().unwrap().len()
    }

    pub fn set_frame_ready(&self, ready: bool) {
        self.frame_ready.store(ready, Ordering::SeqCst);
    }

    /// Publishes `frame` and marks it ready, without firing the callback.
    pub fn set_frame(&self, frame: VideoFrame) {
        *self.frame.lock().unwrap() = Some(Arc::new(frame));
        self.set_frame_ready(true);
    }

    pub fn is_shut_down(&self) -> bool {
        self.shut_down.load(Ordering::SeqCst)
    }

    pub fn render_update_calls(&self) -> usize {
        self.render_update_calls.load(Ordering::SeqCst)
    }

    pub fn reject_commands(&self, reject: bool) {
        self.reject_commands.store(reject, Ordering::SeqCst);
    }

    pub fn fail_registration(&self, fail: bool) {
        self.fail_registration.store(fail, Ordering::SeqCst);
    }

    /// Invokes the registered "events pending" callback, as an engine thread would.
    pub fn fire_wakeup(&self) {
        let callback = self.wakeup.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback();
        }
    }

    pub fn fire_render_update(&self) {
        let callback = self.render_update.lock().unwrap().clone();
        if let Some(callback) = callback {
            callback();
        }
    }
}

impl MediaEngine for RecordingEngine {
    fn set_wakeup_callback(&self, callback: EngineCallback) -> Result<(), EngineError> {
        if self.fail_registration.load(Ordering::SeqCst) {
            return Err(EngineError::CallbackRegistration("wakeup"));
        }
        *self.wakeup.lock().unwrap() = Some(callback);
        Ok(())
    }

    fn set_render_update_callback(&self, callback: EngineCallback) -> Result<(), EngineError> {
        if self.fail_registration.load(Ordering::SeqCst) {
            return Err(EngineError::CallbackRegistration("render update"));
        }
        *self.render_update.lock().unwrap() = Some(callback);
        Ok(())
    }

    fn observe_property(&self, name: &str) -> Result<(), EngineError> {
        self.observed.lock().unwrap().push(name.to_string());
        Ok(())
    }

    fn poll_event(&self) -> Option<EngineEvent> {
        self.events.lock().unwrap().pop_front()
    }

    fn render_update(&self) -> bool {
        self.render_update_calls.fetch_add(1, Ordering::SeqCst);
        self.frame_ready.swap(false, Ordering::SeqCst)
    }

    fn render(&self) -> Option<Arc<VideoFrame>> {
        self.frame.lock().unwrap().clone()
    }

    fn command_async(&self, reply_id: u64, command: &PendingCommand) -> Result<(), EngineError> {
        if self.reject_commands.load(Ordering::SeqCst) {
            return Err(EngineError::Shutdown);
        }
        self.commands.lock().unwrap().push((reply_id, command.clone()));
        Ok(())
    }

    fn shutdown(&self) {
        self.shut_down.store(true, Ordering::SeqCst);
    }
}
