//! The contract between the player and whatever decodes media for it.
//!
//! The engine runs its own threads. It reports progress by queuing
//! [`EngineEvent`]s and by invoking the two registered callbacks, which may
//! fire from any thread and must not call back into the engine.

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use crate::video::dispatcher::PendingCommand;

/// Notification entry point handed to the engine.
pub type EngineCallback = Arc<dyn Fn() + Send + Sync>;

pub const DURATION_PROPERTY: &str = "duration";
pub const PLAYBACK_TIME_PROPERTY: &str = "playback-time";

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} is not usable: {reason}")]
    Unavailable { program: String, reason: String },

    #[error("Failed to register {0} callback")]
    CallbackRegistration(&'static str),

    #[error("Failed to probe {source_url}: {reason}")]
    Probe { source_url: String, reason: String },

    #[error("{program} did not finish within {timeout:?}")]
    TimedOut { program: String, timeout: Duration },

    #[error("Nothing is loaded")]
    NothingLoaded,

    #[error("Engine has shut down")]
    Shutdown,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Int(i64),
    Double(f64),
    Flag(bool),
    /// Property currently has no value (nothing loaded, or unknown)
    None,
}

impl PropertyValue {
    /// Whole seconds, truncating fractions. `None` for non-numeric values.
    pub fn as_seconds(&self) -> Option<i64> {
        match self {
            PropertyValue::Int(value) => Some(*value),
            PropertyValue::Double(value) if value.is_finite() => Some(value.trunc() as i64),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
}

impl From<LogLevel> for log::Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => log::Level::Error,
            LogLevel::Warn => log::Level::Warn,
            LogLevel::Info => log::Level::Info,
            LogLevel::Debug => log::Level::Debug,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EndFileReason {
    Eof,
    Stop,
    Error(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    LogMessage {
        level: LogLevel,
        prefix: String,
        text: String,
    },
    PropertyChange {
        name: String,
        value: PropertyValue,
    },
    StartFile,
    FileLoaded,
    EndFile(EndFileReason),
    Seek,
    PlaybackRestart,
    CommandReply {
        reply_id: u64,
        error: Option<String>,
    },
    Shutdown,
}

/// A decoded RGBA frame ready to be uploaded.
#[derive(Debug)]
pub struct VideoFrame {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub timestamp: f64,
}

pub trait MediaEngine: Send + Sync {
    /// Registers the "events pending" notification.
    fn set_wakeup_callback(&self, callback: EngineCallback) -> Result<(), EngineError>;

    /// Registers the "render update pending" notification.
    fn set_render_update_callback(&self, callback: EngineCallback) -> Result<(), EngineError>;

    /// Asks for `PropertyChange` events whenever `name` changes.
    fn observe_property(&self, name: &str) -> Result<(), EngineError>;

    /// Pops the next queued event without waiting.
    fn poll_event(&self) -> Option<EngineEvent>;

    /// Returns whether a new frame arrived since the previous call.
    fn render_update(&self) -> bool;

    /// Latest frame, if any has been decoded.
    fn render(&self) -> Option<Arc<VideoFrame>>;

    /// Queues a command and returns immediately. The outcome arrives later as
    /// a `CommandReply` carrying `reply_id`.
    fn command_async(&self, reply_id: u64, command: &PendingCommand) -> Result<(), EngineError>;

    /// Stops the engine threads. Later commands fail with `Shutdown`.
    fn shutdown(&self) {}
}
