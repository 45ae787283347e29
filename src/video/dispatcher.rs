use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use crate::protocol::ControllerLink;
use crate::video::engine::MediaEngine;

const MAGNET_SCHEME: &str = "magnet:";
const HOMEPATH_VARIABLE: &str = "%HOMEPATH%";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekMode {
    Relative,
    Absolute,
}

impl SeekMode {
    pub fn as_str(self) -> &'static str {
        match self {
            SeekMode::Relative => "relative",
            SeekMode::Absolute => "absolute",
        }
    }
}

/// Fire-and-forget instruction for the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum PendingCommand {
    Seek { value: f64, mode: SeekMode },
    PlayPause,
    LoadUrl { url: String },
}

impl PendingCommand {
    /// Engine command-line form, e.g. `["seek", "10", "relative"]`.
    pub fn args(&self) -> Vec<String> {
        match self {
            PendingCommand::Seek { value, mode } => {
                vec!["seek".to_string(), value.to_string(), mode.as_str().to_string()]
            }
            PendingCommand::PlayPause => vec!["cycle".to_string(), "pause".to_string()],
            PendingCommand::LoadUrl { url } => vec!["loadfile".to_string(), url.clone()],
        }
    }
}

/// Something the user asked for through the overlay or a shortcut.
#[derive(Debug, Clone, PartialEq)]
pub enum UiAction {
    TogglePause,
    SeekRelative(f64),
    SeekTo(u64),
    StreamSource(String),
}

/// Turns intents into asynchronous engine commands. Every call returns
/// without waiting on the engine.
#[derive(Clone)]
pub struct CommandDispatcher {
    engine: Arc<dyn MediaEngine>,
    controller: ControllerLink,
    next_reply_id: Arc<AtomicU64>,
}

impl CommandDispatcher {
    pub fn new(engine: Arc<dyn MediaEngine>, controller: ControllerLink) -> Self {
        Self {
            engine,
            controller,
            next_reply_id: Arc::new(AtomicU64::new(1)),
        }
    }

    /// Sends `command` to the engine and returns the reply id it will answer
    /// with, or `None` if the engine refused it.
    pub fn dispatch(&self, command: PendingCommand) -> Option<u64> {
        let reply_id = self.next_reply_id.fetch_add(1, Ordering::Relaxed);
        log::debug!("Dispatching #{}: {}", reply_id, command.args().join(" "));

        match self.engine.command_async(reply_id, &command) {
            Ok(()) => Some(reply_id),
            Err(e) => {
                log::warn!("Engine rejected '{}': {}", command.args().join(" "), e);
                None
            }
        }
    }

    pub fn dispatch_ui(&self, action: UiAction) {
        match action {
            UiAction::TogglePause => {
                self.dispatch(PendingCommand::PlayPause);
            }
            UiAction::SeekRelative(offset) => {
                self.dispatch(PendingCommand::Seek { value: offset, mode: SeekMode::Relative });
            }
            UiAction::SeekTo(position) => {
                self.dispatch(PendingCommand::Seek { value: position as f64, mode: SeekMode::Absolute });
            }
            UiAction::StreamSource(source) => self.stream_source(&source),
        }
    }

    /// Loads a user-entered source. Magnet links go to the controller, which
    /// resolves them and answers with a `url:` line.
    pub fn stream_source(&self, source: &str) {
        let home = std::env::var("HOMEPATH").ok();
        let Some(source) = normalize_source(source, home.as_deref()) else {
            log::debug!("Ignoring empty stream source");
            return;
        };

        if source.starts_with(MAGNET_SCHEME) {
            log::info!("Forwarding magnet link to controller");
            self.controller.request_source(&source);
        } else {
            log::info!("Loading stream source: {}", source);
            self.dispatch(PendingCommand::LoadUrl { url: source });
        }
    }
}

/// Trims a user-entered source and expands a leading `%HOMEPATH%`.
pub fn normalize_source(source: &str, home: Option<&str>) -> Option<String> {
    let source = source.trim();
    if source.is_empty() {
        return None;
    }
    match (source.strip_prefix(HOMEPATH_VARIABLE), home) {
        (Some(rest), Some(home)) => {
            log::debug!("Expanding variable {}", HOMEPATH_VARIABLE);
            Some(format!("{}{}", home, rest))
        }
        _ => Some(source.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{RecordingEngine, SharedBuffer};

    fn dispatcher() -> (CommandDispatcher, Arc<RecordingEngine>, SharedBuffer) {
        let engine = Arc::new(RecordingEngine::default());
        let buffer = SharedBuffer::default();
        let dispatcher = CommandDispatcher::new(engine.clone(), ControllerLink::new(Box::new(buffer.clone())));
        (dispatcher, engine, buffer)
    }

    #[test]
    fn test_command_args() {
        assert_eq!(
            PendingCommand::Seek { value: 10.0, mode: SeekMode::Relative }.args(),
            vec!["seek", "10", "relative"]
        );
        assert_eq!(
            PendingCommand::Seek { value: -10.0, mode: SeekMode::Relative }.args(),
            vec!["seek", "-10", "relative"]
        );
        assert_eq!(
            PendingCommand::Seek { value: 95.0, mode: SeekMode::Absolute }.args(),
            vec!["seek", "95", "absolute"]
        );
        assert_eq!(PendingCommand::PlayPause.args(), vec!["cycle", "pause"]);
        assert_eq!(
            PendingCommand::LoadUrl { url: "http://host/v.mp4".into() }.args(),
            vec!["loadfile", "http://host/v.mp4"]
        );
    }

    #[test]
    fn test_ui_actions_become_engine_commands() {
        let (dispatcher, engine, _) = dispatcher();

        dispatcher.dispatch_ui(UiAction::TogglePause);
        dispatcher.dispatch_ui(UiAction::SeekRelative(-10.0));
        dispatcher.dispatch_ui(UiAction::SeekTo(42));

        assert_eq!(
            engine.commands(),
            vec![
                PendingCommand::PlayPause,
                PendingCommand::Seek { value: -10.0, mode: SeekMode::Relative },
                PendingCommand::Seek { value: 42.0, mode: SeekMode::Absolute },
            ]
        );
    }

    #[test]
    fn test_reply_ids_increase() {
        let (dispatcher, engine, _) = dispatcher();
        let first = dispatcher.dispatch(PendingCommand::PlayPause);
        let second = dispatcher.dispatch(PendingCommand::PlayPause);

        assert_eq!(first, Some(1));
        assert_eq!(second, Some(2));
        assert_eq!(engine.reply_ids(), vec![1, 2]);
    }

    #[test]
    fn test_rejected_command_returns_none() {
        let engine = Arc::new(RecordingEngine::default());
        engine.reject_commands(true);
        let dispatcher = CommandDispatcher::new(engine.clone(), ControllerLink::new(Box::new(SharedBuffer::default())));

        assert_eq!(dispatcher.dispatch(PendingCommand::PlayPause), None);
    }

    #[test]
    fn test_stream_source_loads_plain_urls() {
        let (dispatcher, engine, buffer) = dispatcher();
        dispatcher.dispatch_ui(UiAction::StreamSource("  https://host/video.webm \n".into()));

        assert_eq!(
            engine.commands(),
            vec![PendingCommand::LoadUrl { url: "https://host/video.webm".into() }]
        );
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_stream_source_forwards_magnets_to_controller() {
        let (dispatcher, engine, buffer) = dispatcher();
        dispatcher.dispatch_ui(UiAction::StreamSource("magnet:?xt=urn:btih:abc".into()));

        assert!(engine.commands().is_empty());
        assert_eq!(buffer.contents(), "source:magnet:?xt=urn:btih:abc\n");
    }

    #[test]
    fn test_empty_stream_source_is_ignored() {
        let (dispatcher, engine, buffer) = dispatcher();
        dispatcher.dispatch_ui(UiAction::StreamSource("   ".into()));

        assert!(engine.commands().is_empty());
        assert!(buffer.contents().is_empty());
    }

    #[test]
    fn test_normalize_source() {
        assert_eq!(normalize_source(" a.mkv ", None), Some("a.mkv".into()));
        assert_eq!(normalize_source("", Some("/home/u")), None);
        assert_eq!(
            normalize_source("%HOMEPATH%\\Videos\\a.mkv", Some("\\Users\\u")),
            Some("\\Users\\u\\Videos\\a.mkv".into())
        );
        assert_eq!(
            normalize_source("%HOMEPATH%\\a.mkv", None),
            Some("%HOMEPATH%\\a.mkv".into())
        );
    }
}
