use crate::core::SharedPlaybackState;
use crate::video::engine::{
    EndFileReason, EngineEvent, MediaEngine, PropertyValue, DURATION_PROPERTY, PLAYBACK_TIME_PROPERTY,
};
use crate::video::redraw::RedrawScheduler;
use crate::video::wakeup::{EngineWakeupSignal, WakeupReceiver};

/// What one drain pass did.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DrainReport {
    pub signals: usize,
    pub events: usize,
    pub frames_ready: usize,
    pub engine_shutdown: bool,
}

/// Main-loop side of the engine notifications.
pub struct NotificationBridge {
    receiver: WakeupReceiver,
}

impl NotificationBridge {
    pub fn new(receiver: WakeupReceiver) -> Self {
        Self { receiver }
    }

    /// Handles every wakeup queued since the last call, in arrival order.
    pub fn drain(
        &mut self,
        engine: &dyn MediaEngine,
        state: &SharedPlaybackState,
        redraw: &mut RedrawScheduler,
    ) -> DrainReport {
        let mut report = DrainReport::default();

        for signal in self.receiver.drain() {
            report.signals += 1;
            match signal {
                EngineWakeupSignal::EventsPending => {
                    while let Some(event) = engine.poll_event() {
                        report.events += 1;
                        if handle_event(event, state) {
                            report.engine_shutdown = true;
                        }
                    }
                }
                EngineWakeupSignal::RenderUpdatePending => {
                    if engine.render_update() {
                        report.frames_ready += 1;
                        redraw.mark_dirty();
                    }
                }
            }
        }

        report
    }
}

/// Applies one engine event. Returns true when the engine has shut down.
fn handle_event(event: EngineEvent, state: &SharedPlaybackState) -> bool {
    match event {
        EngineEvent::LogMessage { level, prefix, text } => {
            log::log!(target: "engine", log::Level::from(level), "[{}] {}", prefix, text.trim_end());
        }
        EngineEvent::PropertyChange { name, value } => handle_property(&name, &value, state),
        EngineEvent::CommandReply { reply_id, error: Some(error) } => {
            log::warn!("Engine command #{} failed: {}", reply_id, error);
        }
        EngineEvent::EndFile(EndFileReason::Error(reason)) => {
            log::warn!("Playback ended with an error: {}", reason);
        }
        EngineEvent::Shutdown => {
            log::info!("Engine shut down");
            return true;
        }
        other => log::debug!("event: {:?}", other),
    }
    false
}

fn handle_property(name: &str, value: &PropertyValue, state: &SharedPlaybackState) {
    let Some(seconds) = value.as_seconds() else {
        log::trace!("Property {} has no numeric value", name);
        return;
    };
    match name {
        DURATION_PROPERTY => state.set_duration(seconds),
        PLAYBACK_TIME_PROPERTY => state.set_position(seconds),
        other => log::trace!("Ignoring property change: {}", other),
    }
}
