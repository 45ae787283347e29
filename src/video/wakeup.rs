use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use crate::video::engine::{EngineCallback, EngineError, MediaEngine};

/// What an engine thread wants the main loop to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineWakeupSignal {
    EventsPending,
    RenderUpdatePending,
}

/// Signal kinds that did not fit into the queue. Re-emitted on the next drain.
#[derive(Debug, Default)]
struct Overflow {
    events_pending: AtomicBool,
    render_update_pending: AtomicBool,
}

impl Overflow {
    fn flag(&self, signal: EngineWakeupSignal) -> &AtomicBool {
        match signal {
            EngineWakeupSignal::EventsPending => &self.events_pending,
            EngineWakeupSignal::RenderUpdatePending => &self.render_update_pending,
        }
    }
}

/// Producer side, cloned into every engine callback.
#[derive(Clone)]
pub struct WakeupSender {
    sender: mpsc::Sender<EngineWakeupSignal>,
    overflow: Arc<Overflow>,
    repaint: Option<EngineCallback>,
}

/// Consumer side, owned by the main loop.
pub struct WakeupReceiver {
    receiver: mpsc::Receiver<EngineWakeupSignal>,
    overflow: Arc<Overflow>,
}

/// Creates the bounded wakeup queue. `capacity` must be non-zero.
pub fn wakeup_channel(capacity: usize) -> (WakeupSender, WakeupReceiver) {
    let (sender, receiver) = mpsc::channel(capacity.max(1));
    let overflow = Arc::new(Overflow::default());
    (
        WakeupSender {
            sender,
            overflow: overflow.clone(),
            repaint: None,
        },
        WakeupReceiver { receiver, overflow },
    )
}

impl WakeupSender {
    /// Also runs `repaint` after every enqueue so an idle window wakes up.
    pub fn with_repaint(mut self, repaint: EngineCallback) -> Self {
        self.repaint = Some(repaint);
        self
    }

    /// Enqueues `signal`. Never blocks and never touches engine or state.
    pub fn notify(&self, signal: EngineWakeupSignal) {
        match self.sender.try_send(signal) {
            Ok(()) => {}
            Err(TrySendError::Full(signal)) => {
                self.overflow.flag(signal).store(true, Ordering::Release);
            }
            Err(TrySendError::Closed(_)) => return,
        }
        if let Some(repaint) = &self.repaint {
            repaint();
        }
    }
}

impl WakeupReceiver {
    /// Takes every queued signal in arrival order, followed by any signal
    /// kinds that overflowed since the last drain.
    pub fn drain(&mut self) -> Vec<EngineWakeupSignal> {
        let mut signals = Vec::new();
        while let Ok(signal) = self.receiver.try_recv() {
            signals.push(signal);
        }
        for signal in [EngineWakeupSignal::EventsPending, EngineWakeupSignal::RenderUpdatePending] {
            if self.overflow.flag(signal).swap(false, Ordering::AcqRel) {
                log::trace!("Wakeup queue overflowed, replaying {:?}", signal);
                signals.push(signal);
            }
        }
        signals
    }
}

/// Hooks both engine notifications up to `sender`. Failure means the engine
/// cannot be driven at all.
pub fn register_notifications(engine: &dyn MediaEngine, sender: &WakeupSender) -> Result<(), EngineError> {
    let events_sender = sender.clone();
    engine.set_wakeup_callback(Arc::new(move || {
        events_sender.notify(EngineWakeupSignal::EventsPending);
    }))?;

    let render_sender = sender.clone();
    engine.set_render_update_callback(Arc::new(move || {
        render_sender.notify(EngineWakeupSignal::RenderUpdatePending);
    }))?;

    Ok(())
}
