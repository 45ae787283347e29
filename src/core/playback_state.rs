use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use crate::protocol::DecodedCommand;

const SELF_PEER_MARKER: &str = " (you)";
const SPEED_SUFFIX: &str = " mb/s";

/// Display and timing state shared between the input thread, the engine
/// event drain and the render loop.
///
/// Fields carry no cross-field atomicity: a reader may see a new peer list
/// next to an old room link and has to tolerate that.
#[derive(Debug, Clone, PartialEq)]
pub struct PlaybackState {
    duration: u64,
    position: u64,
    pub download_progress: f32,
    pub download_speed_label: String,
    pub torrent_name: String,
    pub room_link: String,
    pub peer_count_label: String,
    pub peers: Vec<String>,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            duration: 0,
            position: 0,
            download_progress: 0.0,
            download_speed_label: format!("0{}", SPEED_SUFFIX),
            torrent_name: "<filename>".to_string(),
            room_link: "syncwatch://room-<unique_id>".to_string(),
            peer_count_label: "<n>".to_string(),
            peers: Vec::new(),
        }
    }
}

impl PlaybackState {
    pub fn duration(&self) -> u64 {
        self.duration
    }

    /// Playback position, never past the current duration.
    pub fn position(&self) -> u64 {
        self.position.min(self.duration)
    }

    pub fn set_duration(&mut self, seconds: i64) {
        self.duration = seconds.max(0) as u64;
    }

    pub fn set_position(&mut self, seconds: i64) {
        self.position = (seconds.max(0) as u64).min(self.duration);
    }

    pub fn download_finished(&self) -> bool {
        self.download_progress >= 1.0
    }

    /// Applies a decoded protocol line. Returns whether any field changed.
    ///
    /// `LoadUrl` leaves the state untouched: it only reaches the engine, and
    /// the timing fields follow from the engine's property notifications.
    pub fn apply(&mut self, command: &DecodedCommand) -> bool {
        match command {
            DecodedCommand::SetProgress(value) => {
                let progress = if value.is_nan() { 0.0 } else { value.clamp(0.0, 1.0) };
                replace(&mut self.download_progress, progress)
            }
            DecodedCommand::SetSpeed(speed) => {
                replace(&mut self.download_speed_label, format!("{}{}", speed, SPEED_SUFFIX))
            }
            DecodedCommand::SetTorrentName(name) => replace(&mut self.torrent_name, name.clone()),
            DecodedCommand::SetPeerCount(count) => replace(&mut self.peer_count_label, count.clone()),
            DecodedCommand::SetRoomLink(link) => replace(&mut self.room_link, link.clone()),
            DecodedCommand::AddSelfPeer(peer) => {
                self.peers.push(format!("{}{}", peer, SELF_PEER_MARKER));
                true
            }
            DecodedCommand::AddPeer(peer) => {
                self.peers.push(peer.clone());
                true
            }
            DecodedCommand::LoadUrl(_) | DecodedCommand::Unknown => false,
        }
    }
}

fn replace<T: PartialEq>(slot: &mut T, value: T) -> bool {
    if *slot == value {
        false
    } else {
        *slot = value;
        true
    }
}

/// Cloneable handle to the single [`PlaybackState`] instance.
#[derive(Debug, Clone, Default)]
pub struct SharedPlaybackState {
    inner: Arc<Mutex<PlaybackState>>,
}

impl SharedPlaybackState {
    pub fn new() -> Self {
        Self::default()
    }

    // A poisoned lock still guards valid plain data
    fn lock(&self) -> MutexGuard<'_, PlaybackState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn apply(&self, command: &DecodedCommand) -> bool {
        self.lock().apply(command)
    }

    pub fn set_duration(&self, seconds: i64) {
        self.lock().set_duration(seconds);
    }

    pub fn set_position(&self, seconds: i64) {
        self.lock().set_position(seconds);
    }

    /// Copy of the current state for one render pass.
    pub fn snapshot(&self) -> PlaybackState {
        self.lock().clone()
    }
}
