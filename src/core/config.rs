use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct WindowConfig {
    pub width: f32,
    pub height: f32,
    pub start_fullscreen: bool,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            width: 1280.0,
            height: 720.0,
            start_fullscreen: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Overrides the `ffmpeg` found on PATH
    pub ffmpeg_path: Option<PathBuf>,
    /// Overrides the `ffprobe` found on PATH
    pub ffprobe_path: Option<PathBuf>,
    pub frame_width: u32,
    pub frame_height: u32,
    pub max_frame_rate: f64,
    /// Upper bound for one ffprobe or still-frame run
    pub probe_timeout_ms: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: None,
            ffprobe_path: None,
            frame_width: 1280,
            frame_height: 720,
            max_frame_rate: 30.0,
            probe_timeout_ms: 10_000,
        }
    }
}

impl EngineConfig {
    pub fn ffmpeg_program(&self) -> PathBuf {
        self.ffmpeg_path.clone().unwrap_or_else(|| PathBuf::from("ffmpeg"))
    }

    pub fn probe_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.probe_timeout_ms)
    }

    pub fn ffprobe_program(&self) -> PathBuf {
        self.ffprobe_path.clone().unwrap_or_else(|| PathBuf::from("ffprobe"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ControlsConfig {
    pub seek_step_seconds: f64,
    pub interface_hide_delay_ms: u64,
    pub show_info_panel: bool,
    pub overlay_margin: f32,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            seek_step_seconds: 10.0,
            interface_hide_delay_ms: 2000,
            show_info_panel: true,
            overlay_margin: 40.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProtocolConfig {
    pub wakeup_queue_capacity: usize,
    /// Close the player once the controller closes our standard input
    pub quit_on_input_closed: bool,
}

impl Default for ProtocolConfig {
    fn default() -> Self {
        Self {
            wakeup_queue_capacity: 64,
            quit_on_input_closed: false,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    pub window: WindowConfig,
    pub engine: EngineConfig,
    pub controls: ControlsConfig,
    pub protocol: ProtocolConfig,
}

impl PlayerConfig {
    /// Loads the config from the default location, creating it if needed.
    pub fn load() -> anyhow::Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(config_path: &Path) -> anyhow::Result<Self> {
        if config_path.exists() {
            let content = std::fs::read_to_string(config_path)
                .map_err(|e| anyhow::anyhow!("Failed to read config file at {}: {}", config_path.display(), e))?;

            match serde_json::from_str::<Self>(&content) {
                Ok(config) => {
                    log::info!("Loaded existing config from {}", config_path.display());
                    Ok(config.sanitized())
                }
                Err(e) => {
                    log::warn!("Config file exists but has issues ({}), creating new one with defaults", e);
                    let new_config = Self::default();
                    new_config.save_to(config_path)
                        .map_err(|save_err| anyhow::anyhow!("Failed to save new config: {}", save_err))?;
                    log::info!("Created new config file at {}", config_path.display());
                    Ok(new_config)
                }
            }
        } else {
            log::info!("No config file found, creating default config");
            let config = Self::default();
            config.save_to(config_path)
                .map_err(|e| anyhow::anyhow!("Failed to save default config: {}", e))?;
            log::info!("Created new config file at {}", config_path.display());
            Ok(config)
        }
    }

    pub fn save_to(&self, config_path: &Path) -> anyhow::Result<()> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(config_path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("syncwatch")
            .join("config.json")
    }

    /// Replaces values that would stall or break the player with defaults.
    pub fn sanitized(mut self) -> Self {
        let defaults = Self::default();
        if self.protocol.wakeup_queue_capacity == 0 {
            log::warn!("wakeup_queue_capacity must be positive, using {}", defaults.protocol.wakeup_queue_capacity);
            self.protocol.wakeup_queue_capacity = defaults.protocol.wakeup_queue_capacity;
        }
        if self.engine.frame_width == 0 || self.engine.frame_height == 0 {
            log::warn!("Frame size must be non-zero, using {}x{}", defaults.engine.frame_width, defaults.engine.frame_height);
            self.engine.frame_width = defaults.engine.frame_width;
            self.engine.frame_height = defaults.engine.frame_height;
        }
        if !(self.engine.max_frame_rate.is_finite() && self.engine.max_frame_rate > 0.0) {
            self.engine.max_frame_rate = defaults.engine.max_frame_rate;
        }
        if self.engine.probe_timeout_ms == 0 {
            self.engine.probe_timeout_ms = defaults.engine.probe_timeout_ms;
        }
        if !self.controls.seek_step_seconds.is_finite() {
            self.controls.seek_step_seconds = defaults.controls.seek_step_seconds;
        }
        self
    }
}
