use eframe::egui;
use crate::video::UiAction;

/// What a key press in the player window asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShortcutAction {
    TogglePause,
    SeekForward,
    SeekBackward,
    ToggleFullscreen,
    ExitFullscreen,
}

impl ShortcutAction {
    pub fn from_key(key: egui::Key) -> Option<Self> {
        match key {
            egui::Key::Space => Some(ShortcutAction::TogglePause),
            egui::Key::ArrowRight => Some(ShortcutAction::SeekForward),
            egui::Key::ArrowLeft => Some(ShortcutAction::SeekBackward),
            egui::Key::F => Some(ShortcutAction::ToggleFullscreen),
            egui::Key::Escape => Some(ShortcutAction::ExitFullscreen),
            _ => None,
        }
    }

    /// Engine-facing part of the shortcut. Fullscreen is handled by the window.
    pub fn to_ui_action(self, seek_step: f64) -> Option<UiAction> {
        match self {
            ShortcutAction::TogglePause => Some(UiAction::TogglePause),
            ShortcutAction::SeekForward => Some(UiAction::SeekRelative(seek_step)),
            ShortcutAction::SeekBackward => Some(UiAction::SeekRelative(-seek_step)),
            ShortcutAction::ToggleFullscreen | ShortcutAction::ExitFullscreen => None,
        }
    }
}

/// Collects the shortcuts pressed this frame, in press order.
///
/// Nothing is reported while a text field owns the keyboard.
pub fn pressed_shortcuts(ctx: &egui::Context) -> Vec<ShortcutAction> {
    if ctx.wants_keyboard_input() {
        return Vec::new();
    }
    ctx.input(|i| {
        i.events
            .iter()
            .filter_map(|event| match event {
                egui::Event::Key {
                    key,
                    pressed: true,
                    repeat: false,
                    modifiers,
                    ..
                } if modifiers.is_none() => ShortcutAction::from_key(*key),
                _ => None,
            })
            .collect()
    })
}
