#[cfg(test)]
mod tests {
    use super::super::{pressed_shortcuts, ShortcutAction};
    use eframe::egui;
    use crate::video::UiAction;

    fn key_event(key: egui::Key, pressed: bool, modifiers: egui::Modifiers) -> egui::Event {
        egui::Event::Key {
            key,
            physical_key: None,
            pressed,
            repeat: false,
            modifiers,
        }
    }

    fn run_frame(ctx: &egui::Context, events: Vec<egui::Event>) -> Vec<ShortcutAction> {
        let input = egui::RawInput {
            events,
            ..Default::default()
        };
        let mut shortcuts = Vec::new();
        let _ = ctx.run(input, |ctx| {
            shortcuts = pressed_shortcuts(ctx);
        });
        shortcuts
    }

    #[test]
    fn test_key_mapping() {
        assert_eq!(ShortcutAction::from_key(egui::Key::Space), Some(ShortcutAction::TogglePause));
        assert_eq!(ShortcutAction::from_key(egui::Key::ArrowRight), Some(ShortcutAction::SeekForward));
        assert_eq!(ShortcutAction::from_key(egui::Key::ArrowLeft), Some(ShortcutAction::SeekBackward));
        assert_eq!(ShortcutAction::from_key(egui::Key::F), Some(ShortcutAction::ToggleFullscreen));
        assert_eq!(ShortcutAction::from_key(egui::Key::Escape), Some(ShortcutAction::ExitFullscreen));
        assert_eq!(ShortcutAction::from_key(egui::Key::A), None);
    }

    #[test]
    fn test_seek_shortcuts_use_configured_step() {
        assert_eq!(ShortcutAction::SeekForward.to_ui_action(5.0), Some(UiAction::SeekRelative(5.0)));
        assert_eq!(ShortcutAction::SeekBackward.to_ui_action(5.0), Some(UiAction::SeekRelative(-5.0)));
        assert_eq!(ShortcutAction::TogglePause.to_ui_action(5.0), Some(UiAction::TogglePause));
        assert_eq!(ShortcutAction::ToggleFullscreen.to_ui_action(5.0), None);
    }

    #[test]
    fn test_pressed_shortcuts_in_order() {
        let ctx = egui::Context::default();
        let shortcuts = run_frame(
            &ctx,
            vec![
                key_event(egui::Key::ArrowLeft, true, egui::Modifiers::NONE),
                key_event(egui::Key::ArrowLeft, false, egui::Modifiers::NONE),
                key_event(egui::Key::Space, true, egui::Modifiers::NONE),
            ],
        );
        assert_eq!(shortcuts, vec![ShortcutAction::SeekBackward, ShortcutAction::TogglePause]);
    }

    #[test]
    fn test_modified_keys_are_not_shortcuts() {
        let ctx = egui::Context::default();
        let shortcuts = run_frame(&ctx, vec![key_event(egui::Key::F, true, egui::Modifiers::CTRL)]);
        assert!(shortcuts.is_empty());
    }
}
