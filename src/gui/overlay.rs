use eframe::egui;
use std::time::{Duration, Instant};
use crate::core::{format_progress, ControlsConfig, PlaybackState};
use crate::video::UiAction;

/// Everything the overlay asked for during one frame.
#[derive(Debug, Default, PartialEq)]
pub struct OverlayOutput {
    pub actions: Vec<UiAction>,
    pub toggle_fullscreen: bool,
    pub pointer_over_interface: bool,
}

/// Tracks user activity to decide when the interface and cursor hide.
#[derive(Debug, Clone)]
pub struct InterfaceVisibility {
    hide_delay: Duration,
    last_activity: Instant,
}

impl InterfaceVisibility {
    pub fn new(hide_delay: Duration, now: Instant) -> Self {
        Self {
            hide_delay,
            last_activity: now,
        }
    }

    pub fn note_activity(&mut self, now: Instant) {
        self.last_activity = now;
    }

    pub fn is_visible(&self, now: Instant, pointer_over_interface: bool) -> bool {
        pointer_over_interface || now.saturating_duration_since(self.last_activity) < self.hide_delay
    }

    /// Time left until the interface hides, if it is still showing.
    pub fn remaining(&self, now: Instant) -> Option<Duration> {
        self.hide_delay
            .checked_sub(now.saturating_duration_since(self.last_activity))
            .filter(|remaining| !remaining.is_zero())
    }
}

/// Largest rect with the frame's aspect ratio centered in `available`.
pub fn letterbox_rect(available: egui::Rect, frame_width: u32, frame_height: u32) -> egui::Rect {
    if frame_width == 0 || frame_height == 0 || available.width() <= 0.0 || available.height() <= 0.0 {
        return available;
    }
    let frame = egui::vec2(frame_width as f32, frame_height as f32);
    let scale = (available.width() / frame.x).min(available.height() / frame.y);
    egui::Rect::from_center_size(available.center(), frame * scale)
}

pub struct Overlay {
    pub source_input: String,
    pub show_info_panel: bool,
    margin: f32,
    scrub_position: Option<u64>,
}

impl Overlay {
    pub fn new(controls: &ControlsConfig) -> Self {
        Self {
            source_input: String::new(),
            show_info_panel: controls.show_info_panel,
            margin: controls.overlay_margin,
            scrub_position: None,
        }
    }

    pub fn show(&mut self, ctx: &egui::Context, state: &PlaybackState, fullscreen: bool, seek_step: f64) -> OverlayOutput {
        let mut output = OverlayOutput::default();

        if self.show_info_panel {
            let panel = egui::Area::new(egui::Id::new("info_panel"))
                .anchor(egui::Align2::RIGHT_TOP, [-self.margin, self.margin])
                .show(ctx, |ui| {
                    egui::Frame::popup(ui.style()).show(ui, |ui| {
                        self.info_panel(ui, state, &mut output);
                    });
                });
            output.pointer_over_interface |= panel.response.contains_pointer();
        }

        let controls = egui::Area::new(egui::Id::new("media_controls"))
            .anchor(egui::Align2::CENTER_BOTTOM, [0.0, -self.margin])
            .show(ctx, |ui| {
                egui::Frame::popup(ui.style()).show(ui, |ui| {
                    self.media_controls(ui, state, fullscreen, seek_step, &mut output);
                });
            });
        output.pointer_over_interface |= controls.response.contains_pointer();

        output
    }

    fn info_panel(&mut self, ui: &mut egui::Ui, state: &PlaybackState, output: &mut OverlayOutput) {
        ui.set_max_width(340.0);

        ui.strong("Room");
        ui.horizontal(|ui| {
            ui.label(&state.room_link);
            if ui.small_button("Copy").on_hover_text("Copy room link").clicked() {
                ui.output_mut(|o| o.copied_text = state.room_link.clone());
            }
        });

        ui.separator();
        ui.strong("Stream source");
        ui.horizontal(|ui| {
            let edit = ui.add(egui::TextEdit::singleline(&mut self.source_input).hint_text("URL, path or magnet link"));
            let submitted = edit.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
            if ui.button("Stream").clicked() || submitted {
                output.actions.push(UiAction::StreamSource(std::mem::take(&mut self.source_input)));
            }
        });

        ui.separator();
        let progress = egui::ProgressBar::new(state.download_progress).show_percentage();
        ui.add(progress).on_hover_text(&state.torrent_name);
        ui.horizontal(|ui| {
            if state.download_finished() {
                ui.label("Download finished");
            } else {
                ui.label(&state.download_speed_label);
            }
            ui.separator();
            ui.label(format!("Peers: {}", state.peer_count_label));
        });

        ui.separator();
        ui.strong("Connected peers");
        if state.peers.is_empty() {
            ui.weak("None");
        } else {
            for peer in &state.peers {
                ui.label(peer);
            }
        }
    }

    fn media_controls(
        &mut self,
        ui: &mut egui::Ui,
        state: &PlaybackState,
        fullscreen: bool,
        seek_step: f64,
        output: &mut OverlayOutput,
    ) {
        ui.horizontal(|ui| {
            if ui.button("Play/Pause").on_hover_text("Space").clicked() {
                output.actions.push(UiAction::TogglePause);
            }
            if ui.button("Rewind").on_hover_text(format!("Back {}s", seek_step)).clicked() {
                output.actions.push(UiAction::SeekRelative(-seek_step));
            }

            let duration = state.duration();
            let mut position = self.scrub_position.unwrap_or_else(|| state.position());
            ui.spacing_mut().slider_width = 360.0;
            let slider = ui.add_enabled(
                duration > 0,
                egui::Slider::new(&mut position, 0..=duration.max(1)).show_value(false),
            );
            if slider.dragged() {
                self.scrub_position = Some(position);
            }
            if slider.drag_stopped() || (slider.changed() && !slider.dragged()) {
                self.scrub_position = None;
                output.actions.push(UiAction::SeekTo(position));
            }
            ui.monospace(format_progress(position, duration));

            if ui.selectable_label(self.show_info_panel, "Info").clicked() {
                self.show_info_panel = !self.show_info_panel;
            }
            let fullscreen_label = if fullscreen { "Windowed" } else { "Fullscreen" };
            if ui.button(fullscreen_label).on_hover_text("F").clicked() {
                output.toggle_fullscreen = true;
            }
        });
    }
}
