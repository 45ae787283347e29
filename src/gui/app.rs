use anyhow::Context as _;
use eframe::egui;
use std::sync::Arc;
use std::time::{Duration, Instant};
use crate::core::{PlayerConfig, SharedPlaybackState};
use crate::gui::overlay::{letterbox_rect, InterfaceVisibility, Overlay};
use crate::hotkeys::{pressed_shortcuts, ShortcutAction};
use crate::protocol::{ControllerLink, InputChannel};
use crate::video::{
    register_notifications, wakeup_channel, CommandDispatcher, DrainReport, EngineCallback, MediaEngine,
    NotificationBridge, RedrawScheduler, UiAction, VideoFrame, DURATION_PROPERTY, PLAYBACK_TIME_PROPERTY,
};

/// The pieces every part of the player shares: state, engine and the way
/// commands reach the engine.
#[derive(Clone)]
pub struct PlayerContext {
    pub state: SharedPlaybackState,
    pub engine: Arc<dyn MediaEngine>,
    pub dispatcher: CommandDispatcher,
}

pub struct SyncwatchApp {
    pub config: PlayerConfig,
    pub player: PlayerContext,
    pub bridge: NotificationBridge,
    pub redraw: RedrawScheduler,
    pub input: Option<InputChannel>,
    pub overlay: Overlay,
    pub visibility: InterfaceVisibility,
    pub pointer_over_interface: bool,
    pub input_close_handled: bool,
    video_texture: Option<egui::TextureHandle>,
    video_size: [u32; 2],
}

impl SyncwatchApp {
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        config: PlayerConfig,
        engine: Arc<dyn MediaEngine>,
        initial_source: Option<String>,
    ) -> anyhow::Result<Self> {
        let mut visuals = egui::Visuals::dark();
        visuals.override_text_color = Some(egui::Color32::WHITE);
        cc.egui_ctx.set_visuals(visuals);

        let ctx = cc.egui_ctx.clone();
        let repaint: EngineCallback = Arc::new(move || ctx.request_repaint());

        let mut app = Self::assemble(config, engine, ControllerLink::stdout(), Some(repaint))?;
        app.input = Some(InputChannel::stdin(app.player.state.clone(), app.player.dispatcher.clone())?);
        log::info!("Listening for controller commands on stdin");

        if let Some(source) = initial_source {
            app.player.dispatcher.stream_source(&source);
        }
        Ok(app)
    }

    /// Wires the engine notifications and property observations. Any failure
    /// here leaves the engine undrivable.
    pub fn assemble(
        config: PlayerConfig,
        engine: Arc<dyn MediaEngine>,
        controller: ControllerLink,
        repaint: Option<EngineCallback>,
    ) -> anyhow::Result<Self> {
        let (sender, receiver) = wakeup_channel(config.protocol.wakeup_queue_capacity);
        let sender = match repaint {
            Some(repaint) => sender.with_repaint(repaint),
            None => sender,
        };
        register_notifications(engine.as_ref(), &sender).context("Failed to register engine notifications")?;
        for property in [DURATION_PROPERTY, PLAYBACK_TIME_PROPERTY] {
            engine
                .observe_property(property)
                .with_context(|| format!("Failed to observe engine property {}", property))?;
        }

        let dispatcher = CommandDispatcher::new(engine.clone(), controller);
        let hide_delay = Duration::from_millis(config.controls.interface_hide_delay_ms);

        Ok(Self {
            overlay: Overlay::new(&config.controls),
            visibility: InterfaceVisibility::new(hide_delay, Instant::now()),
            player: PlayerContext {
                state: SharedPlaybackState::new(),
                engine,
                dispatcher,
            },
            config,
            bridge: NotificationBridge::new(receiver),
            redraw: RedrawScheduler::new(),
            input: None,
            pointer_over_interface: false,
            input_close_handled: false,
            video_texture: None,
            video_size: [0, 0],
        })
    }

    pub fn drain_engine(&mut self) -> DrainReport {
        let report = self.bridge.drain(self.player.engine.as_ref(), &self.player.state, &mut self.redraw);
        if report.signals > 0 {
            log::trace!(
                "Drained {} signals: {} events, {} frames ready",
                report.signals,
                report.events,
                report.frames_ready
            );
        }
        report
    }

    pub fn apply_actions(&self, actions: Vec<UiAction>) {
        for action in actions {
            self.player.dispatcher.dispatch_ui(action);
        }
    }

    pub fn shortcut_actions(&self, shortcuts: &[ShortcutAction]) -> Vec<UiAction> {
        shortcuts
            .iter()
            .filter_map(|shortcut| shortcut.to_ui_action(self.config.controls.seek_step_seconds))
            .collect()
    }

    /// The frame to composite this iteration, if a redraw is due.
    pub fn frame_to_render(&mut self) -> Option<Arc<VideoFrame>> {
        if self.redraw.take_dirty() {
            self.player.engine.render()
        } else {
            None
        }
    }

    /// Whether the window should close after this drain.
    pub fn should_close(&mut self, report: &DrainReport) -> bool {
        if report.engine_shutdown {
            log::error!("Media engine shut down, closing the player");
            return true;
        }

        let input_closed = self.input.as_ref().is_some_and(InputChannel::is_closed);
        if input_closed && !self.input_close_handled {
            self.input_close_handled = true;
            if self.config.protocol.quit_on_input_closed {
                log::info!("Controller input closed, closing the player");
                return true;
            }
            log::info!("Controller input closed, continuing without it");
        }
        false
    }

    fn handle_window_shortcuts(&self, ctx: &egui::Context, shortcuts: &[ShortcutAction]) {
        let fullscreen = is_fullscreen(ctx);
        for shortcut in shortcuts {
            match shortcut {
                ShortcutAction::ToggleFullscreen => {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(!fullscreen));
                }
                ShortcutAction::ExitFullscreen if fullscreen => {
                    ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(false));
                }
                _ => {}
            }
        }
    }

    fn upload_frame(&mut self, ctx: &egui::Context, frame: &VideoFrame) {
        let size = [frame.width as usize, frame.height as usize];
        if frame.pixels.len() != size[0] * size[1] * 4 {
            log::warn!(
                "Dropping malformed frame: {} bytes for {}x{}",
                frame.pixels.len(),
                frame.width,
                frame.height
            );
            return;
        }

        log::trace!("Uploading frame at {:.3}s", frame.timestamp);
        let image = egui::ColorImage::from_rgba_unmultiplied(size, &frame.pixels);
        match &mut self.video_texture {
            Some(texture) => texture.set(image, egui::TextureOptions::LINEAR),
            None => {
                self.video_texture = Some(ctx.load_texture("video-frame", image, egui::TextureOptions::LINEAR));
            }
        }
        self.video_size = [frame.width, frame.height];
    }

    fn show_video(&self, ctx: &egui::Context) {
        egui::CentralPanel::default()
            .frame(egui::Frame::none().fill(egui::Color32::BLACK))
            .show(ctx, |ui| {
                if let Some(texture) = &self.video_texture {
                    let rect = letterbox_rect(ui.max_rect(), self.video_size[0], self.video_size[1]);
                    ui.painter().image(
                        texture.id(),
                        rect,
                        egui::Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0)),
                        egui::Color32::WHITE,
                    );
                }
            });
    }
}

fn is_fullscreen(ctx: &egui::Context) -> bool {
    ctx.input(|i| i.viewport().fullscreen.unwrap_or(false))
}

impl eframe::App for SyncwatchApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        let now = Instant::now();

        // Window events
        let shortcuts = pressed_shortcuts(ctx);
        self.handle_window_shortcuts(ctx, &shortcuts);
        let mut actions = self.shortcut_actions(&shortcuts);
        if ctx.input(|i| i.pointer.is_moving() || !i.events.is_empty()) {
            self.visibility.note_activity(now);
        }
        self.redraw.note_viewport(ctx.screen_rect().size().into());

        // Engine wakeups
        let report = self.drain_engine();
        if self.should_close(&report) {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }

        // Overlay
        if self.visibility.is_visible(now, self.pointer_over_interface) {
            let state = self.player.state.snapshot();
            let output = self
                .overlay
                .show(ctx, &state, is_fullscreen(ctx), self.config.controls.seek_step_seconds);
            self.pointer_over_interface = output.pointer_over_interface;
            if output.toggle_fullscreen {
                ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(!is_fullscreen(ctx)));
            }
            actions.extend(output.actions);
            if let Some(remaining) = self.visibility.remaining(now) {
                ctx.request_repaint_after(remaining);
            }
        } else {
            self.pointer_over_interface = false;
            ctx.set_cursor_icon(egui::CursorIcon::None);
        }

        // Commands
        self.apply_actions(actions);

        // Render
        if let Some(frame) = self.frame_to_render() {
            self.upload_frame(ctx, &frame);
        }
        self.show_video(ctx);
    }
}

impl Drop for SyncwatchApp {
    fn drop(&mut self) {
        if let Some(mut input) = self.input.take() {
            input.shutdown();
        }
        self.player.engine.shutdown();
        log::info!("Player closed");
    }
}
