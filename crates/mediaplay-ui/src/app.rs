// crates/mediaplay-ui/src/app.rs
//
// `eframe::App` loop: drains engine events, drives the refresh-timer tick,
// uploads decoded frames to a texture, and draws a minimal transport bar.
// poll worker, tick non-UI state, draw panels, drain input, request repaint
// while playing — trimmed down to a single playback view.

use std::time::{Duration, Instant};

use eframe::egui::{self, ColorImage, TextureOptions};

use mediaplay_core::messages::{ControlCommand, EngineEvent};
use mediaplay_core::stats::PlaybackStats;
use mediaplay_engine::session::PlayerSession;

use crate::{audio, input, theme};

pub struct PlayerApp {
    /// `None` only in the brief window between `on_exit` consuming it for an
    /// orderly `PlayerSession::shutdown()` and the process actually ending.
    session: Option<PlayerSession>,
    audio_output: Option<audio::AudioOutput>,
    texture: Option<egui::TextureHandle>,
    next_tick_at: Instant,
    last_stats: Option<PlaybackStats>,
    fullscreen: bool,
    quit: bool,
    /// Wall-clock time the pointer last moved; drives the cursor
    /// auto-hide timeout over the video panel.
    last_pointer_move: Instant,
}

impl PlayerApp {
    pub fn new(mut session: PlayerSession) -> Self {
        let audio_output = session.audio_presenter().and_then(|presenter| {
            let clock = session.audio_clock_handle();
            match audio::open(presenter, clock, session.config().sync) {
                Ok(out) => {
                    if let Err(e) = session.attach_audio_output(out.sample_rate, out.channels, out.hw_buf_size) {
                        tracing::warn!("attach_audio_output failed: {e}");
                    }
                    Some(out)
                }
                Err(e) => {
                    tracing::warn!("no audio output available: {e}");
                    None
                }
            }
        });

        Self {
            session: Some(session),
            audio_output,
            texture: None,
            next_tick_at: Instant::now(),
            last_stats: None,
            fullscreen: false,
            quit: false,
            last_pointer_move: Instant::now(),
        }
    }

    fn session(&self) -> &PlayerSession {
        self.session.as_ref().expect("session consumed before app exit")
    }

    fn session_mut(&mut self) -> &mut PlayerSession {
        self.session.as_mut().expect("session consumed before app exit")
    }

    fn drain_events(&mut self, ctx: &egui::Context) {
        let autoexit = self.session().config().autoexit;
        for event in self.session_mut().poll() {
            match event {
                EngineEvent::Stats(stats) => self.last_stats = Some(stats),
                EngineEvent::Fatal(msg) => {
                    tracing::error!("{msg}");
                    self.quit = true;
                }
                EngineEvent::Eof => {
                    if autoexit {
                        self.quit = true;
                    }
                }
            }
        }
        if self.quit {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    fn drive_video(&mut self, ctx: &egui::Context) {
        if Instant::now() < self.next_tick_at {
            ctx.request_repaint_after(self.next_tick_at.saturating_duration_since(Instant::now()));
            return;
        }
        let (frame, wait) = self.session_mut().tick_video();
        self.next_tick_at = Instant::now() + Duration::from_secs_f64(wait.max(0.0));
        if let Some(frame) = frame {
            let image = ColorImage::from_rgba_unmultiplied([frame.width as usize, frame.height as usize], &frame.data);
            match &mut self.texture {
                Some(tex) => tex.set(image, TextureOptions::LINEAR),
                None => self.texture = Some(ctx.load_texture("video-frame", image, TextureOptions::LINEAR)),
            }
        }
        if !self.session().is_paused() {
            ctx.request_repaint_after(Duration::from_secs_f64(wait.max(0.0)));
        }
    }

    fn apply_input(&mut self, ctx: &egui::Context) {
        let seek_interval = self.session().config().seek_interval;
        let actions = input::poll(ctx, seek_interval);
        for cmd in actions.commands {
            self.session_mut().handle_command(cmd);
        }
        if actions.toggle_fullscreen {
            self.fullscreen = !self.fullscreen;
            ctx.send_viewport_cmd(egui::ViewportCommand::Fullscreen(self.fullscreen));
        }
        if actions.quit {
            self.quit = true;
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
        }
    }

    /// Hides the cursor after `CURSOR_HIDE_SECS` of no pointer movement,
    /// restoring it the instant the pointer moves again.
    fn update_cursor_autohide(&mut self, ctx: &egui::Context) {
        let moved = ctx.input(|i| i.pointer.delta() != egui::Vec2::ZERO);
        if moved {
            self.last_pointer_move = Instant::now();
        }
        let idle = self.last_pointer_move.elapsed().as_secs_f64();
        if idle >= mediaplay_core::constants::CURSOR_HIDE_SECS {
            ctx.set_cursor_icon(egui::CursorIcon::None);
        } else {
            ctx.set_cursor_icon(egui::CursorIcon::Default);
            let remaining = mediaplay_core::constants::CURSOR_HIDE_SECS - idle;
            ctx.request_repaint_after(Duration::from_secs_f64(remaining));
        }
    }

    fn draw_video_panel(&mut self, ui: &mut egui::Ui) {
        let available = ui.available_size();
        let response = if let Some(tex) = &self.texture {
            let size = tex.size_vec2();
            let scale = (available.x / size.x).min(available.y / size.y).min(1.0).max(0.0001);
            let target = size * scale;
            ui.centered_and_justified(|ui| ui.add(egui::Image::new(tex).fit_to_exact_size(target)))
                .inner
        } else {
            ui.centered_and_justified(|ui| ui.label("no video"))
        };

        // Right-click seek-to-fraction, against the displayed image rect.
        if response.secondary_clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let rect = response.rect;
                let fraction = ((pos.x - rect.left()) / rect.width().max(1.0)).clamp(0.0, 1.0) as f64;
                self.session_mut().handle_command(ControlCommand::SeekFraction { fraction });
            }
        }
        if response.double_clicked() {
            self.fullscreen = !self.fullscreen;
            ui.ctx().send_viewport_cmd(egui::ViewportCommand::Fullscreen(self.fullscreen));
        }
    }

    fn draw_transport_bar(&mut self, ui: &mut egui::Ui) {
        let position = self.session().position_secs();
        let duration = self.session().duration_secs().unwrap_or(0.0);
        let paused = self.session().is_paused();
        let muted = self.session().is_muted();
        let volume = self.session().volume();

        ui.horizontal(|ui| {
            let play_label = if paused { "\u{25B6}" } else { "\u{23F8}" };
            if ui.button(play_label).clicked() {
                self.session_mut().handle_command(ControlCommand::TogglePause);
            }
            let mute_label = if muted { "\u{1F507}" } else { "\u{1F50A}" };
            if ui.button(mute_label).clicked() {
                self.session_mut().handle_command(ControlCommand::ToggleMute);
            }

            let mut slider_volume = volume;
            if ui.add(egui::Slider::new(&mut slider_volume, 0..=mediaplay_core::constants::VOLUME_MAX)).changed() {
                let sign = if slider_volume >= volume { 1 } else { -1 };
                self.session_mut().handle_command(ControlCommand::AdjustVolume { sign });
            }

            ui.label(format!("{:7.2} / {:7.2}", position, duration));

            if duration > 0.0 {
                let mut fraction = (position / duration).clamp(0.0, 1.0);
                if ui.add(egui::Slider::new(&mut fraction, 0.0..=1.0).show_value(false)).changed() {
                    self.session_mut().handle_command(ControlCommand::SeekFraction { fraction });
                }
            }
        });

        if let Some(stats) = &self.last_stats {
            ui.colored_label(theme::DARK_TEXT_DIM, format!("{stats}"));
        }
    }
}

impl eframe::App for PlayerApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events(ctx);
        self.drive_video(ctx);
        self.apply_input(ctx);
        self.update_cursor_autohide(ctx);

        egui::TopBottomPanel::bottom("transport").show(ctx, |ui| {
            self.draw_transport_bar(ui);
        });
        egui::CentralPanel::default()
            .frame(egui::Frame::default().fill(theme::DARK_BG_0))
            .show(ctx, |ui| {
                self.draw_video_panel(ui);
            });
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        if let Some(out) = self.audio_output.take() {
            let _ = out.pause();
        }
        if let Some(session) = self.session.take() {
            session.shutdown();
        }
    }
}
