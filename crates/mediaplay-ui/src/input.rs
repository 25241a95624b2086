// crates/mediaplay-ui/src/input.rs
//
// Keyboard bindings from the interactive-input table: translates
// egui key events into `ControlCommand`s the session already knows how to
// execute. Mouse-driven seek-to-fraction lives in app.rs next to the video
// rect it's computed against.

use eframe::egui::{self, Key};

use mediaplay_core::constants::{SEEK_INTERVAL_PAGE, SEEK_INTERVAL_UP_DOWN};
use mediaplay_core::messages::ControlCommand;

/// Non-command side effects the main window owns directly rather than
/// routing through the session (fullscreen has no meaning to the engine).
pub struct InputActions {
    pub commands: Vec<ControlCommand>,
    pub toggle_fullscreen: bool,
    pub quit: bool,
}

pub fn poll(ctx: &egui::Context, seek_interval: f64) -> InputActions {
    let mut commands = Vec::new();
    let mut toggle_fullscreen = false;
    let mut quit = false;

    ctx.input(|input| {
        if input.key_pressed(Key::Q) || input.key_pressed(Key::Escape) {
            quit = true;
        }
        if input.key_pressed(Key::F) {
            toggle_fullscreen = true;
        }
        if input.key_pressed(Key::P) || input.key_pressed(Key::Space) {
            commands.push(ControlCommand::TogglePause);
        }
        if input.key_pressed(Key::M) {
            commands.push(ControlCommand::ToggleMute);
        }
        if input.key_pressed(Key::Num9) {
            commands.push(ControlCommand::AdjustVolume { sign: -1 });
        }
        if input.key_pressed(Key::Num0) {
            commands.push(ControlCommand::AdjustVolume { sign: 1 });
        }
        if input.key_pressed(Key::S) {
            commands.push(ControlCommand::Step);
        }
        if input.key_pressed(Key::A) {
            commands.push(ControlCommand::CycleAudioStream);
        }
        if input.key_pressed(Key::V) {
            commands.push(ControlCommand::CycleVideoStream);
        }
        if input.key_pressed(Key::T) {
            commands.push(ControlCommand::CycleSubtitleStream);
        }
        if input.key_pressed(Key::ArrowLeft) {
            commands.push(ControlCommand::SeekRelative { seconds: -seek_interval });
        }
        if input.key_pressed(Key::ArrowRight) {
            commands.push(ControlCommand::SeekRelative { seconds: seek_interval });
        }
        if input.key_pressed(Key::ArrowUp) {
            commands.push(ControlCommand::SeekRelative { seconds: SEEK_INTERVAL_UP_DOWN });
        }
        if input.key_pressed(Key::ArrowDown) {
            commands.push(ControlCommand::SeekRelative { seconds: -SEEK_INTERVAL_UP_DOWN });
        }
        if input.key_pressed(Key::PageUp) {
            commands.push(ControlCommand::SeekRelative { seconds: SEEK_INTERVAL_PAGE });
        }
        if input.key_pressed(Key::PageDown) {
            commands.push(ControlCommand::SeekRelative { seconds: -SEEK_INTERVAL_PAGE });
        }
    });

    InputActions { commands, toggle_fullscreen, quit }
}
