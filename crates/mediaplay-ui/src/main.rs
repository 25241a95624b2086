// crates/mediaplay-ui/src/main.rs

mod app;
mod audio;
mod input;
mod theme;

use clap::Parser;
use mediaplay_core::Config;
use mediaplay_engine::session::PlayerSession;

fn main() -> std::process::ExitCode {
    let config = Config::parse();

    let filter = tracing_subscriber::EnvFilter::try_new(&config.loglevel)
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    if let Err(e) = ffmpeg_the_third::init() {
        tracing::error!("ffmpeg init failed: {e}");
        return std::process::ExitCode::FAILURE;
    }

    let session = match PlayerSession::open(config.clone()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("failed to open {}: {e}", config.input);
            return std::process::ExitCode::FAILURE;
        }
    };

    if config.nodisp {
        return run_headless(session);
    }

    let title = config.window_title.clone().unwrap_or_else(|| "mediaplay".to_string());
    let native_options = eframe::NativeOptions {
        centered: true,
        viewport: egui::ViewportBuilder::default()
            .with_title(title)
            .with_inner_size([960.0, 620.0])
            .with_min_inner_size([480.0, 320.0])
            .with_fullscreen(config.fullscreen),
        ..Default::default()
    };

    let run_result = eframe::run_native(
        "mediaplay",
        native_options,
        Box::new(|cc| {
            egui_extras::install_image_loaders(&cc.egui_ctx);
            theme::configure_style(&cc.egui_ctx);
            Ok(Box::new(app::PlayerApp::new(session)))
        }),
    );

    match run_result {
        Ok(()) => std::process::ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("eframe run failed: {e}");
            std::process::ExitCode::FAILURE
        }
    }
}

/// `-nodisp` path: no window, but the session still runs its
/// decode/audio/clock machinery — only the refresh-timer-driven
/// `tick_video`/texture-upload half of the UI is skipped. Stats print to
/// stdout the same way the windowed console status line would.
fn run_headless(mut session: PlayerSession) -> std::process::ExitCode {
    let audio_output = session
        .audio_presenter()
        .and_then(|presenter| {
            let clock = session.audio_clock_handle();
            match audio::open(presenter, clock, session.config().sync) {
                Ok(out) => {
                    let _ = session.attach_audio_output(out.sample_rate, out.channels, out.hw_buf_size);
                    Some(out)
                }
                Err(e) => {
                    tracing::warn!("no audio output available: {e}");
                    None
                }
            }
        });

    let mut exit_code = std::process::ExitCode::SUCCESS;
    loop {
        let events = session.poll();
        let mut quit = false;
        for event in events {
            match event {
                mediaplay_core::messages::EngineEvent::Stats(stats) => print!("{stats}"),
                mediaplay_core::messages::EngineEvent::Fatal(msg) => {
                    tracing::error!("{msg}");
                    exit_code = std::process::ExitCode::FAILURE;
                    quit = true;
                }
                mediaplay_core::messages::EngineEvent::Eof => {
                    if session.config().autoexit {
                        quit = true;
                    }
                }
            }
        }
        if quit {
            break;
        }
        let (_, wait) = session.tick_video();
        std::thread::sleep(std::time::Duration::from_secs_f64(wait.max(0.0)));
    }

    drop(audio_output);
    session.shutdown();
    exit_code
}
