// crates/mediaplay-ui/src/audio.rs
//
// cpal output device wiring: the windowing/audio-output toolkit is treated
// as an opaque dependency here. This is the UI-side half of ffplay's
// audio_open/sdl_audio_callback: negotiate a device format, record what was
// actually granted, and register a callback that pulls from
// `AudioPresenter` on every buffer request.

use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleFormat;
use parking_lot::Mutex;

use mediaplay_core::config::SyncType;
use mediaplay_core::constants::AUDIO_MIN_BUFFER_SIZE;
use mediaplay_engine::presenter_audio::AudioPresenter;
use mediaplay_engine::session::{apply_output_volume, AudioClockHandle};

/// Live audio output. Holding this alive keeps the device stream playing —
/// dropping it stops output, the same contract a `rodio::OutputStream` would
/// carry: it must stay alive for the entire app lifetime.
pub struct AudioOutput {
    stream: cpal::Stream,
    pub sample_rate: u32,
    pub channels: u16,
    pub hw_buf_size: u32,
}

/// Opens the default output device, negotiates its format, and starts
/// streaming immediately. The session's audio decoder/resampler is built
/// from whatever this negotiates (`PlayerSession::attach_audio_output`) —
/// ffplay's own device-format fallback table is SDL's to own, not ours;
/// cpal's `default_output_config` already performs the equivalent
/// capability negotiation.
pub fn open(presenter: Arc<Mutex<AudioPresenter>>, clock: AudioClockHandle, sync_type: SyncType) -> anyhow::Result<AudioOutput> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or_else(|| anyhow::anyhow!("no audio output device available"))?;
    let supported = negotiate_output_config(&device)?;
    let sample_format = supported.sample_format();
    let config = supported.config();
    let sample_rate = config.sample_rate.0;
    let channels = config.channels;
    let bytes_per_sec = sample_rate as f64 * channels as f64 * std::mem::size_of::<f32>() as f64;

    let hw_buf_frames = match config.buffer_size {
        cpal::BufferSize::Fixed(n) => n,
        cpal::BufferSize::Default => AUDIO_MIN_BUFFER_SIZE,
    };
    let hw_buf_size = hw_buf_frames * channels as u32 * std::mem::size_of::<f32>() as u32;

    let err_fn = |e| tracing::error!("audio output stream error: {e}");

    let stream = match sample_format {
        SampleFormat::F32 => device.build_output_stream(
            &config,
            move |data: &mut [f32], _info: &cpal::OutputCallbackInfo| {
                fill_buffer(data, sample_rate, bytes_per_sec, &presenter, &clock, sync_type);
            },
            err_fn,
            None,
        )?,
        other => anyhow::bail!("unsupported output sample format: {other:?}"),
    };
    stream.play()?;

    Ok(AudioOutput { stream, sample_rate, channels, hw_buf_size })
}

/// Picks the device's default output config, unless `MEDIAPLAY_AUDIO_CHANNELS`
/// names a channel count the device also advertises support for — the
/// analogue of ffplay/SDL's `SDL_AUDIO_CHANNELS` override. Falls back to the
/// default config if the requested channel count isn't among the device's
/// supported configs.
fn negotiate_output_config(device: &cpal::Device) -> anyhow::Result<cpal::SupportedStreamConfig> {
    let default = device.default_output_config()?;
    let Some(wanted_channels) = wanted_channels_override() else { return Ok(default) };
    if wanted_channels == default.channels() {
        return Ok(default);
    }
    let matched = device
        .supported_output_configs()?
        .find(|range| range.channels() == wanted_channels)
        .map(|range| range.with_sample_rate(default.sample_rate()));
    match matched {
        Some(cfg) => Ok(cfg),
        None => {
            tracing::warn!(
                "MEDIAPLAY_AUDIO_CHANNELS={wanted_channels} not supported by the default device, using {} instead",
                default.channels()
            );
            Ok(default)
        }
    }
}

fn wanted_channels_override() -> Option<u16> {
    std::env::var("MEDIAPLAY_AUDIO_CHANNELS").ok()?.trim().parse().ok()
}

impl AudioOutput {
    pub fn pause(&self) -> anyhow::Result<()> {
        self.stream.pause()?;
        Ok(())
    }

    pub fn resume(&self) -> anyhow::Result<()> {
        self.stream.play()?;
        Ok(())
    }
}

/// One device-callback invocation: pull enough samples to fill
/// `data`, apply volume/mute, fall back to silence at genuine EOF, and
/// publish the rebased audio clock.
fn fill_buffer(data: &mut [f32], sample_rate: u32, bytes_per_sec: f64, presenter: &Mutex<AudioPresenter>, clock: &AudioClockHandle, sync_type: SyncType) {
    let mut presenter = presenter.lock();

    match clock.pull(&mut presenter, data.len(), sync_type, sample_rate) {
        Some(pulled) => {
            let take = pulled.samples.len().min(data.len());
            data[..take].copy_from_slice(&pulled.samples[..take]);
            for sample in &mut data[take..] {
                *sample = 0.0;
            }
            apply_output_volume(&mut data[..take], presenter.volume(), presenter.muted());

            let hw_buf_bytes = data.len() * std::mem::size_of::<f32>();
            let (pts, serial) = presenter.clock_update(hw_buf_bytes, 0, bytes_per_sec);
            drop(presenter);
            clock.update(pts, serial);
        }
        None => data.fill(0.0),
    }
}
