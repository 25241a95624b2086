// crates/mediaplay-engine/src/session.rs
//
// `PlayerSession`: the player session, its event loop and control surface,
// and its seek/stream-switch coordination. Owns the demuxer thread, the
// video/subtitle decoder threads, the clock trio, and the presenters; exposes
// a small control surface the UI drives from its own event loop and input
// handling. The audio decode path runs inline inside `AudioPresenter::pull`,
// called from the audio device callback rather than a dedicated thread — see
// DESIGN.md for why that's a legitimate simplification of ffplay's
// architecture rather than a missing piece.

use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::sample::{Sample, Type as SampleType};
use ffmpeg::media::Type as MediaType;
use ffmpeg::util::channel_layout::ChannelLayout;
use parking_lot::Mutex;

use mediaplay_core::config::SyncType;
use mediaplay_core::constants::{
    EXTERNAL_CLOCK_MAX_FRAMES, EXTERNAL_CLOCK_MIN_FRAMES, EXTERNAL_CLOCK_SPEED_MAX, EXTERNAL_CLOCK_SPEED_MIN,
    EXTERNAL_CLOCK_SPEED_STEP, STATUS_LINE_INTERVAL_SECS,
};
use mediaplay_core::messages::{ControlCommand, EngineEvent, VideoFrame};
use mediaplay_core::stats::{PlaybackStats, SyncTag};
use mediaplay_core::{Config, PlayerError, Result, StartByBytes};

use crate::clock::Clock;
use crate::decoder::audio::AudioDecoder;
use crate::decoder::subtitle::SubtitleDecoder;
use crate::decoder::video::{should_drop_early, VideoDecoder};
use crate::decoder::{DecodeOutcome, DecoderCore, StreamDecoder};
use crate::demux::{
    open_stream_component, resolve_by_bytes, select_stream, Demuxer, DemuxerControl, DemuxerEvent, OpenedStream,
    SeekRequest,
};
use crate::frame_queue::FrameQueue;
use crate::packet_queue::PacketQueue;
use crate::presenter_audio::{apply_volume, step_volume, AudioPresenter};
use crate::presenter_video::{subtitle_expired, RefreshOutcome, VideoPresenter};

/// One opened-but-not-yet-wired-up video/subtitle component, captured
/// between `open_stream_component` and the point where its worker thread
/// actually gets spawned (initial open, or a later stream-switch event).
struct VideoComponent {
    decoder: VideoDecoder,
    frame_queue: FrameQueue,
    queue: PacketQueue,
}

struct SubtitleComponent {
    decoder: SubtitleDecoder,
    frame_queue: FrameQueue,
    queue: PacketQueue,
}

/// Everything needed to finish building the audio path once the UI has
/// negotiated an actual output format with the device: the target sample
/// rate/channel count isn't known until the device is open, mirroring
/// ffplay's own audio_open negotiating a wanted_spec against the hardware
/// before wiring up the callback.
struct PendingAudio {
    core: DecoderCore,
    codec: ffmpeg::codec::decoder::Audio,
    frame_queue: FrameQueue,
    queue: PacketQueue,
}

/// Publishes audio-clock updates from the device callback thread. Cloned
/// out of a `PlayerSession` once, before the audio stream is
/// built, since the callback closure must be `'static` and cannot borrow the
/// session itself.
#[derive(Clone)]
pub struct AudioClockHandle {
    video_clock: Arc<Mutex<Clock>>,
    audio_clock: Arc<Mutex<Clock>>,
    external_clock: Arc<Mutex<Clock>>,
}

impl AudioClockHandle {
    /// `AudioPresenter::pull` needs a `&Clock` snapshot of whichever clock is
    /// currently master, to drive `synchronize_audio`. Locking
    /// for the duration of the pull mirrors the existing audio-callback
    /// simplification already in force here (decode happens synchronously
    /// inside `pull`, so this lock can be held slightly longer than a single
    /// `get()` would need) — see DESIGN.md.
    pub fn pull(&self, presenter: &mut AudioPresenter, wanted_len: usize, sync_type: SyncType, source_rate: u32) -> Option<crate::presenter_audio::PulledAudio> {
        match sync_type {
            SyncType::Audio => {
                let guard = self.audio_clock.lock();
                presenter.pull(wanted_len, sync_type, &guard, source_rate)
            }
            SyncType::Video => {
                let guard = self.video_clock.lock();
                presenter.pull(wanted_len, sync_type, &guard, source_rate)
            }
            SyncType::External => {
                let guard = self.external_clock.lock();
                presenter.pull(wanted_len, sync_type, &guard, source_rate)
            }
        }
    }

    /// Mirrors `presenter_video::tick`'s `video_clock.set(...); external_clock
    /// .sync_to_slave(video_clock);` pairing, for the audio side: rebase and
    /// publish the audio clock, then resync external to it.
    pub fn update(&self, pts: f64, serial: i64) {
        if pts.is_nan() {
            return;
        }
        self.audio_clock.lock().set(pts, serial);
        let audio_guard = self.audio_clock.lock();
        self.external_clock.lock().sync_to_slave(&audio_guard);
    }
}

/// The playback engine's top-level handle. One instance per open media
/// file; `shutdown` tears it down in reverse dependency order.
pub struct PlayerSession {
    config: Config,
    epoch: Instant,
    by_bytes: bool,
    duration_us: Option<i64>,

    control: Arc<DemuxerControl>,
    demuxer_thread: Option<JoinHandle<()>>,
    demuxer_events: crossbeam_channel::Receiver<DemuxerEvent>,

    video_clock: Arc<Mutex<Clock>>,
    audio_clock: Arc<Mutex<Clock>>,
    external_clock: Arc<Mutex<Clock>>,
    external_clock_serial: Arc<AtomicI64>,
    video_clock_serial: Arc<AtomicI64>,
    audio_clock_serial: Arc<AtomicI64>,

    video_queue: Option<PacketQueue>,
    audio_queue: Option<PacketQueue>,
    subtitle_queue: Option<PacketQueue>,
    video_frame_queue: Option<FrameQueue>,
    subtitle_frame_queue: Option<FrameQueue>,

    video_presenter: Option<VideoPresenter>,
    audio_presenter: Option<Arc<Mutex<AudioPresenter>>>,
    pending_audio: Option<PendingAudio>,

    video_thread: Option<JoinHandle<()>>,
    subtitle_thread: Option<JoinHandle<()>>,

    /// `VideoPresenter::frame_last_delay()`, published each tick so the
    /// video decoder thread's framedrop-early check can read it without
    /// owning the presenter.
    frame_last_delay_bits: Arc<AtomicU64>,
    frame_drops_early: Arc<AtomicU64>,
    faulty_dts: Arc<AtomicI64>,
    faulty_pts: Arc<AtomicI64>,

    paused: bool,
    muted: bool,
    volume: i32,
    pending_step: bool,
    sync_type: SyncType,

    last_stats_emit: Instant,
}

impl PlayerSession {
    /// Opens `config.input`, selects and opens the enabled stream components,
    /// and starts the demuxer + video/subtitle decoder threads.
    /// The audio path is left half-built until [`PlayerSession::attach_audio_output`]
    /// supplies the negotiated device format.
    pub fn open(config: Config) -> Result<Self> {
        let input = ffmpeg::format::input(&config.input).map_err(|e| PlayerError::OpenFailure(format!("{e}")))?;

        let format_name = input.format().name().to_string();
        let by_bytes = resolve_by_bytes(config.seek_by_bytes, &format_name);
        let duration_us = { let d = input.duration(); if d > 0 { Some(d) } else { None } };

        let epoch = Instant::now();

        let video_index = (!config.video_disable)
            .then(|| select_stream(&input, MediaType::Video, config.wanted_stream_video.as_deref()))
            .flatten();
        let audio_index = (!config.audio_disable)
            .then(|| select_stream(&input, MediaType::Audio, config.wanted_stream_audio.as_deref()))
            .flatten();
        let subtitle_index = (!config.subtitle_disable)
            .then(|| select_stream(&input, MediaType::Subtitle, config.wanted_stream_subtitle.as_deref()))
            .flatten();

        let video_clock_serial = Arc::new(AtomicI64::new(0));
        let audio_clock_serial = Arc::new(AtomicI64::new(0));
        let external_clock_serial = Arc::new(AtomicI64::new(0));

        let video_clock = Arc::new(Mutex::new(Clock::new(epoch, video_clock_serial.clone())));
        let audio_clock = Arc::new(Mutex::new(Clock::new(epoch, audio_clock_serial.clone())));
        let external_clock = Arc::new(Mutex::new(Clock::new(epoch, external_clock_serial.clone())));

        let mut video_active = None;
        let mut video_component = None;
        if let Some(idx) = video_index {
            let opened = open_stream_component(&input, idx, MediaType::Video, config.fast)?;
            let (component, active) = build_video_component(opened, &config, video_clock_serial.clone())?;
            video_component = Some(component);
            video_active = Some(active);
        }

        let mut audio_active = None;
        let mut pending_audio = None;
        if let Some(idx) = audio_index {
            let opened = open_stream_component(&input, idx, MediaType::Audio, config.fast)?;
            let (pending, active) = build_pending_audio(opened, audio_clock_serial.clone())?;
            pending_audio = Some(pending);
            audio_active = Some(active);
        }

        let mut subtitle_active = None;
        let mut subtitle_component = None;
        if let Some(idx) = subtitle_index {
            let opened = open_stream_component(&input, idx, MediaType::Subtitle, config.fast)?;
            let (component, active) = build_subtitle_component(opened)?;
            subtitle_component = Some(component);
            subtitle_active = Some(active);
        }

        let video_queue = video_component.as_ref().map(|c| c.queue.clone());
        let audio_queue = pending_audio.as_ref().map(|p| p.queue.clone());
        let subtitle_queue = subtitle_component.as_ref().map(|c| c.queue.clone());
        let video_frame_queue = video_component.as_ref().map(|c| c.frame_queue.clone());
        let subtitle_frame_queue = subtitle_component.as_ref().map(|c| c.frame_queue.clone());

        let (demuxer_tx, demuxer_events) = crossbeam_channel::unbounded();
        let control = Arc::new(DemuxerControl::new());
        let demuxer = Demuxer::new(
            input,
            &config,
            control.clone(),
            external_clock.clone(),
            external_clock_serial.clone(),
            video_active,
            audio_active,
            subtitle_active,
            demuxer_tx,
        );
        control.paused.store(false, Ordering::SeqCst);
        let demuxer_thread = std::thread::spawn(move || demuxer.run());

        let frame_last_delay_bits = Arc::new(AtomicU64::new(0.04f64.to_bits()));
        let frame_drops_early = Arc::new(AtomicU64::new(0));
        let faulty_dts = Arc::new(AtomicI64::new(0));
        let faulty_pts = Arc::new(AtomicI64::new(0));

        let video_presenter = video_component.as_ref().map(|c| {
            VideoPresenter::new(c.frame_queue.clone(), epoch, config.max_frame_duration(), config.framedrop)
        });

        let video_thread = video_component.map(|c| {
            spawn_video_worker(
                c.decoder,
                c.frame_queue,
                config.sync,
                video_clock.clone(),
                audio_clock.clone(),
                external_clock.clone(),
                frame_last_delay_bits.clone(),
                frame_drops_early.clone(),
                faulty_dts.clone(),
                faulty_pts.clone(),
            )
        });

        let subtitle_thread = subtitle_component.map(|c| spawn_subtitle_worker(c.decoder, c.frame_queue));

        Ok(Self {
            config: config.clone(),
            epoch,
            by_bytes,
            duration_us,
            control,
            demuxer_thread: Some(demuxer_thread),
            demuxer_events,
            video_clock,
            audio_clock,
            external_clock,
            external_clock_serial,
            video_clock_serial,
            audio_clock_serial,
            video_queue,
            audio_queue,
            subtitle_queue,
            video_frame_queue,
            subtitle_frame_queue,
            video_presenter,
            audio_presenter: None,
            pending_audio,
            video_thread,
            subtitle_thread,
            frame_last_delay_bits,
            frame_drops_early,
            faulty_dts,
            faulty_pts,
            paused: false,
            muted: false,
            volume: config.volume.clamp(0, mediaplay_core::constants::VOLUME_MAX),
            pending_step: false,
            sync_type: config.sync,
            last_stats_emit: epoch,
        })
    }

    /// Finishes building the audio path once the UI has opened a device and
    /// knows the sample rate/channel count it actually negotiated (spec
    /// §4.7). A no-op if this session has no audio stream.
    pub fn attach_audio_output(&mut self, sample_rate: u32, channels: u16, hw_buf_size: u32) -> Result<()> {
        let Some(pending) = self.pending_audio.take() else { return Ok(()) };
        let channel_layout = if channels >= 2 { ChannelLayout::STEREO } else { ChannelLayout::MONO };
        let target = crate::resample::AudioParams {
            format: Sample::F32(SampleType::Packed),
            channel_layout,
            rate: sample_rate,
        };
        let decoder = AudioDecoder::new(pending.core, pending.codec, target);
        let bytes_per_sec = sample_rate as f64 * channels as f64 * std::mem::size_of::<f32>() as f64;
        let presenter = AudioPresenter::new(decoder, pending.frame_queue, hw_buf_size, bytes_per_sec);
        let presenter = Arc::new(Mutex::new(presenter));
        presenter.lock().set_volume(self.volume);
        presenter.lock().set_muted(self.muted);
        self.audio_presenter = Some(presenter);
        Ok(())
    }

    pub fn audio_presenter(&self) -> Option<Arc<Mutex<AudioPresenter>>> {
        self.audio_presenter.clone()
    }

    /// Clonable handle the audio output callback uses to publish clock
    /// updates without needing `&mut self` — the callback runs on cpal's own
    /// thread, concurrently with the main thread's `tick_video`/`poll`/
    /// `handle_command` calls: the audio callback must not block, and must
    /// never contend with the main loop for `&mut` access to the session
    /// itself.
    pub fn audio_clock_handle(&self) -> AudioClockHandle {
        AudioClockHandle {
            video_clock: self.video_clock.clone(),
            audio_clock: self.audio_clock.clone(),
            external_clock: self.external_clock.clone(),
        }
    }

    /// One refresh-timer tick, called by the UI's draw loop.
    /// Returns the frame to present (if any) and the recommended wait
    /// before calling again.
    pub fn tick_video(&mut self) -> (Option<VideoFrame>, f64) {
        self.maybe_expire_subtitle();

        let Some(presenter) = self.video_presenter.as_mut() else {
            return (None, mediaplay_core::constants::REFRESH_RATE_SECS);
        };
        let mut vc = self.video_clock.lock();
        let mut ec = self.external_clock.lock();
        let master_value = match self.sync_type {
            SyncType::Video => vc.get(),
            SyncType::Audio => self.audio_clock.lock().get(),
            SyncType::External => ec.get(),
        };
        let outcome = presenter.tick(self.sync_type, &mut vc, master_value, &mut ec, self.paused);
        self.frame_last_delay_bits.store(presenter.frame_last_delay().to_bits(), Ordering::Relaxed);
        drop(vc);
        drop(ec);

        let presented = matches!(outcome, RefreshOutcome::Present { .. });
        if presented && self.pending_step {
            self.pending_step = false;
            self.toggle_pause();
        }
        self.adjust_external_clock_speed();
        match outcome {
            RefreshOutcome::Present { frame, remaining } => (Some(frame), remaining),
            RefreshOutcome::Wait { remaining } => (None, remaining),
        }
    }

    fn maybe_expire_subtitle(&mut self) {
        let Some(subq) = &self.subtitle_frame_queue else { return };
        let Some(vq) = &self.video_queue else { return };
        let video_pts_ms = (self.video_clock.lock().get() * 1000.0) as i64;
        let serial = vq.serial_handle();
        if subtitle_expired(subq, video_pts_ms, &serial) {
            subq.next();
        }
    }

    /// External clock speed control: nudges `external_clock`'s
    /// speed toward 1.0 or away from it based on how full the video/audio
    /// frame queues are, so a slow producer doesn't let the external clock
    /// run away from what's actually being decoded. Network-buffer-duration
    /// based control for realtime sources (rtp/rtsp) is not implemented —
    /// see DESIGN.md.
    fn adjust_external_clock_speed(&self) {
        if self.sync_type != SyncType::External {
            return;
        }
        let video_frames = self.video_frame_queue.as_ref().map(|q| q.nb_remaining() as i32);
        let audio_frames = self.audio_presenter.as_ref().map(|p| p.lock().frame_queue().nb_remaining() as i32);
        let min_frames = match (video_frames, audio_frames) {
            (Some(v), Some(a)) => v.min(a),
            (Some(v), None) => v,
            (None, Some(a)) => a,
            (None, None) => return,
        };
        let mut ec = self.external_clock.lock();
        let speed = ec.speed();
        if min_frames < EXTERNAL_CLOCK_MIN_FRAMES && speed > EXTERNAL_CLOCK_SPEED_MIN {
            ec.set_speed((speed - EXTERNAL_CLOCK_SPEED_STEP).max(EXTERNAL_CLOCK_SPEED_MIN));
        } else if min_frames > EXTERNAL_CLOCK_MAX_FRAMES && speed < EXTERNAL_CLOCK_SPEED_MAX {
            ec.set_speed((speed + EXTERNAL_CLOCK_SPEED_STEP).min(EXTERNAL_CLOCK_SPEED_MAX));
        } else if speed != 1.0 {
            let nudge = EXTERNAL_CLOCK_SPEED_STEP * (1.0 - speed).signum();
            ec.set_speed(speed + nudge);
        }
    }

    /// Drains demuxer-reported events, reacting to stream switches locally
    /// and translating the rest into `EngineEvent`s for the UI. Non-blocking.
    pub fn poll(&mut self) -> Vec<EngineEvent> {
        let mut out = Vec::new();
        while let Ok(event) = self.demuxer_events.try_recv() {
            match event {
                DemuxerEvent::Eof => out.push(EngineEvent::Eof),
                DemuxerEvent::Fatal(msg) => out.push(EngineEvent::Fatal(msg)),
                DemuxerEvent::StreamClosed { kind } => self.teardown_component(kind),
                DemuxerEvent::StreamOpened(opened) => self.adopt_component(opened),
            }
        }
        if self.last_stats_emit.elapsed() >= Duration::from_secs_f64(STATUS_LINE_INTERVAL_SECS) {
            self.last_stats_emit = Instant::now();
            out.push(EngineEvent::Stats(self.stats()));
        }
        out
    }

    fn teardown_component(&mut self, kind: MediaType) {
        match kind {
            MediaType::Video => {
                if let Some(t) = self.video_thread.take() {
                    let _ = t.join();
                }
                self.video_presenter = None;
                self.video_queue = None;
                self.video_frame_queue = None;
            }
            MediaType::Audio => {
                self.audio_presenter = None;
                self.pending_audio = None;
                self.audio_queue = None;
            }
            MediaType::Subtitle => {
                if let Some(t) = self.subtitle_thread.take() {
                    let _ = t.join();
                }
                self.subtitle_queue = None;
                self.subtitle_frame_queue = None;
            }
            _ => {}
        }
    }

    fn adopt_component(&mut self, opened: OpenedStream) {
        match opened.kind {
            MediaType::Video => {
                let serial_cell = Arc::new(AtomicI64::new(0));
                match build_video_component_from_opened(opened, &self.config, serial_cell.clone()) {
                    Ok(component) => {
                        self.video_clock_serial = serial_cell.clone();
                        *self.video_clock.lock() = Clock::new(self.epoch, serial_cell);
                        self.video_queue = Some(component.queue.clone());
                        self.video_frame_queue = Some(component.frame_queue.clone());
                        self.video_presenter = Some(VideoPresenter::new(
                            component.frame_queue.clone(),
                            self.epoch,
                            self.config.max_frame_duration(),
                            self.config.framedrop,
                        ));
                        self.video_thread = Some(spawn_video_worker(
                            component.decoder,
                            component.frame_queue,
                            self.sync_type,
                            self.video_clock.clone(),
                            self.audio_clock.clone(),
                            self.external_clock.clone(),
                            self.frame_last_delay_bits.clone(),
                            self.frame_drops_early.clone(),
                            self.faulty_dts.clone(),
                            self.faulty_pts.clone(),
                        ));
                    }
                    Err(e) => tracing::warn!("failed to adopt switched video stream: {e}"),
                }
            }
            MediaType::Audio => {
                let serial_cell = Arc::new(AtomicI64::new(0));
                match build_pending_audio_from_opened(opened, serial_cell.clone()) {
                    Ok(pending) => {
                        self.audio_clock_serial = serial_cell.clone();
                        *self.audio_clock.lock() = Clock::new(self.epoch, serial_cell);
                        self.audio_queue = Some(pending.queue.clone());
                        self.pending_audio = Some(pending);
                        // The caller (UI) must re-invoke attach_audio_output
                        // with the already-known device format to finish
                        // wiring the new component up.
                    }
                    Err(e) => tracing::warn!("failed to adopt switched audio stream: {e}"),
                }
            }
            MediaType::Subtitle => match build_subtitle_component_from_opened(opened) {
                Ok(component) => {
                    self.subtitle_queue = Some(component.queue.clone());
                    self.subtitle_frame_queue = Some(component.frame_queue.clone());
                    self.subtitle_thread = Some(spawn_subtitle_worker(component.decoder, component.frame_queue));
                }
                Err(e) => tracing::warn!("failed to adopt switched subtitle stream: {e}"),
            },
            _ => {}
        }
    }

    fn master_value(&self) -> f64 {
        match self.sync_type {
            SyncType::Video => self.video_clock.lock().get(),
            SyncType::Audio => self.audio_clock.lock().get(),
            SyncType::External => self.external_clock.lock().get(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.duration_us.map(|us| us as f64 / 1_000_000.0)
    }

    pub fn is_paused(&self) -> bool {
        self.paused
    }

    pub fn volume(&self) -> i32 {
        self.volume
    }

    pub fn is_muted(&self) -> bool {
        self.muted
    }

    /// Current playhead estimate for UI display, the same master-clock
    /// seconds value the console status line would show.
    pub fn position_secs(&self) -> f64 {
        self.current_position_secs()
    }

    fn current_position_secs(&self) -> f64 {
        let v = self.master_value();
        if v.is_nan() {
            self.config.start_time
        } else {
            v
        }
    }

    /// Console status line numbers. The tag/diff are picked by which streams
    /// actually exist, independent of the `-sync` master-clock preference:
    /// "A-V" (audio clock minus video clock) when both are open, "M-V"/"M-A"
    /// when only one is, "   " with neither.
    pub fn stats(&self) -> PlaybackStats {
        let master = self.master_value();
        let has_audio = self.audio_queue.is_some();
        let has_video = self.video_queue.is_some();
        let (sync_tag, av_diff) = match (has_audio, has_video) {
            (true, true) => {
                let a = self.audio_clock.lock().get();
                let v = self.video_clock.lock().get();
                (SyncTag::AudioMasterVideoSlave, a - v)
            }
            (false, true) => (SyncTag::MasterVideo, 0.0),
            (true, false) => (SyncTag::MasterAudio, 0.0),
            (false, false) => (SyncTag::Blank, 0.0),
        };
        let frame_drops_late = self.video_presenter.as_ref().map(|p| p.frame_drops_late).unwrap_or(0);
        PlaybackStats {
            master_clock: master,
            sync_tag,
            av_diff,
            frame_drops: self.frame_drops_early.load(Ordering::Relaxed) + frame_drops_late,
            audio_queue_bytes: self.audio_queue.as_ref().map(|q| q.size_bytes()).unwrap_or(0),
            video_queue_bytes: self.video_queue.as_ref().map(|q| q.size_bytes()).unwrap_or(0),
            subtitle_queue_bytes: self.subtitle_queue.as_ref().map(|q| q.size_bytes()).unwrap_or(0),
            faulty_dts: self.faulty_dts.load(Ordering::Relaxed),
            faulty_pts: self.faulty_pts.load(Ordering::Relaxed),
        }
    }

    /// Dispatches one UI-originated control command.
    pub fn handle_command(&mut self, cmd: ControlCommand) {
        match cmd {
            ControlCommand::TogglePause => self.toggle_pause(),
            ControlCommand::ToggleMute => self.toggle_mute(),
            ControlCommand::AdjustVolume { sign } => self.adjust_volume(sign),
            ControlCommand::SeekRelative { seconds } => self.seek_relative(seconds),
            ControlCommand::SeekFraction { fraction } => self.seek_fraction(fraction),
            ControlCommand::Step => self.step_frame(),
            ControlCommand::CycleAudioStream => self.control.request_stream_switch(MediaType::Audio),
            ControlCommand::CycleVideoStream => self.control.request_stream_switch(MediaType::Video),
            ControlCommand::CycleSubtitleStream => self.control.request_stream_switch(MediaType::Subtitle),
            ControlCommand::Quit => self.control.abort(),
        }
    }

    /// Pause/unpause, mirroring ffplay's `stream_toggle_pause`
    /// ordering: credit paused wall-time to the frame timer and re-anchor
    /// the video/external clocks *before* flipping the shared `paused` flag.
    fn toggle_pause(&mut self) {
        if self.paused {
            let last_updated = self.video_clock.lock().last_updated();
            if let Some(presenter) = self.video_presenter.as_mut() {
                presenter.account_for_pause(last_updated);
            }
            let mut vc = self.video_clock.lock();
            vc.set_paused(false);
            let (v, s) = (vc.get(), vc.serial());
            vc.set(v, s);
        }
        {
            let mut ec = self.external_clock.lock();
            let (v, s) = (ec.get(), ec.serial());
            ec.set(v, s);
        }
        self.paused = !self.paused;
        self.control.paused.store(self.paused, Ordering::SeqCst);
        self.video_clock.lock().set_paused(self.paused);
        self.audio_clock.lock().set_paused(self.paused);
        self.external_clock.lock().set_paused(self.paused);
    }

    fn toggle_mute(&mut self) {
        self.muted = !self.muted;
        if let Some(ap) = &self.audio_presenter {
            ap.lock().set_muted(self.muted);
        }
    }

    fn adjust_volume(&mut self, sign: i32) {
        self.volume = step_volume(self.volume, sign);
        if let Some(ap) = &self.audio_presenter {
            ap.lock().set_volume(self.volume);
        }
    }

    /// Relative seek. Byte-accurate seeking needs the
    /// demuxer's current `avio_tell()`, which only the demuxer thread can
    /// read; this approximates using the time-domain master clock position
    /// for both modes (exact for CBR sources, the common case) — see
    /// DESIGN.md.
    fn seek_relative(&mut self, seconds: f64) {
        if self.by_bytes {
            tracing::debug!("byte-accurate seeking not available from the session thread; approximating by time");
        }
        let pos = self.current_position_secs();
        let target_secs = (pos + seconds).max(0.0);
        let target_us = (target_secs * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
        let rel_us = (seconds * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
        self.control.request_seek(SeekRequest { target: target_us, rel: rel_us, by_bytes: false });
    }

    fn seek_fraction(&mut self, fraction: f64) {
        let fraction = fraction.clamp(0.0, 1.0);
        let Some(duration_us) = self.duration_us else { return };
        let target = (fraction * duration_us as f64) as i64;
        self.control.request_seek(SeekRequest { target, rel: 0, by_bytes: false });
    }

    /// Frame-step: unpause just long enough to let one frame
    /// through, then re-pause once it's presented.
    fn step_frame(&mut self) {
        if self.paused {
            self.toggle_pause();
        }
        self.pending_step = true;
        if let Some(p) = self.video_presenter.as_mut() {
            p.request_step();
        }
    }

    /// Tears everything down in reverse dependency order:
    /// stop accepting new work, wake every blocked thread, join, done.
    pub fn shutdown(mut self) {
        self.control.abort();
        if let Some(q) = &self.video_queue {
            q.abort();
        }
        if let Some(q) = &self.audio_queue {
            q.abort();
        }
        if let Some(q) = &self.subtitle_queue {
            q.abort();
        }
        if let Some(fq) = &self.video_frame_queue {
            fq.signal();
        }
        if let Some(fq) = &self.subtitle_frame_queue {
            fq.signal();
        }
        if let Some(t) = self.demuxer_thread.take() {
            let _ = t.join();
        }
        if let Some(t) = self.video_thread.take() {
            let _ = t.join();
        }
        if let Some(t) = self.subtitle_thread.take() {
            let _ = t.join();
        }
    }
}

fn build_video_component(
    opened: OpenedStream,
    config: &Config,
    serial_cell: Arc<AtomicI64>,
) -> Result<(VideoComponent, crate::demux::ActiveStream)> {
    let active = active_stream_from(&opened);
    let component = build_video_component_from_opened(opened, config, serial_cell)?;
    Ok((component, active))
}

fn build_video_component_from_opened(opened: OpenedStream, config: &Config, serial_cell: Arc<AtomicI64>) -> Result<VideoComponent> {
    let OpenedStream { stream_index: _, mut codec_ctx, time_base, frame_rate, is_attached_picture, queue, frame_queue, finished_cell, .. } = opened;
    if config.lowres > 0 {
        unsafe {
            let raw = codec_ctx.as_mut_ptr();
            (*raw).lowres = config.lowres;
        }
    }
    let av_decoder = codec_ctx
        .decoder()
        .video()
        .map_err(|e| PlayerError::OpenFailure(format!("video decoder: {e}")))?;
    let out_w = av_decoder.width().max(1);
    let out_h = av_decoder.height().max(1);
    let core = DecoderCore::new(queue.clone(), serial_cell, finished_cell);
    let decoder = VideoDecoder::new(core, av_decoder, time_base, frame_rate, out_w, out_h, is_attached_picture, config.framedrop);
    Ok(VideoComponent { decoder, frame_queue, queue })
}

fn build_pending_audio(opened: OpenedStream, serial_cell: Arc<AtomicI64>) -> Result<(PendingAudio, crate::demux::ActiveStream)> {
    let active = active_stream_from(&opened);
    let pending = build_pending_audio_from_opened(opened, serial_cell)?;
    Ok((pending, active))
}

fn build_pending_audio_from_opened(opened: OpenedStream, serial_cell: Arc<AtomicI64>) -> Result<PendingAudio> {
    let OpenedStream { codec_ctx, queue, frame_queue, finished_cell, .. } = opened;
    let codec = codec_ctx
        .decoder()
        .audio()
        .map_err(|e| PlayerError::OpenFailure(format!("audio decoder: {e}")))?;
    let core = DecoderCore::new(queue.clone(), serial_cell, finished_cell);
    Ok(PendingAudio { core, codec, frame_queue, queue })
}

fn build_subtitle_component(opened: OpenedStream) -> Result<(SubtitleComponent, crate::demux::ActiveStream)> {
    let active = active_stream_from(&opened);
    let component = build_subtitle_component_from_opened(opened)?;
    Ok((component, active))
}

fn build_subtitle_component_from_opened(opened: OpenedStream) -> Result<SubtitleComponent> {
    let OpenedStream { mut codec_ctx, queue, frame_queue, finished_cell, .. } = opened;
    // Bitmap subtitle canvases (PGS/DVD) carry their rendering size on the
    // codec context itself, the same raw fields `lowres`/`flags2` are read
    // from elsewhere in this module.
    let (w, h) = unsafe {
        let raw = codec_ctx.as_mut_ptr();
        ((*raw).width.max(0) as u32, (*raw).height.max(0) as u32)
    };
    let codec = codec_ctx
        .decoder()
        .subtitle()
        .map_err(|e| PlayerError::OpenFailure(format!("subtitle decoder: {e}")))?;
    let core = DecoderCore::new(queue.clone(), Arc::new(AtomicI64::new(0)), finished_cell);
    let decoder = SubtitleDecoder::new(core, codec, w, h);
    Ok(SubtitleComponent { decoder, frame_queue, queue })
}

fn active_stream_from(opened: &OpenedStream) -> crate::demux::ActiveStream {
    crate::demux::ActiveStream {
        index: opened.stream_index,
        queue: opened.queue.clone(),
        frame_queue: opened.frame_queue.clone(),
        finished_cell: opened.finished_cell.clone(),
        is_attached_picture: opened.is_attached_picture,
        time_base: opened.time_base,
    }
}

#[allow(clippy::too_many_arguments)]
fn spawn_video_worker(
    mut decoder: VideoDecoder,
    frame_queue: FrameQueue,
    sync_type: SyncType,
    video_clock: Arc<Mutex<Clock>>,
    audio_clock: Arc<Mutex<Clock>>,
    external_clock: Arc<Mutex<Clock>>,
    frame_last_delay_bits: Arc<AtomicU64>,
    frame_drops_early: Arc<AtomicU64>,
    faulty_dts: Arc<AtomicI64>,
    faulty_pts: Arc<AtomicI64>,
) -> JoinHandle<()> {
    std::thread::spawn(move || loop {
        match decoder.decode_one() {
            DecodeOutcome::Frame(frame) => {
                faulty_dts.store(decoder.core().faulty_dts, Ordering::Relaxed);
                faulty_pts.store(decoder.core().faulty_pts, Ordering::Relaxed);

                if !decoder.is_attached_picture {
                    let master_is_video = sync_type == SyncType::Video;
                    let master_value = match sync_type {
                        SyncType::Audio => audio_clock.lock().get(),
                        SyncType::Video => video_clock.lock().get(),
                        SyncType::External => external_clock.lock().get(),
                    };
                    let filter_delay = f64::from_bits(frame_last_delay_bits.load(Ordering::Relaxed));
                    if should_drop_early(decoder.framedrop_enabled, master_is_video, frame.pts, master_value, filter_delay) {
                        frame_drops_early.fetch_add(1, Ordering::Relaxed);
                        continue;
                    }
                }

                let Ok(idx) = frame_queue.peek_writable() else { return };
                frame_queue.write_slot(idx, frame);
                frame_queue.push();
            }
            DecodeOutcome::Transient => continue,
            DecodeOutcome::Eof => {
                std::thread::sleep(Duration::from_millis(10));
            }
            DecodeOutcome::Aborted => return,
        }
    })
}

fn spawn_subtitle_worker(mut decoder: SubtitleDecoder, frame_queue: FrameQueue) -> JoinHandle<()> {
    std::thread::spawn(move || loop {
        match decoder.decode_one() {
            DecodeOutcome::Frame(frame) => {
                let Ok(idx) = frame_queue.peek_writable() else { return };
                frame_queue.write_slot(idx, frame);
                frame_queue.push();
            }
            DecodeOutcome::Transient => continue,
            DecodeOutcome::Eof => {
                std::thread::sleep(Duration::from_millis(10));
            }
            DecodeOutcome::Aborted => return,
        }
    })
}

/// Applies volume/mute to a freshly-pulled audio chunk; a thin
/// re-export point so `mediaplay-ui`'s cpal callback doesn't need to reach
/// into `presenter_audio` directly for this one call.
pub fn apply_output_volume(samples: &mut [f32], volume: i32, muted: bool) {
    apply_volume(samples, volume, muted)
}

/// `StartByBytes` re-export so the UI crate can display the resolved mode
/// without importing `mediaplay_core::config` itself.
pub fn byte_seek_resolved(mode: StartByBytes, format_name: &str) -> bool {
    resolve_by_bytes(mode, format_name)
}

pub use crate::demux::DemuxerControl as Control;
