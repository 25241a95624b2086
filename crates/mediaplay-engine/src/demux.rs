// crates/mediaplay-engine/src/demux.rs
//
// Demuxer loop, stream-component open, and seek coordination. The demuxer
// owns the single `ffmpeg::format::context::Input` and is the only thread
// that touches it; everything else communicates through packet queues,
// shared atomics, and the seek-request slot.

use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use ffmpeg_the_third as ffmpeg;
use ffmpeg::format::context::Input;
use ffmpeg::media::Type as MediaType;
use parking_lot::{Condvar, Mutex};

use mediaplay_core::constants::{
    DEMUX_THROTTLE_WAIT_SECS, EOF_BACKOFF_SECS, MAX_QUEUE_SIZE, MIN_FRAMES, MIN_QUEUE_DURATION_SECS,
};
use mediaplay_core::{Config, PlayerError, Result, StartByBytes};

use crate::clock::Clock;
use crate::frame_queue::FrameQueue;
use crate::packet::PacketEntry;
use crate::packet_queue::PacketQueue;

/// One active demuxed stream: a video, audio, or subtitle component.
pub struct ActiveStream {
    pub index: usize,
    pub queue: PacketQueue,
    /// Used for the drain check in step 6: `finished == queue.serial()` and
    /// the frame queue is empty.
    pub frame_queue: FrameQueue,
    pub finished_cell: Arc<AtomicI64>,
    pub is_attached_picture: bool,
    /// Stream time-base, `(numerator, denominator)`, needed to turn
    /// `queue.duration_units()` (raw packet-duration ticks) into seconds.
    pub time_base: (i32, i32),
}

impl ActiveStream {
    fn enough_packets(&self) -> bool {
        if self.queue.is_aborted() {
            return true;
        }
        if self.is_attached_picture {
            return true;
        }
        let count_ok = self.queue.nb_packets() as i32 > MIN_FRAMES;
        let duration = self.queue.duration_units();
        let time_base_secs = self.time_base.0 as f64 / self.time_base.1.max(1) as f64;
        let duration_ok = duration <= 0 || (duration as f64 * time_base_secs) > MIN_QUEUE_DURATION_SECS;
        count_ok && duration_ok
    }

    fn drained(&self) -> bool {
        self.finished_cell.load(Ordering::SeqCst) == self.queue.serial() && self.frame_queue.nb_remaining() == 0
    }
}

/// Seek request queued by the control/input layer.
#[derive(Clone, Copy, Debug)]
pub struct SeekRequest {
    /// Target position: microseconds (time seek) or bytes (byte seek).
    pub target: i64,
    /// Signed offset from the prior position, used to widen the seek window
    /// by ±2 units to compensate for rounding.
    pub rel: i64,
    pub by_bytes: bool,
}

/// Shared mutable coordination state between the demuxer thread and the rest
/// of the session (main thread, audio callback): global playback state
/// fields read by the decoder/presenter threads.
pub struct DemuxerControl {
    pub paused: AtomicBool,
    pub seek_request: Mutex<Option<SeekRequest>>,
    /// Requests the demuxer — the sole owner of `Input` — close the current
    /// component of `MediaType` and open the next one of that kind. Rust's
    /// ownership of `Input` forces this through the demuxer thread rather
    /// than letting the session reopen it directly.
    pub stream_switch: Mutex<Option<MediaType>>,
    pub abort: AtomicBool,
    cond: Condvar,
}

impl DemuxerControl {
    pub fn new() -> Self {
        Self {
            paused: AtomicBool::new(false),
            seek_request: Mutex::new(None),
            stream_switch: Mutex::new(None),
            abort: AtomicBool::new(false),
            cond: Condvar::new(),
        }
    }

    pub fn request_seek(&self, req: SeekRequest) {
        *self.seek_request.lock() = Some(req);
        self.cond.notify_all();
    }

    pub fn request_stream_switch(&self, kind: MediaType) {
        *self.stream_switch.lock() = Some(kind);
        self.cond.notify_all();
    }

    pub fn abort(&self) {
        self.abort.store(true, Ordering::SeqCst);
        self.cond.notify_all();
    }
}

impl Default for DemuxerControl {
    fn default() -> Self {
        Self::new()
    }
}

/// Events the demuxer reports upward; the session translates these into
/// `EngineEvent`s for the UI.
pub enum DemuxerEvent {
    Eof,
    Fatal(String),
    /// A stream component finished opening after a cycle request.
    /// The session builds the concrete `{Video,Audio,Subtitle}Decoder` +
    /// presenter from this and spawns its worker thread.
    StreamOpened(OpenedStream),
    /// The previous component of `kind` was torn down to make way for the
    /// one in the paired `StreamOpened` (always sent first).
    StreamClosed { kind: MediaType },
}

/// Everything the session needs to build a decoder + presenter for a stream
/// component the demuxer just opened. Carries an owned, already-detached
/// `codec::context::Context` — cheap to hand across the channel since it no
/// longer borrows `Input`.
pub struct OpenedStream {
    pub kind: MediaType,
    pub stream_index: usize,
    pub codec_ctx: ffmpeg::codec::context::Context,
    pub time_base: (i32, i32),
    pub frame_rate: Option<(i32, i32)>,
    pub is_attached_picture: bool,
    pub queue: PacketQueue,
    pub frame_queue: FrameQueue,
    /// Shared with this component's `ActiveStream` so the demuxer's drain
    /// check (step 6) observes what the session's decoder thread publishes.
    pub finished_cell: Arc<AtomicI64>,
}

/// Opens codec context + packet/frame queues for `stream_index`. Used both
/// for the session's initial stream selection and for the demuxer's
/// mid-playback stream-cycle handling, so both paths build identically-
/// shaped components.
pub fn open_stream_component(input: &Input, stream_index: usize, kind: MediaType, fast: bool) -> Result<OpenedStream> {
    use mediaplay_core::constants::{SAMPLE_QUEUE_SIZE, SUBPICTURE_QUEUE_SIZE, VIDEO_PICTURE_QUEUE_SIZE};

    let codec_ctx = open_codec_context(input, stream_index, fast)?;
    let stream = input
        .stream(stream_index)
        .ok_or_else(|| PlayerError::OpenFailure(format!("stream {stream_index} not found")))?;
    let time_base = (stream.time_base().numerator(), stream.time_base().denominator());
    let frame_rate = {
        let fr = stream.rate();
        if fr.numerator() != 0 && fr.denominator() != 0 {
            Some((fr.numerator(), fr.denominator()))
        } else {
            None
        }
    };
    let is_attached_picture = is_attached_picture(input, stream_index);

    let queue = PacketQueue::new();
    queue.start(stream_index);
    let frame_queue = match kind {
        MediaType::Video => FrameQueue::new(queue.clone(), VIDEO_PICTURE_QUEUE_SIZE, true),
        MediaType::Audio => FrameQueue::new(queue.clone(), SAMPLE_QUEUE_SIZE, false),
        MediaType::Subtitle => FrameQueue::new(queue.clone(), SUBPICTURE_QUEUE_SIZE, false),
        _ => return Err(PlayerError::InvalidInput(format!("unsupported stream kind {kind:?}"))),
    };

    let finished_cell = Arc::new(AtomicI64::new(0));
    Ok(OpenedStream { kind, stream_index, codec_ctx, time_base, frame_rate, is_attached_picture, queue, frame_queue, finished_cell })
}

/// Cyclic "next stream of this kind": the index immediately after `current`
/// among streams of `kind`, wrapping around, or the first one if nothing is
/// currently open.
pub fn next_stream_index(input: &Input, kind: MediaType, current: Option<usize>) -> Option<usize> {
    let candidates: Vec<usize> = input
        .streams()
        .filter(|s| s.parameters().medium() == kind)
        .map(|s| s.index())
        .collect();
    if candidates.is_empty() {
        return None;
    }
    match current.and_then(|cur| candidates.iter().position(|&i| i == cur)) {
        Some(pos) => Some(candidates[(pos + 1) % candidates.len()]),
        None => candidates.into_iter().next(),
    }
}

pub struct Demuxer {
    input: Input,
    control: Arc<DemuxerControl>,
    external_clock: Arc<Mutex<Clock>>,
    external_clock_serial: Arc<AtomicI64>,
    video: Option<ActiveStream>,
    audio: Option<ActiveStream>,
    subtitle: Option<ActiveStream>,
    is_realtime: bool,
    eof_signaled: bool,
    attached_picture_pending: bool,
    play_start_us: i64,
    play_end_us: Option<i64>,
    loop_count: i32,
    loops_remaining: i32,
    autoexit: bool,
    infbuf: bool,
    fast: bool,
    event_tx: crossbeam_channel::Sender<DemuxerEvent>,
}

impl Demuxer {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        input: Input,
        config: &Config,
        control: Arc<DemuxerControl>,
        external_clock: Arc<Mutex<Clock>>,
        external_clock_serial: Arc<AtomicI64>,
        video: Option<ActiveStream>,
        audio: Option<ActiveStream>,
        subtitle: Option<ActiveStream>,
        event_tx: crossbeam_channel::Sender<DemuxerEvent>,
    ) -> Self {
        let is_realtime = detect_realtime(&input, &config.input);
        let play_start_us = (config.start_time * ffmpeg::ffi::AV_TIME_BASE as f64) as i64;
        let play_end_us = config
            .duration
            .map(|d| play_start_us + (d * ffmpeg::ffi::AV_TIME_BASE as f64) as i64);
        let attached_picture_pending = video.as_ref().is_some_and(|v| v.is_attached_picture);
        Self {
            input,
            control,
            external_clock,
            external_clock_serial,
            video,
            audio,
            subtitle,
            is_realtime,
            eof_signaled: false,
            attached_picture_pending,
            play_start_us,
            play_end_us,
            loop_count: config.loop_count,
            loops_remaining: config.loop_count,
            autoexit: config.autoexit,
            infbuf: config.infbuf,
            fast: config.fast,
            event_tx,
        }
    }

    fn active_streams(&self) -> impl Iterator<Item = &ActiveStream> {
        [self.video.as_ref(), self.audio.as_ref(), self.subtitle.as_ref()]
            .into_iter()
            .flatten()
    }

    fn aggregate_queue_size(&self) -> u64 {
        self.active_streams().map(|s| s.queue.size_bytes()).sum()
    }

    fn all_enough_packets(&self) -> bool {
        self.active_streams().all(|s| s.enough_packets())
    }

    fn all_drained(&self) -> bool {
        self.active_streams().all(|s| s.drained())
    }

    fn queue_for(&self, stream_index: usize) -> Option<&ActiveStream> {
        self.active_streams().find(|s| s.index == stream_index)
    }

    /// The demuxer's main loop. Runs until abort or a fatal condition, on
    /// its own thread.
    pub fn run(mut self) {
        loop {
            if self.control.abort.load(Ordering::SeqCst) {
                return;
            }

            // Step 3: seek request.
            if let Some(req) = self.control.seek_request.lock().take() {
                if let Err(e) = self.perform_seek(req) {
                    tracing::warn!("seek failed: {e}");
                }
            }

            // Stream cycling, handled alongside seeking since both are
            // demuxer-thread-only operations on `Input`.
            if let Some(kind) = self.control.stream_switch.lock().take() {
                self.cycle_stream(kind);
            }

            // Step 4: attached-picture delivery.
            if self.attached_picture_pending {
                self.deliver_attached_picture();
                self.attached_picture_pending = false;
            }

            // Step 5: throttle.
            if !self.infbuf
                && (self.aggregate_queue_size() > MAX_QUEUE_SIZE || self.all_enough_packets())
            {
                std::thread::sleep(Duration::from_secs_f64(DEMUX_THROTTLE_WAIT_SECS));
                continue;
            }

            // Step 6: drain / loop / autoexit.
            if !self.control.paused.load(Ordering::SeqCst) && self.all_drained() {
                if self.loop_count == 0 || self.loops_remaining > 1 {
                    if self.loops_remaining > 1 {
                        self.loops_remaining -= 1;
                    }
                    if let Err(e) = self.perform_seek(SeekRequest { target: self.play_start_us, rel: 0, by_bytes: false }) {
                        tracing::warn!("loop seek failed: {e}");
                    }
                    continue;
                } else if self.autoexit {
                    let _ = self.event_tx.send(DemuxerEvent::Eof);
                    return;
                } else {
                    std::thread::sleep(Duration::from_secs_f64(DEMUX_THROTTLE_WAIT_SECS));
                    continue;
                }
            }

            // Step 7: read one packet.
            let next = self.input.packets().next();
            let (stream, packet) = match next {
                Some(Ok(pair)) => pair,
                Some(Err(_)) | None => {
                    if !self.eof_signaled {
                        for s in self.active_streams() {
                            s.queue.put(PacketEntry::eof_marker(s.index, s.queue.serial()));
                        }
                        self.eof_signaled = true;
                    }
                    std::thread::sleep(Duration::from_secs_f64(EOF_BACKOFF_SECS));
                    continue;
                }
            };

            // Step 8: filter by play range, dispatch.
            let idx = stream.index();
            let Some(active) = self.queue_for(idx) else { continue };
            if active.is_attached_picture {
                continue;
            }
            if !self.in_play_range(&packet) {
                continue;
            }
            let serial = active.queue.serial();
            active.queue.put(PacketEntry::data(idx, packet, serial));
        }
    }

    fn in_play_range(&self, packet: &ffmpeg::Packet) -> bool {
        let Some(end) = self.play_end_us else { return true };
        let ts = packet.pts().or_else(|| packet.dts());
        match ts {
            Some(ts) => ts <= end,
            None => true,
        }
    }

    fn deliver_attached_picture(&mut self) {
        let Some(video) = &self.video else { return };
        if !video.is_attached_picture {
            return;
        }
        let idx = video.index;
        if let Some(stream) = self.input.stream(idx) {
            if let Some(packet) = stream.attached_pic() {
                let serial = video.queue.serial();
                video.queue.put(PacketEntry::data(idx, packet, serial));
            }
        }
        let serial = video.queue.serial();
        video.queue.put(PacketEntry::eof_marker(idx, serial));
    }

    /// Returns `Err` on a failed library seek — a log-and-continue condition,
    /// not one of `PlayerError`'s propagating kinds.
    fn perform_seek(&mut self, req: SeekRequest) -> std::result::Result<(), String> {
        let seek_min = if req.rel > 0 { req.target.saturating_sub(req.rel).saturating_add(2) } else { i64::MIN };
        let seek_max = if req.rel < 0 { req.target.saturating_sub(req.rel).saturating_sub(2) } else { i64::MAX };
        let flags = if req.by_bytes { ffmpeg::ffi::AVSEEK_FLAG_BYTE } else { 0 };
        let ret = unsafe {
            ffmpeg::ffi::avformat_seek_file(self.input.as_mut_ptr(), -1, seek_min, req.target, seek_max, flags)
        };
        if ret < 0 {
            return Err(format!("avformat_seek_file returned {ret}"));
        }
        for s in self.active_streams() {
            s.queue.flush();
            let serial = s.queue.serial();
            s.queue.put(PacketEntry::flush_sentinel(s.index, serial));
        }
        let mut ext = self.external_clock.lock();
        if req.by_bytes {
            ext.set(f64::NAN, ext.serial());
        } else {
            let secs = req.target as f64 / ffmpeg::ffi::AV_TIME_BASE as f64;
            let new_serial = ext.serial() + 1;
            self.external_clock_serial.store(new_serial, Ordering::SeqCst);
            ext.set(secs, new_serial);
        }
        self.eof_signaled = false;
        Ok(())
    }

    /// Closes the current component of `kind` (if any) and opens the next
    /// one, reporting both through `event_tx`. A no-op if the input has no
    /// other stream of this kind.
    fn cycle_stream(&mut self, kind: MediaType) {
        let slot = match kind {
            MediaType::Video => &mut self.video,
            MediaType::Audio => &mut self.audio,
            MediaType::Subtitle => &mut self.subtitle,
            _ => return,
        };
        let current = slot.as_ref().map(|s| s.index);
        let Some(next_index) = next_stream_index(&self.input, kind, current) else {
            return;
        };
        if Some(next_index) == current {
            return;
        }

        let opened = match open_stream_component(&self.input, next_index, kind, self.fast) {
            Ok(o) => o,
            Err(e) => {
                tracing::warn!("stream switch failed: {e}");
                return;
            }
        };

        if let Some(old) = slot.take() {
            old.queue.abort();
            old.frame_queue.signal();
            let _ = self.event_tx.send(DemuxerEvent::StreamClosed { kind });
        }

        *slot = Some(ActiveStream {
            index: opened.stream_index,
            queue: opened.queue.clone(),
            frame_queue: opened.frame_queue.clone(),
            finished_cell: opened.finished_cell.clone(),
            is_attached_picture: opened.is_attached_picture,
            time_base: opened.time_base,
        });
        let _ = self.event_tx.send(DemuxerEvent::StreamOpened(opened));
    }
}

/// Realtime detection: container format name or URL scheme indicates a live
/// network source whose clock the external-speed-control logic must track
/// via buffer fullness rather than wall time.
fn detect_realtime(input: &Input, url: &str) -> bool {
    const REALTIME_FORMATS: &[&str] = &["rtp", "rtsp", "sdp"];
    let format_name = input.format().name();
    if REALTIME_FORMATS.contains(&format_name) {
        return true;
    }
    url.starts_with("rtp:") || url.starts_with("udp:")
}

/// Opens a codec context for `stream_index` with `lowres`/`fast` hints
/// applied. Returns the raw `codec::context::Context`; callers downcast to
/// `.video()`/`.audio()`/`.subtitle()`.
pub fn open_codec_context(input: &Input, stream_index: usize, fast: bool) -> Result<ffmpeg::codec::context::Context> {
    let stream = input
        .stream(stream_index)
        .ok_or_else(|| PlayerError::OpenFailure(format!("stream {stream_index} not found")))?;
    let mut ctx = ffmpeg::codec::context::Context::from_parameters(stream.parameters())
        .map_err(|e| PlayerError::OpenFailure(format!("codec context: {e}")))?;
    if fast {
        unsafe {
            let raw = ctx.as_mut_ptr();
            (*raw).flags2 |= ffmpeg::ffi::AV_CODEC_FLAG2_FAST as i32;
        }
    }
    Ok(ctx)
}

/// Picks the best stream of `kind`, honoring an explicit user specifier
/// (parsed as a plain stream index, matching ffplay's numeric specifier form;
/// full stream-specifier syntax is the opaque demux library's concern) when
/// given, otherwise falling back to the library's own heuristic.
pub fn select_stream(input: &Input, kind: MediaType, wanted: Option<&str>) -> Option<usize> {
    if let Some(spec) = wanted {
        if let Ok(idx) = spec.parse::<usize>() {
            if input.stream(idx).is_some() {
                return Some(idx);
            }
        }
    }
    input.streams().best(kind).map(|s| s.index())
}

pub fn is_attached_picture(input: &Input, stream_index: usize) -> bool {
    input
        .stream(stream_index)
        .map(|s| s.disposition().contains(ffmpeg::format::stream::Disposition::ATTACHED_PIC))
        .unwrap_or(false)
}

pub fn resolve_by_bytes(mode: StartByBytes, format_name: &str) -> bool {
    match mode {
        StartByBytes::Yes => true,
        StartByBytes::No => false,
        StartByBytes::Auto => !format_name.contains("pipe"),
    }
}
