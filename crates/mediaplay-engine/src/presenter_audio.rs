// crates/mediaplay-engine/src/presenter_audio.rs
//
// Pull-callback audio presenter. The device callback itself belongs to the
// opaque audio-output toolkit (cpal, in `mediaplay-ui`); this owns the
// fill-buffer algorithm, `synchronize_audio`, and the audio clock update
// that the callback invokes on every pull.

use mediaplay_core::config::SyncType;
use mediaplay_core::constants::{AUDIO_DIFF_AVG_NB, AV_NOSYNC_THRESHOLD, SAMPLE_CORRECTION_PERCENT_MAX};

use crate::clock::Clock;
use crate::decoder::audio::{AudioDecoder, RawDecode};
use crate::decoder::DecodeOutcome;
use crate::frame_queue::FrameQueue;

/// Running state for `synchronize_audio`. The averaging coefficient is
/// fixed: `exp(ln(0.01)/AUDIO_DIFF_AVG_NB)`, so after
/// `AUDIO_DIFF_AVG_NB` samples the running average has decayed to 1% of an
/// initial step.
struct AudioDiffAverager {
    coef: f64,
    cum: f64,
    avg_count: u32,
    threshold: f64,
}

impl AudioDiffAverager {
    fn new(hw_buf_size: u32, bytes_per_sec: f64) -> Self {
        Self {
            coef: (0.01f64.ln() / AUDIO_DIFF_AVG_NB as f64).exp(),
            cum: 0.0,
            avg_count: 0,
            threshold: hw_buf_size as f64 / bytes_per_sec,
        }
    }

    /// Returns `Some(avg_diff)` once enough samples have accumulated and the
    /// magnitude clears the threshold, `None` otherwise (no compensation).
    fn push(&mut self, diff: f64) -> Option<f64> {
        if diff.abs() >= AV_NOSYNC_THRESHOLD {
            self.cum = 0.0;
            self.avg_count = 0;
            return None;
        }
        self.cum = diff + self.coef * self.cum;
        self.avg_count += 1;
        if self.avg_count < AUDIO_DIFF_AVG_NB {
            return None;
        }
        let avg = self.cum * (1.0 - self.coef);
        if avg.abs() >= self.threshold {
            Some(avg)
        } else {
            None
        }
    }
}

/// `synchronize_audio(nb_samples) -> wanted_nb_samples`. Only called when
/// master is not audio.
pub fn synchronize_audio(averager: &mut AudioDiffAverager, nb_samples: usize, audio_clock: f64, master_clock: f64, source_rate: u32) -> usize {
    if audio_clock.is_nan() || master_clock.is_nan() {
        return nb_samples;
    }
    let diff = audio_clock - master_clock;
    match averager.push(diff) {
        Some(avg) => {
            let wanted = nb_samples as f64 + avg * source_rate as f64;
            let lo = nb_samples as f64 * (1.0 - SAMPLE_CORRECTION_PERCENT_MAX / 100.0);
            let hi = nb_samples as f64 * (1.0 + SAMPLE_CORRECTION_PERCENT_MAX / 100.0);
            wanted.clamp(lo, hi).round().max(0.0) as usize
        }
        None => nb_samples,
    }
}

pub struct AudioPresenter {
    decoder: AudioDecoder,
    frame_queue: FrameQueue,
    averager: AudioDiffAverager,
    audio_clock: f64,
    audio_clock_serial: i64,
    volume: i32,
    muted: bool,
    leftover: Vec<f32>,
    leftover_serial: i64,
}

/// One pull result: interleaved f32 samples plus the serial they carry, so
/// the caller can detect a stale buffer across a seek.
pub struct PulledAudio {
    pub samples: Vec<f32>,
    pub serial: i64,
}

impl AudioPresenter {
    pub fn new(decoder: AudioDecoder, frame_queue: FrameQueue, hw_buf_size: u32, bytes_per_sec: f64) -> Self {
        Self {
            decoder,
            frame_queue,
            averager: AudioDiffAverager::new(hw_buf_size, bytes_per_sec),
            audio_clock: f64::NAN,
            audio_clock_serial: -1,
            volume: mediaplay_core::constants::VOLUME_MAX,
            muted: false,
            leftover: Vec::new(),
            leftover_serial: -1,
        }
    }

    pub fn set_volume(&mut self, volume: i32) {
        self.volume = volume.clamp(0, mediaplay_core::constants::VOLUME_MAX);
    }

    pub fn set_muted(&mut self, muted: bool) {
        self.muted = muted;
    }

    /// Current volume/mute, for the device callback to apply to a freshly
    /// pulled chunk via `apply_volume` without the UI having to track its
    /// own copy of state the session already owns here.
    pub fn volume(&self) -> i32 {
        self.volume
    }

    pub fn muted(&self) -> bool {
        self.muted
    }

    /// Pulls (or decodes) enough samples to fill `wanted_len` interleaved
    /// f32s, applying `synchronize_audio` when master isn't audio. Returns
    /// `None` at genuine EOF with nothing buffered (caller should output
    /// silence).
    pub fn pull(&mut self, wanted_len: usize, master: SyncType, master_clock: &Clock, source_rate: u32) -> Option<PulledAudio> {
        while self.leftover.len() < wanted_len {
            let decoded = match self.decoder.decode_raw_frame() {
                RawDecode::Frame(decoded) => decoded,
                RawDecode::Eof | RawDecode::Aborted => return self.drain_or_none(wanted_len),
                RawDecode::Transient => continue,
            };

            let nb_samples = decoded.samples();
            let wanted_nb_samples = if master != SyncType::Audio && !self.audio_clock.is_nan() {
                synchronize_audio(&mut self.averager, nb_samples, self.audio_clock, master_clock.get(), source_rate)
            } else {
                nb_samples
            };

            match self.decoder.resample_frame(decoded, wanted_nb_samples) {
                DecodeOutcome::Frame(frame) => {
                    if frame.serial != self.leftover_serial && !self.leftover.is_empty() {
                        // Stale carryover from a prior epoch; drop it, keep the new frame.
                        self.leftover.clear();
                    }
                    self.leftover_serial = frame.serial;
                    if let Some(audio) = frame_audio(&frame) {
                        self.leftover.extend_from_slice(&audio.samples);
                        self.audio_clock = if frame.pts.is_nan() {
                            f64::NAN
                        } else {
                            frame.pts + audio.nb_samples as f64 / audio.sample_rate as f64
                        };
                        self.audio_clock_serial = frame.serial;
                    }
                }
                DecodeOutcome::Eof | DecodeOutcome::Aborted => return self.drain_or_none(wanted_len),
                DecodeOutcome::Transient => continue,
            }
        }

        let take = wanted_len.min(self.leftover.len());
        let samples = self.leftover.drain(..take).collect();
        Some(PulledAudio { samples, serial: self.leftover_serial })
    }

    fn drain_or_none(&mut self, wanted_len: usize) -> Option<PulledAudio> {
        if self.leftover.is_empty() {
            return None;
        }
        let take = wanted_len.min(self.leftover.len());
        let samples = self.leftover.drain(..take).collect();
        Some(PulledAudio { samples, serial: self.leftover_serial })
    }

    /// Value to publish into the shared audio clock after a pull has been
    /// written to the device: the decoded pts rebased back by the
    /// hardware + write-buffer latency still in flight. The caller
    /// (session) owns the `Clock` itself and applies this under its lock,
    /// then resyncs the external clock to it.
    pub fn clock_update(&self, hw_buf_bytes: usize, write_buf_bytes: usize, bytes_per_sec: f64) -> (f64, i64) {
        (rebase_audio_clock(self.audio_clock, hw_buf_bytes, write_buf_bytes, bytes_per_sec), self.audio_clock_serial)
    }

    pub fn frame_queue(&self) -> &FrameQueue {
        &self.frame_queue
    }
}

fn frame_audio(frame: &crate::frame::Frame) -> Option<&crate::frame::AudioPayload> {
    match &frame.payload {
        crate::frame::FramePayload::Audio(a) => Some(a),
        _ => None,
    }
}

/// Applies volume/mute to a chunk of interleaved f32 samples in place:
/// passes through unchanged at max volume and unmuted, otherwise scales (or
/// zeroes, if muted). `volume` is 0..=max.
pub fn apply_volume(samples: &mut [f32], volume: i32, muted: bool) {
    if muted {
        samples.fill(0.0);
        return;
    }
    if volume >= mediaplay_core::constants::VOLUME_MAX {
        return;
    }
    let scale = volume as f32 / mediaplay_core::constants::VOLUME_MAX as f32;
    for s in samples.iter_mut() {
        *s *= scale;
    }
}

/// Rebases the audio clock to account for hardware + write-buffer latency:
/// `audio_clock - (2*hw_buf_size + write_buf_size)/bytes_per_sec`.
pub fn rebase_audio_clock(audio_clock: f64, hw_buf_bytes: usize, write_buf_bytes: usize, bytes_per_sec: f64) -> f64 {
    if audio_clock.is_nan() {
        return audio_clock;
    }
    audio_clock - (2 * hw_buf_bytes + write_buf_bytes) as f64 / bytes_per_sec
}

/// Volume step conversion: moves by `VOLUME_STEP_DB` decibels in the
/// logarithmic domain, guaranteeing at least one unit of movement.
pub fn step_volume(volume: i32, sign: i32) -> i32 {
    use mediaplay_core::constants::{VOLUME_MAX, VOLUME_STEP_DB};
    let max = VOLUME_MAX as f64;
    let current = (volume.clamp(0, VOLUME_MAX) as f64 / max).max(1e-6);
    let db = 20.0 * current.log10();
    let new_db = db + sign as f64 * VOLUME_STEP_DB;
    let new_linear = (10.0f64.powf(new_db / 20.0) * max).round() as i32;
    let clamped = new_linear.clamp(0, VOLUME_MAX as i32);
    if clamped == volume {
        (volume + sign).clamp(0, VOLUME_MAX as i32)
    } else {
        clamped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synchronize_audio_clamps_to_ten_percent() {
        let mut averager = AudioDiffAverager::new(4096, 176400.0);
        let nb_samples = 1024usize;
        for _ in 0..AUDIO_DIFF_AVG_NB {
            let wanted = synchronize_audio(&mut averager, nb_samples, 1.5, 1.0, 44100);
            let lo = (nb_samples as f64 * 0.9).floor() as usize;
            let hi = (nb_samples as f64 * 1.1).ceil() as usize;
            assert!(wanted >= lo && wanted <= hi);
        }
    }

    #[test]
    fn synchronize_audio_is_noop_when_clocks_agree() {
        let mut averager = AudioDiffAverager::new(4096, 176400.0);
        let wanted = synchronize_audio(&mut averager, 1024, 1.0, 1.0, 44100);
        assert_eq!(wanted, 1024);
    }

    #[test]
    fn volume_law_round_trips() {
        for start in [0, 1, 25, 50, 99, 100] {
            let up = step_volume(start, 1);
            let back = step_volume(up, -1);
            assert!((back - start).abs() <= 1, "start={start} up={up} back={back}");
        }
    }

    #[test]
    fn apply_volume_mutes_to_silence() {
        let mut samples = vec![1.0f32, -1.0, 0.5];
        apply_volume(&mut samples, 100, true);
        assert_eq!(samples, vec![0.0, 0.0, 0.0]);
    }

    #[test]
    fn apply_volume_scales_below_max() {
        let mut samples = vec![1.0f32];
        apply_volume(&mut samples, 50, false);
        assert!((samples[0] - 0.5).abs() < 1e-6);
    }
}
