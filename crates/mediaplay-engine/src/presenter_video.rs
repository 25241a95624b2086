// crates/mediaplay-engine/src/presenter_video.rs
//
// Refresh-timer-driven video presenter. The actual texture upload and window
// surface are the opaque windowing toolkit's job; this computes what to show
// and when, and hands the UI a ready `VideoFrame` plus the recommended wait
// before the next tick.

use std::sync::atomic::Ordering;
use std::time::Instant;

use mediaplay_core::constants::{AV_SYNC_FRAMEDUP_THRESHOLD, AV_SYNC_THRESHOLD_MAX, AV_SYNC_THRESHOLD_MIN, REFRESH_RATE_SECS};
use mediaplay_core::messages::VideoFrame;
pub use mediaplay_core::config::SyncType;

use crate::clock::Clock;
use crate::frame::Frame;
use crate::frame_queue::FrameQueue;

/// What the caller (main/event thread) should do after one `tick()`.
pub enum RefreshOutcome {
    /// Nothing to draw this tick; wait `remaining` seconds before the next call.
    Wait { remaining: f64 },
    /// A frame is ready to present; wait `remaining` seconds after presenting.
    Present { frame: VideoFrame, remaining: f64 },
}

/// Drives the video frame queue against the master clock. Owns no thread
/// itself — `tick()` is called by the main event loop's refresh timer.
pub struct VideoPresenter {
    queue: FrameQueue,
    /// Same monotonic epoch the session's clocks were built from, so
    /// `frame_timer` and `Clock::get()` values are directly comparable.
    epoch: Instant,
    frame_timer: f64,
    frame_last_delay: f64,
    max_frame_duration: f64,
    framedrop: bool,
    force_refresh: bool,
    step: bool,
    pub frame_drops_late: u64,
}

impl VideoPresenter {
    pub fn new(queue: FrameQueue, epoch: Instant, max_frame_duration: f64, framedrop: bool) -> Self {
        Self {
            queue,
            epoch,
            frame_timer: now(epoch),
            frame_last_delay: 0.04,
            max_frame_duration,
            framedrop,
            force_refresh: false,
            step: false,
            frame_drops_late: 0,
        }
    }

    pub fn request_force_refresh(&mut self) {
        self.force_refresh = true;
    }

    pub fn request_step(&mut self) {
        self.step = true;
    }

    /// Last computed target delay — feeds the video decoder's early
    /// framedrop check (`frame_last_filter_delay`) across the
    /// decoder/presenter thread boundary via a shared atomic in the session.
    pub fn frame_last_delay(&self) -> f64 {
        self.frame_last_delay
    }

    /// The running frame timer value, epoch-relative seconds. Exposed for
    /// tests that check pause/resume crediting without reaching into
    /// private state.
    pub fn frame_timer_value(&self) -> f64 {
        self.frame_timer
    }

    /// Adds accumulated paused wall-time to the frame timer on unpause, so
    /// the next computed delay isn't shortened by the pause duration: the
    /// pause/toggle handler credits `now - vidclk.last_updated` back here.
    pub fn account_for_pause(&mut self, vidclk_last_updated: f64) {
        self.frame_timer += now(self.epoch) - vidclk_last_updated;
    }

    /// One refresh-timer invocation. `video_clock` and
    /// `external_clock` are passed in rather than owned here, since the clock
    /// trio is shared session state. `master_value` is a snapshot of
    /// whichever clock the session has already selected as authoritative for
    /// `master` — a value rather than a second `&Clock`, since the master may
    /// be `video_clock` itself (locked separately, under its own mutex, by
    /// the caller) and Rust can't alias a mutable and shared borrow of the
    /// same guard.
    pub fn tick(
        &mut self,
        master: SyncType,
        video_clock: &mut Clock,
        master_value: f64,
        external_clock: &mut Clock,
        paused: bool,
    ) -> RefreshOutcome {
        let mut remaining_time = REFRESH_RATE_SECS;

        if self.queue.nb_remaining() == 0 {
            return self.finish(None, remaining_time);
        }

        loop {
            if self.queue.nb_remaining() == 0 {
                return self.finish(None, remaining_time);
            }

            let vp_serial = self.queue.peek().serial;
            if vp_serial != self.queue.queue_serial() {
                // stale after seek; drop and retry.
                self.queue.next();
                continue;
            }

            let has_last = self.queue.has_shown();
            if has_last && self.queue.peek_last().serial != vp_serial {
                self.frame_timer = now(self.epoch);
            }

            if paused {
                break;
            }

            let last_duration = if has_last {
                let lastvp = self.queue.peek_last();
                let vp = self.queue.peek();
                let d = vp.pts - lastvp.pts;
                if lastvp.serial == vp.serial && d.is_finite() && d > 0.0 && d <= self.max_frame_duration {
                    d
                } else {
                    lastvp.duration
                }
            } else {
                self.frame_last_delay
            };

            let diff = video_clock.get() - master_value;
            let delay = compute_target_delay(last_duration, master, diff, self.max_frame_duration);
            self.frame_last_delay = delay;

            let t = now(self.epoch);
            if t < self.frame_timer + delay {
                remaining_time = (self.frame_timer + delay - t).min(remaining_time);
                break;
            }

            self.frame_timer += delay;
            if delay > 0.0 && t - self.frame_timer > 0.1 {
                self.frame_timer = t;
            }

            let vp_pts = self.queue.peek().pts;
            video_clock.set(vp_pts, vp_serial);
            external_clock.sync_to_slave(video_clock);

            if self.queue.nb_remaining() > 1 {
                let duration = {
                    let vp = self.queue.peek();
                    let next = self.queue.peek_next();
                    let d = next.pts - vp.pts;
                    if d.is_finite() && d > 0.0 && d <= self.max_frame_duration {
                        d
                    } else {
                        vp.duration
                    }
                };
                if !self.step && self.framedrop && now(self.epoch) > self.frame_timer + duration {
                    self.frame_drops_late += 1;
                    self.queue.next();
                    continue;
                }
            }

            self.queue.next();
            self.force_refresh = true;
            break;
        }

        if self.step && !paused {
            self.step = false;
        }

        if self.force_refresh && self.queue.has_shown() {
            let frame = self.queue.peek_last();
            let out = to_video_frame(frame);
            self.force_refresh = false;
            return RefreshOutcome::Present { frame: out, remaining: remaining_time };
        }
        self.force_refresh = false;
        RefreshOutcome::Wait { remaining: remaining_time }
    }

    fn finish(&mut self, frame: Option<VideoFrame>, remaining: f64) -> RefreshOutcome {
        match frame {
            Some(f) => RefreshOutcome::Present { frame: f, remaining },
            None => RefreshOutcome::Wait { remaining },
        }
    }
}

fn to_video_frame(frame: &Frame) -> VideoFrame {
    let v = frame.as_video().expect("presenter only handles video frames");
    VideoFrame {
        width: v.width,
        height: v.height,
        data: v.data.clone(),
        pts: frame.pts,
        serial: frame.serial,
    }
}

fn now(epoch: Instant) -> f64 {
    epoch.elapsed().as_secs_f64()
}

/// `compute_target_delay`. Identity when master is video.
/// `diff` is `video_clock - master_clock`, precomputed by the caller since
/// the master clock may be the video clock itself (already locked by the
/// caller under a different guard) or a clock this presenter doesn't own.
pub fn compute_target_delay(delay: f64, master: SyncType, diff: f64, max_frame_duration: f64) -> f64 {
    if master == SyncType::Video {
        return delay;
    }
    let sync_threshold = delay.clamp(AV_SYNC_THRESHOLD_MIN, AV_SYNC_THRESHOLD_MAX);
    let mut out = delay;
    if diff.is_finite() && diff.abs() < max_frame_duration {
        if diff <= -sync_threshold {
            out = (delay + diff).max(0.0);
        } else if diff >= sync_threshold && delay > AV_SYNC_FRAMEDUP_THRESHOLD {
            out = delay + diff;
        } else if diff >= sync_threshold {
            out = 2.0 * delay;
        }
    }
    out
}

/// Subtitle-queue expiration check. Returns true if the head subtitle
/// should be cleared and the
/// queue advanced: its serial is stale, the current video pts has passed its
/// `end_display_ms`, or the next queued subtitle's `start_display_ms` has
/// already passed.
pub fn subtitle_expired(subq: &FrameQueue, video_pts_ms: i64, video_queue_serial: &std::sync::atomic::AtomicI64) -> bool {
    if subq.nb_remaining() == 0 {
        return false;
    }
    let head = subq.peek();
    if head.serial != video_queue_serial.load(Ordering::SeqCst) {
        return true;
    }
    if let Some(sub) = head.as_subtitle() {
        if video_pts_ms >= sub.end_display_ms {
            return true;
        }
    }
    if subq.nb_remaining() > 1 {
        if let Some(next_sub) = subq.peek_next().as_subtitle() {
            if video_pts_ms >= next_sub.start_display_ms {
                return true;
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::Clock;
    use std::sync::atomic::AtomicI64;
    use std::sync::Arc;
    use std::time::Instant;

    #[test]
    fn target_delay_passthrough_when_master_is_video() {
        assert_eq!(compute_target_delay(0.033, SyncType::Video, 5.0, 10.0), 0.033);
    }

    #[test]
    fn target_delay_within_spec_bounds() {
        let diff = 5.2 - 5.0;
        let delay = compute_target_delay(0.04, SyncType::Audio, diff, 10.0);
        assert!(delay >= 0.0);
        assert!(delay <= (0.04 + 10.0).max(2.0 * 0.04));
    }

    #[test]
    fn large_lag_shortens_delay_to_catch_up() {
        let diff = 4.0 - 5.0; // video 1s behind master
        let delay = compute_target_delay(0.3, SyncType::Audio, diff, 10.0);
        assert!(delay < 0.3); // video is behind: shorten the wait, not lengthen it
        assert!(delay >= 0.0);
    }

    #[test]
    fn small_lead_doubles_delay_until_aligned() {
        let diff = 5.06 - 5.0; // video slightly ahead, small gap
        let delay = compute_target_delay(0.04, SyncType::Audio, diff, 10.0);
        assert!((delay - 0.08).abs() < 1e-9);
    }

    #[test]
    fn tick_waits_with_empty_queue() {
        let epoch = Instant::now();
        let pktq = crate::packet_queue::PacketQueue::new();
        pktq.start(0);
        let fq = FrameQueue::new(pktq, 3, true);
        let mut presenter = VideoPresenter::new(fq, epoch, 10.0, false);
        let mut vc = fresh_clock(epoch);
        let mut ec = fresh_clock(epoch);
        match presenter.tick(SyncType::Audio, &mut vc, 0.0, &mut ec, false) {
            RefreshOutcome::Wait { remaining } => assert!(remaining > 0.0),
            RefreshOutcome::Present { .. } => panic!("nothing queued, should not present"),
        }
    }

    fn fresh_clock(epoch: Instant) -> Clock {
        Clock::new(epoch, Arc::new(AtomicI64::new(0)))
    }
}
