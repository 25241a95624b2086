// crates/mediaplay-engine/src/clock.rs
//
// Monotonic PTS tracker with pause/speed/obsolescence support.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use mediaplay_core::constants::AV_NOSYNC_THRESHOLD;

fn now_secs(epoch: Instant) -> f64 {
    epoch.elapsed().as_secs_f64()
}

pub struct Clock {
    epoch: Instant,
    pts: f64,
    pts_drift: f64,
    last_updated: f64,
    speed: f64,
    paused: bool,
    serial: i64,
    /// Shared with the PacketQueue this clock derives from; used to detect
    /// obsolescence: once the queue's serial moves past this clock's, `get()` reads NaN.
    queue_serial: Arc<AtomicI64>,
}

impl Clock {
    pub fn new(epoch: Instant, queue_serial: Arc<AtomicI64>) -> Self {
        Self {
            epoch,
            pts: f64::NAN,
            pts_drift: f64::NAN,
            last_updated: now_secs(epoch),
            speed: 1.0,
            paused: false,
            serial: -1,
            queue_serial,
        }
    }

    /// Returns NaN if this clock's serial has gone stale relative to its
    /// backing queue; `pts` if paused; otherwise extrapolates from drift.
    pub fn get(&self) -> f64 {
        if self.queue_serial.load(Ordering::SeqCst) != self.serial {
            return f64::NAN;
        }
        if self.paused {
            return self.pts;
        }
        let now = now_secs(self.epoch);
        self.pts_drift + now - (now - self.last_updated) * (1.0 - self.speed)
    }

    pub fn set_at(&mut self, pts: f64, serial: i64, time: f64) {
        self.pts = pts;
        self.pts_drift = pts - time;
        self.last_updated = time;
        self.serial = serial;
    }

    pub fn set(&mut self, pts: f64, serial: i64) {
        let now = now_secs(self.epoch);
        self.set_at(pts, serial, now);
    }

    /// Re-anchors at the currently-computed pts before changing speed, so the
    /// rate change takes effect from "now" rather than retroactively.
    pub fn set_speed(&mut self, speed: f64) {
        let pts = self.get();
        let serial = self.serial;
        self.set(pts, serial);
        self.speed = speed;
    }

    pub fn speed(&self) -> f64 {
        self.speed
    }

    pub fn set_paused(&mut self, paused: bool) {
        self.paused = paused;
    }

    pub fn paused(&self) -> bool {
        self.paused
    }

    pub fn serial(&self) -> i64 {
        self.serial
    }

    /// Wall-clock time (relative to `epoch`) this clock's pts was last set —
    /// needed by the pause/unpause handler to credit the paused duration
    /// back to the video presenter's frame timer across a pause.
    pub fn last_updated(&self) -> f64 {
        self.last_updated
    }

    /// Re-bases `self` from `other` when self is invalid or has drifted more
    /// than AV_NOSYNC_THRESHOLD away from it — used to keep the external
    /// clock anchored to whichever of audio/video is authoritative.
    pub fn sync_to_slave(&mut self, other: &Clock) {
        let self_val = self.get();
        let other_val = other.get();
        if !other_val.is_nan() && (self_val.is_nan() || (self_val - other_val).abs() > AV_NOSYNC_THRESHOLD) {
            self.set(other_val, other.serial);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fresh_clock() -> (Clock, Arc<AtomicI64>) {
        let serial = Arc::new(AtomicI64::new(0));
        let clock = Clock::new(Instant::now(), serial.clone());
        (clock, serial)
    }

    #[test]
    fn obsolete_clock_reads_nan() {
        let (mut clock, serial) = fresh_clock();
        clock.set(5.0, 0);
        assert!(!clock.get().is_nan());
        serial.store(1, Ordering::SeqCst);
        assert!(clock.get().is_nan());
    }

    #[test]
    fn paused_clock_returns_fixed_pts() {
        let (mut clock, _serial) = fresh_clock();
        clock.set(3.0, 0);
        clock.set_paused(true);
        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(clock.get(), 3.0);
    }

    #[test]
    fn sync_slave_rebases_on_large_drift() {
        let (mut ext, serial_a) = fresh_clock();
        let (mut master, serial_b) = fresh_clock();
        ext.set(0.0, 0);
        master.set(50.0, 0);
        serial_a.store(0, Ordering::SeqCst);
        serial_b.store(0, Ordering::SeqCst);
        ext.sync_to_slave(&master);
        assert!((ext.get() - 50.0).abs() < 0.01);
    }
}
