// crates/mediaplay-engine/src/decoder/mod.rs
//
// Shared decoder lifecycle. The three concrete kinds share everything except
// output handling, modeled as a capability set rather than three ad hoc
// worker functions.

pub mod audio;
pub mod subtitle;
pub mod video;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::frame::Frame;
use crate::packet::PacketEntry;
use crate::packet_queue::{GetOutcome, PacketQueue};

/// Result of one `decode_one` iteration. `Transient`/`Eof`/`Aborted` are
/// control-flow states, not propagating errors.
pub enum DecodeOutcome {
    Frame(Frame),
    /// No frame produced this iteration (EAGAIN-equivalent); caller should retry.
    Transient,
    /// This decoder has observed EOF for the current serial.
    Eof,
    /// The packet queue was aborted mid-wait.
    Aborted,
}

/// Fields shared by all three decoder kinds.
pub struct DecoderCore {
    pub queue: PacketQueue,
    pub pkt_serial: i64,
    /// Serial at which EOF was observed for the current run, or 0.
    pub finished: i64,
    /// Start-pts override for attached-picture / disposition-based streams.
    pub start_pts_override: Option<f64>,
    /// guess_correct_pts-equivalent counters, reset on flush, surviving
    /// across a single non-flushed run.
    pub faulty_dts: i64,
    pub faulty_pts: i64,
    /// Replay buffer for a packet whose send failed with EAGAIN, so the next
    /// iteration retries it instead of dropping it.
    pending_replay: Option<PacketEntry>,
    /// Published on every flush sentinel; this decoder's stream `Clock`
    /// shares this exact atomic as its obsolescence check, so the clock sees
    /// "this decoder's current epoch" rather than racing the raw packet
    /// queue serial, which may already be a flush or two ahead of whatever
    /// this decoder has actually processed.
    queue_serial_cell: Arc<AtomicI64>,
    /// Published copy of `finished`, readable by the demuxer thread without
    /// reaching into this decoder's own thread.
    pub finished_cell: Arc<AtomicI64>,
}

impl DecoderCore {
    pub fn new(queue: PacketQueue, queue_serial_cell: Arc<AtomicI64>, finished_cell: Arc<AtomicI64>) -> Self {
        Self {
            queue,
            pkt_serial: -1,
            finished: 0,
            start_pts_override: None,
            faulty_dts: 0,
            faulty_pts: 0,
            pending_replay: None,
            queue_serial_cell,
            finished_cell,
        }
    }

    /// Pulls the next packet to feed the codec, honoring a pending replay
    /// from a prior EAGAIN-on-send.
    /// Returns `None` if the queue was aborted.
    pub fn next_input(&mut self) -> Option<PacketEntry> {
        if let Some(entry) = self.pending_replay.take() {
            return Some(entry);
        }
        match self.queue.get(true) {
            GetOutcome::Packet(entry) => {
                if entry.is_flush() {
                    self.pkt_serial = entry.serial;
                    self.finished = 0;
                    self.finished_cell.store(0, Ordering::SeqCst);
                    self.faulty_dts = 0;
                    self.faulty_pts = 0;
                    self.publish_serial();
                } else if entry.is_eof {
                    self.finished = self.pkt_serial;
                    self.finished_cell.store(self.finished, Ordering::SeqCst);
                }
                Some(entry)
            }
            GetOutcome::Empty => unreachable!("next_input blocks"),
            GetOutcome::Aborted => None,
        }
    }

    /// Stashes a packet whose send failed with EAGAIN so it's replayed first
    /// on the next call to `next_input`.
    pub fn replay(&mut self, entry: PacketEntry) {
        self.pending_replay = Some(entry);
    }

    pub fn is_stale(&self) -> bool {
        self.queue.serial() != self.pkt_serial
    }

    pub fn publish_serial(&self) {
        self.queue_serial_cell.store(self.pkt_serial, Ordering::SeqCst);
    }
}

/// Capability set shared by `VideoDecoder`, `AudioDecoder`, `SubtitleDecoder`,
/// in place of three ad hoc worker functions.
pub trait StreamDecoder {
    fn core(&self) -> &DecoderCore;
    fn core_mut(&mut self) -> &mut DecoderCore;

    /// Decode exactly one output unit, or report why none was produced.
    fn decode_one(&mut self) -> DecodeOutcome;

    /// Flush codec-internal state on a flush sentinel.
    fn flush(&mut self);
}
