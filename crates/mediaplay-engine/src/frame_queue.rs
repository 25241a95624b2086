// crates/mediaplay-engine/src/frame_queue.rs
//
// Fixed-capacity ring buffer of decoded frames. A Mutex protects
// `size`/`rindex`/`windex`/the shown flag, while slot *contents* are touched
// only by the single writer (between `peek_writable` and `push`) and the
// single reader (between `peek_readable` and `next`) — at most one writer
// and one reader at a time. That invariant, not the type system, is what
// makes the `UnsafeCell` slots sound; callers that violate it (two writers,
// or a reader touching a slot it hasn't been granted) invoke UB.

use parking_lot::{Condvar, Mutex};
use std::cell::UnsafeCell;
use std::sync::Arc;

use crate::frame::Frame;
use crate::packet_queue::PacketQueue;

/// Whether the slot at `rindex` has been handed to the reader yet. Modeled
/// as an enum rather than a bool, so "peek_last is valid" is encoded in the
/// type instead of a `rindex_shown == 1` convention.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ShownState {
    NotYet,
    Held,
}

impl ShownState {
    fn as_count(self) -> usize {
        match self {
            ShownState::NotYet => 0,
            ShownState::Held => 1,
        }
    }
}

struct RingMeta {
    rindex: usize,
    windex: usize,
    size: usize,
    shown: ShownState,
}

struct Inner {
    slots: Vec<UnsafeCell<Option<Frame>>>,
    meta: Mutex<RingMeta>,
    cond: Condvar,
    max_size: usize,
    keep_last: bool,
    pktq: PacketQueue,
}

// SAFETY: `slots` contents are only ever touched by the single writer thread
// (during its [peek_writable, push) window) or the single reader thread
// (during its [peek_readable, next) window); the ring's own index bookkeeping
// under `meta` prevents those windows from overlapping on the same slot.
unsafe impl Sync for Inner {}

#[derive(Clone)]
pub struct FrameQueue {
    inner: Arc<Inner>,
}

pub struct Aborted;

impl FrameQueue {
    pub fn new(pktq: PacketQueue, max_size: usize, keep_last: bool) -> Self {
        let mut slots = Vec::with_capacity(max_size);
        slots.resize_with(max_size, || UnsafeCell::new(None));
        Self {
            inner: Arc::new(Inner {
                slots,
                meta: Mutex::new(RingMeta { rindex: 0, windex: 0, size: 0, shown: ShownState::NotYet }),
                cond: Condvar::new(),
                max_size,
                keep_last,
                pktq,
            }),
        }
    }

    fn slot(&self, index: usize) -> &mut Option<Frame> {
        // SAFETY: see the `unsafe impl Sync for Inner` comment above.
        unsafe { &mut *self.inner.slots[index].get() }
    }

    /// Wakes any thread waiting in peek_writable/peek_readable — used when
    /// the backing packet queue is aborted.
    pub fn signal(&self) {
        let _m = self.inner.meta.lock();
        self.inner.cond.notify_all();
    }

    /// Waits until there is a free slot, then returns its index for the
    /// caller to fill before calling `push`.
    pub fn peek_writable(&self) -> Result<usize, Aborted> {
        let mut m = self.inner.meta.lock();
        loop {
            if self.inner.pktq.is_aborted() {
                return Err(Aborted);
            }
            if m.size < self.inner.max_size {
                return Ok(m.windex);
            }
            self.inner.cond.wait(&mut m);
        }
    }

    /// Caller must have fully initialized the slot returned by the most
    /// recent `peek_writable` before calling this.
    pub fn write_slot(&self, index: usize, frame: Frame) {
        *self.slot(index) = Some(frame);
    }

    /// Advances the write index, making the frame visible to the reader.
    pub fn push(&self) {
        let mut m = self.inner.meta.lock();
        m.windex = (m.windex + 1) % self.inner.max_size;
        m.size += 1;
        self.inner.cond.notify_all();
    }

    /// Waits until a frame is available to read (i.e. `size - shown > 0`),
    /// or the backing packet queue is aborted.
    pub fn peek_readable(&self) -> Result<(), Aborted> {
        let mut m = self.inner.meta.lock();
        loop {
            if self.inner.pktq.is_aborted() {
                return Err(Aborted);
            }
            if m.size.saturating_sub(m.shown.as_count()) > 0 {
                return Ok(());
            }
            self.inner.cond.wait(&mut m);
        }
    }

    fn read_index(&self) -> usize {
        let m = self.inner.meta.lock();
        (m.rindex + m.shown.as_count()) % self.inner.max_size
    }

    /// The frame to display next. Valid only after a successful `peek_readable`.
    pub fn peek(&self) -> &Frame {
        let idx = self.read_index();
        self.slot(idx).as_ref().expect("peek() called without a readable frame")
    }

    /// The frame one past `peek()`.
    pub fn peek_next(&self) -> &Frame {
        let idx = (self.read_index() + 1) % self.inner.max_size;
        self.slot(idx).as_ref().expect("peek_next() called without two readable frames")
    }

    /// The most recently shown frame. Valid only when `keep_last` is set
    /// and a frame has already been shown.
    pub fn peek_last(&self) -> &Frame {
        let m = self.inner.meta.lock();
        let idx = m.rindex;
        drop(m);
        self.slot(idx).as_ref().expect("peek_last() called with no frame shown yet")
    }

    pub fn has_shown(&self) -> bool {
        self.inner.meta.lock().shown == ShownState::Held
    }

    /// Advances past the currently-read frame, or — the first time, when
    /// `keep_last` is set — merely marks it shown without advancing, so the
    /// slot stays addressable via `peek_last`.
    pub fn next(&self) {
        let mut m = self.inner.meta.lock();
        if self.inner.keep_last && m.shown == ShownState::NotYet {
            m.shown = ShownState::Held;
            return;
        }
        *self.slot(m.rindex) = None;
        m.rindex = (m.rindex + 1) % self.inner.max_size;
        m.size -= 1;
        self.inner.cond.notify_all();
    }

    pub fn nb_remaining(&self) -> usize {
        let m = self.inner.meta.lock();
        m.size.saturating_sub(m.shown.as_count())
    }

    /// Byte offset of the most recently shown frame, or -1 if its serial no
    /// longer matches the backing queue's current serial.
    pub fn last_pos(&self) -> i64 {
        let m = self.inner.meta.lock();
        if m.shown != ShownState::Held {
            return -1;
        }
        let idx = m.rindex;
        drop(m);
        match self.slot(idx).as_ref() {
            Some(f) if f.serial == self.inner.pktq.serial() => f.pos,
            _ => -1,
        }
    }

    pub fn max_size(&self) -> usize {
        self.inner.max_size
    }

    /// The backing packet queue's *live* serial — what a just-peeked frame's
    /// own `serial` must be compared against to detect staleness after a
    /// seek.
    pub fn queue_serial(&self) -> i64 {
        self.inner.pktq.serial()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::{AudioPayload, FramePayload};

    fn dummy_frame(pts: f64, serial: i64) -> Frame {
        Frame {
            payload: FramePayload::Audio(AudioPayload { samples: vec![], sample_rate: 44100, channels: 2, nb_samples: 0 }),
            pts,
            duration: 0.02,
            pos: 0,
            serial,
        }
    }

    #[test]
    fn capacity_never_exceeded_and_indices_in_range() {
        let pktq = PacketQueue::new();
        pktq.start(0);
        let fq = FrameQueue::new(pktq, 3, false);
        for i in 0..3 {
            let idx = fq.peek_writable().ok().unwrap();
            assert!(idx < fq.max_size());
            fq.write_slot(idx, dummy_frame(i as f64, 1));
            fq.push();
        }
        assert_eq!(fq.nb_remaining(), 3);
    }

    #[test]
    fn keep_last_requires_explicit_shown_transition() {
        let pktq = PacketQueue::new();
        pktq.start(0);
        let fq = FrameQueue::new(pktq, 3, true);
        let idx = fq.peek_writable().ok().unwrap();
        fq.write_slot(idx, dummy_frame(0.0, 1));
        fq.push();
        assert!(!fq.has_shown());
        fq.next(); // first next(): marks shown, does not advance
        assert!(fq.has_shown());
        assert_eq!(fq.nb_remaining(), 1); // frame still logically present
    }

    #[test]
    fn aborted_wait_returns_without_slot() {
        let pktq = PacketQueue::new();
        pktq.start(0);
        let fq = FrameQueue::new(pktq.clone(), 1, false);
        let idx = fq.peek_writable().ok().unwrap();
        fq.write_slot(idx, dummy_frame(0.0, 1));
        fq.push(); // now full

        let fq2 = fq.clone();
        let handle = std::thread::spawn(move || fq2.peek_writable());
        std::thread::sleep(std::time::Duration::from_millis(50));
        // abort the packet queue, then explicitly signal the frame queue
        // so its own waiters wake up.
        pktq.abort();
        fq.signal();
        assert!(handle.join().unwrap().is_err());
    }
}
