// crates/mediaplay-engine/src/packet_queue.rs
//
// Bounded-by-convention (unbounded in elements, throttled externally) FIFO
// of packets for one stream. An intrusive linked list carries no observable
// contract beyond FIFO order and O(1) push/pop, so this is a VecDeque behind
// a Mutex+Condvar (parking_lot) instead.

use parking_lot::{Condvar, Mutex};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};
use std::sync::Arc;

use crate::packet::PacketEntry;

pub enum GetOutcome {
    Packet(PacketEntry),
    Empty,
    Aborted,
}

struct Inner {
    queue: Mutex<std::collections::VecDeque<PacketEntry>>,
    cond: Condvar,
    nb_packets: AtomicU64,
    size: AtomicU64,
    duration: AtomicI64,
    abort: AtomicBool,
    /// Current serial: incremented each time a flush sentinel is enqueued.
    /// Readable without holding `queue`'s lock. Held behind its own `Arc` so
    /// a `Clock` can share this exact atomic as its obsolescence check
    /// without cloning the whole queue.
    serial: Arc<AtomicI64>,
}

/// Thread-safe, serial-tagged FIFO of packets for a single stream.
#[derive(Clone)]
pub struct PacketQueue {
    inner: Arc<Inner>,
}

impl PacketQueue {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                queue: Mutex::new(std::collections::VecDeque::new()),
                cond: Condvar::new(),
                nb_packets: AtomicU64::new(0),
                size: AtomicU64::new(0),
                duration: AtomicI64::new(0),
                abort: AtomicBool::new(true),
                serial: Arc::new(AtomicI64::new(0)),
            }),
        }
    }

    pub fn serial(&self) -> i64 {
        self.inner.serial.load(Ordering::SeqCst)
    }

    /// The live serial atomic itself, shared (not cloned) with a `Clock` so
    /// the clock's obsolescence check always sees this queue's current epoch.
    pub fn serial_handle(&self) -> Arc<AtomicI64> {
        self.inner.serial.clone()
    }

    pub fn nb_packets(&self) -> u64 {
        self.inner.nb_packets.load(Ordering::SeqCst)
    }

    pub fn size_bytes(&self) -> u64 {
        self.inner.size.load(Ordering::SeqCst)
    }

    pub fn duration_units(&self) -> i64 {
        self.inner.duration.load(Ordering::SeqCst)
    }

    pub fn is_aborted(&self) -> bool {
        self.inner.abort.load(Ordering::SeqCst)
    }

    /// Appends `entry`, taking ownership. Wakes one waiting reader.
    /// Fails with `false` if the queue is aborted.
    pub fn put(&self, entry: PacketEntry) -> bool {
        if self.inner.abort.load(Ordering::SeqCst) {
            return false;
        }
        let mut q = self.inner.queue.lock();
        if self.inner.abort.load(Ordering::SeqCst) {
            return false;
        }
        let is_flush = entry.is_flush();
        self.inner.nb_packets.fetch_add(1, Ordering::SeqCst);
        self.inner.size.fetch_add(entry.size_bytes(), Ordering::SeqCst);
        self.inner.duration.fetch_add(entry.duration(), Ordering::SeqCst);
        if is_flush {
            self.inner.serial.fetch_add(1, Ordering::SeqCst);
        }
        q.push_back(entry);
        self.inner.cond.notify_one();
        true
    }

    /// Removes and returns the head element. Blocks on empty when `blocking`
    /// is true; returns `Empty` immediately otherwise. Always returns
    /// `Aborted` (without consuming) once abort is set.
    pub fn get(&self, blocking: bool) -> GetOutcome {
        let mut q = self.inner.queue.lock();
        loop {
            if self.inner.abort.load(Ordering::SeqCst) {
                return GetOutcome::Aborted;
            }
            if let Some(entry) = q.pop_front() {
                self.inner.nb_packets.fetch_sub(1, Ordering::SeqCst);
                self.inner.size.fetch_sub(entry.size_bytes(), Ordering::SeqCst);
                self.inner.duration.fetch_sub(entry.duration(), Ordering::SeqCst);
                return GetOutcome::Packet(entry);
            }
            if !blocking {
                return GetOutcome::Empty;
            }
            self.inner.cond.wait(&mut q);
        }
    }

    /// Drops all queued elements (their ffmpeg packet payloads are freed on drop).
    pub fn flush(&self) {
        let mut q = self.inner.queue.lock();
        q.clear();
        self.inner.nb_packets.store(0, Ordering::SeqCst);
        self.inner.size.store(0, Ordering::SeqCst);
        self.inner.duration.store(0, Ordering::SeqCst);
    }

    /// Sets the abort flag and wakes every waiter; they observe the flag and
    /// return `Aborted` without consuming.
    pub fn abort(&self) {
        self.inner.abort.store(true, Ordering::SeqCst);
        let _q = self.inner.queue.lock();
        self.inner.cond.notify_all();
    }

    /// Clears abort and enqueues one flush sentinel, so the first reader
    /// advances the serial to 1.
    pub fn start(&self, stream_index: usize) {
        self.inner.abort.store(false, Ordering::SeqCst);
        self.put(PacketEntry::flush_sentinel(stream_index, 0));
    }
}

impl Default for PacketQueue {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ffmpeg_the_third::Packet;

    fn data_entry(serial: i64) -> PacketEntry {
        PacketEntry::data(0, Packet::empty(), serial)
    }

    #[test]
    fn serial_increments_only_on_flush_sentinel() {
        let q = PacketQueue::new();
        q.start(0);
        assert_eq!(q.serial(), 1);
        q.put(data_entry(1));
        q.put(data_entry(1));
        assert_eq!(q.serial(), 1);
        q.put(PacketEntry::flush_sentinel(0, 0));
        assert_eq!(q.serial(), 2);
    }

    #[test]
    fn accounting_matches_contents() {
        let q = PacketQueue::new();
        q.start(0);
        for _ in 0..5 {
            q.put(data_entry(1));
        }
        assert_eq!(q.nb_packets(), 6); // 5 data + the start() flush sentinel
        while let GetOutcome::Packet(_) = q.get(false) {}
        assert_eq!(q.nb_packets(), 0);
        assert_eq!(q.size_bytes(), 0);
    }

    #[test]
    fn abort_wakes_blocked_getter_without_consuming() {
        let q = PacketQueue::new();
        q.start(0);
        q.get(false); // drain the start() sentinel so the queue is empty
        let q2 = q.clone();
        let handle = std::thread::spawn(move || q2.get(true));
        std::thread::sleep(std::time::Duration::from_millis(50));
        q.abort();
        let outcome = handle.join().unwrap();
        assert!(matches!(outcome, GetOutcome::Aborted));
        assert_eq!(q.nb_packets(), 0);
    }

    #[test]
    fn non_blocking_get_on_empty_returns_empty() {
        let q = PacketQueue::new();
        q.start(0);
        q.get(false);
        assert!(matches!(q.get(false), GetOutcome::Empty));
    }
}
