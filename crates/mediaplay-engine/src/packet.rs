// crates/mediaplay-engine/src/packet.rs
//
// Packet entries that flow through a PacketQueue. A `None` payload is the
// flush sentinel / decoder-EOF marker: a null-data element is legal here.

use ffmpeg_the_third::Packet;

/// One element of a PacketQueue.
pub struct PacketEntry {
    /// `None` marks either a flush sentinel (seek/stream-switch epoch
    /// boundary) or an end-of-stream marker for this queue's decoder.
    /// The two are distinguished by `is_eof`.
    pub packet: Option<Packet>,
    pub stream_index: usize,
    /// Serial stamped at enqueue time.
    pub serial: i64,
    /// True for a "no more data is coming" marker, false for a flush sentinel.
    pub is_eof: bool,
}

impl PacketEntry {
    pub fn data(stream_index: usize, packet: Packet, serial: i64) -> Self {
        Self { packet: Some(packet), stream_index, serial, is_eof: false }
    }

    pub fn flush_sentinel(stream_index: usize, serial: i64) -> Self {
        Self { packet: None, stream_index, serial, is_eof: false }
    }

    pub fn eof_marker(stream_index: usize, serial: i64) -> Self {
        Self { packet: None, stream_index, serial, is_eof: true }
    }

    pub fn is_flush(&self) -> bool {
        self.packet.is_none() && !self.is_eof
    }

    /// Approximate per-node byte footprint: packet payload plus a fixed
    /// overhead for the node/struct itself.
    pub fn size_bytes(&self) -> u64 {
        const NODE_OVERHEAD: u64 = 64;
        self.packet.as_ref().map(|p| p.size() as u64).unwrap_or(0) + NODE_OVERHEAD
    }

    /// Duration in stream time-base units, 0 for sentinels/markers.
    pub fn duration(&self) -> i64 {
        self.packet.as_ref().map(|p| p.duration()).unwrap_or(0)
    }
}
