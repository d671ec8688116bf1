//! Shared data model types that cross the Transport/Decoder boundary.

use serde::{Deserialize, Serialize};

/// One packet's worth of bytes, exactly as returned by a single USB bulk
/// read. Normally 512 bytes; the final packet of a session body may be
/// shorter if the device's last chunk read less than requested.
pub type Packet = Vec<u8>;

/// An opaque session as received from the device: an ordered sequence of
/// packets. Produced once by the Transport, consumed read-only by the
/// Decoder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RawSession {
    pub packets: Vec<Packet>,
}

impl RawSession {
    pub fn new(packets: Vec<Packet>) -> Self {
        Self { packets }
    }

    pub fn len(&self) -> usize {
        self.packets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packets.is_empty()
    }
}
