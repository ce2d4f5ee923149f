use crate::batch::{DEFAULT_BATCH_CAPACITY, MAX_DATAGRAM, MAX_UDP_PAYLOAD, RECORD_HEADER_SIZE};
use crate::error::{PeerError, Result};

/// Per-endpoint receive configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerConfig {
    /// Staging buffer size in bytes.
    pub batch_capacity: usize,
    /// Largest datagram guaranteed a whole receive slot. Longer ones are
    /// delivered only when the slot happens to be big enough.
    pub max_datagram: usize,
}

impl Default for PeerConfig {
    fn default() -> Self {
        Self {
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            max_datagram: MAX_DATAGRAM,
        }
    }
}

impl PeerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_batch_capacity(mut self, bytes: usize) -> Self {
        self.batch_capacity = bytes;
        self
    }

    pub fn with_max_datagram(mut self, bytes: usize) -> Self {
        self.max_datagram = bytes;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_datagram == 0 || self.max_datagram > MAX_UDP_PAYLOAD {
            return Err(PeerError::InvalidArgument(
                "max_datagram must be in 1..=65535",
            ));
        }
        if self.batch_capacity < RECORD_HEADER_SIZE + self.max_datagram {
            return Err(PeerError::InvalidArgument(
                "batch_capacity must hold one max_datagram record",
            ));
        }
        Ok(())
    }
}
