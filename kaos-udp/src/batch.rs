//! Staging buffer for one drain pass.
//!
//! Records are packed back to back with no alignment padding:
//!
//! ```text
//! +---------+-----------------+------------------+---------+----
//! | len u16 | InetAddr (18 B) | payload len B    | len u16 | ...
//! +---------+-----------------+------------------+---------+----
//! ```
//!
//! The buffer is allocated once and never grows. Writers reserve a slot with
//! [`DatagramBatch::slot`], receive into it, then [`DatagramBatch::commit`].

use bytemuck::{Pod, Zeroable};

use crate::addr::InetAddr;

/// Largest payload a UDP header can describe.
pub const MAX_UDP_PAYLOAD: usize = 65535;

/// Largest payload of a single IPv4 UDP datagram (65535 - 8 UDP - 20 IP).
pub const MAX_DATAGRAM: usize = 65507;

/// Bytes in front of every payload: 2-byte length + [`InetAddr`].
pub const RECORD_HEADER_SIZE: usize = std::mem::size_of::<RecordHeader>();

/// Room for eight worst-case records.
pub const DEFAULT_BATCH_CAPACITY: usize = (MAX_UDP_PAYLOAD + RECORD_HEADER_SIZE) * 8;

#[repr(C, packed)]
#[derive(Clone, Copy, Pod, Zeroable)]
struct RecordHeader {
    len: u16,
    addr: InetAddr,
}

/// Fixed-capacity sequence of `(length, sender, payload)` records.
pub struct DatagramBatch {
    data: Box<[u8]>,
    max_datagram: usize,
    offset: usize,
    count: usize,
}

impl DatagramBatch {
    /// # Panics
    ///
    /// Panics if `max_datagram` is 0 or larger than [`MAX_UDP_PAYLOAD`], or if
    /// `capacity` cannot hold one record of `max_datagram` bytes.
    pub fn new(capacity: usize, max_datagram: usize) -> Self {
        assert!(max_datagram > 0, "max_datagram must be > 0");
        assert!(
            max_datagram <= MAX_UDP_PAYLOAD,
            "max_datagram must be <= {MAX_UDP_PAYLOAD}"
        );
        assert!(
            capacity >= RECORD_HEADER_SIZE + max_datagram,
            "capacity must hold at least one record"
        );
        Self {
            data: vec![0u8; capacity].into_boxed_slice(),
            max_datagram,
            offset: 0,
            count: 0,
        }
    }

    /// Forget all records. The memory is reused.
    #[inline]
    pub fn clear(&mut self) {
        self.offset = 0;
        self.count = 0;
    }

    /// Number of records.
    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Bytes not yet occupied by records.
    #[inline]
    pub fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    pub fn max_datagram(&self) -> usize {
        self.max_datagram
    }

    /// True while a record carrying a `max_datagram`-byte payload still fits.
    ///
    /// Receiving stops as soon as this turns false, even if a smaller datagram
    /// would fit: the size of the next datagram is unknown until it is read,
    /// and reading it into a short slot would truncate it.
    #[inline]
    pub fn has_room(&self) -> bool {
        self.remaining() >= RECORD_HEADER_SIZE + self.max_datagram
    }

    /// Payload area of the next record, or `None` when [`has_room`](Self::has_room) is false.
    ///
    /// The slot may be larger than `max_datagram` (up to [`MAX_UDP_PAYLOAD`]) so
    /// that an oversized datagram is still read whole when space allows.
    pub fn slot(&mut self) -> Option<&mut [u8]> {
        if !self.has_room() {
            return None;
        }
        let start = self.offset + RECORD_HEADER_SIZE;
        let end = self.data.len().min(start + MAX_UDP_PAYLOAD);
        Some(&mut self.data[start..end])
    }

    /// Seal the record whose payload was written into the current slot.
    ///
    /// # Panics
    ///
    /// Panics if `len` exceeds the slot handed out by [`slot`](Self::slot).
    pub fn commit(&mut self, len: usize, addr: InetAddr) {
        let start = self.offset + RECORD_HEADER_SIZE;
        assert!(
            len <= MAX_UDP_PAYLOAD && start + len <= self.data.len(),
            "record overruns batch"
        );
        let header = RecordHeader {
            len: len as u16,
            addr,
        };
        self.data[self.offset..start].copy_from_slice(bytemuck::bytes_of(&header));
        self.offset = start + len;
        self.count += 1;
    }

    /// Copy `payload` in as a new record. False if there is no room.
    pub fn push(&mut self, payload: &[u8], addr: InetAddr) -> bool {
        let Some(slot) = self.slot() else {
            return false;
        };
        if payload.len() > slot.len() {
            return false;
        }
        slot[..payload.len()].copy_from_slice(payload);
        self.commit(payload.len(), addr);
        true
    }

    /// Records in the order they were committed.
    pub fn iter(&self) -> Records<'_> {
        Records {
            data: &self.data[..self.offset],
            remaining: self.count,
        }
    }
}

impl std::fmt::Debug for DatagramBatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatagramBatch")
            .field("capacity", &self.capacity())
            .field("max_datagram", &self.max_datagram)
            .field("len", &self.count)
            .field("used", &self.offset)
            .finish()
    }
}

impl<'a> IntoIterator for &'a DatagramBatch {
    type Item = Datagram<'a>;
    type IntoIter = Records<'a>;

    fn into_iter(self) -> Records<'a> {
        self.iter()
    }
}

/// One decoded record. Borrowed from the batch; valid until the next pass.
#[derive(Debug, Clone, Copy)]
pub struct Datagram<'a> {
    pub payload: &'a [u8],
    pub source: InetAddr,
}

/// Forward-only cursor over a [`DatagramBatch`].
pub struct Records<'a> {
    data: &'a [u8],
    remaining: usize,
}

impl<'a> Iterator for Records<'a> {
    type Item = Datagram<'a>;

    fn next(&mut self) -> Option<Datagram<'a>> {
        if self.remaining == 0 || self.data.len() < RECORD_HEADER_SIZE {
            return None;
        }
        let header: RecordHeader = bytemuck::pod_read_unaligned(&self.data[..RECORD_HEADER_SIZE]);
        let len = header.len as usize;
        let end = RECORD_HEADER_SIZE + len;
        if end > self.data.len() {
            return None;
        }
        let payload = &self.data[RECORD_HEADER_SIZE..end];
        self.data = &self.data[end..];
        self.remaining -= 1;
        Some(Datagram {
            payload,
            source: header.addr,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, Some(self.remaining))
    }
}
