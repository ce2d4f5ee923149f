use std::sync::atomic::{AtomicU64, Ordering};

/// Point-in-time copy of an endpoint's counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeerStats {
    /// Datagrams read from the socket.
    pub received: u64,
    /// Datagrams handed to the message callback.
    pub delivered: u64,
    /// Datagrams discarded because no message callback was installed.
    pub dropped: u64,
    /// Datagrams longer than the receive slot, discarded unread.
    pub truncated: u64,
    /// Receive failures other than would-block / connection-reset.
    pub receive_errors: u64,
    /// Datagrams fully written by `send`.
    pub sent: u64,
}

#[derive(Debug, Default)]
pub(crate) struct PeerCounters {
    received: AtomicU64,
    delivered: AtomicU64,
    dropped: AtomicU64,
    truncated: AtomicU64,
    receive_errors: AtomicU64,
    sent: AtomicU64,
}

impl PeerCounters {
    #[inline]
    pub(crate) fn record_receive(&self, n: u64) {
        self.received.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_delivered(&self, n: u64) {
        self.delivered.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_dropped(&self, n: u64) {
        self.dropped.fetch_add(n, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_truncated(&self) {
        self.truncated.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_receive_error(&self) {
        self.receive_errors.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn record_send(&self) {
        self.sent.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> PeerStats {
        PeerStats {
            received: self.received.load(Ordering::Relaxed),
            delivered: self.delivered.load(Ordering::Relaxed),
            dropped: self.dropped.load(Ordering::Relaxed),
            truncated: self.truncated.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            sent: self.sent.load(Ordering::Relaxed),
        }
    }
}
