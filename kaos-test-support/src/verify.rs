//! Delivery verification: what a receive callback saw versus what was sent.

use std::net::SocketAddr;
use std::sync::{Condvar, Mutex};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

/// One callback invocation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivery {
    pub len: usize,
    pub hash: u64,
    pub source: SocketAddr,
    pub thread: ThreadId,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerifyResult {
    Ok,
    /// Record `index` differs from what was sent at that position.
    Mismatch {
        index: usize,
        expected_len: usize,
        actual_len: usize,
    },
    /// Fewer deliveries than sends.
    Missing { expected: usize, received: usize },
    /// More deliveries than sends.
    Unexpected { expected: usize, received: usize },
    /// A record arrived from somewhere other than the sender.
    WrongSource { index: usize, source: SocketAddr },
}

/// Thread-safe log fed from a receive callback.
#[derive(Default)]
pub struct DeliveryLog {
    deliveries: Mutex<Vec<Delivery>>,
    arrived: Condvar,
}

impl DeliveryLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one delivery. Call from the callback.
    pub fn record(&self, payload: &[u8], source: SocketAddr) {
        let delivery = Delivery {
            len: payload.len(),
            hash: simple_hash(payload),
            source,
            thread: thread::current().id(),
        };
        self.deliveries.lock().unwrap().push(delivery);
        self.arrived.notify_all();
    }

    pub fn len(&self) -> usize {
        self.deliveries.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<Delivery> {
        self.deliveries.lock().unwrap().clone()
    }

    /// Block until at least `count` deliveries were recorded.
    pub fn wait_for(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut deliveries = self.deliveries.lock().unwrap();
        while deliveries.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            deliveries = self
                .arrived
                .wait_timeout(deliveries, deadline - now)
                .unwrap()
                .0;
        }
        true
    }

    /// Check exact bytes and order, and that everything came from `source`.
    pub fn verify_in_order(&self, sent: &[Vec<u8>], source: SocketAddr) -> VerifyResult {
        let deliveries = self.deliveries.lock().unwrap();
        if deliveries.len() < sent.len() {
            return VerifyResult::Missing {
                expected: sent.len(),
                received: deliveries.len(),
            };
        }
        if deliveries.len() > sent.len() {
            return VerifyResult::Unexpected {
                expected: sent.len(),
                received: deliveries.len(),
            };
        }
        for (index, (delivery, payload)) in deliveries.iter().zip(sent).enumerate() {
            if delivery.len != payload.len() || delivery.hash != simple_hash(payload) {
                return VerifyResult::Mismatch {
                    index,
                    expected_len: payload.len(),
                    actual_len: delivery.len,
                };
            }
            if delivery.source != source {
                return VerifyResult::WrongSource {
                    index,
                    source: delivery.source,
                };
            }
        }
        VerifyResult::Ok
    }

    /// True when every delivery ran on `thread`.
    pub fn all_on_thread(&self, thread: ThreadId) -> bool {
        self.deliveries
            .lock()
            .unwrap()
            .iter()
            .all(|delivery| delivery.thread == thread)
    }

    /// Distinct threads that ran the callback.
    pub fn threads(&self) -> Vec<ThreadId> {
        let mut threads: Vec<ThreadId> = Vec::new();
        for delivery in self.deliveries.lock().unwrap().iter() {
            if !threads.contains(&delivery.thread) {
                threads.push(delivery.thread);
            }
        }
        threads
    }
}

/// FNV-1a
pub fn simple_hash(data: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for &byte in data {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}
