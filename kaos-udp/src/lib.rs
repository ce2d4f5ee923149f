//! # kaos-udp
//!
//! Best-effort UDP endpoint driven by a [`kaos_reactor`] loop.
//!
//! ## Features
//!
//! - **Batched receive**: every readable wake-up drains as many datagrams as
//!   fit into one pre-allocated staging buffer, then delivers them in order
//! - **Never delivers a cut datagram**: a drain pass stops while a
//!   `max_datagram` record still fits, and resumes on the next loop turn. A
//!   longer datagram that does not fit its slot is dropped and counted in
//!   [`PeerStats::truncated`]
//! - **Cross-thread control**: callbacks can be swapped and the endpoint torn
//!   down from any thread; all mutation runs on the reactor thread
//! - **Lock-free send path**: `send` goes straight to `sendto` from the caller
//!
//! No retransmission, fragmentation or congestion control. Callers size their
//! messages and tolerate loss.
//!
//! ```rust,no_run
//! use kaos_udp::{ReactorThread, UdpPeer};
//!
//! let reactor = ReactorThread::spawn("udp").unwrap();
//! let peer = UdpPeer::new(reactor.handle(), "127.0.0.1", 9000, |peer, payload, from| {
//!     println!("{} bytes from {from}", payload.len());
//!     let _ = peer.send(payload, from);
//! }, None)
//! .unwrap();
//!
//! peer.destroy();
//! reactor.stop_and_join().unwrap();
//! ```

// Tracing macros - no-op when feature disabled
#[cfg(feature = "tracing")]
macro_rules! trace_debug { ($($arg:tt)*) => { tracing::debug!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug { ($($arg:tt)*) => {} }

#[cfg(feature = "tracing")]
macro_rules! trace_warn { ($($arg:tt)*) => { tracing::warn!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn { ($($arg:tt)*) => {} }

#[cfg(feature = "tracing")]
macro_rules! trace_error { ($($arg:tt)*) => { tracing::error!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_error { ($($arg:tt)*) => {} }

mod addr;
pub mod batch;
mod config;
mod error;
mod lifecycle;
mod peer;
pub mod socket;
mod stats;

pub use addr::InetAddr;
pub use batch::{
    Datagram, DatagramBatch, DEFAULT_BATCH_CAPACITY, MAX_DATAGRAM, MAX_UDP_PAYLOAD,
    RECORD_HEADER_SIZE,
};
pub use config::PeerConfig;
pub use error::{PeerError, Result};
pub use lifecycle::PeerState;
pub use peer::{
    message_callback, writable_callback, MessageCallback, PeerHandle, UdpPeer, WritableCallback,
};
pub use socket::BufferKind;
pub use stats::PeerStats;

pub use kaos_reactor::{Reactor, ReactorHandle, ReactorThread};
