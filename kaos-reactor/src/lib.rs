//! # kaos-reactor
//!
//! Single-threaded readiness reactor for Kaos transports.
//!
//! One thread owns the poller and runs every readiness callback and every
//! submitted task. Other threads talk to it through a [`ReactorHandle`]:
//!
//! - [`ReactorHandle::run_in_loop`] queues a task; tasks run in submission order
//! - [`ReactorHandle::channel`] allocates a registration handle for a descriptor
//! - [`Channels`] (only reachable from inside a task) attaches handlers and
//!   toggles readable/writable interest
//!
//! ```rust,no_run
//! use kaos_reactor::{Interest, ReactorThread};
//!
//! let reactor = ReactorThread::spawn("kaos-reactor").unwrap();
//! reactor
//!     .handle()
//!     .run_in_loop(|channels| {
//!         println!("{} channels attached", channels.len());
//!     })
//!     .unwrap();
//! reactor.stop_and_join().unwrap();
//! # let _ = Interest::READABLE;
//! ```
//!
//! Readiness is edge-triggered underneath (mio). A handler that stops reading
//! before the socket reports `WouldBlock` returns [`Dispatch::Again`] and is
//! re-dispatched on the next loop turn without blocking in the poller.

// Tracing macros - no-op when feature disabled
#[cfg(feature = "tracing")]
macro_rules! trace_debug { ($($arg:tt)*) => { tracing::debug!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_debug { ($($arg:tt)*) => {} }

#[cfg(feature = "tracing")]
macro_rules! trace_warn { ($($arg:tt)*) => { tracing::warn!($($arg)*) } }
#[cfg(not(feature = "tracing"))]
macro_rules! trace_warn { ($($arg:tt)*) => {} }

mod channel;
mod error;
mod reactor;
mod thread;

pub use channel::{Channel, Channels, Dispatch, EventHandler, Interest, Ready};
pub use error::{ReactorError, Result};
pub use reactor::{Reactor, ReactorConfig, ReactorHandle, Task};
pub use thread::ReactorThread;
