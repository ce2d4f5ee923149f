//! Reference-counted command protocol.
//!
//! Every mutation of an endpoint runs on the reactor thread as a [`Command`].
//! A caller that submits a mutating command first takes a reference; the
//! command gives it back after applying its effect. `destroy` gives back the
//! reference the endpoint was created with. Whichever command brings the
//! count to zero releases the socket and registration instead of applying
//! its own effect, so teardown happens exactly once no matter how requests
//! from different threads interleave.

use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;

use kaos_reactor::{Channels, ReactorError};

use crate::peer::{MessageCallback, PeerEvents, PeerShared, WritableCallback};

/// Outcome of dropping one reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Release {
    Remaining(usize),
    Last,
}

#[derive(Debug)]
pub(crate) struct RefCount(AtomicUsize);

impl RefCount {
    /// Starts at one: the creator's reference.
    pub(crate) fn new() -> Self {
        Self(AtomicUsize::new(1))
    }

    /// Take a reference unless the count already reached zero.
    pub(crate) fn try_acquire(&self) -> bool {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if current == 0 {
                return false;
            }
            match self.0.compare_exchange_weak(
                current,
                current + 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
    }

    pub(crate) fn release(&self) -> Release {
        let previous = self.0.fetch_sub(1, Ordering::AcqRel);
        debug_assert!(previous > 0, "reference count underflow");
        if previous == 1 {
            Release::Last
        } else {
            Release::Remaining(previous - 1)
        }
    }

    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    pub(crate) fn count(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }
}

/// Where an endpoint is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PeerState {
    /// Socket open, commands apply normally.
    Active = 0,
    /// The last reference was released; resources are being freed.
    Finalizing = 1,
    /// Socket closed and deregistered.
    Destroyed = 2,
}

#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(PeerState::Active as u8))
    }

    pub(crate) fn get(&self) -> PeerState {
        match self.0.load(Ordering::Acquire) {
            0 => PeerState::Active,
            1 => PeerState::Finalizing,
            _ => PeerState::Destroyed,
        }
    }

    pub(crate) fn set(&self, state: PeerState) {
        self.0.store(state as u8, Ordering::Release);
    }
}

/// Work item executed on the reactor thread against one endpoint.
pub(crate) enum Command {
    /// Bind the readiness handler and enable the initial interest.
    Attach(PeerEvents),
    InstallMessage(Option<MessageCallback>),
    InstallWritable(Option<WritableCallback>),
    /// Give back the creator's reference.
    Destroy,
}

impl Command {
    #[cfg_attr(not(feature = "tracing"), allow(dead_code))]
    fn name(&self) -> &'static str {
        match self {
            Command::Attach(_) => "attach",
            Command::InstallMessage(_) => "install_message",
            Command::InstallWritable(_) => "install_writable",
            Command::Destroy => "destroy",
        }
    }

    /// Apply the command. Runs on the reactor thread only.
    pub(crate) fn run(self, peer: &PeerShared, channels: &mut Channels) {
        trace_debug!(peer = %peer.local, command = self.name(), refs = peer.refs.count(), "command");
        match self {
            // Rides on the creator's reference.
            Command::Attach(events) => peer.attach(events, channels),
            Command::Destroy => {
                if peer.refs.release() == Release::Last {
                    peer.teardown(channels);
                }
            }
            Command::InstallMessage(callback) => match peer.refs.release() {
                Release::Last => peer.teardown(channels),
                Release::Remaining(_) => peer.install_message(callback, channels),
            },
            Command::InstallWritable(callback) => match peer.refs.release() {
                Release::Last => peer.teardown(channels),
                Release::Remaining(_) => peer.install_writable(callback, channels),
            },
        }
    }
}

/// Queue `command` on the endpoint's reactor.
pub(crate) fn submit(peer: &Arc<PeerShared>, command: Command) -> Result<(), ReactorError> {
    let target = Arc::clone(peer);
    peer.reactor
        .run_in_loop(move |channels| command.run(&target, channels))
}

/// Give back a reference whose command could not be queued.
///
/// The reactor is gone, so if this was the last reference the socket is
/// closed here, on the caller's thread.
pub(crate) fn abandon(peer: &PeerShared) {
    if peer.refs.release() == Release::Last {
        peer.close();
    }
}
