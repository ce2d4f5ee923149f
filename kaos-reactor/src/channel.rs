//! Per-descriptor registrations and their interest flags.

use std::collections::HashMap;
use std::ops::BitOr;
use std::os::fd::RawFd;

use mio::unix::SourceFd;
use mio::{Registry, Token};

use crate::error::{ReactorError, Result};

const READABLE: u8 = 0b01;
const WRITABLE: u8 = 0b10;

/// Readiness subscription of a channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Interest(u8);

impl Interest {
    pub const NONE: Interest = Interest(0);
    pub const READABLE: Interest = Interest(READABLE);
    pub const WRITABLE: Interest = Interest(WRITABLE);

    pub fn is_readable(self) -> bool {
        self.0 & READABLE != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & WRITABLE != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Interest with the flags of `other` removed.
    pub fn remove(self, other: Interest) -> Interest {
        Interest(self.0 & !other.0)
    }

    fn to_mio(self) -> Option<mio::Interest> {
        match (self.is_readable(), self.is_writable()) {
            (true, true) => Some(mio::Interest::READABLE | mio::Interest::WRITABLE),
            (true, false) => Some(mio::Interest::READABLE),
            (false, true) => Some(mio::Interest::WRITABLE),
            (false, false) => None,
        }
    }
}

impl BitOr for Interest {
    type Output = Interest;

    fn bitor(self, rhs: Interest) -> Interest {
        Interest(self.0 | rhs.0)
    }
}

/// Readiness reported to an [`EventHandler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Ready(u8);

impl Ready {
    pub const EMPTY: Ready = Ready(0);
    pub const READABLE: Ready = Ready(READABLE);
    pub const WRITABLE: Ready = Ready(WRITABLE);

    pub fn is_readable(self) -> bool {
        self.0 & READABLE != 0
    }

    pub fn is_writable(self) -> bool {
        self.0 & WRITABLE != 0
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Errors and hang-ups surface as readable so the next read reports them.
    pub(crate) fn from_event(event: &mio::event::Event) -> Ready {
        let mut bits = 0;
        if event.is_readable() || event.is_read_closed() || event.is_error() {
            bits |= READABLE;
        }
        if event.is_writable() || event.is_write_closed() {
            bits |= WRITABLE;
        }
        Ready(bits)
    }

    fn mask(self, interest: Interest) -> Ready {
        Ready(self.0 & interest.0)
    }
}

impl BitOr for Ready {
    type Output = Ready;

    fn bitor(self, rhs: Ready) -> Ready {
        Ready(self.0 | rhs.0)
    }
}

/// What the reactor should do with a channel after its handler returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// Handler consumed everything it was told about.
    Done,
    /// More input is pending; dispatch readable again on the next turn.
    Again,
}

/// Readiness callback bound to one channel. Runs on the reactor thread.
pub trait EventHandler: Send {
    fn on_event(&mut self, ready: Ready) -> Dispatch;
}

/// Registration handle: a token bound 1:1 to a descriptor.
///
/// Allocated from any thread with [`ReactorHandle::channel`](crate::ReactorHandle::channel),
/// attached on the reactor thread with [`Channels::attach`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Channel {
    token: Token,
    fd: RawFd,
}

impl Channel {
    pub(crate) fn new(token: Token, fd: RawFd) -> Self {
        Self { token, fd }
    }

    pub fn token(&self) -> Token {
        self.token
    }

    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

struct Entry {
    fd: RawFd,
    interest: Interest,
    /// Whether the descriptor is currently registered with the poller.
    polled: bool,
    handler: Box<dyn EventHandler>,
}

/// Channel table owned by the reactor thread.
///
/// Only reachable through a task queued with
/// [`ReactorHandle::run_in_loop`](crate::ReactorHandle::run_in_loop), so every
/// mutation is serialized with readiness dispatch.
pub struct Channels {
    registry: Registry,
    entries: HashMap<Token, Entry>,
}

impl Channels {
    pub(crate) fn new(registry: Registry) -> Self {
        Self {
            registry,
            entries: HashMap::new(),
        }
    }

    /// Bind `handler` to `channel`. No readiness is delivered until an
    /// interest is set.
    pub fn attach(&mut self, channel: Channel, handler: Box<dyn EventHandler>) -> Result<()> {
        if self.entries.contains_key(&channel.token) {
            return Err(ReactorError::ChannelInUse(channel.token.0));
        }
        self.entries.insert(
            channel.token,
            Entry {
                fd: channel.fd,
                interest: Interest::NONE,
                polled: false,
                handler,
            },
        );
        trace_debug!(token = channel.token.0, fd = channel.fd, "channel attached");
        Ok(())
    }

    /// Remove `channel` from the poller and hand its handler back.
    ///
    /// The descriptor itself is left open; closing it is the owner's job.
    pub fn detach(&mut self, channel: Channel) -> Option<Box<dyn EventHandler>> {
        let entry = self.entries.remove(&channel.token)?;
        if entry.polled {
            if let Err(_e) = self.registry.deregister(&mut SourceFd(&entry.fd)) {
                trace_warn!(token = channel.token.0, error = %_e, "deregister failed");
            }
        }
        trace_debug!(token = channel.token.0, fd = entry.fd, "channel detached");
        Some(entry.handler)
    }

    /// Add `interest` to the channel's subscription.
    pub fn set_interest(&mut self, channel: Channel, interest: Interest) -> Result<()> {
        self.update(channel, |current| current | interest)
    }

    /// Remove `interest` from the channel's subscription.
    pub fn clear_interest(&mut self, channel: Channel, interest: Interest) -> Result<()> {
        self.update(channel, |current| current.remove(interest))
    }

    pub fn interest(&self, channel: Channel) -> Option<Interest> {
        self.entries.get(&channel.token).map(|entry| entry.interest)
    }

    pub fn is_attached(&self, channel: Channel) -> bool {
        self.entries.contains_key(&channel.token)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn update<F>(&mut self, channel: Channel, f: F) -> Result<()>
    where
        F: FnOnce(Interest) -> Interest,
    {
        let entry = self
            .entries
            .get_mut(&channel.token)
            .ok_or(ReactorError::UnknownChannel(channel.token.0))?;
        let next = f(entry.interest);
        let mut source = SourceFd(&entry.fd);

        // An empty subscription takes the descriptor out of the poller entirely.
        match (next.to_mio(), entry.polled) {
            (None, true) => {
                self.registry.deregister(&mut source)?;
                entry.polled = false;
            }
            (None, false) => {}
            (Some(interest), true) => {
                self.registry.reregister(&mut source, channel.token, interest)?;
            }
            (Some(interest), false) => {
                self.registry.register(&mut source, channel.token, interest)?;
                entry.polled = true;
            }
        }
        entry.interest = next;
        trace_debug!(
            token = channel.token.0,
            readable = next.is_readable(),
            writable = next.is_writable(),
            "interest updated"
        );
        Ok(())
    }

    /// Run the handler for `token`, masked by its current interest.
    pub(crate) fn dispatch(&mut self, token: Token, ready: Ready) -> Option<Dispatch> {
        let entry = self.entries.get_mut(&token)?;
        let ready = ready.mask(entry.interest);
        if ready.is_empty() {
            return None;
        }
        Some(entry.handler.on_event(ready))
    }
}
