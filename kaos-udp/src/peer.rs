//! The UDP endpoint: creation, send path, callback replacement, teardown,
//! and the readiness handler that drains the socket.

use std::io::{self, ErrorKind};
use std::net::{SocketAddr, UdpSocket};
use std::ops::Deref;
use std::os::fd::AsRawFd;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use kaos_reactor::{Channel, Channels, Dispatch, EventHandler, Interest, ReactorHandle, Ready};
use parking_lot::{Mutex, RwLock};

use crate::addr::InetAddr;
use crate::batch::{DatagramBatch, MAX_UDP_PAYLOAD};
use crate::config::PeerConfig;
use crate::error::{PeerError, Result};
use crate::lifecycle::{self, Command, PeerState, RefCount, StateCell};
use crate::socket::{self, BufferKind};
use crate::stats::{PeerCounters, PeerStats};

/// Called once per received datagram, on the reactor thread.
pub type MessageCallback = Arc<dyn Fn(&PeerHandle, &[u8], &InetAddr) + Send + Sync>;

/// Called when the socket reports writable, on the reactor thread.
pub type WritableCallback = Arc<dyn Fn(&PeerHandle) + Send + Sync>;

/// Box a closure as a [`MessageCallback`].
pub fn message_callback<F>(f: F) -> MessageCallback
where
    F: Fn(&PeerHandle, &[u8], &InetAddr) + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Box a closure as a [`WritableCallback`].
pub fn writable_callback<F>(f: F) -> WritableCallback
where
    F: Fn(&PeerHandle) + Send + Sync + 'static,
{
    Arc::new(f)
}

#[derive(Default)]
struct Callbacks {
    on_message: Option<MessageCallback>,
    on_writable: Option<WritableCallback>,
}

/// State shared by every handle, the readiness handler and queued commands.
pub(crate) struct PeerShared {
    pub(crate) local: InetAddr,
    /// `None` once torn down; `send` then reports `EBADF`.
    socket: RwLock<Option<UdpSocket>>,
    channel: Channel,
    pub(crate) reactor: ReactorHandle,
    pub(crate) refs: RefCount,
    state: StateCell,
    callbacks: Mutex<Callbacks>,
    counters: PeerCounters,
}

impl PeerShared {
    pub(crate) fn attach(&self, events: PeerEvents, channels: &mut Channels) {
        if self.state.get() != PeerState::Active {
            return;
        }
        if let Err(_e) = channels.attach(self.channel, Box::new(events)) {
            trace_error!(peer = %self.local, error = %_e, "attach failed");
            return;
        }

        let mut interest = Interest::NONE;
        {
            let callbacks = self.callbacks.lock();
            if callbacks.on_message.is_some() {
                interest = interest | Interest::READABLE;
            }
            if callbacks.on_writable.is_some() {
                interest = interest | Interest::WRITABLE;
            }
        }
        if let Err(_e) = channels.set_interest(self.channel, interest) {
            trace_error!(peer = %self.local, error = %_e, "enable interest failed");
        }
    }

    pub(crate) fn install_message(&self, callback: Option<MessageCallback>, channels: &mut Channels) {
        let enable = callback.is_some();
        let previous = std::mem::replace(&mut self.callbacks.lock().on_message, callback);
        drop(previous);
        self.toggle(channels, Interest::READABLE, enable);
    }

    pub(crate) fn install_writable(&self, callback: Option<WritableCallback>, channels: &mut Channels) {
        let enable = callback.is_some();
        let previous = std::mem::replace(&mut self.callbacks.lock().on_writable, callback);
        drop(previous);
        self.toggle(channels, Interest::WRITABLE, enable);
    }

    fn toggle(&self, channels: &mut Channels, interest: Interest, enable: bool) {
        let result = if enable {
            channels.set_interest(self.channel, interest)
        } else {
            channels.clear_interest(self.channel, interest)
        };
        if let Err(_e) = result {
            trace_warn!(peer = %self.local, error = %_e, "interest update failed");
        }
    }

    /// Deregister and close. Runs once, on the reactor thread.
    pub(crate) fn teardown(&self, channels: &mut Channels) {
        self.state.set(PeerState::Finalizing);
        let handler = channels.detach(self.channel);
        drop(handler);
        self.close();
    }

    /// Close the socket and drop the callbacks.
    pub(crate) fn close(&self) {
        self.state.set(PeerState::Finalizing);
        let socket = self.socket.write().take();
        drop(socket);
        let callbacks = std::mem::take(&mut *self.callbacks.lock());
        drop(callbacks);
        self.state.set(PeerState::Destroyed);
        trace_debug!(peer = %self.local, "udp peer destroyed");
    }

    fn message_callback(&self) -> Option<MessageCallback> {
        self.callbacks.lock().on_message.clone()
    }

    fn writable_callback(&self) -> Option<WritableCallback> {
        self.callbacks.lock().on_writable.clone()
    }
}

/// Cheap, cloneable access to an endpoint from any thread.
///
/// Callbacks receive one so they can reply or reconfigure the endpoint.
#[derive(Clone)]
pub struct PeerHandle {
    shared: Arc<PeerShared>,
}

impl PeerHandle {
    /// Send one datagram to `to`.
    ///
    /// Goes straight to `sendto`; never queued, retried or fragmented.
    pub fn send(&self, payload: &[u8], to: &InetAddr) -> Result<usize> {
        self.send_to(payload, SocketAddr::V4(to.to_socket_addr()))
    }

    /// [`send`](Self::send) for callers already holding a socket address.
    pub fn send_to(&self, payload: &[u8], to: SocketAddr) -> Result<usize> {
        if payload.is_empty() || payload.len() > MAX_UDP_PAYLOAD {
            return Err(PeerError::InvalidArgument(
                "payload length must be in 1..=65535",
            ));
        }

        let socket = self.shared.socket.read();
        let Some(socket) = socket.as_ref() else {
            return Err(PeerError::Send {
                source: io::Error::from_raw_os_error(libc::EBADF),
            });
        };

        match socket.send_to(payload, to) {
            Ok(sent) if sent == payload.len() => {
                self.shared.counters.record_send();
                Ok(sent)
            }
            Ok(sent) => {
                trace_warn!(peer = %self.shared.local, sent, len = payload.len(), "short send");
                Err(PeerError::ShortSend {
                    sent,
                    len: payload.len(),
                })
            }
            Err(source) => Err(PeerError::Send { source }),
        }
    }

    /// Replace the message callback. `None` stops reading from the socket.
    ///
    /// Takes effect asynchronously on the reactor thread. Returns the callback
    /// installed at the time of the call; a concurrent replacement from
    /// another thread may already have superseded it.
    pub fn set_message_callback(&self, callback: Option<MessageCallback>) -> Option<MessageCallback> {
        let previous = self.shared.message_callback();
        self.submit_counted(Command::InstallMessage(callback));
        previous
    }

    /// Replace the writable callback. `None` drops the writable subscription.
    ///
    /// Readiness is edge-triggered: the callback fires when the socket
    /// becomes writable, not continuously while it stays writable.
    pub fn set_writable_callback(&self, callback: Option<WritableCallback>) -> Option<WritableCallback> {
        let previous = self.shared.writable_callback();
        self.submit_counted(Command::InstallWritable(callback));
        previous
    }

    fn submit_counted(&self, command: Command) {
        if !self.shared.refs.try_acquire() {
            trace_warn!(peer = %self.shared.local, "request against destroyed udp peer ignored");
            return;
        }
        if let Err(_e) = lifecycle::submit(&self.shared, command) {
            trace_warn!(peer = %self.shared.local, error = %_e, "reactor rejected command");
            lifecycle::abandon(&self.shared);
        }
    }

    /// Port the endpoint was created with.
    pub fn port(&self) -> u16 {
        self.shared.local.port()
    }

    pub fn local_addr(&self) -> InetAddr {
        self.shared.local
    }

    /// Grow the kernel send buffer by `extra` bytes, rounded up to KiB.
    pub fn expand_send_buffer(&self, extra: usize) {
        self.expand_buffer(BufferKind::Send, extra);
    }

    /// Grow the kernel receive buffer by `extra` bytes, rounded up to KiB.
    pub fn expand_recv_buffer(&self, extra: usize) {
        self.expand_buffer(BufferKind::Receive, extra);
    }

    // Best-effort: a failed read is logged, a failed write is ignored.
    fn expand_buffer(&self, kind: BufferKind, extra: usize) {
        let socket = self.shared.socket.read();
        let Some(socket) = socket.as_ref() else {
            return;
        };
        let current = match socket::buffer_size(socket, kind) {
            Ok(bytes) => bytes,
            Err(_e) => {
                trace_error!(peer = %self.shared.local, ?kind, error = %_e, "read socket buffer size failed");
                return;
            }
        };
        let target = current.saturating_add(socket::round_up_kib(extra));
        if let Err(_e) = socket::set_buffer_size(socket, kind, target) {
            trace_debug!(peer = %self.shared.local, ?kind, target, error = %_e, "set socket buffer size failed");
        }
    }

    /// Current kernel buffer size, `None` after teardown.
    pub fn socket_buffer_size(&self, kind: BufferKind) -> Option<usize> {
        let socket = self.shared.socket.read();
        socket
            .as_ref()
            .and_then(|socket| socket::buffer_size(socket, kind).ok())
    }

    pub fn state(&self) -> PeerState {
        self.shared.state.get()
    }

    pub fn stats(&self) -> PeerStats {
        self.shared.counters.snapshot()
    }
}

impl std::fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerHandle")
            .field("local", &self.shared.local)
            .field("state", &self.state())
            .finish()
    }
}

/// How a drain pass ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DrainEnd {
    /// Socket empty.
    WouldBlock,
    /// ICMP error surfaced; more datagrams may be queued behind it.
    Reset,
    /// Logged receive failure.
    Failed,
    /// Staging buffer cannot take another worst-case datagram.
    Full,
}

/// Consecutive failed passes that still get a re-dispatch.
const FAILED_PASS_RETRIES: u32 = 1;

/// Readiness handler registered with the reactor.
pub(crate) struct PeerEvents {
    peer: PeerHandle,
    batch: DatagramBatch,
    failed_passes: u32,
}

impl PeerEvents {
    pub(crate) fn new(peer: PeerHandle, batch: DatagramBatch) -> Self {
        Self {
            peer,
            batch,
            failed_passes: 0,
        }
    }

    fn drain(&mut self) -> DrainEnd {
        self.batch.clear();
        let shared = &self.peer.shared;
        let guard = shared.socket.read();
        let Some(sock) = guard.as_ref() else {
            return DrainEnd::WouldBlock;
        };

        while let Some(slot) = self.batch.slot() {
            let _slot_len = slot.len();
            match socket::recv_datagram(sock, slot) {
                Ok(received) if received.truncated => {
                    trace_warn!(
                        peer = %shared.local,
                        from = ?received.from,
                        slot = _slot_len,
                        "datagram larger than receive slot, dropped"
                    );
                    shared.counters.record_truncated();
                }
                Ok(received) => {
                    let from = received.from.map(InetAddr::from).unwrap_or_default();
                    self.batch.commit(received.len, from);
                }
                Err(e) if e.kind() == ErrorKind::WouldBlock => return DrainEnd::WouldBlock,
                Err(e) if e.kind() == ErrorKind::ConnectionReset => return DrainEnd::Reset,
                Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                Err(_e) => {
                    trace_error!(peer = %shared.local, error = %_e, "recvfrom failed");
                    shared.counters.record_receive_error();
                    return DrainEnd::Failed;
                }
            }
        }
        DrainEnd::Full
    }

    /// Edge-triggered readiness will not repeat for data already queued, so
    /// every pass that may have left datagrams behind asks for another one.
    /// A failing socket gets [`FAILED_PASS_RETRIES`] of them.
    fn next_dispatch(&mut self, end: DrainEnd) -> Dispatch {
        if end != DrainEnd::Failed {
            self.failed_passes = 0;
        }
        match end {
            DrainEnd::Full | DrainEnd::Reset => Dispatch::Again,
            DrainEnd::WouldBlock => Dispatch::Done,
            DrainEnd::Failed if self.failed_passes < FAILED_PASS_RETRIES => {
                self.failed_passes += 1;
                Dispatch::Again
            }
            DrainEnd::Failed => {
                self.failed_passes = 0;
                Dispatch::Done
            }
        }
    }

    fn deliver(&self) {
        let count = self.batch.len() as u64;
        if count == 0 {
            return;
        }
        let shared = &self.peer.shared;
        shared.counters.record_receive(count);

        match shared.message_callback() {
            Some(on_message) => {
                for datagram in &self.batch {
                    on_message(&self.peer, datagram.payload, &datagram.source);
                }
                shared.counters.record_delivered(count);
            }
            None => {
                trace_warn!(peer = %shared.local, count, "no message callback, datagrams dropped");
                shared.counters.record_dropped(count);
            }
        }
    }
}

impl EventHandler for PeerEvents {
    fn on_event(&mut self, ready: Ready) -> Dispatch {
        if ready.is_writable() {
            if let Some(on_writable) = self.peer.shared.writable_callback() {
                on_writable(&self.peer);
            }
        }
        if !ready.is_readable() {
            return Dispatch::Done;
        }

        let end = self.drain();
        self.deliver();
        self.next_dispatch(end)
    }
}

/// A bound UDP endpoint.
///
/// Owns the creation reference. [`destroy`](Self::destroy) (or drop) gives
/// it back; the socket closes once every in-flight command has run.
/// Dereferences to [`PeerHandle`] for sending and reconfiguration.
pub struct UdpPeer {
    handle: PeerHandle,
    destroyed: AtomicBool,
}

impl UdpPeer {
    /// Bind `ip:port` and start delivering datagrams to `on_message`.
    pub fn new<F>(
        reactor: &ReactorHandle,
        ip: &str,
        port: u16,
        on_message: F,
        on_writable: Option<WritableCallback>,
    ) -> Result<Self>
    where
        F: Fn(&PeerHandle, &[u8], &InetAddr) + Send + Sync + 'static,
    {
        Self::with_config(
            reactor,
            ip,
            port,
            PeerConfig::default(),
            Arc::new(on_message),
            on_writable,
        )
    }

    pub fn with_config(
        reactor: &ReactorHandle,
        ip: &str,
        port: u16,
        config: PeerConfig,
        on_message: MessageCallback,
        on_writable: Option<WritableCallback>,
    ) -> Result<Self> {
        config.validate()?;
        if ip.is_empty() {
            trace_error!("udp peer: empty bind ip");
            return Err(PeerError::InvalidArgument("bind ip must not be empty"));
        }
        if port == 0 {
            trace_error!(ip, "udp peer: bind port is 0");
            return Err(PeerError::InvalidArgument("bind port must not be 0"));
        }
        let local = InetAddr::parse(ip, port).ok_or_else(|| {
            trace_error!(ip, "udp peer: bind ip is not IPv4");
            PeerError::InvalidArgument("bind ip must be dotted-decimal IPv4")
        })?;

        let addr = local.to_socket_addr();
        let socket = socket::create_bound_udp_socket(addr).map_err(|source| {
            trace_error!(%addr, error = %source, "udp peer: bind failed");
            PeerError::Bind { addr, source }
        })?;
        let channel = reactor.channel(socket.as_raw_fd());

        let handle = PeerHandle {
            shared: Arc::new(PeerShared {
                local,
                socket: RwLock::new(Some(socket)),
                channel,
                reactor: reactor.clone(),
                refs: RefCount::new(),
                state: StateCell::new(),
                callbacks: Mutex::new(Callbacks {
                    on_message: Some(on_message),
                    on_writable,
                }),
                counters: PeerCounters::default(),
            }),
        };

        let events = PeerEvents::new(
            handle.clone(),
            DatagramBatch::new(config.batch_capacity, config.max_datagram),
        );
        lifecycle::submit(&handle.shared, Command::Attach(events))?;

        trace_debug!(peer = %local, batch_capacity = config.batch_capacity, "udp peer created");
        Ok(Self {
            handle,
            destroyed: AtomicBool::new(false),
        })
    }

    pub fn handle(&self) -> &PeerHandle {
        &self.handle
    }

    /// Give back the creation reference. Later calls only warn.
    pub fn destroy(&self) {
        if !self.release_creation_ref() {
            trace_warn!(peer = %self.handle.shared.local, "udp peer destroyed twice");
        }
    }

    fn release_creation_ref(&self) -> bool {
        if self.destroyed.swap(true, Ordering::AcqRel) {
            return false;
        }
        let shared = &self.handle.shared;
        if let Err(_e) = lifecycle::submit(shared, Command::Destroy) {
            trace_warn!(peer = %shared.local, error = %_e, "reactor gone, closing inline");
            lifecycle::abandon(shared);
        }
        true
    }
}

impl Deref for UdpPeer {
    type Target = PeerHandle;

    fn deref(&self) -> &PeerHandle {
        &self.handle
    }
}

impl Drop for UdpPeer {
    fn drop(&mut self) {
        self.release_creation_ref();
    }
}

impl std::fmt::Debug for UdpPeer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UdpPeer")
            .field("local", &self.handle.shared.local)
            .field("state", &self.handle.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::RECORD_HEADER_SIZE;
    use kaos_reactor::Reactor;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn free_port() -> u16 {
        let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    }

    fn counting_peer(reactor: &Reactor, hits: Arc<AtomicUsize>) -> UdpPeer {
        UdpPeer::new(
            &reactor.handle(),
            "127.0.0.1",
            free_port(),
            move |_, _, _| {
                hits.fetch_add(1, Ordering::SeqCst);
            },
            None,
        )
        .unwrap()
    }

    fn client_for(peer: &UdpPeer) -> UdpSocket {
        let client = UdpSocket::bind("127.0.0.1:0").unwrap();
        client
            .connect(peer.local_addr().to_socket_addr())
            .unwrap();
        client
    }

    #[test]
    fn test_attach_enables_readable() {
        let mut reactor = Reactor::new().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let peer = counting_peer(&reactor, hits.clone());
        reactor.turn(Some(Duration::ZERO)).unwrap();

        client_for(&peer).send(b"hello").unwrap();
        for _ in 0..20 {
            reactor.turn(Some(Duration::from_millis(50))).unwrap();
            if hits.load(Ordering::SeqCst) == 1 {
                break;
            }
        }
        assert_eq!(hits.load(Ordering::SeqCst), 1);
        assert_eq!(peer.stats().delivered, 1);
    }

    #[test]
    fn test_missing_callback_drops_batch() {
        let mut reactor = Reactor::new().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let peer = counting_peer(&reactor, hits.clone());
        assert!(peer.set_message_callback(None).is_some());
        reactor.turn(Some(Duration::ZERO)).unwrap();
        assert_eq!(peer.shared.refs.count(), 1);

        let client = client_for(&peer);
        for _ in 0..3 {
            client.send(b"lost").unwrap();
        }

        // Readable interest is off; drive the handler directly.
        let mut events = PeerEvents::new(peer.handle().clone(), DatagramBatch::new(4096, 512));
        assert_eq!(events.on_event(Ready::READABLE), Dispatch::Done);

        let stats = peer.stats();
        assert_eq!(stats.received, 3);
        assert_eq!(stats.dropped, 3);
        assert_eq!(stats.delivered, 0);
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_drain_stops_before_truncation_risk() {
        let reactor = Reactor::new().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let peer = counting_peer(&reactor, hits.clone());
        let client = client_for(&peer);
        for i in 0..5u8 {
            client.send(&[i; 100]).unwrap();
        }

        // Two 100-byte records leave 119 bytes, one short of a third.
        let capacity = 3 * (RECORD_HEADER_SIZE + 100) - 1;
        let mut events = PeerEvents::new(peer.handle().clone(), DatagramBatch::new(capacity, 100));

        assert_eq!(events.on_event(Ready::READABLE), Dispatch::Again);
        assert_eq!(hits.load(Ordering::SeqCst), 2);
        assert_eq!(events.on_event(Ready::READABLE), Dispatch::Again);
        assert_eq!(hits.load(Ordering::SeqCst), 4);
        assert_eq!(events.on_event(Ready::READABLE), Dispatch::Done);
        assert_eq!(hits.load(Ordering::SeqCst), 5);
        assert_eq!(peer.stats().received, 5);
    }

    #[test]
    fn test_oversized_datagram_is_dropped_not_cut() {
        let reactor = Reactor::new().unwrap();
        let lens = Arc::new(Mutex::new(Vec::new()));
        let seen = lens.clone();
        let peer = UdpPeer::new(
            &reactor.handle(),
            "127.0.0.1",
            free_port(),
            move |_, payload, _| seen.lock().push(payload.len()),
            None,
        )
        .unwrap();
        let client = client_for(&peer);
        client.send(&[1u8; 512]).unwrap();
        client.send(&[2u8; 1000]).unwrap();
        client.send(&[3u8; 200]).unwrap();
        std::thread::sleep(Duration::from_millis(20));

        // After the first record only a 512-byte slot is left.
        let capacity = 2 * (RECORD_HEADER_SIZE + 512);
        let mut events = PeerEvents::new(peer.handle().clone(), DatagramBatch::new(capacity, 512));
        assert_eq!(events.on_event(Ready::READABLE), Dispatch::Again);
        assert_eq!(events.on_event(Ready::READABLE), Dispatch::Done);

        assert_eq!(*lens.lock(), vec![512, 200]);
        let stats = peer.stats();
        assert_eq!(stats.truncated, 1);
        assert_eq!(stats.delivered, 2);
    }

    #[test]
    fn test_failed_pass_is_retried_once() {
        let reactor = Reactor::new().unwrap();
        let peer = counting_peer(&reactor, Arc::new(AtomicUsize::new(0)));
        let mut events = PeerEvents::new(peer.handle().clone(), DatagramBatch::new(4096, 512));

        assert_eq!(events.next_dispatch(DrainEnd::Failed), Dispatch::Again);
        assert_eq!(events.next_dispatch(DrainEnd::Failed), Dispatch::Done);
        // Giving up starts the budget over for the next edge.
        assert_eq!(events.next_dispatch(DrainEnd::Failed), Dispatch::Again);
        assert_eq!(events.next_dispatch(DrainEnd::WouldBlock), Dispatch::Done);
        assert_eq!(events.next_dispatch(DrainEnd::Failed), Dispatch::Again);
        assert_eq!(events.next_dispatch(DrainEnd::Full), Dispatch::Again);
        assert_eq!(events.next_dispatch(DrainEnd::Failed), Dispatch::Again);
    }

    #[test]
    fn test_teardown_closes_socket() {
        let mut reactor = Reactor::new().unwrap();
        let peer = counting_peer(&reactor, Arc::new(AtomicUsize::new(0)));
        let handle = peer.handle().clone();
        reactor.turn(Some(Duration::ZERO)).unwrap();
        assert_eq!(reactor.channels().len(), 1);

        peer.destroy();
        assert_eq!(handle.state(), PeerState::Active);
        reactor.turn(Some(Duration::ZERO)).unwrap();

        assert_eq!(handle.state(), PeerState::Destroyed);
        assert!(reactor.channels().is_empty());
        assert!(handle.socket_buffer_size(BufferKind::Receive).is_none());
        let err = handle.send(b"x", &handle.local_addr()).unwrap_err();
        assert_eq!(err.raw_os_error(), Some(libc::EBADF));
    }

    #[test]
    fn test_last_install_command_tears_down() {
        let mut reactor = Reactor::new().unwrap();
        let peer = counting_peer(&reactor, Arc::new(AtomicUsize::new(0)));
        let handle = peer.handle().clone();
        reactor.turn(Some(Duration::ZERO)).unwrap();

        // Destroy is queued ahead of the install, so the install command
        // is the one that brings the count to zero.
        peer.destroy();
        let replacement = message_callback(|_, _, _| {});
        let previous = handle.set_message_callback(Some(replacement));
        assert!(previous.is_some());
        assert_eq!(handle.shared.refs.count(), 2);

        reactor.turn(Some(Duration::ZERO)).unwrap();
        assert_eq!(handle.state(), PeerState::Destroyed);
        assert_eq!(handle.shared.refs.count(), 0);
        assert!(handle.shared.message_callback().is_none());

        // Count is zero: further requests are refused without queuing.
        handle.set_writable_callback(None);
        assert_eq!(handle.shared.refs.count(), 0);
    }

    #[test]
    fn test_reactor_gone_closes_inline() {
        let reactor = Reactor::new().unwrap();
        let peer = counting_peer(&reactor, Arc::new(AtomicUsize::new(0)));
        let handle = peer.handle().clone();
        drop(reactor);

        handle.set_message_callback(None);
        assert_eq!(handle.state(), PeerState::Active);
        drop(peer);
        assert_eq!(handle.state(), PeerState::Destroyed);
    }
}
