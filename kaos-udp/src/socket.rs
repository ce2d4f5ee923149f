//! Socket creation and buffer-size helpers.

use std::io;
use std::mem::MaybeUninit;
use std::net::{SocketAddr, SocketAddrV4, UdpSocket};

use socket2::{Domain, MaybeUninitSlice, Protocol, SockRef, Socket, Type};

/// Which kernel socket buffer to act on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BufferKind {
    Send,
    Receive,
}

/// Non-blocking UDP socket with `SO_REUSEADDR`, bound to `addr`.
pub fn create_bound_udp_socket(addr: SocketAddrV4) -> io::Result<UdpSocket> {
    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    Ok(socket.into())
}

/// One datagram read by [`recv_datagram`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Received {
    /// Bytes written into the buffer.
    pub len: usize,
    pub from: Option<SocketAddr>,
    /// The datagram was longer than the buffer; the tail was discarded.
    pub truncated: bool,
}

/// `recvmsg` into `buf`, reporting `MSG_TRUNC`.
pub fn recv_datagram(socket: &UdpSocket, buf: &mut [u8]) -> io::Result<Received> {
    // Safety: same layout, and recvmsg only stores initialized bytes.
    let buf = unsafe { &mut *(buf as *mut [u8] as *mut [MaybeUninit<u8>]) };
    let mut bufs = [MaybeUninitSlice::new(buf)];
    let (len, flags, from) = SockRef::from(socket).recv_from_vectored(&mut bufs)?;
    Ok(Received {
        len,
        from: from.as_socket(),
        truncated: flags.is_truncated(),
    })
}

/// Current size of the `kind` buffer as reported by the kernel.
pub fn buffer_size(socket: &UdpSocket, kind: BufferKind) -> io::Result<usize> {
    let sock = SockRef::from(socket);
    match kind {
        BufferKind::Send => sock.send_buffer_size(),
        BufferKind::Receive => sock.recv_buffer_size(),
    }
}

pub fn set_buffer_size(socket: &UdpSocket, kind: BufferKind, bytes: usize) -> io::Result<()> {
    let sock = SockRef::from(socket);
    match kind {
        BufferKind::Send => sock.set_send_buffer_size(bytes),
        BufferKind::Receive => sock.set_recv_buffer_size(bytes),
    }
}

/// `extra` rounded up to a whole number of KiB.
#[inline]
pub fn round_up_kib(extra: usize) -> usize {
    extra.saturating_add(1023) >> 10 << 10
}
