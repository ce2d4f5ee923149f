//! Error types for kaos-udp.

use std::io;
use std::net::SocketAddrV4;

use kaos_reactor::ReactorError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, PeerError>;

#[derive(Error, Debug)]
pub enum PeerError {
    /// Rejected before touching the OS.
    #[error("invalid argument: {0}")]
    InvalidArgument(&'static str),

    #[error("bind {addr} failed: {source}")]
    Bind {
        addr: SocketAddrV4,
        #[source]
        source: io::Error,
    },

    #[error("send failed: {source}")]
    Send {
        #[source]
        source: io::Error,
    },

    #[error("short send: {sent} of {len} bytes")]
    ShortSend { sent: usize, len: usize },

    #[error("reactor error: {0}")]
    Reactor(#[from] ReactorError),
}

impl PeerError {
    /// OS error code, for the variants that wrap a syscall failure.
    pub fn raw_os_error(&self) -> Option<i32> {
        match self {
            PeerError::Bind { source, .. } | PeerError::Send { source } => source.raw_os_error(),
            PeerError::Reactor(ReactorError::Io(source)) => source.raw_os_error(),
            _ => None,
        }
    }
}
