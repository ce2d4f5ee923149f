//! Error types for kaos-reactor.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ReactorError>;

#[derive(Error, Debug)]
pub enum ReactorError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The reactor has stopped or was dropped; the task was not queued.
    #[error("reactor stopped")]
    Stopped,

    #[error("channel {0} is not attached")]
    UnknownChannel(usize),

    #[error("channel {0} is already attached")]
    ChannelInUse(usize),

    #[error("reactor thread panicked")]
    Panicked,
}
