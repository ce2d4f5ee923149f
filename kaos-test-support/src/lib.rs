//! Shared helpers for kaos transport tests.
//!
//! - [`payload`]: deterministic and random datagram payloads
//! - [`verify`]: records what a callback saw and checks it against what was sent

pub mod payload;
pub mod verify;

use std::net::UdpSocket;
use std::thread;
use std::time::{Duration, Instant};

/// A loopback UDP port that was free a moment ago.
pub fn free_udp_port() -> u16 {
    let probe = UdpSocket::bind("127.0.0.1:0").expect("bind probe socket");
    probe.local_addr().expect("probe local addr").port()
}

/// Poll `condition` every millisecond until it holds or `timeout` passes.
pub fn wait_until<F>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}
