//! UDP sink: prints every datagram received on a local port.
//!
//! Run: cargo run -p kaos-udp --example udp_sink -- 9000
//! Feed: echo hello | nc -u 127.0.0.1 9000
//! Logs: RUST_LOG=kaos_udp=debug

use kaos_udp::{Reactor, UdpPeer};
use std::env;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = env::args().collect();
    if args.len() != 2 {
        eprintln!("Usage: {} <local port>", args[0]);
        process::exit(1);
    }
    let port: u16 = args[1].parse()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut reactor = Reactor::new()?;
    let _peer = UdpPeer::new(
        &reactor.handle(),
        "0.0.0.0",
        port,
        |_, payload, from| {
            println!("{from} [{}] {}", payload.len(), String::from_utf8_lossy(payload).trim_end());
        },
        None,
    )?;

    println!("Listening on 0.0.0.0:{port}");
    reactor.run()?;
    Ok(())
}
