//! Batch codec and end-to-end receive benchmarks

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use kaos_udp::{
    message_callback, DatagramBatch, InetAddr, PeerConfig, ReactorThread, UdpPeer,
    DEFAULT_BATCH_CAPACITY, MAX_DATAGRAM,
};
use std::hint::black_box;
use std::net::{Ipv4Addr, UdpSocket};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

fn benchmark_batch_fill_and_iter(c: &mut Criterion) {
    let mut group = c.benchmark_group("DatagramBatch");
    let from = InetAddr::new(Ipv4Addr::LOCALHOST, 9000);

    for size in [64usize, 1024, 8192] {
        let payload = vec![0xABu8; size];
        let mut batch = DatagramBatch::new(DEFAULT_BATCH_CAPACITY, size);
        let per_pass = {
            let mut n = 0u64;
            while batch.push(&payload, from) {
                n += 1;
            }
            batch.clear();
            n
        };
        group.throughput(Throughput::Elements(per_pass));

        group.bench_with_input(BenchmarkId::new("fill_iter", size), &payload, |b, payload| {
            b.iter(|| {
                batch.clear();
                while batch.push(payload, from) {}
                let mut bytes = 0usize;
                for datagram in &batch {
                    bytes += datagram.payload.len();
                }
                black_box(bytes)
            })
        });
    }
    group.finish();
}

fn run_receive_bench(total: u64, size: usize) -> u64 {
    let reactor = ReactorThread::spawn("bench-reactor").unwrap();
    let port = {
        let probe = UdpSocket::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };

    let received = Arc::new(AtomicU64::new(0));
    let counter = received.clone();
    let peer = UdpPeer::with_config(
        reactor.handle(),
        "127.0.0.1",
        port,
        PeerConfig::new().with_max_datagram(MAX_DATAGRAM),
        message_callback(move |_, _, _| {
            counter.fetch_add(1, Ordering::Relaxed);
        }),
        None,
    )
    .unwrap();
    peer.expand_recv_buffer(8 * 1024 * 1024);

    let client = UdpSocket::bind("127.0.0.1:0").unwrap();
    client.connect(("127.0.0.1", port)).unwrap();
    let payload = vec![1u8; size];

    let mut sent = 0u64;
    while sent < total {
        if client.send(&payload).is_ok() {
            sent += 1;
        }
        // Keep the kernel queue shallow; loopback drops on overflow.
        let paused = Instant::now();
        while sent - received.load(Ordering::Relaxed) > 256
            && paused.elapsed() < Duration::from_millis(100)
        {
            std::hint::spin_loop();
        }
    }

    let deadline = Instant::now() + Duration::from_secs(2);
    while received.load(Ordering::Relaxed) < total && Instant::now() < deadline {
        std::hint::spin_loop();
    }

    peer.destroy();
    reactor.stop_and_join().unwrap();
    received.load(Ordering::Relaxed)
}

fn benchmark_receive(c: &mut Criterion) {
    const EVENTS: u64 = 50_000;
    let mut group = c.benchmark_group("UdpPeer receive (50K datagrams)");
    group.throughput(Throughput::Elements(EVENTS));
    group.sample_size(10);

    for size in [64usize, 1024] {
        group.bench_function(BenchmarkId::new("localhost", size), |b| {
            b.iter(|| {
                let received = run_receive_bench(EVENTS, size);
                assert!(received >= EVENTS * 95 / 100, "Lost >5%");
                received
            })
        });
    }
    group.finish();
}

criterion_group!(benches, benchmark_batch_fill_and_iter, benchmark_receive);
criterion_main!(benches);
