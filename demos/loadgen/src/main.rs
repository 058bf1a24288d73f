//! Demo load generator: spawns worker threads, each opening one TCP
//! connection per request against the line-delimited transport, and
//! reports RPS plus p50/p95/p99 latency. Not part of the core crate —
//! a standalone demo driving it over the wire.

use clap::Parser;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpStream;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

const PAYLOAD: &str = "{\"pan\":\"4111111111111111\",\"amount\":\"10.00\"}\n";

#[derive(Parser, Debug)]
#[command(name = "edgepay-loadgen", about = "Drives the edgepay line TCP transport with concurrent connections")]
struct Args {
    /// Number of concurrent worker threads (each one connection at a time).
    #[arg(long, default_value_t = 8)]
    connections: usize,
    /// Requests sent sequentially by each worker.
    #[arg(long, default_value_t = 1000)]
    requests_per_conn: usize,
    /// Port the edgepay TCP transport is listening on.
    #[arg(long, default_value_t = 9090)]
    port: u16,
}

struct WorkerResult {
    ok: u64,
    err: u64,
    latencies_us: Vec<u64>,
}

fn worker_main(port: u16, reqs: usize) -> WorkerResult {
    let mut ok = 0u64;
    let mut err = 0u64;
    let mut latencies = Vec::with_capacity(reqs);

    for _ in 0..reqs {
        let t0 = Instant::now();
        match send_one(port) {
            Ok(()) => {
                ok += 1;
                latencies.push(t0.elapsed().as_micros() as u64);
            }
            Err(_) => err += 1,
        }
    }

    WorkerResult {
        ok,
        err,
        latencies_us: latencies,
    }
}

fn send_one(port: u16) -> std::io::Result<()> {
    let mut stream = TcpStream::connect(("127.0.0.1", port))?;
    stream.write_all(PAYLOAD.as_bytes())?;
    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    reader.read_line(&mut line)?;
    Ok(())
}

fn percentile(sorted: &[u64], pct: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let idx = ((sorted.len() - 1) as f64 * pct) as usize;
    sorted[idx]
}

fn main() {
    let args = Args::parse();
    eprintln!(
        "loadgen: {} workers x {} reqs, port {}",
        args.connections, args.requests_per_conn, args.port
    );

    let total_ok = Arc::new(AtomicU64::new(0));
    let total_err = Arc::new(AtomicU64::new(0));
    let wall_start = Instant::now();

    let handles: Vec<_> = (0..args.connections)
        .map(|_| {
            let port = args.port;
            let reqs = args.requests_per_conn;
            let total_ok = Arc::clone(&total_ok);
            let total_err = Arc::clone(&total_err);
            thread::spawn(move || {
                let result = worker_main(port, reqs);
                total_ok.fetch_add(result.ok, Ordering::Relaxed);
                total_err.fetch_add(result.err, Ordering::Relaxed);
                result.latencies_us
            })
        })
        .collect();

    let mut all_latencies: Vec<u64> = Vec::new();
    for handle in handles {
        if let Ok(latencies) = handle.join() {
            all_latencies.extend(latencies);
        }
    }
    all_latencies.sort_unstable();

    let wall: Duration = wall_start.elapsed();
    let ok = total_ok.load(Ordering::Relaxed);
    let err = total_err.load(Ordering::Relaxed);
    let wall_s = wall.as_secs_f64();
    let rps = if wall_s > 0.0 { ok as f64 / wall_s } else { 0.0 };

    println!(
        "sent_ok={ok}, sent_err={err}, wall={wall_s:.3}s, RPS={rps:.2}, p50={}us, p95={}us, p99={}us",
        percentile(&all_latencies, 0.50),
        percentile(&all_latencies, 0.95),
        percentile(&all_latencies, 0.99),
    );
}
