use crate::state::RpcState;
use edgepay_pipeline::PipelineResponse;
use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{mpsc, Arc};
use std::thread;

/// Line-delimited-JSON-over-TCP transport: one JSON object per line in,
/// one JSON object per line out. Each connection gets
/// its own OS thread for reading/writing, but the pipeline work itself is
/// submitted through the shared worker pool, so concurrency is bounded
/// there rather than by however many connections happen to be open.
pub fn serve(state: Arc<RpcState>, listener: TcpListener) {
    log::info!(target: "edgepay_rpc", "tcp listening on {:?}", listener.local_addr());
    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                log::warn!(target: "edgepay_rpc", "tcp accept failed: {err}");
                continue;
            }
        };
        let state = Arc::clone(&state);
        thread::Builder::new()
            .name("edgepay-tcp-conn".to_string())
            .spawn(move || handle_connection(state, stream))
            .expect("spawning tcp connection thread");
    }
}

fn handle_connection(state: Arc<RpcState>, stream: TcpStream) {
    let peer = stream.peer_addr().ok();
    let reader = BufReader::new(stream.try_clone().expect("cloning tcp stream"));
    let mut writer = stream;

    for line in reader.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                log::debug!(target: "edgepay_rpc", "tcp read error from {peer:?}: {err}");
                return;
            }
        };
        if line.trim().is_empty() {
            continue;
        }

        let (tx, rx) = mpsc::channel();
        let pipeline = Arc::clone(&state.pipeline);
        let line_owned = line.clone();
        let submitted = state.pool.submit(move || {
            let response = pipeline.handle(&line_owned);
            let _ = tx.send(response);
        });
        let response = match submitted {
            Ok(()) => rx
                .recv()
                .unwrap_or_else(|_| PipelineResponse::declined("server_busy")),
            Err(_) => {
                state.metrics.incr_server_busy();
                PipelineResponse::declined("server_busy")
            }
        };

        let mut encoded = match serde_json::to_string(&response) {
            Ok(json) => json,
            Err(err) => {
                log::error!(target: "edgepay_rpc", "failed to encode response: {err}");
                continue;
            }
        };
        encoded.push('\n');
        if let Err(err) = writer.write_all(encoded.as_bytes()) {
            log::debug!(target: "edgepay_rpc", "tcp write error to {peer:?}: {err}");
            return;
        }
    }
}
