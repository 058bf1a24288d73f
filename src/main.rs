//! Process entry point: loads configuration, wires every component
//! together, and runs both transport adapters until interrupted.

use edgepay_clearing::{CircuitBreaker, ClearingHttpClient};
use edgepay_config::{Config, ExitCode};
use edgepay_coordinator::{Coordinator, TxnLog};
use edgepay_db::DbGateway;
use edgepay_metrics::Metrics;
use edgepay_pipeline::Pipeline;
use edgepay_reversal::{HttpClearingAbort, ReversalQueue};
use edgepay_rpc::RpcState;
use edgepay_workerpool::WorkerPool;
use std::net::SocketAddr;
use std::process::ExitCode as ProcessExitCode;
use std::sync::Arc;
use std::time::Duration;

/// Coordinator PREPARE/COMMIT deadlines. Not exposed as a configuration
/// option; fixed generously above the sum of the clearing timeout and its
/// retry backoff so a slow remote never spuriously trips the deadline
/// before the breaker/retry policy itself gives up.
const PREPARE_TIMEOUT: Duration = Duration::from_secs(15);
const COMMIT_TIMEOUT: Duration = Duration::from_secs(15);

const TXN_LOG_PATH: &str = "edgepay-txn.log";

fn main() -> ProcessExitCode {
    edgepay_logger::init();

    let config = match Config::from_env() {
        Ok(config) => Arc::new(config),
        Err(code) => return exit_with(code),
    };

    let metrics = Arc::new(Metrics::new());

    let db = Arc::new(DbGateway::new(config.db_uri.clone()));
    if let Err(err) = db.ensure_schema() {
        log::error!(target: "edgepay", "failed to ensure schema: {err}");
        return exit_with(ExitCode::Io);
    }

    let txn_log = match TxnLog::open(TXN_LOG_PATH) {
        Ok(log) => log,
        Err(err) => {
            log::error!(target: "edgepay", "failed to open transaction log: {err}");
            return exit_with(ExitCode::Io);
        }
    };
    let coordinator = Arc::new(Coordinator::new(txn_log, PREPARE_TIMEOUT, COMMIT_TIMEOUT));

    let clearing_client = Arc::new(ClearingHttpClient::new(
        config.clearing_url.clone(),
        Duration::from_millis(config.clearing_timeout_ms),
    ));
    let clearing_breaker = Arc::new(CircuitBreaker::new(
        Duration::from_secs(config.clearing_cb_window_secs),
        config.clearing_cb_fails,
        Duration::from_secs(config.clearing_cb_open_secs),
    ));

    let abort_client = Arc::new(HttpClearingAbort::new(Arc::clone(&clearing_client), "USD"));
    let reversal = Arc::new(ReversalQueue::start(
        abort_client,
        Arc::clone(&metrics),
        config.reversal_max_attempts,
        Duration::from_millis(config.reversal_base_delay_ms),
    ));

    let pipeline = Arc::new(Pipeline::new(
        Arc::clone(&config),
        Arc::clone(&metrics),
        Arc::clone(&coordinator),
        Arc::clone(&clearing_client),
        Arc::clone(&clearing_breaker),
        Arc::clone(&reversal),
    ));

    let pool = Arc::new(WorkerPool::new(config.workers, config.queue_cap));

    let rpc_state = Arc::new(RpcState {
        pipeline: Arc::clone(&pipeline),
        pool: Arc::clone(&pool),
        db: Arc::clone(&db),
        metrics: Arc::clone(&metrics),
        config: Arc::clone(&config),
        service_name: env!("CARGO_PKG_NAME"),
        service_version: env!("CARGO_PKG_VERSION"),
    });

    if let Err(err) = ctrlc::set_handler(move || {
        log::info!(target: "edgepay", "received interrupt, shutting down");
        std::process::exit(0);
    }) {
        log::warn!(target: "edgepay", "failed to install signal handler: {err}");
    }

    let tcp_addr = format!("0.0.0.0:{}", config.listen_port);
    let tcp_listener = match std::net::TcpListener::bind(&tcp_addr) {
        Ok(listener) => listener,
        Err(err) => {
            log::error!(target: "edgepay", "failed to bind tcp listener on {tcp_addr}: {err}");
            return exit_with(ExitCode::Io);
        }
    };
    let tcp_state = Arc::clone(&rpc_state);
    std::thread::Builder::new()
        .name("edgepay-tcp-listener".to_string())
        .spawn(move || edgepay_rpc::serve_tcp(tcp_state, tcp_listener))
        .expect("spawning tcp listener thread");

    let http_port = match (config.listen_port as u32).checked_add(1) {
        Some(port) if port <= u16::MAX as u32 => port as u16,
        _ => {
            log::error!(
                target: "edgepay",
                "LISTEN_PORT={} leaves no room for the http port (listen_port + 1)",
                config.listen_port
            );
            return exit_with(ExitCode::Config);
        }
    };
    let http_addr: SocketAddr = format!("0.0.0.0:{http_port}")
        .parse()
        .expect("constructing http listen address");

    let runtime = match tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(err) => {
            log::error!(target: "edgepay", "failed to start async runtime: {err}");
            return exit_with(ExitCode::Failure);
        }
    };

    let http_state = Arc::clone(&rpc_state);
    runtime.block_on(async move {
        if let Err(err) = edgepay_rpc::serve_http(http_state, http_addr).await {
            log::error!(target: "edgepay", "http server error: {err}");
        }
    });

    ProcessExitCode::SUCCESS
}

fn exit_with(code: ExitCode) -> ProcessExitCode {
    ProcessExitCode::from(code.code() as u8)
}
