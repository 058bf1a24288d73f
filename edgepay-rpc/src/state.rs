use edgepay_config::Config;
use edgepay_db::DbGateway;
use edgepay_metrics::Metrics;
use edgepay_pipeline::Pipeline;
use edgepay_workerpool::WorkerPool;
use std::sync::Arc;

/// Everything a transport adapter needs to serve a request, shared behind
/// `Arc` across the HTTP router and the TCP accept loop alike. `pool` is
/// what both adapters submit pipeline work through, so queue depth and
/// the `server_busy` backpressure response are shared across
/// transports rather than each maintaining its own limit.
#[derive(Clone)]
pub struct RpcState {
    pub pipeline: Arc<Pipeline>,
    pub pool: Arc<WorkerPool>,
    pub db: Arc<DbGateway>,
    pub metrics: Arc<Metrics>,
    pub config: Arc<Config>,
    pub service_name: &'static str,
    pub service_version: &'static str,
}

/// Whether `token` (from an `Authorization: Bearer <token>` header) is
/// acceptable for a secured endpoint. When `API_TOKEN` isn't configured,
/// every caller is accepted.
pub fn authorized(config: &Config, token: Option<&str>) -> bool {
    match &config.api_token {
        None => true,
        Some(expected) => token == Some(expected.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn config(api_token: Option<&str>) -> Config {
        Config {
            listen_port: 8080,
            workers: 4,
            queue_cap: 64,
            db_uri: "postgres://localhost/edgepay".into(),
            api_token: api_token.map(String::from),
            clearing_url: "http://127.0.0.1:1".to_string(),
            risk_enabled: true,
            risk_max_amount: edgepay_types::Amount::from_cents(1_000_000),
            risk_velocity_limit: 5,
            risk_velocity_window_sec: 60,
            risk_bin_blacklist: HashSet::new(),
            clearing_timeout_ms: 2000,
            clearing_cb_window_secs: 60,
            clearing_cb_fails: 5,
            clearing_cb_open_secs: 30,
            clearing_retry_max: 3,
            reversal_max_attempts: 5,
            reversal_base_delay_ms: 500,
        }
    }

    #[test]
    fn no_token_configured_allows_everyone() {
        assert!(authorized(&config(None), None));
        assert!(authorized(&config(None), Some("whatever")));
    }

    #[test]
    fn configured_token_must_match_exactly() {
        let cfg = config(Some("secret"));
        assert!(authorized(&cfg, Some("secret")));
        assert!(!authorized(&cfg, Some("wrong")));
        assert!(!authorized(&cfg, None));
    }
}
