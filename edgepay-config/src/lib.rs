//! Environment-variable configuration loading, with an
//! optional TOML overlay file for values that are awkward to carry in
//! process environment (notably `RISK_BIN_BLACKLIST`, a list). One
//! immutable config struct built once at startup and shared via `Arc`.

use edgepay_error::{config_error, Error, Result};
use edgepay_types::Amount;
use serde::Deserialize;
use std::collections::HashSet;
use std::env;
use std::path::Path;
use std::str::FromStr;

/// BSD sysexits-style process exit codes for fatal startup errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Config = 64,
    Io = 74,
    Failure = 1,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Optional TOML overlay, loaded before environment variables are applied.
/// Every field is optional; absent fields fall through to hard-coded
/// defaults or environment values.
#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    listen_port: Option<u16>,
    workers: Option<usize>,
    queue_cap: Option<usize>,
    db_uri: Option<String>,
    api_token: Option<String>,
    clearing_url: Option<String>,
    risk_enabled: Option<bool>,
    risk_max_amount: Option<String>,
    risk_velocity_limit: Option<u32>,
    risk_velocity_window_sec: Option<u64>,
    risk_bin_blacklist: Option<Vec<String>>,
    clearing_timeout_ms: Option<u64>,
    clearing_cb_window_secs: Option<u64>,
    clearing_cb_fails: Option<u32>,
    clearing_cb_open_secs: Option<u64>,
    clearing_retry_max: Option<u32>,
    reversal_max_attempts: Option<u32>,
    reversal_base_delay_ms: Option<u64>,
}

/// Immutable, process-wide configuration. Built once in `from_env` and
/// shared behind an `Arc` by every component that needs a tunable.
#[derive(Debug, Clone)]
pub struct Config {
    pub listen_port: u16,
    pub workers: usize,
    pub queue_cap: usize,
    pub db_uri: String,
    pub api_token: Option<String>,
    pub clearing_url: String,
    pub risk_enabled: bool,
    pub risk_max_amount: Amount,
    pub risk_velocity_limit: u32,
    pub risk_velocity_window_sec: u64,
    pub risk_bin_blacklist: HashSet<String>,
    pub clearing_timeout_ms: u64,
    pub clearing_cb_window_secs: u64,
    pub clearing_cb_fails: u32,
    pub clearing_cb_open_secs: u64,
    pub clearing_retry_max: u32,
    pub reversal_max_attempts: u32,
    pub reversal_base_delay_ms: u64,
}

impl Config {
    /// Loads configuration from `EDGEPAY_CONFIG_FILE` (if set) overlaid by
    /// process environment variables, falling back to documented defaults.
    /// `DB_URI` and `LISTEN_PORT` are the two values calls out
    /// as fatal-if-malformed; everything else degrades to a default.
    pub fn from_env() -> std::result::Result<Config, ExitCode> {
        let file = match env::var("EDGEPAY_CONFIG_FILE") {
            Ok(path) => load_file(&path).map_err(|err| {
                log::error!(target: "edgepay_config", "failed to load config file {path}: {err}");
                ExitCode::Config
            })?,
            Err(_) => ConfigFile::default(),
        };

        let listen_port = env_or("LISTEN_PORT", file.listen_port, 8080u16)
            .map_err(|err| invalid("LISTEN_PORT", err))?;
        let workers = env_or("WORKERS", file.workers, 4usize)
            .map_err(|err| invalid("WORKERS", err))?;
        if workers == 0 {
            return Err(invalid("WORKERS", "must be > 0".into()));
        }
        let queue_cap = env_or("QUEUE_CAP", file.queue_cap, 64usize)
            .map_err(|err| invalid("QUEUE_CAP", err))?;
        if queue_cap == 0 {
            return Err(invalid("QUEUE_CAP", "must be > 0".into()));
        }

        let db_uri = env::var("DB_URI").ok().or(file.db_uri).ok_or_else(|| {
            log::error!(target: "edgepay_config", "DB_URI is required");
            ExitCode::Config
        })?;

        let api_token = env::var("API_TOKEN").ok().or(file.api_token);

        let clearing_url = env::var("CLEARING_URL")
            .ok()
            .or(file.clearing_url)
            .unwrap_or_else(|| "http://clearing.example.com/api".to_string());

        let risk_enabled = env_bool_or("RISK_ENABLED", file.risk_enabled, true);
        let risk_max_amount_str = env::var("RISK_MAX_AMOUNT")
            .ok()
            .or(file.risk_max_amount)
            .unwrap_or_else(|| "10000".to_string());
        let risk_max_amount = Amount::from_str(&risk_max_amount_str)
            .map_err(|err| invalid("RISK_MAX_AMOUNT", err.to_string()))?;

        let risk_velocity_limit = env_or("RISK_VELOCITY_LIMIT", file.risk_velocity_limit, 5u32)
            .map_err(|err| invalid("RISK_VELOCITY_LIMIT", err))?;
        let risk_velocity_window_sec = env_or(
            "RISK_VELOCITY_WINDOW_SEC",
            file.risk_velocity_window_sec,
            60u64,
        )
        .map_err(|err| invalid("RISK_VELOCITY_WINDOW_SEC", err))?;

        let risk_bin_blacklist: HashSet<String> = env::var("RISK_BIN_BLACKLIST")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .or(file.risk_bin_blacklist.map(|v| v.into_iter().collect()))
            .unwrap_or_default();

        let clearing_timeout_ms = env_or("CLEARING_TIMEOUT", file.clearing_timeout_ms, 2000u64)
            .map_err(|err| invalid("CLEARING_TIMEOUT", err))?;
        let clearing_cb_window_secs =
            env_or("CLEARING_CB_WINDOW", file.clearing_cb_window_secs, 60u64)
                .map_err(|err| invalid("CLEARING_CB_WINDOW", err))?;
        let clearing_cb_fails = env_or("CLEARING_CB_FAILS", file.clearing_cb_fails, 5u32)
            .map_err(|err| invalid("CLEARING_CB_FAILS", err))?;
        let clearing_cb_open_secs =
            env_or("CLEARING_CB_OPEN_SECS", file.clearing_cb_open_secs, 30u64)
                .map_err(|err| invalid("CLEARING_CB_OPEN_SECS", err))?;
        let clearing_retry_max = env_or("CLEARING_RETRY_MAX", file.clearing_retry_max, 3u32)
            .map_err(|err| invalid("CLEARING_RETRY_MAX", err))?;

        let reversal_max_attempts =
            env_or("REVERSAL_MAX_ATTEMPTS", file.reversal_max_attempts, 5u32)
                .map_err(|err| invalid("REVERSAL_MAX_ATTEMPTS", err))?;
        let reversal_base_delay_ms = env_or(
            "REVERSAL_BASE_DELAY_MS",
            file.reversal_base_delay_ms,
            500u64,
        )
        .map_err(|err| invalid("REVERSAL_BASE_DELAY_MS", err))?;

        Ok(Config {
            listen_port,
            workers,
            queue_cap,
            db_uri,
            api_token,
            clearing_url,
            risk_enabled,
            risk_max_amount,
            risk_velocity_limit,
            risk_velocity_window_sec,
            risk_bin_blacklist,
            clearing_timeout_ms,
            clearing_cb_window_secs,
            clearing_cb_fails,
            clearing_cb_open_secs,
            clearing_retry_max,
            reversal_max_attempts,
            reversal_base_delay_ms,
        })
    }
}

fn invalid(key: &str, reason: String) -> ExitCode {
    log::error!(target: "edgepay_config", "invalid {key}: {reason}");
    ExitCode::Config
}

fn env_or<T>(key: &str, file_value: Option<T>, default: T) -> std::result::Result<T, String>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(v) => v.parse::<T>().map_err(|err| err.to_string()),
        Err(_) => Ok(file_value.unwrap_or(default)),
    }
}

fn env_bool_or(key: &str, file_value: Option<bool>, default: bool) -> bool {
    match env::var(key) {
        Ok(v) => v == "1" || v.eq_ignore_ascii_case("true"),
        Err(_) => file_value.unwrap_or(default),
    }
}

fn load_file(path: impl AsRef<Path>) -> Result<ConfigFile> {
    let text = std::fs::read_to_string(path.as_ref())
        .map_err(|err| config_error(format!("reading config file: {err}")))?;
    toml::from_str(&text).map_err(|err| to_config_err(err))
}

fn to_config_err(err: toml::de::Error) -> Error {
    config_error(format!("parsing config file: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn clear_env() {
        for key in [
            "EDGEPAY_CONFIG_FILE",
            "LISTEN_PORT",
            "WORKERS",
            "QUEUE_CAP",
            "DB_URI",
            "API_TOKEN",
            "RISK_ENABLED",
            "RISK_MAX_AMOUNT",
        ] {
            env::remove_var(key);
        }
    }

    #[test]
    fn missing_db_uri_is_fatal() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        let result = Config::from_env();
        assert_eq!(result.unwrap_err(), ExitCode::Config);
    }

    #[test]
    fn defaults_apply_when_db_uri_present() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("DB_URI", "postgres://localhost/edgepay");
        let cfg = Config::from_env().expect("config should load");
        assert_eq!(cfg.listen_port, 8080);
        assert_eq!(cfg.workers, 4);
        assert_eq!(cfg.risk_max_amount.cents(), 1_000_000);
        clear_env();
    }

    #[test]
    fn zero_workers_rejected() {
        let _guard = ENV_LOCK.lock().unwrap();
        clear_env();
        env::set_var("DB_URI", "postgres://localhost/edgepay");
        env::set_var("WORKERS", "0");
        let result = Config::from_env();
        assert_eq!(result.unwrap_err(), ExitCode::Config);
        clear_env();
    }
}
