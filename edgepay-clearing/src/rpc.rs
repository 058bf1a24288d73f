use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Request body for every verb-addressable clearing endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct ClearingRequest {
    pub txn_id: String,
    pub pan: String,
    pub amount: String,
    pub currency: String,
    pub merchant_id: String,
}

/// Response body. Any transport error or a non-`ok` body is a call
/// failure.
#[derive(Debug, Clone, Deserialize)]
pub struct ClearingResponse {
    pub ok: bool,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

/// Thin HTTP client over the `prepare | commit | abort` verbs.
/// `reqwest::blocking::Client` matches the synchronous, one-thread-
/// per-worker execution model the rest of the pipeline uses.
pub struct ClearingHttpClient {
    base_url: String,
    client: reqwest::blocking::Client,
}

impl ClearingHttpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()
            .expect("clearing http client builds with a fixed timeout");
        ClearingHttpClient {
            base_url: base_url.into(),
            client,
        }
    }

    pub fn call(&self, verb: &str, body: &ClearingRequest) -> Result<ClearingResponse, String> {
        let url = format!("{}/{verb}", self.base_url.trim_end_matches('/'));
        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .map_err(|err| format!("transport error calling {verb}: {err}"))?;

        if !response.status().is_success() {
            return Err(format!("{verb} returned HTTP {}", response.status()));
        }

        let parsed: ClearingResponse = response
            .json()
            .map_err(|err| format!("decoding {verb} response: {err}"))?;

        if !parsed.ok {
            return Err(parsed
                .error
                .clone()
                .unwrap_or_else(|| format!("{verb} returned ok=false")));
        }

        Ok(parsed)
    }
}
