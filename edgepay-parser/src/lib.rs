//! Extracts a typed `Request` from one inbound line/body: a real, typed
//! `serde` decode with field-level validation, rather than ad-hoc field
//! grabbing out of an untyped JSON value.

use edgepay_types::{Request, RequestType};
use serde::Deserialize;

/// Why parsing rejected the request. All variants surface as the single
/// `bad_request` reason code on the wire; the variant is kept
/// for structured debug logging, matching `reason ∈ {missing_pan,
/// missing_amount}` from plus the cases that distillation left
/// implicit (malformed JSON, unparsable amount).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseError {
    MalformedJson,
    MissingPan,
    MissingAmount,
    InvalidAmount,
}

impl ParseError {
    /// The wire-level reason code. Every parse failure is `bad_request`
    ///; the distinction above is for logs only.
    pub fn reason_code(self) -> &'static str {
        "bad_request"
    }

    pub fn detail(self) -> &'static str {
        match self {
            ParseError::MalformedJson => "malformed_json",
            ParseError::MissingPan => "missing_pan",
            ParseError::MissingAmount => "missing_amount",
            ParseError::InvalidAmount => "invalid_amount",
        }
    }
}

const DEFAULT_CURRENCY: &str = "USD";
const DEFAULT_MERCHANT_ID: &str = "MERCHANT001";

#[derive(Debug, Deserialize)]
struct RawRequest {
    pan: Option<String>,
    amount: Option<String>,
    #[serde(default)]
    currency: Option<String>,
    #[serde(default)]
    merchant_id: Option<String>,
    #[serde(default)]
    request_id: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<RequestType>,
}

/// Parses one request body. `pan` and `amount` are required; everything
/// else defaults
pub fn parse_request(body: &str) -> Result<Request, ParseError> {
    let raw: RawRequest = serde_json::from_str(body).map_err(|_| ParseError::MalformedJson)?;

    let pan = raw.pan.filter(|p| !p.is_empty()).ok_or(ParseError::MissingPan)?;
    let amount_str = raw
        .amount
        .filter(|a| !a.is_empty())
        .ok_or(ParseError::MissingAmount)?;
    let amount = amount_str
        .parse()
        .map_err(|_| ParseError::InvalidAmount)?;

    Ok(Request {
        request_id: raw.request_id.filter(|r| !r.is_empty()),
        pan,
        amount,
        currency: raw.currency.filter(|c| !c.is_empty()).unwrap_or_else(|| DEFAULT_CURRENCY.to_string()),
        merchant_id: raw
            .merchant_id
            .filter(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MERCHANT_ID.to_string()),
        kind: raw.kind.unwrap_or_default(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_request_with_defaults() {
        let req = parse_request(r#"{"pan":"4111111111111111","amount":"10.00"}"#).unwrap();
        assert_eq!(req.pan, "4111111111111111");
        assert_eq!(req.amount.cents(), 1000);
        assert_eq!(req.currency, "USD");
        assert_eq!(req.merchant_id, "MERCHANT001");
        assert_eq!(req.kind, RequestType::Auth);
        assert_eq!(req.request_id, None);
    }

    #[test]
    fn missing_pan_is_rejected() {
        let err = parse_request(r#"{"amount":"10.00"}"#).unwrap_err();
        assert_eq!(err, ParseError::MissingPan);
        assert_eq!(err.reason_code(), "bad_request");
    }

    #[test]
    fn missing_amount_is_rejected() {
        let err = parse_request(r#"{"pan":"4111111111111111"}"#).unwrap_err();
        assert_eq!(err, ParseError::MissingAmount);
    }

    #[test]
    fn malformed_json_is_rejected() {
        let err = parse_request("not json").unwrap_err();
        assert_eq!(err, ParseError::MalformedJson);
    }

    #[test]
    fn unparsable_amount_is_rejected() {
        let err = parse_request(r#"{"pan":"4111111111111111","amount":"ten"}"#).unwrap_err();
        assert_eq!(err, ParseError::InvalidAmount);
    }

    #[test]
    fn honors_explicit_request_id_and_type() {
        let req = parse_request(
            r#"{"pan":"4111111111111111","amount":"5.00","request_id":"r9","type":"REFUND"}"#,
        )
        .unwrap();
        assert_eq!(req.request_id.as_deref(), Some("r9"));
        assert_eq!(req.kind, RequestType::Refund);
    }
}
