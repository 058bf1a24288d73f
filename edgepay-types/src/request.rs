use crate::amount::Amount;
use edgepay_mask::mask_pan;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request kind. `AUTH` is the default when the field is
/// absent from the wire payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RequestType {
    Auth,
    Capture,
    Refund,
    Reversal,
}

impl Default for RequestType {
    fn default() -> Self {
        RequestType::Auth
    }
}

impl fmt::Display for RequestType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RequestType::Auth => "AUTH",
            RequestType::Capture => "CAPTURE",
            RequestType::Refund => "REFUND",
            RequestType::Reversal => "REVERSAL",
        };
        write!(f, "{s}")
    }
}

/// One inbound card-authorization request. Immutable once parsed: the
/// pipeline never mutates a `Request`, it derives new values (a
/// `MaskedRequest`, a `txn_id`) alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub request_id: Option<String>,
    pub pan: String,
    pub amount: Amount,
    pub currency: String,
    pub merchant_id: String,
    pub kind: RequestType,
}

impl Request {
    pub fn request_id_or_empty(&self) -> &str {
        self.request_id.as_deref().unwrap_or("")
    }
}

/// A `Request` with its PAN replaced by the masked form. Produced once,
/// immediately after Luhn validation, and carried through the rest of the
/// pipeline and into every log line — the unmasked PAN never crosses this
/// boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaskedRequest {
    pub request_id: Option<String>,
    pub masked_pan: String,
    pub amount_cents: i64,
    pub currency: String,
    pub merchant_id: String,
    pub kind: RequestType,
}

impl From<&Request> for MaskedRequest {
    fn from(req: &Request) -> Self {
        MaskedRequest {
            request_id: req.request_id.clone(),
            masked_pan: mask_pan(&req.pan),
            amount_cents: req.amount.cents(),
            currency: req.currency.clone(),
            merchant_id: req.merchant_id.clone(),
            kind: req.kind,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masked_request_never_carries_raw_pan() {
        let req = Request {
            request_id: Some("r1".into()),
            pan: "4111111111111111".into(),
            amount: "10.00".parse().unwrap(),
            currency: "USD".into(),
            merchant_id: "MERCHANT001".into(),
            kind: RequestType::Auth,
        };
        let masked = MaskedRequest::from(&req);
        assert_eq!(masked.masked_pan, "411111******1111");
        assert!(!masked.masked_pan.contains("111111111111"));
    }

    #[test]
    fn request_type_default_is_auth() {
        assert_eq!(RequestType::default(), RequestType::Auth);
    }
}
