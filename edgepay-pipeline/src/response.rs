use serde::Serialize;

/// Wire shape for a pipeline outcome. Internally tagged on
/// `status` so it serializes to exactly `{"status":"APPROVED",...}` or
/// `{"status":"DECLINED","reason":"..."}` with no wrapper type needed at
/// the transport layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status")]
pub enum PipelineResponse {
    #[serde(rename = "APPROVED")]
    Approved {
        txn_id: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        idempotent: Option<bool>,
    },
    #[serde(rename = "DECLINED")]
    Declined { reason: &'static str },
}

impl PipelineResponse {
    pub fn declined(reason: &'static str) -> Self {
        PipelineResponse::Declined { reason }
    }

    pub fn is_approved(&self) -> bool {
        matches!(self, PipelineResponse::Approved { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn approved_omits_idempotent_when_not_set() {
        let resp = PipelineResponse::Approved {
            txn_id: "visa_r1_1".to_string(),
            idempotent: None,
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"status":"APPROVED","txn_id":"visa_r1_1"}"#);
    }

    #[test]
    fn approved_includes_idempotent_when_set() {
        let resp = PipelineResponse::Approved {
            txn_id: "visa_r1_1".to_string(),
            idempotent: Some(true),
        };
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(
            json,
            r#"{"status":"APPROVED","txn_id":"visa_r1_1","idempotent":true}"#
        );
    }

    #[test]
    fn declined_serializes_reason() {
        let resp = PipelineResponse::declined("luhn_failed");
        let json = serde_json::to_string(&resp).unwrap();
        assert_eq!(json, r#"{"status":"DECLINED","reason":"luhn_failed"}"#);
    }
}
