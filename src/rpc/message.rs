use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A request in either direction: `{"request":true,"id":1,"method":"join","data":{...}}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestFrame {
    pub request: bool,
    pub id: u64,
    pub method: String,
    #[serde(default)]
    pub data: Value,
}

impl RequestFrame {
    pub fn new(id: u64, method: impl Into<String>, data: Value) -> Self {
        Self {
            request: true,
            id,
            method: method.into(),
            data,
        }
    }
}

/// A response to the [`RequestFrame`] with the same `id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseFrame {
    pub response: bool,
    pub id: u64,
    pub ok: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_reason: Option<String>,
}

impl ResponseFrame {
    pub fn accept(id: u64, data: Value) -> Self {
        Self {
            response: true,
            id,
            ok: true,
            data: Some(data),
            error_code: None,
            error_reason: None,
        }
    }

    pub fn reject(id: u64, rejection: Rejection) -> Self {
        Self {
            response: true,
            id,
            ok: false,
            data: None,
            error_code: Some(rejection.code),
            error_reason: Some(rejection.reason),
        }
    }

    /// Split into the accepted payload or the rejection it carries.
    pub fn into_result(self) -> Result<Value, Rejection> {
        if self.ok {
            Ok(self.data.unwrap_or(Value::Null))
        } else {
            Err(Rejection {
                code: self.error_code.unwrap_or(Rejection::INTERNAL),
                reason: self.error_reason.unwrap_or_default(),
            })
        }
    }
}

/// One line on the wire.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Frame {
    Request(RequestFrame),
    Response(ResponseFrame),
}

/// The reject half of the request/response contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub code: u16,
    pub reason: String,
}

impl Rejection {
    /// Unknown method or undecodable payload.
    pub const BAD_REQUEST: u16 = 400;
    /// Any failure to carry out a known method.
    pub const NEGOTIATION_FAILED: u16 = 415;
    /// A response frame that rejected without a code.
    pub const INTERNAL: u16 = 500;

    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
        }
    }
}

impl std::fmt::Display for Rejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} {}", self.code, self.reason)
    }
}

/// A request received from the peer that expects no meaningful reply.
#[derive(Debug, Clone, PartialEq)]
pub struct PushedRequest {
    pub method: String,
    pub data: Value,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_request_frame_parses() {
        let frame: Frame = serde_json::from_str(
            r#"{"request":true,"id":7,"method":"leave","data":{"mid":"alice"}}"#,
        )
        .unwrap();

        assert_eq!(
            frame,
            Frame::Request(RequestFrame::new(7, "leave", json!({ "mid": "alice" })))
        );
    }

    #[test]
    fn test_request_without_data_defaults_to_null() {
        let frame: Frame =
            serde_json::from_str(r#"{"request":true,"id":1,"method":"leave"}"#).unwrap();
        assert!(matches!(frame, Frame::Request(RequestFrame { data: Value::Null, .. })));
    }

    #[test]
    fn test_reject_frame_shape() {
        let frame = ResponseFrame::reject(3, Rejection::new(415, "peer not found"));
        let value = serde_json::to_value(Frame::Response(frame)).unwrap();

        assert_eq!(
            value,
            json!({
                "response": true,
                "id": 3,
                "ok": false,
                "errorCode": 415,
                "errorReason": "peer not found",
            })
        );
    }

    #[test]
    fn test_response_frame_into_result() {
        let accepted: Frame =
            serde_json::from_str(r#"{"response":true,"id":1,"ok":true,"data":{}}"#).unwrap();
        let Frame::Response(accepted) = accepted else {
            panic!("expected a response frame");
        };
        assert_eq!(accepted.into_result(), Ok(json!({})));

        let rejected: Frame = serde_json::from_str(
            r#"{"response":true,"id":2,"ok":false,"errorCode":400,"errorReason":"Unknown method [x]"}"#,
        )
        .unwrap();
        let Frame::Response(rejected) = rejected else {
            panic!("expected a response frame");
        };
        assert_eq!(
            rejected.into_result(),
            Err(Rejection::new(400, "Unknown method [x]"))
        );
    }
}
