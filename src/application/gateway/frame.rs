//! Device channel message framing
//!
//! JSON-over-WebSocket envelope shared by vehicles and slot LED
//! controllers:
//!
//! - **Call**       `[2, "<uniqueId>", "<action>", {<payload>}]`
//! - **CallResult** `[3, "<uniqueId>", {<payload>}]`
//! - **CallError**  `[4, "<uniqueId>", "<errorCode>", "<errorDescription>", {<errorDetails>}]`
//!
//! Outbound actions are Unlock / Lock / SetLedColor; inbound telemetry
//! calls are BatteryReport / PositionReport / SlotOccupancyReport.

use serde_json::{json, Value};
use std::fmt;

// ── Message-type constants ─────────────────────────────────────

const MSG_TYPE_CALL: u64 = 2;
const MSG_TYPE_CALL_RESULT: u64 = 3;
const MSG_TYPE_CALL_ERROR: u64 = 4;

// ── DeviceFrame ────────────────────────────────────────────────

/// A parsed device-channel frame.
#[derive(Debug, Clone)]
pub enum DeviceFrame {
    /// `[2, uniqueId, action, payload]`
    Call {
        unique_id: String,
        action: String,
        payload: Value,
    },
    /// `[3, uniqueId, payload]`
    CallResult { unique_id: String, payload: Value },
    /// `[4, uniqueId, errorCode, errorDescription, errorDetails]`
    CallError {
        unique_id: String,
        error_code: String,
        error_description: String,
        error_details: Value,
    },
}

impl DeviceFrame {
    // ── Parsing ────────────────────────────────────────────

    /// Parse a raw JSON text into a `DeviceFrame`.
    pub fn parse(text: &str) -> Result<Self, DeviceFrameError> {
        let doc: Value = serde_json::from_str(text)
            .map_err(|e| DeviceFrameError::InvalidJson(e.to_string()))?;
        let arr = doc
            .as_array()
            .ok_or_else(|| DeviceFrameError::InvalidJson("frame must be a JSON array".into()))?;

        let kind = arr.first().ok_or(DeviceFrameError::EmptyArray)?;
        match kind.as_u64().ok_or(DeviceFrameError::InvalidMessageType)? {
            MSG_TYPE_CALL => Self::decode_call(arr),
            MSG_TYPE_CALL_RESULT => Self::decode_result(arr),
            MSG_TYPE_CALL_ERROR => Self::decode_error(arr),
            other => Err(DeviceFrameError::UnknownMessageType(other)),
        }
    }

    fn decode_call(arr: &[Value]) -> Result<Self, DeviceFrameError> {
        require_len(arr, 4)?;
        Ok(Self::Call {
            unique_id: text_at(arr, 1, "uniqueId must be a string")?,
            action: text_at(arr, 2, "action must be a string")?,
            payload: arr[3].clone(),
        })
    }

    fn decode_result(arr: &[Value]) -> Result<Self, DeviceFrameError> {
        require_len(arr, 2)?;
        // Devices occasionally omit or null the payload; treat as empty.
        let payload = match arr.get(2) {
            Some(Value::Null) | None => json!({}),
            Some(value) => value.clone(),
        };
        Ok(Self::CallResult {
            unique_id: text_at(arr, 1, "uniqueId must be a string")?,
            payload,
        })
    }

    fn decode_error(arr: &[Value]) -> Result<Self, DeviceFrameError> {
        require_len(arr, 3)?;
        Ok(Self::CallError {
            unique_id: text_at(arr, 1, "uniqueId must be a string")?,
            error_code: text_or(arr, 2, "InternalError"),
            error_description: text_or(arr, 3, ""),
            error_details: arr.get(4).cloned().unwrap_or_else(|| json!({})),
        })
    }

    // ── Serialization ──────────────────────────────────────

    /// Serialize this frame to a compact JSON string.
    pub fn serialize(&self) -> String {
        let envelope = match self {
            Self::Call {
                unique_id,
                action,
                payload,
            } => json!([MSG_TYPE_CALL, unique_id, action, payload]),
            Self::CallResult { unique_id, payload } => {
                json!([MSG_TYPE_CALL_RESULT, unique_id, payload])
            }
            Self::CallError {
                unique_id,
                error_code,
                error_description,
                error_details,
            } => json!([
                MSG_TYPE_CALL_ERROR,
                unique_id,
                error_code,
                error_description,
                error_details
            ]),
        };
        envelope.to_string()
    }

    // ── Helpers ────────────────────────────────────────────

    /// Get the unique message ID.
    pub fn unique_id(&self) -> &str {
        match self {
            Self::Call { unique_id, .. } => unique_id,
            Self::CallResult { unique_id, .. } => unique_id,
            Self::CallError { unique_id, .. } => unique_id,
        }
    }

    /// Build an acknowledgement result for a handled call.
    pub fn ack(unique_id: impl Into<String>) -> Self {
        Self::CallResult {
            unique_id: unique_id.into(),
            payload: json!({}),
        }
    }

    /// Build a `CallError` response for a given unique ID.
    pub fn error_response(
        unique_id: impl Into<String>,
        error_code: impl Into<String>,
        error_description: impl Into<String>,
    ) -> Self {
        Self::CallError {
            unique_id: unique_id.into(),
            error_code: error_code.into(),
            error_description: error_description.into(),
            error_details: json!({}),
        }
    }

    pub fn is_call(&self) -> bool {
        matches!(self, Self::Call { .. })
    }
}

fn require_len(arr: &[Value], expected: usize) -> Result<(), DeviceFrameError> {
    if arr.len() < expected {
        return Err(DeviceFrameError::MissingFields {
            expected,
            got: arr.len(),
        });
    }
    Ok(())
}

fn text_at(arr: &[Value], index: usize, what: &'static str) -> Result<String, DeviceFrameError> {
    match &arr[index] {
        Value::String(s) => Ok(s.clone()),
        _ => Err(DeviceFrameError::FieldTypeMismatch(what)),
    }
}

/// String field with a fallback for absent or mistyped values.
fn text_or(arr: &[Value], index: usize, fallback: &str) -> String {
    arr.get(index)
        .and_then(Value::as_str)
        .unwrap_or(fallback)
        .to_string()
}

// ── Errors ─────────────────────────────────────────────────────

/// Errors that can occur when parsing a device frame.
#[derive(Debug)]
pub enum DeviceFrameError {
    InvalidJson(String),
    EmptyArray,
    InvalidMessageType,
    UnknownMessageType(u64),
    MissingFields { expected: usize, got: usize },
    FieldTypeMismatch(&'static str),
}

impl fmt::Display for DeviceFrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidJson(msg) => write!(f, "Frame is not valid JSON: {msg}"),
            Self::EmptyArray => write!(f, "Frame array is empty"),
            Self::InvalidMessageType => write!(f, "Message type must be a number"),
            Self::UnknownMessageType(t) => write!(f, "Unknown message type: {t}"),
            Self::MissingFields { expected, got } => {
                write!(f, "Frame needs at least {expected} fields, got {got}")
            }
            Self::FieldTypeMismatch(msg) => write!(f, "Field type mismatch: {msg}"),
        }
    }
}

impl std::error::Error for DeviceFrameError {}

// ── Tests ──────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_telemetry_call() {
        let frame =
            DeviceFrame::parse(r#"[2, "dev-7", "BatteryReport", {"percentage": 64}]"#).unwrap();
        match frame {
            DeviceFrame::Call {
                unique_id,
                action,
                payload,
            } => {
                assert_eq!(unique_id, "dev-7");
                assert_eq!(action, "BatteryReport");
                assert_eq!(payload["percentage"], 64);
            }
            other => panic!("expected Call, got {other:?}"),
        }
    }

    #[test]
    fn parse_result_with_missing_payload() {
        let frame = DeviceFrame::parse(r#"[3, "MS-12"]"#).unwrap();
        match frame {
            DeviceFrame::CallResult { unique_id, payload } => {
                assert_eq!(unique_id, "MS-12");
                assert_eq!(payload, json!({}));
            }
            other => panic!("expected CallResult, got {other:?}"),
        }
    }

    #[test]
    fn parse_error_fills_defaults() {
        let frame = DeviceFrame::parse(r#"[4, "MS-3", "NotSupported"]"#).unwrap();
        match frame {
            DeviceFrame::CallError {
                error_code,
                error_description,
                error_details,
                ..
            } => {
                assert_eq!(error_code, "NotSupported");
                assert_eq!(error_description, "");
                assert_eq!(error_details, json!({}));
            }
            other => panic!("expected CallError, got {other:?}"),
        }
    }

    #[test]
    fn unknown_message_type_is_rejected() {
        let err = DeviceFrame::parse(r#"[9, "x", {}]"#).unwrap_err();
        assert!(matches!(err, DeviceFrameError::UnknownMessageType(9)));
    }

    #[test]
    fn invalid_json_is_rejected() {
        assert!(matches!(
            DeviceFrame::parse("not json"),
            Err(DeviceFrameError::InvalidJson(_))
        ));
        assert!(matches!(
            DeviceFrame::parse(r#"{"not": "an array"}"#),
            Err(DeviceFrameError::InvalidJson(_))
        ));
        assert!(matches!(
            DeviceFrame::parse("[]"),
            Err(DeviceFrameError::EmptyArray)
        ));
    }

    #[test]
    fn call_round_trips_through_serialize() {
        let frame = DeviceFrame::Call {
            unique_id: "MS-1".into(),
            action: "SetLedColor".into(),
            payload: json!({"color": "Green"}),
        };
        let text = frame.serialize();
        let reparsed = DeviceFrame::parse(&text).unwrap();
        assert!(reparsed.is_call());
        assert_eq!(reparsed.unique_id(), "MS-1");
    }

    #[test]
    fn ack_serializes_with_empty_payload() {
        let text = DeviceFrame::ack("dev-1").serialize();
        assert_eq!(text, r#"[3,"dev-1",{}]"#);
    }
}
