//! Unit <-> envelope codec (panic-free).
//!
//! Decoding rules:
//! - A unit that is not JSON is a `Parse` failure carrying the parser text.
//! - JSON that is not a usable envelope is a `Shape` failure, reported with
//!   the unit's id when it could be read.
//! - Neither case is an `Err`: both are ordinary results the caller must
//!   match on.
//!
//! Encoding always writes `"jsonrpc":"2.0"`. A missing `jsonrpc` member is
//! tolerated on input.

use bytes::Bytes;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{Result, RpcWireError};
use crate::protocol::envelope::{
    Envelope, ErrorObject, Id, Params, Request, Response, JSONRPC_VERSION,
};

/// Unit was not valid JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub detail: String,
}

impl ParseFailure {
    /// `-32700` reply with `id = null`.
    pub fn into_response(self) -> Response {
        Response::failure(None, ErrorObject::parse_error(self.detail))
    }
}

/// Unit was JSON but not a valid envelope.
#[derive(Debug, Clone, PartialEq)]
pub struct ShapeFailure {
    pub id: Option<Id>,
    pub reason: String,
}

impl ShapeFailure {
    fn new(id: Option<Id>, reason: &str) -> Self {
        Self {
            id,
            reason: reason.to_string(),
        }
    }

    /// `-32600` reply echoing the unit's id when one was readable.
    pub fn into_response(self) -> Response {
        Response::failure(self.id, ErrorObject::invalid_request(self.reason))
    }
}

/// Tagged decode result; match it exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum Decoded {
    Valid(Envelope),
    Parse(ParseFailure),
    Shape(ShapeFailure),
}

/// Decode one unit (a line record or an HTTP body).
pub fn decode(unit: &[u8]) -> Decoded {
    let value: Value = match serde_json::from_slice(unit) {
        Ok(v) => v,
        Err(e) => {
            return Decoded::Parse(ParseFailure {
                detail: e.to_string(),
            })
        }
    };

    match decode_value(value) {
        Ok(env) => Decoded::Valid(env),
        Err(shape) => Decoded::Shape(shape),
    }
}

fn decode_value(value: Value) -> std::result::Result<Envelope, ShapeFailure> {
    let Value::Object(mut obj) = value else {
        return Err(ShapeFailure::new(None, "request must be an object"));
    };

    let id = match obj.remove("id") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(Id::String(s)),
        Some(Value::Number(n)) => match n.as_i64() {
            Some(n) => Some(Id::Number(n)),
            None => {
                return Err(ShapeFailure::new(None, "id must be a string, integer, or null"))
            }
        },
        Some(_) => return Err(ShapeFailure::new(None, "id must be a string, integer, or null")),
    };

    if let Some(version) = obj.get("jsonrpc") {
        if version.as_str() != Some(JSONRPC_VERSION) {
            return Err(ShapeFailure::new(id, "jsonrpc must be \"2.0\""));
        }
    }

    match obj.remove("method") {
        Some(Value::String(method)) => {
            let params = match obj.remove("params") {
                None | Some(Value::Null) => Params::new(),
                Some(Value::Object(map)) => map,
                Some(_) => return Err(ShapeFailure::new(id, "params must be an object")),
            };
            Ok(Envelope::Request(Request { id, method, params }))
        }
        Some(_) => Err(ShapeFailure::new(id, "method must be a string")),
        None => decode_response(id, obj),
    }
}

fn decode_response(
    id: Option<Id>,
    mut obj: Map<String, Value>,
) -> std::result::Result<Envelope, ShapeFailure> {
    let result = obj.remove("result");
    let error = obj.remove("error");

    let outcome = match (result, error) {
        (Some(result), None) => Ok(result),
        (None, Some(error)) => match serde_json::from_value::<ErrorObject>(error) {
            Ok(err) => Err(err),
            Err(_) => {
                return Err(ShapeFailure::new(
                    id,
                    "error must be an object with integer code and string message",
                ))
            }
        },
        (Some(_), Some(_)) => {
            return Err(ShapeFailure::new(
                id,
                "response must carry exactly one of result or error",
            ))
        }
        // Neither a request nor a response.
        (None, None) => return Err(ShapeFailure::new(id, "method must be a string")),
    };

    Ok(Envelope::Response(Response { id, outcome }))
}

#[derive(Serialize)]
struct WireRequest<'a> {
    jsonrpc: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    id: Option<&'a Id>,
    method: &'a str,
    params: &'a Params,
}

#[derive(Serialize)]
struct WireResponse<'a> {
    jsonrpc: &'static str,
    id: Option<&'a Id>,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<&'a Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<&'a ErrorObject>,
}

/// Encode an envelope into one unit (no framing).
pub fn encode(env: &Envelope) -> Result<Bytes> {
    let out = match env {
        Envelope::Request(req) => serde_json::to_vec(&WireRequest {
            jsonrpc: JSONRPC_VERSION,
            id: req.id.as_ref(),
            method: &req.method,
            params: &req.params,
        }),
        Envelope::Response(resp) => serde_json::to_vec(&WireResponse {
            jsonrpc: JSONRPC_VERSION,
            id: resp.id.as_ref(),
            result: resp.outcome.as_ref().ok(),
            error: resp.outcome.as_ref().err(),
        }),
    };
    out.map(Bytes::from)
        .map_err(|e| RpcWireError::Encode(e.to_string()))
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::panic)]

    use super::*;
    use serde_json::json;

    #[test]
    fn response_always_carries_id() {
        let bytes = encode(&Response::success(None, json!(1)).into()).unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(v.as_object().unwrap().contains_key("id"));
        assert!(v["id"].is_null());
    }

    #[test]
    fn notification_omits_id() {
        let env = Request::notification("tick", Params::new()).into();
        let bytes = encode(&env).unwrap();
        let v: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(!v.as_object().unwrap().contains_key("id"));
        assert_eq!(v["jsonrpc"], "2.0");
    }

    #[test]
    fn null_result_is_still_a_result() {
        match decode(br#"{"jsonrpc":"2.0","id":3,"result":null}"#) {
            Decoded::Valid(Envelope::Response(r)) => assert_eq!(r.outcome, Ok(Value::Null)),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn null_error_data_survives_decode() {
        let raw = br#"{"jsonrpc":"2.0","id":4,"error":{"code":-32000,"message":"Application error","data":null}}"#;
        let resp = match decode(raw) {
            Decoded::Valid(Envelope::Response(r)) => r,
            other => panic!("unexpected: {other:?}"),
        };
        let err = resp.outcome.clone().unwrap_err();
        assert_eq!(err.data, Some(Value::Null));

        let v: Value = serde_json::from_slice(&encode(&resp.into()).unwrap()).unwrap();
        assert!(v["error"].as_object().unwrap().contains_key("data"));

        let absent = br#"{"jsonrpc":"2.0","id":5,"error":{"code":-32000,"message":"x"}}"#;
        match decode(absent) {
            Decoded::Valid(Envelope::Response(r)) => assert_eq!(r.outcome.unwrap_err().data, None),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn fractional_id_is_a_shape_failure() {
        match decode(br#"{"id":1.5,"method":"ping"}"#) {
            Decoded::Shape(s) => assert!(s.id.is_none()),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
