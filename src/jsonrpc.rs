//! JSONRPC protocol structures and handling.
//!
//! [`JsonInterface`] puts any [`System`] behind JSON-RPC 2.0: it decodes the
//! payload, validates each envelope, runs single requests and batches, and
//! maps failures onto the protocol's error codes. Error messages on the wire
//! are always the fixed public message for the code; the detail only goes to
//! the configured error logger.

use std::sync::Arc;

use futures::future::join_all;
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::codec::{self, Deserializer, Serializer};
use crate::logging::{self, ErrorLogger};
use crate::request::{Params, Request};
use crate::system::{System, resolve};
use crate::{Error, Result};

/// The only protocol version accepted
pub const VERSION: &str = "2.0";

/// JSON-RPC 2.0 error codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    ParseError,
    InvalidRequest,
    MethodNotFound,
    InvalidParams,
    InternalError,
}

impl ErrorCode {
    /// Numeric code sent on the wire
    pub fn code(self) -> i32 {
        match self {
            ErrorCode::ParseError => -32700,
            ErrorCode::InvalidRequest => -32600,
            ErrorCode::MethodNotFound => -32601,
            ErrorCode::InvalidParams => -32602,
            ErrorCode::InternalError => -32603,
        }
    }

    /// Public message sent on the wire
    pub fn message(self) -> &'static str {
        match self {
            ErrorCode::ParseError => "Parse error",
            ErrorCode::InvalidRequest => "Invalid request",
            ErrorCode::MethodNotFound => "Method not found",
            ErrorCode::InvalidParams => "Invalid params",
            ErrorCode::InternalError => "Internal error",
        }
    }

    /// The code an error is reported with. Anything without a protocol
    /// meaning of its own is an internal error.
    pub fn from_error(error: &Error) -> Self {
        match error {
            Error::Parse(_) => ErrorCode::ParseError,
            Error::InvalidRequest(_) => ErrorCode::InvalidRequest,
            Error::MethodNotFound(_) => ErrorCode::MethodNotFound,
            Error::InvalidParams(_) => ErrorCode::InvalidParams,
            Error::Json(_) | Error::Other(_) => ErrorCode::InternalError,
        }
    }
}

/// JSONRPC success response structure
#[derive(Debug, Deserialize, Serialize)]
pub struct SuccessResponse {
    /// JSONRPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID (same as in the request)
    pub id: Value,
    /// Response result
    pub result: Value,
}

/// JSONRPC error response structure
#[derive(Debug, Deserialize, Serialize)]
pub struct ErrorResponse {
    /// JSONRPC version (always "2.0")
    pub jsonrpc: String,
    /// Request ID, null when it could not be determined
    pub id: Value,
    /// Error details
    pub error: RpcError,
}

/// JSONRPC error object
#[derive(Debug, Deserialize, Serialize)]
pub struct RpcError {
    /// Error code
    pub code: i32,
    /// Error message
    pub message: String,
}

/// JSONRPC response (either success or error)
#[derive(Debug, Deserialize, Serialize)]
#[serde(untagged)]
pub enum Response {
    /// Success response
    Success(SuccessResponse),
    /// Error response
    Error(ErrorResponse),
}

/// What goes back for one payload
#[derive(Debug, Serialize)]
#[serde(untagged)]
enum Reply {
    Single(Response),
    Batch(Vec<Response>),
}

/// Create a JSONRPC success response
pub fn success(result: Value, id: Value) -> Response {
    Response::Success(SuccessResponse {
        jsonrpc: VERSION.to_string(),
        id,
        result,
    })
}

/// Create a JSONRPC error response
pub fn error(code: ErrorCode, message: impl Into<String>, id: Value) -> Response {
    Response::Error(ErrorResponse {
        jsonrpc: VERSION.to_string(),
        id,
        error: RpcError {
            code: code.code(),
            message: message.into(),
        },
    })
}

/// Re-express an error raised while dispatching.
///
/// Only a missing method or unbindable params keep their own codes; whatever
/// else a system returns is an internal error, with the original text kept
/// for the logger.
fn dispatch_failure(err: Error) -> Error {
    match err {
        Error::MethodNotFound(_) | Error::InvalidParams(_) => err,
        other => Error::Other(other.to_string()),
    }
}

/// JSON-RPC 2.0 front end for a [`System`]
pub struct JsonInterface {
    /// Target of every request
    system: Arc<dyn System>,
    serialize: Serializer,
    deserialize: Deserializer,
    log_error: ErrorLogger,
}

impl JsonInterface {
    /// Serve `system` with the `serde_json` codec and the `log` error logger
    pub fn new(system: Arc<dyn System>) -> Self {
        Self {
            system,
            serialize: codec::default_serializer(),
            deserialize: codec::default_deserializer(),
            log_error: logging::default_logger(),
        }
    }

    /// Replace the outbound codec
    pub fn with_serializer<F>(mut self, serialize: F) -> Self
    where
        F: Fn(&Value) -> Result<String> + Send + Sync + 'static,
    {
        self.serialize = Arc::new(serialize);
        self
    }

    /// Replace the inbound codec
    pub fn with_deserializer<F>(mut self, deserialize: F) -> Self
    where
        F: Fn(&str) -> Result<Value> + Send + Sync + 'static,
    {
        self.deserialize = Arc::new(deserialize);
        self
    }

    /// Replace the error logger
    pub fn with_error_logger<F, E>(mut self, log_error: F) -> Self
    where
        F: Fn(&Error) -> std::result::Result<(), E> + Send + Sync + 'static,
        E: Into<logging::BoxError>,
    {
        self.log_error = Arc::new(move |err: &Error| log_error(err).map_err(Into::into));
        self
    }

    /// Handle one inbound payload and produce the response text.
    ///
    /// Request-shaped problems always come back as JSON-RPC error responses.
    /// `Err` is only returned when the serializer cannot encode even a plain
    /// internal-error response.
    pub async fn run(&self, input: &str) -> Result<String> {
        let reply = match (self.deserialize)(input) {
            Ok(payload) => self.run_payload(payload).await,
            Err(err) => Reply::Single(self.error_response(Error::Parse(err.to_string()), Value::Null)),
        };

        match self.encode(&reply) {
            Ok(text) => Ok(text),
            Err(err) => {
                warn!("could not encode response: {}", err);
                let fallback = self.error_response(Error::Other(err.to_string()), Value::Null);
                self.encode(&Reply::Single(fallback))
            }
        }
    }

    async fn run_payload(&self, payload: Value) -> Reply {
        match payload {
            Value::Object(envelope) => Reply::Single(self.run_item(envelope).await),
            Value::Array(items) if !items.is_empty() => {
                debug!("running batch of {} requests", items.len());
                let responses = join_all(items.into_iter().map(|item| async move {
                    match item {
                        Value::Object(envelope) => self.run_item(envelope).await,
                        other => self.error_response(
                            Error::InvalidRequest(format!("batch item is not an object: {}", other)),
                            Value::Null,
                        ),
                    }
                }))
                .await;
                Reply::Batch(responses)
            }
            Value::Array(_) => Reply::Single(
                self.error_response(Error::InvalidRequest("empty batch".to_string()), Value::Null),
            ),
            other => Reply::Single(self.error_response(
                Error::InvalidRequest(format!("expected an object or an array, got {}", other)),
                Value::Null,
            )),
        }
    }

    async fn run_item(&self, envelope: Map<String, Value>) -> Response {
        let id = envelope.get("id").cloned().unwrap_or(Value::Null);
        match self.call(envelope).await {
            Ok(result) => success(result, id),
            Err(err) => self.error_response(err, id),
        }
    }

    /// Validate an envelope and run it
    async fn call(&self, mut envelope: Map<String, Value>) -> Result<Value> {
        match envelope.get("jsonrpc") {
            Some(Value::String(version)) if version == VERSION => {}
            Some(_) => return Err(Error::InvalidRequest("only jsonrpc 2.0 accepted".to_string())),
            None => return Err(Error::InvalidRequest("jsonrpc version not provided".to_string())),
        }

        let method = match envelope.remove("method") {
            Some(Value::String(method)) => method,
            Some(_) => return Err(Error::InvalidRequest("method must be a string".to_string())),
            None => return Err(Error::InvalidRequest("method not provided".to_string())),
        };

        let params = match envelope.remove("params") {
            Some(params) => Params::from_value(params)?,
            None => Params::default(),
        };

        let mut request = Request::new(method).with_params(params);
        if let Some(id) = envelope.remove("id") {
            request = request.with_id(id);
        }

        debug!("dispatching {}", request.full_method());
        let result = match self.system.run_procedure(request.clone()).await {
            Ok(outcome) => resolve(outcome, request).await,
            Err(err) => Err(err),
        };
        result.map_err(dispatch_failure)
    }

    /// Turn an error into a response, reporting it to the logger first
    fn error_response(&self, err: Error, id: Value) -> Response {
        let code = ErrorCode::from_error(&err);
        let message = match (self.log_error)(&err) {
            Ok(()) => code.message().to_string(),
            Err(log_err) => {
                warn!("error logger failed: {}", log_err);
                format!("{} (error logging failed)", code.message())
            }
        };
        error(code, message, id)
    }

    fn encode(&self, reply: &Reply) -> Result<String> {
        let value = serde_json::to_value(reply)?;
        (self.serialize)(&value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rpc::RpcSystem;
    use crate::system::{Outcome, StaticValue};
    use serde_json::json;
    use std::sync::Mutex;

    fn parse(text: &str) -> Value {
        serde_json::from_str(text).expect("response is JSON")
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ErrorCode::ParseError.code(), -32700);
        assert_eq!(ErrorCode::InvalidRequest.code(), -32600);
        assert_eq!(ErrorCode::MethodNotFound.code(), -32601);
        assert_eq!(ErrorCode::InvalidParams.code(), -32602);
        assert_eq!(ErrorCode::InternalError.code(), -32603);
    }

    #[test]
    fn test_error_classification() {
        assert_eq!(
            ErrorCode::from_error(&Error::MethodNotFound("x".into())),
            ErrorCode::MethodNotFound
        );
        assert_eq!(ErrorCode::from_error(&Error::other("boom")), ErrorCode::InternalError);
        let json_err = serde_json::from_str::<Value>("{").unwrap_err();
        assert_eq!(ErrorCode::from_error(&Error::Json(json_err)), ErrorCode::InternalError);
    }

    #[test]
    fn test_response_shapes() {
        let ok = serde_json::to_value(success(json!(3), json!(7))).unwrap();
        assert_eq!(ok, json!({"jsonrpc": "2.0", "id": 7, "result": 3}));

        let err = serde_json::to_value(error(ErrorCode::MethodNotFound, "Method not found", Value::Null)).unwrap();
        assert_eq!(
            err,
            json!({"jsonrpc": "2.0", "id": null, "error": {"code": -32601, "message": "Method not found"}})
        );
    }

    #[tokio::test]
    async fn test_default_codec() -> Result<()> {
        let i = JsonInterface::new(Arc::new(StaticValue::new("b")));
        let response = parse(&i.run(r#"{"jsonrpc": "2.0", "method": "something", "id": 12}"#).await?);
        assert_eq!(response, json!({"jsonrpc": "2.0", "id": 12, "result": "b"}));
        Ok(())
    }

    #[tokio::test]
    async fn test_custom_codec() -> Result<()> {
        let inputs = Arc::new(Mutex::new(Vec::new()));
        let outputs = Arc::new(Mutex::new(Vec::new()));

        let seen_in = inputs.clone();
        let seen_out = outputs.clone();
        let i = JsonInterface::new(Arc::new(StaticValue::new("b")))
            .with_deserializer(move |text: &str| {
                seen_in.lock().unwrap().push(text.to_string());
                Ok(json!({"jsonrpc": "2.0", "method": "something", "id": 14}))
            })
            .with_serializer(move |value: &Value| {
                seen_out.lock().unwrap().push(value.clone());
                Ok("serialized".to_string())
            });

        assert_eq!(i.run("input string").await?, "serialized");
        assert_eq!(*inputs.lock().unwrap(), vec!["input string".to_string()]);
        assert_eq!(
            *outputs.lock().unwrap(),
            vec![json!({"jsonrpc": "2.0", "result": "b", "id": 14})]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_custom_deserializer_failure_is_parse_error() -> Result<()> {
        let i = JsonInterface::new(Arc::new(RpcSystem::new()))
            .with_deserializer(|_: &str| Err(Error::other("cannot decode")));
        let response = parse(&i.run("whatever").await?);
        assert_eq!(response["error"]["code"], json!(-32700));
        assert_eq!(response["id"], Value::Null);
        Ok(())
    }

    #[tokio::test]
    async fn test_serializer_failure_falls_back() -> Result<()> {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let i = JsonInterface::new(Arc::new(StaticValue::new("b"))).with_serializer(
            move |value: &Value| {
                let mut calls = counter.lock().unwrap();
                *calls += 1;
                if *calls == 1 {
                    return Err(Error::other("encoder broke"));
                }
                codec::json_serialize(value)
            },
        );

        let response = parse(&i.run(r#"{"jsonrpc": "2.0", "method": "x", "id": 1}"#).await?);
        assert_eq!(response["error"]["code"], json!(-32603));
        assert_eq!(*calls.lock().unwrap(), 2);
        Ok(())
    }

    #[tokio::test]
    async fn test_protocol_errors_from_handlers_are_internal() -> Result<()> {
        let mut rpc = RpcSystem::new();
        rpc.add_function("bad_req", |_: ()| async {
            Err::<Value, _>(Error::InvalidRequest("handler said so".to_string()))
        });
        rpc.add_function("bad_parse", |_: ()| async {
            Err::<Value, _>(Error::Parse("handler said so".to_string()))
        });
        rpc.add_handler("nested", |_request: Request| async {
            Params::from_value(json!(5)).map(|_| Outcome::Value(Value::Null))
        });

        let logged = Arc::new(Mutex::new(Vec::new()));
        let sink = logged.clone();
        let i = JsonInterface::new(Arc::new(rpc)).with_error_logger(move |err: &Error| {
            sink.lock().unwrap().push(err.to_string());
            Ok::<(), String>(())
        });

        for method in ["bad_req", "bad_parse", "nested"] {
            let payload = json!({"jsonrpc": "2.0", "method": method, "id": 1}).to_string();
            let response = parse(&i.run(&payload).await?);
            assert_eq!(response["error"]["code"], json!(-32603), "method {}", method);
            assert_eq!(response["error"]["message"], json!("Internal error"));
        }

        let logged = logged.lock().unwrap();
        assert_eq!(logged.len(), 3);
        assert!(logged[0].contains("handler said so"));
        assert!(logged[2].contains("params must be an array or an object"));
        Ok(())
    }

    #[tokio::test]
    async fn test_invalid_params_code() -> Result<()> {
        let mut rpc = RpcSystem::new();
        rpc.add_function("sum", |(a, b): (i64, i64)| async move { Ok(a + b) });
        let i = JsonInterface::new(Arc::new(rpc));

        let response = parse(
            &i.run(r#"{"jsonrpc": "2.0", "method": "sum", "params": ["x"], "id": 3}"#)
                .await?,
        );
        assert_eq!(response["error"]["code"], json!(-32602));
        assert_eq!(response["id"], json!(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_params_must_be_structured() -> Result<()> {
        let i = JsonInterface::new(Arc::new(StaticValue::new(1)));
        let response = parse(
            &i.run(r#"{"jsonrpc": "2.0", "method": "x", "params": 5, "id": 3}"#)
                .await?,
        );
        assert_eq!(response["error"]["code"], json!(-32600));
        Ok(())
    }

    #[tokio::test]
    async fn test_wrong_version() -> Result<()> {
        let i = JsonInterface::new(Arc::new(StaticValue::new(1)));
        let response = parse(&i.run(r#"{"jsonrpc": "1.0", "method": "x", "id": 3}"#).await?);
        assert_eq!(response["error"]["code"], json!(-32600));
        assert_eq!(response["error"]["message"], json!("Invalid request"));
        assert_eq!(response["id"], json!(3));
        Ok(())
    }

    #[tokio::test]
    async fn test_batch_with_non_object_item() -> Result<()> {
        let i = JsonInterface::new(Arc::new(StaticValue::new("ok")));
        let response = parse(
            &i.run(r#"[{"jsonrpc": "2.0", "method": "x", "id": 1}, 5]"#)
                .await?,
        );
        let items = response.as_array().cloned().unwrap_or_default();
        assert_eq!(items.len(), 2);
        assert!(items.iter().any(|r| r["id"] == json!(1) && r["result"] == json!("ok")));
        assert!(items.iter().any(|r| r["id"].is_null() && r["error"]["code"] == json!(-32600)));
        Ok(())
    }
}
