//! Dotted-name RPC dispatch with composable systems.
//!
//! A [`Request`] names a method such as `"shop.cart.add"`. Dispatch targets
//! implement [`System`] and either answer the request or hand back another
//! system that should continue resolving it. [`RpcSystem`] is a plain
//! function/subsystem table, [`Router`] attaches named routes to a host type,
//! and [`jsonrpc::JsonInterface`] exposes any system over JSON-RPC 2.0.

use std::error::Error as StdError;
use std::fmt;

pub mod codec;
pub mod jsonrpc;
pub mod logging;
pub mod request;
pub mod router;
pub mod rpc;
pub mod system;

// Re-export key types
pub use jsonrpc::JsonInterface;
pub use request::{Context, Params, Request};
pub use router::{BoundRouter, Next, Router};
pub use rpc::RpcSystem;
pub use system::{Outcome, StaticValue, System, resolve};

/// Custom error type for the library
#[derive(Debug)]
pub enum Error {
    /// No handler is registered for the dotted method path
    MethodNotFound(String),
    /// Parameters could not be bound to the handler's signature
    InvalidParams(String),
    /// The request envelope is malformed
    InvalidRequest(String),
    /// The payload could not be decoded
    Parse(String),
    /// JSON serialization/deserialization error
    Json(serde_json::Error),
    /// General handler failure
    Other(String),
}

impl Error {
    /// Build a handler failure from anything displayable
    pub fn other(msg: impl fmt::Display) -> Self {
        Error::Other(msg.to_string())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::MethodNotFound(method) => write!(f, "Method not found: {}", method),
            Error::InvalidParams(msg) => write!(f, "Invalid params: {}", msg),
            Error::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            Error::Parse(msg) => write!(f, "Parse error: {}", msg),
            Error::Json(err) => write!(f, "JSON error: {}", err),
            Error::Other(msg) => write!(f, "{}", msg),
        }
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Error::Json(err) => Some(err),
            Error::MethodNotFound(_) => None,
            Error::InvalidParams(_) => None,
            Error::InvalidRequest(_) => None,
            Error::Parse(_) => None,
            Error::Other(_) => None,
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Json(err)
    }
}

/// Type alias for library results
pub type Result<T> = std::result::Result<T, Error>;
