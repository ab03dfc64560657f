//! The dispatch capability shared by every target in a dispatch tree.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use log::trace;
use serde_json::Value;

use crate::Result;
use crate::request::Request;

/// Anything that can try to answer a [`Request`].
///
/// Implementations fail with [`Error::MethodNotFound`](crate::Error::MethodNotFound)
/// carrying the request's full method when they cannot resolve it.
#[async_trait]
pub trait System: Send + Sync {
    /// Resolve and run the procedure named by `request.method()`
    async fn run_procedure(&self, request: Request) -> Result<Outcome>;
}

/// What a dispatch step produced
#[derive(Clone)]
pub enum Outcome {
    /// A final result
    Value(Value),
    /// Another system that should continue resolving the same request
    System(Arc<dyn System>),
}

impl Outcome {
    /// Hand the request on to `system`
    pub fn system(system: impl System + 'static) -> Self {
        Outcome::System(Arc::new(system))
    }

    /// True for a final value
    pub fn is_terminal(&self) -> bool {
        matches!(self, Outcome::Value(_))
    }
}

impl From<Value> for Outcome {
    fn from(value: Value) -> Self {
        Outcome::Value(value)
    }
}

impl fmt::Debug for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Value(value) => f.debug_tuple("Value").field(value).finish(),
            Outcome::System(_) => f.write_str("System(..)"),
        }
    }
}

/// Follow an outcome until it yields a value.
///
/// Each system in the chain is run with `request`; a system may answer with
/// yet another system, to any depth.
pub async fn resolve(mut outcome: Outcome, request: Request) -> Result<Value> {
    let mut depth = 0usize;
    loop {
        match outcome {
            Outcome::Value(value) => return Ok(value),
            Outcome::System(system) => {
                depth += 1;
                trace!("following system #{} for {}", depth, request.full_method());
                outcome = system.run_procedure(request.clone()).await?;
            }
        }
    }
}

/// A system that answers every request with the same value
#[derive(Debug, Clone)]
pub struct StaticValue {
    value: Value,
}

impl StaticValue {
    /// Answer every request with `value`
    pub fn new(value: impl Into<Value>) -> Self {
        Self {
            value: value.into(),
        }
    }
}

#[async_trait]
impl System for StaticValue {
    async fn run_procedure(&self, _request: Request) -> Result<Outcome> {
        Ok(Outcome::Value(self.value.clone()))
    }
}
