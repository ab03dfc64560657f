//! A composable function/subsystem table.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use log::debug;
use serde::{Serialize, de::DeserializeOwned};

use crate::codec::{from_params, to_value};
use crate::request::Request;
use crate::system::{Outcome, System};
use crate::{Error, Result};

/// Request handler function signature
pub type HandlerFn = Box<dyn Fn(Request) -> BoxFuture<'static, Result<Outcome>> + Send + Sync>;

/// Resolves dotted methods one segment at a time.
///
/// `"a.b.c"` descends into subsystem `a`, then `b`, and runs function `c`
/// there. Once a subsystem is chosen there is no backtracking.
#[derive(Default)]
pub struct RpcSystem {
    /// Functions callable at this level
    functions: HashMap<String, HandlerFn>,
    /// Nested systems keyed by their segment
    systems: HashMap<String, Arc<dyn System>>,
}

impl RpcSystem {
    /// Create an empty system
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a function with typed parameters.
    ///
    /// Positional params bind to tuples or sequences, keyword params to
    /// structs. A call without params also binds to `()`.
    pub fn add_function<F, Fut, P, O>(&mut self, name: &str, function: F)
    where
        F: Fn(P) -> Fut + Send + Sync + Clone + 'static,
        Fut: Future<Output = Result<O>> + Send + 'static,
        P: DeserializeOwned + Send + 'static,
        O: Serialize + Send + 'static,
    {
        let handler_fn: HandlerFn = Box::new(move |request: Request| {
            let function = function.clone();

            async move {
                let params: P = from_params(request.params_value())?;
                let result = function(params).await?;
                Ok(Outcome::Value(to_value(result)?))
            }
            .boxed()
        });

        self.functions.insert(name.to_string(), handler_fn);
    }

    /// Register a function that receives the whole request.
    ///
    /// Useful when the handler needs the context or wants to hand the call
    /// on to another system.
    pub fn add_handler<F, Fut>(&mut self, name: &str, handler: F)
    where
        F: Fn(Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome>> + Send + 'static,
    {
        let handler_fn: HandlerFn = Box::new(move |request: Request| handler(request).boxed());
        self.functions.insert(name.to_string(), handler_fn);
    }

    /// Mount a subsystem under `name`
    pub fn add_system(&mut self, name: &str, system: Arc<dyn System>) {
        self.systems.insert(name.to_string(), system);
    }

    fn not_found(request: &Request) -> Error {
        Error::MethodNotFound(request.full_method().to_string())
    }
}

#[async_trait]
impl System for RpcSystem {
    async fn run_procedure(&self, request: Request) -> Result<Outcome> {
        // look for a subsystem
        if let Some((system_name, _)) = request.method().split_once('.') {
            let Some(system) = self.systems.get(system_name) else {
                debug!("no subsystem {:?} for {}", system_name, request.full_method());
                return Err(Self::not_found(&request));
            };
            return system.run_procedure(request.child()).await;
        }

        // look for a function
        match self.functions.get(request.method()) {
            Some(handler) => handler(request).await,
            None => {
                debug!("no function {:?} for {}", request.method(), request.full_method());
                Err(Self::not_found(&request))
            }
        }
    }
}
