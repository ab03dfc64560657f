//! Request value objects passed down a dispatch tree.

use std::borrow::Cow;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde_json::{Map, Value};

use crate::{Error, Result};

/// Parameters of a call, either positional or keyword
#[derive(Debug, Clone, PartialEq)]
pub enum Params {
    /// Positional arguments
    Positional(Vec<Value>),
    /// Keyword arguments
    Keyword(Map<String, Value>),
}

impl Default for Params {
    fn default() -> Self {
        Params::Positional(Vec::new())
    }
}

impl Params {
    /// Interpret a JSON value as call parameters.
    ///
    /// Arrays become positional, objects become keyword and `null` means no
    /// parameters. Anything else is not a valid parameter structure.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Array(args) => Ok(Params::Positional(args)),
            Value::Object(kwargs) => Ok(Params::Keyword(kwargs)),
            Value::Null => Ok(Params::default()),
            other => Err(Error::InvalidRequest(format!(
                "params must be an array or an object, got {}",
                other
            ))),
        }
    }

    /// True when there is nothing to pass
    pub fn is_empty(&self) -> bool {
        match self {
            Params::Positional(args) => args.is_empty(),
            Params::Keyword(kwargs) => kwargs.is_empty(),
        }
    }
}

impl From<Vec<Value>> for Params {
    fn from(args: Vec<Value>) -> Self {
        Params::Positional(args)
    }
}

impl From<Map<String, Value>> for Params {
    fn from(kwargs: Map<String, Value>) -> Self {
        Params::Keyword(kwargs)
    }
}

/// Mutable bag shared by every request derived from one top-level request.
///
/// Cloning a `Context` clones the handle, not the contents.
#[derive(Debug, Clone, Default)]
pub struct Context {
    inner: Arc<Mutex<Map<String, Value>>>,
}

impl Context {
    /// Create an empty context
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Map<String, Value>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Get a copy of the value stored under `key`
    pub fn get(&self, key: &str) -> Option<Value> {
        self.lock().get(key).cloned()
    }

    /// Store a value, returning the previous one
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) -> Option<Value> {
        self.lock().insert(key.into(), value.into())
    }

    /// Remove a value, returning it
    pub fn remove(&self, key: &str) -> Option<Value> {
        self.lock().remove(key)
    }

    /// True if something is stored under `key`
    pub fn contains_key(&self, key: &str) -> bool {
        self.lock().contains_key(key)
    }

    /// Snapshot of the whole bag
    pub fn to_map(&self) -> Map<String, Value> {
        self.lock().clone()
    }

    /// True if both handles point at the same bag
    pub fn same_as(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// A call travelling through the dispatch tree.
///
/// `full_method` and `full_params` are fixed at construction. `method` and
/// `params` are the views left for whoever handles the request next.
#[derive(Debug, Clone)]
pub struct Request {
    full_method: String,
    method: String,
    full_params: Params,
    params: Params,
    id: Option<Value>,
    context: Context,
}

impl Request {
    /// Create a request for `method` with no parameters
    pub fn new(method: impl Into<String>) -> Self {
        let method = method.into();
        Self {
            full_method: method.clone(),
            method,
            full_params: Params::default(),
            params: Params::default(),
            id: None,
            context: Context::new(),
        }
    }

    /// Set the parameters of a freshly built request
    pub fn with_params(mut self, params: impl Into<Params>) -> Self {
        let params = params.into();
        self.full_params = params.clone();
        self.params = params;
        self
    }

    /// Set the correlation id
    pub fn with_id(mut self, id: Value) -> Self {
        self.id = Some(id);
        self
    }

    /// The method as originally requested
    pub fn full_method(&self) -> &str {
        &self.full_method
    }

    /// The part of the method still to be resolved
    pub fn method(&self) -> &str {
        &self.method
    }

    /// The parameters as originally given
    pub fn full_params(&self) -> &Params {
        &self.full_params
    }

    /// The parameters left for the next handler
    pub fn params(&self) -> &Params {
        &self.params
    }

    /// Correlation id from the wire, if any
    pub fn id(&self) -> Option<&Value> {
        self.id.as_ref()
    }

    /// The bag shared with every related request
    pub fn context(&self) -> &Context {
        &self.context
    }

    /// A copy of this request with the leading method segment removed.
    ///
    /// `"a.b.c"` becomes `"b.c"`; a method without a dot becomes `""`.
    pub fn child(&self) -> Request {
        let mut child = self.clone();
        child.method = match self.method.split_once('.') {
            Some((_, rest)) => rest.to_string(),
            None => String::new(),
        };
        child
    }

    /// A copy of this request without the given keyword parameters.
    ///
    /// Positional parameters are left untouched.
    pub fn strip_params(&self, keys: &[&str]) -> Request {
        let mut stripped = self.clone();
        if let Params::Keyword(kwargs) = &mut stripped.params {
            for key in keys {
                kwargs.remove(*key);
            }
        }
        stripped
    }

    /// Positional arguments, empty for a keyword call
    pub fn args(&self) -> &[Value] {
        match &self.params {
            Params::Positional(args) => args,
            Params::Keyword(_) => &[],
        }
    }

    /// Keyword arguments, empty for a positional call
    pub fn kwargs(&self) -> Cow<'_, Map<String, Value>> {
        match &self.params {
            Params::Keyword(kwargs) => Cow::Borrowed(kwargs),
            Params::Positional(_) => Cow::Owned(Map::new()),
        }
    }

    /// The current parameters as a single JSON value, ready to be bound to a
    /// typed signature. No parameters at all is an empty array.
    pub fn params_value(&self) -> Value {
        match &self.params {
            Params::Positional(args) => Value::Array(args.clone()),
            Params::Keyword(kwargs) => Value::Object(kwargs.clone()),
        }
    }
}
