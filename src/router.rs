//! Named routes attached to a host type.
//!
//! A [`Router`] is built once per host type and describes how requests are
//! routed: a factory per leading method segment, an optional catch-all default
//! and an optional prehook that replaces the lookup altogether. Each host
//! instance binds it with [`Router::bind`], which yields a [`BoundRouter`]
//! implementing [`System`].
//!
//! ```rust,ignore
//! static ROUTER: LazyLock<Arc<Router<Shop>>> = LazyLock::new(|| {
//!     Arc::new(
//!         Router::new()
//!             .route("cart", |shop: Arc<Shop>, _req| async move {
//!                 Ok(Outcome::System(shop.cart.clone()))
//!             })
//!             .default_route(|shop, _req| async move { Ok(Outcome::System(shop.catalog.clone())) }),
//!     )
//! });
//!
//! impl Shop {
//!     fn rpc(self: &Arc<Self>) -> BoundRouter<Shop> {
//!         ROUTER.bind(self.clone())
//!     }
//! }
//! ```

use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::FutureExt;
use futures::future::BoxFuture;
use log::trace;
use serde_json::Value;

use crate::request::Request;
use crate::system::{Outcome, System, resolve};
use crate::{Error, Result};

/// Produces the result (or next system) for a request routed to a host
pub type RouteFn<H> =
    Box<dyn Fn(Arc<H>, Request) -> BoxFuture<'static, Result<Outcome>> + Send + Sync>;

/// Replaces route lookup; gets the normal lookup as a [`Next`]
pub type PrehookFn<H> =
    Box<dyn Fn(Arc<H>, Next<H>, Request) -> BoxFuture<'static, Result<Outcome>> + Send + Sync>;

/// Routing table for one host type
pub struct Router<H> {
    routes: HashMap<String, RouteFn<H>>,
    default: Option<RouteFn<H>>,
    prehook: Option<PrehookFn<H>>,
}

impl<H> Default for Router<H> {
    fn default() -> Self {
        Self {
            routes: HashMap::new(),
            default: None,
            prehook: None,
        }
    }
}

impl<H: Send + Sync + 'static> Router<H> {
    /// Create a router with no routes, default or prehook
    pub fn new() -> Self {
        Self::default()
    }

    /// Route requests whose method starts with `name`.
    ///
    /// The segment is consumed before `factory` runs, so for `"name.rest"` the
    /// factory sees `"rest"`, and for a bare `"name"` it sees `""`.
    pub fn route<F, Fut>(mut self, name: &str, factory: F) -> Self
    where
        F: Fn(Arc<H>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome>> + Send + 'static,
    {
        let route_fn: RouteFn<H> = Box::new(move |host: Arc<H>, request: Request| {
            factory(host, request).boxed()
        });
        self.routes.insert(name.to_string(), route_fn);
        self
    }

    /// Handle every request no route matches. The request arrives unmodified.
    pub fn default_route<F, Fut>(mut self, factory: F) -> Self
    where
        F: Fn(Arc<H>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome>> + Send + 'static,
    {
        self.default = Some(Box::new(move |host: Arc<H>, request: Request| {
            factory(host, request).boxed()
        }));
        self
    }

    /// Intercept every request before route lookup.
    ///
    /// Call [`Next::run`] to fall through to the routes and default.
    pub fn prehook<F, Fut>(mut self, hook: F) -> Self
    where
        F: Fn(Arc<H>, Next<H>, Request) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Outcome>> + Send + 'static,
    {
        self.prehook = Some(Box::new(move |host: Arc<H>, next: Next<H>, request: Request| {
            hook(host, next, request).boxed()
        }));
        self
    }

    /// Attach this router to a host instance
    pub fn bind(self: &Arc<Self>, host: Arc<H>) -> BoundRouter<H> {
        BoundRouter {
            router: self.clone(),
            host,
        }
    }
}

/// A router attached to one host instance
pub struct BoundRouter<H> {
    router: Arc<Router<H>>,
    host: Arc<H>,
}

impl<H> Clone for BoundRouter<H> {
    fn clone(&self) -> Self {
        Self {
            router: self.router.clone(),
            host: self.host.clone(),
        }
    }
}

impl<H: Send + Sync + 'static> BoundRouter<H> {
    /// The host instance this router is bound to
    pub fn host(&self) -> &Arc<H> {
        &self.host
    }

    /// Route lookup without the prehook
    async fn lookup(&self, request: Request) -> Result<Value> {
        let segment = request.method().split('.').next().unwrap_or_default();

        if let Some(route) = self.router.routes.get(segment) {
            trace!("route {:?} matched {}", segment, request.full_method());
            let child = request.child();
            let outcome = route(self.host.clone(), child.clone()).await?;
            return resolve(outcome, child).await;
        }

        if let Some(default) = &self.router.default {
            trace!("default route for {}", request.full_method());
            let outcome = default(self.host.clone(), request.clone()).await?;
            return resolve(outcome, request).await;
        }

        Err(Error::MethodNotFound(request.full_method().to_string()))
    }
}

#[async_trait]
impl<H: Send + Sync + 'static> System for BoundRouter<H> {
    async fn run_procedure(&self, request: Request) -> Result<Outcome> {
        let value = match &self.router.prehook {
            Some(hook) => {
                let next = Next {
                    bound: self.clone(),
                };
                let outcome = hook(self.host.clone(), next, request.clone()).await?;
                resolve(outcome, request).await?
            }
            None => self.lookup(request).await?,
        };
        Ok(Outcome::Value(value))
    }
}

/// The normal route lookup, handed to a prehook
pub struct Next<H> {
    bound: BoundRouter<H>,
}

impl<H: Send + Sync + 'static> Next<H> {
    /// Look up a route (or the default) for `request` and run it to a value
    pub async fn run(&self, request: Request) -> Result<Outcome> {
        self.bound.lookup(request).await.map(Outcome::Value)
    }
}
