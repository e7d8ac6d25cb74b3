use std::sync::Arc;

use crate::context::RequestContext;
use crate::error::DispatchError;

/// A single link of a request chain.
///
/// Implementations must be `Send + Sync`: chains are shared across request
/// threads behind `Arc`, and only the per-request context is mutable.
pub trait Handler: Send + Sync {
    /// Process one request. Returning an error stops the chain and routes the
    /// request through the dispatcher's error translation step.
    fn call(&self, ctx: &mut RequestContext) -> Result<(), DispatchError>;
}

/// Plain functions and closures are handlers.
impl<F> Handler for F
where
    F: Fn(&mut RequestContext) -> Result<(), DispatchError> + Send + Sync,
{
    fn call(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        self(ctx)
    }
}

/// Shared handle to one chain link.
pub type HandlerFn = Arc<dyn Handler>;

/// Ordered handler chain as stored in route tables.
pub type HandlerChain = Vec<HandlerFn>;
