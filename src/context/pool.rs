//! Context pool - fixed-shape reusable request contexts.
//!
//! Contexts are reset on both acquisition and release, so a pooled object can
//! never leak one request's state into the next. Pooled contexts are never
//! shared between two concurrently in-flight requests.

use http::Method;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use tracing::debug;

use super::core::RequestContext;
use crate::runtime_config::RuntimeConfig;

/// Counters for pool monitoring.
#[derive(Debug, Default)]
pub struct PoolMetrics {
    /// Contexts allocated because the pool was empty.
    pub created: AtomicU64,
    /// Total acquisitions.
    pub acquired: AtomicU64,
    /// Total releases.
    pub released: AtomicU64,
}

/// Pool of reusable [`RequestContext`] values.
pub struct ContextPool {
    idle: Mutex<Vec<Box<RequestContext>>>,
    max_idle: usize,
    metrics: PoolMetrics,
}

impl ContextPool {
    /// Pool retaining at most `max_idle` idle contexts.
    #[must_use]
    pub fn new(max_idle: usize) -> Self {
        ContextPool {
            idle: Mutex::new(Vec::new()),
            max_idle,
            metrics: PoolMetrics::default(),
        }
    }

    /// Pool sized from `TRELLIS_POOL_SIZE`.
    #[must_use]
    pub fn from_env() -> Self {
        ContextPool::new(RuntimeConfig::from_env().pool_size)
    }

    /// Acquire a context bound to the given request. Created → Active.
    pub fn acquire(
        &self,
        method: Method,
        path: &str,
        host: &str,
        query: &str,
    ) -> Box<RequestContext> {
        let recycled = self.idle.lock().ok().and_then(|mut idle| idle.pop());
        let mut ctx = recycled.unwrap_or_else(|| {
            self.metrics.created.fetch_add(1, Ordering::Relaxed);
            Box::new(RequestContext::new())
        });
        ctx.bind(method, path, host, query);
        self.metrics.acquired.fetch_add(1, Ordering::Relaxed);
        ctx
    }

    /// Return a context to the pool. Responded → Released.
    pub fn release(&self, mut ctx: Box<RequestContext>) {
        ctx.reset();
        self.metrics.released.fetch_add(1, Ordering::Relaxed);
        if let Ok(mut idle) = self.idle.lock() {
            if idle.len() < self.max_idle {
                idle.push(ctx);
                return;
            }
        }
        debug!("context dropped: pool at capacity");
    }

    /// (created, acquired, released) counters.
    #[must_use]
    pub fn metrics(&self) -> (u64, u64, u64) {
        (
            self.metrics.created.load(Ordering::Relaxed),
            self.metrics.acquired.load(Ordering::Relaxed),
            self.metrics.released.load(Ordering::Relaxed),
        )
    }
}
