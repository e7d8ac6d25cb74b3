//! Dispatcher core - hot path for request dispatch.
//!
//! The following clippy lints are denied to keep allocation discipline in the
//! dispatch path (error handling is off the fast path and may allocate):
//!
//! - `clippy::inefficient_to_string` - Catches unnecessary allocations
//! - `clippy::format_push_string` - Prevents format! string building

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::unnecessary_to_owned)]

use http::Method;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::time::{Duration, Instant};
use tracing::{debug, error, info};

use crate::cancel;
use crate::context::{CommittedResponse, ContextPool, RequestContext};
use crate::error::DispatchError;
use crate::handler::HandlerFn;
use crate::runtime_config::RuntimeConfig;

/// Runs the top-level middleware chain over pooled request contexts.
///
/// Chain order is registration order; a router is typically one link. The
/// dispatcher guarantees exactly one committed response per dispatch, whatever
/// the chain does: success, error, panic, cancellation, or nothing at all.
pub struct Dispatcher {
    middlewares: Vec<HandlerFn>,
    pool: ContextPool,
    timeout: Option<Duration>,
}

impl Dispatcher {
    /// Empty dispatcher with an environment-sized context pool and no
    /// deadline.
    #[must_use]
    pub fn new() -> Self {
        Dispatcher {
            middlewares: Vec::new(),
            pool: ContextPool::from_env(),
            timeout: None,
        }
    }

    /// Dispatcher configured from `TRELLIS_*` environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let config = RuntimeConfig::from_env();
        Dispatcher {
            middlewares: Vec::new(),
            pool: ContextPool::new(config.pool_size),
            timeout: config.timeout_ms.map(Duration::from_millis),
        }
    }

    /// Append a top-level middleware. Executed in registration order, always
    /// before any router it delegates to.
    pub fn add_middleware(&mut self, mw: HandlerFn) {
        self.middlewares.push(mw);
    }

    /// Request-wide deadline. When it elapses the request's cancel token
    /// fires and the dispatch surfaces a 504.
    pub fn set_timeout(&mut self, timeout: Option<Duration>) {
        self.timeout = timeout;
    }

    /// Pool counters: (created, acquired, released).
    #[must_use]
    pub fn pool_metrics(&self) -> (u64, u64, u64) {
        self.pool.metrics()
    }

    /// Full per-request outer loop: acquire a pooled context, dispatch, and
    /// release, returning the committed response for transport glue.
    pub fn serve(
        &self,
        method: Method,
        path: &str,
        host: &str,
        query: &str,
    ) -> CommittedResponse {
        let mut ctx = self.pool.acquire(method, path, host, query);
        self.dispatch(&mut ctx);
        let committed = ctx.response.take_committed();
        self.pool.release(ctx);
        committed
    }

    /// Run the chain over an already-bound context, guaranteeing a committed
    /// response on return.
    pub fn dispatch(&self, ctx: &mut RequestContext) {
        let start = Instant::now();
        let request_id = ctx.request_id();
        info!(
            request_id = %request_id,
            method = %ctx.method(),
            path = %ctx.path(),
            "request dispatched"
        );

        let _watchdog = self
            .timeout
            .map(|dur| cancel::deadline(ctx.cancel_token().clone(), dur));

        match self.run_chain(ctx) {
            Ok(()) => {
                if !ctx.is_ended() {
                    // The chain finished without finalizing. A cancellation
                    // that fired mid-chain still wins here; otherwise commit
                    // whatever the handlers left behind.
                    match ctx.cancel_token().reason() {
                        Some(reason) => self.fail(ctx, &reason),
                        None => ctx.end_default(),
                    }
                }
            }
            Err(err) => self.fail(ctx, &err),
        }

        if !ctx.response.header_written() {
            // Double fault: a panic inside finalization leaves the commit
            // claimed but the header unwritten. Nobody else holds the context
            // here, so emit the default rather than hang the connection.
            ctx.response.force_commit_header();
        }

        info!(
            request_id = %request_id,
            status = ctx.response.status(),
            latency_ms = start.elapsed().as_millis() as u64,
            "request finalized"
        );
    }

    fn run_chain(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        for (idx, mw) in self.middlewares.iter().enumerate() {
            if ctx.is_ended() {
                debug!(middleware_idx = idx, "chain stopped: context ended");
                return Ok(());
            }
            if let Some(reason) = ctx.cancel_token().reason() {
                return Err(reason);
            }
            let outcome = catch_unwind(AssertUnwindSafe(|| mw.call(ctx)));
            match outcome {
                Ok(result) => result?,
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    let backtrace =
                        prune_backtrace(&std::backtrace::Backtrace::capture().to_string());
                    error!(
                        request_id = %ctx.request_id(),
                        middleware_idx = idx,
                        panic_message = %message,
                        "handler panicked"
                    );
                    return Err(DispatchError::PanicRecovered { message, backtrace });
                }
            }
        }
        Ok(())
    }

    /// The single error→response translation step. Always runs, even when the
    /// triggering condition was cancellation; a fault during finalization
    /// still leaves a committed response behind.
    fn fail(&self, ctx: &mut RequestContext, err: &DispatchError) {
        debug!(
            request_id = %ctx.request_id(),
            status = err.status(),
            error = %err,
            "error translated to response"
        );
        ctx.error(err);
    }
}

impl Default for Dispatcher {
    fn default() -> Self {
        Dispatcher::new()
    }
}

/// Render a panic payload as text.
fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Drop runtime and unwind machinery frames from a captured backtrace,
/// keeping the frames a handler author can act on.
fn prune_backtrace(raw: &str) -> String {
    let noise = [
        "core::panicking",
        "std::panicking",
        "rust_begin_unwind",
        "__rust_",
        "std::panic::catch_unwind",
        "std::sys::backtrace",
        "std::backtrace",
        "panic_unwind",
    ];
    raw.lines()
        .filter(|line| !noise.iter().any(|frame| line.contains(frame)))
        .collect::<Vec<_>>()
        .join("\n")
}
