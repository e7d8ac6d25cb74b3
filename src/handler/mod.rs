//! # Handler Module
//!
//! The single capability every link of a request chain implements: take a
//! mutable request context, do some work, succeed or return a
//! [`DispatchError`](crate::error::DispatchError).
//!
//! Top-level middleware, router-scoped middleware, route handlers, and the
//! `Router` itself are all `Handler`s, so the dispatcher composes them into
//! one ordered chain without knowing which is which. Route tables store
//! ordered `Arc<dyn Handler>` collections; there is no process-wide handler
//! registry.

mod core;

pub use core::{Handler, HandlerChain, HandlerFn};
