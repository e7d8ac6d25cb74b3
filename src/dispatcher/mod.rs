//! # Dispatcher Module
//!
//! The outer per-request loop.
//!
//! ## Overview
//!
//! The dispatcher is responsible for:
//! - Pulling a pooled [`RequestContext`](crate::context::RequestContext) and
//!   returning it after the response is committed
//! - Running the top-level middleware chain in order (routers are typically
//!   links of this chain)
//! - Recovering handler panics at the chain boundary and converting them into
//!   internal errors carrying a pruned call stack
//! - Funnelling every error through a single error→response translation step
//! - Arming the deadline watchdog and surfacing cancellation as a distinct
//!   timeout outcome
//!
//! Every dispatch produces a well-formed response: even a double fault
//! degrades to a fixed default status rather than hanging the connection.

mod core;

pub use core::Dispatcher;
