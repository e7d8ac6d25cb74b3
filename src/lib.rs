//! # Trellis
//!
//! **Trellis** is a coroutine-friendly request-dispatch core for Rust HTTP
//! services: a compiled path trie, a pooled per-request context with an
//! exactly-once completion protocol, and a panic-recovering dispatcher.
//!
//! ## Overview
//!
//! Trellis owns the middle of a service: everything between "a request line
//! has been parsed" and "a status, headers, and body are ready to write".
//! Transport (socket accept loops, TLS, HTTP parsing) stays outside; handlers
//! receive a mutable [`RequestContext`](context::RequestContext) and drive it
//! to exactly one committed response, no matter what goes wrong on the way.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`trie`]** - Compiled path-matching prefix tree (`/users/:id`,
//!   `/files/:rest*`, regex-constrained segments)
//! - **[`router`]** - Method + pattern registration, mount roots, and the
//!   not-found / method-not-allowed / automatic-OPTIONS outcomes
//! - **[`context`]** - Pooled per-request state, after/end hooks, and the
//!   exactly-once response finalization guard
//! - **[`dispatcher`]** - The outer per-request loop: middleware chain, panic
//!   recovery, deadline watchdog, single error translation step
//! - **[`handler`]** - The [`Handler`](handler::Handler) trait every chain
//!   link implements (closures included)
//! - **[`cancel`]** - Cooperative cancellation tokens and bounded-time racing
//!   on the `may` runtime
//! - **[`error`]** - The construction-time and dispatch-time error taxonomy
//! - **[`runtime_config`]** - `TRELLIS_*` environment configuration
//!
//! ## Request Handling Flow
//!
//! ```text
//! transport ──▶ Dispatcher::serve
//!                 │  acquire pooled RequestContext, arm deadline watchdog
//!                 ▼
//!               middleware chain (each link panic-guarded)
//!                 │  Router link: trie match, bind params, route chain
//!                 ▼
//!               finalize: after-hooks (LIFO) ▸ header commit ▸ end-hooks (LIFO)
//!                 │  errors funnel through one error translation step
//!                 ▼
//!               CommittedResponse ──▶ transport, context back to pool
//! ```
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use trellis::{Dispatcher, RequestContext, Router};
//!
//! let mut router = Router::new("/");
//! router.get(
//!     "/users/:id",
//!     Arc::new(|ctx: &mut RequestContext| {
//!         let body = format!("user {}", ctx.param("id").unwrap_or("?"));
//!         ctx.end(200, Some(body.as_bytes()));
//!         Ok(())
//!     }),
//! );
//!
//! let mut dispatcher = Dispatcher::new();
//! dispatcher.add_middleware(Arc::new(router));
//!
//! let response = dispatcher.serve(http::Method::GET, "/users/42", "", "");
//! assert_eq!(response.status, 200);
//! assert_eq!(response.body, b"user 42");
//! ```

pub mod cancel;
pub mod context;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod ids;
pub mod router;
pub mod runtime_config;
pub mod trie;

pub use cancel::CancelToken;
pub use context::{CommittedResponse, ContextPool, RequestContext, ResponseState};
pub use dispatcher::Dispatcher;
pub use error::{ConfigError, DispatchError};
pub use handler::{Handler, HandlerChain, HandlerFn};
pub use ids::RequestId;
pub use router::{Router, RouterOptions};
pub use trie::{PathTrie, RouteMatch};
