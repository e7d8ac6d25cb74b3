//! # Context Module
//!
//! Per-request mutable state and the completion protocol.
//!
//! ## Overview
//!
//! A [`RequestContext`] carries everything one request accumulates: metadata,
//! bound path parameters, a typed key/value store, two ordered hook lists,
//! and the [`ResponseState`] under construction. Contexts are pooled
//! ([`ContextPool`]) and reset at both acquisition and release.
//!
//! ## Lifecycle
//!
//! ```text
//! Created ──bind──▶ Active ──finalize──▶ Ended ──commit──▶ Responded ──release──▶ Created
//! ```
//!
//! The first finalize trigger wins, whether that is an explicit end, a handler error,
//! cancellation, or a recovered panic. After-hooks run LIFO before the header
//! commit on the normal path only; end-hooks run LIFO after the commit,
//! unconditionally. The header commit itself is guarded by a first-writer-wins
//! atomic, safe under true concurrent access through [`ResponseCommit`]
//! handles.

mod core;
mod pool;
mod response;

pub use core::{Hook, RequestContext};
pub use pool::{ContextPool, PoolMetrics};
pub use response::{
    status_reason, CommittedResponse, HeaderVec, ResponseCommit, ResponseState,
    MAX_INLINE_HEADERS,
};
