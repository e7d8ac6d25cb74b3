//! # Router Module
//!
//! Method + pattern registration and request dispatch over one compiled
//! [`PathTrie`](crate::trie::PathTrie).
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Registering method + pattern + handler-chain tuples (fatal on any
//!   definition-time conflict)
//! - Matching incoming requests against the trie and binding parameters
//! - The not-found / method-not-allowed / automatic-OPTIONS outcomes
//! - Running router-scoped middleware before the matched route chain
//!
//! A `Router` is itself a [`Handler`](crate::handler::Handler): it declines
//! requests outside its mount root by returning without error, so several
//! routers stack as links of one dispatcher chain.

mod core;

pub use core::{Router, RouterOptions};
