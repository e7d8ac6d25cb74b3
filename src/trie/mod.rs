//! # Trie Module
//!
//! Compiled path-matching prefix tree for route patterns.
//!
//! ## Overview
//!
//! The trie is responsible for:
//! - Compiling route patterns (`/users/:id`, `/files/:rest*`,
//!   `/api/:id(^\d+$)`, `/::literal-colon`) into a prefix tree at startup
//! - Matching incoming request paths against that tree one segment at a time
//! - Binding named parameters from matched segments
//! - Reporting whether a trailing-slash variant of a missed path would have
//!   matched (the soft-redirect signal)
//!
//! ## Architecture
//!
//! Two phases, strictly separated:
//!
//! 1. **Definition**: `define()` splits a pattern on `/`, classifies each
//!    segment, and creates or reuses exactly one child node per segment. All
//!    pattern conflicts (double slash, segment after wildcard, vary-child
//!    redefinition, duplicate method registration) surface here, never at
//!    request time.
//!
//! 2. **Matching**: `match_path()` walks the tree read-only. Literal children
//!    always win over the vary child at the same level; this is the only
//!    tie-break rule and it is independent of registration order. Once
//!    definitions are complete the trie is freely shared across request
//!    threads with no locking.

mod core;

pub use core::{ParamVec, PathTrie, RouteMatch, TrieNode, MAX_INLINE_PARAMS};
