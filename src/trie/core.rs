//! Trie core - hot path for route matching.
//!
//! The following clippy lints are denied to keep allocation discipline in the
//! match path:
//!
//! - `clippy::inefficient_to_string` - Catches unnecessary allocations
//! - `clippy::format_push_string` - Prevents format! string building

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use http::Method;
use regex::Regex;
use smallvec::SmallVec;
use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

use crate::error::ConfigError;
use crate::handler::HandlerChain;

/// Maximum number of bound path parameters before heap allocation.
/// Most REST APIs bind ≤4 params per route; 8 covers deep nesting without
/// touching the heap in the match path.
pub const MAX_INLINE_PARAMS: usize = 8;

/// Stack-allocated parameter storage for the hot path.
///
/// Param names use `Arc<str>` because they come from the static route tree
/// (known at startup) and `Arc::clone()` is an O(1) atomic increment. Values
/// remain `String` as they are per-request data from the URL.
pub type ParamVec = SmallVec<[(Arc<str>, String); MAX_INLINE_PARAMS]>;

/// One pattern segment after classification.
enum Segment {
    /// Exact-match segment (includes the empty root/trailing-slash segment
    /// and escaped `::name` literals).
    Literal(String),
    /// `:name`, one path segment, bound to `name`.
    Param { name: String },
    /// `:name(regex)`, one path segment, constrained by a compiled regex.
    Constrained { name: String, regex: Regex },
    /// `:name*`, the rest of the path, joined by `/`. Must be last.
    Wildcard { name: String },
}

fn valid_param_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(['(', ')', '*', ':', '/'])
}

/// Classify one raw pattern segment.
fn parse_segment(pattern: &str, raw: &str) -> Result<Segment, ConfigError> {
    if raw.is_empty() {
        return Ok(Segment::Literal(String::new()));
    }
    if let Some(rest) = raw.strip_prefix("::") {
        // Escaped literal colon: "::name" registers the literal ":name".
        let mut lit = String::with_capacity(rest.len() + 1);
        lit.push(':');
        lit.push_str(rest);
        return Ok(Segment::Literal(lit));
    }
    if let Some(rest) = raw.strip_prefix(':') {
        if let Some(name) = rest.strip_suffix('*') {
            if !valid_param_name(name) {
                return Err(ConfigError::MalformedSegment {
                    pattern: pattern.to_string(),
                    segment: raw.to_string(),
                });
            }
            return Ok(Segment::Wildcard {
                name: name.to_string(),
            });
        }
        if let Some(open) = rest.find('(') {
            let name = &rest[..open];
            if !valid_param_name(name) || !rest.ends_with(')') {
                return Err(ConfigError::MalformedSegment {
                    pattern: pattern.to_string(),
                    segment: raw.to_string(),
                });
            }
            let constraint = &rest[open + 1..rest.len() - 1];
            let regex = Regex::new(constraint).map_err(|source| ConfigError::InvalidRegex {
                pattern: pattern.to_string(),
                source,
            })?;
            return Ok(Segment::Constrained {
                name: name.to_string(),
                regex,
            });
        }
        if !valid_param_name(rest) {
            return Err(ConfigError::MalformedSegment {
                pattern: pattern.to_string(),
                segment: raw.to_string(),
            });
        }
        return Ok(Segment::Param {
            name: rest.to_string(),
        });
    }
    // Leading characters that read like pattern syntax are rejected rather
    // than silently treated as literals.
    if raw.starts_with('*') || raw.starts_with('(') {
        return Err(ConfigError::MalformedSegment {
            pattern: pattern.to_string(),
            segment: raw.to_string(),
        });
    }
    Ok(Segment::Literal(raw.to_string()))
}

/// The named/regex/wildcard child of a node. At most one per node.
struct VaryNode {
    name: Arc<str>,
    regex: Option<Regex>,
    wildcard: bool,
    node: TrieNode,
}

impl VaryNode {
    fn describe(&self) -> String {
        let mut out = String::new();
        out.push(':');
        out.push_str(&self.name);
        if let Some(re) = &self.regex {
            out.push('(');
            out.push_str(re.as_str());
            out.push(')');
        }
        if self.wildcard {
            out.push('*');
        }
        out
    }
}

/// One node of the compiled path trie.
///
/// Invariants: at most one vary child; a `(node, method)` pair holds handlers
/// at most once; `endpoint` is true only if some registered pattern terminates
/// exactly here.
pub struct TrieNode {
    /// Pattern that first created this node (debug/registration label).
    pattern: String,
    /// Exact-match children keyed by segment.
    literals: HashMap<String, TrieNode>,
    /// The single named/regex/wildcard child, if any.
    vary: Option<Box<VaryNode>>,
    /// True if a registered pattern terminates exactly here.
    endpoint: bool,
    /// Handler chains in registration order, keyed by method.
    methods: Vec<(Method, HandlerChain)>,
    /// Derived comma-separated method list for the Allow header.
    allow: String,
}

impl std::fmt::Debug for TrieNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrieNode")
            .field("pattern", &self.pattern)
            .field("literals", &self.literals.keys().collect::<Vec<_>>())
            .field("vary", &self.vary.as_ref().map(|v| v.describe()))
            .field("endpoint", &self.endpoint)
            .field("allow", &self.allow)
            .finish_non_exhaustive()
    }
}

impl TrieNode {
    fn new(pattern: &str) -> Self {
        TrieNode {
            pattern: pattern.to_string(),
            literals: HashMap::new(),
            vary: None,
            endpoint: false,
            methods: Vec::new(),
            allow: String::new(),
        }
    }

    /// Pattern label this node was created under.
    #[must_use]
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// Whether a registered pattern terminates exactly here.
    #[must_use]
    pub fn is_endpoint(&self) -> bool {
        self.endpoint
    }

    /// Comma-separated methods registered at this endpoint, in registration
    /// order. The Allow header value.
    #[must_use]
    pub fn allow(&self) -> &str {
        &self.allow
    }

    /// Attach a handler chain for `method` at this endpoint.
    ///
    /// # Panics
    ///
    /// Panics if the chain is empty or this `(node, method)` pair already
    /// holds handlers. Duplicate registration is a programmer mistake and must
    /// abort route-table construction loudly.
    pub fn handle(&mut self, method: Method, chain: HandlerChain) {
        assert!(
            !chain.is_empty(),
            "empty handler chain for {method} {}",
            self.pattern
        );
        if self.methods.iter().any(|(m, _)| *m == method) {
            panic!(
                "duplicate handler registration for {method} {}",
                self.pattern
            );
        }
        info!(method = %method, pattern = %self.pattern, "route handlers attached");
        if !self.allow.is_empty() {
            self.allow.push_str(", ");
        }
        self.allow.push_str(method.as_str());
        self.methods.push((method, chain));
    }

    /// Handler chain registered for `method`, if any.
    #[must_use]
    pub fn handlers_for(&self, method: &Method) -> Option<&HandlerChain> {
        self.methods
            .iter()
            .find(|(m, _)| m == method)
            .map(|(_, chain)| chain)
    }

    /// Create or reuse the child node for one classified segment.
    fn define_child(
        &mut self,
        pattern: &str,
        segment: Segment,
        ignore_case: bool,
    ) -> Result<&mut TrieNode, ConfigError> {
        match segment {
            Segment::Literal(mut lit) => {
                if ignore_case {
                    lit = lit.to_ascii_lowercase();
                }
                Ok(self
                    .literals
                    .entry(lit)
                    .or_insert_with(|| TrieNode::new(pattern)))
            }
            Segment::Param { name } => self.define_vary(pattern, &name, None, false),
            Segment::Constrained { name, regex } => {
                self.define_vary(pattern, &name, Some(regex), false)
            }
            Segment::Wildcard { name } => self.define_vary(pattern, &name, None, true),
        }
    }

    fn define_vary(
        &mut self,
        pattern: &str,
        name: &str,
        regex: Option<Regex>,
        wildcard: bool,
    ) -> Result<&mut TrieNode, ConfigError> {
        if let Some(existing) = self.vary.as_deref() {
            let same_name = existing.name.as_ref() == name;
            let same_regex = existing.regex.as_ref().map(Regex::as_str)
                == regex.as_ref().map(Regex::as_str);
            if !same_name || !same_regex || existing.wildcard != wildcard {
                let requested = VaryNode {
                    name: Arc::from(name),
                    regex,
                    wildcard,
                    node: TrieNode::new(pattern),
                };
                return Err(ConfigError::VaryConflict {
                    pattern: pattern.to_string(),
                    existing: existing.describe(),
                    requested: requested.describe(),
                });
            }
        } else {
            self.vary = Some(Box::new(VaryNode {
                name: Arc::from(name),
                regex,
                wildcard,
                node: TrieNode::new(pattern),
            }));
        }
        match self.vary.as_deref_mut() {
            Some(vary) => Ok(&mut vary.node),
            None => unreachable!("vary child ensured above"),
        }
    }
}

/// Result of one match attempt against a built trie.
///
/// Created fresh per attempt, never mutated afterward, owned exclusively by
/// the caller of [`PathTrie::match_path`].
pub struct RouteMatch<'t> {
    /// The matched endpoint node, or `None` for not-found.
    pub node: Option<&'t TrieNode>,
    /// Bound parameters in path order; keys are unique per pattern.
    pub params: ParamVec,
    /// A trailing-slash redirect would have matched an endpoint.
    pub tsr: bool,
}

impl RouteMatch<'_> {
    /// Get a bound parameter by name.
    #[inline]
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Prefix tree compiled from route patterns.
///
/// Mutable only during definition. Once all routes are defined the trie is
/// read-only and freely shared read-concurrently across request threads.
pub struct PathTrie {
    root: TrieNode,
    ignore_case: bool,
}

impl PathTrie {
    /// Case-sensitive trie.
    #[must_use]
    pub fn new() -> Self {
        PathTrie::with_options(false)
    }

    /// Trie with explicit case sensitivity. When case-insensitive, literal
    /// segments are folded before insertion and before lookup.
    #[must_use]
    pub fn with_options(ignore_case: bool) -> Self {
        PathTrie {
            root: TrieNode::new(""),
            ignore_case,
        }
    }

    /// Compile `pattern` into the trie, returning its endpoint node.
    ///
    /// Each segment consumes or creates exactly one child node; the final
    /// node is marked as an endpoint. All definition-time conflicts surface
    /// here as [`ConfigError`].
    pub fn define(&mut self, pattern: &str) -> Result<&mut TrieNode, ConfigError> {
        if !pattern.starts_with('/') {
            return Err(ConfigError::MissingLeadingSlash {
                pattern: pattern.to_string(),
            });
        }
        let ignore_case = self.ignore_case;
        if pattern == "/" {
            self.root.endpoint = true;
            if self.root.pattern.is_empty() {
                self.root.pattern = pattern.to_string();
            }
            return Ok(&mut self.root);
        }

        let segments: Vec<&str> = pattern[1..].split('/').collect();
        let last = segments.len() - 1;
        let mut node = &mut self.root;
        let mut wildcard: Option<String> = None;
        for (i, raw) in segments.iter().enumerate() {
            if let Some(name) = wildcard.take() {
                return Err(ConfigError::SegmentAfterWildcard {
                    pattern: pattern.to_string(),
                    name,
                });
            }
            if raw.is_empty() && i != last {
                return Err(ConfigError::EmptySegment {
                    pattern: pattern.to_string(),
                });
            }
            let segment = parse_segment(pattern, raw)?;
            if let Segment::Wildcard { name } = &segment {
                wildcard = Some(name.clone());
            }
            node = node.define_child(pattern, segment, ignore_case)?;
        }
        node.endpoint = true;
        node.pattern = pattern.to_string();
        debug!(pattern = %pattern, "pattern compiled");
        Ok(node)
    }

    /// Match a request path against the trie.
    ///
    /// Walks one segment at a time: exact literal children first, then the
    /// vary child (regex validated, wildcard binds the remaining path and
    /// stops). Traversal that ends on a non-endpoint node is not-found. When
    /// nothing matches, the `tsr` flag reports whether the path with its
    /// trailing slash toggled would have reached an endpoint.
    #[must_use]
    pub fn match_path<'t>(&'t self, path: &str) -> RouteMatch<'t> {
        let mut params = ParamVec::new();
        let node = self.walk(path, Some(&mut params));
        if let Some(node) = node {
            if node.endpoint {
                return RouteMatch {
                    node: Some(node),
                    params,
                    tsr: false,
                };
            }
        }
        let tsr = match toggle_trailing_slash(path) {
            Some(toggled) => self
                .walk(&toggled, None)
                .is_some_and(|node| node.endpoint),
            None => false,
        };
        RouteMatch {
            node: None,
            params: ParamVec::new(),
            tsr,
        }
    }

    fn walk<'t>(&'t self, path: &str, mut params: Option<&mut ParamVec>) -> Option<&'t TrieNode> {
        let trimmed = path.strip_prefix('/').unwrap_or(path);
        if trimmed.is_empty() {
            return Some(&self.root);
        }
        let segments: Vec<&str> = trimmed.split('/').collect();
        let mut node = &self.root;
        for (i, seg) in segments.iter().enumerate() {
            let key: Cow<'_, str> = if self.ignore_case {
                Cow::Owned(seg.to_ascii_lowercase())
            } else {
                Cow::Borrowed(*seg)
            };
            // Literal children always win over the vary child at the same
            // level. This is the only tie-break rule.
            if let Some(child) = node.literals.get(key.as_ref()) {
                node = child;
                continue;
            }
            let vary = node.vary.as_deref()?;
            if vary.wildcard {
                if let Some(p) = params.as_mut() {
                    p.push((Arc::clone(&vary.name), segments[i..].join("/")));
                }
                return Some(&vary.node);
            }
            if let Some(re) = &vary.regex {
                if !re.is_match(seg) {
                    return None;
                }
            }
            if let Some(p) = params.as_mut() {
                p.push((Arc::clone(&vary.name), (*seg).to_string()));
            }
            node = &vary.node;
        }
        Some(node)
    }
}

impl Default for PathTrie {
    fn default() -> Self {
        PathTrie::new()
    }
}

fn toggle_trailing_slash(path: &str) -> Option<String> {
    if path == "/" || path.is_empty() {
        return None;
    }
    if let Some(stripped) = path.strip_suffix('/') {
        Some(stripped.to_string())
    } else {
        let mut toggled = String::with_capacity(path.len() + 1);
        toggled.push_str(path);
        toggled.push('/');
        Some(toggled)
    }
}
