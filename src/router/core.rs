//! Router core - hot path for request routing.
//!
//! The following clippy lints are denied to keep allocation discipline in the
//! dispatch path:
//!
//! - `clippy::inefficient_to_string` - Catches unnecessary allocations
//! - `clippy::format_push_string` - Prevents format! string building

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use http::Method;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::context::RequestContext;
use crate::error::DispatchError;
use crate::handler::{Handler, HandlerChain, HandlerFn};
use crate::trie::PathTrie;

/// Construction options for a [`Router`].
#[derive(Debug, Clone, Copy)]
pub struct RouterOptions {
    /// Fold literal path segments before insertion and lookup.
    pub ignore_case: bool,
    /// Answer unregistered `OPTIONS` requests with 204 + Allow.
    pub auto_options: bool,
    /// Answer near-misses whose trailing-slash variant matches with a 307
    /// redirect instead of not-found. Off by default.
    pub redirect_trailing_slash: bool,
    /// Auto-finalize the response after a successful chain when nobody ended
    /// the context explicitly.
    pub terminal: bool,
}

impl Default for RouterOptions {
    fn default() -> Self {
        RouterOptions {
            ignore_case: false,
            auto_options: true,
            redirect_trailing_slash: false,
            terminal: true,
        }
    }
}

/// Registers method + pattern + handler-chain tuples and dispatches matched
/// requests.
///
/// Owns one [`PathTrie`] under a mount-root prefix. All registration is fatal
/// on conflict; after construction the router is read-only and shared freely
/// across request threads.
pub struct Router {
    root: String,
    middleware: Vec<HandlerFn>,
    otherwise: Option<HandlerFn>,
    trie: PathTrie,
    options: RouterOptions,
}

impl Router {
    /// Router mounted at `root` with default options.
    #[must_use]
    pub fn new(root: &str) -> Self {
        Router::with_options(root, RouterOptions::default())
    }

    /// Router mounted at `root` with explicit options.
    #[must_use]
    pub fn with_options(root: &str, options: RouterOptions) -> Self {
        let mut normalized = String::with_capacity(root.len() + 1);
        if !root.starts_with('/') {
            normalized.push('/');
        }
        normalized.push_str(root);
        while normalized.len() > 1 && normalized.ends_with('/') {
            normalized.pop();
        }
        Router {
            root: normalized,
            middleware: Vec::new(),
            otherwise: None,
            trie: PathTrie::with_options(options.ignore_case),
            options,
        }
    }

    /// Mount-root prefix this router answers under.
    #[must_use]
    pub fn root(&self) -> &str {
        &self.root
    }

    /// Append a router-scoped middleware. Runs in registration order before
    /// the matched route chain.
    pub fn add_middleware(&mut self, mw: HandlerFn) {
        self.middleware.push(mw);
    }

    /// Fallback handler for unmatched paths and unsupported methods.
    pub fn otherwise(&mut self, handler: HandlerFn) {
        self.otherwise = Some(handler);
    }

    /// Register a handler chain for `method` at `pattern`.
    ///
    /// # Panics
    ///
    /// Panics on an empty chain, a malformed or conflicting pattern, or a
    /// duplicate `(pattern, method)` registration. Route-table construction
    /// errors are fatal at startup, never deferred to request time.
    pub fn handle(&mut self, method: Method, pattern: &str, chain: HandlerChain) {
        assert!(
            !chain.is_empty(),
            "empty handler chain for {method} {pattern}"
        );
        let node = match self.trie.define(pattern) {
            Ok(node) => node,
            Err(err) => panic!("route definition error: {err}"),
        };
        node.handle(method, chain);
    }

    /// Register a single handler for `GET pattern`.
    pub fn get(&mut self, pattern: &str, handler: HandlerFn) {
        self.handle(Method::GET, pattern, vec![handler]);
    }

    /// Register a single handler for `HEAD pattern`.
    pub fn head(&mut self, pattern: &str, handler: HandlerFn) {
        self.handle(Method::HEAD, pattern, vec![handler]);
    }

    /// Register a single handler for `POST pattern`.
    pub fn post(&mut self, pattern: &str, handler: HandlerFn) {
        self.handle(Method::POST, pattern, vec![handler]);
    }

    /// Register a single handler for `PUT pattern`.
    pub fn put(&mut self, pattern: &str, handler: HandlerFn) {
        self.handle(Method::PUT, pattern, vec![handler]);
    }

    /// Register a single handler for `PATCH pattern`.
    pub fn patch(&mut self, pattern: &str, handler: HandlerFn) {
        self.handle(Method::PATCH, pattern, vec![handler]);
    }

    /// Register a single handler for `DELETE pattern`.
    pub fn delete(&mut self, pattern: &str, handler: HandlerFn) {
        self.handle(Method::DELETE, pattern, vec![handler]);
    }

    /// Register a single handler for `OPTIONS pattern`, overriding the
    /// automatic OPTIONS response for that endpoint.
    pub fn options(&mut self, pattern: &str, handler: HandlerFn) {
        self.handle(Method::OPTIONS, pattern, vec![handler]);
    }

    /// Register a single handler for every common method at `pattern`.
    pub fn any(&mut self, pattern: &str, handler: HandlerFn) {
        for method in [
            Method::GET,
            Method::HEAD,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
            Method::OPTIONS,
        ] {
            self.handle(method, pattern, vec![Arc::clone(&handler)]);
        }
    }

    /// Dispatch one request.
    ///
    /// Declines (returns `Ok` without touching the context) when the path is
    /// outside the mount root, so a containing dispatcher can try the next
    /// router.
    pub fn serve(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        let path = ctx.path().to_string();
        let Some(remainder) = self.strip_root(&path) else {
            debug!(root = %self.root, path = %path, "router declined");
            return Ok(());
        };

        debug!(root = %self.root, path = %remainder, "route match attempt");
        let matched = self.trie.match_path(remainder);

        let Some(node) = matched.node else {
            if self.options.redirect_trailing_slash
                && matched.tsr
                && !ctx.response.header_written()
            {
                let location = toggle_trailing_slash(&path);
                debug!(location = %location, "trailing-slash redirect");
                ctx.response.set_header("Location", location);
                ctx.end(307, None);
                return Ok(());
            }
            if let Some(otherwise) = &self.otherwise {
                return otherwise.call(ctx);
            }
            warn!(path = %path, "no route matched");
            ctx.response.set_status(501);
            return Err(DispatchError::RouteNotFound { path });
        };

        let Some(chain) = node.handlers_for(ctx.method()) else {
            if *ctx.method() == Method::OPTIONS && self.options.auto_options {
                // Short-circuit: bypasses scoped middleware and route chain.
                ctx.response.set_header("Allow", node.allow().to_string());
                ctx.end(204, None);
                return Ok(());
            }
            if let Some(otherwise) = &self.otherwise {
                return otherwise.call(ctx);
            }
            warn!(
                method = %ctx.method(),
                pattern = %node.pattern(),
                allow = %node.allow(),
                "method not allowed"
            );
            ctx.response.set_status(405);
            ctx.response.set_header("Allow", node.allow().to_string());
            return Err(DispatchError::MethodNotAllowed {
                method: ctx.method().clone(),
                allow: node.allow().to_string(),
            });
        };

        debug!(
            method = %ctx.method(),
            pattern = %node.pattern(),
            params = ?matched.params,
            "route matched"
        );
        ctx.bind_params(matched.params);

        for mw in &self.middleware {
            if ctx.is_ended() {
                return Ok(());
            }
            mw.call(ctx)?;
        }
        for handler in chain {
            if ctx.is_ended() {
                return Ok(());
            }
            handler.call(ctx)?;
        }
        if self.options.terminal && !ctx.is_ended() {
            ctx.end_default();
        }
        Ok(())
    }

    /// Path remainder after the mount root, or `None` when the router should
    /// decline. Matching respects segment boundaries: a router at `/api`
    /// answers `/api` and `/api/...`, never `/apix`.
    fn strip_root<'p>(&self, path: &'p str) -> Option<&'p str> {
        if self.root == "/" {
            return Some(path);
        }
        let rest = path.strip_prefix(self.root.as_str())?;
        if rest.is_empty() {
            return Some("/");
        }
        rest.starts_with('/').then_some(rest)
    }
}

impl Handler for Router {
    fn call(&self, ctx: &mut RequestContext) -> Result<(), DispatchError> {
        self.serve(ctx)
    }
}

fn toggle_trailing_slash(path: &str) -> String {
    match path.strip_suffix('/') {
        Some(stripped) if !stripped.is_empty() => stripped.to_string(),
        _ => {
            let mut toggled = String::with_capacity(path.len() + 1);
            toggled.push_str(path);
            toggled.push('/');
            toggled
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ok_handler(marker: &'static str) -> HandlerFn {
        Arc::new(move |ctx: &mut RequestContext| {
            ctx.set(marker, true);
            ctx.end(200, Some(marker.as_bytes()));
            Ok(())
        })
    }

    fn serve(router: &Router, method: Method, path: &str) -> RequestContext {
        let mut ctx = RequestContext::new();
        ctx.bind(method, path, "", "");
        let result = router.serve(&mut ctx);
        if let Err(err) = result {
            ctx.error(&err);
        }
        ctx
    }

    #[test]
    fn test_mount_root_boundary() {
        let mut router = Router::new("/api");
        router.get("/users", ok_handler("users"));

        let ctx = serve(&router, Method::GET, "/api/users");
        assert_eq!(ctx.response.status(), 200);

        // Outside the mount root: declined, untouched.
        let ctx = serve(&router, Method::GET, "/apix/users");
        assert!(!ctx.is_ended());
        assert_eq!(ctx.response.status(), 0);
    }

    #[test]
    fn test_not_found_is_501() {
        let router = Router::new("/");
        let ctx = serve(&router, Method::GET, "/missing");
        assert_eq!(ctx.response.status(), 501);
    }

    #[test]
    fn test_otherwise_handles_not_found() {
        let mut router = Router::new("/");
        router.otherwise(Arc::new(|ctx: &mut RequestContext| {
            ctx.end(404, Some(b"custom not found"));
            Ok(())
        }));
        let ctx = serve(&router, Method::GET, "/missing");
        assert_eq!(ctx.response.status(), 404);
    }

    #[test]
    fn test_scoped_middleware_runs_before_route_chain() {
        let mut router = Router::new("/");
        router.add_middleware(Arc::new(|ctx: &mut RequestContext| {
            ctx.set("order", vec!["mw".to_string()]);
            Ok(())
        }));
        router.get(
            "/x",
            Arc::new(|ctx: &mut RequestContext| {
                let seen = ctx.get::<Vec<String>>("order").cloned();
                assert_eq!(seen.as_deref(), Some(&["mw".to_string()][..]));
                ctx.end(200, None);
                Ok(())
            }),
        );
        let ctx = serve(&router, Method::GET, "/x");
        assert_eq!(ctx.response.status(), 200);
    }

    #[test]
    fn test_middleware_error_stops_chain() {
        let mut router = Router::new("/");
        router.add_middleware(Arc::new(|_: &mut RequestContext| {
            Err(DispatchError::http(403, "denied"))
        }));
        router.get("/x", ok_handler("never"));
        let ctx = serve(&router, Method::GET, "/x");
        assert_eq!(ctx.response.status(), 403);
        assert_eq!(ctx.get::<bool>("never"), None);
    }

    #[test]
    fn test_terminal_router_auto_finalizes() {
        let mut router = Router::new("/");
        router.get(
            "/quiet",
            Arc::new(|ctx: &mut RequestContext| {
                ctx.response.set_status(202);
                ctx.response.write(b"accepted");
                Ok(())
            }),
        );
        let ctx = serve(&router, Method::GET, "/quiet");
        assert!(ctx.is_ended());
        assert_eq!(ctx.response.status(), 202);
    }

    #[test]
    fn test_trailing_slash_redirect_when_enabled() {
        let mut router = Router::with_options(
            "/",
            RouterOptions {
                redirect_trailing_slash: true,
                ..RouterOptions::default()
            },
        );
        router.get("/docs", ok_handler("docs"));

        let ctx = serve(&router, Method::GET, "/docs/");
        assert_eq!(ctx.response.status(), 307);
        assert_eq!(ctx.response.get_header("Location"), Some("/docs"));
    }

    #[test]
    fn test_params_bound_into_context() {
        let mut router = Router::new("/");
        router.get(
            "/users/:id",
            Arc::new(|ctx: &mut RequestContext| {
                let id = ctx.param("id").unwrap_or("").to_string();
                ctx.end(200, Some(id.as_bytes()));
                Ok(())
            }),
        );
        let ctx = serve(&router, Method::GET, "/users/abc123");
        assert_eq!(ctx.response.status(), 200);
    }
}
