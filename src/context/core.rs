//! Request context core - per-request mutable state and the finalization
//! state machine.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]

use http::Method;
use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

use super::response::ResponseState;
use crate::cancel::CancelToken;
use crate::error::DispatchError;
use crate::ids::RequestId;
use crate::trie::ParamVec;

/// A teardown callback registered on a context.
///
/// After-hooks run once, before the header commit, only on the
/// normal-completion path. End-hooks run once, after the header commit,
/// unconditionally. Both lists execute last-registered-first (LIFO).
pub type Hook = Box<dyn FnOnce(&mut RequestContext) + Send>;

/// Per-request mutable state: request metadata, bound parameters, a typed
/// key/value store, hook lists, and the response.
///
/// Contexts are pooled and reused across many requests. Ownership is
/// exclusive to the thread running the current request; the pool reset is the
/// only boundary that clears state.
pub struct RequestContext {
    request_id: RequestId,
    method: Method,
    path: String,
    host: String,
    query_raw: String,
    query: Option<HashMap<String, String>>,
    store: HashMap<String, Box<dyn Any + Send>>,
    params: ParamVec,
    after_hooks: Vec<Hook>,
    end_hooks: Vec<Hook>,
    ended: AtomicBool,
    cancel: CancelToken,
    /// Response under construction. Mutation stops at the header commit.
    pub response: ResponseState,
}

impl RequestContext {
    /// Unbound context (pool shape). Call [`bind`](Self::bind) before use.
    #[must_use]
    pub fn new() -> Self {
        RequestContext {
            request_id: RequestId::new(),
            method: Method::GET,
            path: String::from("/"),
            host: String::new(),
            query_raw: String::new(),
            query: None,
            store: HashMap::new(),
            params: ParamVec::new(),
            after_hooks: Vec::new(),
            end_hooks: Vec::new(),
            ended: AtomicBool::new(false),
            cancel: CancelToken::new(),
            response: ResponseState::new(),
        }
    }

    /// Reset and bind to a new request. Created → Active.
    pub fn bind(&mut self, method: Method, path: &str, host: &str, query: &str) {
        self.reset();
        self.method = method;
        if path.starts_with('/') {
            self.path.push_str(path);
        } else {
            self.path.push('/');
            self.path.push_str(path);
        }
        self.host.push_str(host);
        self.query_raw.push_str(query);
    }

    /// Clear every per-request field back to the pooled shape.
    pub fn reset(&mut self) {
        self.request_id = RequestId::new();
        self.method = Method::GET;
        self.path.clear();
        self.host.clear();
        self.query_raw.clear();
        self.query = None;
        self.store.clear();
        self.params.clear();
        self.after_hooks.clear();
        self.end_hooks.clear();
        self.ended = AtomicBool::new(false);
        // Fresh token: watchdogs from the previous request must not cancel
        // the next one.
        self.cancel = CancelToken::new();
        self.response.reset();
    }

    /// Correlation id for this request's log lines.
    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Normalized request path (always starts with `/`).
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn host(&self) -> &str {
        &self.host
    }

    /// Query parameter by name, parsing the raw query string on first access.
    /// Duplicate keys keep the last occurrence.
    pub fn query(&mut self, name: &str) -> Option<&str> {
        if self.query.is_none() {
            let parsed: HashMap<String, String> = url::form_urlencoded::parse(
                self.query_raw.as_bytes(),
            )
            .into_owned()
            .collect();
            self.query = Some(parsed);
        }
        self.query
            .as_ref()
            .and_then(|map| map.get(name))
            .map(String::as_str)
    }

    /// Bound path parameter from the last successful route match.
    ///
    /// Last-write-wins when the same name was bound at different depths.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .rfind(|(k, _)| k.as_ref() == name)
            .map(|(_, v)| v.as_str())
    }

    /// Replace the bound parameter map (router match → context).
    pub fn bind_params(&mut self, params: ParamVec) {
        self.params = params;
    }

    /// Store a request-scoped value under `key`.
    pub fn set<T: Send + 'static>(&mut self, key: &str, value: T) {
        self.store.insert(key.to_string(), Box::new(value));
    }

    /// Fetch a request-scoped value of type `T` stored under `key`.
    #[must_use]
    pub fn get<T: 'static>(&self, key: &str) -> Option<&T> {
        self.store.get(key).and_then(|v| v.downcast_ref::<T>())
    }

    /// Cancellation scope of this request.
    #[must_use]
    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    /// Rebase this request's cancellation scope onto a parent scope.
    pub fn derive_cancel_from(&mut self, parent: &CancelToken) {
        self.cancel = parent.child();
    }

    /// Whether finalization has been requested (Ended or later).
    #[must_use]
    pub fn is_ended(&self) -> bool {
        self.ended.load(Ordering::Acquire)
    }

    /// Register an after-hook: runs once before the header commit, on the
    /// normal-completion path only. LIFO order.
    ///
    /// # Panics
    ///
    /// Panics if the context has already ended: the hook would never run,
    /// which is a programmer error.
    pub fn after<F>(&mut self, hook: F)
    where
        F: FnOnce(&mut RequestContext) + Send + 'static,
    {
        assert!(
            !self.is_ended(),
            "after-hook registered on an ended context"
        );
        self.after_hooks.push(Box::new(hook));
    }

    /// Register an end-hook: runs once after the header commit,
    /// unconditionally (success or failure). LIFO order.
    ///
    /// # Panics
    ///
    /// Panics if the context has already ended.
    pub fn on_end<F>(&mut self, hook: F)
    where
        F: FnOnce(&mut RequestContext) + Send + 'static,
    {
        assert!(!self.is_ended(), "end-hook registered on an ended context");
        self.end_hooks.push(Box::new(hook));
    }

    /// Finalize with an explicit status and optional body. Active → Ended.
    ///
    /// The first finalize trigger wins; later calls still adjust status/body
    /// while the header is uncommitted, then observe the guard and return.
    pub fn end(&mut self, status: u16, body: Option<&[u8]>) {
        if !self.response.header_written() {
            if status != 0 {
                self.response.set_status(status);
            }
            if let Some(bytes) = body {
                self.response.write(bytes);
            }
        }
        self.finalize(false);
    }

    /// Finalize with whatever status/body the handlers left behind.
    pub fn end_default(&mut self) {
        self.finalize(false);
    }

    /// Finalize through the error path: render `err` as the response and
    /// discard pending after-hooks. End-hooks still run.
    pub fn error(&mut self, err: &DispatchError) {
        if !self.response.header_written() {
            self.response.set_status(err.status());
            self.response
                .set_header("Content-Type", "application/json".to_string());
            let body = serde_json::json!({ "error": err.to_string() });
            let rendered = serde_json::to_vec(&body)
                .unwrap_or_else(|_| b"{\"error\":\"internal error\"}".to_vec());
            self.response.set_body(rendered);
        }
        self.finalize(true);
    }

    /// The Ended → Responded transition. Exactly one caller performs the
    /// commit sequence; everyone else observes the guard and returns.
    fn finalize(&mut self, discard_after: bool) {
        self.ended.store(true, Ordering::Release);
        if !self.response.try_respond() {
            return;
        }
        if discard_after {
            // After-hooks are a contract for the normal-completion path only.
            self.after_hooks.clear();
        } else {
            let hooks = std::mem::take(&mut self.after_hooks);
            for hook in hooks.into_iter().rev() {
                hook(self);
            }
        }
        self.response.commit_header();
        let hooks = std::mem::take(&mut self.end_hooks);
        for hook in hooks.into_iter().rev() {
            hook(self);
        }
        debug!(
            request_id = %self.request_id,
            status = self.response.status(),
            "request finalized"
        );
    }
}

impl Default for RequestContext {
    fn default() -> Self {
        RequestContext::new()
    }
}
