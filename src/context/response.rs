//! Response state and the exactly-once finalization guard.

use smallvec::SmallVec;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Maximum inline headers before heap allocation.
/// Most responses carry ≤16 headers.
pub const MAX_INLINE_HEADERS: usize = 16;

/// Stack-allocated header storage for the hot path.
///
/// Header names use `Arc<str>` because names repeat heavily (Content-Type,
/// Allow, ...) and `Arc::clone()` is an O(1) atomic increment; values remain
/// `String` as per-response data.
pub type HeaderVec = SmallVec<[(Arc<str>, String); MAX_INLINE_HEADERS]>;

/// Reason phrase for the status line.
pub fn status_reason(status: u16) -> &'static str {
    match status {
        200 => "OK",
        201 => "Created",
        204 => "No Content",
        307 => "Temporary Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        404 => "Not Found",
        405 => "Method Not Allowed",
        444 => "No Response",
        499 => "Client Closed Request",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        _ => "OK",
    }
}

/// Cloneable handle to the finalization guard of one response.
///
/// Handed to watchdogs or hook-spawned coroutines that may race the normal
/// completion path. Any number of holders may call [`try_acquire`]
/// concurrently; exactly one wins, the rest observe that the response is
/// already being committed and back off.
///
/// [`try_acquire`]: ResponseCommit::try_acquire
#[derive(Clone)]
pub struct ResponseCommit {
    responded: Arc<AtomicBool>,
    header_written: Arc<AtomicBool>,
}

impl ResponseCommit {
    /// First-writer-wins claim on the commit sequence.
    #[must_use]
    pub fn try_acquire(&self) -> bool {
        self.responded
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Whether some caller already claimed the commit.
    #[must_use]
    pub fn is_responded(&self) -> bool {
        self.responded.load(Ordering::Acquire)
    }

    /// Whether the header line has been emitted.
    #[must_use]
    pub fn header_written(&self) -> bool {
        self.header_written.load(Ordering::Acquire)
    }
}

/// Snapshot of a committed response, handed to transport glue.
#[derive(Debug)]
pub struct CommittedResponse {
    /// Final status code.
    pub status: u16,
    /// Emitted headers.
    pub headers: HeaderVec,
    /// Body bytes.
    pub body: Vec<u8>,
}

impl CommittedResponse {
    /// Get a header by name (case-insensitive per RFC 7230).
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Buffered status/headers/body of one in-flight response, plus the two
/// atomic flags driving the finalization protocol.
///
/// Owned exclusively by its `RequestContext`; mutation is only honored before
/// the header-written flag flips true. The flags live behind `Arc` so
/// [`ResponseCommit`] clones can race finalization from other coroutines.
pub struct ResponseState {
    status: u16,
    headers: HeaderVec,
    body: Vec<u8>,
    responded: Arc<AtomicBool>,
    header_written: Arc<AtomicBool>,
}

impl ResponseState {
    #[must_use]
    pub fn new() -> Self {
        ResponseState {
            status: 0,
            headers: HeaderVec::new(),
            body: Vec::new(),
            responded: Arc::new(AtomicBool::new(false)),
            header_written: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Clear all per-request state.
    ///
    /// The atomic flags are replaced, not reset in place: a stale watchdog
    /// still holding a `ResponseCommit` from the previous request must never
    /// be able to claim the next request's commit.
    pub fn reset(&mut self) {
        self.status = 0;
        self.headers.clear();
        self.body.clear();
        self.responded = Arc::new(AtomicBool::new(false));
        self.header_written = Arc::new(AtomicBool::new(false));
    }

    /// Current status code; 0 means unset.
    #[must_use]
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Set the status code. No-op once the header has been written.
    pub fn set_status(&mut self, status: u16) {
        if !self.header_written() {
            self.status = status;
        }
    }

    /// Get a header by name (case-insensitive per RFC 7230).
    #[must_use]
    pub fn get_header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Add or replace a header. No-op once the header has been written.
    pub fn set_header(&mut self, name: &str, value: String) {
        if self.header_written() {
            return;
        }
        self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        self.headers.push((Arc::from(name), value));
    }

    /// Remove a header. No-op once the header has been written.
    pub fn remove_header(&mut self, name: &str) {
        if !self.header_written() {
            self.headers.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
        }
    }

    /// Append body bytes, returning how many were accepted. Writes after the
    /// header commit are dropped.
    pub fn write(&mut self, bytes: &[u8]) -> usize {
        if self.header_written() {
            return 0;
        }
        self.body.extend_from_slice(bytes);
        bytes.len()
    }

    /// Replace the buffered body. No-op once the header has been written.
    pub fn set_body(&mut self, body: Vec<u8>) {
        if !self.header_written() {
            self.body = body;
        }
    }

    /// Buffered body length; sizes Content-Length before the header commit.
    #[must_use]
    pub fn body_len(&self) -> usize {
        self.body.len()
    }

    /// Whether the header line has been emitted.
    #[must_use]
    pub fn header_written(&self) -> bool {
        self.header_written.load(Ordering::Acquire)
    }

    /// Whether some caller already claimed the commit.
    #[must_use]
    pub fn is_responded(&self) -> bool {
        self.responded.load(Ordering::Acquire)
    }

    /// Cloneable handle to the finalization guard.
    #[must_use]
    pub fn commit_handle(&self) -> ResponseCommit {
        ResponseCommit {
            responded: Arc::clone(&self.responded),
            header_written: Arc::clone(&self.header_written),
        }
    }

    /// First-writer-wins claim on the commit sequence.
    pub(crate) fn try_respond(&self) -> bool {
        self.responded
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Emit the header line: pick a default status if none was ever set,
    /// derive Content-Length when absent, and flip the header-written flag.
    ///
    /// Callers must hold the commit claim; this is not re-entrant.
    pub(crate) fn commit_header(&mut self) {
        if self.status == 0 {
            // Never leave a zero status: success default when a body exists,
            // the explicit "no response produced" status when not.
            self.status = if self.body.is_empty() { 444 } else { 200 };
        }
        if !self.body.is_empty() && self.get_header("content-length").is_none() {
            let len = self.body.len().to_string();
            self.headers.push((Arc::from("Content-Length"), len));
        }
        self.header_written.store(true, Ordering::Release);
        debug!(
            status = self.status,
            reason = status_reason(self.status),
            bytes = self.body.len(),
            "response header committed"
        );
    }

    /// Last-resort commit for a response whose finalization faulted after the
    /// claim was taken. Exclusive access through `&mut self` makes this safe
    /// even though the claim holder is gone.
    pub(crate) fn force_commit_header(&mut self) {
        self.responded.store(true, Ordering::Release);
        self.commit_header();
    }

    /// Take the committed response for transport glue. Meaningful only after
    /// the header commit.
    #[must_use]
    pub fn take_committed(&mut self) -> CommittedResponse {
        CommittedResponse {
            status: self.status,
            headers: std::mem::take(&mut self.headers),
            body: std::mem::take(&mut self.body),
        }
    }
}

impl Default for ResponseState {
    fn default() -> Self {
        ResponseState::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_reason() {
        assert_eq!(status_reason(200), "OK");
        assert_eq!(status_reason(405), "Method Not Allowed");
        assert_eq!(status_reason(444), "No Response");
    }

    #[test]
    fn test_default_status_depends_on_body() {
        let mut res = ResponseState::new();
        assert!(res.try_respond());
        res.commit_header();
        assert_eq!(res.status(), 444);

        let mut res = ResponseState::new();
        res.write(b"hello");
        assert!(res.try_respond());
        res.commit_header();
        assert_eq!(res.status(), 200);
        assert_eq!(res.get_header("content-length"), Some("5"));
    }

    #[test]
    fn test_explicit_content_length_is_kept() {
        let mut res = ResponseState::new();
        res.set_header("Content-Length", "99".to_string());
        res.write(b"hi");
        assert!(res.try_respond());
        res.commit_header();
        assert_eq!(res.get_header("content-length"), Some("99"));
    }

    #[test]
    fn test_mutation_refused_after_commit() {
        let mut res = ResponseState::new();
        res.set_status(200);
        res.write(b"body");
        assert!(res.try_respond());
        res.commit_header();

        res.set_status(500);
        res.set_header("X-Late", "yes".to_string());
        assert_eq!(res.write(b"more"), 0);
        assert_eq!(res.status(), 200);
        assert!(res.get_header("x-late").is_none());
        assert_eq!(res.body_len(), 4);
    }

    #[test]
    fn test_reset_detaches_stale_commit_handles() {
        let mut res = ResponseState::new();
        let stale = res.commit_handle();
        res.reset();
        // A handle from the previous request cannot claim the new one.
        assert!(stale.try_acquire());
        assert!(!res.is_responded());
        assert!(res.try_respond());
    }

    #[test]
    fn test_header_replace_is_case_insensitive() {
        let mut res = ResponseState::new();
        res.set_header("content-type", "text/plain".to_string());
        res.set_header("Content-Type", "application/json".to_string());
        assert_eq!(res.get_header("CONTENT-TYPE"), Some("application/json"));
        res.remove_header("content-TYPE");
        assert!(res.get_header("content-type").is_none());
    }
}
