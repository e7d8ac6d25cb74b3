//! # Cancellation Module
//!
//! Cooperative, message-passing cancellation for request scopes.
//!
//! A [`CancelToken`] is a cloneable handle carrying an atomic cancelled flag,
//! a distinct timed-out marker, and a "done" signal delivered over `may`
//! channels. Cancellation is cooperative, never preemptive: a running handler
//! is not interrupted mid-execution. The dispatcher observes the token between
//! chain links, and the exactly-once response guard decides who finalizes when
//! cancellation races normal completion.
//!
//! Bounded-time operations use [`timeout_race`]: a worker coroutine and a
//! timer coroutine race into one reply channel, and the first message wins.
//! The framework never awaits work spawned this way beyond that first message.

use may::coroutine;
use may::sync::mpsc::{self, Receiver, Sender};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error};

use crate::error::DispatchError;
use crate::runtime_config::RuntimeConfig;

struct CancelInner {
    cancelled: AtomicBool,
    timed_out: AtomicBool,
    timeout_ms: AtomicU64,
    waiters: Mutex<Vec<Sender<()>>>,
    parent: Option<CancelToken>,
}

/// Cloneable cancellation handle for one request scope.
///
/// Each request owns a token derived from any parent scope; cancelling the
/// parent cancels every derivative. All clones observe the same state.
#[derive(Clone)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    /// Fresh, uncancelled root token.
    #[must_use]
    pub fn new() -> Self {
        CancelToken {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                timed_out: AtomicBool::new(false),
                timeout_ms: AtomicU64::new(0),
                waiters: Mutex::new(Vec::new()),
                parent: None,
            }),
        }
    }

    /// Derive a child token. The child cancels when either it or any ancestor
    /// is cancelled; cancelling the child leaves the parent untouched.
    #[must_use]
    pub fn child(&self) -> Self {
        CancelToken {
            inner: Arc::new(CancelInner {
                cancelled: AtomicBool::new(false),
                timed_out: AtomicBool::new(false),
                timeout_ms: AtomicU64::new(0),
                waiters: Mutex::new(Vec::new()),
                parent: Some(self.clone()),
            }),
        }
    }

    /// Cancel this scope (client went away, shutdown, etc.).
    pub fn cancel(&self) {
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            self.notify();
        }
    }

    /// Cancel this scope because its deadline elapsed.
    pub fn cancel_timed_out(&self, timeout_ms: u64) {
        self.inner.timeout_ms.store(timeout_ms, Ordering::Release);
        self.inner.timed_out.store(true, Ordering::Release);
        if !self.inner.cancelled.swap(true, Ordering::AcqRel) {
            debug!(timeout_ms, "request deadline elapsed");
            self.notify();
        }
    }

    /// Whether this scope or any ancestor has been cancelled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        if self.inner.cancelled.load(Ordering::Acquire) {
            return true;
        }
        self.inner
            .parent
            .as_ref()
            .is_some_and(CancelToken::is_cancelled)
    }

    /// The dispatch error this cancellation maps to, if cancelled.
    ///
    /// A deadline produces the distinct [`DispatchError::TimedOut`]; any other
    /// cancellation maps to [`DispatchError::Cancelled`].
    #[must_use]
    pub fn reason(&self) -> Option<DispatchError> {
        if self.inner.timed_out.load(Ordering::Acquire) {
            return Some(DispatchError::TimedOut {
                timeout_ms: self.inner.timeout_ms.load(Ordering::Acquire),
            });
        }
        if self.is_cancelled() {
            return Some(DispatchError::Cancelled);
        }
        None
    }

    /// Receiver that yields once when this scope is cancelled.
    ///
    /// If the scope is already cancelled the signal is delivered immediately.
    #[must_use]
    pub fn done(&self) -> Receiver<()> {
        let (tx, rx) = mpsc::channel();
        if self.is_cancelled() {
            let _ = tx.send(());
            return rx;
        }
        if let Ok(mut waiters) = self.inner.waiters.lock() {
            waiters.push(tx);
        }
        rx
    }

    fn notify(&self) {
        if let Ok(mut waiters) = self.inner.waiters.lock() {
            for tx in waiters.drain(..) {
                // Receiver may already be gone; a dead waiter is not an error.
                let _ = tx.send(());
            }
        }
    }
}

impl Default for CancelToken {
    fn default() -> Self {
        CancelToken::new()
    }
}

/// Arm a deadline watchdog for `token`.
///
/// Spawns a coroutine that sleeps for `dur` and then cancels the token with a
/// timed-out reason. The watchdog is fire-and-forget: if the request completes
/// first, its late cancel hits an already-recycled token clone and the
/// exactly-once response guard makes it a no-op.
pub fn deadline(token: CancelToken, dur: Duration) -> Option<coroutine::JoinHandle<()>> {
    let stack_size = RuntimeConfig::from_env().stack_size;
    let timeout_ms = dur.as_millis() as u64;

    // SAFETY: may::coroutine::Builder::spawn() is marked unsafe by the may
    // runtime. The closure owns everything it touches (token clone + duration)
    // and is Send + 'static, so no references outlive the spawn site.
    #[allow(unsafe_code)]
    let spawn_result = unsafe {
        coroutine::Builder::new()
            .stack_size(stack_size)
            .spawn(move || {
                coroutine::sleep(dur);
                token.cancel_timed_out(timeout_ms);
            })
    };

    match spawn_result {
        Ok(handle) => Some(handle),
        Err(e) => {
            error!(error = %e, "failed to spawn deadline watchdog");
            None
        }
    }
}

/// Run `f` on a worker coroutine, bounded by `dur`.
///
/// The worker and a timer race into one reply channel; whichever message
/// arrives first decides the outcome. The losing coroutine finishes on its own
/// and its late send is dropped.
pub fn timeout_race<T, F>(dur: Duration, f: F) -> Result<T, DispatchError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    let stack_size = RuntimeConfig::from_env().stack_size;
    let timeout_ms = dur.as_millis() as u64;
    let (tx, rx) = mpsc::channel::<Result<T, DispatchError>>();
    let timer_tx = tx.clone();

    // SAFETY: both closures are Send + 'static and own their captures; the
    // unsafety is the may runtime's spawn contract, not this function's logic.
    #[allow(unsafe_code)]
    let worker = unsafe {
        coroutine::Builder::new()
            .stack_size(stack_size)
            .spawn(move || {
                let _ = tx.send(Ok(f()));
            })
    };
    if let Err(e) = worker {
        error!(error = %e, "failed to spawn bounded worker");
        return Err(DispatchError::http(500, "failed to spawn bounded worker"));
    }

    #[allow(unsafe_code)]
    let timer = unsafe {
        coroutine::Builder::new()
            .stack_size(stack_size)
            .spawn(move || {
                coroutine::sleep(dur);
                let _ = timer_tx.send(Err(DispatchError::TimedOut { timeout_ms }));
            })
    };
    if let Err(e) = timer {
        error!(error = %e, "failed to spawn race timer");
    }

    match rx.recv() {
        Ok(outcome) => outcome,
        Err(_) => Err(DispatchError::TimedOut { timeout_ms }),
    }
}
