//! Cancellation token for an in-flight biometric attempt
//!
//! The session owns the [`CancellationToken`]; the attempt handle only ever
//! sees a [`CancellationObserver`], which can poll or await the signal but
//! never raise it. A signaled token stays signaled, so a new attempt always
//! needs a new token.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};

/// Right to abort one hardware attempt
pub struct CancellationToken {
    inner: tokio_util::sync::CancellationToken,
    signaled: AtomicBool,
}

impl CancellationToken {
    /// Create an unsignaled token
    pub fn new() -> Self {
        Self {
            inner: tokio_util::sync::CancellationToken::new(),
            signaled: AtomicBool::new(false),
        }
    }

    /// Signal the attempt to stop
    ///
    /// Idempotent. Returns `true` only for the call that actually signaled.
    pub fn signal(&self) -> bool {
        let first = !self.signaled.swap(true, Ordering::AcqRel);
        if first {
            self.inner.cancel();
        }
        first
    }

    /// Whether the token has been signaled
    pub fn is_signaled(&self) -> bool {
        self.signaled.load(Ordering::Acquire)
    }

    /// Non-owning view handed to the attempt handle
    pub fn observer(&self) -> CancellationObserver {
        CancellationObserver {
            inner: self.inner.clone(),
        }
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CancellationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationToken")
            .field("signaled", &self.is_signaled())
            .finish()
    }
}

impl Drop for CancellationToken {
    fn drop(&mut self) {
        self.signal();
    }
}

/// Read-only view of a [`CancellationToken`]
#[derive(Clone)]
pub struct CancellationObserver {
    inner: tokio_util::sync::CancellationToken,
}

impl CancellationObserver {
    /// Whether the owning token has been signaled (or dropped)
    pub fn is_signaled(&self) -> bool {
        self.inner.is_cancelled()
    }

    /// Resolves once the owning token is signaled
    pub async fn signaled(&self) {
        self.inner.cancelled().await
    }
}

impl fmt::Debug for CancellationObserver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CancellationObserver")
            .field("signaled", &self.is_signaled())
            .finish()
    }
}
