//! Exclusive lock over ratchet state.
//!
//! Every cipher that touches the same [`ProtocolStore`](crate::ProtocolStore)
//! shares one [`SessionLock`]. The guard is held for a whole encrypt or
//! decrypt call so that a concurrent encrypt and decrypt against the same
//! peer never interleave ratchet steps.

use parking_lot::{Mutex, MutexGuard};
use tracing::trace;

/// Process-wide lock domain for session state.
#[derive(Debug, Default)]
pub struct SessionLock {
    inner: Mutex<()>,
}

/// Guard returned by [`SessionLock::acquire`]. Releases on drop.
#[must_use = "the session lock is released as soon as the guard is dropped"]
pub struct SessionLockGuard<'a> {
    _guard: MutexGuard<'a, ()>,
}

impl SessionLock {
    /// Create a new, unlocked domain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until the lock is held.
    pub fn acquire(&self) -> SessionLockGuard<'_> {
        trace!("Acquiring session lock");
        SessionLockGuard {
            _guard: self.inner.lock(),
        }
    }

    /// Whether some caller currently holds the lock.
    pub fn is_locked(&self) -> bool {
        self.inner.is_locked()
    }
}
