//! Correlation-id source for client-initiated invocations.
//!
//! Every `invoke` carries an `invocationId` the server echoes back in its
//! completion, which is how an in-flight call is matched to its reply while
//! other traffic interleaves on the same connection. Ids only need to be
//! unique within one connection; this source hands out the decimal strings
//! "1", "2", "3", ... the way standard hub clients do.
//!
//! The counter is an `AtomicU64`, so concurrent invokes from different tasks
//! can draw ids without a lock and without ever receiving the same id twice.

use std::sync::atomic::{AtomicU64, Ordering};

/// Thread-safe source of monotonically increasing invocation ids.
#[derive(Debug, Default)]
pub struct InvocationIdSource {
    inner: AtomicU64,
}

impl InvocationIdSource {
    /// Creates a source whose first id will be `"1"`.
    pub fn new() -> Self {
        Self {
            inner: AtomicU64::new(0),
        }
    }

    /// Returns the next unused id.
    ///
    /// `Ordering::Relaxed` suffices: ids are only compared for equality with
    /// completions, never used to synchronize memory between threads.
    pub fn next_id(&self) -> String {
        let n = self.inner.fetch_add(1, Ordering::Relaxed);
        (n + 1).to_string()
    }

    /// Number of ids handed out so far. Diagnostic only; by the time the
    /// caller reads it another task may have drawn more.
    pub fn issued(&self) -> u64 {
        self.inner.load(Ordering::Relaxed)
    }
}
