//! Scoped async cleanup: a LIFO of async ops attached to a context, unwound
//! on scope exit no matter how the scope exits.

use crate::op::{wait_erased, AsyncOp, ErasedOp};
use parking_lot::Mutex;

/// LIFO of async cleanup ops.
///
/// Entries are appended in call order and awaited in reverse on unwind. An
/// entry that fails is logged and never replaces the scope's primary result.
/// Cleanup is must-run work: the unwinder executes under a fresh,
/// never-requested stop source.
pub struct CleanupStack {
    entries: Mutex<Vec<Box<dyn ErasedOp>>>,
}

impl Default for CleanupStack {
    fn default() -> Self {
        Self::new()
    }
}

impl CleanupStack {
    pub fn new() -> Self {
        CleanupStack { entries: Mutex::new(Vec::new()) }
    }

    pub fn push(&self, op: impl AsyncOp<Output = ()> + Send + 'static) {
        self.entries.lock().push(Box::new(op));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Pops and awaits entries until the stack is empty, newest first.
    /// Entries pushed while unwinding are unwound as well.
    pub(crate) async fn unwind(&self) {
        loop {
            let op = self.entries.lock().pop();
            let Some(op) = op else { break };
            if let Some(err) = wait_erased(op).await {
                tracing::warn!(target: "asynckit", "cleanup op failed: {err}");
            }
        }
    }
}
