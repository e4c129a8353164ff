//! Progress and cancellation plumbing between the worker thread and its
//! controller (§5): an unbounded, producer-throttled progress channel and
//! a single-shot cancellation flag.

use crate::model::ProgressEvent;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Single-shot, observable-at-every-iteration cancellation signal.
/// Cloning shares the same underlying flag.
#[derive(Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self {
            flag: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

/// Producer side of the progress channel. The worker never blocks
/// producing: the channel is unbounded, and the caller is responsible for
/// throttling emission frequency (done in `pattern.rs` / `hardware.rs`).
pub struct ProgressSink {
    tx: Sender<ProgressEvent>,
}

impl ProgressSink {
    pub fn emit(&self, event: ProgressEvent) {
        // An unbounded channel send only fails if every receiver was
        // dropped; the worker has nothing sensible to do about that
        // other than keep running to completion, so the error is ignored.
        let _ = self.tx.send(event);
    }
}

/// Creates a linked `(ProgressSink, Receiver<ProgressEvent>)` pair: the
/// sink is handed to the worker, the receiver to the controller.
pub fn progress_channel() -> (ProgressSink, Receiver<ProgressEvent>) {
    let (tx, rx) = mpsc::channel();
    (ProgressSink { tx }, rx)
}
