//! Background Computation
//!
//! Thread-local context stacks are not inherited by new threads, so a
//! [`BackgroundTask`] captures the context explicitly, attaches a fresh
//! [`Canceller`] and enters it on the worker thread before running.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::context::{Canceller, Context, ContextScope};
use crate::error::{Error, Result};
use crate::graph::Graph;

/// Work running on its own thread against a graph.
///
/// Dropping the task cancels it and waits for the thread to finish.
pub struct BackgroundTask<R: Send + 'static> {
    handle: Option<JoinHandle<R>>,
    canceller: Canceller,
}

impl<R: Send + 'static> BackgroundTask<R> {
    /// Run `f` with `context` (plus a fresh canceller) current.
    pub fn spawn<F>(graph: Arc<Graph>, context: &Context, f: F) -> Self
    where
        F: FnOnce(&Graph, &Context) -> R + Send + 'static,
    {
        let canceller = Canceller::new();
        let context = context.with_canceller(canceller.clone());
        let handle = thread::spawn(move || {
            let _scope = ContextScope::enter(&context);
            tracing::debug!("background task started");
            f(&graph, &context)
        });
        Self {
            handle: Some(handle),
            canceller,
        }
    }

    pub fn canceller(&self) -> &Canceller {
        &self.canceller
    }

    /// Request cancellation. Computations notice at their next check.
    pub fn cancel(&self) {
        self.canceller.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.canceller.is_cancelled()
    }

    pub fn is_finished(&self) -> bool {
        self.handle.as_ref().map_or(true, JoinHandle::is_finished)
    }

    /// Block until the task finishes and return its result.
    pub fn wait(mut self) -> Result<R> {
        self.join()
    }

    pub fn cancel_and_wait(mut self) -> Result<R> {
        self.cancel();
        self.join()
    }

    fn join(&mut self) -> Result<R> {
        let handle = self
            .handle
            .take()
            .ok_or_else(|| Error::InvalidArgument("task already joined".to_string()))?;
        handle
            .join()
            .map_err(|_| Error::node("background task panicked"))
    }
}

impl<R: Send + 'static> Drop for BackgroundTask<R> {
    fn drop(&mut self) {
        if self.handle.is_some() {
            self.cancel();
            let _ = self.join();
        }
    }
}
