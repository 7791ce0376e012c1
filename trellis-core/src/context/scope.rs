//! Thread-local context stack.
//!
//! Entering a [`ContextScope`] pushes a context onto the calling thread's
//! stack; dropping the guard pops it again. Scopes nest, so a computation
//! that evaluates an input under a modified context simply enters a new
//! scope for the duration of that evaluation.
//!
//! The guard is deliberately `!Send`: a scope belongs to the thread that
//! entered it.

use std::cell::RefCell;
use std::marker::PhantomData;

use super::Context;
use crate::value::Value;

thread_local! {
    static CONTEXT_STACK: RefCell<Vec<Context>> = const { RefCell::new(Vec::new()) };
    static DEFAULT_CONTEXT: Context = Context::new();
}

pub(super) fn current() -> Context {
    CONTEXT_STACK
        .with(|stack| stack.borrow().last().cloned())
        .unwrap_or_else(|| DEFAULT_CONTEXT.with(Context::clone))
}

/// Guard that pops the context when dropped.
pub struct ContextScope {
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl ContextScope {
    /// Make `context` current on this thread until the guard is dropped.
    pub fn enter(context: &Context) -> Self {
        let depth = CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            stack.push(context.clone());
            stack.len()
        });
        Self {
            depth,
            _not_send: PhantomData,
        }
    }

    /// Enter a copy of the current context with one variable overridden.
    pub fn with_variable(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::enter(&current().with_variable(name, value))
    }

    /// Number of contexts currently pushed on this thread.
    pub fn depth() -> usize {
        CONTEXT_STACK.with(|stack| stack.borrow().len())
    }
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        CONTEXT_STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            debug_assert_eq!(
                stack.len(),
                self.depth,
                "ContextScope dropped out of order"
            );
            stack.pop();
        });
    }
}
