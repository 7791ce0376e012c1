//! Evaluation Context
//!
//! A [`Context`] is the set of named variables (frame, user variables...)
//! that parameterises a computation. Contexts are values: copying one is
//! cheap because the variable table is shared copy-on-write, and a copy can
//! be edited without affecting the original.
//!
//! # Hashing
//!
//! Each variable carries its own digest, and the context digest is the
//! wrapping sum of them. The sum is order-independent and can be updated
//! in O(1) on every `set`/`remove`, so `hash()` is always free.
//!
//! # Current context
//!
//! Each thread keeps a stack of contexts (see [`ContextScope`]). Nothing is
//! inherited across threads: work handed to another thread must capture the
//! context explicitly and enter it there.

mod scope;
mod substitute;

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use indexmap::IndexMap;

use crate::error::{Error, Result};
use crate::hash::{Digest, Hasher};
use crate::value::{FromValue, Value};

pub use scope::ContextScope;

/// Name of the frame variable.
pub const FRAME: &str = "frame";
/// Name of the frame rate variable.
pub const FRAMES_PER_SECOND: &str = "framesPerSecond";

/// Shared cancellation flag.
///
/// Long running computations poll the canceller of their context and bail
/// out with [`Error::Cancelled`] once it is set.
#[derive(Clone, Default)]
pub struct Canceller {
    flag: Arc<AtomicBool>,
}

impl Canceller {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Fail with [`Error::Cancelled`] if cancellation was requested.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

impl fmt::Debug for Canceller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Canceller")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

#[derive(Clone, PartialEq)]
struct Entry {
    value: Value,
    hash: Digest,
}

impl Entry {
    fn new(name: &str, value: Value) -> Self {
        let mut h = Hasher::new();
        h.append_str(name).append(&value);
        Self {
            hash: h.finish(),
            value,
        }
    }
}

/// A mapping of named variables plus its digest.
#[derive(Clone)]
pub struct Context {
    variables: Arc<IndexMap<String, Entry>>,
    hash: Digest,
    canceller: Option<Canceller>,
}

impl Context {
    /// A context with `frame = 1` and `framesPerSecond = 24`.
    pub fn new() -> Self {
        let mut context = Self::empty();
        context.set(FRAME, 1.0);
        context.set(FRAMES_PER_SECOND, 24.0);
        context
    }

    /// A context without any variables.
    pub fn empty() -> Self {
        Self {
            variables: Arc::new(IndexMap::new()),
            hash: Digest::NULL,
            canceller: None,
        }
    }

    /// The current context of the calling thread.
    ///
    /// Falls back to [`Context::new`] when no scope is active.
    pub fn current() -> Context {
        scope::current()
    }

    /// Set a variable, replacing any existing value.
    pub fn set(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        let name = name.into();
        let entry = Entry::new(&name, value.into());
        if let Some(old) = self.variables.get(&name) {
            if *old == entry {
                return;
            }
            self.hash = self.hash.wrapping_sub(old.hash);
        }
        self.hash = self.hash.wrapping_add(entry.hash);
        Arc::make_mut(&mut self.variables).insert(name, entry);
    }

    /// A copy of this context with one variable overridden.
    pub fn with_variable(&self, name: impl Into<String>, value: impl Into<Value>) -> Context {
        let mut result = self.clone();
        result.set(name, value);
        result
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.variables.get(name).map(|e| &e.value)
    }

    /// Typed lookup. Fails if the variable is missing or not convertible.
    pub fn get_as<T: FromValue>(&self, name: &str) -> Result<T> {
        let value = self.get(name).ok_or_else(|| Error::ContextVariable {
            name: name.to_string(),
            reason: "variable not found".to_string(),
        })?;
        T::from_value(value).ok_or_else(|| Error::ContextVariable {
            name: name.to_string(),
            reason: format!("expected {}, found {}", T::TYPE, value.value_type()),
        })
    }

    /// Typed lookup with a fallback for missing or mistyped variables.
    pub fn get_or<T: FromValue>(&self, name: &str, default: T) -> T {
        self.get(name).and_then(T::from_value).unwrap_or(default)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        if !self.variables.contains_key(name) {
            return None;
        }
        let entry = Arc::make_mut(&mut self.variables).shift_remove(name)?;
        self.hash = self.hash.wrapping_sub(entry.hash);
        Some(entry.value)
    }

    /// Remove every variable whose name matches `pattern`.
    ///
    /// Patterns support `*` and `?` wildcards; several patterns may be
    /// given separated by spaces.
    pub fn remove_matching(&mut self, pattern: &str) {
        let doomed: Vec<String> = self
            .variables
            .keys()
            .filter(|name| substitute::match_pattern(pattern, name))
            .cloned()
            .collect();
        for name in doomed {
            self.remove(&name);
        }
    }

    /// Variable names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.variables.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    pub fn frame(&self) -> f64 {
        self.get_or(FRAME, 1.0)
    }

    pub fn set_frame(&mut self, frame: f64) {
        self.set(FRAME, frame);
    }

    pub fn frames_per_second(&self) -> f64 {
        self.get_or(FRAMES_PER_SECOND, 24.0)
    }

    pub fn set_frames_per_second(&mut self, fps: f64) {
        self.set(FRAMES_PER_SECOND, fps);
    }

    /// Time in seconds.
    pub fn time(&self) -> f64 {
        self.frame() / self.frames_per_second()
    }

    pub fn set_time(&mut self, seconds: f64) {
        let fps = self.frames_per_second();
        self.set_frame(seconds * fps);
    }

    /// Digest of all variables. The canceller does not contribute.
    pub fn hash(&self) -> Digest {
        self.hash
    }

    /// Digest of a single variable, or [`Digest::NULL`] if it is absent.
    pub fn variable_hash(&self, name: &str) -> Digest {
        self.variables
            .get(name)
            .map(|e| e.hash)
            .unwrap_or(Digest::NULL)
    }

    pub fn canceller(&self) -> Option<&Canceller> {
        self.canceller.as_ref()
    }

    /// A copy of this context that reports cancellation through `canceller`.
    pub fn with_canceller(&self, canceller: Canceller) -> Context {
        Context {
            canceller: Some(canceller),
            ..self.clone()
        }
    }

    /// A copy of this context without a canceller.
    pub fn without_canceller(&self) -> Context {
        Context {
            canceller: None,
            ..self.clone()
        }
    }

    /// Fail with [`Error::Cancelled`] if this context has been cancelled.
    pub fn check_cancellation(&self) -> Result<()> {
        match &self.canceller {
            Some(c) => c.check(),
            None => Ok(()),
        }
    }

    /// Expand `$var`, `${var}`, `#` frame padding and a leading `~`.
    pub fn substitute(&self, text: &str) -> String {
        substitute::substitute(text, self)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl PartialEq for Context {
    fn eq(&self, other: &Self) -> bool {
        self.hash == other.hash
            && self.variables.len() == other.variables.len()
            && self
                .variables
                .iter()
                .all(|(k, e)| other.get(k) == Some(&e.value))
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (name, entry) in self.variables.iter() {
            map.entry(name, &entry.value);
        }
        map.finish()
    }
}
