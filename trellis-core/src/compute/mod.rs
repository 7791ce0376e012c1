//! Compute Engine
//!
//! Lazily evaluates plug hashes and values for a context, memoising both.
//!
//! # Overview
//!
//! - `process` implements hashing and computing a plug.
//! - [`cache`] holds the hash cache, the compute cache and the in-flight
//!   table that deduplicates concurrent work.
//! - [`ComputeScope`] is what node implementations see while running.
//! - [`BackgroundTask`] runs work on another thread with a captured context.
//!
//! # Thread Safety
//!
//! Any number of threads may evaluate plugs of the same graph at once.
//! Evaluation only takes the graph's arena lock for reading; the caches are
//! sharded and the in-flight table locks per digest, so unrelated
//! computations run fully in parallel.

mod background;
pub mod cache;
mod process;
mod scope;

pub use background::BackgroundTask;
pub use cache::{CacheStats, Caches, ComputeCache, HashCache};
pub use scope::ComputeScope;
