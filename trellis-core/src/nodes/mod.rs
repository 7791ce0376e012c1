//! Node Types
//!
//! The node types every graph knows about, and the registry that maps type
//! names to factories for serialisation and scripting.

mod arithmetic;
mod container;
mod frame;
mod registry;
mod text;

pub use arithmetic::{AddNode, MultiplyNode};
pub use container::BoxNode;
pub use frame::{ContextVariableNode, FrameNode};
pub use registry::{NodeFactory, NodeRegistry};
pub use text::StringSubstituteNode;
