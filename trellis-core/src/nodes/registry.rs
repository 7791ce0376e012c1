//! Node type registry.

use std::fmt;
use std::sync::Arc;

use indexmap::IndexMap;

use super::{AddNode, BoxNode, ContextVariableNode, FrameNode, MultiplyNode, StringSubstituteNode};
use crate::error::{Error, Result};
use crate::graph::Node;

/// Creates a fresh node behaviour.
pub type NodeFactory = Arc<dyn Fn() -> Arc<dyn Node> + Send + Sync>;

/// Maps type names to node factories.
#[derive(Clone, Default)]
pub struct NodeRegistry {
    factories: IndexMap<String, NodeFactory>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry with every built-in node type.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register_default::<AddNode>("Add");
        registry.register_default::<MultiplyNode>("Multiply");
        registry.register_default::<FrameNode>("Frame");
        registry.register_default::<ContextVariableNode>("ContextVariable");
        registry.register_default::<StringSubstituteNode>("StringSubstitute");
        registry.register_default::<BoxNode>("Box");
        registry
    }

    /// Register (or replace) a factory for `type_name`.
    pub fn register<F>(&mut self, type_name: impl Into<String>, factory: F)
    where
        F: Fn() -> Arc<dyn Node> + Send + Sync + 'static,
    {
        self.factories.insert(type_name.into(), Arc::new(factory));
    }

    pub fn register_default<N: Node + Default>(&mut self, type_name: impl Into<String>) {
        self.register(type_name, || Arc::new(N::default()) as Arc<dyn Node>);
    }

    pub fn create(&self, type_name: &str) -> Result<Arc<dyn Node>> {
        self.factories
            .get(type_name)
            .map(|factory| factory())
            .ok_or_else(|| Error::UnknownNodeType(type_name.to_string()))
    }

    pub fn contains(&self, type_name: &str) -> bool {
        self.factories.contains_key(type_name)
    }

    /// Registered names, in registration order.
    pub fn type_names(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(String::as_str)
    }
}

impl fmt::Debug for NodeRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.type_names()).finish()
    }
}
