//! Model registry for looking up model profiles by name.

use std::sync::Arc;

use indexmap::IndexMap;

use super::definition::Model;
use super::vendors;
use crate::error::TableError;

/// Registry for model profiles, in registration order.
///
/// Models are shared as `Arc` and never mutated once registered.
#[derive(Debug, Default, Clone)]
pub struct ModelRegistry {
    models: IndexMap<String, Arc<Model>>,
}

impl ModelRegistry {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding the built-in models.
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        for model in vendors::builtin() {
            // Built-in names are distinct.
            let _ = registry.register(model);
        }
        registry
    }

    /// Register a model. Fails if the name is taken.
    pub fn register(&mut self, model: Model) -> Result<(), TableError> {
        if self.models.contains_key(&model.name) {
            return Err(TableError::ModelExists { name: model.name });
        }
        self.models.insert(model.name.clone(), Arc::new(model));
        Ok(())
    }

    /// Get a model by name.
    pub fn get(&self, name: &str) -> Result<Arc<Model>, TableError> {
        self.models
            .get(name)
            .cloned()
            .ok_or_else(|| TableError::UnknownModel {
                name: name.to_string(),
            })
    }

    /// Check if a model is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.models.contains_key(name)
    }

    /// List all registered model names.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.models.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.models.len()
    }

    pub fn is_empty(&self) -> bool {
        self.models.is_empty()
    }
}
