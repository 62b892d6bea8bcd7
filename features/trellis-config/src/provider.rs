use std::{
    any::{type_name, Any, TypeId},
    collections::HashMap,
    sync::Arc,
};

use crate::errors::ConfigError;

type Entry = Arc<dyn Any + Send + Sync + 'static>;

/// Typed configs, at most one per type.
#[derive(Default)]
pub struct ConfigProvider {
    configs: HashMap<TypeId, Entry>,
}

impl ConfigProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a config, failing if one of the same type exists
    pub fn insert<T: Send + Sync + 'static>(&mut self, config: T) -> Result<&mut Self, ConfigError> {
        if self.contains::<T>() {
            return Err(ConfigError::ConfigAlreadyRegistered(type_name::<T>()));
        }
        self.configs.insert(TypeId::of::<T>(), Arc::new(config));
        Ok(self)
    }

    /// Adds or replaces a config, returning the previous one
    pub fn replace<T: Send + Sync + 'static>(&mut self, config: T) -> Option<Arc<T>> {
        self.configs
            .insert(TypeId::of::<T>(), Arc::new(config))
            .and_then(downcast)
    }

    pub fn get<T: Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.configs.get(&TypeId::of::<T>()).cloned().and_then(downcast)
    }

    /// Like [`get`](Self::get), but a missing config is an error
    pub fn require<T: Send + Sync + 'static>(&self) -> Result<Arc<T>, ConfigError> {
        self.get()
            .ok_or(ConfigError::ConfigMissing(type_name::<T>()))
    }

    pub fn remove<T: Send + Sync + 'static>(&mut self) -> Option<Arc<T>> {
        self.configs.remove(&TypeId::of::<T>()).and_then(downcast)
    }

    pub fn contains<T: 'static>(&self) -> bool {
        self.configs.contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

fn downcast<T: Send + Sync + 'static>(entry: Entry) -> Option<Arc<T>> {
    entry.downcast().ok()
}
