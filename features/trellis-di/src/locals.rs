use std::{collections::HashMap, sync::Arc};

use crate::{
    token::Token,
    types::{Injectable, Instance},
};

/// Instances resolved during one invocation or one logical request.
///
/// Lookups fall back to the short type name of a type token, so an instance
/// seeded under `"UserService"` also satisfies `Token::of::<UserService>()`.
#[derive(Debug, Clone, Default)]
pub struct LocalsContainer {
    instances: HashMap<Token, Instance>,
}

impl LocalsContainer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, token: &Token) -> Option<&Instance> {
        self.instances.get(token).or_else(|| {
            token
                .name_form()
                .and_then(|name| self.instances.get(&name))
        })
    }

    pub fn get_as<T: Injectable>(&self, token: &Token) -> Option<Arc<T>> {
        self.get(token)?.downcast().ok()
    }

    pub fn insert(&mut self, token: Token, instance: Instance) -> Option<Instance> {
        self.instances.insert(token, instance)
    }

    pub fn insert_value<T: Injectable>(&mut self, token: impl Into<Token>, value: T) {
        self.instances.insert(token.into(), Instance::new(value));
    }

    pub fn contains(&self, token: &Token) -> bool {
        self.get(token).is_some()
    }

    pub fn remove(&mut self, token: &Token) -> Option<Instance> {
        self.instances.remove(token)
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct UserService;

    #[test]
    fn falls_back_to_type_names() {
        let mut locals = LocalsContainer::new();
        locals.insert_value("UserService", UserService);

        assert!(locals.contains(&Token::of::<UserService>()));
        assert!(locals.get_as::<UserService>(&Token::of::<UserService>()).is_some());
        assert!(!locals.contains(&Token::of::<String>()));
    }
}
