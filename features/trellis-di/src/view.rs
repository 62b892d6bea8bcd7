use std::{fmt, sync::Arc};

use crate::{
    injector::{read, Injector},
    provider::{Provider, ProviderRef},
    scope::ProviderType,
    token::Token,
    types::{Injectable, Instance},
};

type Predicate = Arc<dyn Fn(&Provider) -> bool + Send + Sync>;

/// Read only view over the providers of a container matching a predicate.
///
/// The view reads through to the container, so providers added later are
/// visible.
#[derive(Clone)]
pub struct ProviderView {
    injector: Injector,
    predicate: Predicate,
}

impl ProviderView {
    pub fn new<F>(injector: Injector, predicate: F) -> Self
    where
        F: Fn(&Provider) -> bool + Send + Sync + 'static,
    {
        ProviderView {
            injector,
            predicate: Arc::new(predicate),
        }
    }

    /// Providers of one type
    pub fn of_type(injector: Injector, provider_type: ProviderType) -> Self {
        Self::new(injector, move |provider| {
            provider.provider_type() == &provider_type
        })
    }

    fn matches(&self, provider: &ProviderRef) -> bool {
        (self.predicate)(&read(provider))
    }

    pub fn get_provider(&self, token: &Token) -> Option<ProviderRef> {
        self.injector
            .get_provider(token)
            .filter(|provider| self.matches(provider))
    }

    pub fn has(&self, token: &Token) -> bool {
        self.get_provider(token).is_some()
    }

    pub fn get_instance(&self, token: &Token) -> Option<Instance> {
        let provider = self.get_provider(token)?;
        let instance = read(&provider).instance().cloned();
        instance
    }

    pub fn get<T: Injectable>(&self, token: &Token) -> Option<Arc<T>> {
        self.get_instance(token)?.downcast().ok()
    }

    pub fn providers(&self) -> Vec<ProviderRef> {
        self.injector
            .get_providers(None)
            .into_iter()
            .filter(|provider| self.matches(provider))
            .collect()
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.injector
            .entries()
            .into_iter()
            .filter(|(_, provider)| self.matches(provider))
            .map(|(token, _)| token)
            .collect()
    }

    pub fn len(&self) -> usize {
        self.providers().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for ProviderView {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.tokens()).finish()
    }
}
