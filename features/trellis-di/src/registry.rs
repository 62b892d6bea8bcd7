use std::{
    collections::HashMap,
    sync::{Arc, OnceLock, PoisonError, RwLock},
};

use tracing::debug;

use crate::{
    component::{Component, Dependencies},
    metadata::MetadataStore,
    provider::{Provider, ProviderDescriptor},
    scope::ProviderType,
    token::Token,
    types::{DynError, Injectable},
};

/// How containers treat providers of one type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RegistrySettings {
    /// Instances may be injected into other components
    pub injectable: bool,
    /// The container constructs instances itself
    pub buildable: bool,
}

impl Default for RegistrySettings {
    fn default() -> Self {
        RegistrySettings {
            injectable: true,
            buildable: true,
        }
    }
}

#[derive(Default)]
struct Templates {
    entries: HashMap<Token, Provider>,
    order: Vec<Token>,
}

/// Provider templates, one per token, cloned into every container.
///
/// Registration is idempotent: registering a token twice keeps the first
/// template unless [`overwrite`](Self::overwrite) is used. The registry also
/// owns the class metadata of every registered component.
pub struct ProviderRegistry {
    templates: RwLock<Templates>,
    settings: RwLock<HashMap<ProviderType, RegistrySettings>>,
    metadata: MetadataStore,
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL_REGISTRY: OnceLock<Arc<ProviderRegistry>> = OnceLock::new();

impl ProviderRegistry {
    pub fn new() -> Self {
        let mut settings = HashMap::new();
        settings.insert(
            ProviderType::Controller,
            RegistrySettings {
                injectable: false,
                buildable: true,
            },
        );

        ProviderRegistry {
            templates: RwLock::default(),
            settings: RwLock::new(settings),
            metadata: MetadataStore::new(),
        }
    }

    /// The process wide registry
    pub fn global() -> Arc<ProviderRegistry> {
        GLOBAL_REGISTRY
            .get_or_init(|| Arc::new(ProviderRegistry::new()))
            .clone()
    }

    /// Registers a template, no-op if the token is already registered.
    ///
    /// Returns true if the template was added.
    pub fn register(&self, descriptor: impl Into<ProviderDescriptor>) -> bool {
        let descriptor = descriptor.into();
        if self.has(&descriptor.provide) {
            return false;
        }

        let provider = Provider::from_descriptor(descriptor, &self.metadata);
        let mut templates = self.templates.write().unwrap_or_else(PoisonError::into_inner);
        if templates.entries.contains_key(provider.provide()) {
            return false;
        }

        debug!("Registering {}", provider.provide());
        let token = provider.provide().clone();
        templates.order.push(token.clone());
        templates.entries.insert(token, provider);
        true
    }

    /// Registers a template, replacing an existing one
    pub fn overwrite(&self, descriptor: impl Into<ProviderDescriptor>) {
        let provider = Provider::from_descriptor(descriptor.into(), &self.metadata);
        self.insert(provider.provide().clone(), provider);
    }

    fn insert(&self, token: Token, provider: Provider) {
        let mut templates = self.templates.write().unwrap_or_else(PoisonError::into_inner);
        if templates.entries.insert(token.clone(), provider).is_none() {
            templates.order.push(token);
        }
    }

    pub fn register_class<C: Component>(&self) -> bool {
        self.register(ProviderDescriptor::class::<C>())
    }

    pub fn register_service<C: Component>(&self) -> bool {
        self.register(ProviderDescriptor::class::<C>().provider_type(ProviderType::Service))
    }

    pub fn register_factory<T, F>(&self, provide: impl Into<Token>, deps: Vec<Token>, factory: F) -> bool
    where
        T: Injectable,
        F: Fn(Dependencies) -> Result<T, DynError> + Send + Sync + 'static,
    {
        self.register(
            ProviderDescriptor::factory(provide, factory)
                .deps(deps)
                .provider_type(ProviderType::Factory),
        )
    }

    pub fn register_value<T: Injectable>(&self, provide: impl Into<Token>, value: T) -> bool {
        self.register(ProviderDescriptor::value(provide, value).provider_type(ProviderType::Value))
    }

    /// Makes `alias` resolve to the provider of `existing`.
    ///
    /// Returns false if `existing` is not registered.
    pub fn register_alias(&self, existing: &Token, alias: impl Into<Token>) -> bool {
        let Some(mut provider) = self.get(existing) else {
            return false;
        };
        provider.mark_alias();

        let alias = alias.into();
        debug!("Registering {alias} as alias of {existing}");
        self.insert(alias, provider);
        true
    }

    /// Returns a copy of the template registered under `token`
    pub fn get(&self, token: &Token) -> Option<Provider> {
        let templates = self.templates.read().unwrap_or_else(PoisonError::into_inner);
        templates.entries.get(token).cloned()
    }

    pub fn has(&self, token: &Token) -> bool {
        let templates = self.templates.read().unwrap_or_else(PoisonError::into_inner);
        templates.entries.contains_key(token)
    }

    /// Every template with its registry key, in registration order
    pub fn entries(&self) -> Vec<(Token, Provider)> {
        let templates = self.templates.read().unwrap_or_else(PoisonError::into_inner);
        templates
            .order
            .iter()
            .filter_map(|token| {
                templates
                    .entries
                    .get(token)
                    .map(|provider| (token.clone(), provider.clone()))
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.templates
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .order
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Declares how containers treat providers of `provider_type`
    pub fn create_registry(&self, provider_type: ProviderType, settings: RegistrySettings) {
        let mut registries = self.settings.write().unwrap_or_else(PoisonError::into_inner);
        registries.insert(provider_type, settings);
    }

    pub fn registry_settings(&self, provider_type: &ProviderType) -> RegistrySettings {
        let registries = self.settings.read().unwrap_or_else(PoisonError::into_inner);
        registries.get(provider_type).copied().unwrap_or_default()
    }

    pub fn metadata(&self) -> &MetadataStore {
        &self.metadata
    }
}
