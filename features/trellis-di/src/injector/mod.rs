//! The container: providers cloned from the registry, their cached
//! instances, and the resolution algorithm.

pub mod bindings;
pub mod invoke;
mod lifecycle;

use std::{
    collections::HashMap,
    fmt,
    sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak},
};

use tracing::debug;

use crate::{
    component::Component,
    dependency_graph::DependencyGraph,
    provider::{Provider, ProviderDescriptor, ProviderRef},
    registry::ProviderRegistry,
    scope::{ProviderScope, ProviderType},
    settings::SettingsService,
    token::Token,
    types::{Injectable, Instance},
    view::ProviderView,
};

pub(crate) fn read(provider: &ProviderRef) -> RwLockReadGuard<'_, Provider> {
    provider.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write(provider: &ProviderRef) -> RwLockWriteGuard<'_, Provider> {
    provider.write().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct ProviderMap {
    entries: HashMap<Token, ProviderRef>,
    order: Vec<Token>,
}

pub struct InjectorInner {
    registry: Arc<ProviderRegistry>,
    providers: RwLock<ProviderMap>,
    settings: Arc<SettingsService>,
}

/// Dependency injection container.
///
/// Cheap to clone, clones share the same providers and instances. The
/// container is registered in itself: resolving `Token::of::<Injector>()`
/// yields the container.
#[derive(Clone)]
pub struct Injector(Arc<InjectorInner>);

/// Non owning handle to an [`Injector`], held by bound properties
#[derive(Clone)]
pub struct WeakInjector(Weak<InjectorInner>);

impl WeakInjector {
    pub fn upgrade(&self) -> Option<Injector> {
        self.0.upgrade().map(Injector)
    }
}

impl Injector {
    /// Creates an empty container cloning its templates from `registry`
    pub fn new(registry: Arc<ProviderRegistry>) -> Self {
        registry.register(
            ProviderDescriptor::new(Token::of::<Injector>())
                .scope(ProviderScope::Singleton)
                .global(true),
        );
        registry.register(
            ProviderDescriptor::class::<SettingsService>()
                .scope(ProviderScope::Singleton)
                .global(true),
        );

        let settings = Arc::new(SettingsService::new());
        let injector = Injector(Arc::new(InjectorInner {
            registry,
            providers: RwLock::default(),
            settings: settings.clone(),
        }));

        injector.fork_provider(&Token::of::<Injector>(), None);
        injector.fork_provider(
            &Token::of::<SettingsService>(),
            Some(Instance::from_arc(settings)),
        );
        injector
    }

    pub fn downgrade(&self) -> WeakInjector {
        WeakInjector(Arc::downgrade(&self.0))
    }

    pub fn registry(&self) -> &Arc<ProviderRegistry> {
        &self.0.registry
    }

    pub fn settings(&self) -> Arc<SettingsService> {
        self.0.settings.clone()
    }

    fn is_self(token: &Token) -> bool {
        *token == Token::of::<Injector>()
    }

    fn providers(&self) -> RwLockReadGuard<'_, ProviderMap> {
        self.0.providers.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn set(&self, token: Token, provider: ProviderRef) {
        let mut providers = self.0.providers.write().unwrap_or_else(PoisonError::into_inner);
        if providers.entries.insert(token.clone(), provider).is_none() {
            providers.order.push(token);
        }
    }

    /// Registers a provider in this container.
    ///
    /// A registry template is created from the descriptor if the token has
    /// none. The template is cloned and every field set on the descriptor is
    /// copied onto the clone. Calling this again for the same token replaces
    /// the container's copy, never the template.
    pub fn add_provider(&self, descriptor: impl Into<ProviderDescriptor>) -> &Self {
        let descriptor = descriptor.into();
        let token = descriptor.provide.clone();
        let registry = self.registry();

        registry.register(descriptor.clone());
        let provider = match registry.get(&token) {
            Some(mut template) => {
                template.apply(descriptor, registry.metadata());
                template
            }
            None => Provider::from_descriptor(descriptor, registry.metadata()),
        };

        debug!("Adding provider {token}");
        self.set(token, Arc::new(RwLock::new(provider)));
        self
    }

    pub fn add_class<C: Component>(&self) -> &Self {
        self.add_provider(ProviderDescriptor::class::<C>())
    }

    pub fn get_provider(&self, token: &Token) -> Option<ProviderRef> {
        self.providers().entries.get(token).cloned()
    }

    pub fn has_provider(&self, token: &Token) -> bool {
        self.providers().entries.contains_key(token)
    }

    /// The instance cached for `token`, if the token is registered and was
    /// constructed
    pub fn get_instance(&self, token: &Token) -> Option<Instance> {
        if Self::is_self(token) {
            return Some(Instance::new(self.clone()));
        }
        let provider = self.get_provider(token)?;
        let instance = read(&provider).instance().cloned();
        instance
    }

    pub fn get<T: Injectable>(&self, token: &Token) -> Option<Arc<T>> {
        self.get_instance(token)?.downcast().ok()
    }

    /// True only if an instance exists, see [`has_provider`](Self::has_provider)
    pub fn has(&self, token: &Token) -> bool {
        self.get_instance(token).is_some()
    }

    /// Clones the registry template of `token` into this container with the
    /// given instance
    pub fn fork_provider(&self, token: &Token, instance: Option<Instance>) -> Option<ProviderRef> {
        let mut provider = self.registry().get(token)?;
        provider.set_instance(instance);

        let provider = Arc::new(RwLock::new(provider));
        self.set(token.clone(), provider.clone());
        Some(provider)
    }

    /// Makes `alias` resolve to the same provider, and so the same instance,
    /// as `existing`
    pub fn create_alias(&self, existing: &Token, alias: impl Into<Token>) -> bool {
        let Some(provider) = self.get_provider(existing) else {
            return false;
        };
        let alias = alias.into();
        debug!("Aliasing {existing} as {alias}");
        self.set(alias, provider);
        true
    }

    /// Every token with its provider, in registration order
    pub fn entries(&self) -> Vec<(Token, ProviderRef)> {
        let providers = self.providers();
        providers
            .order
            .iter()
            .filter_map(|token| {
                providers
                    .entries
                    .get(token)
                    .map(|provider| (token.clone(), provider.clone()))
            })
            .collect()
    }

    /// Distinct providers, optionally of one type. Aliased providers are
    /// listed once.
    pub fn get_providers(&self, provider_type: Option<&ProviderType>) -> Vec<ProviderRef> {
        let mut distinct: Vec<ProviderRef> = Vec::new();
        for (_, provider) in self.entries() {
            if distinct.iter().any(|known| Arc::ptr_eq(known, &provider)) {
                continue;
            }
            if provider_type.is_some_and(|wanted| read(&provider).provider_type() != wanted) {
                continue;
            }
            distinct.push(provider);
        }
        distinct
    }

    pub fn tokens(&self) -> Vec<Token> {
        self.providers().order.clone()
    }

    pub fn len(&self) -> usize {
        self.providers().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read only view over the providers of one type
    pub fn view(&self, provider_type: ProviderType) -> ProviderView {
        ProviderView::of_type(self.clone(), provider_type)
    }

    /// Static dependency graph of the registered providers
    pub fn dependency_graph(&self) -> DependencyGraph {
        DependencyGraph::new(self)
    }
}

impl fmt::Debug for Injector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_struct("Injector");
        for (token, provider) in self.entries() {
            let state = if read(&provider).instance().is_some() {
                "constructed"
            } else {
                "registered"
            };
            map.field(&token.to_string(), &state);
        }
        map.finish()
    }
}
