use std::{
    fmt,
    sync::{Arc, RwLock},
};

use crate::{
    component::{ClassDef, Component, Dependencies},
    errors::InjectionError,
    metadata::{MetadataStore, Store},
    scope::{ProviderScope, ProviderType},
    token::Token,
    types::{DynError, Injectable, Instance},
};

/// A provider shared between the tokens of a container
pub type ProviderRef = Arc<RwLock<Provider>>;

/// Type erased factory, called with the resolved dependencies
pub type FactoryFn = Arc<dyn Fn(Dependencies) -> Result<Instance, DynError> + Send + Sync>;

/// A fixed value, or a callable producing the value on construction
#[derive(Clone)]
pub enum UseValue {
    Value(Instance),
    Call(Arc<dyn Fn() -> Instance + Send + Sync>),
}

impl UseValue {
    fn produce(&self) -> Instance {
        match self {
            UseValue::Value(instance) => instance.clone(),
            UseValue::Call(call) => call(),
        }
    }
}

/// Resolves to the provider of the component one level up the construction
/// chain
pub struct ParentProvider;

/// How to produce an instance for a token.
///
/// Providers are registered as templates in the
/// [`ProviderRegistry`](crate::ProviderRegistry) and cloned into every
/// container, so each container owns its cached instance and scope override.
pub struct Provider {
    provide: Token,
    use_class: Option<ClassDef>,
    use_factory: Option<FactoryFn>,
    use_value: Option<UseValue>,
    deps: Option<Vec<Token>>,
    scope: Option<ProviderScope>,
    store: Option<Store>,
    instance: Option<Instance>,
    provider_type: ProviderType,
    alias: bool,
    global: bool,
}

impl Provider {
    pub fn new(provide: impl Into<Token>) -> Self {
        Provider {
            provide: provide.into(),
            use_class: None,
            use_factory: None,
            use_value: None,
            deps: None,
            scope: None,
            store: None,
            instance: None,
            provider_type: ProviderType::default(),
            alias: false,
            global: false,
        }
    }

    /// Normalizes a partial descriptor into a full provider
    pub fn from_descriptor(descriptor: ProviderDescriptor, metadata: &MetadataStore) -> Self {
        let mut provider = Provider::new(descriptor.provide.clone());
        if let Some(info) = provider.provide.type_info() {
            provider.store = metadata.get(info.type_id);
        }
        provider.apply(descriptor, metadata);
        provider
    }

    /// Copies every field set in `descriptor` onto this provider
    pub fn apply(&mut self, descriptor: ProviderDescriptor, metadata: &MetadataStore) {
        let ProviderDescriptor {
            provide: _,
            use_class,
            use_factory,
            use_value,
            deps,
            scope,
            provider_type,
            global,
        } = descriptor;

        if let Some(class) = use_class {
            self.store = Some(metadata.from_class(&class));
            self.use_class = Some(class);
        }
        if use_factory.is_some() {
            self.use_factory = use_factory;
        }
        if use_value.is_some() {
            self.use_value = use_value;
        }
        if deps.is_some() {
            self.deps = deps;
        }
        if let Some(provider_type) = provider_type {
            self.provider_type = provider_type;
        }
        if let Some(global) = global {
            self.global = global;
        }
        if let Some(scope) = scope {
            self.set_scope(scope);
        }
    }

    pub fn provide(&self) -> &Token {
        &self.provide
    }

    pub fn use_class(&self) -> Option<ClassDef> {
        self.use_class
    }

    pub fn use_factory(&self) -> Option<&FactoryFn> {
        self.use_factory.as_ref()
    }

    pub fn use_value(&self) -> Option<&UseValue> {
        self.use_value.as_ref()
    }

    /// Explicit dependencies. When absent, the class dependencies are used.
    pub fn deps(&self) -> Option<&[Token]> {
        self.deps.as_deref()
    }

    pub fn deps_mut(&mut self) -> &mut Vec<Token> {
        self.deps.get_or_insert_with(Vec::new)
    }

    pub fn set_deps(&mut self, deps: Vec<Token>) {
        self.deps = Some(deps);
    }

    /// Dependencies to resolve before construction, in constructor order
    pub fn dependencies(&self) -> Vec<Token> {
        if self.use_factory.is_some() || self.use_value.is_some() {
            return self.deps.clone().unwrap_or_default();
        }
        match (&self.deps, &self.use_class) {
            (Some(deps), _) => deps.clone(),
            (None, Some(class)) => class.dependencies(),
            (None, None) => Vec::new(),
        }
    }

    /// The scope set on the class metadata, else the provider override
    pub fn explicit_scope(&self) -> Option<ProviderScope> {
        self.store
            .as_ref()
            .and_then(Store::scope)
            .or(self.scope)
    }

    pub fn scope(&self) -> ProviderScope {
        self.explicit_scope().unwrap_or_default()
    }

    /// Writes the class metadata when the provider has one, else the
    /// provider override
    pub fn set_scope(&mut self, scope: ProviderScope) {
        match &self.store {
            Some(store) => store.set_scope(scope),
            None => self.scope = Some(scope),
        }
    }

    /// Sets the provider override only, leaving shared class metadata alone
    pub(crate) fn set_default_scope(&mut self, scope: ProviderScope) {
        self.scope = Some(scope);
    }

    pub fn store(&self) -> Option<&Store> {
        self.store.as_ref()
    }

    pub fn instance(&self) -> Option<&Instance> {
        self.instance.as_ref()
    }

    pub fn set_instance(&mut self, instance: Option<Instance>) {
        self.instance = instance;
    }

    pub fn provider_type(&self) -> &ProviderType {
        &self.provider_type
    }

    pub fn set_provider_type(&mut self, provider_type: ProviderType) {
        self.provider_type = provider_type;
    }

    pub fn is_alias(&self) -> bool {
        self.alias
    }

    /// Marks this provider as registered under a secondary token
    pub(crate) fn mark_alias(&mut self) {
        self.alias = true;
    }

    pub fn is_global(&self) -> bool {
        self.global
    }

    /// Display name of the provided component
    pub fn class_name(&self) -> String {
        match &self.use_class {
            Some(class) => class.info.short_name(),
            None => self.provide.to_string(),
        }
    }

    /// Produces an instance with the active strategy, by precedence
    /// factory, value, class
    pub fn construct(&self, deps: Dependencies) -> Result<Instance, InjectionError> {
        let constructed = if let Some(factory) = &self.use_factory {
            factory(deps)
        } else if let Some(value) = &self.use_value {
            Ok(value.produce())
        } else if let Some(class) = &self.use_class {
            class.construct(deps)
        } else {
            return Err(InjectionError::NoStrategy(self.provide.clone()));
        };

        constructed.map_err(|error| InjectionError::construction(self.provide.clone(), error))
    }
}

/// An independent copy for a new container: the cached instance is reset and
/// the dependency list is copied.
impl Clone for Provider {
    fn clone(&self) -> Self {
        Provider {
            provide: self.provide.clone(),
            use_class: self.use_class,
            use_factory: self.use_factory.clone(),
            use_value: self.use_value.clone(),
            deps: self.deps.clone(),
            scope: self.scope,
            store: self.store.clone(),
            instance: None,
            provider_type: self.provider_type.clone(),
            alias: self.alias,
            global: self.global,
        }
    }
}

impl fmt::Debug for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Provider")
            .field("provide", &self.provide)
            .field("use_class", &self.use_class)
            .field("use_factory", &self.use_factory.is_some())
            .field("use_value", &self.use_value.is_some())
            .field("deps", &self.deps)
            .field("scope", &self.explicit_scope())
            .field("instance", &self.instance)
            .field("type", &self.provider_type)
            .field("alias", &self.alias)
            .field("global", &self.global)
            .finish()
    }
}

/// A partial provider, used to register templates and to override fields of
/// a container's copy.
///
/// ```rust
/// use trellis_di::{ProviderDescriptor, ProviderScope, ProviderType, Token};
///
/// let descriptor = ProviderDescriptor::value(Token::name("api.prefix"), "/rest")
///     .provider_type(ProviderType::Value)
///     .scope(ProviderScope::Singleton);
/// assert_eq!(descriptor.provide, Token::name("api.prefix"));
/// ```
#[derive(Clone)]
pub struct ProviderDescriptor {
    pub provide: Token,
    pub use_class: Option<ClassDef>,
    pub use_factory: Option<FactoryFn>,
    pub use_value: Option<UseValue>,
    pub deps: Option<Vec<Token>>,
    pub scope: Option<ProviderScope>,
    pub provider_type: Option<ProviderType>,
    pub global: Option<bool>,
}

impl ProviderDescriptor {
    pub fn new(provide: impl Into<Token>) -> Self {
        ProviderDescriptor {
            provide: provide.into(),
            use_class: None,
            use_factory: None,
            use_value: None,
            deps: None,
            scope: None,
            provider_type: None,
            global: None,
        }
    }

    /// A component provided under its own type
    pub fn class<C: Component>() -> Self {
        Self::new(Token::of::<C>()).use_class::<C>()
    }

    /// A component provided under a fixed value
    pub fn value<T: Injectable>(provide: impl Into<Token>, value: T) -> Self {
        Self::new(provide).use_instance(Instance::new(value))
    }

    /// A value computed on each construction
    pub fn value_fn<T, F>(provide: impl Into<Token>, produce: F) -> Self
    where
        T: Injectable,
        F: Fn() -> T + Send + Sync + 'static,
    {
        let mut descriptor = Self::new(provide);
        descriptor.use_value = Some(UseValue::Call(Arc::new(move || Instance::new(produce()))));
        descriptor
    }

    /// A component produced by `factory`
    pub fn factory<T, F>(provide: impl Into<Token>, factory: F) -> Self
    where
        T: Injectable,
        F: Fn(Dependencies) -> Result<T, DynError> + Send + Sync + 'static,
    {
        let mut descriptor = Self::new(provide);
        descriptor.use_factory = Some(Arc::new(move |deps| factory(deps).map(Instance::new)));
        descriptor
    }

    pub fn use_class<C: Component>(mut self) -> Self {
        self.use_class = Some(ClassDef::of::<C>());
        self
    }

    pub fn use_instance(mut self, instance: Instance) -> Self {
        self.use_value = Some(UseValue::Value(instance));
        self
    }

    pub fn deps(mut self, deps: Vec<Token>) -> Self {
        self.deps = Some(deps);
        self
    }

    pub fn scope(mut self, scope: ProviderScope) -> Self {
        self.scope = Some(scope);
        self
    }

    pub fn provider_type(mut self, provider_type: ProviderType) -> Self {
        self.provider_type = Some(provider_type);
        self
    }

    pub fn global(mut self, global: bool) -> Self {
        self.global = Some(global);
        self
    }
}

impl From<Token> for ProviderDescriptor {
    fn from(provide: Token) -> Self {
        ProviderDescriptor::new(provide)
    }
}

impl From<&'static str> for ProviderDescriptor {
    fn from(provide: &'static str) -> Self {
        ProviderDescriptor::new(provide)
    }
}

impl fmt::Debug for ProviderDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderDescriptor")
            .field("provide", &self.provide)
            .field("use_class", &self.use_class)
            .field("deps", &self.deps)
            .field("scope", &self.scope)
            .field("provider_type", &self.provider_type)
            .finish_non_exhaustive()
    }
}
