use std::{
    any::{type_name, Any, TypeId},
    borrow::Cow,
    collections::HashMap,
    fmt,
    marker::PhantomData,
    sync::{Arc, PoisonError, RwLock},
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::{
    component::{ClassDef, Component, Dependencies},
    errors::{InjectionError, RequireError},
    hooks::{HookFn, HookOutput},
    injector::{
        bindings::{Constant, Inject, InjectedMethod, MethodCall, SettingHandle, Value},
        invoke::InvokeMethodOptions,
        Injector,
    },
    locals::LocalsContainer,
    scope::ProviderScope,
    token::Token,
    types::{DynError, Injectable, Instance},
};

/// Class metadata of every annotated type, keyed by `TypeId`
#[derive(Default)]
pub struct MetadataStore {
    stores: RwLock<HashMap<TypeId, Store>>,
}

impl MetadataStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, type_id: TypeId) -> Option<Store> {
        let stores = self.stores.read().unwrap_or_else(PoisonError::into_inner);
        stores.get(&type_id).cloned()
    }

    /// Returns the store of a class, running its `metadata` annotation the
    /// first time
    pub fn from_class(&self, class: &ClassDef) -> Store {
        let store = self.from_type_id(class.info.type_id);
        if store.mark_annotated() {
            debug!("Annotating {}", class.info);
            class.annotate(&store);
        }
        store
    }

    /// Returns the store of `T`, creating an empty one if needed
    pub fn from_type<T: 'static>(&self) -> Store {
        self.from_type_id(TypeId::of::<T>())
    }

    fn from_type_id(&self, type_id: TypeId) -> Store {
        if let Some(store) = self.get(type_id) {
            return store;
        }
        let mut stores = self.stores.write().unwrap_or_else(PoisonError::into_inner);
        stores.entry(type_id).or_default().clone()
    }

    pub fn len(&self) -> usize {
        self.stores
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Metadata of one class: scope, bound properties, lifecycle hooks and
/// arbitrary typed entries. Clones share the same data.
#[derive(Clone, Default)]
pub struct Store(Arc<RwLock<StoreInner>>);

#[derive(Default)]
struct StoreInner {
    annotated: bool,
    scope: Option<ProviderScope>,
    bindings: Vec<PropertyBinding>,
    hooks: HashMap<Cow<'static, str>, Vec<HookFn>>,
    entries: HashMap<Cow<'static, str>, Arc<dyn Any + Send + Sync>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, StoreInner> {
        self.0.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, StoreInner> {
        self.0.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns true only for the first caller
    fn mark_annotated(&self) -> bool {
        let mut inner = self.write();
        !std::mem::replace(&mut inner.annotated, true)
    }

    pub fn scope(&self) -> Option<ProviderScope> {
        self.read().scope
    }

    pub fn set_scope(&self, scope: ProviderScope) {
        self.write().scope = Some(scope);
    }

    pub fn bindings(&self) -> Vec<PropertyBinding> {
        self.read().bindings.clone()
    }

    /// Adds a binding, replacing any binding with the same key
    pub fn add_binding(&self, binding: PropertyBinding) {
        let mut inner = self.write();
        inner.bindings.retain(|existing| existing.key != binding.key);
        inner.bindings.push(binding);
    }

    pub fn hooks(&self, event: &str) -> Vec<HookFn> {
        self.read().hooks.get(event).cloned().unwrap_or_default()
    }

    pub fn has_hook(&self, event: &str) -> bool {
        self.read().hooks.contains_key(event)
    }

    pub fn add_hook(&self, event: impl Into<Cow<'static, str>>, hook: HookFn) {
        self.write().hooks.entry(event.into()).or_default().push(hook);
    }

    /// Stores an arbitrary entry under `key`
    pub fn set<V: Injectable>(&self, key: impl Into<Cow<'static, str>>, value: V) {
        self.write().entries.insert(key.into(), Arc::new(value));
    }

    pub fn get<V: Injectable>(&self, key: &str) -> Option<Arc<V>> {
        let entry = self.read().entries.get(key).cloned()?;
        entry.downcast().ok()
    }

    pub fn ptr_eq(&self, other: &Store) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.read();
        f.debug_struct("Store")
            .field("scope", &inner.scope)
            .field("bindings", &inner.bindings)
            .field("hooks", &inner.hooks.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// How a property binding fills its slot
#[derive(Debug, Clone, PartialEq)]
pub enum BindingKind {
    /// Lazy reference to another provider
    Property(Token),
    /// Settings backed getter and setter
    Value(String),
    /// Settings backed snapshot
    Constant(String),
    /// Method with injected parameters
    Method(Vec<Token>),
    Custom,
}

pub(crate) type BindFn = Arc<dyn Fn(&Instance, &Injector) -> Result<(), InjectionError> + Send + Sync>;

/// A property or method binding, applied to every instance after
/// construction
#[derive(Clone)]
pub struct PropertyBinding {
    pub key: Cow<'static, str>,
    pub kind: BindingKind,
    bind: BindFn,
}

impl PropertyBinding {
    pub(crate) fn apply(&self, instance: &Instance, injector: &Injector) -> Result<(), InjectionError> {
        (self.bind)(instance, injector)
    }
}

impl fmt::Debug for PropertyBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PropertyBinding")
            .field("key", &self.key)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

fn downcast_self<C: Injectable>(instance: &Instance) -> Result<Arc<C>, InjectionError> {
    instance.downcast::<C>().map_err(|actual_type| {
        RequireError::DowncastFailed {
            required_type: type_name::<C>(),
            actual_type,
        }
        .into()
    })
}

/// Typed writer for the [`Store`] of `C`, handed to [`Component::metadata`]
pub struct ClassMetadata<C> {
    store: Store,
    _marker: PhantomData<fn() -> C>,
}

impl<C: Component> ClassMetadata<C> {
    pub(crate) fn new(store: Store) -> Self {
        ClassMetadata {
            store,
            _marker: PhantomData,
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn scope(&mut self, scope: ProviderScope) -> &mut Self {
        self.store.set_scope(scope);
        self
    }

    fn bind(
        &mut self,
        key: impl Into<Cow<'static, str>>,
        kind: BindingKind,
        bind: impl Fn(Arc<C>, &Injector) -> Result<(), InjectionError> + Send + Sync + 'static,
    ) -> &mut Self {
        self.store.add_binding(PropertyBinding {
            key: key.into(),
            kind,
            bind: Arc::new(move |instance: &Instance, injector: &Injector| {
                bind(downcast_self::<C>(instance)?, injector)
            }),
        });
        self
    }

    /// Binds an [`Inject`] field to `token`. The dependency is resolved on
    /// every access, so it may point back at `C`.
    pub fn property<T: Injectable>(
        &mut self,
        key: impl Into<Cow<'static, str>>,
        token: impl Into<Token>,
        field: fn(&C) -> &Inject<T>,
    ) -> &mut Self {
        let token = token.into();
        let bound = token.clone();
        self.bind(key, BindingKind::Property(token), move |this, injector| {
            field(&this).bind(injector.downgrade(), bound.clone());
            Ok(())
        })
    }

    /// Binds a [`Value`] field to the settings `expression`
    pub fn value<V: Serialize + DeserializeOwned + 'static>(
        &mut self,
        key: impl Into<Cow<'static, str>>,
        expression: &str,
        default: Option<V>,
        field: fn(&C) -> &Value<V>,
    ) -> &mut Self {
        let handle = SettingHandle::template(expression, default);
        self.bind(
            key,
            BindingKind::Value(expression.to_string()),
            move |this, injector| {
                field(&this).bind(handle.attach(injector.settings()));
                Ok(())
            },
        )
    }

    /// Binds a [`Constant`] field to the settings `expression`
    pub fn constant<V: Serialize + DeserializeOwned + 'static>(
        &mut self,
        key: impl Into<Cow<'static, str>>,
        expression: &str,
        default: Option<V>,
        field: fn(&C) -> &Constant<V>,
    ) -> &mut Self {
        let handle = SettingHandle::template(expression, default);
        self.bind(
            key,
            BindingKind::Constant(expression.to_string()),
            move |this, injector| {
                field(&this).bind(handle.attach(injector.settings()));
                Ok(())
            },
        )
    }

    /// Binds an [`InjectedMethod`] field. Every call resolves `deps` in a
    /// fresh locals container and runs `body` with them.
    pub fn method<R, F>(
        &mut self,
        key: &'static str,
        deps: Vec<Token>,
        field: fn(&C) -> &InjectedMethod<R>,
        body: F,
    ) -> &mut Self
    where
        R: 'static,
        F: Fn(&C, Dependencies) -> Result<R, DynError> + Send + Sync + 'static,
    {
        let body = Arc::new(body);
        let options = InvokeMethodOptions {
            target: Token::of::<C>(),
            method_name: Cow::Borrowed(key),
            deps: deps.clone(),
        };
        self.bind(key, BindingKind::Method(deps), move |this, injector| {
            let target = Arc::downgrade(&this);
            let body = body.clone();
            let options = options.clone();
            let call: MethodCall<R> = Arc::new(move |injector: &Injector, locals: &mut LocalsContainer| {
                let this = target
                    .upgrade()
                    .ok_or_else(|| InjectionError::Unbound(key.to_string()))?;
                injector.invoke_method(|deps| body(&this, deps), locals, options.clone())
            });
            field(&this).bind(injector.downgrade(), call);
            Ok(())
        })
    }

    /// Runs `bind` on every new instance
    pub fn custom<F>(&mut self, key: impl Into<Cow<'static, str>>, bind: F) -> &mut Self
    where
        F: Fn(&Injector, Arc<C>) -> Result<(), DynError> + Send + Sync + 'static,
    {
        self.bind(key, BindingKind::Custom, move |this, injector| {
            bind(injector, this).map_err(|error| InjectionError::construction(Token::of::<C>(), error))
        })
    }

    /// Registers a lifecycle hook for `event`
    pub fn on<F, O>(&mut self, event: impl Into<Cow<'static, str>>, hook: F) -> &mut Self
    where
        F: Fn(Arc<C>, &[Instance]) -> O + Send + Sync + 'static,
        O: Into<HookOutput>,
    {
        let hook: HookFn = Arc::new(move |instance: &Instance, args: &[Instance]| {
            match instance.downcast::<C>() {
                Ok(this) => hook(this, args).into(),
                Err(_) => HookOutput::Done,
            }
        });
        self.store.add_hook(event, hook);
        self
    }

    /// Stores an arbitrary entry in the class store
    pub fn set<V: Injectable>(&mut self, key: impl Into<Cow<'static, str>>, value: V) -> &mut Self {
        self.store.set(key, value);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::ON_INIT;

    struct Annotated;

    impl Component for Annotated {
        fn construct(_: Dependencies) -> Result<Self, DynError> {
            Ok(Annotated)
        }

        fn metadata(meta: &mut ClassMetadata<Self>) {
            meta.scope(ProviderScope::Request)
                .set("path", "/annotated")
                .on(ON_INIT, |_, _| ());
        }
    }

    #[test]
    fn annotates_classes_once() {
        let metadata = MetadataStore::new();
        let class = ClassDef::of::<Annotated>();

        let first = metadata.from_class(&class);
        first.set_scope(ProviderScope::Instance);
        let second = metadata.from_class(&class);

        assert!(first.ptr_eq(&second));
        assert_eq!(second.scope(), Some(ProviderScope::Instance));
        assert_eq!(metadata.len(), 1);
    }

    #[test]
    fn keeps_entries_and_hooks() {
        let metadata = MetadataStore::new();
        let store = metadata.from_class(&ClassDef::of::<Annotated>());

        assert_eq!(store.scope(), Some(ProviderScope::Request));
        assert_eq!(store.get::<&str>("path").as_deref(), Some(&"/annotated"));
        assert!(store.get::<u32>("path").is_none());
        assert!(store.has_hook(ON_INIT));
        assert_eq!(store.hooks(ON_INIT).len(), 1);
        assert!(store.hooks("$onDestroy").is_empty());
    }

    #[test]
    fn bare_type_stores_are_annotated_later() {
        let metadata = MetadataStore::new();
        let bare = metadata.from_type::<Annotated>();
        assert_eq!(bare.scope(), None);

        let annotated = metadata.from_class(&ClassDef::of::<Annotated>());
        assert!(bare.ptr_eq(&annotated));
        assert_eq!(bare.scope(), Some(ProviderScope::Request));
    }
}
