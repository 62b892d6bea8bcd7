//! Slots filled when an instance is bound to its container.
//!
//! A component declares the slot as a plain field and registers the binding
//! in [`Component::metadata`](crate::Component::metadata). The container
//! fills every slot right after construction; reading an unbound slot yields
//! `None`.

use std::{
    fmt,
    marker::PhantomData,
    sync::{Arc, OnceLock},
};

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::{
    errors::InjectionError,
    injector::{Injector, WeakInjector},
    locals::LocalsContainer,
    settings::SettingsService,
    token::Token,
    types::Injectable,
};

/// Lazily injected property, resolved from the container on every access.
///
/// As the slot holds no instance, a component can reference providers that
/// depend on itself.
pub struct Inject<T> {
    handle: OnceLock<(WeakInjector, Token)>,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for Inject<T> {
    fn default() -> Self {
        Inject {
            handle: OnceLock::new(),
            _marker: PhantomData,
        }
    }
}

impl<T: Injectable> Inject<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&self, injector: WeakInjector, token: Token) {
        let _ = self.handle.set((injector, token));
    }

    pub fn is_bound(&self) -> bool {
        self.handle.get().is_some()
    }

    pub fn token(&self) -> Option<&Token> {
        self.handle.get().map(|(_, token)| token)
    }

    /// The current instance behind the bound token
    pub fn get(&self) -> Option<Arc<T>> {
        let (injector, token) = self.handle.get()?;
        injector.upgrade()?.get::<T>(token)
    }
}

impl<T> fmt::Debug for Inject<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Inject")
            .field("token", &self.handle.get().map(|(_, token)| token))
            .finish()
    }
}

/// A settings expression with its default, shared by every instance of a
/// class
#[derive(Debug, Clone)]
pub(crate) struct SettingTemplate {
    expression: String,
    default: Option<serde_json::Value>,
}

impl SettingTemplate {
    pub(crate) fn attach(&self, settings: Arc<SettingsService>) -> SettingHandle {
        SettingHandle {
            settings,
            expression: self.expression.clone(),
            default: self.default.clone(),
        }
    }
}

/// A settings expression bound to the container settings
#[derive(Clone)]
pub(crate) struct SettingHandle {
    settings: Arc<SettingsService>,
    expression: String,
    default: Option<serde_json::Value>,
}

impl SettingHandle {
    pub(crate) fn template<V: Serialize>(expression: &str, default: Option<V>) -> SettingTemplate {
        let default = default.and_then(|value| match serde_json::to_value(value) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!("Ignoring default of '{expression}': {error}");
                None
            }
        });
        SettingTemplate {
            expression: expression.to_string(),
            default,
        }
    }

    fn read<V: DeserializeOwned>(&self) -> Option<V> {
        let value = self
            .settings
            .get_value(&self.expression)
            .filter(|value| !value.is_null())
            .or_else(|| self.default.clone())?;

        match serde_json::from_value(value) {
            Ok(value) => Some(value),
            Err(error) => {
                warn!("Settings value '{}' has an unexpected type: {error}", self.expression);
                None
            }
        }
    }

    fn write<V: Serialize>(&self, value: V) -> Result<(), InjectionError> {
        self.settings
            .set(&self.expression, value)
            .map_err(|error| InjectionError::Settings {
                expression: self.expression.clone(),
                origin: Arc::new(error),
            })
    }
}

/// Settings backed property. Reads follow the settings, writes go back to
/// them.
pub struct Value<V> {
    handle: OnceLock<SettingHandle>,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Default for Value<V> {
    fn default() -> Self {
        Value {
            handle: OnceLock::new(),
            _marker: PhantomData,
        }
    }
}

impl<V: Serialize + DeserializeOwned> Value<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&self, handle: SettingHandle) {
        let _ = self.handle.set(handle);
    }

    /// The settings value, or the default when it is not set
    pub fn get(&self) -> Option<V> {
        self.handle.get()?.read()
    }

    pub fn set(&self, value: V) -> Result<(), InjectionError> {
        self.handle
            .get()
            .ok_or_else(|| InjectionError::Unbound("value".to_string()))?
            .write(value)
    }
}

impl<V> fmt::Debug for Value<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Value")
            .field("expression", &self.handle.get().map(|h| &h.expression))
            .finish()
    }
}

/// Read only settings property. Every access returns a fresh snapshot,
/// shared immutably, so callers never observe or cause later changes.
pub struct Constant<V> {
    handle: OnceLock<SettingHandle>,
    _marker: PhantomData<fn() -> V>,
}

impl<V> Default for Constant<V> {
    fn default() -> Self {
        Constant {
            handle: OnceLock::new(),
            _marker: PhantomData,
        }
    }
}

impl<V: DeserializeOwned> Constant<V> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&self, handle: SettingHandle) {
        let _ = self.handle.set(handle);
    }

    pub fn get(&self) -> Option<Arc<V>> {
        self.handle.get()?.read().map(Arc::new)
    }
}

impl<V> fmt::Debug for Constant<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Constant")
            .field("expression", &self.handle.get().map(|h| &h.expression))
            .finish()
    }
}

pub(crate) type MethodCall<R> =
    Arc<dyn Fn(&Injector, &mut LocalsContainer) -> Result<R, InjectionError> + Send + Sync>;

/// Method whose parameters are resolved from the container on every call
pub struct InjectedMethod<R> {
    handle: OnceLock<(WeakInjector, MethodCall<R>)>,
}

impl<R> Default for InjectedMethod<R> {
    fn default() -> Self {
        InjectedMethod {
            handle: OnceLock::new(),
        }
    }
}

impl<R> InjectedMethod<R> {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn bind(&self, injector: WeakInjector, call: MethodCall<R>) {
        let _ = self.handle.set((injector, call));
    }

    /// Calls the method with parameters resolved in a fresh locals container
    pub fn call(&self) -> Result<R, InjectionError> {
        self.call_with(&mut LocalsContainer::new())
    }

    /// Calls the method, resolving parameters through `locals` first
    pub fn call_with(&self, locals: &mut LocalsContainer) -> Result<R, InjectionError> {
        let (injector, call) = self
            .handle
            .get()
            .ok_or_else(|| InjectionError::Unbound("method".to_string()))?;
        let injector = injector
            .upgrade()
            .ok_or_else(|| InjectionError::Unbound("method".to_string()))?;
        call(&injector, locals)
    }
}

impl<R> fmt::Debug for InjectedMethod<R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectedMethod")
            .field("bound", &self.handle.get().is_some())
            .finish()
    }
}
