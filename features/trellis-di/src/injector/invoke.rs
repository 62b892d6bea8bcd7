use std::{borrow::Cow, fmt, sync::Arc};

use tracing::debug;

use crate::{
    component::{ClassDef, Component, Dependencies},
    errors::{InjectionError, InjectionScopeError, RequireError},
    injector::{read, Injector},
    locals::LocalsContainer,
    provider::{FactoryFn, ParentProvider, Provider},
    scope::ProviderScope,
    token::Token,
    types::{DynError, Injectable, Instance},
};

/// What to construct
#[derive(Clone)]
pub enum InvokeTarget {
    /// A registered token, constructed with its provider
    Token(Token),
    /// A class, constructed with its provider if registered, else directly
    Class(ClassDef),
    /// A plain function, called with its resolved dependencies
    Function {
        token: Token,
        deps: Vec<Token>,
        call: FactoryFn,
    },
}

impl InvokeTarget {
    pub fn function<T, F>(token: impl Into<Token>, deps: Vec<Token>, call: F) -> Self
    where
        T: Injectable,
        F: Fn(Dependencies) -> Result<T, DynError> + Send + Sync + 'static,
    {
        InvokeTarget::Function {
            token: token.into(),
            deps,
            call: Arc::new(move |deps| call(deps).map(Instance::new)),
        }
    }

    pub fn token(&self) -> Token {
        match self {
            InvokeTarget::Token(token) | InvokeTarget::Function { token, .. } => token.clone(),
            InvokeTarget::Class(class) => class.token(),
        }
    }
}

impl From<Token> for InvokeTarget {
    fn from(token: Token) -> Self {
        InvokeTarget::Token(token)
    }
}

impl From<&Token> for InvokeTarget {
    fn from(token: &Token) -> Self {
        InvokeTarget::Token(token.clone())
    }
}

impl From<ClassDef> for InvokeTarget {
    fn from(class: ClassDef) -> Self {
        InvokeTarget::Class(class)
    }
}

impl fmt::Debug for InvokeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InvokeTarget::Token(token) => f.debug_tuple("Token").field(token).finish(),
            InvokeTarget::Class(class) => f.debug_tuple("Class").field(class).finish(),
            InvokeTarget::Function { token, deps, .. } => f
                .debug_struct("Function")
                .field("token", token)
                .field("deps", deps)
                .finish_non_exhaustive(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct InvokeOptions {
    /// Replaces the dependencies of the provider or class
    pub deps: Option<Vec<Token>>,
    /// Scope of the invocation, defaults to the scope of the provider
    pub scope: Option<ProviderScope>,
    /// Request and instance scoped dependencies may only be constructed
    /// within a scoped invocation
    pub use_scope: bool,
    /// Token resolved through `ParentProvider`
    pub parent: Option<Token>,
}

#[derive(Debug, Clone)]
pub struct InvokeMethodOptions {
    /// The class owning the method
    pub target: Token,
    pub method_name: Cow<'static, str>,
    pub deps: Vec<Token>,
}

enum Construct {
    Provider(Provider),
    Class(ClassDef),
    Function(FactoryFn),
}

impl Construct {
    fn run(&self, token: &Token, deps: Dependencies) -> Result<Instance, InjectionError> {
        match self {
            Construct::Provider(provider) => provider.construct(deps),
            Construct::Class(class) => class
                .construct(deps)
                .map_err(|error| InjectionError::construction(token.clone(), error)),
            Construct::Function(call) => {
                call(deps).map_err(|error| InjectionError::construction(token.clone(), error))
            }
        }
    }
}

struct InvokeSettings {
    token: Token,
    deps: Vec<Token>,
    scope: Option<ProviderScope>,
    use_scope: bool,
    parent: Option<Token>,
    construct: Construct,
}

/// One dependency to resolve for `token`
struct ServiceRequest<'a> {
    token: &'a Token,
    dependency: &'a Token,
    parent: Option<&'a Token>,
    parent_scope: Option<ProviderScope>,
    use_scope: bool,
}

impl Injector {
    /// Constructs `target`, resolving its dependencies first.
    ///
    /// Dependencies are resolved left to right through `locals`, so instances
    /// resolved earlier in the same call tree are reused. The constructed
    /// instance is not cached in the provider.
    pub fn invoke(
        &self,
        target: impl Into<InvokeTarget>,
        locals: &mut LocalsContainer,
        options: InvokeOptions,
    ) -> Result<Instance, InjectionError> {
        self.invoke_in_chain(target.into(), locals, options, &mut Vec::new())
    }

    /// Constructs `C` with a fresh locals container
    pub fn invoke_class<C: Component>(&self) -> Result<Arc<C>, InjectionError> {
        self.invoke(ClassDef::of::<C>(), &mut LocalsContainer::new(), InvokeOptions::default())?
            .downcast::<C>()
            .map_err(|actual_type| {
                RequireError::DowncastFailed {
                    required_type: std::any::type_name::<C>(),
                    actual_type,
                }
                .into()
            })
    }

    /// Scope aware invocation for one logical request.
    ///
    /// - singleton: the cached instance
    /// - request: constructed once per `locals`
    /// - instance: constructed on every call
    pub fn invoke_request(
        &self,
        token: &Token,
        locals: &mut LocalsContainer,
        options: InvokeOptions,
    ) -> Result<Instance, InjectionError> {
        let provider = self
            .get_provider(token)
            .ok_or_else(|| InjectionError::ComponentNotFound(token.clone()))?;

        if let Some(instance) = locals.get(token) {
            return Ok(instance.clone());
        }

        let (provide, scope) = {
            let provider = read(&provider);
            (provider.provide().clone(), provider.scope())
        };

        match scope {
            ProviderScope::Singleton => self
                .get_instance(token)
                .ok_or_else(|| InjectionError::NotConstructed(token.clone())),
            ProviderScope::Request => {
                let options = InvokeOptions {
                    use_scope: true,
                    ..options
                };
                let instance = self.invoke(provide, locals, options)?;
                locals.insert(token.clone(), instance.clone());
                Ok(instance)
            }
            ProviderScope::Instance => self.invoke(provide, locals, InvokeOptions::default()),
        }
    }

    /// Calls `handler` with the dependencies listed in `options`
    pub fn invoke_method<R>(
        &self,
        handler: impl FnOnce(Dependencies) -> Result<R, DynError>,
        locals: &mut LocalsContainer,
        options: InvokeMethodOptions,
    ) -> Result<R, InjectionError> {
        let mut chain = Vec::new();
        let services = options
            .deps
            .iter()
            .map(|dependency| {
                let request = ServiceRequest {
                    token: &options.target,
                    dependency,
                    parent: None,
                    parent_scope: None,
                    use_scope: false,
                };
                self.map_services(request, locals, &mut chain)
            })
            .collect::<Result<Vec<_>, _>>()?;

        handler(Dependencies::new(services)).map_err(|error| {
            let method = Token::name(format!("{}.{}", options.target, options.method_name));
            InjectionError::construction(method, error)
        })
    }

    fn invoke_in_chain(
        &self,
        target: InvokeTarget,
        locals: &mut LocalsContainer,
        options: InvokeOptions,
        chain: &mut Vec<Token>,
    ) -> Result<Instance, InjectionError> {
        let settings = self.map_invoke_options(target, options)?;

        if chain.contains(&settings.token) {
            let mut chain = chain.clone();
            chain.push(settings.token.clone());
            return Err(InjectionError::CircularDependency {
                token: settings.token,
                chain,
            });
        }

        chain.push(settings.token.clone());
        let services = self.resolve_all(&settings, locals, chain);
        chain.pop();

        let instance = settings
            .construct
            .run(&settings.token, Dependencies::new(services?))?;
        debug!("Constructed {}", settings.token);

        self.bind_injectable_properties(&instance)?;
        Ok(instance)
    }

    fn resolve_all(
        &self,
        settings: &InvokeSettings,
        locals: &mut LocalsContainer,
        chain: &mut Vec<Token>,
    ) -> Result<Vec<Instance>, InjectionError> {
        let mut services = Vec::with_capacity(settings.deps.len());
        for dependency in &settings.deps {
            let request = ServiceRequest {
                token: &settings.token,
                dependency,
                parent: settings.parent.as_ref(),
                parent_scope: settings.scope,
                use_scope: settings.use_scope,
            };
            services.push(self.map_services(request, locals, chain)?);
        }
        Ok(services)
    }

    fn map_invoke_options(
        &self,
        target: InvokeTarget,
        options: InvokeOptions,
    ) -> Result<InvokeSettings, InjectionError> {
        let InvokeOptions {
            deps,
            scope,
            use_scope,
            parent,
        } = options;

        let (token, deps, scope, construct) = match target {
            InvokeTarget::Function { token, deps: own, call } => {
                (token, deps.unwrap_or(own), scope, Construct::Function(call))
            }
            InvokeTarget::Class(class) if !self.has_provider(&class.token()) => {
                let store = self.registry().metadata().from_class(&class);
                let deps = deps.unwrap_or_else(|| class.dependencies());
                let scope = scope.or_else(|| store.scope());
                (class.token(), deps, scope, Construct::Class(class))
            }
            target => {
                let token = target.token();
                let provider = self
                    .get_provider(&token)
                    .ok_or_else(|| InjectionError::ComponentNotFound(token.clone()))?;
                let provider = read(&provider).clone();

                let deps = deps.unwrap_or_else(|| provider.dependencies());
                let scope = scope.or_else(|| provider.explicit_scope());
                (token, deps, scope, Construct::Provider(provider))
            }
        };

        Ok(InvokeSettings {
            token,
            deps,
            scope,
            use_scope,
            parent,
            construct,
        })
    }

    fn map_services(
        &self,
        request: ServiceRequest<'_>,
        locals: &mut LocalsContainer,
        chain: &mut Vec<Token>,
    ) -> Result<Instance, InjectionError> {
        let ServiceRequest {
            token,
            dependency,
            parent,
            parent_scope,
            use_scope,
        } = request;

        if let Some(local) = locals.get(dependency) {
            return Ok(local.clone());
        }

        let not_found = || InjectionError::NotFound {
            requester: token.clone(),
            dependency: dependency.clone(),
        };

        if *dependency == Token::of::<Provider>() {
            return self.get_provider(token).map(Instance::new).ok_or_else(not_found);
        }
        if *dependency == Token::of::<ParentProvider>() {
            return parent
                .and_then(|parent| self.get_provider(parent))
                .map(Instance::new)
                .ok_or_else(not_found);
        }
        if *dependency == Token::of::<Injector>() {
            return Ok(Instance::new(self.clone()));
        }

        let provider = self.get_provider(dependency).ok_or_else(not_found)?;
        let (provide, scope, provider_type, instance) = {
            let provider = read(&provider);
            (
                provider.provide().clone(),
                provider.scope(),
                provider.provider_type().clone(),
                provider.instance().cloned(),
            )
        };

        if !self.registry().registry_settings(&provider_type).injectable {
            return Err(InjectionError::NotInjectable {
                requester: token.clone(),
                dependency: dependency.clone(),
            });
        }

        let rebuild = scope.requires_rebuild();
        if let (Some(instance), false) = (instance, rebuild) {
            return Ok(instance);
        }

        if rebuild && use_scope && parent_scope.is_none() {
            return Err(InjectionScopeError {
                dependency: provide,
                requester: token.clone(),
                scope,
            }
            .into());
        }

        let options = InvokeOptions {
            use_scope,
            parent: Some(token.clone()),
            ..Default::default()
        };
        match self.invoke_in_chain(InvokeTarget::Token(provide.clone()), locals, options, chain) {
            Ok(instance) => {
                if scope != ProviderScope::Instance {
                    locals.insert(provide, instance.clone());
                }
                Ok(instance)
            }
            Err(error @ InjectionError::CircularDependency { .. }) => Err(error),
            Err(error) => Err(InjectionError::Failed {
                requester: token.clone(),
                dependency: dependency.clone(),
                origin: error.into_origin(),
            }),
        }
    }

    /// Applies the property and method bindings of the instance's class
    fn bind_injectable_properties(&self, instance: &Instance) -> Result<(), InjectionError> {
        let Some(store) = self.registry().metadata().get(instance.info.type_id) else {
            return Ok(());
        };
        for binding in store.bindings() {
            binding.apply(instance, self)?;
        }
        Ok(())
    }
}
