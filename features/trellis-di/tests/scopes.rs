use std::sync::Arc;

use futures::executor::block_on;
use rstest::rstest;
use trellis_di::{
    testing, ClassDef, ClassMetadata, Component, Dependencies, DynError, InjectionError,
    InvokeOptions, LocalsContainer, ProviderDescriptor, ProviderRegistry, ProviderScope, Token,
};

struct SingletonService;
impl Component for SingletonService {
    fn construct(_: Dependencies) -> Result<Self, DynError> {
        Ok(SingletonService)
    }
}

struct InstanceService;
impl Component for InstanceService {
    fn construct(_: Dependencies) -> Result<Self, DynError> {
        Ok(InstanceService)
    }

    fn metadata(meta: &mut ClassMetadata<Self>) {
        meta.scope(ProviderScope::Instance);
    }
}

struct ParentService {
    instance1: Arc<InstanceService>,
    instance2: Arc<InstanceService>,
}
impl Component for ParentService {
    fn dependencies() -> Vec<Token> {
        vec![Token::of::<InstanceService>(), Token::of::<InstanceService>()]
    }

    fn construct(mut deps: Dependencies) -> Result<Self, DynError> {
        Ok(ParentService {
            instance1: deps.take()?,
            instance2: deps.take()?,
        })
    }
}

fn registry() -> Arc<ProviderRegistry> {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_service::<SingletonService>();
    registry.register_service::<InstanceService>();
    registry.register_service::<ParentService>();
    registry
}

#[test]
fn singletons_are_shared() {
    let injector = block_on(testing::load_injector(registry())).unwrap();
    let token = Token::of::<SingletonService>();

    let first = injector.get::<SingletonService>(&token).unwrap();
    let second = injector
        .invoke_request(&token, &mut LocalsContainer::new(), InvokeOptions::default())
        .unwrap()
        .downcast::<SingletonService>()
        .unwrap();

    assert!(Arc::ptr_eq(&first, &second));
    assert!(Arc::ptr_eq(
        &first,
        &injector.get::<SingletonService>(&token).unwrap()
    ));
}

#[test]
fn instance_scoped_dependencies_are_never_shared() {
    let injector = block_on(testing::load_injector(registry())).unwrap();

    let parent = injector
        .get::<ParentService>(&Token::of::<ParentService>())
        .unwrap();

    assert!(!Arc::ptr_eq(&parent.instance1, &parent.instance2));
    assert!(injector.get_instance(&Token::of::<InstanceService>()).is_none());
}

#[rstest]
#[case::same_locals(true)]
#[case::separate_locals(false)]
fn instance_scope_is_fresh_per_resolution(#[case] shared_locals: bool) {
    let injector = block_on(testing::load_injector(registry())).unwrap();
    let token = Token::of::<InstanceService>();

    let mut first_locals = LocalsContainer::new();
    let mut second_locals = LocalsContainer::new();
    let first = injector
        .invoke_request(&token, &mut first_locals, InvokeOptions::default())
        .unwrap();
    let locals = if shared_locals {
        &mut first_locals
    } else {
        &mut second_locals
    };
    let second = injector
        .invoke_request(&token, locals, InvokeOptions::default())
        .unwrap();

    assert!(!first.ptr_eq(&second));
}

struct InnerService;
impl Component for InnerService {
    fn construct(_: Dependencies) -> Result<Self, DynError> {
        Ok(InnerService)
    }
}

struct OuterService {
    inner_service: Arc<InnerService>,
}
impl Component for OuterService {
    fn dependencies() -> Vec<Token> {
        vec![Token::of::<InnerService>()]
    }

    fn construct(mut deps: Dependencies) -> Result<Self, DynError> {
        Ok(OuterService {
            inner_service: deps.take()?,
        })
    }
}

struct RequestService {
    inner_service: Arc<InnerService>,
    outer_service: Arc<OuterService>,
}
impl Component for RequestService {
    fn dependencies() -> Vec<Token> {
        vec![Token::of::<InnerService>(), Token::of::<OuterService>()]
    }

    fn construct(mut deps: Dependencies) -> Result<Self, DynError> {
        Ok(RequestService {
            inner_service: deps.take()?,
            outer_service: deps.take()?,
        })
    }
}

fn request_registry() -> Arc<ProviderRegistry> {
    let registry = Arc::new(ProviderRegistry::new());
    for descriptor in [
        ProviderDescriptor::class::<InnerService>(),
        ProviderDescriptor::class::<OuterService>(),
        ProviderDescriptor::class::<RequestService>(),
    ] {
        registry.register(descriptor.scope(ProviderScope::Request));
    }
    registry
}

#[test]
fn request_scope_is_shared_within_one_request() {
    let injector = block_on(testing::load_injector(request_registry())).unwrap();
    let mut locals = LocalsContainer::new();

    let request = injector
        .invoke_request(
            &Token::of::<RequestService>(),
            &mut locals,
            InvokeOptions::default(),
        )
        .unwrap()
        .downcast::<RequestService>()
        .unwrap();

    assert!(Arc::ptr_eq(
        &request.inner_service,
        &request.outer_service.inner_service
    ));
    assert!(locals.contains(&Token::of::<RequestService>()));
}

#[test]
fn request_scope_is_isolated_across_requests() {
    let injector = block_on(testing::load_injector(request_registry())).unwrap();
    let outer = Token::of::<OuterService>();
    let request = Token::of::<RequestService>();

    let mut first = LocalsContainer::new();
    let outer_service = injector
        .invoke_request(&outer, &mut first, InvokeOptions::default())
        .unwrap()
        .downcast::<OuterService>()
        .unwrap();
    let request_service = injector
        .invoke_request(&request, &mut first, InvokeOptions::default())
        .unwrap()
        .downcast::<RequestService>()
        .unwrap();
    assert!(Arc::ptr_eq(
        &outer_service.inner_service,
        &request_service.inner_service
    ));

    let mut second = LocalsContainer::new();
    let other_request = injector
        .invoke_request(&request, &mut second, InvokeOptions::default())
        .unwrap()
        .downcast::<RequestService>()
        .unwrap();
    assert!(!Arc::ptr_eq(
        &request_service.inner_service,
        &other_request.inner_service
    ));

    // Singletons never see request scoped providers
    assert!(injector.get_instance(&outer).is_none());
}

struct Consumer {
    _inner: Arc<InnerService>,
}
impl Component for Consumer {
    fn dependencies() -> Vec<Token> {
        vec![Token::of::<InnerService>()]
    }

    fn construct(mut deps: Dependencies) -> Result<Self, DynError> {
        Ok(Consumer {
            _inner: deps.take()?,
        })
    }
}

#[test]
fn scoped_invocations_reject_request_dependencies_without_a_scope() {
    let injector = block_on(testing::load_injector(request_registry())).unwrap();

    let error = injector
        .invoke(
            ClassDef::of::<Consumer>(),
            &mut LocalsContainer::new(),
            InvokeOptions {
                use_scope: true,
                ..Default::default()
            },
        )
        .unwrap_err();

    match error {
        InjectionError::Scope(error) => {
            assert_eq!(error.dependency, Token::of::<InnerService>());
            assert_eq!(error.requester, Token::of::<Consumer>());
            assert_eq!(error.scope, ProviderScope::Request);
        }
        other => panic!("unexpected error: {other}"),
    }

    let inner = injector.invoke_request(
        &Token::of::<InnerService>(),
        &mut LocalsContainer::new(),
        InvokeOptions::default(),
    );
    assert!(inner.is_ok());
}

#[test]
fn unscoped_invocations_construct_request_dependencies() {
    let injector = block_on(testing::load_injector(request_registry())).unwrap();

    let consumer = injector.invoke_class::<Consumer>();

    assert!(consumer.is_ok());
}

#[test]
fn singletons_are_not_constructed_by_requests() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_service::<SingletonService>();
    let injector = trellis_di::Injector::new(registry);
    injector.add_class::<SingletonService>();

    let error = injector
        .invoke_request(
            &Token::of::<SingletonService>(),
            &mut LocalsContainer::new(),
            InvokeOptions::default(),
        )
        .unwrap_err();

    assert!(matches!(error, InjectionError::NotConstructed(_)));
}

#[test]
fn configured_scopes_apply_to_providers_without_one() {
    let registry = Arc::new(ProviderRegistry::new());
    registry.register_service::<SingletonService>();
    let settings = trellis_di::BootstrapSettings {
        scopes: [(trellis_di::ProviderType::Service, ProviderScope::Request)].into(),
        ..Default::default()
    };
    let mut bootstrap = trellis_di::Bootstrap::with_registry(registry, settings).unwrap();
    block_on(bootstrap.load_injector()).unwrap();
    let injector = bootstrap.injector();

    assert!(injector
        .get_instance(&Token::of::<SingletonService>())
        .is_none());
    let provider = injector
        .get_provider(&Token::of::<SingletonService>())
        .unwrap();
    assert_eq!(
        provider.read().unwrap().scope(),
        ProviderScope::Request
    );
}
