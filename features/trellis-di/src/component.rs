use std::{any::type_name, fmt, sync::Arc};

use crate::{
    errors::RequireError,
    metadata::{ClassMetadata, Store},
    provider::ProviderRef,
    token::Token,
    types::{DynError, Injectable, Instance, TypeInfo},
};

/// A type the container can construct.
///
/// `dependencies` lists the tokens to resolve, in constructor order.
/// `construct` receives them resolved, in the same order.
/// `metadata` runs once per metadata store, the first time the type is
/// registered or invoked, and annotates the class (scope, bound properties,
/// lifecycle hooks).
///
/// ```rust
/// use std::sync::Arc;
/// use trellis_di::{Component, Dependencies, DynError, Token};
///
/// struct Database;
/// impl Component for Database {
///     fn construct(_: Dependencies) -> Result<Self, DynError> {
///         Ok(Database)
///     }
/// }
///
/// struct UserService {
///     database: Arc<Database>,
/// }
/// impl Component for UserService {
///     fn dependencies() -> Vec<Token> {
///         vec![Token::of::<Database>()]
///     }
///
///     fn construct(mut deps: Dependencies) -> Result<Self, DynError> {
///         Ok(UserService { database: deps.take()? })
///     }
/// }
/// ```
pub trait Component: Injectable + Sized {
    /// Returns the tokens the constructor requires
    fn dependencies() -> Vec<Token> {
        Vec::new()
    }

    /// Constructs a new instance from its resolved dependencies
    fn construct(deps: Dependencies) -> Result<Self, DynError>;

    /// Annotates the class metadata
    fn metadata(meta: &mut ClassMetadata<Self>) {
        let _ = meta;
    }
}

/// Type erased [`Component`], the `use_class` strategy of a provider
#[derive(Clone, Copy)]
pub struct ClassDef {
    pub info: TypeInfo,
    dependencies: fn() -> Vec<Token>,
    construct: fn(Dependencies) -> Result<Instance, DynError>,
    annotate: fn(&Store),
}

impl ClassDef {
    pub fn of<C: Component>() -> Self {
        ClassDef {
            info: TypeInfo::of::<C>(),
            dependencies: C::dependencies,
            construct: construct_erased::<C>,
            annotate: annotate_erased::<C>,
        }
    }

    pub fn token(&self) -> Token {
        Token::Type(self.info)
    }

    pub fn dependencies(&self) -> Vec<Token> {
        (self.dependencies)()
    }

    pub fn construct(&self, deps: Dependencies) -> Result<Instance, DynError> {
        (self.construct)(deps)
    }

    pub(crate) fn annotate(&self, store: &Store) {
        (self.annotate)(store)
    }
}

impl fmt::Debug for ClassDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ClassDef").field(&self.info.type_name).finish()
    }
}

impl PartialEq for ClassDef {
    fn eq(&self, other: &Self) -> bool {
        self.info == other.info
    }
}

fn construct_erased<C: Component>(deps: Dependencies) -> Result<Instance, DynError> {
    C::construct(deps).map(Instance::new)
}

fn annotate_erased<C: Component>(store: &Store) {
    let mut meta = ClassMetadata::<C>::new(store.clone());
    C::metadata(&mut meta);
}

/// Resolved dependencies handed to a constructor, factory or method, read
/// in declaration order
#[derive(Debug)]
pub struct Dependencies {
    values: std::vec::IntoIter<Instance>,
    position: usize,
}

impl Dependencies {
    pub fn new(values: Vec<Instance>) -> Self {
        Dependencies {
            values: values.into_iter(),
            position: 0,
        }
    }

    /// Takes the next dependency as it was resolved
    pub fn take_instance(&mut self) -> Result<Instance, RequireError> {
        let position = self.position;
        self.position += 1;
        self.values
            .next()
            .ok_or(RequireError::ArgumentMissing(position))
    }

    /// Takes the next dependency, downcast to `T`
    pub fn take<T: Injectable>(&mut self) -> Result<Arc<T>, RequireError> {
        self.take_instance()?
            .downcast::<T>()
            .map_err(|actual_type| RequireError::DowncastFailed {
                required_type: type_name::<T>(),
                actual_type,
            })
    }

    /// Takes the next dependency as a provider record, for dependencies on
    /// `Provider` or `ParentProvider`
    pub fn take_provider(&mut self) -> Result<ProviderRef, RequireError> {
        self.take::<ProviderRef>().map(|provider| provider.as_ref().clone())
    }

    /// Number of dependencies not taken yet
    pub fn remaining(&self) -> usize {
        self.values.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn takes_dependencies_in_order() {
        let mut deps = Dependencies::new(vec![Instance::new(1_u8), Instance::new("two")]);

        assert_eq!(*deps.take::<u8>().unwrap(), 1);
        assert_eq!(deps.remaining(), 1);
        assert_eq!(*deps.take::<&'static str>().unwrap(), "two");
        assert!(matches!(
            deps.take_instance(),
            Err(RequireError::ArgumentMissing(2))
        ));
    }

    #[test]
    fn reports_downcast_failures() {
        let mut deps = Dependencies::new(vec![Instance::new(1_u8)]);

        match deps.take::<String>() {
            Err(RequireError::DowncastFailed {
                required_type,
                actual_type,
            }) => {
                assert_eq!(required_type, type_name::<String>());
                assert_eq!(actual_type, "u8");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
