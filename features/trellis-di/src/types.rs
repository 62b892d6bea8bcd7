use std::{
    any::{Any, TypeId},
    fmt,
    sync::Arc,
};

/// Errors returned by constructors, factories and hooks
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// A shareable error, used to keep the cause of a wrapped failure
pub type SharedError = Arc<dyn std::error::Error + Send + Sync>;

/// Anything injectable needs to be Send + Sync + 'static,
/// so containers and instances can be shared with async hooks
pub trait Injectable: Send + Sync + 'static {}
impl<T: Send + Sync + 'static> Injectable for T {}

/// A produced value, type erased
#[derive(Clone)]
pub struct Instance {
    pub info: TypeInfo,
    pub instance: Arc<dyn Any + Send + Sync + 'static>,
}

impl Instance {
    pub fn new<ExistingInstance: Injectable>(instance: ExistingInstance) -> Self {
        Self::from_arc(Arc::new(instance))
    }

    pub fn from_arc<ExistingInstance: Injectable>(instance: Arc<ExistingInstance>) -> Self {
        Instance {
            info: TypeInfo::of::<ExistingInstance>(),
            instance,
        }
    }

    /// Returns the shared instance, or the name of the actual type on mismatch
    pub fn downcast<T: Injectable>(&self) -> Result<Arc<T>, &'static str> {
        match Arc::downcast::<T>(self.instance.clone()) {
            Ok(downcasted) => Ok(downcasted),
            Err(_) => Err(self.info.type_name),
        }
    }

    pub fn is<T: Injectable>(&self) -> bool {
        self.info.type_id == TypeId::of::<T>()
    }

    /// True if both point to the same allocation
    pub fn ptr_eq(&self, other: &Instance) -> bool {
        Arc::ptr_eq(&self.instance, &other.instance)
    }
}

impl fmt::Debug for Instance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Instance")
            .field("type", &self.info.type_name)
            .finish_non_exhaustive()
    }
}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeInfo {
    pub type_id: TypeId,
    pub type_name: &'static str,
}
impl fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.short_name())
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }

    /// The type name without module paths, `a::B<c::D>` becomes `B<D>`
    pub fn short_name(&self) -> String {
        let mut short = String::with_capacity(self.type_name.len());
        let mut segment = String::new();

        for c in self.type_name.chars() {
            if c.is_alphanumeric() || c == '_' || c == ':' {
                segment.push(c);
            } else {
                short.push_str(last_segment(&segment));
                segment.clear();
                short.push(c);
            }
        }
        short.push_str(last_segment(&segment));
        short
    }
}

fn last_segment(path: &str) -> &str {
    path.rsplit("::").next().unwrap_or(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Service;

    #[test]
    fn short_names_drop_module_paths() {
        assert_eq!(TypeInfo::of::<Service>().short_name(), "Service");
        assert_eq!(
            TypeInfo::of::<Option<Vec<String>>>().short_name(),
            "Option<Vec<String>>"
        );
        assert_eq!(TypeInfo::of::<(u8, Service)>().short_name(), "(u8, Service)");
    }

    #[test]
    fn instances_downcast_and_compare_by_pointer() {
        let instance = Instance::new(String::from("value"));
        let copy = instance.clone();

        assert!(instance.is::<String>());
        assert!(instance.ptr_eq(&copy));
        assert_eq!(*instance.downcast::<String>().unwrap(), "value");
        assert!(instance.downcast::<u32>().is_err());
        assert!(!instance.ptr_eq(&Instance::new(String::from("value"))));
    }
}
