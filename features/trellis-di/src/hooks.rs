use std::{fmt, future::Future, sync::Arc};

use futures::{future::BoxFuture, FutureExt};

use crate::types::{DynError, Instance};

/// Emitted by `load()` once every singleton is constructed
pub const ON_INIT: &str = "$onInit";
/// Emitted by `destroy()` before cached instances are dropped
pub const ON_DESTROY: &str = "$onDestroy";
/// Still dispatched, but deprecated in favor of [`ON_INIT`]
pub const ON_INJECTOR_READY: &str = "$onInjectorReady";

/// What a lifecycle hook returns: either it finished synchronously or it
/// hands back a future the emitter has to await.
pub enum HookOutput {
    Done,
    Pending(BoxFuture<'static, Result<(), DynError>>),
}

impl HookOutput {
    pub fn pending<F>(future: F) -> Self
    where
        F: Future<Output = Result<(), DynError>> + Send + 'static,
    {
        HookOutput::Pending(future.boxed())
    }
}

impl From<()> for HookOutput {
    fn from(_: ()) -> Self {
        HookOutput::Done
    }
}

impl fmt::Debug for HookOutput {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HookOutput::Done => f.write_str("Done"),
            HookOutput::Pending(_) => f.write_str("Pending"),
        }
    }
}

/// Type erased hook, called with the instance and the emit arguments
pub type HookFn = Arc<dyn Fn(&Instance, &[Instance]) -> HookOutput + Send + Sync>;
