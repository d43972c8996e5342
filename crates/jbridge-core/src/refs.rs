//! Reference guards
//!
//! Managed references come in two ownership classes:
//!
//! - [`LocalRef`]: short-lived, valid only on the thread and in the call
//!   frame that produced it. Borrows the [`Env`] it came from and is
//!   released when dropped.
//! - [`GlobalRef`]: durable, valid on any thread until released. Released
//!   when dropped, from whichever thread drops it.
//!
//! [`ClassRef`] is what class lookups hand out: either a registry-owned
//! entry (never released by its holder) or an owned global.

use std::fmt;
use std::sync::Arc;

use jbridge_sdk::{ManagedRuntime, ObjectRef};
use tracing::warn;

use crate::bridge::Bridge;
use crate::env::Env;

// ============================================================================
// LocalRef
// ============================================================================

/// Short-lived reference tied to an environment borrow.
pub struct LocalRef<'env> {
    env: &'env Env,
    raw: ObjectRef,
}

impl<'env> LocalRef<'env> {
    pub(crate) fn new(env: &'env Env, raw: ObjectRef) -> Self {
        Self { env, raw }
    }

    /// Raw reference
    pub fn raw(&self) -> ObjectRef {
        self.raw
    }

    /// Environment this reference belongs to
    pub fn env(&self) -> &'env Env {
        self.env
    }

    /// New global reference to the same object; the local stays valid
    pub fn to_global(&self) -> Option<GlobalRef> {
        self.env.new_global_ref(self.raw)
    }

    /// Promote to a global reference and release the local one
    pub fn into_global(self) -> Option<GlobalRef> {
        self.to_global()
    }

    /// Give up ownership without releasing; the caller becomes responsible
    /// for the local reference.
    pub fn into_raw(mut self) -> ObjectRef {
        std::mem::replace(&mut self.raw, ObjectRef::NULL)
    }
}

impl Drop for LocalRef<'_> {
    fn drop(&mut self) {
        if !self.raw.is_null() {
            self.env.runtime().delete_local_ref(self.env.raw(), self.raw);
        }
    }
}

impl fmt::Debug for LocalRef<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LocalRef").field(&self.raw).finish()
    }
}

// ============================================================================
// GlobalRef
// ============================================================================

/// Durable reference, released on drop.
pub struct GlobalRef {
    bridge: Bridge,
    runtime: Arc<dyn ManagedRuntime>,
    raw: ObjectRef,
}

impl GlobalRef {
    /// Wrap a raw global reference.
    ///
    /// # Safety
    /// `raw` must be a live global reference created by `runtime`, owned by
    /// nobody else.
    pub unsafe fn from_raw(bridge: &Bridge, runtime: Arc<dyn ManagedRuntime>, raw: ObjectRef) -> Self {
        Self {
            bridge: bridge.clone(),
            runtime,
            raw,
        }
    }

    /// Raw reference. Not an ownership transfer.
    pub fn raw(&self) -> ObjectRef {
        self.raw
    }

    /// Bridge this reference was created through
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Give up ownership without releasing; the caller becomes responsible
    /// for the global reference.
    pub fn into_raw(mut self) -> ObjectRef {
        std::mem::replace(&mut self.raw, ObjectRef::NULL)
    }
}

impl Drop for GlobalRef {
    fn drop(&mut self) {
        if self.raw.is_null() {
            return;
        }
        match Env::for_runtime(&self.bridge, self.runtime.clone()) {
            Ok(env) => self.runtime.delete_global_ref(env.raw(), self.raw),
            Err(e) => warn!(reference = ?self.raw, error = %e, "leaking global reference"),
        }
    }
}

impl fmt::Debug for GlobalRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("GlobalRef").field(&self.raw).finish()
    }
}

// ============================================================================
// ClassRef
// ============================================================================

/// A class reference handed out by a class lookup.
#[derive(Debug)]
pub enum ClassRef {
    /// Owned by the class registry; valid until `unload_classes`
    Preloaded(ObjectRef),
    /// Owned by the holder
    Owned(GlobalRef),
}

impl ClassRef {
    /// Raw reference. Not an ownership transfer.
    pub fn raw(&self) -> ObjectRef {
        match self {
            ClassRef::Preloaded(raw) => *raw,
            ClassRef::Owned(global) => global.raw(),
        }
    }

    /// Whether the registry owns this reference
    pub fn is_preloaded(&self) -> bool {
        matches!(self, ClassRef::Preloaded(_))
    }
}
