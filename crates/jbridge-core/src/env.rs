//! Environment access and thread attachment
//!
//! An [`Env`] is the calling thread's handle into the managed runtime. It
//! is `!Send`: a handle obtained on one thread is meaningless on another.
//!
//! Threads not created by the runtime are attached the first time they ask
//! for an environment. The bridge remembers every attachment it made in
//! thread-local storage and detaches the thread when it exits.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::mem::ManuallyDrop;
use std::sync::Arc;

use jbridge_sdk::{EnvHandle, ManagedRuntime, ObjectRef};
use tracing::{debug, error, trace, warn};

use crate::bridge::{same_runtime, Bridge};
use crate::refs::{GlobalRef, LocalRef};
use crate::{BridgeError, BridgeResult};

// ============================================================================
// Attachment bookkeeping
// ============================================================================

/// An attachment made by the bridge, undone when the thread exits.
struct ThreadAttachment {
    runtime: Arc<dyn ManagedRuntime>,
    env: EnvHandle,
}

impl ThreadAttachment {
    /// Discard the record without detaching. A JNI detach acts on the
    /// calling thread whatever env it is given.
    fn forget(self) {
        let this = ManuallyDrop::new(self);
        // SAFETY: `this` is never dropped, so the runtime handle is read
        // out exactly once.
        drop(unsafe { std::ptr::read(&this.runtime) });
    }
}

impl Drop for ThreadAttachment {
    fn drop(&mut self) {
        if let Err(e) = self.runtime.detach_current_thread(self.env) {
            warn!(runtime = self.runtime.name(), error = %e, "failed to detach exiting thread");
        }
    }
}

thread_local! {
    static ATTACHMENTS: RefCell<Vec<ThreadAttachment>> = const { RefCell::new(Vec::new()) };
}

/// Forget records for `runtime` left over from an attachment someone else
/// already undid.
fn forget_stale(runtime: &Arc<dyn ManagedRuntime>) {
    let stale = ATTACHMENTS.try_with(|cell| {
        let mut attachments = cell.borrow_mut();
        let (stale, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut *attachments)
            .into_iter()
            .partition(|a| same_runtime(&a.runtime, runtime));
        *attachments = kept;
        stale
    });
    for attachment in stale.unwrap_or_default() {
        trace!(env = ?attachment.env, "forgetting stale attachment");
        attachment.forget();
    }
}

fn attach(bridge: &Bridge, runtime: &Arc<dyn ManagedRuntime>) -> BridgeResult<EnvHandle> {
    forget_stale(runtime);

    let options = bridge.options().attach_options();
    let env = runtime
        .attach_current_thread(&options)
        .map_err(|e| BridgeError::AttachFailed(e.to_string()))?;

    debug!(
        runtime = runtime.name(),
        thread = ?std::thread::current().id(),
        daemon = options.daemon,
        "attached native thread"
    );

    let attachment = ThreadAttachment {
        runtime: runtime.clone(),
        env,
    };
    let recorded = ATTACHMENTS.try_with(|cell| cell.borrow_mut().push(attachment));
    if recorded.is_err() {
        // Thread-local storage is being torn down; nothing will run after
        // this on the thread, so the runtime reclaims it on its own.
        trace!("attachment not recorded during thread teardown");
    }
    Ok(env)
}

// ============================================================================
// Env
// ============================================================================

/// The calling thread's environment.
pub struct Env {
    bridge: Bridge,
    runtime: Arc<dyn ManagedRuntime>,
    raw: EnvHandle,
    _not_send: PhantomData<*const ()>,
}

impl Env {
    /// Environment for the calling thread, attaching it if needed.
    ///
    /// Fails with [`BridgeError::RuntimeNotRegistered`] when used before a
    /// runtime was registered. That is a programming error in the host, not
    /// a condition to recover from.
    pub fn current(bridge: &Bridge) -> BridgeResult<Env> {
        let runtime = bridge.runtime().ok_or_else(|| {
            error!("bridge used before a managed runtime was registered");
            BridgeError::RuntimeNotRegistered
        })?;
        Self::for_runtime(bridge, runtime)
    }

    /// Environment for a specific runtime, which may differ from the one
    /// currently registered (references remember the runtime that made them).
    pub(crate) fn for_runtime(bridge: &Bridge, runtime: Arc<dyn ManagedRuntime>) -> BridgeResult<Env> {
        let raw = match runtime.current_env() {
            Some(env) => env,
            None => attach(bridge, &runtime)?,
        };
        Ok(Env {
            bridge: bridge.clone(),
            runtime,
            raw,
            _not_send: PhantomData,
        })
    }

    /// Raw handle
    pub fn raw(&self) -> EnvHandle {
        self.raw
    }

    /// Runtime behind this environment
    pub fn runtime(&self) -> &dyn ManagedRuntime {
        &*self.runtime
    }

    /// Bridge this environment was obtained from
    pub fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    /// Take ownership of a local reference produced on this thread, so it
    /// is released when the returned guard drops. `None` for null.
    ///
    /// # Safety
    /// `raw` must be a live local reference of this environment that nothing
    /// else will release.
    pub unsafe fn adopt_local(&self, raw: ObjectRef) -> Option<LocalRef<'_>> {
        raw.non_null().map(|raw| LocalRef::new(self, raw))
    }

    /// New local reference to `obj` (any live reference). `None` for null.
    pub fn new_local_ref(&self, obj: ObjectRef) -> Option<LocalRef<'_>> {
        let raw = obj.non_null()?;
        let local = self.runtime.new_local_ref(self.raw, raw);
        // SAFETY: freshly created in this environment.
        unsafe { self.adopt_local(local) }
    }

    /// New global reference to `obj` (any live reference). `None` for null.
    pub fn new_global_ref(&self, obj: ObjectRef) -> Option<GlobalRef> {
        let raw = obj.non_null()?;
        let global = self.runtime.new_global_ref(self.raw, raw).non_null()?;
        // SAFETY: freshly created and owned by nobody else.
        Some(unsafe { GlobalRef::from_raw(&self.bridge, self.runtime.clone(), global) })
    }

    /// Look a class up through the thread's own class loading context.
    pub fn find_class_direct(&self, name: &str) -> BridgeResult<LocalRef<'_>> {
        let raw = self.runtime.find_class(self.raw, name);
        self.class_lookup_result(name, raw)
    }

    /// Look a class up through the thread-independent loader.
    pub fn load_class(&self, name: &str) -> BridgeResult<LocalRef<'_>> {
        let raw = self.runtime.load_class(self.raw, name);
        self.class_lookup_result(name, raw)
    }

    fn class_lookup_result(&self, name: &str, raw: ObjectRef) -> BridgeResult<LocalRef<'_>> {
        if raw.is_null() {
            // The failed lookup leaves a ClassNotFound-style exception behind.
            self.clear_exception_quietly();
            return Err(BridgeError::ClassNotFound(name.to_string()));
        }
        // SAFETY: lookups return fresh local references.
        unsafe { self.adopt_local(raw) }.ok_or_else(|| BridgeError::ClassNotFound(name.to_string()))
    }

    /// Class of `obj`, as a local reference
    pub fn object_class(&self, obj: ObjectRef) -> Option<LocalRef<'_>> {
        let raw = obj.non_null()?;
        let class = self.runtime.object_class(self.raw, raw);
        // SAFETY: fresh local reference.
        unsafe { self.adopt_local(class) }
    }
}

impl std::fmt::Debug for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Env")
            .field("runtime", &self.runtime.name())
            .field("raw", &self.raw)
            .finish()
    }
}
