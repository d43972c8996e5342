//! ManagedRuntime trait: abstract managed-runtime operations
//!
//! Defines the interface a backend (a real JVM, or the in-process sandbox)
//! implements. The bridge programs against this trait only.
//!
//! The shape follows JNI closely: lookups return null / `None` and leave an
//! exception pending when they fail, calls return the zero value when the
//! callee throws, and nothing here clears an exception except
//! [`exception_clear`](ManagedRuntime::exception_clear).

use crate::error::RuntimeResult;
use crate::native::NativeMethod;
use crate::signature::{JavaType, ReturnType};
use crate::value::{EnvHandle, JValue, MemberId, ObjectRef, Receiver};

/// Options applied when attaching a native thread.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttachOptions {
    /// Thread name reported to the runtime
    pub thread_name: Option<String>,
    /// Attach as a daemon thread (does not keep the runtime alive)
    pub daemon: bool,
}

/// Abstract managed runtime.
///
/// Every method taking an [`EnvHandle`] must be called on the thread that
/// obtained that handle. References passed in must be live; handing a
/// released or foreign reference to a backend is undefined behaviour.
pub trait ManagedRuntime: Send + Sync {
    /// Short backend name for diagnostics
    fn name(&self) -> &str;

    // ========================================================================
    // Thread attachment
    // ========================================================================

    /// Environment of the calling thread, if it is attached
    fn current_env(&self) -> Option<EnvHandle>;

    /// Attach the calling thread. Attaching an attached thread returns its
    /// existing environment.
    fn attach_current_thread(&self, options: &AttachOptions) -> RuntimeResult<EnvHandle>;

    /// Detach the calling thread, whose environment is `env`
    fn detach_current_thread(&self, env: EnvHandle) -> RuntimeResult<()>;

    // ========================================================================
    // Class lookup
    // ========================================================================

    /// Look a class up through the calling thread's own class loading
    /// context. Returns a local reference, or null with an exception pending.
    fn find_class(&self, env: EnvHandle, name: &str) -> ObjectRef;

    /// Look a class up through a loader that does not depend on the calling
    /// thread, so it also works on native-created threads. Returns a local
    /// reference, or null with an exception pending.
    fn load_class(&self, env: EnvHandle, name: &str) -> ObjectRef;

    /// Class of an object, as a local reference
    fn object_class(&self, env: EnvHandle, obj: ObjectRef) -> ObjectRef;

    // ========================================================================
    // References
    // ========================================================================

    /// Create a global reference
    fn new_global_ref(&self, env: EnvHandle, obj: ObjectRef) -> ObjectRef;

    /// Release a global reference
    fn delete_global_ref(&self, env: EnvHandle, obj: ObjectRef);

    /// Create a local reference in `env`
    fn new_local_ref(&self, env: EnvHandle, obj: ObjectRef) -> ObjectRef;

    /// Release a local reference of `env`
    fn delete_local_ref(&self, env: EnvHandle, obj: ObjectRef);

    // ========================================================================
    // Member resolution
    // ========================================================================

    /// Resolve a method by name and descriptor. `None` leaves an exception
    /// pending.
    fn method_id(
        &self,
        env: EnvHandle,
        class: ObjectRef,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Option<MemberId>;

    /// Resolve a field by name and type descriptor. `None` leaves an
    /// exception pending.
    fn field_id(
        &self,
        env: EnvHandle,
        class: ObjectRef,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Option<MemberId>;

    // ========================================================================
    // Invocation and field access
    // ========================================================================

    /// Allocate an instance and run the constructor `ctor` on it. Returns a
    /// local reference, or null with an exception pending.
    fn new_object(
        &self,
        env: EnvHandle,
        class: ObjectRef,
        ctor: MemberId,
        args: &[JValue],
    ) -> ObjectRef;

    /// Invoke a resolved method. Reference results are local references.
    fn call_method(
        &self,
        env: EnvHandle,
        receiver: Receiver,
        method: MemberId,
        ret: &ReturnType,
        args: &[JValue],
    ) -> JValue;

    /// Read a resolved field. Reference results are local references.
    fn get_field(&self, env: EnvHandle, receiver: Receiver, field: MemberId, ty: &JavaType)
        -> JValue;

    /// Write a resolved field
    fn set_field(
        &self,
        env: EnvHandle,
        receiver: Receiver,
        field: MemberId,
        ty: &JavaType,
        value: JValue,
    );

    // ========================================================================
    // Strings
    // ========================================================================

    /// Create a managed string from UTF-16 code units (local reference)
    fn new_string(&self, env: EnvHandle, utf16: &[u16]) -> ObjectRef;

    /// Copy out the UTF-16 code units of a managed string
    fn string_utf16(&self, env: EnvHandle, string: ObjectRef) -> Vec<u16>;

    // ========================================================================
    // Exceptions
    // ========================================================================

    /// Whether an exception is pending on `env`
    fn exception_check(&self, env: EnvHandle) -> bool;

    /// Human-readable description of the pending exception, without
    /// clearing it
    fn exception_description(&self, env: EnvHandle) -> Option<String>;

    /// Clear the pending exception, if any
    fn exception_clear(&self, env: EnvHandle);

    // ========================================================================
    // Native methods
    // ========================================================================

    /// Bind native entry points to `native` members of `class`. On failure
    /// an exception is left pending.
    fn register_natives(
        &self,
        env: EnvHandle,
        class: ObjectRef,
        methods: &[NativeMethod],
    ) -> RuntimeResult<()>;
}
