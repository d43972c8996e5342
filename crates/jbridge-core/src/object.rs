//! Dynamic-dispatch object wrapper
//!
//! Wraps a managed instance and/or class and invokes members by name.
//! Nothing is cached: every call resolves its member from the name and a
//! descriptor built from the Rust argument and result types, then runs
//! under the exception guard.
//!
//! Two wrappers share one set of operations through [`Dispatch`]:
//!
//! - [`GenericObject`] owns global references to its instance and class and
//!   can be moved across threads and outlive any call frame.
//! - [`BorrowedObject`] borrows a local reference and is confined to the
//!   environment that produced it.

use std::ffi::{c_void, CStr};
use std::fmt;

use jbridge_sdk::{
    method_descriptor, methods_from_raw, JValue, JavaType, MemberId, MethodSignature,
    NativeMethod, ObjectRef, Receiver, ReturnType, CONSTRUCTOR_NAME,
};
use tracing::{debug, trace, warn};

use crate::args::{Arg, ArgFrame, CallArgs};
use crate::bridge::Bridge;
use crate::env::Env;
use crate::refs::{ClassRef, GlobalRef, LocalRef};
use crate::{BridgeError, BridgeResult};

// ============================================================================
// Result conversion
// ============================================================================

/// A call or field result type.
trait Returned: Sized {
    fn return_type() -> ReturnType;

    /// Convert the raw result. Reference results are local references of
    /// `env` and are released here.
    fn from_value(env: &Env, value: JValue) -> BridgeResult<Self>;
}

impl Returned for () {
    fn return_type() -> ReturnType {
        ReturnType::Void
    }

    fn from_value(_env: &Env, _value: JValue) -> BridgeResult<Self> {
        Ok(())
    }
}

macro_rules! primitive_returned {
    ($($ty:ty => $java:ident, $as:ident;)*) => {
        $(
            impl Returned for $ty {
                fn return_type() -> ReturnType {
                    ReturnType::Value(JavaType::$java)
                }

                fn from_value(_env: &Env, value: JValue) -> BridgeResult<Self> {
                    Ok(value.$as().unwrap_or_default())
                }
            }
        )*
    };
}

primitive_returned! {
    bool => Boolean, as_bool;
    i32 => Int, as_int;
    i64 => Long, as_long;
    f32 => Float, as_float;
    f64 => Double, as_double;
}

impl Returned for String {
    fn return_type() -> ReturnType {
        ReturnType::Value(JavaType::string())
    }

    fn from_value(env: &Env, value: JValue) -> BridgeResult<Self> {
        let raw = value.as_object().unwrap_or_default();
        // SAFETY: reference results are fresh local references.
        match unsafe { env.adopt_local(raw) } {
            Some(local) => Ok(env.from_managed_text(local.raw())),
            None => Ok(String::new()),
        }
    }
}

fn owned_result(env: &Env, value: JValue) -> BridgeResult<Option<GenericObject>> {
    let raw = value.as_object().unwrap_or_default();
    // SAFETY: reference results are fresh local references.
    unsafe { env.adopt_local(raw) }
        .map(GenericObject::from_local_owned)
        .transpose()
}

// ============================================================================
// Resolution and invocation
// ============================================================================

fn receiver<D: Dispatch + ?Sized>(target: &D, is_static: bool) -> Option<(ObjectRef, Receiver)> {
    let class = target.raw_class().non_null()?;
    if is_static {
        Some((class, Receiver::Static(class)))
    } else {
        let instance = target.raw_object().non_null()?;
        Some((class, Receiver::Instance(instance)))
    }
}

fn resolve_method(
    env: &Env,
    class: ObjectRef,
    name: &str,
    descriptor: &str,
    is_static: bool,
) -> BridgeResult<MemberId> {
    env.runtime()
        .method_id(env.raw(), class, name, descriptor, is_static)
        .ok_or_else(|| {
            env.clear_exception_quietly();
            warn!(method = name, signature = descriptor, is_static, "method not found");
            BridgeError::method_not_found(name, descriptor)
        })
}

fn resolve_field(
    env: &Env,
    class: ObjectRef,
    name: &str,
    descriptor: &str,
    is_static: bool,
) -> BridgeResult<MemberId> {
    env.runtime()
        .field_id(env.raw(), class, name, descriptor, is_static)
        .ok_or_else(|| {
            env.clear_exception_quietly();
            warn!(field = name, signature = descriptor, is_static, "field not found");
            BridgeError::field_not_found(name, descriptor)
        })
}

/// Resolve and call `name`, then apply the fault policy. A faulted call
/// converts the zero value of `ret`.
fn call_with<D, A, T>(
    target: &D,
    is_static: bool,
    name: &str,
    args: &A,
    ret: ReturnType,
    convert: impl FnOnce(&Env, JValue) -> BridgeResult<T>,
) -> BridgeResult<T>
where
    D: Dispatch + ?Sized,
    A: CallArgs + ?Sized,
{
    let descriptor = method_descriptor(&args.param_types(), &ret);
    let Some((class, receiver)) = receiver(target, is_static) else {
        debug!(method = name, signature = descriptor.as_str(), "call on an empty wrapper");
        return Err(BridgeError::method_not_found(name, &descriptor));
    };

    let env = Env::current(target.bridge())?;
    let method = resolve_method(&env, class, name, &descriptor, is_static)?;
    let frame = args.lower(&env)?;

    trace!(method = name, signature = descriptor.as_str(), is_static, "invoke");
    let value = env
        .runtime()
        .call_method(env.raw(), receiver, method, &ret, frame.values());
    drop(frame);

    if env.check_fault(name)? {
        return convert(&env, JValue::zero(&ret));
    }
    convert(&env, value)
}

fn call<D, A, T>(target: &D, is_static: bool, name: &str, args: &A) -> BridgeResult<T>
where
    D: Dispatch + ?Sized,
    A: CallArgs + ?Sized,
    T: Returned,
{
    call_with(target, is_static, name, args, T::return_type(), T::from_value)
}

fn call_object<D, A>(
    target: &D,
    is_static: bool,
    name: &str,
    return_class: &str,
    args: &A,
) -> BridgeResult<Option<GenericObject>>
where
    D: Dispatch + ?Sized,
    A: CallArgs + ?Sized,
{
    trace!(method = name, return_class, "object call");
    let ret = ReturnType::Value(JavaType::object(return_class));
    call_with(target, is_static, name, args, ret, owned_result)
}

/// # Safety
/// `args` must match the parameter types in `signature`.
unsafe fn call_raw_void<D: Dispatch + ?Sized>(
    target: &D,
    is_static: bool,
    name: &str,
    signature: &str,
    args: &[JValue],
) -> BridgeResult<()> {
    let invalid = |reason: String| BridgeError::InvalidSignature {
        signature: signature.to_string(),
        reason,
    };
    let parsed = MethodSignature::parse(signature).map_err(|e| invalid(e.to_string()))?;
    if parsed.ret != ReturnType::Void {
        return Err(invalid("return type must be void".to_string()));
    }
    if parsed.params.len() != args.len() {
        return Err(invalid(format!(
            "{} parameters declared, {} arguments given",
            parsed.params.len(),
            args.len()
        )));
    }

    let Some((class, receiver)) = receiver(target, is_static) else {
        return Err(BridgeError::method_not_found(name, signature));
    };
    let env = Env::current(target.bridge())?;
    let method = resolve_method(&env, class, name, signature, is_static)?;
    env.runtime()
        .call_method(env.raw(), receiver, method, &ReturnType::Void, args);
    env.check_fault(name)?;
    Ok(())
}

fn read_field<D, T>(target: &D, is_static: bool, name: &str, ty: JavaType) -> BridgeResult<T>
where
    D: Dispatch + ?Sized,
    T: Returned,
{
    let descriptor = ty.descriptor();
    let Some((class, receiver)) = receiver(target, is_static) else {
        return Err(BridgeError::field_not_found(name, &descriptor));
    };
    let env = Env::current(target.bridge())?;
    let field = resolve_field(&env, class, name, &descriptor, is_static)?;
    let value = env.runtime().get_field(env.raw(), receiver, field, &ty);
    T::from_value(&env, value)
}

fn write_field<D, V>(target: &D, is_static: bool, name: &str, value: &V) -> BridgeResult<()>
where
    D: Dispatch + ?Sized,
    V: Arg + ?Sized,
{
    let ty = value.java_type();
    let descriptor = ty.descriptor();
    let Some((class, receiver)) = receiver(target, is_static) else {
        return Err(BridgeError::field_not_found(name, &descriptor));
    };
    let env = Env::current(target.bridge())?;
    let field = resolve_field(&env, class, name, &descriptor, is_static)?;

    let mut frame = ArgFrame::with_capacity(1);
    value.lower(&env, &mut frame)?;
    if let Some(lowered) = frame.values().first() {
        env.runtime()
            .set_field(env.raw(), receiver, field, &ty, *lowered);
    }
    Ok(())
}

fn register_natives<D: Dispatch + ?Sized>(target: &D, methods: &[NativeMethod]) -> BridgeResult<()> {
    let Some(class) = target.raw_class().non_null() else {
        return Err(BridgeError::RegistrationFailed("wrapper has no class".to_string()));
    };
    let env = Env::current(target.bridge())?;
    match env.runtime().register_natives(env.raw(), class, methods) {
        Ok(()) => {
            debug!(count = methods.len(), "registered native methods");
            Ok(())
        }
        Err(e) => {
            let pending = env.take_exception();
            warn!(
                count = methods.len(),
                error = %e,
                exception = pending.as_deref().unwrap_or("<none>"),
                "native method registration failed"
            );
            Err(BridgeError::RegistrationFailed(e.to_string()))
        }
    }
}

// ============================================================================
// Dispatch
// ============================================================================

/// Member access by name on a wrapped instance or class.
///
/// Instance operations need an instance; static operations and native
/// registration need a class. Either missing makes the operation fail with
/// [`BridgeError::MethodNotFound`] or [`BridgeError::FieldNotFound`].
pub trait Dispatch {
    /// Bridge the wrapper was created through
    fn bridge(&self) -> &Bridge;

    /// Wrapped instance, or null
    fn raw_object(&self) -> ObjectRef;

    /// Wrapped class, or null
    fn raw_class(&self) -> ObjectRef;

    /// Call an instance method returning `void`
    fn call_void<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<()> {
        call(self, false, name, &args)
    }

    /// Call an instance method returning `boolean`
    fn call_bool<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<bool> {
        call(self, false, name, &args)
    }

    /// Call an instance method returning `int`
    fn call_int<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<i32> {
        call(self, false, name, &args)
    }

    /// Call an instance method returning `long`
    fn call_long<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<i64> {
        call(self, false, name, &args)
    }

    /// Call an instance method returning `float`
    fn call_float<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<f32> {
        call(self, false, name, &args)
    }

    /// Call an instance method returning `double`
    fn call_double<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<f64> {
        call(self, false, name, &args)
    }

    /// Call an instance method returning `String`. A null result reads as
    /// the empty string.
    fn call_string<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<String> {
        call(self, false, name, &args)
    }

    /// Call an instance method returning an object of `return_class`
    /// (slash separated). The result is owned by the caller.
    fn call_object<A: CallArgs>(
        &self,
        name: &str,
        return_class: &str,
        args: A,
    ) -> BridgeResult<Option<GenericObject>> {
        call_object(self, false, name, return_class, &args)
    }

    /// Call a static method returning `void`
    fn call_static_void<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<()> {
        call(self, true, name, &args)
    }

    /// Call a static method returning `boolean`
    fn call_static_bool<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<bool> {
        call(self, true, name, &args)
    }

    /// Call a static method returning `int`
    fn call_static_int<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<i32> {
        call(self, true, name, &args)
    }

    /// Call a static method returning `long`
    fn call_static_long<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<i64> {
        call(self, true, name, &args)
    }

    /// Call a static method returning `float`
    fn call_static_float<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<f32> {
        call(self, true, name, &args)
    }

    /// Call a static method returning `double`
    fn call_static_double<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<f64> {
        call(self, true, name, &args)
    }

    /// Call a static method returning `String`
    fn call_static_string<A: CallArgs>(&self, name: &str, args: A) -> BridgeResult<String> {
        call(self, true, name, &args)
    }

    /// Call a static method returning an object of `return_class`
    fn call_static_object<A: CallArgs>(
        &self,
        name: &str,
        return_class: &str,
        args: A,
    ) -> BridgeResult<Option<GenericObject>> {
        call_object(self, true, name, return_class, &args)
    }

    /// Call an instance method with a caller-built descriptor and raw
    /// arguments. The descriptor must declare a `void` return.
    ///
    /// # Safety
    /// Each value in `args` must have the type the descriptor declares at
    /// its position; reference values must be live.
    unsafe fn call_param_void(
        &self,
        name: &str,
        signature: &str,
        args: &[JValue],
    ) -> BridgeResult<()> {
        call_raw_void(self, false, name, signature, args)
    }

    /// Static counterpart of [`call_param_void`](Dispatch::call_param_void)
    ///
    /// # Safety
    /// As for `call_param_void`.
    unsafe fn call_static_param_void(
        &self,
        name: &str,
        signature: &str,
        args: &[JValue],
    ) -> BridgeResult<()> {
        call_raw_void(self, true, name, signature, args)
    }

    /// Read an `int` instance field
    fn get_int(&self, name: &str) -> BridgeResult<i32> {
        read_field(self, false, name, JavaType::Int)
    }

    /// Read a `boolean` instance field
    fn get_bool(&self, name: &str) -> BridgeResult<bool> {
        read_field(self, false, name, JavaType::Boolean)
    }

    /// Read a `long` instance field
    fn get_long(&self, name: &str) -> BridgeResult<i64> {
        read_field(self, false, name, JavaType::Long)
    }

    /// Read a `float` instance field
    fn get_float(&self, name: &str) -> BridgeResult<f32> {
        read_field(self, false, name, JavaType::Float)
    }

    /// Read a `double` instance field
    fn get_double(&self, name: &str) -> BridgeResult<f64> {
        read_field(self, false, name, JavaType::Double)
    }

    /// Read a `String` instance field. Null reads as the empty string.
    fn get_string(&self, name: &str) -> BridgeResult<String> {
        read_field(self, false, name, JavaType::string())
    }

    /// Read an `int` static field
    fn get_static_int(&self, name: &str) -> BridgeResult<i32> {
        read_field(self, true, name, JavaType::Int)
    }

    /// Read a `boolean` static field
    fn get_static_bool(&self, name: &str) -> BridgeResult<bool> {
        read_field(self, true, name, JavaType::Boolean)
    }

    /// Read a `long` static field
    fn get_static_long(&self, name: &str) -> BridgeResult<i64> {
        read_field(self, true, name, JavaType::Long)
    }

    /// Read a `float` static field
    fn get_static_float(&self, name: &str) -> BridgeResult<f32> {
        read_field(self, true, name, JavaType::Float)
    }

    /// Read a `double` static field
    fn get_static_double(&self, name: &str) -> BridgeResult<f64> {
        read_field(self, true, name, JavaType::Double)
    }

    /// Read a `String` static field
    fn get_static_string(&self, name: &str) -> BridgeResult<String> {
        read_field(self, true, name, JavaType::string())
    }

    /// Write an `int` instance field
    fn set_int(&self, name: &str, value: i32) -> BridgeResult<()> {
        write_field(self, false, name, &value)
    }

    /// Write a `boolean` instance field
    fn set_bool(&self, name: &str, value: bool) -> BridgeResult<()> {
        write_field(self, false, name, &value)
    }

    /// Write a `long` instance field
    fn set_long(&self, name: &str, value: i64) -> BridgeResult<()> {
        write_field(self, false, name, &value)
    }

    /// Write a `float` instance field
    fn set_float(&self, name: &str, value: f32) -> BridgeResult<()> {
        write_field(self, false, name, &value)
    }

    /// Write a `double` instance field
    fn set_double(&self, name: &str, value: f64) -> BridgeResult<()> {
        write_field(self, false, name, &value)
    }

    /// Write a `String` instance field
    fn set_string(&self, name: &str, value: &str) -> BridgeResult<()> {
        write_field(self, false, name, value)
    }

    /// Bind one native entry point to a `native` member of the class.
    ///
    /// `fn_ptr` must be an `extern "system"` function whose parameters
    /// match `signature`.
    fn register_native_method(
        &self,
        name: &'static CStr,
        signature: &'static CStr,
        fn_ptr: *mut c_void,
    ) -> BridgeResult<()> {
        register_natives(self, &[NativeMethod::new(name, signature, fn_ptr)])
    }

    /// Bind several native entry points at once
    fn register_native_methods(&self, methods: &[NativeMethod]) -> BridgeResult<()> {
        register_natives(self, methods)
    }

    /// Bind a C array of native method records whose size is given in
    /// bytes.
    ///
    /// # Safety
    /// `methods` must point to `size_in_bytes` readable bytes of
    /// initialized records.
    unsafe fn register_native_methods_raw(
        &self,
        methods: *const NativeMethod,
        size_in_bytes: usize,
    ) -> BridgeResult<()> {
        register_natives(self, methods_from_raw(methods, size_in_bytes))
    }
}

// ============================================================================
// GenericObject
// ============================================================================

/// Owning wrapper. Holds global references to its instance and class;
/// both are released when it drops.
pub struct GenericObject {
    bridge: Bridge,
    instance: Option<GlobalRef>,
    class: Option<ClassRef>,
}

impl GenericObject {
    /// A wrapper with neither instance nor class
    pub fn uninitialized(bridge: &Bridge) -> Self {
        Self {
            bridge: bridge.clone(),
            instance: None,
            class: None,
        }
    }

    /// Wrap the class `name` without instantiating it
    pub fn for_class_name(bridge: &Bridge, name: &str) -> BridgeResult<Self> {
        Ok(Self::for_class(bridge, bridge.find_class(name)?))
    }

    /// Wrap `class` without instantiating it
    pub fn for_class(bridge: &Bridge, class: ClassRef) -> Self {
        Self {
            bridge: bridge.clone(),
            instance: None,
            class: Some(class),
        }
    }

    /// Instantiate the class `name` through its no-argument constructor
    pub fn new_instance(bridge: &Bridge, name: &str) -> BridgeResult<Self> {
        let class = bridge.find_class(name)?;
        Self::instantiate(bridge, class, &(), name)
    }

    /// Instantiate `class` through its no-argument constructor
    pub fn new_instance_of(bridge: &Bridge, class: ClassRef) -> BridgeResult<Self> {
        let label = format!("{:?}", class.raw());
        Self::instantiate(bridge, class, &(), &label)
    }

    /// Instantiate the class `name` through the constructor taking `args`
    pub fn new_instance_with<A: CallArgs>(bridge: &Bridge, name: &str, args: A) -> BridgeResult<Self> {
        let class = bridge.find_class(name)?;
        Self::instantiate(bridge, class, &args, name)
    }

    fn instantiate<A: CallArgs + ?Sized>(
        bridge: &Bridge,
        class: ClassRef,
        args: &A,
        label: &str,
    ) -> BridgeResult<Self> {
        let descriptor = method_descriptor(&args.param_types(), &ReturnType::Void);
        let env = Env::current(bridge)?;
        let ctor = resolve_method(&env, class.raw(), CONSTRUCTOR_NAME, &descriptor, false)?;
        let frame = args.lower(&env)?;

        let raw = env
            .runtime()
            .new_object(env.raw(), class.raw(), ctor, frame.values());
        drop(frame);
        // SAFETY: new_object returns a fresh local reference.
        let local = unsafe { env.adopt_local(raw) };

        if env.check_fault(CONSTRUCTOR_NAME)? {
            return Err(BridgeError::InstantiationFailed(format!(
                "constructor of {} threw",
                label
            )));
        }
        let local = local.ok_or_else(|| {
            BridgeError::InstantiationFailed(format!("no instance of {}", label))
        })?;
        let instance = local.into_global().ok_or_else(|| {
            BridgeError::AllocationFailed(format!("global reference to a new {}", label))
        })?;

        debug!(class = label, "instantiated");
        Ok(Self {
            bridge: bridge.clone(),
            instance: Some(instance),
            class: Some(class),
        })
    }

    /// Take ownership of `local`: promote it (and its class) to global
    /// references and release the local one.
    pub fn from_local_owned(local: LocalRef<'_>) -> BridgeResult<Self> {
        let env = local.env();
        let class = env
            .object_class(local.raw())
            .and_then(LocalRef::into_global)
            .ok_or_else(|| BridgeError::AllocationFailed("global reference to class".to_string()))?;
        let instance = local
            .into_global()
            .ok_or_else(|| BridgeError::AllocationFailed("global reference to instance".to_string()))?;
        Ok(Self {
            bridge: env.bridge().clone(),
            instance: Some(instance),
            class: Some(ClassRef::Owned(class)),
        })
    }

    /// Wrap `local` without taking ownership. The wrapper cannot outlive it.
    pub fn borrow<'a>(local: &'a LocalRef<'_>) -> BorrowedObject<'a> {
        BorrowedObject::new(local)
    }

    /// Detach the owned instance, leaving the wrapper with its class only
    pub fn take_object(&mut self) -> Option<GlobalRef> {
        self.instance.take()
    }

    /// Whether an instance is wrapped
    pub fn has_instance(&self) -> bool {
        self.instance.is_some()
    }

    /// Whether a class is wrapped
    pub fn has_class(&self) -> bool {
        self.class.is_some()
    }

    /// Wrapped instance
    pub fn instance(&self) -> Option<&GlobalRef> {
        self.instance.as_ref()
    }

    /// Wrapped class
    pub fn class(&self) -> Option<&ClassRef> {
        self.class.as_ref()
    }
}

impl Dispatch for GenericObject {
    fn bridge(&self) -> &Bridge {
        &self.bridge
    }

    fn raw_object(&self) -> ObjectRef {
        self.instance.as_ref().map(GlobalRef::raw).unwrap_or_default()
    }

    fn raw_class(&self) -> ObjectRef {
        self.class.as_ref().map(ClassRef::raw).unwrap_or_default()
    }
}

impl fmt::Debug for GenericObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenericObject")
            .field("instance", &self.raw_object())
            .field("class", &self.raw_class())
            .finish()
    }
}

// ============================================================================
// BorrowedObject
// ============================================================================

/// Borrowing wrapper over a local reference.
///
/// Releases only the class reference it looked up itself.
pub struct BorrowedObject<'a> {
    env: &'a Env,
    instance: ObjectRef,
    class: Option<LocalRef<'a>>,
}

impl<'a> BorrowedObject<'a> {
    /// Wrap `local` and look up its class
    pub fn new(local: &'a LocalRef<'_>) -> Self {
        let env: &'a Env = local.env();
        Self {
            env,
            instance: local.raw(),
            class: env.object_class(local.raw()),
        }
    }

    /// Environment the borrowed reference belongs to
    pub fn env(&self) -> &'a Env {
        self.env
    }

    /// Promote to an owning wrapper over the same instance
    pub fn to_owned_object(&self) -> BridgeResult<GenericObject> {
        let local = self
            .env
            .new_local_ref(self.instance)
            .ok_or_else(|| BridgeError::AllocationFailed("local reference".to_string()))?;
        GenericObject::from_local_owned(local)
    }
}

impl Dispatch for BorrowedObject<'_> {
    fn bridge(&self) -> &Bridge {
        self.env.bridge()
    }

    fn raw_object(&self) -> ObjectRef {
        self.instance
    }

    fn raw_class(&self) -> ObjectRef {
        self.class.as_ref().map(LocalRef::raw).unwrap_or_default()
    }
}

impl fmt::Debug for BorrowedObject<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BorrowedObject")
            .field("instance", &self.instance)
            .field("class", &self.raw_class())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::BridgeOptions;
    use jbridge_sandbox::Sandbox;
    use std::sync::Arc;

    fn assert_send_sync<T: Send + Sync>() {}

    #[test]
    fn test_owning_wrapper_is_send_sync() {
        assert_send_sync::<GenericObject>();
    }

    #[test]
    fn test_uninitialized_fails_resolution() {
        let bridge = Bridge::with_runtime(Arc::new(Sandbox::new()), BridgeOptions::default());
        let empty = GenericObject::uninitialized(&bridge);
        assert!(!empty.has_instance());
        assert!(!empty.has_class());

        let err = empty.call_int("size", ()).unwrap_err();
        assert!(matches!(err, BridgeError::MethodNotFound { ref name, ref signature }
            if name == "size" && signature == "()I"));
        let err = empty.call_static_void("run", ()).unwrap_err();
        assert!(err.is_resolution_failure());
        let err = empty.get_string("label").unwrap_err();
        assert!(matches!(err, BridgeError::FieldNotFound { ref signature, .. }
            if signature == "Ljava/lang/String;"));
        assert!(matches!(
            empty.register_native_methods(&[]).unwrap_err(),
            BridgeError::RegistrationFailed(_)
        ));
    }

    #[test]
    fn test_class_only_wrapper_rejects_instance_calls() {
        let bridge = Bridge::with_runtime(Arc::new(Sandbox::new()), BridgeOptions::default());
        let string = GenericObject::for_class_name(&bridge, "java/lang/String").unwrap();
        assert!(string.has_class());
        assert!(!string.has_instance());
        assert!(string.call_int("length", ()).unwrap_err().is_resolution_failure());
    }

    #[test]
    fn test_borrowed_string() {
        let bridge = Bridge::with_runtime(Arc::new(Sandbox::new()), BridgeOptions::default());
        let env = Env::current(&bridge).unwrap();
        let text = env.to_managed_text("borrowed").unwrap();

        let wrapper = GenericObject::borrow(&text);
        assert_eq!(wrapper.raw_object(), text.raw());
        assert_eq!(wrapper.call_int("length", ()).unwrap(), 8);

        let owned = wrapper.to_owned_object().unwrap();
        drop(wrapper);
        assert_eq!(owned.call_int("length", ()).unwrap(), 8);
    }

    #[test]
    fn test_raw_void_rejects_bad_descriptor() {
        let bridge = Bridge::with_runtime(Arc::new(Sandbox::new()), BridgeOptions::default());
        let string = GenericObject::for_class_name(&bridge, "java/lang/String").unwrap();

        let err = unsafe { string.call_static_param_void("run", "(I", &[JValue::Int(1)]) }.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidSignature { .. }));
        let err = unsafe { string.call_static_param_void("run", "()I", &[]) }.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidSignature { .. }));
        let err = unsafe { string.call_static_param_void("run", "(II)V", &[JValue::Int(1)]) }.unwrap_err();
        assert!(matches!(err, BridgeError::InvalidSignature { .. }));
    }
}
