//! [`ManagedRuntime`] over a JNI `JavaVM`
//!
//! Class names reach the VM two ways: `FindClass`, which resolves through
//! the calling thread's context, and the class loader captured when the
//! runtime was created, which works from any thread.

use std::ffi::c_void;
use std::ptr;

use jbridge_sdk::{
    AttachOptions, EnvHandle, JValue, JavaType, ManagedRuntime, MemberId, NativeMethod, ObjectRef,
    Receiver, ReturnType, RuntimeError, RuntimeResult,
};
use jni_sys::{
    jint, jmethodID, jobject, jsize, JNIEnv, JNINativeMethod, JavaVM, JavaVMAttachArgs, JNI_OK,
    JNI_VERSION_1_6,
};
use tracing::{debug, warn};

use crate::convert::{
    binary_name, c_string, field_id, from_jboolean, method_id, obj, obj_ref, to_jboolean,
    to_jvalues,
};

/// Call a function of the JNI environment table.
macro_rules! jni {
    ($env:expr, $name:ident $(, $arg:expr)* $(,)?) => {{
        let env: *mut JNIEnv = $env;
        match (**env).$name {
            Some(f) => f(env $(, $arg)*),
            None => missing(stringify!($name)),
        }
    }};
}

/// Call a function of the JNI invocation table.
macro_rules! jvm {
    ($vm:expr, $name:ident $(, $arg:expr)* $(,)?) => {{
        let vm: *mut JavaVM = $vm;
        match (**vm).$name {
            Some(f) => f(vm $(, $arg)*),
            None => missing(stringify!($name)),
        }
    }};
}

fn missing(name: &str) -> ! {
    panic!("JNI function table has no {}", name)
}

fn env_ptr(env: EnvHandle) -> *mut JNIEnv {
    env.as_ptr()
}

/// Pointer to the VM. The invocation interface may be used from any thread.
struct VmPtr(*mut JavaVM);

unsafe impl Send for VmPtr {}
unsafe impl Sync for VmPtr {}

/// A JVM hosting the bridge.
pub struct JvmRuntime {
    vm: VmPtr,
    /// Global reference to the captured class loader
    loader: ObjectRef,
    load_class: MemberId,
    to_string: MemberId,
}

impl JvmRuntime {
    /// Wrap a running VM, capturing its class loader on the calling thread.
    ///
    /// Call this where application classes are visible, typically from
    /// `JNI_OnLoad` or another managed-to-native call.
    ///
    /// # Safety
    /// `vm` must point to a live `JavaVM` that outlives the returned value.
    pub unsafe fn from_raw(vm: *mut JavaVM) -> RuntimeResult<Self> {
        if vm.is_null() {
            return Err(RuntimeError::Backend("null JavaVM".to_string()));
        }
        let env = current_env(vm).ok_or_else(|| {
            RuntimeError::AttachFailed("JvmRuntime::from_raw needs an attached thread".to_string())
        })?;
        let raw = env_ptr(env);

        let to_string = lookup_method(raw, "java/lang/Object", "toString", "()Ljava/lang/String;", false)?;
        let loader = capture_loader(raw)?;
        let load_class = lookup_method(
            raw,
            "java/lang/ClassLoader",
            "loadClass",
            "(Ljava/lang/String;)Ljava/lang/Class;",
            false,
        )?;

        let global = jni!(raw, NewGlobalRef, loader);
        jni!(raw, DeleteLocalRef, loader);
        if global.is_null() {
            return Err(RuntimeError::Backend("could not pin the class loader".to_string()));
        }

        debug!("JVM runtime created");
        Ok(Self {
            vm: VmPtr(vm),
            loader: obj_ref(global),
            load_class: MemberId::from_raw(load_class as usize),
            to_string: MemberId::from_raw(to_string as usize),
        })
    }

    /// Raw VM pointer
    pub fn as_raw(&self) -> *mut JavaVM {
        self.vm.0
    }
}

unsafe fn current_env(vm: *mut JavaVM) -> Option<EnvHandle> {
    let mut env: *mut c_void = ptr::null_mut();
    let status = jvm!(vm, GetEnv, &mut env, JNI_VERSION_1_6);
    (status == JNI_OK && !env.is_null()).then(|| EnvHandle::from_ptr(env))
}

/// Clear whatever `what` left pending and report it as failed
unsafe fn take_failure(env: *mut JNIEnv, what: &str) -> RuntimeError {
    if from_jboolean(jni!(env, ExceptionCheck)) {
        jni!(env, ExceptionClear);
    }
    RuntimeError::Backend(format!("{} failed", what))
}

unsafe fn lookup_method(
    env: *mut JNIEnv,
    class: &str,
    name: &str,
    descriptor: &str,
    is_static: bool,
) -> RuntimeResult<jmethodID> {
    let (Some(c_class), Some(c_name), Some(c_descriptor)) =
        (c_string(class), c_string(name), c_string(descriptor))
    else {
        return Err(RuntimeError::Backend(format!("bad member name {}.{}", class, name)));
    };
    let class_ref = jni!(env, FindClass, c_class.as_ptr());
    if class_ref.is_null() {
        return Err(take_failure(env, &format!("FindClass({})", class)));
    }
    let id = if is_static {
        jni!(env, GetStaticMethodID, class_ref, c_name.as_ptr(), c_descriptor.as_ptr())
    } else {
        jni!(env, GetMethodID, class_ref, c_name.as_ptr(), c_descriptor.as_ptr())
    };
    jni!(env, DeleteLocalRef, class_ref);
    if id.is_null() {
        return Err(take_failure(env, &format!("GetMethodID({}.{}{})", class, name, descriptor)));
    }
    Ok(id)
}

/// The calling thread's context class loader, or the system class loader
/// when it has none. Returns a local reference.
unsafe fn capture_loader(env: *mut JNIEnv) -> RuntimeResult<jobject> {
    let current_thread = lookup_method(env, "java/lang/Thread", "currentThread", "()Ljava/lang/Thread;", true)?;
    let context_loader = lookup_method(
        env,
        "java/lang/Thread",
        "getContextClassLoader",
        "()Ljava/lang/ClassLoader;",
        false,
    )?;

    let thread_class = match c_string("java/lang/Thread") {
        Some(name) => jni!(env, FindClass, name.as_ptr()),
        None => ptr::null_mut(),
    };
    if thread_class.is_null() {
        return Err(take_failure(env, "FindClass(java/lang/Thread)"));
    }
    let thread = jni!(env, CallStaticObjectMethodA, thread_class, current_thread, ptr::null());
    jni!(env, DeleteLocalRef, thread_class);
    if thread.is_null() {
        return Err(take_failure(env, "Thread.currentThread"));
    }
    let loader = jni!(env, CallObjectMethodA, thread, context_loader, ptr::null());
    jni!(env, DeleteLocalRef, thread);
    if !loader.is_null() {
        return Ok(loader);
    }
    if from_jboolean(jni!(env, ExceptionCheck)) {
        return Err(take_failure(env, "Thread.getContextClassLoader"));
    }

    let system_loader = lookup_method(
        env,
        "java/lang/ClassLoader",
        "getSystemClassLoader",
        "()Ljava/lang/ClassLoader;",
        true,
    )?;
    let loader_class = match c_string("java/lang/ClassLoader") {
        Some(name) => jni!(env, FindClass, name.as_ptr()),
        None => ptr::null_mut(),
    };
    if loader_class.is_null() {
        return Err(take_failure(env, "FindClass(java/lang/ClassLoader)"));
    }
    let loader = jni!(env, CallStaticObjectMethodA, loader_class, system_loader, ptr::null());
    jni!(env, DeleteLocalRef, loader_class);
    if loader.is_null() {
        return Err(take_failure(env, "ClassLoader.getSystemClassLoader"));
    }
    Ok(loader)
}

impl Drop for JvmRuntime {
    fn drop(&mut self) {
        // SAFETY: the VM outlives this value per `from_raw`'s contract.
        unsafe {
            match current_env(self.vm.0) {
                Some(env) => jni!(env_ptr(env), DeleteGlobalRef, obj(self.loader)),
                None => warn!("JVM runtime dropped on a detached thread; class loader reference leaked"),
            }
        }
    }
}

impl ManagedRuntime for JvmRuntime {
    fn name(&self) -> &str {
        "jvm"
    }

    fn current_env(&self) -> Option<EnvHandle> {
        // SAFETY: the VM is live per `from_raw`'s contract.
        unsafe { current_env(self.vm.0) }
    }

    fn attach_current_thread(&self, options: &AttachOptions) -> RuntimeResult<EnvHandle> {
        let name = options.thread_name.as_deref().and_then(c_string);
        let mut args = JavaVMAttachArgs {
            version: JNI_VERSION_1_6,
            name: name.as_ref().map_or(ptr::null_mut(), |n| n.as_ptr() as *mut _),
            group: ptr::null_mut(),
        };
        let mut env: *mut c_void = ptr::null_mut();
        let args_ptr = &mut args as *mut JavaVMAttachArgs as *mut c_void;
        // SAFETY: `args` and `name` live across the call.
        let status = unsafe {
            if options.daemon {
                jvm!(self.vm.0, AttachCurrentThreadAsDaemon, &mut env, args_ptr)
            } else {
                jvm!(self.vm.0, AttachCurrentThread, &mut env, args_ptr)
            }
        };
        if status != JNI_OK || env.is_null() {
            return Err(RuntimeError::AttachFailed(format!("JNI status {}", status)));
        }
        Ok(EnvHandle::from_ptr(env))
    }

    fn detach_current_thread(&self, _env: EnvHandle) -> RuntimeResult<()> {
        // SAFETY: the VM is live.
        let status = unsafe { jvm!(self.vm.0, DetachCurrentThread) };
        if status != JNI_OK {
            return Err(RuntimeError::DetachFailed(format!("JNI status {}", status)));
        }
        Ok(())
    }

    fn find_class(&self, env: EnvHandle, name: &str) -> ObjectRef {
        let Some(name) = c_string(name) else {
            return ObjectRef::NULL;
        };
        // SAFETY: `env` belongs to the calling thread.
        obj_ref(unsafe { jni!(env_ptr(env), FindClass, name.as_ptr()) })
    }

    fn load_class(&self, env: EnvHandle, name: &str) -> ObjectRef {
        let units: Vec<u16> = binary_name(name).encode_utf16().collect();
        let raw = env_ptr(env);
        // SAFETY: `env` belongs to the calling thread; the loader reference
        // is global.
        unsafe {
            let jname = jni!(raw, NewString, units.as_ptr(), units.len() as jsize);
            if jname.is_null() {
                return ObjectRef::NULL;
            }
            let args = to_jvalues(&[JValue::Object(obj_ref(jname))]);
            let class = jni!(
                raw,
                CallObjectMethodA,
                obj(self.loader),
                method_id(self.load_class),
                args.as_ptr()
            );
            jni!(raw, DeleteLocalRef, jname);
            obj_ref(class)
        }
    }

    fn object_class(&self, env: EnvHandle, o: ObjectRef) -> ObjectRef {
        // SAFETY: `env` belongs to the calling thread.
        obj_ref(unsafe { jni!(env_ptr(env), GetObjectClass, obj(o)) })
    }

    fn new_global_ref(&self, env: EnvHandle, o: ObjectRef) -> ObjectRef {
        // SAFETY: as above.
        obj_ref(unsafe { jni!(env_ptr(env), NewGlobalRef, obj(o)) })
    }

    fn delete_global_ref(&self, env: EnvHandle, o: ObjectRef) {
        // SAFETY: as above.
        unsafe { jni!(env_ptr(env), DeleteGlobalRef, obj(o)) }
    }

    fn new_local_ref(&self, env: EnvHandle, o: ObjectRef) -> ObjectRef {
        // SAFETY: as above.
        obj_ref(unsafe { jni!(env_ptr(env), NewLocalRef, obj(o)) })
    }

    fn delete_local_ref(&self, env: EnvHandle, o: ObjectRef) {
        // SAFETY: as above.
        unsafe { jni!(env_ptr(env), DeleteLocalRef, obj(o)) }
    }

    fn method_id(
        &self,
        env: EnvHandle,
        class: ObjectRef,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Option<MemberId> {
        let (name, descriptor) = (c_string(name)?, c_string(descriptor)?);
        let raw = env_ptr(env);
        // SAFETY: as above.
        let id = unsafe {
            if is_static {
                jni!(raw, GetStaticMethodID, obj(class), name.as_ptr(), descriptor.as_ptr())
            } else {
                jni!(raw, GetMethodID, obj(class), name.as_ptr(), descriptor.as_ptr())
            }
        };
        (!id.is_null()).then(|| MemberId::from_raw(id as usize))
    }

    fn field_id(
        &self,
        env: EnvHandle,
        class: ObjectRef,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Option<MemberId> {
        let (name, descriptor) = (c_string(name)?, c_string(descriptor)?);
        let raw = env_ptr(env);
        // SAFETY: as above.
        let id = unsafe {
            if is_static {
                jni!(raw, GetStaticFieldID, obj(class), name.as_ptr(), descriptor.as_ptr())
            } else {
                jni!(raw, GetFieldID, obj(class), name.as_ptr(), descriptor.as_ptr())
            }
        };
        (!id.is_null()).then(|| MemberId::from_raw(id as usize))
    }

    fn new_object(&self, env: EnvHandle, class: ObjectRef, ctor: MemberId, args: &[JValue]) -> ObjectRef {
        let args = to_jvalues(args);
        // SAFETY: as above; `args` matches the constructor per the caller.
        obj_ref(unsafe { jni!(env_ptr(env), NewObjectA, obj(class), method_id(ctor), args.as_ptr()) })
    }

    fn call_method(
        &self,
        env: EnvHandle,
        receiver: Receiver,
        method: MemberId,
        ret: &ReturnType,
        args: &[JValue],
    ) -> JValue {
        let raw = env_ptr(env);
        let args = to_jvalues(args);
        let a = args.as_ptr();
        let m = method_id(method);

        macro_rules! dispatch {
            ($instance:ident, $static_:ident) => {
                match receiver {
                    Receiver::Instance(o) => jni!(raw, $instance, obj(o), m, a),
                    Receiver::Static(c) => jni!(raw, $static_, obj(c), m, a),
                }
            };
        }

        // SAFETY: `env` belongs to the calling thread and `method` was
        // resolved for this receiver kind and return type.
        unsafe {
            match ret {
                ReturnType::Void => {
                    dispatch!(CallVoidMethodA, CallStaticVoidMethodA);
                    JValue::Void
                }
                ReturnType::Value(ty) => match ty {
                    JavaType::Boolean => {
                        JValue::Bool(from_jboolean(dispatch!(CallBooleanMethodA, CallStaticBooleanMethodA)))
                    }
                    JavaType::Byte => JValue::Byte(dispatch!(CallByteMethodA, CallStaticByteMethodA)),
                    JavaType::Char => JValue::Char(dispatch!(CallCharMethodA, CallStaticCharMethodA)),
                    JavaType::Short => JValue::Short(dispatch!(CallShortMethodA, CallStaticShortMethodA)),
                    JavaType::Int => JValue::Int(dispatch!(CallIntMethodA, CallStaticIntMethodA)),
                    JavaType::Long => JValue::Long(dispatch!(CallLongMethodA, CallStaticLongMethodA)),
                    JavaType::Float => JValue::Float(dispatch!(CallFloatMethodA, CallStaticFloatMethodA)),
                    JavaType::Double => JValue::Double(dispatch!(CallDoubleMethodA, CallStaticDoubleMethodA)),
                    JavaType::Object(_) | JavaType::Array(_) => {
                        JValue::Object(obj_ref(dispatch!(CallObjectMethodA, CallStaticObjectMethodA)))
                    }
                },
            }
        }
    }

    fn get_field(&self, env: EnvHandle, receiver: Receiver, field: MemberId, ty: &JavaType) -> JValue {
        let raw = env_ptr(env);
        let f = field_id(field);

        macro_rules! read {
            ($instance:ident, $static_:ident) => {
                match receiver {
                    Receiver::Instance(o) => jni!(raw, $instance, obj(o), f),
                    Receiver::Static(c) => jni!(raw, $static_, obj(c), f),
                }
            };
        }

        // SAFETY: `field` was resolved with `ty`'s descriptor.
        unsafe {
            match ty {
                JavaType::Boolean => JValue::Bool(from_jboolean(read!(GetBooleanField, GetStaticBooleanField))),
                JavaType::Byte => JValue::Byte(read!(GetByteField, GetStaticByteField)),
                JavaType::Char => JValue::Char(read!(GetCharField, GetStaticCharField)),
                JavaType::Short => JValue::Short(read!(GetShortField, GetStaticShortField)),
                JavaType::Int => JValue::Int(read!(GetIntField, GetStaticIntField)),
                JavaType::Long => JValue::Long(read!(GetLongField, GetStaticLongField)),
                JavaType::Float => JValue::Float(read!(GetFloatField, GetStaticFloatField)),
                JavaType::Double => JValue::Double(read!(GetDoubleField, GetStaticDoubleField)),
                JavaType::Object(_) | JavaType::Array(_) => {
                    JValue::Object(obj_ref(read!(GetObjectField, GetStaticObjectField)))
                }
            }
        }
    }

    fn set_field(&self, env: EnvHandle, receiver: Receiver, field: MemberId, ty: &JavaType, value: JValue) {
        let raw = env_ptr(env);
        let f = field_id(field);

        macro_rules! store {
            ($instance:ident, $static_:ident, $v:expr) => {
                match receiver {
                    Receiver::Instance(o) => jni!(raw, $instance, obj(o), f, $v),
                    Receiver::Static(c) => jni!(raw, $static_, obj(c), f, $v),
                }
            };
        }

        // SAFETY: `field` was resolved with `ty`'s descriptor.
        unsafe {
            match (ty, value) {
                (JavaType::Boolean, JValue::Bool(z)) => store!(SetBooleanField, SetStaticBooleanField, to_jboolean(z)),
                (JavaType::Byte, JValue::Byte(b)) => store!(SetByteField, SetStaticByteField, b),
                (JavaType::Char, JValue::Char(c)) => store!(SetCharField, SetStaticCharField, c),
                (JavaType::Short, JValue::Short(s)) => store!(SetShortField, SetStaticShortField, s),
                (JavaType::Int, JValue::Int(i)) => store!(SetIntField, SetStaticIntField, i),
                (JavaType::Long, JValue::Long(j)) => store!(SetLongField, SetStaticLongField, j),
                (JavaType::Float, JValue::Float(x)) => store!(SetFloatField, SetStaticFloatField, x),
                (JavaType::Double, JValue::Double(d)) => store!(SetDoubleField, SetStaticDoubleField, d),
                (JavaType::Object(_) | JavaType::Array(_), JValue::Object(o)) => {
                    store!(SetObjectField, SetStaticObjectField, obj(o))
                }
                (ty, value) => warn!(
                    field_type = %ty,
                    value = value.type_name(),
                    "field write with mismatched value ignored"
                ),
            }
        }
    }

    fn new_string(&self, env: EnvHandle, utf16: &[u16]) -> ObjectRef {
        // SAFETY: `env` belongs to the calling thread.
        obj_ref(unsafe { jni!(env_ptr(env), NewString, utf16.as_ptr(), utf16.len() as jsize) })
    }

    fn string_utf16(&self, env: EnvHandle, string: ObjectRef) -> Vec<u16> {
        let raw = env_ptr(env);
        // SAFETY: `string` is a live `java.lang.String` reference.
        unsafe {
            let len = jni!(raw, GetStringLength, obj(string));
            if len <= 0 {
                return Vec::new();
            }
            let mut units = vec![0u16; len as usize];
            jni!(raw, GetStringRegion, obj(string), 0, len, units.as_mut_ptr());
            units
        }
    }

    fn exception_check(&self, env: EnvHandle) -> bool {
        // SAFETY: `env` belongs to the calling thread.
        from_jboolean(unsafe { jni!(env_ptr(env), ExceptionCheck) })
    }

    fn exception_description(&self, env: EnvHandle) -> Option<String> {
        let raw = env_ptr(env);
        // SAFETY: `env` belongs to the calling thread. The throwable is
        // cleared only while `toString` runs and is re-thrown afterwards.
        unsafe {
            let throwable = jni!(raw, ExceptionOccurred);
            if throwable.is_null() {
                return None;
            }
            jni!(raw, ExceptionClear);
            let text = jni!(raw, CallObjectMethodA, throwable, method_id(self.to_string), ptr::null());
            if from_jboolean(jni!(raw, ExceptionCheck)) {
                jni!(raw, ExceptionClear);
            }
            let description = (!text.is_null()).then(|| {
                let units = self.string_utf16(env, obj_ref(text));
                jni!(raw, DeleteLocalRef, text);
                String::from_utf16_lossy(&units)
            });
            jni!(raw, Throw, throwable);
            jni!(raw, DeleteLocalRef, throwable);
            description
        }
    }

    fn exception_clear(&self, env: EnvHandle) {
        // SAFETY: `env` belongs to the calling thread.
        unsafe { jni!(env_ptr(env), ExceptionClear) }
    }

    fn register_natives(&self, env: EnvHandle, class: ObjectRef, methods: &[NativeMethod]) -> RuntimeResult<()> {
        // SAFETY: `NativeMethod` is layout-compatible with
        // `JNINativeMethod`; the VM only reads the records.
        let status: jint = unsafe {
            jni!(
                env_ptr(env),
                RegisterNatives,
                obj(class),
                methods.as_ptr() as *const JNINativeMethod,
                methods.len() as jint
            )
        };
        if status != JNI_OK {
            return Err(RuntimeError::RegistrationFailed(format!("JNI status {}", status)));
        }
        Ok(())
    }
}
