//! Generic Object Wrapper Integration Tests
//!
//! Tests validate:
//! - Instantiation with and without constructor arguments
//! - Instance and static calls for every supported return type
//! - Field reads and writes
//! - Object results handed back as owning wrappers
//! - Owning wrappers outliving the local reference they came from
//! - Native method registration, one at a time and from a raw array
//!
//! # Running Tests
//! ```bash
//! cargo test -p jbridge-core --test wrapper_integration
//! ```

use std::ffi::c_void;
use std::sync::Arc;

use jbridge_core::{
    Bridge, BridgeError, BridgeOptions, Dispatch, Env, GenericObject, JValue, JavaType, NativeMethod,
    ObjectArg,
};
use jbridge_sandbox::{ClassBuilder, Sandbox, Throwable, Value};

fn define_classes(sandbox: &Sandbox) {
    ClassBuilder::new("a/b/Greeter")
        .method("greet", "()Ljava/lang/String;", |frame| Ok(frame.new_string("hello")))
        .method("greetName", "(Ljava/lang/String;)Ljava/lang/String;", |frame| {
            let name = frame.arg_string(0).unwrap_or_default();
            Ok(frame.new_string(&format!("hello, {}", name)))
        })
        .method("nothing", "()Ljava/lang/Object;", |_| Ok(Value::Null))
        .define(sandbox)
        .unwrap();

    ClassBuilder::new("a/b/Counter")
        .field("count", JavaType::Int)
        .field("enabled", JavaType::Boolean)
        .field("total", JavaType::Long)
        .field("ratio", JavaType::Double)
        .field("scale", JavaType::Float)
        .field("label", JavaType::string())
        .static_field("instances", JavaType::Int, Value::Int(0))
        .static_field("unit", JavaType::string(), Value::Null)
        .constructor("()V", |frame| {
            let instances = frame.get_static("instances")?.as_int().unwrap_or(0);
            frame.set_static("instances", instances + 1)?;
            frame.set_field("enabled", true)?;
            Ok(Value::Void)
        })
        .constructor("(I)V", |frame| {
            let start = frame.arg_int(0);
            if start < 0 {
                return Err(Throwable::illegal_argument("negative start"));
            }
            frame.set_field("count", start)?;
            Ok(Value::Void)
        })
        .method("increment", "()V", |frame| {
            let count = frame.get_field("count")?.as_int().unwrap_or(0);
            frame.set_field("count", count + 1)?;
            Ok(Value::Void)
        })
        .method("add", "(IJ)J", |frame| {
            let count = frame.get_field("count")?.as_int().unwrap_or(0);
            let extra = frame.arg(1).as_long().unwrap_or(0);
            Ok(Value::Long(i64::from(count + frame.arg_int(0)) + extra))
        })
        .method("isPositive", "()Z", |frame| {
            Ok(Value::Bool(frame.get_field("count")?.as_int().unwrap_or(0) > 0))
        })
        .method("half", "()D", |frame| {
            Ok(Value::Double(f64::from(frame.get_field("count")?.as_int().unwrap_or(0)) / 2.0))
        })
        .method("label", "()Ljava/lang/String;", |frame| frame.get_field("label"))
        .method("fresh", "()La/b/Counter;", |frame| frame.new_instance("a/b/Counter"))
        .static_method("twice", "(I)I", |frame| Ok(Value::Int(frame.arg_int(0) * 2)))
        .static_method("describe", "(I)Ljava/lang/String;", |frame| {
            Ok(frame.new_string(&format!("count={}", frame.arg_int(0))))
        })
        .static_method("reset", "()V", |frame| {
            frame.set_static("instances", 0)?;
            Ok(Value::Void)
        })
        .native_method("nativeAdd", "(II)I")
        .native_static_method("nativeTriple", "(I)I")
        .native_static_method("nativeTouch", "()V")
        .define(sandbox)
        .unwrap();
}

fn setup() -> (Arc<Sandbox>, Bridge) {
    let sandbox = Arc::new(Sandbox::new());
    define_classes(&sandbox);
    let bridge = Bridge::with_runtime(sandbox.clone(), BridgeOptions::default());
    assert_eq!(bridge.preload_classes(["a/b/Greeter", "a/b/Counter"]), 2);
    (sandbox, bridge)
}

// ===== Instantiation =====

#[test]
fn test_greeter_end_to_end() {
    let (_sandbox, bridge) = setup();
    let greeter = GenericObject::new_instance(&bridge, "a/b/Greeter").unwrap();
    assert!(greeter.has_instance());
    assert!(greeter.has_class());
    assert_eq!(greeter.call_string("greet", ()).unwrap(), "hello");
    assert_eq!(greeter.call_string("greetName", ("world",)).unwrap(), "hello, world");
}

#[test]
fn test_new_instance_runs_constructor() {
    let (_sandbox, bridge) = setup();
    let counter = GenericObject::new_instance(&bridge, "a/b/Counter").unwrap();
    assert!(counter.get_bool("enabled").unwrap());
    assert_eq!(counter.get_static_int("instances").unwrap(), 1);

    let _second = GenericObject::new_instance(&bridge, "a/b/Counter").unwrap();
    assert_eq!(counter.get_static_int("instances").unwrap(), 2);
}

#[test]
fn test_new_instance_with_arguments() {
    let (_sandbox, bridge) = setup();
    let counter = GenericObject::new_instance_with(&bridge, "a/b/Counter", (5,)).unwrap();
    assert_eq!(counter.get_int("count").unwrap(), 5);
    // The argument constructor leaves `enabled` at its default.
    assert!(!counter.get_bool("enabled").unwrap());
}

#[test]
fn test_new_instance_of_class_ref() {
    let (_sandbox, bridge) = setup();
    let class = bridge.find_class("a/b/Greeter").unwrap();
    let greeter = GenericObject::new_instance_of(&bridge, class).unwrap();
    assert_eq!(greeter.call_string("greet", ()).unwrap(), "hello");
}

#[test]
fn test_constructor_failure() {
    let (_sandbox, bridge) = setup();
    let err = GenericObject::new_instance_with(&bridge, "a/b/Counter", (-1,)).unwrap_err();
    assert!(matches!(err, BridgeError::InstantiationFailed(_)));
    assert!(!Env::current(&bridge).unwrap().exception_check());
}

#[test]
fn test_missing_constructor() {
    let (_sandbox, bridge) = setup();
    let err = GenericObject::new_instance_with(&bridge, "a/b/Greeter", (1, 2)).unwrap_err();
    assert!(matches!(err, BridgeError::MethodNotFound { ref name, ref signature }
        if name == "<init>" && signature == "(II)V"));
}

#[test]
fn test_unknown_class() {
    let (_sandbox, bridge) = setup();
    let err = GenericObject::new_instance(&bridge, "a/b/Missing").unwrap_err();
    assert!(matches!(err, BridgeError::ClassNotFound(_)));
    assert!(GenericObject::for_class_name(&bridge, "a/b/Missing").is_err());
}

// ===== Calls =====

#[test]
fn test_instance_calls() {
    let (_sandbox, bridge) = setup();
    let counter = GenericObject::new_instance_with(&bridge, "a/b/Counter", (3,)).unwrap();

    counter.call_void("increment", ()).unwrap();
    assert_eq!(counter.get_int("count").unwrap(), 4);
    assert!(counter.call_bool("isPositive", ()).unwrap());
    assert_eq!(counter.call_long("add", (1, 10_000_000_000i64)).unwrap(), 10_000_000_005);
    assert_eq!(counter.call_double("half", ()).unwrap(), 2.0);
}

#[test]
fn test_static_calls() {
    let (_sandbox, bridge) = setup();
    let counter = GenericObject::for_class_name(&bridge, "a/b/Counter").unwrap();
    assert!(!counter.has_instance());

    assert_eq!(counter.call_static_int("twice", (21,)).unwrap(), 42);
    assert_eq!(counter.call_static_string("describe", (7,)).unwrap(), "count=7");

    let _instance = GenericObject::new_instance(&bridge, "a/b/Counter").unwrap();
    assert_eq!(counter.get_static_int("instances").unwrap(), 1);
    counter.call_static_void("reset", ()).unwrap();
    assert_eq!(counter.get_static_int("instances").unwrap(), 0);
}

#[test]
fn test_static_calls_through_instance_wrapper() {
    let (_sandbox, bridge) = setup();
    let counter = GenericObject::new_instance(&bridge, "a/b/Counter").unwrap();
    assert_eq!(counter.call_static_int("twice", (4,)).unwrap(), 8);
}

#[test]
fn test_system_class_static_call() {
    let (_sandbox, bridge) = setup();
    let string = GenericObject::for_class_name(&bridge, "java/lang/String").unwrap();
    assert_eq!(string.call_static_string("valueOf", (123,)).unwrap(), "123");
}

#[test]
fn test_member_not_found() {
    let (_sandbox, bridge) = setup();
    let counter = GenericObject::new_instance(&bridge, "a/b/Counter").unwrap();

    let err = counter.call_int("missing", ()).unwrap_err();
    assert!(matches!(err, BridgeError::MethodNotFound { ref name, ref signature }
        if name == "missing" && signature == "()I"));
    // Right name, wrong descriptor.
    let err = counter.call_int("increment", ()).unwrap_err();
    assert!(err.is_resolution_failure());
    // Instance method looked up as static.
    assert!(counter.call_static_void("increment", ()).unwrap_err().is_resolution_failure());

    let err = counter.get_long("count").unwrap_err();
    assert!(matches!(err, BridgeError::FieldNotFound { ref name, ref signature }
        if name == "count" && signature == "J"));
    assert!(counter.set_int("nope", 1).unwrap_err().is_resolution_failure());

    let env = Env::current(&bridge).unwrap();
    assert!(!env.exception_check());
}

#[test]
fn test_object_argument() {
    let sandbox = Arc::new(Sandbox::new());
    ClassBuilder::new("a/b/Holder")
        .static_method("isGreeter", "(La/b/Greeter;)Z", |frame| Ok(Value::Bool(!frame.arg(0).is_null())))
        .define(&sandbox)
        .unwrap();
    define_classes(&sandbox);
    let bridge = Bridge::with_runtime(sandbox, BridgeOptions::default());
    bridge.preload_classes(["a/b/Holder", "a/b/Greeter"]);

    let holder = GenericObject::for_class_name(&bridge, "a/b/Holder").unwrap();
    let greeter = GenericObject::new_instance(&bridge, "a/b/Greeter").unwrap();
    let raw = greeter.raw_object();
    assert!(holder.call_static_bool("isGreeter", (ObjectArg::new("a/b/Greeter", raw),)).unwrap());
}

// ===== Object results =====

#[test]
fn test_call_object_returns_owned_wrapper() {
    let (sandbox, bridge) = setup();
    let greeter = GenericObject::new_instance(&bridge, "a/b/Greeter").unwrap();
    let env = Env::current(&bridge).unwrap();
    let locals = sandbox.local_ref_count(env.raw());

    let text = greeter
        .call_object("greet", "java/lang/String", ())
        .unwrap()
        .expect("greet returns a string");
    assert!(text.has_instance());
    assert_eq!(text.call_int("length", ()).unwrap(), 5);
    assert_eq!(sandbox.local_ref_count(env.raw()), locals);

    let nothing = greeter.call_object("nothing", "java/lang/Object", ()).unwrap();
    assert!(nothing.is_none());
}

#[test]
fn test_call_object_of_application_class() {
    let (_sandbox, bridge) = setup();
    let counter = GenericObject::new_instance_with(&bridge, "a/b/Counter", (7,)).unwrap();
    let fresh = counter
        .call_object("fresh", "a/b/Counter", ())
        .unwrap()
        .unwrap();
    assert_eq!(fresh.get_int("count").unwrap(), 0);
    assert!(fresh.get_bool("enabled").unwrap());
    fresh.call_void("increment", ()).unwrap();
    assert_eq!(fresh.get_int("count").unwrap(), 1);
    assert_eq!(counter.get_int("count").unwrap(), 7);
}

#[test]
fn test_call_object_uses_return_class() {
    let (_sandbox, bridge) = setup();
    let greeter = GenericObject::new_instance(&bridge, "a/b/Greeter").unwrap();
    let err = greeter.call_object("greet", "java/lang/Object", ()).unwrap_err();
    assert!(matches!(err, BridgeError::MethodNotFound { ref signature, .. }
        if signature == "()Ljava/lang/Object;"));
}

#[test]
fn test_static_object_result() {
    let (_sandbox, bridge) = setup();
    let counter = GenericObject::for_class_name(&bridge, "a/b/Counter").unwrap();
    let text = counter
        .call_static_object("describe", "java/lang/String", (9,))
        .unwrap()
        .unwrap();
    assert_eq!(text.call_string("concat", ("!",)).unwrap(), "count=9!");
}

#[test]
fn test_owning_wrapper_outlives_local() {
    let (sandbox, bridge) = setup();
    let owned = {
        let env = Env::current(&bridge).unwrap();
        let locals = sandbox.local_ref_count(env.raw());
        let local = env.to_managed_text("outlives").unwrap();
        let owned = GenericObject::from_local_owned(local).unwrap();
        assert_eq!(sandbox.local_ref_count(env.raw()), locals);
        owned
    };
    assert_eq!(owned.call_int("length", ()).unwrap(), 8);
    assert!(!owned.call_bool("isEmpty", ()).unwrap());
}

#[test]
fn test_owning_wrapper_moves_between_threads() {
    let (_sandbox, bridge) = setup();
    let counter = GenericObject::new_instance_with(&bridge, "a/b/Counter", (10,)).unwrap();

    let count = std::thread::spawn(move || {
        counter.call_void("increment", ()).unwrap();
        counter.get_int("count").unwrap()
    })
    .join()
    .unwrap();
    assert_eq!(count, 11);
}

#[test]
fn test_take_object_releases_ownership() {
    let (sandbox, bridge) = setup();
    let mut greeter = GenericObject::new_instance(&bridge, "a/b/Greeter").unwrap();
    let globals = sandbox.global_ref_count();

    let instance = greeter.take_object().unwrap();
    assert!(!greeter.has_instance());
    assert!(greeter.call_string("greet", ()).unwrap_err().is_resolution_failure());
    assert_eq!(sandbox.global_ref_count(), globals);

    drop(instance);
    assert_eq!(sandbox.global_ref_count(), globals - 1);
}

#[test]
fn test_global_refs_return_to_baseline() {
    let (sandbox, bridge) = setup();
    let baseline = sandbox.global_ref_count();
    {
        let greeter = GenericObject::new_instance(&bridge, "a/b/Greeter").unwrap();
        let text = greeter.call_object("greet", "java/lang/String", ()).unwrap();
        assert!(text.is_some());
        assert!(sandbox.global_ref_count() > baseline);
    }
    assert_eq!(sandbox.global_ref_count(), baseline);

    bridge.unload_classes();
    assert_eq!(sandbox.global_ref_count(), baseline - 2);
}

// ===== Fields =====

#[test]
fn test_field_roundtrip() {
    let (_sandbox, bridge) = setup();
    let counter = GenericObject::new_instance(&bridge, "a/b/Counter").unwrap();

    counter.set_int("count", 12).unwrap();
    counter.set_bool("enabled", false).unwrap();
    counter.set_long("total", -1 << 40).unwrap();
    counter.set_double("ratio", 0.25).unwrap();
    counter.set_float("scale", 1.5).unwrap();
    counter.set_string("label", "ready ✓").unwrap();

    assert_eq!(counter.get_int("count").unwrap(), 12);
    assert!(!counter.get_bool("enabled").unwrap());
    assert_eq!(counter.get_long("total").unwrap(), -1 << 40);
    assert_eq!(counter.get_double("ratio").unwrap(), 0.25);
    assert_eq!(counter.get_float("scale").unwrap(), 1.5);
    assert_eq!(counter.get_string("label").unwrap(), "ready ✓");
    assert_eq!(counter.call_string("label", ()).unwrap(), "ready ✓");
}

#[test]
fn test_null_string_field_reads_empty() {
    let (_sandbox, bridge) = setup();
    let counter = GenericObject::new_instance(&bridge, "a/b/Counter").unwrap();
    assert_eq!(counter.get_string("label").unwrap(), "");
    assert_eq!(counter.get_static_string("unit").unwrap(), "");
}

// ===== Raw descriptor calls =====

#[test]
fn test_param_void_call() {
    let (_sandbox, bridge) = setup();
    let counter = GenericObject::new_instance(&bridge, "a/b/Counter").unwrap();
    unsafe { counter.call_param_void("increment", "()V", &[]) }.unwrap();
    assert_eq!(counter.get_int("count").unwrap(), 1);

    unsafe { counter.call_static_param_void("reset", "()V", &[]) }.unwrap();
    assert_eq!(counter.get_static_int("instances").unwrap(), 0);

    let err = unsafe { counter.call_param_void("increment", "(I)V", &[JValue::Int(1)]) }.unwrap_err();
    assert!(err.is_resolution_failure());
}

// ===== Native registration =====

extern "system" fn native_add(_env: *mut c_void, _this: *mut c_void, a: i32, b: i32) -> i32 {
    a + b
}

extern "system" fn native_triple(_env: *mut c_void, _class: *mut c_void, a: i32) -> i32 {
    a * 3
}

extern "system" fn native_touch(_env: *mut c_void, _class: *mut c_void) {}

fn entry_add() -> *mut c_void {
    let f: extern "system" fn(*mut c_void, *mut c_void, i32, i32) -> i32 = native_add;
    f as *mut c_void
}

fn entry_triple() -> *mut c_void {
    let f: extern "system" fn(*mut c_void, *mut c_void, i32) -> i32 = native_triple;
    f as *mut c_void
}

fn entry_touch() -> *mut c_void {
    let f: extern "system" fn(*mut c_void, *mut c_void) = native_touch;
    f as *mut c_void
}

#[test]
fn test_register_single_native() {
    let (sandbox, bridge) = setup();
    let counter = GenericObject::new_instance(&bridge, "a/b/Counter").unwrap();

    counter
        .register_native_method(c"nativeAdd", c"(II)I", entry_add())
        .unwrap();
    assert!(sandbox.is_native_bound("a/b/Counter", "nativeAdd", "(II)I"));
    assert_eq!(counter.call_int("nativeAdd", (2, 40)).unwrap(), 42);
}

#[test]
fn test_register_natives_from_raw_array() {
    let (sandbox, bridge) = setup();
    let counter = GenericObject::for_class_name(&bridge, "a/b/Counter").unwrap();

    let methods = [
        NativeMethod::new(c"nativeTriple", c"(I)I", entry_triple()),
        NativeMethod::new(c"nativeTouch", c"()V", entry_touch()),
    ];
    unsafe { counter.register_native_methods_raw(methods.as_ptr(), std::mem::size_of_val(&methods)) }
        .unwrap();

    assert!(sandbox.is_native_bound("a/b/Counter", "nativeTriple", "(I)I"));
    assert!(sandbox.is_native_bound("a/b/Counter", "nativeTouch", "()V"));
    assert_eq!(counter.call_static_int("nativeTriple", (14,)).unwrap(), 42);
    counter.call_static_void("nativeTouch", ()).unwrap();
}

#[test]
fn test_register_unknown_native_fails() {
    let (sandbox, bridge) = setup();
    let counter = GenericObject::for_class_name(&bridge, "a/b/Counter").unwrap();

    let methods = [
        NativeMethod::new(c"nativeTriple", c"(I)I", entry_triple()),
        NativeMethod::new(c"nativeMissing", c"()V", entry_touch()),
    ];
    let err = counter.register_native_methods(&methods).unwrap_err();
    assert!(matches!(err, BridgeError::RegistrationFailed(_)));
    // Registration is all or nothing.
    assert!(!sandbox.is_native_bound("a/b/Counter", "nativeTriple", "(I)I"));
    assert!(!Env::current(&bridge).unwrap().exception_check());
}
