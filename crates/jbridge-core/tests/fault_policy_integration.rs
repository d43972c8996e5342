//! Exception Guard Integration Tests
//!
//! Tests validate the three fault policies against a callee that throws:
//! - Suppress: zero value returned, exception cleared
//! - Propagate: `ManagedFault` carrying the exception description
//! - Defer: zero value returned, exception left for the caller
//!
//! # Running Tests
//! ```bash
//! cargo test -p jbridge-core --test fault_policy_integration
//! ```

use std::sync::Arc;

use jbridge_core::{Bridge, BridgeError, BridgeOptions, Dispatch, Env, FaultPolicy, GenericObject, JavaType};
use jbridge_sandbox::{ClassBuilder, Sandbox, Throwable, Value};

fn bridge_with(policy: FaultPolicy) -> (Arc<Sandbox>, Bridge) {
    let sandbox = Arc::new(Sandbox::new());
    ClassBuilder::new("a/b/Fragile")
        .field("count", JavaType::Int)
        .constructor("(Z)V", |frame| {
            if frame.arg(0).as_bool().unwrap_or(false) {
                Err(Throwable::illegal_state("refusing to start"))
            } else {
                Ok(Value::Void)
            }
        })
        .method("explode", "()I", |_| Err(Throwable::illegal_state("boom")))
        .method("explodeText", "()Ljava/lang/String;", |_| Err(Throwable::runtime("no text")))
        .method("explodeObject", "()Ljava/lang/Object;", |_| Err(Throwable::runtime("no object")))
        .method("explodeVoid", "()V", |_| Err(Throwable::illegal_argument("bad state")))
        .method("answer", "()I", |_| Ok(Value::Int(42)))
        .static_method("divide", "(II)I", |frame| {
            let divisor = frame.arg_int(1);
            if divisor == 0 {
                return Err(Throwable::new("java/lang/ArithmeticException", "/ by zero"));
            }
            Ok(Value::Int(frame.arg_int(0) / divisor))
        })
        .define(&sandbox)
        .unwrap();
    let options = BridgeOptions::default().with_fault_policy(policy);
    let bridge = Bridge::with_runtime(sandbox.clone(), options);
    bridge.preload_class("a/b/Fragile").unwrap();
    (sandbox, bridge)
}

fn fragile(bridge: &Bridge) -> GenericObject {
    GenericObject::new_instance_with(bridge, "a/b/Fragile", (false,)).unwrap()
}

// ===== Suppress =====

#[test]
fn test_suppress_returns_zero_values() {
    let (_sandbox, bridge) = bridge_with(FaultPolicy::Suppress);
    let object = fragile(&bridge);
    let env = Env::current(&bridge).unwrap();

    assert_eq!(object.call_int("explode", ()).unwrap(), 0);
    assert!(!env.exception_check());
    assert_eq!(object.call_string("explodeText", ()).unwrap(), "");
    assert!(object.call_object("explodeObject", "java/lang/Object", ()).unwrap().is_none());
    object.call_void("explodeVoid", ()).unwrap();
    assert!(!env.exception_check());

    // The next call is unaffected.
    assert_eq!(object.call_int("answer", ()).unwrap(), 42);
}

#[test]
fn test_suppress_static_fault() {
    let (_sandbox, bridge) = bridge_with(FaultPolicy::Suppress);
    let class = GenericObject::for_class_name(&bridge, "a/b/Fragile").unwrap();
    assert_eq!(class.call_static_int("divide", (10, 0)).unwrap(), 0);
    assert_eq!(class.call_static_int("divide", (10, 2)).unwrap(), 5);
}

#[test]
fn test_suppress_without_description() {
    let sandbox = Arc::new(Sandbox::new());
    ClassBuilder::new("a/b/Quiet")
        .method("fail", "()Z", |_| Err(Throwable::runtime("quiet")))
        .define(&sandbox)
        .unwrap();
    let options = BridgeOptions::default().with_describe_exceptions(false);
    let bridge = Bridge::with_runtime(sandbox, options);
    bridge.preload_class("a/b/Quiet").unwrap();

    let quiet = GenericObject::new_instance(&bridge, "a/b/Quiet").unwrap();
    assert!(!quiet.call_bool("fail", ()).unwrap());
    assert!(!Env::current(&bridge).unwrap().exception_check());
}

#[test]
fn test_suppress_constructor_fault() {
    let (_sandbox, bridge) = bridge_with(FaultPolicy::Suppress);
    let err = GenericObject::new_instance_with(&bridge, "a/b/Fragile", (true,)).unwrap_err();
    assert!(matches!(err, BridgeError::InstantiationFailed(_)));
    assert!(!Env::current(&bridge).unwrap().exception_check());
}

// ===== Propagate =====

#[test]
fn test_propagate_reports_fault() {
    let (_sandbox, bridge) = bridge_with(FaultPolicy::Propagate);
    let object = fragile(&bridge);

    let err = object.call_int("explode", ()).unwrap_err();
    match err {
        BridgeError::ManagedFault { member, description } => {
            assert_eq!(member, "explode");
            assert!(description.contains("IllegalStateException"));
            assert!(description.contains("boom"));
        }
        other => panic!("expected a managed fault, got {:?}", other),
    }
    assert!(!Env::current(&bridge).unwrap().exception_check());
    assert_eq!(object.call_int("answer", ()).unwrap(), 42);
}

#[test]
fn test_propagate_void_and_static() {
    let (_sandbox, bridge) = bridge_with(FaultPolicy::Propagate);
    let object = fragile(&bridge);

    let err = object.call_void("explodeVoid", ()).unwrap_err();
    assert!(matches!(err, BridgeError::ManagedFault { ref description, .. }
        if description.contains("bad state")));

    let err = object.call_static_int("divide", (1, 0)).unwrap_err();
    assert!(matches!(err, BridgeError::ManagedFault { ref member, ref description }
        if member == "divide" && description.contains("ArithmeticException")));
}

#[test]
fn test_propagate_constructor_fault() {
    let (_sandbox, bridge) = bridge_with(FaultPolicy::Propagate);
    let err = GenericObject::new_instance_with(&bridge, "a/b/Fragile", (true,)).unwrap_err();
    assert!(matches!(err, BridgeError::ManagedFault { ref description, .. }
        if description.contains("refusing to start")));
}

#[test]
fn test_resolution_failure_is_not_a_fault() {
    let (_sandbox, bridge) = bridge_with(FaultPolicy::Propagate);
    let object = fragile(&bridge);
    let err = object.call_int("missing", ()).unwrap_err();
    assert!(matches!(err, BridgeError::MethodNotFound { .. }));
    assert!(!Env::current(&bridge).unwrap().exception_check());
}

// ===== Defer =====

#[test]
fn test_defer_leaves_exception_pending() {
    let (_sandbox, bridge) = bridge_with(FaultPolicy::Defer);
    let object = fragile(&bridge);

    assert_eq!(object.call_int("explode", ()).unwrap(), 0);
    let env = Env::current(&bridge).unwrap();
    assert!(env.exception_check());
    assert!(env.suppress_exception(false));
    assert!(!env.suppress_exception(false));
    assert!(!env.exception_check());
}

#[test]
fn test_defer_describe_clears() {
    let (_sandbox, bridge) = bridge_with(FaultPolicy::Defer);
    let object = fragile(&bridge);

    assert_eq!(object.call_string("explodeText", ()).unwrap(), "");
    let env = Env::current(&bridge).unwrap();
    assert!(env.suppress_exception(true));
    assert!(!env.exception_check());
}

#[test]
fn test_defer_constructor_fault() {
    let (_sandbox, bridge) = bridge_with(FaultPolicy::Defer);
    let err = GenericObject::new_instance_with(&bridge, "a/b/Fragile", (true,)).unwrap_err();
    assert!(matches!(err, BridgeError::InstantiationFailed(_)));

    let env = Env::current(&bridge).unwrap();
    assert!(env.suppress_exception(false));
}

#[test]
fn test_exception_raised_by_host() {
    let (sandbox, bridge) = bridge_with(FaultPolicy::Suppress);
    let env = Env::current(&bridge).unwrap();
    assert!(!env.suppress_exception(true));

    sandbox.raise(env.raw(), Throwable::runtime("raised from native code"));
    assert!(env.exception_check());
    assert!(env.suppress_exception(true));
    assert!(!env.exception_check());
}
