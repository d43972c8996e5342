//! jbridge Core
//!
//! Lets native code drive a managed runtime hosted in the same process,
//! from any thread:
//! - Environment access with on-demand thread attachment ([`Env`])
//! - A class preloading registry usable from native-created threads
//! - Text conversion between Rust strings and managed UTF-16 strings
//! - An exception guard that detects and clears managed faults
//! - A dynamic-dispatch wrapper over managed objects and classes
//!   ([`GenericObject`], [`BorrowedObject`], [`Dispatch`])
//!
//! # Example
//!
//! ```ignore
//! use jbridge_core::{Bridge, Dispatch, GenericObject};
//!
//! let bridge = Bridge::global();
//! bridge.register_runtime(runtime);
//! bridge.preload_class("a/b/Greeter")?;
//!
//! let greeter = GenericObject::new_instance(&bridge, "a/b/Greeter")?;
//! assert_eq!(greeter.call_string("greet", ())?, "hello");
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod args;
pub mod bridge;
pub mod env;
pub mod exception;
pub mod object;
pub mod refs;
pub mod registry;
pub mod text;

pub use args::{Arg, ArgFrame, CallArgs, ObjectArg};
pub use bridge::{Bridge, BridgeOptions, FaultPolicy};
pub use env::Env;
pub use object::{BorrowedObject, Dispatch, GenericObject};
pub use refs::{ClassRef, GlobalRef, LocalRef};
pub use registry::ClassRegistry;

pub use jbridge_sdk::{
    AttachOptions, JValue, JavaType, ManagedRuntime, NativeMethod, ObjectRef, ReturnType,
    RuntimeError,
};

/// Bridge errors
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    /// No runtime was registered before the bridge was used
    #[error("No managed runtime registered")]
    RuntimeNotRegistered,

    /// The calling thread could not be attached
    #[error("Thread attachment failed: {0}")]
    AttachFailed(String),

    /// A class could not be resolved by name
    #[error("Class not found: {0}")]
    ClassNotFound(String),

    /// A method could not be resolved on the wrapped class
    #[error("Method not found: {name}{signature}")]
    MethodNotFound {
        /// Method name
        name: String,
        /// Method descriptor
        signature: String,
    },

    /// A field could not be resolved on the wrapped class
    #[error("Field not found: {name} ({signature})")]
    FieldNotFound {
        /// Field name
        name: String,
        /// Field type descriptor
        signature: String,
    },

    /// The constructor ran but produced no instance
    #[error("Instantiation failed: {0}")]
    InstantiationFailed(String),

    /// The managed callee threw (only under `FaultPolicy::Propagate`)
    #[error("Managed exception in {member}: {description}")]
    ManagedFault {
        /// Member that faulted
        member: String,
        /// Exception description
        description: String,
    },

    /// A caller-supplied descriptor is malformed or does not match the call
    #[error("Invalid signature {signature}: {reason}")]
    InvalidSignature {
        /// The descriptor as given
        signature: String,
        /// What is wrong with it
        reason: String,
    },

    /// The runtime could not allocate a managed value
    #[error("Allocation failed: {0}")]
    AllocationFailed(String),

    /// Native method registration was rejected
    #[error("Native method registration failed: {0}")]
    RegistrationFailed(String),

    /// Backend error
    #[error(transparent)]
    Runtime(#[from] RuntimeError),
}

impl BridgeError {
    /// Whether this is a by-name resolution failure (method or field)
    pub fn is_resolution_failure(&self) -> bool {
        matches!(
            self,
            BridgeError::MethodNotFound { .. } | BridgeError::FieldNotFound { .. }
        )
    }

    pub(crate) fn method_not_found(name: &str, signature: &str) -> Self {
        BridgeError::MethodNotFound {
            name: name.to_string(),
            signature: signature.to_string(),
        }
    }

    pub(crate) fn field_not_found(name: &str, signature: &str) -> Self {
        BridgeError::FieldNotFound {
            name: name.to_string(),
            signature: signature.to_string(),
        }
    }
}

/// Bridge result
pub type BridgeResult<T> = Result<T, BridgeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolution_failure_family() {
        assert!(BridgeError::method_not_found("run", "()V").is_resolution_failure());
        assert!(BridgeError::field_not_found("count", "I").is_resolution_failure());
        assert!(!BridgeError::ClassNotFound("a/B".into()).is_resolution_failure());
        assert!(!BridgeError::RuntimeNotRegistered.is_resolution_failure());
    }

    #[test]
    fn test_error_messages() {
        assert_eq!(
            BridgeError::method_not_found("greet", "()Ljava/lang/String;").to_string(),
            "Method not found: greet()Ljava/lang/String;"
        );
        assert_eq!(
            BridgeError::field_not_found("count", "I").to_string(),
            "Field not found: count (I)"
        );
    }
}
