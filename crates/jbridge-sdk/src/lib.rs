//! jbridge SDK - the contract between the bridge and a managed runtime
//!
//! This crate holds the types both sides of the bridge agree on, without
//! depending on any particular runtime:
//!
//! - [`ManagedRuntime`]: the capability interface a backend implements
//! - raw handles ([`ObjectRef`], [`EnvHandle`], [`MemberId`]) and [`JValue`]
//! - type descriptors and signature building ([`JavaType`], [`MethodSignature`])
//! - [`NativeMethod`] records for native-method registration
//!
//! # Example
//!
//! ```ignore
//! use jbridge_sdk::{method_descriptor, JavaType, ReturnType};
//!
//! let desc = method_descriptor(&[JavaType::Int, JavaType::string()], &ReturnType::Void);
//! assert_eq!(desc, "(ILjava/lang/String;)V");
//! ```

#![warn(missing_docs)]

pub mod error;
pub mod native;
pub mod runtime;
pub mod signature;
pub mod value;

pub use error::{RuntimeError, RuntimeResult};
pub use native::{methods_from_raw, NativeMethod};
pub use runtime::{AttachOptions, ManagedRuntime};
pub use signature::{
    method_descriptor, JavaType, MethodSignature, ReturnType, CONSTRUCTOR_NAME, STRING_CLASS,
};
pub use value::{EnvHandle, JValue, MemberId, ObjectRef, Receiver};
