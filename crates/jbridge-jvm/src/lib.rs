//! jbridge JVM backend
//!
//! Implements [`ManagedRuntime`](jbridge_sdk::ManagedRuntime) over a JNI
//! `JavaVM`. Register the VM once, from a thread where application classes
//! are visible, then use the bridge from any thread:
//!
//! ```ignore
//! #[no_mangle]
//! pub extern "system" fn JNI_OnLoad(vm: *mut jni_sys::JavaVM, _: *mut c_void) -> jint {
//!     let bridge = jbridge_core::Bridge::global();
//!     unsafe { jbridge_jvm::register_java_vm(&bridge, vm) }.ok();
//!     bridge.preload_classes(["com/example/Greeter"]);
//!     jni_sys::JNI_VERSION_1_6
//! }
//! ```

#![warn(missing_docs)]

mod convert;
pub mod vm;

use std::sync::Arc;

use jbridge_core::{Bridge, BridgeResult};
use tracing::info;

pub use vm::JvmRuntime;

/// Wrap `vm` and register it as `bridge`'s runtime.
///
/// # Safety
/// `vm` must point to a live `JavaVM` that outlives the bridge, and the
/// calling thread must be attached to it.
pub unsafe fn register_java_vm(bridge: &Bridge, vm: *mut jni_sys::JavaVM) -> BridgeResult<Arc<JvmRuntime>> {
    let runtime = Arc::new(JvmRuntime::from_raw(vm)?);
    bridge.register_runtime(runtime.clone());
    info!("JVM registered with the bridge");
    Ok(runtime)
}
