//! Calling bound native entry points
//!
//! Entry points follow the JNI calling convention: environment pointer,
//! receiver (instance or class), then the declared parameters. The sandbox
//! supports `int` parameters (up to three) and a `void` or `int` result.

use std::ffi::c_void;

use jbridge_sdk::{JavaType, MethodSignature, ReturnType};

type Raw = *mut c_void;

/// Whether a native method with this signature can be called
pub(crate) fn supported(signature: &MethodSignature) -> bool {
    signature.params.len() <= 3
        && signature.params.iter().all(|p| *p == JavaType::Int)
        && matches!(signature.ret, ReturnType::Void | ReturnType::Value(JavaType::Int))
}

/// Call `entry`. Returns the `int` result, or 0 for `void`.
///
/// # Safety
/// `entry` must be an `extern "system"` function taking `(env, receiver)`
/// followed by `args.len()` `i32`s and returning what `returns_int` says.
pub(crate) unsafe fn invoke(entry: usize, env: Raw, receiver: Raw, args: &[i32], returns_int: bool) -> i32 {
    let entry = entry as Raw;
    match (args, returns_int) {
        ([], false) => {
            let f: extern "system" fn(Raw, Raw) = std::mem::transmute(entry);
            f(env, receiver);
            0
        }
        ([], true) => {
            let f: extern "system" fn(Raw, Raw) -> i32 = std::mem::transmute(entry);
            f(env, receiver)
        }
        ([a], false) => {
            let f: extern "system" fn(Raw, Raw, i32) = std::mem::transmute(entry);
            f(env, receiver, *a);
            0
        }
        ([a], true) => {
            let f: extern "system" fn(Raw, Raw, i32) -> i32 = std::mem::transmute(entry);
            f(env, receiver, *a)
        }
        ([a, b], false) => {
            let f: extern "system" fn(Raw, Raw, i32, i32) = std::mem::transmute(entry);
            f(env, receiver, *a, *b);
            0
        }
        ([a, b], true) => {
            let f: extern "system" fn(Raw, Raw, i32, i32) -> i32 = std::mem::transmute(entry);
            f(env, receiver, *a, *b)
        }
        ([a, b, c], false) => {
            let f: extern "system" fn(Raw, Raw, i32, i32, i32) = std::mem::transmute(entry);
            f(env, receiver, *a, *b, *c);
            0
        }
        ([a, b, c], true) => {
            let f: extern "system" fn(Raw, Raw, i32, i32, i32) -> i32 = std::mem::transmute(entry);
            f(env, receiver, *a, *b, *c)
        }
        _ => 0,
    }
}
