//! Native method records for registration with the managed runtime
//!
//! [`NativeMethod`] has the same layout as JNI's `JNINativeMethod`, so a
//! slice of them can be handed to a JVM unchanged.

use std::ffi::{c_char, c_void, CStr};

/// One native entry point: member name, descriptor and code pointer.
#[repr(C)]
#[derive(Debug, Clone, Copy)]
pub struct NativeMethod {
    name: *const c_char,
    signature: *const c_char,
    fn_ptr: *mut c_void,
}

// The name and signature point at 'static data and the code pointer is
// immutable, so the record can be shared freely.
unsafe impl Send for NativeMethod {}
unsafe impl Sync for NativeMethod {}

impl NativeMethod {
    /// Create a record from static strings and an entry point.
    pub fn new(name: &'static CStr, signature: &'static CStr, fn_ptr: *mut c_void) -> Self {
        Self {
            name: name.as_ptr(),
            signature: signature.as_ptr(),
            fn_ptr,
        }
    }

    /// Create a record from raw parts.
    ///
    /// # Safety
    /// `name` and `signature` must be NUL-terminated and outlive every use
    /// of the record.
    pub unsafe fn from_raw_parts(
        name: *const c_char,
        signature: *const c_char,
        fn_ptr: *mut c_void,
    ) -> Self {
        Self {
            name,
            signature,
            fn_ptr,
        }
    }

    /// Member name
    pub fn name(&self) -> &CStr {
        // SAFETY: both constructors guarantee a NUL-terminated string that
        // outlives the record.
        unsafe { CStr::from_ptr(self.name) }
    }

    /// Method descriptor
    pub fn signature(&self) -> &CStr {
        // SAFETY: see `name`.
        unsafe { CStr::from_ptr(self.signature) }
    }

    /// Entry point
    pub fn fn_ptr(&self) -> *mut c_void {
        self.fn_ptr
    }
}

/// View a C array of records given its size in *bytes*.
///
/// This is the shape of the registration boundary: callers pass
/// `sizeof(array)`, not an element count. A trailing partial element is
/// ignored.
///
/// # Safety
/// `methods` must point to at least `size_in_bytes` readable bytes of
/// initialized `NativeMethod` records that outlive `'a`.
pub unsafe fn methods_from_raw<'a>(
    methods: *const NativeMethod,
    size_in_bytes: usize,
) -> &'a [NativeMethod] {
    let count = size_in_bytes / std::mem::size_of::<NativeMethod>();
    if methods.is_null() || count == 0 {
        return &[];
    }
    std::slice::from_raw_parts(methods, count)
}

#[cfg(test)]
mod tests {
    use super::*;

    extern "C" fn noop() {}

    #[test]
    fn test_accessors() {
        let m = NativeMethod::new(c"onEvent", c"(I)V", noop as *mut c_void);
        assert_eq!(m.name().to_str().unwrap(), "onEvent");
        assert_eq!(m.signature().to_str().unwrap(), "(I)V");
        assert_eq!(m.fn_ptr(), noop as *mut c_void);
    }

    #[test]
    fn test_methods_from_raw_uses_byte_size() {
        let table = [
            NativeMethod::new(c"a", c"()V", noop as *mut c_void),
            NativeMethod::new(c"b", c"()V", noop as *mut c_void),
            NativeMethod::new(c"c", c"()V", noop as *mut c_void),
        ];
        let bytes = std::mem::size_of_val(&table);
        let view = unsafe { methods_from_raw(table.as_ptr(), bytes) };
        assert_eq!(view.len(), 3);
        assert_eq!(view[2].name().to_str().unwrap(), "c");

        let view = unsafe { methods_from_raw(table.as_ptr(), 0) };
        assert!(view.is_empty());
    }

    #[test]
    fn test_layout_matches_three_pointers() {
        assert_eq!(
            std::mem::size_of::<NativeMethod>(),
            3 * std::mem::size_of::<usize>()
        );
    }
}
