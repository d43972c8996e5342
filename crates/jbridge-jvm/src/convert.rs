//! Conversions between bridge values and raw JNI values

use std::ffi::CString;

use jbridge_sdk::{JValue, MemberId, ObjectRef};
use jni_sys::{jboolean, jfieldID, jmethodID, jobject, jvalue, JNI_FALSE, JNI_TRUE};

/// Lower a bridge value into a JNI argument slot
pub(crate) fn to_jvalue(value: &JValue) -> jvalue {
    match *value {
        JValue::Bool(z) => jvalue { z: to_jboolean(z) },
        JValue::Byte(b) => jvalue { b },
        JValue::Char(c) => jvalue { c },
        JValue::Short(s) => jvalue { s },
        JValue::Int(i) => jvalue { i },
        JValue::Long(j) => jvalue { j },
        JValue::Float(f) => jvalue { f },
        JValue::Double(d) => jvalue { d },
        JValue::Object(r) => jvalue { l: r.as_ptr() },
        JValue::Void => jvalue { j: 0 },
    }
}

pub(crate) fn to_jvalues(values: &[JValue]) -> Vec<jvalue> {
    values.iter().map(to_jvalue).collect()
}

pub(crate) fn to_jboolean(value: bool) -> jboolean {
    if value {
        JNI_TRUE
    } else {
        JNI_FALSE
    }
}

pub(crate) fn from_jboolean(value: jboolean) -> bool {
    value != JNI_FALSE
}

pub(crate) fn obj(r: ObjectRef) -> jobject {
    r.as_ptr()
}

pub(crate) fn obj_ref(raw: jobject) -> ObjectRef {
    ObjectRef::from_ptr(raw)
}

pub(crate) fn method_id(id: MemberId) -> jmethodID {
    id.as_raw() as jmethodID
}

pub(crate) fn field_id(id: MemberId) -> jfieldID {
    id.as_raw() as jfieldID
}

/// Binary name as `ClassLoader.loadClass` expects it (`a.b.C`)
pub(crate) fn binary_name(name: &str) -> String {
    name.replace('/', ".")
}

/// NUL-terminated copy; `None` if `s` has an interior NUL
pub(crate) fn c_string(s: &str) -> Option<CString> {
    CString::new(s).ok()
}
