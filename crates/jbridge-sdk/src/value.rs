//! Raw handles and argument values crossing the runtime boundary
//!
//! Everything here is plain data. A [`ObjectRef`] carries no ownership; the
//! bridge decides whether a given raw reference is short-lived (local) or
//! durable (global) and releases it accordingly.

use std::fmt;

use crate::signature::{JavaType, ReturnType};

// ============================================================================
// Raw references
// ============================================================================

/// Opaque reference to a managed object or class.
///
/// The bit pattern is whatever the backend hands out (a `jobject` pointer
/// for a JVM, a table index for the sandbox). Zero is the null reference.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(transparent)]
pub struct ObjectRef(usize);

impl ObjectRef {
    /// The null reference
    pub const NULL: ObjectRef = ObjectRef(0);

    /// Create from raw bits
    #[inline]
    pub const fn from_raw(bits: usize) -> Self {
        Self(bits)
    }

    /// Get raw bits
    #[inline]
    pub const fn as_raw(self) -> usize {
        self.0
    }

    /// Create from a backend pointer
    #[inline]
    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        Self(ptr as usize)
    }

    /// Reinterpret as a backend pointer
    #[inline]
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }

    /// Check for the null reference
    #[inline]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }

    /// `None` for the null reference
    #[inline]
    pub fn non_null(self) -> Option<Self> {
        if self.is_null() {
            None
        } else {
            Some(self)
        }
    }
}

impl fmt::Debug for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            write!(f, "ObjectRef(null)")
        } else {
            write!(f, "ObjectRef({:#x})", self.0)
        }
    }
}

/// Opaque per-thread environment handle.
///
/// Only valid on the thread that obtained it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct EnvHandle(usize);

impl EnvHandle {
    /// Create from raw bits
    #[inline]
    pub const fn from_raw(bits: usize) -> Self {
        Self(bits)
    }

    /// Get raw bits
    #[inline]
    pub const fn as_raw(self) -> usize {
        self.0
    }

    /// Create from a backend pointer
    #[inline]
    pub fn from_ptr<T>(ptr: *mut T) -> Self {
        Self(ptr as usize)
    }

    /// Reinterpret as a backend pointer
    #[inline]
    pub fn as_ptr<T>(self) -> *mut T {
        self.0 as *mut T
    }
}

/// Identifier of a resolved method or field.
///
/// Good for the call that resolved it; the bridge never keeps one around.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(transparent)]
pub struct MemberId(usize);

impl MemberId {
    /// Create from raw bits
    #[inline]
    pub const fn from_raw(bits: usize) -> Self {
        Self(bits)
    }

    /// Get raw bits
    #[inline]
    pub const fn as_raw(self) -> usize {
        self.0
    }
}

/// Receiver of a member access: an instance, or a class for static members.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Receiver {
    /// Instance member on this object
    Instance(ObjectRef),
    /// Static member on this class
    Static(ObjectRef),
}

impl Receiver {
    /// Whether this addresses a static member
    pub fn is_static(&self) -> bool {
        matches!(self, Receiver::Static(_))
    }

    /// The raw reference behind the receiver
    pub fn raw(&self) -> ObjectRef {
        match self {
            Receiver::Instance(r) | Receiver::Static(r) => *r,
        }
    }
}

// ============================================================================
// JValue
// ============================================================================

/// A single argument or result value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum JValue {
    /// `Z`
    Bool(bool),
    /// `B`
    Byte(i8),
    /// `C`
    Char(u16),
    /// `S`
    Short(i16),
    /// `I`
    Int(i32),
    /// `J`
    Long(i64),
    /// `F`
    Float(f32),
    /// `D`
    Double(f64),
    /// `L...;` or `[...`
    Object(ObjectRef),
    /// `V`
    Void,
}

impl JValue {
    /// The zero value for a return type: `false`, `0`, `0.0`, null or void
    pub fn zero(ret: &ReturnType) -> Self {
        match ret {
            ReturnType::Void => JValue::Void,
            ReturnType::Value(ty) => Self::zero_of(ty),
        }
    }

    /// The zero value for a field or parameter type
    pub fn zero_of(ty: &JavaType) -> Self {
        match ty {
            JavaType::Boolean => JValue::Bool(false),
            JavaType::Byte => JValue::Byte(0),
            JavaType::Char => JValue::Char(0),
            JavaType::Short => JValue::Short(0),
            JavaType::Int => JValue::Int(0),
            JavaType::Long => JValue::Long(0),
            JavaType::Float => JValue::Float(0.0),
            JavaType::Double => JValue::Double(0.0),
            JavaType::Object(_) | JavaType::Array(_) => JValue::Object(ObjectRef::NULL),
        }
    }

    /// Whether this value can be passed where `ty` is declared
    pub fn fits(&self, ty: &JavaType) -> bool {
        matches!(
            (self, ty),
            (JValue::Bool(_), JavaType::Boolean)
                | (JValue::Byte(_), JavaType::Byte)
                | (JValue::Char(_), JavaType::Char)
                | (JValue::Short(_), JavaType::Short)
                | (JValue::Int(_), JavaType::Int)
                | (JValue::Long(_), JavaType::Long)
                | (JValue::Float(_), JavaType::Float)
                | (JValue::Double(_), JavaType::Double)
                | (JValue::Object(_), JavaType::Object(_))
                | (JValue::Object(_), JavaType::Array(_))
        )
    }

    /// Extract a boolean
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            JValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Extract an int
    pub fn as_int(&self) -> Option<i32> {
        match self {
            JValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Extract a long
    pub fn as_long(&self) -> Option<i64> {
        match self {
            JValue::Long(j) => Some(*j),
            _ => None,
        }
    }

    /// Extract a float
    pub fn as_float(&self) -> Option<f32> {
        match self {
            JValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Extract a double
    pub fn as_double(&self) -> Option<f64> {
        match self {
            JValue::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Extract an object reference (null included)
    pub fn as_object(&self) -> Option<ObjectRef> {
        match self {
            JValue::Object(r) => Some(*r),
            _ => None,
        }
    }

    /// Type name for diagnostics
    pub const fn type_name(&self) -> &'static str {
        match self {
            JValue::Bool(_) => "boolean",
            JValue::Byte(_) => "byte",
            JValue::Char(_) => "char",
            JValue::Short(_) => "short",
            JValue::Int(_) => "int",
            JValue::Long(_) => "long",
            JValue::Float(_) => "float",
            JValue::Double(_) => "double",
            JValue::Object(_) => "object",
            JValue::Void => "void",
        }
    }
}

impl From<bool> for JValue {
    fn from(v: bool) -> Self {
        JValue::Bool(v)
    }
}

impl From<i32> for JValue {
    fn from(v: i32) -> Self {
        JValue::Int(v)
    }
}

impl From<i64> for JValue {
    fn from(v: i64) -> Self {
        JValue::Long(v)
    }
}

impl From<f32> for JValue {
    fn from(v: f32) -> Self {
        JValue::Float(v)
    }
}

impl From<f64> for JValue {
    fn from(v: f64) -> Self {
        JValue::Double(v)
    }
}

impl From<ObjectRef> for JValue {
    fn from(v: ObjectRef) -> Self {
        JValue::Object(v)
    }
}
