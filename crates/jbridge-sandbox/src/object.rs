//! Heap values and objects

use jbridge_sdk::{JValue, JavaType, ReturnType};

/// Heap object identity (index into the sandbox heap)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjId(pub(crate) usize);

/// A value as managed code sees it: primitives, null, or an object.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    /// No value (`void` methods)
    Void,
    /// `boolean`
    Bool(bool),
    /// `byte`
    Byte(i8),
    /// `char`
    Char(u16),
    /// `short`
    Short(i16),
    /// `int`
    Int(i32),
    /// `long`
    Long(i64),
    /// `float`
    Float(f32),
    /// `double`
    Double(f64),
    /// Null reference
    Null,
    /// Object reference
    Obj(ObjId),
}

impl Value {
    /// Default value of a field of type `ty`
    pub fn zero_of(ty: &JavaType) -> Self {
        match ty {
            JavaType::Boolean => Value::Bool(false),
            JavaType::Byte => Value::Byte(0),
            JavaType::Char => Value::Char(0),
            JavaType::Short => Value::Short(0),
            JavaType::Int => Value::Int(0),
            JavaType::Long => Value::Long(0),
            JavaType::Float => Value::Float(0.0),
            JavaType::Double => Value::Double(0.0),
            JavaType::Object(_) | JavaType::Array(_) => Value::Null,
        }
    }

    /// Default value of a method result
    pub fn zero(ret: &ReturnType) -> Self {
        match ret {
            ReturnType::Void => Value::Void,
            ReturnType::Value(ty) => Self::zero_of(ty),
        }
    }

    /// Int payload
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Long payload
    pub fn as_long(&self) -> Option<i64> {
        match self {
            Value::Long(j) => Some(*j),
            _ => None,
        }
    }

    /// Boolean payload
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Double payload
    pub fn as_double(&self) -> Option<f64> {
        match self {
            Value::Double(d) => Some(*d),
            _ => None,
        }
    }

    /// Object payload
    pub fn as_obj(&self) -> Option<ObjId> {
        match self {
            Value::Obj(id) => Some(*id),
            _ => None,
        }
    }

    /// Whether this is the null reference
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Primitive conversion; references map to `None` and are handled by
    /// the reference table.
    pub(crate) fn from_primitive(value: JValue) -> Option<Self> {
        Some(match value {
            JValue::Bool(b) => Value::Bool(b),
            JValue::Byte(b) => Value::Byte(b),
            JValue::Char(c) => Value::Char(c),
            JValue::Short(s) => Value::Short(s),
            JValue::Int(i) => Value::Int(i),
            JValue::Long(j) => Value::Long(j),
            JValue::Float(f) => Value::Float(f),
            JValue::Double(d) => Value::Double(d),
            JValue::Void => Value::Void,
            JValue::Object(_) => return None,
        })
    }

    /// Primitive conversion back; `None` for objects
    pub(crate) fn to_primitive(self) -> Option<JValue> {
        Some(match self {
            Value::Void => JValue::Void,
            Value::Bool(b) => JValue::Bool(b),
            Value::Byte(b) => JValue::Byte(b),
            Value::Char(c) => JValue::Char(c),
            Value::Short(s) => JValue::Short(s),
            Value::Int(i) => JValue::Int(i),
            Value::Long(j) => JValue::Long(j),
            Value::Float(f) => JValue::Float(f),
            Value::Double(d) => JValue::Double(d),
            Value::Null | Value::Obj(_) => return None,
        })
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

/// Object on the sandbox heap
#[derive(Debug, Clone)]
pub(crate) enum HeapObject {
    /// Instance of a defined class; fields in class layout order
    Instance { class_id: usize, fields: Vec<Value> },
    /// `java.lang.String`
    String(Vec<u16>),
    /// The class object of a defined class
    Class(usize),
    /// A thrown exception
    Throwable { class_name: String, message: String },
}
