//! Method frames and thrown exceptions

use std::fmt;

use jbridge_sdk::EnvHandle;

use crate::object::{ObjId, Value};
use crate::runtime::Sandbox;

/// An exception thrown by a method body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Throwable {
    class_name: String,
    message: String,
}

impl Throwable {
    /// Throw an instance of `class_name` (slash separated)
    pub fn new(class_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            class_name: class_name.into(),
            message: message.into(),
        }
    }

    /// `java.lang.RuntimeException`
    pub fn runtime(message: impl Into<String>) -> Self {
        Self::new("java/lang/RuntimeException", message)
    }

    /// `java.lang.IllegalStateException`
    pub fn illegal_state(message: impl Into<String>) -> Self {
        Self::new("java/lang/IllegalStateException", message)
    }

    /// `java.lang.IllegalArgumentException`
    pub fn illegal_argument(message: impl Into<String>) -> Self {
        Self::new("java/lang/IllegalArgumentException", message)
    }

    /// Class of the exception
    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    /// Detail message
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for Throwable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        describe(&self.class_name, &self.message, f)
    }
}

/// `java.lang.Foo: message`, the way a JVM prints an exception
pub(crate) fn describe(class_name: &str, message: &str, f: &mut impl fmt::Write) -> fmt::Result {
    f.write_str(&class_name.replace('/', "."))?;
    if !message.is_empty() {
        write!(f, ": {}", message)?;
    }
    Ok(())
}

/// What a method body sees while it runs.
///
/// The sandbox is not locked while a body runs, so bodies may use the
/// frame freely and may call back into native code.
pub struct Frame<'a> {
    pub(crate) sandbox: &'a Sandbox,
    pub(crate) env: EnvHandle,
    pub(crate) class_id: usize,
    pub(crate) this: Option<ObjId>,
    pub(crate) args: Vec<Value>,
}

impl<'a> Frame<'a> {
    /// Environment of the calling thread
    pub fn env(&self) -> EnvHandle {
        self.env
    }

    /// Receiver; `None` in static methods
    pub fn this(&self) -> Option<ObjId> {
        self.this
    }

    /// All arguments
    pub fn args(&self) -> &[Value] {
        &self.args
    }

    /// Argument at `index`, `Void` past the end
    pub fn arg(&self, index: usize) -> Value {
        self.args.get(index).copied().unwrap_or(Value::Void)
    }

    /// `int` argument at `index`, 0 if it is not one
    pub fn arg_int(&self, index: usize) -> i32 {
        self.arg(index).as_int().unwrap_or(0)
    }

    /// `String` argument at `index`; `None` for null
    pub fn arg_string(&self, index: usize) -> Option<String> {
        self.string(self.arg(index))
    }

    /// The receiver as a string, when it is one
    pub fn this_string(&self) -> Option<String> {
        self.string(self.this.map(Value::Obj).unwrap_or(Value::Null))
    }

    /// Read an instance field of the receiver
    pub fn get_field(&self, name: &str) -> Result<Value, Throwable> {
        let this = self.this.ok_or_else(|| no_such_field(name))?;
        self.sandbox
            .read_instance_field(this, name)
            .ok_or_else(|| no_such_field(name))
    }

    /// Write an instance field of the receiver
    pub fn set_field(&self, name: &str, value: impl Into<Value>) -> Result<(), Throwable> {
        let this = self.this.ok_or_else(|| no_such_field(name))?;
        if self.sandbox.write_instance_field(this, name, value.into()) {
            Ok(())
        } else {
            Err(no_such_field(name))
        }
    }

    /// Read a static field of the method's class
    pub fn get_static(&self, name: &str) -> Result<Value, Throwable> {
        self.sandbox
            .read_static_field(self.class_id, name)
            .ok_or_else(|| no_such_field(name))
    }

    /// Write a static field of the method's class
    pub fn set_static(&self, name: &str, value: impl Into<Value>) -> Result<(), Throwable> {
        if self.sandbox.write_static_field(self.class_id, name, value.into()) {
            Ok(())
        } else {
            Err(no_such_field(name))
        }
    }

    /// Allocate a string
    pub fn new_string(&self, text: &str) -> Value {
        Value::Obj(self.sandbox.alloc_string(text.encode_utf16().collect()))
    }

    /// Contents of a string value; `None` for null or non-strings
    pub fn string(&self, value: Value) -> Option<String> {
        let units = self.sandbox.string_units(value.as_obj()?)?;
        Some(String::from_utf16_lossy(&units))
    }

    /// Instantiate `class_name` through its no-argument constructor
    pub fn new_instance(&self, class_name: &str) -> Result<Value, Throwable> {
        self.sandbox
            .construct_by_name(self.env, class_name)
            .map(Value::Obj)
    }
}

impl fmt::Debug for Frame<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Frame")
            .field("env", &self.env)
            .field("class_id", &self.class_id)
            .field("this", &self.this)
            .field("args", &self.args)
            .finish()
    }
}

fn no_such_field(name: &str) -> Throwable {
    Throwable::new("java/lang/NoSuchFieldError", name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_throwable_display() {
        let t = Throwable::illegal_state("closed");
        assert_eq!(t.class_name(), "java/lang/IllegalStateException");
        assert_eq!(t.to_string(), "java.lang.IllegalStateException: closed");
        assert_eq!(Throwable::runtime("").to_string(), "java.lang.RuntimeException");
    }
}
