//! Typed call arguments
//!
//! A call's parameter list is a tuple of Rust values. Each element knows
//! its managed type (which feeds the method descriptor) and how to lower
//! itself into a [`JValue`]. Strings become managed strings whose local
//! references live in the [`ArgFrame`] until the call returns.

use jbridge_sdk::{JValue, JavaType, ObjectRef};

use crate::env::Env;
use crate::refs::LocalRef;
use crate::BridgeResult;

/// Lowered arguments of one call, plus the locals that back them.
pub struct ArgFrame<'env> {
    values: Vec<JValue>,
    locals: Vec<LocalRef<'env>>,
}

impl<'env> ArgFrame<'env> {
    /// Empty frame with room for `capacity` arguments
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: Vec::with_capacity(capacity),
            locals: Vec::new(),
        }
    }

    /// Append a plain value
    pub fn push(&mut self, value: JValue) {
        self.values.push(value);
    }

    /// Append a reference argument, keeping its local alive for the call
    pub fn push_local(&mut self, local: LocalRef<'env>) {
        self.values.push(JValue::Object(local.raw()));
        self.locals.push(local);
    }

    /// Lowered values in parameter order
    pub fn values(&self) -> &[JValue] {
        &self.values
    }

    /// Number of arguments
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether the frame holds no arguments
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

// ============================================================================
// Arg
// ============================================================================

/// A single call argument.
pub trait Arg {
    /// Declared parameter type
    fn java_type(&self) -> JavaType;

    /// Append the lowered value to `frame`
    fn lower<'env>(&self, env: &'env Env, frame: &mut ArgFrame<'env>) -> BridgeResult<()>;
}

macro_rules! primitive_arg {
    ($($ty:ty => $java:ident, $variant:ident;)*) => {
        $(
            impl Arg for $ty {
                fn java_type(&self) -> JavaType {
                    JavaType::$java
                }

                fn lower<'env>(&self, _env: &'env Env, frame: &mut ArgFrame<'env>) -> BridgeResult<()> {
                    frame.push(JValue::$variant(*self));
                    Ok(())
                }
            }
        )*
    };
}

primitive_arg! {
    bool => Boolean, Bool;
    i8 => Byte, Byte;
    i16 => Short, Short;
    i32 => Int, Int;
    i64 => Long, Long;
    f32 => Float, Float;
    f64 => Double, Double;
}

impl Arg for str {
    fn java_type(&self) -> JavaType {
        JavaType::string()
    }

    fn lower<'env>(&self, env: &'env Env, frame: &mut ArgFrame<'env>) -> BridgeResult<()> {
        frame.push_local(env.to_managed_text(self)?);
        Ok(())
    }
}

impl Arg for String {
    fn java_type(&self) -> JavaType {
        JavaType::string()
    }

    fn lower<'env>(&self, env: &'env Env, frame: &mut ArgFrame<'env>) -> BridgeResult<()> {
        self.as_str().lower(env, frame)
    }
}

impl<T: Arg + ?Sized> Arg for &T {
    fn java_type(&self) -> JavaType {
        (**self).java_type()
    }

    fn lower<'env>(&self, env: &'env Env, frame: &mut ArgFrame<'env>) -> BridgeResult<()> {
        (**self).lower(env, frame)
    }
}

/// A reference argument of a declared class, passed through unchanged.
#[derive(Debug, Clone, Copy)]
pub struct ObjectArg<'a> {
    class: &'a str,
    raw: ObjectRef,
}

impl<'a> ObjectArg<'a> {
    /// Pass `raw` where a `class` is declared. `raw` may be null.
    pub fn new(class: &'a str, raw: ObjectRef) -> Self {
        Self { class, raw }
    }
}

impl Arg for ObjectArg<'_> {
    fn java_type(&self) -> JavaType {
        JavaType::object(self.class)
    }

    fn lower<'env>(&self, _env: &'env Env, frame: &mut ArgFrame<'env>) -> BridgeResult<()> {
        frame.push(JValue::Object(self.raw));
        Ok(())
    }
}

// ============================================================================
// CallArgs
// ============================================================================

/// A whole parameter list: `()` or a tuple of [`Arg`]s.
pub trait CallArgs {
    /// Declared parameter types, in order
    fn param_types(&self) -> Vec<JavaType>;

    /// Lower every argument
    fn lower<'env>(&self, env: &'env Env) -> BridgeResult<ArgFrame<'env>>;
}

impl CallArgs for () {
    fn param_types(&self) -> Vec<JavaType> {
        Vec::new()
    }

    fn lower<'env>(&self, _env: &'env Env) -> BridgeResult<ArgFrame<'env>> {
        Ok(ArgFrame::with_capacity(0))
    }
}

macro_rules! tuple_args {
    ($len:expr; $($name:ident : $idx:tt),+) => {
        impl<$($name: Arg),+> CallArgs for ($($name,)+) {
            fn param_types(&self) -> Vec<JavaType> {
                vec![$(self.$idx.java_type()),+]
            }

            fn lower<'env>(&self, env: &'env Env) -> BridgeResult<ArgFrame<'env>> {
                let mut frame = ArgFrame::with_capacity($len);
                $(self.$idx.lower(env, &mut frame)?;)+
                Ok(frame)
            }
        }
    };
}

tuple_args!(1; A: 0);
tuple_args!(2; A: 0, B: 1);
tuple_args!(3; A: 0, B: 1, C: 2);
tuple_args!(4; A: 0, B: 1, C: 2, D: 3);
tuple_args!(5; A: 0, B: 1, C: 2, D: 3, E: 4);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::{Bridge, BridgeOptions};
    use jbridge_sandbox::Sandbox;
    use jbridge_sdk::{method_descriptor, ReturnType};
    use std::sync::Arc;

    #[test]
    fn test_param_types() {
        assert!(().param_types().is_empty());
        assert_eq!((1i32,).param_types(), vec![JavaType::Int]);
        assert_eq!(
            (true, 2i64, "x", 1.5f32, 2.5f64).param_types(),
            vec![
                JavaType::Boolean,
                JavaType::Long,
                JavaType::string(),
                JavaType::Float,
                JavaType::Double
            ]
        );
    }

    #[test]
    fn test_descriptor_from_args() {
        let args = ("a", "b", "c", "d", "e");
        assert_eq!(
            method_descriptor(&args.param_types(), &ReturnType::Void),
            "(Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;Ljava/lang/String;)V"
        );

        let owned = String::from("x");
        let args = (7i32, &owned, ObjectArg::new("a/b/Node", ObjectRef::NULL));
        assert_eq!(
            method_descriptor(&args.param_types(), &ReturnType::Value(JavaType::Int)),
            "(ILjava/lang/String;La/b/Node;)I"
        );
    }

    #[test]
    fn test_lower_keeps_string_locals() {
        let sandbox = Arc::new(Sandbox::new());
        let bridge = Bridge::with_runtime(sandbox.clone(), BridgeOptions::default());
        let env = Env::current(&bridge).unwrap();
        let before = sandbox.local_ref_count(env.raw());

        {
            let frame = (5i32, "five").lower(&env).unwrap();
            assert_eq!(frame.len(), 2);
            assert_eq!(frame.values()[0], JValue::Int(5));
            let string = frame.values()[1].as_object().unwrap();
            assert_eq!(env.from_managed_text(string), "five");
            assert_eq!(sandbox.local_ref_count(env.raw()), before + 1);
        }
        assert_eq!(sandbox.local_ref_count(env.raw()), before);
    }
}
