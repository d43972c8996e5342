//! Class definitions
//!
//! Classes are declared with a [`ClassBuilder`] and defined into a
//! [`Sandbox`](crate::Sandbox). Method bodies are Rust closures run with a
//! [`Frame`] giving access to the receiver, the arguments and the heap.

use std::fmt;
use std::sync::Arc;

use jbridge_sdk::{JavaType, MethodSignature, RuntimeResult, CONSTRUCTOR_NAME};

use crate::frame::{Frame, Throwable};
use crate::object::{ObjId, Value};
use crate::runtime::Sandbox;

/// Method implementation
pub type Body = Arc<dyn Fn(&Frame<'_>) -> Result<Value, Throwable> + Send + Sync>;

/// Which threads can see a class through direct lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    /// Visible to every thread, like classes of the boot class path
    System,
    /// Visible only to threads the runtime created itself
    Application,
}

#[derive(Clone)]
pub(crate) enum MethodBody {
    Managed(Body),
    /// Entry point bound through `register_natives`, if any
    Native(Option<usize>),
    /// Implicit no-argument constructor
    Empty,
}

#[derive(Clone)]
pub(crate) struct MethodDef {
    pub name: String,
    pub descriptor: String,
    pub signature: MethodSignature,
    pub is_static: bool,
    pub body: MethodBody,
}

#[derive(Debug, Clone)]
pub(crate) struct FieldDef {
    pub name: String,
    pub ty: JavaType,
    pub descriptor: String,
}

/// A defined class
pub(crate) struct Class {
    pub id: usize,
    pub name: String,
    pub visibility: Visibility,
    pub parent: Option<usize>,
    pub object: ObjId,
    /// Instance layout, inherited fields first
    pub instance_fields: Vec<FieldDef>,
    pub static_fields: Vec<FieldDef>,
    pub static_values: Vec<Value>,
    pub methods: Vec<MethodDef>,
}

impl Class {
    pub fn method(&self, name: &str, descriptor: &str, is_static: bool) -> Option<usize> {
        self.methods
            .iter()
            .position(|m| m.name == name && m.descriptor == descriptor && m.is_static == is_static)
    }

    pub fn instance_field(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.instance_fields
            .iter()
            .position(|f| f.name == name && f.descriptor == descriptor)
    }

    pub fn instance_field_by_name(&self, name: &str) -> Option<usize> {
        self.instance_fields.iter().position(|f| f.name == name)
    }

    pub fn static_field(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.static_fields
            .iter()
            .position(|f| f.name == name && f.descriptor == descriptor)
    }
}

impl fmt::Debug for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Class")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("methods", &self.methods.len())
            .finish()
    }
}

// ============================================================================
// ClassBuilder
// ============================================================================

pub(crate) struct PendingMethod {
    pub name: String,
    pub descriptor: String,
    pub is_static: bool,
    pub body: MethodBody,
}

pub(crate) struct PendingField {
    pub name: String,
    pub ty: JavaType,
    pub is_static: bool,
    pub initial: Option<Value>,
}

/// Declares a class to define into a sandbox.
///
/// ```ignore
/// ClassBuilder::new("a/b/Greeter")
///     .method("greet", "()Ljava/lang/String;", |frame| Ok(frame.new_string("hello")))
///     .define(&sandbox)?;
/// ```
pub struct ClassBuilder {
    pub(crate) name: String,
    pub(crate) visibility: Visibility,
    pub(crate) parent: Option<String>,
    pub(crate) fields: Vec<PendingField>,
    pub(crate) methods: Vec<PendingMethod>,
}

impl ClassBuilder {
    /// Start an application class extending `java/lang/Object`
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            visibility: Visibility::Application,
            parent: Some("java/lang/Object".to_string()),
            fields: Vec::new(),
            methods: Vec::new(),
        }
    }

    /// Make the class visible to every thread
    pub fn system(mut self) -> Self {
        self.visibility = Visibility::System;
        self
    }

    /// Set the superclass
    pub fn extends(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub(crate) fn root(mut self) -> Self {
        self.parent = None;
        self
    }

    /// Declare an instance field
    pub fn field(mut self, name: impl Into<String>, ty: JavaType) -> Self {
        self.fields.push(PendingField {
            name: name.into(),
            ty,
            is_static: false,
            initial: None,
        });
        self
    }

    /// Declare a static field with its initial value
    pub fn static_field(mut self, name: impl Into<String>, ty: JavaType, initial: Value) -> Self {
        self.fields.push(PendingField {
            name: name.into(),
            ty,
            is_static: true,
            initial: Some(initial),
        });
        self
    }

    /// Declare a constructor. A class without one gets an implicit
    /// `()V` constructor.
    pub fn constructor<F>(self, descriptor: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Frame<'_>) -> Result<Value, Throwable> + Send + Sync + 'static,
    {
        self.push_method(CONSTRUCTOR_NAME.to_string(), descriptor.into(), false, MethodBody::Managed(Arc::new(body)))
    }

    /// Declare an instance method
    pub fn method<F>(self, name: impl Into<String>, descriptor: impl Into<String>, body: F) -> Self
    where
        F: Fn(&Frame<'_>) -> Result<Value, Throwable> + Send + Sync + 'static,
    {
        self.push_method(name.into(), descriptor.into(), false, MethodBody::Managed(Arc::new(body)))
    }

    /// Declare a static method
    pub fn static_method<F>(
        self,
        name: impl Into<String>,
        descriptor: impl Into<String>,
        body: F,
    ) -> Self
    where
        F: Fn(&Frame<'_>) -> Result<Value, Throwable> + Send + Sync + 'static,
    {
        self.push_method(name.into(), descriptor.into(), true, MethodBody::Managed(Arc::new(body)))
    }

    /// Declare an instance `native` method, bound later through
    /// `register_natives`. Parameters must all be `int`; the result `void`
    /// or `int`.
    pub fn native_method(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.push_method(name.into(), descriptor.into(), false, MethodBody::Native(None))
    }

    /// Static counterpart of [`native_method`](Self::native_method)
    pub fn native_static_method(self, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        self.push_method(name.into(), descriptor.into(), true, MethodBody::Native(None))
    }

    fn push_method(mut self, name: String, descriptor: String, is_static: bool, body: MethodBody) -> Self {
        self.methods.push(PendingMethod {
            name,
            descriptor,
            is_static,
            body,
        });
        self
    }

    /// Define the class into `sandbox`
    pub fn define(self, sandbox: &Sandbox) -> RuntimeResult<()> {
        sandbox.define_class(self)
    }
}

impl fmt::Debug for ClassBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassBuilder")
            .field("name", &self.name)
            .field("visibility", &self.visibility)
            .field("parent", &self.parent)
            .field("fields", &self.fields.len())
            .field("methods", &self.methods.len())
            .finish()
    }
}
