//! The sandbox runtime
//!
//! One coarse lock guards the heap, the class table, the reference table
//! and per-thread state. The lock is never held while a method body or a
//! native entry point runs, so both may re-enter the runtime.

use std::ffi::c_void;
use std::fmt;
use std::thread::{self, ThreadId};

use jbridge_sdk::{
    AttachOptions, EnvHandle, JValue, JavaType, ManagedRuntime, MemberId, MethodSignature,
    NativeMethod, ObjectRef, Receiver, ReturnType, RuntimeError, RuntimeResult, CONSTRUCTOR_NAME,
};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, trace, warn};

use crate::class::{
    Class, ClassBuilder, FieldDef, MethodBody, MethodDef, PendingField, Visibility,
};
use crate::frame::{describe, Frame, Throwable};
use crate::native;
use crate::object::{HeapObject, ObjId, Value};

const OBJECT_CLASS: &str = "java/lang/Object";
const CLASS_CLASS: &str = "java/lang/Class";
const STRING_CLASS: &str = "java/lang/String";
const THROWABLE_CLASS: &str = "java/lang/Throwable";

// ============================================================================
// Member ids
// ============================================================================

const MEMBER_INDEX_BITS: u32 = 16;
const MEMBER_INDEX_MASK: usize = (1 << MEMBER_INDEX_BITS) - 1;

fn encode_member(class_id: usize, index: usize) -> MemberId {
    MemberId::from_raw(((class_id + 1) << MEMBER_INDEX_BITS) | index)
}

fn decode_member(id: MemberId) -> Option<(usize, usize)> {
    let raw = id.as_raw();
    let class = (raw >> MEMBER_INDEX_BITS).checked_sub(1)?;
    Some((class, raw & MEMBER_INDEX_MASK))
}

// ============================================================================
// State
// ============================================================================

/// What the sandbox knows about an attached thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadInfo {
    /// Name given on attachment
    pub name: Option<String>,
    /// Attached as a daemon thread
    pub daemon: bool,
    /// Created by the runtime itself rather than attached from native code
    pub runtime_created: bool,
}

#[derive(Debug)]
struct ThreadState {
    thread: ThreadId,
    info: ThreadInfo,
    pending: Option<ObjId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RefKind {
    Local(usize),
    Global,
}

#[derive(Debug, Clone, Copy)]
struct RefEntry {
    obj: ObjId,
    kind: RefKind,
}

#[derive(Default)]
struct State {
    heap: Vec<HeapObject>,
    classes: Vec<Class>,
    class_names: FxHashMap<String, usize>,
    refs: FxHashMap<usize, RefEntry>,
    next_ref: usize,
    envs: FxHashMap<usize, ThreadState>,
    threads: FxHashMap<ThreadId, usize>,
    next_env: usize,
}

impl State {
    fn alloc(&mut self, object: HeapObject) -> ObjId {
        self.heap.push(object);
        ObjId(self.heap.len() - 1)
    }

    fn new_ref(&mut self, obj: ObjId, kind: RefKind) -> ObjectRef {
        self.next_ref += 1;
        self.refs.insert(self.next_ref, RefEntry { obj, kind });
        ObjectRef::from_raw(self.next_ref)
    }

    fn new_local(&mut self, env: EnvHandle, obj: ObjId) -> ObjectRef {
        self.new_ref(obj, RefKind::Local(env.as_raw()))
    }

    fn resolve(&self, reference: ObjectRef) -> Option<ObjId> {
        if reference.is_null() {
            return None;
        }
        let entry = self.refs.get(&reference.as_raw());
        if entry.is_none() {
            warn!(reference = ?reference, "stale or foreign reference treated as null");
        }
        entry.map(|e| e.obj)
    }

    fn resolve_class(&self, reference: ObjectRef) -> Option<usize> {
        match self.heap.get(self.resolve(reference)?.0)? {
            HeapObject::Class(id) => Some(*id),
            _ => None,
        }
    }

    fn class_named(&self, name: &str) -> Option<usize> {
        self.class_names.get(name).copied()
    }

    fn class_of(&self, obj: ObjId) -> Option<usize> {
        match self.heap.get(obj.0)? {
            HeapObject::Instance { class_id, .. } => Some(*class_id),
            HeapObject::String(_) => self.class_named(STRING_CLASS),
            HeapObject::Class(_) => self.class_named(CLASS_CLASS),
            HeapObject::Throwable { class_name, .. } => self
                .class_named(class_name)
                .or_else(|| self.class_named(THROWABLE_CLASS)),
        }
    }

    fn throw(&mut self, env: EnvHandle, throwable: Throwable) {
        let obj = self.alloc(HeapObject::Throwable {
            class_name: throwable.class_name().to_string(),
            message: throwable.message().to_string(),
        });
        match self.envs.get_mut(&env.as_raw()) {
            Some(state) => state.pending = Some(obj),
            None => warn!(env = ?env, exception = %throwable, "exception thrown on an unknown environment"),
        }
    }

    fn to_value(&self, value: JValue) -> Value {
        match value {
            JValue::Object(reference) => self.resolve(reference).map(Value::Obj).unwrap_or(Value::Null),
            other => Value::from_primitive(other).unwrap_or(Value::Void),
        }
    }

    fn to_jvalue(&mut self, env: EnvHandle, value: Value) -> JValue {
        match value {
            Value::Obj(obj) => JValue::Object(self.new_local(env, obj)),
            Value::Null => JValue::Object(ObjectRef::NULL),
            other => other.to_primitive().unwrap_or(JValue::Void),
        }
    }

    /// Find a method on `class_id` or its superclasses
    fn find_method(&self, class_id: usize, name: &str, descriptor: &str, is_static: bool) -> Option<(usize, usize)> {
        if name == CONSTRUCTOR_NAME {
            let class = self.classes.get(class_id)?;
            return class.method(name, descriptor, false).map(|i| (class_id, i));
        }
        let mut current = Some(class_id);
        while let Some(id) = current {
            let class = self.classes.get(id)?;
            if let Some(index) = class.method(name, descriptor, is_static) {
                return Some((id, index));
            }
            current = class.parent;
        }
        None
    }

    fn find_static_field(&self, class_id: usize, name: &str, descriptor: Option<&str>) -> Option<(usize, usize)> {
        let mut current = Some(class_id);
        while let Some(id) = current {
            let class = self.classes.get(id)?;
            let index = match descriptor {
                Some(descriptor) => class.static_field(name, descriptor),
                None => class.static_fields.iter().position(|f| f.name == name),
            };
            if let Some(index) = index {
                return Some((id, index));
            }
            current = class.parent;
        }
        None
    }

    fn method_def(&self, id: MemberId) -> Option<(usize, MethodDef)> {
        let (class_id, index) = decode_member(id)?;
        let def = self.classes.get(class_id)?.methods.get(index)?.clone();
        Some((class_id, def))
    }

    fn is_runtime_thread(&self, env: EnvHandle) -> bool {
        self.envs
            .get(&env.as_raw())
            .map(|s| s.info.runtime_created)
            .unwrap_or(false)
    }
}

// ============================================================================
// Sandbox
// ============================================================================

/// An in-process managed runtime.
///
/// Behaves like a JVM where it matters to the bridge: direct class lookup
/// from natively attached threads sees only system classes, failed lookups
/// leave an exception pending, references are counted per kind and threads
/// must attach before use.
pub struct Sandbox {
    state: Mutex<State>,
}

impl Sandbox {
    /// Create a sandbox with the core `java/lang` classes defined
    pub fn new() -> Self {
        let sandbox = Self {
            state: Mutex::new(State::default()),
        };
        sandbox
            .define_core_classes()
            .expect("core classes are well formed");
        sandbox
    }

    fn define_core_classes(&self) -> RuntimeResult<()> {
        ClassBuilder::new(OBJECT_CLASS).system().root().define(self)?;
        ClassBuilder::new(CLASS_CLASS).system().define(self)?;
        ClassBuilder::new(STRING_CLASS)
            .system()
            .method("length", "()I", |frame| {
                let text = frame.this_string().unwrap_or_default();
                Ok(Value::Int(text.encode_utf16().count() as i32))
            })
            .method("isEmpty", "()Z", |frame| {
                Ok(Value::Bool(frame.this_string().unwrap_or_default().is_empty()))
            })
            .method("concat", "(Ljava/lang/String;)Ljava/lang/String;", |frame| {
                let tail = frame
                    .arg_string(0)
                    .ok_or_else(|| Throwable::new("java/lang/NullPointerException", ""))?;
                let head = frame.this_string().unwrap_or_default();
                Ok(frame.new_string(&(head + &tail)))
            })
            .static_method("valueOf", "(I)Ljava/lang/String;", |frame| {
                Ok(frame.new_string(&frame.arg_int(0).to_string()))
            })
            .define(self)?;

        let hierarchy = [
            (THROWABLE_CLASS, OBJECT_CLASS),
            ("java/lang/Exception", THROWABLE_CLASS),
            ("java/lang/RuntimeException", "java/lang/Exception"),
            ("java/lang/IllegalStateException", "java/lang/RuntimeException"),
            ("java/lang/IllegalArgumentException", "java/lang/RuntimeException"),
            ("java/lang/NullPointerException", "java/lang/RuntimeException"),
            ("java/lang/ArithmeticException", "java/lang/RuntimeException"),
            ("java/lang/ClassNotFoundException", "java/lang/Exception"),
            ("java/lang/Error", THROWABLE_CLASS),
            ("java/lang/LinkageError", "java/lang/Error"),
            ("java/lang/NoClassDefFoundError", "java/lang/LinkageError"),
            ("java/lang/UnsatisfiedLinkError", "java/lang/LinkageError"),
            ("java/lang/IncompatibleClassChangeError", "java/lang/LinkageError"),
            ("java/lang/NoSuchMethodError", "java/lang/IncompatibleClassChangeError"),
            ("java/lang/NoSuchFieldError", "java/lang/IncompatibleClassChangeError"),
        ];
        for (name, parent) in hierarchy {
            ClassBuilder::new(name).system().extends(parent).define(self)?;
        }
        Ok(())
    }

    pub(crate) fn define_class(&self, builder: ClassBuilder) -> RuntimeResult<()> {
        let mut state = self.state.lock();
        if state.class_names.contains_key(&builder.name) {
            return Err(RuntimeError::Backend(format!("class {} already defined", builder.name)));
        }

        let parent = match &builder.parent {
            Some(parent) => Some(state.class_named(parent).ok_or_else(|| {
                RuntimeError::Backend(format!("superclass {} of {} is not defined", parent, builder.name))
            })?),
            None => None,
        };

        let mut instance_fields = parent
            .map(|p| state.classes[p].instance_fields.clone())
            .unwrap_or_default();
        let mut static_fields = Vec::new();
        let mut static_values = Vec::new();
        for PendingField { name, ty, is_static, initial } in builder.fields {
            let def = FieldDef {
                name,
                descriptor: ty.descriptor(),
                ty,
            };
            if is_static {
                static_values.push(initial.unwrap_or_else(|| Value::zero_of(&def.ty)));
                static_fields.push(def);
            } else {
                instance_fields.push(def);
            }
        }

        let mut methods = Vec::with_capacity(builder.methods.len() + 1);
        for pending in builder.methods {
            let signature = MethodSignature::parse(&pending.descriptor)?;
            if matches!(pending.body, MethodBody::Native(_)) && !native::supported(&signature) {
                return Err(RuntimeError::InvalidDescriptor {
                    descriptor: pending.descriptor,
                    reason: "sandbox natives take int parameters and return void or int".to_string(),
                });
            }
            methods.push(MethodDef {
                name: pending.name,
                descriptor: pending.descriptor,
                signature,
                is_static: pending.is_static,
                body: pending.body,
            });
        }
        if !methods.iter().any(|m| m.name == CONSTRUCTOR_NAME) {
            methods.push(MethodDef {
                name: CONSTRUCTOR_NAME.to_string(),
                descriptor: "()V".to_string(),
                signature: MethodSignature::new(Vec::new(), ReturnType::Void),
                is_static: false,
                body: MethodBody::Empty,
            });
        }

        let id = state.classes.len();
        let object = state.alloc(HeapObject::Class(id));
        trace!(class = builder.name.as_str(), id, "defined class");
        state.class_names.insert(builder.name.clone(), id);
        state.classes.push(Class {
            id,
            name: builder.name,
            visibility: builder.visibility,
            parent,
            object,
            instance_fields,
            static_fields,
            static_values,
            methods,
        });
        Ok(())
    }

    fn attach(&self, options: &AttachOptions, runtime_created: bool) -> EnvHandle {
        let thread = thread::current().id();
        let mut state = self.state.lock();
        if let Some(&env) = state.threads.get(&thread) {
            if runtime_created {
                if let Some(s) = state.envs.get_mut(&env) {
                    s.info.runtime_created = true;
                }
            }
            return EnvHandle::from_raw(env);
        }

        state.next_env += 1;
        let env = state.next_env;
        state.envs.insert(
            env,
            ThreadState {
                thread,
                info: ThreadInfo {
                    name: options.thread_name.clone(),
                    daemon: options.daemon,
                    runtime_created,
                },
                pending: None,
            },
        );
        state.threads.insert(thread, env);
        trace!(env, ?thread, runtime_created, "thread attached");
        EnvHandle::from_raw(env)
    }

    /// Attach the calling thread as if the runtime had started it, so direct
    /// lookups see application classes. Such threads are never detached by
    /// the bridge.
    pub fn attach_managed_thread(&self) -> EnvHandle {
        self.attach(&AttachOptions::default(), true)
    }

    /// Attachment details of `env`
    pub fn thread_info(&self, env: EnvHandle) -> Option<ThreadInfo> {
        self.state.lock().envs.get(&env.as_raw()).map(|s| s.info.clone())
    }

    /// Number of attached threads
    pub fn attached_thread_count(&self) -> usize {
        self.state.lock().envs.len()
    }

    /// Live local references of `env`
    pub fn local_ref_count(&self, env: EnvHandle) -> usize {
        let env = env.as_raw();
        self.state
            .lock()
            .refs
            .values()
            .filter(|e| e.kind == RefKind::Local(env))
            .count()
    }

    /// Live global references
    pub fn global_ref_count(&self) -> usize {
        self.state
            .lock()
            .refs
            .values()
            .filter(|e| e.kind == RefKind::Global)
            .count()
    }

    /// Whether `name` is defined
    pub fn has_class(&self, name: &str) -> bool {
        self.state.lock().class_names.contains_key(name)
    }

    /// Whether the native method `name` + `descriptor` of `class` is bound
    pub fn is_native_bound(&self, class: &str, name: &str, descriptor: &str) -> bool {
        let state = self.state.lock();
        let Some(class) = state.class_named(class).map(|id| &state.classes[id]) else {
            return false;
        };
        class
            .methods
            .iter()
            .any(|m| m.name == name && m.descriptor == descriptor && matches!(m.body, MethodBody::Native(Some(_))))
    }

    /// Make `throwable` the pending exception of `env`
    pub fn raise(&self, env: EnvHandle, throwable: Throwable) {
        self.state.lock().throw(env, throwable);
    }

    // ------------------------------------------------------------------------
    // Frame support
    // ------------------------------------------------------------------------

    pub(crate) fn alloc_string(&self, units: Vec<u16>) -> ObjId {
        self.state.lock().alloc(HeapObject::String(units))
    }

    pub(crate) fn string_units(&self, obj: ObjId) -> Option<Vec<u16>> {
        match self.state.lock().heap.get(obj.0)? {
            HeapObject::String(units) => Some(units.clone()),
            _ => None,
        }
    }

    pub(crate) fn read_instance_field(&self, obj: ObjId, name: &str) -> Option<Value> {
        let state = self.state.lock();
        let class_id = state.class_of(obj)?;
        let index = state.classes.get(class_id)?.instance_field_by_name(name)?;
        match state.heap.get(obj.0)? {
            HeapObject::Instance { fields, .. } => fields.get(index).copied(),
            _ => None,
        }
    }

    pub(crate) fn write_instance_field(&self, obj: ObjId, name: &str, value: Value) -> bool {
        let mut state = self.state.lock();
        let Some(index) = state
            .class_of(obj)
            .and_then(|id| state.classes.get(id))
            .and_then(|class| class.instance_field_by_name(name))
        else {
            return false;
        };
        match state.heap.get_mut(obj.0) {
            Some(HeapObject::Instance { fields, .. }) if index < fields.len() => {
                fields[index] = value;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn read_static_field(&self, class_id: usize, name: &str) -> Option<Value> {
        let state = self.state.lock();
        let (owner, index) = state.find_static_field(class_id, name, None)?;
        state.classes[owner].static_values.get(index).copied()
    }

    pub(crate) fn write_static_field(&self, class_id: usize, name: &str, value: Value) -> bool {
        let mut state = self.state.lock();
        match state.find_static_field(class_id, name, None) {
            Some((owner, index)) => {
                state.classes[owner].static_values[index] = value;
                true
            }
            None => false,
        }
    }

    pub(crate) fn construct_by_name(&self, env: EnvHandle, class_name: &str) -> Result<ObjId, Throwable> {
        let (class_id, def) = {
            let state = self.state.lock();
            let class_id = state
                .class_named(class_name)
                .ok_or_else(|| Throwable::new("java/lang/NoClassDefFoundError", class_name))?;
            let (_, index) = state
                .find_method(class_id, CONSTRUCTOR_NAME, "()V", false)
                .ok_or_else(|| Throwable::new("java/lang/NoSuchMethodError", "<init>()V"))?;
            (class_id, state.classes[class_id].methods[index].clone())
        };
        self.construct(env, class_id, &def, Vec::new())
    }

    // ------------------------------------------------------------------------
    // Execution
    // ------------------------------------------------------------------------

    fn construct(&self, env: EnvHandle, class_id: usize, ctor: &MethodDef, args: Vec<Value>) -> Result<ObjId, Throwable> {
        let obj = {
            let mut state = self.state.lock();
            let fields = state.classes[class_id]
                .instance_fields
                .iter()
                .map(|f| Value::zero_of(&f.ty))
                .collect();
            state.alloc(HeapObject::Instance { class_id, fields })
        };
        self.run(env, class_id, ctor, Some(obj), args)?;
        Ok(obj)
    }

    /// Run a method body with the lock released
    fn run(
        &self,
        env: EnvHandle,
        class_id: usize,
        def: &MethodDef,
        this: Option<ObjId>,
        args: Vec<Value>,
    ) -> Result<Value, Throwable> {
        match &def.body {
            MethodBody::Empty => Ok(Value::Void),
            MethodBody::Managed(body) => body(&Frame {
                sandbox: self,
                env,
                class_id,
                this,
                args,
            }),
            MethodBody::Native(None) => Err(Throwable::new(
                "java/lang/UnsatisfiedLinkError",
                format!("{}{}", def.name, def.descriptor),
            )),
            MethodBody::Native(Some(entry)) => {
                let receiver = {
                    let mut state = self.state.lock();
                    let target = this.unwrap_or(state.classes[class_id].object);
                    state.new_local(env, target)
                };
                let ints: Vec<i32> = args.iter().map(|v| v.as_int().unwrap_or(0)).collect();
                let returns_int = def.signature.ret != ReturnType::Void;
                // SAFETY: registration only binds declared natives whose
                // signatures `native::supported` accepts.
                let result = unsafe {
                    native::invoke(
                        *entry,
                        env.as_ptr::<c_void>(),
                        receiver.as_ptr::<c_void>(),
                        &ints,
                        returns_int,
                    )
                };
                self.delete_local_ref(env, receiver);
                Ok(if returns_int { Value::Int(result) } else { Value::Void })
            }
        }
    }
}

impl Default for Sandbox {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Sandbox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Sandbox")
            .field("classes", &state.classes.len())
            .field("objects", &state.heap.len())
            .field("refs", &state.refs.len())
            .field("threads", &state.envs.len())
            .finish()
    }
}

// ============================================================================
// ManagedRuntime
// ============================================================================

impl ManagedRuntime for Sandbox {
    fn name(&self) -> &str {
        "sandbox"
    }

    fn current_env(&self) -> Option<EnvHandle> {
        let thread = thread::current().id();
        self.state.lock().threads.get(&thread).map(|&env| EnvHandle::from_raw(env))
    }

    fn attach_current_thread(&self, options: &AttachOptions) -> RuntimeResult<EnvHandle> {
        Ok(self.attach(options, false))
    }

    fn detach_current_thread(&self, env: EnvHandle) -> RuntimeResult<()> {
        let id = env.as_raw();
        let mut state = self.state.lock();
        let removed = state
            .envs
            .remove(&id)
            .ok_or_else(|| RuntimeError::DetachFailed(format!("unknown environment {:?}", env)))?;
        state.threads.remove(&removed.thread);
        // Detaching frees every local reference of the thread.
        state.refs.retain(|_, e| e.kind != RefKind::Local(id));
        trace!(env = id, "thread detached");
        Ok(())
    }

    fn find_class(&self, env: EnvHandle, name: &str) -> ObjectRef {
        let mut state = self.state.lock();
        let visible = state.class_named(name).filter(|&id| {
            state.classes[id].visibility == Visibility::System || state.is_runtime_thread(env)
        });
        match visible {
            Some(id) => {
                let object = state.classes[id].object;
                state.new_local(env, object)
            }
            None => {
                state.throw(env, Throwable::new("java/lang/NoClassDefFoundError", name));
                ObjectRef::NULL
            }
        }
    }

    fn load_class(&self, env: EnvHandle, name: &str) -> ObjectRef {
        let name = name.replace('.', "/");
        let mut state = self.state.lock();
        match state.class_named(&name) {
            Some(id) => {
                let object = state.classes[id].object;
                state.new_local(env, object)
            }
            None => {
                state.throw(env, Throwable::new("java/lang/ClassNotFoundException", name));
                ObjectRef::NULL
            }
        }
    }

    fn object_class(&self, env: EnvHandle, obj: ObjectRef) -> ObjectRef {
        let mut state = self.state.lock();
        let class = state
            .resolve(obj)
            .and_then(|o| state.class_of(o))
            .map(|id| state.classes[id].object);
        match class {
            Some(object) => state.new_local(env, object),
            None => ObjectRef::NULL,
        }
    }

    fn new_global_ref(&self, _env: EnvHandle, obj: ObjectRef) -> ObjectRef {
        let mut state = self.state.lock();
        match state.resolve(obj) {
            Some(o) => state.new_ref(o, RefKind::Global),
            None => ObjectRef::NULL,
        }
    }

    fn delete_global_ref(&self, _env: EnvHandle, obj: ObjectRef) {
        if obj.is_null() {
            return;
        }
        let mut state = self.state.lock();
        match state.refs.get(&obj.as_raw()) {
            Some(entry) if entry.kind == RefKind::Global => {
                state.refs.remove(&obj.as_raw());
            }
            _ => warn!(reference = ?obj, "delete_global_ref on a non-global reference"),
        }
    }

    fn new_local_ref(&self, env: EnvHandle, obj: ObjectRef) -> ObjectRef {
        let mut state = self.state.lock();
        match state.resolve(obj) {
            Some(o) => state.new_local(env, o),
            None => ObjectRef::NULL,
        }
    }

    fn delete_local_ref(&self, env: EnvHandle, obj: ObjectRef) {
        if obj.is_null() {
            return;
        }
        let mut state = self.state.lock();
        match state.refs.get(&obj.as_raw()) {
            Some(entry) if entry.kind == RefKind::Local(env.as_raw()) => {
                state.refs.remove(&obj.as_raw());
            }
            _ => warn!(reference = ?obj, env = ?env, "delete_local_ref on a reference this environment does not own"),
        }
    }

    fn method_id(
        &self,
        env: EnvHandle,
        class: ObjectRef,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Option<MemberId> {
        let mut state = self.state.lock();
        let found = state
            .resolve_class(class)
            .and_then(|id| state.find_method(id, name, descriptor, is_static));
        match found {
            Some((class_id, index)) => Some(encode_member(class_id, index)),
            None => {
                state.throw(
                    env,
                    Throwable::new("java/lang/NoSuchMethodError", format!("{}{}", name, descriptor)),
                );
                None
            }
        }
    }

    fn field_id(
        &self,
        env: EnvHandle,
        class: ObjectRef,
        name: &str,
        descriptor: &str,
        is_static: bool,
    ) -> Option<MemberId> {
        let mut state = self.state.lock();
        let found = state.resolve_class(class).and_then(|id| {
            if is_static {
                state.find_static_field(id, name, Some(descriptor))
            } else {
                state.classes[id].instance_field(name, descriptor).map(|i| (id, i))
            }
        });
        match found {
            Some((class_id, index)) => Some(encode_member(class_id, index)),
            None => {
                state.throw(env, Throwable::new("java/lang/NoSuchFieldError", name));
                None
            }
        }
    }

    fn new_object(&self, env: EnvHandle, class: ObjectRef, ctor: MemberId, args: &[JValue]) -> ObjectRef {
        let prepared = {
            let state = self.state.lock();
            state.resolve_class(class).zip(state.method_def(ctor)).map(|(class_id, (_, def))| {
                let args: Vec<Value> = args.iter().map(|a| state.to_value(*a)).collect();
                (class_id, def, args)
            })
        };
        let Some((class_id, def, args)) = prepared else {
            self.raise(env, Throwable::new("java/lang/InstantiationError", "invalid class or constructor"));
            return ObjectRef::NULL;
        };

        match self.construct(env, class_id, &def, args) {
            Ok(obj) => self.state.lock().new_local(env, obj),
            Err(thrown) => {
                debug!(exception = %thrown, "constructor threw");
                self.raise(env, thrown);
                ObjectRef::NULL
            }
        }
    }

    fn call_method(
        &self,
        env: EnvHandle,
        receiver: Receiver,
        method: MemberId,
        ret: &ReturnType,
        args: &[JValue],
    ) -> JValue {
        let prepared = {
            let state = self.state.lock();
            state.method_def(method).map(|(class_id, def)| {
                let args: Vec<Value> = args.iter().map(|a| state.to_value(*a)).collect();
                let this = match receiver {
                    Receiver::Instance(r) => state.resolve(r),
                    Receiver::Static(_) => None,
                };
                // Virtual dispatch: prefer an override on the receiver's class.
                let dispatched = this
                    .and_then(|o| state.class_of(o))
                    .and_then(|actual| state.find_method(actual, &def.name, &def.descriptor, false))
                    .and_then(|(id, index)| Some((id, state.classes.get(id)?.methods.get(index)?.clone())));
                let (class_id, def) = dispatched.unwrap_or((class_id, def));
                (class_id, def, this, args)
            })
        };
        let Some((class_id, def, this, args)) = prepared else {
            self.raise(env, Throwable::new("java/lang/NoSuchMethodError", "invalid method id"));
            return JValue::zero(ret);
        };
        if !receiver.is_static() && this.is_none() {
            self.raise(env, Throwable::new("java/lang/NullPointerException", def.name.clone()));
            return JValue::zero(ret);
        }

        match self.run(env, class_id, &def, this, args) {
            Ok(value) => self.state.lock().to_jvalue(env, value),
            Err(thrown) => {
                trace!(method = def.name.as_str(), exception = %thrown, "method threw");
                self.raise(env, thrown);
                JValue::zero(ret)
            }
        }
    }

    fn get_field(&self, env: EnvHandle, receiver: Receiver, field: MemberId, ty: &JavaType) -> JValue {
        let mut state = self.state.lock();
        let value = decode_member(field).and_then(|(class_id, index)| match receiver {
            Receiver::Instance(r) => match state.heap.get(state.resolve(r)?.0)? {
                HeapObject::Instance { fields, .. } => fields.get(index).copied(),
                _ => None,
            },
            Receiver::Static(_) => state.classes.get(class_id)?.static_values.get(index).copied(),
        });
        match value {
            Some(value) => state.to_jvalue(env, value),
            None => JValue::zero_of(ty),
        }
    }

    fn set_field(&self, _env: EnvHandle, receiver: Receiver, field: MemberId, _ty: &JavaType, value: JValue) {
        let mut state = self.state.lock();
        let value = state.to_value(value);
        let Some((class_id, index)) = decode_member(field) else {
            return;
        };
        let slot = match receiver {
            Receiver::Instance(r) => match state.resolve(r) {
                Some(obj) => match state.heap.get_mut(obj.0) {
                    Some(HeapObject::Instance { fields, .. }) => fields.get_mut(index),
                    _ => None,
                },
                None => None,
            },
            Receiver::Static(_) => state
                .classes
                .get_mut(class_id)
                .and_then(|c| c.static_values.get_mut(index)),
        };
        if let Some(slot) = slot {
            *slot = value;
        }
    }

    fn new_string(&self, env: EnvHandle, utf16: &[u16]) -> ObjectRef {
        let mut state = self.state.lock();
        let obj = state.alloc(HeapObject::String(utf16.to_vec()));
        state.new_local(env, obj)
    }

    fn string_utf16(&self, _env: EnvHandle, string: ObjectRef) -> Vec<u16> {
        let state = self.state.lock();
        match state.resolve(string).and_then(|o| state.heap.get(o.0)) {
            Some(HeapObject::String(units)) => units.clone(),
            _ => Vec::new(),
        }
    }

    fn exception_check(&self, env: EnvHandle) -> bool {
        self.state
            .lock()
            .envs
            .get(&env.as_raw())
            .map(|s| s.pending.is_some())
            .unwrap_or(false)
    }

    fn exception_description(&self, env: EnvHandle) -> Option<String> {
        let state = self.state.lock();
        let pending = state.envs.get(&env.as_raw())?.pending?;
        match state.heap.get(pending.0)? {
            HeapObject::Throwable { class_name, message } => {
                let mut out = String::new();
                describe(class_name, message, &mut out).ok()?;
                Some(out)
            }
            _ => None,
        }
    }

    fn exception_clear(&self, env: EnvHandle) {
        if let Some(state) = self.state.lock().envs.get_mut(&env.as_raw()) {
            state.pending = None;
        }
    }

    fn register_natives(&self, env: EnvHandle, class: ObjectRef, methods: &[NativeMethod]) -> RuntimeResult<()> {
        let mut state = self.state.lock();
        let Some(class_id) = state.resolve_class(class) else {
            return Err(RuntimeError::RegistrationFailed("not a class reference".to_string()));
        };

        let mut bindings = Vec::with_capacity(methods.len());
        for method in methods {
            let name = method.name().to_string_lossy();
            let descriptor = method.signature().to_string_lossy();
            let index = state.classes[class_id].methods.iter().position(|m| {
                m.name == name && m.descriptor == descriptor && matches!(m.body, MethodBody::Native(_))
            });
            match index {
                Some(index) if !method.fn_ptr().is_null() => bindings.push((index, method.fn_ptr() as usize)),
                _ => {
                    let member = format!("{}{}", name, descriptor);
                    state.throw(env, Throwable::new("java/lang/NoSuchMethodError", member.clone()));
                    return Err(RuntimeError::RegistrationFailed(format!(
                        "no native method {} on {}",
                        member, state.classes[class_id].name
                    )));
                }
            }
        }

        let class = &mut state.classes[class_id];
        for (index, entry) in bindings {
            class.methods[index].body = MethodBody::Native(Some(entry));
        }
        debug!(class = class.name.as_str(), count = methods.len(), "natives bound");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attached() -> (Sandbox, EnvHandle) {
        let sandbox = Sandbox::new();
        let env = sandbox.attach_current_thread(&AttachOptions::default()).unwrap();
        (sandbox, env)
    }

    #[test]
    fn test_member_id_encoding() {
        let id = encode_member(3, 7);
        assert_eq!(decode_member(id), Some((3, 7)));
        assert_eq!(decode_member(MemberId::from_raw(5)), None);
    }

    #[test]
    fn test_attach_is_idempotent() {
        let (sandbox, env) = attached();
        let again = sandbox.attach_current_thread(&AttachOptions::default()).unwrap();
        assert_eq!(env, again);
        assert_eq!(sandbox.current_env(), Some(env));
        assert_eq!(sandbox.attached_thread_count(), 1);

        sandbox.detach_current_thread(env).unwrap();
        assert_eq!(sandbox.current_env(), None);
        assert!(sandbox.detach_current_thread(env).is_err());
    }

    #[test]
    fn test_application_classes_hidden_from_native_threads() {
        let (sandbox, env) = attached();
        ClassBuilder::new("a/b/Hidden").define(&sandbox).unwrap();

        assert!(sandbox.find_class(env, "a/b/Hidden").is_null());
        assert!(sandbox.exception_check(env));
        let description = sandbox.exception_description(env).unwrap();
        assert_eq!(description, "java.lang.NoClassDefFoundError: a/b/Hidden");
        sandbox.exception_clear(env);

        assert!(!sandbox.find_class(env, "java/lang/String").is_null());
        assert!(!sandbox.load_class(env, "a.b.Hidden").is_null());
        assert!(!sandbox.exception_check(env));
    }

    #[test]
    fn test_managed_thread_sees_application_classes() {
        let sandbox = Sandbox::new();
        ClassBuilder::new("a/b/Visible").define(&sandbox).unwrap();
        let env = sandbox.attach_managed_thread();
        assert!(!sandbox.find_class(env, "a/b/Visible").is_null());
        assert!(sandbox.thread_info(env).unwrap().runtime_created);
    }

    #[test]
    fn test_detach_frees_locals() {
        let (sandbox, env) = attached();
        sandbox.new_string(env, &[0x61]);
        sandbox.new_string(env, &[0x62]);
        assert_eq!(sandbox.local_ref_count(env), 2);
        sandbox.detach_current_thread(env).unwrap();
        assert_eq!(sandbox.local_ref_count(env), 0);
    }

    #[test]
    fn test_duplicate_and_orphan_classes_rejected() {
        let sandbox = Sandbox::new();
        ClassBuilder::new("a/Dup").define(&sandbox).unwrap();
        assert!(ClassBuilder::new("a/Dup").define(&sandbox).is_err());
        assert!(ClassBuilder::new("a/Orphan").extends("a/Missing").define(&sandbox).is_err());
        assert!(ClassBuilder::new("a/BadNative")
            .native_method("f", "(J)V")
            .define(&sandbox)
            .is_err());
    }

    #[test]
    fn test_string_methods() {
        let (sandbox, env) = attached();
        let class = sandbox.find_class(env, STRING_CLASS);
        let hello = sandbox.new_string(env, &"hello".encode_utf16().collect::<Vec<_>>());

        let length = sandbox.method_id(env, class, "length", "()I", false).unwrap();
        let ret = ReturnType::Value(JavaType::Int);
        assert_eq!(
            sandbox.call_method(env, Receiver::Instance(hello), length, &ret, &[]),
            JValue::Int(5)
        );

        let value_of = sandbox
            .method_id(env, class, "valueOf", "(I)Ljava/lang/String;", true)
            .unwrap();
        let result = sandbox.call_method(
            env,
            Receiver::Static(class),
            value_of,
            &ReturnType::Value(JavaType::string()),
            &[JValue::Int(42)],
        );
        let units = sandbox.string_utf16(env, result.as_object().unwrap());
        assert_eq!(String::from_utf16(&units).unwrap(), "42");
    }

    #[test]
    fn test_inherited_method_and_override() {
        let (sandbox, env) = attached();
        ClassBuilder::new("a/Base")
            .system()
            .method("id", "()I", |_| Ok(Value::Int(1)))
            .method("base", "()I", |_| Ok(Value::Int(10)))
            .define(&sandbox)
            .unwrap();
        ClassBuilder::new("a/Derived")
            .system()
            .extends("a/Base")
            .method("id", "()I", |_| Ok(Value::Int(2)))
            .define(&sandbox)
            .unwrap();

        let base = sandbox.find_class(env, "a/Base");
        let derived = sandbox.find_class(env, "a/Derived");
        let ctor = sandbox.method_id(env, derived, "<init>", "()V", false).unwrap();
        let obj = sandbox.new_object(env, derived, ctor, &[]);
        let int = ReturnType::Value(JavaType::Int);

        // Resolved on the base class, dispatched to the override.
        let id = sandbox.method_id(env, base, "id", "()I", false).unwrap();
        assert_eq!(sandbox.call_method(env, Receiver::Instance(obj), id, &int, &[]), JValue::Int(2));
        let inherited = sandbox.method_id(env, derived, "base", "()I", false).unwrap();
        assert_eq!(sandbox.call_method(env, Receiver::Instance(obj), inherited, &int, &[]), JValue::Int(10));
    }

    #[test]
    fn test_throwing_body_sets_pending() {
        let (sandbox, env) = attached();
        ClassBuilder::new("a/Thrower")
            .system()
            .static_method("fail", "()I", |_| Err(Throwable::illegal_state("boom")))
            .define(&sandbox)
            .unwrap();
        let class = sandbox.find_class(env, "a/Thrower");
        let fail = sandbox.method_id(env, class, "fail", "()I", true).unwrap();
        let result = sandbox.call_method(env, Receiver::Static(class), fail, &ReturnType::Value(JavaType::Int), &[]);
        assert_eq!(result, JValue::Int(0));
        assert_eq!(
            sandbox.exception_description(env).as_deref(),
            Some("java.lang.IllegalStateException: boom")
        );
    }

    #[test]
    fn test_fields() {
        let (sandbox, env) = attached();
        ClassBuilder::new("a/Counter")
            .system()
            .field("count", JavaType::Int)
            .static_field("instances", JavaType::Long, Value::Long(7))
            .define(&sandbox)
            .unwrap();
        let class = sandbox.find_class(env, "a/Counter");
        let ctor = sandbox.method_id(env, class, "<init>", "()V", false).unwrap();
        let obj = sandbox.new_object(env, class, ctor, &[]);

        let count = sandbox.field_id(env, class, "count", "I", false).unwrap();
        sandbox.set_field(env, Receiver::Instance(obj), count, &JavaType::Int, JValue::Int(3));
        assert_eq!(
            sandbox.get_field(env, Receiver::Instance(obj), count, &JavaType::Int),
            JValue::Int(3)
        );

        let instances = sandbox.field_id(env, class, "instances", "J", true).unwrap();
        assert_eq!(
            sandbox.get_field(env, Receiver::Static(class), instances, &JavaType::Long),
            JValue::Long(7)
        );

        assert!(sandbox.field_id(env, class, "count", "J", false).is_none());
        assert!(sandbox.exception_check(env));
    }

    extern "system" fn triple(_env: *mut c_void, _class: *mut c_void, x: i32) -> i32 {
        x * 3
    }

    #[test]
    fn test_register_and_call_native() {
        let (sandbox, env) = attached();
        ClassBuilder::new("a/Math")
            .system()
            .native_static_method("triple", "(I)I")
            .define(&sandbox)
            .unwrap();
        let class = sandbox.find_class(env, "a/Math");
        let id = sandbox.method_id(env, class, "triple", "(I)I", true).unwrap();
        let int = ReturnType::Value(JavaType::Int);

        // Unbound natives throw.
        sandbox.call_method(env, Receiver::Static(class), id, &int, &[JValue::Int(1)]);
        assert!(sandbox
            .exception_description(env)
            .unwrap()
            .starts_with("java.lang.UnsatisfiedLinkError"));
        sandbox.exception_clear(env);

        let f: extern "system" fn(*mut c_void, *mut c_void, i32) -> i32 = triple;
        let method = NativeMethod::new(c"triple", c"(I)I", f as *mut c_void);
        sandbox.register_natives(env, class, &[method]).unwrap();
        assert!(sandbox.is_native_bound("a/Math", "triple", "(I)I"));
        assert_eq!(
            sandbox.call_method(env, Receiver::Static(class), id, &int, &[JValue::Int(14)]),
            JValue::Int(42)
        );

        let missing = NativeMethod::new(c"missing", c"()V", f as *mut c_void);
        assert!(sandbox.register_natives(env, class, &[missing]).is_err());
        assert!(sandbox.exception_check(env));
    }
}
