//! Class preloading registry
//!
//! Native-created threads cannot look application classes up by name: the
//! runtime resolves names through the calling thread's class loading
//! context, and such threads have none. Classes are therefore resolved
//! once, through a thread-independent loader, and kept as global references
//! keyed by their slash-separated name. Dotted names are accepted and
//! normalized on the way in.
//!
//! Only explicit preloading inserts entries; [`Bridge::find_class`] never
//! does, so the registry's contents stay predictable. Each entry remembers
//! the runtime that created it and is released through that runtime.

use std::borrow::Cow;
use std::fmt;
use std::sync::Arc;

use jbridge_sdk::{ManagedRuntime, ObjectRef};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use tracing::{debug, warn};

use crate::bridge::{same_runtime, Bridge};
use crate::env::Env;
use crate::refs::ClassRef;
use crate::{BridgeError, BridgeResult};

/// Slash-separated form of a class name
fn class_key(name: &str) -> Cow<'_, str> {
    if name.contains('.') {
        Cow::Owned(name.replace('.', "/"))
    } else {
        Cow::Borrowed(name)
    }
}

/// A preloaded class and the runtime it belongs to
struct Entry {
    class: ObjectRef,
    runtime: Arc<dyn ManagedRuntime>,
}

/// Name → global class reference table.
///
/// All access goes through one lock; mutation happens at setup and
/// shutdown only.
#[derive(Default)]
pub struct ClassRegistry {
    entries: Mutex<FxHashMap<String, Entry>>,
}

impl ClassRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Global reference registered under `name`
    pub fn get(&self, name: &str) -> Option<ObjectRef> {
        self.entries.lock().get(class_key(name).as_ref()).map(|e| e.class)
    }

    /// Global reference registered under `name` by `runtime`
    fn get_for(&self, name: &str, runtime: &Arc<dyn ManagedRuntime>) -> Option<ObjectRef> {
        self.entries
            .lock()
            .get(name)
            .filter(|e| same_runtime(&e.runtime, runtime))
            .map(|e| e.class)
    }

    /// Whether `name` has an entry
    pub fn contains(&self, name: &str) -> bool {
        self.entries.lock().contains_key(class_key(name).as_ref())
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Whether the registry is empty
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.entries.lock().keys().cloned().collect();
        names.sort();
        names
    }

    /// Insert unless present. Returns `false` (and leaves the table alone)
    /// if `name` already has an entry.
    fn insert_if_absent(&self, name: &str, class: ObjectRef, runtime: Arc<dyn ManagedRuntime>) -> bool {
        let mut entries = self.entries.lock();
        if entries.contains_key(name) {
            return false;
        }
        entries.insert(name.to_string(), Entry { class, runtime });
        true
    }

    /// Remove every entry, returning them for release
    fn drain(&self) -> Vec<(String, Entry)> {
        self.entries.lock().drain().collect()
    }
}

impl fmt::Debug for ClassRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ClassRegistry").field("names", &self.names()).finish()
    }
}

// ============================================================================
// Bridge operations
// ============================================================================

impl Bridge {
    /// Resolve `name` through the thread-independent loader and keep a
    /// global reference to it. Preloading a name twice is a no-op.
    pub fn preload_class(&self, name: &str) -> BridgeResult<()> {
        let key = class_key(name);
        if self.registry().contains(&key) {
            return Ok(());
        }

        let runtime = self.runtime().ok_or(BridgeError::RuntimeNotRegistered)?;
        let env = Env::for_runtime(self, runtime.clone())?;
        let local = env.load_class(&key).map_err(|e| {
            warn!(class = name, "failed to preload class");
            e
        })?;
        let global = local
            .into_global()
            .ok_or_else(|| BridgeError::AllocationFailed(format!("global reference to {}", name)))?;

        let raw = global.raw();
        if self.registry().insert_if_absent(&key, raw, runtime) {
            // The registry owns it from here on.
            let _ = global.into_raw();
            debug!(class = key.as_ref(), "preloaded class");
        }
        // Otherwise another thread won the race; `global` releases ours.
        Ok(())
    }

    /// Preload several classes. Failures are logged and skipped; returns
    /// how many of the names are preloaded afterwards.
    pub fn preload_classes<I, S>(&self, names: I) -> usize
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut loaded = 0;
        for name in names {
            let name = name.as_ref();
            match self.preload_class(name) {
                Ok(()) => loaded += 1,
                Err(e) => warn!(class = name, error = %e, "skipping class in batch preload"),
            }
        }
        loaded
    }

    /// Whether `name` has been preloaded
    pub fn is_class_preloaded(&self, name: &str) -> bool {
        self.registry().contains(name)
    }

    /// Class reference for `name`: the preloaded entry if there is one,
    /// otherwise a direct lookup on the calling thread, returned as an owned
    /// global and *not* added to the registry.
    pub fn find_class(&self, name: &str) -> BridgeResult<ClassRef> {
        let key = class_key(name);
        if let Some(runtime) = self.runtime() {
            if let Some(raw) = self.registry().get_for(&key, &runtime) {
                return Ok(ClassRef::Preloaded(raw));
            }
        }

        let env = Env::current(self)?;
        let local = env.find_class_direct(&key)?;
        local
            .into_global()
            .map(ClassRef::Owned)
            .ok_or_else(|| BridgeError::AllocationFailed(format!("global reference to {}", name)))
    }

    /// Release every preloaded class and empty the registry.
    ///
    /// Class references previously handed out as [`ClassRef::Preloaded`]
    /// dangle afterwards; callers must make sure none are in use.
    pub fn unload_classes(&self) {
        for (name, entry) in self.registry().drain() {
            match Env::for_runtime(self, entry.runtime.clone()) {
                Ok(env) => {
                    entry.runtime.delete_global_ref(env.raw(), entry.class);
                    debug!(class = name.as_str(), runtime = entry.runtime.name(), "unloaded class");
                }
                Err(e) => warn!(class = name.as_str(), error = %e, "leaking preloaded class"),
            }
        }
    }

    /// Number of preloaded classes
    pub fn preloaded_count(&self) -> usize {
        self.registry().len()
    }

    /// Preloaded class names, sorted
    pub fn preloaded_class_names(&self) -> Vec<String> {
        self.registry().names()
    }
}
