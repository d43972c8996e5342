//! Bridge context and options
//!
//! A [`Bridge`] owns the runtime handle and the class registry. Everything
//! else (environments, references, wrappers) hangs off a bridge. One
//! process-wide bridge is reachable through [`Bridge::global`]; separate
//! bridges can be created for isolation, e.g. in tests.

use std::fmt;
use std::sync::Arc;

use jbridge_sdk::{AttachOptions, ManagedRuntime};
use once_cell::sync::OnceCell;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::registry::ClassRegistry;

/// What a call does after the managed callee threw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FaultPolicy {
    /// Clear the exception and return the zero value of the result type
    #[default]
    Suppress,
    /// Clear the exception and return `BridgeError::ManagedFault`
    Propagate,
    /// Leave the exception pending and return the zero value; the caller
    /// must check it with `Env::suppress_exception` before the next call
    Defer,
}

/// Options for a [`Bridge`]
#[derive(Debug, Clone)]
pub struct BridgeOptions {
    /// Log a description of every managed exception the guard clears
    pub describe_exceptions: bool,

    /// Behaviour after a managed fault
    pub fault_policy: FaultPolicy,

    /// Thread name reported when attaching native threads
    pub attach_thread_name: Option<String>,

    /// Attach native threads as daemon threads
    pub attach_as_daemon: bool,
}

impl Default for BridgeOptions {
    fn default() -> Self {
        Self {
            describe_exceptions: true,
            fault_policy: FaultPolicy::Suppress,
            attach_thread_name: None,
            attach_as_daemon: false,
        }
    }
}

impl BridgeOptions {
    /// Set the fault policy
    pub fn with_fault_policy(mut self, policy: FaultPolicy) -> Self {
        self.fault_policy = policy;
        self
    }

    /// Enable or disable exception descriptions
    pub fn with_describe_exceptions(mut self, describe: bool) -> Self {
        self.describe_exceptions = describe;
        self
    }

    /// Name reported for attached threads
    pub fn with_thread_name(mut self, name: impl Into<String>) -> Self {
        self.attach_thread_name = Some(name.into());
        self
    }

    /// Attach as daemon threads
    pub fn with_daemon_threads(mut self, daemon: bool) -> Self {
        self.attach_as_daemon = daemon;
        self
    }

    pub(crate) fn attach_options(&self) -> AttachOptions {
        AttachOptions {
            thread_name: self.attach_thread_name.clone(),
            daemon: self.attach_as_daemon,
        }
    }
}

/// Whether two handles point at the same runtime instance
pub(crate) fn same_runtime(a: &Arc<dyn ManagedRuntime>, b: &Arc<dyn ManagedRuntime>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

struct Shared {
    runtime: RwLock<Option<Arc<dyn ManagedRuntime>>>,
    registry: ClassRegistry,
    options: BridgeOptions,
}

/// Handle to a bridge context. Cloning is cheap and shares the context.
#[derive(Clone)]
pub struct Bridge {
    shared: Arc<Shared>,
}

static GLOBAL: OnceCell<Bridge> = OnceCell::new();

impl Bridge {
    /// Create a bridge with no runtime registered yet
    pub fn new(options: BridgeOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                runtime: RwLock::new(None),
                registry: ClassRegistry::new(),
                options,
            }),
        }
    }

    /// Create a bridge and register `runtime` on it
    pub fn with_runtime(runtime: Arc<dyn ManagedRuntime>, options: BridgeOptions) -> Self {
        let bridge = Self::new(options);
        bridge.register_runtime(runtime);
        bridge
    }

    /// The process-wide bridge, created with default options on first use
    pub fn global() -> Bridge {
        GLOBAL
            .get_or_init(|| Bridge::new(BridgeOptions::default()))
            .clone()
    }

    /// Create the process-wide bridge with `options`.
    ///
    /// Returns `false` if it already exists, in which case the existing one
    /// keeps its options.
    pub fn init_global(options: BridgeOptions) -> bool {
        GLOBAL.set(Bridge::new(options)).is_ok()
    }

    /// Register the managed runtime. A later registration replaces an
    /// earlier one; classes preloaded on the replaced runtime are released
    /// through it and the registry starts empty.
    pub fn register_runtime(&self, runtime: Arc<dyn ManagedRuntime>) {
        let mut slot = self.shared.runtime.write();
        let replaced = match slot.as_ref() {
            Some(previous) if same_runtime(previous, &runtime) => false,
            Some(previous) => {
                warn!(
                    previous = previous.name(),
                    next = runtime.name(),
                    preloaded = self.shared.registry.len(),
                    "replacing registered managed runtime"
                );
                true
            }
            None => {
                debug!(runtime = runtime.name(), "managed runtime registered");
                false
            }
        };
        *slot = Some(runtime);
        drop(slot);

        if replaced {
            self.unload_classes();
        }
    }

    /// The registered runtime, if any
    pub fn runtime(&self) -> Option<Arc<dyn ManagedRuntime>> {
        self.shared.runtime.read().clone()
    }

    /// Whether a runtime has been registered
    pub fn is_registered(&self) -> bool {
        self.shared.runtime.read().is_some()
    }

    /// Options this bridge was created with
    pub fn options(&self) -> &BridgeOptions {
        &self.shared.options
    }

    /// Class registry of this bridge
    pub fn registry(&self) -> &ClassRegistry {
        &self.shared.registry
    }

    /// Whether two handles share one context
    pub fn ptr_eq(&self, other: &Bridge) -> bool {
        Arc::ptr_eq(&self.shared, &other.shared)
    }
}

impl fmt::Debug for Bridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let runtime = self.shared.runtime.read();
        f.debug_struct("Bridge")
            .field("runtime", &runtime.as_ref().map(|r| r.name().to_string()))
            .field("preloaded", &self.shared.registry.len())
            .field("options", &self.shared.options)
            .finish()
    }
}
