//! Error types for runtime backends

/// Result type for backend operations
pub type RuntimeResult<T> = Result<T, RuntimeError>;

/// Failures reported by a [`ManagedRuntime`](crate::ManagedRuntime) backend.
///
/// These cover the runtime's own plumbing (attachment, descriptors,
/// registration). A pending managed exception is *not* a `RuntimeError`;
/// it is observed through the exception calls on the runtime.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RuntimeError {
    /// The runtime refused to attach the calling thread
    #[error("Thread attachment failed: {0}")]
    AttachFailed(String),

    /// The runtime refused to detach the calling thread
    #[error("Thread detachment failed: {0}")]
    DetachFailed(String),

    /// A type descriptor did not follow the descriptor grammar
    #[error("Invalid type descriptor {descriptor:?}: {reason}")]
    InvalidDescriptor {
        /// The offending descriptor
        descriptor: String,
        /// What was wrong with it
        reason: String,
    },

    /// Native method registration was rejected
    #[error("Native method registration failed: {0}")]
    RegistrationFailed(String),

    /// Backend-specific failure
    #[error("{0}")]
    Backend(String),
}

impl From<String> for RuntimeError {
    fn from(s: String) -> Self {
        RuntimeError::Backend(s)
    }
}

impl From<&str> for RuntimeError {
    fn from(s: &str) -> Self {
        RuntimeError::Backend(s.to_string())
    }
}
