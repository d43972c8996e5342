//! jbridge Sandbox
//!
//! An in-process managed runtime implementing
//! [`ManagedRuntime`](jbridge_sdk::ManagedRuntime), so the bridge can be
//! driven without a JVM:
//! - classes declared from Rust with [`ClassBuilder`], method bodies as closures
//! - local and global reference tables with per-kind counters
//! - per-thread attachment, pending exceptions and class visibility
//! - native method binding for simple `int` signatures
//!
//! # Example
//!
//! ```ignore
//! use jbridge_sandbox::{ClassBuilder, Sandbox};
//!
//! let sandbox = Sandbox::new();
//! ClassBuilder::new("a/b/Greeter")
//!     .method("greet", "()Ljava/lang/String;", |frame| Ok(frame.new_string("hello")))
//!     .define(&sandbox)?;
//! ```

#![warn(missing_docs)]

pub mod class;
pub mod frame;
mod native;
pub mod object;
pub mod runtime;

pub use class::{Body, ClassBuilder, Visibility};
pub use frame::{Frame, Throwable};
pub use object::{ObjId, Value};
pub use runtime::{Sandbox, ThreadInfo};
