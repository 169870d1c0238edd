//! Hostbind runtime
//!
//! Creates engines over a shared heap, loads `hostbind.toml`, and exposes the
//! host-facing [`ScriptEngine`] control surface. [`ScriptletBackend`] runs
//! Rust closures as scripts.
//!
//! # Example
//!
//! ```rust,ignore
//! use hostbind_runtime::{Runtime, RuntimeConfig, ScriptletBackend};
//!
//! let runtime = Runtime::with_config(RuntimeConfig::from_file("hostbind.toml")?);
//! let backend = Arc::new(ScriptletBackend::new().with("main()", |scope| {
//!     let counter = scope.global("counter")?;
//!     scope.invoke_method(&counter, "Add", &[ScriptValue::Int(2)])
//! }));
//! let engine = runtime.create_engine("main", backend);
//! engine.add_host_object("counter", HostItemFlags::NONE, counter)?;
//! engine.execute("main()")?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

/// Configuration loading
pub mod config;

/// Host-facing engine surface
pub mod engine;

/// Error types
pub mod error;

/// Engine factory
pub mod runtime;

/// Closure-backed script backend
pub mod scriptlet;

pub use config::{RuntimeConfig, RuntimeOptions};
pub use engine::ScriptEngine;
pub use error::{RuntimeError, RuntimeResult};
pub use runtime::{CollectStats, Runtime};
pub use scriptlet::{Scriptlet, ScriptletBackend};

pub use hostbind_engine;
pub use hostbind_sdk;
