//! Hostbind engine
//!
//! Binds host types and values described with `hostbind-sdk` into script
//! engines:
//! - **Access**: per-member access decisions (`access` module)
//! - **Binder**: member lookup, overload resolution and default members (`binder`)
//! - **Marshal**: conversions between host and script values (`marshal`)
//! - **Lifetime**: engine-scoped proxy cache with deferred release (`lifetime`)
//! - **Session**: execution state, nesting and interrupts (`session`)
//!
//! The script language itself is supplied by a [`ScriptBackend`].
//!
//! # Example
//!
//! ```rust,ignore
//! use hostbind_engine::{Engine, EngineOptions, HeapCounters, HostItemFlags};
//!
//! let engine = Engine::new("main", EngineOptions::default(), backend, Arc::new(HeapCounters::default()));
//! engine.add_host_object("counter", HostItemFlags::NONE, counter)?;
//! engine.add_host_functions("host")?;
//! let value = engine.evaluate("counter.Add(2)")?;
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

// ============================================================================
// Modules
// ============================================================================

/// Access decisions for host members
pub mod access;

/// Script backend interface
pub mod backend;

mod binder;

/// Engine state and handle
pub mod engine;

/// Error types
pub mod error;

/// Runtime-wide heap accounting
pub mod heap;

/// Script-facing helper functions
pub mod helpers;

/// Proxy lifetime management
pub mod lifetime;

/// Host ↔ script value conversion
pub mod marshal;

/// Module loading and records
pub mod module;

/// Engine options and host item flags
pub mod options;

/// Script scope
pub mod scope;

/// Execution sessions
pub mod session;

/// Script-side values
pub mod value;

// ============================================================================
// Re-exports
// ============================================================================

pub use access::{AccessDecision, AccessPolicy};
pub use backend::{CompiledScript, DocumentInfo, DocumentKind, ScriptBackend};
pub use binder::{BoundKind, BoundMember};
pub use engine::{Engine, InterruptHandle, WeakEngine};
pub use error::{ConversionError, ExecutionFault, FaultCause, ScriptError, ScriptFault, ScriptResult};
pub use heap::{HeapCounters, HeapInfo};
pub use helpers::HOST_FUNCTIONS;
pub use lifetime::{HostItem, HostTarget, ProxyId, SweepStats};
pub use marshal::{BindCost, ConversionRule, Converted};
pub use module::{normalize_path, MemoryLoader, ModuleLoader};
pub use options::{EngineOptions, HostItemFlags, NullExport};
pub use scope::ScriptScope;
pub use session::{EngineContext, FrameKind, SessionState};
pub use value::{ScriptArray, ScriptCallable, ScriptFunction, ScriptObject, ScriptValue};

pub use hostbind_sdk;
