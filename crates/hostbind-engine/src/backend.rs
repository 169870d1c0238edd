//! Script backend interface
//!
//! The engine does not execute script text itself. A [`ScriptBackend`]
//! compiles documents into [`CompiledScript`]s, which run against a
//! [`ScriptScope`] and reach host objects only through it.

use std::fmt;
use std::sync::Arc;

use crate::error::ScriptResult;
use crate::scope::ScriptScope;
use crate::value::ScriptValue;

/// Kind of a compiled document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    /// Classic script; evaluates in the global scope
    Script,
    /// Module; evaluated at most once per engine
    Module,
}

/// Identity of a compiled document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInfo {
    /// Display name
    pub name: String,
    /// Script or module
    pub kind: DocumentKind,
    /// Normalized module specifier, for modules
    pub specifier: Option<String>,
}

impl DocumentInfo {
    /// Classic script document
    pub fn script(name: impl Into<String>) -> Self {
        DocumentInfo {
            name: name.into(),
            kind: DocumentKind::Script,
            specifier: None,
        }
    }

    /// Module document for a normalized specifier
    pub fn module(specifier: impl Into<String>) -> Self {
        let specifier = specifier.into();
        DocumentInfo {
            name: specifier.clone(),
            kind: DocumentKind::Module,
            specifier: Some(specifier),
        }
    }

    /// Is this a module?
    pub fn is_module(&self) -> bool {
        self.kind == DocumentKind::Module
    }
}

impl fmt::Display for DocumentInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// A compiled document, runnable any number of times
pub trait CompiledScript: Send + Sync {
    /// Run in `scope`; returns the completion value
    fn run(&self, scope: &ScriptScope) -> ScriptResult<ScriptValue>;
}

/// Compiler and memory manager of the script side
pub trait ScriptBackend: Send + Sync {
    /// Backend name
    fn name(&self) -> &str;

    /// Compile `code` for `document`
    fn compile(&self, document: &DocumentInfo, code: &str) -> ScriptResult<Arc<dyn CompiledScript>>;

    /// Collect script-side garbage
    fn collect_garbage(&self, _exhaustive: bool) {}

    /// Script-side heap size in bytes, if the backend tracks it
    fn heap_size(&self) -> usize {
        0
    }
}
