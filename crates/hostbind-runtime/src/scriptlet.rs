//! Scriptlet backend
//!
//! A [`ScriptBackend`] whose "scripts" are Rust closures registered against
//! their source text. Compiling registered text yields the closure; any other
//! text must be a literal (`42`, `1.5`, `"s"`, `true`, `null`, `undefined`)
//! or a dotted global path (`counter.Count`). Anything else is a syntax
//! error.
//!
//! Hosts use it to drive engines from Rust without a script language, and
//! the end-to-end tests use it to express script programs.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use hostbind_engine::{
    CompiledScript, DocumentInfo, ScriptBackend, ScriptError, ScriptFault, ScriptResult, ScriptScope,
    ScriptValue,
};
use parking_lot::RwLock;
use rustc_hash::FxHashMap;

/// Body of a registered script
pub type Scriptlet = Arc<dyn Fn(&ScriptScope) -> ScriptResult<ScriptValue> + Send + Sync>;

/// Closure-backed script backend
#[derive(Default)]
pub struct ScriptletBackend {
    scripts: RwLock<FxHashMap<String, Scriptlet>>,
    collections: AtomicUsize,
}

impl ScriptletBackend {
    /// Backend with no registered scripts
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `source`, builder style
    pub fn with<F>(self, source: &str, body: F) -> Self
    where
        F: Fn(&ScriptScope) -> ScriptResult<ScriptValue> + Send + Sync + 'static,
    {
        self.define(source, body);
        self
    }

    /// Register or replace the body of `source`
    pub fn define<F>(&self, source: &str, body: F)
    where
        F: Fn(&ScriptScope) -> ScriptResult<ScriptValue> + Send + Sync + 'static,
    {
        self.scripts.write().insert(source.trim().to_string(), Arc::new(body));
    }

    /// Is `source` registered?
    pub fn is_defined(&self, source: &str) -> bool {
        self.scripts.read().contains_key(source.trim())
    }

    /// Number of garbage collections requested by engines
    pub fn collections(&self) -> usize {
        self.collections.load(Ordering::Relaxed)
    }
}

impl ScriptBackend for ScriptletBackend {
    fn name(&self) -> &str {
        "scriptlet"
    }

    fn compile(&self, document: &DocumentInfo, code: &str) -> ScriptResult<Arc<dyn CompiledScript>> {
        let source = code.trim();
        if let Some(body) = self.scripts.read().get(source) {
            return Ok(Arc::new(Registered(Arc::clone(body))));
        }
        if let Some(value) = parse_literal(source) {
            return Ok(Arc::new(Literal(value)));
        }
        if let Some(path) = parse_path(source) {
            return Ok(Arc::new(GlobalPath(path)));
        }
        Err(ScriptError::Script(
            ScriptFault::named("SyntaxError", format!("unrecognized script '{}'", source)).at(document.name.clone()),
        ))
    }

    fn collect_garbage(&self, exhaustive: bool) {
        self.collections.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(exhaustive, "scriptlet collection");
    }

    fn heap_size(&self) -> usize {
        self.scripts.read().keys().map(String::len).sum()
    }
}

// ============================================================================
// Compiled forms
// ============================================================================

struct Registered(Scriptlet);

impl CompiledScript for Registered {
    fn run(&self, scope: &ScriptScope) -> ScriptResult<ScriptValue> {
        (self.0)(scope)
    }
}

struct Literal(ScriptValue);

impl CompiledScript for Literal {
    fn run(&self, _scope: &ScriptScope) -> ScriptResult<ScriptValue> {
        Ok(self.0.clone())
    }
}

struct GlobalPath(Vec<String>);

impl CompiledScript for GlobalPath {
    fn run(&self, scope: &ScriptScope) -> ScriptResult<ScriptValue> {
        let mut segments = self.0.iter();
        let mut value = match segments.next() {
            Some(first) => scope.global(first)?,
            None => return Ok(ScriptValue::Undefined),
        };
        for segment in segments {
            value = scope.get(&value, segment)?;
        }
        Ok(value)
    }
}

// ============================================================================
// Parsing
// ============================================================================

fn parse_literal(source: &str) -> Option<ScriptValue> {
    match source {
        "true" => return Some(ScriptValue::Bool(true)),
        "false" => return Some(ScriptValue::Bool(false)),
        "null" => return Some(ScriptValue::Null),
        "undefined" => return Some(ScriptValue::Undefined),
        _ => {}
    }
    for quote in ['"', '\''] {
        if source.len() >= 2 && source.starts_with(quote) && source.ends_with(quote) {
            return Some(ScriptValue::string(&source[1..source.len() - 1]));
        }
    }
    if let Ok(i) = source.parse::<i64>() {
        return Some(ScriptValue::Int(i));
    }
    let numeric = source
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '-' | '+' | 'e' | 'E'));
    if numeric {
        return source.parse::<f64>().ok().map(ScriptValue::Double);
    }
    None
}

fn is_identifier(segment: &str) -> bool {
    let mut chars = segment.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || c == '_' || c == '$')
}

fn parse_path(source: &str) -> Option<Vec<String>> {
    let segments: Vec<String> = source.split('.').map(str::to_string).collect();
    if segments.iter().all(|s| is_identifier(s)) {
        Some(segments)
    } else {
        None
    }
}
