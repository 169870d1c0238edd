//! Script scope
//!
//! [`ScriptScope`] is the context compiled script code runs in. It is the
//! only way script reaches globals, host objects and the engine's control
//! points: every member access, call, index and construction goes through
//! the binder here.
//!
//! ```ignore
//! let script = |scope: &ScriptScope, _args: &[ScriptValue]| {
//!     let list = scope.global("list")?;
//!     scope.invoke_method(&list, "Add", &[ScriptValue::Int(1)])?;
//!     scope.get(&list, "Count")
//! };
//! ```

use std::fmt;
use std::sync::Arc;

use hostbind_sdk::HostValue;

use crate::backend::DocumentInfo;
use crate::engine::{Engine, EngineCore};
use crate::error::{ScriptError, ScriptFault, ScriptResult};
use crate::value::{ScriptArray, ScriptCallable, ScriptFunction, ScriptObject, ScriptValue};

/// Context of running script code
pub struct ScriptScope {
    core: Arc<EngineCore>,
    document: Arc<DocumentInfo>,
}

fn type_error(message: impl Into<String>) -> ScriptError {
    ScriptError::Script(ScriptFault::named("TypeError", message))
}

impl ScriptScope {
    pub(crate) fn new(core: Arc<EngineCore>, document: Arc<DocumentInfo>) -> Self {
        ScriptScope { core, document }
    }

    /// Document the running code belongs to
    pub fn document(&self) -> &Arc<DocumentInfo> {
        &self.document
    }

    /// Engine the code runs on
    pub fn engine(&self) -> Engine {
        Engine::from_core(Arc::clone(&self.core))
    }

    // ========================================================================
    // Globals
    // ========================================================================

    /// Read a global. Members of items added with `GLOBAL_MEMBERS` resolve
    /// after named globals.
    pub fn global(&self, name: &str) -> ScriptResult<ScriptValue> {
        if let Some(value) = self.core.globals.read().get(name).cloned() {
            return Ok(value);
        }
        let items = self.core.global_members.read().clone();
        for item in &items {
            if self.core.host_member_names(item)?.iter().any(|n| n == name) {
                return self.core.host_get(item, name);
            }
        }
        Err(ScriptError::Script(ScriptFault::named(
            "ReferenceError",
            format!("{} is not defined", name),
        )))
    }

    /// Write a global
    pub fn set_global(&self, name: &str, value: ScriptValue) -> ScriptResult<()> {
        let value = self.core.adopt(value)?;
        self.core.globals.write().insert(name.to_string(), value);
        Ok(())
    }

    // ========================================================================
    // Members
    // ========================================================================

    /// `target.name`
    pub fn get(&self, target: &ScriptValue, name: &str) -> ScriptResult<ScriptValue> {
        match target {
            ScriptValue::HostObject(item) => self.core.host_get(item, name),
            ScriptValue::HostMember(member) => Ok(self.core.bound_get(member, name)),
            ScriptValue::Object(object) => Ok(object.get(name)),
            ScriptValue::Array(array) if name == "length" => Ok(ScriptValue::Int(array.len() as i64)),
            ScriptValue::String(s) if name == "length" => Ok(ScriptValue::Int(s.chars().count() as i64)),
            ScriptValue::Function(function) if name == "name" => Ok(ScriptValue::string(function.name())),
            ScriptValue::ArrayBuffer(buffer) if name == "byteLength" => Ok(ScriptValue::Int(buffer.len() as i64)),
            ScriptValue::TypedArray(view) if name == "length" => Ok(ScriptValue::Int(view.element_count() as i64)),
            ScriptValue::TypedArray(view) if name == "byteLength" => Ok(ScriptValue::Int(view.byte_length() as i64)),
            ScriptValue::TypedArray(view) if name == "buffer" => Ok(ScriptValue::ArrayBuffer(view.buffer().clone())),
            nullish if nullish.is_nullish() => Err(type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                nullish.describe(),
                name
            ))),
            _ => Ok(ScriptValue::Undefined),
        }
    }

    /// `target.name = value`
    pub fn set(&self, target: &ScriptValue, name: &str, value: ScriptValue) -> ScriptResult<()> {
        match target {
            ScriptValue::HostObject(item) => self.core.host_set(item, name, value),
            ScriptValue::Object(object) => {
                object.set(name, value);
                Ok(())
            }
            other => Err(type_error(format!(
                "Cannot set property '{}' of {}",
                name,
                other.describe()
            ))),
        }
    }

    /// `callee(args)`
    pub fn call(&self, callee: &ScriptValue, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        self.core.call_value(callee, args)
    }

    /// `target.name(args)`
    pub fn invoke_method(&self, target: &ScriptValue, name: &str, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        match target {
            ScriptValue::HostObject(item) => self.core.host_invoke_member(item, name, args),
            ScriptValue::HostMember(member) => self.core.bound_invoke_member(member, name, args),
            ScriptValue::Object(object) => {
                let callee = object.get(name);
                if callee.is_undefined() {
                    return Err(type_error(format!("{} is not a function", name)));
                }
                self.core.call_value(&callee, args)
            }
            nullish if nullish.is_nullish() => Err(type_error(format!(
                "Cannot read properties of {} (reading '{}')",
                nullish.describe(),
                name
            ))),
            other => Err(type_error(format!("{}.{} is not a function", other.describe(), name))),
        }
    }

    /// `target(keys) = value`
    pub fn set_invoke(&self, target: &ScriptValue, keys: &[ScriptValue], value: ScriptValue) -> ScriptResult<()> {
        self.core.set_invoke_value(target, keys, value)
    }

    /// `target.name(keys) = value`
    pub fn set_invoke_member(
        &self,
        target: &ScriptValue,
        name: &str,
        keys: &[ScriptValue],
        value: ScriptValue,
    ) -> ScriptResult<()> {
        match target {
            ScriptValue::HostObject(item) => self.core.host_set_invoke_member(item, name, keys, value),
            other => Err(ScriptError::NotSupported(format!(
                "cannot assign through {}.{}",
                other.describe(),
                name
            ))),
        }
    }

    /// `target[key]`
    pub fn get_index(&self, target: &ScriptValue, key: &ScriptValue) -> ScriptResult<ScriptValue> {
        self.get_index_n(target, std::slice::from_ref(key))
    }

    /// `target[k1, k2, ...]`
    pub fn get_index_n(&self, target: &ScriptValue, keys: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        match (target, keys) {
            (ScriptValue::HostObject(item), _) => self.core.host_get_index(item, keys),
            (ScriptValue::Array(array), [key]) => match key.as_i64() {
                Some(i) if i >= 0 => Ok(array.get(i as usize)),
                _ => Ok(ScriptValue::Undefined),
            },
            (ScriptValue::Object(object), [ScriptValue::String(name)]) => Ok(object.get(name)),
            (ScriptValue::TypedArray(view), [key]) => match key.as_i64() {
                Some(i) if i >= 0 => view
                    .get_element(i as usize)
                    .map(ScriptValue::number)
                    .map_err(|e| ScriptError::Range(e.to_string())),
                _ => Ok(ScriptValue::Undefined),
            },
            (other, [ScriptValue::String(name)]) => self.get(other, name),
            (other, _) => Err(type_error(format!("{} is not indexable", other.describe()))),
        }
    }

    /// `target[key] = value`
    pub fn set_index(&self, target: &ScriptValue, key: &ScriptValue, value: ScriptValue) -> ScriptResult<()> {
        self.set_index_n(target, std::slice::from_ref(key), value)
    }

    /// `target[k1, k2, ...] = value`
    pub fn set_index_n(&self, target: &ScriptValue, keys: &[ScriptValue], value: ScriptValue) -> ScriptResult<()> {
        match (target, keys) {
            (ScriptValue::HostObject(item), _) => self.core.host_set_index(item, keys, value),
            (ScriptValue::Array(array), [key]) => match key.as_i64() {
                Some(i) if i >= 0 => {
                    array.set(i as usize, value);
                    Ok(())
                }
                _ => Err(ScriptError::Range(format!("invalid array index {}", key.describe()))),
            },
            (ScriptValue::Object(object), [ScriptValue::String(name)]) => {
                object.set(name, value);
                Ok(())
            }
            (ScriptValue::TypedArray(view), [key]) => {
                let index = key
                    .as_i64()
                    .filter(|i| *i >= 0)
                    .ok_or_else(|| ScriptError::Range(format!("invalid index {}", key.describe())))?;
                let number = value
                    .as_f64()
                    .ok_or_else(|| type_error(format!("{} is not a number", value.describe())))?;
                view.set_element(index as usize, number)
                    .map_err(|e| ScriptError::Range(e.to_string()))
            }
            (other, _) => Err(type_error(format!("{} is not indexable", other.describe()))),
        }
    }

    /// `new callee(args)`
    pub fn construct(&self, callee: &ScriptValue, args: &[ScriptValue]) -> ScriptResult<ScriptValue> {
        match callee {
            ScriptValue::HostObject(item) if item.is_type() => self.core.host_construct(item, args),
            other => Err(type_error(format!("{} is not a constructor", other.describe()))),
        }
    }

    /// Enumerable member names of `target`
    pub fn member_names(&self, target: &ScriptValue) -> ScriptResult<Vec<String>> {
        match target {
            ScriptValue::HostObject(item) => self.core.host_member_names(item),
            ScriptValue::Object(object) => Ok(object.keys()),
            ScriptValue::Array(array) => Ok((0..array.len()).map(|i| i.to_string()).collect()),
            _ => Ok(Vec::new()),
        }
    }

    // ========================================================================
    // Control
    // ========================================================================

    /// Safe point; fails with `Interrupted` when an interrupt is pending
    pub fn poll(&self) -> ScriptResult<()> {
        self.core.session.poll()
    }

    /// `try { body } catch (e) { handler(e) }`. Interrupts pass through
    /// untouched.
    pub fn try_catch(
        &self,
        body: impl FnOnce(&ScriptScope) -> ScriptResult<ScriptValue>,
        handler: impl FnOnce(&ScriptScope, ScriptValue) -> ScriptResult<ScriptValue>,
    ) -> ScriptResult<ScriptValue> {
        match body(self) {
            Err(err) if err.is_catchable() => {
                let caught = self.error_value(&err);
                handler(self, caught)
            }
            other => other,
        }
    }

    /// Value a script handler sees for `err`: the thrown value, or an object
    /// with `name` and `message`
    fn error_value(&self, err: &ScriptError) -> ScriptValue {
        if let ScriptError::Script(ScriptFault { thrown: Some(value), .. }) = err {
            return value.clone();
        }
        ScriptValue::Object(ScriptObject::from_pairs([
            ("name", ScriptValue::string(err.name())),
            ("message", ScriptValue::string(err.innermost_message())),
        ]))
    }

    /// `throw value`
    pub fn throw(&self, value: ScriptValue) -> ScriptError {
        let message = match &value {
            ScriptValue::String(s) => s.to_string(),
            ScriptValue::Object(object) => object
                .get("message")
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| value.describe()),
            other => other.describe(),
        };
        let name = match &value {
            ScriptValue::Object(object) => object.get("name").as_str().unwrap_or("Error").to_string(),
            _ => "Error".to_string(),
        };
        let mut fault = ScriptFault::named(name, message).at(self.document.name.clone());
        fault.thrown = Some(value);
        ScriptError::Script(fault)
    }

    /// Define a function owned by this engine
    pub fn function<F>(&self, name: &str, body: F) -> ScriptValue
    where
        F: Fn(&ScriptScope, &[ScriptValue]) -> ScriptResult<ScriptValue> + Send + Sync + 'static,
    {
        let body: Arc<dyn ScriptCallable> = Arc::new(body);
        ScriptValue::Function(ScriptFunction::new(name, &self.core, Arc::clone(&self.document), body))
    }

    /// `import specifier`; `undefined` when the module already ran
    pub fn import(&self, specifier: &str) -> ScriptResult<ScriptValue> {
        self.core.import_module(specifier, Some(&self.document))
    }

    // ========================================================================
    // Values
    // ========================================================================

    /// `a === b`
    pub fn strict_equals(&self, a: &ScriptValue, b: &ScriptValue) -> bool {
        a.strict_equals(b)
    }

    /// `String(value)`
    pub fn to_string(&self, value: &ScriptValue) -> ScriptResult<String> {
        Ok(match value {
            ScriptValue::Undefined => "undefined".to_string(),
            ScriptValue::Null | ScriptValue::WrappedNull(_) => "null".to_string(),
            ScriptValue::Bool(b) => b.to_string(),
            ScriptValue::Int(i) => i.to_string(),
            ScriptValue::Double(d) => format_number(*d),
            ScriptValue::String(s) => s.to_string(),
            ScriptValue::HostObject(item) => {
                let result = self.core.host_invoke_member(item, "ToString", &[])?;
                result.as_str().map(str::to_string).unwrap_or_default()
            }
            ScriptValue::Array(array) => array
                .to_vec()
                .iter()
                .map(|item| self.to_string(item))
                .collect::<ScriptResult<Vec<_>>>()?
                .join(","),
            ScriptValue::Object(_) => "[object Object]".to_string(),
            other => other.describe(),
        })
    }

    /// `Number(value)`
    pub fn to_number(&self, value: &ScriptValue) -> f64 {
        match value {
            ScriptValue::Int(i) => *i as f64,
            ScriptValue::Double(d) => *d,
            ScriptValue::Bool(b) => f64::from(u8::from(*b)),
            ScriptValue::Null | ScriptValue::WrappedNull(_) => 0.0,
            ScriptValue::String(s) if s.trim().is_empty() => 0.0,
            ScriptValue::String(s) => s.trim().parse().unwrap_or(f64::NAN),
            ScriptValue::Date(ms) => *ms,
            ScriptValue::HostObject(_) => self.core.to_host_value(value).to_f64().unwrap_or(f64::NAN),
            _ => f64::NAN,
        }
    }

    /// New script array
    pub fn new_array(&self, items: Vec<ScriptValue>) -> ScriptValue {
        ScriptValue::Array(ScriptArray::new(items))
    }

    /// New script object
    pub fn new_object<I, K>(&self, pairs: I) -> ScriptValue
    where
        I: IntoIterator<Item = (K, ScriptValue)>,
        K: Into<String>,
    {
        ScriptValue::Object(ScriptObject::from_pairs(pairs))
    }

    /// Host value of `value`, as an untyped host parameter would see it
    pub fn to_host(&self, value: &ScriptValue) -> HostValue {
        self.core.to_host_value(value)
    }
}

impl fmt::Debug for ScriptScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ScriptScope({} in {})", self.document.name, self.core.name)
    }
}

fn format_number(d: f64) -> String {
    if d.is_nan() {
        "NaN".to_string()
    } else if d.is_infinite() {
        if d > 0.0 { "Infinity" } else { "-Infinity" }.to_string()
    } else if d.fract() == 0.0 && d.abs() < 1e15 {
        format!("{}", d as i64)
    } else {
        d.to_string()
    }
}
