//! Runs the current extraction script against a subject file.
//!
//! Hot-reload is part of the contract: every call reads the script from the
//! store and compiles it into a fresh engine. A compiled AST is never reused
//! across calls, because the text may have changed between attempts.

use rhai::{Dynamic, Engine, EvalAltResult, Scope};
use serde_json::Value;

use super::store::CodeStore;
use super::{Attrs, Failure, ENTRY_POINT};
use crate::extract;

/// Budget on script work per execution; a runaway script becomes an
/// ordinary failure instead of a hang.
const MAX_OPERATIONS: u64 = 5_000_000;
const MAX_CALL_LEVELS: usize = 64;

pub struct Executor {
    store: CodeStore,
}

impl Executor {
    pub fn new(store: CodeStore) -> Self {
        Self { store }
    }

    fn engine() -> Engine {
        let mut engine = Engine::new();
        engine.set_max_operations(MAX_OPERATIONS);
        engine.set_max_call_levels(MAX_CALL_LEVELS);
        extract::register_helpers(&mut engine);
        engine
    }

    /// Execute the stored script's `describe(subject)` and return its
    /// attribute map. Any error along the way - unreadable store, parse
    /// error, runtime error, wrong return shape, missing `path` - comes back
    /// as a `Failure` carrying the source text that failed.
    pub fn execute(&self, subject: &str) -> Result<Attrs, Failure> {
        let source = self
            .store
            .load()
            .map_err(|e| Failure::new("IoError", e.to_string(), String::new()))?;

        let engine = Self::engine();
        let ast = engine
            .compile(&source)
            .map_err(|e| Failure::new("SyntaxError", e.to_string(), source.clone()))?;

        let mut scope = Scope::new();
        let output: Dynamic = engine
            .call_fn(&mut scope, &ast, ENTRY_POINT, (subject.to_string(),))
            .map_err(|e| Failure::new(classify(&e), e.to_string(), source.clone()))?;

        if !output.is_map() {
            return Err(Failure::new(
                "TypeError",
                format!(
                    "{}() returned {}, expected a map",
                    ENTRY_POINT,
                    output.type_name()
                ),
                source,
            ));
        }

        let map = output.cast::<rhai::Map>();
        let mut attrs = Attrs::new();
        for (key, value) in map {
            attrs.insert(key.to_string(), dynamic_to_value(&value));
        }

        validate(&attrs).map_err(|msg| Failure::new("ValidationError", msg, source))?;
        Ok(attrs)
    }
}

/// Output contract check: every result must name the subject it describes.
pub fn validate(attrs: &Attrs) -> Result<(), String> {
    if attrs.contains_key("path") {
        Ok(())
    } else {
        Err("missing required key: path".to_string())
    }
}

/// Degrade a script value into JSON without ever failing: primitives map
/// directly, byte blobs become best-effort text, and anything else falls
/// back to its printable form.
pub fn dynamic_to_value(value: &Dynamic) -> Value {
    if value.is_unit() {
        Value::Null
    } else if let Ok(b) = value.as_bool() {
        Value::Bool(b)
    } else if let Ok(i) = value.as_int() {
        Value::from(i)
    } else if let Ok(f) = value.as_float() {
        serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or_else(|| Value::String(f.to_string()))
    } else if let Ok(c) = value.as_char() {
        Value::String(c.to_string())
    } else if value.is_string() {
        Value::String(value.clone().into_string().unwrap_or_default())
    } else if value.is::<rhai::Blob>() {
        let blob = value.clone_cast::<rhai::Blob>();
        Value::String(String::from_utf8_lossy(&blob).into_owned())
    } else if value.is_array() {
        let array = value.clone_cast::<rhai::Array>();
        Value::Array(array.iter().map(dynamic_to_value).collect())
    } else if value.is_map() {
        let map = value.clone_cast::<rhai::Map>();
        let mut object = Attrs::new();
        for (key, inner) in map {
            object.insert(key.to_string(), dynamic_to_value(&inner));
        }
        Value::Object(object)
    } else {
        Value::String(value.to_string())
    }
}

fn classify(err: &EvalAltResult) -> &'static str {
    match err {
        EvalAltResult::ErrorInFunctionCall(_, _, inner, _) => classify(inner),
        EvalAltResult::ErrorFunctionNotFound(..) => "FunctionNotFound",
        EvalAltResult::ErrorVariableNotFound(..) => "VariableNotFound",
        EvalAltResult::ErrorRuntime(..) => "RuntimeError",
        EvalAltResult::ErrorArithmetic(..) => "ArithmeticError",
        EvalAltResult::ErrorMismatchDataType(..) | EvalAltResult::ErrorMismatchOutputType(..) => {
            "TypeError"
        }
        EvalAltResult::ErrorTooManyOperations(..) => "OperationLimit",
        _ => "EvalError",
    }
}
