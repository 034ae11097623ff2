//! Handler parameter declarations, coercion and resolved arguments.

use std::any::{Any, TypeId};
use std::sync::Arc;

use serde_json::Value;

use crate::error::RouterError;

/// Type identity of a dependency registered in the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DependencyKey {
    id: TypeId,
    name: &'static str,
}

impl DependencyKey {
    pub fn of<T: Any + Send + Sync>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.name
    }
}

/// Semantic type a parameter is coerced to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    Int,
    Float,
    Bool,
    Str,
    /// Left as the raw value (string, array or object).
    Raw,
    Dependency(DependencyKey),
}

/// A resolved argument.
#[derive(Debug, Clone)]
pub enum ArgValue {
    Int(i64),
    Float(f64),
    Bool(bool),
    Str(String),
    Raw(Value),
    Dependency(Arc<dyn Any + Send + Sync>),
}

/// One formal parameter of a handler.
#[derive(Debug, Clone)]
pub struct ParamSpec {
    pub name: String,
    pub kind: ParamKind,
    pub default: Option<ArgValue>,
}

impl ParamSpec {
    pub fn new(name: impl Into<String>, kind: ParamKind) -> Self {
        Self {
            name: name.into(),
            kind,
            default: None,
        }
    }

    pub fn int(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Int)
    }

    pub fn float(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Float)
    }

    pub fn bool(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Bool)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Str)
    }

    pub fn raw(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Raw)
    }

    pub fn dependency<T: Any + Send + Sync>(name: impl Into<String>) -> Self {
        Self::new(name, ParamKind::Dependency(DependencyKey::of::<T>()))
    }

    pub fn with_default(mut self, value: ArgValue) -> Self {
        self.default = Some(value);
        self
    }

    pub fn is_dependency(&self) -> bool {
        matches!(self.kind, ParamKind::Dependency(_))
    }
}

const TRUTHY: [&str; 4] = ["1", "true", "yes", "on"];
const FALSY: [&str; 4] = ["0", "false", "no", "off"];

/// Coerce an input value to a scalar kind. Never defaults on failure.
pub fn coerce(kind: ParamKind, value: &Value) -> Result<ArgValue, String> {
    match kind {
        ParamKind::Int => coerce_int(value).map(ArgValue::Int),
        ParamKind::Float => coerce_float(value).map(ArgValue::Float),
        ParamKind::Bool => coerce_bool(value).map(ArgValue::Bool),
        ParamKind::Str => match value {
            Value::String(s) => Ok(ArgValue::Str(s.clone())),
            Value::Number(n) => Ok(ArgValue::Str(n.to_string())),
            Value::Bool(b) => Ok(ArgValue::Str(b.to_string())),
            other => Err(format!("expected a string, got {}", other)),
        },
        ParamKind::Raw => Ok(ArgValue::Raw(value.clone())),
        ParamKind::Dependency(key) => Err(format!(
            "`{}` is a dependency, not an input value",
            key.type_name()
        )),
    }
}

/// Integers parse directly; decimal strings and numbers are truncated.
/// Values outside the `i64` range are rejected.
fn coerce_int(value: &Value) -> Result<i64, String> {
    let invalid = || format!("`{}` is not an integer", value);
    match value {
        Value::Number(n) => match n.as_i64() {
            Some(i) => Ok(i),
            None => n.as_f64().and_then(truncate_to_i64).ok_or_else(invalid),
        },
        Value::String(s) => {
            let s = s.trim();
            if let Ok(i) = s.parse::<i64>() {
                return Ok(i);
            }
            let has_fraction = s.contains(['.', 'e', 'E']);
            if !has_fraction {
                return Err(invalid());
            }
            s.parse::<f64>()
                .ok()
                .and_then(truncate_to_i64)
                .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

fn truncate_to_i64(f: f64) -> Option<i64> {
    let truncated = f.trunc();
    if !truncated.is_finite() || truncated < i64::MIN as f64 || truncated >= i64::MAX as f64 {
        return None;
    }
    Some(truncated as i64)
}

fn coerce_float(value: &Value) -> Result<f64, String> {
    let invalid = || format!("`{}` is not a number", value);
    match value {
        Value::Number(n) => n.as_f64().ok_or_else(invalid),
        Value::String(s) => s
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .ok_or_else(invalid),
        _ => Err(invalid()),
    }
}

fn coerce_bool(value: &Value) -> Result<bool, String> {
    let invalid = || format!("`{}` is not a boolean", value);
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Number(n) => match n.as_i64() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => Err(invalid()),
        },
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            if TRUTHY.contains(&s.as_str()) {
                Ok(true)
            } else if FALSY.contains(&s.as_str()) {
                Ok(false)
            } else {
                Err(invalid())
            }
        }
        _ => Err(invalid()),
    }
}

/// Arguments resolved for one handler call, in declaration order.
#[derive(Debug, Clone, Default)]
pub struct Args {
    values: Vec<(String, ArgValue)>,
}

impl Args {
    pub(crate) fn push(&mut self, name: String, value: ArgValue) {
        self.values.push((name, value));
    }

    pub fn get(&self, name: &str) -> Option<&ArgValue> {
        self.values
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn require(&self, name: &str) -> Result<&ArgValue, RouterError> {
        self.get(name)
            .ok_or_else(|| RouterError::parameter(name, "not declared by handler"))
    }

    fn mismatch(name: &str, expected: &str) -> RouterError {
        RouterError::parameter(name, format!("argument is not {}", expected))
    }

    pub fn int(&self, name: &str) -> Result<i64, RouterError> {
        match self.require(name)? {
            ArgValue::Int(v) => Ok(*v),
            _ => Err(Self::mismatch(name, "an integer")),
        }
    }

    pub fn float(&self, name: &str) -> Result<f64, RouterError> {
        match self.require(name)? {
            ArgValue::Float(v) => Ok(*v),
            ArgValue::Int(v) => Ok(*v as f64),
            _ => Err(Self::mismatch(name, "a number")),
        }
    }

    pub fn bool(&self, name: &str) -> Result<bool, RouterError> {
        match self.require(name)? {
            ArgValue::Bool(v) => Ok(*v),
            _ => Err(Self::mismatch(name, "a boolean")),
        }
    }

    pub fn str(&self, name: &str) -> Result<&str, RouterError> {
        match self.require(name)? {
            ArgValue::Str(v) => Ok(v),
            ArgValue::Raw(Value::String(v)) => Ok(v),
            _ => Err(Self::mismatch(name, "a string")),
        }
    }

    pub fn raw(&self, name: &str) -> Result<Value, RouterError> {
        Ok(match self.require(name)? {
            ArgValue::Int(v) => Value::from(*v),
            ArgValue::Float(v) => Value::from(*v),
            ArgValue::Bool(v) => Value::from(*v),
            ArgValue::Str(v) => Value::from(v.as_str()),
            ArgValue::Raw(v) => v.clone(),
            ArgValue::Dependency(_) => return Err(Self::mismatch(name, "a value")),
        })
    }

    pub fn dependency<T: Any + Send + Sync>(&self, name: &str) -> Result<Arc<T>, RouterError> {
        match self.require(name)? {
            ArgValue::Dependency(dep) => Arc::clone(dep)
                .downcast::<T>()
                .map_err(|_| Self::mismatch(name, std::any::type_name::<T>())),
            _ => Err(Self::mismatch(name, "a dependency")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_int_coercion() {
        assert!(matches!(coerce(ParamKind::Int, &json!("42")), Ok(ArgValue::Int(42))));
        assert!(matches!(coerce(ParamKind::Int, &json!("-7")), Ok(ArgValue::Int(-7))));
        assert!(matches!(coerce(ParamKind::Int, &json!("3.9")), Ok(ArgValue::Int(3))));
        assert!(matches!(coerce(ParamKind::Int, &json!(12.5)), Ok(ArgValue::Int(12))));
        assert!(coerce(ParamKind::Int, &json!("abc")).is_err());
        assert!(coerce(ParamKind::Int, &json!("")).is_err());
        assert!(coerce(ParamKind::Int, &json!(true)).is_err());
    }

    #[test]
    fn test_int_coercion_rejects_out_of_range() {
        assert!(coerce(ParamKind::Int, &json!("99999999999999999999")).is_err());
        assert!(coerce(ParamKind::Int, &json!("-99999999999999999999")).is_err());
        assert!(coerce(ParamKind::Int, &json!("1e30")).is_err());
        assert!(coerce(ParamKind::Int, &json!(1e30)).is_err());
        assert!(coerce(ParamKind::Int, &json!(u64::MAX)).is_err());
        assert!(matches!(coerce(ParamKind::Int, &json!("2e3")), Ok(ArgValue::Int(2000))));
        assert!(matches!(
            coerce(ParamKind::Int, &json!(i64::MAX.to_string())),
            Ok(ArgValue::Int(i64::MAX))
        ));
    }

    #[test]
    fn test_float_coercion() {
        assert!(matches!(coerce(ParamKind::Float, &json!("2.5")), Ok(ArgValue::Float(f)) if f == 2.5));
        assert!(coerce(ParamKind::Float, &json!("NaN")).is_err());
        assert!(coerce(ParamKind::Float, &json!("one")).is_err());
    }

    #[test]
    fn test_bool_coercion() {
        for truthy in ["1", "true", "TRUE", "Yes", "on"] {
            assert!(matches!(coerce(ParamKind::Bool, &json!(truthy)), Ok(ArgValue::Bool(true))));
        }
        for falsy in ["0", "false", "No", "OFF"] {
            assert!(matches!(coerce(ParamKind::Bool, &json!(falsy)), Ok(ArgValue::Bool(false))));
        }
        assert!(coerce(ParamKind::Bool, &json!("")).is_err());
        assert!(coerce(ParamKind::Bool, &json!("  ")).is_err());
        assert!(coerce(ParamKind::Bool, &json!("maybe")).is_err());
        assert!(coerce(ParamKind::Bool, &json!(2)).is_err());
    }

    #[test]
    fn test_string_and_raw() {
        assert!(matches!(coerce(ParamKind::Str, &json!(5)), Ok(ArgValue::Str(ref s)) if s == "5"));
        assert!(coerce(ParamKind::Str, &json!([1, 2])).is_err());
        assert!(matches!(coerce(ParamKind::Raw, &json!([1, 2])), Ok(ArgValue::Raw(_))));
    }

    #[test]
    fn test_args_accessors() {
        struct Repo(&'static str);

        let mut args = Args::default();
        args.push("id".into(), ArgValue::Int(9));
        args.push("slug".into(), ArgValue::Str("intro".into()));
        args.push("repo".into(), ArgValue::Dependency(Arc::new(Repo("pg"))));

        assert_eq!(args.int("id").unwrap(), 9);
        assert_eq!(args.float("id").unwrap(), 9.0);
        assert_eq!(args.str("slug").unwrap(), "intro");
        assert_eq!(args.dependency::<Repo>("repo").unwrap().0, "pg");

        assert!(args.bool("id").is_err());
        assert!(args.dependency::<String>("repo").is_err());
        assert!(matches!(
            args.int("missing"),
            Err(RouterError::ParameterResolution { .. })
        ));
    }
}
