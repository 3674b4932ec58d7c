//! Runtime values produced by generators and inspected by guards.
//!
//! `Value` is JSON plus the two things JSON cannot say: an explicit absent
//! marker (`Undefined`) and opaque callables (`Function`). Conversion to
//! `serde_json::Value` follows `JSON.stringify`: absent or callable object
//! members are dropped, absent or callable array slots become `null`.
use std::collections::hash_map::DefaultHasher;
use std::fmt;
use std::hash::{Hash, Hasher};

use indexmap::IndexMap;
use proptest::strategy::{Strategy, ValueTree};
use proptest::test_runner::{Config, TestRunner};
use serde::{Serialize, Serializer};

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Value {
    #[default]
    Undefined,
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Array(Vec<Value>),
    Object(IndexMap<String, Value>),
    Function(Callable),
}

/// An opaque, deterministic function value.
///
/// The output for a given argument list is fixed by the seed, so the same
/// callable answers the same way every time it is asked.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Callable {
    seed: u64,
}

// ------------------------------- Callable --------------------------------- //

impl Callable {
    pub fn new(seed: u64) -> Self { Self { seed } }

    pub fn seed(&self) -> u64 { self.seed }

    pub fn call(&self, args: &[Value]) -> Value {
        let mut h = DefaultHasher::new();
        self.seed.hash(&mut h);
        for arg in args {
            arg.to_string().hash(&mut h);
            0xFFu8.hash(&mut h);
        }
        let rng = crate::algebra::seeded_rng(h.finish());
        let mut runner = TestRunner::new_with_rng(Config::default(), rng);
        // the json generator has no filters, so drawing cannot be rejected
        crate::algebra::json(crate::algebra::JSON_DEPTH)
            .new_tree(&mut runner)
            .map(|tree| tree.current())
            .unwrap_or(Value::Null)
    }
}

// -------------------------------- Access ---------------------------------- //

impl Value {
    pub fn is_undefined(&self) -> bool { matches!(self, Value::Undefined) }

    pub fn as_array(&self) -> Option<&Vec<Value>> {
        match self {
            Value::Array(xs) => Some(xs),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&IndexMap<String, Value>> {
        match self {
            Value::Object(map) => Some(map),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Undefined => "undefined",
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Number(_) => "number",
            Value::String(_) => "string",
            Value::Array(_) => "array",
            Value::Object(_) => "object",
            Value::Function(_) => "function",
        }
    }

    /// Member lookup where a missing key reads as `Undefined`.
    pub fn member(&self, key: &str) -> &Value {
        static ABSENT: Value = Value::Undefined;
        match self {
            Value::Object(map) => map.get(key).unwrap_or(&ABSENT),
            _ => &ABSENT,
        }
    }
}

// ------------------------------ JSON bridge ------------------------------- //

impl Value {
    pub fn to_json(&self) -> serde_json::Value {
        use serde_json::Value as J;
        match self {
            Value::Undefined | Value::Null | Value::Function(_) => J::Null,
            Value::Bool(b) => J::Bool(*b),
            Value::Number(n) => serde_json::Number::from_f64(*n).map(J::Number).unwrap_or(J::Null),
            Value::String(s) => J::String(s.clone()),
            Value::Array(xs) => J::Array(xs.iter().map(Value::to_json).collect()),
            Value::Object(map) => J::Object(
                map.iter()
                    .filter(|(_, v)| !matches!(v, Value::Undefined | Value::Function(_)))
                    .map(|(k, v)| (k.clone(), v.to_json()))
                    .collect(),
            ),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(v: serde_json::Value) -> Self {
        use serde_json::Value as J;
        match v {
            J::Null => Value::Null,
            J::Bool(b) => Value::Bool(b),
            J::Number(n) => Value::Number(n.as_f64().unwrap_or(f64::NAN)),
            J::String(s) => Value::String(s),
            J::Array(xs) => Value::Array(xs.into_iter().map(Value::from).collect()),
            J::Object(map) => Value::Object(map.into_iter().map(|(k, v)| (k, Value::from(v))).collect()),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self { Value::Bool(b) }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self { Value::Number(n) }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self { Value::String(s.to_string()) }
}

impl From<String> for Value {
    fn from(s: String) -> Self { Value::String(s) }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

// ------------------------------- Display ---------------------------------- //

/// Compact JSON-ish rendering that keeps `undefined` and callables visible,
/// used for counterexample reports.
impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Number(n) => write!(f, "{n}"),
            Value::String(s) => write!(f, "{}", serde_json::Value::String(s.clone())),
            Value::Array(xs) => {
                f.write_str("[")?;
                for (i, x) in xs.iter().enumerate() {
                    if i > 0 { f.write_str(",")?; }
                    write!(f, "{x}")?;
                }
                f.write_str("]")
            }
            Value::Object(map) => {
                f.write_str("{")?;
                for (i, (k, v)) in map.iter().enumerate() {
                    if i > 0 { f.write_str(",")?; }
                    write!(f, "{}:{v}", serde_json::Value::String(k.clone()))?;
                }
                f.write_str("}")
            }
            Value::Function(c) => write!(f, "<function#{:x}>", c.seed),
        }
    }
}

// ------------------------------- Tests ------------------------------------ //
