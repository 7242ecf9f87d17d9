//! The stream element model.
//!
//! Every op consumes and produces [`Value`]s. A value is either a scalar or a
//! fixed-arity, heterogeneous [`Value::Tuple`]. Per-element faults are a value
//! too ([`Value::Error`]) so that they flow downstream like data instead of
//! terminating the stream.
//!
//! Ops that index fields treat a scalar as a 1-tuple (see [`Value::fields`]);
//! the reverse convention applies on output, where a 1-tuple is unwrapped to
//! its member (see [`Value::from_fields`]).

use crate::cluster::Host;
use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A per-element fault.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ErrorValue {
    /// Human-readable message.
    pub message: String,
    /// Description of the originating fault, when one is available.
    pub origin: Option<String>,
    /// The remote host the fault was raised on.
    pub host: Option<Host>,
}

impl ErrorValue {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            origin: None,
            host: None,
        }
    }

    #[must_use]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    #[must_use]
    pub fn on_host(mut self, host: Host) -> Self {
        self.host = Some(host);
        self
    }
}

impl fmt::Display for ErrorValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.host {
            Some(host) => write!(f, "Error({host}: {})", self.message),
            None => write!(f, "Error({})", self.message),
        }
    }
}

impl std::error::Error for ErrorValue {}

/// Outcome of a function applied to stream values.
pub type FnResult = Result<Value, ErrorValue>;

/// A stream element.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(#[serde(with = "float_repr")] OrderedFloat<f64>),
    Str(String),
    /// Ordered, fixed-arity composite. Hashable when its members are.
    Tuple(Vec<Value>),
    /// Ordered, growable composite. Never hashable.
    List(Vec<Value>),
    Host(Host),
    Error(ErrorValue),
}

/// Non-finite floats travel as the strings `"inf"`, `"-inf"` and `"nan"`,
/// since JSON has no literal for them.
mod float_repr {
    use ordered_float::OrderedFloat;
    use serde::de::Error as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(x: &OrderedFloat<f64>, s: S) -> Result<S::Ok, S::Error> {
        let x = x.into_inner();
        if x.is_nan() {
            s.serialize_str("nan")
        } else if x.is_infinite() {
            s.serialize_str(if x > 0.0 { "inf" } else { "-inf" })
        } else {
            s.serialize_f64(x)
        }
    }

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Repr {
        Num(f64),
        Word(String),
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<OrderedFloat<f64>, D::Error> {
        let x = match Repr::deserialize(d)? {
            Repr::Num(x) => x,
            Repr::Word(w) => match w.as_str() {
                "nan" => f64::NAN,
                "inf" => f64::INFINITY,
                "-inf" => f64::NEG_INFINITY,
                other => return Err(D::Error::custom(format!("invalid float {other:?}"))),
            },
        };
        Ok(OrderedFloat(x))
    }
}

impl Value {
    pub fn tuple(fields: impl IntoIterator<Item = Value>) -> Value {
        Value::Tuple(fields.into_iter().collect())
    }

    pub fn list(items: impl IntoIterator<Item = Value>) -> Value {
        Value::List(items.into_iter().collect())
    }

    pub fn float(x: f64) -> Value {
        Value::Float(OrderedFloat(x))
    }

    pub fn error(message: impl Into<String>) -> Value {
        Value::Error(ErrorValue::new(message))
    }

    /// Builds an output element: one field is emitted as that field, anything
    /// else as a tuple.
    pub fn from_fields(mut fields: Vec<Value>) -> Value {
        if fields.len() == 1 {
            fields.pop().unwrap_or(Value::Null)
        } else {
            Value::Tuple(fields)
        }
    }

    /// View of this element's fields. A scalar is its own single field.
    pub fn fields(&self) -> &[Value] {
        match self {
            Value::Tuple(fields) => fields,
            other => std::slice::from_ref(other),
        }
    }

    pub fn into_fields(self) -> Vec<Value> {
        match self {
            Value::Tuple(fields) => fields,
            other => vec![other],
        }
    }

    /// Unwraps a 1-tuple to its member; other values are returned unchanged.
    pub fn unwrap_singleton(self) -> Value {
        match self {
            Value::Tuple(mut fields) if fields.len() == 1 => fields.pop().unwrap_or(Value::Null),
            other => other,
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Name of the value's kind, used in messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Str(_) => "str",
            Value::Tuple(_) => "tuple",
            Value::List(_) => "list",
            Value::Host(_) => "host",
            Value::Error(_) => "error",
        }
    }

    pub fn truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Int(i) => *i != 0,
            Value::Float(x) => x.0 != 0.0,
            Value::Str(s) => !s.is_empty(),
            Value::Tuple(v) | Value::List(v) => !v.is_empty(),
            Value::Host(_) => true,
            Value::Error(_) => false,
        }
    }

    /// Checks that this value can be used as a hash key. Lists (at any depth)
    /// and errors cannot; the offending value is returned rendered.
    pub fn check_hashable(&self) -> Result<(), String> {
        match self {
            Value::List(_) | Value::Error(_) => Err(format!("{self} ({})", self.kind())),
            Value::Tuple(fields) => fields.iter().try_for_each(Value::check_hashable),
            _ => Ok(()),
        }
    }

    /// Ordering between comparable values. Ints and floats compare numerically;
    /// strings, bools, hosts and tuples compare within their kind.
    pub fn partial_compare(&self, other: &Value) -> Option<Ordering> {
        match (self, other) {
            (Value::Null, Value::Null) => Some(Ordering::Equal),
            (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
            (Value::Float(a), Value::Float(b)) => Some(a.cmp(b)),
            (Value::Int(a), Value::Float(b)) => OrderedFloat(*a as f64).partial_cmp(b),
            (Value::Float(a), Value::Int(b)) => a.partial_cmp(&OrderedFloat(*b as f64)),
            (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
            (Value::Host(a), Value::Host(b)) => Some(a.cmp(b)),
            (Value::Tuple(a), Value::Tuple(b)) | (Value::List(a), Value::List(b)) => {
                for (x, y) in a.iter().zip(b.iter()) {
                    match x.partial_compare(y)? {
                        Ordering::Equal => continue,
                        unequal => return Some(unequal),
                    }
                }
                Some(a.len().cmp(&b.len()))
            }
            _ => None,
        }
    }

    /// Like [`Value::partial_compare`], with a fault for incomparable kinds.
    pub fn compare(&self, other: &Value) -> Result<Ordering, ErrorValue> {
        self.partial_compare(other).ok_or_else(|| {
            ErrorValue::new(format!(
                "'<' not supported between {} and {}",
                self.kind(),
                other.kind()
            ))
        })
    }
}

/* ===================== Arithmetic ===================== */

fn unsupported(op: &str, a: &Value, b: &Value) -> ErrorValue {
    ErrorValue::new(format!(
        "unsupported operand kinds for {op}: {} and {}",
        a.kind(),
        b.kind()
    ))
}

fn overflow() -> ErrorValue {
    ErrorValue::new("integer overflow")
}

/// Floor division for i64 (unlike `/` which truncates toward zero).
#[inline]
fn div_floor(a: i64, b: i64) -> i64 {
    let q = a / b;
    let r = a % b;
    if (r != 0) && ((r > 0) != (b > 0)) { q - 1 } else { q }
}

fn as_f64(v: &Value) -> Option<f64> {
    match v {
        Value::Int(i) => Some(*i as f64),
        Value::Float(x) => Some(x.0),
        _ => None,
    }
}

impl Value {
    pub fn add(&self, other: &Value) -> FnResult {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.checked_add(*b).map(Value::Int).ok_or_else(overflow),
            (Value::Str(a), Value::Str(b)) => Ok(Value::Str(format!("{a}{b}"))),
            (Value::Tuple(a), Value::Tuple(b)) => Ok(Value::tuple(a.iter().chain(b).cloned())),
            (Value::List(a), Value::List(b)) => Ok(Value::list(a.iter().chain(b).cloned())),
            (a, b) => match (as_f64(a), as_f64(b)) {
                (Some(x), Some(y)) => Ok(Value::float(x + y)),
                _ => Err(unsupported("+", a, b)),
            },
        }
    }

    pub fn sub(&self, other: &Value) -> FnResult {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.checked_sub(*b).map(Value::Int).ok_or_else(overflow),
            (a, b) => match (as_f64(a), as_f64(b)) {
                (Some(x), Some(y)) => Ok(Value::float(x - y)),
                _ => Err(unsupported("-", a, b)),
            },
        }
    }

    pub fn mul(&self, other: &Value) -> FnResult {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => a.checked_mul(*b).map(Value::Int).ok_or_else(overflow),
            (a, b) => match (as_f64(a), as_f64(b)) {
                (Some(x), Some(y)) => Ok(Value::float(x * y)),
                _ => Err(unsupported("*", a, b)),
            },
        }
    }

    /// True division; always produces a float.
    pub fn div(&self, other: &Value) -> FnResult {
        match (as_f64(self), as_f64(other)) {
            (Some(_), Some(y)) if y == 0.0 => Err(ErrorValue::new("division by zero")),
            (Some(x), Some(y)) => Ok(Value::float(x / y)),
            _ => Err(unsupported("/", self, other)),
        }
    }

    pub fn floor_div(&self, other: &Value) -> FnResult {
        match (self, other) {
            (Value::Int(_), Value::Int(0)) => Err(ErrorValue::new("division by zero")),
            (Value::Int(a), Value::Int(b)) => {
                if *a == i64::MIN && *b == -1 {
                    Err(overflow())
                } else {
                    Ok(Value::Int(div_floor(*a, *b)))
                }
            }
            (a, b) => match (as_f64(a), as_f64(b)) {
                (Some(_), Some(y)) if y == 0.0 => Err(ErrorValue::new("division by zero")),
                (Some(x), Some(y)) => Ok(Value::float((x / y).floor())),
                _ => Err(unsupported("//", a, b)),
            },
        }
    }

    /// Modulo with the sign of the divisor.
    pub fn rem(&self, other: &Value) -> FnResult {
        match (self, other) {
            (Value::Int(_), Value::Int(0)) => Err(ErrorValue::new("division by zero")),
            (Value::Int(a), Value::Int(b)) => {
                let r = a.checked_rem(*b).ok_or_else(overflow)?;
                Ok(Value::Int(if r != 0 && ((r < 0) != (*b < 0)) { r + b } else { r }))
            }
            (a, b) => match (as_f64(a), as_f64(b)) {
                (Some(_), Some(y)) if y == 0.0 => Err(ErrorValue::new("division by zero")),
                (Some(x), Some(y)) => Ok(Value::float(x - y * (x / y).floor())),
                _ => Err(unsupported("%", a, b)),
            },
        }
    }

    pub fn neg(&self) -> FnResult {
        match self {
            Value::Int(a) => a.checked_neg().map(Value::Int).ok_or_else(overflow),
            Value::Float(x) => Ok(Value::float(-x.0)),
            other => Err(ErrorValue::new(format!("bad operand kind for unary -: {}", other.kind()))),
        }
    }

    pub fn bit_and(&self, other: &Value) -> FnResult {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a & b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a & b)),
            (a, b) => Err(unsupported("&", a, b)),
        }
    }

    pub fn bit_or(&self, other: &Value) -> FnResult {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a | b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a | b)),
            (a, b) => Err(unsupported("|", a, b)),
        }
    }

    pub fn bit_xor(&self, other: &Value) -> FnResult {
        match (self, other) {
            (Value::Int(a), Value::Int(b)) => Ok(Value::Int(a ^ b)),
            (Value::Bool(a), Value::Bool(b)) => Ok(Value::Bool(a ^ b)),
            (a, b) => Err(unsupported("^", a, b)),
        }
    }
}

/* ===================== Conversions ===================== */

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(i64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Str(v)
    }
}

impl From<Host> for Value {
    fn from(v: Host) -> Self {
        Value::Host(v)
    }
}

impl From<ErrorValue> for Value {
    fn from(v: ErrorValue) -> Self {
        Value::Error(v)
    }
}

impl From<Vec<Value>> for Value {
    fn from(v: Vec<Value>) -> Self {
        Value::Tuple(v)
    }
}

/* ===================== Rendering ===================== */

fn write_seq(f: &mut fmt::Formatter<'_>, items: &[Value], open: &str, close: &str) -> fmt::Result {
    f.write_str(open)?;
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            f.write_str(", ")?;
        }
        match item {
            Value::Str(s) => write!(f, "'{s}'")?,
            other => write!(f, "{other}")?,
        }
    }
    f.write_str(close)
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("None"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Int(i) => write!(f, "{i}"),
            Value::Float(x) => write!(f, "{:?}", x.0),
            Value::Str(s) => f.write_str(s),
            Value::Tuple(fields) if fields.len() == 1 => write_seq(f, fields, "(", ",)"),
            Value::Tuple(fields) => write_seq(f, fields, "(", ")"),
            Value::List(items) => write_seq(f, items, "[", "]"),
            Value::Host(h) => write!(f, "{h}"),
            Value::Error(e) => write!(f, "{e}"),
        }
    }
}
