//! Op parameters and the function values ops are configured with.
//!
//! A [`Param`] is a literal, a name looked up in the environment, or a
//! deferred zero-argument function. Whatever the form, it is resolved exactly
//! once, in the owning op's `setup`, and type/range-checked there, so a bad
//! value is a fatal configuration error rather than a per-element fault.

use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::value::{ErrorValue, FnResult, Value};
use std::fmt;
use std::sync::Arc;

/// Element transform used by `map` and friends.
pub type MapFn = Arc<dyn Fn(&Value) -> FnResult + Send + Sync>;

/// Element predicate used by `select`, `window`, `ifthen` and `ifelse`.
pub type PredFn = Arc<dyn Fn(&Value) -> std::result::Result<bool, ErrorValue> + Send + Sync>;

/// Zero-argument function evaluated against the environment during setup.
pub type DeferredFn = Arc<dyn Fn(&Env) -> FnResult + Send + Sync>;

#[derive(Clone)]
pub enum Param {
    Literal(Value),
    Var(String),
    Deferred(DeferredFn),
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Param::Literal(v) => write!(f, "Literal({v})"),
            Param::Var(name) => write!(f, "Var({name})"),
            Param::Deferred(_) => f.write_str("Deferred(..)"),
        }
    }
}

impl Param {
    pub fn var(name: impl Into<String>) -> Param {
        Param::Var(name.into())
    }

    pub fn deferred<F>(f: F) -> Param
    where
        F: Fn(&Env) -> FnResult + Send + Sync + 'static,
    {
        Param::Deferred(Arc::new(f))
    }

    /// Resolve to a value. `what` names the parameter in messages.
    ///
    /// # Errors
    /// An unbound variable, or a deferred function that faults.
    pub fn resolve(&self, env: &Env, what: &str) -> Result<Value> {
        match self {
            Param::Literal(v) => Ok(v.clone()),
            Param::Var(name) => env
                .lookup(name)
                .ok_or_else(|| CommandError::invalid(format!("{what}: {name} is not defined"))),
            Param::Deferred(f) => {
                f(env).map_err(|e| CommandError::invalid(format!("{what}: {}", e.message)))
            }
        }
    }

    /// Resolve to an integer. Strings that parse as integers are accepted.
    ///
    /// # Errors
    /// "`what` must be an int" for other kinds, "`what` cannot be converted
    /// to int" for strings that don't parse.
    pub fn resolve_int(&self, env: &Env, what: &str) -> Result<i64> {
        match self.resolve(env, what)? {
            Value::Int(i) => Ok(i),
            Value::Str(s) => s
                .trim()
                .parse::<i64>()
                .map_err(|_| CommandError::invalid(format!("{what} cannot be converted to int"))),
            _ => Err(CommandError::invalid(format!("{what} must be an int"))),
        }
    }

    /// # Errors
    /// As [`Param::resolve_int`], plus "`what` must be non-negative".
    pub fn resolve_usize(&self, env: &Env, what: &str) -> Result<usize> {
        let i = self.resolve_int(env, what)?;
        usize::try_from(i).map_err(|_| CommandError::invalid(format!("{what} must be non-negative")))
    }

    /// # Errors
    /// "`what` must be a string" for non-string values.
    pub fn resolve_str(&self, env: &Env, what: &str) -> Result<String> {
        match self.resolve(env, what)? {
            Value::Str(s) => Ok(s),
            _ => Err(CommandError::invalid(format!("{what} must be a string"))),
        }
    }
}

impl From<Value> for Param {
    fn from(v: Value) -> Self {
        Param::Literal(v)
    }
}

impl From<i64> for Param {
    fn from(v: i64) -> Self {
        Param::Literal(Value::Int(v))
    }
}

impl From<i32> for Param {
    fn from(v: i32) -> Self {
        Param::Literal(Value::from(v))
    }
}

impl From<bool> for Param {
    fn from(v: bool) -> Self {
        Param::Literal(Value::Bool(v))
    }
}

impl From<&str> for Param {
    fn from(v: &str) -> Self {
        Param::Literal(Value::from(v))
    }
}

impl From<String> for Param {
    fn from(v: String) -> Self {
        Param::Literal(Value::Str(v))
    }
}
