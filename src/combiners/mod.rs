//! Built-in reducers for `reduce` and `squish`.
//!
//! A [`Reducer`] is a two-argument combine function `f(acc, x)`, where `acc`
//! is `None` for the first value of a group. Faults (type mismatch, overflow)
//! come back as [`ErrorValue`]s, which the calling op turns into stream data.
//!
//! - [`r_plus`], [`r_times`], [`r_max`], [`r_min`], [`r_count`], [`r_concat`]
//! - [`r_and`], [`r_or`], [`r_xor`], [`r_bit_and`], [`r_bit_or`]
//!
//! # Examples
//! ```
//! use ironpipe::prelude::*;
//!
//! let session = Session::new(SessionConfig::default());
//! let out = session.gather(&(generate(5, 1) | reduce(vec![Slot::from(r_plus())])))?;
//! assert_eq!(out, vec![Value::Int(15)]);
//!
//! // A custom reducer: keep the longest string seen so far.
//! let longest = Reducer::new("longest", |acc, x| match acc {
//!     Some(Value::Str(a)) if x.as_str().is_some_and(|s| s.len() <= a.len()) => Ok(Value::Str(a.clone())),
//!     _ => Ok(x.clone()),
//! });
//! # let _ = longest;
//! # Ok::<(), ironpipe::CommandError>(())
//! ```

mod basic;
mod logical;

pub use basic::{r_concat, r_count, r_max, r_min, r_plus, r_times};
pub use logical::{r_and, r_bit_and, r_bit_or, r_or, r_xor};

use crate::value::{ErrorValue, FnResult, Value};
use std::fmt;
use std::sync::Arc;

type CombineFn = dyn Fn(Option<&Value>, &Value) -> FnResult + Send + Sync;

#[derive(Clone)]
pub struct Reducer {
    name: &'static str,
    f: Arc<CombineFn>,
}

impl fmt::Debug for Reducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Reducer({})", self.name)
    }
}

impl Reducer {
    pub fn new<F>(name: &'static str, f: F) -> Self
    where
        F: Fn(Option<&Value>, &Value) -> FnResult + Send + Sync + 'static,
    {
        Self { name, f: Arc::new(f) }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Fold `x` into `acc`.
    ///
    /// # Errors
    /// Whatever fault the combine function reports.
    pub fn combine(&self, acc: Option<&Value>, x: &Value) -> Result<Value, ErrorValue> {
        (self.f)(acc, x)
    }
}
