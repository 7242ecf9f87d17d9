//! Boolean and bitwise reducers.

use super::Reducer;
use crate::value::Value;

/// All values truthy.
pub fn r_and() -> Reducer {
    Reducer::new("r_and", |acc, x| {
        let prior = acc.is_none_or(Value::truthy);
        Ok(Value::Bool(prior && x.truthy()))
    })
}

/// Any value truthy.
pub fn r_or() -> Reducer {
    Reducer::new("r_or", |acc, x| {
        let prior = acc.is_some_and(Value::truthy);
        Ok(Value::Bool(prior || x.truthy()))
    })
}

pub fn r_xor() -> Reducer {
    Reducer::new("r_xor", |acc, x| match acc {
        None => Ok(x.clone()),
        Some(a) => a.bit_xor(x),
    })
}

pub fn r_bit_and() -> Reducer {
    Reducer::new("r_bit_and", |acc, x| match acc {
        None => Ok(x.clone()),
        Some(a) => a.bit_and(x),
    })
}

pub fn r_bit_or() -> Reducer {
    Reducer::new("r_bit_or", |acc, x| match acc {
        None => Ok(x.clone()),
        Some(a) => a.bit_or(x),
    })
}
