//! Arithmetic and collecting reducers.

use super::Reducer;
use crate::value::Value;
use std::cmp::Ordering;

/* ===================== sum / product ===================== */

pub fn r_plus() -> Reducer {
    Reducer::new("r_plus", |acc, x| match acc {
        None => Ok(x.clone()),
        Some(a) => a.add(x),
    })
}

pub fn r_times() -> Reducer {
    Reducer::new("r_times", |acc, x| match acc {
        None => Ok(x.clone()),
        Some(a) => a.mul(x),
    })
}

/* ===================== extrema ===================== */

/// Larger of the accumulator and `x`; the earlier value wins ties.
pub fn r_max() -> Reducer {
    Reducer::new("r_max", |acc, x| match acc {
        None => Ok(x.clone()),
        Some(a) => Ok(match x.compare(a)? {
            Ordering::Greater => x.clone(),
            _ => a.clone(),
        }),
    })
}

/// Smaller of the accumulator and `x`; the earlier value wins ties.
pub fn r_min() -> Reducer {
    Reducer::new("r_min", |acc, x| match acc {
        None => Ok(x.clone()),
        Some(a) => Ok(match x.compare(a)? {
            Ordering::Less => x.clone(),
            _ => a.clone(),
        }),
    })
}

/* ===================== count / concat ===================== */

pub fn r_count() -> Reducer {
    Reducer::new("r_count", |acc, _x| match acc {
        None => Ok(Value::Int(1)),
        Some(n) => n.add(&Value::Int(1)),
    })
}

/// Collect values into a list, in arrival order.
pub fn r_concat() -> Reducer {
    Reducer::new("r_concat", |acc, x| match acc {
        Some(Value::List(items)) => {
            let mut items = items.clone();
            items.push(x.clone());
            Ok(Value::List(items))
        }
        _ => Ok(Value::list([x.clone()])),
    })
}
