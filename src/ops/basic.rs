//! Element-wise transforms and the simple collectors.
//!
//! Everything here is a thin op over one closure or a small buffer; the
//! engines with real state live in their own modules.

use crate::combiners::Reducer;
use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::node::{Emit, Flow, Op, OpSpec};
use crate::param::{MapFn, Param, PredFn};
use crate::pipeline::Pipeline;
use crate::value::{ErrorValue, FnResult, Value};
use std::cmp::Ordering;
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;

/// Emit each element of `xs`, stopping early when downstream asks.
pub(crate) fn emit_all(xs: impl IntoIterator<Item = Value>, out: &mut dyn Emit) -> Result<Flow> {
    for x in xs {
        if out.emit(x)?.is_stop() {
            return Ok(Flow::Stop);
        }
    }
    Ok(Flow::Continue)
}

/// Declare a spec whose op is built by `$make` from a clone of the spec.
macro_rules! simple_spec {
    ($spec:ident, $name:literal, |$s:ident| $make:expr) => {
        impl OpSpec for $spec {
            fn name(&self) -> &'static str {
                $name
            }

            fn instantiate(&self) -> Box<dyn Op> {
                let $s = self;
                Box::new($make)
            }
        }
    };
}

/* ===================== map / select ===================== */

pub fn map<F>(f: F) -> Pipeline
where
    F: Fn(&Value) -> FnResult + Send + Sync + 'static,
{
    Pipeline::of(MapSpec { f: Arc::new(f) })
}

struct MapSpec {
    f: MapFn,
}
simple_spec!(MapSpec, "map", |s| MapOp { f: Arc::clone(&s.f) });

struct MapOp {
    f: MapFn,
}

impl Op for MapOp {
    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        match (self.f)(&x) {
            Ok(y) => out.emit(y),
            Err(e) => out.emit(Value::Error(e)),
        }
    }
}

pub fn select<F>(pred: F) -> Pipeline
where
    F: Fn(&Value) -> std::result::Result<bool, ErrorValue> + Send + Sync + 'static,
{
    Pipeline::of(SelectSpec { pred: Arc::new(pred) })
}

struct SelectSpec {
    pred: PredFn,
}
simple_spec!(SelectSpec, "select", |s| SelectOp { pred: Arc::clone(&s.pred) });

struct SelectOp {
    pred: PredFn,
}

impl Op for SelectOp {
    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        match (self.pred)(&x) {
            Ok(true) => out.emit(x),
            Ok(false) => Ok(Flow::Continue),
            Err(e) => out.emit(Value::Error(e)),
        }
    }
}

/* ===================== head / tail ===================== */

/// First `n` elements; a negative `n` skips the first `|n|` instead.
pub fn head(n: impl Into<Param>) -> Pipeline {
    Pipeline::of(HeadSpec { n: n.into() })
}

struct HeadSpec {
    n: Param,
}
simple_spec!(HeadSpec, "head", |s| HeadOp { n: s.n.clone(), limit: 0, seen: 0 });

struct HeadOp {
    n: Param,
    limit: i64,
    seen: u64,
}

fn nonzero(p: &Param, env: &Env, op: &str) -> Result<i64> {
    let n = p.resolve_int(env, "n")?;
    if n == 0 {
        return Err(CommandError::invalid(format!("{op}: n must not be 0")));
    }
    Ok(n)
}

impl Op for HeadOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        self.limit = nonzero(&self.n, env, "head")?;
        Ok(())
    }

    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        self.seen += 1;
        if self.limit > 0 {
            let flow = out.emit(x)?;
            if self.seen >= self.limit.unsigned_abs() {
                return Ok(Flow::Stop);
            }
            Ok(flow)
        } else if self.seen > self.limit.unsigned_abs() {
            out.emit(x)
        } else {
            Ok(Flow::Continue)
        }
    }
}

/// Last `n` elements; a negative `n` drops the last `|n|` instead.
pub fn tail(n: impl Into<Param>) -> Pipeline {
    Pipeline::of(TailSpec { n: n.into() })
}

struct TailSpec {
    n: Param,
}
simple_spec!(TailSpec, "tail", |s| TailOp { n: s.n.clone(), limit: 0, buf: VecDeque::new() });

struct TailOp {
    n: Param,
    limit: i64,
    buf: VecDeque<Value>,
}

impl Op for TailOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        self.limit = nonzero(&self.n, env, "tail")?;
        Ok(())
    }

    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        let width = usize::try_from(self.limit.unsigned_abs()).unwrap_or(usize::MAX);
        self.buf.push_back(x);
        if self.buf.len() > width {
            let oldest = self.buf.pop_front().unwrap_or(Value::Null);
            if self.limit < 0 {
                return out.emit(oldest);
            }
        }
        Ok(Flow::Continue)
    }

    fn flush(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        let kept = std::mem::take(&mut self.buf);
        if self.limit > 0 {
            emit_all(kept, out)
        } else {
            Ok(Flow::Continue)
        }
    }
}

/* ===================== reverse / sort ===================== */

pub fn reverse() -> Pipeline {
    Pipeline::of(ReverseSpec)
}

struct ReverseSpec;
simple_spec!(ReverseSpec, "reverse", |_s| ReverseOp { buf: Vec::new() });

struct ReverseOp {
    buf: Vec<Value>,
}

impl Op for ReverseOp {
    fn receive(&mut self, x: Value, _out: &mut dyn Emit) -> Result<Flow> {
        self.buf.push(x);
        Ok(Flow::Continue)
    }

    fn flush(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        emit_all(std::mem::take(&mut self.buf).into_iter().rev(), out)
    }
}

/// Sort the whole stream by element value. Incomparable elements are fatal.
pub fn sort() -> Pipeline {
    Pipeline::of(SortSpec { key: None })
}

/// Sort the whole stream by `key(element)`. An element whose key cannot be
/// computed is passed on as an error and left out of the sort.
pub fn sort_by<F>(key: F) -> Pipeline
where
    F: Fn(&Value) -> FnResult + Send + Sync + 'static,
{
    Pipeline::of(SortSpec { key: Some(Arc::new(key)) })
}

struct SortSpec {
    key: Option<MapFn>,
}
simple_spec!(SortSpec, "sort", |s| SortOp { key: s.key.clone(), rows: Vec::new() });

struct SortOp {
    key: Option<MapFn>,
    rows: Vec<(Value, Value)>,
}

impl Op for SortOp {
    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        let k = match &self.key {
            Some(f) => match f(&x) {
                Ok(k) => k,
                Err(e) => return out.emit(Value::Error(e)),
            },
            None => x.clone(),
        };
        self.rows.push((k, x));
        Ok(Flow::Continue)
    }

    fn flush(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        let mut rows = std::mem::take(&mut self.rows);
        let mut fault: Option<ErrorValue> = None;
        rows.sort_by(|(a, _), (b, _)| match a.compare(b) {
            Ok(ord) => ord,
            Err(e) => {
                fault.get_or_insert(e);
                Ordering::Equal
            }
        });
        if let Some(e) = fault {
            return Err(CommandError::invalid(e.message));
        }
        emit_all(rows.into_iter().map(|(_, x)| x), out)
    }
}

/* ===================== unique ===================== */

pub fn unique() -> Pipeline {
    Pipeline::of(UniqueSpec { consecutive: false })
}

/// Drop elements equal to their predecessor.
pub fn unique_consecutive() -> Pipeline {
    Pipeline::of(UniqueSpec { consecutive: true })
}

struct UniqueSpec {
    consecutive: bool,
}
simple_spec!(UniqueSpec, "unique", |s| UniqueOp {
    consecutive: s.consecutive,
    seen: HashSet::new(),
    last: None,
});

struct UniqueOp {
    consecutive: bool,
    seen: HashSet<Value>,
    last: Option<Value>,
}

impl Op for UniqueOp {
    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        if self.consecutive {
            if self.last.as_ref() == Some(&x) {
                return Ok(Flow::Continue);
            }
            self.last = Some(x.clone());
            return out.emit(x);
        }
        if let Err(what) = x.check_hashable() {
            return out.emit(Value::error(format!("{what} is not hashable")));
        }
        if self.seen.insert(x.clone()) {
            out.emit(x)
        } else {
            Ok(Flow::Continue)
        }
    }
}

/* ===================== expand / squish ===================== */

/// Flatten composites into separate rows.
///
/// Without a position, a multi-field tuple becomes one row per field and a
/// single composite field becomes one row per member. With a position, the
/// composite at that field is expanded and the other fields are repeated on
/// every row.
pub fn expand(position: Option<usize>) -> Pipeline {
    Pipeline::of(ExpandSpec { position })
}

struct ExpandSpec {
    position: Option<usize>,
}
simple_spec!(ExpandSpec, "expand", |s| ExpandOp { position: s.position });

struct ExpandOp {
    position: Option<usize>,
}

fn members(v: &Value) -> Option<&[Value]> {
    match v {
        Value::Tuple(items) | Value::List(items) => Some(items),
        _ => None,
    }
}

impl Op for ExpandOp {
    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        match self.position {
            None => {
                let fields = x.into_fields();
                if fields.len() > 1 {
                    return emit_all(fields, out);
                }
                let single = fields.into_iter().next().unwrap_or(Value::Null);
                match members(&single) {
                    Some(items) => emit_all(items.to_vec(), out),
                    None => out.emit(single),
                }
            }
            Some(pos) => {
                let Some(items) = x.fields().get(pos).and_then(members) else {
                    return out.emit(x);
                };
                let rows: Vec<Value> = items
                    .iter()
                    .map(|item| {
                        let mut row = x.fields().to_vec();
                        row[pos] = item.clone();
                        Value::from_fields(row)
                    })
                    .collect();
                emit_all(rows, out)
            }
        }
    }
}

/// Fold the fields of each element with `reducer`.
pub fn squish(reducer: Reducer) -> Pipeline {
    Pipeline::of(SquishSpec { reducer })
}

struct SquishSpec {
    reducer: Reducer,
}
simple_spec!(SquishSpec, "squish", |s| SquishOp { reducer: s.reducer.clone() });

struct SquishOp {
    reducer: Reducer,
}

impl Op for SquishOp {
    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        let mut acc: Option<Value> = None;
        for field in x.fields() {
            match self.reducer.combine(acc.as_ref(), field) {
                Ok(v) => acc = Some(v),
                Err(e) => return out.emit(Value::Error(e)),
            }
        }
        out.emit(acc.unwrap_or(Value::Null))
    }
}
