//! Grouped and incremental aggregation.
//!
//! `reduce` is configured with one [`Slot`] per leading field of its input.
//! Grouping slots form the key; accumulation slots fold their field into
//! per-key state with a [`Reducer`]. Groups are reported in first-seen order.

use crate::combiners::Reducer;
use crate::error::Result;
use crate::node::{Emit, Flow, Op, OpSpec};
use crate::ops::basic::emit_all;
use crate::pipeline::Pipeline;
use crate::value::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Role of one input field.
#[derive(Clone, Debug)]
pub enum Slot {
    /// Part of the grouping key.
    Group,
    /// Folded into the group's state.
    Fold(Reducer),
}

impl Slot {
    pub fn group() -> Slot {
        Slot::Group
    }
}

impl From<Reducer> for Slot {
    fn from(r: Reducer) -> Self {
        Slot::Fold(r)
    }
}

/// Emit one row per group at completion, fields in slot order.
pub fn reduce(slots: Vec<Slot>) -> Pipeline {
    Pipeline::of(ReduceSpec {
        slots: slots.into(),
        incremental: false,
    })
}

/// After every input row, emit its key fields followed by the group's current
/// accumulated values.
pub fn reduce_incremental(slots: Vec<Slot>) -> Pipeline {
    Pipeline::of(ReduceSpec {
        slots: slots.into(),
        incremental: true,
    })
}

struct ReduceSpec {
    slots: Arc<[Slot]>,
    incremental: bool,
}

impl OpSpec for ReduceSpec {
    fn name(&self) -> &'static str {
        "reduce"
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(ReduceOp {
            slots: Arc::clone(&self.slots),
            incremental: self.incremental,
            state: HashMap::new(),
            order: Vec::new(),
        })
    }
}

struct ReduceOp {
    slots: Arc<[Slot]>,
    incremental: bool,
    /// Accumulators per key, one per `Fold` slot.
    state: HashMap<Vec<Value>, Vec<Option<Value>>>,
    order: Vec<Vec<Value>>,
}

impl ReduceOp {
    fn folds(&self) -> usize {
        self.slots.iter().filter(|s| matches!(s, Slot::Fold(_))).count()
    }

    /// Fold one row. `Err` carries the per-row fault to emit instead.
    fn update(&mut self, fields: &[Value]) -> std::result::Result<Vec<Value>, Value> {
        if fields.len() < self.slots.len() {
            return Err(Value::error("too short"));
        }
        let key: Vec<Value> = self
            .slots
            .iter()
            .zip(fields)
            .filter(|(s, _)| matches!(s, Slot::Group))
            .map(|(_, f)| f.clone())
            .collect();
        if let Some(what) = key.iter().find_map(|k| k.check_hashable().err()) {
            return Err(Value::error(format!("{what} is not hashable")));
        }

        let prior = self.state.get(&key);
        let mut next = Vec::with_capacity(self.folds());
        for (slot, field) in self.slots.iter().zip(fields) {
            if let Slot::Fold(r) = slot {
                let acc = prior.and_then(|accs| accs[next.len()].as_ref());
                next.push(Some(r.combine(acc, field).map_err(Value::Error)?));
            }
        }

        if !self.state.contains_key(&key) {
            self.order.push(key.clone());
        }
        let current: Vec<Value> = next.iter().flatten().cloned().collect();
        self.state.insert(key.clone(), next);
        Ok(key.into_iter().chain(current).collect())
    }

    fn summary(&self, key: &[Value]) -> Value {
        let accs = self.state.get(key).map(Vec::as_slice).unwrap_or_default();
        let (mut k, mut a) = (key.iter(), accs.iter());
        let row = self
            .slots
            .iter()
            .map(|s| match s {
                Slot::Group => k.next().cloned().unwrap_or(Value::Null),
                Slot::Fold(_) => a.next().cloned().flatten().unwrap_or(Value::Null),
            })
            .collect();
        Value::from_fields(row)
    }
}

impl Op for ReduceOp {
    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        match self.update(x.fields()) {
            Ok(row) if self.incremental => out.emit(Value::from_fields(row)),
            Ok(_) => Ok(Flow::Continue),
            Err(fault) => out.emit(fault),
        }
    }

    fn flush(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        if self.incremental {
            return Ok(Flow::Continue);
        }
        let rows: Vec<Value> = self.order.iter().map(|k| self.summary(k)).collect();
        emit_all(rows, out)
    }
}
