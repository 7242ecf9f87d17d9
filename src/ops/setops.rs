//! Multiset algebra between the stream and a right-hand pipeline.

use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::node::{Emit, Flow, Op, OpSpec};
use crate::ops::basic::emit_all;
use crate::pipeline::Pipeline;
use crate::runner::Instance;
use crate::value::Value;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum SetOp {
    Union,
    Intersect,
    Difference,
}

/// The stream followed by everything `right` emits. Duplicates are kept.
pub fn union(right: impl Into<Pipeline>) -> Pipeline {
    set_op(SetOp::Union, right)
}

/// Each left element, while the right multiset still holds a copy of it.
pub fn intersect(right: impl Into<Pipeline>) -> Pipeline {
    set_op(SetOp::Intersect, right)
}

/// Each left element, once the right multiset has no copies left to cancel
/// it.
pub fn difference(right: impl Into<Pipeline>) -> Pipeline {
    set_op(SetOp::Difference, right)
}

fn set_op(op: SetOp, right: impl Into<Pipeline>) -> Pipeline {
    Pipeline::of(SetSpec {
        op,
        right: right.into(),
    })
}

struct SetSpec {
    op: SetOp,
    right: Pipeline,
}

impl OpSpec for SetSpec {
    fn name(&self) -> &'static str {
        match self.op {
            SetOp::Union => "union",
            SetOp::Intersect => "intersect",
            SetOp::Difference => "difference",
        }
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(SetAlgebraOp {
            op: self.op,
            right: self.right.clone(),
            pending: None,
            counts: HashMap::new(),
            right_errors: Vec::new(),
        })
    }
}

struct SetAlgebraOp {
    op: SetOp,
    right: Pipeline,
    /// Union: the validated right side, run at completion.
    pending: Option<Instance>,
    counts: HashMap<Value, usize>,
    right_errors: Vec<Value>,
}

fn hashable(x: &Value) -> Result<()> {
    x.check_hashable().map_err(CommandError::Unhashable)
}

impl Op for SetAlgebraOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        if self.op == SetOp::Union {
            self.pending = Some(self.right.prepare(env)?);
            return Ok(());
        }
        for x in self.right.collect(env)? {
            if x.is_error() {
                self.right_errors.push(x);
                continue;
            }
            hashable(&x)?;
            *self.counts.entry(x).or_default() += 1;
        }
        Ok(())
    }

    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        if self.op == SetOp::Union {
            return out.emit(x);
        }
        hashable(&x)?;
        let remaining = self.counts.get_mut(&x).filter(|n| **n > 0);
        let matched = match remaining {
            Some(n) => {
                *n -= 1;
                true
            }
            None => false,
        };
        if matched == (self.op == SetOp::Intersect) {
            out.emit(x)
        } else {
            Ok(Flow::Continue)
        }
    }

    fn flush(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        if let Some(mut right) = self.pending.take() {
            right.run(out)?;
            return Ok(Flow::Continue);
        }
        emit_all(std::mem::take(&mut self.right_errors), out)
    }
}
