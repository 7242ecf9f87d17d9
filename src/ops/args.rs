//! Per-element instantiation of a parameterized pipeline.
//!
//! For every upstream element, `args` binds the template's parameters, builds
//! a fresh pipeline instance, runs it to completion and splices its output
//! into the stream. Invocations run one at a time, in input order, so nested
//! `args` iterate outer-then-inner.
//!
//! Binding rules, for a template with `n` parameters:
//!
//! - a tuple of `(name, value)` pairs naming every parameter binds by name;
//! - a tuple of arity `n` binds positionally;
//! - with `n == 1`, any other element is the single argument;
//! - otherwise elements are collected `n` at a time, and a short final group
//!   is padded with [`Value::Null`].

use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::node::{Emit, Flow, Op, OpSpec};
use crate::pipeline::{Invocation, Pipeline, Template};
use crate::value::Value;

pub fn args(template: Template) -> Pipeline {
    Pipeline::of(ArgsSpec { template })
}

struct ArgsSpec {
    template: Template,
}

impl OpSpec for ArgsSpec {
    fn name(&self) -> &'static str {
        "args"
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(ArgsOp {
            template: self.template.clone(),
            env: None,
            pending: Vec::new(),
        })
    }
}

struct ArgsOp {
    template: Template,
    env: Option<Env>,
    pending: Vec<Value>,
}

impl ArgsOp {
    /// Name-matched arguments, if `x` is a complete set of `(name, value)`
    /// pairs.
    fn named(&self, x: &Value) -> Option<Vec<(String, Value)>> {
        let Value::Tuple(fields) = x else {
            return None;
        };
        if fields.len() != self.template.arity() {
            return None;
        }
        fields
            .iter()
            .map(|f| match f.fields() {
                [Value::Str(name), v] if self.template.params().contains(name) => {
                    Some((name.clone(), v.clone()))
                }
                _ => None,
            })
            .collect()
    }

    fn invoke(&self, inv: Result<Invocation>, out: &mut dyn Emit) -> Result<Flow> {
        let Some(env) = &self.env else {
            return Ok(Flow::Continue);
        };
        let mut inst = inv?.prepare(env)?;
        let mut stopped = false;
        let mut forward = |y: Value| -> Result<Flow> {
            let flow = out.emit(y)?;
            stopped |= flow.is_stop();
            Ok(flow)
        };
        inst.run(&mut forward)?;
        Ok(if stopped { Flow::Stop } else { Flow::Continue })
    }
}

impl Op for ArgsOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        if self.template.arity() == 0 {
            return Err(CommandError::invalid("The args pipeline must be parameterized"));
        }
        self.env = Some(env.clone());
        Ok(())
    }

    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        let n = self.template.arity();
        if let Some(named) = self.named(&x) {
            return self.invoke(self.template.call_named(named), out);
        }
        if x.fields().len() == n {
            return self.invoke(self.template.call(x.into_fields()), out);
        }
        if n == 1 {
            return self.invoke(self.template.call(vec![x]), out);
        }
        self.pending.push(x);
        if self.pending.len() < n {
            return Ok(Flow::Continue);
        }
        let group = std::mem::take(&mut self.pending);
        self.invoke(self.template.call(group), out)
    }

    fn flush(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        if self.pending.is_empty() {
            return Ok(Flow::Continue);
        }
        let mut group = std::mem::take(&mut self.pending);
        group.resize(self.template.arity(), Value::Null);
        self.invoke(self.template.call(group), out)
    }
}
