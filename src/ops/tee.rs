//! Side branches fed from the main stream: `tee`, `ifthen` and `ifelse`.
//!
//! A branch is a fed pipeline: its head receives elements from the enclosing
//! op rather than producing them. Whatever a branch emits at its end is
//! discarded, so branches usually finish in a `store`.

use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::node::{Emit, Flow, Op, OpSpec};
use crate::param::PredFn;
use crate::pipeline::Pipeline;
use crate::runner::Instance;
use crate::value::{ErrorValue, Value};
use std::sync::Arc;

/// One fed branch plus whether it has asked to stop.
struct Branch {
    inst: Instance,
    stopped: bool,
}

impl Branch {
    fn new(pipeline: &Pipeline, env: &Env) -> Result<Branch> {
        Ok(Branch {
            inst: pipeline.prepare_fed(env)?,
            stopped: false,
        })
    }

    fn feed(&mut self, x: Value) -> Result<()> {
        if !self.stopped {
            let mut discard = |_: Value| -> Result<Flow> { Ok(Flow::Continue) };
            self.stopped = self.inst.feed(x, &mut discard)?.is_stop();
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let mut discard = |_: Value| -> Result<Flow> { Ok(Flow::Continue) };
        self.inst.finish(&mut discard)
    }
}

/* ===================== tee ===================== */

/// Copy every element into each of `pipelines` and pass it on downstream.
///
/// Branches are fed in the order given, one element at a time.
pub fn tee(pipelines: Vec<Pipeline>) -> Pipeline {
    Pipeline::of(TeeSpec { pipelines })
}

struct TeeSpec {
    pipelines: Vec<Pipeline>,
}

impl OpSpec for TeeSpec {
    fn name(&self) -> &'static str {
        "tee"
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(TeeOp {
            pipelines: self.pipelines.clone(),
            branches: Vec::new(),
        })
    }
}

struct TeeOp {
    pipelines: Vec<Pipeline>,
    branches: Vec<Branch>,
}

impl TeeOp {
    fn copy(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        for b in &mut self.branches {
            b.feed(x.clone())?;
        }
        out.emit(x)
    }
}

impl Op for TeeOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        if self.pipelines.is_empty() {
            return Err(CommandError::invalid("No pipelines"));
        }
        self.branches = self
            .pipelines
            .iter()
            .map(|p| Branch::new(p, env))
            .collect::<Result<_>>()?;
        Ok(())
    }

    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        self.copy(x, out)
    }

    fn receive_error(&mut self, e: ErrorValue, out: &mut dyn Emit) -> Result<Flow> {
        self.copy(Value::Error(e), out)
    }

    fn flush(&mut self, _out: &mut dyn Emit) -> Result<Flow> {
        for b in &mut self.branches {
            b.finish()?;
        }
        Ok(Flow::Continue)
    }
}

/* ===================== ifthen / ifelse ===================== */

/// Pass every element downstream; those matching `pred` also go to
/// `pipeline`.
pub fn ifthen<F>(pred: F, pipeline: impl Into<Pipeline>) -> Pipeline
where
    F: Fn(&Value) -> std::result::Result<bool, ErrorValue> + Send + Sync + 'static,
{
    Pipeline::of(IfSpec {
        pred: Arc::new(pred),
        pipeline: pipeline.into(),
        exclusive: false,
    })
}

/// Route elements matching `pred` to `pipeline` only; pass the rest
/// downstream.
pub fn ifelse<F>(pred: F, pipeline: impl Into<Pipeline>) -> Pipeline
where
    F: Fn(&Value) -> std::result::Result<bool, ErrorValue> + Send + Sync + 'static,
{
    Pipeline::of(IfSpec {
        pred: Arc::new(pred),
        pipeline: pipeline.into(),
        exclusive: true,
    })
}

struct IfSpec {
    pred: PredFn,
    pipeline: Pipeline,
    exclusive: bool,
}

impl OpSpec for IfSpec {
    fn name(&self) -> &'static str {
        if self.exclusive { "ifelse" } else { "ifthen" }
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(IfOp {
            pred: Arc::clone(&self.pred),
            pipeline: self.pipeline.clone(),
            exclusive: self.exclusive,
            branch: None,
        })
    }
}

struct IfOp {
    pred: PredFn,
    pipeline: Pipeline,
    exclusive: bool,
    branch: Option<Branch>,
}

impl Op for IfOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        self.branch = Some(Branch::new(&self.pipeline, env)?);
        Ok(())
    }

    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        let matched = match (self.pred)(&x) {
            Ok(m) => m,
            Err(e) => return out.emit(Value::Error(e)),
        };
        if matched && let Some(b) = &mut self.branch {
            b.feed(x.clone())?;
            if self.exclusive {
                return Ok(Flow::Continue);
            }
        }
        out.emit(x)
    }

    fn flush(&mut self, _out: &mut dyn Emit) -> Result<Flow> {
        match &mut self.branch {
            Some(b) => b.finish().map(|()| Flow::Continue),
            None => Ok(Flow::Continue),
        }
    }
}
