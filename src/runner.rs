//! Single-threaded execution of one pipeline instance.
//!
//! Elements are pushed stage by stage: a stage's `receive` gets a
//! [`Downstream`] handle and calling `emit` on it runs the next stage
//! synchronously. Nothing is buffered between stages; ops that need
//! look-ahead or materialization buffer privately.
//!
//! When a stage answers [`Flow::Stop`] it is marked done and receives nothing
//! more, and the `Stop` travels back up to the producer. Completion then
//! flushes every stage, head to tail, exactly once.
//!
//! An instance validated against an [`Env`] that carries a [`CancelToken`]
//! checks it on every delivery between stages, so a branch whose output is no
//! longer wanted stops even if it never emits anything.

use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::node::{Emit, Flow, Op};
use crate::pipeline::Pipeline;
use crate::value::Value;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::debug;

/// Shared stop signal for concurrently running branches.
///
/// A child token is cancelled when it or any of its ancestors is.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    parent: Option<Arc<CancelToken>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn child(&self) -> CancelToken {
        CancelToken {
            flag: Arc::new(AtomicBool::new(false)),
            parent: Some(Arc::new(self.clone())),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
            || self.parent.as_ref().is_some_and(|p| p.is_cancelled())
    }
}

/// Lifecycle of one [`Instance`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunState {
    Constructed,
    Bound,
    Validated,
    Running,
    Completed,
    Failed,
}

pub(crate) struct Stage {
    op: Box<dyn Op>,
    name: &'static str,
    is_source: bool,
    done: bool,
}

/// Deliver `x` to the first of `stages`, or to `sink` when none are left.
fn push(
    stages: &mut [Stage],
    sink: &mut dyn Emit,
    cancel: Option<&CancelToken>,
    x: Value,
) -> Result<Flow> {
    if cancel.is_some_and(CancelToken::is_cancelled) {
        return Ok(Flow::Stop);
    }
    let Some((head, rest)) = stages.split_first_mut() else {
        return sink.emit(x);
    };
    if head.done {
        return Ok(Flow::Stop);
    }
    let mut down = Downstream {
        stages: rest,
        sink,
        cancel,
    };
    let flow = match x {
        Value::Error(e) => head.op.receive_error(e, &mut down)?,
        x => head.op.receive(x, &mut down)?,
    };
    if flow.is_stop() {
        head.done = true;
    }
    Ok(flow)
}

/// Flush every stage in order. A flushing stage may still emit into the
/// stages after it.
fn complete(stages: &mut [Stage], sink: &mut dyn Emit, cancel: Option<&CancelToken>) -> Result<()> {
    let mut rest = stages;
    while let Some((head, tail)) = std::mem::take(&mut rest).split_first_mut() {
        let mut down = Downstream {
            stages: &mut *tail,
            sink: &mut *sink,
            cancel,
        };
        let _ = head.op.flush(&mut down)?;
        head.done = true;
        rest = tail;
    }
    Ok(())
}

/// The rest of a pipeline, as seen by the stage before it.
pub(crate) struct Downstream<'a> {
    stages: &'a mut [Stage],
    sink: &'a mut dyn Emit,
    cancel: Option<&'a CancelToken>,
}

impl Emit for Downstream<'_> {
    fn emit(&mut self, x: Value) -> Result<Flow> {
        push(self.stages, self.sink, self.cancel, x)
    }
}

/// One run of a pipeline: fresh op state plus lifecycle bookkeeping.
///
/// An instance is either *standalone* (its head is a source and
/// [`Instance::run`] drives it) or *fed* (elements arrive through
/// [`Instance::feed`], as in `tee` and `ifthen` branches).
pub struct Instance {
    stages: Vec<Stage>,
    state: RunState,
    cleaned: bool,
    cancel: Option<CancelToken>,
}

impl Instance {
    pub(crate) fn new(pipeline: &Pipeline) -> Instance {
        let stages = pipeline
            .specs()
            .iter()
            .map(|spec| Stage {
                op: spec.instantiate(),
                name: spec.name(),
                is_source: spec.is_source(),
                done: false,
            })
            .collect();
        Instance {
            stages,
            state: RunState::Constructed,
            cleaned: false,
            cancel: None,
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    /// Validate as a standalone pipeline: the head must be a source.
    ///
    /// # Errors
    /// [`CommandError::NotFirst`], or the first failing `setup`.
    pub fn validate(&mut self, env: &Env) -> Result<()> {
        self.state = RunState::Bound;
        match self.stages.first() {
            Some(head) if !head.is_source => {
                let op = head.name.to_string();
                return self.fail(CommandError::NotFirst { op });
            }
            None => return self.fail(CommandError::invalid("empty pipeline")),
            _ => {}
        }
        self.setup_all(env)
    }

    /// Validate as a fed pipeline, which takes its input from an enclosing op.
    ///
    /// # Errors
    /// The first failing `setup`.
    pub fn validate_fed(&mut self, env: &Env) -> Result<()> {
        self.state = RunState::Bound;
        self.setup_all(env)
    }

    fn setup_all(&mut self, env: &Env) -> Result<()> {
        self.cancel = env.cancel_token().cloned();
        for i in 0..self.stages.len() {
            if let Err(e) = self.stages[i].op.setup(env) {
                return self.fail(e);
            }
        }
        self.state = RunState::Validated;
        debug!(pipeline = %self.describe(), "validated");
        Ok(())
    }

    fn fail<T>(&mut self, e: CommandError) -> Result<T> {
        self.state = RunState::Failed;
        self.cleanup();
        Err(e)
    }

    /// Run a validated standalone instance to completion.
    ///
    /// # Errors
    /// A fatal error raised by any stage while running.
    pub fn run(&mut self, sink: &mut dyn Emit) -> Result<()> {
        self.start()?;
        let outcome = match self.stages.split_first_mut() {
            Some((head, rest)) => {
                let mut down = Downstream {
                    stages: rest,
                    sink: &mut *sink,
                    cancel: self.cancel.as_ref(),
                };
                head.op.produce(&mut down).map(|_| ())
            }
            None => Ok(()),
        };
        match outcome {
            Ok(()) => self.finish(sink),
            Err(e) => self.fail(e),
        }
    }

    /// Push one element into a validated fed instance.
    ///
    /// # Errors
    /// A fatal error raised by any stage.
    pub fn feed(&mut self, x: Value, sink: &mut dyn Emit) -> Result<Flow> {
        if self.state == RunState::Validated {
            self.start()?;
        }
        match push(&mut self.stages, sink, self.cancel.as_ref(), x) {
            Ok(flow) => Ok(flow),
            Err(e) => self.fail(e),
        }
    }

    /// Complete the instance: flush every stage once, then release resources.
    ///
    /// # Errors
    /// A fatal error raised while flushing.
    pub fn finish(&mut self, sink: &mut dyn Emit) -> Result<()> {
        match self.state {
            RunState::Completed => return Ok(()),
            RunState::Running => {}
            _ => self.start()?,
        }
        if let Err(e) = complete(&mut self.stages, sink, self.cancel.as_ref()) {
            return self.fail(e);
        }
        self.state = RunState::Completed;
        self.cleanup();
        debug!(pipeline = %self.describe(), "completed");
        Ok(())
    }

    fn start(&mut self) -> Result<()> {
        if self.state != RunState::Validated {
            return Err(CommandError::invalid(format!(
                "cannot run pipeline in state {:?}",
                self.state
            )));
        }
        self.state = RunState::Running;
        Ok(())
    }

    fn cleanup(&mut self) {
        if !self.cleaned {
            self.cleaned = true;
            for stage in &mut self.stages {
                stage.op.cleanup();
            }
        }
    }

    fn describe(&self) -> String {
        self.stages.iter().map(|s| s.name).collect::<Vec<_>>().join(" | ")
    }
}

impl Drop for Instance {
    fn drop(&mut self) {
        self.cleanup();
    }
}
