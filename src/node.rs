//! The op contract.
//!
//! An [`OpSpec`] is the immutable, shareable description of a stage: its kind
//! and its bound parameters. Every run calls [`OpSpec::instantiate`] to get an
//! [`Op`] whose private state lives for that run only, so one pipeline value
//! can be run any number of times (sequentially or on several threads) without
//! sharing counters or accumulators.
//!
//! Per run, the hooks are called in this order:
//!
//! 1. [`Op::setup`] once, during Validate. Deferred parameters are resolved
//!    here; an `Err` is fatal to the command and no element is produced.
//! 2. [`Op::produce`] once for the head of a standalone pipeline, or
//!    [`Op::receive`] / [`Op::receive_error`] once per upstream element.
//! 3. [`Op::flush`] exactly once, when upstream completes.
//! 4. [`Op::cleanup`] exactly once, whatever the outcome.

use crate::env::Env;
use crate::error::Result;
use crate::value::{ErrorValue, Value};

/// Signal returned up the chain after each element.
///
/// `Stop` means the stage that returned it wants no more input; a producer
/// seeing it must return promptly. Completion still reaches every stage.
#[must_use]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Stop,
}

impl Flow {
    pub fn is_stop(self) -> bool {
        self == Flow::Stop
    }
}

/// Receiver of elements from one stage: the rest of the pipeline, a branch
/// merge, or a caller-supplied sink.
pub trait Emit {
    fn emit(&mut self, x: Value) -> Result<Flow>;
}

impl<F> Emit for F
where
    F: FnMut(Value) -> Result<Flow>,
{
    fn emit(&mut self, x: Value) -> Result<Flow> {
        self(x)
    }
}

/// Immutable descriptor of one stage.
pub trait OpSpec: Send + Sync {
    /// Name used in messages and logs.
    fn name(&self) -> &'static str;

    /// Whether this kind may occupy the first position of a pipeline.
    fn is_source(&self) -> bool {
        false
    }

    /// Allocate fresh per-run state.
    fn instantiate(&self) -> Box<dyn Op>;
}

/// Per-run state of one stage.
pub trait Op: Send {
    fn setup(&mut self, _env: &Env) -> Result<()> {
        Ok(())
    }

    /// Emit this source's elements. Only called on the head of a standalone
    /// pipeline.
    fn produce(&mut self, _out: &mut dyn Emit) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow>;

    /// Errors pass through untouched unless an op interprets them.
    fn receive_error(&mut self, e: ErrorValue, out: &mut dyn Emit) -> Result<Flow> {
        out.emit(Value::Error(e))
    }

    fn flush(&mut self, _out: &mut dyn Emit) -> Result<Flow> {
        Ok(Flow::Continue)
    }

    fn cleanup(&mut self) {}
}
