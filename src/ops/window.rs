//! Grouping of consecutive elements.
//!
//! Exactly one mode is configured:
//!
//! - **predicate**: a new window starts at every element the predicate
//!   accepts;
//! - **overlap(n)**: every element starts a window of the next `n` elements;
//! - **disjoint(n)**: consecutive chunks of `n`.
//!
//! Fixed-width windows that run off the end of the stream are padded with
//! [`Value::Null`]. A one-member window is emitted as that member.

use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::node::{Emit, Flow, Op, OpSpec};
use crate::param::{Param, PredFn};
use crate::pipeline::Pipeline;
use crate::value::{ErrorValue, Value};
use std::collections::VecDeque;
use std::sync::Arc;

/// Window configuration. Set exactly one field.
#[derive(Clone, Default)]
pub struct WindowArgs {
    pub predicate: Option<PredFn>,
    pub overlap: Option<Param>,
    pub disjoint: Option<Param>,
}

impl WindowArgs {
    pub fn predicate<F>(f: F) -> Self
    where
        F: Fn(&Value) -> std::result::Result<bool, ErrorValue> + Send + Sync + 'static,
    {
        Self {
            predicate: Some(Arc::new(f)),
            ..Self::default()
        }
    }

    pub fn overlap(n: impl Into<Param>) -> Self {
        Self {
            overlap: Some(n.into()),
            ..Self::default()
        }
    }

    pub fn disjoint(n: impl Into<Param>) -> Self {
        Self {
            disjoint: Some(n.into()),
            ..Self::default()
        }
    }
}

pub fn window(args: WindowArgs) -> Pipeline {
    Pipeline::of(WindowSpec { args })
}

struct WindowSpec {
    args: WindowArgs,
}

impl OpSpec for WindowSpec {
    fn name(&self) -> &'static str {
        "window"
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(WindowOp {
            args: self.args.clone(),
            mode: None,
            buf: VecDeque::new(),
        })
    }
}

enum Mode {
    Predicate(PredFn),
    Overlap(usize),
    Disjoint(usize),
}

struct WindowOp {
    args: WindowArgs,
    mode: Option<Mode>,
    buf: VecDeque<Value>,
}

/// Widest window a stream may be cut into. Every emitted window is padded to
/// its full width.
pub const MAX_WINDOW_WIDTH: usize = 1 << 20;

fn width(p: &Param, env: &Env, what: &str) -> Result<usize> {
    match p.resolve_usize(env, what)? {
        0 => Err(CommandError::invalid(format!("{what} must be positive"))),
        n if n > MAX_WINDOW_WIDTH => Err(CommandError::invalid(format!(
            "{what} must be at most {MAX_WINDOW_WIDTH}"
        ))),
        n => Ok(n),
    }
}

fn padded(members: impl IntoIterator<Item = Value>, n: usize) -> Value {
    let mut row: Vec<Value> = members.into_iter().collect();
    row.resize(n, Value::Null);
    Value::from_fields(row)
}

impl Op for WindowOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        let mode = match (&self.args.predicate, &self.args.overlap, &self.args.disjoint) {
            (Some(f), None, None) => Mode::Predicate(Arc::clone(f)),
            (None, Some(n), None) => Mode::Overlap(width(n, env, "overlap")?),
            (None, None, Some(n)) => Mode::Disjoint(width(n, env, "disjoint")?),
            _ => {
                return Err(CommandError::invalid(
                    "Must specify exactly one window mode: predicate, overlap or disjoint",
                ));
            }
        };
        self.mode = Some(mode);
        Ok(())
    }

    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        match &self.mode {
            Some(Mode::Predicate(f)) => match f(&x) {
                Ok(true) => {
                    let closed = std::mem::take(&mut self.buf);
                    self.buf.push_back(x);
                    if closed.is_empty() {
                        Ok(Flow::Continue)
                    } else {
                        out.emit(Value::from_fields(closed.into()))
                    }
                }
                Ok(false) => {
                    self.buf.push_back(x);
                    Ok(Flow::Continue)
                }
                Err(e) => out.emit(Value::Error(e)),
            },
            Some(Mode::Overlap(n)) => {
                let n = *n;
                self.buf.push_back(x);
                if self.buf.len() < n {
                    return Ok(Flow::Continue);
                }
                let w = padded(self.buf.iter().cloned(), n);
                self.buf.pop_front();
                out.emit(w)
            }
            Some(Mode::Disjoint(n)) => {
                let n = *n;
                self.buf.push_back(x);
                if self.buf.len() < n {
                    return Ok(Flow::Continue);
                }
                let chunk = std::mem::take(&mut self.buf);
                out.emit(padded(chunk, n))
            }
            None => Ok(Flow::Continue),
        }
    }

    fn flush(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        match &self.mode {
            Some(Mode::Predicate(_)) if !self.buf.is_empty() => {
                let last = std::mem::take(&mut self.buf);
                out.emit(Value::from_fields(last.into()))
            }
            Some(Mode::Overlap(n)) => {
                let n = *n;
                while !self.buf.is_empty() {
                    if out.emit(padded(self.buf.iter().cloned(), n))?.is_stop() {
                        return Ok(Flow::Stop);
                    }
                    self.buf.pop_front();
                }
                Ok(Flow::Continue)
            }
            Some(Mode::Disjoint(n)) if !self.buf.is_empty() => {
                let n = *n;
                let chunk = std::mem::take(&mut self.buf);
                out.emit(padded(chunk, n))
            }
            _ => Ok(Flow::Continue),
        }
    }
}
