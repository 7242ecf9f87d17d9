//! Sources that need no environment state: `generate` (the `gen` op) and `values`.

use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::node::{Emit, Flow, Op, OpSpec};
use crate::param::Param;
use crate::pipeline::Pipeline;
use crate::value::Value;

/// Emit `count` integers starting at `start`. A `count` of 0 is unbounded.
pub fn generate(count: impl Into<Param>, start: impl Into<Param>) -> Pipeline {
    Pipeline::of(GenSpec {
        count: count.into(),
        start: start.into(),
        pad: None,
    })
}

/// Like [`generate`], with every value rendered as a zero-padded string of width
/// `pad`.
pub fn generate_padded(
    count: impl Into<Param>,
    start: impl Into<Param>,
    pad: impl Into<Param>,
) -> Pipeline {
    Pipeline::of(GenSpec {
        count: count.into(),
        start: start.into(),
        pad: Some(pad.into()),
    })
}

struct GenSpec {
    count: Param,
    start: Param,
    pad: Option<Param>,
}

impl OpSpec for GenSpec {
    fn name(&self) -> &'static str {
        "gen"
    }

    fn is_source(&self) -> bool {
        true
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(GenOp {
            count: self.count.clone(),
            start: self.start.clone(),
            pad: self.pad.clone(),
            resolved: None,
        })
    }
}

struct Resolved {
    count: Option<u64>,
    start: i64,
    pad: Option<usize>,
}

struct GenOp {
    count: Param,
    start: Param,
    pad: Option<Param>,
    resolved: Option<Resolved>,
}

fn digits(n: i64) -> usize {
    n.unsigned_abs().checked_ilog10().map_or(1, |d| d as usize + 1)
}

impl Op for GenOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        let count = self.count.resolve_usize(env, "count")? as u64;
        let start = self.start.resolve_int(env, "start")?;
        let pad = match &self.pad {
            Some(p) => Some(p.resolve_usize(env, "pad")?),
            None => None,
        };
        if let Some(pad) = pad {
            if count == 0 {
                return Err(CommandError::invalid(format!(
                    "Padding {pad} incompatible with unbounded output"
                )));
            }
            if start < 0 {
                return Err(CommandError::invalid("Padding incompatible with start < 0"));
            }
            let last = start.saturating_add_unsigned(count - 1);
            if digits(last) > pad {
                return Err(CommandError::invalid(format!("Padding {pad} too small")));
            }
        }
        self.resolved = Some(Resolved {
            count: (count > 0).then_some(count),
            start,
            pad,
        });
        Ok(())
    }

    fn produce(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        let Some(r) = &self.resolved else {
            return Ok(Flow::Continue);
        };
        let mut next = r.start;
        let mut remaining = r.count;
        loop {
            if remaining == Some(0) {
                return Ok(Flow::Continue);
            }
            let v = match r.pad {
                Some(width) => Value::Str(format!("{next:0width$}")),
                None => Value::Int(next),
            };
            if out.emit(v)?.is_stop() {
                return Ok(Flow::Stop);
            }
            if let Some(n) = remaining.as_mut() {
                *n -= 1;
            }
            match next.checked_add(1) {
                Some(n) => next = n,
                None => return Ok(Flow::Continue),
            }
        }
    }

    fn receive(&mut self, _x: Value, _out: &mut dyn Emit) -> Result<Flow> {
        Ok(Flow::Continue)
    }
}

/// Emit the given elements, in order.
pub fn values(items: impl IntoIterator<Item = Value>) -> Pipeline {
    Pipeline::of(ValuesSpec {
        items: items.into_iter().collect(),
    })
}

struct ValuesSpec {
    items: Vec<Value>,
}

impl OpSpec for ValuesSpec {
    fn name(&self) -> &'static str {
        "values"
    }

    fn is_source(&self) -> bool {
        true
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(ValuesOp {
            items: self.items.clone(),
        })
    }
}

struct ValuesOp {
    items: Vec<Value>,
}

impl Op for ValuesOp {
    fn produce(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        for x in std::mem::take(&mut self.items) {
            if out.emit(x)?.is_stop() {
                return Ok(Flow::Stop);
            }
        }
        Ok(Flow::Continue)
    }

    fn receive(&mut self, _x: Value, _out: &mut dyn Emit) -> Result<Flow> {
        Ok(Flow::Continue)
    }
}

#[cfg(test)]
mod tests {
    use super::digits;

    #[test]
    fn digit_width() {
        assert_eq!(digits(0), 1);
        assert_eq!(digits(9), 1);
        assert_eq!(digits(10), 2);
        assert_eq!(digits(101), 3);
    }
}
