//! Equi-join of the stream against a materialized right-hand pipeline.
//!
//! The right side runs to completion during setup and is indexed by key into
//! a multimap. Each left element is then matched against it: one output row
//! per right match (key, left payload, right payload). Unmatched left rows
//! are dropped unless `keep` is set, in which case they pass through as-is.
//!
//! Keys are the leading `key_width` fields. A key that cannot be hashed, on
//! either side, is fatal for the command: the multimap has no way to record a
//! partial failure.

use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::node::{Emit, Flow, Op, OpSpec};
use crate::ops::basic::emit_all;
use crate::pipeline::Pipeline;
use crate::value::Value;
use std::collections::HashMap;

#[derive(Clone, Copy, Debug)]
pub struct JoinOptions {
    /// Retain unmatched left rows.
    pub keep: bool,
    /// Number of leading fields forming the key.
    pub key_width: usize,
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            keep: false,
            key_width: 1,
        }
    }
}

/// Inner join on the first field.
pub fn join(right: impl Into<Pipeline>) -> Pipeline {
    join_with(right, JoinOptions::default())
}

/// Left-outer join on the first field.
pub fn join_keep(right: impl Into<Pipeline>) -> Pipeline {
    join_with(
        right,
        JoinOptions {
            keep: true,
            ..JoinOptions::default()
        },
    )
}

pub fn join_with(right: impl Into<Pipeline>, opts: JoinOptions) -> Pipeline {
    Pipeline::of(JoinSpec {
        right: right.into(),
        opts,
    })
}

struct JoinSpec {
    right: Pipeline,
    opts: JoinOptions,
}

impl OpSpec for JoinSpec {
    fn name(&self) -> &'static str {
        "join"
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(JoinOp {
            right: self.right.clone(),
            opts: self.opts,
            index: HashMap::new(),
            right_errors: Vec::new(),
        })
    }
}

struct JoinOp {
    right: Pipeline,
    opts: JoinOptions,
    index: HashMap<Vec<Value>, Vec<Vec<Value>>>,
    right_errors: Vec<Value>,
}

/// Split `fields` into a hashable key and the payload.
fn split_key(fields: &[Value], width: usize) -> Result<(Vec<Value>, &[Value])> {
    let (key, payload) = fields.split_at(width.min(fields.len()));
    for k in key {
        k.check_hashable().map_err(CommandError::Unhashable)?;
    }
    Ok((key.to_vec(), payload))
}

impl Op for JoinOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        if self.opts.key_width == 0 {
            return Err(CommandError::invalid("join key width must be positive"));
        }
        for row in self.right.collect(env)? {
            if row.is_error() {
                self.right_errors.push(row);
                continue;
            }
            let (key, payload) = split_key(row.fields(), self.opts.key_width)?;
            self.index.entry(key).or_default().push(payload.to_vec());
        }
        Ok(())
    }

    fn receive(&mut self, x: Value, out: &mut dyn Emit) -> Result<Flow> {
        let (key, left) = split_key(x.fields(), self.opts.key_width)?;
        match self.index.get(&key) {
            Some(matches) => {
                let rows: Vec<Value> = matches
                    .iter()
                    .map(|right| {
                        let row = key.iter().chain(left).chain(right).cloned().collect();
                        Value::from_fields(row)
                    })
                    .collect();
                emit_all(rows, out)
            }
            None if self.opts.keep => out.emit(x),
            None => Ok(Flow::Continue),
        }
    }

    fn flush(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        emit_all(std::mem::take(&mut self.right_errors), out)
    }
}
