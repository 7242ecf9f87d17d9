//! Reservoir access: `store` appends the stream to a named reservoir, `load`
//! replays one.

use crate::env::Env;
use crate::error::Result;
use crate::node::{Emit, Flow, Op, OpSpec};
use crate::ops::basic::emit_all;
use crate::param::Param;
use crate::pipeline::Pipeline;
use crate::reservoir::Reservoir;
use crate::value::{ErrorValue, Value};

/// Replace the contents of reservoir `name` with the stream.
pub fn store(name: impl Into<Param>) -> Pipeline {
    Pipeline::of(StoreSpec {
        name: name.into(),
        append: false,
    })
}

/// Append the stream to reservoir `name`.
pub fn store_append(name: impl Into<Param>) -> Pipeline {
    Pipeline::of(StoreSpec {
        name: name.into(),
        append: true,
    })
}

struct StoreSpec {
    name: Param,
    append: bool,
}

impl OpSpec for StoreSpec {
    fn name(&self) -> &'static str {
        "store"
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(StoreOp {
            name: self.name.clone(),
            append: self.append,
            target: None,
        })
    }
}

struct StoreOp {
    name: Param,
    append: bool,
    target: Option<Reservoir>,
}

impl StoreOp {
    fn put(&self, x: Value) -> Result<Flow> {
        if let Some(r) = &self.target {
            r.append(x);
        }
        Ok(Flow::Continue)
    }
}

impl Op for StoreOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        let name = self.name.resolve_str(env, "name")?;
        let r = env.reservoir(&name)?;
        if !self.append {
            r.clear();
        }
        self.target = Some(r);
        Ok(())
    }

    fn receive(&mut self, x: Value, _out: &mut dyn Emit) -> Result<Flow> {
        self.put(x)
    }

    fn receive_error(&mut self, e: ErrorValue, _out: &mut dyn Emit) -> Result<Flow> {
        self.put(Value::Error(e))
    }
}

/// Emit the current contents of reservoir `name`.
pub fn load(name: impl Into<Param>) -> Pipeline {
    Pipeline::of(LoadSpec { name: name.into() })
}

struct LoadSpec {
    name: Param,
}

impl OpSpec for LoadSpec {
    fn name(&self) -> &'static str {
        "load"
    }

    fn is_source(&self) -> bool {
        true
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(LoadOp {
            name: self.name.clone(),
            source: None,
        })
    }
}

struct LoadOp {
    name: Param,
    source: Option<Reservoir>,
}

impl Op for LoadOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        let name = self.name.resolve_str(env, "name")?;
        self.source = Some(env.reservoir(&name)?);
        Ok(())
    }

    fn produce(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        match &self.source {
            Some(r) => emit_all(r.snapshot(), out),
            None => Ok(Flow::Continue),
        }
    }

    fn receive(&mut self, _x: Value, _out: &mut dyn Emit) -> Result<Flow> {
        Ok(Flow::Continue)
    }
}
