//! The command-facing surface: build a session once, then run pipelines in it.
//!
//! A [`Session`] owns the shared [`Env`]: global variables, reservoirs, the
//! configured clusters and the transport. Each call to [`Session::gather`],
//! [`Session::first`] or [`Session::run_with`] is one *command*: a fresh
//! instance of the pipeline is validated and run to completion. A fatal
//! [`CommandError`] ends that command only; the session stays usable.

use crate::config::SessionConfig;
use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::node::{Emit, Flow};
use crate::pipeline::Pipeline;
use crate::reservoir::Reservoir;
use crate::transport::{LoopbackTransport, Transport};
use crate::value::{ErrorValue, Value};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Callback receiving error elements under [`ErrorHandling::Handler`].
pub type ErrorHandler = Arc<dyn Fn(&ErrorValue) + Send + Sync>;

/// What `gather_with` does with error elements.
#[derive(Clone, Default)]
pub enum ErrorHandling {
    /// Leave them in the output, in stream order.
    #[default]
    Inline,
    /// Move them into [`Gathered::errors`].
    Collect,
    /// Hand each one to the callback and drop it from the output.
    Handler(ErrorHandler),
}

impl fmt::Debug for ErrorHandling {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorHandling::Inline => f.write_str("Inline"),
            ErrorHandling::Collect => f.write_str("Collect"),
            ErrorHandling::Handler(_) => f.write_str("Handler(..)"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct GatherOptions {
    /// Replace each one-field tuple with its only field.
    pub unwrap_singleton: bool,
    pub errors: ErrorHandling,
}

impl Default for GatherOptions {
    fn default() -> Self {
        Self {
            unwrap_singleton: true,
            errors: ErrorHandling::Inline,
        }
    }
}

/// Output of [`Session::gather_with`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Gathered {
    pub values: Vec<Value>,
    /// Error elements, when gathered with [`ErrorHandling::Collect`].
    pub errors: Vec<ErrorValue>,
}

pub struct Session {
    env: Env,
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session").field("env", &self.env).finish()
    }
}

impl Session {
    /// A session whose clusters run in-process through [`LoopbackTransport`].
    pub fn new(config: SessionConfig) -> Session {
        Self::with_transport(config, Arc::new(LoopbackTransport::new()))
    }

    pub fn with_transport(config: SessionConfig, transport: Arc<dyn Transport>) -> Session {
        debug!(
            clusters = config.clusters.len(),
            reservoir_dir = ?config.reservoir_dir,
            "session opened"
        );
        Session {
            env: Env::new(&config, transport),
        }
    }

    pub fn env(&self) -> &Env {
        &self.env
    }

    /// Bind a global variable, visible to [`Param::var`](crate::Param::var).
    pub fn set_var(&self, name: impl Into<String>, value: impl Into<Value>) {
        self.env.set_var(name, value.into());
    }

    /// Resolve (creating if needed) the reservoir bound to `name`.
    ///
    /// # Errors
    /// See [`Env::reservoir`].
    pub fn reservoir(&self, name: &str) -> Result<Reservoir> {
        self.env.reservoir(name)
    }

    /// Run `pipeline` and return everything it emits, singletons unwrapped
    /// and errors inline.
    ///
    /// # Errors
    /// Any fatal error raised while validating or running.
    pub fn gather(&self, pipeline: &Pipeline) -> Result<Vec<Value>> {
        Ok(self.gather_with(pipeline, &GatherOptions::default())?.values)
    }

    /// # Errors
    /// Any fatal error raised while validating or running.
    pub fn gather_with(&self, pipeline: &Pipeline, opts: &GatherOptions) -> Result<Gathered> {
        let mut out = Gathered::default();
        let mut sink = |x: Value| -> Result<Flow> {
            match (x, &opts.errors) {
                (Value::Error(e), ErrorHandling::Collect) => out.errors.push(e),
                (Value::Error(e), ErrorHandling::Handler(handler)) => handler(&e),
                (x, _) if opts.unwrap_singleton => out.values.push(x.unwrap_singleton()),
                (x, _) => out.values.push(x),
            }
            Ok(Flow::Continue)
        };
        self.run_with(pipeline, &mut sink)?;
        Ok(out)
    }

    /// The first element `pipeline` emits. The pipeline is stopped as soon as
    /// it has been seen.
    ///
    /// # Errors
    /// [`CommandError::Empty`] when nothing is emitted,
    /// [`CommandError::Element`] when the first element is an error, or any
    /// fatal error from the run.
    pub fn first(&self, pipeline: &Pipeline) -> Result<Value> {
        let mut first = None;
        let mut sink = |x: Value| -> Result<Flow> {
            if first.is_none() {
                first = Some(x);
            }
            Ok(Flow::Stop)
        };
        self.run_with(pipeline, &mut sink)?;
        match first {
            None => Err(CommandError::Empty(format!("{pipeline} produced no elements"))),
            Some(Value::Error(e)) => Err(CommandError::Element(e)),
            Some(x) => Ok(x.unwrap_singleton()),
        }
    }

    /// Run `pipeline`, streaming every element to `sink`. Returning
    /// [`Flow::Stop`] from the sink ends the run early.
    ///
    /// # Errors
    /// Any fatal error raised while validating or running.
    pub fn run_with(&self, pipeline: &Pipeline, sink: &mut dyn Emit) -> Result<()> {
        debug!(pipeline = %pipeline, "command started");
        let mut inst = pipeline.prepare(&self.env)?;
        inst.run(sink)?;
        debug!(pipeline = %pipeline, "command finished");
        Ok(())
    }

    /// Tear the session down, writing every durable reservoir back to disk.
    ///
    /// # Errors
    /// A reservoir could not be persisted.
    pub fn close(self) -> Result<()> {
        for r in self.env.reservoirs() {
            r.persist()?;
        }
        debug!("session closed");
        Ok(())
    }
}
