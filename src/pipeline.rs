//! Pipelines and pipeline templates.
//!
//! A [`Pipeline`] is an immutable, linear chain of op descriptors. It is a
//! plain value: clone it, store it, pass it to `tee` or `join`, run it as many
//! times as you like. Running allocates a fresh [`Instance`], so no state is
//! ever shared between runs.
//!
//! ```
//! use ironpipe::prelude::*;
//!
//! let p = generate(5, 0) | map(|x| x.mul(&Value::Int(10)));
//! assert_eq!(p.to_string(), "gen | map");
//! ```
//!
//! A [`Template`] is a pipeline with named parameters. `args`, `fork` and
//! `remote` call it once per unit with that unit's arguments.

use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::node::{Flow, OpSpec};
use crate::runner::Instance;
use crate::value::Value;
use std::fmt;
use std::ops::BitOr;
use std::sync::Arc;

#[derive(Clone, Default)]
pub struct Pipeline {
    specs: Vec<Arc<dyn OpSpec>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// A one-stage pipeline.
    pub fn of(spec: impl OpSpec + 'static) -> Self {
        Self {
            specs: vec![Arc::new(spec)],
        }
    }

    /// Append the stages of `next`.
    #[must_use]
    pub fn then(mut self, next: impl Into<Pipeline>) -> Self {
        self.specs.extend(next.into().specs);
        self
    }

    pub fn len(&self) -> usize {
        self.specs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.specs.is_empty()
    }

    pub fn op_names(&self) -> Vec<&'static str> {
        self.specs.iter().map(|s| s.name()).collect()
    }

    pub(crate) fn specs(&self) -> &[Arc<dyn OpSpec>] {
        &self.specs
    }

    /// Fresh per-run state for every stage.
    pub fn instantiate(&self) -> Instance {
        Instance::new(self)
    }

    /// Instantiate and validate as a standalone pipeline.
    ///
    /// # Errors
    /// See [`Instance::validate`].
    pub fn prepare(&self, env: &Env) -> Result<Instance> {
        let mut inst = self.instantiate();
        inst.validate(env)?;
        Ok(inst)
    }

    /// Run as a standalone pipeline and collect everything it emits.
    ///
    /// # Errors
    /// Any validation or running failure.
    pub fn collect(&self, env: &Env) -> Result<Vec<Value>> {
        let mut inst = self.prepare(env)?;
        let mut rows = Vec::new();
        let mut sink = |x: Value| -> Result<Flow> {
            rows.push(x);
            Ok(Flow::Continue)
        };
        inst.run(&mut sink)?;
        Ok(rows)
    }

    /// Instantiate and validate as a fed pipeline.
    ///
    /// # Errors
    /// See [`Instance::validate_fed`].
    pub fn prepare_fed(&self, env: &Env) -> Result<Instance> {
        let mut inst = self.instantiate();
        inst.validate_fed(env)?;
        Ok(inst)
    }
}

impl fmt::Display for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.op_names().join(" | "))
    }
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Pipeline({self})")
    }
}

impl From<&Pipeline> for Pipeline {
    fn from(p: &Pipeline) -> Self {
        p.clone()
    }
}

impl<T: Into<Pipeline>> BitOr<T> for Pipeline {
    type Output = Pipeline;

    fn bitor(self, rhs: T) -> Pipeline {
        self.then(rhs)
    }
}

/* ===================== Templates ===================== */

/// Arguments of one template call, by parameter name.
#[derive(Clone, Debug, Default)]
pub struct Bindings {
    vars: Vec<(String, Value)>,
}

impl Bindings {
    /// # Errors
    /// `name` is not a parameter of the template.
    pub fn get(&self, name: &str) -> Result<&Value> {
        self.vars
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
            .ok_or_else(|| CommandError::invalid(format!("{name} is not a parameter")))
    }

    /// Clone of the named argument, ready to pass as an op parameter.
    ///
    /// # Errors
    /// See [`Bindings::get`].
    pub fn param(&self, name: &str) -> Result<crate::param::Param> {
        Ok(self.get(name)?.clone().into())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.vars.iter().map(|(n, v)| (n.as_str(), v))
    }
}

type BuildFn = dyn Fn(&Bindings) -> Result<Pipeline> + Send + Sync;

/// A pipeline parameterized by named free variables.
///
/// The builder runs on every call, and the arguments are also bound in the
/// environment the resulting pipeline validates against, so stages can
/// refer to them either directly or through [`Param::var`](crate::Param::var).
#[derive(Clone)]
pub struct Template {
    params: Vec<String>,
    build: Arc<BuildFn>,
}

impl fmt::Debug for Template {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Template({})", self.params.join(", "))
    }
}

impl Template {
    pub fn new<F>(params: &[&str], build: F) -> Template
    where
        F: Fn(&Bindings) -> Result<Pipeline> + Send + Sync + 'static,
    {
        Template {
            params: params.iter().map(|p| (*p).to_string()).collect(),
            build: Arc::new(build),
        }
    }

    pub fn params(&self) -> &[String] {
        &self.params
    }

    pub fn arity(&self) -> usize {
        self.params.len()
    }

    /// Bind arguments positionally.
    ///
    /// # Errors
    /// [`CommandError::Arity`] on a count mismatch, or a builder failure.
    pub fn call(&self, args: Vec<Value>) -> Result<Invocation> {
        if args.len() != self.params.len() {
            return Err(CommandError::Arity(format!(
                "pipeline expects {} argument(s), got {}",
                self.params.len(),
                args.len()
            )));
        }
        let vars = self.params.iter().cloned().zip(args).collect();
        self.invoke(Bindings { vars })
    }

    /// Bind arguments by name, in any order.
    ///
    /// # Errors
    /// [`CommandError::Arity`] when a name is unknown, repeated or missing.
    pub fn call_named(&self, args: Vec<(String, Value)>) -> Result<Invocation> {
        if let Some((bad, _)) = args.iter().find(|(n, _)| !self.params.contains(n)) {
            return Err(CommandError::Arity(format!("{bad} is not a parameter of the pipeline")));
        }
        let mut vars = Vec::with_capacity(self.params.len());
        for p in &self.params {
            let mut matching = args.iter().filter(|(n, _)| n == p);
            let Some((_, v)) = matching.next() else {
                return Err(CommandError::Arity(format!("no value supplied for {p}")));
            };
            if matching.next().is_some() {
                return Err(CommandError::Arity(format!("{p} supplied more than once")));
            }
            vars.push((p.clone(), v.clone()));
        }
        self.invoke(Bindings { vars })
    }

    fn invoke(&self, bindings: Bindings) -> Result<Invocation> {
        let pipeline = (self.build)(&bindings)?;
        Ok(Invocation { pipeline, bindings })
    }
}

/// A zero-parameter template.
impl From<Pipeline> for Template {
    fn from(p: Pipeline) -> Self {
        Template::new(&[], move |_| Ok(p.clone()))
    }
}

/// The result of calling a template: a concrete pipeline plus the arguments
/// it was built from.
#[derive(Clone, Debug)]
pub struct Invocation {
    pub pipeline: Pipeline,
    pub bindings: Bindings,
}

impl Invocation {
    /// The environment this invocation validates against.
    pub fn env(&self, env: &Env) -> Env {
        env.with_bindings(self.bindings.vars.clone())
    }

    /// Instantiate and validate as a standalone pipeline.
    ///
    /// # Errors
    /// See [`Instance::validate`].
    pub fn prepare(&self, env: &Env) -> Result<Instance> {
        self.pipeline.prepare(&self.env(env))
    }
}
