//! Cluster-wide execution of a pipeline template.
//!
//! One branch per host runs through the session's [`Transport`]. Output is
//! tagged with the host it came from. A failure scoped to one host, such as an
//! unreachable machine or a template that fails setup there, becomes a single
//! host-tagged error element and the other hosts carry on.

use crate::cluster::{Cluster, Host};
use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::node::{Emit, Flow, Op, OpSpec};
use crate::ops::fork::merge_branches;
use crate::pipeline::{Invocation, Pipeline, Template};
use crate::runner::CancelToken;
use crate::transport::Transport;
use crate::value::{ErrorValue, Value};
use std::sync::Arc;
use tracing::warn;

/// Run `template` on every host of `cluster`. A one-parameter template
/// receives the host.
pub fn remote(cluster: impl Into<String>, template: impl Into<Template>) -> Pipeline {
    Pipeline::of(RemoteSpec {
        cluster: cluster.into(),
        template: template.into(),
    })
}

struct RemoteSpec {
    cluster: String,
    template: Template,
}

impl OpSpec for RemoteSpec {
    fn name(&self) -> &'static str {
        "remote"
    }

    fn is_source(&self) -> bool {
        true
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(RemoteOp {
            cluster_name: self.cluster.clone(),
            template: self.template.clone(),
            prepared: None,
        })
    }
}

struct Prepared {
    cluster: Arc<Cluster>,
    transport: Arc<dyn Transport>,
    env: Env,
    cancel: CancelToken,
    jobs: Vec<(Host, Invocation)>,
}

struct RemoteOp {
    cluster_name: String,
    template: Template,
    prepared: Option<Prepared>,
}

/// Prefixes every element with its host.
struct HostTag<'a> {
    host: &'a Host,
    inner: &'a mut dyn Emit,
}

impl Emit for HostTag<'_> {
    fn emit(&mut self, x: Value) -> Result<Flow> {
        let tagged = match x {
            Value::Error(e) => Value::Error(ErrorValue {
                host: Some(self.host.clone()),
                ..e
            }),
            Value::Tuple(fields) => {
                Value::tuple(std::iter::once(Value::Host(self.host.clone())).chain(fields))
            }
            scalar => Value::tuple([Value::Host(self.host.clone()), scalar]),
        };
        self.inner.emit(tagged)
    }
}

impl Op for RemoteOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        let cluster = env.cluster(&self.cluster_name)?;
        if self.template.arity() > 1 {
            return Err(CommandError::Arity(
                "remote pipeline must have no more than one parameter".to_string(),
            ));
        }
        let jobs = cluster
            .hosts()
            .iter()
            .map(|h| {
                let args = if self.template.arity() == 1 {
                    vec![Value::Host(h.clone())]
                } else {
                    Vec::new()
                };
                Ok((h.clone(), self.template.call(args)?))
            })
            .collect::<Result<_>>()?;
        let (env, cancel) = env.cancellable();
        self.prepared = Some(Prepared {
            cluster,
            transport: env.transport(),
            env,
            cancel,
            jobs,
        });
        Ok(())
    }

    fn produce(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        let Some(p) = self.prepared.take() else {
            return Ok(Flow::Continue);
        };
        let (cluster, transport, env) = (&p.cluster, &p.transport, &p.env);
        merge_branches(
            p.jobs,
            &p.cancel,
            |(host, job): (Host, Invocation), sink| {
                let mut tagged = HostTag { host: &host, inner: sink };
                if let Err(e) = transport.execute(cluster, &host, &job, env, &mut tagged) {
                    warn!(host = %host, error = %e, "remote branch failed");
                    let fault = ErrorValue::new(format!("{e:#}")).on_host(host.clone());
                    let _ = tagged.emit(Value::Error(fault))?;
                }
                Ok(())
            },
            out,
        )
    }

    fn receive(&mut self, _x: Value, _out: &mut dyn Emit) -> Result<Flow> {
        Ok(Flow::Continue)
    }
}
