//! Concurrent fan-out of a pipeline template, and the merge shared with
//! `remote`.
//!
//! Every branch runs on its own scoped thread and sends elements into one
//! channel; the calling thread drains it into the downstream stages. Each
//! branch's own order is preserved. There is no ordering between branches.
//!
//! All branches are instantiated and validated before any of them starts, so
//! a setup failure in one unit aborts the command with no partial output.
//! Branches are validated against a cancellable environment, so once
//! downstream has what it needs every branch stops at its next internal
//! delivery, whether or not it ever reaches the merge point.

use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::node::{Emit, Flow, Op, OpSpec};
use crate::param::Param;
use crate::pipeline::{Pipeline, Template};
use crate::runner::{CancelToken, Instance};
use crate::value::Value;
use crossbeam_channel::{Sender, unbounded};
use tracing::debug;

enum Msg {
    Item(Value),
    Failed(CommandError),
}

/// A branch's view of the merge point.
struct ChannelSink<'a> {
    tx: &'a Sender<Msg>,
    cancel: &'a CancelToken,
}

impl Emit for ChannelSink<'_> {
    fn emit(&mut self, x: Value) -> Result<Flow> {
        if self.cancel.is_cancelled() || self.tx.send(Msg::Item(x)).is_err() {
            return Ok(Flow::Stop);
        }
        Ok(Flow::Continue)
    }
}

/// Run every branch concurrently with `run` and merge their output into
/// `out`.
///
/// When downstream stops, or a branch fails fatally, `cancel` is cancelled.
/// Branches validated against the environment that owns it stop promptly. The
/// first fatal error wins.
pub(crate) fn merge_branches<B, F>(
    branches: Vec<B>,
    cancel: &CancelToken,
    run: F,
    out: &mut dyn Emit,
) -> Result<Flow>
where
    B: Send,
    F: Fn(B, &mut dyn Emit) -> Result<()> + Sync,
{
    let (tx, rx) = unbounded::<Msg>();
    let mut flow = Flow::Continue;
    let mut fatal: Option<CommandError> = None;

    std::thread::scope(|s| {
        for (i, branch) in branches.into_iter().enumerate() {
            let tx = tx.clone();
            let run = &run;
            s.spawn(move || {
                debug!(branch = i, "branch started");
                let mut sink = ChannelSink { tx: &tx, cancel };
                if let Err(e) = run(branch, &mut sink) {
                    let _ = tx.send(Msg::Failed(e));
                }
                debug!(branch = i, "branch finished");
            });
        }
        drop(tx);

        for msg in rx.iter() {
            match msg {
                Msg::Item(_) if flow.is_stop() || fatal.is_some() => {}
                Msg::Item(x) => match out.emit(x) {
                    Ok(Flow::Continue) => {}
                    Ok(Flow::Stop) => {
                        flow = Flow::Stop;
                        cancel.cancel();
                    }
                    Err(e) => {
                        fatal = Some(e);
                        cancel.cancel();
                    }
                },
                Msg::Failed(e) => {
                    fatal.get_or_insert(e);
                    cancel.cancel();
                }
            }
        }
    });

    match fatal {
        Some(e) => Err(e),
        None => Ok(flow),
    }
}

/// The units a fork fans out over.
#[derive(Clone, Debug)]
pub enum Fanout {
    /// Units `0..n`.
    Count(Param),
    /// One unit per label.
    Labels(Vec<Value>),
    /// One unit per host of the named cluster.
    Cluster(String),
}

impl Fanout {
    pub fn count(n: impl Into<Param>) -> Self {
        Fanout::Count(n.into())
    }

    pub fn labels(labels: impl IntoIterator<Item = Value>) -> Self {
        Fanout::Labels(labels.into_iter().collect())
    }

    pub fn cluster(name: impl Into<String>) -> Self {
        Fanout::Cluster(name.into())
    }

    fn units(&self, env: &Env) -> Result<Vec<Value>> {
        Ok(match self {
            Fanout::Count(n) => {
                let n = n.resolve_usize(env, "count")?;
                (0..n).map(|i| Value::Int(i as i64)).collect()
            }
            Fanout::Labels(labels) => labels.clone(),
            Fanout::Cluster(name) => {
                env.cluster(name)?.hosts().iter().cloned().map(Value::Host).collect()
            }
        })
    }
}

/// Run one copy of `template` per unit of `over`, concurrently. A
/// one-parameter template receives its unit (index, label or host).
pub fn fork(over: Fanout, template: impl Into<Template>) -> Pipeline {
    Pipeline::of(ForkSpec {
        over,
        template: template.into(),
    })
}

struct ForkSpec {
    over: Fanout,
    template: Template,
}

impl OpSpec for ForkSpec {
    fn name(&self) -> &'static str {
        "fork"
    }

    fn is_source(&self) -> bool {
        true
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(ForkOp {
            over: self.over.clone(),
            template: self.template.clone(),
            branches: Vec::new(),
            cancel: CancelToken::new(),
        })
    }
}

struct ForkOp {
    over: Fanout,
    template: Template,
    branches: Vec<Instance>,
    cancel: CancelToken,
}

impl Op for ForkOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        if self.template.arity() > 1 {
            return Err(CommandError::Arity(
                "fork pipeline must have no more than one parameter".to_string(),
            ));
        }
        let (branch_env, cancel) = env.cancellable();
        self.cancel = cancel;
        for unit in self.over.units(env)? {
            let args = if self.template.arity() == 1 { vec![unit] } else { Vec::new() };
            let inst = self.template.call(args)?.prepare(&branch_env)?;
            self.branches.push(inst);
        }
        debug!(branches = self.branches.len(), "fork validated");
        Ok(())
    }

    fn produce(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        let branches = std::mem::take(&mut self.branches);
        merge_branches(branches, &self.cancel, |mut inst: Instance, sink| inst.run(sink), out)
    }

    fn receive(&mut self, _x: Value, _out: &mut dyn Emit) -> Result<Flow> {
        Ok(Flow::Continue)
    }
}
