//! File transfer between the local machine and a cluster.
//!
//! Sources are wildcard patterns: expanded locally for `upload`, on each host
//! for `download`. Hosts are serviced in parallel on a rayon pool sized by
//! the session's `transfer_parallelism`. A file that fails to transfer
//! becomes one host-tagged error element; the rest still transfer. Successful
//! transfers emit nothing.

use crate::cluster::{Cluster, Host};
use crate::env::Env;
use crate::error::{CommandError, Result};
use crate::io::glob::expand_all;
use crate::node::{Emit, Flow, Op, OpSpec};
use crate::ops::basic::emit_all;
use crate::pipeline::Pipeline;
use crate::transport::Transport;
use crate::value::{ErrorValue, Value};
use anyhow::Context;
use rayon::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Direction {
    Upload,
    Download,
}

/// Copy local files matching `sources` into `target_dir` on every host of
/// `cluster`. `target_dir` must be absolute.
pub fn upload<S: Into<String>>(
    cluster: impl Into<String>,
    target_dir: impl Into<String>,
    sources: impl IntoIterator<Item = S>,
) -> Pipeline {
    transfer(Direction::Upload, cluster, target_dir, sources)
}

/// Copy files matching `sources` on every host of `cluster` into
/// `target_dir/<host>/`.
pub fn download<S: Into<String>>(
    target_dir: impl Into<String>,
    cluster: impl Into<String>,
    sources: impl IntoIterator<Item = S>,
) -> Pipeline {
    transfer(Direction::Download, cluster, target_dir, sources)
}

fn transfer<S: Into<String>>(
    direction: Direction,
    cluster: impl Into<String>,
    target_dir: impl Into<String>,
    sources: impl IntoIterator<Item = S>,
) -> Pipeline {
    Pipeline::of(TransferSpec {
        direction,
        cluster: cluster.into(),
        target_dir: target_dir.into(),
        sources: sources.into_iter().map(Into::into).collect(),
    })
}

struct TransferSpec {
    direction: Direction,
    cluster: String,
    target_dir: String,
    sources: Vec<String>,
}

impl OpSpec for TransferSpec {
    fn name(&self) -> &'static str {
        match self.direction {
            Direction::Upload => "upload",
            Direction::Download => "download",
        }
    }

    fn is_source(&self) -> bool {
        true
    }

    fn instantiate(&self) -> Box<dyn Op> {
        Box::new(TransferOp {
            direction: self.direction,
            cluster_name: self.cluster.clone(),
            target_dir: PathBuf::from(&self.target_dir),
            sources: self.sources.clone(),
            plan: None,
        })
    }
}

struct Plan {
    cluster: Arc<Cluster>,
    transport: Arc<dyn Transport>,
    parallelism: usize,
    /// Local files for an upload.
    files: Vec<PathBuf>,
}

struct TransferOp {
    direction: Direction,
    cluster_name: String,
    target_dir: PathBuf,
    sources: Vec<String>,
    plan: Option<Plan>,
}

fn fault(host: &Host, e: &anyhow::Error) -> Value {
    warn!(host = %host, error = %e, "transfer failed");
    Value::Error(ErrorValue::new(format!("{e:#}")).on_host(host.clone()))
}

impl TransferOp {
    fn upload_to(&self, plan: &Plan, host: &Host) -> Vec<Value> {
        plan.files
            .iter()
            .filter_map(|f| {
                plan.transport
                    .upload(&plan.cluster, host, f, &self.target_dir)
                    .err()
                    .map(|e| fault(host, &e))
            })
            .collect()
    }

    fn download_from(&self, plan: &Plan, host: &Host) -> Vec<Value> {
        let mut faults = Vec::new();
        for pattern in &self.sources {
            let files = match plan.transport.list_remote(&plan.cluster, host, pattern) {
                Ok(files) if files.is_empty() => {
                    let e = anyhow::anyhow!("{pattern}: No such file or directory");
                    faults.push(fault(host, &e));
                    continue;
                }
                Ok(files) => files,
                Err(e) => {
                    faults.push(fault(host, &e));
                    continue;
                }
            };
            for f in files {
                match plan.transport.download(&plan.cluster, host, &f, &self.target_dir) {
                    Ok(local) => debug!(host = %host, file = %local.display(), "downloaded"),
                    Err(e) => faults.push(fault(host, &e)),
                }
            }
        }
        faults
    }
}

impl Op for TransferOp {
    fn setup(&mut self, env: &Env) -> Result<()> {
        let cluster = env.cluster(&self.cluster_name)?;
        let files = match self.direction {
            Direction::Upload => {
                if !self.target_dir.is_absolute() {
                    return Err(CommandError::invalid(format!(
                        "Target directory must be absolute: {}",
                        self.target_dir.display()
                    )));
                }
                let files = expand_all(&self.sources)?;
                if files.is_empty() {
                    return Err(CommandError::invalid("No qualifying paths"));
                }
                files
            }
            Direction::Download => {
                if self.sources.is_empty() {
                    return Err(CommandError::invalid("No remote files specified"));
                }
                Vec::new()
            }
        };
        self.plan = Some(Plan {
            cluster,
            transport: env.transport(),
            parallelism: env.transfer_parallelism(),
            files,
        });
        Ok(())
    }

    fn produce(&mut self, out: &mut dyn Emit) -> Result<Flow> {
        let Some(plan) = self.plan.take() else {
            return Ok(Flow::Continue);
        };
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(plan.parallelism)
            .build()
            .context("build transfer pool")?;
        let per_host: Vec<Vec<Value>> = pool.install(|| {
            plan.cluster
                .hosts()
                .par_iter()
                .map(|host| match self.direction {
                    Direction::Upload => self.upload_to(&plan, host),
                    Direction::Download => self.download_from(&plan, host),
                })
                .collect()
        });
        emit_all(per_host.into_iter().flatten(), out)
    }

    fn receive(&mut self, _x: Value, _out: &mut dyn Emit) -> Result<Flow> {
        Ok(Flow::Continue)
    }
}
