//! The remote-connection seam.
//!
//! `remote`, `upload` and `download` talk to hosts only through the
//! [`Transport`] trait. [`LoopbackTransport`] is the in-process
//! implementation: each host's branch runs locally with its elements shipped
//! through the JSON Lines wire codec, and each host's filesystem is either the
//! local one or a per-host subtree of a root directory.

use crate::cluster::{Cluster, Host};
use crate::env::Env;
use crate::io::glob::expand_glob;
use crate::io::jsonl::{decode_line, encode_line};
use crate::node::{Emit, Flow};
use crate::pipeline::Invocation;
use crate::value::Value;
use anyhow::{Context, Result, bail};
use std::collections::HashSet;
use std::fs;
use std::path::{Component, Path, PathBuf};

pub trait Transport: Send + Sync {
    /// Run `job` on `host`, handing each element it produces to `sink`.
    ///
    /// Any error is scoped to this host: the caller renders it as data.
    fn execute(
        &self,
        cluster: &Cluster,
        host: &Host,
        job: &Invocation,
        env: &Env,
        sink: &mut dyn Emit,
    ) -> Result<()>;

    /// Copy the local file `source` into `target_dir` on `host`.
    fn upload(&self, cluster: &Cluster, host: &Host, source: &Path, target_dir: &Path)
    -> Result<()>;

    /// Files on `host` matching `pattern`, sorted.
    fn list_remote(&self, cluster: &Cluster, host: &Host, pattern: &str) -> Result<Vec<PathBuf>>;

    /// Copy `source` from `host` into the local `target_dir`.
    ///
    /// Returns the local path written.
    fn download(
        &self,
        cluster: &Cluster,
        host: &Host,
        source: &Path,
        target_dir: &Path,
    ) -> Result<PathBuf>;
}

/// Runs every host in-process.
#[derive(Debug, Default)]
pub struct LoopbackTransport {
    unreachable: HashSet<Host>,
    root: Option<PathBuf>,
}

impl LoopbackTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Give every host its own filesystem under `root/<host>/`.
    #[must_use]
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.root = Some(root.into());
        self
    }

    /// Make every operation on `host` fail as if it could not be reached.
    #[must_use]
    pub fn with_unreachable(mut self, host: impl Into<String>) -> Self {
        self.unreachable.insert(Host::new(host));
        self
    }

    /// Where `path` on `host` lives locally.
    pub fn host_path(&self, host: &Host, path: &Path) -> PathBuf {
        match &self.root {
            Some(root) => {
                let relative: PathBuf = path
                    .components()
                    .filter(|c| matches!(c, Component::Normal(_)))
                    .collect();
                root.join(host.addr()).join(relative)
            }
            None => path.to_path_buf(),
        }
    }

    fn connect(&self, host: &Host) -> Result<()> {
        if self.unreachable.contains(host) {
            bail!("{host}: connection refused");
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> Result<&std::ffi::OsStr> {
    path.file_name()
        .with_context(|| format!("{}: not a file", path.display()))
}

impl Transport for LoopbackTransport {
    fn execute(
        &self,
        _cluster: &Cluster,
        host: &Host,
        job: &Invocation,
        env: &Env,
        sink: &mut dyn Emit,
    ) -> Result<()> {
        self.connect(host)?;
        let mut inst = job.prepare(env)?;
        let mut wire = |x: Value| -> crate::error::Result<Flow> {
            let line = encode_line(&x)?;
            sink.emit(decode_line(&line)?)
        };
        inst.run(&mut wire)?;
        Ok(())
    }

    fn upload(
        &self,
        _cluster: &Cluster,
        host: &Host,
        source: &Path,
        target_dir: &Path,
    ) -> Result<()> {
        self.connect(host)?;
        let dir = self.host_path(host, target_dir);
        fs::create_dir_all(&dir).with_context(|| format!("{}", target_dir.display()))?;
        let target = dir.join(file_name(source)?);
        fs::copy(source, &target).with_context(|| format!("{}", source.display()))?;
        Ok(())
    }

    fn list_remote(&self, _cluster: &Cluster, host: &Host, pattern: &str) -> Result<Vec<PathBuf>> {
        self.connect(host)?;
        let local = self.host_path(host, Path::new(pattern));
        let found = expand_glob(&local.to_string_lossy())?;
        Ok(match &self.root {
            Some(root) => {
                let base = root.join(host.addr());
                found
                    .into_iter()
                    .map(|p| match p.strip_prefix(&base) {
                        Ok(rel) => Path::new("/").join(rel),
                        Err(_) => p,
                    })
                    .collect()
            }
            None => found,
        })
    }

    fn download(
        &self,
        _cluster: &Cluster,
        host: &Host,
        source: &Path,
        target_dir: &Path,
    ) -> Result<PathBuf> {
        self.connect(host)?;
        let from = self.host_path(host, source);
        let dir = target_dir.join(host.addr());
        fs::create_dir_all(&dir).with_context(|| format!("{}", dir.display()))?;
        let to = dir.join(file_name(source)?);
        fs::copy(&from, &to).with_context(|| format!("{}", source.display()))?;
        Ok(to)
    }
}
