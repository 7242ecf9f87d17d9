//! Remote execution targets.

use crate::config::ClusterConfig;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Identity of one remote execution target.
///
/// Hosts are used both for dispatch and as the tag on elements produced by
/// `remote`, so they print as their address and compare by it.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Host {
    addr: String,
}

impl Host {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.addr)
    }
}

/// A named, statically configured set of hosts plus the credentials used to
/// reach them. Immutable once built.
#[derive(Clone, Debug)]
pub struct Cluster {
    name: String,
    hosts: Vec<Host>,
    user: Option<String>,
    identity: Option<PathBuf>,
}

impl Cluster {
    pub fn new(name: impl Into<String>, hosts: impl IntoIterator<Item = Host>) -> Self {
        Self {
            name: name.into(),
            hosts: hosts.into_iter().collect(),
            user: None,
            identity: None,
        }
    }

    pub fn from_config(cfg: &ClusterConfig) -> Self {
        Self {
            name: cfg.name.clone(),
            hosts: cfg.hosts.iter().map(Host::new).collect(),
            user: cfg.user.clone(),
            identity: cfg.identity.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn hosts(&self) -> &[Host] {
        &self.hosts
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn identity(&self) -> Option<&PathBuf> {
        self.identity.as_ref()
    }
}
