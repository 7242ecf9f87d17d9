//! Session configuration.
//!
//! A [`SessionConfig`] declares the clusters a session can dispatch to, where
//! durable reservoirs live, and how many hosts a transfer services at once.
//! Locating and reading the configuration file is up to the caller; this
//! module only parses an already-loaded JSON document.
//!
//! ```
//! use ironpipe::SessionConfig;
//!
//! let cfg = SessionConfig::from_json_str(r#"{
//!     "clusters": [{ "name": "lab", "hosts": ["n1", "n2"], "user": "ops" }]
//! }"#)?;
//! assert_eq!(cfg.clusters[0].hosts.len(), 2);
//! # Ok::<(), anyhow::Error>(())
//! ```

use anyhow::{Context, Result, bail};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::PathBuf;

/// One named group of hosts and the credentials used to reach them.
#[derive(Clone, Debug, Deserialize)]
pub struct ClusterConfig {
    pub name: String,
    pub hosts: Vec<String>,
    #[serde(default)]
    pub user: Option<String>,
    /// Path to the private key used by the connection collaborator.
    #[serde(default)]
    pub identity: Option<PathBuf>,
}

#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    pub clusters: Vec<ClusterConfig>,
    /// Directory holding durable reservoirs (`<name>.jsonl`). `None` keeps
    /// reservoirs in memory only.
    pub reservoir_dir: Option<PathBuf>,
    /// Upper bound on hosts serviced concurrently by upload/download.
    pub transfer_parallelism: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            clusters: Vec::new(),
            reservoir_dir: None,
            transfer_parallelism: num_cpus::get().max(1),
        }
    }
}

impl SessionConfig {
    /// Parse and validate a JSON configuration document.
    ///
    /// # Errors
    /// Malformed JSON, duplicate cluster names, clusters without hosts, or a
    /// zero `transfer_parallelism`.
    pub fn from_json_str(json: &str) -> Result<Self> {
        let cfg: SessionConfig =
            serde_json::from_str(json).context("parse session configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    #[must_use]
    pub fn with_cluster(mut self, name: &str, hosts: &[&str]) -> Self {
        self.clusters.push(ClusterConfig {
            name: name.to_string(),
            hosts: hosts.iter().map(|h| (*h).to_string()).collect(),
            user: None,
            identity: None,
        });
        self
    }

    #[must_use]
    pub fn with_reservoir_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.reservoir_dir = Some(dir.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        let mut seen = HashSet::new();
        for c in &self.clusters {
            if !seen.insert(c.name.as_str()) {
                bail!("cluster {} is declared more than once", c.name);
            }
            if c.hosts.is_empty() {
                bail!("cluster {} has no hosts", c.name);
            }
        }
        if self.transfer_parallelism == 0 {
            bail!("transfer_parallelism must be positive");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_fill_missing_fields() {
        let cfg = SessionConfig::from_json_str("{}").unwrap();
        assert!(cfg.clusters.is_empty());
        assert!(cfg.reservoir_dir.is_none());
        assert!(cfg.transfer_parallelism >= 1);
    }

    #[test]
    fn rejects_duplicate_clusters() {
        let err = SessionConfig::from_json_str(
            r#"{"clusters": [{"name": "a", "hosts": ["x"]}, {"name": "a", "hosts": ["y"]}]}"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"));
    }
}
