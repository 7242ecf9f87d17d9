//! Testing utilities for Ironpipe pipelines.
//!
//! - **Assertions**: compare gathered output with expected values, in order or
//!   as a multiset (fan-out ops make no promise about branch interleaving)
//! - **Builders**: [`ints`] and [`tuple`] for writing expected values tersely
//! - **Sessions**: [`TestSession`], a session over a loopback cluster whose
//!   hosts and durable reservoirs live in a temporary directory
//!
//! # Quick Start
//!
//! ```
//! use ironpipe::prelude::*;
//! use ironpipe::testing::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let ts = TestSession::new()?;
//! let out = ts.gather(&(generate(3, 1) | map(|x| x.mul(&Value::Int(2)))))?;
//! assert_collections_equal(&out, &ints([2, 4, 6]));
//! # Ok(())
//! # }
//! ```

pub mod assertions;

pub use assertions::*;

use crate::config::SessionConfig;
use crate::env::Env;
use crate::session::Session;
use crate::transport::LoopbackTransport;
use crate::value::Value;
use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;

/// Name of the cluster every [`TestSession`] declares.
pub const TEST_CLUSTER: &str = "lab";

/// Hosts of [`TEST_CLUSTER`].
pub const TEST_HOSTS: [&str; 3] = ["alpha", "beta", "gamma"];

/// Integer values, in order.
pub fn ints<I: IntoIterator<Item = i64>>(xs: I) -> Vec<Value> {
    xs.into_iter().map(Value::Int).collect()
}

/// A tuple value from anything convertible to [`Value`].
pub fn tuple<I, V>(fields: I) -> Value
where
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    Value::tuple(fields.into_iter().map(Into::into))
}

/// A bare environment with no clusters, for exercising ops and parameters
/// directly.
pub fn test_env() -> Env {
    Env::new(&SessionConfig::default(), Arc::new(LoopbackTransport::new()))
}

/// A [`Session`] wired to a throwaway directory.
///
/// Each host of [`TEST_CLUSTER`] sees its own filesystem under
/// `<tmp>/hosts/<host>/`, durable reservoirs live in `<tmp>/reservoirs/`, and
/// `<tmp>/local/` is free for the test's own files. Everything is removed
/// when the value is dropped.
pub struct TestSession {
    session: Session,
    dir: TempDir,
}

impl TestSession {
    /// # Errors
    /// The temporary directory cannot be created.
    pub fn new() -> Result<Self> {
        Self::with_unreachable(&[])
    }

    /// Like [`TestSession::new`], with `hosts` refusing every connection.
    ///
    /// # Errors
    /// The temporary directory cannot be created.
    pub fn with_unreachable(hosts: &[&str]) -> Result<Self> {
        let dir = tempfile::tempdir().context("create test directory")?;
        let reservoirs = dir.path().join("reservoirs");
        let local = dir.path().join("local");
        std::fs::create_dir_all(&reservoirs).context("create reservoir directory")?;
        std::fs::create_dir_all(&local).context("create local directory")?;

        let config = SessionConfig::default()
            .with_cluster(TEST_CLUSTER, &TEST_HOSTS)
            .with_reservoir_dir(reservoirs);
        let transport = hosts.iter().fold(
            LoopbackTransport::new().with_root(dir.path().join("hosts")),
            |t, h| t.with_unreachable(*h),
        );
        Ok(Self {
            session: Session::with_transport(config, Arc::new(transport)),
            dir,
        })
    }

    /// Scratch space for local files.
    pub fn local_dir(&self) -> PathBuf {
        self.dir.path().join("local")
    }

    /// Where `path` on `host` lives on the local disk.
    pub fn host_path(&self, host: &str, path: impl AsRef<Path>) -> PathBuf {
        let relative: PathBuf = path
            .as_ref()
            .components()
            .filter(|c| matches!(c, std::path::Component::Normal(_)))
            .collect();
        self.dir.path().join("hosts").join(host).join(relative)
    }

    /// Directory holding this session's durable reservoirs.
    pub fn reservoir_dir(&self) -> PathBuf {
        self.dir.path().join("reservoirs")
    }

    /// Close the session, persisting reservoirs, and hand back the directory
    /// so a test can reopen it.
    ///
    /// # Errors
    /// See [`Session::close`].
    pub fn close(self) -> Result<TempDir> {
        self.session.close()?;
        Ok(self.dir)
    }
}

impl std::ops::Deref for TestSession {
    type Target = Session;

    fn deref(&self) -> &Self::Target {
        &self.session
    }
}

impl AsRef<Session> for TestSession {
    fn as_ref(&self) -> &Session {
        &self.session
    }
}
