//! The execution environment passed into every op's `setup`.
//!
//! An [`Env`] is cheap to clone. Clones share the session-wide part (global
//! bindings, clusters, the transport, the reservoir directory). Parameter
//! bindings introduced by a template call live in an immutable scope chain
//! layered on top, so a nested pipeline sees its own arguments and those of
//! the pipelines that enclose it, and sibling invocations never see each
//! other's.

use crate::cluster::Cluster;
use crate::config::SessionConfig;
use crate::error::{CommandError, Result};
use crate::reservoir::{Reservoir, is_identifier};
use crate::runner::CancelToken;
use crate::transport::Transport;
use crate::value::Value;
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// What a global name is bound to.
#[derive(Clone, Debug)]
pub enum Binding {
    Value(Value),
    Reservoir(Reservoir),
}

struct Shared {
    globals: RwLock<HashMap<String, Binding>>,
    clusters: HashMap<String, Arc<Cluster>>,
    transport: Arc<dyn Transport>,
    reservoir_dir: Option<PathBuf>,
    transfer_parallelism: usize,
}

struct Scope {
    vars: Vec<(String, Value)>,
    parent: Option<Arc<Scope>>,
}

#[derive(Clone)]
pub struct Env {
    shared: Arc<Shared>,
    scope: Option<Arc<Scope>>,
    cancel: Option<CancelToken>,
}

impl fmt::Debug for Env {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut clusters: Vec<_> = self.shared.clusters.keys().collect();
        clusters.sort();
        f.debug_struct("Env")
            .field("clusters", &clusters)
            .field("reservoir_dir", &self.shared.reservoir_dir)
            .finish_non_exhaustive()
    }
}

impl Env {
    pub fn new(config: &SessionConfig, transport: Arc<dyn Transport>) -> Env {
        let clusters = config
            .clusters
            .iter()
            .map(|c| (c.name.clone(), Arc::new(Cluster::from_config(c))))
            .collect();
        Env {
            shared: Arc::new(Shared {
                globals: RwLock::new(HashMap::new()),
                clusters,
                transport,
                reservoir_dir: config.reservoir_dir.clone(),
                transfer_parallelism: config.transfer_parallelism.max(1),
            }),
            scope: None,
            cancel: None,
        }
    }

    /// Look a name up: innermost template bindings first, then global values.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        let mut scope = self.scope.as_deref();
        while let Some(s) = scope {
            if let Some((_, v)) = s.vars.iter().find(|(n, _)| n == name) {
                return Some(v.clone());
            }
            scope = s.parent.as_deref();
        }
        let globals = self.shared.globals.read().unwrap_or_else(PoisonError::into_inner);
        match globals.get(name) {
            Some(Binding::Value(v)) => Some(v.clone()),
            _ => None,
        }
    }

    /// A child environment with `vars` bound on top of this one.
    #[must_use]
    pub fn with_bindings(&self, vars: Vec<(String, Value)>) -> Env {
        if vars.is_empty() {
            return self.clone();
        }
        Env {
            shared: Arc::clone(&self.shared),
            scope: Some(Arc::new(Scope {
                vars,
                parent: self.scope.clone(),
            })),
            cancel: self.cancel.clone(),
        }
    }

    /// A child environment with a fresh [`CancelToken`], returned alongside
    /// it. Instances validated against the child stop once the token, or any
    /// token of an enclosing environment, is cancelled.
    #[must_use]
    pub fn cancellable(&self) -> (Env, CancelToken) {
        let token = match &self.cancel {
            Some(outer) => outer.child(),
            None => CancelToken::new(),
        };
        let env = Env {
            shared: Arc::clone(&self.shared),
            scope: self.scope.clone(),
            cancel: Some(token.clone()),
        };
        (env, token)
    }

    pub fn cancel_token(&self) -> Option<&CancelToken> {
        self.cancel.as_ref()
    }

    pub fn set_var(&self, name: impl Into<String>, value: Value) {
        self.shared
            .globals
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.into(), Binding::Value(value));
    }

    /// Resolve `name` to a reservoir, creating it on first use.
    ///
    /// # Errors
    /// [`CommandError::NotAnIdentifier`] for a malformed name,
    /// [`CommandError::NotAReservoir`] when the name holds a plain value.
    pub fn reservoir(&self, name: &str) -> Result<Reservoir> {
        if !is_identifier(name) {
            return Err(CommandError::NotAnIdentifier(name.to_string()));
        }
        if let Some(found) = self.bound_reservoir(name)? {
            return Ok(found);
        }
        let opened = self.open_reservoir(name)?;
        let mut globals = self.shared.globals.write().unwrap_or_else(PoisonError::into_inner);
        match globals.entry(name.to_string()).or_insert_with(|| {
            debug!(reservoir = name, "created reservoir");
            Binding::Reservoir(opened)
        }) {
            Binding::Reservoir(r) => Ok(r.clone()),
            Binding::Value(_) => Err(CommandError::NotAReservoir(name.to_string())),
        }
    }

    fn bound_reservoir(&self, name: &str) -> Result<Option<Reservoir>> {
        let globals = self.shared.globals.read().unwrap_or_else(PoisonError::into_inner);
        match globals.get(name) {
            Some(Binding::Reservoir(r)) => Ok(Some(r.clone())),
            Some(Binding::Value(_)) => Err(CommandError::NotAReservoir(name.to_string())),
            None => Ok(None),
        }
    }

    #[cfg(feature = "durable-reservoirs")]
    fn open_reservoir(&self, name: &str) -> Result<Reservoir> {
        match &self.shared.reservoir_dir {
            Some(dir) => Ok(Reservoir::durable(name, dir)?),
            None => Ok(Reservoir::new(name)),
        }
    }

    #[cfg(not(feature = "durable-reservoirs"))]
    fn open_reservoir(&self, name: &str) -> Result<Reservoir> {
        Ok(Reservoir::new(name))
    }

    /// Every reservoir bound so far, in name order.
    pub fn reservoirs(&self) -> Vec<Reservoir> {
        let globals = self.shared.globals.read().unwrap_or_else(PoisonError::into_inner);
        let mut out: Vec<Reservoir> = globals
            .values()
            .filter_map(|b| match b {
                Binding::Reservoir(r) => Some(r.clone()),
                Binding::Value(_) => None,
            })
            .collect();
        out.sort_by(|a, b| a.name().cmp(b.name()));
        out
    }

    /// # Errors
    /// [`CommandError::UnknownCluster`] when no cluster has that name.
    pub fn cluster(&self, name: &str) -> Result<Arc<Cluster>> {
        self.shared
            .clusters
            .get(name)
            .cloned()
            .ok_or_else(|| CommandError::UnknownCluster(name.to_string()))
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.shared.transport)
    }

    pub fn transfer_parallelism(&self) -> usize {
        self.shared.transfer_parallelism
    }
}
