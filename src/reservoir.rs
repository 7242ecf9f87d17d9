//! Named intermediate buffers.
//!
//! A [`Reservoir`] is an append-only ordered collection shared by everything
//! that resolves the same name in one session. Appends from concurrent
//! branches are serialized by a mutex, so an element is never split or
//! duplicated, and a load observes every append that happened before it.
//!
//! With the `durable-reservoirs` feature and a configured directory, a
//! reservoir is seeded from `<dir>/<name>.jsonl` when first resolved and
//! written back by [`Reservoir::persist`].

use crate::value::Value;
use anyhow::Result;
use regex::Regex;
use std::path::PathBuf;
use std::sync::{Arc, LazyLock, Mutex, MutexGuard};
use tracing::debug;

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("valid identifier regex"));

/// Whether `name` is an identifier-shaped token.
pub fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

#[derive(Clone, Debug)]
pub struct Reservoir {
    name: Arc<str>,
    items: Arc<Mutex<Vec<Value>>>,
    #[cfg_attr(not(feature = "durable-reservoirs"), allow(dead_code))]
    path: Option<PathBuf>,
}

impl Reservoir {
    /// An in-memory reservoir.
    pub fn new(name: &str) -> Self {
        Self {
            name: Arc::from(name),
            items: Arc::new(Mutex::new(Vec::new())),
            path: None,
        }
    }

    /// A reservoir backed by `<dir>/<name>.jsonl`, seeded from the file if it
    /// exists.
    ///
    /// # Errors
    /// The backing file exists but cannot be read or decoded.
    #[cfg(feature = "durable-reservoirs")]
    pub fn durable(name: &str, dir: &std::path::Path) -> Result<Self> {
        use anyhow::Context;
        let path = dir.join(format!("{name}.jsonl"));
        let items = if path.exists() {
            crate::io::jsonl::read_values(&path)
                .with_context(|| format!("load reservoir {name}"))?
        } else {
            Vec::new()
        };
        debug!(reservoir = name, path = %path.display(), n = items.len(), "opened durable reservoir");
        Ok(Self {
            name: Arc::from(name),
            items: Arc::new(Mutex::new(items)),
            path: Some(path),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Value>> {
        self.items.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn append(&self, x: Value) {
        self.lock().push(x);
    }

    pub fn extend(&self, xs: impl IntoIterator<Item = Value>) {
        self.lock().extend(xs);
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Copy of the current contents.
    pub fn snapshot(&self) -> Vec<Value> {
        self.lock().clone()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Write the contents to the backing file, if any.
    ///
    /// # Errors
    /// The file cannot be written.
    pub fn persist(&self) -> Result<()> {
        #[cfg(feature = "durable-reservoirs")]
        if let Some(path) = &self.path {
            let items = self.snapshot();
            crate::io::jsonl::write_values(path, &items)?;
            debug!(reservoir = %self.name, n = items.len(), "persisted reservoir");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_shape() {
        assert!(is_identifier("x"));
        assert!(is_identifier("_tmp9"));
        assert!(!is_identifier("9x"));
        assert!(!is_identifier("/tmp/storeload.test"));
        assert!(!is_identifier(""));
    }

    #[test]
    fn concurrent_appends_are_not_lost() {
        let r = Reservoir::new("r");
        std::thread::scope(|s| {
            for t in 0..4 {
                let r = r.clone();
                s.spawn(move || {
                    for i in 0..250 {
                        r.append(Value::Int(t * 1000 + i));
                    }
                });
            }
        });
        assert_eq!(r.len(), 1000);
    }

    #[cfg(feature = "durable-reservoirs")]
    #[test]
    fn durable_round_trip() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let r = Reservoir::durable("saved", dir.path())?;
        r.extend([Value::Int(1), Value::from("two")]);
        r.persist()?;
        let again = Reservoir::durable("saved", dir.path())?;
        assert_eq!(again.snapshot(), vec![Value::Int(1), Value::from("two")]);
        Ok(())
    }
}
