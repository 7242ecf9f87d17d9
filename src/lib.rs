//! # Ironpipe
//!
//! An **object-streaming command pipeline engine**. Pipelines are linear
//! chains of ops that pass structured values (integers, strings, tuples,
//! hosts, errors) from one stage to the next, with fan-out across worker
//! threads or the hosts of a cluster.
//!
//! ## Key Features
//!
//! - **Composable pipelines** - chain ops with `|`; a pipeline is a plain value you can store and rerun
//! - **Grouping engines** - reduce (batch and incremental), windows, joins and set algebra
//! - **Templates** - parameterized pipelines instantiated per element (`args`), per unit (`fork`) or per host (`remote`)
//! - **Reservoirs** - named session-scoped buffers, optionally persisted as JSON Lines
//! - **Errors as data** - per-element faults flow downstream as [`Value::Error`]; only setup-level problems abort a command
//!
//! ## Quick Start
//!
//! ```
//! use ironpipe::prelude::*;
//!
//! # fn main() -> anyhow::Result<()> {
//! let session = Session::new(SessionConfig::default());
//!
//! // Sum of squares of 0..10, grouped by parity.
//! let p = generate(10, 0)
//!     | map(|x| Ok(Value::tuple([x.rem(&Value::Int(2))?, x.mul(x)?])))
//!     | reduce(vec![Slot::group(), Slot::from(r_plus())])
//!     | sort();
//!
//! let out = session.gather(&p)?;
//! assert_eq!(out, vec![
//!     Value::tuple([Value::Int(0), Value::Int(120)]),
//!     Value::tuple([Value::Int(1), Value::Int(165)]),
//! ]);
//! # Ok(())
//! # }
//! ```
//!
//! ## Core Concepts
//!
//! ### Pipeline
//!
//! A [`Pipeline`] is an immutable sequence of [`OpSpec`]s. Running it builds
//! a fresh [`Instance`](runner::Instance) with private per-op state, so the
//! same pipeline can be used any number of times, including concurrently.
//!
//! ### Commands and errors
//!
//! Running a pipeline through a [`Session`] is a command. Each op validates
//! its arguments in `setup` before any element flows; a failure there (or an
//! unhashable key in a join) is a [`CommandError`] and ends the command.
//! Everything else, such as a division by zero inside `map`, becomes a
//! [`Value::Error`] element and the stream carries on.
//!
//! ### Fan-out
//!
//! `fork`, `remote`, `upload` and `download` run one branch per unit. Branch
//! output is merged into the calling stream with no ordering between branches.
//! Hosts are reached through a [`Transport`]; the bundled
//! [`LoopbackTransport`] runs every host in-process.

pub mod cluster;
pub mod combiners;
pub mod config;
pub mod env;
pub mod error;
pub mod io;
pub mod node;
pub mod ops;
pub mod param;
pub mod pipeline;
pub mod reservoir;
pub mod runner;
pub mod session;
pub mod testing;
pub mod transport;
pub mod value;

pub use cluster::{Cluster, Host};
pub use combiners::Reducer;
pub use config::{ClusterConfig, SessionConfig};
pub use env::Env;
pub use error::CommandError;
pub use node::{Emit, Flow, Op, OpSpec};
pub use param::Param;
pub use pipeline::{Bindings, Invocation, Pipeline, Template};
pub use reservoir::Reservoir;
pub use runner::{CancelToken, RunState};
pub use session::{ErrorHandling, GatherOptions, Gathered, Session};
pub use transport::{LoopbackTransport, Transport};
pub use value::{ErrorValue, Value};

/// Everything needed to build and run pipelines.
pub mod prelude {
    pub use crate::combiners::*;
    pub use crate::ops::*;
    pub use crate::{
        CommandError, ErrorHandling, ErrorValue, GatherOptions, Host, Param, Pipeline,
        Session, SessionConfig, Template, Value,
    };
}
