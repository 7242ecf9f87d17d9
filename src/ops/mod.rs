//! The op library.
//!
//! Every constructor returns a one-stage [`Pipeline`](crate::Pipeline), so ops
//! compose with `|`:
//!
//! ```
//! use ironpipe::prelude::*;
//!
//! let session = Session::new(SessionConfig::default());
//! let evens = generate(10, 0) | select(|x| Ok(x.as_int().is_some_and(|n| n % 2 == 0))) | head(3);
//! assert_eq!(session.gather(&evens)?, vec![Value::Int(0), Value::Int(2), Value::Int(4)]);
//! # Ok::<(), ironpipe::CommandError>(())
//! ```

pub mod args;
pub mod basic;
pub mod fork;
pub mod generate;
pub mod join;
pub mod reduce;
pub mod remote;
pub mod setops;
pub mod store;
pub mod tee;
pub mod transfer;
pub mod window;

pub use args::args;
pub use basic::{
    expand, head, map, reverse, select, sort, sort_by, squish, tail, unique, unique_consecutive,
};
pub use fork::{Fanout, fork};
pub use generate::{generate, generate_padded, values};
pub use join::{JoinOptions, join, join_keep, join_with};
pub use reduce::{Slot, reduce, reduce_incremental};
pub use remote::remote;
pub use setops::{difference, intersect, union};
pub use store::{load, store, store_append};
pub use tee::{ifelse, ifthen, tee};
pub use transfer::{download, upload};
pub use window::{WindowArgs, window};
