//! File-level helpers: wildcard expansion for transfers and the JSON Lines
//! element codec shared by durable reservoirs and the loopback wire.

pub mod glob;
pub mod jsonl;
