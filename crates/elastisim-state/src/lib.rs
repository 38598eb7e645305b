//! elastisim-state — persistent record of simulation runs.
//!
//! Backed by [redb](https://docs.rs/redb). Every monitor tick and every
//! scaling action of a run is stored so runs can be inspected or compared
//! after the fact.
//!
//! # Architecture
//!
//! Records are JSON-serialized into redb's `&[u8]` value columns. Keys are
//! `{run_id}:{seq:010}`; the zero-padded sequence number keeps a prefix
//! scan in recording order.

pub mod error;
pub mod store;
pub mod tables;
pub mod types;

pub use error::{StateError, StateResult};
pub use store::RunStore;
pub use types::*;
