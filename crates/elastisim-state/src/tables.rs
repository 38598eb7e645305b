//! redb table definitions for the run recorder.
//!
//! Both tables use `&str` keys of the form `{run_id}:{seq:010}` and `&[u8]`
//! JSON values.

use redb::TableDefinition;

/// One record per monitor tick.
pub const TICKS: RecordTable = TableDefinition::new("ticks");

/// One record per scale-up, scale-down, or failed creation.
pub const SCALING_EVENTS: RecordTable = TableDefinition::new("scaling_events");

/// Shape shared by every table in the store.
pub type RecordTable = TableDefinition<'static, &'static str, &'static [u8]>;
