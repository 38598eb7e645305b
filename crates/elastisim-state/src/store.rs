//! RunStore — redb-backed recorder for simulation runs.
//!
//! Ticks and scaling events are appended as the simulation progresses and
//! listed back per run in recording order. The store supports on-disk and
//! in-memory backends (the latter for tests and throwaway runs).

use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

#[derive(Clone)]
pub struct RunStore {
    db: Arc<Database>,
}

impl RunStore {
    /// Open (or create) a persistent run store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "run store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory run store.
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory run store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        txn.open_table(TICKS).map_err(map_err!(Table))?;
        txn.open_table(SCALING_EVENTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    // ── Ticks ──────────────────────────────────────────────────────

    pub fn put_tick(&self, record: &TickRecord) -> StateResult<()> {
        self.put(TICKS, &record.table_key(), record)
    }

    /// All ticks of a run, in order.
    pub fn list_ticks(&self, run_id: &str) -> StateResult<Vec<TickRecord>> {
        self.list(TICKS, run_id)
    }

    // ── Scaling events ─────────────────────────────────────────────

    pub fn put_event(&self, record: &ScalingEventRecord) -> StateResult<()> {
        self.put(SCALING_EVENTS, &record.table_key(), record)
    }

    /// All scaling events of a run, in order.
    pub fn list_events(&self, run_id: &str) -> StateResult<Vec<ScalingEventRecord>> {
        self.list(SCALING_EVENTS, run_id)
    }

    // ── Runs ───────────────────────────────────────────────────────

    /// Ids of every run with at least one recorded tick, sorted.
    pub fn list_runs(&self) -> StateResult<Vec<String>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(TICKS).map_err(map_err!(Table))?;
        let mut runs = BTreeSet::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            if let Some((run_id, _)) = key.value().rsplit_once(':') {
                runs.insert(run_id.to_string());
            }
        }
        Ok(runs.into_iter().collect())
    }

    /// Remove every record of a run. Returns the number of records deleted.
    pub fn delete_run(&self, run_id: &str) -> StateResult<u32> {
        let mut deleted = 0;
        for table in [TICKS, SCALING_EVENTS] {
            let keys = self.keys_for_run(table, run_id)?;
            if keys.is_empty() {
                continue;
            }
            let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
            {
                let mut t = txn.open_table(table).map_err(map_err!(Table))?;
                for key in &keys {
                    if t.remove(key.as_str()).map_err(map_err!(Write))?.is_some() {
                        deleted += 1;
                    }
                }
            }
            txn.commit().map_err(map_err!(Transaction))?;
        }
        debug!(%run_id, deleted, "run deleted");
        Ok(deleted)
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn put<T: Serialize>(
        &self,
        table: RecordTable,
        key: &str,
        record: &T,
    ) -> StateResult<()> {
        let value = serde_json::to_vec(record).map_err(map_err!(Serialize))?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut t = txn.open_table(table).map_err(map_err!(Table))?;
            t.insert(key, value.as_slice()).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }

    fn list<T: DeserializeOwned>(
        &self,
        table: RecordTable,
        run_id: &str,
    ) -> StateResult<Vec<T>> {
        let prefix = format!("{run_id}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in t.range(prefix.as_str()..).map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            let record: T = serde_json::from_slice(value.value()).map_err(map_err!(Deserialize))?;
            results.push(record);
        }
        Ok(results)
    }

    fn keys_for_run(
        &self,
        table: RecordTable,
        run_id: &str,
    ) -> StateResult<Vec<String>> {
        let prefix = format!("{run_id}:");
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let t = txn.open_table(table).map_err(map_err!(Table))?;
        let mut keys = Vec::new();
        for entry in t.range(prefix.as_str()..).map_err(map_err!(Read))? {
            let (key, _) = entry.map_err(map_err!(Read))?;
            if !key.value().starts_with(&prefix) {
                break;
            }
            keys.push(key.value().to_string());
        }
        Ok(keys)
    }
}
