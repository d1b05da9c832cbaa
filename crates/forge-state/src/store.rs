//! StateStore — redb-backed persistence for applied stacks.
//!
//! Provides typed CRUD operations over resources, outputs and secrets.
//! All values are JSON-serialized into redb's `&[u8]` value columns.
//! Each write is its own transaction, so a crash mid-apply leaves every
//! already-recorded resource intact. The store supports both on-disk and
//! in-memory backends (the latter for testing).

use std::path::Path;
use std::sync::Arc;

use redb::{Database, ReadableDatabase, ReadableTable, TableDefinition};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::*;
use crate::types::*;

type Table = TableDefinition<'static, &'static str, &'static [u8]>;

/// Thread-safe state store backed by redb.
#[derive(Clone)]
pub struct StateStore {
    db: Arc<Database>,
}

impl StateStore {
    /// Open (or create) a persistent state store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path)?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "state store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory state store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder().create_with_backend(backend)?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory state store opened");
        Ok(store)
    }

    /// Create all tables if they don't exist yet.
    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write()?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(RESOURCES)?;
        txn.open_table(OUTPUTS)?;
        txn.open_table(SECRETS)?;
        txn.commit()?;
        Ok(())
    }

    // ── Generic table access ───────────────────────────────────────

    fn put<T: Serialize>(&self, table: Table, key: &str, value: &T) -> StateResult<()> {
        let bytes = serde_json::to_vec(value).map_err(|e| StateError::codec(key, e))?;
        let txn = self.db.begin_write()?;
        {
            let mut table = txn.open_table(table)?;
            table.insert(key, bytes.as_slice())?;
        }
        txn.commit()?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, table: Table, key: &str) -> StateResult<Option<T>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(table)?;
        match table.get(key)? {
            Some(guard) => {
                let value: T =
                    serde_json::from_slice(guard.value()).map_err(|e| StateError::codec(key, e))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    fn list_prefix<T: DeserializeOwned>(&self, table: Table, prefix: &str) -> StateResult<Vec<T>> {
        let txn = self.db.begin_read()?;
        let table = txn.open_table(table)?;
        let mut results = Vec::new();
        for entry in table.iter()? {
            let (key, value) = entry?;
            if key.value().starts_with(prefix) {
                let item: T =
                    serde_json::from_slice(value.value()).map_err(|e| StateError::codec(key.value(), e))?;
                results.push(item);
            }
        }
        Ok(results)
    }

    fn delete(&self, table: Table, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write()?;
        let existed;
        {
            let mut table = txn.open_table(table)?;
            existed = table.remove(key)?.is_some();
        }
        txn.commit()?;
        Ok(existed)
    }

    fn delete_prefix(&self, table: Table, prefix: &str) -> StateResult<u32> {
        let mut keys = Vec::new();
        {
            let txn = self.db.begin_read()?;
            let read = txn.open_table(table)?;
            for entry in read.iter()? {
                let (key, _) = entry?;
                if key.value().starts_with(prefix) {
                    keys.push(key.value().to_string());
                }
            }
        }
        let txn = self.db.begin_write()?;
        {
            let mut write = txn.open_table(table)?;
            for key in &keys {
                write.remove(key.as_str())?;
            }
        }
        txn.commit()?;
        Ok(keys.len() as u32)
    }

    // ── Resources ──────────────────────────────────────────────────

    /// Insert or update a resource record.
    pub fn put_resource(&self, record: &ResourceRecord) -> StateResult<()> {
        let key = record.table_key();
        self.put(RESOURCES, &key, record)?;
        debug!(%key, status = ?record.status, "resource recorded");
        Ok(())
    }

    /// Get a resource by stack, kind and name.
    pub fn get_resource(
        &self,
        stack: &str,
        kind: &str,
        name: &str,
    ) -> StateResult<Option<ResourceRecord>> {
        self.get(RESOURCES, &resource_key(stack, kind, name))
    }

    /// List every resource recorded for a stack.
    pub fn list_resources(&self, stack: &str) -> StateResult<Vec<ResourceRecord>> {
        self.list_prefix(RESOURCES, &format!("{stack}/"))
    }

    /// Delete a resource record. Returns true if it existed.
    pub fn delete_resource(&self, stack: &str, kind: &str, name: &str) -> StateResult<bool> {
        let key = resource_key(stack, kind, name);
        let existed = self.delete(RESOURCES, &key)?;
        debug!(%key, existed, "resource record deleted");
        Ok(existed)
    }

    // ── Outputs ────────────────────────────────────────────────────

    pub fn put_output(&self, output: &StackOutput) -> StateResult<()> {
        self.put(OUTPUTS, &output.table_key(), output)
    }

    pub fn list_outputs(&self, stack: &str) -> StateResult<Vec<StackOutput>> {
        self.list_prefix(OUTPUTS, &format!("{stack}/"))
    }

    /// Drop all outputs of a stack. Returns number deleted.
    pub fn clear_outputs(&self, stack: &str) -> StateResult<u32> {
        self.delete_prefix(OUTPUTS, &format!("{stack}/"))
    }

    // ── Secrets ────────────────────────────────────────────────────

    pub fn put_secret(&self, secret: &StoredSecret) -> StateResult<()> {
        let key = secret.table_key();
        self.put(SECRETS, &key, secret)?;
        debug!(%key, "secret material stored");
        Ok(())
    }

    pub fn get_secret(&self, stack: &str, name: &str) -> StateResult<Option<StoredSecret>> {
        self.get(SECRETS, &format!("{stack}/{name}"))
    }

    pub fn list_secrets(&self, stack: &str) -> StateResult<Vec<StoredSecret>> {
        self.list_prefix(SECRETS, &format!("{stack}/"))
    }

    pub fn delete_secret(&self, stack: &str, name: &str) -> StateResult<bool> {
        self.delete(SECRETS, &format!("{stack}/{name}"))
    }
}
