//! Persistent engine on a fjall keyspace.
//!
//! Each [`Table`] is a fjall partition of one keyspace, so a catalog batch maps
//! onto a single cross-partition fjall batch. Preconditions are evaluated under
//! the same exclusive gate that guards the commit, and reads hold it shared.

use super::{BatchOp, Store, Table, WriteBatch};
use crate::config::StoreConfig;
use crate::error::{Error, Result};
use fjall::{Keyspace, PartitionCreateOptions, PartitionHandle};
use std::ops::{Bound, RangeBounds};
use std::sync::{RwLock, RwLockReadGuard};

type KvIterator = Box<dyn Iterator<Item = fjall::Result<fjall::KvPair>>>;

pub struct FjallStore {
    keyspace: Keyspace,
    nodes: PartitionHandle,
    tags: PartitionHandle,
    aliases: PartitionHandle,
    gate: RwLock<()>,
}

impl FjallStore {
    /// Open store with default configuration
    pub fn open(dir: impl Into<std::path::PathBuf>) -> Result<Self> {
        Self::open_with_config(StoreConfig::new(dir))
    }

    /// Open store with custom configuration
    pub fn open_with_config(config: StoreConfig) -> Result<Self> {
        std::fs::create_dir_all(&config.dir)?;
        let mut fjall_config = fjall::Config::new(&config.dir);
        if config.manual_journal_persist {
            fjall_config = fjall_config.manual_journal_persist(true);
        }
        if let Some(ms) = config.fsync_ms {
            fjall_config = fjall_config.fsync_ms(Some(ms));
        }
        let keyspace = fjall_config.open()?;
        let nodes =
            keyspace.open_partition(Table::Nodes.name(), PartitionCreateOptions::default())?;
        let tags = keyspace.open_partition(Table::Tags.name(), PartitionCreateOptions::default())?;
        let aliases =
            keyspace.open_partition(Table::Aliases.name(), PartitionCreateOptions::default())?;
        tracing::info!(dir = %config.dir.display(), "opened catalog keyspace");
        Ok(Self {
            keyspace,
            nodes,
            tags,
            aliases,
            gate: RwLock::new(()),
        })
    }

    fn partition(&self, table: Table) -> &PartitionHandle {
        match table {
            Table::Nodes => &self.nodes,
            Table::Tags => &self.tags,
            Table::Aliases => &self.aliases,
        }
    }

    /// Flushes the journal to disk.
    pub fn persist(&self) -> Result<()> {
        self.keyspace.persist(fjall::PersistMode::SyncAll)?;
        Ok(())
    }
}

/// Scan over one partition, holding the commit gate shared until dropped.
pub struct FjallScan<'a> {
    _gate: RwLockReadGuard<'a, ()>,
    inner: KvIterator,
}

impl Iterator for FjallScan<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner.next().map(|entry| {
            entry
                .map(|(key, value)| (key.to_vec(), value.to_vec()))
                .map_err(Error::from)
        })
    }
}

impl Store for FjallStore {
    type ScanIterator<'a> = FjallScan<'a>;

    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let _gate = self.gate.read()?;
        Ok(self.partition(table).get(key)?.map(|v| v.to_vec()))
    }

    fn multi_get(&self, table: Table, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        let _gate = self.gate.read()?;
        let partition = self.partition(table);
        keys.iter()
            .map(|key| Ok(partition.get(key)?.map(|v| v.to_vec())))
            .collect()
    }

    fn scan<'a>(
        &'a self,
        table: Table,
        range: impl RangeBounds<Vec<u8>> + Clone + Send + Sync + 'a,
    ) -> Result<Self::ScanIterator<'a>> {
        let gate = self.gate.read()?;
        let bounds: (Bound<Vec<u8>>, Bound<Vec<u8>>) =
            (range.start_bound().cloned(), range.end_bound().cloned());
        Ok(FjallScan {
            _gate: gate,
            inner: Box::new(self.partition(table).range(bounds)),
        })
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let _gate = self.gate.write()?;
        for precondition in batch.preconditions() {
            let (table, key) = precondition.target();
            let exists = self.partition(table).contains_key(key)?;
            if !precondition.holds(exists) {
                return Err(Error::Conflict(precondition.describe()));
            }
        }
        let mut fjall_batch = self.keyspace.batch();
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { table, key, value } => {
                    fjall_batch.insert(self.partition(table), key, value)
                }
                BatchOp::Delete { table, key } => fjall_batch.remove(self.partition(table), key),
            }
        }
        fjall_batch.commit()?;
        Ok(())
    }
}
