//! In-memory engine built on concurrent skip lists.
//!
//! Each table is a `crossbeam-skiplist::SkipMap`, which keeps keys ordered for
//! prefix scans. Commits pass through a gate: a batch holds it exclusively
//! while it checks preconditions and applies its writes, and every read or
//! scan holds it shared for as long as it runs. Readers therefore never see a
//! batch half applied.

use super::{BatchOp, Store, Table, WriteBatch};
use crate::encoding::format::{Formatter, NodeKeys};
use crate::error::{Error, Result};
use crossbeam_skiplist::{map, SkipMap};
use std::ops::{Bound, RangeBounds};
use std::sync::{RwLock, RwLockReadGuard};

type KeyRange = (Bound<Vec<u8>>, Bound<Vec<u8>>);

#[derive(Debug, Default)]
pub struct MemoryStore {
    nodes: SkipMap<Vec<u8>, Vec<u8>>,
    tags: SkipMap<Vec<u8>, Vec<u8>>,
    aliases: SkipMap<Vec<u8>, Vec<u8>>,
    gate: RwLock<()>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn table(&self, table: Table) -> &SkipMap<Vec<u8>, Vec<u8>> {
        match table {
            Table::Nodes => &self.nodes,
            Table::Tags => &self.tags,
            Table::Aliases => &self.aliases,
        }
    }

    /// Number of records in a table.
    pub fn len(&self, table: Table) -> usize {
        self.table(table).len()
    }

    pub fn is_empty(&self) -> bool {
        Table::ALL.iter().all(|t| self.table(*t).is_empty())
    }
}

/// Scan over one table, holding the commit gate shared until dropped.
pub struct MemoryScan<'a> {
    _gate: RwLockReadGuard<'a, ()>,
    inner: map::Range<'a, Vec<u8>, KeyRange, Vec<u8>, Vec<u8>>,
}

impl Iterator for MemoryScan<'_> {
    type Item = Result<(Vec<u8>, Vec<u8>)>;

    fn next(&mut self) -> Option<Self::Item> {
        self.inner
            .next()
            .map(|entry| Ok((entry.key().clone(), entry.value().clone())))
    }
}

impl Store for MemoryStore {
    type ScanIterator<'a> = MemoryScan<'a>;

    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>> {
        let _gate = self.gate.read()?;
        Ok(self.table(table).get(key).map(|e| e.value().clone()))
    }

    fn multi_get(&self, table: Table, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>> {
        let _gate = self.gate.read()?;
        let map = self.table(table);
        Ok(keys
            .iter()
            .map(|key| map.get(key).map(|e| e.value().clone()))
            .collect())
    }

    fn scan<'a>(
        &'a self,
        table: Table,
        range: impl RangeBounds<Vec<u8>> + Clone + Send + Sync + 'a,
    ) -> Result<Self::ScanIterator<'a>> {
        let gate = self.gate.read()?;
        let bounds: KeyRange = (range.start_bound().cloned(), range.end_bound().cloned());
        Ok(MemoryScan {
            _gate: gate,
            inner: self.table(table).range(bounds),
        })
    }

    fn commit(&self, batch: WriteBatch) -> Result<()> {
        let _gate = self.gate.write()?;
        for precondition in batch.preconditions() {
            let (table, key) = precondition.target();
            if !precondition.holds(self.table(table).contains_key(key)) {
                return Err(Error::Conflict(precondition.describe()));
            }
        }
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { table, key, value } => {
                    tracing::trace!(table = %table, record = %NodeKeys::key_value(&key, &value), "put");
                    self.table(table).insert(key, value);
                }
                BatchOp::Delete { table, key } => {
                    tracing::trace!(table = %table, key = %NodeKeys::key(&key), "delete");
                    self.table(table).remove(&key);
                }
            }
        }
        Ok(())
    }
}
