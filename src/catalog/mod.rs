//! The schema catalog: a tree of storage groups, entities and measurements
//! kept as flat node records in a [`Store`].
//!
//! Every node lives under the level key of its path (see
//! [`keycode`](crate::encoding::keycode)), suffixed with its type marker, so
//! the existence and type of a path are answered with point lookups and the
//! children of a node or all nodes of a depth with one prefix scan.
//!
//! Creation never takes a global lock. Each probe-then-create step holds the
//! lock stripes of the level keys it touches, and every write carries fencing
//! preconditions, so two creators of the same node can never both succeed.
//! Ancestors are committed one node at a time and are safe to re-descend; the
//! measurement leaf, its tag record and its alias form one atomic batch.

mod checker;
mod committer;
mod locks;
mod mutator;
mod scanner;

pub use checker::CheckKeyResult;
pub use mutator::CreateTimeseriesPlan;

use std::collections::BTreeMap;

use checker::{probe, single_type_exists};
use committer::Committer;
use locks::KeyLocks;

use crate::config::CatalogConfig;
use crate::encoding::bincode;
use crate::encoding::keycode::level_key;
use crate::error::{Error, Result};
use crate::node::{MeasurementRecord, NodeType, NodeValue};
use crate::path::PartialPath;
use crate::store::{Store, Table};

pub struct SchemaCatalog<S: Store> {
    store: S,
    config: CatalogConfig,
    locks: KeyLocks,
}

impl<S: Store> SchemaCatalog<S> {
    pub fn new(store: S, config: CatalogConfig) -> Self {
        let locks = KeyLocks::new(config.lock_stripes);
        Self {
            store,
            config,
            locks,
        }
    }

    pub fn config(&self) -> &CatalogConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    fn committer(&self) -> Committer<'_, S> {
        Committer::new(&self.store)
    }

    /// Whether any prefix of `path` (below root) is a storage group.
    pub fn check_storage_group_by_path(&self, path: &PartialPath) -> Result<bool> {
        Ok(self.index_of_storage_group(path)?.is_some())
    }

    /// The storage group `path` belongs to, if any.
    pub fn storage_group_of(&self, path: &PartialPath) -> Result<Option<PartialPath>> {
        Ok(self.index_of_storage_group(path)?.map(|depth| path.prefix(depth)))
    }

    /// Depth of the first storage group along `path`.
    fn index_of_storage_group(&self, path: &PartialPath) -> Result<Option<usize>> {
        path.ensure_concrete()?;
        for depth in 1..=path.depth() {
            let key = level_key(path, depth)?;
            if single_type_exists(&self.store, &key, NodeType::StorageGroup)? {
                return Ok(Some(depth));
            }
        }
        Ok(None)
    }

    /// Which of `candidates` are stored at `path`.
    pub fn check_key(
        &self,
        path: &PartialPath,
        candidates: &[NodeType],
    ) -> Result<CheckKeyResult> {
        path.ensure_concrete()?;
        let key = level_key(path, path.depth())?;
        probe(&self.store, &key, candidates)
    }

    /// The type of the node stored at `path`, or `None` if there is none.
    pub fn get_node_type(&self, path: &PartialPath) -> Result<Option<NodeType>> {
        path.ensure_concrete()?;
        if path.depth() == 0 {
            return Ok(Some(NodeType::Root));
        }
        let key = level_key(path, path.depth())?;
        Ok(probe(&self.store, &key, &NodeType::STORED)?.existing())
    }

    /// The measurement at `path`, following an alias to its canonical node.
    pub fn get_measurement(&self, path: &PartialPath) -> Result<Option<MeasurementRecord>> {
        let Some(canonical) = self.resolve_measurement_key(path)? else {
            return Ok(None);
        };
        match self.store.get(Table::Nodes, &canonical)? {
            Some(bytes) => match NodeValue::decode(&bytes)? {
                NodeValue::Measurement(record) => Ok(Some(record)),
                other => Err(Error::Corrupted(format!(
                    "expected a measurement at {}, found {}",
                    path,
                    other.node_type()
                ))),
            },
            None => Ok(None),
        }
    }

    /// The tags stored for the measurement at `path` (or behind the alias at
    /// `path`). Empty when it was created without tags.
    pub fn get_tags(&self, path: &PartialPath) -> Result<BTreeMap<String, String>> {
        let Some(canonical) = self.resolve_measurement_key(path)? else {
            return Ok(BTreeMap::new());
        };
        match self.store.get(Table::Tags, &canonical)? {
            Some(bytes) => bincode::deserialize(&bytes),
            None => Ok(BTreeMap::new()),
        }
    }

    /// Physical key of the measurement named by `path`, directly or by alias.
    fn resolve_measurement_key(&self, path: &PartialPath) -> Result<Option<Vec<u8>>> {
        path.ensure_concrete()?;
        if path.depth() == 0 {
            return Ok(None);
        }
        let key = level_key(path, path.depth())?;
        let result = probe(&self.store, &key, &[NodeType::Measurement, NodeType::Alias])?;
        if result.exists_as(NodeType::Measurement) {
            return Ok(Some(key.with_type(NodeType::Measurement)));
        }
        if !result.exists_as(NodeType::Alias) {
            return Ok(None);
        }
        match self.store.get(Table::Nodes, &key.with_type(NodeType::Alias))? {
            Some(bytes) => match NodeValue::decode(&bytes)? {
                NodeValue::Alias(target) => Ok(Some(target)),
                other => Err(Error::Corrupted(format!(
                    "expected an alias at {}, found {}",
                    path,
                    other.node_type()
                ))),
            },
            None => Ok(None),
        }
    }
}
