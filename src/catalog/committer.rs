//! Atomic commits of catalog node groups.

use crate::encoding::keycode::LevelKey;
use crate::error::Result;
use crate::node::{NodeType, NodeValue};
use crate::store::{Store, Table, WriteBatch};

pub struct Committer<'a, S: Store> {
    store: &'a S,
}

impl<'a, S: Store> Committer<'a, S> {
    pub fn new(store: &'a S) -> Self {
        Self { store }
    }

    /// Commits the batch as one unit. Nothing is retried.
    pub fn commit(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() && batch.preconditions().is_empty() {
            return Ok(());
        }
        let ops = batch.len();
        let fences = batch.preconditions().len();
        match self.store.commit(batch) {
            Ok(()) => {
                tracing::debug!(ops, fences, "Committed catalog batch");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(ops, fences, error = %e, "Catalog batch rejected");
                Err(e)
            }
        }
    }

    /// Creates a single node, fenced on the level key being unoccupied.
    pub fn create_node(&self, key: &LevelKey, value: &NodeValue) -> Result<()> {
        let mut batch = WriteBatch::new();
        fence_unoccupied(&mut batch, key);
        batch.put(
            Table::Nodes,
            key.with_type(value.node_type()),
            value.encode()?,
        );
        self.commit(batch)
    }

    /// Replaces an `Internal` record with an `Entity` record at the same key.
    pub fn promote_to_entity(&self, key: &LevelKey) -> Result<()> {
        let internal = key.with_type(NodeType::Internal);
        let entity = key.with_type(NodeType::Entity);
        let mut batch = WriteBatch::new();
        batch
            .expect_present(Table::Nodes, internal.clone())
            .expect_absent(Table::Nodes, entity.clone())
            .delete(Table::Nodes, internal)
            .put(Table::Nodes, entity, NodeValue::Entity.encode()?);
        self.commit(batch)
    }
}

/// Fences every stored node type at `key` as absent.
pub fn fence_unoccupied(batch: &mut WriteBatch, key: &LevelKey) {
    for node_type in NodeType::STORED {
        batch.expect_absent(Table::Nodes, key.with_type(node_type));
    }
}
