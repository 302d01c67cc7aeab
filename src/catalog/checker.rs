//! Node existence probes against one level key.

use crate::encoding::keycode::LevelKey;
use crate::error::Result;
use crate::node::NodeType;
use crate::store::{Store, Table};

/// Which of the queried node types exist under one level key.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CheckKeyResult {
    results: Vec<(NodeType, bool)>,
}

impl CheckKeyResult {
    pub fn exists_any(&self) -> bool {
        self.results.iter().any(|(_, exists)| *exists)
    }

    /// Types that were not queried report false.
    pub fn exists_as(&self, node_type: NodeType) -> bool {
        self.results
            .iter()
            .any(|(t, exists)| *t == node_type && *exists)
    }

    /// The stored type, if any. At rest there is at most one.
    pub fn existing(&self) -> Option<NodeType> {
        self.results
            .iter()
            .find(|(_, exists)| *exists)
            .map(|(t, _)| *t)
    }
}

/// Looks up the physical key of every candidate type in one consistent read.
pub fn probe<S: Store>(
    store: &S,
    key: &LevelKey,
    candidates: &[NodeType],
) -> Result<CheckKeyResult> {
    let keys = candidates
        .iter()
        .map(|t| key.with_type(*t))
        .collect::<Vec<_>>();
    let values = store.multi_get(Table::Nodes, &keys)?;
    let results = candidates
        .iter()
        .zip(values)
        .map(|(t, value)| (*t, value.is_some()))
        .collect();
    Ok(CheckKeyResult { results })
}

pub fn single_type_exists<S: Store>(store: &S, key: &LevelKey, node_type: NodeType) -> Result<bool> {
    Ok(store.get(Table::Nodes, &key.with_type(node_type))?.is_some())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::keycode::level_key;
    use crate::node::NodeValue;
    use crate::path::PartialPath;
    use crate::store::{MemoryStore, WriteBatch};

    fn store_with(path: &str, node: NodeValue) -> (MemoryStore, LevelKey) {
        let path = PartialPath::parse(path).unwrap();
        let key = level_key(&path, path.depth()).unwrap();
        let store = MemoryStore::new();
        let mut batch = WriteBatch::new();
        batch.put(
            Table::Nodes,
            key.with_type(node.node_type()),
            node.encode().unwrap(),
        );
        store.commit(batch).unwrap();
        (store, key)
    }

    #[test]
    fn test_probe_reports_stored_type() {
        let (store, key) = store_with("root.sg.d1", NodeValue::Entity);
        let result = probe(
            &store,
            &key,
            &[NodeType::Internal, NodeType::Entity, NodeType::Measurement],
        )
        .unwrap();
        assert!(result.exists_any());
        assert!(result.exists_as(NodeType::Entity));
        assert!(!result.exists_as(NodeType::Internal));
        assert_eq!(result.existing(), Some(NodeType::Entity));
    }

    #[test]
    fn test_unqueried_types_are_invisible() {
        let (store, key) = store_with("root.sg", NodeValue::StorageGroup);
        let result = probe(&store, &key, &[NodeType::Internal, NodeType::Entity]).unwrap();
        assert!(!result.exists_any());
        assert!(!result.exists_as(NodeType::StorageGroup));
        assert_eq!(result.existing(), None);
        assert!(single_type_exists(&store, &key, NodeType::StorageGroup).unwrap());
        assert!(!single_type_exists(&store, &key, NodeType::Internal).unwrap());
    }
}
