//! Child and level listings by prefix scan.
//!
//! Levels up to `deep_level_threshold` are listed with one scan over the
//! level prefix. Deeper levels are listed from their parents: the level above
//! is scanned first, then the children of every parent are scanned by a pool
//! of scoped workers that union their results into a concurrent skip set.

use std::collections::BTreeSet;

use crossbeam_skiplist::SkipSet;

use super::SchemaCatalog;
use crate::encoding::keycode::{
    level_key, prefix_for_children, prefix_for_level, LevelKey, MAX_DEPTH,
};
use crate::error::{Error, Result};
use crate::node::NodeType;
use crate::path::{PartialPath, MULTI_LEVEL_WILDCARD, ONE_LEVEL_WILDCARD};
use crate::store::{Store, Table};

impl<S: Store> SchemaCatalog<S> {
    /// Paths of the nodes one level below the nodes matched by `pattern`.
    ///
    /// Given `root.sg1.d1.s1`, `root.sg1.d1.s2` and `root.sg1.d2.s1`, the
    /// pattern `root.sg1` yields `{root.sg1.d1, root.sg1.d2}`.
    pub fn get_child_node_path_in_next_level(
        &self,
        pattern: &PartialPath,
    ) -> Result<BTreeSet<PartialPath>> {
        if !pattern.has_wildcard() {
            return self.children_of(pattern);
        }

        let fixed = pattern
            .nodes()
            .iter()
            .take_while(|n| *n != ONE_LEVEL_WILDCARD && *n != MULTI_LEVEL_WILDCARD)
            .count();
        let mut frontier = vec![pattern.prefix(fixed - 1)];
        let mut result = BTreeSet::new();
        while let Some(node) = frontier.pop() {
            let matched = pattern.matches(&node);
            for child in self.children_of(&node)? {
                if pattern.matches_prefix(&child) {
                    frontier.push(child.clone());
                }
                if matched {
                    result.insert(child);
                }
            }
        }
        Ok(result)
    }

    /// Nodes at depth `level` matched by `pattern`, or lying below a node it
    /// matches. Sorted by path.
    pub fn get_nodes_list_in_given_level(
        &self,
        pattern: &PartialPath,
        level: usize,
    ) -> Result<Vec<PartialPath>> {
        if level == 0 {
            return Ok(vec![PartialPath::root()]);
        }
        if level > MAX_DEPTH {
            return Ok(Vec::new());
        }
        let keys = if level <= self.config.deep_level_threshold {
            self.scan_level(level)?
        } else {
            self.fan_out_level(level)?
        };

        let mut paths = Vec::new();
        for key in keys {
            let path = key.to_path()?;
            if covers(pattern, &path) {
                paths.push(path);
            }
        }
        paths.sort();
        Ok(paths)
    }

    fn children_of(&self, path: &PartialPath) -> Result<BTreeSet<PartialPath>> {
        let prefix = prefix_for_children(path)?;
        collect_nodes(&self.store, &prefix)?
            .into_iter()
            .map(|key| key.to_path())
            .collect()
    }

    fn scan_level(&self, level: usize) -> Result<BTreeSet<LevelKey>> {
        collect_nodes(&self.store, &prefix_for_level(level)?)
    }

    fn fan_out_level(&self, level: usize) -> Result<BTreeSet<LevelKey>> {
        // The root is never stored, so level one hangs off a synthesized key.
        let parents = if level == 1 {
            vec![level_key(&PartialPath::root(), 0)?]
        } else {
            self.scan_level(level - 1)?.into_iter().collect::<Vec<_>>()
        };
        if parents.is_empty() {
            return Ok(BTreeSet::new());
        }
        let workers = self.config.scan_parallelism.clamp(1, parents.len());
        let chunk_size = parents.len().div_ceil(workers);
        tracing::debug!(level, parents = parents.len(), workers, "Fanning out level scan");

        let found = SkipSet::new();
        std::thread::scope(|scope| {
            let handles = parents
                .chunks(chunk_size)
                .map(|chunk| {
                    let found = &found;
                    scope.spawn(move || -> Result<()> {
                        for parent in chunk {
                            let prefix = parent.child_prefix()?;
                            for entry in self.store.scan_prefix(Table::Nodes, &prefix)? {
                                let (key, _) = entry?;
                                let (level_key, node_type) = LevelKey::from_physical(&key)?;
                                if node_type != NodeType::Alias {
                                    found.insert(level_key);
                                }
                            }
                        }
                        Ok(())
                    })
                })
                .collect::<Vec<_>>();
            handles.into_iter().try_for_each(|handle| {
                handle
                    .join()
                    .map_err(|_| Error::Storage("level scan worker panicked".to_string()))?
            })
        })?;
        Ok(found.into_iter().collect())
    }
}

/// Structural node keys under `prefix`; alias records are not nodes of the
/// tree and are skipped.
fn collect_nodes<S: Store>(store: &S, prefix: &[u8]) -> Result<BTreeSet<LevelKey>> {
    let mut keys = BTreeSet::new();
    for entry in store.scan_prefix(Table::Nodes, prefix)? {
        let (key, _) = entry?;
        let (level_key, node_type) = LevelKey::from_physical(&key)?;
        if node_type != NodeType::Alias {
            keys.insert(level_key);
        }
    }
    Ok(keys)
}

fn covers(pattern: &PartialPath, path: &PartialPath) -> bool {
    (0..=path.depth()).any(|depth| pattern.matches(&path.prefix(depth)))
}
