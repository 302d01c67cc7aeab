//! Storage group and timeseries creation.
//!
//! Ancestors are created top-down as independent single-node commits, each
//! under the lock stripe of its level key and fenced on the key being
//! unoccupied. A failure part way leaves only valid, reusable ancestors
//! behind. The measurement leaves with their tag and alias records are staged
//! into one batch and committed together.

use std::collections::{BTreeMap, HashSet};

use super::checker::probe;
use super::committer::fence_unoccupied;
use super::SchemaCatalog;
use crate::encoding::bincode;
use crate::encoding::keycode::{alias_key, level_key, LevelKey};
use crate::error::{Error, Result};
use crate::node::{MeasurementRecord, NodeType, NodeValue};
use crate::path::PartialPath;
use crate::schema::{check_data_type_with_encoding, Compression, DataType, Encoding, MeasurementSchema};
use crate::store::{Store, Table, WriteBatch};

/// Types that may appear on the chain between a storage group and an entity.
/// Terminal types among them are rejected.
const CHAIN_PROBE: [NodeType; 4] = [
    NodeType::Internal,
    NodeType::Entity,
    NodeType::Measurement,
    NodeType::Alias,
];

/// A timeseries to create, with its optional alias, tags and attributes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CreateTimeseriesPlan {
    pub path: PartialPath,
    pub data_type: DataType,
    pub encoding: Encoding,
    pub compressor: Compression,
    pub props: BTreeMap<String, String>,
    pub alias: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, String>,
}

impl CreateTimeseriesPlan {
    pub fn new(
        path: PartialPath,
        data_type: DataType,
        encoding: Encoding,
        compressor: Compression,
    ) -> Self {
        Self {
            path,
            data_type,
            encoding,
            compressor,
            props: BTreeMap::new(),
            alias: None,
            tags: BTreeMap::new(),
            attributes: BTreeMap::new(),
        }
    }

    pub fn props(mut self, props: BTreeMap<String, String>) -> Self {
        self.props = props;
        self
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn tags(mut self, tags: BTreeMap<String, String>) -> Self {
        self.tags = tags;
        self
    }

    pub fn attributes(mut self, attributes: BTreeMap<String, String>) -> Self {
        self.attributes = attributes;
        self
    }
}

/// A measurement leaf staged for the final batch.
struct Leaf {
    path: PartialPath,
    record: MeasurementRecord,
}

fn contains_measurement(path: &PartialPath, depth: usize) -> Error {
    Error::already_exists(path.prefix(depth).full_path(), "path contains measurement node")
}

fn measurement_exists(path: &PartialPath) -> Error {
    Error::already_exists(path.full_path(), "measurement already exists")
}

fn coincides(path: &PartialPath) -> Error {
    Error::InvalidSchema(format!(
        "storage group and entity node cannot coincide for {path}"
    ))
}

impl<S: Store> SchemaCatalog<S> {
    /// Declares `path` a storage group, creating missing ancestors as
    /// internal nodes.
    ///
    /// Fails with [`Error::AlreadyExists`] if `path` already is a storage
    /// group, lies inside one, or has one below it.
    pub fn set_storage_group(&self, path: &PartialPath) -> Result<()> {
        path.ensure_concrete()?;
        let target = path.depth();
        if target == 0 {
            return Err(Error::invalid_path(
                path.full_path(),
                "root cannot be a storage group",
            ));
        }

        for depth in 1..=target {
            let key = level_key(path, depth)?;
            let _guard = self.locks.lock(&[&key])?;
            let existing = probe(&self.store, &key, &NodeType::STORED)?.existing();
            match existing {
                None => {
                    let value = if depth == target {
                        NodeValue::StorageGroup
                    } else {
                        NodeValue::Internal
                    };
                    self.committer().create_node(&key, &value)?;
                }
                Some(NodeType::StorageGroup) if depth == target => {
                    return Err(Error::already_exists(
                        path.full_path(),
                        "storage group already set",
                    ));
                }
                Some(NodeType::Internal) if depth == target => {
                    return Err(Error::already_exists(
                        path.full_path(),
                        "a storage group exists below this path",
                    ));
                }
                Some(NodeType::Internal) => {}
                Some(node_type) => {
                    return Err(Error::already_exists(
                        path.prefix(depth).full_path(),
                        format!("path is already under a storage group ({node_type})"),
                    ));
                }
            }
        }

        tracing::info!(path = %path, "Set storage group");
        Ok(())
    }

    pub fn create_timeseries(
        &self,
        path: &PartialPath,
        data_type: DataType,
        encoding: Encoding,
        compressor: Compression,
        props: BTreeMap<String, String>,
        alias: Option<&str>,
    ) -> Result<()> {
        let mut plan =
            CreateTimeseriesPlan::new(path.clone(), data_type, encoding, compressor).props(props);
        plan.alias = alias.map(str::to_string);
        self.create_timeseries_with(plan)
    }

    /// Creates a measurement leaf with every missing ancestor. The parent of
    /// the leaf becomes an entity, promoted in place if it was internal.
    pub fn create_timeseries_with(&self, plan: CreateTimeseriesPlan) -> Result<()> {
        let CreateTimeseriesPlan {
            path,
            data_type,
            encoding,
            compressor,
            props,
            alias,
            tags,
            attributes,
        } = plan;
        path.ensure_concrete()?;
        let schema =
            MeasurementSchema::new(path.measurement(), data_type, encoding, compressor).props(props);
        schema.validate()?;

        let alias = alias.filter(|a| !a.is_empty());
        if let Some(alias) = &alias {
            if alias == path.measurement() {
                return Err(Error::InvalidSchema(format!(
                    "alias {alias} equals the measurement name of {path}"
                )));
            }
            path.with_leaf(alias)?;
        }

        let sg_depth = self.ensure_storage_group(&path)?;
        if sg_depth + 2 > path.depth() {
            return Err(coincides(&path));
        }

        let leaf_key = level_key(&path, path.depth())?;
        if probe(&self.store, &leaf_key, &NodeType::STORED)?.exists_any() {
            return Err(measurement_exists(&path));
        }

        let Some(device) = path.parent() else {
            return Err(coincides(&path));
        };
        self.ensure_entity(&device, sg_depth)?;

        let record = MeasurementRecord {
            schema,
            alias,
            tags,
            attributes,
        };
        self.create_leaves(&device, vec![Leaf { path, record }])
    }

    /// Creates several measurements under one device. Every name and
    /// data type/encoding pair is validated before storage is touched.
    pub fn create_aligned_timeseries(
        &self,
        device: &PartialPath,
        measurements: &[String],
        data_types: &[DataType],
        encodings: &[Encoding],
        compressors: &[Compression],
    ) -> Result<()> {
        device.ensure_concrete()?;
        let count = measurements.len();
        if count == 0 {
            return Err(Error::InvalidSchema(format!(
                "no measurements given for aligned device {device}"
            )));
        }
        if data_types.len() != count || encodings.len() != count || compressors.len() != count {
            return Err(Error::InvalidSchema(format!(
                "aligned device {device} has {count} measurements but {} data types, {} encodings and {} compressors",
                data_types.len(),
                encodings.len(),
                compressors.len()
            )));
        }

        let mut seen = HashSet::new();
        let mut leaves = Vec::with_capacity(count);
        for (i, name) in measurements.iter().enumerate() {
            if !seen.insert(name.as_str()) {
                return Err(Error::InvalidSchema(format!(
                    "duplicated measurement {name} in aligned device {device}"
                )));
            }
            let path = device.child(name)?;
            path.ensure_concrete()?;
            check_data_type_with_encoding(data_types[i], encodings[i])?;
            let schema = MeasurementSchema::new(name, data_types[i], encodings[i], compressors[i]);
            leaves.push(Leaf {
                path,
                record: MeasurementRecord {
                    schema,
                    alias: None,
                    tags: BTreeMap::new(),
                    attributes: BTreeMap::new(),
                },
            });
        }

        let sg_depth = self.ensure_storage_group(&leaves[0].path)?;
        if sg_depth + 1 > device.depth() {
            return Err(coincides(device));
        }
        for leaf in &leaves {
            let key = level_key(&leaf.path, leaf.path.depth())?;
            if probe(&self.store, &key, &NodeType::STORED)?.exists_any() {
                return Err(measurement_exists(&leaf.path));
            }
        }

        self.ensure_entity(device, sg_depth)?;
        self.create_leaves(device, leaves)
    }

    /// Depth of the storage group covering `path`, auto-creating one at the
    /// configured level when allowed.
    fn ensure_storage_group(&self, path: &PartialPath) -> Result<usize> {
        if let Some(depth) = self.index_of_storage_group(path)? {
            return Ok(depth);
        }
        if !self.config.auto_create_schema {
            return Err(Error::StorageGroupNotSet(path.full_path()));
        }

        let sg_path = path.storage_group_by_level(self.config.default_storage_group_level)?;
        if sg_path.depth() + 2 > path.depth() {
            return Err(coincides(path));
        }
        match self.set_storage_group(&sg_path) {
            Ok(()) => tracing::info!(path = %path, storage_group = %sg_path, "Auto-created storage group"),
            // Another creator got there first.
            Err(Error::AlreadyExists { .. }) if self.index_of_storage_group(path)?.is_some() => {}
            Err(e) => return Err(e),
        }
        self.index_of_storage_group(path)?
            .ok_or_else(|| Error::StorageGroupNotSet(path.full_path()))
    }

    /// Makes sure every node from below the storage group down to `device`
    /// exists, with `device` itself an entity.
    fn ensure_entity(&self, device: &PartialPath, sg_depth: usize) -> Result<()> {
        let target = device.depth();

        // Find the deepest existing node; everything above it exists too.
        let mut start = sg_depth + 1;
        for depth in (sg_depth + 1..=target).rev() {
            let key = level_key(device, depth)?;
            match probe(&self.store, &key, &CHAIN_PROBE)?.existing() {
                Some(node_type) if node_type.is_terminal() => {
                    return Err(contains_measurement(device, depth))
                }
                Some(_) => {
                    start = depth;
                    break;
                }
                None => {}
            }
        }

        for depth in start..=target {
            let key = level_key(device, depth)?;
            let _guard = self.locks.lock(&[&key])?;
            match probe(&self.store, &key, &CHAIN_PROBE)?.existing() {
                None => {
                    let value = if depth == target {
                        NodeValue::Entity
                    } else {
                        NodeValue::Internal
                    };
                    self.committer().create_node(&key, &value)?;
                    tracing::debug!(path = %device.prefix(depth), node_type = %value.node_type(), "Created node");
                }
                Some(node_type) if node_type.is_terminal() => {
                    return Err(contains_measurement(device, depth))
                }
                Some(NodeType::Internal) if depth == target => {
                    self.committer().promote_to_entity(&key)?;
                    tracing::debug!(path = %device, "Promoted internal node to entity");
                }
                Some(_) => {}
            }
        }
        Ok(())
    }

    /// Commits the leaves under `device` together with their tag and alias
    /// records, or nothing.
    fn create_leaves(&self, device: &PartialPath, leaves: Vec<Leaf>) -> Result<()> {
        let device_key = level_key(device, device.depth())?;
        let mut keys = Vec::with_capacity(leaves.len());
        for leaf in &leaves {
            keys.push(level_key(&leaf.path, leaf.path.depth())?);
            if let Some(alias) = &leaf.record.alias {
                keys.push(alias_key(&leaf.path, alias)?);
            }
        }
        let _guards = self.locks.lock(&keys.iter().collect::<Vec<&LevelKey>>())?;

        let aliases = leaves
            .iter()
            .filter_map(|leaf| leaf.record.alias.clone().map(|a| (leaf.path.clone(), a)))
            .collect::<Vec<_>>();
        let paths = leaves.iter().map(|leaf| leaf.path.clone()).collect::<Vec<_>>();

        let mut batch = WriteBatch::new();
        batch.expect_present(Table::Nodes, device_key.with_type(NodeType::Entity));
        for leaf in leaves {
            self.stage_leaf(&mut batch, leaf)?;
        }

        match self.committer().commit(batch) {
            Ok(()) => {
                for path in &paths {
                    tracing::debug!(path = %path, "Created timeseries");
                }
                Ok(())
            }
            Err(Error::Conflict(reason)) => {
                // An alias taken concurrently under another device.
                for (path, alias) in aliases {
                    if self.store.get(Table::Aliases, alias.as_bytes())?.is_some() {
                        return Err(Error::AliasAlreadyExists {
                            path: path.full_path(),
                            alias,
                        });
                    }
                }
                Err(Error::Conflict(reason))
            }
            Err(e) => Err(e),
        }
    }

    fn stage_leaf(&self, batch: &mut WriteBatch, leaf: Leaf) -> Result<()> {
        let Leaf { path, record } = leaf;
        let key = level_key(&path, path.depth())?;
        if probe(&self.store, &key, &NodeType::STORED)?.exists_any() {
            return Err(measurement_exists(&path));
        }
        let measurement_key = key.with_type(NodeType::Measurement);

        fence_unoccupied(batch, &key);
        if !record.tags.is_empty() {
            batch.put(
                Table::Tags,
                measurement_key.clone(),
                bincode::serialize(&record.tags)?,
            );
        }

        if let Some(alias) = &record.alias {
            let alias_key = alias_key(&path, alias)?;
            let taken = probe(&self.store, &alias_key, &NodeType::STORED)?.exists_any()
                || self.store.get(Table::Aliases, alias.as_bytes())?.is_some();
            if taken {
                return Err(Error::AliasAlreadyExists {
                    path: path.full_path(),
                    alias: alias.clone(),
                });
            }
            fence_unoccupied(batch, &alias_key);
            batch
                .expect_absent(Table::Aliases, alias.as_bytes().to_vec())
                .put(
                    Table::Nodes,
                    alias_key.with_type(NodeType::Alias),
                    NodeValue::Alias(measurement_key.clone()).encode()?,
                )
                .put(
                    Table::Aliases,
                    alias.as_bytes().to_vec(),
                    measurement_key.clone(),
                );
        }

        batch.put(
            Table::Nodes,
            measurement_key,
            NodeValue::Measurement(record).encode()?,
        );
        Ok(())
    }
}
