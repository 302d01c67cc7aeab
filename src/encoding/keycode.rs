//! Level-key codec mapping node paths to ordered byte keys.
//!
//! ```text
//! level key    = [FORMAT_VERSION][depth] (name 0x00) for each node below root
//! physical key = level key ++ [type marker]
//! ```
//!
//! The root name is implicit and never encoded. Since the depth byte follows
//! the version byte, every key of one depth shares a two-byte prefix, and the
//! children of a node share that prefix plus the parent's names. Names never
//! contain 0x00, so the terminator keeps `sg` and `sg2` from sharing a child
//! prefix and keeps the codec collision free.

use super::{EncodingError, Key};
use crate::error::{Error, Result};
use crate::node::NodeType;
use crate::path::PartialPath;

/// Format version leading every node key.
pub const FORMAT_VERSION: u8 = 0x01;

/// Deepest representable node; depth is stored in a single byte.
pub const MAX_DEPTH: usize = u8::MAX as usize;

const NAME_TERMINATOR: u8 = 0x00;

/// Key of one node position, without the type marker.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LevelKey(Vec<u8>);

impl LevelKey {
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn depth(&self) -> usize {
        self.0[1] as usize
    }

    /// Physical key under which a node of `node_type` is stored.
    pub fn with_type(&self, node_type: NodeType) -> Vec<u8> {
        let mut key = Vec::with_capacity(self.0.len() + 1);
        key.extend_from_slice(&self.0);
        key.push(node_type.marker());
        key
    }

    /// Prefix shared by every child of this node.
    pub fn child_prefix(&self) -> Result<Vec<u8>> {
        let depth = self.depth() + 1;
        if depth > MAX_DEPTH {
            return Err(Error::invalid_path(
                format!("depth {depth}"),
                "deeper than the maximum depth",
            ));
        }
        let mut prefix = self.0.clone();
        prefix[1] = depth as u8;
        Ok(prefix)
    }

    /// Rebuilds the path this key was derived from.
    pub fn to_path(&self) -> Result<PartialPath> {
        let mut nodes = vec![crate::path::ROOT.to_string()];
        for name in split_names(&self.0[2..])? {
            nodes.push(name);
        }
        PartialPath::from_nodes(nodes)
    }

    /// Splits a physical key into its level key and node type.
    pub fn from_physical(key: &[u8]) -> Result<(LevelKey, NodeType)> {
        let (marker, level) = key.split_last().ok_or(EncodingError::TruncatedData)?;
        let node_type = NodeType::from_marker(*marker)?;
        Ok((LevelKey::decode(level)?, node_type))
    }
}

impl Key for LevelKey {
    fn encode(&self) -> Vec<u8> {
        self.0.clone()
    }

    fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < 2 {
            return Err(EncodingError::TruncatedData.into());
        }
        if bytes[0] != FORMAT_VERSION {
            return Err(EncodingError::InvalidFormat(format!(
                "unsupported key format version {}",
                bytes[0]
            ))
            .into());
        }
        let names = split_names(&bytes[2..])?;
        if names.len() != bytes[1] as usize {
            return Err(EncodingError::InvalidFormat(format!(
                "key depth {} does not match {} encoded names",
                bytes[1],
                names.len()
            ))
            .into());
        }
        Ok(LevelKey(bytes.to_vec()))
    }
}

fn split_names(bytes: &[u8]) -> Result<Vec<String>> {
    if bytes.is_empty() {
        return Ok(Vec::new());
    }
    if bytes.last() != Some(&NAME_TERMINATOR) {
        return Err(EncodingError::TruncatedData.into());
    }
    bytes[..bytes.len() - 1]
        .split(|b| *b == NAME_TERMINATOR)
        .map(|name| {
            std::str::from_utf8(name)
                .map(str::to_string)
                .map_err(|_| Error::from(EncodingError::InvalidUtf8))
        })
        .collect()
}

fn push_names(out: &mut Vec<u8>, names: &[String]) {
    for name in names {
        out.extend_from_slice(name.as_bytes());
        out.push(NAME_TERMINATOR);
    }
}

fn check_depth(path: &PartialPath, depth: usize) -> Result<()> {
    if depth > MAX_DEPTH {
        return Err(Error::invalid_path(
            path.full_path(),
            format!("depth {depth} exceeds maximum {MAX_DEPTH}"),
        ));
    }
    Ok(())
}

/// Level key for the prefix of `path` ending at `depth` inclusive.
pub fn level_key(path: &PartialPath, depth: usize) -> Result<LevelKey> {
    if depth > path.depth() {
        return Err(Error::invalid_path(
            path.full_path(),
            format!("depth {depth} is beyond the path"),
        ));
    }
    check_depth(path, depth)?;
    path.prefix(depth).ensure_concrete()?;
    let mut key = vec![FORMAT_VERSION, depth as u8];
    push_names(&mut key, &path.nodes()[1..=depth]);
    Ok(LevelKey(key))
}

/// Level key of `path` with its last node replaced by `alias`.
pub fn alias_key(path: &PartialPath, alias: &str) -> Result<LevelKey> {
    let aliased = path.with_leaf(alias)?;
    level_key(&aliased, aliased.depth())
}

/// Prefix whose scan yields exactly the children of `path`.
pub fn prefix_for_children(path: &PartialPath) -> Result<Vec<u8>> {
    level_key(path, path.depth())?.child_prefix()
}

/// Prefix whose scan yields every node at `depth`.
pub fn prefix_for_level(depth: usize) -> Result<Vec<u8>> {
    if depth > MAX_DEPTH {
        return Err(Error::invalid_path(
            format!("level {depth}"),
            format!("exceeds maximum {MAX_DEPTH}"),
        ));
    }
    Ok(vec![FORMAT_VERSION, depth as u8])
}
