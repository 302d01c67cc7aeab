//! Dotted node paths such as `root.sg.d1.s1`.
//!
//! Index 0 of every path is the implicit root name; the depth of a path is its
//! node count minus one. Paths may also be used as patterns, where `*` matches
//! exactly one node and `**` matches one or more.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

pub const ROOT: &str = "root";
pub const PATH_SEPARATOR: char = '.';
pub const ONE_LEVEL_WILDCARD: &str = "*";
pub const MULTI_LEVEL_WILDCARD: &str = "**";

#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct PartialPath {
    nodes: Vec<String>,
}

impl PartialPath {
    /// Parses a dotted path. The first node must be `root`.
    pub fn parse(path: &str) -> Result<Self> {
        let nodes = path
            .split(PATH_SEPARATOR)
            .map(str::to_string)
            .collect::<Vec<_>>();
        Self::from_nodes(nodes)
    }

    pub fn from_nodes(nodes: Vec<String>) -> Result<Self> {
        let display = nodes.join(".");
        match nodes.first() {
            Some(first) if first == ROOT => {}
            _ => return Err(Error::invalid_path(display, "path must start with root")),
        }
        for name in &nodes[1..] {
            validate_name(&display, name)?;
        }
        Ok(Self { nodes })
    }

    pub fn root() -> Self {
        Self {
            nodes: vec![ROOT.to_string()],
        }
    }

    pub fn nodes(&self) -> &[String] {
        &self.nodes
    }

    /// Depth of the last node; `root` is depth 0.
    pub fn depth(&self) -> usize {
        self.nodes.len() - 1
    }

    /// The last node name.
    pub fn measurement(&self) -> &str {
        &self.nodes[self.nodes.len() - 1]
    }

    /// The prefix of this path ending at `depth` inclusive.
    pub fn prefix(&self, depth: usize) -> PartialPath {
        let end = (depth + 1).min(self.nodes.len());
        Self {
            nodes: self.nodes[..end].to_vec(),
        }
    }

    pub fn parent(&self) -> Option<PartialPath> {
        if self.nodes.len() <= 1 {
            return None;
        }
        Some(self.prefix(self.depth() - 1))
    }

    pub fn child(&self, name: &str) -> Result<PartialPath> {
        validate_name(&self.full_path(), name)?;
        let mut nodes = self.nodes.clone();
        nodes.push(name.to_string());
        Ok(Self { nodes })
    }

    /// The same path with the last node replaced, as used for alias keys.
    pub fn with_leaf(&self, name: &str) -> Result<PartialPath> {
        if self.nodes.len() <= 1 {
            return Err(Error::invalid_path(self.full_path(), "root has no leaf"));
        }
        validate_name(&self.full_path(), name)?;
        let mut nodes = self.nodes.clone();
        let last = nodes.len() - 1;
        nodes[last] = name.to_string();
        Ok(Self { nodes })
    }

    pub fn full_path(&self) -> String {
        self.nodes.join(".")
    }

    pub fn has_wildcard(&self) -> bool {
        self.nodes
            .iter()
            .any(|n| n == ONE_LEVEL_WILDCARD || n == MULTI_LEVEL_WILDCARD)
    }

    /// Rejects patterns where a concrete path is required.
    pub fn ensure_concrete(&self) -> Result<()> {
        if self.has_wildcard() {
            return Err(Error::invalid_path(
                self.full_path(),
                "wildcards are not allowed here",
            ));
        }
        Ok(())
    }

    /// Whether `path` is matched by this path used as a pattern.
    pub fn matches(&self, path: &PartialPath) -> bool {
        match_nodes(&self.nodes, &path.nodes)
    }

    /// Whether some extension of `path` (or `path` itself) could match this
    /// pattern, i.e. `path` is a viable prefix of a match.
    pub fn matches_prefix(&self, path: &PartialPath) -> bool {
        prefix_viable(&self.nodes, &path.nodes)
    }

    /// Storage group path for auto-creation: this path truncated to `level`.
    pub fn storage_group_by_level(&self, level: usize) -> Result<PartialPath> {
        if level == 0 || self.nodes.len() <= level {
            return Err(Error::InvalidSchema(format!(
                "{} is too short for a storage group at level {}",
                self.full_path(),
                level
            )));
        }
        Ok(self.prefix(level))
    }
}

fn validate_name(path: &str, name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::invalid_path(path, "empty node name"));
    }
    if name.contains(PATH_SEPARATOR) {
        return Err(Error::invalid_path(
            path,
            format!("node name {name:?} contains the path separator"),
        ));
    }
    if name.contains('\0') {
        return Err(Error::invalid_path(
            path,
            format!("node name {name:?} contains a NUL byte"),
        ));
    }
    Ok(())
}

fn match_nodes(pattern: &[String], nodes: &[String]) -> bool {
    match pattern.split_first() {
        None => nodes.is_empty(),
        Some((head, rest)) if head == MULTI_LEVEL_WILDCARD => {
            (1..=nodes.len()).any(|taken| match_nodes(rest, &nodes[taken..]))
        }
        Some((head, rest)) => match nodes.split_first() {
            Some((node, remaining)) => {
                (head == ONE_LEVEL_WILDCARD || head == node) && match_nodes(rest, remaining)
            }
            None => false,
        },
    }
}

fn prefix_viable(pattern: &[String], nodes: &[String]) -> bool {
    match nodes.split_first() {
        None => true,
        Some((node, remaining)) => match pattern.split_first() {
            None => false,
            Some((head, rest)) if head == MULTI_LEVEL_WILDCARD => {
                prefix_viable(rest, remaining) || prefix_viable(pattern, remaining)
            }
            Some((head, rest)) => {
                (head == ONE_LEVEL_WILDCARD || head == node) && prefix_viable(rest, remaining)
            }
        },
    }
}

impl fmt::Display for PartialPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_path())
    }
}

impl FromStr for PartialPath {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
