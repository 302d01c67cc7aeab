//! Ordered key-value engines the catalog is stored in.
//!
//! The catalog only needs point reads, prefix scans and atomic batches across
//! a few named tables. A batch may carry fencing preconditions that are
//! evaluated together with the writes, which is how concurrent creators of the
//! same node are told apart.

pub mod batch;
pub mod disk;
pub mod memory;

pub use batch::{BatchOp, Precondition, WriteBatch};
pub use disk::FjallStore;
pub use memory::MemoryStore;

use crate::error::Result;
use std::fmt;
use std::ops::{Bound, RangeBounds};

/// Logical tables (column groups) owned by the catalog.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Table {
    /// Node records keyed by physical level key.
    Nodes,
    /// Tag side-records keyed by the canonical measurement key.
    Tags,
    /// Alias names, namespace wide, mapped to the canonical measurement key.
    Aliases,
}

impl Table {
    pub const ALL: [Table; 3] = [Table::Nodes, Table::Tags, Table::Aliases];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Nodes => "nodes",
            Table::Tags => "tags",
            Table::Aliases => "aliases",
        }
    }
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

pub trait Store: Send + Sync {
    /// The iterator returned by scan().
    type ScanIterator<'a>: ScanIterator + 'a
    where
        Self: Sized + 'a;

    /// Retrieves the value for a given key.
    fn get(&self, table: Table, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Retrieves several keys from one consistent view of the table.
    fn multi_get(&self, table: Table, keys: &[Vec<u8>]) -> Result<Vec<Option<Vec<u8>>>>;

    /// Iterates over an ordered range of key-value pairs. The iterator observes
    /// every committed batch in full or not at all.
    fn scan<'a>(
        &'a self,
        table: Table,
        range: impl RangeBounds<Vec<u8>> + Clone + Send + Sync + 'a,
    ) -> Result<Self::ScanIterator<'a>>
    where
        Self: Sized;

    /// Iterates over all key-value pairs starting with the given prefix.
    fn scan_prefix<'a>(&'a self, table: Table, prefix: &[u8]) -> Result<Self::ScanIterator<'a>>
    where
        Self: Sized,
    {
        self.scan(table, prefix_range(prefix))
    }

    /// Applies every operation of the batch atomically, or none of them when a
    /// precondition fails or the engine rejects the write.
    fn commit(&self, batch: WriteBatch) -> Result<()>;
}

pub trait ScanIterator: Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> {}

impl<I> ScanIterator for I where I: Iterator<Item = Result<(Vec<u8>, Vec<u8>)>> {}

/// Range covering exactly the keys that start with `prefix`.
pub fn prefix_range(prefix: &[u8]) -> (Bound<Vec<u8>>, Bound<Vec<u8>>) {
    let start = Bound::Included(prefix.to_vec());
    let end = match prefix.iter().rposition(|b| *b != 0xff) {
        Some(i) => Bound::Excluded(
            prefix[..i]
                .iter()
                .chain(std::iter::once(&(prefix[i] + 1)))
                .copied()
                .collect::<Vec<u8>>(),
        ),
        None => Bound::Unbounded,
    };
    (start, end)
}
