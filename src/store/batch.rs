use super::Table;
use crate::encoding::format::{Formatter, NodeKeys};

/// A single write inside a batch.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BatchOp {
    Put {
        table: Table,
        key: Vec<u8>,
        value: Vec<u8>,
    },
    Delete {
        table: Table,
        key: Vec<u8>,
    },
}

/// A fencing condition checked against committed state when the batch is
/// applied.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Precondition {
    Absent { table: Table, key: Vec<u8> },
    Present { table: Table, key: Vec<u8> },
}

impl Precondition {
    /// Whether the condition holds given the current presence of its key.
    pub fn holds(&self, exists: bool) -> bool {
        match self {
            Precondition::Absent { .. } => !exists,
            Precondition::Present { .. } => exists,
        }
    }

    pub fn target(&self) -> (Table, &[u8]) {
        match self {
            Precondition::Absent { table, key } | Precondition::Present { table, key } => {
                (*table, key)
            }
        }
    }

    /// Message for the conflict raised when the condition fails.
    pub fn describe(&self) -> String {
        let (table, key) = self.target();
        let expectation = match self {
            Precondition::Absent { .. } => "absent",
            Precondition::Present { .. } => "present",
        };
        format!("expected {} in {table} to be {expectation}", NodeKeys::key(key))
    }
}

/// Ordered list of writes applied as one indivisible unit.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
    preconditions: Vec<Precondition>,
}

impl WriteBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, table: Table, key: Vec<u8>, value: Vec<u8>) -> &mut Self {
        self.ops.push(BatchOp::Put { table, key, value });
        self
    }

    pub fn delete(&mut self, table: Table, key: Vec<u8>) -> &mut Self {
        self.ops.push(BatchOp::Delete { table, key });
        self
    }

    /// Fails the commit if `key` exists when the batch is applied.
    pub fn expect_absent(&mut self, table: Table, key: Vec<u8>) -> &mut Self {
        self.preconditions.push(Precondition::Absent { table, key });
        self
    }

    /// Fails the commit unless `key` exists when the batch is applied.
    pub fn expect_present(&mut self, table: Table, key: Vec<u8>) -> &mut Self {
        self.preconditions.push(Precondition::Present { table, key });
        self
    }

    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    pub fn preconditions(&self) -> &[Precondition] {
        &self.preconditions
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_batch_keeps_order() {
        let mut batch = WriteBatch::new();
        batch
            .delete(Table::Nodes, b"a".to_vec())
            .put(Table::Nodes, b"b".to_vec(), b"1".to_vec())
            .put(Table::Tags, b"b".to_vec(), b"2".to_vec())
            .expect_present(Table::Nodes, b"a".to_vec());

        assert_eq!(batch.len(), 3);
        assert!(matches!(batch.ops()[0], BatchOp::Delete { .. }));
        assert_eq!(batch.preconditions().len(), 1);
        assert!(batch.preconditions()[0].holds(true));
        assert!(!batch.preconditions()[0].holds(false));
    }
}
