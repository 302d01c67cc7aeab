//! Node types and the values stored under node keys.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::encoding::{EncodingError, Value};
use crate::error::Result;
use crate::schema::MeasurementSchema;

/// Version byte leading every node value.
pub const DATA_VERSION: u8 = 0x01;

/// The closed set of node kinds. At rest at most one structural kind is
/// stored per level key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeType {
    /// Depth 0, never stored.
    Root,
    Internal,
    StorageGroup,
    Entity,
    Measurement,
    Alias,
}

impl NodeType {
    /// Every kind that can be stored under a level key.
    pub const STORED: [NodeType; 5] = [
        NodeType::Internal,
        NodeType::StorageGroup,
        NodeType::Entity,
        NodeType::Measurement,
        NodeType::Alias,
    ];

    /// Marker byte appended to a level key and repeated in the value header.
    pub fn marker(self) -> u8 {
        match self {
            NodeType::Root => 0x00,
            NodeType::Internal => 0x01,
            NodeType::StorageGroup => 0x02,
            NodeType::Entity => 0x03,
            NodeType::Measurement => 0x04,
            NodeType::Alias => 0x05,
        }
    }

    pub fn from_marker(marker: u8) -> std::result::Result<Self, EncodingError> {
        match marker {
            0x01 => Ok(NodeType::Internal),
            0x02 => Ok(NodeType::StorageGroup),
            0x03 => Ok(NodeType::Entity),
            0x04 => Ok(NodeType::Measurement),
            0x05 => Ok(NodeType::Alias),
            other => Err(EncodingError::InvalidFormat(format!(
                "unknown node type marker {other:#04x}"
            ))),
        }
    }

    /// Terminal kinds may not have descendants.
    pub fn is_terminal(self) -> bool {
        matches!(self, NodeType::Measurement | NodeType::Alias)
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            NodeType::Root => "root",
            NodeType::Internal => "internal",
            NodeType::StorageGroup => "storage-group",
            NodeType::Entity => "entity",
            NodeType::Measurement => "measurement",
            NodeType::Alias => "alias",
        };
        f.write_str(name)
    }
}

/// Payload of a measurement node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementRecord {
    pub schema: MeasurementSchema,
    pub alias: Option<String>,
    pub tags: BTreeMap<String, String>,
    pub attributes: BTreeMap<String, String>,
}

/// Decoded node value: `[DATA_VERSION][marker][payload]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum NodeValue {
    Internal,
    StorageGroup,
    Entity,
    Measurement(MeasurementRecord),
    /// Physical key of the canonical measurement.
    Alias(Vec<u8>),
}

impl NodeValue {
    pub fn node_type(&self) -> NodeType {
        match self {
            NodeValue::Internal => NodeType::Internal,
            NodeValue::StorageGroup => NodeType::StorageGroup,
            NodeValue::Entity => NodeType::Entity,
            NodeValue::Measurement(_) => NodeType::Measurement,
            NodeValue::Alias(_) => NodeType::Alias,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut out = vec![DATA_VERSION, self.node_type().marker()];
        match self {
            NodeValue::Internal | NodeValue::StorageGroup | NodeValue::Entity => {}
            NodeValue::Measurement(record) => out.extend(Value::encode(record)?),
            NodeValue::Alias(target) => out.extend_from_slice(target),
        }
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Self> {
        let (version, marker, payload) = match bytes {
            [version, marker, payload @ ..] => (*version, *marker, payload),
            _ => return Err(EncodingError::TruncatedData.into()),
        };
        if version != DATA_VERSION {
            return Err(EncodingError::InvalidFormat(format!(
                "unsupported node value version {version}"
            ))
            .into());
        }
        let value = match NodeType::from_marker(marker)? {
            NodeType::Internal => NodeValue::Internal,
            NodeType::StorageGroup => NodeValue::StorageGroup,
            NodeType::Entity => NodeValue::Entity,
            NodeType::Measurement => {
                NodeValue::Measurement(<MeasurementRecord as Value>::decode(payload)?)
            }
            NodeType::Alias => NodeValue::Alias(payload.to_vec()),
            NodeType::Root => {
                return Err(EncodingError::InvalidFormat("root is never stored".into()).into())
            }
        };
        Ok(value)
    }
}
