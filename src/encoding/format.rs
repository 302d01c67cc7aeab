//! Formats raw keys and values for log lines and error messages. Node keys
//! are decoded into their path and node type where possible.

use itertools::Itertools as _;

use super::keycode::LevelKey;
use crate::node::NodeValue;

/// Formats encoded keys and values.
pub trait Formatter {
    /// Formats a key.
    fn key(key: &[u8]) -> String;

    /// Formats a value. Also takes the key to determine the kind of value.
    fn value(key: &[u8], value: &[u8]) -> String;

    /// Formats a key/value pair.
    fn key_value(key: &[u8], value: &[u8]) -> String {
        Self::key_maybe_value(key, Some(value))
    }

    /// Formats a key/value pair, where the value may not exist.
    fn key_maybe_value(key: &[u8], value: Option<&[u8]>) -> String {
        let fmtkey = Self::key(key);
        let fmtvalue = value.map_or("None".to_string(), |v| Self::value(key, v));
        format!("{fmtkey} → {fmtvalue}")
    }
}

/// Formats raw byte slices without any decoding.
pub struct Raw;

impl Raw {
    /// Formats raw bytes as escaped ASCII strings.
    pub fn bytes(bytes: &[u8]) -> String {
        let escaped = bytes
            .iter()
            .copied()
            .flat_map(std::ascii::escape_default)
            .collect_vec();
        format!("\"{}\"", String::from_utf8_lossy(&escaped))
    }
}

impl Formatter for Raw {
    fn key(key: &[u8]) -> String {
        Self::bytes(key)
    }

    fn value(_key: &[u8], value: &[u8]) -> String {
        Self::bytes(value)
    }
}

/// Formats physical node keys as `path#type`, falling back to raw bytes.
pub struct NodeKeys;

impl Formatter for NodeKeys {
    fn key(key: &[u8]) -> String {
        let Ok((level, node_type)) = LevelKey::from_physical(key) else {
            return Raw::key(key);
        };
        match level.to_path() {
            Ok(path) => format!("{path}#{node_type}"),
            Err(_) => Raw::key(key),
        }
    }

    fn value(key: &[u8], value: &[u8]) -> String {
        match NodeValue::decode(value) {
            Ok(NodeValue::Measurement(record)) => {
                let mut parts = vec![
                    record.schema.data_type.to_string(),
                    record.schema.encoding.to_string(),
                    record.schema.compressor.to_string(),
                ];
                if let Some(alias) = &record.alias {
                    parts.push(format!("alias={alias}"));
                }
                if !record.tags.is_empty() {
                    let tags = record.tags.iter().map(|(k, v)| format!("{k}={v}")).join(",");
                    parts.push(format!("tags={{{tags}}}"));
                }
                format!("measurement({})", parts.join(" "))
            }
            Ok(NodeValue::Alias(target)) => format!("alias({})", Self::key(&target)),
            Ok(other) => other.node_type().to_string(),
            Err(_) => Raw::value(key, value),
        }
    }
}
