//! Measurement schema payload: data type, encoding and compression.
//!
//! These values are opaque to the key layout; they only flow into the
//! measurement record and the data-type/encoding compatibility check.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

macro_rules! named_enum {
    ($name:ident { $($variant:ident => $text:literal),+ $(,)? }) => {
        #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $($name::$variant => $text),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                match s.to_ascii_uppercase().as_str() {
                    $($text => Ok($name::$variant),)+
                    other => Err(Error::InvalidSchema(format!(
                        "unknown {} {}",
                        stringify!($name),
                        other
                    ))),
                }
            }
        }
    };
}

named_enum!(DataType {
    Boolean => "BOOLEAN",
    Int32 => "INT32",
    Int64 => "INT64",
    Float => "FLOAT",
    Double => "DOUBLE",
    Text => "TEXT",
});

named_enum!(Encoding {
    Plain => "PLAIN",
    Dictionary => "DICTIONARY",
    Rle => "RLE",
    Diff => "DIFF",
    Ts2Diff => "TS_2DIFF",
    Bitmap => "BITMAP",
    GorillaV1 => "GORILLA_V1",
    Regular => "REGULAR",
    Gorilla => "GORILLA",
    Zigzag => "ZIGZAG",
});

named_enum!(Compression {
    Uncompressed => "UNCOMPRESSED",
    Snappy => "SNAPPY",
    Gzip => "GZIP",
    Lzo => "LZO",
    Sdt => "SDT",
    Paa => "PAA",
    Pla => "PLA",
    Lz4 => "LZ4",
    Zstd => "ZSTD",
});

impl Encoding {
    /// Encodings a series of the given data type may be written with.
    pub fn supported_for(data_type: DataType) -> &'static [Encoding] {
        match data_type {
            DataType::Boolean => &[Encoding::Plain, Encoding::Rle],
            DataType::Int32 | DataType::Int64 => &[
                Encoding::Plain,
                Encoding::Rle,
                Encoding::Ts2Diff,
                Encoding::Gorilla,
                Encoding::Zigzag,
                Encoding::Regular,
            ],
            DataType::Float | DataType::Double => &[
                Encoding::Plain,
                Encoding::Rle,
                Encoding::Ts2Diff,
                Encoding::GorillaV1,
                Encoding::Gorilla,
            ],
            DataType::Text => &[Encoding::Plain, Encoding::Dictionary],
        }
    }
}

pub fn check_data_type_with_encoding(data_type: DataType, encoding: Encoding) -> Result<()> {
    if Encoding::supported_for(data_type).contains(&encoding) {
        return Ok(());
    }
    Err(Error::InvalidSchema(format!(
        "encoding {encoding} does not support {data_type}"
    )))
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementSchema {
    pub name: String,
    pub data_type: DataType,
    pub encoding: Encoding,
    pub compressor: Compression,
    pub props: BTreeMap<String, String>,
}

impl MeasurementSchema {
    pub fn new(
        name: impl Into<String>,
        data_type: DataType,
        encoding: Encoding,
        compressor: Compression,
    ) -> Self {
        Self {
            name: name.into(),
            data_type,
            encoding,
            compressor,
            props: BTreeMap::new(),
        }
    }

    pub fn props(mut self, props: BTreeMap<String, String>) -> Self {
        self.props = props;
        self
    }

    pub fn validate(&self) -> Result<()> {
        check_data_type_with_encoding(self.data_type, self.encoding)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_names() {
        assert_eq!("int64".parse::<DataType>().unwrap(), DataType::Int64);
        assert_eq!("TS_2DIFF".parse::<Encoding>().unwrap(), Encoding::Ts2Diff);
        assert_eq!("snappy".parse::<Compression>().unwrap(), Compression::Snappy);
        assert!("INT128".parse::<DataType>().is_err());
        assert_eq!(Encoding::GorillaV1.to_string(), "GORILLA_V1");
    }

    #[test]
    fn test_encoding_compatibility() {
        assert!(check_data_type_with_encoding(DataType::Boolean, Encoding::Rle).is_ok());
        assert!(check_data_type_with_encoding(DataType::Double, Encoding::Gorilla).is_ok());
        assert!(check_data_type_with_encoding(DataType::Text, Encoding::Dictionary).is_ok());

        let err = check_data_type_with_encoding(DataType::Text, Encoding::Ts2Diff).unwrap_err();
        assert!(matches!(err, Error::InvalidSchema(_)));
        assert!(check_data_type_with_encoding(DataType::Boolean, Encoding::Gorilla).is_err());
    }
}
