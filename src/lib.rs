pub mod catalog;
pub mod config;
pub mod encoding;
pub mod error;
pub mod node;
pub mod path;
pub mod schema;
pub mod store;

pub use catalog::{CheckKeyResult, CreateTimeseriesPlan, SchemaCatalog};
pub use config::{CatalogConfig, StoreConfig};
pub use error::{Error, Result};
pub use node::{MeasurementRecord, NodeType};
pub use path::PartialPath;
pub use schema::{Compression, DataType, Encoding, MeasurementSchema};
pub use store::{FjallStore, MemoryStore, Store};
