//! Data models shared across the gateway.

pub mod connection;
pub mod value;

// Re-export commonly used types
pub use connection::{ConnectionDescriptor, DatabaseType, ParsedConnectionInfo, mask_credentials};
pub use value::{QueryParam, Record, Where};
