//! Storage plumbing: SQL dialects, the engine registry, statement execution,
//! transaction state and the document store collaborator.

pub mod dialect;
pub mod document;
pub mod executor;
pub mod params;
pub mod pool;
pub mod transaction;
pub mod types;

pub use dialect::SqlDialect;
pub use document::{DocumentStore, MemoryDocumentStore, UpdateCounts};
pub use executor::Outcome;
pub use pool::{DbPool, EngineRegistry};
pub use transaction::{DbTransaction, TransactionContext, TransactionManager};
