//! uqlgate: one small query language over heterogeneous data backends.
//!
//! A [`Gateway`] resolves a backend family and engine from configuration,
//! opens the matching adapter and forwards `create`/`find`/`delete`,
//! native queries, UQL statements and transactions to it. Relational engines
//! (SQLite, PostgreSQL, MySQL) run through pooled sqlx connections shared via
//! an [`EngineRegistry`]; document stores run through a [`db::DocumentStore`];
//! graph, vector and AI backends shape requests without executing them.

pub mod adapter;
pub mod config;
pub mod db;
pub mod error;
pub mod gateway;
pub mod models;
pub mod router;
pub mod uql;
pub mod validator;

pub use adapter::{Adapter, NativeRequest};
pub use config::{GatewayConfig, PoolOptions};
pub use db::{EngineRegistry, TransactionContext};
pub use error::{QueryError, QueryResult};
pub use gateway::Gateway;
pub use models::{Record, Where};
pub use router::{Family, Route};
