//! Database layer - connection pool, schema and repositories
//!
//! - Connection pool, no Arc<Mutex<Connection>>
//! - List operations use JOINs and `COUNT(*) OVER()`, no N+1
//! - Rely on DB constraints and map conflicts, no check-then-insert
//! - Vote and comment counters are refreshed in the transaction that
//!   touched the rows they count

pub mod migrations;
pub mod pool;
pub mod repos;

pub use pool::{create_pool, create_pool_with_options};
pub use repos::*;

#[cfg(test)]
pub(crate) mod testing;
