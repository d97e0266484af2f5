//! Database layer
//!
//! SQLite is the default (single-binary deployment); MySQL is available for
//! larger newsrooms. The driver is picked from `database.driver` in the
//! configuration and hidden behind the [`DatabasePool`] trait.
//!
//! ```ignore
//! use newsdesk::config::DatabaseConfig;
//! use newsdesk::db::{create_pool, migrations};
//!
//! let pool = create_pool(&DatabaseConfig::default()).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod repositories;

pub use pool::{create_pool, create_test_pool, mysql, sqlite, DatabasePool, DynDatabasePool};
