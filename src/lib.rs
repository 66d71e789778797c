//! # rw-router
//!
//! A read/write splitting connection router: one logical database connection
//! backed by a master (writes) and a slave (reads).
//!
//! ## Features
//!
//! - **Automatic routing** - Writes and schema changes always go to the master,
//!   reads follow the current mode
//! - **Master scopes** - Temporarily send reads to the master for
//!   read-your-writes consistency, with automatic revert on exit, error or panic
//! - **Transactions** - Always run on the master
//! - **Drop-in connection** - The router implements the same [`Connection`]
//!   trait as the connections it wraps
//! - **YAML configuration** - Per-environment master/slave resolution
//! - **SQLite backend** - Built on `rusqlite`
//!
//! ## Quick Start
//!
//! Add to your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! rw-router = "0.1"
//! ```
//!
//! ## Basic Usage
//!
//! ```rust,no_run
//! use rw_router::{setup, Connection, DatabaseConfigurations};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let configs = DatabaseConfigurations::from_yaml_str(
//!         "production:
//!            adapter: sqlite3
//!            database: db/master.sqlite3
//!            slave_database:
//!              adapter: sqlite3
//!              database: db/replica.sqlite3",
//!     )?;
//!     let router = setup(&configs, "production")?;
//!
//!     // Goes to the master
//!     let id = router.insert("INSERT INTO users (name) VALUES ('alice')")?;
//!
//!     // Goes to the slave
//!     let users = router.select_all("SELECT * FROM users")?;
//!
//!     // Goes to the master while inside the scope
//!     let fresh = router.with_master(|| {
//!         router.select_one(&format!("SELECT * FROM users WHERE id = {id}"))
//!     })?;
//!
//!     println!("{} users, fresh: {:?}", users.len(), fresh);
//!     Ok(())
//! }
//! ```
//!
//! ## Transactions
//!
//! ```rust,no_run
//! # use rw_router::{setup, Connection, DatabaseConfigurations};
//! # fn example() -> rw_router::RouterResult<()> {
//! # let configs = DatabaseConfigurations::from_yaml_file("config/database.yml")?;
//! # let router = setup(&configs, "production")?;
//! // Commits on Ok, rolls back on Err
//! router.transaction(true, || {
//!     router.update("UPDATE accounts SET balance = balance - 10 WHERE id = 1")?;
//!     router.update("UPDATE accounts SET balance = balance + 10 WHERE id = 2")?;
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```
//!
//! ## Mode Scope
//!
//! By default the master/slave mode is shared by every thread using the
//! router. Use a thread-local mode to isolate scopes per thread:
//!
//! ```rust
//! use rw_router::{ModeScope, RouterConfig};
//!
//! let config = RouterConfig::builder()
//!     .with_thread_local_mode()
//!     .build();
//! assert_eq!(config.mode_scope, ModeScope::ThreadLocal);
//! ```
//!
//! ## Error Handling
//!
//! All operations return [`RouterResult`]:
//!
//! ```rust,no_run
//! # use rw_router::{setup, DatabaseConfigurations, RouterError};
//! let configs = DatabaseConfigurations::new();
//!
//! match setup(&configs, "production") {
//!     Ok(_) => println!("Ready"),
//!     Err(RouterError::Configuration(msg)) => eprintln!("Bad configuration: {}", msg),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```
//!
//! ## Modules
//!
//! - [`router`] - Routing, mode tracking, configuration and hooks
//! - [`sqlite`] - SQLite connection and provider
//!

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod router;
pub mod sqlite;

// Re-exports for convenience
pub use router::{
    setup, setup_for, setup_with_config,
    ConnectionRouter, RouterConfig, RouterConfigBuilder, RouterMetrics,
    Connection, ConnectionProvider, SharedProvider, Operation,
    Mode, ModeScope, MasterScope,
    DatabaseConfig, DatabaseConfigurations, EnvironmentConfig,
    Record, Value,
    RouterError, RouterResult,
};

pub use sqlite::{SqliteConnection, SqliteProvider};
