//! SQLite 백엔드
//!
//! 라우터의 마스터/슬레이브 양쪽에 꽂을 수 있는 `rusqlite` 기반 연결과
//! 지연 연결 제공자입니다.
//!
//! # 예시
//!
//! ```no_run
//! use std::sync::Arc;
//! use rw_router::sqlite::SqliteProvider;
//! use rw_router::{ConnectionRouter, DatabaseConfig};
//!
//! # fn example() -> rw_router::RouterResult<()> {
//! let master = Arc::new(SqliteProvider::new(DatabaseConfig::sqlite("db/master.sqlite3"))?);
//! let slave = Arc::new(SqliteProvider::new(DatabaseConfig::sqlite("db/slave.sqlite3"))?);
//! let router = ConnectionRouter::new(master, slave);
//! # Ok(())
//! # }
//! ```

mod connection;
mod provider;

pub use connection::{SqliteConnection, SCHEMA_INFO_TABLE};
pub use provider::SqliteProvider;
