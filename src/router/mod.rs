//! 읽기/쓰기 라우팅 모듈
//!
//! 하나의 논리 연결 뒤에 마스터와 슬레이브 연결을 두고 호출마다 대상을
//! 결정합니다.
//!
//! # 개요
//!
//! - 쓰기와 스키마 변경은 항상 마스터로 갑니다.
//! - 그 밖의 읽기는 현재 모드를 따릅니다. 기본은 슬레이브입니다.
//! - [`ConnectionRouter::with_master`] 스코프 안에서는 읽기도 마스터로
//!   가며, 스코프가 끝나면 슬레이브로 돌아옵니다.
//! - 트랜잭션은 항상 마스터에서 실행됩니다.
//!
//! # 예시
//!
//! ```no_run
//! use rw_router::router::{setup, Connection, DatabaseConfigurations};
//!
//! # fn example() -> rw_router::RouterResult<()> {
//! let configs = DatabaseConfigurations::from_yaml_file("config/database.yml")?;
//! let router = setup(&configs, "production")?;
//!
//! // 슬레이브에서 읽기
//! let count = router.select_value("SELECT COUNT(*) FROM users")?;
//!
//! // 쓰기는 마스터로
//! router.insert("INSERT INTO users (name) VALUES ('alice')")?;
//!
//! // 방금 쓴 행은 마스터에서 읽기
//! let latest = router.with_master(|| router.select_one("SELECT * FROM users ORDER BY id DESC"))?;
//! # let _ = (count, latest);
//! # Ok(())
//! # }
//! ```

mod config;
mod connection;
mod error;
mod hooks;
mod mode;
mod provider;
mod proxy;
mod record;
mod setup;

#[cfg(test)]
mod testing;

pub use config::{
    DatabaseConfig, DatabaseConfigurations, EnvironmentConfig, ResolvedTopology, RouterConfig,
    RouterConfigBuilder, MASTER_DATABASE_KEY,
};
pub use connection::{
    run_transaction, ColumnDefinition, ColumnInfo, Connection, IndexDefinition, Operation,
    TransactionBody,
};
pub use error::{RouterError, RouterResult};
pub use hooks::{
    ChangeEvent, ChangeKind, ChangeNotifier, ConsistentBody, MasterConsistency, Observer, Reload,
};
pub use mode::{MasterScope, Mode, ModeScope, ModeState, ModeTracker};
pub use provider::{ConnectionProvider, SharedProvider};
pub use proxy::{ConnectionRouter, RouterMetrics};
pub use record::{Record, Value};
pub use setup::{setup, setup_for, setup_with_config};
