//! SQLite 연결 제공자
//!
//! 첫 요청 시 연결을 열고 이후에는 같은 핸들을 돌려줍니다.

use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

use super::connection::SqliteConnection;
use crate::router::{Connection, ConnectionProvider, DatabaseConfig, RouterResult};

/// 지연 연결 SQLite 제공자
pub struct SqliteProvider {
    config: DatabaseConfig,
    connection: Mutex<Option<Arc<dyn Connection>>>,
}

impl SqliteProvider {
    /// 새 제공자 생성
    ///
    /// 어댑터는 여기서 검증하므로 잘못된 설정은 기동 시점에 실패합니다.
    pub fn new(config: DatabaseConfig) -> RouterResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            connection: Mutex::new(None),
        })
    }

    /// 데이터베이스 설정
    pub fn config(&self) -> &DatabaseConfig {
        &self.config
    }

    /// 연결이 이미 열렸는지 여부
    pub fn is_connected(&self) -> bool {
        self.connection.lock().is_some()
    }
}

impl ConnectionProvider for SqliteProvider {
    fn connection(&self) -> RouterResult<Arc<dyn Connection>> {
        let mut slot = self.connection.lock();
        if let Some(conn) = slot.as_ref() {
            return Ok(Arc::clone(conn));
        }

        let conn: Arc<dyn Connection> = Arc::new(SqliteConnection::from_config(&self.config)?);
        tracing::debug!(database = %self.config.database, "sqlite provider connected");
        *slot = Some(Arc::clone(&conn));
        Ok(conn)
    }
}

impl fmt::Debug for SqliteProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteProvider")
            .field("config", &self.config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_connects_lazily() {
        let provider = SqliteProvider::new(DatabaseConfig::sqlite(":memory:")).unwrap();
        assert!(!provider.is_connected());

        let first = provider.connection().unwrap();
        assert!(provider.is_connected());

        let second = provider.connection().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_provider_rejects_unknown_adapter() {
        let err = SqliteProvider::new(DatabaseConfig::new("mysql", "app")).unwrap_err();
        assert!(err.is_configuration());
    }
}
