//! 라우터 설정
//!
//! 환경별 데이터베이스 설정에서 마스터/슬레이브 대상을 결정합니다.
//!
//! 설정 파일은 환경 이름을 키로 하는 YAML 맵입니다. 각 환경은 자신의
//! 데이터베이스와 선택적인 `master_database`/`slave_database`를 가질 수
//! 있으며, 최상위에 `master_database`를 둘 수도 있습니다.
//!
//! ```yaml
//! production:
//!   adapter: sqlite3
//!   database: db/master.sqlite3
//!   slave_database:
//!     adapter: sqlite3
//!     database: db/replica.sqlite3
//! ```

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use super::error::{RouterError, RouterResult};
use super::mode::ModeScope;

/// 최상위 마스터 설정 키
pub const MASTER_DATABASE_KEY: &str = "master_database";

/// 지원하는 어댑터
const SUPPORTED_ADAPTERS: &[&str] = &["sqlite3", "sqlite"];

// ============================================================================
// DatabaseConfig - 데이터베이스 설정
// ============================================================================

/// 단일 데이터베이스 설정
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// 어댑터 이름
    pub adapter: String,
    /// 데이터베이스 경로 (`:memory:` 가능)
    pub database: String,
}

impl DatabaseConfig {
    /// 새 설정 생성
    pub fn new(adapter: impl Into<String>, database: impl Into<String>) -> Self {
        Self {
            adapter: adapter.into(),
            database: database.into(),
        }
    }

    /// SQLite 설정 생성
    pub fn sqlite(database: impl Into<String>) -> Self {
        Self::new("sqlite3", database)
    }

    /// 메모리 데이터베이스 여부
    pub fn is_in_memory(&self) -> bool {
        self.database == ":memory:"
    }

    /// 어댑터 검증
    pub fn validate(&self) -> RouterResult<()> {
        if !SUPPORTED_ADAPTERS.contains(&self.adapter.as_str()) {
            return Err(RouterError::configuration(format!(
                "Unsupported adapter '{}'",
                self.adapter
            )));
        }
        if self.database.is_empty() {
            return Err(RouterError::configuration("Database path is empty"));
        }
        Ok(())
    }
}

// ============================================================================
// EnvironmentConfig - 환경 설정
// ============================================================================

/// 환경 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvironmentConfig {
    /// 환경 기본 데이터베이스
    #[serde(flatten)]
    pub database: DatabaseConfig,
    /// 환경 내부 마스터 설정
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub master_database: Option<DatabaseConfig>,
    /// 환경 내부 슬레이브 설정
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slave_database: Option<DatabaseConfig>,
}

impl EnvironmentConfig {
    /// 새 환경 설정 생성
    pub fn new(database: DatabaseConfig) -> Self {
        Self {
            database,
            master_database: None,
            slave_database: None,
        }
    }

    /// 마스터 설정
    pub fn with_master(mut self, master: DatabaseConfig) -> Self {
        self.master_database = Some(master);
        self
    }

    /// 슬레이브 설정
    pub fn with_slave(mut self, slave: DatabaseConfig) -> Self {
        self.slave_database = Some(slave);
        self
    }
}

// ============================================================================
// ResolvedTopology - 결정된 대상
// ============================================================================

/// 결정된 마스터/슬레이브 대상
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTopology {
    /// 마스터 데이터베이스
    pub master: DatabaseConfig,
    /// 슬레이브 데이터베이스
    pub slave: DatabaseConfig,
}

impl ResolvedTopology {
    /// 마스터와 슬레이브가 같은 데이터베이스인지 여부
    pub fn is_single_database(&self) -> bool {
        self.master == self.slave
    }
}

// ============================================================================
// DatabaseConfigurations - 전체 설정
// ============================================================================

/// 환경별 데이터베이스 설정 모음
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatabaseConfigurations {
    environments: HashMap<String, EnvironmentConfig>,
}

impl DatabaseConfigurations {
    /// 빈 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// YAML 문자열에서 로드
    pub fn from_yaml_str(yaml: &str) -> RouterResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    /// YAML 파일에서 로드
    pub fn from_yaml_file(path: impl AsRef<Path>) -> RouterResult<Self> {
        let yaml = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&yaml)
    }

    /// 환경 추가
    pub fn with_environment(mut self, name: impl Into<String>, config: EnvironmentConfig) -> Self {
        self.environments.insert(name.into(), config);
        self
    }

    /// 환경 설정 조회
    pub fn environment(&self, name: &str) -> RouterResult<&EnvironmentConfig> {
        self.environments.get(name).ok_or_else(|| {
            RouterError::configuration(format!("No database configured for environment '{}'", name))
        })
    }

    /// 환경에 슬레이브가 정의되어 있는지 여부
    pub fn slave_defined(&self, env: &str) -> bool {
        self.environments
            .get(env)
            .map_or(false, |config| config.slave_database.is_some())
    }

    /// 마스터/슬레이브 대상 결정
    ///
    /// - 마스터: 환경 내부 `master_database`, 최상위 `master_database`,
    ///   환경 기본 데이터베이스 순
    /// - 슬레이브: 환경 내부 `slave_database`, 환경 기본 데이터베이스 순
    pub fn resolve(&self, env: &str) -> RouterResult<ResolvedTopology> {
        let environment = self.environment(env)?;

        let master = environment
            .master_database
            .clone()
            .or_else(|| {
                self.environments
                    .get(MASTER_DATABASE_KEY)
                    .map(|top| top.database.clone())
            })
            .unwrap_or_else(|| environment.database.clone());

        let slave = environment
            .slave_database
            .clone()
            .unwrap_or_else(|| environment.database.clone());

        master.validate()?;
        slave.validate()?;

        Ok(ResolvedTopology { master, slave })
    }
}

// ============================================================================
// RouterConfig - 라우터 설정
// ============================================================================

/// 라우터 설정
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterConfig {
    /// 모드 공유 범위
    pub mode_scope: ModeScope,
}

impl RouterConfig {
    /// 새 설정 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 빌더 시작
    pub fn builder() -> RouterConfigBuilder {
        RouterConfigBuilder::default()
    }
}

/// 라우터 설정 빌더
#[derive(Debug, Default)]
pub struct RouterConfigBuilder {
    config: RouterConfig,
}

impl RouterConfigBuilder {
    /// 모드 공유 범위 설정
    pub fn with_mode_scope(mut self, scope: ModeScope) -> Self {
        self.config.mode_scope = scope;
        self
    }

    /// 스레드별 모드 사용
    pub fn with_thread_local_mode(self) -> Self {
        self.with_mode_scope(ModeScope::ThreadLocal)
    }

    /// 빌드
    pub fn build(self) -> RouterConfig {
        self.config
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const MASTER: &str = "/tmp/db/master.sqlite3";
    const SLAVE: &str = "/tmp/db/slave.sqlite3";

    fn default_config() -> String {
        format!("test:\n  adapter: sqlite3\n  database: {MASTER}\n")
    }

    fn master_outside_config() -> String {
        format!(
            "test:\n  adapter: sqlite3\n  database: {SLAVE}\n\
             master_database:\n  adapter: sqlite3\n  database: {MASTER}\n"
        )
    }

    fn master_inside_config() -> String {
        format!(
            "test:\n  adapter: sqlite3\n  database: {SLAVE}\n  \
             master_database:\n    adapter: sqlite3\n    database: {MASTER}\n"
        )
    }

    fn slave_inside_config() -> String {
        format!(
            "test:\n  adapter: sqlite3\n  database: {MASTER}\n  \
             slave_database:\n    adapter: sqlite3\n    database: {SLAVE}\n"
        )
    }

    #[test]
    fn test_slave_defined() {
        let configs = DatabaseConfigurations::from_yaml_str(&default_config()).unwrap();
        assert!(!configs.slave_defined("test"));

        let configs = DatabaseConfigurations::from_yaml_str(&slave_inside_config()).unwrap();
        assert!(configs.slave_defined("test"));
        assert!(!configs.slave_defined("production"));
    }

    #[test]
    fn test_resolve_default() {
        let configs = DatabaseConfigurations::from_yaml_str(&default_config()).unwrap();
        let topology = configs.resolve("test").unwrap();

        assert_eq!(topology.master, DatabaseConfig::sqlite(MASTER));
        assert_eq!(topology.slave, DatabaseConfig::sqlite(MASTER));
        assert!(topology.is_single_database());
    }

    #[test]
    fn test_resolve_master_outside_environment() {
        let configs = DatabaseConfigurations::from_yaml_str(&master_outside_config()).unwrap();
        let topology = configs.resolve("test").unwrap();

        assert_eq!(topology.master.database, MASTER);
        assert_eq!(topology.slave.database, SLAVE);
        assert!(!topology.is_single_database());
    }

    #[test]
    fn test_resolve_master_inside_environment() {
        let configs = DatabaseConfigurations::from_yaml_str(&master_inside_config()).unwrap();
        let topology = configs.resolve("test").unwrap();

        assert_eq!(topology.master.database, MASTER);
        assert_eq!(topology.slave.database, SLAVE);
    }

    #[test]
    fn test_resolve_slave_inside_environment() {
        let configs = DatabaseConfigurations::from_yaml_str(&slave_inside_config()).unwrap();
        let topology = configs.resolve("test").unwrap();

        assert_eq!(topology.master.database, MASTER);
        assert_eq!(topology.slave.database, SLAVE);
    }

    #[test]
    fn test_resolve_missing_environment() {
        let configs = DatabaseConfigurations::from_yaml_str(&default_config()).unwrap();
        let err = configs.resolve("production").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_resolve_rejects_unknown_adapter() {
        let configs = DatabaseConfigurations::new().with_environment(
            "test",
            EnvironmentConfig::new(DatabaseConfig::new("oracle", "app")),
        );
        assert!(configs.resolve("test").unwrap_err().is_configuration());
    }

    #[test]
    fn test_malformed_yaml_is_configuration_error() {
        let err = DatabaseConfigurations::from_yaml_str("test: [1, 2").unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn test_programmatic_configurations() {
        let configs = DatabaseConfigurations::new().with_environment(
            "test",
            EnvironmentConfig::new(DatabaseConfig::sqlite(MASTER))
                .with_slave(DatabaseConfig::sqlite(SLAVE)),
        );
        let topology = configs.resolve("test").unwrap();
        assert_eq!(topology.slave.database, SLAVE);
    }

    #[test]
    fn test_router_config_builder() {
        assert_eq!(RouterConfig::new().mode_scope, ModeScope::Global);

        let config = RouterConfig::builder().with_thread_local_mode().build();
        assert_eq!(config.mode_scope, ModeScope::ThreadLocal);
    }

    #[test]
    fn test_database_config_validation() {
        assert!(DatabaseConfig::sqlite(":memory:").validate().is_ok());
        assert!(DatabaseConfig::sqlite(":memory:").is_in_memory());
        assert!(DatabaseConfig::sqlite("").validate().unwrap_err().is_configuration());
    }
}
