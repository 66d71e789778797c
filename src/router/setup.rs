//! 라우터 구성
//!
//! 환경 설정을 읽어 마스터/슬레이브 제공자를 만들고 라우터로 묶습니다.

use std::sync::Arc;

use super::config::{DatabaseConfigurations, RouterConfig};
use super::error::RouterResult;
use super::provider::ConnectionProvider;
use super::proxy::ConnectionRouter;
use crate::sqlite::SqliteProvider;

/// 환경 이름으로 라우터 구성
///
/// 마스터와 슬레이브가 같은 데이터베이스로 결정되면 제공자 하나를 양쪽에
/// 공유하므로 두 역할이 같은 물리 연결을 사용합니다.
pub fn setup(configs: &DatabaseConfigurations, env: &str) -> RouterResult<Arc<ConnectionRouter>> {
    setup_with_config(configs, env, RouterConfig::default())
}

/// 라우터 설정을 지정해 구성
pub fn setup_with_config(
    configs: &DatabaseConfigurations,
    env: &str,
    config: RouterConfig,
) -> RouterResult<Arc<ConnectionRouter>> {
    let topology = configs.resolve(env)?;

    tracing::info!(
        environment = env,
        master = %topology.master.database,
        slave = %topology.slave.database,
        single = topology.is_single_database(),
        mode_scope = ?config.mode_scope,
        "configuring read/write router"
    );

    let master: Arc<dyn ConnectionProvider> =
        Arc::new(SqliteProvider::new(topology.master.clone())?);
    let slave: Arc<dyn ConnectionProvider> = if topology.is_single_database() {
        Arc::clone(&master)
    } else {
        Arc::new(SqliteProvider::new(topology.slave)?)
    };

    Ok(Arc::new(ConnectionRouter::with_config(master, slave, config)))
}

/// 제공자로 직접 구성
///
/// 슬레이브가 없으면 마스터 제공자가 두 역할을 모두 맡습니다.
pub fn setup_for(
    master: Arc<dyn ConnectionProvider>,
    slave: Option<Arc<dyn ConnectionProvider>>,
) -> Arc<ConnectionRouter> {
    let slave = slave.unwrap_or_else(|| Arc::clone(&master));
    Arc::new(ConnectionRouter::new(master, slave))
}

// ============================================================================
// Tests
// ============================================================================
