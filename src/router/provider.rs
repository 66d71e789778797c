//! 연결 제공자
//!
//! 라우터는 연결을 소유하지 않고, 호출마다 제공자에게 연결을 요청합니다.

use std::fmt;
use std::sync::Arc;

use super::connection::Connection;
use super::error::RouterResult;

/// 연결 제공자
///
/// 반복 호출할 수 있어야 하며, 라우터 입장에서 부수 효과가 없어야 합니다.
/// 구현체는 첫 호출 시 연결을 열거나 풀에서 꺼낼 수 있습니다.
pub trait ConnectionProvider: Send + Sync {
    /// 살아 있는 연결 핸들
    fn connection(&self) -> RouterResult<Arc<dyn Connection>>;
}

/// 이미 열린 연결 하나를 공유하는 제공자
#[derive(Clone)]
pub struct SharedProvider {
    connection: Arc<dyn Connection>,
}

impl SharedProvider {
    /// 새 제공자 생성
    pub fn new(connection: Arc<dyn Connection>) -> Self {
        Self { connection }
    }

    /// 공유 중인 연결
    pub fn shared(&self) -> &dyn Connection {
        self.connection.as_ref()
    }
}

impl ConnectionProvider for SharedProvider {
    fn connection(&self) -> RouterResult<Arc<dyn Connection>> {
        Ok(Arc::clone(&self.connection))
    }
}

impl fmt::Debug for SharedProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SharedProvider")
            .field("connection", &self.connection.label())
            .finish()
    }
}

impl<F> ConnectionProvider for F
where
    F: Fn() -> RouterResult<Arc<dyn Connection>> + Send + Sync,
{
    fn connection(&self) -> RouterResult<Arc<dyn Connection>> {
        self()
    }
}
