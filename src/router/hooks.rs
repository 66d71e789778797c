//! 마스터 일관성 훅
//!
//! 변경 알림 콜백과 엔티티 재로딩처럼 방금 쓴 데이터를 읽어야 하는 경로가
//! 마스터를 강제하도록 하는 진입점입니다. 라우터가 아닌 일반 연결에서는
//! 콜백을 그대로 실행합니다.

use std::fmt;
use std::sync::Arc;

use parking_lot::RwLock;

use super::connection::Connection;
use super::error::RouterResult;
use super::provider::SharedProvider;
use super::proxy::ConnectionRouter;
use crate::sqlite::SqliteConnection;

/// 마스터 일관성 콜백
pub type ConsistentBody<'a> = &'a mut dyn FnMut() -> RouterResult<()>;

// ============================================================================
// MasterConsistency - 마스터 일관성
// ============================================================================

/// 마스터 일관성 진입점
///
/// 트랜잭션 없이 마스터 스코프만 엽니다. 라우터가 아닌 일반 연결은
/// 콜백을 그대로 실행합니다.
pub trait MasterConsistency {
    /// 콜백이 사용할 연결
    fn as_connection(&self) -> &dyn Connection;

    /// 마스터를 강제한 상태로 콜백 실행
    fn run_with_master_consistency(&self, f: ConsistentBody<'_>) -> RouterResult<()>;
}

impl MasterConsistency for ConnectionRouter {
    fn as_connection(&self) -> &dyn Connection {
        self
    }

    fn run_with_master_consistency(&self, f: ConsistentBody<'_>) -> RouterResult<()> {
        self.with_master(f)
    }
}

impl MasterConsistency for SqliteConnection {
    fn as_connection(&self) -> &dyn Connection {
        self
    }

    fn run_with_master_consistency(&self, f: ConsistentBody<'_>) -> RouterResult<()> {
        f()
    }
}

impl MasterConsistency for Arc<dyn Connection> {
    fn as_connection(&self) -> &dyn Connection {
        self.as_ref()
    }

    fn run_with_master_consistency(&self, f: ConsistentBody<'_>) -> RouterResult<()> {
        f()
    }
}

impl MasterConsistency for SharedProvider {
    fn as_connection(&self) -> &dyn Connection {
        self.shared()
    }

    fn run_with_master_consistency(&self, f: ConsistentBody<'_>) -> RouterResult<()> {
        f()
    }
}

// ============================================================================
// Reload - 재로딩
// ============================================================================

/// 데이터베이스에서 다시 읽을 수 있는 엔티티
pub trait Reload {
    /// 연결에서 상태를 다시 읽음
    fn reload(&mut self, conn: &dyn Connection) -> RouterResult<()>;

    /// 마스터 일관성 아래에서 재로딩
    ///
    /// 방금 쓴 행을 레플리카 지연 없이 읽어야 할 때 사용합니다.
    fn reload_consistent(&mut self, conn: &dyn MasterConsistency) -> RouterResult<()> {
        conn.run_with_master_consistency(&mut || self.reload(conn.as_connection()))
    }
}

// ============================================================================
// ChangeNotifier - 변경 알림
// ============================================================================

/// 변경 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// 생성
    Created,
    /// 수정
    Updated,
    /// 삭제
    Destroyed,
}

/// 변경 이벤트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    /// 테이블 이름
    pub table: String,
    /// 변경 종류
    pub kind: ChangeKind,
    /// 대상 row id
    pub id: Option<i64>,
}

impl ChangeEvent {
    /// 새 이벤트 생성
    pub fn new(table: impl Into<String>, kind: ChangeKind, id: Option<i64>) -> Self {
        Self {
            table: table.into(),
            kind,
            id,
        }
    }
}

/// 변경 관찰자
pub trait Observer: Send + Sync {
    /// 진단용 이름
    fn name(&self) -> &str {
        "observer"
    }

    /// 변경 통지
    fn on_change(&self, event: &ChangeEvent, conn: &dyn Connection) -> RouterResult<()>;
}

/// 변경 알림기
///
/// 등록된 관찰자를 차례로 호출하며, 각 호출은 연결의 마스터 일관성
/// 스코프 안에서 실행됩니다. 변경은 쓰기 직후에만 발생하므로 관찰자가
/// 레플리카에서 오래된 데이터를 읽는 경쟁을 막습니다.
#[derive(Default)]
pub struct ChangeNotifier {
    observers: RwLock<Vec<Arc<dyn Observer>>>,
}

impl ChangeNotifier {
    /// 새 알림기 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 관찰자 등록
    pub fn register(&self, observer: Arc<dyn Observer>) {
        self.observers.write().push(observer);
    }

    /// 등록된 관찰자 수
    pub fn len(&self) -> usize {
        self.observers.read().len()
    }

    /// 관찰자 없음 여부
    pub fn is_empty(&self) -> bool {
        self.observers.read().is_empty()
    }

    /// 변경 통지
    ///
    /// 첫 에러에서 중단하고 그 에러를 그대로 반환합니다.
    pub fn notify(
        &self,
        conn: &dyn MasterConsistency,
        event: &ChangeEvent,
    ) -> RouterResult<()> {
        let observers = self.observers.read().clone();
        for observer in observers {
            tracing::debug!(
                observer = observer.name(),
                table = %event.table,
                kind = ?event.kind,
                "notifying observer"
            );
            conn.run_with_master_consistency(&mut || {
                observer.on_change(event, conn.as_connection())
            })?;
        }
        Ok(())
    }
}

impl fmt::Debug for ChangeNotifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChangeNotifier")
            .field("observers", &self.len())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================
