//! 연결 라우터
//!
//! 마스터/슬레이브 제공자를 감싸고 호출마다 대상 연결을 결정합니다.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use super::config::RouterConfig;
use super::connection::{
    run_transaction, ColumnDefinition, ColumnInfo, Connection, IndexDefinition, Operation,
    TransactionBody,
};
use super::error::RouterResult;
use super::mode::{MasterScope, Mode, ModeScope, ModeState, ModeTracker};
use super::provider::ConnectionProvider;
use super::record::{Record, Value};

// ============================================================================
// RouterMetrics - 라우터 메트릭
// ============================================================================

/// 라우터 메트릭 스냅샷
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouterMetrics {
    /// 마스터로 보낸 호출 수
    pub master_calls: u64,
    /// 슬레이브로 보낸 호출 수
    pub slave_calls: u64,
    /// 진입한 마스터 스코프 수
    pub escalations: u64,
    /// 실행한 트랜잭션 수
    pub transactions: u64,
}

#[derive(Debug, Default)]
struct MetricCounters {
    master_calls: AtomicU64,
    slave_calls: AtomicU64,
    escalations: AtomicU64,
    transactions: AtomicU64,
}

impl MetricCounters {
    fn snapshot(&self) -> RouterMetrics {
        RouterMetrics {
            master_calls: self.master_calls.load(Ordering::Relaxed),
            slave_calls: self.slave_calls.load(Ordering::Relaxed),
            escalations: self.escalations.load(Ordering::Relaxed),
            transactions: self.transactions.load(Ordering::Relaxed),
        }
    }
}

// ============================================================================
// ConnectionRouter - 연결 라우터
// ============================================================================

/// 연결 라우터
///
/// 쓰기와 스키마 변경은 항상 마스터로, 그 밖의 호출은 현재 모드가 가리키는
/// 연결로 보냅니다. 기본 모드는 슬레이브이며 [`with_master`] 스코프 안에서만
/// 마스터가 됩니다.
///
/// 라우터 자체가 [`Connection`]을 구현하므로 단일 연결을 기대하는 코드에
/// 그대로 넘길 수 있습니다.
///
/// [`with_master`]: ConnectionRouter::with_master
pub struct ConnectionRouter {
    master: Arc<dyn ConnectionProvider>,
    slave: Arc<dyn ConnectionProvider>,
    tracker: ModeTracker,
    metrics: MetricCounters,
}

impl ConnectionRouter {
    /// 새 라우터 생성
    ///
    /// 레플리카가 없으면 같은 제공자를 양쪽에 넘기면 됩니다.
    pub fn new(
        master: Arc<dyn ConnectionProvider>,
        slave: Arc<dyn ConnectionProvider>,
    ) -> Self {
        Self::with_config(master, slave, RouterConfig::default())
    }

    /// 설정으로 라우터 생성
    pub fn with_config(
        master: Arc<dyn ConnectionProvider>,
        slave: Arc<dyn ConnectionProvider>,
        config: RouterConfig,
    ) -> Self {
        Self {
            master,
            slave,
            tracker: ModeTracker::new(config.mode_scope),
            metrics: MetricCounters::default(),
        }
    }

    /// 단일 데이터베이스 라우터 (마스터 = 슬레이브)
    pub fn single(provider: Arc<dyn ConnectionProvider>) -> Self {
        Self::new(Arc::clone(&provider), provider)
    }

    /// 마스터 연결
    ///
    /// 매 호출마다 제공자에게 요청하며 라우터 안에 캐시하지 않습니다.
    pub fn master(&self) -> RouterResult<Arc<dyn Connection>> {
        self.master.connection()
    }

    /// 슬레이브 연결
    pub fn slave(&self) -> RouterResult<Arc<dyn Connection>> {
        self.slave.connection()
    }

    /// 현재 모드가 가리키는 연결
    pub fn current(&self) -> RouterResult<Arc<dyn Connection>> {
        match self.mode() {
            Mode::Master => self.master(),
            Mode::Slave => self.slave(),
        }
    }

    /// 현재 모드
    pub fn mode(&self) -> Mode {
        self.tracker.mode()
    }

    /// 현재 모드 상태 (스코프 깊이, 고정 여부)
    pub fn mode_state(&self) -> ModeState {
        self.tracker.state()
    }

    /// 모드 공유 범위
    pub fn mode_scope(&self) -> ModeScope {
        self.tracker.scope()
    }

    /// 마스터와 슬레이브가 같은 제공자인지 여부
    pub fn is_single_database(&self) -> bool {
        std::ptr::addr_eq(Arc::as_ptr(&self.master), Arc::as_ptr(&self.slave))
    }

    /// 마스터 스코프 진입
    ///
    /// 가드가 살아 있는 동안 모든 호출이 마스터로 갑니다.
    pub fn enter_master(&self) -> MasterScope<'_> {
        self.enter(true)
    }

    /// 마스터 스코프에서 실행 후 슬레이브로 복귀
    ///
    /// 본문의 반환값은 그대로 전달됩니다. 본문이 에러를 반환하거나 패닉이
    /// 발생해도 스코프는 닫힙니다.
    pub fn with_master<T>(&self, f: impl FnOnce() -> T) -> T {
        self.with_master_opts(true, f)
    }

    /// 마스터 스코프에서 실행
    ///
    /// `revert_after`가 거짓이면 스코프가 끝난 뒤에도 마스터로 고정됩니다.
    pub fn with_master_opts<T>(&self, revert_after: bool, f: impl FnOnce() -> T) -> T {
        let _scope = self.enter(revert_after);
        f()
    }

    /// 스코프 없이 마스터로 고정
    pub fn set_to_master(&self) {
        self.tracker.set_to_master();
    }

    /// 마스터 고정 해제
    pub fn set_to_slave(&self) {
        self.tracker.set_to_slave();
    }

    /// 마스터에서 트랜잭션 실행
    ///
    /// `start_transaction`은 실제 트랜잭션 시작 여부와 종료 후 슬레이브 복귀
    /// 여부를 함께 결정합니다.
    pub fn transaction<T>(
        &self,
        start_transaction: bool,
        f: impl FnOnce() -> RouterResult<T>,
    ) -> RouterResult<T> {
        self.with_master_opts(start_transaction, || {
            let master = self.master()?;
            self.metrics.transactions.fetch_add(1, Ordering::Relaxed);
            run_transaction(master.as_ref(), start_transaction, f)
        })
    }

    /// 메트릭 스냅샷
    pub fn metrics(&self) -> RouterMetrics {
        self.metrics.snapshot()
    }

    fn enter(&self, revert_after: bool) -> MasterScope<'_> {
        self.metrics.escalations.fetch_add(1, Ordering::Relaxed);
        self.tracker.enter(revert_after)
    }

    /// 연산의 대상 연결 결정
    fn route(&self, op: Operation) -> RouterResult<Arc<dyn Connection>> {
        let target = if op.is_master_only() {
            Mode::Master
        } else {
            self.mode()
        };

        tracing::debug!(operation = %op, target = %target, "routing call");
        match target {
            Mode::Master => {
                self.metrics.master_calls.fetch_add(1, Ordering::Relaxed);
                self.master()
            }
            Mode::Slave => {
                self.metrics.slave_calls.fetch_add(1, Ordering::Relaxed);
                self.slave()
            }
        }
    }
}

impl fmt::Debug for ConnectionRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionRouter")
            .field("mode", &self.mode())
            .field("mode_scope", &self.mode_scope())
            .field("single_database", &self.is_single_database())
            .finish()
    }
}

impl Connection for ConnectionRouter {
    fn label(&self) -> &str {
        "router"
    }

    fn execute(&self, sql: &str) -> RouterResult<usize> {
        self.route(Operation::Execute)?.execute(sql)
    }

    fn insert(&self, sql: &str) -> RouterResult<i64> {
        self.route(Operation::Insert)?.insert(sql)
    }

    fn update(&self, sql: &str) -> RouterResult<usize> {
        self.route(Operation::Update)?.update(sql)
    }

    fn delete(&self, sql: &str) -> RouterResult<usize> {
        self.route(Operation::Delete)?.delete(sql)
    }

    fn select_all(&self, sql: &str) -> RouterResult<Vec<Record>> {
        self.route(Operation::SelectAll)?.select_all(sql)
    }

    fn select_one(&self, sql: &str) -> RouterResult<Option<Record>> {
        self.route(Operation::SelectOne)?.select_one(sql)
    }

    fn select_value(&self, sql: &str) -> RouterResult<Option<Value>> {
        self.route(Operation::SelectValue)?.select_value(sql)
    }

    fn select_values(&self, sql: &str) -> RouterResult<Vec<Value>> {
        self.route(Operation::SelectValues)?.select_values(sql)
    }

    fn tables(&self) -> RouterResult<Vec<String>> {
        self.route(Operation::Tables)?.tables()
    }

    fn table_exists(&self, name: &str) -> RouterResult<bool> {
        self.route(Operation::TableExists)?.table_exists(name)
    }

    fn indexes(&self, table: &str) -> RouterResult<Vec<IndexDefinition>> {
        self.route(Operation::Indexes)?.indexes(table)
    }

    fn columns(&self, table: &str) -> RouterResult<Vec<ColumnInfo>> {
        self.route(Operation::Columns)?.columns(table)
    }

    fn create_table(&self, name: &str, columns: &[ColumnDefinition]) -> RouterResult<()> {
        self.route(Operation::CreateTable)?.create_table(name, columns)
    }

    fn rename_table(&self, name: &str, new_name: &str) -> RouterResult<()> {
        self.route(Operation::RenameTable)?.rename_table(name, new_name)
    }

    fn drop_table(&self, name: &str) -> RouterResult<()> {
        self.route(Operation::DropTable)?.drop_table(name)
    }

    fn add_column(&self, table: &str, column: &ColumnDefinition) -> RouterResult<()> {
        self.route(Operation::AddColumn)?.add_column(table, column)
    }

    fn remove_column(&self, table: &str, column: &str) -> RouterResult<()> {
        self.route(Operation::RemoveColumn)?.remove_column(table, column)
    }

    fn change_column(&self, table: &str, column: &ColumnDefinition) -> RouterResult<()> {
        self.route(Operation::ChangeColumn)?.change_column(table, column)
    }

    fn change_column_default(
        &self,
        table: &str,
        column: &str,
        default: Option<&Value>,
    ) -> RouterResult<()> {
        self.route(Operation::ChangeColumnDefault)?
            .change_column_default(table, column, default)
    }

    fn rename_column(&self, table: &str, column: &str, new_name: &str) -> RouterResult<()> {
        self.route(Operation::RenameColumn)?
            .rename_column(table, column, new_name)
    }

    fn add_index(&self, table: &str, index: &IndexDefinition) -> RouterResult<()> {
        self.route(Operation::AddIndex)?.add_index(table, index)
    }

    fn remove_index(&self, table: &str, index_name: &str) -> RouterResult<()> {
        self.route(Operation::RemoveIndex)?.remove_index(table, index_name)
    }

    fn initialize_schema_information(&self) -> RouterResult<()> {
        self.route(Operation::InitializeSchemaInformation)?
            .initialize_schema_information()
    }

    fn dump_schema_information(&self) -> RouterResult<String> {
        self.route(Operation::DumpSchemaInformation)?
            .dump_schema_information()
    }

    fn transaction(&self, start: bool, body: TransactionBody<'_>) -> RouterResult<()> {
        self.with_master_opts(start, || {
            let master = self.master()?;
            self.metrics.transactions.fetch_add(1, Ordering::Relaxed);
            master.transaction(start, body)
        })
    }
}

// ============================================================================
// Tests
// ============================================================================
