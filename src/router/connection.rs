//! 연결 인터페이스
//!
//! 라우터가 소비하고 동시에 구현하는 연결 연산 집합과 연산 분류

use std::fmt;

use super::error::{RouterError, RouterResult};
use super::record::{Record, Value};

// ============================================================================
// Operation - 연결 연산
// ============================================================================

/// 연결 연산
///
/// [`Operation::is_master_only`]가 참인 연산은 현재 모드와 무관하게 항상
/// 마스터로 전달됩니다. 나머지는 현재 모드를 따릅니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// INSERT
    Insert,
    /// UPDATE
    Update,
    /// DELETE
    Delete,
    /// 테이블 생성
    CreateTable,
    /// 테이블 이름 변경
    RenameTable,
    /// 테이블 삭제
    DropTable,
    /// 컬럼 추가
    AddColumn,
    /// 컬럼 삭제
    RemoveColumn,
    /// 컬럼 정의 변경
    ChangeColumn,
    /// 컬럼 기본값 변경
    ChangeColumnDefault,
    /// 컬럼 이름 변경
    RenameColumn,
    /// 인덱스 추가
    AddIndex,
    /// 인덱스 삭제
    RemoveIndex,
    /// 스키마 정보 초기화
    InitializeSchemaInformation,
    /// 스키마 정보 덤프
    DumpSchemaInformation,
    /// 원시 SQL 실행
    Execute,
    /// 컬럼 조회
    Columns,
    /// 전체 행 조회
    SelectAll,
    /// 단일 행 조회
    SelectOne,
    /// 단일 값 조회
    SelectValue,
    /// 값 목록 조회
    SelectValues,
    /// 테이블 목록
    Tables,
    /// 테이블 존재 여부
    TableExists,
    /// 인덱스 목록
    Indexes,
    /// 트랜잭션
    Transaction,
}

impl Operation {
    /// 전체 연산 목록
    pub const ALL: [Operation; 25] = [
        Operation::Insert,
        Operation::Update,
        Operation::Delete,
        Operation::CreateTable,
        Operation::RenameTable,
        Operation::DropTable,
        Operation::AddColumn,
        Operation::RemoveColumn,
        Operation::ChangeColumn,
        Operation::ChangeColumnDefault,
        Operation::RenameColumn,
        Operation::AddIndex,
        Operation::RemoveIndex,
        Operation::InitializeSchemaInformation,
        Operation::DumpSchemaInformation,
        Operation::Execute,
        Operation::Columns,
        Operation::SelectAll,
        Operation::SelectOne,
        Operation::SelectValue,
        Operation::SelectValues,
        Operation::Tables,
        Operation::TableExists,
        Operation::Indexes,
        Operation::Transaction,
    ];

    /// 항상 마스터로 가는 연산 여부
    ///
    /// `Transaction`은 여기에 포함되지 않습니다. 트랜잭션은 마스터 스코프를
    /// 열고 실행되므로 별도로 처리됩니다.
    pub fn is_master_only(&self) -> bool {
        matches!(
            self,
            Operation::Insert
                | Operation::Update
                | Operation::Delete
                | Operation::CreateTable
                | Operation::RenameTable
                | Operation::DropTable
                | Operation::AddColumn
                | Operation::RemoveColumn
                | Operation::ChangeColumn
                | Operation::ChangeColumnDefault
                | Operation::RenameColumn
                | Operation::AddIndex
                | Operation::RemoveIndex
                | Operation::InitializeSchemaInformation
                | Operation::DumpSchemaInformation
                | Operation::Execute
                | Operation::Columns
        )
    }

    /// 마스터 전용 연산 목록
    pub fn master_only() -> impl Iterator<Item = Operation> {
        Self::ALL.into_iter().filter(Operation::is_master_only)
    }

    /// 연산 이름
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Insert => "insert",
            Operation::Update => "update",
            Operation::Delete => "delete",
            Operation::CreateTable => "create_table",
            Operation::RenameTable => "rename_table",
            Operation::DropTable => "drop_table",
            Operation::AddColumn => "add_column",
            Operation::RemoveColumn => "remove_column",
            Operation::ChangeColumn => "change_column",
            Operation::ChangeColumnDefault => "change_column_default",
            Operation::RenameColumn => "rename_column",
            Operation::AddIndex => "add_index",
            Operation::RemoveIndex => "remove_index",
            Operation::InitializeSchemaInformation => "initialize_schema_information",
            Operation::DumpSchemaInformation => "dump_schema_information",
            Operation::Execute => "execute",
            Operation::Columns => "columns",
            Operation::SelectAll => "select_all",
            Operation::SelectOne => "select_one",
            Operation::SelectValue => "select_value",
            Operation::SelectValues => "select_values",
            Operation::Tables => "tables",
            Operation::TableExists => "table_exists",
            Operation::Indexes => "indexes",
            Operation::Transaction => "transaction",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Schema Types - 스키마 정의
// ============================================================================

/// 컬럼 정의
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// 컬럼 이름
    pub name: String,
    /// SQL 타입
    pub sql_type: String,
    /// NULL 허용
    pub nullable: bool,
    /// 기본값
    pub default: Option<Value>,
    /// 기본 키 여부
    pub primary_key: bool,
}

impl ColumnDefinition {
    /// 새 컬럼 정의 생성
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            nullable: true,
            default: None,
            primary_key: false,
        }
    }

    /// NOT NULL 설정
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// 기본값 설정
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// 기본 키 설정
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }
}

/// 기존 컬럼 정보 (`columns` 결과)
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnInfo {
    /// 컬럼 이름
    pub name: String,
    /// 선언된 SQL 타입
    pub sql_type: String,
    /// NULL 허용
    pub nullable: bool,
    /// 기본값 (SQL 텍스트 그대로)
    pub default: Option<String>,
    /// 기본 키 여부
    pub primary_key: bool,
}

/// 인덱스 정의
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexDefinition {
    /// 인덱스 이름
    pub name: String,
    /// 대상 컬럼
    pub columns: Vec<String>,
    /// UNIQUE 여부
    pub unique: bool,
}

impl IndexDefinition {
    /// 새 인덱스 정의 생성
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            unique: false,
        }
    }

    /// 테이블/컬럼 이름으로 기본 인덱스 이름 생성
    pub fn for_columns(table: &str, columns: &[&str]) -> Self {
        Self::new(format!("index_{}_on_{}", table, columns.join("_and_")), columns)
    }

    /// UNIQUE 설정
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }
}

// ============================================================================
// Connection - 연결 인터페이스
// ============================================================================

/// 트랜잭션 본문
pub type TransactionBody<'a> = &'a mut dyn FnMut() -> RouterResult<()>;

/// 데이터베이스 연결
///
/// 마스터/슬레이브 연결과 라우터가 모두 구현하는 닫힌 연산 집합입니다.
/// 라우터도 같은 트레이트를 구현하므로 단일 연결 자리에 그대로 끼워 넣을
/// 수 있습니다.
pub trait Connection: Send + Sync {
    /// 진단용 이름
    fn label(&self) -> &str {
        "connection"
    }

    /// 원시 SQL 실행, 영향받은 행 수 반환
    fn execute(&self, sql: &str) -> RouterResult<usize>;

    /// INSERT 실행, 마지막 row id 반환
    fn insert(&self, sql: &str) -> RouterResult<i64>;

    /// UPDATE 실행
    fn update(&self, sql: &str) -> RouterResult<usize>;

    /// DELETE 실행
    fn delete(&self, sql: &str) -> RouterResult<usize>;

    /// 모든 행 조회
    fn select_all(&self, sql: &str) -> RouterResult<Vec<Record>>;

    /// 첫 행 조회
    fn select_one(&self, sql: &str) -> RouterResult<Option<Record>> {
        Ok(self.select_all(sql)?.into_iter().next())
    }

    /// 첫 행의 첫 값 조회
    fn select_value(&self, sql: &str) -> RouterResult<Option<Value>> {
        Ok(self.select_one(sql)?.and_then(Record::into_first))
    }

    /// 각 행의 첫 값 조회
    fn select_values(&self, sql: &str) -> RouterResult<Vec<Value>> {
        Ok(self
            .select_all(sql)?
            .into_iter()
            .filter_map(Record::into_first)
            .collect())
    }

    /// 테이블 목록
    fn tables(&self) -> RouterResult<Vec<String>>;

    /// 테이블 존재 여부
    fn table_exists(&self, name: &str) -> RouterResult<bool> {
        Ok(self.tables()?.iter().any(|t| t == name))
    }

    /// 테이블의 인덱스 목록
    fn indexes(&self, table: &str) -> RouterResult<Vec<IndexDefinition>>;

    /// 테이블의 컬럼 정보
    fn columns(&self, table: &str) -> RouterResult<Vec<ColumnInfo>>;

    /// 테이블 생성
    fn create_table(&self, name: &str, columns: &[ColumnDefinition]) -> RouterResult<()>;

    /// 테이블 이름 변경
    fn rename_table(&self, name: &str, new_name: &str) -> RouterResult<()>;

    /// 테이블 삭제
    fn drop_table(&self, name: &str) -> RouterResult<()>;

    /// 컬럼 추가
    fn add_column(&self, table: &str, column: &ColumnDefinition) -> RouterResult<()>;

    /// 컬럼 삭제
    fn remove_column(&self, table: &str, column: &str) -> RouterResult<()>;

    /// 컬럼 정의 변경
    fn change_column(&self, table: &str, column: &ColumnDefinition) -> RouterResult<()>;

    /// 컬럼 기본값 변경
    fn change_column_default(
        &self,
        table: &str,
        column: &str,
        default: Option<&Value>,
    ) -> RouterResult<()>;

    /// 컬럼 이름 변경
    fn rename_column(&self, table: &str, column: &str, new_name: &str) -> RouterResult<()>;

    /// 인덱스 추가
    fn add_index(&self, table: &str, index: &IndexDefinition) -> RouterResult<()>;

    /// 인덱스 삭제
    fn remove_index(&self, table: &str, index_name: &str) -> RouterResult<()>;

    /// 스키마 정보 테이블 초기화
    fn initialize_schema_information(&self) -> RouterResult<()>;

    /// 스키마 정보 덤프 (버전 INSERT 문)
    fn dump_schema_information(&self) -> RouterResult<String>;

    /// 트랜잭션 실행
    ///
    /// `start`가 거짓이거나 이미 트랜잭션이 열려 있으면 새 트랜잭션을 시작하지
    /// 않고 본문만 실행합니다.
    fn transaction(&self, start: bool, body: TransactionBody<'_>) -> RouterResult<()>;
}

/// 값을 반환하는 트랜잭션 실행
///
/// [`Connection::transaction`]은 객체 안전성을 위해 `()`만 반환하므로 본문의
/// 결과를 밖으로 옮겨 담습니다.
pub fn run_transaction<C, T, F>(conn: &C, start: bool, f: F) -> RouterResult<T>
where
    C: Connection + ?Sized,
    F: FnOnce() -> RouterResult<T>,
{
    let mut f = Some(f);
    let mut output = None;
    conn.transaction(start, &mut || {
        if let Some(f) = f.take() {
            output = Some(f()?);
        }
        Ok(())
    })?;
    output.ok_or_else(|| RouterError::query("transaction", "transaction body was not run"))
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_master_only_classification() {
        let master_only: HashSet<&str> = Operation::master_only().map(|op| op.as_str()).collect();

        for name in [
            "insert",
            "update",
            "delete",
            "create_table",
            "rename_table",
            "drop_table",
            "add_column",
            "remove_column",
            "change_column",
            "change_column_default",
            "rename_column",
            "add_index",
            "remove_index",
            "initialize_schema_information",
            "dump_schema_information",
            "execute",
            "columns",
        ] {
            assert!(master_only.contains(name), "{} should be master-only", name);
        }
        assert_eq!(master_only.len(), 17);
    }

    #[test]
    fn test_read_operations_follow_mode() {
        for op in [
            Operation::SelectAll,
            Operation::SelectOne,
            Operation::SelectValue,
            Operation::SelectValues,
            Operation::Tables,
            Operation::TableExists,
            Operation::Indexes,
            Operation::Transaction,
        ] {
            assert!(!op.is_master_only(), "{} should follow the current mode", op);
        }
    }

    #[test]
    fn test_operation_names_unique() {
        let names: HashSet<&str> = Operation::ALL.iter().map(Operation::as_str).collect();
        assert_eq!(names.len(), Operation::ALL.len());
    }

    #[test]
    fn test_column_definition_builder() {
        let column = ColumnDefinition::new("id", "INTEGER").primary_key().not_null();
        assert_eq!(column.name, "id");
        assert!(column.primary_key);
        assert!(!column.nullable);

        let column = ColumnDefinition::new("status", "TEXT").with_default("new");
        assert_eq!(column.default, Some(Value::String("new".into())));
    }

    #[test]
    fn test_index_definition_naming() {
        let index = IndexDefinition::for_columns("users", &["email", "org_id"]).unique();
        assert_eq!(index.name, "index_users_on_email_and_org_id");
        assert_eq!(index.columns, vec!["email".to_string(), "org_id".to_string()]);
        assert!(index.unique);
    }
}
