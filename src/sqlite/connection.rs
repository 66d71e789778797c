//! SQLite 연결
//!
//! `rusqlite` 기반 [`Connection`] 구현

use std::fmt;
use std::path::Path;

use parking_lot::{ReentrantMutex, ReentrantMutexGuard};
use rusqlite::types::ValueRef;
use rusqlite::OptionalExtension;

use crate::router::{
    ColumnDefinition, ColumnInfo, Connection, DatabaseConfig, IndexDefinition, Record,
    RouterError, RouterResult, TransactionBody, Value,
};

/// 스키마 버전 테이블 이름
pub const SCHEMA_INFO_TABLE: &str = "schema_info";

// ============================================================================
// SqliteConnection - SQLite 연결
// ============================================================================

/// SQLite 연결
///
/// 하나의 `rusqlite::Connection`을 재진입 뮤텍스로 감쌉니다. 평소에는 문장
/// 하나를 실행하는 동안만 락을 잡고, 트랜잭션은 `BEGIN`부터 `COMMIT`/`ROLLBACK`
/// 까지 락을 쥡니다. 트랜잭션을 연 스레드는 본문 안에서 같은 연결을 다시
/// 호출할 수 있고, 다른 스레드는 트랜잭션이 끝날 때까지 기다립니다.
pub struct SqliteConnection {
    conn: ReentrantMutex<rusqlite::Connection>,
    label: String,
}

impl SqliteConnection {
    /// 파일 데이터베이스 열기
    pub fn open(path: impl AsRef<Path>) -> RouterResult<Self> {
        let path = path.as_ref();
        let conn = rusqlite::Connection::open(path)?;
        tracing::debug!(path = %path.display(), "opened sqlite database");
        Ok(Self {
            conn: ReentrantMutex::new(conn),
            label: path.display().to_string(),
        })
    }

    /// 메모리 데이터베이스 열기
    pub fn open_in_memory() -> RouterResult<Self> {
        let conn = rusqlite::Connection::open_in_memory()?;
        Ok(Self {
            conn: ReentrantMutex::new(conn),
            label: ":memory:".to_string(),
        })
    }

    /// 설정으로 연결 열기
    pub fn from_config(config: &DatabaseConfig) -> RouterResult<Self> {
        config.validate()?;
        if config.is_in_memory() {
            Self::open_in_memory()
        } else {
            Self::open(&config.database)
        }
    }

    /// 열린 트랜잭션 존재 여부
    ///
    /// 다른 스레드의 트랜잭션이 열려 있으면 그 트랜잭션이 끝날 때까지
    /// 기다린 뒤 답합니다.
    pub fn in_transaction(&self) -> bool {
        !self.conn.lock().is_autocommit()
    }

    fn with_conn<T>(
        &self,
        f: impl FnOnce(&rusqlite::Connection) -> rusqlite::Result<T>,
    ) -> RouterResult<T> {
        let conn = self.conn.lock();
        Ok(f(&conn)?)
    }

    /// 테이블 재작성 (SQLite에 없는 ALTER COLUMN 대체)
    ///
    /// 기본 키 순서, `AUTOINCREMENT` 여부와 그 시퀀스 값은 원래 테이블을
    /// 따릅니다.
    fn rebuild_table(
        &self,
        table: &str,
        edit: impl FnOnce(&mut Vec<ColumnInfo>) -> RouterResult<()>,
    ) -> RouterResult<()> {
        let conn = self.conn.lock();
        let mut columns = read_columns(&conn, table)?;
        let indexes = read_indexes(&conn, table)?;
        let primary_key = read_primary_key(&conn, table)?;
        let autoincrement = is_autoincrement(&conn, table)?;
        let sequence = if autoincrement {
            read_sequence(&conn, table)?
        } else {
            None
        };
        let names: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();
        edit(&mut columns)?;

        let mut key: Vec<String> = primary_key
            .into_iter()
            .filter(|name| columns.iter().any(|c| c.primary_key && &c.name == name))
            .collect();
        for column in columns.iter().filter(|c| c.primary_key) {
            if !key.contains(&column.name) {
                key.push(column.name.clone());
            }
        }

        let temp = format!("{}_rebuild", table);
        let copied: Vec<String> = columns.iter().map(|c| quote_ident(&c.name)).collect();

        let mut script = String::from("SAVEPOINT rebuild_table;\n");
        script.push_str(&rebuilt_table_sql(&temp, &columns, &key, autoincrement));
        script.push_str(";\n");
        script.push_str(&format!(
            "INSERT INTO {} ({}) SELECT {} FROM {};\n",
            quote_ident(&temp),
            copied.join(", "),
            names.join(", "),
            quote_ident(table)
        ));
        script.push_str(&format!("DROP TABLE {};\n", quote_ident(table)));
        script.push_str(&format!(
            "ALTER TABLE {} RENAME TO {};\n",
            quote_ident(&temp),
            quote_ident(table)
        ));
        if let Some(seq) = sequence {
            let name = Value::from(table).to_sql_literal();
            script.push_str(&format!(
                "DELETE FROM sqlite_sequence WHERE name = {name};\n\
                 INSERT INTO sqlite_sequence (name, seq) VALUES ({name}, {seq});\n"
            ));
        }
        for index in &indexes {
            script.push_str(&index_sql(table, index));
            script.push_str(";\n");
        }
        script.push_str("RELEASE rebuild_table;");

        if let Err(err) = conn.execute_batch(&script) {
            // 실패 시 세이브포인트까지 되돌림
            if let Err(rollback_err) =
                conn.execute_batch("ROLLBACK TO rebuild_table; RELEASE rebuild_table;")
            {
                tracing::warn!(table, error = %rollback_err, "rebuild rollback failed");
            }
            return Err(err.into());
        }
        Ok(())
    }
}

impl fmt::Debug for SqliteConnection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SqliteConnection")
            .field("label", &self.label)
            .finish()
    }
}

impl Connection for SqliteConnection {
    fn label(&self) -> &str {
        &self.label
    }

    fn execute(&self, sql: &str) -> RouterResult<usize> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            if stmt.column_count() > 0 {
                let mut rows = stmt.query([])?;
                let mut count = 0;
                while rows.next()?.is_some() {
                    count += 1;
                }
                Ok(count)
            } else {
                stmt.execute([])
            }
        })
    }

    fn insert(&self, sql: &str) -> RouterResult<i64> {
        self.with_conn(|conn| {
            conn.execute(sql, [])?;
            Ok(conn.last_insert_rowid())
        })
    }

    fn update(&self, sql: &str) -> RouterResult<usize> {
        self.with_conn(|conn| conn.execute(sql, []))
    }

    fn delete(&self, sql: &str) -> RouterResult<usize> {
        self.with_conn(|conn| conn.execute(sql, []))
    }

    fn select_all(&self, sql: &str) -> RouterResult<Vec<Record>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(sql)?;
            let keys: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();
            let width = keys.len();
            let rows = stmt.query_map([], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(value_from_ref))
                    .collect::<rusqlite::Result<Vec<Value>>>()
            })?;
            rows.map(|values| values.map(|values| Record::new(keys.clone(), values)))
                .collect()
        })
    }

    fn tables(&self) -> RouterResult<Vec<String>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name FROM sqlite_master \
                 WHERE type = 'table' AND name NOT LIKE 'sqlite_%' ORDER BY name",
            )?;
            let names = stmt.query_map([], |row| row.get::<_, String>(0))?;
            names.collect()
        })
    }

    fn indexes(&self, table: &str) -> RouterResult<Vec<IndexDefinition>> {
        let conn = self.conn.lock();
        read_indexes(&conn, table)
    }

    fn columns(&self, table: &str) -> RouterResult<Vec<ColumnInfo>> {
        let conn = self.conn.lock();
        read_columns(&conn, table)
    }

    fn create_table(&self, name: &str, columns: &[ColumnDefinition]) -> RouterResult<()> {
        let key: Vec<String> = columns
            .iter()
            .filter(|c| c.primary_key)
            .map(|c| quote_ident(&c.name))
            .collect();

        let mut definitions = Vec::with_capacity(columns.len() + 2);
        if key.is_empty() {
            definitions.push(format!(
                "{} INTEGER PRIMARY KEY AUTOINCREMENT NOT NULL",
                quote_ident("id")
            ));
        }
        // 복합 키는 테이블 제약으로
        let inline_key = key.len() == 1;
        definitions.extend(columns.iter().map(|c| column_sql(c, inline_key)));
        if key.len() > 1 {
            definitions.push(format!("PRIMARY KEY ({})", key.join(", ")));
        }

        let sql = format!("CREATE TABLE {} ({})", quote_ident(name), definitions.join(", "));
        self.with_conn(|conn| conn.execute_batch(&sql))
    }

    fn rename_table(&self, name: &str, new_name: &str) -> RouterResult<()> {
        let sql = format!(
            "ALTER TABLE {} RENAME TO {}",
            quote_ident(name),
            quote_ident(new_name)
        );
        self.with_conn(|conn| conn.execute_batch(&sql))
    }

    fn drop_table(&self, name: &str) -> RouterResult<()> {
        let sql = format!("DROP TABLE {}", quote_ident(name));
        self.with_conn(|conn| conn.execute_batch(&sql))
    }

    fn add_column(&self, table: &str, column: &ColumnDefinition) -> RouterResult<()> {
        let sql = format!(
            "ALTER TABLE {} ADD COLUMN {}",
            quote_ident(table),
            column_sql(column, true)
        );
        self.with_conn(|conn| conn.execute_batch(&sql))
    }

    fn remove_column(&self, table: &str, column: &str) -> RouterResult<()> {
        let sql = format!(
            "ALTER TABLE {} DROP COLUMN {}",
            quote_ident(table),
            quote_ident(column)
        );
        self.with_conn(|conn| conn.execute_batch(&sql))
    }

    fn change_column(&self, table: &str, column: &ColumnDefinition) -> RouterResult<()> {
        self.rebuild_table(table, |columns| {
            let existing = find_column(columns, table, &column.name)?;
            existing.sql_type = column.sql_type.clone();
            existing.nullable = column.nullable;
            existing.default = column.default.as_ref().map(Value::to_sql_literal);
            existing.primary_key = column.primary_key;
            Ok(())
        })
    }

    fn change_column_default(
        &self,
        table: &str,
        column: &str,
        default: Option<&Value>,
    ) -> RouterResult<()> {
        self.rebuild_table(table, |columns| {
            let existing = find_column(columns, table, column)?;
            existing.default = default.map(Value::to_sql_literal);
            Ok(())
        })
    }

    fn rename_column(&self, table: &str, column: &str, new_name: &str) -> RouterResult<()> {
        let sql = format!(
            "ALTER TABLE {} RENAME COLUMN {} TO {}",
            quote_ident(table),
            quote_ident(column),
            quote_ident(new_name)
        );
        self.with_conn(|conn| conn.execute_batch(&sql))
    }

    fn add_index(&self, table: &str, index: &IndexDefinition) -> RouterResult<()> {
        let sql = index_sql(table, index);
        self.with_conn(|conn| conn.execute_batch(&sql))
    }

    fn remove_index(&self, _table: &str, index_name: &str) -> RouterResult<()> {
        let sql = format!("DROP INDEX {}", quote_ident(index_name));
        self.with_conn(|conn| conn.execute_batch(&sql))
    }

    fn initialize_schema_information(&self) -> RouterResult<()> {
        let create = format!(
            "CREATE TABLE IF NOT EXISTS {} (version INTEGER NOT NULL)",
            quote_ident(SCHEMA_INFO_TABLE)
        );
        let count = format!("SELECT COUNT(*) FROM {}", quote_ident(SCHEMA_INFO_TABLE));
        let seed = format!(
            "INSERT INTO {} (version) VALUES (0)",
            quote_ident(SCHEMA_INFO_TABLE)
        );

        self.with_conn(|conn| {
            conn.execute_batch(&create)?;
            let rows: i64 = conn.query_row(&count, [], |row| row.get(0))?;
            if rows == 0 {
                conn.execute_batch(&seed)?;
            }
            Ok(())
        })
    }

    fn dump_schema_information(&self) -> RouterResult<String> {
        let sql = format!("SELECT MAX(version) FROM {}", quote_ident(SCHEMA_INFO_TABLE));
        let version: Option<i64> = self.with_conn(|conn| conn.query_row(&sql, [], |row| row.get(0)))?;
        Ok(format!(
            "INSERT INTO {} (version) VALUES ({})",
            SCHEMA_INFO_TABLE,
            version.unwrap_or(0)
        ))
    }

    fn transaction(&self, start: bool, body: TransactionBody<'_>) -> RouterResult<()> {
        if !start {
            return body();
        }

        // 트랜잭션이 끝날 때까지 락을 쥐어 다른 스레드가 합류하지 못하게 함
        let owner = self.conn.lock();
        if !owner.is_autocommit() {
            // 같은 스레드의 중첩 호출은 바깥 트랜잭션에 합류
            return body();
        }

        owner.execute_batch("BEGIN")?;
        let mut guard = TransactionGuard {
            conn: owner,
            finished: false,
        };

        let outcome = body().and_then(|()| match guard.conn.execute_batch("COMMIT") {
            Ok(()) => {
                guard.finished = true;
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "commit failed, rolling back");
                Err(err.into())
            }
        });

        if !guard.finished {
            match rollback_open(&guard.conn) {
                Ok(()) => guard.finished = true,
                Err(err) => tracing::warn!(error = %err, "rollback failed"),
            }
        }
        outcome
    }
}

/// 트랜잭션 소유 락
///
/// 본문이 패닉으로 빠져나가거나 종료 처리가 실패하면 해제 시 트랜잭션을
/// 되돌립니다.
struct TransactionGuard<'a> {
    conn: ReentrantMutexGuard<'a, rusqlite::Connection>,
    finished: bool,
}

impl Drop for TransactionGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            if let Err(err) = rollback_open(&self.conn) {
                tracing::warn!(error = %err, "rollback after panic failed");
            }
        }
    }
}

/// 열린 트랜잭션이 있으면 되돌림
fn rollback_open(conn: &rusqlite::Connection) -> rusqlite::Result<()> {
    if conn.is_autocommit() {
        return Ok(());
    }
    conn.execute_batch("ROLLBACK")
}

// ============================================================================
// Helpers
// ============================================================================

/// 식별자 인용
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Float(f),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Bytes(b.to_vec()),
    }
}

fn column_sql(column: &ColumnDefinition, inline_key: bool) -> String {
    let mut sql = format!("{} {}", quote_ident(&column.name), column.sql_type);
    if column.primary_key && inline_key {
        sql.push_str(" PRIMARY KEY");
    }
    if !column.nullable {
        sql.push_str(" NOT NULL");
    }
    if let Some(default) = &column.default {
        sql.push_str(" DEFAULT ");
        sql.push_str(&default.to_sql_literal());
    }
    sql
}

/// 재작성용 `CREATE TABLE` 문
///
/// 단일 키는 컬럼 제약으로 두어 `AUTOINCREMENT`를 유지하고, 복합 키는
/// 테이블 제약으로 씁니다.
fn rebuilt_table_sql(
    table: &str,
    columns: &[ColumnInfo],
    primary_key: &[String],
    autoincrement: bool,
) -> String {
    let inline_key = match primary_key {
        [only] => Some(only.as_str()),
        _ => None,
    };

    let mut definitions: Vec<String> = columns
        .iter()
        .map(|column| {
            let mut sql = format!("{} {}", quote_ident(&column.name), column.sql_type);
            if inline_key == Some(column.name.as_str()) {
                sql.push_str(" PRIMARY KEY");
                if autoincrement {
                    sql.push_str(" AUTOINCREMENT");
                }
            }
            if !column.nullable {
                sql.push_str(" NOT NULL");
            }
            if let Some(default) = &column.default {
                sql.push_str(" DEFAULT ");
                sql.push_str(default);
            }
            sql
        })
        .collect();

    if primary_key.len() > 1 {
        let key: Vec<String> = primary_key.iter().map(|c| quote_ident(c)).collect();
        definitions.push(format!("PRIMARY KEY ({})", key.join(", ")));
    }

    format!("CREATE TABLE {} ({})", quote_ident(table), definitions.join(", "))
}

fn index_sql(table: &str, index: &IndexDefinition) -> String {
    let columns: Vec<String> = index.columns.iter().map(|c| quote_ident(c)).collect();
    format!(
        "CREATE {}INDEX {} ON {} ({})",
        if index.unique { "UNIQUE " } else { "" },
        quote_ident(&index.name),
        quote_ident(table),
        columns.join(", ")
    )
}

fn find_column<'a>(
    columns: &'a mut [ColumnInfo],
    table: &str,
    name: &str,
) -> RouterResult<&'a mut ColumnInfo> {
    columns
        .iter_mut()
        .find(|c| c.name == name)
        .ok_or_else(|| RouterError::query("change_column", format!("no such column: {}.{}", table, name)))
}

fn read_columns(conn: &rusqlite::Connection, table: &str) -> RouterResult<Vec<ColumnInfo>> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let mut stmt = conn.prepare(&sql)?;
    let columns = stmt
        .query_map([], |row| {
            Ok(ColumnInfo {
                name: row.get(1)?,
                sql_type: row.get(2)?,
                nullable: row.get::<_, i64>(3)? == 0,
                default: row.get(4)?,
                primary_key: row.get::<_, i64>(5)? > 0,
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    if columns.is_empty() {
        return Err(RouterError::query("columns", format!("no such table: {}", table)));
    }
    Ok(columns)
}

/// 기본 키 컬럼 (키 안의 순서대로)
fn read_primary_key(conn: &rusqlite::Connection, table: &str) -> RouterResult<Vec<String>> {
    let sql = format!("PRAGMA table_info({})", quote_ident(table));
    let mut stmt = conn.prepare(&sql)?;
    let mut keyed = stmt
        .query_map([], |row| Ok((row.get::<_, i64>(5)?, row.get::<_, String>(1)?)))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    keyed.retain(|(position, _)| *position > 0);
    keyed.sort_by_key(|(position, _)| *position);
    Ok(keyed.into_iter().map(|(_, name)| name).collect())
}

/// `AUTOINCREMENT` 시퀀스의 현재 값
fn read_sequence(conn: &rusqlite::Connection, table: &str) -> RouterResult<Option<i64>> {
    Ok(conn
        .query_row(
            "SELECT seq FROM sqlite_sequence WHERE name = ?1",
            [table],
            |row| row.get(0),
        )
        .optional()?)
}

/// 테이블이 `AUTOINCREMENT`로 선언되었는지 여부
fn is_autoincrement(conn: &rusqlite::Connection, table: &str) -> RouterResult<bool> {
    let ddl: Option<String> = conn.query_row(
        "SELECT sql FROM sqlite_master WHERE type = 'table' AND name = ?1",
        [table],
        |row| row.get(0),
    )?;
    Ok(ddl.map_or(false, |ddl| ddl.to_ascii_uppercase().contains("AUTOINCREMENT")))
}

fn read_indexes(conn: &rusqlite::Connection, table: &str) -> RouterResult<Vec<IndexDefinition>> {
    let sql = format!("PRAGMA index_list({})", quote_ident(table));
    let mut stmt = conn.prepare(&sql)?;
    let listed = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, String>(1)?,
                row.get::<_, i64>(2)? != 0,
                row.get::<_, String>(3)?,
            ))
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    let mut indexes = Vec::new();
    for (name, unique, origin) in listed {
        // PRIMARY KEY/UNIQUE 제약이 만든 자동 인덱스 제외
        if origin != "c" {
            continue;
        }
        let info_sql = format!("PRAGMA index_info({})", quote_ident(&name));
        let mut info = conn.prepare(&info_sql)?;
        let columns = info
            .query_map([], |row| row.get::<_, String>(2))?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        indexes.push(IndexDefinition {
            name,
            columns,
            unique,
        });
    }
    indexes.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(indexes)
}

// ============================================================================
// Tests
// ============================================================================
