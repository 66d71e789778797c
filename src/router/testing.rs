//! 테스트용 기록 연결

use std::sync::Arc;

use parking_lot::Mutex;

use super::connection::{
    ColumnDefinition, ColumnInfo, Connection, IndexDefinition, Operation, TransactionBody,
};
use super::error::RouterResult;
use super::provider::{ConnectionProvider, SharedProvider};
use super::record::{Record, Value};

/// 호출된 연산을 기록하는 연결
pub(crate) struct RecordingConnection {
    name: &'static str,
    calls: Mutex<Vec<Operation>>,
}

impl RecordingConnection {
    pub(crate) fn new(name: &'static str) -> Arc<Self> {
        Arc::new(Self {
            name,
            calls: Mutex::new(Vec::new()),
        })
    }

    pub(crate) fn calls(&self) -> Vec<Operation> {
        self.calls.lock().clone()
    }

    pub(crate) fn last_call(&self) -> Option<Operation> {
        self.calls.lock().last().copied()
    }

    pub(crate) fn clear(&self) {
        self.calls.lock().clear();
    }

    pub(crate) fn provider(self: &Arc<Self>) -> Arc<dyn ConnectionProvider> {
        Arc::new(SharedProvider::new(Arc::clone(self) as Arc<dyn Connection>))
    }

    fn record(&self, op: Operation) {
        self.calls.lock().push(op);
    }
}

impl Connection for RecordingConnection {
    fn label(&self) -> &str {
        self.name
    }

    fn execute(&self, _sql: &str) -> RouterResult<usize> {
        self.record(Operation::Execute);
        Ok(0)
    }

    fn insert(&self, _sql: &str) -> RouterResult<i64> {
        self.record(Operation::Insert);
        Ok(1)
    }

    fn update(&self, _sql: &str) -> RouterResult<usize> {
        self.record(Operation::Update);
        Ok(1)
    }

    fn delete(&self, _sql: &str) -> RouterResult<usize> {
        self.record(Operation::Delete);
        Ok(1)
    }

    fn select_all(&self, _sql: &str) -> RouterResult<Vec<Record>> {
        self.record(Operation::SelectAll);
        Ok(vec![Record::new(
            vec!["source".into()],
            vec![Value::from(self.name)],
        )])
    }

    fn select_one(&self, _sql: &str) -> RouterResult<Option<Record>> {
        self.record(Operation::SelectOne);
        Ok(None)
    }

    fn select_value(&self, _sql: &str) -> RouterResult<Option<Value>> {
        self.record(Operation::SelectValue);
        Ok(Some(Value::from(self.name)))
    }

    fn select_values(&self, _sql: &str) -> RouterResult<Vec<Value>> {
        self.record(Operation::SelectValues);
        Ok(vec![])
    }

    fn tables(&self) -> RouterResult<Vec<String>> {
        self.record(Operation::Tables);
        Ok(vec![])
    }

    fn table_exists(&self, _name: &str) -> RouterResult<bool> {
        self.record(Operation::TableExists);
        Ok(false)
    }

    fn indexes(&self, _table: &str) -> RouterResult<Vec<IndexDefinition>> {
        self.record(Operation::Indexes);
        Ok(vec![])
    }

    fn columns(&self, _table: &str) -> RouterResult<Vec<ColumnInfo>> {
        self.record(Operation::Columns);
        Ok(vec![])
    }

    fn create_table(&self, _name: &str, _columns: &[ColumnDefinition]) -> RouterResult<()> {
        self.record(Operation::CreateTable);
        Ok(())
    }

    fn rename_table(&self, _name: &str, _new_name: &str) -> RouterResult<()> {
        self.record(Operation::RenameTable);
        Ok(())
    }

    fn drop_table(&self, _name: &str) -> RouterResult<()> {
        self.record(Operation::DropTable);
        Ok(())
    }

    fn add_column(&self, _table: &str, _column: &ColumnDefinition) -> RouterResult<()> {
        self.record(Operation::AddColumn);
        Ok(())
    }

    fn remove_column(&self, _table: &str, _column: &str) -> RouterResult<()> {
        self.record(Operation::RemoveColumn);
        Ok(())
    }

    fn change_column(&self, _table: &str, _column: &ColumnDefinition) -> RouterResult<()> {
        self.record(Operation::ChangeColumn);
        Ok(())
    }

    fn change_column_default(
        &self,
        _table: &str,
        _column: &str,
        _default: Option<&Value>,
    ) -> RouterResult<()> {
        self.record(Operation::ChangeColumnDefault);
        Ok(())
    }

    fn rename_column(&self, _table: &str, _column: &str, _new_name: &str) -> RouterResult<()> {
        self.record(Operation::RenameColumn);
        Ok(())
    }

    fn add_index(&self, _table: &str, _index: &IndexDefinition) -> RouterResult<()> {
        self.record(Operation::AddIndex);
        Ok(())
    }

    fn remove_index(&self, _table: &str, _index_name: &str) -> RouterResult<()> {
        self.record(Operation::RemoveIndex);
        Ok(())
    }

    fn initialize_schema_information(&self) -> RouterResult<()> {
        self.record(Operation::InitializeSchemaInformation);
        Ok(())
    }

    fn dump_schema_information(&self) -> RouterResult<String> {
        self.record(Operation::DumpSchemaInformation);
        Ok(String::new())
    }

    fn transaction(&self, _start: bool, body: TransactionBody<'_>) -> RouterResult<()> {
        self.record(Operation::Transaction);
        body()
    }
}

/// 연산 하나를 임의 인자로 호출
pub(crate) fn invoke(conn: &dyn Connection, op: Operation) -> RouterResult<()> {
    let column = ColumnDefinition::new("name", "TEXT");
    let index = IndexDefinition::new("by_name", &["name"]);

    match op {
        Operation::Insert => conn.insert("INSERT INTO t VALUES (1)").map(drop),
        Operation::Update => conn.update("UPDATE t SET a = 1").map(drop),
        Operation::Delete => conn.delete("DELETE FROM t").map(drop),
        Operation::CreateTable => conn.create_table("t", &[column]),
        Operation::RenameTable => conn.rename_table("t", "u"),
        Operation::DropTable => conn.drop_table("t"),
        Operation::AddColumn => conn.add_column("t", &column),
        Operation::RemoveColumn => conn.remove_column("t", "name"),
        Operation::ChangeColumn => conn.change_column("t", &column),
        Operation::ChangeColumnDefault => {
            conn.change_column_default("t", "name", Some(&Value::from("x")))
        }
        Operation::RenameColumn => conn.rename_column("t", "name", "title"),
        Operation::AddIndex => conn.add_index("t", &index),
        Operation::RemoveIndex => conn.remove_index("t", "by_name"),
        Operation::InitializeSchemaInformation => conn.initialize_schema_information(),
        Operation::DumpSchemaInformation => conn.dump_schema_information().map(drop),
        Operation::Execute => conn.execute("SELECT 1").map(drop),
        Operation::Columns => conn.columns("t").map(drop),
        Operation::SelectAll => conn.select_all("SELECT 1").map(drop),
        Operation::SelectOne => conn.select_one("SELECT 1").map(drop),
        Operation::SelectValue => conn.select_value("SELECT 1").map(drop),
        Operation::SelectValues => conn.select_values("SELECT 1").map(drop),
        Operation::Tables => conn.tables().map(drop),
        Operation::TableExists => conn.table_exists("t").map(drop),
        Operation::Indexes => conn.indexes("t").map(drop),
        Operation::Transaction => conn.transaction(true, &mut || Ok(())),
    }
}
