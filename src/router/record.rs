//! Record - 쿼리 결과 레코드
//!
//! 연결이 반환하는 값과 행 타입

use std::collections::HashMap;
use std::fmt;

// ============================================================================
// Value - 컬럼 값
// ============================================================================

/// 컬럼 값
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// Null
    Null,
    /// Integer (i64)
    Integer(i64),
    /// Float
    Float(f64),
    /// String
    String(String),
    /// Bytes
    Bytes(Vec<u8>),
}

impl Value {
    /// Null 여부
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Integer로 변환
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Value::Integer(i) => Some(*i),
            _ => None,
        }
    }

    /// Float로 변환
    pub fn as_float(&self) -> Option<f64> {
        match self {
            Value::Float(f) => Some(*f),
            Value::Integer(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// String으로 변환
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// 타입 이름
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Integer(_) => "Integer",
            Value::Float(_) => "Float",
            Value::String(_) => "String",
            Value::Bytes(_) => "Bytes",
        }
    }

    /// SQL 리터럴로 변환 (DEFAULT 절 등)
    pub fn to_sql_literal(&self) -> String {
        match self {
            Value::Null => "NULL".to_string(),
            Value::Integer(i) => i.to_string(),
            Value::Float(f) => f.to_string(),
            Value::String(s) => format!("'{}'", s.replace('\'', "''")),
            Value::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02X}", byte)).collect();
                format!("X'{}'", hex)
            }
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(f, "null"),
            Value::Integer(i) => write!(f, "{}", i),
            Value::Float(fl) => write!(f, "{}", fl),
            Value::String(s) => write!(f, "\"{}\"", s),
            Value::Bytes(b) => write!(f, "<{} bytes>", b.len()),
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Integer(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Integer(v as i64)
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<Vec<u8>> for Value {
    fn from(v: Vec<u8>) -> Self {
        Value::Bytes(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        match v {
            Some(val) => val.into(),
            None => Value::Null,
        }
    }
}

// ============================================================================
// Record - 단일 레코드
// ============================================================================

/// 쿼리 결과 레코드
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 컬럼 키
    keys: Vec<String>,
    /// 값들
    values: Vec<Value>,
    /// 키-인덱스 매핑
    key_index: HashMap<String, usize>,
}

impl Record {
    /// 새 레코드 생성
    pub fn new(keys: Vec<String>, values: Vec<Value>) -> Self {
        let key_index = keys
            .iter()
            .enumerate()
            .map(|(i, k)| (k.clone(), i))
            .collect();

        Self {
            keys,
            values,
            key_index,
        }
    }

    /// 키 목록
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// 값 목록
    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// 레코드 길이
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// 빈 레코드 여부
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// 키로 값 가져오기
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.key_index.get(key).and_then(|&i| self.values.get(i))
    }

    /// 인덱스로 값 가져오기
    pub fn get_by_index(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    /// Integer 값 가져오기
    pub fn get_int(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Value::as_int)
    }

    /// String 값 가져오기
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// 첫 번째 값 꺼내기
    pub fn into_first(self) -> Option<Value> {
        self.values.into_iter().next()
    }

    /// Map으로 변환
    pub fn to_map(&self) -> HashMap<String, Value> {
        self.keys
            .iter()
            .cloned()
            .zip(self.values.iter().cloned())
            .collect()
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let pairs: Vec<String> = self
            .keys
            .iter()
            .zip(self.values.iter())
            .map(|(k, v)| format!("{}: {}", k, v))
            .collect();
        write!(f, "{{{}}}", pairs.join(", "))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_record() -> Record {
        let keys = vec!["id".into(), "name".into(), "score".into()];
        let values = vec![
            Value::Integer(7),
            Value::String("Alice".into()),
            Value::Float(9.5),
        ];
        Record::new(keys, values)
    }

    #[test]
    fn test_record_access() {
        let record = create_test_record();

        assert_eq!(record.len(), 3);
        assert!(!record.is_empty());
        assert_eq!(record.get_int("id"), Some(7));
        assert_eq!(record.get_str("name"), Some("Alice"));
        assert_eq!(record.get("score"), Some(&Value::Float(9.5)));
        assert_eq!(record.get_by_index(1), Some(&Value::String("Alice".into())));
        assert!(record.get("missing").is_none());
    }

    #[test]
    fn test_record_display() {
        let record = create_test_record();
        assert_eq!(record.to_string(), "{id: 7, name: \"Alice\", score: 9.5}");
    }

    #[test]
    fn test_record_into_first() {
        let record = create_test_record();
        assert_eq!(record.into_first(), Some(Value::Integer(7)));
        assert_eq!(Record::new(vec![], vec![]).into_first(), None);
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(Value::from(1i32), Value::Integer(1));
        assert_eq!(Value::from(true), Value::Integer(1));
        assert_eq!(Value::from("x"), Value::String("x".into()));
        assert_eq!(Value::from(None::<i64>), Value::Null);
        assert_eq!(Value::Integer(3).as_float(), Some(3.0));
        assert_eq!(Value::Bytes(vec![1, 2]).type_name(), "Bytes");
    }

    #[test]
    fn test_sql_literal() {
        assert_eq!(Value::Null.to_sql_literal(), "NULL");
        assert_eq!(Value::Integer(42).to_sql_literal(), "42");
        assert_eq!(Value::String("it's".into()).to_sql_literal(), "'it''s'");
        assert_eq!(Value::Bytes(vec![0xAB, 0x01]).to_sql_literal(), "X'AB01'");
    }
}
