//! Router Error Types
//!
//! 라우터 에러 정의

use std::io;
use thiserror::Error;

// ============================================================================
// RouterError - 라우터 에러
// ============================================================================

/// 라우터 에러
///
/// 라우터 자체가 만드는 에러는 [`RouterError::Configuration`] 하나뿐입니다.
/// 나머지 변형은 하위 연결이 반환한 에러를 그대로 전달합니다.
#[derive(Error, Debug)]
pub enum RouterError {
    /// 설정 에러 (기동 시점에 치명적)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// SQLite 연결 에러
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// 하위 연결의 쿼리 에러
    #[error("Query error: {operation} - {message}")]
    Query { operation: String, message: String },

    /// 연결이 지원하지 않는 연산
    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    /// I/O 에러
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RouterError {
    /// 설정 에러 생성
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    /// 쿼리 에러 생성
    pub fn query(operation: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Query {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// 미지원 연산 에러 생성
    pub fn unsupported(operation: impl Into<String>) -> Self {
        Self::UnsupportedOperation(operation.into())
    }

    /// 설정 에러 여부
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// 하위 연결에서 발생한 에러 여부
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            Self::Sqlite(_) | Self::Query { .. } | Self::UnsupportedOperation(_) | Self::Io(_)
        )
    }
}

impl From<serde_yaml::Error> for RouterError {
    fn from(err: serde_yaml::Error) -> Self {
        RouterError::Configuration(format!("Invalid database configuration: {}", err))
    }
}

// ============================================================================
// Result Type
// ============================================================================

/// 라우터 결과 타입
pub type RouterResult<T> = Result<T, RouterError>;

// ============================================================================
// Tests
// ============================================================================
