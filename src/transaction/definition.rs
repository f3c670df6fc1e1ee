//! 트랜잭션 정의 값 객체
//!
//! Spring의 `@Transactional(propagation = ..., isolation = ..., timeout = ..., readOnly = ...)`
//! 어노테이션 대신 명시적인 구조체로 구성합니다. serde로 JSON 설정에서 읽을 수도 있습니다.
//!
//! ```json
//! { "propagation": "requires_new", "isolation": "serializable", "timeout_seconds": 5, "read_only": false }
//! ```

use std::fmt;
use std::time::Duration;
use serde::{Deserialize, Serialize};

/// 트랜잭션 전파 규칙
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Propagation {
    /// 있으면 참여, 없으면 새로 시작
    #[default]
    Required,
    /// 있으면 일시 중단하고 항상 새로 시작
    RequiresNew,
    /// 있으면 세이브포인트 기반 하위 트랜잭션, 없으면 새로 시작
    Nested,
    /// 있으면 참여, 없으면 트랜잭션 없이 실행
    Supports,
    /// 있으면 일시 중단하고 트랜잭션 없이 실행
    NotSupported,
    /// 있으면 참여, 없으면 실패
    Mandatory,
    /// 있으면 실패, 없으면 트랜잭션 없이 실행
    Never,
}

impl fmt::Display for Propagation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Propagation::Required => "REQUIRED",
            Propagation::RequiresNew => "REQUIRES_NEW",
            Propagation::Nested => "NESTED",
            Propagation::Supports => "SUPPORTS",
            Propagation::NotSupported => "NOT_SUPPORTED",
            Propagation::Mandatory => "MANDATORY",
            Propagation::Never => "NEVER",
        };
        f.write_str(name)
    }
}

/// 트랜잭션 격리 수준
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Isolation {
    /// 리소스의 기본 격리 수준 사용
    #[default]
    Default,
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl fmt::Display for Isolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Isolation::Default => "DEFAULT",
            Isolation::ReadUncommitted => "READ_UNCOMMITTED",
            Isolation::ReadCommitted => "READ_COMMITTED",
            Isolation::RepeatableRead => "REPEATABLE_READ",
            Isolation::Serializable => "SERIALIZABLE",
        };
        f.write_str(name)
    }
}

/// 기존 트랜잭션에 참여할 때 다른 격리 수준을 요청한 경우의 정책
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IsolationPolicy {
    /// 요청을 무시하고 바깥 트랜잭션의 격리 수준을 그대로 사용
    #[default]
    Inherit,
    /// `IsolationConflict`로 즉시 실패
    Strict,
}

impl IsolationPolicy {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "inherit" | "ignore" => Some(IsolationPolicy::Inherit),
            "strict" | "fail" => Some(IsolationPolicy::Strict),
            _ => None,
        }
    }
}

/// 트랜잭션 정의
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransactionDefinition {
    pub propagation: Propagation,
    pub isolation: Isolation,
    /// 0 이하이면 제한 시간 없음
    pub timeout_seconds: i64,
    pub read_only: bool,
    /// 로그에 표시할 이름 (보통 메서드 서명)
    pub name: Option<String>,
}

impl Default for TransactionDefinition {
    fn default() -> Self {
        Self {
            propagation: Propagation::Required,
            isolation: Isolation::Default,
            timeout_seconds: TransactionDefinition::TIMEOUT_NONE,
            read_only: false,
            name: None,
        }
    }
}

impl TransactionDefinition {
    pub const TIMEOUT_NONE: i64 = -1;

    pub fn new(propagation: Propagation) -> Self {
        Self {
            propagation,
            ..Self::default()
        }
    }

    pub fn required() -> Self {
        Self::new(Propagation::Required)
    }

    pub fn requires_new() -> Self {
        Self::new(Propagation::RequiresNew)
    }

    pub fn nested() -> Self {
        Self::new(Propagation::Nested)
    }

    pub fn isolation(mut self, isolation: Isolation) -> Self {
        self.isolation = isolation;
        self
    }

    pub fn timeout_seconds(mut self, seconds: i64) -> Self {
        self.timeout_seconds = seconds;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// 제한 시간. 0 이하이면 `None`
    pub fn timeout(&self) -> Option<Duration> {
        u64::try_from(self.timeout_seconds)
            .ok()
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<anonymous>")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_positive_timeout_means_none() {
        assert_eq!(TransactionDefinition::required().timeout(), None);
        assert_eq!(TransactionDefinition::required().timeout_seconds(0).timeout(), None);
        assert_eq!(
            TransactionDefinition::required().timeout_seconds(3).timeout(),
            Some(Duration::from_secs(3))
        );
    }

    #[test]
    fn test_definition_from_json_config() {
        let definition: TransactionDefinition =
            serde_json::from_str(r#"{"propagation":"requires_new","isolation":"serializable","read_only":true}"#)
                .unwrap();

        assert_eq!(definition.propagation, Propagation::RequiresNew);
        assert_eq!(definition.isolation, Isolation::Serializable);
        assert!(definition.read_only);
        assert_eq!(definition.timeout_seconds, TransactionDefinition::TIMEOUT_NONE);
    }

    #[test]
    fn test_isolation_policy_parsing() {
        assert_eq!(IsolationPolicy::from_str("Strict"), Some(IsolationPolicy::Strict));
        assert_eq!(IsolationPolicy::from_str("inherit"), Some(IsolationPolicy::Inherit));
        assert_eq!(IsolationPolicy::from_str("other"), None);
    }

    #[test]
    fn test_propagation_display() {
        assert_eq!(Propagation::RequiresNew.to_string(), "REQUIRES_NEW");
        assert_eq!(Isolation::RepeatableRead.to_string(), "REPEATABLE_READ");
    }
}
