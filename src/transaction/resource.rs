//! 물리 트랜잭션 핸들과 트랜잭션 리소스 인터페이스
//!
//! [`TransactionResource`]는 ORM/데이터베이스 계층 같은 외부 협력자가 구현하는 경계입니다.
//! 코디네이터는 전파 규칙에 따라 이 인터페이스의 begin/commit/rollback/savepoint를 호출할 뿐,
//! 실제 저장소 동작은 알지 못합니다.

use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::core::errors::{ContainerError, ContainerResult};
use crate::transaction::definition::{Isolation, TransactionDefinition};

/// 물리 트랜잭션 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionState {
    Active,
    Committed,
    RolledBack,
}

/// 하나의 물리 트랜잭션 핸들
///
/// 격리 수준, 읽기 전용 여부, 제한 시간은 시작 시점의 정의에서 고정됩니다.
pub struct Transaction {
    id: Uuid,
    name: Option<String>,
    isolation: Isolation,
    read_only: bool,
    timeout: Option<Duration>,
    started: Instant,
    started_at: DateTime<Utc>,
    rollback_only: AtomicBool,
    savepoints: AtomicU32,
    state: Mutex<TransactionState>,
}

impl Transaction {
    pub(crate) fn begin(definition: &TransactionDefinition) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: definition.name.clone(),
            isolation: definition.isolation,
            read_only: definition.read_only,
            timeout: definition.timeout(),
            started: Instant::now(),
            started_at: Utc::now(),
            rollback_only: AtomicBool::new(false),
            savepoints: AtomicU32::new(0),
            state: Mutex::new(TransactionState::Active),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn isolation(&self) -> Isolation {
        self.isolation
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// 제한 시간까지 남은 시간. 제한 시간이 없으면 `None`
    pub fn remaining(&self) -> Option<Duration> {
        self.timeout.map(|limit| limit.saturating_sub(self.elapsed()))
    }

    pub fn deadline_exceeded(&self) -> bool {
        self.timeout.is_some_and(|limit| self.elapsed() >= limit)
    }

    /// 협력적 제한 시간 검사. 긴 작업 본문이 중간중간 호출할 수 있습니다.
    pub fn check_timeout(&self) -> ContainerResult<()> {
        if self.deadline_exceeded() {
            return Err(self.timeout_error());
        }
        Ok(())
    }

    pub(crate) fn timeout_error(&self) -> ContainerError {
        ContainerError::TransactionTimeout {
            id: self.id.to_string(),
            timeout_secs: self.timeout.map_or(0, |t| t.as_secs()),
        }
    }

    /// 커밋 대신 롤백되도록 표시합니다. 소유 스코프가 종료될 때 반영됩니다.
    pub fn set_rollback_only(&self) {
        self.rollback_only.store(true, Ordering::SeqCst);
    }

    pub(crate) fn restore_rollback_only(&self, rollback_only: bool) {
        self.rollback_only.store(rollback_only, Ordering::SeqCst);
    }

    pub fn is_rollback_only(&self) -> bool {
        self.rollback_only.load(Ordering::SeqCst)
    }

    pub fn state(&self) -> TransactionState {
        *self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn is_active(&self) -> bool {
        self.state() == TransactionState::Active
    }

    pub(crate) fn mark(&self, state: TransactionState) {
        *self.state.lock().unwrap_or_else(|e| e.into_inner()) = state;
    }

    pub(crate) fn next_savepoint_name(&self, prefix: &str) -> String {
        let n = self.savepoints.fetch_add(1, Ordering::SeqCst) + 1;
        format!("{prefix}{n}")
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("isolation", &self.isolation)
            .field("read_only", &self.read_only)
            .field("timeout", &self.timeout)
            .field("state", &self.state())
            .field("rollback_only", &self.is_rollback_only())
            .finish()
    }
}

/// 트랜잭션을 지원하는 리소스 (DB 연결, 메시지 세션 등)
///
/// 일시 중단/재개는 같은 실행 흐름 안에서만 호출됩니다.
pub trait TransactionResource: Send + Sync {
    fn name(&self) -> &str {
        "resource"
    }

    /// 새 물리 트랜잭션 시작. 격리 수준은 이 시점에만 적용됩니다.
    fn begin(&self, transaction: &Transaction) -> ContainerResult<()>;

    fn commit(&self, transaction: &Transaction) -> ContainerResult<()>;

    fn rollback(&self, transaction: &Transaction) -> ContainerResult<()>;

    fn create_savepoint(&self, transaction: &Transaction, name: &str) -> ContainerResult<()>;

    /// 세이브포인트 이후의 변경을 되돌리고 세이브포인트를 해제합니다.
    fn rollback_to_savepoint(&self, transaction: &Transaction, name: &str) -> ContainerResult<()>;

    fn release_savepoint(&self, transaction: &Transaction, name: &str) -> ContainerResult<()>;

    fn suspend(&self, _transaction: &Transaction) -> ContainerResult<()> {
        Ok(())
    }

    fn resume(&self, _transaction: &Transaction) -> ContainerResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transaction_takes_settings_from_definition() {
        let definition = TransactionDefinition::required()
            .isolation(Isolation::Serializable)
            .timeout_seconds(30)
            .read_only()
            .named("Repo::load()");
        let tx = Transaction::begin(&definition);

        assert_eq!(tx.isolation(), Isolation::Serializable);
        assert!(tx.is_read_only());
        assert_eq!(tx.timeout(), Some(Duration::from_secs(30)));
        assert_eq!(tx.name(), Some("Repo::load()"));
        assert!(tx.is_active());
        assert!(!tx.deadline_exceeded());
        assert!(tx.check_timeout().is_ok());
    }

    #[test]
    fn test_savepoint_names_are_sequential() {
        let tx = Transaction::begin(&TransactionDefinition::required());

        assert_eq!(tx.next_savepoint_name("SP_"), "SP_1");
        assert_eq!(tx.next_savepoint_name("SP_"), "SP_2");
    }

    #[test]
    fn test_rollback_only_flag() {
        let tx = Transaction::begin(&TransactionDefinition::required());
        assert!(!tx.is_rollback_only());

        tx.set_rollback_only();

        assert!(tx.is_rollback_only());
    }
}
