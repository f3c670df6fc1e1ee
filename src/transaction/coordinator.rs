//! # Transaction Coordinator
//!
//! 트랜잭션 스코프 진입마다 현재 컨텍스트의 트랜잭션과 [`TransactionDefinition`]의 전파 규칙을
//! 보고 참여 방식을 결정하는 상태 기계입니다.
//!
//! | 현재 트랜잭션 | REQUIRED | REQUIRES_NEW | NESTED | SUPPORTS | NOT_SUPPORTED | MANDATORY | NEVER |
//! |---|---|---|---|---|---|---|---|
//! | 없음 | 새로 시작 | 새로 시작 | 새로 시작 | 비트랜잭션 | 비트랜잭션 | `NoTransaction` | 비트랜잭션 |
//! | 있음 | 참여 | 일시 중단 후 새로 시작 | 세이브포인트 | 참여 | 일시 중단 | 참여 | `UnexpectedTransaction` |
//!
//! ## 스코프 종료
//!
//! | 참여 방식 | 정상 종료 | 에러 / 패닉 / 취소 |
//! |-----------|-----------|--------------------|
//! | 새 트랜잭션 (소유자) | 커밋 (rollback-only 또는 시간 초과면 롤백 후 에러) | 롤백 |
//! | 참여 | 아무것도 하지 않음 (소유자에게 위임) | rollback-only 표시 |
//! | NESTED | 세이브포인트 해제 | 세이브포인트까지 롤백 |
//! | 비트랜잭션 | - | - |
//!
//! 어떤 경우든 종료 시 이전 컨텍스트가 복원되고, 일시 중단했던 트랜잭션이 재개됩니다.
//!
//! ## Spring과의 비교
//!
//! | Spring | 이 시스템 |
//! |--------|-----------|
//! | `@Transactional` 메서드 | `coordinator.execute(&definition, \|\| ...)` / `TransactionFilter` |
//! | `TransactionSynchronizationManager` | [`current_transaction`] (컨텍스트 바인딩) |
//! | `PlatformTransactionManager` | [`TransactionResource`] |
//! | `validateExistingTransaction` | [`IsolationPolicy::Strict`] |

use std::future::Future;
use std::sync::Arc;

use crate::config::TransactionConfig;
use crate::context::{self, Context, ContextGuard, ContextScope};
use crate::core::errors::{ContainerError, ContainerResult};
use crate::transaction::definition::{Isolation, IsolationPolicy, Propagation, TransactionDefinition};
use crate::transaction::resource::{Transaction, TransactionResource, TransactionState};

/// 컨텍스트에 저장되는 트랜잭션 바인딩
///
/// `None` 바인딩은 부모의 트랜잭션을 가립니다 (일시 중단).
pub(crate) struct TransactionBinding(pub(crate) Option<Arc<Transaction>>);

/// 현재 실행 흐름에 바인딩된 트랜잭션
pub fn current_transaction() -> Option<Arc<Transaction>> {
    context::current()
        .and_then(|ctx| ctx.get::<TransactionBinding>())
        .and_then(|binding| binding.0.clone())
}

/// 스코프가 트랜잭션에 참여한 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// 새 물리 트랜잭션을 시작하고 소유함
    NewTransaction,
    /// 바깥 트랜잭션에 참여함
    Joined,
    /// 바깥 트랜잭션 안의 세이브포인트 기반 하위 트랜잭션
    Nested,
    /// 트랜잭션 없이 실행
    NonTransactional,
}

enum Participation {
    Owner {
        transaction: Arc<Transaction>,
        suspended: Option<Arc<Transaction>>,
    },
    Joined {
        transaction: Arc<Transaction>,
    },
    Nested {
        transaction: Arc<Transaction>,
        savepoint: String,
        rollback_only: bool,
    },
    NonTransactional {
        suspended: Option<Arc<Transaction>>,
    },
}

impl Participation {
    fn transaction(&self) -> Option<&Arc<Transaction>> {
        match self {
            Participation::Owner { transaction, .. }
            | Participation::Joined { transaction }
            | Participation::Nested { transaction, .. } => Some(transaction),
            Participation::NonTransactional { .. } => None,
        }
    }

    fn kind(&self) -> ScopeKind {
        match self {
            Participation::Owner { .. } => ScopeKind::NewTransaction,
            Participation::Joined { .. } => ScopeKind::Joined,
            Participation::Nested { .. } => ScopeKind::Nested,
            Participation::NonTransactional { .. } => ScopeKind::NonTransactional,
        }
    }
}

/// 트랜잭션 경계 관리자
pub struct TransactionCoordinator {
    resource: Arc<dyn TransactionResource>,
    policy: IsolationPolicy,
    savepoint_prefix: String,
}

impl TransactionCoordinator {
    /// 환경 설정(`TX_ISOLATION_POLICY`, `TX_SAVEPOINT_PREFIX`)을 사용하는 코디네이터
    pub fn new(resource: Arc<dyn TransactionResource>) -> Self {
        Self {
            resource,
            policy: TransactionConfig::isolation_policy(),
            savepoint_prefix: TransactionConfig::savepoint_prefix(),
        }
    }

    pub fn with_policy(mut self, policy: IsolationPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_savepoint_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.savepoint_prefix = prefix.into();
        self
    }

    pub fn policy(&self) -> IsolationPolicy {
        self.policy
    }

    pub fn resource(&self) -> &Arc<dyn TransactionResource> {
        &self.resource
    }

    /// 트랜잭션 스코프에 진입합니다.
    ///
    /// 반환된 스코프는 [`TransactionScope::complete`] 또는 [`TransactionScope::fail`]로 종료합니다.
    /// 둘 다 호출하지 않고 drop되면 (패닉, 조기 반환) 에러 경로로 종료됩니다.
    pub fn begin(&self, definition: &TransactionDefinition) -> ContainerResult<TransactionScope<'_>> {
        let (participation, context) = self.enter_scope(definition)?;
        let guard = context::enter(context);
        Ok(TransactionScope {
            guard,
            boundary: Boundary {
                coordinator: self,
                participation: Some(participation),
                name: definition.display_name().to_string(),
            },
        })
    }

    /// `body`를 트랜잭션 경계 안에서 실행합니다.
    ///
    /// 본문이 `Err`를 반환하면 롤백한 뒤 그 에러를 그대로 돌려줍니다. 롤백 자체의 실패는
    /// 로그로 남기고 원래 에러를 우선합니다.
    pub fn execute<T, E, F>(&self, definition: &TransactionDefinition, body: F) -> Result<T, E>
    where
        E: From<ContainerError>,
        F: FnOnce() -> Result<T, E>,
    {
        let scope = self.begin(definition)?;
        match body() {
            Ok(value) => {
                scope.complete()?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) = scope.fail() {
                    log::error!("Rollback failed for {}: {}", definition.display_name(), rollback_error);
                }
                Err(error)
            }
        }
    }

    /// async 본문을 트랜잭션 경계 안에서 실행합니다.
    ///
    /// 본문은 트랜잭션 컨텍스트가 설치된 상태로 poll 됩니다. 제한 시간이 있으면 남은 시간이
    /// 지나는 순간 본문을 중단하고 롤백한 뒤 `TransactionTimeout`을 반환합니다.
    /// 이 future가 완료 전에 drop되면 (취소) 롤백됩니다.
    pub async fn execute_async<T, E, Fut>(&self, definition: &TransactionDefinition, body: Fut) -> Result<T, E>
    where
        E: From<ContainerError>,
        Fut: Future<Output = Result<T, E>>,
    {
        let (participation, context) = self.enter_scope(definition)?;
        let boundary = Boundary {
            coordinator: self,
            participation: Some(participation),
            name: definition.display_name().to_string(),
        };
        let deadline = boundary.transaction().and_then(|tx| tx.remaining());
        let scoped = ContextScope::with_context(context, body);

        let outcome = match deadline {
            Some(remaining) => match tokio::time::timeout(remaining, scoped).await {
                Ok(outcome) => outcome,
                Err(_) => {
                    let error = boundary
                        .transaction()
                        .map(|tx| tx.timeout_error())
                        .unwrap_or_else(|| ContainerError::Internal("timeout without transaction".to_string()));
                    log::warn!("{} exceeded its deadline; aborting", boundary.name);
                    if let Err(rollback_error) = boundary.fail() {
                        log::error!("Rollback failed after timeout: {}", rollback_error);
                    }
                    return Err(error.into());
                }
            },
            None => scoped.await,
        };

        match outcome {
            Ok(value) => {
                boundary.complete()?;
                Ok(value)
            }
            Err(error) => {
                if let Err(rollback_error) = boundary.fail() {
                    log::error!("Rollback failed for {}: {}", definition.display_name(), rollback_error);
                }
                Err(error)
            }
        }
    }

    fn enter_scope(&self, definition: &TransactionDefinition) -> ContainerResult<(Participation, Arc<Context>)> {
        let parent = context::current();
        let existing = parent
            .as_ref()
            .and_then(|ctx| ctx.get::<TransactionBinding>())
            .and_then(|binding| binding.0.clone());

        let participation = match existing {
            None => match definition.propagation {
                Propagation::Mandatory => return Err(ContainerError::NoTransaction),
                Propagation::Required | Propagation::RequiresNew | Propagation::Nested => Participation::Owner {
                    transaction: self.open(definition)?,
                    suspended: None,
                },
                Propagation::Supports | Propagation::NotSupported | Propagation::Never => {
                    log::debug!("{} runs without transaction ({})", definition.display_name(), definition.propagation);
                    Participation::NonTransactional { suspended: None }
                }
            },
            Some(existing) => match definition.propagation {
                Propagation::Never => return Err(ContainerError::UnexpectedTransaction(existing.id().to_string())),
                Propagation::Required | Propagation::Supports | Propagation::Mandatory => {
                    self.join(&existing, definition)?;
                    Participation::Joined { transaction: existing }
                }
                Propagation::RequiresNew => {
                    self.suspend(&existing)?;
                    match self.open(definition) {
                        Ok(transaction) => Participation::Owner {
                            transaction,
                            suspended: Some(existing),
                        },
                        Err(error) => {
                            if let Err(resume_error) = self.resume(&existing) {
                                log::error!("Failed to resume transaction {}: {}", existing.id(), resume_error);
                            }
                            return Err(error);
                        }
                    }
                }
                Propagation::Nested => {
                    existing.check_timeout()?;
                    let savepoint = existing.next_savepoint_name(&self.savepoint_prefix);
                    self.resource.create_savepoint(&existing, &savepoint)?;
                    log::debug!(
                        "Created savepoint {} in transaction {} for {}",
                        savepoint,
                        existing.id(),
                        definition.display_name()
                    );
                    Participation::Nested {
                        rollback_only: existing.is_rollback_only(),
                        transaction: existing,
                        savepoint,
                    }
                }
                Propagation::NotSupported => {
                    self.suspend(&existing)?;
                    Participation::NonTransactional {
                        suspended: Some(existing),
                    }
                }
            },
        };

        let binding = TransactionBinding(participation.transaction().cloned());
        let context = Arc::new(Context::derive(parent).with(binding));
        Ok((participation, context))
    }

    fn open(&self, definition: &TransactionDefinition) -> ContainerResult<Arc<Transaction>> {
        let transaction = Arc::new(Transaction::begin(definition));
        self.resource.begin(&transaction)?;
        log::info!(
            "Began transaction {} for {} (isolation {}, timeout {:?}, read_only {}) on {}",
            transaction.id(),
            definition.display_name(),
            transaction.isolation(),
            transaction.timeout(),
            transaction.is_read_only(),
            self.resource.name()
        );
        Ok(transaction)
    }

    fn join(&self, existing: &Transaction, definition: &TransactionDefinition) -> ContainerResult<()> {
        existing.check_timeout()?;

        if definition.isolation != Isolation::Default && definition.isolation != existing.isolation() {
            match self.policy {
                IsolationPolicy::Strict => {
                    return Err(ContainerError::IsolationConflict {
                        requested: definition.isolation.to_string(),
                        existing: existing.isolation().to_string(),
                    });
                }
                IsolationPolicy::Inherit => log::debug!(
                    "{} requested isolation {} but joins transaction {} with {}",
                    definition.display_name(),
                    definition.isolation,
                    existing.id(),
                    existing.isolation()
                ),
            }
        }

        log::debug!("{} joins transaction {}", definition.display_name(), existing.id());
        Ok(())
    }

    fn suspend(&self, transaction: &Transaction) -> ContainerResult<()> {
        self.resource.suspend(transaction)?;
        log::debug!("Suspended transaction {}", transaction.id());
        Ok(())
    }

    fn resume(&self, transaction: &Transaction) -> ContainerResult<()> {
        self.resource.resume(transaction)?;
        log::debug!("Resumed transaction {}", transaction.id());
        Ok(())
    }

    fn finish(&self, participation: Participation, success: bool, name: &str) -> ContainerResult<()> {
        let (result, suspended) = match participation {
            Participation::Owner { transaction, suspended } => {
                let result = if success {
                    self.commit_owner(&transaction, name)
                } else {
                    self.rollback(&transaction, name)
                };
                (result, suspended)
            }
            Participation::Joined { transaction } => {
                let result = if !success {
                    log::debug!("{} failed; marking transaction {} rollback-only", name, transaction.id());
                    transaction.set_rollback_only();
                    Ok(())
                } else if transaction.deadline_exceeded() {
                    transaction.set_rollback_only();
                    Err(transaction.timeout_error())
                } else {
                    Ok(())
                };
                (result, None)
            }
            Participation::Nested {
                transaction,
                savepoint,
                rollback_only,
            } => {
                let result = if success {
                    self.resource.release_savepoint(&transaction, &savepoint)
                } else {
                    log::warn!("{} failed; rolling back to savepoint {}", name, savepoint);
                    let result = self.resource.rollback_to_savepoint(&transaction, &savepoint);
                    // 세이브포인트 이후에 참여 스코프가 남긴 rollback-only 표시는 함께 되돌림
                    if result.is_ok() {
                        transaction.restore_rollback_only(rollback_only);
                    }
                    result
                };
                (result, None)
            }
            Participation::NonTransactional { suspended } => (Ok(()), suspended),
        };

        let resumed = match suspended {
            Some(transaction) => self.resume(&transaction),
            None => Ok(()),
        };
        result.and(resumed)
    }

    fn commit_owner(&self, transaction: &Transaction, name: &str) -> ContainerResult<()> {
        if transaction.deadline_exceeded() {
            log::warn!("Transaction {} for {} exceeded its timeout", transaction.id(), name);
            self.rollback(transaction, name)?;
            return Err(transaction.timeout_error());
        }

        if transaction.is_rollback_only() {
            self.rollback(transaction, name)?;
            return Err(ContainerError::UnexpectedRollback(transaction.id().to_string()));
        }

        match self.resource.commit(transaction) {
            Ok(()) => {
                transaction.mark(TransactionState::Committed);
                log::info!("Committed transaction {} for {}", transaction.id(), name);
                Ok(())
            }
            Err(error) => {
                log::error!("Commit of transaction {} failed: {}", transaction.id(), error);
                if let Err(rollback_error) = self.rollback(transaction, name) {
                    log::error!("Rollback after failed commit also failed: {}", rollback_error);
                }
                Err(error)
            }
        }
    }

    fn rollback(&self, transaction: &Transaction, name: &str) -> ContainerResult<()> {
        self.resource.rollback(transaction)?;
        transaction.mark(TransactionState::RolledBack);
        log::warn!("Rolled back transaction {} for {}", transaction.id(), name);
        Ok(())
    }
}

/// 스코프 종료를 한 번만 수행하는 내부 경계. 완료되지 않고 drop되면 에러 경로로 종료합니다.
struct Boundary<'a> {
    coordinator: &'a TransactionCoordinator,
    participation: Option<Participation>,
    name: String,
}

impl Boundary<'_> {
    fn transaction(&self) -> Option<&Arc<Transaction>> {
        self.participation.as_ref().and_then(Participation::transaction)
    }

    fn complete(mut self) -> ContainerResult<()> {
        match self.participation.take() {
            Some(participation) => self.coordinator.finish(participation, true, &self.name),
            None => Ok(()),
        }
    }

    fn fail(mut self) -> ContainerResult<()> {
        match self.participation.take() {
            Some(participation) => self.coordinator.finish(participation, false, &self.name),
            None => Ok(()),
        }
    }
}

impl Drop for Boundary<'_> {
    fn drop(&mut self) {
        let Some(participation) = self.participation.take() else {
            return;
        };

        if std::thread::panicking() {
            log::error!("{} panicked inside transactional scope; rolling back", self.name);
        } else {
            log::warn!("{} left its transactional scope without completing; rolling back", self.name);
        }

        if let Err(error) = self.coordinator.finish(participation, false, &self.name) {
            log::error!("Cleanup of {} failed: {}", self.name, error);
        }
    }
}

/// 진입한 트랜잭션 스코프
///
/// 스코프가 살아 있는 동안 트랜잭션 바인딩을 담은 컨텍스트가 현재 컨텍스트입니다.
#[must_use = "dropping the scope immediately rolls it back"]
pub struct TransactionScope<'a> {
    guard: ContextGuard,
    boundary: Boundary<'a>,
}

impl TransactionScope<'_> {
    /// 이 스코프에서 보이는 트랜잭션. 비트랜잭션 스코프면 `None`
    pub fn transaction(&self) -> Option<&Arc<Transaction>> {
        self.boundary.transaction()
    }

    pub fn kind(&self) -> ScopeKind {
        self.boundary
            .participation
            .as_ref()
            .map_or(ScopeKind::NonTransactional, Participation::kind)
    }

    pub fn is_new_transaction(&self) -> bool {
        self.kind() == ScopeKind::NewTransaction
    }

    pub fn context(&self) -> &Arc<Context> {
        self.guard.context()
    }

    /// 정상 종료. 컨텍스트를 복원한 뒤 참여 방식에 맞게 커밋/해제합니다.
    pub fn complete(self) -> ContainerResult<()> {
        let TransactionScope { guard, boundary } = self;
        drop(guard);
        boundary.complete()
    }

    /// 에러 종료. 컨텍스트를 복원한 뒤 참여 방식에 맞게 롤백합니다.
    pub fn fail(self) -> ContainerResult<()> {
        let TransactionScope { guard, boundary } = self;
        drop(guard);
        boundary.fail()
    }
}
