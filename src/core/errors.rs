//! # Container Error Handling System
//!
//! 컨테이너 런타임 전체에서 사용하는 통합 에러 타입입니다.
//! 레지스트리, 프록시/필터 체인, 트랜잭션 코디네이터의 모든 실패가
//! 하나의 열거형으로 표현되며, 호출자에게 타입이 있는 에러로 전달됩니다.
//!
//! ## 에러 분류
//!
//! | 계층 | 변형 |
//! |------|------|
//! | 레지스트리 | `DuplicateDefinition`, `AliasConflict`, `AmbiguousType`, `DefinitionNotFound` |
//! | 인스턴스 생성 | `CircularDependency`, `Construction`, `TypeMismatch` |
//! | 프록시 / 체인 | `NonProxyable`, `ChainReentry`, `UnsupportedInvocation`, `MethodNotFound`, `InvalidArgument`, `MethodFailed` |
//! | 트랜잭션 | `NoTransaction`, `UnexpectedTransaction`, `IsolationConflict`, `TransactionTimeout`, `UnexpectedRollback`, `Resource` |
//!
//! ## Spring과의 비교
//!
//! | Spring | 이 시스템 |
//! |--------|-----------|
//! | `BeanDefinitionStoreException` | `ContainerError::DuplicateDefinition` |
//! | `NoUniqueBeanDefinitionException` | `ContainerError::AmbiguousType` |
//! | `BeanCurrentlyInCreationException` | `ContainerError::CircularDependency` |
//! | `BeanCreationException` | `ContainerError::Construction` |
//! | `IllegalTransactionStateException` | `NoTransaction` / `UnexpectedTransaction` |
//! | `TransactionTimedOutException` | `ContainerError::TransactionTimeout` |
//! | `UnexpectedRollbackException` | `ContainerError::UnexpectedRollback` |
//!
//! ## 사용 패턴
//!
//! ```rust,ignore
//! use component_runtime::core::errors::{ContainerError, ContainerResult};
//!
//! fn lookup(store: &DefinitionStore, name: &str) -> ContainerResult<Arc<Definition>> {
//!     store
//!         .get_by_id(name)
//!         .ok_or_else(|| ContainerError::DefinitionNotFound(name.to_string()))
//! }
//! ```

use thiserror::Error;

/// 외부 라이브러리 및 애플리케이션 메서드 본문이 반환하는 박싱된 에러
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// 컨테이너 런타임 전역 에러 타입
#[derive(Error, Debug)]
pub enum ContainerError {
    /// 같은 id의 정의가 이미 등록되어 있음
    #[error("Duplicate definition: '{0}' is already registered")]
    DuplicateDefinition(String),

    /// 별칭이 이미 다른 정의를 가리키고 있음
    #[error("Alias conflict: '{alias}' already resolves to '{existing}', cannot bind to '{requested}'")]
    AliasConflict {
        alias: String,
        existing: String,
        requested: String,
    },

    /// 정확히 일치하는 타입이 없고, 해당 타입을 구현하는 정의가 둘 이상임
    #[error("Ambiguous type {type_name}: candidates {candidates:?}")]
    AmbiguousType {
        type_name: String,
        candidates: Vec<String>,
    },

    /// 요청한 이름/별칭의 정의가 없음
    #[error("Definition not found: {0}")]
    DefinitionNotFound(String),

    /// 의존성 해석 경로가 이미 생성 중인 id를 다시 방문함
    ///
    /// `path`는 순환을 닫는 id까지 포함합니다. 예: `a -> b -> a`
    #[error("Circular dependency detected: {}", path.join(" -> "))]
    CircularDependency { path: Vec<String> },

    /// 팩토리가 실패하거나 패닉을 일으킴. 싱글톤 슬롯은 오염되지 않으며 다음 호출에서 재시도됩니다.
    #[error("Failed to construct '{id}': {message}")]
    Construction { id: String, message: String },

    /// 인스턴스가 요청한 타입으로 다운캐스트되지 않음
    #[error("Type mismatch for '{id}': expected {expected}")]
    TypeMismatch { id: String, expected: String },

    /// 프록시 대상에 가로챌 수 있는 메서드가 없음
    #[error("Type {type_name} is not proxyable: {reason}")]
    NonProxyable { type_name: String, reason: String },

    /// 하나의 필터 호출 안에서 `proceed`가 두 번 이상 호출됨
    #[error("Filter chain re-entered at link {position} while invoking {method}")]
    ChainReentry { method: String, position: usize },

    /// 구현되지 않은 메서드 슬롯 호출 (EmptyInvoker)
    #[error("Unsupported invocation: {0}")]
    UnsupportedInvocation(String),

    /// 프록시가 해당 메서드를 노출하지 않음
    #[error("Method not found on {type_name}: {method}")]
    MethodNotFound { type_name: String, method: String },

    /// 인자 개수 또는 형식이 시그니처와 맞지 않음
    #[error("Invalid argument for {method}: {message}")]
    InvalidArgument { method: String, message: String },

    /// 실제 메서드 본문이 애플리케이션 에러로 실패함
    #[error("Method {method} failed: {source}")]
    MethodFailed {
        method: String,
        #[source]
        source: BoxError,
    },

    /// MANDATORY 전파인데 활성 트랜잭션이 없음
    #[error("No existing transaction found for transaction marked with propagation 'mandatory'")]
    NoTransaction,

    /// NEVER 전파인데 활성 트랜잭션이 있음
    #[error("Existing transaction {0} found for transaction marked with propagation 'never'")]
    UnexpectedTransaction(String),

    /// 엄격 모드에서 참여하려는 트랜잭션의 격리 수준이 다름
    #[error("Isolation conflict: requested {requested}, existing transaction uses {existing}")]
    IsolationConflict { requested: String, existing: String },

    /// 트랜잭션 제한 시간 초과
    #[error("Transaction {id} timed out after {timeout_secs}s")]
    TransactionTimeout { id: String, timeout_secs: u64 },

    /// 내부 참여 스코프가 rollback-only로 표시하여 커밋 대신 롤백됨
    #[error("Transaction {0} rolled back because it has been marked as rollback-only")]
    UnexpectedRollback(String),

    /// 트랜잭션 리소스 (DB 연결 등) 오류
    #[error("Transaction resource error: {0}")]
    Resource(String),

    /// 예상치 못한 내부 오류
    #[error("Internal container error: {0}")]
    Internal(String),
}

impl ContainerError {
    /// 박싱된 애플리케이션 에러를 메서드 실패로 감쌉니다.
    ///
    /// 본문이 이미 `ContainerError`를 반환했다면 (예: 내부에서 MANDATORY 스코프 진입 실패)
    /// 다시 감싸지 않고 그대로 돌려줍니다.
    pub fn from_method(method: &str, error: BoxError) -> Self {
        match error.downcast::<ContainerError>() {
            Ok(inner) => *inner,
            Err(source) => ContainerError::MethodFailed {
                method: method.to_string(),
                source,
            },
        }
    }

    /// 트랜잭션 규칙 위반 에러인지 확인합니다.
    pub fn is_transactional(&self) -> bool {
        matches!(
            self,
            ContainerError::NoTransaction
                | ContainerError::UnexpectedTransaction(_)
                | ContainerError::IsolationConflict { .. }
                | ContainerError::TransactionTimeout { .. }
                | ContainerError::UnexpectedRollback(_)
        )
    }
}

/// 편의성을 위한 Result 타입 별칭
pub type ContainerResult<T> = Result<T, ContainerError>;

/// 외부 라이브러리 에러를 ContainerError로 변환하는 확장 trait
pub trait ErrorContext<T> {
    /// 컨텍스트 정보와 함께 에러를 변환합니다.
    fn context(self, msg: &str) -> ContainerResult<T>;

    /// 클로저를 사용하여 지연 평가된 컨텍스트를 제공합니다.
    fn with_context<F>(self, f: F) -> ContainerResult<T>
    where
        F: FnOnce() -> String;
}

impl<T, E> ErrorContext<T> for Result<T, E>
where
    E: std::fmt::Display,
{
    fn context(self, msg: &str) -> ContainerResult<T> {
        self.map_err(|e| ContainerError::Internal(format!("{}: {}", msg, e)))
    }

    fn with_context<F>(self, f: F) -> ContainerResult<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| ContainerError::Internal(format!("{}: {}", f(), e)))
    }
}

/// 잠금 오염(poisoning)을 내부 에러로 변환합니다.
///
/// 트랜잭션 리소스처럼 중간 상태가 남을 수 있는 잠금에 사용합니다. 정의 저장소는 검증 후에만
/// 상태를 바꾸므로 오염을 무시하고 진행합니다.
pub(crate) fn poisoned<G>(_: std::sync::PoisonError<G>) -> ContainerError {
    ContainerError::Internal("lock poisoned".to_string())
}
