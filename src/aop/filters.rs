//! 기본 제공 필터
//!
//! - [`LoggingFilter`]: 호출 시작/종료/실패와 소요 시간을 로그로 남깁니다.
//! - [`TransactionFilter`]: 메서드 호출을 트랜잭션 경계로 감쌉니다.
//!   Spring의 `TransactionInterceptor`에 해당합니다.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;
use serde_json::Value;

use crate::aop::chain::{Filter, Next};
use crate::aop::invocation::{Invocation, MethodSignature};
use crate::core::errors::ContainerResult;
use crate::transaction::{TransactionCoordinator, TransactionDefinition};

/// 호출 로깅 필터
pub struct LoggingFilter {
    level: log::Level,
    log_arguments: bool,
}

impl Default for LoggingFilter {
    fn default() -> Self {
        Self {
            level: log::Level::Debug,
            log_arguments: false,
        }
    }
}

impl LoggingFilter {
    pub fn new(level: log::Level) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    /// 인자 값까지 로그에 남깁니다. 민감한 값이 포함될 수 있으므로 기본값은 꺼져 있습니다.
    pub fn with_arguments(mut self) -> Self {
        self.log_arguments = true;
        self
    }
}

impl Filter for LoggingFilter {
    fn name(&self) -> &str {
        "logging"
    }

    fn invoke(&self, invocation: &mut Invocation<'_>, next: &Next<'_>) -> ContainerResult<Value> {
        let started = Instant::now();
        if self.log_arguments {
            log::log!(self.level, "→ {} {:?}", invocation.method(), invocation.arguments().values());
        } else {
            log::log!(self.level, "→ {}", invocation.method());
        }

        let result = next.proceed(invocation);

        match &result {
            Ok(_) => log::log!(self.level, "← {} ({:?})", invocation.method(), started.elapsed()),
            Err(error) => log::warn!("✗ {} failed after {:?}: {}", invocation.method(), started.elapsed(), error),
        }
        result
    }
}

/// 메서드 호출을 트랜잭션 경계 안에서 실행하는 필터
///
/// 메서드 이름별로 다른 정의를 줄 수 있으며, 없으면 기본 정의(REQUIRED)를 사용합니다.
///
/// ```rust,ignore
/// let filter = TransactionFilter::new(coordinator.clone())
///     .method("find", TransactionDefinition::required().read_only())
///     .method("audit", TransactionDefinition::requires_new());
/// ```
pub struct TransactionFilter {
    coordinator: Arc<TransactionCoordinator>,
    default: TransactionDefinition,
    methods: HashMap<String, TransactionDefinition>,
}

impl TransactionFilter {
    pub fn new(coordinator: Arc<TransactionCoordinator>) -> Self {
        Self {
            coordinator,
            default: TransactionDefinition::required(),
            methods: HashMap::new(),
        }
    }

    pub fn with_default(mut self, definition: TransactionDefinition) -> Self {
        self.default = definition;
        self
    }

    pub fn method(mut self, name: impl Into<String>, definition: TransactionDefinition) -> Self {
        self.methods.insert(name.into(), definition);
        self
    }

    /// 메서드에 적용할 정의. 이름이 없으면 메서드 서명을 이름으로 씁니다.
    pub fn definition_for(&self, method: &MethodSignature) -> TransactionDefinition {
        let mut definition = self
            .methods
            .get(method.name())
            .unwrap_or(&self.default)
            .clone();
        if definition.name.is_none() {
            definition.name = Some(method.to_string());
        }
        definition
    }
}

impl Filter for TransactionFilter {
    fn name(&self) -> &str {
        "transaction"
    }

    fn invoke(&self, invocation: &mut Invocation<'_>, next: &Next<'_>) -> ContainerResult<Value> {
        let definition = self.definition_for(invocation.method());
        self.coordinator.execute(&definition, || next.proceed(invocation))
    }
}
