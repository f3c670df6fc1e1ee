//! # Filter Chain
//!
//! 실제 메서드 호출을 감싸는 순서 있는 횡단 관심사 파이프라인입니다.
//! actix-web 미들웨어가 `service.call(req)`로 다음 서비스에 요청을 넘기듯,
//! 각 필터는 [`Next::proceed`]로 다음 링크에 호출을 넘기거나 넘기지 않고 반환(short-circuit)합니다.
//!
//! ```text
//! proxy.invoke("place")
//!    └─ Filter A ── next.proceed ──┐
//!                                  └─ Filter B ── next.proceed ──┐
//!                                                                └─ Invoker (실제 본문)
//! ```
//!
//! ## 불변 조건
//!
//! - 한 번의 체인 실행에서 각 필터는 최대 한 번 호출됩니다.
//! - 한 필터 호출 안에서 `proceed`를 두 번 호출하면 `ChainReentry`로 즉시 실패합니다.
//! - 마지막 링크(Invoker)는 체인 실행당 정확히 한 번만 실행됩니다.

use std::cell::Cell;
use std::sync::Arc;
use serde_json::Value;

use crate::aop::invocation::{Invocation, Invoker};
use crate::core::errors::{ContainerError, ContainerResult};

/// 횡단 관심사 필터
pub trait Filter: Send + Sync {
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// 호출을 가로챕니다.
    ///
    /// 인자를 수정한 뒤 `next.proceed(invocation)`으로 넘기거나, 넘기지 않고 값을 반환해
    /// 체인을 끊을 수 있습니다. 반환값/에러를 변환할 수 있지만, 의도적인 fallback이 아니라면
    /// 에러를 삼켜서는 안 됩니다.
    fn invoke(&self, invocation: &mut Invocation<'_>, next: &Next<'_>) -> ContainerResult<Value>;
}

/// 불변의 필터 목록
#[derive(Clone, Default)]
pub struct FilterChain {
    filters: Arc<[Arc<dyn Filter>]>,
}

impl FilterChain {
    pub fn new(filters: Vec<Arc<dyn Filter>>) -> Self {
        Self {
            filters: filters.into(),
        }
    }

    pub fn len(&self) -> usize {
        self.filters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    pub fn names(&self) -> Vec<String> {
        self.filters.iter().map(|filter| filter.name().to_string()).collect()
    }

    /// 체인을 처음부터 실행합니다. 커서 상태는 실행마다 새로 만들어집니다.
    pub fn execute(&self, invocation: &mut Invocation<'_>, invoker: &dyn Invoker) -> ContainerResult<Value> {
        let used = vec![Cell::new(false); self.filters.len() + 1];
        let head = Next {
            filters: &self.filters,
            invoker,
            position: 0,
            used: &used,
        };
        head.proceed(invocation)
    }
}

/// 체인 커서. 필터에게 "나머지 체인"을 나타냅니다.
pub struct Next<'a> {
    filters: &'a [Arc<dyn Filter>],
    invoker: &'a dyn Invoker,
    position: usize,
    used: &'a [Cell<bool>],
}

impl Next<'_> {
    /// 다음 링크를 정확히 한 번 실행합니다.
    pub fn proceed(&self, invocation: &mut Invocation<'_>) -> ContainerResult<Value> {
        if self.used[self.position].replace(true) {
            return Err(ContainerError::ChainReentry {
                method: invocation.method().to_string(),
                position: self.position,
            });
        }

        match self.filters.get(self.position) {
            Some(filter) => {
                log::trace!("filter[{}] {} -> {}", self.position, filter.name(), invocation.method());
                let next = Next {
                    position: self.position + 1,
                    ..*self
                };
                filter.invoke(invocation, &next)
            }
            None => self.invoker.invoke(invocation.arguments()),
        }
    }

    /// 현재 커서 위치 (0부터, 필터 개수와 같으면 실제 호출)
    pub fn position(&self) -> usize {
        self.position
    }

    /// 실제 호출 전까지 남은 필터 수
    pub fn remaining(&self) -> usize {
        self.filters.len().saturating_sub(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use serde_json::json;
    use crate::aop::invocation::{Arguments, MethodSignature};

    struct Recorder {
        label: &'static str,
        log: Arc<Mutex<Vec<String>>>,
        short_circuit: bool,
    }

    impl Filter for Recorder {
        fn name(&self) -> &str {
            self.label
        }

        fn invoke(&self, invocation: &mut Invocation<'_>, next: &Next<'_>) -> ContainerResult<Value> {
            self.log.lock().unwrap().push(self.label.to_string());
            if self.short_circuit {
                return Ok(json!("cached"));
            }
            next.proceed(invocation)
        }
    }

    struct CountingInvoker {
        sig: MethodSignature,
        log: Arc<Mutex<Vec<String>>>,
    }

    impl Invoker for CountingInvoker {
        fn signature(&self) -> &MethodSignature {
            &self.sig
        }

        fn invoke(&self, arguments: &Arguments) -> ContainerResult<Value> {
            self.log.lock().unwrap().push("M".to_string());
            Ok(arguments.value(0).cloned().unwrap_or(Value::Null))
        }
    }

    fn recorder(label: &'static str, log: &Arc<Mutex<Vec<String>>>, short_circuit: bool) -> Arc<dyn Filter> {
        Arc::new(Recorder {
            label,
            log: log.clone(),
            short_circuit,
        })
    }

    #[test]
    fn test_filters_run_in_order_before_real_call() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = FilterChain::new(vec![recorder("A", &log, false), recorder("B", &log, false)]);
        let invoker = CountingInvoker {
            sig: MethodSignature::new("Svc", "m"),
            log: log.clone(),
        };
        let mut invocation = Invocation::new(&invoker.sig, vec![json!(7)].into());

        let result = chain.execute(&mut invocation, &invoker).unwrap();

        assert_eq!(result, json!(7));
        assert_eq!(*log.lock().unwrap(), vec!["A", "B", "M"]);
    }

    #[test]
    fn test_short_circuit_skips_rest_of_chain() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = FilterChain::new(vec![recorder("A", &log, true), recorder("B", &log, false)]);
        let invoker = CountingInvoker {
            sig: MethodSignature::new("Svc", "m"),
            log: log.clone(),
        };
        let mut invocation = Invocation::new(&invoker.sig, Arguments::default());

        let result = chain.execute(&mut invocation, &invoker).unwrap();

        assert_eq!(result, json!("cached"));
        assert_eq!(*log.lock().unwrap(), vec!["A"]);
    }

    #[test]
    fn test_double_proceed_fails_fast() {
        struct Twice;

        impl Filter for Twice {
            fn invoke(&self, invocation: &mut Invocation<'_>, next: &Next<'_>) -> ContainerResult<Value> {
                next.proceed(invocation)?;
                next.proceed(invocation)
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = FilterChain::new(vec![Arc::new(Twice)]);
        let invoker = CountingInvoker {
            sig: MethodSignature::new("Svc", "m"),
            log: log.clone(),
        };
        let mut invocation = Invocation::new(&invoker.sig, Arguments::default());

        let result = chain.execute(&mut invocation, &invoker);

        assert!(matches!(result, Err(ContainerError::ChainReentry { position: 1, .. })));
        assert_eq!(*log.lock().unwrap(), vec!["M"]);
    }

    #[test]
    fn test_chain_can_be_executed_repeatedly() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let chain = FilterChain::new(vec![recorder("A", &log, false)]);
        let invoker = CountingInvoker {
            sig: MethodSignature::new("Svc", "m"),
            log: log.clone(),
        };

        for _ in 0..2 {
            let mut invocation = Invocation::new(&invoker.sig, Arguments::default());
            chain.execute(&mut invocation, &invoker).unwrap();
        }

        assert_eq!(*log.lock().unwrap(), vec!["A", "M", "A", "M"]);
        assert_eq!(chain.names(), vec!["A".to_string()]);
    }
}
