//! # Proxy Builder
//!
//! 대상 인스턴스와 필터 목록으로부터 같은 메서드 표면을 노출하는 프록시를 만듭니다.
//! 런타임 바이트코드 생성 대신, 대상 타입이 [`MethodTable`]에 메서드 슬롯을 명시적으로
//! 등록하고 프록시는 슬롯 이름으로 호출을 라우팅합니다.
//!
//! ## 전략
//!
//! | 전략 | Spring 대응 | 노출 메서드 | 가로채는 메서드 |
//! |------|-------------|-------------|-----------------|
//! | [`ProxyStrategy::Interface`] | JDK dynamic proxy | 선언된 인터페이스의 메서드만 | 노출된 전부 |
//! | [`ProxyStrategy::Subclass`] | CGLIB | 모든 슬롯 | sealed가 아닌 슬롯 |
//!
//! `Auto`는 테이블이 인터페이스를 선언하면 인터페이스 전략, 아니면 서브클래스 전략을 고릅니다.
//! 가로챌 메서드가 하나도 없으면 `NonProxyable`로 실패합니다.
//!
//! 슬롯은 `(소유 인터페이스, 메서드 이름)`으로 구분됩니다. 메서드는 `name` 또는 `Owner::name`으로
//! 호출할 수 있고, 노출된 슬롯 중 같은 이름이 둘 이상이면 `Owner::name`으로만 호출됩니다.
//!
//! ```rust,ignore
//! let table = MethodTable::new("OrderService")
//!     .implements("OrderApi")
//!     .method(MethodSignature::new("OrderApi", "place").param("String"), |svc: &OrderService, args| {
//!         svc.place(&args.get::<String>(0)?)
//!     });
//!
//! let proxy = ProxyBuilder::new(Arc::new(OrderService::default()), Arc::new(table))
//!     .filter(LoggingFilter::default())
//!     .build()?;
//! let id: u64 = proxy.invoke_as("place", vec![json!("sku-1")])?;
//! ```

use std::collections::HashMap;
use std::sync::Arc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::aop::chain::{Filter, FilterChain};
use crate::aop::invocation::{
    Arguments, EmptyInvoker, Invocation, Invoker, MethodBody, MethodInvoker, MethodSignature,
};
use crate::core::errors::{BoxError, ContainerError, ContainerResult};

struct MethodSlot<T> {
    signature: MethodSignature,
    body: Option<MethodBody<T>>,
}

/// 대상 타입의 메서드 슬롯 테이블
pub struct MethodTable<T> {
    type_name: String,
    interfaces: Vec<String>,
    slots: Vec<MethodSlot<T>>,
}

impl<T: Send + Sync + 'static> MethodTable<T> {
    pub fn new(type_name: impl Into<String>) -> Self {
        Self {
            type_name: type_name.into(),
            interfaces: Vec::new(),
            slots: Vec::new(),
        }
    }

    /// 대상이 구현하는 인터페이스(capability set) 이름을 선언합니다.
    pub fn implements(mut self, interface: impl Into<String>) -> Self {
        self.interfaces.push(interface.into());
        self
    }

    /// 구현이 있는 메서드 슬롯을 추가합니다. 반환값은 JSON 값으로 직렬화됩니다.
    ///
    /// 같은 이름의 슬롯이 이미 있으면 교체합니다.
    pub fn method<R, F>(mut self, signature: MethodSignature, body: F) -> Self
    where
        R: Serialize,
        F: Fn(&T, &Arguments) -> Result<R, BoxError> + Send + Sync + 'static,
    {
        let body: MethodBody<T> = Arc::new(move |target: &T, args: &Arguments| -> Result<Value, BoxError> {
            let value = body(target, args)?;
            Ok(serde_json::to_value(value)?)
        });
        self.put(MethodSlot {
            signature,
            body: Some(body),
        });
        self
    }

    /// 구현이 없는 슬롯을 추가합니다. 호출하면 `UnsupportedInvocation`으로 실패합니다.
    pub fn abstract_method(mut self, signature: MethodSignature) -> Self {
        self.put(MethodSlot { signature, body: None });
        self
    }

    fn put(&mut self, slot: MethodSlot<T>) {
        let same_slot = |s: &MethodSlot<T>| {
            s.signature.owner() == slot.signature.owner() && s.signature.name() == slot.signature.name()
        };
        match self.slots.iter().position(same_slot) {
            Some(index) => self.slots[index] = slot,
            None => self.slots.push(slot),
        }
    }

    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    pub fn interfaces(&self) -> &[String] {
        &self.interfaces
    }

    pub fn signatures(&self) -> impl Iterator<Item = &MethodSignature> {
        self.slots.iter().map(|slot| &slot.signature)
    }
}

/// 프록시 생성 전략
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProxyStrategy {
    #[default]
    Auto,
    Interface,
    Subclass,
}

impl ProxyStrategy {
    fn select<T: Send + Sync + 'static>(self, table: &MethodTable<T>) -> ProxyStrategy {
        match self {
            ProxyStrategy::Auto if table.interfaces().is_empty() => ProxyStrategy::Subclass,
            ProxyStrategy::Auto => ProxyStrategy::Interface,
            explicit => explicit,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Route {
    Intercepted(usize),
    Direct(usize),
    /// 같은 이름의 노출 슬롯이 여럿. `Owner::name`으로만 호출 가능
    Ambiguous,
}

/// [`Proxy`] 빌더
pub struct ProxyBuilder<T> {
    target: Arc<T>,
    table: Arc<MethodTable<T>>,
    filters: Vec<Arc<dyn Filter>>,
    strategy: ProxyStrategy,
}

impl<T: Send + Sync + 'static> ProxyBuilder<T> {
    pub fn new(target: Arc<T>, table: Arc<MethodTable<T>>) -> Self {
        Self {
            target,
            table,
            filters: Vec::new(),
            strategy: ProxyStrategy::Auto,
        }
    }

    /// 필터를 추가합니다. 추가한 순서대로 실행됩니다.
    pub fn filter<F: Filter + 'static>(mut self, filter: F) -> Self {
        self.filters.push(Arc::new(filter));
        self
    }

    pub fn filters(mut self, filters: impl IntoIterator<Item = Arc<dyn Filter>>) -> Self {
        self.filters.extend(filters);
        self
    }

    pub fn strategy(mut self, strategy: ProxyStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn build(self) -> ContainerResult<Proxy<T>> {
        let strategy = self.strategy.select(&self.table);
        let mut routes = HashMap::new();

        for (index, slot) in self.table.slots.iter().enumerate() {
            let route = match strategy {
                ProxyStrategy::Interface => {
                    if !self.table.interfaces.iter().any(|i| i == slot.signature.owner()) {
                        continue;
                    }
                    Route::Intercepted(index)
                }
                _ if slot.signature.is_sealed() => Route::Direct(index),
                _ => Route::Intercepted(index),
            };
            routes.insert(slot.signature.qualified_name(), route);
            routes
                .entry(slot.signature.name().to_string())
                .and_modify(|existing| *existing = Route::Ambiguous)
                .or_insert(route);
        }

        if !routes.values().any(|route| matches!(route, Route::Intercepted(_))) {
            let reason = match strategy {
                ProxyStrategy::Interface => "no methods declared on its interfaces",
                _ if self.table.slots.is_empty() => "no method slots",
                _ => "all methods are sealed",
            };
            return Err(ContainerError::NonProxyable {
                type_name: self.table.type_name.clone(),
                reason: reason.to_string(),
            });
        }

        let chain = FilterChain::new(self.filters);
        log::debug!(
            "Built {:?} proxy for {} with filters {:?}",
            strategy,
            self.table.type_name,
            chain.names()
        );

        Ok(Proxy {
            target: self.target,
            table: self.table,
            chain,
            strategy,
            routes: Arc::new(routes),
        })
    }
}

/// 메서드 호출을 필터 체인으로 라우팅하는 프록시
pub struct Proxy<T> {
    target: Arc<T>,
    table: Arc<MethodTable<T>>,
    chain: FilterChain,
    strategy: ProxyStrategy,
    routes: Arc<HashMap<String, Route>>,
}

impl<T> Clone for Proxy<T> {
    fn clone(&self) -> Self {
        Self {
            target: self.target.clone(),
            table: self.table.clone(),
            chain: self.chain.clone(),
            strategy: self.strategy,
            routes: self.routes.clone(),
        }
    }
}

impl<T: Send + Sync + 'static> Proxy<T> {
    /// 메서드를 호출합니다. 가로채는 메서드는 빌드 시점의 필터 순서대로 체인을 거친 뒤
    /// 마지막 단계에서 실제 본문이 실행됩니다.
    pub fn invoke(&self, method: &str, arguments: Vec<Value>) -> ContainerResult<Value> {
        let route = self.routes.get(method).copied().ok_or_else(|| ContainerError::MethodNotFound {
            type_name: self.table.type_name.clone(),
            method: method.to_string(),
        })?;

        let (index, intercepted) = match route {
            Route::Intercepted(index) => (index, true),
            Route::Direct(index) => (index, false),
            Route::Ambiguous => {
                let candidates: Vec<String> = self
                    .table
                    .signatures()
                    .filter(|signature| signature.name() == method)
                    .map(MethodSignature::qualified_name)
                    .filter(|qualified| self.routes.contains_key(qualified))
                    .collect();
                return Err(ContainerError::InvalidArgument {
                    method: method.to_string(),
                    message: format!("ambiguous method name, use one of {candidates:?}"),
                });
            }
        };
        let slot = &self.table.slots[index];
        let signature = &slot.signature;

        let expected = signature.parameters().len();
        if arguments.len() != expected {
            return Err(ContainerError::InvalidArgument {
                method: signature.to_string(),
                message: format!("expected {expected} arguments, got {}", arguments.len()),
            });
        }

        let mut invocation = Invocation::new(signature, Arguments::new(arguments));
        match &slot.body {
            Some(body) => {
                let invoker = MethodInvoker::new(self.target.as_ref(), signature, body);
                self.dispatch(intercepted, &mut invocation, &invoker)
            }
            None => self.dispatch(intercepted, &mut invocation, &EmptyInvoker::new(signature)),
        }
    }

    /// 결과를 역직렬화하여 반환합니다.
    pub fn invoke_as<R: DeserializeOwned>(&self, method: &str, arguments: Vec<Value>) -> ContainerResult<R> {
        let value = self.invoke(method, arguments)?;
        serde_json::from_value(value).map_err(|e| ContainerError::TypeMismatch {
            id: format!("{}::{}", self.table.type_name, method),
            expected: format!("{} ({e})", std::any::type_name::<R>()),
        })
    }

    fn dispatch(&self, intercepted: bool, invocation: &mut Invocation<'_>, invoker: &dyn Invoker) -> ContainerResult<Value> {
        if intercepted {
            self.chain.execute(invocation, invoker)
        } else {
            invoker.invoke(invocation.arguments())
        }
    }

    pub fn target(&self) -> &Arc<T> {
        &self.target
    }

    pub fn strategy(&self) -> ProxyStrategy {
        self.strategy
    }

    pub fn filter_names(&self) -> Vec<String> {
        self.chain.names()
    }

    /// 프록시가 노출하는 메서드 이름 (테이블 등록 순서)
    pub fn methods(&self) -> Vec<&str> {
        self.table
            .signatures()
            .filter(|signature| self.routes.contains_key(&signature.qualified_name()))
            .map(MethodSignature::name)
            .collect()
    }

    /// 메서드가 필터 체인을 거치는지 여부
    pub fn is_intercepted(&self, method: &str) -> bool {
        matches!(self.routes.get(method), Some(Route::Intercepted(_)))
    }
}
