//! # Container - 외부 협력자를 위한 진입점
//!
//! 웹/MVC, ORM, RPC 계층이 사용하는 계약 표면을 한곳에 모은 파사드입니다.
//!
//! | 용도 | 메서드 |
//! |------|--------|
//! | 정의 조회 | [`Container::get_definition`], [`Container::get_definition_by_type`], [`Container::contains_definition`], [`Container::definition_ids`] |
//! | 인스턴스 해석 | [`Container::resolve`], [`Container::resolve_as`], [`Container::resolve_by_type`] |
//! | 프록시 생성 | [`Container::build_proxy`], [`Container::resolve_proxy`] |
//! | 트랜잭션 경계 | [`Container::run_in_transaction`], [`Container::run_in_transaction_async`] |
//! | 컨텍스트 | [`Container::current_context`] |
//!
//! ```rust,ignore
//! let container = Container::new().with_transactions(coordinator);
//! container.register(order_service_definition())?;
//!
//! let proxy = container.resolve_proxy::<OrderService>("orderService")?;
//! let id: u64 = proxy.invoke_as("place", vec![json!("sku-1")])?;
//! ```

use std::future::Future;
use std::sync::Arc;

use crate::aop::chain::Filter;
use crate::aop::proxy::{MethodTable, Proxy, ProxyBuilder};
use crate::config::ContainerConfig;
use crate::context::{self, Context};
use crate::core::definition::{Definition, FilterComponent, FilterSpec, Instance, TypeKey};
use crate::core::errors::{ContainerError, ContainerResult};
use crate::core::registry::DefinitionStore;
use crate::transaction::{TransactionCoordinator, TransactionDefinition};

/// 정의 저장소 + 트랜잭션 코디네이터 파사드
#[derive(Clone)]
pub struct Container {
    store: Arc<DefinitionStore>,
    coordinator: Option<Arc<TransactionCoordinator>>,
}

impl Default for Container {
    fn default() -> Self {
        Self::new()
    }
}

impl Container {
    /// 비어 있는 전용 저장소를 쓰는 컨테이너
    pub fn new() -> Self {
        Self::with_store(Arc::new(DefinitionStore::new()))
    }

    /// 전역 저장소([`DefinitionStore::global`])를 쓰는 컨테이너
    pub fn global() -> Self {
        Self::with_store(DefinitionStore::global())
    }

    pub fn with_store(store: Arc<DefinitionStore>) -> Self {
        Self {
            store,
            coordinator: None,
        }
    }

    pub fn with_transactions(mut self, coordinator: Arc<TransactionCoordinator>) -> Self {
        self.coordinator = Some(coordinator);
        self
    }

    pub fn store(&self) -> &Arc<DefinitionStore> {
        &self.store
    }

    pub fn register(&self, definition: Definition) -> ContainerResult<()> {
        self.store.register(definition)
    }

    /// 컴포넌트 스캔 후, `CONTAINER_EAGER_INIT`이 켜져 있으면 싱글톤을 미리 생성합니다.
    pub fn start(&self) -> ContainerResult<usize> {
        let scanned = self.store.scan()?;
        if ContainerConfig::eager_init() {
            self.store.initialize_singletons()?;
        }
        Ok(scanned)
    }

    // ---- 정의 조회 ----

    pub fn get_definition(&self, name: &str) -> ContainerResult<Arc<Definition>> {
        self.store
            .get_by_id(name)
            .ok_or_else(|| ContainerError::DefinitionNotFound(name.to_string()))
    }

    pub fn get_definition_by_type<T: ?Sized + 'static>(&self) -> ContainerResult<Arc<Definition>> {
        let key = TypeKey::of::<T>();
        self.store
            .get_by_type(key)?
            .ok_or_else(|| ContainerError::DefinitionNotFound(key.name().to_string()))
    }

    pub fn contains_definition(&self, name: &str) -> bool {
        self.store.contains(name)
    }

    pub fn definition_ids(&self) -> Vec<String> {
        self.store.list_ids()
    }

    // ---- 인스턴스 해석 ----

    pub fn resolve(&self, name: &str) -> ContainerResult<Instance> {
        self.store.instantiate(name)
    }

    pub fn resolve_as<T: ?Sized + 'static>(&self, name: &str) -> ContainerResult<Arc<T>> {
        self.store.instantiate_as::<T>(name)
    }

    pub fn resolve_by_type<T: ?Sized + 'static>(&self) -> ContainerResult<Arc<T>> {
        self.store.instantiate_by_type::<T>()
    }

    // ---- 프록시 ----

    /// 필터 명세를 실제 필터 목록으로 해석합니다. 이름 참조는 [`FilterComponent`] 정의여야 합니다.
    pub fn resolve_filters(&self, specs: &[FilterSpec]) -> ContainerResult<Vec<Arc<dyn Filter>>> {
        specs
            .iter()
            .map(|spec| match spec {
                FilterSpec::Inline(filter) => Ok(filter.clone()),
                FilterSpec::Named(name) => self
                    .store
                    .instantiate_as::<FilterComponent>(name)
                    .map(|component| component.0.clone()),
            })
            .collect()
    }

    /// 대상 인스턴스와 필터 명세로 프록시를 만듭니다.
    pub fn build_proxy<T: Send + Sync + 'static>(
        &self,
        target: Arc<T>,
        table: Arc<MethodTable<T>>,
        filters: &[FilterSpec],
    ) -> ContainerResult<Proxy<T>> {
        let filters = self.resolve_filters(filters)?;
        ProxyBuilder::new(target, table).filters(filters).build()
    }

    /// 정의에 연결된 메서드 테이블과 필터 명세로 프록시를 만듭니다.
    pub fn resolve_proxy<T: Send + Sync + 'static>(&self, name: &str) -> ContainerResult<Proxy<T>> {
        let definition = self.get_definition(name)?;
        if !definition.is_exact(TypeKey::of::<T>()) {
            return Err(ContainerError::TypeMismatch {
                id: definition.id().to_string(),
                expected: std::any::type_name::<T>().to_string(),
            });
        }

        let table = definition
            .method_table::<T>()
            .ok_or_else(|| ContainerError::NonProxyable {
                type_name: definition.type_key().name().to_string(),
                reason: format!("definition '{}' has no method table", definition.id()),
            })?;
        let target = self.resolve_as::<T>(name)?;
        self.build_proxy(target, table, definition.filters())
    }

    // ---- 트랜잭션 / 컨텍스트 ----

    pub fn coordinator(&self) -> ContainerResult<&Arc<TransactionCoordinator>> {
        self.coordinator
            .as_ref()
            .ok_or_else(|| ContainerError::Internal("no transaction coordinator configured".to_string()))
    }

    pub fn run_in_transaction<T, E, F>(&self, definition: &TransactionDefinition, body: F) -> Result<T, E>
    where
        E: From<ContainerError>,
        F: FnOnce() -> Result<T, E>,
    {
        self.coordinator()?.execute(definition, body)
    }

    pub async fn run_in_transaction_async<T, E, Fut>(
        &self,
        definition: &TransactionDefinition,
        body: Fut,
    ) -> Result<T, E>
    where
        E: From<ContainerError>,
        Fut: Future<Output = Result<T, E>>,
    {
        self.coordinator()?.execute_async(definition, body).await
    }

    pub fn current_context(&self) -> Option<Arc<Context>> {
        context::current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use serde_json::{json, Value};
    use crate::aop::chain::Next;
    use crate::aop::invocation::{Invocation, MethodSignature};
    use crate::aop::filters::TransactionFilter;
    use crate::transaction::{current_transaction, IsolationPolicy, MemoryResource};

    struct Greeter {
        greeting: String,
    }

    struct Tag {
        label: &'static str,
        seen: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Filter for Tag {
        fn name(&self) -> &str {
            self.label
        }

        fn invoke(&self, invocation: &mut Invocation<'_>, next: &Next<'_>) -> ContainerResult<Value> {
            self.seen.lock().unwrap().push(self.label);
            next.proceed(invocation)
        }
    }

    fn greeter_table() -> MethodTable<Greeter> {
        MethodTable::new("Greeter")
            .implements("Greeting")
            .method(
                MethodSignature::new("Greeting", "greet").param("String").returns("String"),
                |g: &Greeter, args| Ok(format!("{}, {}", g.greeting, args.get::<String>(0)?)),
            )
    }

    #[test]
    fn test_resolve_proxy_uses_named_and_inline_filters_in_order() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let container = Container::new();
        container
            .register(
                Definition::filter("auditFilter", Tag { label: "audit", seen: seen.clone() })
                    .alias("audit")
                    .build(),
            )
            .unwrap();
        container
            .register(
                Definition::builder("greeter", |_| Ok(Greeter { greeting: "hello".into() }))
                    .methods(greeter_table())
                    .filter(FilterSpec::named("audit"))
                    .filter(FilterSpec::inline(Tag { label: "inline", seen: seen.clone() }))
                    .build(),
            )
            .unwrap();

        let proxy = container.resolve_proxy::<Greeter>("greeter").unwrap();
        let greeting: String = proxy.invoke_as("greet", vec![json!("world")]).unwrap();

        assert_eq!(greeting, "hello, world");
        assert_eq!(*seen.lock().unwrap(), vec!["audit", "inline"]);
        assert_eq!(proxy.filter_names(), vec!["audit", "inline"]);
        assert!(Arc::ptr_eq(proxy.target(), &container.resolve_as::<Greeter>("greeter").unwrap()));
    }

    #[test]
    fn test_resolve_proxy_requires_method_table() {
        let container = Container::new();
        container
            .register(Definition::builder("plain", |_| Ok(Greeter { greeting: "hi".into() })).build())
            .unwrap();

        assert!(matches!(
            container.resolve_proxy::<Greeter>("plain"),
            Err(ContainerError::NonProxyable { .. })
        ));
        assert!(matches!(
            container.resolve_proxy::<String>("plain"),
            Err(ContainerError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_unknown_named_filter_is_reported() {
        let container = Container::new();
        let result = container.build_proxy(
            Arc::new(Greeter { greeting: "hi".into() }),
            Arc::new(greeter_table()),
            &[FilterSpec::named("missing")],
        );

        assert!(matches!(result, Err(ContainerError::DefinitionNotFound(name)) if name == "missing"));
    }

    #[test]
    fn test_registry_query_surface() {
        let container = Container::new();
        container
            .register(Definition::builder("greeter", |_| Ok(Greeter { greeting: "hi".into() })).alias("g").build())
            .unwrap();

        assert!(container.contains_definition("g"));
        assert_eq!(container.get_definition("g").unwrap().id(), "greeter");
        assert_eq!(container.get_definition_by_type::<Greeter>().unwrap().id(), "greeter");
        assert_eq!(container.definition_ids(), vec!["greeter"]);
        assert_eq!(container.resolve_by_type::<Greeter>().unwrap().greeting, "hi");
        assert!(matches!(container.get_definition("nope"), Err(ContainerError::DefinitionNotFound(_))));
    }

    #[test]
    fn test_run_in_transaction_requires_coordinator() {
        let container = Container::new();

        let result = container.run_in_transaction(&TransactionDefinition::required(), || Ok::<_, ContainerError>(()));

        assert!(matches!(result, Err(ContainerError::Internal(_))));
    }

    #[test]
    fn test_transactional_proxy_from_definition() {
        let resource = Arc::new(MemoryResource::new());
        let coordinator = Arc::new(TransactionCoordinator::new(resource.clone()).with_policy(IsolationPolicy::Inherit));
        let container = Container::new().with_transactions(coordinator.clone());

        let store = resource.clone();
        container
            .register(
                Definition::filter("txFilter", TransactionFilter::new(coordinator)).build(),
            )
            .unwrap();
        container
            .register(
                Definition::builder("greeter", |_| Ok(Greeter { greeting: "hello".into() }))
                    .methods(greeter_table().method(
                        MethodSignature::new("Greeting", "remember").param("String"),
                        move |_: &Greeter, args| {
                            assert!(current_transaction().is_some());
                            Ok(store.put(args.get::<String>(0)?, json!(true))?)
                        },
                    ))
                    .filter(FilterSpec::named("txFilter"))
                    .build(),
            )
            .unwrap();

        let proxy = container.resolve_proxy::<Greeter>("greeter").unwrap();
        proxy.invoke("remember", vec![json!("alice")]).unwrap();

        assert_eq!(resource.committed_value("alice"), Some(json!(true)));

        let outer = container
            .run_in_transaction(&TransactionDefinition::required(), || {
                Ok::<_, ContainerError>(container.current_context().is_some())
            })
            .unwrap();
        assert!(outer);
        assert!(container.current_context().is_none());
    }
}
