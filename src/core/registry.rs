//! # Definition Store - 컴포넌트 정의 저장소
//!
//! 컴포넌트 정의를 id와 별칭으로 등록하고, 범위(scope) 규칙에 따라 인스턴스를 해석합니다.
//! Spring의 `DefaultListableBeanFactory`(정의 레지스트리 + 싱글톤 캐시) 역할입니다.
//!
//! ## Spring Framework와의 비교
//!
//! | Spring 개념 | 이 시스템 | 비고 |
//! |-------------|-----------|------|
//! | `registerBeanDefinition` | [`DefinitionStore::register`] | 중복 id는 `DuplicateDefinition` |
//! | `registerAlias` | [`DefinitionStore::alias`] | 다른 정의를 가리키는 별칭은 `AliasConflict` |
//! | `getBean(name)` | [`DefinitionStore::instantiate`] | |
//! | `getBean(Class)` | [`DefinitionStore::instantiate_by_type`] | 정확한 타입 우선 |
//! | `@ComponentScan` | [`DefinitionStore::scan`] | `inventory` 수집 |
//! | `preInstantiateSingletons` | [`DefinitionStore::initialize_singletons`] | |
//! | `BeanCurrentlyInCreationException` | `CircularDependency` | 생성 전에 그래프 검사 |
//!
//! ## 싱글톤 생성 규칙
//!
//! ```text
//! instantiate("orderService")
//!    ├─ 캐시 확인 (잠금 없는 fast path)
//!    ├─ 선언된 의존성 그래프 순환 검사 → CircularDependency
//!    ├─ id별 OnceCell 초기화 (동시 요청은 하나만 생성, 나머지는 대기)
//!    │    ├─ 의존성 재귀 해석
//!    │    └─ 팩토리 호출 (catch_unwind) → 실패 시 Construction, 슬롯은 비어 있음
//!    └─ 캐시된 인스턴스 반환
//! ```
//!
//! 생성 실패는 슬롯을 오염시키지 않으므로 다음 호출에서 다시 시도됩니다.
//!
//! ## 컴포넌트 스캔
//!
//! ```rust,ignore
//! fn order_repository() -> Definition {
//!     Definition::builder("orderRepository", |_| Ok(OrderRepository::default())).build()
//! }
//!
//! inventory::submit! {
//!     ComponentRegistration { name: "orderRepository", definition: order_repository }
//! }
//!
//! let store = DefinitionStore::new();
//! store.scan()?;
//! ```

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use once_cell::sync::{Lazy, OnceCell};

use crate::core::definition::{Definition, Dependencies, Instance, Scope, TypeKey};
use crate::core::errors::{ContainerError, ContainerResult};
use crate::utils::display_terminal::{
    print_boxed_title, print_final_summary, print_step_complete, print_step_start, print_sub_task,
};

/// 컴파일 타임 컴포넌트 등록 정보
///
/// `inventory::submit!`으로 제출되며 [`DefinitionStore::scan`]이 수집합니다.
pub struct ComponentRegistration {
    /// 등록 이름 (로그 출력용)
    pub name: &'static str,
    /// 정의 생성 함수
    pub definition: fn() -> Definition,
}

inventory::collect!(ComponentRegistration);

struct Entry {
    definition: Arc<Definition>,
    singleton: Arc<OnceCell<Instance>>,
}

#[derive(Default)]
struct StoreState {
    entries: HashMap<String, Entry>,
    order: Vec<String>,
    aliases: HashMap<String, String>,
}

impl StoreState {
    fn canonical<'a>(&'a self, name: &'a str) -> Option<&'a str> {
        if self.entries.contains_key(name) {
            Some(name)
        } else {
            self.aliases.get(name).map(String::as_str)
        }
    }

    fn definitions(&self) -> impl Iterator<Item = &Arc<Definition>> {
        self.order
            .iter()
            .filter_map(|id| self.entries.get(id))
            .map(|entry| &entry.definition)
    }
}

/// 정의 저장소와 싱글톤 캐시
///
/// 등록은 쓰기 잠금 아래에서 원자적으로 검증/반영되며, 조회와 인스턴스 해석은
/// 읽기 잠금만 잠깐 잡습니다. 팩토리 호출 중에는 저장소 잠금을 잡지 않습니다.
#[derive(Default)]
pub struct DefinitionStore {
    state: RwLock<StoreState>,
}

impl DefinitionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 전역 저장소. 첫 접근 시 비어 있는 상태로 생성됩니다.
    pub fn global() -> Arc<DefinitionStore> {
        GLOBAL_STORE.clone()
    }

    // 등록은 검증이 끝난 뒤에만 상태를 바꾸므로 오염된 잠금의 상태도 일관적입니다.
    // 읽기와 쓰기 모두 오염을 무시하고 진행합니다.
    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    /// 정의를 등록합니다.
    ///
    /// id 또는 별칭 중 하나라도 충돌하면 아무것도 반영하지 않고 실패합니다.
    pub fn register(&self, definition: Definition) -> ContainerResult<()> {
        let mut state = self.write();
        let id = definition.id().to_string();

        if state.entries.contains_key(&id) || state.aliases.contains_key(&id) {
            return Err(ContainerError::DuplicateDefinition(id));
        }

        for alias in definition.aliases() {
            if let Some(existing) = state.canonical(alias) {
                return Err(ContainerError::AliasConflict {
                    alias: alias.clone(),
                    existing: existing.to_string(),
                    requested: id,
                });
            }
            if *alias == id {
                return Err(ContainerError::AliasConflict {
                    alias: alias.clone(),
                    existing: id.clone(),
                    requested: id,
                });
            }
        }

        for alias in definition.aliases() {
            state.aliases.insert(alias.clone(), id.clone());
        }

        log::info!(
            "Registered definition '{}' ({}, {:?}, aliases {:?})",
            id,
            definition.type_key().name(),
            definition.scope(),
            definition.aliases()
        );

        state.order.push(id.clone());
        state.entries.insert(
            id,
            Entry {
                definition: Arc::new(definition),
                singleton: Arc::new(OnceCell::new()),
            },
        );
        Ok(())
    }

    /// 기존 정의에 별칭을 추가합니다. 같은 정의를 다시 가리키는 별칭은 무시됩니다.
    pub fn alias(&self, alias: &str, id: &str) -> ContainerResult<()> {
        let mut state = self.write();
        let target = state
            .canonical(id)
            .map(str::to_string)
            .ok_or_else(|| ContainerError::DefinitionNotFound(id.to_string()))?;

        match state.canonical(alias).map(str::to_string) {
            Some(existing) if existing == target && alias != target => Ok(()),
            Some(existing) => Err(ContainerError::AliasConflict {
                alias: alias.to_string(),
                existing,
                requested: target,
            }),
            None => {
                log::debug!("Alias '{}' -> '{}'", alias, target);
                state.aliases.insert(alias.to_string(), target);
                Ok(())
            }
        }
    }

    /// `inventory`로 수집된 모든 [`ComponentRegistration`]을 등록합니다.
    pub fn scan(&self) -> ContainerResult<usize> {
        let mut count = 0;
        for registration in inventory::iter::<ComponentRegistration> {
            self.register((registration.definition)())?;
            log::debug!("Scanned component '{}'", registration.name);
            count += 1;
        }
        log::info!("Component scan registered {} definitions", count);
        Ok(count)
    }

    /// id 또는 별칭으로 정의를 찾습니다.
    pub fn get_by_id(&self, name: &str) -> Option<Arc<Definition>> {
        let state = self.read();
        let id = state.canonical(name)?;
        state.entries.get(id).map(|entry| entry.definition.clone())
    }

    /// 타입으로 정의를 찾습니다.
    ///
    /// 구체 타입이 정확히 일치하는 정의가 하나면 그것을, 없으면 해당 capability를 구현하는
    /// 유일한 정의를 반환합니다. 후보가 둘 이상이면 `AmbiguousType`입니다.
    pub fn get_by_type(&self, key: TypeKey) -> ContainerResult<Option<Arc<Definition>>> {
        let state = self.read();

        let exact: Vec<&Arc<Definition>> = state.definitions().filter(|d| d.is_exact(key)).collect();
        let candidates: Vec<&Arc<Definition>> = if exact.is_empty() {
            state.definitions().filter(|d| d.satisfies(key)).collect()
        } else {
            exact
        };

        match candidates.as_slice() {
            [] => Ok(None),
            [single] => Ok(Some((*single).clone())),
            many => Err(ContainerError::AmbiguousType {
                type_name: key.name().to_string(),
                candidates: many.iter().map(|d| d.id().to_string()).collect(),
            }),
        }
    }

    /// 이름(id 또는 별칭)을 정의 id로 바꿉니다.
    pub fn resolve_alias(&self, name: &str) -> Option<String> {
        self.read().canonical(name).map(str::to_string)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.read().canonical(name).is_some()
    }

    /// 등록 순서대로의 정의 id 목록
    pub fn list_ids(&self) -> Vec<String> {
        self.read().order.clone()
    }

    pub fn len(&self) -> usize {
        self.read().order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn entry(&self, name: &str) -> ContainerResult<(Arc<Definition>, Arc<OnceCell<Instance>>)> {
        let state = self.read();
        state
            .canonical(name)
            .and_then(|id| state.entries.get(id))
            .map(|entry| (entry.definition.clone(), entry.singleton.clone()))
            .ok_or_else(|| ContainerError::DefinitionNotFound(name.to_string()))
    }

    /// 범위 규칙에 따라 인스턴스를 해석합니다.
    ///
    /// - Singleton: 저장소 수명 동안 한 번만 생성하여 캐시합니다.
    /// - Prototype: 호출마다 새로 생성합니다.
    pub fn instantiate(&self, name: &str) -> ContainerResult<Instance> {
        let (definition, slot) = self.entry(name)?;
        if let Some(instance) = slot.get() {
            return Ok(instance.clone());
        }

        self.check_acyclic(definition.id())?;
        let mut path = Vec::new();
        self.resolve(&definition, &slot, &mut path)
    }

    /// 인스턴스를 구체 타입 또는 선언된 capability 타입(`dyn Trait`)으로 해석합니다.
    pub fn instantiate_as<T: ?Sized + 'static>(&self, name: &str) -> ContainerResult<Arc<T>> {
        let (definition, _) = self.entry(name)?;
        let mismatch = || ContainerError::TypeMismatch {
            id: definition.id().to_string(),
            expected: std::any::type_name::<T>().to_string(),
        };

        let caster = definition.caster::<T>().ok_or_else(mismatch)?;
        let instance = self.instantiate(name)?;
        caster(instance).ok_or_else(mismatch)
    }

    /// 타입으로 정의를 찾아 인스턴스를 해석합니다.
    pub fn instantiate_by_type<T: ?Sized + 'static>(&self) -> ContainerResult<Arc<T>> {
        let key = TypeKey::of::<T>();
        let definition = self
            .get_by_type(key)?
            .ok_or_else(|| ContainerError::DefinitionNotFound(key.name().to_string()))?;
        self.instantiate_as::<T>(definition.id())
    }

    /// 모든 싱글톤을 등록 순서대로 미리 생성합니다.
    ///
    /// 실패한 정의가 있어도 나머지를 계속 시도하고, 첫 번째 에러를 반환합니다.
    pub fn initialize_singletons(&self) -> ContainerResult<usize> {
        print_boxed_title("🔄 INITIALIZING CONTAINER");

        let definitions: Vec<Arc<Definition>> = self.read().definitions().cloned().collect();
        let mut created = 0;
        let mut prototypes = 0;
        let mut failed = 0;
        let mut first_error = None;

        print_step_start(1, "Creating singleton instances");
        for definition in definitions {
            if definition.scope() == Scope::Prototype {
                prototypes += 1;
                print_sub_task(definition.id(), "prototype (created on demand)");
                continue;
            }

            match self.instantiate(definition.id()) {
                Ok(_) => {
                    created += 1;
                    print_sub_task(definition.id(), "✓ Created");
                }
                Err(error) => {
                    failed += 1;
                    print_sub_task(definition.id(), &format!("✗ {error}"));
                    log::error!("Failed to pre-instantiate '{}': {}", definition.id(), error);
                    first_error.get_or_insert(error);
                }
            }
        }
        print_step_complete(1, "Singleton instances created", created);
        print_final_summary(created, prototypes, failed);

        match first_error {
            Some(error) => Err(error),
            None => Ok(created),
        }
    }

    /// 선언된 의존성 그래프에서 `id`로부터 도달 가능한 순환을 찾습니다.
    ///
    /// 싱글톤 슬롯을 잠그기 전에 검사하므로 순환이 교착 상태로 이어지지 않습니다.
    /// 등록되지 않은 의존성은 여기서 무시하고 생성 시점에 `DefinitionNotFound`로 보고합니다.
    fn check_acyclic(&self, id: &str) -> ContainerResult<()> {
        let state = self.read();
        let mut visiting = Vec::new();
        let mut done = HashSet::new();
        Self::visit(&state, id, &mut visiting, &mut done)
    }

    fn visit(
        state: &StoreState,
        name: &str,
        visiting: &mut Vec<String>,
        done: &mut HashSet<String>,
    ) -> ContainerResult<()> {
        let Some(id) = state.canonical(name) else {
            return Ok(());
        };
        if done.contains(id) {
            return Ok(());
        }
        if let Some(start) = visiting.iter().position(|v| v == id) {
            let mut path = visiting[start..].to_vec();
            path.push(id.to_string());
            return Err(ContainerError::CircularDependency { path });
        }
        let Some(entry) = state.entries.get(id) else {
            return Ok(());
        };

        visiting.push(id.to_string());
        for dependency in entry.definition.dependencies() {
            Self::visit(state, dependency, visiting, done)?;
        }
        visiting.pop();
        done.insert(id.to_string());
        Ok(())
    }

    fn resolve(
        &self,
        definition: &Arc<Definition>,
        slot: &OnceCell<Instance>,
        path: &mut Vec<String>,
    ) -> ContainerResult<Instance> {
        let id = definition.id();
        if let Some(start) = path.iter().position(|p| p == id) {
            let mut cycle = path[start..].to_vec();
            cycle.push(id.to_string());
            return Err(ContainerError::CircularDependency { path: cycle });
        }

        path.push(id.to_string());
        let result = match definition.scope() {
            Scope::Singleton => slot.get_or_try_init(|| self.construct(definition, path)).cloned(),
            Scope::Prototype => self.construct(definition, path),
        };
        path.pop();
        result
    }

    fn construct(&self, definition: &Definition, path: &mut Vec<String>) -> ContainerResult<Instance> {
        let mut resolved = Vec::with_capacity(definition.dependencies().len());
        for name in definition.dependencies() {
            let (dependency, slot) = self.entry(name)?;
            let instance = match slot.get() {
                Some(cached) => cached.clone(),
                None => self.resolve(&dependency, &slot, path)?,
            };
            resolved.push((name.clone(), instance));
        }

        let dependencies = Dependencies::new(resolved);
        match catch_unwind(AssertUnwindSafe(|| definition.construct(&dependencies))) {
            Ok(Ok(instance)) => {
                log::debug!("Constructed '{}' ({:?})", definition.id(), definition.scope());
                Ok(instance)
            }
            Ok(Err(error)) => Err(ContainerError::Construction {
                id: definition.id().to_string(),
                message: error.to_string(),
            }),
            Err(payload) => Err(ContainerError::Construction {
                id: definition.id().to_string(),
                message: format!("factory panicked: {}", panic_message(payload.as_ref())),
            }),
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|message| message.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic payload".to_string())
}

/// 전역 정의 저장소
///
/// `Lazy<T>`로 첫 접근 시에만 생성되며 애플리케이션 전체에서 같은 인스턴스를 씁니다.
static GLOBAL_STORE: Lazy<Arc<DefinitionStore>> = Lazy::new(|| Arc::new(DefinitionStore::new()));

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Barrier;
    use std::thread;
    use std::time::Duration;

    trait Repository: Send + Sync {
        fn table(&self) -> &str;
    }

    struct OrderRepository;

    impl Repository for OrderRepository {
        fn table(&self) -> &str {
            "orders"
        }
    }

    struct AuditRepository;

    impl Repository for AuditRepository {
        fn table(&self) -> &str {
            "audit"
        }
    }

    struct OrderService {
        repository: Arc<OrderRepository>,
    }

    fn order_repository() -> Definition {
        Definition::builder("orderRepository", |_| Ok(OrderRepository))
            .alias("orders")
            .implements::<dyn Repository, _>(|r| r)
            .build()
    }

    #[test]
    fn test_list_ids_in_registration_order() {
        let store = DefinitionStore::new();
        for id in ["c", "a", "b"] {
            store.register(Definition::builder(id, |_| Ok(0u8)).build()).unwrap();
        }

        assert_eq!(store.list_ids(), vec!["c", "a", "b"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_poisoned_lock_still_serves_reads_and_writes() {
        let store = Arc::new(DefinitionStore::new());
        store.register(order_repository()).unwrap();

        let poisoner = store.clone();
        let result = thread::spawn(move || {
            let _state = poisoner.state.write().unwrap();
            panic!("poison the store lock");
        })
        .join();
        assert!(result.is_err());
        assert!(store.state.is_poisoned());

        store.register(Definition::builder("auditRepository", |_| Ok(AuditRepository)).build()).unwrap();
        store.alias("audit", "auditRepository").unwrap();

        assert!(store.contains("orders"));
        assert_eq!(store.list_ids(), vec!["orderRepository", "auditRepository"]);
        assert!(matches!(
            store.alias("audit", "orderRepository"),
            Err(ContainerError::AliasConflict { .. })
        ));
    }

    #[test]
    fn test_duplicate_registration_leaves_store_unchanged() {
        let store = DefinitionStore::new();
        store.register(order_repository()).unwrap();

        let duplicate = Definition::builder("orderRepository", |_| Ok(AuditRepository))
            .alias("audit")
            .build();
        let result = store.register(duplicate);

        assert!(matches!(result, Err(ContainerError::DuplicateDefinition(id)) if id == "orderRepository"));
        assert_eq!(store.list_ids(), vec!["orderRepository"]);
        assert!(!store.contains("audit"));
        assert!(store.instantiate_as::<OrderRepository>("orders").is_ok());
    }

    #[test]
    fn test_alias_conflict_rejects_whole_definition() {
        let store = DefinitionStore::new();
        store.register(order_repository()).unwrap();

        let conflicting = Definition::builder("auditRepository", |_| Ok(AuditRepository))
            .alias("audit")
            .alias("orders")
            .build();

        match store.register(conflicting) {
            Err(ContainerError::AliasConflict { alias, existing, requested }) => {
                assert_eq!(alias, "orders");
                assert_eq!(existing, "orderRepository");
                assert_eq!(requested, "auditRepository");
            }
            other => panic!("Expected AliasConflict, got {other:?}"),
        }
        assert!(!store.contains("auditRepository"));
        assert!(!store.contains("audit"));
    }

    #[test]
    fn test_explicit_alias() {
        let store = DefinitionStore::new();
        store.register(order_repository()).unwrap();
        store.register(Definition::builder("other", |_| Ok(1u8)).build()).unwrap();

        store.alias("repo", "orders").unwrap();
        store.alias("repo", "orderRepository").unwrap();

        assert_eq!(store.resolve_alias("repo").as_deref(), Some("orderRepository"));
        assert_eq!(store.resolve_alias("orderRepository").as_deref(), Some("orderRepository"));
        assert!(matches!(store.alias("repo", "other"), Err(ContainerError::AliasConflict { .. })));
        assert!(matches!(store.alias("x", "missing"), Err(ContainerError::DefinitionNotFound(_))));
    }

    #[test]
    fn test_concurrent_singleton_constructed_once() {
        let store = Arc::new(DefinitionStore::new());
        let constructions = Arc::new(AtomicUsize::new(0));
        let counter = constructions.clone();
        store
            .register(
                Definition::builder("slow", move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(20));
                    Ok(String::from("singleton"))
                })
                .build(),
            )
            .unwrap();

        let barrier = Arc::new(Barrier::new(8));
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                let barrier = barrier.clone();
                thread::spawn(move || {
                    barrier.wait();
                    store.instantiate_as::<String>("slow").unwrap()
                })
            })
            .collect();
        let instances: Vec<Arc<String>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert_eq!(constructions.load(Ordering::SeqCst), 1);
        assert!(instances.iter().all(|i| Arc::ptr_eq(i, &instances[0])));
    }

    #[test]
    fn test_prototype_yields_distinct_instances() {
        let store = DefinitionStore::new();
        store
            .register(Definition::builder("request", |_| Ok(Vec::<u8>::new())).prototype().build())
            .unwrap();

        let instances: Vec<Arc<Vec<u8>>> = (0..5)
            .map(|_| store.instantiate_as::<Vec<u8>>("request").unwrap())
            .collect();

        for (i, a) in instances.iter().enumerate() {
            for b in &instances[i + 1..] {
                assert!(!Arc::ptr_eq(a, b));
            }
        }
    }

    #[test]
    fn test_dependencies_are_injected() {
        let store = DefinitionStore::new();
        store.register(order_repository()).unwrap();
        store
            .register(
                Definition::builder("orderService", |deps| {
                    Ok(OrderService {
                        repository: deps.get::<OrderRepository>("orders")?,
                    })
                })
                .depends_on("orders")
                .build(),
            )
            .unwrap();

        let service = store.instantiate_as::<OrderService>("orderService").unwrap();
        let repository = store.instantiate_as::<OrderRepository>("orderRepository").unwrap();

        assert!(Arc::ptr_eq(&service.repository, &repository));
    }

    #[test]
    fn test_circular_dependency_is_reported_with_path() {
        let store = DefinitionStore::new();
        store
            .register(Definition::builder("a", |_| Ok(1u8)).depends_on("b").build())
            .unwrap();
        store
            .register(Definition::builder("b", |_| Ok(2u8)).depends_on("a").prototype().build())
            .unwrap();
        store
            .register(Definition::builder("root", |_| Ok(0u8)).depends_on("a").build())
            .unwrap();

        match store.instantiate("root") {
            Err(ContainerError::CircularDependency { path }) => assert_eq!(path, vec!["a", "b", "a"]),
            other => panic!("Expected CircularDependency, got {other:?}"),
        }
        assert!(matches!(store.instantiate("b"), Err(ContainerError::CircularDependency { .. })));
    }

    #[test]
    fn test_self_dependency_is_circular() {
        let store = DefinitionStore::new();
        store
            .register(Definition::builder("me", |_| Ok(1u8)).depends_on("me").build())
            .unwrap();

        match store.instantiate("me") {
            Err(ContainerError::CircularDependency { path }) => assert_eq!(path, vec!["me", "me"]),
            other => panic!("Expected CircularDependency, got {other:?}"),
        }
    }

    #[test]
    fn test_failed_construction_is_retried() {
        let store = DefinitionStore::new();
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        store
            .register(
                Definition::builder("flaky", move |_| {
                    if counter.fetch_add(1, Ordering::SeqCst) == 0 {
                        return Err("connection refused".into());
                    }
                    Ok(42u32)
                })
                .build(),
            )
            .unwrap();

        assert!(matches!(store.instantiate("flaky"), Err(ContainerError::Construction { .. })));
        assert_eq!(*store.instantiate_as::<u32>("flaky").unwrap(), 42);
        assert_eq!(*store.instantiate_as::<u32>("flaky").unwrap(), 42);
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_factory_panic_becomes_construction_error() {
        let store = DefinitionStore::new();
        store
            .register(
                Definition::builder("broken", |_| -> Result<u8, crate::core::errors::BoxError> {
                    panic!("factory exploded")
                })
                .build(),
            )
            .unwrap();

        match store.instantiate("broken") {
            Err(ContainerError::Construction { id, message }) => {
                assert_eq!(id, "broken");
                assert!(message.contains("factory exploded"));
            }
            other => panic!("Expected Construction, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_dependency_is_not_found() {
        let store = DefinitionStore::new();
        store
            .register(Definition::builder("svc", |_| Ok(1u8)).depends_on("ghost").build())
            .unwrap();

        assert!(matches!(
            store.instantiate("svc"),
            Err(ContainerError::DefinitionNotFound(name)) if name == "ghost"
        ));
    }

    #[test]
    fn test_get_by_type_prefers_exact_match() {
        let store = DefinitionStore::new();
        store.register(order_repository()).unwrap();
        store
            .register(
                Definition::builder("auditRepository", |_| Ok(AuditRepository))
                    .implements::<dyn Repository, _>(|r| r)
                    .build(),
            )
            .unwrap();

        let exact = store.get_by_type(TypeKey::of::<AuditRepository>()).unwrap().unwrap();
        assert_eq!(exact.id(), "auditRepository");

        match store.get_by_type(TypeKey::of::<dyn Repository>()) {
            Err(ContainerError::AmbiguousType { candidates, .. }) => {
                assert_eq!(candidates, vec!["orderRepository", "auditRepository"])
            }
            other => panic!("Expected AmbiguousType, got {other:?}"),
        }
        assert!(store.get_by_type(TypeKey::of::<OrderService>()).unwrap().is_none());
    }

    #[test]
    fn test_instantiate_by_capability_type() {
        let store = DefinitionStore::new();
        store.register(order_repository()).unwrap();

        let repository = store.instantiate_by_type::<dyn Repository>().unwrap();
        assert_eq!(repository.table(), "orders");

        assert!(matches!(
            store.instantiate_as::<AuditRepository>("orders"),
            Err(ContainerError::TypeMismatch { .. })
        ));
    }

    #[test]
    fn test_initialize_singletons_reports_first_failure() {
        let store = DefinitionStore::new();
        store.register(order_repository()).unwrap();
        store
            .register(Definition::builder("request", |_| Ok(0u8)).prototype().build())
            .unwrap();
        store
            .register(Definition::builder("bad", |_| Ok(0u8)).depends_on("ghost").build())
            .unwrap();

        assert!(matches!(
            store.initialize_singletons(),
            Err(ContainerError::DefinitionNotFound(_))
        ));
        store.register(Definition::builder("ghost", |_| Ok(1u8)).build()).unwrap();
        assert_eq!(store.initialize_singletons().unwrap(), 3);
    }

    fn scanned_component() -> Definition {
        Definition::builder("scannedComponent", |_| Ok(String::from("scanned")))
            .alias("scanned")
            .build()
    }

    inventory::submit! {
        ComponentRegistration {
            name: "scannedComponent",
            definition: scanned_component,
        }
    }

    #[test]
    fn test_scan_registers_collected_components() {
        let store = DefinitionStore::new();

        let count = store.scan().unwrap();

        assert!(count >= 1);
        assert!(store.contains("scanned"));
        assert_eq!(*store.instantiate_as::<String>("scannedComponent").unwrap(), "scanned");
        assert!(matches!(store.scan(), Err(ContainerError::DuplicateDefinition(_))));
    }
}
