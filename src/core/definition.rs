//! # Component Definitions
//!
//! 하나의 컴포넌트를 어떻게 생성하고 어떤 범위로 관리할지 기술하는 메타데이터입니다.
//! Spring의 `BeanDefinition`에 해당하며, 어노테이션 스캔 대신 빌더로 명시적으로 구성합니다.
//!
//! ```rust,ignore
//! let definition = Definition::builder("orderService", |deps| {
//!         Ok(OrderService::new(deps.get::<OrderRepository>("orderRepository")?))
//!     })
//!     .scope(Scope::Singleton)
//!     .alias("orders")
//!     .depends_on("orderRepository")
//!     .implements::<dyn OrderApi, _>(|svc| svc)
//!     .filter(FilterSpec::named("txFilter"))
//!     .build();
//! ```

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use serde::{Deserialize, Serialize};

use crate::aop::chain::Filter;
use crate::aop::proxy::MethodTable;
use crate::core::errors::{BoxError, ContainerError, ContainerResult};

/// 컨테이너가 관리하는 타입 소거된 인스턴스
pub type Instance = Arc<dyn Any + Send + Sync>;

/// 팩토리 함수. 선언된 의존성이 모두 해석된 뒤 호출됩니다.
pub type Factory = Arc<dyn Fn(&Dependencies) -> Result<Instance, BoxError> + Send + Sync>;

/// 인스턴스를 특정 타입(구체 타입 또는 `dyn Trait`)으로 변환하는 함수
pub(crate) type Caster<I> = Arc<dyn Fn(Instance) -> Option<Arc<I>> + Send + Sync>;

/// 타입 식별자 (`TypeId` + 사람이 읽을 수 있는 이름)
///
/// `dyn Trait` 같은 unsized 타입에도 사용할 수 있어 capability 조회의 키가 됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TypeKey {
    id: TypeId,
    name: &'static str,
}

impl TypeKey {
    pub fn of<T: ?Sized + 'static>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl fmt::Display for TypeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// 인스턴스 범위
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Scope {
    /// 저장소 수명 동안 최대 한 번 생성되어 캐시됨
    #[default]
    Singleton,
    /// 해석 요청마다 새로 생성됨
    Prototype,
}

/// 프록시에 적용할 인터셉션 명세
#[derive(Clone)]
pub enum FilterSpec {
    /// 필터 인스턴스를 직접 지정
    Inline(Arc<dyn Filter>),
    /// 저장소에 등록된 필터 정의를 이름(또는 별칭)으로 참조
    Named(String),
}

impl FilterSpec {
    pub fn inline<F: Filter + 'static>(filter: F) -> Self {
        FilterSpec::Inline(Arc::new(filter))
    }

    pub fn named(name: impl Into<String>) -> Self {
        FilterSpec::Named(name.into())
    }
}

impl fmt::Debug for FilterSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterSpec::Inline(filter) => write!(f, "Inline({})", filter.name()),
            FilterSpec::Named(name) => write!(f, "Named({name})"),
        }
    }
}

/// 필터를 저장소에 컴포넌트로 등록할 때 사용하는 래퍼
///
/// `FilterSpec::Named`는 이 타입의 인스턴스로 해석됩니다.
#[derive(Clone)]
pub struct FilterComponent(pub Arc<dyn Filter>);

/// 팩토리에 전달되는 해석 완료된 의존성 목록
pub struct Dependencies {
    resolved: Vec<(String, Instance)>,
}

impl Dependencies {
    pub(crate) fn new(resolved: Vec<(String, Instance)>) -> Self {
        Self { resolved }
    }

    /// 선언된 의존성을 구체 타입으로 가져옵니다.
    pub fn get<T: Any + Send + Sync>(&self, id: &str) -> ContainerResult<Arc<T>> {
        let instance = self
            .instance(id)
            .ok_or_else(|| ContainerError::DefinitionNotFound(id.to_string()))?;
        instance
            .clone()
            .downcast::<T>()
            .map_err(|_| ContainerError::TypeMismatch {
                id: id.to_string(),
                expected: std::any::type_name::<T>().to_string(),
            })
    }

    pub fn instance(&self, id: &str) -> Option<&Instance> {
        self.resolved
            .iter()
            .find(|(dep_id, _)| dep_id == id)
            .map(|(_, instance)| instance)
    }

    pub fn len(&self) -> usize {
        self.resolved.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resolved.is_empty()
    }
}

/// 하나의 해석 가능한 컴포넌트 정의
///
/// 등록 후에는 변경할 수 없습니다. 특히 `type_key`는 등록 시점에 고정됩니다.
pub struct Definition {
    id: String,
    type_key: TypeKey,
    implements: Vec<TypeKey>,
    scope: Scope,
    aliases: Vec<String>,
    filters: Vec<FilterSpec>,
    dependencies: Vec<String>,
    factory: Factory,
    casters: HashMap<TypeKey, Arc<dyn Any + Send + Sync>>,
    methods: Option<Arc<dyn Any + Send + Sync>>,
}

impl Definition {
    /// 구체 타입 `T`를 생성하는 정의 빌더를 시작합니다.
    pub fn builder<T, F>(id: impl Into<String>, factory: F) -> DefinitionBuilder<T>
    where
        T: Any + Send + Sync,
        F: Fn(&Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        DefinitionBuilder::new(id.into(), factory)
    }

    /// 이미 만들어진 인스턴스를 싱글톤으로 노출하는 정의
    ///
    /// Spring의 `registerSingleton()`과 같은 역할입니다.
    pub fn instance<T: Any + Send + Sync>(id: impl Into<String>, instance: Arc<T>) -> DefinitionBuilder<T> {
        let id = id.into();
        let mut builder = DefinitionBuilder::<T>::empty(id);
        builder.factory = Arc::new(move |_| Ok(instance.clone() as Instance));
        builder
    }

    /// 필터를 이름으로 참조할 수 있도록 등록하는 정의
    pub fn filter<F: Filter + 'static>(id: impl Into<String>, filter: F) -> DefinitionBuilder<FilterComponent> {
        Definition::instance(id, Arc::new(FilterComponent(Arc::new(filter))))
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn type_key(&self) -> TypeKey {
        self.type_key
    }

    pub fn implements(&self) -> &[TypeKey] {
        &self.implements
    }

    /// `key`가 이 정의의 구체 타입과 정확히 일치하는지
    pub fn is_exact(&self, key: TypeKey) -> bool {
        self.type_key == key
    }

    /// 구체 타입 또는 선언된 capability 중 하나로 `key`를 만족하는지
    pub fn satisfies(&self, key: TypeKey) -> bool {
        self.is_exact(key) || self.implements.contains(&key)
    }

    pub fn scope(&self) -> Scope {
        self.scope
    }

    pub fn aliases(&self) -> &[String] {
        &self.aliases
    }

    pub fn filters(&self) -> &[FilterSpec] {
        &self.filters
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub(crate) fn construct(&self, dependencies: &Dependencies) -> Result<Instance, BoxError> {
        (self.factory)(dependencies)
    }

    pub(crate) fn caster<I: ?Sized + 'static>(&self) -> Option<Caster<I>> {
        self.casters
            .get(&TypeKey::of::<I>())
            .and_then(|caster| caster.downcast_ref::<Caster<I>>())
            .cloned()
    }

    pub(crate) fn method_table<T: Send + Sync + 'static>(&self) -> Option<Arc<MethodTable<T>>> {
        self.methods
            .clone()
            .and_then(|table| table.downcast::<MethodTable<T>>().ok())
    }
}

impl fmt::Debug for Definition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Definition")
            .field("id", &self.id)
            .field("type", &self.type_key.name())
            .field("scope", &self.scope)
            .field("aliases", &self.aliases)
            .field("filters", &self.filters)
            .field("dependencies", &self.dependencies)
            .finish()
    }
}

/// [`Definition`] 빌더
pub struct DefinitionBuilder<T> {
    id: String,
    scope: Scope,
    aliases: Vec<String>,
    filters: Vec<FilterSpec>,
    dependencies: Vec<String>,
    implements: Vec<TypeKey>,
    casters: HashMap<TypeKey, Arc<dyn Any + Send + Sync>>,
    methods: Option<Arc<dyn Any + Send + Sync>>,
    factory: Factory,
    _marker: std::marker::PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> DefinitionBuilder<T> {
    fn new<F>(id: String, factory: F) -> Self
    where
        F: Fn(&Dependencies) -> Result<T, BoxError> + Send + Sync + 'static,
    {
        let mut builder = Self::empty(id);
        builder.factory = Arc::new(move |deps| factory(deps).map(|value| Arc::new(value) as Instance));
        builder
    }

    fn empty(id: String) -> Self {
        let mut casters: HashMap<TypeKey, Arc<dyn Any + Send + Sync>> = HashMap::new();
        let exact: Caster<T> = Arc::new(|instance: Instance| instance.downcast::<T>().ok());
        casters.insert(TypeKey::of::<T>(), Arc::new(exact));

        let unset_id = id.clone();
        Self {
            id,
            scope: Scope::Singleton,
            aliases: Vec::new(),
            filters: Vec::new(),
            dependencies: Vec::new(),
            implements: Vec::new(),
            casters,
            methods: None,
            factory: Arc::new(move |_| Err(format!("no factory configured for '{unset_id}'").into())),
            _marker: std::marker::PhantomData,
        }
    }

    pub fn scope(mut self, scope: Scope) -> Self {
        self.scope = scope;
        self
    }

    pub fn prototype(self) -> Self {
        self.scope(Scope::Prototype)
    }

    pub fn alias(mut self, alias: impl Into<String>) -> Self {
        self.aliases.push(alias.into());
        self
    }

    pub fn depends_on(mut self, id: impl Into<String>) -> Self {
        self.dependencies.push(id.into());
        self
    }

    pub fn filter(mut self, spec: FilterSpec) -> Self {
        self.filters.push(spec);
        self
    }

    /// `T`가 capability 타입 `I` (보통 `dyn Trait`)를 구현함을 선언합니다.
    ///
    /// `cast`는 구체 인스턴스를 capability로 변환하며, 보통 `|svc| svc` 형태의 unsized coercion입니다.
    pub fn implements<I, F>(mut self, cast: F) -> Self
    where
        I: ?Sized + 'static,
        F: Fn(Arc<T>) -> Arc<I> + Send + Sync + 'static,
    {
        let key = TypeKey::of::<I>();
        let caster: Caster<I> = Arc::new(move |instance: Instance| instance.downcast::<T>().ok().map(&cast));
        self.casters.insert(key, Arc::new(caster));
        if !self.implements.contains(&key) {
            self.implements.push(key);
        }
        self
    }

    /// 프록시 생성에 사용할 메서드 테이블을 연결합니다.
    pub fn methods(mut self, table: MethodTable<T>) -> Self {
        self.methods = Some(Arc::new(table));
        self
    }

    pub fn build(self) -> Definition {
        Definition {
            id: self.id,
            type_key: TypeKey::of::<T>(),
            implements: self.implements,
            scope: self.scope,
            aliases: self.aliases,
            filters: self.filters,
            dependencies: self.dependencies,
            factory: self.factory,
            casters: self.casters,
            methods: self.methods,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    trait Greeter: Send + Sync {
        fn greet(&self) -> String;
    }

    struct English;

    impl Greeter for English {
        fn greet(&self) -> String {
            "hello".to_string()
        }
    }

    #[test]
    fn test_builder_records_metadata() {
        let definition = Definition::builder("english", |_| Ok(English))
            .prototype()
            .alias("en")
            .depends_on("dictionary")
            .implements::<dyn Greeter, _>(|g| g)
            .build();

        assert_eq!(definition.id(), "english");
        assert_eq!(definition.scope(), Scope::Prototype);
        assert_eq!(definition.aliases(), ["en".to_string()]);
        assert_eq!(definition.dependencies(), ["dictionary".to_string()]);
        assert!(definition.is_exact(TypeKey::of::<English>()));
        assert!(definition.satisfies(TypeKey::of::<dyn Greeter>()));
        assert!(!definition.is_exact(TypeKey::of::<dyn Greeter>()));
    }

    #[test]
    fn test_capability_caster_converts_instance() {
        let definition = Definition::builder("english", |_| Ok(English))
            .implements::<dyn Greeter, _>(|g| g)
            .build();

        let instance = definition.construct(&Dependencies::new(Vec::new())).unwrap();
        let caster = definition.caster::<dyn Greeter>().unwrap();
        let greeter = caster(instance).unwrap();

        assert_eq!(greeter.greet(), "hello");
    }

    #[test]
    fn test_dependencies_type_mismatch() {
        let deps = Dependencies::new(vec![("n".to_string(), Arc::new(5u32) as Instance)]);

        assert_eq!(*deps.get::<u32>("n").unwrap(), 5);
        assert!(matches!(deps.get::<String>("n"), Err(ContainerError::TypeMismatch { .. })));
        assert!(matches!(deps.get::<u32>("missing"), Err(ContainerError::DefinitionNotFound(_))));
    }

    #[test]
    fn test_scope_deserializes_from_config() {
        let scope: Scope = serde_json::from_str("\"prototype\"").unwrap();
        assert_eq!(scope, Scope::Prototype);
    }
}
