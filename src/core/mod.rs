//! # Core Container Module
//!
//! 컴포넌트 정의를 등록하고 인스턴스를 생성/공유하는 컨테이너의 핵심입니다.
//! Spring의 `BeanFactory` / `ApplicationContext`에 해당하는 기능을 타입 소거된
//! 인스턴스(`Arc<dyn Any + Send + Sync>`) 위에 구현합니다.
//!
//! ## 모듈 구성
//!
//! ### [`definition`] - 컴포넌트 정의
//! - **Definition**: id, 별칭, 스코프, 의존성, 팩토리, 필터 명세, 메서드 테이블
//! - **TypeKey**: 구체 타입과 `dyn Trait` 모두를 식별하는 키
//!
//! ### [`registry`] - 정의 저장소
//! - **DefinitionStore**: 등록/별칭/조회/인스턴스 생성
//! - **자동 등록**: `inventory` 기반 컴파일 타임 컴포넌트 스캔
//! - **순환 참조 검출**: 생성 전에 선언된 의존성 그래프를 검사
//!
//! ### [`container`] - 외부 협력자용 파사드
//!
//! ### [`errors`] - 통합 에러 처리
//!
//! ## Spring Framework와의 비교
//!
//! | Spring | 이 프레임워크 |
//! |--------|---------------|
//! | `BeanDefinition` | [`Definition`] |
//! | `DefaultListableBeanFactory` | [`DefinitionStore`] |
//! | `@ComponentScan` | `inventory::submit!` + [`DefinitionStore::scan`] |
//! | `@Scope("prototype")` | [`Scope::Prototype`] |
//! | `BeanCurrentlyInCreationException` | [`ContainerError::CircularDependency`] |
//! | `ApplicationContext` | [`Container`] |
//!
//! ## 사용 패턴
//!
//! ```rust,ignore
//! use component_runtime::core::{Definition, DefinitionStore};
//!
//! let store = DefinitionStore::new();
//! store.register(Definition::builder("repository", |_| Ok(OrderRepository::default())).build())?;
//! store.register(
//!     Definition::builder("orderService", |deps| {
//!         Ok(OrderService::new(deps.get::<OrderRepository>("repository")?))
//!     })
//!     .depends_on("repository")
//!     .alias("orders")
//!     .build(),
//! )?;
//!
//! let service = store.instantiate_as::<OrderService>("orders")?;
//! ```

pub mod container;
pub mod definition;
pub mod errors;
pub mod registry;

pub use container::Container;
pub use definition::{Definition, DefinitionBuilder, Dependencies, FilterComponent, FilterSpec, Instance, Scope, TypeKey};
pub use errors::{ContainerError, ContainerResult, ErrorContext};
pub use registry::{ComponentRegistration, DefinitionStore};
