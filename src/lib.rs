//! 컴포넌트 런타임
//!
//! 의존성 주입 컨테이너, 프록시 기반 AOP, 흐름 로컬 컨텍스트, 선언적 트랜잭션 경계를
//! 제공하는 라이브러리입니다.
//!
//! # Features
//!
//! - **정의 저장소**: id/별칭/타입 조회, 싱글톤/프로토타입 스코프, 순환 참조 검출
//! - **프록시**: 인터페이스/서브클래스 전략, 메서드 단위 가로채기
//! - **필터 체인**: 순서가 보장된 필터, 재진입 검출, 빈 invoker
//! - **컨텍스트**: 스레드/비동기 작업 단위로 격리된 실행 컨텍스트
//! - **트랜잭션**: 7가지 전파 방식, 격리 수준, 타임아웃, 세이브포인트, 일시 중단/재개
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │    Container    │ ← 외부 협력자(웹, ORM, RPC) 진입점
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ DefinitionStore │ ← 정의 등록, 인스턴스 생성
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  Proxy + Chain  │ ← 메서드 호출 가로채기
//! └─────────────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │   Transaction   │ ← 컨텍스트에 바인딩된 트랜잭션 경계
//! └─────────────────┘
//! ```
//!
//! # Examples
//!
//! ```rust,ignore
//! use component_runtime::core::Container;
//! use component_runtime::transaction::TransactionDefinition;
//!
//! let container = Container::global().with_transactions(coordinator);
//! container.start()?;
//!
//! let service = container.resolve_proxy::<OrderService>("orderService")?;
//! container.run_in_transaction(&TransactionDefinition::required(), || {
//!     service.invoke("place", vec![json!("sku-1")])
//! })?;
//! ```

pub mod core;
pub mod aop;
pub mod config;
pub mod context;
pub mod transaction;
pub mod utils;
