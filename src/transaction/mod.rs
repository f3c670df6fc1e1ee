//! # Transaction Module
//!
//! 선언적 트랜잭션 경계를 제공합니다.
//!
//! - [`definition`] - 전파/격리/제한 시간/읽기 전용 설정 값 객체
//! - [`resource`] - 물리 트랜잭션 핸들과 외부 리소스 인터페이스
//! - [`coordinator`] - 전파 규칙 상태 기계와 스코프 관리
//! - [`memory`] - 세이브포인트를 지원하는 메모리 리소스
//!
//! ```rust,ignore
//! let coordinator = TransactionCoordinator::new(Arc::new(MemoryResource::new()));
//!
//! coordinator.execute(&TransactionDefinition::required(), || {
//!     orders.save(&order)?;
//!     coordinator.execute(&TransactionDefinition::requires_new(), || audit.record(&order))
//! })?;
//! ```

pub mod coordinator;
pub mod definition;
pub mod memory;
pub mod resource;

pub use coordinator::{current_transaction, ScopeKind, TransactionCoordinator, TransactionScope};
pub use definition::{Isolation, IsolationPolicy, Propagation, TransactionDefinition};
pub use memory::MemoryResource;
pub use resource::{Transaction, TransactionResource, TransactionState};
