//! # AOP Module
//!
//! 메서드 호출 가로채기(interception) 계층입니다.
//!
//! | Spring AOP | 이 시스템 |
//! |------------|-----------|
//! | `MethodInterceptor` | [`Filter`] |
//! | `MethodInvocation.proceed()` | [`Next::proceed`] |
//! | `ProxyFactory` | [`ProxyBuilder`] |
//! | JDK proxy / CGLIB | [`ProxyStrategy::Interface`] / [`ProxyStrategy::Subclass`] |
//! | `TransactionInterceptor` | [`TransactionFilter`] |

pub mod chain;
pub mod filters;
pub mod invocation;
pub mod proxy;

pub use chain::{Filter, FilterChain, Next};
pub use filters::{LoggingFilter, TransactionFilter};
pub use invocation::{Arguments, EmptyInvoker, Invocation, Invoker, MethodBody, MethodInvoker, MethodSignature};
pub use proxy::{MethodTable, Proxy, ProxyBuilder, ProxyStrategy};
