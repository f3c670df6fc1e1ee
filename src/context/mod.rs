//! # Execution Context
//!
//! 실행 흐름(스레드 또는 async 태스크)마다 하나의 "현재" [`Context`]를 관리합니다.
//! 컨텍스트는 타입을 키로 하는 값 저장소이며 (트랜잭션 핸들, 요청 범위 컴포넌트 등),
//! 부모 컨텍스트를 가리키는 계층 구조를 이룹니다.
//!
//! ## 스코프 규칙
//!
//! - [`push`]는 현재 컨텍스트를 부모로 하는 새 컨텍스트를 설치하고 [`ContextGuard`]를 반환합니다.
//! - 가드가 drop되면 (정상 반환, `?`로 인한 조기 반환, 패닉 unwind 모두) 이전 컨텍스트가 복원됩니다.
//! - 스레드마다 설치된 컨텍스트 스택을 유지합니다. 가드가 순서와 다르게 drop되어도 해당
//!   컨텍스트만 스택에서 제거되고, 현재 컨텍스트는 남은 스택의 맨 위가 됩니다.
//! - async 코드에서는 가드를 `.await` 너머로 들고 있지 말고 [`ContextScope`]를 사용합니다.
//!   `ContextScope`는 poll 할 때마다 컨텍스트를 설치하고 poll이 끝나면 되돌리므로, 같은 워커
//!   스레드에서 번갈아 실행되는 태스크들이 서로의 컨텍스트를 보지 않습니다.
//!
//! ```rust,ignore
//! let _guard = context::push(Context::new().with(RequestId(7)));
//! assert_eq!(context::current().unwrap().get::<RequestId>().unwrap().0, 7);
//! // _guard drop → 이전 컨텍스트 복원
//! ```

use std::any::{Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::marker::PhantomData;
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::task::Poll;

static NEXT_CONTEXT_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static STACK: RefCell<Vec<Arc<Context>>> = const { RefCell::new(Vec::new()) };
}

/// 타입 키 기반 값 저장소
pub struct Context {
    id: u64,
    depth: usize,
    parent: Option<Arc<Context>>,
    values: RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>,
}

impl Context {
    /// 부모가 없는 빈 컨텍스트. [`push`] 시점에 현재 컨텍스트가 부모로 연결됩니다.
    pub fn new() -> Self {
        Self::derive(None)
    }

    /// `parent`의 자식 컨텍스트를 만듭니다.
    pub fn derive(parent: Option<Arc<Context>>) -> Self {
        Self {
            id: NEXT_CONTEXT_ID.fetch_add(1, Ordering::Relaxed),
            depth: parent.as_ref().map_or(0, |p| p.depth + 1),
            parent,
            values: RwLock::new(HashMap::new()),
        }
    }

    fn reparent(mut self, parent: Option<Arc<Context>>) -> Self {
        self.depth = parent.as_ref().map_or(0, |p| p.depth + 1);
        self.parent = parent;
        self
    }

    /// 값을 넣은 컨텍스트를 반환합니다. (빌더 형태)
    pub fn with<T: Any + Send + Sync>(self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// 이 컨텍스트에 값을 넣습니다. 같은 타입의 기존 값은 교체됩니다.
    pub fn insert<T: Any + Send + Sync>(&self, value: T) {
        let mut values = self.values.write().unwrap_or_else(|e| e.into_inner());
        values.insert(TypeId::of::<T>(), Arc::new(value));
    }

    /// 이 컨텍스트에서 값을 찾고, 없으면 부모 방향으로 찾습니다.
    ///
    /// 자식이 같은 타입의 값을 넣으면 부모 값은 가려집니다(shadowing).
    pub fn get<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        self.get_local::<T>()
            .or_else(|| self.parent.as_ref().and_then(|parent| parent.get::<T>()))
    }

    /// 이 컨텍스트에 직접 들어 있는 값만 찾습니다.
    pub fn get_local<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        let values = self.values.read().unwrap_or_else(|e| e.into_inner());
        values
            .get(&TypeId::of::<T>())
            .cloned()
            .and_then(|value| value.downcast::<T>().ok())
    }

    pub fn contains<T: Any + Send + Sync>(&self) -> bool {
        self.get::<T>().is_some()
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    /// 루트로부터의 깊이 (루트 = 0)
    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn parent(&self) -> Option<&Arc<Context>> {
        self.parent.as_ref()
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("depth", &self.depth)
            .field("parent", &self.parent.as_ref().map(|p| p.id))
            .finish()
    }
}

/// 현재 실행 흐름에 바인딩된 컨텍스트
pub fn current() -> Option<Arc<Context>> {
    STACK.with(|stack| stack.borrow().last().cloned())
}

/// 현재 컨텍스트를 부모로 하는 새 컨텍스트를 설치합니다.
pub fn push(context: Context) -> ContextGuard {
    let context = Arc::new(context.reparent(current()));
    enter(context)
}

/// 이미 부모가 정해진 컨텍스트를 그대로 설치합니다.
pub(crate) fn enter(context: Arc<Context>) -> ContextGuard {
    STACK.with(|stack| stack.borrow_mut().push(context.clone()));
    log::trace!("context push #{} (depth {})", context.id, context.depth);
    ContextGuard {
        installed: context,
        _not_send: PhantomData,
    }
}

/// `f`를 새 컨텍스트 안에서 실행합니다.
pub fn scope<R>(context: Context, f: impl FnOnce() -> R) -> R {
    let _guard = push(context);
    f()
}

/// push에 대응하는 pop을 보장하는 가드
///
/// 설치한 스레드에서만 drop되어야 하므로 `Send`가 아닙니다.
#[must_use = "dropping the guard immediately pops the context"]
pub struct ContextGuard {
    installed: Arc<Context>,
    _not_send: PhantomData<*const ()>,
}

impl ContextGuard {
    pub fn context(&self) -> &Arc<Context> {
        &self.installed
    }

    /// 명시적으로 pop 합니다. drop과 같습니다.
    pub fn pop(self) {}
}

impl Drop for ContextGuard {
    fn drop(&mut self) {
        STACK.with(|stack| {
            let mut stack = stack.borrow_mut();
            match stack.iter().rposition(|c| Arc::ptr_eq(c, &self.installed)) {
                Some(position) => {
                    if position + 1 != stack.len() {
                        log::warn!("context #{} popped out of order", self.installed.id);
                    }
                    stack.remove(position);
                }
                None => log::warn!("context #{} is no longer installed", self.installed.id),
            }
        });
        log::trace!("context pop #{}", self.installed.id);
    }
}

/// poll 할 때마다 컨텍스트를 설치하는 future 래퍼
pub struct ContextScope<F> {
    inner: Pin<Box<F>>,
    context: Arc<Context>,
}

impl<F: Future> ContextScope<F> {
    /// 현재 컨텍스트를 부모로 하는 `context` 안에서 `future`를 실행합니다.
    pub fn new(context: Context, future: F) -> Self {
        Self::with_context(Arc::new(context.reparent(current())), future)
    }

    pub(crate) fn with_context(context: Arc<Context>, future: F) -> Self {
        Self {
            inner: Box::pin(future),
            context,
        }
    }

    pub fn context(&self) -> &Arc<Context> {
        &self.context
    }
}

impl<F: Future> Future for ContextScope<F> {
    type Output = F::Output;

    fn poll(mut self: Pin<&mut Self>, cx: &mut std::task::Context<'_>) -> Poll<Self::Output> {
        let _guard = enter(self.context.clone());
        self.inner.as_mut().poll(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, PartialEq)]
    struct RequestId(u32);

    #[test]
    fn test_nested_push_pop_restores_empty_flow() {
        assert!(current().is_none());
        {
            let _a = push(Context::new().with(RequestId(1)));
            {
                let _b = push(Context::new());
                {
                    let c = push(Context::new().with(RequestId(3)));
                    assert_eq!(c.context().depth(), 2);
                    assert_eq!(current().unwrap().get::<RequestId>().unwrap().0, 3);
                }
                assert_eq!(current().unwrap().get::<RequestId>().unwrap().0, 1);
            }
        }
        assert!(current().is_none());
    }

    #[test]
    fn test_child_shadows_parent_value() {
        let outer = push(Context::new().with(RequestId(1)));
        let inner = push(Context::new().with(RequestId(2)));

        assert_eq!(inner.context().get::<RequestId>().unwrap().0, 2);
        assert!(inner.context().get_local::<String>().is_none());
        assert_eq!(inner.context().parent().unwrap().id(), outer.context().id());

        inner.pop();
        assert_eq!(current().unwrap().get::<RequestId>().unwrap().0, 1);
    }

    #[test]
    fn test_out_of_order_pop_discards_popped_context() {
        let a = push(Context::new().with(RequestId(1)));
        let b = push(Context::new().with(RequestId(2)));
        let b_id = b.context().id();

        a.pop();
        assert_eq!(current().unwrap().id(), b_id);

        b.pop();
        assert!(current().is_none());
    }

    #[test]
    fn test_out_of_order_pop_keeps_remaining_top() {
        let a = push(Context::new().with(RequestId(1)));
        let b = push(Context::new().with(RequestId(2)));
        let c = push(Context::new().with(RequestId(3)));
        let (a_id, c_id) = (a.context().id(), c.context().id());

        b.pop();
        assert_eq!(current().unwrap().id(), c_id);

        c.pop();
        assert_eq!(current().unwrap().id(), a_id);

        a.pop();
        assert!(current().is_none());
    }

    #[test]
    fn test_context_restored_after_panic() {
        let result = std::panic::catch_unwind(|| {
            scope(Context::new().with(RequestId(9)), || panic!("boom"));
        });

        assert!(result.is_err());
        assert!(current().is_none());
    }

    #[test]
    fn test_threads_have_independent_contexts() {
        let _guard = push(Context::new().with(RequestId(1)));

        let seen = std::thread::spawn(|| current().is_none()).join().unwrap();

        assert!(seen);
        assert!(current().is_some());
    }

    #[tokio::test]
    async fn test_context_scope_isolates_tasks() {
        let a = tokio::spawn(ContextScope::new(Context::new().with(RequestId(1)), async {
            tokio::task::yield_now().await;
            current().and_then(|c| c.get::<RequestId>()).map(|r| r.0)
        }));
        let b = tokio::spawn(ContextScope::new(Context::new().with(RequestId(2)), async {
            tokio::task::yield_now().await;
            current().and_then(|c| c.get::<RequestId>()).map(|r| r.0)
        }));

        let (a, b) = futures_util::future::join(a, b).await;

        assert_eq!(a.unwrap(), Some(1));
        assert_eq!(b.unwrap(), Some(2));
        assert!(current().is_none());
    }
}
