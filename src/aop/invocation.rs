//! 하나의 가로채진 메서드 호출을 표현하는 타입들
//!
//! - [`MethodSignature`]: 메서드 서술자 (소유 타입, 이름, 파라미터, 반환 타입, sealed 여부)
//! - [`Arguments`]: 위치 기반 인자 목록. 필터가 실제 호출 전에 수정할 수 있습니다.
//! - [`Invocation`]: 필터 체인을 통과하는 호출 상태
//! - [`Invoker`]: 체인의 마지막 링크. [`MethodInvoker`]는 실제 본문을, [`EmptyInvoker`]는
//!   의도적으로 비워 둔 슬롯을 나타냅니다.

use std::fmt;
use std::sync::Arc;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;

use crate::core::errors::{BoxError, ContainerError, ContainerResult, ErrorContext};

/// 메서드 본문. 대상 인스턴스를 빌려 받아 실행됩니다.
pub type MethodBody<T> = Arc<dyn Fn(&T, &Arguments) -> Result<Value, BoxError> + Send + Sync>;

/// 메서드 서술자
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MethodSignature {
    owner: String,
    name: String,
    parameters: Vec<String>,
    returns: Option<String>,
    sealed: bool,
}

impl MethodSignature {
    /// `owner`는 메서드를 선언한 타입 또는 인터페이스 이름입니다.
    pub fn new(owner: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            parameters: Vec::new(),
            returns: None,
            sealed: false,
        }
    }

    pub fn param(mut self, type_name: impl Into<String>) -> Self {
        self.parameters.push(type_name.into());
        self
    }

    pub fn returns(mut self, type_name: impl Into<String>) -> Self {
        self.returns = Some(type_name.into());
        self
    }

    /// 오버라이드할 수 없는 메서드로 표시합니다. (서브클래스 전략에서 가로채지 않음)
    pub fn sealed(mut self) -> Self {
        self.sealed = true;
        self
    }

    pub fn owner(&self) -> &str {
        &self.owner
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// `Owner::name` 형태의 이름. 여러 인터페이스가 같은 메서드 이름을 가질 때 구분에 사용합니다.
    pub fn qualified_name(&self) -> String {
        format!("{}::{}", self.owner, self.name)
    }

    pub fn parameters(&self) -> &[String] {
        &self.parameters
    }

    pub fn return_type(&self) -> Option<&str> {
        self.returns.as_deref()
    }

    pub fn is_sealed(&self) -> bool {
        self.sealed
    }
}

impl fmt::Display for MethodSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}::{}({})", self.owner, self.name, self.parameters.join(", "))?;
        if let Some(returns) = &self.returns {
            write!(f, " -> {returns}")?;
        }
        Ok(())
    }
}

/// 위치 기반 호출 인자
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Arguments {
    method: String,
    values: Vec<Value>,
}

impl Arguments {
    pub fn new(values: Vec<Value>) -> Self {
        Self {
            method: String::new(),
            values,
        }
    }

    pub(crate) fn bind(mut self, method: &MethodSignature) -> Self {
        self.method = method.to_string();
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index)
    }

    pub fn values(&self) -> &[Value] {
        &self.values
    }

    /// `index`번째 인자를 역직렬화합니다.
    pub fn get<T: DeserializeOwned>(&self, index: usize) -> ContainerResult<T> {
        let value = self.values.get(index).ok_or_else(|| ContainerError::InvalidArgument {
            method: self.method.clone(),
            message: format!("missing argument {index} (got {})", self.values.len()),
        })?;

        serde_json::from_value(value.clone()).map_err(|e| ContainerError::InvalidArgument {
            method: self.method.clone(),
            message: format!("argument {index}: {e}"),
        })
    }

    /// `index`번째 인자를 교체합니다.
    pub fn set<T: Serialize>(&mut self, index: usize, value: T) -> ContainerResult<()> {
        let value = serde_json::to_value(value).with_context(|| format!("serialize argument {index}"))?;
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(ContainerError::InvalidArgument {
                method: self.method.clone(),
                message: format!("cannot replace argument {index} (got {})", self.values.len()),
            }),
        }
    }

    pub fn into_values(self) -> Vec<Value> {
        self.values
    }
}

impl From<Vec<Value>> for Arguments {
    fn from(values: Vec<Value>) -> Self {
        Arguments::new(values)
    }
}

/// 필터 체인을 통과하는 호출 상태
pub struct Invocation<'a> {
    method: &'a MethodSignature,
    arguments: Arguments,
}

impl<'a> Invocation<'a> {
    pub fn new(method: &'a MethodSignature, arguments: Arguments) -> Self {
        Self {
            method,
            arguments: arguments.bind(method),
        }
    }

    pub fn method(&self) -> &MethodSignature {
        self.method
    }

    pub fn arguments(&self) -> &Arguments {
        &self.arguments
    }

    pub fn arguments_mut(&mut self) -> &mut Arguments {
        &mut self.arguments
    }
}

/// 체인의 마지막 링크. 한 번의 체인 실행에서 정확히 한 번 호출됩니다.
pub trait Invoker {
    fn signature(&self) -> &MethodSignature;

    fn invoke(&self, arguments: &Arguments) -> ContainerResult<Value>;
}

/// 대상 인스턴스의 실제 메서드 본문을 호출하는 Invoker
///
/// 대상은 빌려 온 참조이며 Invoker가 수명을 소유하지 않습니다.
pub struct MethodInvoker<'a, T> {
    target: &'a T,
    signature: &'a MethodSignature,
    body: &'a MethodBody<T>,
}

impl<'a, T> MethodInvoker<'a, T> {
    pub fn new(target: &'a T, signature: &'a MethodSignature, body: &'a MethodBody<T>) -> Self {
        Self { target, signature, body }
    }
}

impl<T> Invoker for MethodInvoker<'_, T> {
    fn signature(&self) -> &MethodSignature {
        self.signature
    }

    fn invoke(&self, arguments: &Arguments) -> ContainerResult<Value> {
        (self.body)(self.target, arguments)
            .map_err(|e| ContainerError::from_method(&self.signature.to_string(), e))
    }
}

/// 구현이 없는 슬롯(추상 템플릿 메서드 등)을 위한 자리표시자
///
/// 항상 `UnsupportedInvocation`으로 실패하며 어떤 본문도 실행하지 않습니다.
pub struct EmptyInvoker<'a> {
    signature: &'a MethodSignature,
}

impl<'a> EmptyInvoker<'a> {
    pub fn new(signature: &'a MethodSignature) -> Self {
        Self { signature }
    }
}

impl Invoker for EmptyInvoker<'_> {
    fn signature(&self) -> &MethodSignature {
        self.signature
    }

    fn invoke(&self, _arguments: &Arguments) -> ContainerResult<Value> {
        Err(ContainerError::UnsupportedInvocation(self.signature.to_string()))
    }
}
