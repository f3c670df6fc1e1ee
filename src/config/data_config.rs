//! 실행 환경 및 컨테이너 설정
//!
//! 실행 환경 감지와 컨테이너 초기화/로깅 관련 설정을 관리합니다.

use std::env;

/// 애플리케이션 실행 환경
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Environment {
    /// 개발 환경
    Development,
    /// 테스트 환경
    Test,
    /// 스테이징 환경
    Staging,
    /// 프로덕션 환경
    Production,
}

impl Environment {
    /// 현재 실행 환경을 감지합니다.
    ///
    /// `ENVIRONMENT` 환경 변수를 확인하며, 설정되지 않은 경우 `Production`을 기본값으로 사용합니다.
    ///
    /// # Examples
    ///
    /// ```rust,ignore
    /// match Environment::current() {
    ///     Environment::Development => println!("개발 환경"),
    ///     Environment::Production => println!("프로덕션 환경"),
    ///     _ => {}
    /// }
    /// ```
    pub fn current() -> Self {
        env::var("ENVIRONMENT")
            .map(|value| Self::from_str(&value))
            .unwrap_or(Environment::Production)
    }

    /// 문자열에서 Environment를 생성합니다. 알 수 없는 값은 `Production`입니다.
    pub fn from_str(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "development" | "dev" => Environment::Development,
            "test" | "testing" => Environment::Test,
            "staging" | "stage" => Environment::Staging,
            _ => Environment::Production,
        }
    }

    /// 개발/테스트 환경 여부
    pub fn is_local(&self) -> bool {
        matches!(self, Environment::Development | Environment::Test)
    }
}

/// 컨테이너 초기화 설정
pub struct ContainerConfig;

impl ContainerConfig {
    /// 시작 시 모든 싱글톤을 미리 생성할지 여부
    ///
    /// # Environment Variables
    ///
    /// - `CONTAINER_EAGER_INIT`: `true`/`false` (기본값: `true`)
    pub fn eager_init() -> bool {
        env::var("CONTAINER_EAGER_INIT")
            .ok()
            .and_then(|value| Self::parse_bool(&value))
            .unwrap_or(true)
    }

    /// `RUST_LOG`이 없을 때 사용할 로그 필터
    ///
    /// # Environment Variables
    ///
    /// - `CONTAINER_LOG`: env_logger 필터 문법 (기본값: `info`)
    pub fn log_filter() -> String {
        env::var("CONTAINER_LOG").unwrap_or_else(|_| "info".to_string())
    }

    fn parse_bool(value: &str) -> Option<bool> {
        match value.trim().to_lowercase().as_str() {
            "true" | "1" | "yes" | "on" => Some(true),
            "false" | "0" | "no" | "off" => Some(false),
            _ => None,
        }
    }
}
