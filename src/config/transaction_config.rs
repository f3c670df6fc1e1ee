//! 트랜잭션 코디네이터 설정

use std::env;

use crate::config::Environment;
use crate::transaction::IsolationPolicy;

/// 트랜잭션 설정
pub struct TransactionConfig;

impl TransactionConfig {
    /// 기존 트랜잭션에 참여할 때 다른 격리 수준을 요청한 경우의 정책
    ///
    /// # Environment Variables
    ///
    /// - `TX_ISOLATION_POLICY`: `inherit` 또는 `strict`
    ///
    /// # Environment Defaults
    ///
    /// - Development/Test: `strict` (설정 실수를 빨리 드러냄)
    /// - Staging/Production: `inherit`
    pub fn isolation_policy() -> IsolationPolicy {
        env::var("TX_ISOLATION_POLICY")
            .ok()
            .and_then(|value| IsolationPolicy::from_str(&value))
            .unwrap_or_else(|| Self::isolation_policy_for_env(&Environment::current()))
    }

    pub fn isolation_policy_for_env(env: &Environment) -> IsolationPolicy {
        match env {
            Environment::Development | Environment::Test => IsolationPolicy::Strict,
            Environment::Staging | Environment::Production => IsolationPolicy::Inherit,
        }
    }

    /// NESTED 스코프의 세이브포인트 이름 접두사
    ///
    /// # Environment Variables
    ///
    /// - `TX_SAVEPOINT_PREFIX` (기본값: `SAVEPOINT_`)
    pub fn savepoint_prefix() -> String {
        env::var("TX_SAVEPOINT_PREFIX")
            .ok()
            .filter(|prefix| !prefix.trim().is_empty())
            .unwrap_or_else(|| "SAVEPOINT_".to_string())
    }
}
