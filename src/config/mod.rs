//! # Configuration Module
//!
//! 환경 변수 기반 설정을 중앙에서 관리합니다.
//! Spring의 `@Configuration` / `@Value`와 유사하게, 설정값마다 정적 접근자를 둡니다.
//!
//! ## 모듈 구성
//!
//! - [`data_config`] - 실행 환경, 컨테이너 초기화/로깅 설정
//! - [`transaction_config`] - 격리 수준 정책, 세이브포인트 이름 설정
//!
//! ## 환경 변수
//!
//! ```bash
//! export ENVIRONMENT="production"       # development, test, staging, production
//! export CONTAINER_EAGER_INIT="true"    # 시작 시 싱글톤 미리 생성
//! export CONTAINER_LOG="info"           # RUST_LOG이 없을 때의 로그 필터
//! export TX_ISOLATION_POLICY="inherit"  # inherit | strict
//! export TX_SAVEPOINT_PREFIX="SAVEPOINT_"
//! ```
//!
//! ## Spring과의 비교
//!
//! | Spring | Rust (이 프로젝트) |
//! |--------|-------------------|
//! | `@Value("${property}")` | `env::var("PROPERTY")` |
//! | `@Profile("dev")` | `Environment::Development` |
//! | `application.yml` | `.env` 파일 |

pub mod data_config;
pub mod transaction_config;

pub use data_config::*;
pub use transaction_config::*;
