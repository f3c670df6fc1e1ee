//! 공통 유틸리티 모듈
//!
//! - [`display_terminal`] - 컨테이너 초기화 진행 상황 터미널 출력
//!
//! ```rust,ignore
//! use crate::utils::display_terminal::print_boxed_title;
//!
//! print_boxed_title("Container Started");
//! ```

pub mod display_terminal;
