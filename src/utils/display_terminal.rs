//! 터미널 출력 포맷팅 유틸리티
//!
//! 싱글톤 사전 생성(eager initialization) 과정을 박스 제목, 단계, 하위 항목 형태로 출력합니다.

const BOX_WIDTH: usize = 50;

/// 박스 형태로 둘러싸인 제목을 출력합니다.
///
/// ```text
/// ╔══════════════════════════════════════════════════╗
/// ║              CONTAINER INITIALIZED               ║
/// ╚══════════════════════════════════════════════════╝
/// ```
pub fn print_boxed_title(title: &str) {
    let border = "═".repeat(BOX_WIDTH);
    println!("╔{}╗", border);
    println!("║{:^width$}║", title, width = BOX_WIDTH);
    println!("╚{}╝", border);
}

/// 진행 단계 시작을 표시합니다.
///
/// ```text
/// → Step 1: Scanning component registrations
/// ```
pub fn print_step_start(step: u8, description: &str) {
    println!("→ Step {}: {}", step, description);
}

/// 진행 단계 완료와 처리된 항목 수를 표시합니다.
pub fn print_step_complete(step: u8, description: &str, count: usize) {
    println!("✓ Step {}: {} ({} items)", step, description, count);
}

/// 하위 항목(정의 id)의 상태를 트리 형태로 표시합니다.
///
/// ```text
///    ├─ orderService: ✓ Created
/// ```
pub fn print_sub_task(name: &str, status: &str) {
    println!("   ├─ {}: {}", name, status);
}

/// 초기화 결과 요약
///
/// ```text
///    📦 Definitions: 5
///    🔒 Singletons created: 3
///    🔁 Prototypes (on demand): 2
///    ⚠️  Failed: 0
/// ```
pub fn print_final_summary(singletons: usize, prototypes: usize, failed: usize) {
    println!();
    print_boxed_title("🎉 CONTAINER INITIALIZED");
    println!("   📦 Definitions: {}", singletons + prototypes + failed);
    println!("   🔒 Singletons created: {}", singletons);
    println!("   🔁 Prototypes (on demand): {}", prototypes);
    println!("   ⚠️  Failed: {}", failed);
    println!();
}
