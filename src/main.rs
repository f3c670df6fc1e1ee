//! 컴포넌트 런타임 데모 애플리케이션
//!
//! `inventory`로 등록된 컴포넌트를 스캔해 컨테이너를 시작하고, 트랜잭션 필터가 적용된
//! 프록시를 통해 전파 방식별 동작(REQUIRED, REQUIRES_NEW, NESTED, MANDATORY)을 보여줍니다.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use dotenv::dotenv;
use env_logger::Env;
use log::{error, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::json;

use component_runtime::aop::{LoggingFilter, MethodSignature, MethodTable, TransactionFilter};
use component_runtime::config::{ContainerConfig, Environment};
use component_runtime::core::errors::BoxError;
use component_runtime::core::{ComponentRegistration, Container, ContainerError, Definition, FilterComponent, FilterSpec};
use component_runtime::transaction::{current_transaction, MemoryResource, Propagation, TransactionCoordinator, TransactionDefinition};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Order {
    id: u64,
    sku: String,
    quantity: u32,
}

/// 주문 저장소 (메모리 리소스 위의 키-값 저장)
struct OrderRepository {
    resource: Arc<MemoryResource>,
}

impl OrderRepository {
    fn save(&self, order: &Order) -> Result<(), ContainerError> {
        self.resource.put(format!("order:{}", order.id), json!(order))
    }

    fn remove(&self, id: u64) -> Result<(), ContainerError> {
        self.resource.delete(&format!("order:{}", id))
    }

    fn audit(&self, message: &str) -> Result<(), ContainerError> {
        let key = format!("audit:{}", uuid::Uuid::new_v4());
        self.resource.put(key, json!(message))
    }
}

struct OrderService {
    repository: Arc<OrderRepository>,
    sequence: AtomicU64,
}

impl OrderService {
    fn place(&self, sku: String, quantity: u32) -> Result<Order, BoxError> {
        if quantity == 0 {
            return Err(format!("quantity for '{}' must be positive", sku).into());
        }
        let order = Order {
            id: self.sequence.fetch_add(1, Ordering::SeqCst) + 1,
            sku,
            quantity,
        };
        self.repository.save(&order)?;
        Ok(order)
    }

    fn cancel(&self, id: u64) -> Result<(), BoxError> {
        self.repository.remove(id)?;
        Ok(())
    }

    fn methods() -> MethodTable<OrderService> {
        MethodTable::new("OrderService")
            .implements("Orders")
            .method(
                MethodSignature::new("Orders", "place").param("String").param("u32").returns("Order"),
                |service: &OrderService, args| service.place(args.get(0)?, args.get(1)?),
            )
            .method(
                MethodSignature::new("Orders", "cancel").param("u64"),
                |service: &OrderService, args| service.cancel(args.get(0)?),
            )
    }
}

fn memory_resource() -> Definition {
    Definition::builder("memoryResource", |_| Ok(MemoryResource::new())).build()
}

fn transaction_coordinator() -> Definition {
    Definition::builder("transactionCoordinator", |deps| {
        Ok(TransactionCoordinator::new(deps.get::<MemoryResource>("memoryResource")?))
    })
    .depends_on("memoryResource")
    .build()
}

fn transaction_filter() -> Definition {
    Definition::builder("transactionFilter", |deps| {
        let coordinator = deps.get::<TransactionCoordinator>("transactionCoordinator")?;
        let filter = TransactionFilter::new(coordinator)
            .method("cancel", TransactionDefinition::new(Propagation::Mandatory));
        Ok(FilterComponent(Arc::new(filter)))
    })
    .depends_on("transactionCoordinator")
    .alias("tx")
    .build()
}

fn order_repository() -> Definition {
    Definition::builder("orderRepository", |deps| {
        Ok(OrderRepository {
            resource: deps.get::<MemoryResource>("memoryResource")?,
        })
    })
    .depends_on("memoryResource")
    .build()
}

fn order_service() -> Definition {
    Definition::builder("orderService", |deps| {
        Ok(OrderService {
            repository: deps.get::<OrderRepository>("orderRepository")?,
            sequence: AtomicU64::new(0),
        })
    })
    .depends_on("orderRepository")
    .alias("orders")
    .methods(OrderService::methods())
    .filter(FilterSpec::inline(LoggingFilter::new(log::Level::Info).with_arguments()))
    .filter(FilterSpec::named("tx"))
    .build()
}

inventory::submit! { ComponentRegistration { name: "memoryResource", definition: memory_resource } }
inventory::submit! { ComponentRegistration { name: "transactionCoordinator", definition: transaction_coordinator } }
inventory::submit! { ComponentRegistration { name: "transactionFilter", definition: transaction_filter } }
inventory::submit! { ComponentRegistration { name: "orderRepository", definition: order_repository } }
inventory::submit! { ComponentRegistration { name: "orderService", definition: order_service } }

#[tokio::main]
async fn main() -> Result<(), BoxError> {
    load_env_file();
    init_logging();

    info!("🚀 컴포넌트 런타임 시작중... (environment: {:?})", Environment::current());

    let container = Container::global();
    let scanned = container.start()?;
    info!("✅ {}개 컴포넌트 정의가 등록되었습니다", scanned);

    let coordinator = container.resolve_as::<TransactionCoordinator>("transactionCoordinator")?;
    let container = container.with_transactions(coordinator);
    let resource = container.resolve_as::<MemoryResource>("memoryResource")?;
    let repository = container.resolve_as::<OrderRepository>("orderRepository")?;
    let orders = container.resolve_proxy::<OrderService>("orders")?;

    // REQUIRED: 프록시 호출마다 새 트랜잭션
    let order: Order = orders.invoke_as("place", vec![json!("sku-1"), json!(2)])?;
    info!("📦 주문 생성: {:?}", order);

    // MANDATORY: 트랜잭션 밖에서 호출하면 실패
    match orders.invoke("cancel", vec![json!(order.id)]) {
        Err(ContainerError::NoTransaction) => warn!("⚠️ cancel은 진행 중인 트랜잭션이 필요합니다"),
        other => error!("예상하지 못한 결과: {:?}", other.map(|_| ())),
    }

    // REQUIRES_NEW: 바깥 트랜잭션이 롤백되어도 감사 로그는 커밋
    let outcome = container.run_in_transaction(&TransactionDefinition::required().named("checkout"), || {
        orders.invoke("place", vec![json!("sku-2"), json!(1)])?;
        container.run_in_transaction(&TransactionDefinition::requires_new().named("audit"), || {
            repository.audit("checkout attempted")
        })?;
        orders.invoke("place", vec![json!("sku-3"), json!(0)])
    });
    if let Err(error) = outcome {
        warn!("↩️ checkout 롤백: {}", error);
    }

    // NESTED: 세이브포인트까지만 롤백하고 바깥 트랜잭션은 커밋
    container.run_in_transaction(&TransactionDefinition::required().named("batch"), || {
        orders.invoke("place", vec![json!("sku-4"), json!(1)])?;
        let nested = container.run_in_transaction(&TransactionDefinition::nested(), || {
            orders.invoke("place", vec![json!("sku-5"), json!(0)])
        });
        if let Err(error) = nested {
            warn!("↩️ 세이브포인트로 롤백: {}", error);
        }
        orders.invoke("cancel", vec![json!(order.id)])
    })?;

    // 비동기 경계: 컨텍스트가 작업(future) 단위로 격리됨
    let bound = container
        .run_in_transaction_async(&TransactionDefinition::required().timeout_seconds(5), async {
            tokio::task::yield_now().await;
            let transaction = current_transaction().ok_or(ContainerError::NoTransaction)?;
            repository.audit("async batch")?;
            Ok::<_, ContainerError>(transaction.id())
        })
        .await?;
    info!("⏱️ 비동기 트랜잭션 {} 커밋", bound);

    for (key, value) in resource.committed() {
        info!("   {} = {}", key, value);
    }
    info!("📜 리소스 이벤트: {}", resource.events().join(", "));

    Ok(())
}

/// 환경별 설정 파일을 로드합니다
///
/// * `PROFILE=dev` - .env.dev 파일 로드 (기본값)
/// * `PROFILE=prod` - .env.prod 파일 로드
/// * 기타 - 기본 .env 파일 로드
fn load_env_file() {
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "dev".to_string());

    let loaded = match profile.as_str() {
        "prod" => dotenv::from_filename(".env.prod").map(|_| ".env.prod"),
        "dev" => dotenv::from_filename(".env.dev").map(|_| ".env.dev"),
        _ => dotenv().map(|_| ".env"),
    };

    // 로거 초기화 전이므로 stderr로 출력
    match loaded {
        Ok(file) => eprintln!("{} 파일 로드 됨 (profile: {})", file, profile),
        Err(e) => eprintln!("환경 파일 로드 생략 (profile: {}): {}", profile, e),
    }
}

/// 로깅 시스템을 초기화합니다
///
/// `RUST_LOG`이 없으면 `CONTAINER_LOG` (기본값 "info")를 사용합니다.
fn init_logging() {
    env_logger::init_from_env(Env::default().default_filter_or(ContainerConfig::log_filter()));
}
