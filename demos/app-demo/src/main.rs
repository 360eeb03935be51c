use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::OnceLock;

use griffin_core::prelude::*;
use parking_lot::Mutex;

// ==================== 业务服务 ====================

/// 数据库服务 - 连接参数来自配置中的占位符
#[derive(Debug)]
struct DatabaseService {
    host: String,
    port: i32,
    max_connections: i32,
}

impl DatabaseService {
    fn class() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            BeanClass::builder::<DatabaseService>("DatabaseService")
                .constructor(
                    vec![
                        param("host", &classes::string()),
                        param("port", &classes::i32()),
                        param("maxConnections", &classes::i32()),
                    ],
                    |args| {
                        Ok(DatabaseService {
                            host: args.string(0)?,
                            port: args.i32(1)?,
                            max_connections: args.i32(2)?,
                        })
                    },
                )
                .build()
        }))
    }

    fn definition(definition: BeanDefinition) -> BeanDefinition {
        definition
            .with_constructor_arg(BeanValue::literal("${database.host}"))
            .with_constructor_arg(BeanValue::literal("${database.port}"))
            .with_constructor_arg(BeanValue::literal("${database.max-connections:8}"))
    }

    fn query(&self, sql: &str) -> String {
        format!("Query result for: {}", sql)
    }
}

/// 服务器服务 - 构造器注入地址，自动装配数据库服务
struct ServerService {
    address: String,
    db: Mutex<Option<Arc<DatabaseService>>>,
}

impl ServerService {
    fn class() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            BeanClass::builder::<ServerService>("ServerService")
                .constructor(vec![param("address", &classes::string())], |args| {
                    Ok(ServerService {
                        address: args.string(0)?,
                        db: Mutex::new(None),
                    })
                })
                .autowired_property("db", &DatabaseService::class(), true, |bean, value| {
                    let db = value
                        .downcast::<DatabaseService>()
                        .ok_or_else(|| anyhow!("'db' must be a DatabaseService"))?;
                    *bean.db.lock() = Some(db);
                    Ok(())
                })
                .method("init", |bean| {
                    tracing::info!("ServerService initialized, will bind to {}", bean.address);
                    Ok(())
                })
                .method("shutdown", |_| {
                    tracing::info!("ServerService shutting down");
                    Ok(())
                })
                .post_construct("init")
                .pre_destroy("shutdown")
                .build()
        }))
    }

    fn definition(definition: BeanDefinition) -> BeanDefinition {
        definition.with_constructor_arg(BeanValue::literal("${server.host}:${server.port}"))
    }

    fn handle_request(&self, path: &str) -> anyhow::Result<String> {
        let db = self.db.lock().clone().context("database not injected")?;
        tracing::info!("Handling request: {}", path);
        Ok(db.query("SELECT * FROM users"))
    }
}

// ==================== 循环引用 ====================

/// 订单服务和库存服务通过属性互相引用
#[derive(Default)]
struct OrderService {
    inventory: Mutex<Option<BeanObject>>,
}

#[derive(Default)]
struct InventoryService {
    orders: Mutex<Option<BeanObject>>,
}

impl OrderService {
    fn class() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            BeanClass::builder::<OrderService>("OrderService")
                .constructor(vec![], |_| Ok(OrderService::default()))
                .property("inventory", &classes::object(), |bean, value| {
                    *bean.inventory.lock() = Some(value);
                    Ok(())
                })
                .build()
        }))
    }

    fn definition(definition: BeanDefinition) -> BeanDefinition {
        definition.with_property("inventory", BeanValue::reference("inventoryService"))
    }
}

impl InventoryService {
    fn class() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            BeanClass::builder::<InventoryService>("InventoryService")
                .constructor(vec![], |_| Ok(InventoryService::default()))
                .property("orders", &classes::object(), |bean, value| {
                    *bean.orders.lock() = Some(value);
                    Ok(())
                })
                .build()
        }))
    }

    fn definition(definition: BeanDefinition) -> BeanDefinition {
        definition.with_property("orders", BeanValue::reference("orderService"))
    }
}

// ==================== 配置类 ====================

/// 请求计数器，由配置类的 bean 方法创建
struct RequestCounter {
    prefix: String,
    count: AtomicUsize,
}

impl RequestCounter {
    fn class() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| BeanClass::builder::<RequestCounter>("RequestCounter").build()))
    }

    fn record(&self) -> usize {
        self.count.fetch_add(1, Ordering::SeqCst) + 1
    }
}

struct MetricsConfig {
    prefix: String,
}

impl MetricsConfig {
    fn class() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            BeanClass::builder::<MetricsConfig>("MetricsConfig")
                .constructor(vec![param("prefix", &classes::string())], |args| {
                    Ok(MetricsConfig { prefix: args.string(0)? })
                })
                .instance_factory("requestCounter", &RequestCounter::class(), vec![], |config, _| {
                    tracing::info!("Creating RequestCounter with prefix '{}'", config.prefix);
                    let counter = RequestCounter {
                        prefix: config.prefix.clone(),
                        count: AtomicUsize::new(0),
                    };
                    Ok(Some(BeanObject::new(counter, &RequestCounter::class())))
                })
                .bean_method(BeanMethod::new("requestCounter"))
                .build()
        }))
    }

    fn definition(definition: BeanDefinition) -> BeanDefinition {
        definition.with_constructor_arg(BeanValue::literal("${metrics.prefix:griffin}"))
    }
}

// ==================== 扩展点 ====================

/// 初始化完成后记录每个应用 bean
struct ReadinessLogger;

impl BeanPostProcessor for ReadinessLogger {
    fn post_process_after_initialization(&self, bean: BeanObject, bean_name: &str) -> BeansResult<Option<BeanObject>> {
        tracing::info!("Bean '{}' is ready ({})", bean_name, bean.class_name());
        Ok(Some(bean))
    }
}

impl ReadinessLogger {
    fn class() -> Arc<BeanClass> {
        BeanClass::builder::<ReadinessLogger>("ReadinessLogger")
            .constructor(vec![], |_| Ok(ReadinessLogger))
            .bean_post_processor()
            .build()
    }
}

/// 记录上下文生命周期事件
struct LifecycleLogger;

impl ApplicationListener for LifecycleLogger {
    fn on_event(&self, event: Arc<dyn Event>) -> anyhow::Result<()> {
        tracing::info!("Received {}", event.event_name());
        Ok(())
    }

    fn listener_name(&self) -> &str {
        "lifecycleLogger"
    }
}

impl LifecycleLogger {
    fn class() -> Arc<BeanClass> {
        BeanClass::builder::<LifecycleLogger>("LifecycleLogger")
            .constructor(vec![], |_| Ok(LifecycleLogger))
            .application_listener()
            .build()
    }
}

griffin_core::inventory::submit! {
    ComponentRegistration::new("databaseService", DatabaseService::class)
        .with_definition(DatabaseService::definition)
}

griffin_core::inventory::submit! {
    ComponentRegistration::new("serverService", ServerService::class)
        .with_definition(ServerService::definition)
}

griffin_core::inventory::submit! {
    ComponentRegistration::new("orderService", OrderService::class)
        .with_definition(OrderService::definition)
}

griffin_core::inventory::submit! {
    ComponentRegistration::new("inventoryService", InventoryService::class)
        .with_definition(InventoryService::definition)
}

griffin_core::inventory::submit! {
    ComponentRegistration::new("metricsConfig", MetricsConfig::class)
        .with_definition(MetricsConfig::definition)
}

griffin_core::inventory::submit! {
    ComponentRegistration::new("", ReadinessLogger::class)
}

griffin_core::inventory::submit! {
    ComponentRegistration::new("", LifecycleLogger::class)
}

// ==================== 主程序 ====================

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 查找配置文件
    let config_file = ["demos/app-demo/application.toml", "application.toml"]
        .into_iter()
        .find(|path| std::path::Path::new(path).exists())
        .unwrap_or("application.toml");

    let context = GriffinApplication::new("GriffinDemo")
        .config_file(config_file)
        .env_prefix("APP_")
        .run()
        .await?;

    let server = context.get_bean_typed::<ServerService>("serverService")?;
    let response = server.handle_request("/api/users")?;
    tracing::info!("Response: {}", response);

    let counter = context.get_bean_typed::<RequestCounter>("requestCounter")?;
    tracing::info!("{}.requests = {}", counter.prefix, counter.record());

    let orders = context.get_bean("orderService")?;
    let inventory = context.get_bean("inventoryService")?;
    let linked = orders
        .downcast_ref::<OrderService>()
        .and_then(|order| order.inventory.lock().clone())
        .is_some_and(|peer| peer.ptr_eq(&inventory));
    tracing::info!("OrderService <-> InventoryService wired: {}", linked);

    let db = context.get_bean_typed::<DatabaseService>("databaseService")?;
    tracing::info!(
        "Database: {}:{} (max connections: {})",
        db.host,
        db.port,
        db.max_connections
    );
    tracing::info!(
        "Application: {} v{}",
        context.environment().get_string_or("app.name", "unknown"),
        context.environment().get_string_or("app.version", "0.0.0")
    );

    context.close();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_demo_components_wire_up() {
        let source = TomlPropertySource::from_file(concat!(env!("CARGO_MANIFEST_DIR"), "/application.toml")).unwrap();
        let context = ApplicationContext::builder()
            .add_property_source(Box::new(source))
            .component_scan(true)
            .resolve_placeholders(true)
            .run()
            .unwrap();

        let orders = context.get_bean_typed::<OrderService>("orderService").unwrap();
        let inventory = context.get_bean_typed::<InventoryService>("inventoryService").unwrap();
        let peer = orders.inventory.lock().clone().unwrap();
        assert!(Arc::ptr_eq(&peer.downcast::<InventoryService>().unwrap(), &inventory));
        let back = inventory.orders.lock().clone().unwrap();
        assert!(Arc::ptr_eq(&back.downcast::<OrderService>().unwrap(), &orders));

        let counter = context.get_bean_typed::<RequestCounter>("requestCounter").unwrap();
        assert_eq!(counter.prefix, "demo");
        assert_eq!(counter.record(), 1);

        let server = context.get_bean_typed::<ServerService>("serverService").unwrap();
        assert_eq!(server.address, "127.0.0.1:8080");
        assert!(server.handle_request("/health").is_ok());
        context.close();
    }
}
