//! 直接使用 DefaultListableBeanFactory 的端到端场景

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{mpsc, OnceLock};
use std::time::Duration;

use griffin_core::prelude::*;
use griffin_core::scope::ObjectFactory;
use griffin_core::{AutowireMode, ContainerSettings, Scope, ThreadScope};
use parking_lot::Mutex;

// ==================== 测试用类型 ====================

#[derive(Default)]
struct Endpoint {
    host: Mutex<String>,
    port: Mutex<i32>,
}

fn endpoint_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| {
        BeanClass::builder::<Endpoint>("Endpoint")
            .constructor(vec![], |_| Ok(Endpoint::default()))
            .property("host", &classes::string(), |endpoint, value| {
                *endpoint.host.lock() = value.as_str().unwrap_or_default().to_string();
                Ok(())
            })
            .property("port", &classes::i32(), |endpoint, value| {
                *endpoint.port.lock() = *value.downcast_ref::<i32>().ok_or_else(|| anyhow!("port must be an i32"))?;
                Ok(())
            })
            .build()
    }))
}

/// 通过 `peer` 属性互相引用
#[derive(Default)]
struct Node {
    peer: Mutex<Option<BeanObject>>,
    initialized: Mutex<bool>,
}

fn node_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| {
        BeanClass::builder::<Node>("Node")
            .constructor(vec![], |_| Ok(Node::default()))
            .property("peer", &classes::object(), |node, value| {
                *node.peer.lock() = Some(value);
                Ok(())
            })
            .method("init", |node| {
                *node.initialized.lock() = true;
                Ok(())
            })
            .build()
    }))
}

/// 构造较慢的 Node，让两个线程同时停留在创建过程中
fn slow_node_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| {
        BeanClass::builder::<Node>("SlowNode")
            .constructor(vec![], |_| {
                std::thread::sleep(Duration::from_millis(100));
                Ok(Node::default())
            })
            .property("peer", &classes::object(), |node, value| {
                *node.peer.lock() = Some(value);
                Ok(())
            })
            .build()
    }))
}

fn peer_of(bean: &BeanObject) -> BeanObject {
    bean.downcast_ref::<Node>().unwrap().peer.lock().clone().unwrap()
}

fn register_cycle(factory: &DefaultListableBeanFactory) {
    factory
        .register_bean_definition(
            "a",
            BeanDefinition::of_class(&node_class())
                .with_property("peer", BeanValue::reference("b"))
                .with_init_method("init"),
        )
        .unwrap();
    factory
        .register_bean_definition(
            "b",
            BeanDefinition::of_class(&node_class())
                .with_property("peer", BeanValue::reference("a"))
                .with_init_method("init"),
        )
        .unwrap();
}

/// 模拟代理：初始化后把目标 bean 包起来
struct Proxy {
    target: BeanObject,
}

fn proxy_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| BeanClass::builder::<Proxy>("Proxy").build()))
}

struct ProxyingPostProcessor {
    target: &'static str,
}

impl BeanPostProcessor for ProxyingPostProcessor {
    fn post_process_after_initialization(&self, bean: BeanObject, bean_name: &str) -> BeansResult<Option<BeanObject>> {
        if bean_name == self.target {
            return Ok(Some(BeanObject::new(Proxy { target: bean }, &proxy_class())));
        }
        Ok(Some(bean))
    }
}

/// 同时有 `(Object)` 和 `(String)` 两个构造器
struct Text {
    via: &'static str,
    value: String,
}

fn text_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| {
        BeanClass::builder::<Text>("Text")
            .constructor(vec![param("value", &classes::object())], |args| {
                Ok(Text {
                    via: "object",
                    value: args.string(0)?,
                })
            })
            .constructor(vec![param("value", &classes::string())], |args| {
                Ok(Text {
                    via: "string",
                    value: args.string(0)?,
                })
            })
            .build()
    }))
}

type Journal = Arc<Mutex<Vec<String>>>;

struct Step;

/// 构造和初始化时都写日志
fn step_class(label: &'static str, journal: &Journal) -> Arc<BeanClass> {
    let on_new = Arc::clone(journal);
    let on_init = Arc::clone(journal);
    BeanClass::builder::<Step>(format!("Step[{}]", label))
        .constructor(vec![], move |_| {
            on_new.lock().push(format!("{}:new", label));
            Ok(Step)
        })
        .method("init", move |_| {
            on_init.lock().push(format!("{}:init", label));
            Ok(())
        })
        .build()
}

// ==================== 定义合并 ====================

#[test]
fn test_merge_is_repeatable_and_child_changes_stay_local() {
    let factory = DefaultListableBeanFactory::new();
    factory
        .register_bean_definition(
            "baseEndpoint",
            BeanDefinition::of_class(&endpoint_class())
                .with_abstract(true)
                .with_property("host", BeanValue::literal("localhost")),
        )
        .unwrap();
    factory
        .register_bean_definition(
            "endpoint",
            BeanDefinition::child_of("baseEndpoint").with_property("port", BeanValue::literal("8080")),
        )
        .unwrap();

    let first = factory.get_merged_bean_definition("endpoint").unwrap();
    let second = factory.get_merged_bean_definition("endpoint").unwrap();
    assert_eq!(first.definition(), second.definition());
    assert_eq!(first.definition().parent_name, None);
    assert_eq!(first.definition().property_values.len(), 2);

    let parent_before = factory.get_merged_bean_definition("baseEndpoint").unwrap().definition().clone();
    factory
        .modify_bean_definition("endpoint", &mut |definition: &mut BeanDefinition| {
            definition.property_values.add("host", BeanValue::literal("example.org"))
        })
        .unwrap();

    let parent_after = factory.get_merged_bean_definition("baseEndpoint").unwrap();
    assert_eq!(parent_after.definition(), &parent_before);
    assert_eq!(
        parent_after.definition().property_values.get("host"),
        Some(&BeanValue::literal("localhost"))
    );

    let bean = factory.get_bean("endpoint").unwrap();
    let endpoint = bean.downcast_ref::<Endpoint>().unwrap();
    assert_eq!(*endpoint.host.lock(), "example.org");
    assert_eq!(*endpoint.port.lock(), 8080);
}

// ==================== 作用域 ====================

#[test]
fn test_singleton_identity_and_prototype_instances() {
    let factory = DefaultListableBeanFactory::new();
    factory
        .register_bean_definition("shared", BeanDefinition::of_class(&endpoint_class()))
        .unwrap();
    factory
        .register_bean_definition(
            "fresh",
            BeanDefinition::of_class(&endpoint_class())
                .with_scope("prototype")
                .with_property("port", BeanValue::literal("9000")),
        )
        .unwrap();

    let first = factory.get_bean("shared").unwrap();
    let second = factory.get_bean("shared").unwrap();
    assert!(first.ptr_eq(&second));
    assert!(factory.is_singleton("shared").unwrap());

    let one = factory.get_bean("fresh").unwrap();
    let two = factory.get_bean("fresh").unwrap();
    assert!(!one.ptr_eq(&two));
    assert!(factory.is_prototype("fresh").unwrap());
    for bean in [&one, &two] {
        assert!(endpoint_class().is_instance(bean));
        assert_eq!(*bean.downcast_ref::<Endpoint>().unwrap().port.lock(), 9000);
    }
    assert!(!factory.contains_singleton("fresh"));
}

#[test]
fn test_thread_scope_keeps_one_instance_per_thread() {
    let factory = DefaultListableBeanFactory::new();
    factory.register_scope("thread", Arc::new(ThreadScope::new())).unwrap();
    factory
        .register_bean_definition("perThread", BeanDefinition::of_class(&endpoint_class()).with_scope("thread"))
        .unwrap();

    let first = factory.get_bean("perThread").unwrap();
    let again = factory.get_bean("perThread").unwrap();
    assert!(first.ptr_eq(&again));

    let other = std::thread::scope(|s| s.spawn(|| factory.get_bean("perThread").unwrap()).join().unwrap());
    assert!(!first.ptr_eq(&other));

    factory
        .register_bean_definition("unknown", BeanDefinition::of_class(&endpoint_class()).with_scope("conversation"))
        .unwrap();
    let err = factory.get_bean("unknown").unwrap_err();
    assert!(matches!(err, BeansError::NoSuchScope { ref scope } if scope == "conversation"));
}

#[test]
fn test_thread_scope_is_private_to_each_factory() {
    let factories: Vec<_> = ["first.local", "second.local"]
        .into_iter()
        .map(|host| {
            let factory = DefaultListableBeanFactory::new();
            factory.register_scope("thread", Arc::new(ThreadScope::new())).unwrap();
            factory
                .register_bean_definition(
                    "x",
                    BeanDefinition::of_class(&endpoint_class())
                        .with_scope("thread")
                        .with_property("host", BeanValue::literal(host)),
                )
                .unwrap();
            factory
        })
        .collect();

    let first = factories[0].get_bean("x").unwrap();
    let second = factories[1].get_bean("x").unwrap();
    assert!(!first.ptr_eq(&second));
    assert_eq!(*first.downcast_ref::<Endpoint>().unwrap().host.lock(), "first.local");
    assert_eq!(*second.downcast_ref::<Endpoint>().unwrap().host.lock(), "second.local");
}

/// 没有绑定请求的线程上不可用
struct RequestScope;

impl Scope for RequestScope {
    fn get(&self, _name: &str, _factory: ObjectFactory<'_>) -> anyhow::Result<BeanObject> {
        Err(anyhow!("No request bound to the current thread"))
    }

    fn remove(&self, _name: &str) -> Option<BeanObject> {
        None
    }

    fn register_destruction_callback(&self, _name: &str, _callback: Box<dyn FnOnce() + Send>) {}
}

#[test]
fn test_inactive_scope_is_reported() {
    let factory = DefaultListableBeanFactory::new();
    factory.register_scope("request", Arc::new(RequestScope)).unwrap();
    factory
        .register_bean_definition("session", BeanDefinition::of_class(&endpoint_class()).with_scope("request"))
        .unwrap();

    let err = factory.get_bean("session").unwrap_err();
    let found = err
        .find(|e| matches!(e, BeansError::ScopeInactive { .. }))
        .expect("inactive scope error in cause chain");
    match found {
        BeansError::ScopeInactive { bean_name, scope, source } => {
            assert_eq!(bean_name, "session");
            assert_eq!(scope, "request");
            assert!(source.as_ref().unwrap().to_string().contains("No request bound"));
        }
        other => panic!("unexpected error: {other}"),
    }
}

// ==================== 循环引用 ====================

#[test]
fn test_circular_property_references_see_final_objects() {
    let factory = DefaultListableBeanFactory::new();
    register_cycle(&factory);

    let a = factory.get_bean("a").unwrap();
    let b = factory.get_bean("b").unwrap();

    assert!(peer_of(&a).ptr_eq(&b));
    assert!(peer_of(&b).ptr_eq(&a));
    assert!(*peer_of(&b).downcast_ref::<Node>().unwrap().initialized.lock());
    assert_eq!(factory.get_dependent_beans("a"), vec!["b"]);
}

#[test]
fn test_circular_pair_retrieved_from_two_threads() {
    let factory = DefaultListableBeanFactory::new();
    for (name, peer) in [("a", "b"), ("b", "a")] {
        factory
            .register_bean_definition(
                name,
                BeanDefinition::of_class(&slow_node_class()).with_property("peer", BeanValue::reference(peer)),
            )
            .unwrap();
    }

    let (tx, rx) = mpsc::channel();
    for name in ["a", "b"] {
        let factory = Arc::clone(&factory);
        let tx = tx.clone();
        std::thread::spawn(move || {
            let _ = tx.send((name, factory.get_bean(name).map_err(|e| e.to_string())));
        });
    }
    drop(tx);

    let mut beans = HashMap::new();
    for _ in 0..2 {
        let (name, result) = rx.recv_timeout(Duration::from_secs(10)).expect("retrieval returned");
        beans.insert(name, result.unwrap());
    }
    assert!(peer_of(&beans["a"]).ptr_eq(&beans["b"]));
    assert!(peer_of(&beans["b"]).ptr_eq(&beans["a"]));
}

#[test]
fn test_circular_reference_to_wrapped_bean_fails() {
    let factory = DefaultListableBeanFactory::new();
    register_cycle(&factory);
    factory.add_bean_post_processor(Arc::new(ProxyingPostProcessor { target: "a" }));

    let err = factory.get_bean("a").unwrap_err();
    let found = err
        .find(|e| matches!(e, BeansError::UnresolvableCircularReference { .. }))
        .expect("circular reference error in cause chain");
    match found {
        BeansError::UnresolvableCircularReference { bean_name, dependents } => {
            assert_eq!(bean_name, "a");
            assert_eq!(dependents, &vec!["b".to_string()]);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!factory.contains_singleton("a"));
    assert!(!factory.contains_singleton("b"));
}

#[test]
fn test_raw_injection_despite_wrapping_can_be_allowed() {
    let factory = DefaultListableBeanFactory::with_settings(ContainerSettings {
        allow_raw_injection_despite_wrapping: true,
        ..ContainerSettings::default()
    });
    register_cycle(&factory);
    factory.add_bean_post_processor(Arc::new(ProxyingPostProcessor { target: "a" }));

    let a = factory.get_bean("a").unwrap();
    let proxy = a.downcast_ref::<Proxy>().unwrap();
    let b = factory.get_bean("b").unwrap();
    // b 拿到的是包装前的对象
    assert!(peer_of(&b).ptr_eq(&proxy.target));
    assert!(!peer_of(&b).ptr_eq(&a));
}

#[test]
fn test_circular_references_disallowed() {
    let factory = DefaultListableBeanFactory::new();
    factory.set_allow_circular_references(false);
    register_cycle(&factory);

    let err = factory.get_bean("a").unwrap_err();
    assert!(err.is_currently_in_creation());
}

// ==================== 构造器选择 ====================

#[test]
fn test_closest_constructor_wins_every_time() {
    for _ in 0..3 {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "text",
                BeanDefinition::of_class(&text_class())
                    .with_scope("prototype")
                    .with_constructor_arg(BeanValue::literal("hello")),
            )
            .unwrap();

        for _ in 0..3 {
            let bean = factory.get_bean("text").unwrap();
            let text = bean.downcast_ref::<Text>().unwrap();
            assert_eq!(text.via, "string");
            assert_eq!(text.value, "hello");
        }
    }
}

#[test]
fn test_strict_resolution_reports_ambiguous_constructors() {
    let factory = DefaultListableBeanFactory::new();
    factory
        .register_bean_definition(
            "text",
            BeanDefinition::of_class(&text_class())
                .with_lenient_constructor_resolution(false)
                .with_constructor_arg(BeanValue::literal("hello")),
        )
        .unwrap();

    let err = factory.get_bean("text").unwrap_err();
    let found = err
        .find(|e| matches!(e, BeansError::AmbiguousResolution { .. }))
        .expect("ambiguity error in cause chain");
    match found {
        BeansError::AmbiguousResolution { bean_name, candidates, .. } => {
            assert_eq!(bean_name, "text");
            let mut candidates = candidates.clone();
            candidates.sort();
            assert_eq!(candidates, vec!["Text(Object)", "Text(String)"]);
        }
        other => panic!("unexpected error: {other}"),
    }
}

struct Clock;
struct Ledger;
struct Report;

#[test]
fn test_failed_constructor_candidates_are_kept_as_suppressed() {
    let clock = BeanClass::builder::<Clock>("Clock").build();
    let ledger = BeanClass::builder::<Ledger>("Ledger").build();
    let report = BeanClass::builder::<Report>("Report")
        .constructor(vec![param("clock", &clock)], |_| Ok(Report))
        .constructor(vec![param("ledger", &ledger)], |_| Ok(Report))
        .build();

    let factory = DefaultListableBeanFactory::new();
    factory
        .register_bean_definition(
            "report",
            BeanDefinition::of_class(&report).with_autowire_mode(AutowireMode::Constructor),
        )
        .unwrap();

    let err = factory.get_bean("report").unwrap_err();
    let found = err
        .find(|e| matches!(e, BeansError::UnsatisfiedDependency { .. }))
        .expect("unsatisfied dependency in cause chain");
    match found {
        BeansError::UnsatisfiedDependency {
            bean_name,
            injection_point,
            suppressed,
            ..
        } => {
            assert_eq!(bean_name, "report");
            assert_eq!(suppressed.len(), 1);
            match &suppressed[0] {
                BeansError::UnsatisfiedDependency {
                    injection_point: other, ..
                } => assert_ne!(other, injection_point),
                other => panic!("unexpected suppressed error: {other}"),
            }
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!factory.contains_singleton("report"));
}

// ==================== depends-on ====================

#[test]
fn test_depends_on_creates_dependency_first() {
    let journal: Journal = Arc::default();
    let factory = DefaultListableBeanFactory::new();
    factory
        .register_bean_definition("a", BeanDefinition::of_class(&step_class("a", &journal)).with_init_method("init"))
        .unwrap();
    factory
        .register_bean_definition(
            "b",
            BeanDefinition::of_class(&step_class("b", &journal))
                .with_init_method("init")
                .with_depends_on(["a"]),
        )
        .unwrap();

    factory.get_bean("b").unwrap();

    assert_eq!(*journal.lock(), vec!["a:new", "a:init", "b:new", "b:init"]);
    assert_eq!(factory.get_dependent_beans("a"), vec!["b"]);
}

#[test]
fn test_depends_on_cycle_fails_before_construction() {
    let journal: Journal = Arc::default();
    let factory = DefaultListableBeanFactory::new();
    factory
        .register_bean_definition("a", BeanDefinition::of_class(&step_class("a", &journal)).with_depends_on(["b"]))
        .unwrap();
    factory
        .register_bean_definition("b", BeanDefinition::of_class(&step_class("b", &journal)).with_depends_on(["a"]))
        .unwrap();

    let err = factory.get_bean("a").unwrap_err();
    assert!(err.find(|e| matches!(e, BeansError::DependsOnCycle { .. })).is_some());
    assert!(journal.lock().is_empty());
    assert!(factory.get_singleton_names().is_empty());
}

// ==================== 工厂 bean 与父工厂 ====================

struct Connection {
    url: String,
}

fn connection_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| BeanClass::builder::<Connection>("Connection").build()))
}

struct ConnectionFactory {
    url: String,
    produced: AtomicUsize,
}

impl FactoryBean for ConnectionFactory {
    fn get_object(&self) -> anyhow::Result<Option<BeanObject>> {
        self.produced.fetch_add(1, Ordering::SeqCst);
        let connection = Connection { url: self.url.clone() };
        Ok(Some(BeanObject::new(connection, &connection_class())))
    }

    fn object_type(&self) -> Option<Arc<BeanClass>> {
        Some(connection_class())
    }
}

fn connection_factory_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| {
        BeanClass::builder::<ConnectionFactory>("ConnectionFactory")
            .constructor(vec![param("url", &classes::string())], |args| {
                Ok(ConnectionFactory {
                    url: args.string(0)?,
                    produced: AtomicUsize::new(0),
                })
            })
            .factory_bean()
            .build()
    }))
}

#[test]
fn test_factory_bean_exposes_cached_product() {
    let factory = DefaultListableBeanFactory::new();
    factory
        .register_bean_definition(
            "connection",
            BeanDefinition::of_class(&connection_factory_class())
                .with_constructor_arg(BeanValue::literal("postgres://localhost/app")),
        )
        .unwrap();

    let first = factory.get_bean("connection").unwrap();
    let second = factory.get_bean("connection").unwrap();
    assert!(first.ptr_eq(&second));
    assert_eq!(first.downcast_ref::<Connection>().unwrap().url, "postgres://localhost/app");

    let creator = factory.get_bean_typed::<ConnectionFactory>("&connection").unwrap();
    assert_eq!(creator.produced.load(Ordering::SeqCst), 1);
    assert!(factory.is_factory_bean("connection").unwrap());

    let by_type = factory.get_bean_of_type(&connection_class()).unwrap();
    assert!(by_type.ptr_eq(&first));
}

#[test]
fn test_unknown_names_are_delegated_to_parent() {
    let parent = DefaultListableBeanFactory::new();
    parent
        .register_bean_definition(
            "endpoint",
            BeanDefinition::of_class(&endpoint_class()).with_property("host", BeanValue::literal("parent.local")),
        )
        .unwrap();

    let child = DefaultListableBeanFactory::new();
    child.set_parent_bean_factory(Arc::clone(&parent)).unwrap();
    child
        .register_bean_definition(
            "client",
            BeanDefinition::of_class(&node_class()).with_property("peer", BeanValue::reference("endpoint")),
        )
        .unwrap();

    let client = child.get_bean("client").unwrap();
    let endpoint = parent.get_bean("endpoint").unwrap();
    assert!(peer_of(&client).ptr_eq(&endpoint));
    assert!(!child.contains_singleton("endpoint"));
    assert!(matches!(
        child.get_bean("missing").unwrap_err(),
        BeansError::NoSuchBeanDefinition { .. }
    ));
}
