//! 通过 ApplicationContext 刷新的端到端场景：后置处理器流水线、组件扫描和关闭顺序

use std::sync::OnceLock;

use griffin_core::prelude::*;
use griffin_core::{BeanDefinitionRegistryPostProcessor, HIGHEST_PRECEDENCE, LOWEST_PRECEDENCE};
use parking_lot::Mutex;

type Journal = Arc<Mutex<Vec<String>>>;

// ==================== 注册后置处理器 ====================

struct Recorder {
    label: String,
    order: i32,
    /// 调用时额外注册的处理器
    spawn: Option<String>,
    journal: Journal,
}

impl Ordered for Recorder {
    fn order(&self) -> i32 {
        self.order
    }
}

impl BeanFactoryPostProcessor for Recorder {
    fn post_process_bean_factory(&self, _factory: &DefaultListableBeanFactory) -> BeansResult<()> {
        self.journal.lock().push(format!("{}:factory", self.label));
        Ok(())
    }

    fn as_registry_post_processor(self: Arc<Self>) -> Option<Arc<dyn BeanDefinitionRegistryPostProcessor>> {
        Some(self)
    }
}

impl BeanDefinitionRegistryPostProcessor for Recorder {
    fn post_process_bean_definition_registry(&self, registry: &dyn BeanDefinitionRegistry) -> BeansResult<()> {
        self.journal.lock().push(format!("{}:registry", self.label));
        if let Some(spawn) = &self.spawn {
            let class = RecorderSpec::new(spawn).class(&self.journal);
            registry.register_bean_definition(spawn, BeanDefinition::of_class(&class))?;
        }
        Ok(())
    }
}

#[derive(Clone)]
struct RecorderSpec {
    label: String,
    order: Option<i32>,
    priority: bool,
    spawn: Option<String>,
}

impl RecorderSpec {
    fn new(label: &str) -> Self {
        Self {
            label: label.to_string(),
            order: None,
            priority: false,
            spawn: None,
        }
    }

    fn ordered(mut self, order: i32) -> Self {
        self.order = Some(order);
        self
    }

    fn priority(mut self) -> Self {
        self.priority = true;
        self.order = Some(HIGHEST_PRECEDENCE);
        self
    }

    fn spawning(mut self, name: &str) -> Self {
        self.spawn = Some(name.to_string());
        self
    }

    fn class(&self, journal: &Journal) -> Arc<BeanClass> {
        let spec = self.clone();
        let journal = Arc::clone(journal);
        let builder = BeanClass::builder::<Recorder>(format!("Recorder[{}]", self.label)).constructor(vec![], move |_| {
            Ok(Recorder {
                label: spec.label.clone(),
                order: spec.order.unwrap_or(LOWEST_PRECEDENCE),
                spawn: spec.spawn.clone(),
                journal: Arc::clone(&journal),
            })
        });
        let builder = match (self.priority, self.order) {
            (true, _) => builder.priority_ordered(),
            (false, Some(_)) => builder.ordered(),
            (false, None) => builder,
        };
        builder.registry_post_processor().build()
    }
}

/// 只修改工厂、不注册定义的处理器
struct FactoryHook {
    journal: Journal,
}

impl BeanFactoryPostProcessor for FactoryHook {
    fn post_process_bean_factory(&self, _factory: &DefaultListableBeanFactory) -> BeansResult<()> {
        self.journal.lock().push("hook:factory".to_string());
        Ok(())
    }
}

fn factory_hook_class(journal: &Journal) -> Arc<BeanClass> {
    let journal = Arc::clone(journal);
    BeanClass::builder::<FactoryHook>("FactoryHook")
        .constructor(vec![], move |_| Ok(FactoryHook { journal: Arc::clone(&journal) }))
        .bean_factory_post_processor()
        .build()
}

#[test]
fn test_registry_processors_run_by_tier_not_registration_order() {
    let journal: Journal = Arc::default();
    let context = ApplicationContext::builder()
        .register("unordered", BeanDefinition::of_class(&RecorderSpec::new("unordered").class(&journal)))
        .register("ordered", BeanDefinition::of_class(&RecorderSpec::new("ordered").ordered(5).class(&journal)))
        .register("priority", BeanDefinition::of_class(&RecorderSpec::new("priority").priority().class(&journal)))
        .build()
        .unwrap();

    context.refresh().unwrap();

    assert_eq!(
        *journal.lock(),
        vec![
            "priority:registry",
            "ordered:registry",
            "unordered:registry",
            "priority:factory",
            "ordered:factory",
            "unordered:factory",
        ]
    );
}

#[test]
fn test_processor_registered_by_processor_runs_before_factory_hooks() {
    let journal: Journal = Arc::default();
    let context = ApplicationContext::builder()
        .register("hook", BeanDefinition::of_class(&factory_hook_class(&journal)))
        .register("spawner", BeanDefinition::of_class(&RecorderSpec::new("spawner").spawning("spawned").class(&journal)))
        .build()
        .unwrap();

    context.refresh().unwrap();

    assert_eq!(
        *journal.lock(),
        vec![
            "spawner:registry",
            "spawned:registry",
            "spawner:factory",
            "spawned:factory",
            "hook:factory",
        ]
    );
    assert!(context.bean_factory().contains_bean_definition("spawned"));
}

/// 每次调用都再注册一个自己
struct Endless {
    journal: Journal,
}

impl BeanFactoryPostProcessor for Endless {
    fn post_process_bean_factory(&self, _factory: &DefaultListableBeanFactory) -> BeansResult<()> {
        Ok(())
    }

    fn as_registry_post_processor(self: Arc<Self>) -> Option<Arc<dyn BeanDefinitionRegistryPostProcessor>> {
        Some(self)
    }
}

impl BeanDefinitionRegistryPostProcessor for Endless {
    fn post_process_bean_definition_registry(&self, registry: &dyn BeanDefinitionRegistry) -> BeansResult<()> {
        let next = {
            let mut journal = self.journal.lock();
            journal.push("endless:registry".to_string());
            journal.len()
        };
        registry.register_bean_definition(&format!("endless{}", next), BeanDefinition::of_class(&endless_class(&self.journal)))
    }
}

fn endless_class(journal: &Journal) -> Arc<BeanClass> {
    let journal = Arc::clone(journal);
    BeanClass::builder::<Endless>("Endless")
        .constructor(vec![], move |_| Ok(Endless { journal: Arc::clone(&journal) }))
        .registry_post_processor()
        .build()
}

#[test]
fn test_endless_registration_fails_refresh() {
    let journal: Journal = Arc::default();
    let context = ApplicationContext::builder()
        .settings(griffin_core::ContainerSettings {
            max_registry_post_processor_passes: 4,
            ..Default::default()
        })
        .register("endless0", BeanDefinition::of_class(&endless_class(&journal)))
        .build()
        .unwrap();

    let err = context.refresh().unwrap_err();
    assert!(matches!(err, BeansError::IllegalState(_)));
    assert!(!context.is_active());
    assert_eq!(journal.lock().len(), 4);
}

// ==================== 组件扫描 ====================

struct Greeter {
    greeting: String,
}

fn greeter_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| {
        BeanClass::builder::<Greeter>("Greeter")
            .constructor(vec![param("greeting", &classes::string())], |args| {
                Ok(Greeter {
                    greeting: args.string(0)?,
                })
            })
            .build()
    }))
}

fn greeting_from_config(definition: BeanDefinition) -> BeanDefinition {
    definition.with_constructor_arg(BeanValue::literal("${greeting.text:hello}"))
}

fn dev_greeting(definition: BeanDefinition) -> BeanDefinition {
    definition
        .with_constructor_arg(BeanValue::literal("hello, developer"))
        .with_lazy_init(true)
}

griffin_core::inventory::submit! {
    ComponentRegistration::new("", greeter_class).with_definition(greeting_from_config)
}

griffin_core::inventory::submit! {
    ComponentRegistration::new("devGreeter", greeter_class)
        .with_definition(dev_greeting)
        .with_profiles(&["dev"])
}

fn greeting_source() -> Box<MapPropertySource> {
    Box::new(MapPropertySource::new("test").with_property("greeting.text", ConfigValue::String("hi there".into())))
}

#[test]
fn test_component_scan_registers_submitted_components() {
    let context = ApplicationContext::builder()
        .add_property_source(greeting_source())
        .component_scan(true)
        .resolve_placeholders(true)
        .run()
        .unwrap();

    let greeter = context.get_bean_typed::<Greeter>("greeter").unwrap();
    assert_eq!(greeter.greeting, "hi there");
    assert!(!context.contains_bean("devGreeter"));
    assert_eq!(context.get_bean_names_for_type(&greeter_class(), true, true), vec!["greeter"]);
}

#[test]
fn test_component_scan_honours_active_profiles() {
    let context = ApplicationContext::builder()
        .active_profiles(["dev"])
        .component_scan(true)
        .resolve_placeholders(true)
        .run()
        .unwrap();

    let greeter = context.get_bean_typed::<Greeter>("greeter").unwrap();
    assert_eq!(greeter.greeting, "hello");
    assert!(context.bean_factory().get_bean_definition("devGreeter").unwrap().is_lazy_init());
    assert!(!context.bean_factory().contains_singleton("devGreeter"));
    let dev = context.get_bean_typed::<Greeter>("devGreeter").unwrap();
    assert_eq!(dev.greeting, "hello, developer");
}

#[test]
fn test_component_scan_disabled_by_default() {
    let context = ApplicationContext::builder().run().unwrap();
    assert!(!context.contains_bean("greeter"));
}

// ==================== 配置类 ====================

struct Salutation {
    text: String,
    journal: Journal,
}

struct SalutationConfig {
    text: String,
    journal: Journal,
}

fn salutation_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| {
        BeanClass::builder::<Salutation>("Salutation")
            .method("retire", |salutation| {
                salutation.journal.lock().push(format!("retire:{}", salutation.text));
                Ok(())
            })
            .build()
    }))
}

fn salutation_config_class(journal: &Journal) -> Arc<BeanClass> {
    let journal = Arc::clone(journal);
    BeanClass::builder::<SalutationConfig>("SalutationConfig")
        .constructor(vec![param("text", &classes::string())], move |args| {
            Ok(SalutationConfig {
                text: args.string(0)?,
                journal: Arc::clone(&journal),
            })
        })
        .instance_factory("salutation", &salutation_class(), vec![], |config, _| {
            let salutation = Salutation {
                text: config.text.clone(),
                journal: Arc::clone(&config.journal),
            };
            Ok(Some(BeanObject::new(salutation, &salutation_class())))
        })
        .bean_method(
            BeanMethod::new("salutation")
                .named(&["salutation", "welcome"])
                .destroy_method("retire"),
        )
        .build()
}

#[test]
fn test_configuration_class_bean_methods_are_registered_on_refresh() {
    let journal: Journal = Arc::default();
    let context = ApplicationContext::builder()
        .add_property_source(greeting_source())
        .resolve_placeholders(true)
        .register(
            "salutationConfig",
            BeanDefinition::of_class(&salutation_config_class(&journal))
                .with_constructor_arg(BeanValue::literal("${greeting.text}")),
        )
        .run()
        .unwrap();

    let definition = context.bean_factory().get_bean_definition("salutation").unwrap();
    assert_eq!(definition.factory_bean_name.as_deref(), Some("salutationConfig"));
    assert_eq!(definition.factory_method_name.as_deref(), Some("salutation"));
    assert!(context.bean_factory().contains_singleton("salutation"));

    let salutation = context.get_bean_typed::<Salutation>("welcome").unwrap();
    assert_eq!(salutation.text, "hi there");
    assert!(context.get_bean("salutation").unwrap().ptr_eq(&context.get_bean("welcome").unwrap()));

    context.close();
    assert_eq!(*journal.lock(), vec!["retire:hi there"]);
}

// ==================== 关闭顺序 ====================

struct Resource {
    name: &'static str,
    journal: Journal,
}

fn resource_class(name: &'static str, journal: &Journal) -> Arc<BeanClass> {
    let journal = Arc::clone(journal);
    BeanClass::builder::<Resource>(format!("Resource[{}]", name))
        .constructor(vec![], move |_| {
            journal.lock().push(format!("{}:open", name));
            Ok(Resource {
                name,
                journal: Arc::clone(&journal),
            })
        })
        .method("release", |resource| {
            resource.journal.lock().push(format!("{}:release", resource.name));
            Ok(())
        })
        .build()
}

#[test]
fn test_close_releases_dependents_first() {
    let journal: Journal = Arc::default();
    let context = ApplicationContext::builder()
        .register(
            "pool",
            BeanDefinition::of_class(&resource_class("pool", &journal)).with_destroy_method("release"),
        )
        .register(
            "repository",
            BeanDefinition::of_class(&resource_class("repository", &journal))
                .with_destroy_method("release")
                .with_depends_on(["pool"]),
        )
        .run()
        .unwrap();

    let hook_journal = Arc::clone(&journal);
    context.register_shutdown_hook(move || {
        hook_journal.lock().push("hook".to_string());
        Ok(())
    });
    context.close();

    assert_eq!(
        *journal.lock(),
        vec!["pool:open", "repository:open", "hook", "repository:release", "pool:release"]
    );
    assert!(context.is_closed());
    assert!(context.bean_factory().get_singleton_names().iter().all(|name| name != "pool"));
}
