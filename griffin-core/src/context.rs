//! 应用上下文
//!
//! [`ApplicationContext`] 在 [`DefaultListableBeanFactory`] 之上组合配置环境、事件多播器和
//! 后置处理器流水线。`refresh` 的顺序：
//!
//! 1. 准备工厂：注解处理器、感知接口处理器、可注入的上下文和环境
//! 2. 调用工厂后置处理器（注册后置处理器会反复扫描直到不再产生新的）
//! 3. 注册 bean 后置处理器
//! 4. 初始化多播器并注册监听器
//! 5. 冻结配置，预实例化非懒加载单例
//! 6. 发布 [`ContextRefreshedEvent`]
//!
//! 任何一步失败都会销毁已创建的单例，然后把错误返回给调用者。

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;

use crate::annotation::register_annotation_config_processors;
use crate::bean_factory::{
    BeanDefinitionRegistry, BeanFactory, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, ListableBeanFactory,
};
use crate::class::{BeanClass, Capability, Instance};
use crate::config::{Environment, PropertySource};
use crate::constants::{ENVIRONMENT_BEAN_NAME, EVENT_MULTICASTER_BEAN_NAME};
use crate::definition::BeanDefinition;
use crate::error::{BeansError, BeansResult};
use crate::event::{
    multicaster_class, ApplicationEventMulticaster, ApplicationEventPublisher, ApplicationListener,
    ContextClosedEvent, ContextRefreshedEvent, Event, SimpleApplicationEventMulticaster,
};
use crate::merged::RootBeanDefinition;
use crate::object::BeanObject;
use crate::post_processor_registration::{invoke_bean_factory_post_processors, register_bean_post_processors};
use crate::processor::{
    BeanFactoryPostProcessor, BeanPostProcessor, DestructionAwareBeanPostProcessor, MergedBeanDefinitionPostProcessor,
};
use crate::scope::Scope;
use crate::settings::ContainerSettings;
use crate::utils::dependency::validate_dependency_graph;

/// Shutdown hook类型
pub type ShutdownHook = Box<dyn Fn() -> anyhow::Result<()> + Send + Sync>;

/// 获得所属应用上下文的引用
pub trait ApplicationContextAware: Send + Sync {
    fn set_application_context(&self, context: Arc<ApplicationContext>) -> anyhow::Result<()>;
}

/// 获得配置环境的引用
pub trait EnvironmentAware: Send + Sync {
    fn set_environment(&self, environment: Arc<Environment>) -> anyhow::Result<()>;
}

/// 上下文的类型描述，用于把上下文作为依赖注入
pub fn application_context_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| BeanClass::builder::<ApplicationContext>("ApplicationContext").build()))
}

/// 配置环境的类型描述
pub fn environment_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| BeanClass::builder::<Environment>("Environment").build()))
}

/// 应用上下文
///
/// 持有 BeanFactory、Environment 和事件多播器。只能刷新一次，`close` 可重复调用。
pub struct ApplicationContext {
    self_ref: Weak<ApplicationContext>,
    display_name: String,

    /// Bean 工厂 - 负责 Bean 的创建和管理
    bean_factory: Arc<DefaultListableBeanFactory>,

    /// 配置环境
    environment: Arc<Environment>,

    multicaster: Arc<SimpleApplicationEventMulticaster>,

    parent: Option<Arc<ApplicationContext>>,

    /// 通过代码添加的工厂后置处理器，先于容器中发现的执行
    bean_factory_post_processors: RwLock<Vec<Arc<dyn BeanFactoryPostProcessor>>>,

    /// 通过代码添加的监听器，刷新时加入多播器
    listeners: RwLock<Vec<Arc<dyn ApplicationListener>>>,

    shutdown_hooks: RwLock<Vec<ShutdownHook>>,

    component_scan: bool,
    resolve_placeholders: bool,

    refreshed: AtomicBool,
    active: AtomicBool,
    closed: AtomicBool,
}

impl ApplicationContext {
    pub fn builder() -> ApplicationContextBuilder {
        ApplicationContextBuilder::new()
    }

    /// 使用默认配置创建未刷新的上下文
    pub fn new() -> Arc<Self> {
        Self::create(ApplicationContextParts::default())
    }

    fn create(parts: ApplicationContextParts) -> Arc<Self> {
        let multicaster = Arc::new(if parts.async_events {
            SimpleApplicationEventMulticaster::new_async()
        } else {
            SimpleApplicationEventMulticaster::new()
        });
        Arc::new_cyclic(|weak| Self {
            self_ref: weak.clone(),
            display_name: parts.display_name,
            bean_factory: parts.bean_factory,
            environment: parts.environment,
            multicaster,
            parent: parts.parent,
            bean_factory_post_processors: RwLock::new(Vec::new()),
            listeners: RwLock::new(Vec::new()),
            shutdown_hooks: RwLock::new(Vec::new()),
            component_scan: parts.component_scan,
            resolve_placeholders: parts.resolve_placeholders,
            refreshed: AtomicBool::new(false),
            active: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        })
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    /// 获取内部的 BeanFactory
    pub fn bean_factory(&self) -> &Arc<DefaultListableBeanFactory> {
        &self.bean_factory
    }

    /// 获取 Environment
    pub fn environment(&self) -> &Arc<Environment> {
        &self.environment
    }

    pub fn multicaster(&self) -> &Arc<SimpleApplicationEventMulticaster> {
        &self.multicaster
    }

    pub fn parent(&self) -> Option<&Arc<ApplicationContext>> {
        self.parent.as_ref()
    }

    /// 刷新成功且尚未关闭
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// 添加工厂后置处理器，刷新时先于容器中发现的处理器执行
    pub fn add_bean_factory_post_processor(&self, processor: Arc<dyn BeanFactoryPostProcessor>) {
        let mut processors = self.bean_factory_post_processors.write();
        processors.push(processor);
        tracing::debug!("Added BeanFactoryPostProcessor, total: {}", processors.len());
    }

    pub fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        self.bean_factory.add_bean_post_processor(processor);
    }

    /// 添加监听器；刷新后添加的监听器立即生效
    pub fn add_application_listener(&self, listener: Arc<dyn ApplicationListener>) {
        if self.is_active() {
            self.multicaster.add_listener(Arc::clone(&listener));
        }
        self.listeners.write().push(listener);
    }

    /// 注册 shutdown hook，`close` 时在销毁单例之前按注册顺序执行
    pub fn register_shutdown_hook<F>(&self, hook: F)
    where
        F: Fn() -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut hooks = self.shutdown_hooks.write();
        hooks.push(Box::new(hook));
        tracing::debug!("Registered shutdown hook, total: {}", hooks.len());
    }

    pub fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> BeansResult<()> {
        self.bean_factory.register_bean_definition(name, definition)
    }

    pub fn register_singleton(&self, name: &str, object: BeanObject) -> BeansResult<()> {
        self.bean_factory.register_singleton(name, object)
    }

    /// 加载或刷新配置并实例化所有非懒加载单例
    pub fn refresh(&self) -> BeansResult<()> {
        if self.refreshed.swap(true, Ordering::AcqRel) {
            return Err(BeansError::illegal_state(format!(
                "Context '{}' does not support multiple refresh attempts: just call 'refresh' once",
                self.display_name
            )));
        }
        tracing::info!("Refreshing {}", self.display_name);

        match self.do_refresh() {
            Ok(()) => {
                self.active.store(true, Ordering::Release);
                let event = ContextRefreshedEvent::new(
                    self.display_name.clone(),
                    self.bean_factory.get_singleton_names().len(),
                );
                self.publish_event(Arc::new(event));
                tracing::info!("{} refreshed", self.display_name);
                Ok(())
            }
            Err(e) => {
                tracing::warn!(
                    "Exception encountered during context initialization - cancelling refresh attempt: {}",
                    e
                );
                self.bean_factory.destroy_singletons();
                self.active.store(false, Ordering::Release);
                Err(e)
            }
        }
    }

    fn do_refresh(&self) -> BeansResult<()> {
        self.prepare_bean_factory()?;

        let programmatic = self.bean_factory_post_processors.read().clone();
        invoke_bean_factory_post_processors(&self.bean_factory, &programmatic)?;
        register_bean_post_processors(&self.bean_factory)?;

        // 监听器探测器同时是合并定义处理器，移到链尾
        let detector = Arc::new(ApplicationListenerDetector::new(
            Arc::clone(&self.multicaster) as Arc<dyn ApplicationEventMulticaster>
        ));
        self.bean_factory.add_bean_post_processor(detector);

        self.init_application_event_multicaster()?;
        self.register_listeners();

        self.bean_factory.freeze_configuration();
        self.bean_factory.preinstantiate_singletons()
    }

    fn prepare_bean_factory(&self) -> BeansResult<()> {
        let factory = &self.bean_factory;
        register_annotation_config_processors(factory.as_ref())?;
        if self.component_scan {
            crate::component::register_component_scan_processor(factory.as_ref())?;
        }
        if self.resolve_placeholders {
            crate::placeholder::register_placeholder_configurer(factory.as_ref())?;
        }

        factory.add_bean_post_processor(Arc::new(ApplicationContextAwareProcessor {
            context: Weak::clone(&self.self_ref),
            environment: Arc::clone(&self.environment),
        }));

        let weak = Weak::clone(&self.self_ref);
        factory.register_resolvable_supplier(
            &application_context_class(),
            Arc::new(move || {
                let context = weak
                    .upgrade()
                    .ok_or_else(|| BeansError::illegal_state("Application context has been dropped"))?;
                Ok(BeanObject::from_arc(context, application_context_class()))
            }),
        );
        let environment = Arc::clone(&self.environment);
        factory.register_resolvable_supplier(
            &environment_class(),
            Arc::new(move || {
                let instance: Instance = environment.clone();
                Ok(BeanObject::from_arc(instance, environment_class()))
            }),
        );

        if !contains_local_bean(factory, ENVIRONMENT_BEAN_NAME) {
            let instance: Instance = self.environment.clone();
            factory.register_singleton(ENVIRONMENT_BEAN_NAME, BeanObject::from_arc(instance, environment_class()))?;
        }
        Ok(())
    }

    fn init_application_event_multicaster(&self) -> BeansResult<()> {
        if contains_local_bean(&self.bean_factory, EVENT_MULTICASTER_BEAN_NAME) {
            tracing::debug!("Using existing bean '{}'", EVENT_MULTICASTER_BEAN_NAME);
            return Ok(());
        }
        let instance: Instance = self.multicaster.clone();
        self.bean_factory
            .register_singleton(EVENT_MULTICASTER_BEAN_NAME, BeanObject::from_arc(instance, multicaster_class()))
    }

    fn register_listeners(&self) {
        for listener in self.listeners.read().iter() {
            self.multicaster.add_listener(Arc::clone(listener));
        }
        // 已经存在的单例监听器不会再经过后置处理器
        for name in self.bean_factory.get_singleton_names() {
            if let Ok(Some(bean)) = self.bean_factory.get_singleton(&name) {
                if let Some(listener) = bean.as_application_listener() {
                    self.multicaster.add_listener(listener);
                }
            }
        }
    }

    /// 检查 depends-on 声明中缺失的 bean 和环
    pub fn validate_dependencies(&self) -> BeansResult<()> {
        let graph = self.bean_factory.get_dependency_graph();
        validate_dependency_graph(&graph).map_err(|e| BeansError::Other(e.into()))?;
        tracing::info!("Dependency validation passed for {} bean(s)", graph.len());
        Ok(())
    }

    /// 关闭上下文：发布关闭事件，执行 shutdown hooks，然后销毁所有单例
    ///
    /// 未刷新或已经关闭时什么都不做。
    pub fn close(&self) {
        if !self.refreshed.load(Ordering::Acquire) || self.closed.swap(true, Ordering::AcqRel) {
            return;
        }
        tracing::info!("Closing {}", self.display_name);

        if self.is_active() {
            self.publish_event(Arc::new(ContextClosedEvent::new(self.display_name.clone())));
        }

        let hooks = self.shutdown_hooks.read();
        tracing::info!("Executing {} shutdown hook(s)", hooks.len());
        for (idx, hook) in hooks.iter().enumerate() {
            match hook() {
                Ok(()) => tracing::debug!("Shutdown hook {} executed successfully", idx + 1),
                Err(e) => tracing::warn!("Shutdown hook {} failed: {}", idx + 1, e),
            }
        }
        drop(hooks);

        self.bean_factory.destroy_singletons();
        self.multicaster.remove_all_listeners();
        self.active.store(false, Ordering::Release);
        tracing::info!("{} closed", self.display_name);
    }
}

impl ApplicationEventPublisher for ApplicationContext {
    fn publish_event(&self, event: Arc<dyn Event>) {
        tracing::trace!("Publishing event in {}: {}", self.display_name, event.event_name());
        self.multicaster.multicast_event(Arc::clone(&event));
        if let Some(parent) = &self.parent {
            parent.publish_event(event);
        }
    }
}

impl BeanFactory for ApplicationContext {
    fn get_bean(&self, name: &str) -> BeansResult<BeanObject> {
        self.bean_factory.get_bean(name)
    }

    fn get_bean_with_args(&self, name: &str, args: Vec<BeanObject>) -> BeansResult<BeanObject> {
        self.bean_factory.get_bean_with_args(name, args)
    }

    fn get_bean_of_type(&self, class: &Arc<BeanClass>) -> BeansResult<BeanObject> {
        self.bean_factory.get_bean_of_type(class)
    }

    fn contains_bean(&self, name: &str) -> bool {
        self.bean_factory.contains_bean(name)
    }

    fn is_singleton(&self, name: &str) -> BeansResult<bool> {
        self.bean_factory.is_singleton(name)
    }

    fn is_prototype(&self, name: &str) -> BeansResult<bool> {
        self.bean_factory.is_prototype(name)
    }

    fn is_type_match(&self, name: &str, class: &BeanClass) -> BeansResult<bool> {
        self.bean_factory.is_type_match(name, class)
    }

    fn get_type(&self, name: &str) -> BeansResult<Option<Arc<BeanClass>>> {
        self.bean_factory.get_type(name)
    }

    fn get_aliases(&self, name: &str) -> Vec<String> {
        self.bean_factory.get_aliases(name)
    }
}

impl ListableBeanFactory for ApplicationContext {
    fn get_bean_names_for_type(&self, class: &BeanClass, include_non_singletons: bool, allow_eager_init: bool) -> Vec<String> {
        self.bean_factory
            .get_bean_names_for_type(class, include_non_singletons, allow_eager_init)
    }

    fn get_bean_names_for_capability(
        &self,
        capability: Capability,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> Vec<String> {
        self.bean_factory
            .get_bean_names_for_capability(capability, include_non_singletons, allow_eager_init)
    }

    fn get_beans_of_type(&self, class: &BeanClass) -> BeansResult<Vec<(String, BeanObject)>> {
        self.bean_factory.get_beans_of_type(class)
    }
}

impl std::fmt::Debug for ApplicationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplicationContext")
            .field("display_name", &self.display_name)
            .field("active", &self.is_active())
            .field("closed", &self.is_closed())
            .finish()
    }
}

fn contains_local_bean(factory: &DefaultListableBeanFactory, name: &str) -> bool {
    factory.contains_singleton(name) || factory.contains_bean_definition(name)
}

/// 在初始化前回调 `EnvironmentAware` 和 `ApplicationContextAware`
struct ApplicationContextAwareProcessor {
    context: Weak<ApplicationContext>,
    environment: Arc<Environment>,
}

impl BeanPostProcessor for ApplicationContextAwareProcessor {
    fn post_process_before_initialization(&self, bean: BeanObject, bean_name: &str) -> BeansResult<Option<BeanObject>> {
        if let Some(aware) = bean.as_environment_aware() {
            aware
                .set_environment(Arc::clone(&self.environment))
                .map_err(|e| BeansError::creation_caused_by(bean_name, "Failed to set environment", e))?;
        }
        if let Some(aware) = bean.as_application_context_aware() {
            let context = self
                .context
                .upgrade()
                .ok_or_else(|| BeansError::illegal_state("Application context has been dropped"))?;
            aware
                .set_application_context(context)
                .map_err(|e| BeansError::creation_caused_by(bean_name, "Failed to set application context", e))?;
        }
        Ok(Some(bean))
    }
}

/// 把单例监听器 bean 加入多播器，销毁时移除
struct ApplicationListenerDetector {
    multicaster: Arc<dyn ApplicationEventMulticaster>,
    /// bean 名称 -> 是否单例
    singleton_names: RwLock<HashMap<String, bool>>,
}

impl ApplicationListenerDetector {
    fn new(multicaster: Arc<dyn ApplicationEventMulticaster>) -> Self {
        Self {
            multicaster,
            singleton_names: RwLock::new(HashMap::new()),
        }
    }
}

impl BeanPostProcessor for ApplicationListenerDetector {
    fn post_process_after_initialization(&self, bean: BeanObject, bean_name: &str) -> BeansResult<Option<BeanObject>> {
        let Some(listener) = bean.as_application_listener() else {
            return Ok(Some(bean));
        };
        match self.singleton_names.read().get(bean_name).copied() {
            Some(true) => self.multicaster.add_listener(listener),
            Some(false) => tracing::warn!(
                "Inner bean '{}' implements ApplicationListener but is not reachable for event multicasting by its \
                 containing ApplicationContext because it does not have singleton scope",
                bean_name
            ),
            None => {}
        }
        Ok(Some(bean))
    }

    fn as_merged_definition_processor(self: Arc<Self>) -> Option<Arc<dyn MergedBeanDefinitionPostProcessor>> {
        Some(self)
    }

    fn as_destruction_aware(self: Arc<Self>) -> Option<Arc<dyn DestructionAwareBeanPostProcessor>> {
        Some(self)
    }
}

impl MergedBeanDefinitionPostProcessor for ApplicationListenerDetector {
    fn post_process_merged_bean_definition(
        &self,
        mbd: &RootBeanDefinition,
        class: &Arc<BeanClass>,
        bean_name: &str,
    ) -> BeansResult<()> {
        if class.has_capability(Capability::ApplicationListener) {
            self.singleton_names.write().insert(bean_name.to_string(), mbd.is_singleton());
        }
        Ok(())
    }

    fn reset_bean_definition(&self, bean_name: &str) {
        self.singleton_names.write().remove(bean_name);
    }
}

impl DestructionAwareBeanPostProcessor for ApplicationListenerDetector {
    fn post_process_before_destruction(&self, bean: &BeanObject, _bean_name: &str) -> BeansResult<()> {
        if let Some(listener) = bean.as_application_listener() {
            self.multicaster.remove_listener(&listener);
        }
        Ok(())
    }

    fn requires_destruction(&self, bean: &BeanObject) -> bool {
        bean.class().has_capability(Capability::ApplicationListener)
    }
}

struct ApplicationContextParts {
    display_name: String,
    bean_factory: Arc<DefaultListableBeanFactory>,
    environment: Arc<Environment>,
    parent: Option<Arc<ApplicationContext>>,
    async_events: bool,
    component_scan: bool,
    resolve_placeholders: bool,
}

impl Default for ApplicationContextParts {
    fn default() -> Self {
        Self {
            display_name: "ApplicationContext".to_string(),
            bean_factory: DefaultListableBeanFactory::new(),
            environment: Arc::new(Environment::new()),
            parent: None,
            async_events: false,
            component_scan: false,
            resolve_placeholders: false,
        }
    }
}

/// 应用上下文构建器
///
/// `build` 只组装上下文，不会刷新。
pub struct ApplicationContextBuilder {
    display_name: String,
    async_events: bool,
    environment: Arc<Environment>,
    settings: Option<ContainerSettings>,
    parent: Option<Arc<ApplicationContext>>,
    component_scan: bool,
    resolve_placeholders: bool,
    classes: Vec<Arc<BeanClass>>,
    definitions: Vec<(String, BeanDefinition)>,
    aliases: Vec<(String, String)>,
    singletons: Vec<(String, BeanObject)>,
    scopes: Vec<(String, Arc<dyn Scope>)>,
    bean_factory_post_processors: Vec<Arc<dyn BeanFactoryPostProcessor>>,
    bean_post_processors: Vec<Arc<dyn BeanPostProcessor>>,
    listeners: Vec<Arc<dyn ApplicationListener>>,
}

impl ApplicationContextBuilder {
    pub fn new() -> Self {
        Self {
            display_name: "ApplicationContext".to_string(),
            async_events: false,
            environment: Arc::new(Environment::new()),
            settings: None,
            parent: None,
            component_scan: false,
            resolve_placeholders: false,
            classes: Vec::new(),
            definitions: Vec::new(),
            aliases: Vec::new(),
            singletons: Vec::new(),
            scopes: Vec::new(),
            bean_factory_post_processors: Vec::new(),
            bean_post_processors: Vec::new(),
            listeners: Vec::new(),
        }
    }

    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = name.into();
        self
    }

    /// 设置是否异步处理事件
    ///
    /// 默认为 false（同步处理）
    /// 设置为 true 时，事件将在独立的 tokio 任务中异步处理
    pub fn async_events(mut self, async_events: bool) -> Self {
        self.async_events = async_events;
        self
    }

    /// 使用已有的配置环境
    pub fn environment(mut self, environment: Arc<Environment>) -> Self {
        self.environment = environment;
        self
    }

    /// 添加配置源到 Environment
    pub fn add_property_source(self, source: Box<dyn PropertySource>) -> Self {
        self.environment.add_property_source(source);
        self
    }

    /// 设置激活的 profiles
    pub fn active_profiles<S: Into<String>>(self, profiles: impl IntoIterator<Item = S>) -> Self {
        self.environment
            .set_active_profiles(profiles.into_iter().map(Into::into).collect());
        self
    }

    /// 容器设置；未设置时从 Environment 中读取
    pub fn settings(mut self, settings: ContainerSettings) -> Self {
        self.settings = Some(settings);
        self
    }

    pub fn parent(mut self, parent: &Arc<ApplicationContext>) -> Self {
        self.parent = Some(Arc::clone(parent));
        self
    }

    /// 刷新时注册通过 `inventory` 提交的组件
    pub fn component_scan(mut self, enabled: bool) -> Self {
        self.component_scan = enabled;
        self
    }

    /// 刷新时用 Environment 解析定义中的 `${...}` 占位符
    pub fn resolve_placeholders(mut self, enabled: bool) -> Self {
        self.resolve_placeholders = enabled;
        self
    }

    pub fn register_class(mut self, class: Arc<BeanClass>) -> Self {
        self.classes.push(class);
        self
    }

    /// 注册 Bean 定义
    pub fn register(mut self, name: impl Into<String>, definition: BeanDefinition) -> Self {
        self.definitions.push((name.into(), definition));
        self
    }

    pub fn alias(mut self, name: impl Into<String>, alias: impl Into<String>) -> Self {
        self.aliases.push((name.into(), alias.into()));
        self
    }

    /// 注册外部创建好的单例
    pub fn register_singleton(mut self, name: impl Into<String>, object: BeanObject) -> Self {
        self.singletons.push((name.into(), object));
        self
    }

    pub fn register_scope(mut self, name: impl Into<String>, scope: Arc<dyn Scope>) -> Self {
        self.scopes.push((name.into(), scope));
        self
    }

    pub fn bean_factory_post_processor(mut self, processor: Arc<dyn BeanFactoryPostProcessor>) -> Self {
        self.bean_factory_post_processors.push(processor);
        self
    }

    pub fn bean_post_processor(mut self, processor: Arc<dyn BeanPostProcessor>) -> Self {
        self.bean_post_processors.push(processor);
        self
    }

    pub fn listener(mut self, listener: Arc<dyn ApplicationListener>) -> Self {
        self.listeners.push(listener);
        self
    }

    /// 构建上下文，注册失败（如重复定义）时返回错误
    pub fn build(self) -> BeansResult<Arc<ApplicationContext>> {
        let settings = match self.settings {
            Some(settings) => settings,
            None => ContainerSettings::from_environment(&self.environment),
        };
        let bean_factory = DefaultListableBeanFactory::with_settings(settings);
        if let Some(parent) = &self.parent {
            bean_factory.set_parent_bean_factory(Arc::clone(parent.bean_factory()))?;
        }
        for class in self.classes {
            bean_factory.register_class(class);
        }
        for (name, scope) in self.scopes {
            bean_factory.register_scope(&name, scope)?;
        }
        for (name, definition) in self.definitions {
            bean_factory.register_bean_definition(&name, definition)?;
        }
        for (name, alias) in self.aliases {
            bean_factory.register_alias(&name, &alias)?;
        }
        for (name, object) in self.singletons {
            bean_factory.register_singleton(&name, object)?;
        }
        for processor in self.bean_post_processors {
            bean_factory.add_bean_post_processor(processor);
        }

        let context = ApplicationContext::create(ApplicationContextParts {
            display_name: self.display_name,
            bean_factory,
            environment: self.environment,
            parent: self.parent,
            async_events: self.async_events,
            component_scan: self.component_scan,
            resolve_placeholders: self.resolve_placeholders,
        });
        for processor in self.bean_factory_post_processors {
            context.add_bean_factory_post_processor(processor);
        }
        for listener in self.listeners {
            context.add_application_listener(listener);
        }
        tracing::debug!("Built {:?}", context);
        Ok(context)
    }

    /// 构建并刷新
    pub fn run(self) -> BeansResult<Arc<ApplicationContext>> {
        let context = self.build()?;
        context.refresh()?;
        Ok(context)
    }
}

impl Default for ApplicationContextBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean_factory::BeanFactoryExt;
    use crate::class::param;
    use parking_lot::Mutex;

    struct Recorder {
        events: Mutex<Vec<String>>,
    }

    impl ApplicationListener for Recorder {
        fn on_event(&self, event: Arc<dyn Event>) -> anyhow::Result<()> {
            self.events.lock().push(event.event_name().to_string());
            Ok(())
        }

        fn listener_name(&self) -> &str {
            "recorder"
        }
    }

    fn recorder_class() -> Arc<BeanClass> {
        BeanClass::builder::<Recorder>("Recorder")
            .constructor(vec![], |_| {
                Ok(Recorder {
                    events: Mutex::new(Vec::new()),
                })
            })
            .application_listener()
            .build()
    }

    #[derive(Default)]
    struct ContextHolder {
        context: Mutex<Option<Arc<ApplicationContext>>>,
        environment: Mutex<Option<Arc<Environment>>>,
    }

    impl ApplicationContextAware for ContextHolder {
        fn set_application_context(&self, context: Arc<ApplicationContext>) -> anyhow::Result<()> {
            *self.context.lock() = Some(context);
            Ok(())
        }
    }

    impl EnvironmentAware for ContextHolder {
        fn set_environment(&self, environment: Arc<Environment>) -> anyhow::Result<()> {
            *self.environment.lock() = Some(environment);
            Ok(())
        }
    }

    #[test]
    fn test_listener_bean_receives_refresh_and_close() {
        let context = ApplicationContext::builder()
            .register("recorder", BeanDefinition::of_class(&recorder_class()))
            .build()
            .unwrap();
        context.refresh().unwrap();

        let recorder = context.get_bean_typed::<Recorder>("recorder").unwrap();
        assert_eq!(*recorder.events.lock(), vec!["ContextRefreshedEvent"]);

        context.close();
        assert_eq!(*recorder.events.lock(), vec!["ContextRefreshedEvent", "ContextClosedEvent"]);
        assert_eq!(context.multicaster().listener_count(), 0);
    }

    #[test]
    fn test_aware_callbacks_and_injectable_context() {
        let holder_class = BeanClass::builder::<ContextHolder>("ContextHolder")
            .constructor(vec![], |_| Ok(ContextHolder::default()))
            .application_context_aware()
            .environment_aware()
            .build();
        let context = ApplicationContext::builder()
            .register("holder", BeanDefinition::of_class(&holder_class))
            .build()
            .unwrap();
        context.refresh().unwrap();

        let holder = context.get_bean_typed::<ContextHolder>("holder").unwrap();
        let injected = holder.context.lock().clone().unwrap();
        assert!(Arc::ptr_eq(&injected, &context));
        assert!(Arc::ptr_eq(&holder.environment.lock().clone().unwrap(), context.environment()));

        let by_type = context.get_bean_of_type(&application_context_class()).unwrap();
        assert!(Arc::ptr_eq(&by_type.downcast::<ApplicationContext>().unwrap(), &context));
        let environment = context.get_bean_typed::<Environment>(ENVIRONMENT_BEAN_NAME).unwrap();
        assert!(Arc::ptr_eq(&environment, context.environment()));
        let multicaster = context
            .get_bean_typed::<SimpleApplicationEventMulticaster>(EVENT_MULTICASTER_BEAN_NAME)
            .unwrap();
        assert!(Arc::ptr_eq(&multicaster, &context.multicaster));
        context.close();
    }

    #[test]
    fn test_refresh_only_once() {
        let context = ApplicationContext::new();
        context.refresh().unwrap();
        let err = context.refresh().unwrap_err();
        assert!(matches!(err, BeansError::IllegalState(_)));
        assert!(context.is_active());
    }

    #[test]
    fn test_failed_refresh_destroys_created_singletons() {
        let destroyed = Arc::new(Mutex::new(Vec::<String>::new()));
        let log = Arc::clone(&destroyed);
        let good_class = BeanClass::builder::<String>("Good")
            .constructor(vec![], |_| Ok("good".to_string()))
            .method("close", move |_| {
                log.lock().push("good".to_string());
                Ok(())
            })
            .build();
        let bad_class = BeanClass::builder::<String>("Bad")
            .constructor(vec![], |_| Err(anyhow::anyhow!("boom")))
            .build();

        let context = ApplicationContext::builder()
            .register("good", BeanDefinition::of_class(&good_class).with_destroy_method("close"))
            .register("bad", BeanDefinition::of_class(&bad_class))
            .build()
            .unwrap();
        let err = context.refresh().unwrap_err();

        assert_eq!(err.bean_name(), Some("bad"));
        assert_eq!(*destroyed.lock(), vec!["good"]);
        assert!(!context.is_active());
        assert!(!context.bean_factory().contains_singleton("good"));
    }

    #[test]
    fn test_close_runs_hooks_before_destroying() {
        let order = Arc::new(Mutex::new(Vec::<String>::new()));
        let bean_log = Arc::clone(&order);
        let class = BeanClass::builder::<String>("Resource")
            .constructor(vec![], |_| Ok("resource".to_string()))
            .method("close", move |_| {
                bean_log.lock().push("destroy".to_string());
                Ok(())
            })
            .build();
        let context = ApplicationContext::builder()
            .register("resource", BeanDefinition::of_class(&class).with_destroy_method("close"))
            .build()
            .unwrap();
        context.refresh().unwrap();

        let hook_log = Arc::clone(&order);
        context.register_shutdown_hook(move || {
            hook_log.lock().push("hook".to_string());
            Ok(())
        });
        context.register_shutdown_hook(|| Err(anyhow::anyhow!("ignored")));

        context.close();
        context.close();
        assert_eq!(*order.lock(), vec!["hook", "destroy"]);
        assert!(context.is_closed());
    }

    #[test]
    fn test_programmatic_listener_and_parent_propagation() {
        let parent_recorder = Arc::new(Recorder {
            events: Mutex::new(Vec::new()),
        });
        let parent = ApplicationContext::builder()
            .display_name("parent")
            .register_singleton("shared", BeanObject::string("from parent"))
            .listener(Arc::clone(&parent_recorder) as Arc<dyn ApplicationListener>)
            .build()
            .unwrap();
        parent.refresh().unwrap();

        let child = ApplicationContext::builder()
            .display_name("child")
            .parent(&parent)
            .build()
            .unwrap();
        child.refresh().unwrap();

        assert_eq!(child.get_bean("shared").unwrap().as_str(), Some("from parent"));
        assert_eq!(
            *parent_recorder.events.lock(),
            vec!["ContextRefreshedEvent", "ContextRefreshedEvent"]
        );
    }

    #[test]
    fn test_validate_dependencies() {
        let value = |s: &'static str| BeanDefinition::from_supplier(move || Ok(Some(BeanObject::string(s))));
        let context = ApplicationContext::builder()
            .register("a", value("a").with_depends_on(["b"]))
            .register("b", value("b").with_depends_on(["a"]))
            .build()
            .unwrap();
        let err = context.validate_dependencies().unwrap_err();
        assert!(err.to_string().contains("Circular dependency detected"));

        let context = ApplicationContext::builder()
            .register("a", value("a").with_depends_on(["missing"]))
            .build()
            .unwrap();
        let err = context.validate_dependencies().unwrap_err();
        assert!(err.to_string().contains("'missing'"));
    }

    #[test]
    fn test_context_injected_through_constructor() {
        struct NeedsContext {
            context: Arc<ApplicationContext>,
        }
        let class = BeanClass::builder::<NeedsContext>("NeedsContext")
            .constructor(vec![param("context", &application_context_class())], |args| {
                Ok(NeedsContext { context: args.get(0)? })
            })
            .build();
        let context = ApplicationContext::builder()
            .register(
                "needs",
                BeanDefinition::of_class(&class).with_autowire_mode(crate::definition::AutowireMode::Constructor),
            )
            .build()
            .unwrap();
        context.refresh().unwrap();

        let bean = context.get_bean_typed::<NeedsContext>("needs").unwrap();
        assert!(Arc::ptr_eq(&bean.context, &context));
    }
}
