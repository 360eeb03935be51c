//! 核心常量
//!
//! 容器内置作用域名、注册到容器中的基础设施 bean 名称，以及配置键。

/// 单例作用域
pub const SCOPE_SINGLETON: &str = "singleton";

/// 原型作用域
pub const SCOPE_PROTOTYPE: &str = "prototype";

/// 线程作用域（`ThreadScope`）
pub const SCOPE_THREAD: &str = "thread";

/// 取工厂 bean 本身时名称的前缀
pub const FACTORY_BEAN_PREFIX: &str = "&";

/// 内部 bean 名称与唯一后缀之间的分隔符
pub const GENERATED_BEAN_NAME_SEPARATOR: &str = "#";

pub const APPLICATION_CONTEXT_BEAN_NAME: &str = "applicationContext";
pub const ENVIRONMENT_BEAN_NAME: &str = "environment";
pub const BEAN_FACTORY_BEAN_NAME: &str = "beanFactory";
pub const EVENT_MULTICASTER_BEAN_NAME: &str = "applicationEventMulticaster";

pub const AUTOWIRED_PROCESSOR_BEAN_NAME: &str = "griffin.internalAutowiredAnnotationProcessor";
pub const LIFECYCLE_PROCESSOR_BEAN_NAME: &str = "griffin.internalLifecycleAnnotationProcessor";
pub const COMPONENT_SCAN_PROCESSOR_BEAN_NAME: &str = "griffin.internalComponentScanProcessor";
pub const CONFIGURATION_CLASS_PROCESSOR_BEAN_NAME: &str = "griffin.internalConfigurationClassProcessor";
pub const PLACEHOLDER_CONFIGURER_BEAN_NAME: &str = "griffin.internalPlaceholderConfigurer";

/// 容器设置在配置中的前缀
pub const SETTINGS_PREFIX: &str = "griffin.beans";

/// 初始化方法名与 `InitializingBean` 回调同名时不重复调用
pub const AFTER_PROPERTIES_SET: &str = "after_properties_set";

/// 销毁方法名与 `DisposableBean` 回调同名时不重复调用
pub const DESTROY: &str = "destroy";

/// 销毁方法名设为该值时，按 `close`、`shutdown` 的顺序推断
pub const INFER_METHOD: &str = "(inferred)";

/// 判断名称是否指向工厂 bean 本身
pub fn is_factory_dereference(name: &str) -> bool {
    name.starts_with(FACTORY_BEAN_PREFIX)
}

/// 去掉所有 `&` 前缀
pub fn transformed_bean_name(name: &str) -> &str {
    name.trim_start_matches(FACTORY_BEAN_PREFIX)
}
