//! 组件扫描
//!
//! 组件通过 `inventory::submit!` 在编译期提交 [`ComponentRegistration`]，
//! [`ComponentScanPostProcessor`] 在刷新时把它们注册成 bean 定义。
//!
//! # 示例
//!
//! ```ignore
//! use griffin_core::prelude::*;
//!
//! fn user_service_class() -> Arc<BeanClass> { /* ... */ }
//!
//! griffin_core::inventory::submit! {
//!     ComponentRegistration::new("userService", user_service_class)
//!         .with_profiles(&["dev"])
//! }
//! ```

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::bean_factory::{BeanDefinitionRegistry, DefaultListableBeanFactory};
use crate::class::BeanClass;
use crate::config::Environment;
use crate::constants::COMPONENT_SCAN_PROCESSOR_BEAN_NAME;
use crate::context::EnvironmentAware;
use crate::definition::{BeanDefinition, Role};
use crate::error::BeansResult;
use crate::lifecycle::{Ordered, HIGHEST_PRECEDENCE};
use crate::processor::{BeanDefinitionRegistryPostProcessor, BeanFactoryPostProcessor};
use crate::utils::naming::bean_name_for_class;

/// 编译期提交的组件
pub struct ComponentRegistration {
    /// bean 名称，为空时由类名推导
    pub name: &'static str,
    pub class: fn() -> Arc<BeanClass>,
    /// 在默认定义上追加作用域、懒加载、初始化方法等
    pub customize: fn(BeanDefinition) -> BeanDefinition,
    /// 只在这些 profile 激活时注册，为空表示总是注册
    pub profiles: &'static [&'static str],
}

impl ComponentRegistration {
    pub const fn new(name: &'static str, class: fn() -> Arc<BeanClass>) -> Self {
        Self {
            name,
            class,
            customize: identity,
            profiles: &[],
        }
    }

    pub const fn with_definition(mut self, customize: fn(BeanDefinition) -> BeanDefinition) -> Self {
        self.customize = customize;
        self
    }

    pub const fn with_profiles(mut self, profiles: &'static [&'static str]) -> Self {
        self.profiles = profiles;
        self
    }

    /// 注册使用的 bean 名称
    pub fn bean_name(&self, class: &BeanClass) -> String {
        if self.name.is_empty() {
            bean_name_for_class(class.name())
        } else {
            self.name.to_string()
        }
    }

    pub fn definition(&self, class: &Arc<BeanClass>) -> BeanDefinition {
        (self.customize)(BeanDefinition::of_class(class))
    }

    fn is_active(&self, environment: Option<&Environment>) -> bool {
        if self.profiles.is_empty() {
            return true;
        }
        match environment {
            Some(env) => self.profiles.iter().any(|profile| env.accepts_profiles(profile)),
            None => false,
        }
    }
}

fn identity(definition: BeanDefinition) -> BeanDefinition {
    definition
}

inventory::collect!(ComponentRegistration);

/// 所有提交的组件
pub fn registrations() -> impl Iterator<Item = &'static ComponentRegistration> {
    inventory::iter::<ComponentRegistration>.into_iter()
}

/// 把提交的组件注册为 bean 定义，已存在同名定义的组件被跳过
pub struct ComponentScanPostProcessor {
    environment: RwLock<Option<Arc<Environment>>>,
}

impl ComponentScanPostProcessor {
    pub fn new() -> Self {
        Self {
            environment: RwLock::new(None),
        }
    }

    pub fn class() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            BeanClass::builder::<ComponentScanPostProcessor>("ComponentScanPostProcessor")
                .constructor(vec![], |_| Ok(ComponentScanPostProcessor::new()))
                .environment_aware()
                .registry_post_processor()
                .priority_ordered()
                .build()
        }))
    }

    /// 注册给定的组件，返回新注册的数量
    pub fn scan<'a>(
        &self,
        registry: &dyn BeanDefinitionRegistry,
        candidates: impl IntoIterator<Item = &'a ComponentRegistration>,
    ) -> BeansResult<usize> {
        let environment = self.environment.read().clone();
        let mut count = 0;

        for registration in candidates {
            let class = (registration.class)();
            let name = registration.bean_name(&class);
            if !registration.is_active(environment.as_deref()) {
                tracing::debug!("  ├─ Skipping component '{}': profiles {:?} not active", name, registration.profiles);
                continue;
            }
            if registry.contains_bean_definition(&name) {
                tracing::debug!("  ├─ Skipping component '{}': definition already registered", name);
                continue;
            }
            registry.register_class(Arc::clone(&class));
            registry.register_bean_definition(&name, registration.definition(&class))?;
            tracing::debug!("  ├─ Registered component '{}' ({})", name, class.name());
            count += 1;
        }
        Ok(count)
    }
}

impl Default for ComponentScanPostProcessor {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentAware for ComponentScanPostProcessor {
    fn set_environment(&self, environment: Arc<Environment>) -> anyhow::Result<()> {
        *self.environment.write() = Some(environment);
        Ok(())
    }
}

impl Ordered for ComponentScanPostProcessor {
    fn order(&self) -> i32 {
        HIGHEST_PRECEDENCE
    }
}

impl BeanFactoryPostProcessor for ComponentScanPostProcessor {
    fn post_process_bean_factory(&self, _factory: &DefaultListableBeanFactory) -> BeansResult<()> {
        Ok(())
    }

    fn as_registry_post_processor(self: Arc<Self>) -> Option<Arc<dyn BeanDefinitionRegistryPostProcessor>> {
        Some(self)
    }
}

impl BeanDefinitionRegistryPostProcessor for ComponentScanPostProcessor {
    fn post_process_bean_definition_registry(&self, registry: &dyn BeanDefinitionRegistry) -> BeansResult<()> {
        tracing::info!("Starting component scan");
        let count = self.scan(registry, registrations())?;
        tracing::info!("Component scan completed, registered {} component(s)", count);
        Ok(())
    }
}

/// 以基础设施 bean 的形式注册组件扫描处理器
pub fn register_component_scan_processor(registry: &dyn BeanDefinitionRegistry) -> BeansResult<()> {
    if registry.contains_bean_definition(COMPONENT_SCAN_PROCESSOR_BEAN_NAME) {
        return Ok(());
    }
    registry.register_bean_definition(
        COMPONENT_SCAN_PROCESSOR_BEAN_NAME,
        BeanDefinition::of_class(&ComponentScanPostProcessor::class()).with_role(Role::Infrastructure),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean_factory::ConfigurableListableBeanFactory;

    struct Widget;

    fn widget_class() -> Arc<BeanClass> {
        BeanClass::builder::<Widget>("WidgetService")
            .constructor(vec![], |_| Ok(Widget))
            .build()
    }

    fn lazy(definition: BeanDefinition) -> BeanDefinition {
        definition.with_lazy_init(true)
    }

    #[test]
    fn test_scan_derives_names_and_applies_customization() {
        let factory = DefaultListableBeanFactory::new();
        let candidates = [
            ComponentRegistration::new("", widget_class),
            ComponentRegistration::new("lazyWidget", widget_class).with_definition(lazy),
        ];

        let count = ComponentScanPostProcessor::new().scan(factory.as_ref(), &candidates).unwrap();
        assert_eq!(count, 2);
        assert!(factory.contains_bean_definition("widgetService"));
        assert!(factory.get_bean_definition("lazyWidget").unwrap().is_lazy_init());
    }

    #[test]
    fn test_scan_respects_profiles_and_existing_definitions() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition("existing", BeanDefinition::of_class(&widget_class()).with_primary(true))
            .unwrap();
        let candidates = [
            ComponentRegistration::new("existing", widget_class),
            ComponentRegistration::new("devOnly", widget_class).with_profiles(&["dev"]),
            ComponentRegistration::new("notProd", widget_class).with_profiles(&["!prod"]),
        ];

        let processor = ComponentScanPostProcessor::new();
        // 没有 Environment 时带 profile 的组件都不注册
        assert_eq!(processor.scan(factory.as_ref(), &candidates).unwrap(), 0);

        let env = Arc::new(Environment::new());
        env.set_active_profiles(vec!["dev".to_string()]);
        processor.set_environment(env).unwrap();
        assert_eq!(processor.scan(factory.as_ref(), &candidates).unwrap(), 2);

        assert!(factory.get_bean_definition("existing").unwrap().primary);
        assert!(factory.contains_bean_definition("devOnly"));
        assert!(factory.contains_bean_definition("notProd"));
        assert_eq!(factory.get_bean_definition_count(), 3);
        assert!(factory.get_dependency_graph().contains_key("devOnly"));
    }
}
