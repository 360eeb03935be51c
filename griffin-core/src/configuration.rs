//! 配置类处理
//!
//! 声明了 bean 方法（[`BeanMethod`]）的类是配置类。[`ConfigurationClassPostProcessor`]
//! 在注册阶段找出所有配置类定义，为每个 bean 方法注册一个工厂方法定义：
//! 实例方法以配置类 bean 为工厂 bean，静态方法直接使用配置类。
//!
//! # 示例
//!
//! ```ignore
//! BeanClass::builder::<MailConfig>("MailConfig")
//!     .constructor(vec![], |_| Ok(MailConfig))
//!     .instance_factory("mailSender", &mail_sender_class(), vec![], |config, _| config.mail_sender())
//!     .bean_method(BeanMethod::new("mailSender").destroy_method("close"))
//!     .build()
//! ```

use std::collections::HashSet;
use std::sync::{Arc, OnceLock};

use crate::bean_factory::{BeanDefinitionRegistry, DefaultListableBeanFactory};
use crate::class::{BeanClass, BeanMethod};
use crate::constants::CONFIGURATION_CLASS_PROCESSOR_BEAN_NAME;
use crate::definition::{AutowireMode, BeanClassRef, BeanDefinition, Role};
use crate::error::{BeansError, BeansResult};
use crate::lifecycle::{Ordered, LOWEST_PRECEDENCE};
use crate::processor::{BeanDefinitionRegistryPostProcessor, BeanFactoryPostProcessor};

/// 把配置类的 bean 方法注册为 bean 定义
///
/// 优先排序，排在组件扫描之后，因此扫描注册的配置类同样会被处理。
#[derive(Debug, Default)]
pub struct ConfigurationClassPostProcessor;

impl ConfigurationClassPostProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn class() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            BeanClass::builder::<ConfigurationClassPostProcessor>("ConfigurationClassPostProcessor")
                .constructor(vec![], |_| Ok(ConfigurationClassPostProcessor::new()))
                .registry_post_processor()
                .priority_ordered()
                .build()
        }))
    }

    /// 处理注册表中的全部配置类，返回新注册的定义数量
    ///
    /// bean 方法注册的定义本身也可能是配置类，重复扫描直到没有新的配置类。
    pub fn process_config_bean_definitions(&self, registry: &dyn BeanDefinitionRegistry) -> BeansResult<usize> {
        let mut processed = HashSet::new();
        let mut count = 0;

        loop {
            let candidates: Vec<(String, Arc<BeanClass>)> = registry
                .get_bean_definition_names()
                .into_iter()
                .filter(|name| !processed.contains(name))
                .filter_map(|name| {
                    let definition = registry.get_bean_definition(&name).ok()?;
                    let class = configuration_class(&definition)?;
                    Some((name, class))
                })
                .collect();
            if candidates.is_empty() {
                return Ok(count);
            }

            for (config_name, class) in candidates {
                tracing::debug!("Processing configuration class '{}' ({})", config_name, class.name());
                for method in class.bean_methods() {
                    if self.register_bean_method(registry, &config_name, &class, method)? {
                        count += 1;
                    }
                }
                processed.insert(config_name);
            }
        }
    }

    fn register_bean_method(
        &self,
        registry: &dyn BeanDefinitionRegistry,
        config_name: &str,
        class: &Arc<BeanClass>,
        method: &BeanMethod,
    ) -> BeansResult<bool> {
        let bean_name = method.resolved_bean_name();
        let candidates = class.factory_methods_named(&method.method);
        if candidates.is_empty() {
            return Err(BeansError::BeanDefinitionStore {
                bean_name: bean_name.to_string(),
                message: format!(
                    "Bean method '{}' is not declared as a factory method on configuration class [{}]",
                    method.method,
                    class.name()
                ),
            });
        }

        // 已存在的同名定义优先
        if registry.contains_bean_definition(bean_name) {
            tracing::debug!(
                "Skipping bean method {}.{}: a definition for bean '{}' already exists",
                class.name(),
                method.method,
                bean_name
            );
            return Ok(false);
        }

        let definition = if candidates.iter().all(|candidate| candidate.is_static()) {
            BeanDefinition::of_class(class).with_factory_method(&method.method)
        } else {
            BeanDefinition::new().with_factory_bean(config_name, &method.method)
        };
        let mut definition = definition
            .with_autowire_mode(AutowireMode::Constructor)
            .with_lazy_init(method.lazy_init)
            .with_primary(method.primary)
            .with_description(format!("bean method {}.{}", class.name(), method.method));
        if let Some(scope) = &method.scope {
            definition = definition.with_scope(scope.as_str());
        }
        if let Some(init) = &method.init_method {
            definition = definition.with_init_method(init.as_str());
        }
        if let Some(destroy) = &method.destroy_method {
            definition = definition.with_destroy_method(destroy.as_str());
        }
        registry.register_bean_definition(bean_name, definition)?;
        for alias in &method.aliases {
            registry.register_alias(bean_name, alias)?;
        }
        tracing::debug!("  ├─ Registered bean method '{}' from '{}'", bean_name, config_name);
        Ok(true)
    }
}

fn configuration_class(definition: &BeanDefinition) -> Option<Arc<BeanClass>> {
    if definition.is_abstract {
        return None;
    }
    match &definition.bean_class {
        Some(BeanClassRef::Resolved(class)) if class.is_configuration() => Some(Arc::clone(class)),
        _ => None,
    }
}

impl Ordered for ConfigurationClassPostProcessor {
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE
    }
}

impl BeanFactoryPostProcessor for ConfigurationClassPostProcessor {
    fn post_process_bean_factory(&self, _factory: &DefaultListableBeanFactory) -> BeansResult<()> {
        Ok(())
    }

    fn as_registry_post_processor(self: Arc<Self>) -> Option<Arc<dyn BeanDefinitionRegistryPostProcessor>> {
        Some(self)
    }
}

impl BeanDefinitionRegistryPostProcessor for ConfigurationClassPostProcessor {
    fn post_process_bean_definition_registry(&self, registry: &dyn BeanDefinitionRegistry) -> BeansResult<()> {
        let count = self.process_config_bean_definitions(registry)?;
        if count > 0 {
            tracing::info!("Registered {} bean method(s) from configuration classes", count);
        }
        Ok(())
    }
}
