//! 定义中的 `${...}` 占位符解析
//!
//! [`PlaceholderConfigurer`] 是一个工厂后置处理器：在任何 bean 实例化之前，用
//! [`Environment`] 替换所有定义中的占位符，包括字面量、bean 引用名、内部 bean、
//! 父定义名、工厂方法和作用域。

use std::sync::{Arc, OnceLock};

use parking_lot::RwLock;

use crate::bean_factory::{BeanDefinitionRegistry, DefaultListableBeanFactory};
use crate::class::BeanClass;
use crate::config::{Environment, PlaceholderError, PLACEHOLDER_PREFIX};
use crate::constants::PLACEHOLDER_CONFIGURER_BEAN_NAME;
use crate::context::EnvironmentAware;
use crate::definition::{BeanClassRef, BeanDefinition, Role};
use crate::error::{BeansError, BeansResult};
use crate::lifecycle::{Ordered, LOWEST_PRECEDENCE};
use crate::processor::BeanFactoryPostProcessor;
use crate::values::BeanValue;

/// 用 Environment 解析定义中的占位符
pub struct PlaceholderConfigurer {
    environment: RwLock<Option<Arc<Environment>>>,
    ignore_unresolvable: bool,
    order: i32,
}

impl PlaceholderConfigurer {
    /// 没有 Environment 时需要通过 `EnvironmentAware` 注入
    pub fn new() -> Self {
        Self {
            environment: RwLock::new(None),
            ignore_unresolvable: false,
            order: LOWEST_PRECEDENCE,
        }
    }

    pub fn with_environment(environment: Arc<Environment>) -> Self {
        let configurer = Self::new();
        *configurer.environment.write() = Some(environment);
        configurer
    }

    /// 无法解析的占位符保持原样，而不是报错
    pub fn ignore_unresolvable(mut self, ignore: bool) -> Self {
        self.ignore_unresolvable = ignore;
        self
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.order = order;
        self
    }

    pub fn class() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            BeanClass::builder::<PlaceholderConfigurer>("PlaceholderConfigurer")
                .constructor(vec![], |_| Ok(PlaceholderConfigurer::new()))
                .environment_aware()
                .bean_factory_post_processor()
                .priority_ordered()
                .build()
        }))
    }

    fn resolver(&self) -> BeansResult<DefinitionVisitor> {
        let environment = self
            .environment
            .read()
            .clone()
            .ok_or_else(|| BeansError::illegal_state("PlaceholderConfigurer requires an Environment"))?;
        Ok(DefinitionVisitor {
            environment,
            ignore_unresolvable: self.ignore_unresolvable,
        })
    }
}

impl Default for PlaceholderConfigurer {
    fn default() -> Self {
        Self::new()
    }
}

impl EnvironmentAware for PlaceholderConfigurer {
    fn set_environment(&self, environment: Arc<Environment>) -> anyhow::Result<()> {
        *self.environment.write() = Some(environment);
        Ok(())
    }
}

impl Ordered for PlaceholderConfigurer {
    fn order(&self) -> i32 {
        self.order
    }
}

impl BeanFactoryPostProcessor for PlaceholderConfigurer {
    fn post_process_bean_factory(&self, factory: &DefaultListableBeanFactory) -> BeansResult<()> {
        let visitor = self.resolver()?;
        let mut resolved_count = 0;

        for name in factory.get_bean_definition_names() {
            if name == PLACEHOLDER_CONFIGURER_BEAN_NAME {
                continue;
            }
            let original = factory.get_bean_definition(&name)?;
            let mut resolved = original.clone();
            visitor
                .visit_definition(&mut resolved)
                .map_err(|e| BeansError::BeanDefinitionStore {
                    bean_name: name.clone(),
                    message: e.to_string(),
                })?;
            if resolved != original {
                factory.modify_bean_definition(&name, &mut |definition| *definition = resolved.clone())?;
                resolved_count += 1;
            }
        }
        tracing::debug!("Resolved placeholders in {} bean definition(s)", resolved_count);
        Ok(())
    }
}

/// 遍历定义中所有可能带占位符的字符串
struct DefinitionVisitor {
    environment: Arc<Environment>,
    ignore_unresolvable: bool,
}

impl DefinitionVisitor {
    fn resolve(&self, text: &mut String) -> Result<(), PlaceholderError> {
        if !text.contains(PLACEHOLDER_PREFIX) {
            return Ok(());
        }
        let resolved = if self.ignore_unresolvable {
            self.environment.resolve_placeholders(text)?
        } else {
            self.environment.resolve_required_placeholders(text)?
        };
        *text = resolved;
        Ok(())
    }

    fn resolve_option(&self, text: &mut Option<String>) -> Result<(), PlaceholderError> {
        match text {
            Some(text) => self.resolve(text),
            None => Ok(()),
        }
    }

    fn visit_definition(&self, definition: &mut BeanDefinition) -> Result<(), PlaceholderError> {
        self.resolve_option(&mut definition.parent_name)?;
        if let Some(BeanClassRef::Named(class_name)) = &mut definition.bean_class {
            self.resolve(class_name)?;
        }
        self.resolve_option(&mut definition.factory_bean_name)?;
        self.resolve_option(&mut definition.factory_method_name)?;
        self.resolve(&mut definition.scope)?;
        for name in &mut definition.depends_on {
            self.resolve(name)?;
        }
        for pv in definition.property_values.iter_mut() {
            self.visit_value(&mut pv.value)?;
        }
        for holder in definition.constructor_args.holders_mut() {
            self.visit_value(&mut holder.value)?;
        }
        Ok(())
    }

    fn visit_value(&self, value: &mut BeanValue) -> Result<(), PlaceholderError> {
        match value {
            BeanValue::Literal(literal) => self.resolve(&mut literal.value),
            BeanValue::Reference(reference) => self.resolve(&mut reference.bean_name),
            BeanValue::BeanName(name) => self.resolve(name),
            BeanValue::Inner(holder) => self.visit_definition(&mut holder.definition),
            BeanValue::List(items) => items.iter_mut().try_for_each(|item| self.visit_value(item)),
            BeanValue::Null | BeanValue::Object(_) => Ok(()),
        }
    }
}

/// 以基础设施 bean 的形式注册占位符解析器，已存在时跳过
pub fn register_placeholder_configurer(registry: &dyn BeanDefinitionRegistry) -> BeansResult<()> {
    if registry.contains_bean_definition(PLACEHOLDER_CONFIGURER_BEAN_NAME) {
        return Ok(());
    }
    registry.register_bean_definition(
        PLACEHOLDER_CONFIGURER_BEAN_NAME,
        BeanDefinition::of_class(&PlaceholderConfigurer::class()).with_role(Role::Infrastructure),
    )
}
