//! 注解风格的后置处理器
//!
//! `BeanClass` 上的 `autowired` 标记和 `post_construct` / `pre_destroy` 声明由这里的
//! 两个处理器解释：
//! - [`AutowiredPostProcessor`]：选择标记了自动装配的构造器，按类型注入标记的属性
//! - [`LifecycleAnnotationPostProcessor`]：初始化前调用 `post_construct` 方法，销毁时调用
//!   `pre_destroy` 方法
//!
//! 两者都以基础设施 bean 的形式注册，由后置处理器注册流程发现。

use std::collections::HashMap;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::RwLock;

use crate::bean_factory::{BeanDefinitionRegistry, ConfigurableBeanFactory, DefaultListableBeanFactory, DependencyDescriptor};
use crate::class::{BeanClass, Executable};
use crate::configuration::ConfigurationClassPostProcessor;
use crate::constants::{
    AUTOWIRED_PROCESSOR_BEAN_NAME, CONFIGURATION_CLASS_PROCESSOR_BEAN_NAME, LIFECYCLE_PROCESSOR_BEAN_NAME,
};
use crate::definition::{BeanDefinition, Role};
use crate::error::{BeansError, BeansResult};
use crate::lifecycle::{BeanFactoryAware, Ordered, LOWEST_PRECEDENCE};
use crate::merged::RootBeanDefinition;
use crate::object::BeanObject;
use crate::processor::{
    BeanPostProcessor, DestructionAwareBeanPostProcessor, InstantiationAwareBeanPostProcessor,
    MergedBeanDefinitionPostProcessor, SmartInstantiationAwareBeanPostProcessor,
};
use crate::values::{BeanValue, PropertyValues};

/// 需要注入的属性
#[derive(Debug, Clone)]
struct InjectedProperty {
    name: String,
    ty: Arc<BeanClass>,
    required: bool,
}

/// 处理 `autowired` 标记
#[derive(Default)]
pub struct AutowiredPostProcessor {
    factory: RwLock<Weak<DefaultListableBeanFactory>>,
    /// 类名 -> 候选构造器
    candidate_constructors: RwLock<HashMap<String, Option<Vec<Arc<Executable>>>>>,
    /// bean 名称 -> 注入元数据
    injection_metadata: RwLock<HashMap<String, Arc<Vec<InjectedProperty>>>>,
}

impl AutowiredPostProcessor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn class() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            BeanClass::builder::<AutowiredPostProcessor>("AutowiredPostProcessor")
                .constructor(vec![], |_| Ok(AutowiredPostProcessor::new()))
                .bean_factory_aware()
                .bean_post_processor()
                .priority_ordered()
                .build()
        }))
    }

    fn factory(&self) -> BeansResult<Arc<DefaultListableBeanFactory>> {
        self.factory
            .read()
            .upgrade()
            .ok_or_else(|| BeansError::illegal_state("AutowiredPostProcessor requires a bean factory"))
    }

    fn build_metadata(class: &BeanClass) -> Vec<InjectedProperty> {
        class
            .properties()
            .iter()
            .filter_map(|property| {
                property.autowired().map(|required| InjectedProperty {
                    name: property.name.clone(),
                    ty: Arc::clone(&property.ty),
                    required,
                })
            })
            .collect()
    }

    fn find_metadata(&self, bean_name: &str, class: &BeanClass) -> Arc<Vec<InjectedProperty>> {
        if let Some(metadata) = self.injection_metadata.read().get(bean_name) {
            return Arc::clone(metadata);
        }
        let metadata = Arc::new(Self::build_metadata(class));
        self.injection_metadata
            .write()
            .insert(bean_name.to_string(), Arc::clone(&metadata));
        metadata
    }

    fn resolve_candidates(&self, class: &BeanClass, bean_name: &str) -> BeansResult<Option<Vec<Arc<Executable>>>> {
        let constructors = class.constructors();
        let mut required: Option<&Arc<Executable>> = None;
        let mut candidates: Vec<Arc<Executable>> = Vec::new();

        for constructor in constructors {
            let Some(is_required) = constructor.autowired() else {
                continue;
            };
            if let Some(existing) = required {
                return Err(BeansError::creation(
                    bean_name,
                    format!(
                        "Invalid autowire-marked constructor: {}. Found constructor with 'required' marker already: {}",
                        constructor.signature(),
                        existing.signature()
                    ),
                ));
            }
            if is_required {
                if !candidates.is_empty() {
                    return Err(BeansError::creation(
                        bean_name,
                        format!(
                            "Invalid autowire-marked constructors: {:?}. Found constructor with 'required' marker: {}",
                            candidates,
                            constructor.signature()
                        ),
                    ));
                }
                required = Some(constructor);
            }
            candidates.push(Arc::clone(constructor));
        }

        if !candidates.is_empty() {
            // 全部是可选的自动装配构造器时，无参构造器作为兜底
            if required.is_none() {
                if let Some(default) = class.default_constructor() {
                    if !candidates.iter().any(|c| Arc::ptr_eq(c, default)) {
                        candidates.push(Arc::clone(default));
                    }
                }
            }
            return Ok(Some(candidates));
        }

        match constructors {
            [only] if only.param_count() > 0 => Ok(Some(vec![Arc::clone(only)])),
            _ => Ok(None),
        }
    }
}

impl BeanFactoryAware for AutowiredPostProcessor {
    fn set_bean_factory(&self, factory: Arc<DefaultListableBeanFactory>) -> anyhow::Result<()> {
        *self.factory.write() = Arc::downgrade(&factory);
        Ok(())
    }
}

impl Ordered for AutowiredPostProcessor {
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE - 2
    }
}

impl BeanPostProcessor for AutowiredPostProcessor {
    fn as_instantiation_aware(self: Arc<Self>) -> Option<Arc<dyn InstantiationAwareBeanPostProcessor>> {
        Some(self)
    }

    fn as_smart_instantiation_aware(self: Arc<Self>) -> Option<Arc<dyn SmartInstantiationAwareBeanPostProcessor>> {
        Some(self)
    }

    fn as_merged_definition_processor(self: Arc<Self>) -> Option<Arc<dyn MergedBeanDefinitionPostProcessor>> {
        Some(self)
    }
}

impl InstantiationAwareBeanPostProcessor for AutowiredPostProcessor {
    fn post_process_properties(
        &self,
        mut pvs: PropertyValues,
        bean: &BeanObject,
        bean_name: &str,
    ) -> BeansResult<Option<PropertyValues>> {
        let metadata = self.find_metadata(bean_name, bean.class());
        if metadata.is_empty() {
            return Ok(Some(pvs));
        }
        let factory = self.factory()?;

        for property in metadata.iter() {
            // 显式配置的值优先
            if pvs.contains(&property.name) {
                continue;
            }
            let descriptor = DependencyDescriptor::new(&property.ty)
                .with_name(property.name.clone())
                .with_required(property.required);
            let mut autowired = Vec::new();
            let value = factory
                .resolve_dependency_recording(&descriptor, Some(bean_name), Some(&mut autowired))
                .map_err(|e| BeansError::UnsatisfiedDependency {
                    bean_name: bean_name.to_string(),
                    injection_point: format!("field '{}'", property.name),
                    message: e.to_string(),
                    source: Some(Box::new(e)),
                    suppressed: Vec::new(),
                })?;
            for name in &autowired {
                factory.register_dependent_bean(name, bean_name);
                tracing::trace!(
                    "Autowiring by type from bean name '{}' to bean named '{}'",
                    bean_name,
                    name
                );
            }
            if let Some(value) = value {
                pvs.add(property.name.clone(), BeanValue::Object(value));
            }
        }
        Ok(Some(pvs))
    }
}

impl SmartInstantiationAwareBeanPostProcessor for AutowiredPostProcessor {
    fn determine_candidate_constructors(
        &self,
        class: &Arc<BeanClass>,
        bean_name: &str,
    ) -> BeansResult<Option<Vec<Arc<Executable>>>> {
        if let Some(cached) = self.candidate_constructors.read().get(class.name()) {
            return Ok(cached.clone());
        }
        let candidates = self.resolve_candidates(class, bean_name)?;
        self.candidate_constructors
            .write()
            .insert(class.name().to_string(), candidates.clone());
        Ok(candidates)
    }
}

impl MergedBeanDefinitionPostProcessor for AutowiredPostProcessor {
    fn post_process_merged_bean_definition(
        &self,
        mbd: &RootBeanDefinition,
        class: &Arc<BeanClass>,
        bean_name: &str,
    ) -> BeansResult<()> {
        let metadata = Self::build_metadata(class);
        for property in &metadata {
            mbd.register_externally_managed_config_member(&property.name);
        }
        self.injection_metadata
            .write()
            .insert(bean_name.to_string(), Arc::new(metadata));
        Ok(())
    }

    fn reset_bean_definition(&self, bean_name: &str) {
        self.injection_metadata.write().remove(bean_name);
    }
}

/// 处理 `post_construct` / `pre_destroy`
#[derive(Default)]
pub struct LifecycleAnnotationPostProcessor;

impl LifecycleAnnotationPostProcessor {
    pub fn new() -> Self {
        Self
    }

    pub fn class() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            BeanClass::builder::<LifecycleAnnotationPostProcessor>("LifecycleAnnotationPostProcessor")
                .constructor(vec![], |_| Ok(LifecycleAnnotationPostProcessor::new()))
                .bean_post_processor()
                .priority_ordered()
                .build()
        }))
    }

    fn invoke(bean: &BeanObject, method_name: &str) -> anyhow::Result<()> {
        match bean.class().method(method_name) {
            Some(method) => method(bean),
            None => anyhow::bail!("No method named '{}' on class [{}]", method_name, bean.class_name()),
        }
    }
}

impl Ordered for LifecycleAnnotationPostProcessor {
    fn order(&self) -> i32 {
        LOWEST_PRECEDENCE - 3
    }
}

impl BeanPostProcessor for LifecycleAnnotationPostProcessor {
    fn post_process_before_initialization(&self, bean: BeanObject, bean_name: &str) -> BeansResult<Option<BeanObject>> {
        for method in bean.class().post_construct_methods() {
            tracing::trace!("Invoking post-construct method '{}' on bean '{}'", method, bean_name);
            Self::invoke(&bean, method).map_err(|e| {
                BeansError::creation_caused_by(bean_name, format!("Invocation of init method '{}' failed", method), e)
            })?;
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

impl MergedBeanDefinitionPostProcessor for LifecycleAnnotationPostProcessor {
    fn post_process_merged_bean_definition(
        &self,
        mbd: &RootBeanDefinition,
        class: &Arc<BeanClass>,
        _bean_name: &str,
    ) -> BeansResult<()> {
        for method in class.post_construct_methods() {
            mbd.register_externally_managed_init_method(method);
        }
        for method in class.pre_destroy_methods() {
            mbd.register_externally_managed_destroy_method(method);
        }
        Ok(())
    }
}

impl DestructionAwareBeanPostProcessor for LifecycleAnnotationPostProcessor {
    fn post_process_before_destruction(&self, bean: &BeanObject, bean_name: &str) -> BeansResult<()> {
        for method in bean.class().pre_destroy_methods() {
            tracing::trace!("Invoking pre-destroy method '{}' on bean '{}'", method, bean_name);
            if let Err(e) = Self::invoke(bean, method) {
                tracing::warn!("Destroy method '{}' on bean with name '{}' failed: {}", method, bean_name, e);
            }
        }
        Ok(())
    }

    fn requires_destruction(&self, bean: &BeanObject) -> bool {
        !bean.class().pre_destroy_methods().is_empty()
    }
}

/// 注册注解处理器和配置类处理器的基础设施定义（已存在时跳过）
pub fn register_annotation_config_processors(registry: &dyn BeanDefinitionRegistry) -> BeansResult<()> {
    let processors = [
        (AUTOWIRED_PROCESSOR_BEAN_NAME, AutowiredPostProcessor::class()),
        (LIFECYCLE_PROCESSOR_BEAN_NAME, LifecycleAnnotationPostProcessor::class()),
        (CONFIGURATION_CLASS_PROCESSOR_BEAN_NAME, ConfigurationClassPostProcessor::class()),
    ];
    for (name, class) in processors {
        if !registry.contains_bean_definition(name) {
            registry.register_bean_definition(name, BeanDefinition::of_class(&class).with_role(Role::Infrastructure))?;
        }
    }
    Ok(())
}
