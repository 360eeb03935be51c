//! 后置处理器 - 容器扩展点
//!
//! 类似 Spring 的 `BeanPostProcessor` 体系。单个处理器对象可以同时具备多种能力，
//! 通过 `as_*` 方法声明；容器在处理器列表变化时按能力分组缓存，创建 bean 时
//! 只遍历对应分组。

use std::sync::Arc;

use crate::bean_factory::{BeanDefinitionRegistry, DefaultListableBeanFactory};
use crate::class::{BeanClass, Executable};
use crate::error::BeansResult;
use crate::merged::RootBeanDefinition;
use crate::object::BeanObject;
use crate::values::PropertyValues;

/// BeanPostProcessor trait
///
/// 在 Bean 初始化的不同阶段提供钩子，允许替换 Bean 实例。
///
/// 使用场景：
/// - 代理创建
/// - Bean 包装
/// - 注解驱动的注入
///
/// 返回 `Ok(None)` 表示停止调用后续处理器，沿用上一步的对象。
pub trait BeanPostProcessor: Send + Sync {
    /// 在初始化回调之前调用
    fn post_process_before_initialization(&self, bean: BeanObject, _bean_name: &str) -> BeansResult<Option<BeanObject>> {
        Ok(Some(bean))
    }

    /// 在初始化回调之后调用，代理通常在这里生成
    fn post_process_after_initialization(&self, bean: BeanObject, _bean_name: &str) -> BeansResult<Option<BeanObject>> {
        Ok(Some(bean))
    }

    fn as_instantiation_aware(self: Arc<Self>) -> Option<Arc<dyn InstantiationAwareBeanPostProcessor>> {
        None
    }

    fn as_smart_instantiation_aware(self: Arc<Self>) -> Option<Arc<dyn SmartInstantiationAwareBeanPostProcessor>> {
        None
    }

    fn as_merged_definition_processor(self: Arc<Self>) -> Option<Arc<dyn MergedBeanDefinitionPostProcessor>> {
        None
    }

    fn as_destruction_aware(self: Arc<Self>) -> Option<Arc<dyn DestructionAwareBeanPostProcessor>> {
        None
    }
}

/// 实例化前后以及属性填充阶段的钩子
pub trait InstantiationAwareBeanPostProcessor: BeanPostProcessor {
    /// 返回非空对象时跳过默认实例化，直接进入初始化后处理
    fn post_process_before_instantiation(&self, _class: &Arc<BeanClass>, _bean_name: &str) -> BeansResult<Option<BeanObject>> {
        Ok(None)
    }

    /// 返回 `false` 时跳过属性填充
    fn post_process_after_instantiation(&self, _bean: &BeanObject, _bean_name: &str) -> BeansResult<bool> {
        Ok(true)
    }

    /// 处理即将应用的属性值；返回 `None` 表示停止填充
    fn post_process_properties(
        &self,
        pvs: PropertyValues,
        _bean: &BeanObject,
        _bean_name: &str,
    ) -> BeansResult<Option<PropertyValues>> {
        Ok(Some(pvs))
    }
}

/// 类型预测、候选构造器和早期引用
pub trait SmartInstantiationAwareBeanPostProcessor: InstantiationAwareBeanPostProcessor {
    fn predict_bean_type(&self, _class: &Arc<BeanClass>, _bean_name: &str) -> Option<Arc<BeanClass>> {
        None
    }

    fn determine_candidate_constructors(
        &self,
        _class: &Arc<BeanClass>,
        _bean_name: &str,
    ) -> BeansResult<Option<Vec<Arc<Executable>>>> {
        Ok(None)
    }

    /// 循环依赖时暴露给其他 bean 的早期引用
    fn early_bean_reference(&self, bean: BeanObject, _bean_name: &str) -> BeansResult<BeanObject> {
        Ok(bean)
    }
}

/// 在第一次实例化前检查合并后的定义
pub trait MergedBeanDefinitionPostProcessor: BeanPostProcessor {
    fn post_process_merged_bean_definition(
        &self,
        mbd: &RootBeanDefinition,
        class: &Arc<BeanClass>,
        bean_name: &str,
    ) -> BeansResult<()>;

    /// 定义被重置时清理缓存
    fn reset_bean_definition(&self, _bean_name: &str) {}
}

/// 销毁前回调
pub trait DestructionAwareBeanPostProcessor: BeanPostProcessor {
    fn post_process_before_destruction(&self, bean: &BeanObject, bean_name: &str) -> BeansResult<()>;

    fn requires_destruction(&self, _bean: &BeanObject) -> bool {
        true
    }
}

/// 在任何 bean 实例化前修改工厂中的定义
pub trait BeanFactoryPostProcessor: Send + Sync {
    fn post_process_bean_factory(&self, factory: &DefaultListableBeanFactory) -> BeansResult<()>;

    fn as_registry_post_processor(self: Arc<Self>) -> Option<Arc<dyn BeanDefinitionRegistryPostProcessor>> {
        None
    }
}

/// 可以注册新定义的工厂后置处理器，先于普通工厂后置处理器执行
pub trait BeanDefinitionRegistryPostProcessor: BeanFactoryPostProcessor {
    fn post_process_bean_definition_registry(&self, registry: &dyn BeanDefinitionRegistry) -> BeansResult<()>;
}

/// 按能力分组的处理器
#[derive(Default)]
pub(crate) struct BeanPostProcessorCache {
    pub instantiation_aware: Vec<Arc<dyn InstantiationAwareBeanPostProcessor>>,
    pub smart_instantiation_aware: Vec<Arc<dyn SmartInstantiationAwareBeanPostProcessor>>,
    pub destruction_aware: Vec<Arc<dyn DestructionAwareBeanPostProcessor>>,
    pub merged_definition: Vec<Arc<dyn MergedBeanDefinitionPostProcessor>>,
}

impl BeanPostProcessorCache {
    pub fn build(processors: &[Arc<dyn BeanPostProcessor>]) -> Self {
        let mut cache = Self::default();
        for processor in processors {
            if let Some(p) = Arc::clone(processor).as_instantiation_aware() {
                cache.instantiation_aware.push(p);
            }
            if let Some(p) = Arc::clone(processor).as_smart_instantiation_aware() {
                cache.smart_instantiation_aware.push(p);
            }
            if let Some(p) = Arc::clone(processor).as_destruction_aware() {
                cache.destruction_aware.push(p);
            }
            if let Some(p) = Arc::clone(processor).as_merged_definition_processor() {
                cache.merged_definition.push(p);
            }
        }
        cache
    }
}
