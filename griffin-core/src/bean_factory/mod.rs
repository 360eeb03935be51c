//! Bean Factory - 核心容器
//!
//! 参考 Spring 的 BeanFactory 架构设计，接口按能力分层：
//! - [`BeanFactory`]：按名称取 bean，可作为 trait object 使用
//! - [`BeanFactoryExt`]：泛型的类型化获取
//! - [`ListableBeanFactory`]：按类型和能力列举
//! - [`BeanDefinitionRegistry`]：定义与别名的注册
//! - [`ConfigurableBeanFactory`]：后置处理器、作用域、单例和依赖关系
//! - [`ConfigurableListableBeanFactory`]：依赖解析、预实例化和冻结
//!
//! [`DefaultListableBeanFactory`] 是唯一的实现。

mod constructor_resolver;
mod creation;
mod disposable;
mod listable;
mod registry;
mod retrieval;
mod value_resolver;

use std::any::Any;
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, OnceLock, Weak};

use parking_lot::{Mutex, ReentrantMutex, RwLock};

use crate::class::{BeanClass, Capability};
use crate::convert::TypeConverter;
use crate::definition::BeanDefinition;
use crate::error::{BeansError, BeansResult};
use crate::merged::{MergedDefinitions, RootBeanDefinition};
use crate::object::BeanObject;
use crate::processor::{BeanPostProcessor, BeanPostProcessorCache};
use crate::scope::Scope;
use crate::settings::ContainerSettings;
use crate::singleton::SingletonRegistry;
use crate::utils::dependency::CreationTracker;

pub use listable::DependencyDescriptor;

/// BeanFactory - 最基础的容器接口
///
/// 注意：此 trait 不包含泛型方法，因此可以作为 trait object 使用
pub trait BeanFactory: Send + Sync {
    /// 通过名称获取 Bean，`&name` 返回工厂 bean 本身
    fn get_bean(&self, name: &str) -> BeansResult<BeanObject>;

    /// 使用显式参数创建 Bean（仅对非单例或尚未创建的单例有意义）
    fn get_bean_with_args(&self, name: &str, args: Vec<BeanObject>) -> BeansResult<BeanObject>;

    /// 获取唯一匹配类型的 Bean
    fn get_bean_of_type(&self, class: &Arc<BeanClass>) -> BeansResult<BeanObject>;

    /// 检查是否包含指定名称的 Bean（定义或单例）
    fn contains_bean(&self, name: &str) -> bool;

    fn is_singleton(&self, name: &str) -> BeansResult<bool>;

    fn is_prototype(&self, name: &str) -> BeansResult<bool>;

    /// 名称对应的 Bean 是否能赋给 `class`
    fn is_type_match(&self, name: &str, class: &BeanClass) -> BeansResult<bool>;

    /// 预测名称对应 Bean 的类型，不会创建 Bean
    fn get_type(&self, name: &str) -> BeansResult<Option<Arc<BeanClass>>>;

    fn get_aliases(&self, name: &str) -> Vec<String>;
}

/// BeanFactoryExt - BeanFactory 的扩展 trait
///
/// 提供泛型方法，不能作为 trait object 使用
pub trait BeanFactoryExt: BeanFactory {
    /// 通过名称获取 Bean 并转换为具体类型
    fn get_bean_typed<T: Any + Send + Sync>(&self, name: &str) -> BeansResult<Arc<T>> {
        let bean = self.get_bean(name)?;
        bean.downcast::<T>().ok_or_else(|| BeansError::TypeMismatch {
            actual_type: bean.class_name().to_string(),
            required_type: std::any::type_name::<T>().to_string(),
            message: format!("Bean named '{}' is not of the required type", name),
        })
    }

    /// 通过类型描述获取唯一 Bean 并转换为具体类型
    fn get_bean_typed_of<T: Any + Send + Sync>(&self, class: &Arc<BeanClass>) -> BeansResult<Arc<T>> {
        let bean = self.get_bean_of_type(class)?;
        bean.downcast::<T>().ok_or_else(|| BeansError::TypeMismatch {
            actual_type: bean.class_name().to_string(),
            required_type: std::any::type_name::<T>().to_string(),
            message: format!("Bean of type '{}' has an unexpected runtime type", class.name()),
        })
    }
}

impl<F: BeanFactory + ?Sized> BeanFactoryExt for F {}

/// ListableBeanFactory - 可列举的 Bean 工厂
pub trait ListableBeanFactory: BeanFactory {
    /// 匹配类型的 Bean 名称，按注册顺序
    ///
    /// `allow_eager_init` 为 `false` 时不会为了判断类型而创建工厂 bean。
    fn get_bean_names_for_type(&self, class: &BeanClass, include_non_singletons: bool, allow_eager_init: bool) -> Vec<String>;

    /// 类型具备某种能力的 Bean 名称
    fn get_bean_names_for_capability(
        &self,
        capability: Capability,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> Vec<String>;

    /// 匹配类型的全部 Bean
    fn get_beans_of_type(&self, class: &BeanClass) -> BeansResult<Vec<(String, BeanObject)>>;
}

/// BeanDefinitionRegistry - 定义注册表
///
/// 可作为 trait object 传给注册后置处理器
pub trait BeanDefinitionRegistry: Send + Sync {
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> BeansResult<()>;

    fn remove_bean_definition(&self, name: &str) -> BeansResult<()>;

    /// 获取原始（未合并的）定义
    fn get_bean_definition(&self, name: &str) -> BeansResult<BeanDefinition>;

    /// 原地修改已注册的定义，已合并的快照会失效
    fn modify_bean_definition(&self, name: &str, modifier: &mut dyn FnMut(&mut BeanDefinition)) -> BeansResult<()>;

    fn contains_bean_definition(&self, name: &str) -> bool;

    /// 所有定义名称，按注册顺序
    fn get_bean_definition_names(&self) -> Vec<String>;

    fn get_bean_definition_count(&self) -> usize;

    fn register_alias(&self, name: &str, alias: &str) -> BeansResult<()>;

    fn remove_alias(&self, alias: &str) -> BeansResult<()>;

    fn is_alias(&self, name: &str) -> bool;

    /// 名称已被定义、别名或依赖关系使用
    fn is_bean_name_in_use(&self, name: &str) -> bool;

    /// 注册类型描述，供按类名引用的定义解析
    fn register_class(&self, class: Arc<BeanClass>);
}

/// ConfigurableBeanFactory - 可配置的 Bean 工厂
pub trait ConfigurableBeanFactory: BeanFactory {
    fn set_parent_bean_factory(&self, parent: Arc<DefaultListableBeanFactory>) -> BeansResult<()>;

    fn parent_bean_factory(&self) -> Option<Arc<DefaultListableBeanFactory>>;

    /// 添加 BeanPostProcessor，已存在的同一处理器会移到末尾
    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>);

    /// 获取所有 BeanPostProcessor
    fn get_bean_post_processors(&self) -> Arc<Vec<Arc<dyn BeanPostProcessor>>>;

    fn get_bean_post_processor_count(&self) -> usize;

    fn register_scope(&self, name: &str, scope: Arc<dyn Scope>) -> BeansResult<()>;

    fn get_registered_scope(&self, name: &str) -> Option<Arc<dyn Scope>>;

    fn get_registered_scope_names(&self) -> Vec<String>;

    fn type_converter(&self) -> &TypeConverter;

    /// 注册外部创建好的单例
    fn register_singleton(&self, name: &str, object: BeanObject) -> BeansResult<()>;

    /// 已创建的单例（包括早期引用）
    fn get_singleton(&self, name: &str) -> BeansResult<Option<BeanObject>>;

    fn contains_singleton(&self, name: &str) -> bool;

    fn get_singleton_names(&self) -> Vec<String>;

    /// 记录 `dependent` 依赖 `bean_name`，销毁时先销毁 `dependent`
    fn register_dependent_bean(&self, bean_name: &str, dependent: &str);

    fn get_dependent_beans(&self, bean_name: &str) -> Vec<String>;

    fn get_dependencies_for_bean(&self, bean_name: &str) -> Vec<String>;

    fn is_currently_in_creation(&self, name: &str) -> bool;

    /// 合并后的定义，本地不存在时查父工厂
    fn get_merged_bean_definition(&self, name: &str) -> BeansResult<Arc<RootBeanDefinition>>;

    fn is_factory_bean(&self, name: &str) -> BeansResult<bool>;

    /// 按依赖顺序销毁所有单例
    fn destroy_singletons(&self);

    /// 从作用域中移除并销毁 Bean
    fn destroy_scoped_bean(&self, name: &str) -> BeansResult<()>;
}

/// ConfigurableListableBeanFactory - 可配置且可列举的 Bean 工厂
///
/// 这是 BeanFactoryPostProcessor 接收的工厂提供的能力
pub trait ConfigurableListableBeanFactory:
    ListableBeanFactory + ConfigurableBeanFactory + BeanDefinitionRegistry
{
    /// 自动装配时忽略该类型的属性
    fn ignore_dependency_type(&self, class_name: &str);

    /// 注册不是 bean、但可以被注入的对象
    fn register_resolvable_dependency(&self, class: &Arc<BeanClass>, value: BeanObject);

    fn is_autowire_candidate(&self, name: &str) -> BeansResult<bool>;

    /// 按类型解析依赖；`requesting_bean` 用于排除自引用
    fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        requesting_bean: Option<&str>,
    ) -> BeansResult<Option<BeanObject>>;

    /// 预实例化所有非懒加载单例
    fn preinstantiate_singletons(&self) -> BeansResult<()>;

    /// 冻结配置：合并定义之后可以放心缓存
    fn freeze_configuration(&self);

    /// 检查配置是否已冻结
    fn is_configuration_frozen(&self) -> bool;

    /// 将未创建过的 bean 的合并定义标记为过期
    fn clear_metadata_cache(&self);

    /// 定义中声明的 depends-on 关系
    fn get_dependency_graph(&self) -> HashMap<String, Vec<String>>;
}

type ResolvableSupplier = Arc<dyn Fn() -> BeansResult<BeanObject> + Send + Sync>;
type ProcessorList = Arc<Vec<Arc<dyn BeanPostProcessor>>>;

#[derive(Default)]
struct DefinitionTable {
    definitions: HashMap<String, BeanDefinition>,
    names: Vec<String>,
    /// 通过 `register_singleton` 注册、没有定义的单例
    manual_singletons: Vec<String>,
}

/// DefaultListableBeanFactory - 所有工厂接口的默认实现
pub struct DefaultListableBeanFactory {
    self_ref: Weak<DefaultListableBeanFactory>,
    parent: RwLock<Option<Arc<DefaultListableBeanFactory>>>,
    settings: RwLock<ContainerSettings>,

    /// 按名称注册的类型描述
    classes: RwLock<HashMap<String, Arc<BeanClass>>>,
    definitions: RwLock<DefinitionTable>,
    /// 别名 -> 名称
    aliases: RwLock<HashMap<String, String>>,

    merged: MergedDefinitions,
    /// 合并可能递归进入父定义
    merge_lock: ReentrantMutex<()>,
    /// 至少被创建过一次的 bean
    already_created: RwLock<HashSet<String>>,

    singletons: SingletonRegistry,
    /// 单例工厂 bean 生产的对象
    factory_bean_objects: Mutex<HashMap<String, BeanObject>>,
    prototypes_in_creation: CreationTracker,

    post_processors: RwLock<ProcessorList>,
    /// 按能力分组的缓存，连同构建它的处理器列表一起保存
    processor_cache: RwLock<Option<(ProcessorList, Arc<BeanPostProcessorCache>)>>,

    scopes: RwLock<HashMap<String, Arc<dyn Scope>>>,
    converter: TypeConverter,
    resolvable_dependencies: RwLock<Vec<(Arc<BeanClass>, ResolvableSupplier)>>,
    ignored_dependency_types: RwLock<HashSet<String>>,
    configuration_frozen: AtomicBool,
}

/// 工厂自身的类型描述，用于把工厂作为依赖注入
pub fn bean_factory_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| BeanClass::builder::<DefaultListableBeanFactory>("BeanFactory").build()))
}

impl DefaultListableBeanFactory {
    /// 创建新的 Bean 工厂
    pub fn new() -> Arc<Self> {
        Self::with_settings(ContainerSettings::default())
    }

    pub fn with_settings(settings: ContainerSettings) -> Arc<Self> {
        let factory = Arc::new_cyclic(|weak: &Weak<Self>| Self {
            self_ref: weak.clone(),
            parent: RwLock::new(None),
            settings: RwLock::new(settings),
            classes: RwLock::new(HashMap::new()),
            definitions: RwLock::new(DefinitionTable::default()),
            aliases: RwLock::new(HashMap::new()),
            merged: MergedDefinitions::default(),
            merge_lock: ReentrantMutex::new(()),
            already_created: RwLock::new(HashSet::new()),
            singletons: SingletonRegistry::new(),
            factory_bean_objects: Mutex::new(HashMap::new()),
            prototypes_in_creation: CreationTracker::new(),
            post_processors: RwLock::new(Arc::new(Vec::new())),
            processor_cache: RwLock::new(None),
            scopes: RwLock::new(HashMap::new()),
            converter: TypeConverter::new(),
            resolvable_dependencies: RwLock::new(Vec::new()),
            ignored_dependency_types: RwLock::new(HashSet::new()),
            configuration_frozen: AtomicBool::new(false),
        });
        for class in crate::class::classes::all() {
            factory.register_class(class);
        }
        factory.register_class(bean_factory_class());

        let weak = Weak::clone(&factory.self_ref);
        factory.register_resolvable_supplier(
            &bean_factory_class(),
            Arc::new(move || {
                let factory = weak.upgrade().ok_or_else(|| BeansError::illegal_state("Bean factory has been dropped"))?;
                Ok(BeanObject::from_arc(factory, bean_factory_class()))
            }),
        );
        factory
    }

    /// 当前设置的快照
    pub fn settings(&self) -> ContainerSettings {
        self.settings.read().clone()
    }

    pub fn set_settings(&self, settings: ContainerSettings) {
        tracing::debug!("Applying container settings: {:?}", settings);
        *self.settings.write() = settings;
    }

    pub fn set_allow_circular_references(&self, allow: bool) {
        self.settings.write().allow_circular_references = allow;
    }

    pub fn set_allow_bean_definition_overriding(&self, allow: bool) {
        self.settings.write().allow_bean_definition_overriding = allow;
    }

    /// 指向自身的 `Arc`
    pub fn shared(&self) -> BeansResult<Arc<Self>> {
        self.self_ref
            .upgrade()
            .ok_or_else(|| BeansError::illegal_state("Bean factory has been dropped"))
    }

    pub(crate) fn weak(&self) -> Weak<Self> {
        Weak::clone(&self.self_ref)
    }

    /// 以延迟求值的方式注册可注入对象，避免工厂与对象互相持有
    pub(crate) fn register_resolvable_supplier(&self, class: &Arc<BeanClass>, supplier: ResolvableSupplier) {
        let mut resolvable = self.resolvable_dependencies.write();
        resolvable.retain(|(existing, _)| existing.name() != class.name());
        resolvable.push((Arc::clone(class), supplier));
    }

    /// 当前处理器列表对应的分组缓存
    ///
    /// 缓存只在构建它的列表仍是当前列表时有效，列表每次变化都会替换成新的 `Arc`。
    pub(crate) fn processor_cache(&self) -> Arc<BeanPostProcessorCache> {
        let processors = Arc::clone(&self.post_processors.read());
        if let Some((source, cache)) = self.processor_cache.read().as_ref() {
            if Arc::ptr_eq(source, &processors) {
                return Arc::clone(cache);
            }
        }
        let cache = Arc::new(BeanPostProcessorCache::build(&processors));
        let mut slot = self.processor_cache.write();
        // 不用旧列表构建的缓存覆盖较新的缓存
        if Arc::ptr_eq(&processors, &self.post_processors.read()) {
            *slot = Some((processors, Arc::clone(&cache)));
        }
        cache
    }

    /// 移除后置处理器，返回是否存在
    pub fn remove_bean_post_processor(&self, processor: &Arc<dyn BeanPostProcessor>) -> bool {
        let mut processors = self.post_processors.write();
        let before = processors.len();
        let remaining: Vec<_> = processors
            .iter()
            .filter(|p| !same_processor(p, processor))
            .cloned()
            .collect();
        let removed = remaining.len() != before;
        *processors = Arc::new(remaining);
        removed
    }

    pub(crate) fn has_instantiation_aware_processors(&self) -> bool {
        !self.processor_cache().instantiation_aware.is_empty()
    }

    pub(crate) fn has_destruction_aware_processors(&self) -> bool {
        !self.processor_cache().destruction_aware.is_empty()
    }

    /// 创建失败后允许下一次重新合并定义
    pub(crate) fn cleanup_after_bean_creation_failure(&self, bean_name: &str) {
        self.already_created.write().remove(bean_name);
    }

    pub(crate) fn mark_bean_as_created(&self, bean_name: &str) {
        if self.already_created.read().contains(bean_name) {
            return;
        }
        let mut created = self.already_created.write();
        if created.insert(bean_name.to_string()) {
            // 创建前重新合并一次，期间元数据可能有变化
            self.merged.mark_stale(bean_name);
        }
    }

    pub(crate) fn has_already_created(&self, bean_name: &str) -> bool {
        self.already_created.read().contains(bean_name)
    }

    /// 销毁单例，同时清理工厂 bean 产品缓存
    pub fn destroy_singleton(&self, name: &str) {
        self.singletons.destroy_singleton(name);
        self.factory_bean_objects.lock().remove(name);
        self.definitions.write().manual_singletons.retain(|n| n != name);
    }
}

fn same_processor(a: &Arc<dyn BeanPostProcessor>, b: &Arc<dyn BeanPostProcessor>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl fmt::Debug for DefaultListableBeanFactory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names = self.definitions.read().names.clone();
        f.debug_struct("DefaultListableBeanFactory")
            .field("definitions", &names)
            .field("has_parent", &self.parent.read().is_some())
            .finish()
    }
}

impl ConfigurableBeanFactory for DefaultListableBeanFactory {
    fn set_parent_bean_factory(&self, parent: Arc<DefaultListableBeanFactory>) -> BeansResult<()> {
        let mut current = self.parent.write();
        if let Some(existing) = current.as_ref() {
            if !Arc::ptr_eq(existing, &parent) {
                return Err(BeansError::illegal_state(
                    "Already associated with parent BeanFactory",
                ));
            }
        }
        *current = Some(parent);
        Ok(())
    }

    fn parent_bean_factory(&self) -> Option<Arc<DefaultListableBeanFactory>> {
        self.parent.read().clone()
    }

    fn add_bean_post_processor(&self, processor: Arc<dyn BeanPostProcessor>) {
        let mut processors = self.post_processors.write();
        let mut updated: Vec<_> = processors
            .iter()
            .filter(|p| !same_processor(p, &processor))
            .cloned()
            .collect();
        updated.push(processor);
        *processors = Arc::new(updated);
    }

    fn get_bean_post_processors(&self) -> Arc<Vec<Arc<dyn BeanPostProcessor>>> {
        Arc::clone(&self.post_processors.read())
    }

    fn get_bean_post_processor_count(&self) -> usize {
        self.post_processors.read().len()
    }

    fn register_scope(&self, name: &str, scope: Arc<dyn Scope>) -> BeansResult<()> {
        if name == crate::constants::SCOPE_SINGLETON || name == crate::constants::SCOPE_PROTOTYPE {
            return Err(BeansError::illegal_state(
                "Cannot replace existing scopes 'singleton' and 'prototype'",
            ));
        }
        if self.scopes.write().insert(name.to_string(), scope).is_some() {
            tracing::debug!("Replacing scope '{}'", name);
        } else {
            tracing::debug!("Registering scope '{}'", name);
        }
        Ok(())
    }

    fn get_registered_scope(&self, name: &str) -> Option<Arc<dyn Scope>> {
        self.scopes.read().get(name).cloned()
    }

    fn get_registered_scope_names(&self) -> Vec<String> {
        self.scopes.read().keys().cloned().collect()
    }

    fn type_converter(&self) -> &TypeConverter {
        &self.converter
    }

    fn register_singleton(&self, name: &str, object: BeanObject) -> BeansResult<()> {
        self.singletons.register_singleton(name, object)?;
        let mut table = self.definitions.write();
        if !table.definitions.contains_key(name) && !table.manual_singletons.iter().any(|n| n == name) {
            table.manual_singletons.push(name.to_string());
        }
        tracing::debug!("Registered singleton '{}'", name);
        Ok(())
    }

    fn get_singleton(&self, name: &str) -> BeansResult<Option<BeanObject>> {
        self.singletons.get_singleton(&self.canonical_name(name), true)
    }

    fn contains_singleton(&self, name: &str) -> bool {
        self.singletons.contains_singleton(name)
    }

    fn get_singleton_names(&self) -> Vec<String> {
        self.singletons.singleton_names()
    }

    fn register_dependent_bean(&self, bean_name: &str, dependent: &str) {
        let canonical = self.canonical_name(bean_name);
        self.singletons.register_dependent_bean(&canonical, dependent);
    }

    fn get_dependent_beans(&self, bean_name: &str) -> Vec<String> {
        self.singletons.dependent_beans(bean_name)
    }

    fn get_dependencies_for_bean(&self, bean_name: &str) -> Vec<String> {
        self.singletons.dependencies_for_bean(bean_name)
    }

    fn is_currently_in_creation(&self, name: &str) -> bool {
        let bean_name = self.transformed_bean_name(name);
        self.singletons.is_currently_in_creation(&bean_name) || self.prototypes_in_creation.is_creating(&bean_name)
    }

    fn get_merged_bean_definition(&self, name: &str) -> BeansResult<Arc<RootBeanDefinition>> {
        let bean_name = self.transformed_bean_name(name);
        if !self.contains_bean_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                return parent.get_merged_bean_definition(&bean_name);
            }
        }
        self.merged_local_definition(&bean_name)
    }

    fn is_factory_bean(&self, name: &str) -> BeansResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        if let Some(instance) = self.singletons.get_singleton(&bean_name, false)? {
            return Ok(instance.as_factory_bean().is_some());
        }
        if !self.contains_bean_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                return parent.is_factory_bean(name);
            }
        }
        let mbd = self.merged_local_definition(&bean_name)?;
        Ok(self.is_factory_bean_definition(&bean_name, &mbd))
    }

    fn destroy_singletons(&self) {
        tracing::info!("Destroying singletons in {:?}", self);
        self.singletons.destroy_singletons();
        self.factory_bean_objects.lock().clear();
        self.definitions.write().manual_singletons.clear();
    }

    fn destroy_scoped_bean(&self, name: &str) -> BeansResult<()> {
        let bean_name = self.transformed_bean_name(name);
        let mbd = self.merged_local_definition(&bean_name)?;
        if mbd.is_singleton() || mbd.is_prototype() {
            return Err(BeansError::illegal_state(format!(
                "Bean name '{}' does not correspond to an object in a mutable scope",
                bean_name
            )));
        }
        let scope = self
            .get_registered_scope(mbd.scope())
            .ok_or_else(|| BeansError::NoSuchScope {
                scope: mbd.scope().to_string(),
            })?;
        if let Some(bean) = scope.remove(&bean_name) {
            self.destroy_bean_instance(&bean_name, bean, &mbd);
        }
        Ok(())
    }
}
