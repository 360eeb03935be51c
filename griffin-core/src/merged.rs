//! 合并后的 Bean 定义
//!
//! 子定义和父定义合并成一个扁平、只读的快照。快照按名称缓存，定义可能被
//! 修改时只标记为过期，下次访问时重新合并，并在类名、工厂 bean 名、工厂方法名
//! 都没有变化时沿用旧快照上已经解析出的类型信息。

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::class::{BeanClass, Executable};
use crate::constants::SCOPE_SINGLETON;
use crate::definition::BeanDefinition;
use crate::object::BeanObject;
use crate::values::ValueHolder;

/// 构造器解析缓存
#[derive(Default)]
pub(crate) struct ConstructorCache {
    pub resolved: Option<Arc<Executable>>,
    pub arguments_resolved: bool,
    /// 完全解析的参数，可以直接复用
    pub resolved_arguments: Option<Vec<BeanObject>>,
    /// 需要在每次创建时重新解析的参数
    pub prepared_arguments: Option<Vec<PreparedArgument>>,
}

/// 缓存在合并定义上的参数
#[derive(Clone)]
pub(crate) enum PreparedArgument {
    /// 转换后不再变化的值
    Resolved(BeanObject),
    /// 原始定义值，每次创建时重新解析
    Value(ValueHolder),
    /// 通过依赖查找得到，每次重新查找
    Autowired,
}

#[derive(Default)]
struct ExternallyManaged {
    config_members: HashSet<String>,
    init_methods: HashSet<String>,
    destroy_methods: HashSet<String>,
}

/// 合并后的定义
pub struct RootBeanDefinition {
    definition: BeanDefinition,
    resolved_class: OnceLock<Arc<BeanClass>>,
    stale: AtomicBool,
    pub(crate) constructor_cache: Mutex<ConstructorCache>,
    post_processed: Mutex<bool>,
    before_instantiation_resolved: Mutex<Option<bool>>,
    is_factory_bean: Mutex<Option<bool>>,
    target_type: RwLock<Option<Arc<BeanClass>>>,
    factory_method_return_type: RwLock<Option<Arc<BeanClass>>>,
    factory_method_to_introspect: RwLock<Option<Arc<Executable>>>,
    externally_managed: Mutex<ExternallyManaged>,
    converted_properties: Mutex<HashMap<String, (String, BeanObject)>>,
}

impl RootBeanDefinition {
    pub fn new(definition: BeanDefinition) -> Self {
        let resolved_class = OnceLock::new();
        if let Some(class) = definition.resolved_class() {
            let _ = resolved_class.set(Arc::clone(class));
        }
        Self {
            definition,
            resolved_class,
            stale: AtomicBool::new(false),
            constructor_cache: Mutex::new(ConstructorCache::default()),
            post_processed: Mutex::new(false),
            before_instantiation_resolved: Mutex::new(None),
            is_factory_bean: Mutex::new(None),
            target_type: RwLock::new(None),
            factory_method_return_type: RwLock::new(None),
            factory_method_to_introspect: RwLock::new(None),
            externally_managed: Mutex::new(ExternallyManaged::default()),
            converted_properties: Mutex::new(HashMap::new()),
        }
    }

    pub fn definition(&self) -> &BeanDefinition {
        &self.definition
    }

    pub fn scope(&self) -> &str {
        &self.definition.scope
    }

    pub fn is_singleton(&self) -> bool {
        self.definition.is_singleton()
    }

    pub fn is_prototype(&self) -> bool {
        self.definition.is_prototype()
    }

    pub fn is_abstract(&self) -> bool {
        self.definition.is_abstract
    }

    pub fn is_lazy_init(&self) -> bool {
        self.definition.is_lazy_init()
    }

    pub fn is_stale(&self) -> bool {
        self.stale.load(Ordering::Acquire)
    }

    pub fn mark_stale(&self) {
        self.stale.store(true, Ordering::Release);
    }

    pub fn resolved_class(&self) -> Option<Arc<BeanClass>> {
        self.resolved_class.get().cloned()
    }

    pub(crate) fn set_resolved_class(&self, class: Arc<BeanClass>) -> Arc<BeanClass> {
        Arc::clone(self.resolved_class.get_or_init(|| class))
    }

    pub fn target_type(&self) -> Option<Arc<BeanClass>> {
        self.target_type.read().clone()
    }

    pub(crate) fn set_target_type(&self, class: Arc<BeanClass>) {
        *self.target_type.write() = Some(class);
    }

    pub(crate) fn factory_method_return_type(&self) -> Option<Arc<BeanClass>> {
        self.factory_method_return_type.read().clone()
    }

    pub(crate) fn set_factory_method_return_type(&self, class: Arc<BeanClass>) {
        *self.factory_method_return_type.write() = Some(class);
    }

    pub(crate) fn factory_method_to_introspect(&self) -> Option<Arc<Executable>> {
        self.factory_method_to_introspect.read().clone()
    }

    pub(crate) fn set_factory_method_to_introspect(&self, method: Arc<Executable>) {
        *self.factory_method_to_introspect.write() = Some(method);
    }

    pub(crate) fn is_factory_bean(&self) -> Option<bool> {
        *self.is_factory_bean.lock()
    }

    pub(crate) fn set_is_factory_bean(&self, value: bool) {
        *self.is_factory_bean.lock() = Some(value);
    }

    pub(crate) fn before_instantiation_resolved(&self) -> Option<bool> {
        *self.before_instantiation_resolved.lock()
    }

    pub(crate) fn set_before_instantiation_resolved(&self, value: bool) {
        *self.before_instantiation_resolved.lock() = Some(value);
    }

    /// 合并定义后置处理只执行一次；守卫持有期间其他线程等待
    pub(crate) fn post_processing_lock(&self) -> MutexGuard<'_, bool> {
        self.post_processed.lock()
    }

    pub fn is_post_processed(&self) -> bool {
        *self.post_processed.lock()
    }

    pub fn register_externally_managed_config_member(&self, member: &str) {
        self.externally_managed.lock().config_members.insert(member.to_string());
    }

    pub fn is_externally_managed_config_member(&self, member: &str) -> bool {
        self.externally_managed.lock().config_members.contains(member)
    }

    pub fn register_externally_managed_init_method(&self, method: &str) {
        self.externally_managed.lock().init_methods.insert(method.to_string());
    }

    pub fn is_externally_managed_init_method(&self, method: &str) -> bool {
        self.externally_managed.lock().init_methods.contains(method)
    }

    pub fn register_externally_managed_destroy_method(&self, method: &str) {
        self.externally_managed.lock().destroy_methods.insert(method.to_string());
    }

    pub fn is_externally_managed_destroy_method(&self, method: &str) -> bool {
        self.externally_managed.lock().destroy_methods.contains(method)
    }

    /// 字面量属性上一次的转换结果
    pub(crate) fn cached_converted_property(&self, property: &str, literal: &str) -> Option<BeanObject> {
        self.converted_properties
            .lock()
            .get(property)
            .filter(|(source, _)| source == literal)
            .map(|(_, value)| value.clone())
    }

    pub(crate) fn cache_converted_property(&self, property: &str, literal: &str, value: BeanObject) {
        self.converted_properties
            .lock()
            .insert(property.to_string(), (literal.to_string(), value));
    }

    /// 沿用旧快照上与定义内容无关的类型信息
    pub(crate) fn copy_relevant_caches_from(&self, previous: &RootBeanDefinition) {
        let same_target = |a: &BeanDefinition, b: &BeanDefinition| {
            a.bean_class_name() == b.bean_class_name()
                && a.factory_bean_name == b.factory_bean_name
                && a.factory_method_name == b.factory_method_name
        };
        if !same_target(&self.definition, &previous.definition) {
            return;
        }
        if let Some(target) = previous.target_type() {
            self.set_target_type(target);
        }
        if let Some(is_factory) = previous.is_factory_bean() {
            self.set_is_factory_bean(is_factory);
        }
        if let Some(return_type) = previous.factory_method_return_type() {
            self.set_factory_method_return_type(return_type);
        }
        if let Some(method) = previous.factory_method_to_introspect() {
            self.set_factory_method_to_introspect(method);
        }
    }
}

impl std::fmt::Debug for RootBeanDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootBeanDefinition")
            .field("definition", &self.definition)
            .field("stale", &self.is_stale())
            .finish()
    }
}

/// 合并子定义和父定义：父定义深拷贝后被子定义覆盖，不修改父定义
///
/// `containing` 是外层 bean 的合并定义（内部 bean 时），外层非单例时内部 bean
/// 不能保持单例。
pub fn merge_definitions(
    child: &BeanDefinition,
    parent: Option<&BeanDefinition>,
    containing: Option<&RootBeanDefinition>,
) -> BeanDefinition {
    let mut merged = match parent {
        Some(parent) => {
            let mut base = parent.clone();
            base.override_from(child);
            base
        }
        None => child.clone(),
    };
    merged.parent_name = None;
    if merged.scope.is_empty() {
        merged.scope = SCOPE_SINGLETON.to_string();
    }
    if let Some(containing) = containing {
        if !containing.is_singleton() && merged.is_singleton() {
            merged.scope = containing.scope().to_string();
        }
    }
    merged
}

/// 按名称缓存的合并定义
#[derive(Default)]
pub(crate) struct MergedDefinitions {
    entries: RwLock<HashMap<String, Arc<RootBeanDefinition>>>,
}

impl MergedDefinitions {
    pub fn get(&self, name: &str) -> Option<Arc<RootBeanDefinition>> {
        self.entries.read().get(name).cloned()
    }

    pub fn insert(&self, name: &str, mbd: Arc<RootBeanDefinition>) {
        self.entries.write().insert(name.to_string(), mbd);
    }

    pub fn remove(&self, name: &str) -> Option<Arc<RootBeanDefinition>> {
        self.entries.write().remove(name)
    }

    pub fn mark_stale(&self, name: &str) {
        if let Some(mbd) = self.entries.read().get(name) {
            mbd.mark_stale();
        }
    }

    /// 将 `keep` 之外的条目全部标记为过期
    pub fn mark_all_stale_except(&self, keep: impl Fn(&str) -> bool) {
        for (name, mbd) in self.entries.read().iter() {
            if !keep(name) {
                mbd.mark_stale();
            }
        }
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::SCOPE_PROTOTYPE;
    use crate::values::BeanValue;

    #[test]
    fn test_merge_is_pure_and_idempotent() {
        let parent = BeanDefinition::of_class_name("Base").with_property("a", BeanValue::literal("1"));
        let child = BeanDefinition::child_of("base").with_property("b", BeanValue::literal("2"));

        let first = merge_definitions(&child, Some(&parent), None);
        let second = merge_definitions(&child, Some(&parent), None);

        assert_eq!(first, second);
        assert_eq!(first.scope, SCOPE_SINGLETON);
        assert_eq!(first.parent_name, None);
        assert_eq!(parent.property_values.len(), 1);
    }

    #[test]
    fn test_inner_bean_takes_non_singleton_scope_of_containing_bean() {
        let containing = RootBeanDefinition::new(
            merge_definitions(&BeanDefinition::new().with_scope(SCOPE_PROTOTYPE), None, None),
        );
        let inner = merge_definitions(&BeanDefinition::new(), None, Some(&containing));
        assert_eq!(inner.scope, SCOPE_PROTOTYPE);
    }

    #[test]
    fn test_relevant_caches_survive_remerge() {
        let def = BeanDefinition::of_class_name("Service").with_factory_method("create");
        let previous = RootBeanDefinition::new(def.clone());
        previous.set_is_factory_bean(false);
        previous.set_target_type(crate::class::classes::string());

        let fresh = RootBeanDefinition::new(def.clone());
        fresh.copy_relevant_caches_from(&previous);
        assert_eq!(fresh.is_factory_bean(), Some(false));
        assert!(fresh.target_type().is_some());

        let changed = RootBeanDefinition::new(def.with_factory_method("other"));
        changed.copy_relevant_caches_from(&previous);
        assert!(changed.target_type().is_none());
    }

    #[test]
    fn test_stale_marking() {
        let cache = MergedDefinitions::default();
        cache.insert("a", Arc::new(RootBeanDefinition::new(BeanDefinition::new())));
        cache.insert("b", Arc::new(RootBeanDefinition::new(BeanDefinition::new())));

        cache.mark_all_stale_except(|name| name == "a");

        assert!(!cache.get("a").unwrap().is_stale());
        assert!(cache.get("b").unwrap().is_stale());
    }

    #[test]
    fn test_converted_property_cache_keyed_by_literal() {
        let mbd = RootBeanDefinition::new(BeanDefinition::new());
        mbd.cache_converted_property("port", "8080", BeanObject::i32(8080));

        assert!(mbd.cached_converted_property("port", "8080").is_some());
        assert!(mbd.cached_converted_property("port", "9090").is_none());
    }
}
