//! Bean 创建：实例化、属性填充、初始化回调和销毁注册

use std::sync::Arc;

use crate::class::{BeanClass, Capability, Executable};
use crate::constants::AFTER_PROPERTIES_SET;
use crate::definition::{AutowireMode, BeanClassRef, DependencyCheck, InstanceSupplier};
use crate::error::{BeansError, BeansResult};
use crate::merged::RootBeanDefinition;
use crate::object::{Arguments, BeanObject};
use crate::singleton::DisposableCallback;
use crate::values::{BeanValue, PropertyValues};

use super::constructor_resolver::ConstructorResolver;
use super::disposable::DisposableBeanAdapter;
use super::value_resolver::BeanDefinitionValueResolver;
use super::{BeanFactory, ConfigurableBeanFactory, DefaultListableBeanFactory, DependencyDescriptor};

impl DefaultListableBeanFactory {
    /// 按类名查找类型描述，本地找不到时查父工厂
    pub(crate) fn find_class(&self, name: &str) -> Option<Arc<BeanClass>> {
        if let Some(class) = self.classes.read().get(name) {
            return Some(Arc::clone(class));
        }
        self.parent_bean_factory().and_then(|parent| parent.find_class(name))
    }

    pub(crate) fn resolve_bean_class(
        &self,
        mbd: &RootBeanDefinition,
        bean_name: &str,
    ) -> BeansResult<Option<Arc<BeanClass>>> {
        if let Some(class) = mbd.resolved_class() {
            return Ok(Some(class));
        }
        match &mbd.definition().bean_class {
            None => Ok(None),
            Some(BeanClassRef::Resolved(class)) => Ok(Some(mbd.set_resolved_class(Arc::clone(class)))),
            Some(BeanClassRef::Named(name)) => match self.find_class(name) {
                Some(class) => Ok(Some(mbd.set_resolved_class(class))),
                None => Err(BeansError::BeanDefinitionStore {
                    bean_name: bean_name.to_string(),
                    message: format!("Cannot find class [{}]", name),
                }),
            },
        }
    }

    /// 创建 bean：实例化前处理器可以直接返回替代对象
    pub(crate) fn create_bean(
        &self,
        bean_name: &str,
        mbd: &Arc<RootBeanDefinition>,
        args: Option<&[BeanObject]>,
    ) -> BeansResult<BeanObject> {
        tracing::trace!("Creating instance of bean '{}'", bean_name);
        self.resolve_bean_class(mbd, bean_name)?;

        let shortcut = self.resolve_before_instantiation(bean_name, mbd).map_err(|e| {
            if e.bean_name() == Some(bean_name) {
                e
            } else {
                BeansError::creation_caused_by(bean_name, "BeanPostProcessor before instantiation of bean failed", e)
            }
        })?;
        if let Some(bean) = shortcut {
            return Ok(bean);
        }

        let bean = self.do_create_bean(bean_name, mbd, args)?;
        tracing::trace!("Finished creating instance of bean '{}'", bean_name);
        Ok(bean)
    }

    fn resolve_before_instantiation(
        &self,
        bean_name: &str,
        mbd: &RootBeanDefinition,
    ) -> BeansResult<Option<BeanObject>> {
        if mbd.before_instantiation_resolved() == Some(false) {
            return Ok(None);
        }
        let mut bean = None;
        if !mbd.definition().synthetic && self.has_instantiation_aware_processors() {
            if let Some(target) = self.determine_target_type(bean_name, mbd) {
                for processor in &self.processor_cache().instantiation_aware {
                    if let Some(result) = processor.post_process_before_instantiation(&target, bean_name)? {
                        bean = Some(result);
                        break;
                    }
                }
                if let Some(result) = bean.take() {
                    bean = Some(self.apply_after_initialization(result, bean_name)?);
                }
            }
        }
        mbd.set_before_instantiation_resolved(bean.is_some());
        Ok(bean)
    }

    fn do_create_bean(
        &self,
        bean_name: &str,
        mbd: &Arc<RootBeanDefinition>,
        args: Option<&[BeanObject]>,
    ) -> BeansResult<BeanObject> {
        let instance = self.create_bean_instance(bean_name, mbd, args)?;
        if !instance.is_null() {
            mbd.set_target_type(Arc::clone(instance.class()));
        }

        {
            let mut post_processed = mbd.post_processing_lock();
            if !*post_processed {
                self.apply_merged_definition_post_processors(mbd, instance.class(), bean_name)
                    .map_err(|e| {
                        BeansError::creation_caused_by(bean_name, "Post-processing of merged bean definition failed", e)
                    })?;
                *post_processed = true;
            }
        }

        let early_exposure = mbd.is_singleton()
            && self.settings.read().allow_circular_references
            && self.singletons.is_currently_in_creation(bean_name);
        if early_exposure {
            tracing::trace!(
                "Eagerly caching bean '{}' to allow for resolving potential circular references",
                bean_name
            );
            let weak = self.weak();
            let raw = instance.clone();
            let name = bean_name.to_string();
            let early_mbd = Arc::clone(mbd);
            self.singletons.add_singleton_factory(
                bean_name,
                Box::new(move || match weak.upgrade() {
                    Some(factory) => factory.get_early_bean_reference(&name, &early_mbd, raw),
                    None => Ok(raw),
                }),
            );
        }

        let initialized = self
            .populate_bean(bean_name, mbd, &instance)
            .and_then(|_| self.initialize_bean(bean_name, instance.clone(), Some(mbd)));
        let mut exposed = match initialized {
            Ok(exposed) => exposed,
            Err(e) if e.bean_name() == Some(bean_name) => return Err(e),
            Err(e) => return Err(BeansError::creation_caused_by(bean_name, "Initialization of bean failed", e)),
        };

        if early_exposure {
            if let Some(early) = self.singletons.get_singleton(bean_name, false)? {
                if exposed.ptr_eq(&instance) {
                    exposed = early;
                } else if !self.settings.read().allow_raw_injection_despite_wrapping
                    && self.singletons.has_dependent_bean(bean_name)
                {
                    let actual: Vec<String> = self
                        .singletons
                        .dependent_beans(bean_name)
                        .into_iter()
                        .filter(|dependent| !self.remove_singleton_if_created_for_type_check_only(dependent))
                        .collect();
                    if !actual.is_empty() {
                        return Err(BeansError::UnresolvableCircularReference {
                            bean_name: bean_name.to_string(),
                            dependents: actual,
                        });
                    }
                }
            }
        }

        self.register_disposable_bean_if_necessary(bean_name, &instance, mbd)?;
        Ok(exposed)
    }

    fn remove_singleton_if_created_for_type_check_only(&self, bean_name: &str) -> bool {
        if self.has_already_created(bean_name) {
            return false;
        }
        self.singletons.remove_singleton(bean_name);
        self.factory_bean_objects.lock().remove(bean_name);
        true
    }

    fn apply_merged_definition_post_processors(
        &self,
        mbd: &RootBeanDefinition,
        class: &Arc<BeanClass>,
        bean_name: &str,
    ) -> BeansResult<()> {
        for processor in &self.processor_cache().merged_definition {
            processor.post_process_merged_bean_definition(mbd, class, bean_name)?;
        }
        Ok(())
    }

    /// 早期引用：只经过 `early_bean_reference` 钩子
    fn get_early_bean_reference(
        &self,
        bean_name: &str,
        mbd: &RootBeanDefinition,
        bean: BeanObject,
    ) -> BeansResult<BeanObject> {
        let mut exposed = bean;
        if !mbd.definition().synthetic {
            for processor in &self.processor_cache().smart_instantiation_aware {
                exposed = processor.early_bean_reference(exposed, bean_name)?;
            }
        }
        Ok(exposed)
    }

    /// 依次尝试：实例提供回调、工厂方法、构造器自动装配、唯一的带参构造器、无参构造器
    fn create_bean_instance(
        &self,
        bean_name: &str,
        mbd: &Arc<RootBeanDefinition>,
        args: Option<&[BeanObject]>,
    ) -> BeansResult<BeanObject> {
        if let Some(supplier) = &mbd.definition().instance_supplier {
            return self.obtain_from_supplier(supplier, bean_name);
        }
        if mbd.definition().factory_method_name.is_some() {
            return ConstructorResolver::new(self).instantiate_using_factory_method(bean_name, mbd, args);
        }

        // 重复创建同一个 bean 时沿用已解析的构造器
        if args.is_none() {
            let (resolved, autowire_necessary) = {
                let cache = mbd.constructor_cache.lock();
                (cache.resolved.is_some(), cache.arguments_resolved)
            };
            if resolved {
                return if autowire_necessary {
                    ConstructorResolver::new(self).autowire_constructor(bean_name, mbd, None, None)
                } else {
                    self.instantiate_bean(bean_name, mbd)
                };
            }
        }

        let class = self
            .resolve_bean_class(mbd, bean_name)?
            .ok_or_else(|| BeansError::creation(bean_name, "No bean class specified on bean definition"))?;

        let candidates = self.determine_constructors_from_post_processors(&class, bean_name)?;
        let definition = mbd.definition();
        if candidates.is_some()
            || definition.autowire_mode == AutowireMode::Constructor
            || definition.has_constructor_args()
            || args.is_some_and(|a| !a.is_empty())
        {
            return ConstructorResolver::new(self).autowire_constructor(bean_name, mbd, candidates, args);
        }

        if let Some(preferred) = preferred_constructor(&class) {
            return ConstructorResolver::new(self).autowire_constructor(bean_name, mbd, Some(vec![preferred]), None);
        }

        self.instantiate_bean(bean_name, mbd)
    }

    fn obtain_from_supplier(&self, supplier: &InstanceSupplier, bean_name: &str) -> BeansResult<BeanObject> {
        let instance = supplier
            .get()
            .map_err(|e| BeansError::creation_caused_by(bean_name, "Instantiation of supplied bean failed", e))?;
        Ok(instance.unwrap_or_else(BeanObject::null))
    }

    fn determine_constructors_from_post_processors(
        &self,
        class: &Arc<BeanClass>,
        bean_name: &str,
    ) -> BeansResult<Option<Vec<Arc<Executable>>>> {
        for processor in &self.processor_cache().smart_instantiation_aware {
            if let Some(constructors) = processor.determine_candidate_constructors(class, bean_name)? {
                return Ok(Some(constructors));
            }
        }
        Ok(None)
    }

    /// 无参构造
    fn instantiate_bean(&self, bean_name: &str, mbd: &RootBeanDefinition) -> BeansResult<BeanObject> {
        let class = self
            .resolve_bean_class(mbd, bean_name)?
            .ok_or_else(|| BeansError::creation(bean_name, "No bean class specified on bean definition"))?;

        let constructor = {
            let mut cache = mbd.constructor_cache.lock();
            match &cache.resolved {
                Some(constructor) => Arc::clone(constructor),
                None => {
                    if class.is_interface() {
                        return Err(BeansError::creation(
                            bean_name,
                            format!("Failed to instantiate [{}]: Specified class is an interface", class.name()),
                        ));
                    }
                    let constructor = class.default_constructor().cloned().ok_or_else(|| {
                        BeansError::creation(
                            bean_name,
                            format!("Failed to instantiate [{}]: No default constructor found", class.name()),
                        )
                    })?;
                    cache.resolved = Some(Arc::clone(&constructor));
                    constructor
                }
            }
        };

        constructor.construct(&class, &Arguments::default()).map_err(|e| {
            BeansError::creation_caused_by(
                bean_name,
                format!("Failed to instantiate [{}]: Constructor threw exception", class.name()),
                e,
            )
        })
    }

    fn populate_bean(&self, bean_name: &str, mbd: &Arc<RootBeanDefinition>, bean: &BeanObject) -> BeansResult<()> {
        let definition = mbd.definition();
        if bean.is_null() {
            if !definition.property_values.is_empty() {
                return Err(BeansError::creation(bean_name, "Cannot apply property values to null instance"));
            }
            return Ok(());
        }

        let processors = self.processor_cache();
        if !definition.synthetic {
            for processor in &processors.instantiation_aware {
                if !processor.post_process_after_instantiation(bean, bean_name)? {
                    tracing::trace!("Property population of bean '{}' skipped by post-processor", bean_name);
                    return Ok(());
                }
            }
        }

        let mut pvs = definition.property_values.clone();
        match definition.autowire_mode {
            AutowireMode::ByName => self.autowire_by_name(bean_name, mbd, bean, &mut pvs)?,
            AutowireMode::ByType => self.autowire_by_type(bean_name, mbd, bean, &mut pvs)?,
            _ => {}
        }

        for processor in &processors.instantiation_aware {
            match processor.post_process_properties(pvs, bean, bean_name)? {
                Some(updated) => pvs = updated,
                None => return Ok(()),
            }
        }

        if definition.dependency_check != DependencyCheck::None {
            self.check_dependencies(bean_name, mbd, bean.class(), &pvs)?;
        }

        if !pvs.is_empty() {
            self.apply_property_values(bean_name, mbd, bean, &pvs)?;
        }
        Ok(())
    }

    /// 没有配置值、非简单类型、未被忽略的可写属性
    fn unsatisfied_non_simple_properties(&self, class: &BeanClass, pvs: &PropertyValues) -> Vec<(String, Arc<BeanClass>)> {
        let ignored = self.ignored_dependency_types.read();
        class
            .properties()
            .iter()
            .filter(|property| {
                !pvs.contains(&property.name)
                    && !property.ty.is_simple()
                    && !property.ty.is_object()
                    && !ignored.contains(property.ty.name())
            })
            .map(|property| (property.name.clone(), Arc::clone(&property.ty)))
            .collect()
    }

    fn autowire_by_name(
        &self,
        bean_name: &str,
        _mbd: &RootBeanDefinition,
        bean: &BeanObject,
        pvs: &mut PropertyValues,
    ) -> BeansResult<()> {
        for (property, _) in self.unsatisfied_non_simple_properties(bean.class(), pvs) {
            if self.contains_bean(&property) {
                let value = self.get_bean(&property)?;
                pvs.add(property.clone(), BeanValue::Object(value));
                self.register_dependent_bean(&property, bean_name);
                tracing::trace!(
                    "Added autowiring by name from bean name '{}' via property '{}' to bean named '{}'",
                    bean_name,
                    property,
                    property
                );
            } else {
                tracing::trace!(
                    "Not autowiring property '{}' of bean '{}' by name: no matching bean found",
                    property,
                    bean_name
                );
            }
        }
        Ok(())
    }

    fn autowire_by_type(
        &self,
        bean_name: &str,
        _mbd: &RootBeanDefinition,
        bean: &BeanObject,
        pvs: &mut PropertyValues,
    ) -> BeansResult<()> {
        // 优先排序的 bean 不为了类型匹配去初始化工厂 bean
        let eager = !bean.class().has_capability(Capability::PriorityOrdered);
        for (property, ty) in self.unsatisfied_non_simple_properties(bean.class(), pvs) {
            let descriptor = DependencyDescriptor::new(&ty)
                .with_name(property.clone())
                .with_required(false)
                .with_eager(eager);
            let mut autowired = Vec::new();
            let resolved = self
                .resolve_dependency_recording(&descriptor, Some(bean_name), Some(&mut autowired))
                .map_err(|e| BeansError::UnsatisfiedDependency {
                    bean_name: bean_name.to_string(),
                    injection_point: format!("bean property '{}'", property),
                    message: e.to_string(),
                    source: Some(Box::new(e)),
                    suppressed: Vec::new(),
                })?;
            if let Some(value) = resolved {
                pvs.add(property.clone(), BeanValue::Object(value));
            }
            for autowired_name in autowired {
                self.register_dependent_bean(&autowired_name, bean_name);
                tracing::trace!(
                    "Autowiring by type from bean name '{}' via property '{}' to bean named '{}'",
                    bean_name,
                    property,
                    autowired_name
                );
            }
        }
        Ok(())
    }

    fn check_dependencies(
        &self,
        bean_name: &str,
        mbd: &RootBeanDefinition,
        class: &BeanClass,
        pvs: &PropertyValues,
    ) -> BeansResult<()> {
        let check = mbd.definition().dependency_check;
        let ignored = self.ignored_dependency_types.read();
        for property in class.properties() {
            if pvs.contains(&property.name) || ignored.contains(property.ty.name()) {
                continue;
            }
            let simple = property.ty.is_simple();
            let unsatisfied = match check {
                DependencyCheck::All => true,
                DependencyCheck::Simple => simple,
                DependencyCheck::Objects => !simple,
                DependencyCheck::None => false,
            };
            if unsatisfied {
                return Err(BeansError::UnsatisfiedDependency {
                    bean_name: bean_name.to_string(),
                    injection_point: format!("bean property '{}'", property.name),
                    message: "Set this property value or disable dependency checking for this bean.".to_string(),
                    source: None,
                    suppressed: Vec::new(),
                });
            }
        }
        Ok(())
    }

    /// 解析引用和内部 bean、转换类型后写入属性；字面量的转换结果缓存在合并定义上
    fn apply_property_values(
        &self,
        bean_name: &str,
        mbd: &Arc<RootBeanDefinition>,
        bean: &BeanObject,
        pvs: &PropertyValues,
    ) -> BeansResult<()> {
        let class = Arc::clone(bean.class());
        let resolver = BeanDefinitionValueResolver::new(self, bean_name, mbd);

        for pv in pvs.iter() {
            let property = class.property(&pv.name).ok_or_else(|| {
                BeansError::creation_caused_by(
                    bean_name,
                    "Error setting property values",
                    BeansError::NotWritableProperty {
                        class_name: class.name().to_string(),
                        property: pv.name.clone(),
                    },
                )
            })?;

            let literal = match &pv.value {
                BeanValue::Literal(typed) if pv.value.is_cacheable_literal() => Some(typed.value.as_str()),
                _ => None,
            };
            let cached = literal.and_then(|literal| mbd.cached_converted_property(&pv.name, literal));
            let value = match cached {
                Some(value) => value,
                None => {
                    let resolved = resolver.resolve_value_if_necessary(&format!("bean property '{}'", pv.name), &pv.value)?;
                    let converted = self.converter.convert_if_necessary(&resolved, &property.ty).map_err(|e| {
                        BeansError::creation_caused_by(
                            bean_name,
                            format!("Error setting property values: failed to convert property '{}'", pv.name),
                            e,
                        )
                    })?;
                    if let Some(literal) = literal {
                        if self.converter.is_cacheable(&converted) {
                            mbd.cache_converted_property(&pv.name, literal, converted.clone());
                        }
                    }
                    converted
                }
            };

            property.set(bean, value).map_err(|e| {
                BeansError::creation_caused_by(bean_name, format!("Error setting property '{}'", pv.name), e)
            })?;
        }
        Ok(())
    }

    /// Aware 回调、初始化前处理、初始化方法、初始化后处理
    pub(crate) fn initialize_bean(
        &self,
        bean_name: &str,
        bean: BeanObject,
        mbd: Option<&RootBeanDefinition>,
    ) -> BeansResult<BeanObject> {
        self.invoke_aware_methods(bean_name, &bean)?;

        let synthetic = mbd.is_some_and(|mbd| mbd.definition().synthetic);
        let mut wrapped = bean;
        if !synthetic {
            wrapped = self.apply_before_initialization(wrapped, bean_name)?;
        }

        self.invoke_init_methods(bean_name, &wrapped, mbd)?;

        if !synthetic {
            wrapped = self.apply_after_initialization(wrapped, bean_name)?;
        }
        Ok(wrapped)
    }

    fn invoke_aware_methods(&self, bean_name: &str, bean: &BeanObject) -> BeansResult<()> {
        if bean.is_null() {
            return Ok(());
        }
        if let Some(aware) = bean.as_bean_name_aware() {
            aware.set_bean_name(bean_name);
        }
        if let Some(aware) = bean.as_bean_factory_aware() {
            aware
                .set_bean_factory(self.shared()?)
                .map_err(|e| BeansError::creation_caused_by(bean_name, "BeanFactoryAware callback failed", e))?;
        }
        Ok(())
    }

    fn invoke_init_methods(&self, bean_name: &str, bean: &BeanObject, mbd: Option<&RootBeanDefinition>) -> BeansResult<()> {
        if bean.is_null() {
            return Ok(());
        }

        let initializing = bean.as_initializing_bean();
        if let Some(initializing) = &initializing {
            if mbd.map_or(true, |mbd| !mbd.is_externally_managed_init_method(AFTER_PROPERTIES_SET)) {
                tracing::trace!("Invoking after_properties_set() on bean with name '{}'", bean_name);
                initializing
                    .after_properties_set()
                    .map_err(|e| BeansError::creation_caused_by(bean_name, "Invocation of init method failed", e))?;
            }
        }

        let Some(mbd) = mbd else {
            return Ok(());
        };
        for method in &mbd.definition().init_method_names {
            if method.is_empty()
                || (initializing.is_some() && method == AFTER_PROPERTIES_SET)
                || mbd.is_externally_managed_init_method(method)
            {
                continue;
            }
            self.invoke_custom_init_method(bean_name, bean, mbd, method)?;
        }
        Ok(())
    }

    fn invoke_custom_init_method(
        &self,
        bean_name: &str,
        bean: &BeanObject,
        mbd: &RootBeanDefinition,
        method_name: &str,
    ) -> BeansResult<()> {
        match bean.class().method(method_name) {
            Some(method) => {
                tracing::trace!("Invoking init method '{}' on bean with name '{}'", method_name, bean_name);
                method(bean).map_err(|e| {
                    BeansError::creation_caused_by(
                        bean_name,
                        format!("Invocation of init method '{}' failed", method_name),
                        e,
                    )
                })
            }
            None if mbd.definition().enforce_init_method => Err(BeansError::BeanDefinitionStore {
                bean_name: bean_name.to_string(),
                message: format!(
                    "Could not find an init method named '{}' on bean with name '{}'",
                    method_name, bean_name
                ),
            }),
            None => {
                tracing::trace!(
                    "No default init method named '{}' found on bean with name '{}'",
                    method_name,
                    bean_name
                );
                Ok(())
            }
        }
    }

    /// 任一处理器返回 `None` 时停止，沿用上一步的对象
    pub(crate) fn apply_before_initialization(&self, bean: BeanObject, bean_name: &str) -> BeansResult<BeanObject> {
        let mut result = bean;
        for processor in self.get_bean_post_processors().iter() {
            match processor.post_process_before_initialization(result.clone(), bean_name)? {
                Some(current) => result = current,
                None => return Ok(result),
            }
        }
        Ok(result)
    }

    pub(crate) fn apply_after_initialization(&self, bean: BeanObject, bean_name: &str) -> BeansResult<BeanObject> {
        let mut result = bean;
        for processor in self.get_bean_post_processors().iter() {
            match processor.post_process_after_initialization(result.clone(), bean_name)? {
                Some(current) => result = current,
                None => return Ok(result),
            }
        }
        Ok(result)
    }

    fn requires_destruction(&self, bean: &BeanObject, mbd: &RootBeanDefinition) -> bool {
        if bean.is_null() {
            return false;
        }
        DisposableBeanAdapter::has_destroy_method(bean, mbd)
            || (self.has_destruction_aware_processors()
                && DisposableBeanAdapter::has_applicable_processors(bean, &self.processor_cache().destruction_aware))
    }

    fn register_disposable_bean_if_necessary(
        &self,
        bean_name: &str,
        bean: &BeanObject,
        mbd: &RootBeanDefinition,
    ) -> BeansResult<()> {
        if mbd.is_prototype() || !self.requires_destruction(bean, mbd) {
            return Ok(());
        }
        let adapter = DisposableBeanAdapter::new(
            bean.clone(),
            bean_name,
            mbd,
            &self.processor_cache().destruction_aware,
        )?;
        if mbd.is_singleton() {
            self.singletons.register_disposable_bean(bean_name, Arc::new(adapter));
        } else {
            let scope = self
                .get_registered_scope(mbd.scope())
                .ok_or_else(|| BeansError::NoSuchScope {
                    scope: mbd.scope().to_string(),
                })?;
            scope.register_destruction_callback(bean_name, Box::new(move || adapter.destroy()));
        }
        Ok(())
    }

    /// 按定义执行销毁回调，不抛出错误
    pub(crate) fn destroy_bean_instance(&self, bean_name: &str, bean: BeanObject, mbd: &RootBeanDefinition) {
        match DisposableBeanAdapter::new(bean, bean_name, mbd, &self.processor_cache().destruction_aware) {
            Ok(adapter) => adapter.destroy(),
            Err(e) => tracing::warn!("Destruction of bean with name '{}' skipped: {}", bean_name, e),
        }
    }

    /// 销毁一个原型 bean 实例
    pub fn destroy_bean(&self, name: &str, bean: BeanObject) -> BeansResult<()> {
        let bean_name = self.transformed_bean_name(name);
        let mbd = self.get_merged_bean_definition(&bean_name)?;
        self.destroy_bean_instance(&bean_name, bean, &mbd);
        Ok(())
    }
}

/// 只有一个构造器且带参数时直接使用它
fn preferred_constructor(class: &BeanClass) -> Option<Arc<Executable>> {
    match class.constructors() {
        [only] if only.param_count() > 0 => Some(Arc::clone(only)),
        _ => None,
    }
}
