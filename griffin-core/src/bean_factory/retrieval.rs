//! 按名称获取 bean：单例缓存、父工厂委托、depends-on、作用域分发和工厂 bean

use std::sync::Arc;

use crate::class::BeanClass;
use crate::constants::{is_factory_dereference, FACTORY_BEAN_PREFIX};
use crate::error::{BeansError, BeansResult};
use crate::lifecycle::FactoryBean;
use crate::merged::RootBeanDefinition;
use crate::object::BeanObject;

use super::{
    BeanDefinitionRegistry, BeanFactory, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, DependencyDescriptor,
};

impl DefaultListableBeanFactory {
    pub(crate) fn do_get_bean(
        &self,
        name: &str,
        args: Option<&[BeanObject]>,
        type_check_only: bool,
    ) -> BeansResult<BeanObject> {
        let bean_name = self.transformed_bean_name(name);

        // 单例缓存，包括循环引用中提前暴露的引用
        if args.is_none() {
            if let Some(shared) = self.singletons.get_singleton(&bean_name, true)? {
                if self.singletons.is_currently_in_creation(&bean_name) {
                    tracing::trace!(
                        "Returning eagerly cached instance of singleton bean '{}' that is not fully initialized yet - a consequence of a circular reference",
                        bean_name
                    );
                } else {
                    tracing::trace!("Returning cached instance of singleton bean '{}'", bean_name);
                }
                return self.get_object_for_bean_instance(shared, name, &bean_name, None);
            }
        }

        if self.prototypes_in_creation.is_creating(&bean_name) {
            return Err(BeansError::CurrentlyInCreation { bean_name });
        }

        if let Some(parent) = self.parent_bean_factory() {
            if !self.contains_bean_definition(&bean_name) {
                let original = if is_factory_dereference(name) {
                    format!("{}{}", FACTORY_BEAN_PREFIX, bean_name)
                } else {
                    bean_name.clone()
                };
                tracing::trace!("Delegating lookup of '{}' to parent bean factory", original);
                return match args {
                    Some(args) => parent.get_bean_with_args(&original, args.to_vec()),
                    None => parent.get_bean(&original),
                };
            }
        }

        if !type_check_only {
            self.mark_bean_as_created(&bean_name);
        }

        let result = self.create_scoped_bean(name, &bean_name, args);
        if result.is_err() {
            self.cleanup_after_bean_creation_failure(&bean_name);
        }
        result
    }

    fn create_scoped_bean(&self, name: &str, bean_name: &str, args: Option<&[BeanObject]>) -> BeansResult<BeanObject> {
        let mbd = self.merged_local_definition(bean_name)?;
        if mbd.is_abstract() {
            return Err(BeansError::creation(bean_name, "Bean definition is abstract"));
        }

        for dependency in &mbd.definition().depends_on {
            if self.singletons.is_dependent(bean_name, dependency) {
                return Err(BeansError::DependsOnCycle {
                    bean_name: bean_name.to_string(),
                    dependency: dependency.clone(),
                });
            }
            self.register_dependent_bean(dependency, bean_name);
            if let Err(e) = self.get_bean(dependency) {
                if e.is_no_such_bean() {
                    return Err(BeansError::creation_caused_by(
                        bean_name,
                        format!("'{}' depends on missing bean '{}'", bean_name, dependency),
                        e,
                    ));
                }
                return Err(e);
            }
        }

        if mbd.is_singleton() {
            let instance = self.singletons.get_or_create(bean_name, || {
                self.create_bean(bean_name, &mbd, args).map_err(|e| {
                    // 清理提前暴露的引用以及依赖它的 bean
                    self.destroy_singleton(bean_name);
                    e
                })
            })?;
            self.get_object_for_bean_instance(instance, name, bean_name, Some(&mbd))
        } else if mbd.is_prototype() {
            let instance = {
                let _guard = self.prototypes_in_creation.start_creating(bean_name);
                self.create_bean(bean_name, &mbd, args)?
            };
            self.get_object_for_bean_instance(instance, name, bean_name, Some(&mbd))
        } else {
            let scope_name = mbd.scope();
            let scope = self
                .get_registered_scope(scope_name)
                .ok_or_else(|| BeansError::NoSuchScope {
                    scope: scope_name.to_string(),
                })?;
            let mut factory = || {
                let _guard = self.prototypes_in_creation.start_creating(bean_name);
                self.create_bean(bean_name, &mbd, args)
            };
            let instance = scope.get(bean_name, &mut factory).map_err(|e| match e.downcast::<BeansError>() {
                Ok(beans_error) => beans_error,
                Err(other) => BeansError::ScopeInactive {
                    bean_name: bean_name.to_string(),
                    scope: scope_name.to_string(),
                    source: Some(other.into()),
                },
            })?;
            self.get_object_for_bean_instance(instance, name, bean_name, Some(&mbd))
        }
    }

    /// 普通 bean 原样返回；工厂 bean 按名称返回自身或其产品
    pub(crate) fn get_object_for_bean_instance(
        &self,
        instance: BeanObject,
        name: &str,
        bean_name: &str,
        mbd: Option<&RootBeanDefinition>,
    ) -> BeansResult<BeanObject> {
        if is_factory_dereference(name) {
            if instance.is_null() {
                return Ok(instance);
            }
            if instance.as_factory_bean().is_none() {
                return Err(BeansError::BeanIsNotAFactory {
                    bean_name: bean_name.to_string(),
                    actual_type: instance.class_name().to_string(),
                });
            }
            if let Some(mbd) = mbd {
                mbd.set_is_factory_bean(true);
            }
            return Ok(instance);
        }

        let Some(factory) = instance.as_factory_bean() else {
            return Ok(instance);
        };

        match mbd {
            Some(mbd) => mbd.set_is_factory_bean(true),
            None => {
                if let Some(cached) = self.factory_bean_objects.lock().get(bean_name) {
                    return Ok(cached.clone());
                }
            }
        }
        let synthetic = match mbd {
            Some(mbd) => mbd.definition().synthetic,
            None => self
                .contains_bean_definition(bean_name)
                .then(|| self.merged_local_definition(bean_name))
                .transpose()?
                .map(|mbd| mbd.definition().synthetic)
                .unwrap_or(false),
        };
        self.get_object_from_factory_bean(&factory, bean_name, !synthetic)
    }

    pub(crate) fn get_object_from_factory_bean(
        &self,
        factory: &Arc<dyn FactoryBean>,
        bean_name: &str,
        should_post_process: bool,
    ) -> BeansResult<BeanObject> {
        if !(factory.is_singleton() && self.singletons.contains_singleton(bean_name)) {
            let object = self.do_get_object_from_factory_bean(factory, bean_name)?;
            if should_post_process {
                return self.post_process_factory_bean_object(object, bean_name);
            }
            return Ok(object);
        }

        if let Some(cached) = self.factory_bean_objects.lock().get(bean_name) {
            return Ok(cached.clone());
        }
        let mut object = self.do_get_object_from_factory_bean(factory, bean_name)?;
        // get_object 期间可能已经经由循环引用放入缓存
        if let Some(cached) = self.factory_bean_objects.lock().get(bean_name) {
            return Ok(cached.clone());
        }
        if should_post_process {
            if self.singletons.is_currently_in_creation(bean_name) {
                // 暂时返回未处理的对象，不缓存
                return Ok(object);
            }
            object = self.post_process_factory_bean_object(object, bean_name)?;
        }
        if self.singletons.contains_singleton(bean_name) {
            self.factory_bean_objects
                .lock()
                .insert(bean_name.to_string(), object.clone());
        }
        Ok(object)
    }

    fn do_get_object_from_factory_bean(&self, factory: &Arc<dyn FactoryBean>, bean_name: &str) -> BeansResult<BeanObject> {
        let object = factory.get_object().map_err(|e| {
            BeansError::creation_caused_by(bean_name, "FactoryBean threw exception on object creation", e)
        })?;
        match object {
            Some(object) => Ok(object),
            None if self.singletons.is_currently_in_creation(bean_name) => Err(BeansError::CurrentlyInCreation {
                bean_name: bean_name.to_string(),
            }),
            None => Ok(BeanObject::null()),
        }
    }

    fn post_process_factory_bean_object(&self, object: BeanObject, bean_name: &str) -> BeansResult<BeanObject> {
        self.apply_after_initialization(object, bean_name).map_err(|e| {
            BeansError::creation_caused_by(bean_name, "Post-processing of FactoryBean's singleton object failed", e)
        })
    }

    /// 工厂 bean 的产品类型，必要时实例化工厂 bean
    pub(crate) fn factory_bean_object_type(&self, bean_name: &str, allow_init: bool) -> BeansResult<Option<Arc<BeanClass>>> {
        if let Some(instance) = self.singletons.get_singleton(bean_name, false)? {
            return Ok(instance.as_factory_bean().and_then(|f| f.object_type()));
        }
        if !allow_init {
            return Ok(None);
        }
        let factory = self.do_get_bean(&format!("{}{}", FACTORY_BEAN_PREFIX, bean_name), None, true)?;
        Ok(factory.as_factory_bean().and_then(|f| f.object_type()))
    }
}

impl BeanFactory for DefaultListableBeanFactory {
    fn get_bean(&self, name: &str) -> BeansResult<BeanObject> {
        tracing::trace!("Requesting bean: '{}'", name);
        self.do_get_bean(name, None, false)
    }

    fn get_bean_with_args(&self, name: &str, args: Vec<BeanObject>) -> BeansResult<BeanObject> {
        self.do_get_bean(name, Some(&args), false)
    }

    fn get_bean_of_type(&self, class: &Arc<BeanClass>) -> BeansResult<BeanObject> {
        let descriptor = DependencyDescriptor::new(class);
        self.resolve_dependency(&descriptor, None)?
            .ok_or_else(|| BeansError::NoQualifyingBean {
                required_type: class.name().to_string(),
                message: "expected at least 1 bean which qualifies as autowire candidate".to_string(),
            })
    }

    fn contains_bean(&self, name: &str) -> bool {
        let bean_name = self.transformed_bean_name(name);
        if self.singletons.contains_singleton(&bean_name) || self.contains_bean_definition(&bean_name) {
            return !is_factory_dereference(name) || self.is_factory_bean(name).unwrap_or(false);
        }
        match self.parent_bean_factory() {
            Some(parent) => parent.contains_bean(name),
            None => false,
        }
    }

    fn is_singleton(&self, name: &str) -> BeansResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        let dereference = is_factory_dereference(name);

        if let Some(instance) = self.singletons.get_singleton(&bean_name, false)? {
            return Ok(match instance.as_factory_bean() {
                Some(factory) => dereference || factory.is_singleton(),
                None => !dereference,
            });
        }

        if !self.contains_bean_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                return parent.is_singleton(name);
            }
        }

        let mbd = self.merged_local_definition(&bean_name)?;
        if !mbd.is_singleton() {
            return Ok(false);
        }
        if self.is_factory_bean_definition(&bean_name, &mbd) {
            if dereference {
                return Ok(true);
            }
            let factory = self.get_bean(&format!("{}{}", FACTORY_BEAN_PREFIX, bean_name))?;
            return Ok(factory.as_factory_bean().map_or(false, |f| f.is_singleton()));
        }
        Ok(!dereference)
    }

    fn is_prototype(&self, name: &str) -> BeansResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        if !self.contains_bean_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                return parent.is_prototype(name);
            }
        }

        let mbd = self.merged_local_definition(&bean_name)?;
        if mbd.is_prototype() {
            return Ok(!is_factory_dereference(name) || self.is_factory_bean_definition(&bean_name, &mbd));
        }
        if is_factory_dereference(name) || !self.is_factory_bean_definition(&bean_name, &mbd) {
            return Ok(false);
        }
        let factory = self.get_bean(&format!("{}{}", FACTORY_BEAN_PREFIX, bean_name))?;
        Ok(factory.as_factory_bean().map_or(false, |f| !f.is_singleton()))
    }

    fn is_type_match(&self, name: &str, class: &BeanClass) -> BeansResult<bool> {
        self.is_type_match_internal(name, class, true)
    }

    fn get_type(&self, name: &str) -> BeansResult<Option<Arc<BeanClass>>> {
        let bean_name = self.transformed_bean_name(name);
        let dereference = is_factory_dereference(name);

        if let Some(instance) = self.singletons.get_singleton(&bean_name, false)? {
            if instance.is_null() {
                return Ok(None);
            }
            return Ok(match instance.as_factory_bean() {
                Some(factory) if !dereference => factory.object_type(),
                _ => Some(Arc::clone(instance.class())),
            });
        }

        if !self.contains_bean_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                return parent.get_type(name);
            }
            if self.singletons.contains_singleton(&bean_name) {
                return Ok(None);
            }
        }

        let mbd = self.merged_local_definition(&bean_name)?;
        let predicted = self.predict_bean_type(&bean_name, &mbd);
        match predicted {
            Some(class) if class.has_capability(crate::class::Capability::FactoryBean) && !dereference => {
                self.factory_bean_object_type(&bean_name, true)
            }
            other => Ok(other),
        }
    }

    fn get_aliases(&self, name: &str) -> Vec<String> {
        let bean_name = self.transformed_bean_name(name);
        let prefix = if is_factory_dereference(name) { FACTORY_BEAN_PREFIX } else { "" };
        let mut aliases = Vec::new();
        if bean_name != crate::constants::transformed_bean_name(name) {
            aliases.push(format!("{}{}", prefix, bean_name));
        }
        for alias in self.aliases_of(&bean_name) {
            let full = format!("{}{}", prefix, alias);
            if full != name {
                aliases.push(full);
            }
        }
        if !self.contains_singleton(&bean_name) && !self.contains_bean_definition(&bean_name) {
            if let Some(parent) = self.parent_bean_factory() {
                aliases.extend(parent.get_aliases(name));
            }
        }
        aliases
    }
}
