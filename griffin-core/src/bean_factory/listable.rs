//! 类型预测、按类型列举、依赖解析和预实例化

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use crate::class::{BeanClass, Capability};
use crate::constants::{is_factory_dereference, FACTORY_BEAN_PREFIX};
use crate::error::{BeansError, BeansResult};
use crate::merged::RootBeanDefinition;
use crate::object::BeanObject;

use super::{
    BeanDefinitionRegistry, BeanFactory, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, ListableBeanFactory,
};

/// 注入点的描述
#[derive(Debug, Clone)]
pub struct DependencyDescriptor {
    pub required_type: Arc<BeanClass>,
    /// 参数名或属性名，多个候选时按名称匹配
    pub name: Option<String>,
    pub required: bool,
    /// 查找候选时是否允许初始化工厂 bean
    pub eager: bool,
}

impl DependencyDescriptor {
    pub fn new(required_type: &Arc<BeanClass>) -> Self {
        Self {
            required_type: Arc::clone(required_type),
            name: None,
            required: true,
            eager: true,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    pub fn with_eager(mut self, eager: bool) -> Self {
        self.eager = eager;
        self
    }
}

enum Candidate {
    Instance(BeanObject),
    Named,
}

impl DefaultListableBeanFactory {
    /// 不创建 bean 的情况下推断类型
    pub(crate) fn determine_target_type(&self, bean_name: &str, mbd: &RootBeanDefinition) -> Option<Arc<BeanClass>> {
        if let Some(target) = mbd.target_type() {
            return Some(target);
        }
        let target = if mbd.definition().factory_method_name.is_some() {
            self.factory_method_type(bean_name, mbd)
        } else {
            self.resolve_bean_class(mbd, bean_name).ok().flatten()
        };
        if let Some(target) = &target {
            mbd.set_target_type(Arc::clone(target));
        }
        target
    }

    /// 工厂方法的声明返回类型，同名方法返回类型不一致时无法确定
    fn factory_method_type(&self, bean_name: &str, mbd: &RootBeanDefinition) -> Option<Arc<BeanClass>> {
        if let Some(cached) = mbd.factory_method_return_type() {
            return Some(cached);
        }
        if let Some(method) = mbd.factory_method_to_introspect() {
            return method.return_type().cloned();
        }
        let definition = mbd.definition();
        let method_name = definition.factory_method_name.as_deref()?;
        let (owner, is_static) = match &definition.factory_bean_name {
            Some(factory_bean_name) => {
                if factory_bean_name == bean_name {
                    return None;
                }
                (self.get_type(factory_bean_name).ok().flatten()?, false)
            }
            None => (self.resolve_bean_class(mbd, bean_name).ok().flatten()?, true),
        };

        let mut common: Option<Arc<BeanClass>> = None;
        for method in owner.factory_methods_named(method_name) {
            if method.is_static() != is_static {
                continue;
            }
            let return_type = method.return_type()?;
            match &common {
                None => common = Some(Arc::clone(return_type)),
                Some(existing) if existing.name() == return_type.name() => {}
                Some(_) => return None,
            }
        }
        if let Some(common) = &common {
            mbd.set_factory_method_return_type(Arc::clone(common));
        }
        common
    }

    /// 目标类型，经过 `SmartInstantiationAwareBeanPostProcessor` 的预测
    pub(crate) fn predict_bean_type(&self, bean_name: &str, mbd: &RootBeanDefinition) -> Option<Arc<BeanClass>> {
        let target = self.determine_target_type(bean_name, mbd)?;
        if !mbd.definition().synthetic {
            for processor in &self.processor_cache().smart_instantiation_aware {
                if let Some(predicted) = processor.predict_bean_type(&target, bean_name) {
                    return Some(predicted);
                }
            }
        }
        Some(target)
    }

    pub(crate) fn is_factory_bean_definition(&self, bean_name: &str, mbd: &RootBeanDefinition) -> bool {
        if let Some(cached) = mbd.is_factory_bean() {
            return cached;
        }
        let result = self
            .predict_bean_type(bean_name, mbd)
            .map_or(false, |class| class.has_capability(Capability::FactoryBean));
        mbd.set_is_factory_bean(result);
        result
    }

    /// 工厂方法来自尚未创建的工厂 bean 时，判断类型需要先创建它
    fn requires_eager_init_for_type(&self, factory_bean_name: Option<&str>) -> bool {
        match factory_bean_name {
            Some(name) => self.is_factory_bean(name).unwrap_or(false) && !self.contains_singleton(name),
            None => false,
        }
    }

    pub(crate) fn is_type_match_internal(&self, name: &str, class: &BeanClass, allow_init: bool) -> BeansResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        let dereference = is_factory_dereference(name);

        if let Some(instance) = self.singletons.get_singleton(&bean_name, false)? {
            if instance.is_null() {
                return Ok(false);
            }
            return Ok(match instance.as_factory_bean() {
                Some(factory) if !dereference => factory
                    .object_type()
                    .map_or(false, |object_type| class.is_assignable_from(&object_type)),
                Some(_) => class.is_instance(&instance),
                None => !dereference && class.is_instance(&instance),
            });
        }
        if self.singletons.contains_singleton(&bean_name) && !self.contains_bean_definition(&bean_name) {
            return Ok(false);
        }

        if !self.contains_bean_definition(&bean_name) {
            return match self.parent_bean_factory() {
                Some(parent) => parent.is_type_match_internal(name, class, allow_init),
                None => Ok(false),
            };
        }

        let mbd = self.merged_local_definition(&bean_name)?;
        let Some(predicted) = self.predict_bean_type(&bean_name, &mbd) else {
            return Ok(false);
        };
        if predicted.has_capability(Capability::FactoryBean) {
            if dereference {
                return Ok(class.is_assignable_from(&predicted));
            }
            return Ok(self
                .factory_bean_object_type(&bean_name, allow_init)?
                .map_or(false, |object_type| class.is_assignable_from(&object_type)));
        }
        Ok(!dereference && class.is_assignable_from(&predicted))
    }

    fn names_matching(
        &self,
        include_non_singletons: bool,
        allow_eager_init: bool,
        matches: &dyn Fn(&str, bool) -> bool,
    ) -> Vec<String> {
        let mut result = Vec::new();

        for bean_name in self.get_bean_definition_names() {
            let Ok(mbd) = self.merged_local_definition(&bean_name) else {
                continue;
            };
            if mbd.is_abstract() {
                continue;
            }
            if !allow_eager_init && self.requires_eager_init_for_type(mbd.definition().factory_bean_name.as_deref()) {
                continue;
            }
            let singleton_ok = include_non_singletons || mbd.is_singleton();
            if !singleton_ok {
                continue;
            }

            if self.is_factory_bean_definition(&bean_name, &mbd) {
                let init = allow_eager_init || self.contains_singleton(&bean_name);
                if init && matches(&bean_name, init) {
                    result.push(bean_name);
                    continue;
                }
                let factory_name = format!("{}{}", FACTORY_BEAN_PREFIX, bean_name);
                if matches(&factory_name, allow_eager_init) {
                    result.push(factory_name);
                }
            } else if matches(&bean_name, allow_eager_init) {
                result.push(bean_name);
            }
        }

        for bean_name in self.manual_singleton_names() {
            if matches(&bean_name, false) {
                result.push(bean_name);
                continue;
            }
            let factory_name = format!("{}{}", FACTORY_BEAN_PREFIX, bean_name);
            if self.is_factory_bean(&bean_name).unwrap_or(false) && matches(&factory_name, false) {
                result.push(factory_name);
            }
        }
        result
    }

    fn find_autowire_candidates(
        &self,
        requesting_bean: Option<&str>,
        descriptor: &DependencyDescriptor,
    ) -> BeansResult<Vec<(String, Candidate)>> {
        let required = &descriptor.required_type;
        let mut result = Vec::new();

        for (class, supplier) in self.resolvable_dependencies.read().iter() {
            if required.is_assignable_from(class) {
                result.push((class.name().to_string(), Candidate::Instance(supplier()?)));
            }
        }

        let candidate_names = self.bean_names_for_type_including_ancestors(required, descriptor.eager);
        let mut self_references = Vec::new();
        for candidate in candidate_names {
            if self.is_self_reference(requesting_bean, &candidate) {
                self_references.push(candidate);
                continue;
            }
            if self.is_autowire_candidate(&candidate)? {
                result.push((candidate, Candidate::Named));
            }
        }
        // 没有其他候选时才考虑注入自身
        if result.is_empty() && !self_references.is_empty() {
            for candidate in self_references {
                if requesting_bean != Some(candidate.as_str()) && self.is_autowire_candidate(&candidate)? {
                    result.push((candidate, Candidate::Named));
                }
            }
        }
        Ok(result)
    }

    fn bean_names_for_type_including_ancestors(&self, class: &BeanClass, eager: bool) -> Vec<String> {
        let mut names = self.get_bean_names_for_type(class, true, eager);
        if let Some(parent) = self.parent_bean_factory() {
            for name in parent.bean_names_for_type_including_ancestors(class, eager) {
                if !names.contains(&name) && !self.contains_bean(&name) {
                    names.push(name);
                }
            }
        }
        names
    }

    fn is_self_reference(&self, requesting_bean: Option<&str>, candidate: &str) -> bool {
        let Some(requesting) = requesting_bean else {
            return false;
        };
        if requesting == candidate {
            return true;
        }
        self.contains_bean_definition(candidate)
            && self
                .merged_local_definition(candidate)
                .map(|mbd| mbd.definition().factory_bean_name.as_deref() == Some(requesting))
                .unwrap_or(false)
    }

    fn is_primary(&self, name: &str) -> bool {
        let bean_name = self.transformed_bean_name(name);
        if self.contains_bean_definition(&bean_name) {
            return self
                .merged_local_definition(&bean_name)
                .map(|mbd| mbd.definition().primary)
                .unwrap_or(false);
        }
        match self.parent_bean_factory() {
            Some(parent) => parent.is_primary(&bean_name),
            None => false,
        }
    }

    /// 多个候选时：唯一的 primary 优先，其次名称匹配
    fn determine_autowire_candidate(
        &self,
        candidates: &[(String, Candidate)],
        descriptor: &DependencyDescriptor,
    ) -> BeansResult<Option<usize>> {
        let mut primary: Option<usize> = None;
        for (index, (name, _)) in candidates.iter().enumerate() {
            if self.is_primary(name) {
                if let Some(existing) = primary {
                    let existing_local = self.contains_bean_definition(&candidates[existing].0);
                    let candidate_local = self.contains_bean_definition(name);
                    if existing_local == candidate_local {
                        return Err(BeansError::NoUniqueBeanDefinition {
                            required_type: descriptor.required_type.name().to_string(),
                            candidates: candidates.iter().map(|(n, _)| n.clone()).collect(),
                        });
                    }
                    if candidate_local {
                        primary = Some(index);
                    }
                } else {
                    primary = Some(index);
                }
            }
        }
        if primary.is_some() {
            return Ok(primary);
        }

        if let Some(wanted) = &descriptor.name {
            for (index, (name, _)) in candidates.iter().enumerate() {
                if name == wanted || self.get_aliases(name).iter().any(|alias| alias == wanted) {
                    return Ok(Some(index));
                }
            }
        }
        Ok(None)
    }

    /// 解析依赖，同时记录注入的 bean 名称
    pub(crate) fn resolve_dependency_recording(
        &self,
        descriptor: &DependencyDescriptor,
        requesting_bean: Option<&str>,
        autowired_names: Option<&mut Vec<String>>,
    ) -> BeansResult<Option<BeanObject>> {
        let mut candidates = self.find_autowire_candidates(requesting_bean, descriptor)?;
        if candidates.is_empty() {
            if descriptor.required {
                return Err(BeansError::NoQualifyingBean {
                    required_type: descriptor.required_type.name().to_string(),
                    message: "expected at least 1 bean which qualifies as autowire candidate".to_string(),
                });
            }
            return Ok(None);
        }

        let index = if candidates.len() > 1 {
            match self.determine_autowire_candidate(&candidates, descriptor)? {
                Some(index) => index,
                None => {
                    return Err(BeansError::NoUniqueBeanDefinition {
                        required_type: descriptor.required_type.name().to_string(),
                        candidates: candidates.iter().map(|(n, _)| n.clone()).collect(),
                    })
                }
            }
        } else {
            0
        };

        let (name, candidate) = candidates.swap_remove(index);
        let instance = match candidate {
            Candidate::Instance(instance) => instance,
            Candidate::Named => {
                if let Some(names) = autowired_names {
                    names.push(name.clone());
                }
                self.get_bean(&name)?
            }
        };
        if instance.is_null() && descriptor.required {
            return Err(BeansError::NoQualifyingBean {
                required_type: descriptor.required_type.name().to_string(),
                message: format!("bean '{}' resolved to null", name),
            });
        }
        Ok(Some(instance))
    }
}

impl ListableBeanFactory for DefaultListableBeanFactory {
    fn get_bean_names_for_type(&self, class: &BeanClass, include_non_singletons: bool, allow_eager_init: bool) -> Vec<String> {
        self.names_matching(include_non_singletons, allow_eager_init, &|name, allow_init| {
            self.is_type_match_internal(name, class, allow_init).unwrap_or(false)
        })
    }

    fn get_bean_names_for_capability(
        &self,
        capability: Capability,
        include_non_singletons: bool,
        allow_eager_init: bool,
    ) -> Vec<String> {
        self.names_matching(include_non_singletons, allow_eager_init, &|name, allow_init| {
            let bean_name = self.transformed_bean_name(name);
            let dereference = is_factory_dereference(name);
            if let Ok(Some(instance)) = self.singletons.get_singleton(&bean_name, false) {
                if instance.is_null() {
                    return false;
                }
                return match instance.as_factory_bean() {
                    Some(factory) if !dereference => factory
                        .object_type()
                        .map_or(false, |object_type| object_type.has_capability(capability)),
                    _ => instance.class().has_capability(capability),
                };
            }
            if !self.contains_bean_definition(&bean_name) {
                return false;
            }
            let Ok(mbd) = self.merged_local_definition(&bean_name) else {
                return false;
            };
            match self.predict_bean_type(&bean_name, &mbd) {
                Some(class) if class.has_capability(Capability::FactoryBean) && !dereference => self
                    .factory_bean_object_type(&bean_name, allow_init)
                    .ok()
                    .flatten()
                    .map_or(false, |object_type| object_type.has_capability(capability)),
                Some(class) => class.has_capability(capability),
                None => false,
            }
        })
    }

    fn get_beans_of_type(&self, class: &BeanClass) -> BeansResult<Vec<(String, BeanObject)>> {
        let mut result = Vec::new();
        for name in self.get_bean_names_for_type(class, true, true) {
            match self.get_bean(&name) {
                Ok(bean) => {
                    if !bean.is_null() {
                        result.push((name, bean));
                    }
                }
                Err(e) if e.is_currently_in_creation() => {
                    tracing::trace!("Ignoring match to currently created bean '{}': {}", name, e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(result)
    }
}

impl ConfigurableListableBeanFactory for DefaultListableBeanFactory {
    fn ignore_dependency_type(&self, class_name: &str) {
        self.ignored_dependency_types.write().insert(class_name.to_string());
    }

    fn register_resolvable_dependency(&self, class: &Arc<BeanClass>, value: BeanObject) {
        if !class.is_instance(&value) {
            tracing::warn!(
                "Resolvable dependency of type '{}' is not an instance of '{}'",
                value.class_name(),
                class.name()
            );
        }
        self.register_resolvable_supplier(class, Arc::new(move || Ok(value.clone())));
    }

    fn is_autowire_candidate(&self, name: &str) -> BeansResult<bool> {
        let bean_name = self.transformed_bean_name(name);
        if self.contains_bean_definition(&bean_name) {
            return Ok(self.merged_local_definition(&bean_name)?.definition().autowire_candidate);
        }
        if self.contains_singleton(&bean_name) {
            return Ok(true);
        }
        match self.parent_bean_factory() {
            Some(parent) => parent.is_autowire_candidate(name),
            None => Ok(true),
        }
    }

    fn resolve_dependency(
        &self,
        descriptor: &DependencyDescriptor,
        requesting_bean: Option<&str>,
    ) -> BeansResult<Option<BeanObject>> {
        self.resolve_dependency_recording(descriptor, requesting_bean, None)
    }

    fn preinstantiate_singletons(&self) -> BeansResult<()> {
        tracing::debug!("Pre-instantiating singletons in {:?}", self);
        let names = self.get_bean_definition_names();

        for name in &names {
            let mbd = self.merged_local_definition(name)?;
            if mbd.is_abstract() || !mbd.is_singleton() || mbd.is_lazy_init() {
                continue;
            }
            if self.is_factory_bean(name)? {
                let factory = self.get_bean(&format!("{}{}", FACTORY_BEAN_PREFIX, name))?;
                if factory.as_factory_bean().map_or(false, |f| f.is_eager_init()) {
                    self.get_bean(name)?;
                }
            } else {
                self.get_bean(name)?;
            }
        }

        for name in &names {
            let Some(instance) = self.singletons.get_singleton(name, false)? else {
                continue;
            };
            if let Some(smart) = instance.as_smart_initializing_singleton() {
                tracing::trace!("Invoking after_singletons_instantiated on bean '{}'", name);
                smart.after_singletons_instantiated().map_err(|e| {
                    BeansError::creation_caused_by(name.as_str(), "SmartInitializingSingleton callback failed", e)
                })?;
            }
        }
        Ok(())
    }

    fn freeze_configuration(&self) {
        self.clear_metadata_cache();
        self.configuration_frozen.store(true, Ordering::Release);
        tracing::debug!("Bean factory configuration frozen");
    }

    fn is_configuration_frozen(&self) -> bool {
        self.configuration_frozen.load(Ordering::Acquire)
    }

    fn clear_metadata_cache(&self) {
        let created = self.already_created.read().clone();
        self.merged.mark_all_stale_except(|name| created.contains(name));
    }

    fn get_dependency_graph(&self) -> HashMap<String, Vec<String>> {
        let table = self.definitions.read();
        let mut graph: HashMap<String, Vec<String>> = table
            .definitions
            .iter()
            .map(|(name, definition)| (name.clone(), definition.depends_on.clone()))
            .collect();
        for name in &table.manual_singletons {
            graph.entry(name.clone()).or_default();
        }
        graph
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::classes;
    use crate::definition::BeanDefinition;

    #[test]
    fn test_primary_candidate_wins() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition("a", BeanDefinition::from_supplier(|| Ok(Some(BeanObject::string("a")))).with_class(&classes::string()))
            .unwrap();
        factory
            .register_bean_definition(
                "b",
                BeanDefinition::from_supplier(|| Ok(Some(BeanObject::string("b"))))
                    .with_class(&classes::string())
                    .with_primary(true),
            )
            .unwrap();

        let bean = factory.get_bean_of_type(&classes::string()).unwrap();
        assert_eq!(bean.as_str(), Some("b"));
    }

    #[test]
    fn test_multiple_candidates_without_primary() {
        let factory = DefaultListableBeanFactory::new();
        for name in ["a", "b"] {
            factory
                .register_bean_definition(name, BeanDefinition::from_supplier(|| Ok(Some(BeanObject::string("x")))).with_class(&classes::string()))
                .unwrap();
        }
        let err = factory.get_bean_of_type(&classes::string()).unwrap_err();
        match err {
            BeansError::NoUniqueBeanDefinition { candidates, .. } => assert_eq!(candidates, vec!["a", "b"]),
            other => panic!("unexpected error: {}", other),
        }

        let descriptor = DependencyDescriptor::new(&classes::string()).with_name("b");
        let bean = factory.resolve_dependency(&descriptor, None).unwrap().unwrap();
        assert!(bean.as_str().is_some());
    }

    #[test]
    fn test_factory_resolves_itself() {
        let factory = DefaultListableBeanFactory::new();
        let resolved = factory
            .resolve_dependency(&DependencyDescriptor::new(&super::super::bean_factory_class()), None)
            .unwrap()
            .unwrap();
        let inner = resolved.downcast::<DefaultListableBeanFactory>().unwrap();
        assert!(std::ptr::eq(inner.as_ref(), factory.as_ref()));
    }

    #[test]
    fn test_names_for_type_skip_abstract_definitions() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition("template", BeanDefinition::of_class(&classes::string()).with_abstract(true))
            .unwrap();
        factory
            .register_bean_definition("concrete", BeanDefinition::of_class(&classes::string()))
            .unwrap();
        assert_eq!(factory.get_bean_names_for_type(&classes::string(), true, false), vec!["concrete"]);
    }
}
