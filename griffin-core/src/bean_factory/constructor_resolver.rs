//! 构造器和工厂方法的选择
//!
//! 候选按"公开优先、参数多的优先"排序，逐个尝试组装参数：配置的构造参数优先，
//! 不足的部分在允许自动装配时按类型解析。能组装出参数的候选按类型差异权重比较，
//! 权重最小者胜出；权重相同的候选在严格模式下视为有歧义。
//! 选中的构造器和参数缓存在合并定义上，后续创建同一个 bean 时直接复用。

use std::collections::HashSet;
use std::sync::Arc;

use crate::class::{classes, BeanClass, Executable, ExecutableKind};
use crate::definition::AutowireMode;
use crate::error::{BeansError, BeansResult};
use crate::merged::{PreparedArgument, RootBeanDefinition};
use crate::object::{Arguments, BeanObject};
use crate::values::{ArgumentKey, BeanValue, ConstructorArgumentValues, ValueHolder};

use super::value_resolver::BeanDefinitionValueResolver;
use super::{BeanFactory, ConfigurableBeanFactory, DefaultListableBeanFactory, DependencyDescriptor};

/// 一次候选尝试组装出的参数
struct ArgumentsHolder {
    /// 转换前的值
    raw: Vec<BeanObject>,
    arguments: Vec<BeanObject>,
    prepared: Vec<PreparedArgument>,
    resolve_necessary: bool,
}

impl ArgumentsHolder {
    fn explicit(args: &[BeanObject]) -> Self {
        Self {
            raw: args.to_vec(),
            arguments: args.to_vec(),
            prepared: args.iter().cloned().map(PreparedArgument::Resolved).collect(),
            resolve_necessary: false,
        }
    }

    /// 转换后的参数和转换前的参数各算一次，转换前的结果优先
    fn type_difference_weight(&self, param_types: &[Arc<BeanClass>]) -> i32 {
        let converted = type_difference_weight(param_types, &self.arguments);
        let raw = type_difference_weight(param_types, &self.raw).saturating_sub(1024);
        converted.min(raw)
    }

    /// 严格模式：只区分能否直接赋值
    fn assignability_weight(&self, param_types: &[Arc<BeanClass>]) -> i32 {
        let assignable = |args: &[BeanObject]| param_types.iter().zip(args).all(|(ty, arg)| ty.is_instance(arg));
        if !assignable(self.arguments.as_slice()) {
            return i32::MAX;
        }
        if !assignable(self.raw.as_slice()) {
            return i32::MAX - 512;
        }
        i32::MAX - 1024
    }

    fn store_cache(self, mbd: &RootBeanDefinition, executable: &Arc<Executable>) {
        let mut cache = mbd.constructor_cache.lock();
        cache.resolved = Some(Arc::clone(executable));
        cache.arguments_resolved = true;
        if self.resolve_necessary {
            cache.prepared_arguments = Some(self.prepared);
            cache.resolved_arguments = None;
        } else {
            cache.resolved_arguments = Some(self.arguments);
            cache.prepared_arguments = None;
        }
    }
}

/// 参数类型与实际参数的差异：每经过一层父类加 2，参数类型是接口再加 1
pub(crate) fn type_difference_weight(param_types: &[Arc<BeanClass>], args: &[BeanObject]) -> i32 {
    let mut result: i32 = 0;
    for (param, arg) in param_types.iter().zip(args) {
        if !param.is_instance(arg) {
            return i32::MAX;
        }
        if arg.is_null() {
            continue;
        }
        let mut current = arg.class().superclass();
        while let Some(superclass) = current {
            if param.name() == superclass.name() {
                result = result.saturating_add(2);
                current = None;
            } else if param.is_assignable_from(&superclass) {
                result = result.saturating_add(2);
                current = superclass.superclass();
            } else {
                current = None;
            }
        }
        if param.is_interface() {
            result = result.saturating_add(1);
        }
    }
    result
}

/// 公开的在前，参数多的在前
fn sort_candidates(candidates: &mut [Arc<Executable>]) {
    candidates.sort_by_key(|c| (!c.is_public(), std::cmp::Reverse(c.param_count())));
}

/// 参数名不存在时用空串，匹配任何具名参数
fn param_name(executable: &Executable, index: usize) -> String {
    executable.params()[index].name.clone().unwrap_or_default()
}

fn injection_point(executable: &Executable, index: usize) -> String {
    match executable.kind() {
        ExecutableKind::Constructor => format!("constructor parameter {}", index),
        _ => format!("method '{}' parameter {}", executable.name(), index),
    }
}

pub(crate) struct ConstructorResolver<'a> {
    factory: &'a DefaultListableBeanFactory,
}

impl<'a> ConstructorResolver<'a> {
    pub(crate) fn new(factory: &'a DefaultListableBeanFactory) -> Self {
        Self { factory }
    }

    /// 通过构造器自动装配创建实例
    ///
    /// `chosen` 是后置处理器或调用方选定的候选构造器，`None` 时使用类的全部构造器。
    pub(crate) fn autowire_constructor(
        &self,
        bean_name: &str,
        mbd: &Arc<RootBeanDefinition>,
        chosen: Option<Vec<Arc<Executable>>>,
        explicit_args: Option<&[BeanObject]>,
    ) -> BeansResult<BeanObject> {
        let class = self
            .factory
            .resolve_bean_class(mbd, bean_name)?
            .ok_or_else(|| BeansError::creation(bean_name, "No bean class specified on bean definition"))?;

        let cached = match explicit_args {
            Some(_) => None,
            None => self.cached_executable(bean_name, mbd)?,
        };
        let (constructor, args) = match cached {
            Some(cached) => cached,
            None => self.resolve_constructor(bean_name, mbd, &class, chosen, explicit_args)?,
        };

        self.instantiate(bean_name, &class, &constructor, args)
    }

    fn resolve_constructor(
        &self,
        bean_name: &str,
        mbd: &Arc<RootBeanDefinition>,
        class: &Arc<BeanClass>,
        chosen: Option<Vec<Arc<Executable>>>,
        explicit_args: Option<&[BeanObject]>,
    ) -> BeansResult<(Arc<Executable>, Vec<BeanObject>)> {
        let definition = mbd.definition();
        let autowiring = chosen.is_some() || definition.autowire_mode == AutowireMode::Constructor;
        let mut candidates = match chosen {
            Some(chosen) => chosen,
            None if definition.non_public_access_allowed => class.constructors().to_vec(),
            None => class.constructors().iter().filter(|c| c.is_public()).cloned().collect(),
        };

        if candidates.len() == 1 && explicit_args.is_none() && !definition.has_constructor_args() {
            let unique = &candidates[0];
            if unique.param_count() == 0 {
                let mut cache = mbd.constructor_cache.lock();
                cache.resolved = Some(Arc::clone(unique));
                cache.arguments_resolved = true;
                cache.resolved_arguments = Some(Vec::new());
                return Ok((Arc::clone(unique), Vec::new()));
            }
        }

        let (resolved_values, min_args) = match explicit_args {
            Some(args) => (None, args.len()),
            None => {
                let (values, min) = self.resolve_constructor_arguments(bean_name, mbd)?;
                (Some(values), min)
            }
        };

        sort_candidates(&mut candidates);
        let fallback = candidates.len() == 1;

        let mut best: Option<(Arc<Executable>, ArgumentsHolder)> = None;
        let mut min_weight = i32::MAX;
        let mut ambiguous: Vec<Arc<Executable>> = Vec::new();
        let mut causes: Vec<BeansError> = Vec::new();

        for candidate in &candidates {
            let param_count = candidate.param_count();
            if let Some((_, holder)) = &best {
                // 排序后参数只会越来越少
                if holder.arguments.len() > param_count {
                    break;
                }
            }
            if param_count < min_args {
                continue;
            }

            let holder = match (&resolved_values, explicit_args) {
                (Some(values), _) => {
                    match self.create_argument_array(bean_name, mbd, values, candidate, autowiring, fallback) {
                        Ok(holder) => holder,
                        Err(e @ BeansError::UnsatisfiedDependency { .. }) => {
                            tracing::trace!("Ignoring constructor [{}] of bean '{}': {}", candidate.signature(), bean_name, e);
                            causes.push(e);
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                }
                (None, Some(args)) => {
                    if param_count != args.len() {
                        continue;
                    }
                    ArgumentsHolder::explicit(args)
                }
                (None, None) => continue,
            };

            let param_types = candidate.param_types();
            let weight = if definition.lenient_constructor_resolution {
                holder.type_difference_weight(&param_types)
            } else {
                holder.assignability_weight(&param_types)
            };
            if weight < min_weight {
                min_weight = weight;
                best = Some((Arc::clone(candidate), holder));
                ambiguous.clear();
            } else if weight == min_weight {
                if let Some((current, _)) = &best {
                    if ambiguous.is_empty() {
                        ambiguous.push(Arc::clone(current));
                    }
                    ambiguous.push(Arc::clone(candidate));
                }
            }
        }

        let Some((constructor, holder)) = best else {
            if let Some(error) = raise_with_suppressed(causes) {
                return Err(error);
            }
            return Err(BeansError::NoMatchingCandidate {
                bean_name: bean_name.to_string(),
                message: format!(
                    "Could not resolve matching constructor on bean class [{}] (hint: specify index/type/name arguments for simple parameters to avoid type ambiguities. You should also check the consistency of arguments when mixing indexed and named arguments, especially in case of bean definition inheritance)",
                    class.name()
                ),
            });
        };
        if !ambiguous.is_empty() && !definition.lenient_constructor_resolution {
            return Err(BeansError::AmbiguousResolution {
                bean_name: bean_name.to_string(),
                kind: "constructor".to_string(),
                candidates: ambiguous.iter().map(|c| c.signature()).collect(),
            });
        }

        let args = holder.arguments.clone();
        if explicit_args.is_none() {
            holder.store_cache(mbd, &constructor);
        }
        Ok((constructor, args))
    }

    fn instantiate(
        &self,
        bean_name: &str,
        class: &Arc<BeanClass>,
        constructor: &Executable,
        args: Vec<BeanObject>,
    ) -> BeansResult<BeanObject> {
        tracing::trace!("Instantiating bean '{}' via constructor [{}]", bean_name, constructor.signature());
        constructor
            .construct(class, &Arguments::new(args))
            .map_err(|e| BeansError::creation_caused_by(bean_name, "Bean instantiation via constructor failed", e))
    }

    /// 通过静态工厂方法或者工厂 bean 上的实例方法创建
    pub(crate) fn instantiate_using_factory_method(
        &self,
        bean_name: &str,
        mbd: &Arc<RootBeanDefinition>,
        explicit_args: Option<&[BeanObject]>,
    ) -> BeansResult<BeanObject> {
        let definition = mbd.definition();
        let method_name = definition.factory_method_name.clone().unwrap_or_default();

        let (factory_bean, factory_class, is_static) = match &definition.factory_bean_name {
            Some(factory_name) => {
                if factory_name == bean_name {
                    return Err(BeansError::BeanDefinitionStore {
                        bean_name: bean_name.to_string(),
                        message: "factory-bean reference points back to the same bean definition".to_string(),
                    });
                }
                let factory_bean = self.factory.get_bean(factory_name)?;
                if mbd.is_singleton() && self.factory.singletons.contains_singleton(bean_name) {
                    return Err(BeansError::illegal_state(format!(
                        "About-to-be-created singleton instance '{}' implicitly appeared through the creation of the factory bean that its bean definition points to",
                        bean_name
                    )));
                }
                self.factory.register_dependent_bean(factory_name, bean_name);
                let class = Arc::clone(factory_bean.class());
                (Some(factory_bean), class, false)
            }
            None => {
                let class = self.factory.resolve_bean_class(mbd, bean_name)?.ok_or_else(|| {
                    BeansError::BeanDefinitionStore {
                        bean_name: bean_name.to_string(),
                        message: "bean definition declares neither a bean class nor a factory-bean reference"
                            .to_string(),
                    }
                })?;
                (None, class, true)
            }
        };

        let cached = match explicit_args {
            Some(_) => None,
            None => self.cached_executable(bean_name, mbd)?,
        };
        let (method, args) = match cached {
            Some(cached) => cached,
            None => self.resolve_factory_method(bean_name, mbd, &factory_class, is_static, &method_name, explicit_args)?,
        };

        tracing::trace!("Instantiating bean '{}' via factory method [{}]", bean_name, method.signature());
        let instance = method
            .invoke(factory_bean.as_ref(), &Arguments::new(args))
            .map_err(|e| {
                BeansError::creation_caused_by(
                    bean_name,
                    format!("Bean instantiation via factory method failed: Factory method '{}' threw exception", method_name),
                    e,
                )
            })?;
        Ok(instance.unwrap_or_else(BeanObject::null))
    }

    fn resolve_factory_method(
        &self,
        bean_name: &str,
        mbd: &Arc<RootBeanDefinition>,
        factory_class: &Arc<BeanClass>,
        is_static: bool,
        method_name: &str,
        explicit_args: Option<&[BeanObject]>,
    ) -> BeansResult<(Arc<Executable>, Vec<BeanObject>)> {
        let definition = mbd.definition();
        let mut candidates: Vec<Arc<Executable>> = factory_class
            .factory_methods_named(method_name)
            .into_iter()
            .filter(|m| !is_static || m.is_static())
            .collect();

        if candidates.len() == 1 && explicit_args.is_none() && !definition.has_constructor_args() {
            let unique = &candidates[0];
            if unique.param_count() == 0 {
                mbd.set_factory_method_to_introspect(Arc::clone(unique));
                let mut cache = mbd.constructor_cache.lock();
                cache.resolved = Some(Arc::clone(unique));
                cache.arguments_resolved = true;
                cache.resolved_arguments = Some(Vec::new());
                return Ok((Arc::clone(unique), Vec::new()));
            }
        }

        sort_candidates(&mut candidates);
        let autowiring = definition.autowire_mode == AutowireMode::Constructor;
        let fallback = candidates.len() == 1;

        let (resolved_values, min_args) = match explicit_args {
            Some(args) => (None, args.len()),
            None if definition.has_constructor_args() => {
                let (values, min) = self.resolve_constructor_arguments(bean_name, mbd)?;
                (Some(values), min)
            }
            None => (Some(ConstructorArgumentValues::new()), 0),
        };

        let mut best: Option<(Arc<Executable>, ArgumentsHolder)> = None;
        let mut min_weight = i32::MAX;
        let mut ambiguous: Vec<Arc<Executable>> = Vec::new();
        let mut causes: Vec<BeansError> = Vec::new();

        for candidate in &candidates {
            let param_count = candidate.param_count();
            if param_count < min_args {
                continue;
            }
            let holder = match (explicit_args, &resolved_values) {
                (Some(args), _) => {
                    if param_count != args.len() {
                        continue;
                    }
                    ArgumentsHolder::explicit(args)
                }
                (None, Some(values)) => {
                    match self.create_argument_array(bean_name, mbd, values, candidate, autowiring, fallback) {
                        Ok(holder) => holder,
                        Err(e @ BeansError::UnsatisfiedDependency { .. }) => {
                            tracing::trace!("Ignoring factory method [{}] of bean '{}': {}", candidate.signature(), bean_name, e);
                            causes.push(e);
                            continue;
                        }
                        Err(e) => return Err(e),
                    }
                }
                (None, None) => continue,
            };

            let param_types = candidate.param_types();
            let weight = if definition.lenient_constructor_resolution {
                holder.type_difference_weight(&param_types)
            } else {
                holder.assignability_weight(&param_types)
            };
            if weight < min_weight {
                min_weight = weight;
                best = Some((Arc::clone(candidate), holder));
                ambiguous.clear();
            } else if let Some((current, _)) = &best {
                // 只有严格模式下参数个数相同、类型不同的方法才算歧义
                let differs = current.param_count() == param_count
                    && current
                        .param_types()
                        .iter()
                        .zip(&param_types)
                        .any(|(a, b)| a.name() != b.name());
                if weight == min_weight && !definition.lenient_constructor_resolution && differs {
                    if ambiguous.is_empty() {
                        ambiguous.push(Arc::clone(current));
                    }
                    ambiguous.push(Arc::clone(candidate));
                }
            }
        }

        let Some((method, holder)) = best else {
            if let Some(error) = raise_with_suppressed(causes) {
                return Err(error);
            }
            let arg_types = match (explicit_args, &resolved_values) {
                (Some(args), _) => args.iter().map(|a| a.class_name().to_string()).collect::<Vec<_>>(),
                (None, Some(values)) => values
                    .indexed()
                    .values()
                    .chain(values.generic())
                    .map(|holder| match (&holder.type_name, holder.value.as_object()) {
                        (Some(type_name), _) => type_name.clone(),
                        (None, Some(object)) => object.class_name().to_string(),
                        (None, None) => "null".to_string(),
                    })
                    .collect(),
                (None, None) => Vec::new(),
            };
            let factory_hint = definition
                .factory_bean_name
                .as_ref()
                .map(|name| format!("factory bean '{}'; ", name))
                .unwrap_or_default();
            return Err(BeansError::NoMatchingCandidate {
                bean_name: bean_name.to_string(),
                message: format!(
                    "No matching factory method found on class [{}]: {}factory method '{}({})'. Check that a method with the specified name {}exists and that it is {}.",
                    factory_class.name(),
                    factory_hint,
                    method_name,
                    arg_types.join(","),
                    if min_args > 0 { "and arguments " } else { "" },
                    if is_static { "static" } else { "non-static" },
                ),
            });
        };
        if !ambiguous.is_empty() {
            return Err(BeansError::AmbiguousResolution {
                bean_name: bean_name.to_string(),
                kind: "factory method".to_string(),
                candidates: ambiguous.iter().map(|m| m.signature()).collect(),
            });
        }

        let args = holder.arguments.clone();
        if explicit_args.is_none() {
            mbd.set_factory_method_to_introspect(Arc::clone(&method));
            holder.store_cache(mbd, &method);
        }
        Ok((method, args))
    }

    /// 缓存的构造器或工厂方法及其参数，待解析的参数在这里重新解析
    fn cached_executable(
        &self,
        bean_name: &str,
        mbd: &RootBeanDefinition,
    ) -> BeansResult<Option<(Arc<Executable>, Vec<BeanObject>)>> {
        let (executable, resolved, prepared) = {
            let cache = mbd.constructor_cache.lock();
            match (&cache.resolved, cache.arguments_resolved) {
                (Some(executable), true) => (
                    Arc::clone(executable),
                    cache.resolved_arguments.clone(),
                    cache.prepared_arguments.clone(),
                ),
                _ => return Ok(None),
            }
        };
        let args = match (resolved, prepared) {
            (Some(args), _) => args,
            (None, Some(prepared)) => self.resolve_prepared_arguments(bean_name, mbd, &executable, &prepared)?,
            (None, None) => return Ok(None),
        };
        Ok(Some((executable, args)))
    }

    /// 解析定义中的构造参数，返回解析后的参数集和最少参数个数
    fn resolve_constructor_arguments(
        &self,
        bean_name: &str,
        mbd: &RootBeanDefinition,
    ) -> BeansResult<(ConstructorArgumentValues, usize)> {
        let cargs = &mbd.definition().constructor_args;
        let resolver = BeanDefinitionValueResolver::new(self.factory, bean_name, mbd);
        let mut min_args = cargs.argument_count();
        let mut resolved = ConstructorArgumentValues::new();

        for (&index, holder) in cargs.indexed() {
            min_args = min_args.max(index + 1);
            let value = resolver.resolve_value_if_necessary("constructor argument", &holder.value)?;
            resolved.add_indexed(index, holder.with_value(BeanValue::Object(value)));
        }
        for holder in cargs.generic() {
            let value = resolver.resolve_value_if_necessary("constructor argument", &holder.value)?;
            resolved.add_generic(holder.with_value(BeanValue::Object(value)));
        }
        Ok((resolved, min_args))
    }

    fn create_argument_array(
        &self,
        bean_name: &str,
        mbd: &RootBeanDefinition,
        resolved_values: &ConstructorArgumentValues,
        executable: &Executable,
        autowiring: bool,
        fallback: bool,
    ) -> BeansResult<ArgumentsHolder> {
        let cargs = &mbd.definition().constructor_args;
        let param_count = executable.param_count();
        let mut holder = ArgumentsHolder {
            raw: Vec::with_capacity(param_count),
            arguments: Vec::with_capacity(param_count),
            prepared: Vec::with_capacity(param_count),
            resolve_necessary: false,
        };
        let mut used: HashSet<ArgumentKey> = HashSet::new();
        let mut autowired_names: Vec<String> = Vec::new();

        for (index, param) in executable.params().iter().enumerate() {
            let name = param_name(executable, index);
            let mut found = resolved_values.get_argument_value(index, Some(&param.ty), Some(&name), &used);
            if found.is_none() && (!autowiring || param_count == resolved_values.argument_count()) {
                found = resolved_values.get_generic(None, None, &used);
            }

            match found {
                Some((key, value_holder)) => {
                    used.insert(key);
                    let original = value_holder.value.as_object().cloned().unwrap_or_else(BeanObject::null);
                    let converted = self
                        .factory
                        .type_converter()
                        .convert_if_necessary(&original, &param.ty)
                        .map_err(|e| BeansError::UnsatisfiedDependency {
                            bean_name: bean_name.to_string(),
                            injection_point: injection_point(executable, index),
                            message: format!(
                                "Could not convert argument value of type [{}] to required type [{}]: {}",
                                original.class_name(),
                                param.ty.name(),
                                e
                            ),
                            source: Some(Box::new(e)),
                            suppressed: Vec::new(),
                        })?;
                    match source_holder(cargs, key) {
                        Some(source) if !is_static_value(&source.value) => {
                            holder.prepared.push(PreparedArgument::Value(source.clone()));
                            holder.resolve_necessary = true;
                        }
                        _ => holder.prepared.push(PreparedArgument::Resolved(converted.clone())),
                    }
                    holder.raw.push(original);
                    holder.arguments.push(converted);
                }
                None => {
                    if !autowiring {
                        return Err(BeansError::UnsatisfiedDependency {
                            bean_name: bean_name.to_string(),
                            injection_point: injection_point(executable, index),
                            message: format!(
                                "Ambiguous argument values for parameter of type [{}] - did you specify the correct bean references as arguments?",
                                param.ty.name()
                            ),
                            source: None,
                            suppressed: Vec::new(),
                        });
                    }
                    let argument = self
                        .resolve_autowired_argument(bean_name, &param.ty, &name, fallback, Some(&mut autowired_names))
                        .map_err(|e| BeansError::UnsatisfiedDependency {
                            bean_name: bean_name.to_string(),
                            injection_point: injection_point(executable, index),
                            message: e.to_string(),
                            source: Some(Box::new(e)),
                            suppressed: Vec::new(),
                        })?;
                    holder.raw.push(argument.clone());
                    holder.arguments.push(argument);
                    holder.prepared.push(PreparedArgument::Autowired);
                    holder.resolve_necessary = true;
                }
            }
        }

        for autowired in autowired_names {
            self.factory.register_dependent_bean(&autowired, bean_name);
            tracing::trace!(
                "Autowiring by type from bean name '{}' via {} to bean named '{}'",
                bean_name,
                if executable.kind() == ExecutableKind::Constructor { "constructor" } else { "factory method" },
                autowired
            );
        }
        Ok(holder)
    }

    fn resolve_autowired_argument(
        &self,
        bean_name: &str,
        param_type: &Arc<BeanClass>,
        param_name: &str,
        fallback: bool,
        autowired_names: Option<&mut Vec<String>>,
    ) -> BeansResult<BeanObject> {
        let mut descriptor = DependencyDescriptor::new(param_type);
        if !param_name.is_empty() {
            descriptor = descriptor.with_name(param_name);
        }
        match self.factory.resolve_dependency_recording(&descriptor, Some(bean_name), autowired_names) {
            Ok(value) => Ok(value.unwrap_or_else(BeanObject::null)),
            Err(e @ BeansError::NoUniqueBeanDefinition { .. }) => Err(e),
            Err(e) if fallback && e.is_no_such_bean() && param_type.name() == classes::list().name() => {
                Ok(BeanObject::list(Vec::new()))
            }
            Err(e) => Err(e),
        }
    }

    fn resolve_prepared_arguments(
        &self,
        bean_name: &str,
        mbd: &RootBeanDefinition,
        executable: &Executable,
        prepared: &[PreparedArgument],
    ) -> BeansResult<Vec<BeanObject>> {
        let resolver = BeanDefinitionValueResolver::new(self.factory, bean_name, mbd);
        let mut resolved = Vec::with_capacity(prepared.len());
        let mut autowired_names = Vec::new();
        for (index, (argument, param)) in prepared.iter().zip(executable.params()).enumerate() {
            let value = match argument {
                PreparedArgument::Resolved(value) => value.clone(),
                PreparedArgument::Value(holder) => resolver.resolve_value_if_necessary("constructor argument", &holder.value)?,
                PreparedArgument::Autowired => {
                    let name = param_name(executable, index);
                    self.resolve_autowired_argument(bean_name, &param.ty, &name, true, Some(&mut autowired_names))?
                }
            };
            let converted = self
                .factory
                .type_converter()
                .convert_if_necessary(&value, &param.ty)
                .map_err(|e| BeansError::UnsatisfiedDependency {
                    bean_name: bean_name.to_string(),
                    injection_point: injection_point(executable, index),
                    message: format!(
                        "Could not convert argument value of type [{}] to required type [{}]: {}",
                        value.class_name(),
                        param.ty.name(),
                        e
                    ),
                    source: Some(Box::new(e)),
                    suppressed: Vec::new(),
                })?;
            resolved.push(converted);
        }
        for autowired in autowired_names {
            self.factory.register_dependent_bean(&autowired, bean_name);
        }
        Ok(resolved)
    }
}

/// 不需要每次重新解析的定义值
fn is_static_value(value: &BeanValue) -> bool {
    matches!(value, BeanValue::Null | BeanValue::Literal(_) | BeanValue::Object(_))
}

fn source_holder(cargs: &ConstructorArgumentValues, key: ArgumentKey) -> Option<&ValueHolder> {
    match key {
        ArgumentKey::Indexed(index) => cargs.indexed().get(&index),
        ArgumentKey::Generic(index) => cargs.generic().get(index),
    }
}

/// 最后一个失败原因作为主错误，其余挂在它上面
fn raise_with_suppressed(mut causes: Vec<BeansError>) -> Option<BeansError> {
    let mut last = causes.pop()?;
    if let BeansError::UnsatisfiedDependency { suppressed, .. } = &mut last {
        suppressed.extend(causes);
    }
    Some(last)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bean_factory::BeanDefinitionRegistry;
    use crate::class::param;
    use crate::definition::BeanDefinition;

    struct Animal;
    struct Dog;

    fn animal() -> Arc<BeanClass> {
        BeanClass::builder::<Animal>("Animal").build()
    }

    fn dog() -> Arc<BeanClass> {
        BeanClass::builder::<Dog>("Dog").extends(&animal()).build()
    }

    #[test]
    fn test_type_difference_weight() {
        let dog_value = BeanObject::new(Dog, &dog());
        assert_eq!(type_difference_weight(&[dog()], &[dog_value.clone()]), 0);
        // Dog -> Animal -> Object
        assert_eq!(type_difference_weight(&[animal()], &[dog_value.clone()]), 2);
        assert_eq!(type_difference_weight(&[classes::object()], &[dog_value.clone()]), 4);
        assert_eq!(type_difference_weight(&[classes::string()], &[dog_value]), i32::MAX);
    }

    #[test]
    fn test_raw_arguments_preferred_in_weight() {
        let holder = ArgumentsHolder {
            raw: vec![BeanObject::string("7")],
            arguments: vec![BeanObject::i32(7)],
            prepared: Vec::new(),
            resolve_necessary: false,
        };
        // 转换后能赋值，转换前不能
        assert_eq!(holder.type_difference_weight(&[classes::i32()]), 0);
        assert_eq!(holder.assignability_weight(&[classes::i32()]), i32::MAX - 512);
        let exact = ArgumentsHolder::explicit(&[BeanObject::i32(7)]);
        assert_eq!(exact.type_difference_weight(&[classes::i32()]), -1024);
        assert_eq!(exact.assignability_weight(&[classes::i32()]), i32::MAX - 1024);
    }

    #[test]
    fn test_sort_public_first_then_most_params() {
        struct Target;
        let class = BeanClass::builder::<Target>("Target")
            .constructor(vec![], |_| Ok(Target))
            .private_constructor(vec![param("a", &classes::string()), param("b", &classes::string()), param("c", &classes::string())], |_| Ok(Target))
            .constructor(vec![param("a", &classes::string()), param("b", &classes::string())], |_| Ok(Target))
            .build();
        let mut candidates = class.constructors().to_vec();
        sort_candidates(&mut candidates);
        let counts: Vec<_> = candidates.iter().map(|c| (c.is_public(), c.param_count())).collect();
        assert_eq!(counts, vec![(true, 2), (true, 0), (false, 3)]);
    }

    struct Endpoint {
        host: String,
        port: i32,
    }

    fn endpoint_class() -> Arc<BeanClass> {
        BeanClass::builder::<Endpoint>("Endpoint")
            .constructor(vec![param("host", &classes::string())], |args| {
                Ok(Endpoint {
                    host: args.string(0)?,
                    port: 80,
                })
            })
            .constructor(vec![param("host", &classes::string()), param("port", &classes::i32())], |args| {
                Ok(Endpoint {
                    host: args.string(0)?,
                    port: *args.get::<i32>(1)?,
                })
            })
            .static_factory("local", &endpoint_class_stub(), vec![param("port", &classes::i32())], |args| {
                let endpoint = Endpoint {
                    host: "localhost".to_string(),
                    port: *args.get::<i32>(0)?,
                };
                Ok(Some(BeanObject::new(endpoint, &endpoint_class_stub())))
            })
            .build()
    }

    fn endpoint_class_stub() -> Arc<BeanClass> {
        BeanClass::builder::<Endpoint>("Endpoint").build()
    }

    #[test]
    fn test_constructor_chosen_by_argument_count() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "one",
                BeanDefinition::of_class(&endpoint_class()).with_constructor_arg(BeanValue::literal("example.org")),
            )
            .unwrap();
        factory
            .register_bean_definition(
                "two",
                BeanDefinition::of_class(&endpoint_class())
                    .with_constructor_arg(BeanValue::literal("example.org"))
                    .with_constructor_arg(BeanValue::literal("8443")),
            )
            .unwrap();

        let one = factory.get_bean("one").unwrap();
        let one = one.downcast_ref::<Endpoint>().unwrap();
        assert_eq!((one.host.as_str(), one.port), ("example.org", 80));

        let two = factory.get_bean("two").unwrap();
        let two = two.downcast_ref::<Endpoint>().unwrap();
        assert_eq!((two.host.as_str(), two.port), ("example.org", 8443));
    }

    #[test]
    fn test_indexed_argument_and_cache_reuse() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "endpoint",
                BeanDefinition::of_class(&endpoint_class())
                    .with_scope("prototype")
                    .with_indexed_constructor_arg(1, BeanValue::literal("9000"))
                    .with_indexed_constructor_arg(0, BeanValue::literal("host")),
            )
            .unwrap();

        for _ in 0..2 {
            let bean = factory.get_bean("endpoint").unwrap();
            assert_eq!(bean.downcast_ref::<Endpoint>().unwrap().port, 9000);
        }
        let mbd = factory.get_merged_bean_definition("endpoint").unwrap();
        let cache = mbd.constructor_cache.lock();
        assert_eq!(cache.resolved.as_ref().map(|c| c.param_count()), Some(2));
        assert!(cache.resolved_arguments.is_some());
    }

    #[test]
    fn test_static_factory_method_with_converted_argument() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "local",
                BeanDefinition::of_class(&endpoint_class())
                    .with_factory_method("local")
                    .with_constructor_arg(BeanValue::literal("8080")),
            )
            .unwrap();
        let bean = factory.get_bean("local").unwrap();
        let endpoint = bean.downcast_ref::<Endpoint>().unwrap();
        assert_eq!((endpoint.host.as_str(), endpoint.port), ("localhost", 8080));
    }

    #[test]
    fn test_missing_factory_method_reports_signature() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "missing",
                BeanDefinition::of_class(&endpoint_class()).with_factory_method("remote"),
            )
            .unwrap();
        let message = factory.get_bean("missing").unwrap_err().to_string();
        assert!(message.contains("No matching factory method found on class [Endpoint]: factory method 'remote()'"));
        assert!(message.contains("that it is static"));
    }

    #[test]
    fn test_factory_bean_pointing_to_itself_is_rejected() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition("self", BeanDefinition::new().with_factory_bean("self", "create"))
            .unwrap();
        let err = factory.get_bean("self").unwrap_err();
        assert!(matches!(err, BeansError::BeanDefinitionStore { .. }));
    }

    #[test]
    fn test_unsatisfied_autowired_parameter_reported() {
        struct Missing;
        struct Client;
        let missing = BeanClass::builder::<Missing>("Missing").build();
        let client = BeanClass::builder::<Client>("Client")
            .constructor(vec![param("missing", &missing)], |_| Ok(Client))
            .build();

        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition("client", BeanDefinition::of_class(&client)).unwrap();
        let err = factory.get_bean("client").unwrap_err();
        match err {
            BeansError::UnsatisfiedDependency { injection_point, .. } => {
                assert_eq!(injection_point, "constructor parameter 0")
            }
            other => panic!("unexpected error: {other}"),
        }
    }
}
