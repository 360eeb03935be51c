//! Bean 定义
//!
//! 类似 Spring 的 `BeanDefinition`，在容器刷新前创建，注册阶段可以被
//! registry 后置处理器修改。合并后的只读快照见 [`crate::merged`]。

use std::fmt;
use std::sync::Arc;

use crate::class::BeanClass;
use crate::constants::{SCOPE_PROTOTYPE, SCOPE_SINGLETON};
use crate::error::{BeansError, BeansResult};
use crate::object::BeanObject;
use crate::values::{BeanValue, ConstructorArgumentValues, PropertyValues, ValueHolder};

/// 自动装配模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AutowireMode {
    #[default]
    No,
    ByName,
    ByType,
    Constructor,
}

/// 依赖检查模式
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DependencyCheck {
    #[default]
    None,
    /// 只检查引用类型属性
    Objects,
    /// 只检查简单类型属性
    Simple,
    All,
}

/// Bean 的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Role {
    #[default]
    Application,
    Support,
    Infrastructure,
}

/// 定义指向的类型：已解析的类，或稍后从类注册表中查找的类名
#[derive(Clone)]
pub enum BeanClassRef {
    Resolved(Arc<BeanClass>),
    Named(String),
}

impl BeanClassRef {
    pub fn name(&self) -> &str {
        match self {
            BeanClassRef::Resolved(class) => class.name(),
            BeanClassRef::Named(name) => name,
        }
    }
}

impl PartialEq for BeanClassRef {
    fn eq(&self, other: &Self) -> bool {
        self.name() == other.name()
    }
}

impl fmt::Debug for BeanClassRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

type SupplierFn = dyn Fn() -> anyhow::Result<Option<BeanObject>> + Send + Sync;

/// 实例提供回调，相等性按引用比较
#[derive(Clone)]
pub struct InstanceSupplier(Arc<SupplierFn>);

impl InstanceSupplier {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn() -> anyhow::Result<Option<BeanObject>> + Send + Sync + 'static,
    {
        Self(Arc::new(f))
    }

    pub fn get(&self) -> anyhow::Result<Option<BeanObject>> {
        (self.0)()
    }
}

impl PartialEq for InstanceSupplier {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for InstanceSupplier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("InstanceSupplier")
    }
}

/// Bean 定义
#[derive(Debug, Clone, PartialEq)]
pub struct BeanDefinition {
    pub parent_name: Option<String>,
    pub bean_class: Option<BeanClassRef>,
    /// 空字符串表示未设置，合并时默认为 singleton
    pub scope: String,
    pub is_abstract: bool,
    pub lazy_init: Option<bool>,
    pub autowire_mode: AutowireMode,
    pub dependency_check: DependencyCheck,
    pub depends_on: Vec<String>,
    pub autowire_candidate: bool,
    pub primary: bool,
    pub instance_supplier: Option<InstanceSupplier>,
    pub factory_bean_name: Option<String>,
    pub factory_method_name: Option<String>,
    pub constructor_args: ConstructorArgumentValues,
    pub property_values: PropertyValues,
    pub init_method_names: Vec<String>,
    pub destroy_method_name: Option<String>,
    pub enforce_init_method: bool,
    pub enforce_destroy_method: bool,
    pub synthetic: bool,
    pub role: Role,
    /// 宽松模式下构造器权重相同不报错，取第一个
    pub lenient_constructor_resolution: bool,
    pub non_public_access_allowed: bool,
    pub description: Option<String>,
}

impl Default for BeanDefinition {
    fn default() -> Self {
        Self {
            parent_name: None,
            bean_class: None,
            scope: String::new(),
            is_abstract: false,
            lazy_init: None,
            autowire_mode: AutowireMode::No,
            dependency_check: DependencyCheck::None,
            depends_on: Vec::new(),
            autowire_candidate: true,
            primary: false,
            instance_supplier: None,
            factory_bean_name: None,
            factory_method_name: None,
            constructor_args: ConstructorArgumentValues::new(),
            property_values: PropertyValues::new(),
            init_method_names: Vec::new(),
            destroy_method_name: None,
            enforce_init_method: true,
            enforce_destroy_method: true,
            synthetic: false,
            role: Role::Application,
            lenient_constructor_resolution: true,
            non_public_access_allowed: true,
            description: None,
        }
    }
}

impl BeanDefinition {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn of_class(class: &Arc<BeanClass>) -> Self {
        Self {
            bean_class: Some(BeanClassRef::Resolved(Arc::clone(class))),
            ..Self::default()
        }
    }

    /// 按类名引用，创建时从工厂的类注册表中解析
    pub fn of_class_name(name: impl Into<String>) -> Self {
        Self {
            bean_class: Some(BeanClassRef::Named(name.into())),
            ..Self::default()
        }
    }

    /// 子定义，未设置的属性从父定义继承
    pub fn child_of(parent_name: impl Into<String>) -> Self {
        Self {
            parent_name: Some(parent_name.into()),
            ..Self::default()
        }
    }

    pub fn from_supplier<F>(supplier: F) -> Self
    where
        F: Fn() -> anyhow::Result<Option<BeanObject>> + Send + Sync + 'static,
    {
        Self {
            instance_supplier: Some(InstanceSupplier::new(supplier)),
            ..Self::default()
        }
    }

    pub fn with_class(mut self, class: &Arc<BeanClass>) -> Self {
        self.bean_class = Some(BeanClassRef::Resolved(Arc::clone(class)));
        self
    }

    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = scope.into();
        self
    }

    pub fn with_lazy_init(mut self, lazy: bool) -> Self {
        self.lazy_init = Some(lazy);
        self
    }

    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn with_autowire_mode(mut self, mode: AutowireMode) -> Self {
        self.autowire_mode = mode;
        self
    }

    pub fn with_dependency_check(mut self, check: DependencyCheck) -> Self {
        self.dependency_check = check;
        self
    }

    pub fn with_depends_on<S: Into<String>>(mut self, names: impl IntoIterator<Item = S>) -> Self {
        self.depends_on = names.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_primary(mut self, primary: bool) -> Self {
        self.primary = primary;
        self
    }

    pub fn with_autowire_candidate(mut self, candidate: bool) -> Self {
        self.autowire_candidate = candidate;
        self
    }

    /// 本类的静态工厂方法
    pub fn with_factory_method(mut self, method: impl Into<String>) -> Self {
        self.factory_method_name = Some(method.into());
        self
    }

    /// 另一个 bean 上的实例工厂方法
    pub fn with_factory_bean(mut self, factory_bean: impl Into<String>, method: impl Into<String>) -> Self {
        self.factory_bean_name = Some(factory_bean.into());
        self.factory_method_name = Some(method.into());
        self
    }

    pub fn with_constructor_arg(mut self, value: BeanValue) -> Self {
        self.constructor_args.add_generic(ValueHolder::new(value));
        self
    }

    pub fn with_typed_constructor_arg(mut self, value: BeanValue, type_name: impl Into<String>) -> Self {
        self.constructor_args.add_generic(ValueHolder::typed(value, type_name));
        self
    }

    pub fn with_named_constructor_arg(mut self, name: impl Into<String>, value: BeanValue) -> Self {
        self.constructor_args.add_generic(ValueHolder::named(value, name));
        self
    }

    pub fn with_indexed_constructor_arg(mut self, index: usize, value: BeanValue) -> Self {
        self.constructor_args.add_indexed(index, ValueHolder::new(value));
        self
    }

    pub fn with_property(mut self, name: impl Into<String>, value: BeanValue) -> Self {
        self.property_values.add(name, value);
        self
    }

    pub fn with_init_method(mut self, method: impl Into<String>) -> Self {
        self.init_method_names.push(method.into());
        self
    }

    pub fn with_destroy_method(mut self, method: impl Into<String>) -> Self {
        self.destroy_method_name = Some(method.into());
        self
    }

    pub fn with_enforce_init_method(mut self, enforce: bool) -> Self {
        self.enforce_init_method = enforce;
        self
    }

    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }

    pub fn with_synthetic(mut self, synthetic: bool) -> Self {
        self.synthetic = synthetic;
        self
    }

    pub fn with_lenient_constructor_resolution(mut self, lenient: bool) -> Self {
        self.lenient_constructor_resolution = lenient;
        self
    }

    pub fn with_non_public_access_allowed(mut self, allowed: bool) -> Self {
        self.non_public_access_allowed = allowed;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn is_singleton(&self) -> bool {
        self.scope == SCOPE_SINGLETON || self.scope.is_empty()
    }

    pub fn is_prototype(&self) -> bool {
        self.scope == SCOPE_PROTOTYPE
    }

    pub fn is_lazy_init(&self) -> bool {
        self.lazy_init.unwrap_or(false)
    }

    pub fn bean_class_name(&self) -> Option<&str> {
        self.bean_class.as_ref().map(BeanClassRef::name)
    }

    pub fn resolved_class(&self) -> Option<&Arc<BeanClass>> {
        match &self.bean_class {
            Some(BeanClassRef::Resolved(class)) => Some(class),
            _ => None,
        }
    }

    pub fn has_constructor_args(&self) -> bool {
        !self.constructor_args.is_empty()
    }

    /// 用 `other` 中显式设置的属性覆盖自身
    pub fn override_from(&mut self, other: &BeanDefinition) {
        if other.bean_class.is_some() {
            self.bean_class = other.bean_class.clone();
        }
        if !other.scope.is_empty() {
            self.scope = other.scope.clone();
        }
        self.is_abstract = other.is_abstract;
        if other.lazy_init.is_some() {
            self.lazy_init = other.lazy_init;
        }
        if other.factory_bean_name.is_some() {
            self.factory_bean_name = other.factory_bean_name.clone();
        }
        if other.factory_method_name.is_some() {
            self.factory_method_name = other.factory_method_name.clone();
        }
        self.role = other.role;
        self.autowire_mode = other.autowire_mode;
        self.dependency_check = other.dependency_check;
        if !other.depends_on.is_empty() {
            self.depends_on = other.depends_on.clone();
        }
        self.autowire_candidate = other.autowire_candidate;
        self.primary = other.primary;
        self.constructor_args.add_all(&other.constructor_args);
        self.property_values.add_all(&other.property_values);
        if other.instance_supplier.is_some() {
            self.instance_supplier = other.instance_supplier.clone();
        }
        if !other.init_method_names.is_empty() {
            self.init_method_names = other.init_method_names.clone();
            self.enforce_init_method = other.enforce_init_method;
        }
        if other.destroy_method_name.is_some() {
            self.destroy_method_name = other.destroy_method_name.clone();
            self.enforce_destroy_method = other.enforce_destroy_method;
        }
        self.synthetic = other.synthetic;
        self.non_public_access_allowed = other.non_public_access_allowed;
        self.lenient_constructor_resolution = other.lenient_constructor_resolution;
        if other.description.is_some() {
            self.description = other.description.clone();
        }
    }

    /// 注册前的一致性检查
    pub fn validate(&self, bean_name: &str) -> BeansResult<()> {
        if self.instance_supplier.is_some() && self.factory_method_name.is_some() {
            return Err(BeansError::BeanDefinitionStore {
                bean_name: bean_name.to_string(),
                message: "Cannot combine an instance supplier with a factory method".to_string(),
            });
        }
        if self.factory_bean_name.is_some() && self.factory_method_name.is_none() {
            return Err(BeansError::BeanDefinitionStore {
                bean_name: bean_name.to_string(),
                message: "A factory bean name requires a factory method name".to_string(),
            });
        }
        Ok(())
    }
}

/// 带名称和别名的定义
#[derive(Debug, Clone, PartialEq)]
pub struct BeanDefinitionHolder {
    pub bean_name: String,
    pub aliases: Vec<String>,
    pub definition: BeanDefinition,
}

impl BeanDefinitionHolder {
    pub fn new(bean_name: impl Into<String>, definition: BeanDefinition) -> Self {
        Self {
            bean_name: bean_name.into(),
            aliases: Vec::new(),
            definition,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_override_keeps_unset_parent_values() {
        let mut parent = BeanDefinition::of_class_name("Base")
            .with_scope("prototype")
            .with_property("a", BeanValue::literal("1"))
            .with_init_method("init");
        let child = BeanDefinition::child_of("base")
            .with_property("b", BeanValue::literal("2"))
            .with_lazy_init(true);

        parent.override_from(&child);

        assert_eq!(parent.bean_class_name(), Some("Base"));
        assert_eq!(parent.scope, "prototype");
        assert_eq!(parent.lazy_init, Some(true));
        assert_eq!(parent.property_values.len(), 2);
        assert_eq!(parent.init_method_names, vec!["init".to_string()]);
    }

    #[test]
    fn test_scope_defaults() {
        let def = BeanDefinition::new();
        assert!(def.is_singleton());
        assert!(!def.is_prototype());
        assert!(def.with_scope(SCOPE_PROTOTYPE).is_prototype());
    }

    #[test]
    fn test_validate_rejects_supplier_with_factory_method() {
        let def = BeanDefinition::from_supplier(|| Ok(None)).with_factory_method("create");
        assert!(def.validate("x").is_err());
        assert!(BeanDefinition::new().validate("x").is_ok());
    }
}
