//! Bean 类型元数据
//!
//! Rust 没有运行时反射，容器需要的所有"类"信息都显式描述在 [`BeanClass`] 中：
//! 类型层次（父类、接口）、构造器与工厂方法、可写属性、具名无参方法，以及
//! 实例可以向上转型成的容器回调接口（能力）。

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};

use crate::context::{ApplicationContextAware, EnvironmentAware};
use crate::event::ApplicationListener;
use crate::lifecycle::{
    BeanFactoryAware, BeanNameAware, DisposableBean, FactoryBean, InitializingBean, Ordered,
    SmartInitializingSingleton,
};
use crate::object::{Arguments, BeanObject, NullBean};
use crate::processor::{
    BeanDefinitionRegistryPostProcessor, BeanFactoryPostProcessor, BeanPostProcessor,
};

pub type Instance = Arc<dyn Any + Send + Sync>;

pub type ConstructorFn = Arc<dyn Fn(&Arguments) -> anyhow::Result<Instance> + Send + Sync>;

/// 工厂方法调用：实例方法收到工厂 bean，静态方法收到 `None`
pub type FactoryMethodFn =
    Arc<dyn Fn(Option<&BeanObject>, &Arguments) -> anyhow::Result<Option<BeanObject>> + Send + Sync>;

pub type SetterFn = Arc<dyn Fn(&BeanObject, BeanObject) -> anyhow::Result<()> + Send + Sync>;

pub type MethodFn = Arc<dyn Fn(&BeanObject) -> anyhow::Result<()> + Send + Sync>;

type Caster<T: ?Sized> = fn(Instance) -> Option<Arc<T>>;

pub const OBJECT: &str = "Object";

#[derive(Clone)]
pub struct Parameter {
    pub ty: Arc<BeanClass>,
    pub name: Option<String>,
}

/// 构造参数描述
pub fn param(name: &str, ty: &Arc<BeanClass>) -> Parameter {
    Parameter {
        ty: Arc::clone(ty),
        name: Some(name.to_string()),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutableKind {
    Constructor,
    StaticMethod,
    InstanceMethod,
}

#[derive(Clone)]
enum Invoker {
    Constructor(ConstructorFn),
    Method(FactoryMethodFn),
}

/// 构造器或工厂方法
#[derive(Clone)]
pub struct Executable {
    declaring_class: String,
    name: String,
    kind: ExecutableKind,
    params: Vec<Parameter>,
    return_type: Option<Arc<BeanClass>>,
    public: bool,
    autowired: Option<bool>,
    invoker: Invoker,
}

impl Executable {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn declaring_class(&self) -> &str {
        &self.declaring_class
    }

    pub fn kind(&self) -> ExecutableKind {
        self.kind
    }

    pub fn is_static(&self) -> bool {
        self.kind == ExecutableKind::StaticMethod
    }

    pub fn is_public(&self) -> bool {
        self.public
    }

    pub fn params(&self) -> &[Parameter] {
        &self.params
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn param_types(&self) -> Vec<Arc<BeanClass>> {
        self.params.iter().map(|p| Arc::clone(&p.ty)).collect()
    }

    pub fn param_names(&self) -> Option<Vec<String>> {
        self.params.iter().map(|p| p.name.clone()).collect()
    }

    pub fn return_type(&self) -> Option<&Arc<BeanClass>> {
        self.return_type.as_ref()
    }

    /// 构造器是否被标记为自动装配（`Some(required)`）
    pub fn autowired(&self) -> Option<bool> {
        self.autowired
    }

    pub fn signature(&self) -> String {
        let params = self
            .params
            .iter()
            .map(|p| p.ty.name().to_string())
            .collect::<Vec<_>>()
            .join(", ");
        match self.kind {
            ExecutableKind::Constructor => format!("{}({})", self.declaring_class, params),
            _ => format!("{}.{}({})", self.declaring_class, self.name, params),
        }
    }

    /// 调用构造器，结果以 `class` 作为运行时类型
    pub fn construct(&self, class: &Arc<BeanClass>, args: &Arguments) -> anyhow::Result<BeanObject> {
        match &self.invoker {
            Invoker::Constructor(f) => Ok(BeanObject::from_arc(f(args)?, Arc::clone(class))),
            Invoker::Method(_) => anyhow::bail!("'{}' is not a constructor", self.signature()),
        }
    }

    pub fn invoke(&self, target: Option<&BeanObject>, args: &Arguments) -> anyhow::Result<Option<BeanObject>> {
        match &self.invoker {
            Invoker::Method(f) => f(target, args),
            Invoker::Constructor(_) => anyhow::bail!("'{}' is not a factory method", self.signature()),
        }
    }
}

impl fmt::Debug for Executable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.signature())
    }
}

/// 可写属性
#[derive(Clone)]
pub struct PropertyDescriptor {
    pub name: String,
    pub ty: Arc<BeanClass>,
    setter: SetterFn,
    autowired: Option<bool>,
}

impl PropertyDescriptor {
    pub fn set(&self, bean: &BeanObject, value: BeanObject) -> anyhow::Result<()> {
        (self.setter)(bean, value)
    }

    /// 字段是否标记为注解注入（`Some(required)`）
    pub fn autowired(&self) -> Option<bool> {
        self.autowired
    }
}

/// 实例可以向上转型成的容器回调接口
#[derive(Default, Clone)]
pub(crate) struct Capabilities {
    pub bean_name_aware: Option<Caster<dyn BeanNameAware>>,
    pub bean_factory_aware: Option<Caster<dyn BeanFactoryAware>>,
    pub application_context_aware: Option<Caster<dyn ApplicationContextAware>>,
    pub environment_aware: Option<Caster<dyn EnvironmentAware>>,
    pub initializing_bean: Option<Caster<dyn InitializingBean>>,
    pub disposable_bean: Option<Caster<dyn DisposableBean>>,
    pub factory_bean: Option<Caster<dyn FactoryBean>>,
    pub smart_initializing_singleton: Option<Caster<dyn SmartInitializingSingleton>>,
    pub ordered: Option<Caster<dyn Ordered>>,
    pub priority_ordered: bool,
    pub bean_post_processor: Option<Caster<dyn BeanPostProcessor>>,
    pub bean_factory_post_processor: Option<Caster<dyn BeanFactoryPostProcessor>>,
    pub registry_post_processor: Option<Caster<dyn BeanDefinitionRegistryPostProcessor>>,
    pub application_listener: Option<Caster<dyn ApplicationListener>>,
}

/// 按能力筛选 bean 名称时使用
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    BeanNameAware,
    BeanFactoryAware,
    ApplicationContextAware,
    EnvironmentAware,
    InitializingBean,
    DisposableBean,
    FactoryBean,
    SmartInitializingSingleton,
    Ordered,
    PriorityOrdered,
    BeanPostProcessor,
    BeanFactoryPostProcessor,
    BeanDefinitionRegistryPostProcessor,
    ApplicationListener,
}

/// 配置类上声明为 bean 的工厂方法
#[derive(Debug, Clone, PartialEq)]
pub struct BeanMethod {
    /// 工厂方法名
    pub method: String,
    /// bean 名称，为空时使用方法名
    pub bean_name: String,
    pub aliases: Vec<String>,
    pub scope: Option<String>,
    pub lazy_init: bool,
    pub primary: bool,
    pub init_method: Option<String>,
    pub destroy_method: Option<String>,
}

impl BeanMethod {
    pub fn new(method: &str) -> Self {
        Self {
            method: method.to_string(),
            bean_name: String::new(),
            aliases: Vec::new(),
            scope: None,
            lazy_init: false,
            primary: false,
            init_method: None,
            destroy_method: None,
        }
    }

    /// 第一个名称作为 bean 名称，其余注册为别名
    pub fn named(mut self, names: &[&str]) -> Self {
        if let Some((first, rest)) = names.split_first() {
            self.bean_name = first.to_string();
            self.aliases = rest.iter().map(|alias| alias.to_string()).collect();
        }
        self
    }

    pub fn scope(mut self, scope: &str) -> Self {
        self.scope = Some(scope.to_string());
        self
    }

    pub fn lazy(mut self) -> Self {
        self.lazy_init = true;
        self
    }

    pub fn primary(mut self) -> Self {
        self.primary = true;
        self
    }

    pub fn init_method(mut self, method: &str) -> Self {
        self.init_method = Some(method.to_string());
        self
    }

    pub fn destroy_method(mut self, method: &str) -> Self {
        self.destroy_method = Some(method.to_string());
        self
    }

    pub fn resolved_bean_name(&self) -> &str {
        if self.bean_name.is_empty() {
            &self.method
        } else {
            &self.bean_name
        }
    }
}

/// Bean 的类型描述
pub struct BeanClass {
    name: String,
    superclass: Option<Arc<BeanClass>>,
    interfaces: Vec<Arc<BeanClass>>,
    interface: bool,
    simple: bool,
    primitive: bool,
    null_bean: bool,
    constructors: Vec<Arc<Executable>>,
    factory_methods: Vec<Arc<Executable>>,
    properties: Vec<PropertyDescriptor>,
    methods: HashMap<String, MethodFn>,
    post_construct: Vec<String>,
    pre_destroy: Vec<String>,
    bean_methods: Vec<BeanMethod>,
    pub(crate) capabilities: Capabilities,
}

impl BeanClass {
    pub fn builder<T: Any + Send + Sync>(name: impl Into<String>) -> BeanClassBuilder<T> {
        BeanClassBuilder::new(name.into())
    }

    /// 接口类型：没有构造器，只参与可赋值判断
    pub fn interface(name: impl Into<String>) -> Arc<BeanClass> {
        let mut builder = BeanClassBuilder::<()>::new(name.into());
        builder.class.interface = true;
        builder.build()
    }

    pub fn interface_extending(name: impl Into<String>, parents: &[&Arc<BeanClass>]) -> Arc<BeanClass> {
        let mut builder = BeanClassBuilder::<()>::new(name.into());
        builder.class.interface = true;
        for parent in parents {
            builder = builder.implements(parent);
        }
        builder.build()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn is_interface(&self) -> bool {
        self.interface
    }

    pub fn is_object(&self) -> bool {
        self.name == OBJECT
    }

    /// 简单值类型（字符串、数字、布尔）不参与按类型自动装配
    pub fn is_simple(&self) -> bool {
        self.simple
    }

    pub fn is_primitive(&self) -> bool {
        self.primitive
    }

    pub fn is_null_bean(&self) -> bool {
        self.null_bean
    }

    /// 直接父类；非接口类型隐式继承 `Object`
    pub fn superclass(&self) -> Option<Arc<BeanClass>> {
        if self.is_object() || self.interface {
            return None;
        }
        Some(
            self.superclass
                .clone()
                .unwrap_or_else(classes::object),
        )
    }

    pub fn interfaces(&self) -> &[Arc<BeanClass>] {
        &self.interfaces
    }

    pub fn constructors(&self) -> &[Arc<Executable>] {
        &self.constructors
    }

    pub fn factory_methods(&self) -> &[Arc<Executable>] {
        &self.factory_methods
    }

    /// 名称匹配的工厂方法
    pub fn factory_methods_named(&self, name: &str) -> Vec<Arc<Executable>> {
        self.factory_methods
            .iter()
            .filter(|m| m.name == name)
            .cloned()
            .collect()
    }

    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    pub fn property(&self, name: &str) -> Option<&PropertyDescriptor> {
        self.properties.iter().find(|p| p.name == name)
    }

    pub fn method(&self, name: &str) -> Option<&MethodFn> {
        self.methods.get(name)
    }

    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    pub fn post_construct_methods(&self) -> &[String] {
        &self.post_construct
    }

    /// 配置类声明的 bean 方法
    pub fn bean_methods(&self) -> &[BeanMethod] {
        &self.bean_methods
    }

    pub fn is_configuration(&self) -> bool {
        !self.bean_methods.is_empty()
    }

    pub fn pre_destroy_methods(&self) -> &[String] {
        &self.pre_destroy
    }

    /// `self` 的变量能否接收 `other` 类型的值
    pub fn is_assignable_from(&self, other: &BeanClass) -> bool {
        if self.is_object() && !other.primitive {
            return true;
        }
        if self.name == other.name {
            return true;
        }
        let mut current = other.superclass();
        while let Some(class) = current {
            if class.name == self.name || class.implements_interface(&self.name) {
                return true;
            }
            current = class.superclass();
        }
        other.implements_interface(&self.name)
    }

    fn implements_interface(&self, name: &str) -> bool {
        self.interfaces
            .iter()
            .any(|i| i.name == name || i.implements_interface(name))
    }

    /// 值是否能赋给该类型；null 可赋给任意非基本类型
    pub fn is_instance(&self, value: &BeanObject) -> bool {
        if value.is_null() {
            return !self.primitive;
        }
        self.is_assignable_from(value.class())
    }

    pub fn has_capability(&self, capability: Capability) -> bool {
        let caps = &self.capabilities;
        match capability {
            Capability::BeanNameAware => caps.bean_name_aware.is_some(),
            Capability::BeanFactoryAware => caps.bean_factory_aware.is_some(),
            Capability::ApplicationContextAware => caps.application_context_aware.is_some(),
            Capability::EnvironmentAware => caps.environment_aware.is_some(),
            Capability::InitializingBean => caps.initializing_bean.is_some(),
            Capability::DisposableBean => caps.disposable_bean.is_some(),
            Capability::FactoryBean => caps.factory_bean.is_some(),
            Capability::SmartInitializingSingleton => caps.smart_initializing_singleton.is_some(),
            Capability::Ordered => caps.ordered.is_some(),
            Capability::PriorityOrdered => caps.priority_ordered,
            Capability::BeanPostProcessor => caps.bean_post_processor.is_some(),
            Capability::BeanFactoryPostProcessor => caps.bean_factory_post_processor.is_some(),
            Capability::BeanDefinitionRegistryPostProcessor => {
                caps.registry_post_processor.is_some()
            }
            Capability::ApplicationListener => caps.application_listener.is_some(),
        }
    }

    /// 唯一的无参构造器
    pub fn default_constructor(&self) -> Option<&Arc<Executable>> {
        self.constructors.iter().find(|c| c.params.is_empty())
    }
}

impl PartialEq for BeanClass {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl fmt::Debug for BeanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BeanClass")
            .field("name", &self.name)
            .field("interface", &self.interface)
            .field("constructors", &self.constructors)
            .finish()
    }
}

impl fmt::Display for BeanClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

/// [`BeanClass`] 构建器，`T` 是实例的 Rust 类型
pub struct BeanClassBuilder<T> {
    class: BeanClass,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Any + Send + Sync> BeanClassBuilder<T> {
    fn new(name: String) -> Self {
        Self {
            class: BeanClass {
                name,
                superclass: None,
                interfaces: Vec::new(),
                interface: false,
                simple: false,
                primitive: false,
                null_bean: false,
                constructors: Vec::new(),
                factory_methods: Vec::new(),
                properties: Vec::new(),
                methods: HashMap::new(),
                post_construct: Vec::new(),
                pre_destroy: Vec::new(),
                bean_methods: Vec::new(),
                capabilities: Capabilities::default(),
            },
            _marker: PhantomData,
        }
    }

    pub fn extends(mut self, superclass: &Arc<BeanClass>) -> Self {
        self.class.superclass = Some(Arc::clone(superclass));
        self
    }

    pub fn implements(mut self, interface: &Arc<BeanClass>) -> Self {
        self.class.interfaces.push(Arc::clone(interface));
        self
    }

    pub fn simple(mut self) -> Self {
        self.class.simple = true;
        self
    }

    pub fn primitive(mut self) -> Self {
        self.class.simple = true;
        self.class.primitive = true;
        self
    }

    fn push_constructor<F>(mut self, params: Vec<Parameter>, public: bool, autowired: Option<bool>, f: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        let invoker: ConstructorFn = Arc::new(move |args| Ok(Arc::new(f(args)?) as Instance));
        let executable = Executable {
            declaring_class: self.class.name.clone(),
            name: "<init>".to_string(),
            kind: ExecutableKind::Constructor,
            params,
            return_type: None,
            public,
            autowired,
            invoker: Invoker::Constructor(invoker),
        };
        self.class.constructors.push(Arc::new(executable));
        self
    }

    pub fn constructor<F>(self, params: Vec<Parameter>, f: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.push_constructor(params, true, None, f)
    }

    pub fn private_constructor<F>(self, params: Vec<Parameter>, f: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.push_constructor(params, false, None, f)
    }

    /// 标记为自动装配的构造器，相当于构造器上的注入注解
    pub fn autowired_constructor<F>(self, params: Vec<Parameter>, required: bool, f: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<T> + Send + Sync + 'static,
    {
        self.push_constructor(params, true, Some(required), f)
    }

    pub fn static_factory<F>(mut self, name: &str, return_type: &Arc<BeanClass>, params: Vec<Parameter>, f: F) -> Self
    where
        F: Fn(&Arguments) -> anyhow::Result<Option<BeanObject>> + Send + Sync + 'static,
    {
        let invoker: FactoryMethodFn = Arc::new(move |_, args| f(args));
        self.class.factory_methods.push(Arc::new(Executable {
            declaring_class: self.class.name.clone(),
            name: name.to_string(),
            kind: ExecutableKind::StaticMethod,
            params,
            return_type: Some(Arc::clone(return_type)),
            public: true,
            autowired: None,
            invoker: Invoker::Method(invoker),
        }));
        self
    }

    pub fn instance_factory<F>(mut self, name: &str, return_type: &Arc<BeanClass>, params: Vec<Parameter>, f: F) -> Self
    where
        F: Fn(&T, &Arguments) -> anyhow::Result<Option<BeanObject>> + Send + Sync + 'static,
    {
        let method_name = name.to_string();
        let invoker: FactoryMethodFn = Arc::new(move |target, args| {
            let target = target
                .and_then(|t| t.downcast_ref::<T>())
                .ok_or_else(|| anyhow::anyhow!("Factory method '{}' needs a matching target instance", method_name))?;
            f(target, args)
        });
        self.class.factory_methods.push(Arc::new(Executable {
            declaring_class: self.class.name.clone(),
            name: name.to_string(),
            kind: ExecutableKind::InstanceMethod,
            params,
            return_type: Some(Arc::clone(return_type)),
            public: true,
            autowired: None,
            invoker: Invoker::Method(invoker),
        }));
        self
    }

    fn push_property<F>(mut self, name: &str, ty: &Arc<BeanClass>, autowired: Option<bool>, f: F) -> Self
    where
        F: Fn(&T, BeanObject) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let property = name.to_string();
        let class_name = self.class.name.clone();
        let setter: SetterFn = Arc::new(move |bean, value| {
            let target = bean.downcast_ref::<T>().ok_or_else(|| {
                anyhow::anyhow!("Cannot set property '{}': bean is not a '{}'", property, class_name)
            })?;
            f(target, value)
        });
        self.class.properties.push(PropertyDescriptor {
            name: name.to_string(),
            ty: Arc::clone(ty),
            setter,
            autowired,
        });
        self
    }

    pub fn property<F>(self, name: &str, ty: &Arc<BeanClass>, f: F) -> Self
    where
        F: Fn(&T, BeanObject) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.push_property(name, ty, None, f)
    }

    /// 带注入标记的属性，由 `AutowiredPostProcessor` 处理
    pub fn autowired_property<F>(self, name: &str, ty: &Arc<BeanClass>, required: bool, f: F) -> Self
    where
        F: Fn(&T, BeanObject) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.push_property(name, ty, Some(required), f)
    }

    pub fn method<F>(mut self, name: &str, f: F) -> Self
    where
        F: Fn(&T) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let method_name = name.to_string();
        let class_name = self.class.name.clone();
        let method: MethodFn = Arc::new(move |bean| {
            let target = bean.downcast_ref::<T>().ok_or_else(|| {
                anyhow::anyhow!("Cannot invoke '{}': bean is not a '{}'", method_name, class_name)
            })?;
            f(target)
        });
        self.class.methods.insert(name.to_string(), method);
        self
    }

    pub fn post_construct(mut self, method: &str) -> Self {
        self.class.post_construct.push(method.to_string());
        self
    }

    pub fn pre_destroy(mut self, method: &str) -> Self {
        self.class.pre_destroy.push(method.to_string());
        self
    }

    /// 把已声明的工厂方法注册为 bean，类随之成为配置类
    pub fn bean_method(mut self, method: BeanMethod) -> Self {
        self.class.bean_methods.push(method);
        self
    }

    pub fn bean_name_aware(mut self) -> Self
    where
        T: BeanNameAware,
    {
        let caster: Caster<dyn BeanNameAware> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn BeanNameAware>);
        self.class.capabilities.bean_name_aware = Some(caster);
        self
    }

    pub fn bean_factory_aware(mut self) -> Self
    where
        T: BeanFactoryAware,
    {
        let caster: Caster<dyn BeanFactoryAware> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn BeanFactoryAware>);
        self.class.capabilities.bean_factory_aware = Some(caster);
        self
    }

    pub fn application_context_aware(mut self) -> Self
    where
        T: ApplicationContextAware,
    {
        let caster: Caster<dyn ApplicationContextAware> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn ApplicationContextAware>);
        self.class.capabilities.application_context_aware = Some(caster);
        self
    }

    pub fn environment_aware(mut self) -> Self
    where
        T: EnvironmentAware,
    {
        let caster: Caster<dyn EnvironmentAware> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn EnvironmentAware>);
        self.class.capabilities.environment_aware = Some(caster);
        self
    }

    pub fn initializing_bean(mut self) -> Self
    where
        T: InitializingBean,
    {
        let caster: Caster<dyn InitializingBean> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn InitializingBean>);
        self.class.capabilities.initializing_bean = Some(caster);
        self
    }

    pub fn disposable_bean(mut self) -> Self
    where
        T: DisposableBean,
    {
        let caster: Caster<dyn DisposableBean> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn DisposableBean>);
        self.class.capabilities.disposable_bean = Some(caster);
        self
    }

    pub fn factory_bean(mut self) -> Self
    where
        T: FactoryBean,
    {
        let caster: Caster<dyn FactoryBean> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn FactoryBean>);
        self.class.capabilities.factory_bean = Some(caster);
        self
    }

    pub fn smart_initializing_singleton(mut self) -> Self
    where
        T: SmartInitializingSingleton,
    {
        let caster: Caster<dyn SmartInitializingSingleton> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn SmartInitializingSingleton>);
        self.class.capabilities.smart_initializing_singleton = Some(caster);
        self
    }

    pub fn ordered(mut self) -> Self
    where
        T: Ordered,
    {
        let caster: Caster<dyn Ordered> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn Ordered>);
        self.class.capabilities.ordered = Some(caster);
        self
    }

    /// 优先排序：发现阶段先于普通 `Ordered` 实例化
    pub fn priority_ordered(mut self) -> Self
    where
        T: Ordered,
    {
        self.class.capabilities.priority_ordered = true;
        self.ordered()
    }

    pub fn bean_post_processor(mut self) -> Self
    where
        T: BeanPostProcessor,
    {
        let caster: Caster<dyn BeanPostProcessor> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn BeanPostProcessor>);
        self.class.capabilities.bean_post_processor = Some(caster);
        self
    }

    pub fn bean_factory_post_processor(mut self) -> Self
    where
        T: BeanFactoryPostProcessor,
    {
        let caster: Caster<dyn BeanFactoryPostProcessor> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn BeanFactoryPostProcessor>);
        self.class.capabilities.bean_factory_post_processor = Some(caster);
        self
    }

    pub fn registry_post_processor(mut self) -> Self
    where
        T: BeanDefinitionRegistryPostProcessor,
    {
        let caster: Caster<dyn BeanDefinitionRegistryPostProcessor> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn BeanDefinitionRegistryPostProcessor>);
        self.class.capabilities.registry_post_processor = Some(caster);
        self.bean_factory_post_processor()
    }

    pub fn application_listener(mut self) -> Self
    where
        T: ApplicationListener,
    {
        let caster: Caster<dyn ApplicationListener> = |o| o.downcast::<T>().ok().map(|b| b as Arc<dyn ApplicationListener>);
        self.class.capabilities.application_listener = Some(caster);
        self
    }

    pub fn build(self) -> Arc<BeanClass> {
        Arc::new(self.class)
    }
}

/// 内置类型
pub mod classes {
    use super::*;

    macro_rules! builtin {
        ($fn_name:ident, $ty:ty, $name:expr, $($modifier:ident)?) => {
            pub fn $fn_name() -> Arc<BeanClass> {
                static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
                Arc::clone(CLASS.get_or_init(|| BeanClass::builder::<$ty>($name)$(.$modifier())?.build()))
            }
        };
    }

    builtin!(string, String, "String", simple);
    builtin!(i32, i32, "i32", primitive);
    builtin!(i64, i64, "i64", primitive);
    builtin!(f64, f64, "f64", primitive);
    builtin!(boolean, bool, "bool", primitive);
    builtin!(list, Vec<BeanObject>, "List",);

    pub fn object() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| BeanClass::builder::<()>(OBJECT).build()))
    }

    pub fn null_bean() -> Arc<BeanClass> {
        static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
        Arc::clone(CLASS.get_or_init(|| {
            let mut builder = BeanClass::builder::<NullBean>("NullBean");
            builder.class.null_bean = true;
            builder.build()
        }))
    }

    pub(crate) fn all() -> Vec<Arc<BeanClass>> {
        vec![object(), string(), i32(), i64(), f64(), boolean(), list(), null_bean()]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hierarchy() -> (Arc<BeanClass>, Arc<BeanClass>, Arc<BeanClass>) {
        let repository = BeanClass::interface("Repository");
        let base = BeanClass::builder::<()>("BaseRepository")
            .implements(&repository)
            .build();
        let jdbc = BeanClass::builder::<()>("JdbcRepository").extends(&base).build();
        (repository, base, jdbc)
    }

    #[test]
    fn test_assignability_follows_hierarchy() {
        let (repository, base, jdbc) = hierarchy();

        assert!(repository.is_assignable_from(&jdbc));
        assert!(base.is_assignable_from(&jdbc));
        assert!(!jdbc.is_assignable_from(&base));
        assert!(classes::object().is_assignable_from(&jdbc));
        assert!(!classes::object().is_assignable_from(&classes::i32()));
    }

    #[test]
    fn test_superclass_defaults_to_object() {
        let (repository, base, jdbc) = hierarchy();

        assert_eq!(jdbc.superclass().map(|c| c.name().to_string()), Some("BaseRepository".to_string()));
        assert_eq!(base.superclass().map(|c| c.name().to_string()), Some(OBJECT.to_string()));
        assert!(repository.superclass().is_none());
        assert!(classes::object().superclass().is_none());
    }

    #[test]
    fn test_null_is_instance_of_reference_types_only() {
        let null = BeanObject::null();
        assert!(classes::string().is_instance(&null));
        assert!(!classes::i64().is_instance(&null));
    }

    #[test]
    fn test_constructor_signature() {
        struct Greeter(String);
        let class = BeanClass::builder::<Greeter>("Greeter")
            .constructor(vec![param("greeting", &classes::string())], |args| {
                Ok(Greeter(args.string(0)?))
            })
            .build();

        let ctor = &class.constructors()[0];
        assert_eq!(ctor.signature(), "Greeter(String)");
        let bean = ctor
            .construct(&class, &Arguments::new(vec![BeanObject::string("hi")]))
            .unwrap();
        assert_eq!(bean.downcast_ref::<Greeter>().unwrap().0, "hi");
    }
}
