// griffin-core: 类似 Spring 的 Bean 容器
//
// 提供运行时描述类型的依赖注入容器，支持：
// - 父子定义合并、构造器按权重选择
// - 单例、原型和自定义作用域
// - 单例之间的循环引用（三级缓存）
// - 工厂后置处理器与 bean 后置处理器流水线
// - 应用上下文、事件和组件扫描

pub mod annotation;
pub mod app;
pub mod bean_factory;
pub mod class;
pub mod component;
pub mod config;
pub mod configuration;
pub mod constants;
pub mod context;
pub mod convert;
pub mod definition;
pub mod error;
pub mod event;
pub mod lifecycle;
pub mod logging;
pub mod merged;
pub mod object;
pub mod placeholder;
pub mod post_processor_registration;
pub mod processor;
pub mod scope;
pub mod settings;
pub mod singleton;
pub mod utils;
pub mod values;

// 重新导出常用类型
pub use annotation::{AutowiredPostProcessor, LifecycleAnnotationPostProcessor};
pub use app::GriffinApplication;
pub use bean_factory::{
    BeanDefinitionRegistry, BeanFactory, BeanFactoryExt, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, DependencyDescriptor, ListableBeanFactory,
};
pub use class::{classes, param, BeanClass, BeanMethod, Capability};
pub use component::{ComponentRegistration, ComponentScanPostProcessor};
pub use configuration::ConfigurationClassPostProcessor;
pub use config::{
    ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource, TomlPropertySource,
};
pub use context::{
    ApplicationContext, ApplicationContextAware, ApplicationContextBuilder, EnvironmentAware, ShutdownHook,
};
pub use definition::{AutowireMode, BeanDefinition, Role};
pub use error::{BeansError, BeansResult};
pub use event::{
    ApplicationEventMulticaster, ApplicationEventPublisher, ApplicationListener, ApplicationStartedEvent,
    ContextClosedEvent, ContextRefreshedEvent, ErrorHandler, Event, SimpleApplicationEventMulticaster,
    TypedEventListener, TypedEventListenerAdapter,
};
pub use lifecycle::{
    BeanFactoryAware, BeanNameAware, DisposableBean, FactoryBean, InitializingBean, Ordered,
    SmartInitializingSingleton, HIGHEST_PRECEDENCE, LOWEST_PRECEDENCE,
};
pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use object::{Arguments, BeanObject};
pub use placeholder::PlaceholderConfigurer;
pub use processor::{
    BeanDefinitionRegistryPostProcessor, BeanFactoryPostProcessor, BeanPostProcessor,
    DestructionAwareBeanPostProcessor, InstantiationAwareBeanPostProcessor, MergedBeanDefinitionPostProcessor,
    SmartInstantiationAwareBeanPostProcessor,
};
pub use scope::{Scope, ThreadScope};
pub use settings::ContainerSettings;
pub use values::BeanValue;

// 导出 inventory，供组件提交使用
pub use inventory;

/// Prelude 模块，包含常用的 traits 和类型
pub mod prelude {
    pub use crate::app::GriffinApplication;
    pub use crate::bean_factory::{
        BeanDefinitionRegistry, BeanFactory, BeanFactoryExt, ConfigurableBeanFactory,
        ConfigurableListableBeanFactory, DefaultListableBeanFactory, ListableBeanFactory,
    };
    pub use crate::class::{classes, param, BeanClass, BeanMethod};
    pub use crate::component::ComponentRegistration;
    pub use crate::config::{
        self, ConfigValue, Environment, EnvironmentPropertySource, MapPropertySource, PropertySource,
        TomlPropertySource,
    };
    pub use crate::context::{ApplicationContext, ApplicationContextAware, EnvironmentAware};
    pub use crate::definition::BeanDefinition;
    pub use crate::error::{BeansError, BeansResult};
    pub use crate::event::{
        ApplicationEventPublisher, ApplicationListener, ApplicationStartedEvent, ContextClosedEvent,
        ContextRefreshedEvent, Event, TypedEventListener, TypedEventListenerAdapter,
    };
    pub use crate::lifecycle::{
        DisposableBean, FactoryBean, InitializingBean, Ordered, SmartInitializingSingleton,
    };
    pub use crate::logging::{LogFormat, LogLevel, LoggingConfig};
    pub use crate::object::{Arguments, BeanObject};
    pub use crate::processor::{BeanFactoryPostProcessor, BeanPostProcessor};
    pub use crate::values::BeanValue;
    pub use std::sync::Arc;
    // Re-export anyhow for convenience
    pub use anyhow::{anyhow, Context};
}
