//! 运行时 bean 实例

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::class::{classes, BeanClass, Instance};
use crate::context::{ApplicationContextAware, EnvironmentAware};
use crate::event::ApplicationListener;
use crate::lifecycle::{
    BeanFactoryAware, BeanNameAware, DisposableBean, FactoryBean, InitializingBean, Ordered,
    SmartInitializingSingleton,
};
use crate::processor::{
    BeanDefinitionRegistryPostProcessor, BeanFactoryPostProcessor, BeanPostProcessor,
};

/// 工厂方法返回空值时保存在容器里的占位对象
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NullBean;

/// 容器管理的对象：共享的实例加上它的运行时类型
///
/// 克隆只复制引用，两个 `BeanObject` 是否是同一个实例用 [`BeanObject::ptr_eq`] 判断。
#[derive(Clone)]
pub struct BeanObject {
    value: Instance,
    class: Arc<BeanClass>,
}

impl BeanObject {
    pub fn new<T: Any + Send + Sync>(value: T, class: &Arc<BeanClass>) -> Self {
        Self {
            value: Arc::new(value),
            class: Arc::clone(class),
        }
    }

    pub fn from_arc(value: Instance, class: Arc<BeanClass>) -> Self {
        Self { value, class }
    }

    pub fn null() -> Self {
        Self::new(NullBean, &classes::null_bean())
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::new(value.into(), &classes::string())
    }

    pub fn i32(value: i32) -> Self {
        Self::new(value, &classes::i32())
    }

    pub fn i64(value: i64) -> Self {
        Self::new(value, &classes::i64())
    }

    pub fn f64(value: f64) -> Self {
        Self::new(value, &classes::f64())
    }

    pub fn boolean(value: bool) -> Self {
        Self::new(value, &classes::boolean())
    }

    pub fn list(items: Vec<BeanObject>) -> Self {
        Self::new(items, &classes::list())
    }

    pub fn is_null(&self) -> bool {
        self.class.is_null_bean()
    }

    pub fn class(&self) -> &Arc<BeanClass> {
        &self.class
    }

    pub fn class_name(&self) -> &str {
        self.class.name()
    }

    pub fn instance(&self) -> &Instance {
        &self.value
    }

    pub fn downcast<T: Any + Send + Sync>(&self) -> Option<Arc<T>> {
        Arc::clone(&self.value).downcast::<T>().ok()
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }

    pub fn as_str(&self) -> Option<&str> {
        self.downcast_ref::<String>().map(String::as_str)
    }

    pub fn as_list(&self) -> Option<&[BeanObject]> {
        self.downcast_ref::<Vec<BeanObject>>().map(Vec::as_slice)
    }

    /// 是否指向同一个实例
    pub fn ptr_eq(&self, other: &BeanObject) -> bool {
        std::ptr::eq(
            Arc::as_ptr(&self.value) as *const (),
            Arc::as_ptr(&other.value) as *const (),
        )
    }

    pub fn as_bean_name_aware(&self) -> Option<Arc<dyn BeanNameAware>> {
        self.class.capabilities.bean_name_aware.and_then(|c| c(Arc::clone(&self.value)))
    }

    pub fn as_bean_factory_aware(&self) -> Option<Arc<dyn BeanFactoryAware>> {
        self.class.capabilities.bean_factory_aware.and_then(|c| c(Arc::clone(&self.value)))
    }

    pub fn as_application_context_aware(&self) -> Option<Arc<dyn ApplicationContextAware>> {
        self.class
            .capabilities
            .application_context_aware
            .and_then(|c| c(Arc::clone(&self.value)))
    }

    pub fn as_environment_aware(&self) -> Option<Arc<dyn EnvironmentAware>> {
        self.class.capabilities.environment_aware.and_then(|c| c(Arc::clone(&self.value)))
    }

    pub fn as_initializing_bean(&self) -> Option<Arc<dyn InitializingBean>> {
        self.class.capabilities.initializing_bean.and_then(|c| c(Arc::clone(&self.value)))
    }

    pub fn as_disposable_bean(&self) -> Option<Arc<dyn DisposableBean>> {
        self.class.capabilities.disposable_bean.and_then(|c| c(Arc::clone(&self.value)))
    }

    pub fn as_factory_bean(&self) -> Option<Arc<dyn FactoryBean>> {
        self.class.capabilities.factory_bean.and_then(|c| c(Arc::clone(&self.value)))
    }

    pub fn as_smart_initializing_singleton(&self) -> Option<Arc<dyn SmartInitializingSingleton>> {
        self.class
            .capabilities
            .smart_initializing_singleton
            .and_then(|c| c(Arc::clone(&self.value)))
    }

    pub fn as_ordered(&self) -> Option<Arc<dyn Ordered>> {
        self.class.capabilities.ordered.and_then(|c| c(Arc::clone(&self.value)))
    }

    pub fn as_bean_post_processor(&self) -> Option<Arc<dyn BeanPostProcessor>> {
        self.class.capabilities.bean_post_processor.and_then(|c| c(Arc::clone(&self.value)))
    }

    pub fn as_bean_factory_post_processor(&self) -> Option<Arc<dyn BeanFactoryPostProcessor>> {
        self.class
            .capabilities
            .bean_factory_post_processor
            .and_then(|c| c(Arc::clone(&self.value)))
    }

    pub fn as_registry_post_processor(&self) -> Option<Arc<dyn BeanDefinitionRegistryPostProcessor>> {
        self.class
            .capabilities
            .registry_post_processor
            .and_then(|c| c(Arc::clone(&self.value)))
    }

    pub fn as_application_listener(&self) -> Option<Arc<dyn ApplicationListener>> {
        self.class
            .capabilities
            .application_listener
            .and_then(|c| c(Arc::clone(&self.value)))
    }
}

impl PartialEq for BeanObject {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl fmt::Debug for BeanObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_null() {
            return f.write_str("null");
        }
        if let Some(s) = self.as_str() {
            return write!(f, "{:?}", s);
        }
        if let Some(v) = self.downcast_ref::<i64>() {
            return write!(f, "{}", v);
        }
        if let Some(v) = self.downcast_ref::<i32>() {
            return write!(f, "{}", v);
        }
        if let Some(v) = self.downcast_ref::<bool>() {
            return write!(f, "{}", v);
        }
        write!(f, "{}@{:p}", self.class.name(), Arc::as_ptr(&self.value) as *const ())
    }
}

/// 传给构造器和工厂方法的实参
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    values: Vec<BeanObject>,
}

impl Arguments {
    pub fn new(values: Vec<BeanObject>) -> Self {
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[BeanObject] {
        &self.values
    }

    pub fn object(&self, index: usize) -> anyhow::Result<&BeanObject> {
        self.values
            .get(index)
            .ok_or_else(|| anyhow::anyhow!("No argument at index {}", index))
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.values.get(index).map_or(true, BeanObject::is_null)
    }

    /// 取出指定类型的参数
    pub fn get<T: Any + Send + Sync>(&self, index: usize) -> anyhow::Result<Arc<T>> {
        let value = self.object(index)?;
        value.downcast::<T>().ok_or_else(|| {
            anyhow::anyhow!(
                "Argument {} is a '{}', not a '{}'",
                index,
                value.class_name(),
                std::any::type_name::<T>()
            )
        })
    }

    /// 可空参数
    pub fn optional<T: Any + Send + Sync>(&self, index: usize) -> anyhow::Result<Option<Arc<T>>> {
        if self.is_null(index) {
            return Ok(None);
        }
        self.get(index).map(Some)
    }

    pub fn string(&self, index: usize) -> anyhow::Result<String> {
        Ok(self.get::<String>(index)?.as_ref().clone())
    }

    pub fn i32(&self, index: usize) -> anyhow::Result<i32> {
        Ok(*self.get::<i32>(index)?)
    }

    pub fn i64(&self, index: usize) -> anyhow::Result<i64> {
        Ok(*self.get::<i64>(index)?)
    }

    pub fn f64(&self, index: usize) -> anyhow::Result<f64> {
        Ok(*self.get::<f64>(index)?)
    }

    pub fn boolean(&self, index: usize) -> anyhow::Result<bool> {
        Ok(*self.get::<bool>(index)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clone_shares_instance() {
        let a = BeanObject::string("x");
        let b = a.clone();
        let c = BeanObject::string("x");

        assert!(a.ptr_eq(&b));
        assert!(!a.ptr_eq(&c));
        assert_eq!(a.as_str(), Some("x"));
    }

    #[test]
    fn test_null_bean() {
        let null = BeanObject::null();
        assert!(null.is_null());
        assert_eq!(format!("{:?}", null), "null");
        assert!(!BeanObject::i64(1).is_null());
    }

    #[test]
    fn test_arguments_typed_access() {
        let args = Arguments::new(vec![BeanObject::i64(7), BeanObject::string("s"), BeanObject::null()]);

        assert_eq!(args.i64(0).unwrap(), 7);
        assert_eq!(args.string(1).unwrap(), "s");
        assert!(args.i32(0).is_err());
        assert!(args.optional::<String>(2).unwrap().is_none());
        assert!(args.object(3).is_err());
    }
}
