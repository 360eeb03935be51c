//! 销毁回调适配器

use std::sync::Arc;

use crate::constants::{DESTROY, INFER_METHOD};
use crate::error::{BeansError, BeansResult};
use crate::merged::RootBeanDefinition;
use crate::object::BeanObject;
use crate::processor::DestructionAwareBeanPostProcessor;
use crate::singleton::DisposableCallback;

/// 推断销毁方法时依次尝试的名称
const INFERRED_METHODS: [&str; 2] = ["close", "shutdown"];

/// 把一个 bean 的全部销毁步骤合成一个回调：
/// 销毁感知处理器、`DisposableBean::destroy`、自定义销毁方法
pub(crate) struct DisposableBeanAdapter {
    bean: BeanObject,
    bean_name: String,
    invoke_disposable_bean: bool,
    destroy_method: Option<String>,
    processors: Vec<Arc<dyn DestructionAwareBeanPostProcessor>>,
}

impl DisposableBeanAdapter {
    pub(crate) fn new(
        bean: BeanObject,
        bean_name: &str,
        mbd: &RootBeanDefinition,
        processors: &[Arc<dyn DestructionAwareBeanPostProcessor>],
    ) -> BeansResult<Self> {
        let invoke_disposable_bean =
            bean.as_disposable_bean().is_some() && !mbd.is_externally_managed_destroy_method(DESTROY);

        let mut destroy_method = infer_destroy_method(&bean, mbd);
        if let Some(method) = &destroy_method {
            let duplicate = invoke_disposable_bean && method == DESTROY;
            if duplicate || mbd.is_externally_managed_destroy_method(method) {
                destroy_method = None;
            } else if !bean.class().has_method(method) {
                if mbd.definition().enforce_destroy_method {
                    return Err(BeansError::BeanDefinitionStore {
                        bean_name: bean_name.to_string(),
                        message: format!(
                            "Could not find a destroy method named '{}' on bean with name '{}'",
                            method, bean_name
                        ),
                    });
                }
                destroy_method = None;
            }
        }

        let processors = filter_processors(&bean, processors);
        Ok(Self {
            bean,
            bean_name: bean_name.to_string(),
            invoke_disposable_bean,
            destroy_method,
            processors,
        })
    }

    /// bean 自身声明了销毁逻辑
    pub(crate) fn has_destroy_method(bean: &BeanObject, mbd: &RootBeanDefinition) -> bool {
        bean.as_disposable_bean().is_some() || infer_destroy_method(bean, mbd).is_some()
    }

    pub(crate) fn has_applicable_processors(
        bean: &BeanObject,
        processors: &[Arc<dyn DestructionAwareBeanPostProcessor>],
    ) -> bool {
        processors.iter().any(|p| p.requires_destruction(bean))
    }
}

fn infer_destroy_method(bean: &BeanObject, mbd: &RootBeanDefinition) -> Option<String> {
    let method = mbd.definition().destroy_method_name.as_deref()?;
    if method == INFER_METHOD {
        if bean.as_disposable_bean().is_some() {
            return None;
        }
        return INFERRED_METHODS
            .iter()
            .find(|name| bean.class().has_method(name))
            .map(|name| name.to_string());
    }
    (!method.is_empty()).then(|| method.to_string())
}

fn filter_processors(
    bean: &BeanObject,
    processors: &[Arc<dyn DestructionAwareBeanPostProcessor>],
) -> Vec<Arc<dyn DestructionAwareBeanPostProcessor>> {
    processors
        .iter()
        .filter(|p| p.requires_destruction(bean))
        .cloned()
        .collect()
}

impl DisposableCallback for DisposableBeanAdapter {
    fn destroy(&self) {
        for processor in &self.processors {
            if let Err(e) = processor.post_process_before_destruction(&self.bean, &self.bean_name) {
                tracing::warn!(
                    "Destruction post-processing of bean with name '{}' failed: {}",
                    self.bean_name,
                    e
                );
            }
        }

        if self.invoke_disposable_bean {
            if let Some(disposable) = self.bean.as_disposable_bean() {
                tracing::trace!("Invoking destroy() on bean with name '{}'", self.bean_name);
                if let Err(e) = disposable.destroy() {
                    tracing::warn!("Invocation of destroy method failed on bean with name '{}': {}", self.bean_name, e);
                }
            }
        }

        if let Some(name) = &self.destroy_method {
            if let Some(method) = self.bean.class().method(name) {
                tracing::trace!("Invoking custom destroy method '{}' on bean with name '{}'", name, self.bean_name);
                if let Err(e) = method(&self.bean) {
                    tracing::warn!(
                        "Custom destroy method '{}' on bean with name '{}' threw an exception: {}",
                        name,
                        self.bean_name,
                        e
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    use crate::class::BeanClass;
    use crate::definition::BeanDefinition;
    use crate::lifecycle::DisposableBean;

    #[derive(Default)]
    struct Resource {
        calls: Mutex<Vec<&'static str>>,
    }

    impl DisposableBean for Resource {
        fn destroy(&self) -> anyhow::Result<()> {
            self.calls.lock().push("destroy");
            Ok(())
        }
    }

    fn resource_class() -> Arc<BeanClass> {
        BeanClass::builder::<Resource>("Resource")
            .constructor(vec![], |_| Ok(Resource::default()))
            .method("close", |r| {
                r.calls.lock().push("close");
                Ok(())
            })
            .method(DESTROY, |r| {
                r.calls.lock().push("duplicate");
                Ok(())
            })
            .disposable_bean()
            .build()
    }

    fn calls(bean: &BeanObject) -> Vec<&'static str> {
        bean.downcast_ref::<Resource>().unwrap().calls.lock().clone()
    }

    #[test]
    fn test_custom_method_runs_after_disposable_bean() {
        let class = resource_class();
        let bean = BeanObject::new(Resource::default(), &class);
        let mbd = RootBeanDefinition::new(BeanDefinition::of_class(&class).with_destroy_method("close"));

        DisposableBeanAdapter::new(bean.clone(), "resource", &mbd, &[]).unwrap().destroy();
        assert_eq!(calls(&bean), vec!["destroy", "close"]);
    }

    #[test]
    fn test_destroy_named_method_not_invoked_twice() {
        let class = resource_class();
        let bean = BeanObject::new(Resource::default(), &class);
        let mbd = RootBeanDefinition::new(BeanDefinition::of_class(&class).with_destroy_method(DESTROY));

        DisposableBeanAdapter::new(bean.clone(), "resource", &mbd, &[]).unwrap().destroy();
        assert_eq!(calls(&bean), vec!["destroy"]);
    }

    #[test]
    fn test_inferred_method_skipped_for_disposable_bean() {
        let class = resource_class();
        let bean = BeanObject::new(Resource::default(), &class);
        let mbd = RootBeanDefinition::new(BeanDefinition::of_class(&class).with_destroy_method(INFER_METHOD));
        assert_eq!(infer_destroy_method(&bean, &mbd), None);
    }

    #[test]
    fn test_missing_destroy_method_enforced() {
        let class = resource_class();
        let bean = BeanObject::new(Resource::default(), &class);
        let mbd = RootBeanDefinition::new(BeanDefinition::of_class(&class).with_destroy_method("release"));
        assert!(matches!(
            DisposableBeanAdapter::new(bean, "resource", &mbd, &[]),
            Err(BeansError::BeanDefinitionStore { .. })
        ));
    }
}
