//! 把定义中的值解析成对象：引用、内部 bean、列表和字面量

use crate::definition::BeanDefinitionHolder;
use crate::error::{BeansError, BeansResult};
use crate::merged::RootBeanDefinition;
use crate::object::BeanObject;
use crate::utils::naming;
use crate::values::{BeanReference, BeanValue, TypedStringValue};

use super::{BeanDefinitionRegistry, BeanFactory, ConfigurableBeanFactory, DefaultListableBeanFactory};

pub(crate) struct BeanDefinitionValueResolver<'a> {
    factory: &'a DefaultListableBeanFactory,
    bean_name: &'a str,
    mbd: &'a RootBeanDefinition,
}

impl<'a> BeanDefinitionValueResolver<'a> {
    pub(crate) fn new(factory: &'a DefaultListableBeanFactory, bean_name: &'a str, mbd: &'a RootBeanDefinition) -> Self {
        Self { factory, bean_name, mbd }
    }

    /// `arg_name` 只用于错误信息，例如 "bean property 'x'"
    pub(crate) fn resolve_value_if_necessary(&self, arg_name: &str, value: &BeanValue) -> BeansResult<BeanObject> {
        match value {
            BeanValue::Null => Ok(BeanObject::null()),
            BeanValue::Object(object) => Ok(object.clone()),
            BeanValue::Literal(typed) => self.resolve_literal(arg_name, typed),
            BeanValue::Reference(reference) => self.resolve_reference(arg_name, reference),
            BeanValue::BeanName(name) => {
                if !self.factory.contains_bean(name) {
                    return Err(BeansError::BeanDefinitionStore {
                        bean_name: self.bean_name.to_string(),
                        message: format!("Invalid bean name '{}' in bean reference for {}", name, arg_name),
                    });
                }
                Ok(BeanObject::string(name.clone()))
            }
            BeanValue::Inner(holder) => self.resolve_inner_bean(arg_name, holder),
            BeanValue::List(items) => {
                let resolved = items
                    .iter()
                    .enumerate()
                    .map(|(i, item)| self.resolve_value_if_necessary(&format!("{} with key [{}]", arg_name, i), item))
                    .collect::<BeansResult<Vec<_>>>()?;
                Ok(BeanObject::list(resolved))
            }
        }
    }

    fn resolve_literal(&self, arg_name: &str, typed: &TypedStringValue) -> BeansResult<BeanObject> {
        let raw = BeanObject::string(typed.value.clone());
        let Some(type_name) = &typed.target_type else {
            return Ok(raw);
        };
        let target = self.factory.find_class(type_name).ok_or_else(|| BeansError::BeanDefinitionStore {
            bean_name: self.bean_name.to_string(),
            message: format!("Cannot find class [{}] for typed value of {}", type_name, arg_name),
        })?;
        self.factory.type_converter().convert_if_necessary(&raw, &target).map_err(|e| {
            BeansError::creation_caused_by(self.bean_name, format!("Error converting typed String value for {}", arg_name), e)
        })
    }

    fn resolve_reference(&self, arg_name: &str, reference: &BeanReference) -> BeansResult<BeanObject> {
        let wrap = |e: BeansError| {
            BeansError::creation_caused_by(
                self.bean_name,
                format!("Cannot resolve reference to bean '{}' while setting {}", reference.bean_name, arg_name),
                e,
            )
        };

        if reference.to_parent {
            let parent = self.factory.parent_bean_factory().ok_or_else(|| {
                wrap(BeansError::illegal_state(format!(
                    "Cannot resolve reference to bean '{}' in parent factory: no parent factory available",
                    reference.bean_name
                )))
            })?;
            return parent.get_bean(&reference.bean_name).map_err(wrap);
        }

        let bean = self.factory.get_bean(&reference.bean_name).map_err(wrap)?;
        self.factory.register_dependent_bean(&reference.bean_name, self.bean_name);
        Ok(bean)
    }

    fn resolve_inner_bean(&self, arg_name: &str, holder: &BeanDefinitionHolder) -> BeansResult<BeanObject> {
        let wrap = |e: BeansError| {
            BeansError::creation_caused_by(
                self.bean_name,
                format!("Cannot create inner bean '{}' while setting {}", holder.bean_name, arg_name),
                e,
            )
        };

        let mbd = self
            .factory
            .merged_inner_definition(&holder.bean_name, &holder.definition, self.mbd)
            .map_err(wrap)?;
        let actual_name = if mbd.is_singleton() {
            self.adapt_inner_bean_name(&holder.bean_name)
        } else {
            holder.bean_name.clone()
        };
        self.factory.singletons.register_contained_bean(&actual_name, self.bean_name);

        for dependency in &mbd.definition().depends_on {
            self.factory.register_dependent_bean(dependency, &actual_name);
            self.factory.get_bean(dependency).map_err(wrap)?;
        }

        let inner = self.factory.create_bean(&actual_name, &mbd, None).map_err(wrap)?;
        match inner.as_factory_bean() {
            Some(factory_bean) => self
                .factory
                .get_object_from_factory_bean(&factory_bean, &actual_name, !mbd.definition().synthetic)
                .map_err(wrap),
            None => Ok(inner),
        }
    }

    /// 单例内部 bean 的名称在容器内唯一，依赖关系才不会串到别的 bean 上
    fn adapt_inner_bean_name(&self, inner_name: &str) -> String {
        let mut actual = inner_name.to_string();
        let mut counter = 0;
        while self.factory.is_bean_name_in_use(&actual) {
            counter += 1;
            actual = naming::inner_bean_name(inner_name, counter);
        }
        actual
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parking_lot::Mutex;

    use crate::class::{classes, BeanClass};
    use crate::definition::BeanDefinition;

    use super::*;

    struct Holder {
        items: Mutex<Vec<BeanObject>>,
        child: Mutex<Option<BeanObject>>,
    }

    struct Child;

    fn holder_class() -> Arc<BeanClass> {
        BeanClass::builder::<Holder>("Holder")
            .constructor(vec![], |_| {
                Ok(Holder {
                    items: Mutex::new(Vec::new()),
                    child: Mutex::new(None),
                })
            })
            .property("items", &classes::list(), |h, v| {
                *h.items.lock() = v.as_list().map(<[BeanObject]>::to_vec).unwrap_or_default();
                Ok(())
            })
            .property("child", &classes::object(), |h, v| {
                *h.child.lock() = Some(v);
                Ok(())
            })
            .build()
    }

    fn child_class() -> Arc<BeanClass> {
        BeanClass::builder::<Child>("Child").constructor(vec![], |_| Ok(Child)).build()
    }

    #[test]
    fn test_list_with_reference_and_typed_literal() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition("child", BeanDefinition::of_class(&child_class())).unwrap();
        factory
            .register_bean_definition(
                "holder",
                BeanDefinition::of_class(&holder_class()).with_property(
                    "items",
                    BeanValue::list(vec![
                        BeanValue::reference("child"),
                        BeanValue::typed_literal("42", "i32"),
                        BeanValue::literal("plain"),
                    ]),
                ),
            )
            .unwrap();

        let holder = factory.get_bean("holder").unwrap();
        let items = holder.downcast_ref::<Holder>().unwrap().items.lock().clone();
        assert_eq!(items.len(), 3);
        assert!(items[0].ptr_eq(&factory.get_bean("child").unwrap()));
        assert_eq!(items[1].downcast_ref::<i32>(), Some(&42));
        assert_eq!(items[2].as_str(), Some("plain"));
        assert_eq!(factory.get_dependent_beans("child"), vec!["holder"]);
    }

    #[test]
    fn test_inner_bean_gets_unique_name() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_bean_definition("child", BeanDefinition::of_class(&child_class())).unwrap();
        factory
            .register_bean_definition(
                "holder",
                BeanDefinition::of_class(&holder_class())
                    .with_property("child", BeanValue::inner("child", BeanDefinition::of_class(&child_class()))),
            )
            .unwrap();

        let holder = factory.get_bean("holder").unwrap();
        let inner = holder.downcast_ref::<Holder>().unwrap().child.lock().clone().unwrap();
        assert!(inner.downcast_ref::<Child>().is_some());
        assert!(!inner.ptr_eq(&factory.get_bean("child").unwrap()));
        assert_eq!(factory.get_dependent_beans("child#1"), vec!["holder"]);
    }

    #[test]
    fn test_missing_reference_names_property() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition(
                "holder",
                BeanDefinition::of_class(&holder_class()).with_property("child", BeanValue::reference("ghost")),
            )
            .unwrap();
        let message = factory.get_bean("holder").unwrap_err().to_string();
        assert!(message.contains("Cannot resolve reference to bean 'ghost' while setting bean property 'child'"));
    }
}
