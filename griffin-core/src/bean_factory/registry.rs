//! 定义注册、别名和定义合并

use std::collections::HashMap;
use std::sync::Arc;

use crate::class::BeanClass;
use crate::constants;
use crate::definition::BeanDefinition;
use crate::error::{BeansError, BeansResult};
use crate::merged::{merge_definitions, RootBeanDefinition};

use super::{BeanDefinitionRegistry, ConfigurableBeanFactory, DefaultListableBeanFactory};

impl DefaultListableBeanFactory {
    /// 沿别名链找到规范名称
    pub fn canonical_name(&self, name: &str) -> String {
        let aliases = self.aliases.read();
        let mut canonical = name;
        while let Some(resolved) = aliases.get(canonical) {
            canonical = resolved;
        }
        canonical.to_string()
    }

    /// 去掉 `&` 前缀并解析别名
    pub fn transformed_bean_name(&self, name: &str) -> String {
        self.canonical_name(constants::transformed_bean_name(name))
    }

    /// `name` 是否（直接或间接）以 `alias` 为别名
    fn has_alias(aliases: &HashMap<String, String>, name: &str, alias: &str) -> bool {
        aliases.iter().any(|(registered_alias, registered_name)| {
            registered_name == name
                && (registered_alias == alias || Self::has_alias(aliases, registered_alias, alias))
        })
    }

    fn collect_aliases(aliases: &HashMap<String, String>, name: &str, result: &mut Vec<String>) {
        for (alias, target) in aliases {
            if target == name && !result.contains(alias) {
                result.push(alias.clone());
                Self::collect_aliases(aliases, alias, result);
            }
        }
    }

    /// 名称的所有别名（不含规范名称本身）
    pub(crate) fn aliases_of(&self, name: &str) -> Vec<String> {
        let aliases = self.aliases.read();
        let mut result = Vec::new();
        Self::collect_aliases(&aliases, name, &mut result);
        result.sort();
        result
    }

    pub(crate) fn raw_definition(&self, bean_name: &str) -> BeansResult<BeanDefinition> {
        self.definitions
            .read()
            .definitions
            .get(bean_name)
            .cloned()
            .ok_or_else(|| BeansError::no_such_bean(bean_name))
    }

    pub(crate) fn manual_singleton_names(&self) -> Vec<String> {
        self.definitions.read().manual_singletons.clone()
    }

    /// 定义发生变化后清理合并缓存、已创建的单例以及子定义
    fn reset_bean_definition(&self, bean_name: &str) {
        self.merged.mark_stale(bean_name);
        self.destroy_singleton(bean_name);

        for processor in &self.processor_cache().merged_definition {
            processor.reset_bean_definition(bean_name);
        }

        let children: Vec<String> = {
            let table = self.definitions.read();
            table
                .names
                .iter()
                .filter(|name| {
                    name.as_str() != bean_name
                        && table
                            .definitions
                            .get(*name)
                            .and_then(|def| def.parent_name.as_deref())
                            == Some(bean_name)
                })
                .cloned()
                .collect()
        };
        for child in children {
            self.reset_bean_definition(&child);
        }
    }

    /// 本地合并定义，使用缓存直到被标记为过期
    pub(crate) fn merged_local_definition(&self, bean_name: &str) -> BeansResult<Arc<RootBeanDefinition>> {
        if let Some(mbd) = self.merged.get(bean_name) {
            if !mbd.is_stale() {
                return Ok(mbd);
            }
        }
        let definition = self.raw_definition(bean_name)?;
        self.merge_bean_definition(bean_name, &definition, None)
    }

    /// 内部 bean 的合并定义，不进入缓存
    pub(crate) fn merged_inner_definition(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        containing: &RootBeanDefinition,
    ) -> BeansResult<Arc<RootBeanDefinition>> {
        self.merge_bean_definition(bean_name, definition, Some(containing))
    }

    fn merge_bean_definition(
        &self,
        bean_name: &str,
        definition: &BeanDefinition,
        containing: Option<&RootBeanDefinition>,
    ) -> BeansResult<Arc<RootBeanDefinition>> {
        let _guard = self.merge_lock.lock();

        let previous = if containing.is_none() {
            self.merged.get(bean_name)
        } else {
            None
        };
        if let Some(previous) = &previous {
            if !previous.is_stale() {
                return Ok(Arc::clone(previous));
            }
        }

        let parent = match &definition.parent_name {
            None => None,
            Some(parent_name) => Some(self.resolve_parent_definition(bean_name, parent_name)?),
        };

        let mbd = Arc::new(RootBeanDefinition::new(merge_definitions(
            definition,
            parent.as_ref().map(|p| p.definition()),
            containing,
        )));
        if let Some(previous) = previous {
            mbd.copy_relevant_caches_from(&previous);
        }

        let cache = self.settings.read().cache_bean_metadata || self.has_already_created(bean_name);
        if containing.is_none() && cache {
            self.merged.insert(bean_name, Arc::clone(&mbd));
        }
        tracing::trace!("Merged bean definition for '{}'", bean_name);
        Ok(mbd)
    }

    fn resolve_parent_definition(&self, bean_name: &str, parent_name: &str) -> BeansResult<Arc<RootBeanDefinition>> {
        let parent_bean_name = self.transformed_bean_name(parent_name);
        let result = if parent_bean_name != bean_name {
            self.get_merged_bean_definition(&parent_bean_name)
        } else {
            match self.parent_bean_factory() {
                Some(parent) => parent.get_merged_bean_definition(&parent_bean_name),
                None => {
                    return Err(BeansError::BeanDefinitionStore {
                        bean_name: bean_name.to_string(),
                        message: format!(
                            "Parent name '{}' is equal to bean name '{}': cannot be resolved without a parent BeanFactory",
                            parent_bean_name, bean_name
                        ),
                    })
                }
            }
        };
        result.map_err(|e| {
            if e.is_no_such_bean() {
                BeansError::BeanDefinitionStore {
                    bean_name: bean_name.to_string(),
                    message: format!("Could not resolve parent bean definition '{}'", parent_name),
                }
            } else {
                e
            }
        })
    }
}

impl BeanDefinitionRegistry for DefaultListableBeanFactory {
    fn register_bean_definition(&self, name: &str, definition: BeanDefinition) -> BeansResult<()> {
        definition.validate(name)?;

        let existed = {
            let allow_overriding = self.settings.read().allow_bean_definition_overriding;
            let mut table = self.definitions.write();
            match table.definitions.get(name) {
                Some(existing) => {
                    if !allow_overriding {
                        return Err(BeansError::BeanDefinitionStore {
                            bean_name: name.to_string(),
                            message: format!(
                                "Cannot register bean definition for bean '{}' since there is already one bound",
                                name
                            ),
                        });
                    }
                    if existing != &definition {
                        tracing::debug!("Overriding bean definition for bean '{}' with a different definition", name);
                    } else {
                        tracing::trace!("Overriding bean definition for bean '{}' with an equivalent definition", name);
                    }
                    table.definitions.insert(name.to_string(), definition);
                    true
                }
                None => {
                    if self.aliases.read().contains_key(name) {
                        if !allow_overriding {
                            return Err(BeansError::BeanDefinitionStore {
                                bean_name: name.to_string(),
                                message: format!("Cannot register bean definition '{}': name is already an alias", name),
                            });
                        }
                        tracing::debug!("Removing alias '{}' for bean definition with the same name", name);
                        self.aliases.write().remove(name);
                    }
                    table.definitions.insert(name.to_string(), definition);
                    table.names.push(name.to_string());
                    table.manual_singletons.retain(|n| n != name);
                    false
                }
            }
        };

        if existed || self.singletons.contains_singleton(name) {
            self.reset_bean_definition(name);
        }
        tracing::debug!("Registered bean definition '{}'", name);
        Ok(())
    }

    fn remove_bean_definition(&self, name: &str) -> BeansResult<()> {
        {
            let mut table = self.definitions.write();
            if table.definitions.remove(name).is_none() {
                tracing::trace!("No bean named '{}' found in {:?}", name, table.names);
                return Err(BeansError::no_such_bean(name));
            }
            table.names.retain(|n| n != name);
        }
        self.reset_bean_definition(name);
        self.merged.remove(name);
        tracing::debug!("Removed bean definition '{}'", name);
        Ok(())
    }

    fn get_bean_definition(&self, name: &str) -> BeansResult<BeanDefinition> {
        self.raw_definition(&self.canonical_name(name))
    }

    fn modify_bean_definition(&self, name: &str, modifier: &mut dyn FnMut(&mut BeanDefinition)) -> BeansResult<()> {
        let bean_name = self.canonical_name(name);
        {
            let mut table = self.definitions.write();
            let definition = table
                .definitions
                .get_mut(&bean_name)
                .ok_or_else(|| BeansError::no_such_bean(&bean_name))?;
            modifier(definition);
        }
        self.merged.mark_stale(&bean_name);
        tracing::debug!("Bean definition '{}' modified", bean_name);
        Ok(())
    }

    fn contains_bean_definition(&self, name: &str) -> bool {
        self.definitions.read().definitions.contains_key(name)
    }

    fn get_bean_definition_names(&self) -> Vec<String> {
        self.definitions.read().names.clone()
    }

    fn get_bean_definition_count(&self) -> usize {
        self.definitions.read().definitions.len()
    }

    fn register_alias(&self, name: &str, alias: &str) -> BeansResult<()> {
        let mut aliases = self.aliases.write();
        if alias == name {
            aliases.remove(alias);
            tracing::debug!("Alias definition '{}' ignored since it points to same name", alias);
            return Ok(());
        }
        if let Some(registered) = aliases.get(alias) {
            if registered == name {
                return Ok(());
            }
            if !self.settings.read().allow_bean_definition_overriding {
                return Err(BeansError::illegal_state(format!(
                    "Cannot define alias '{}' for name '{}': It is already registered for name '{}'",
                    alias, name, registered
                )));
            }
            tracing::debug!("Overriding alias '{}' definition for registered name '{}' with new target name '{}'", alias, registered, name);
        }
        if Self::has_alias(&aliases, alias, name) {
            return Err(BeansError::illegal_state(format!(
                "Cannot register alias '{}' for name '{}': Circular reference - '{}' is a direct or indirect alias for '{}' already",
                alias, name, name, alias
            )));
        }
        aliases.insert(alias.to_string(), name.to_string());
        tracing::trace!("Alias definition '{}' registered for name '{}'", alias, name);
        Ok(())
    }

    fn remove_alias(&self, alias: &str) -> BeansResult<()> {
        self.aliases
            .write()
            .remove(alias)
            .map(|_| ())
            .ok_or_else(|| BeansError::illegal_state(format!("No alias '{}' registered", alias)))
    }

    fn is_alias(&self, name: &str) -> bool {
        self.aliases.read().contains_key(name)
    }

    fn is_bean_name_in_use(&self, name: &str) -> bool {
        self.is_alias(name) || self.contains_bean_definition(name) || self.singletons.has_dependent_bean(name)
    }

    fn register_class(&self, class: Arc<BeanClass>) {
        self.classes.write().insert(class.name().to_string(), class);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class::classes;
    use crate::settings::ContainerSettings;

    #[test]
    fn test_alias_chain_resolves_to_canonical_name() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition("dataSource", BeanDefinition::of_class(&classes::string()))
            .unwrap();
        factory.register_alias("dataSource", "ds").unwrap();
        factory.register_alias("ds", "primaryDs").unwrap();

        assert_eq!(factory.canonical_name("primaryDs"), "dataSource");
        assert_eq!(factory.transformed_bean_name("&primaryDs"), "dataSource");
        assert_eq!(factory.aliases_of("dataSource"), vec!["ds", "primaryDs"]);
        assert!(factory.is_bean_name_in_use("ds"));
    }

    #[test]
    fn test_alias_cycle_rejected() {
        let factory = DefaultListableBeanFactory::new();
        factory.register_alias("a", "b").unwrap();
        factory.register_alias("b", "c").unwrap();
        let err = factory.register_alias("c", "a").unwrap_err();
        assert!(err.to_string().contains("Circular reference"));
    }

    #[test]
    fn test_overriding_disallowed() {
        let factory = DefaultListableBeanFactory::with_settings(ContainerSettings {
            allow_bean_definition_overriding: false,
            ..ContainerSettings::default()
        });
        factory
            .register_bean_definition("a", BeanDefinition::of_class(&classes::string()))
            .unwrap();
        let err = factory
            .register_bean_definition("a", BeanDefinition::of_class(&classes::i32()))
            .unwrap_err();
        assert!(matches!(err, BeansError::BeanDefinitionStore { .. }));
    }

    #[test]
    fn test_registration_order_preserved() {
        let factory = DefaultListableBeanFactory::new();
        for name in ["c", "a", "b"] {
            factory
                .register_bean_definition(name, BeanDefinition::of_class(&classes::string()))
                .unwrap();
        }
        factory
            .register_bean_definition("a", BeanDefinition::of_class(&classes::string()).with_primary(true))
            .unwrap();
        assert_eq!(factory.get_bean_definition_names(), vec!["c", "a", "b"]);

        factory.remove_bean_definition("a").unwrap();
        assert_eq!(factory.get_bean_definition_names(), vec!["c", "b"]);
        assert!(factory.remove_bean_definition("a").unwrap_err().is_no_such_bean());
    }

    #[test]
    fn test_self_named_parent_without_parent_factory() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition("service", BeanDefinition::child_of("service"))
            .unwrap();
        let err = factory.get_merged_bean_definition("service").unwrap_err();
        assert!(matches!(err, BeansError::BeanDefinitionStore { .. }));
    }

    #[test]
    fn test_merged_definition_cached_until_modified() {
        let factory = DefaultListableBeanFactory::new();
        factory
            .register_bean_definition("a", BeanDefinition::of_class(&classes::string()))
            .unwrap();
        let first = factory.get_merged_bean_definition("a").unwrap();
        let second = factory.get_merged_bean_definition("a").unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        factory
            .modify_bean_definition("a", &mut |def: &mut BeanDefinition| def.lazy_init = Some(true))
            .unwrap();
        assert!(first.is_stale());
        let third = factory.get_merged_bean_definition("a").unwrap();
        assert!(third.is_lazy_init());
    }
}
