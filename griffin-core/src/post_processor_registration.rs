//! 后置处理器的调用与注册
//!
//! 容器启动时执行一次，顺序固定：
//! 1. 手动添加的注册后置处理器立即修改注册表
//! 2. 容器中发现的注册后置处理器按 优先 / 有序 / 无序 三档执行，
//!    每档之后重新扫描新出现的处理器
//! 3. 所有注册后置处理器的工厂钩子，随后是手动添加的普通工厂后置处理器
//! 4. 其余工厂后置处理器按三档执行
//! 5. bean 后置处理器按三档注册到工厂，合并定义处理器最后再注册一次
//!
//! 任意处理器失败都会中止启动。

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use crate::bean_factory::{
    BeanDefinitionRegistry, BeanFactory, ConfigurableBeanFactory, ConfigurableListableBeanFactory,
    DefaultListableBeanFactory, ListableBeanFactory,
};
use crate::class::Capability;
use crate::definition::Role;
use crate::error::{BeansError, BeansResult};
use crate::lifecycle::sort_by_order;
use crate::object::BeanObject;
use crate::processor::{BeanDefinitionRegistryPostProcessor, BeanFactoryPostProcessor, BeanPostProcessor};

/// 处理器所在的档位
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tier {
    PriorityOrdered,
    Ordered,
    Unordered,
}

fn tier_of(factory: &DefaultListableBeanFactory, name: &str) -> BeansResult<Tier> {
    Ok(match factory.get_type(name)? {
        Some(class) if class.has_capability(Capability::PriorityOrdered) => Tier::PriorityOrdered,
        Some(class) if class.has_capability(Capability::Ordered) => Tier::Ordered,
        _ => Tier::Unordered,
    })
}

fn order_of(bean: &BeanObject) -> Option<i32> {
    bean.as_ordered().map(|ordered| ordered.order())
}

fn not_a_processor(name: &str, kind: &str) -> BeansError {
    BeansError::illegal_state(format!("Bean '{}' was expected to be a {}", name, kind))
}

fn fetch_registry_processor(
    factory: &DefaultListableBeanFactory,
    name: &str,
) -> BeansResult<(Arc<dyn BeanDefinitionRegistryPostProcessor>, Option<i32>)> {
    let bean = factory.get_bean(name)?;
    let processor = bean
        .as_registry_post_processor()
        .ok_or_else(|| not_a_processor(name, "BeanDefinitionRegistryPostProcessor"))?;
    Ok((processor, order_of(&bean)))
}

fn fetch_factory_processor(
    factory: &DefaultListableBeanFactory,
    name: &str,
) -> BeansResult<(Arc<dyn BeanFactoryPostProcessor>, Option<i32>)> {
    let bean = factory.get_bean(name)?;
    let processor = bean
        .as_bean_factory_post_processor()
        .ok_or_else(|| not_a_processor(name, "BeanFactoryPostProcessor"))?;
    Ok((processor, order_of(&bean)))
}

fn invoke_registry_processors(
    processors: &[(Arc<dyn BeanDefinitionRegistryPostProcessor>, Option<i32>)],
    registry: &dyn BeanDefinitionRegistry,
) -> BeansResult<()> {
    for (processor, _) in processors {
        processor.post_process_bean_definition_registry(registry)?;
    }
    Ok(())
}

fn invoke_factory_processors(
    processors: &[(Arc<dyn BeanFactoryPostProcessor>, Option<i32>)],
    factory: &DefaultListableBeanFactory,
) -> BeansResult<()> {
    for (processor, _) in processors {
        processor.post_process_bean_factory(factory)?;
    }
    Ok(())
}

/// 执行工厂后置处理器，`programmatic` 是手动添加到上下文的处理器，按添加顺序执行
pub fn invoke_bean_factory_post_processors(
    factory: &Arc<DefaultListableBeanFactory>,
    programmatic: &[Arc<dyn BeanFactoryPostProcessor>],
) -> BeansResult<()> {
    let registry: &dyn BeanDefinitionRegistry = factory.as_ref();
    let mut processed: HashSet<String> = HashSet::new();
    let mut registry_processors: Vec<Arc<dyn BeanDefinitionRegistryPostProcessor>> = Vec::new();
    let mut regular_processors: Vec<Arc<dyn BeanFactoryPostProcessor>> = Vec::new();

    for processor in programmatic {
        match Arc::clone(processor).as_registry_post_processor() {
            Some(registry_processor) => {
                registry_processor.post_process_bean_definition_registry(registry)?;
                registry_processors.push(registry_processor);
            }
            None => regular_processors.push(Arc::clone(processor)),
        }
    }

    let discover = |tier: Option<Tier>, processed: &HashSet<String>| -> BeansResult<Vec<String>> {
        let mut names = Vec::new();
        for name in factory.get_bean_names_for_capability(Capability::BeanDefinitionRegistryPostProcessor, true, false) {
            if processed.contains(&name) {
                continue;
            }
            match tier {
                Some(tier) if tier_of(factory, &name)? != tier => {}
                _ => names.push(name),
            }
        }
        Ok(names)
    };

    for tier in [Tier::PriorityOrdered, Tier::Ordered] {
        let names = discover(Some(tier), &processed)?;
        let mut current = Vec::with_capacity(names.len());
        for name in names {
            current.push(fetch_registry_processor(factory, &name)?);
            processed.insert(name);
        }
        sort_by_order(&mut current);
        tracing::debug!("Invoking {} {:?} registry post-processor(s)", current.len(), tier);
        invoke_registry_processors(&current, registry)?;
        registry_processors.extend(current.into_iter().map(|(p, _)| p));
    }

    // 前面的处理器可能注册了新的处理器，直到没有新的出现为止
    let max_passes = factory.settings().max_registry_post_processor_passes;
    let mut passes = 0;
    loop {
        let names = discover(None, &processed)?;
        if names.is_empty() {
            break;
        }
        passes += 1;
        if passes > max_passes {
            return Err(BeansError::illegal_state(format!(
                "Registry post-processors kept registering new ones after {} passes: {}",
                max_passes,
                names.join(", ")
            )));
        }
        let mut current = Vec::with_capacity(names.len());
        for name in names {
            current.push(fetch_registry_processor(factory, &name)?);
            processed.insert(name);
        }
        sort_by_order(&mut current);
        tracing::debug!("Invoking {} registry post-processor(s) in pass {}", current.len(), passes);
        invoke_registry_processors(&current, registry)?;
        registry_processors.extend(current.into_iter().map(|(p, _)| p));
    }

    for processor in &registry_processors {
        processor.post_process_bean_factory(factory)?;
    }
    for processor in &regular_processors {
        processor.post_process_bean_factory(factory)?;
    }

    let names = factory.get_bean_names_for_capability(Capability::BeanFactoryPostProcessor, true, false);
    let mut priority = Vec::new();
    let mut ordered_names = Vec::new();
    let mut unordered_names = Vec::new();
    for name in names {
        if processed.contains(&name) {
            continue;
        }
        match tier_of(factory, &name)? {
            // 优先档在分档时就创建，其余延迟到前一档执行完
            Tier::PriorityOrdered => priority.push(fetch_factory_processor(factory, &name)?),
            Tier::Ordered => ordered_names.push(name),
            Tier::Unordered => unordered_names.push(name),
        }
    }

    sort_by_order(&mut priority);
    invoke_factory_processors(&priority, factory)?;

    let mut ordered = ordered_names
        .iter()
        .map(|name| fetch_factory_processor(factory, name))
        .collect::<BeansResult<Vec<_>>>()?;
    sort_by_order(&mut ordered);
    invoke_factory_processors(&ordered, factory)?;

    let unordered = unordered_names
        .iter()
        .map(|name| fetch_factory_processor(factory, name))
        .collect::<BeansResult<Vec<_>>>()?;
    invoke_factory_processors(&unordered, factory)?;

    tracing::info!(
        "Invoked {} bean factory post-processor(s)",
        registry_processors.len() + regular_processors.len() + priority.len() + ordered.len() + unordered.len()
    );

    // 处理器可能修改了定义
    factory.clear_metadata_cache();
    Ok(())
}

/// 注册容器中发现的 bean 后置处理器
pub fn register_bean_post_processors(factory: &Arc<DefaultListableBeanFactory>) -> BeansResult<()> {
    let names = factory.get_bean_names_for_capability(Capability::BeanPostProcessor, true, false);

    let target_count = factory.get_bean_post_processor_count() + 1 + names.len();
    factory.add_bean_post_processor(Arc::new(BeanPostProcessorChecker::new(factory, target_count)));

    let fetch = |name: &str| -> BeansResult<(Arc<dyn BeanPostProcessor>, Option<i32>)> {
        let bean = factory.get_bean(name)?;
        let processor = bean
            .as_bean_post_processor()
            .ok_or_else(|| not_a_processor(name, "BeanPostProcessor"))?;
        Ok((processor, order_of(&bean)))
    };
    let is_internal = |processor: &Arc<dyn BeanPostProcessor>| Arc::clone(processor).as_merged_definition_processor().is_some();

    let mut priority = Vec::new();
    let mut internal = Vec::new();
    let mut ordered_names = Vec::new();
    let mut unordered_names = Vec::new();
    for name in names {
        match tier_of(factory, &name)? {
            Tier::PriorityOrdered => {
                let entry = fetch(&name)?;
                if is_internal(&entry.0) {
                    internal.push(entry.clone());
                }
                priority.push(entry);
            }
            Tier::Ordered => ordered_names.push(name),
            Tier::Unordered => unordered_names.push(name),
        }
    }

    sort_by_order(&mut priority);
    register(factory, &priority);

    let mut ordered = Vec::with_capacity(ordered_names.len());
    for name in &ordered_names {
        let entry = fetch(name)?;
        if is_internal(&entry.0) {
            internal.push(entry.clone());
        }
        ordered.push(entry);
    }
    sort_by_order(&mut ordered);
    register(factory, &ordered);

    let mut unordered = Vec::with_capacity(unordered_names.len());
    for name in &unordered_names {
        let entry = fetch(name)?;
        if is_internal(&entry.0) {
            internal.push(entry.clone());
        }
        unordered.push(entry);
    }
    register(factory, &unordered);

    // 重新添加会移到列表末尾
    sort_by_order(&mut internal);
    register(factory, &internal);

    tracing::info!(
        "Registered {} bean post-processor(s)",
        priority.len() + ordered.len() + unordered.len()
    );
    Ok(())
}

fn register(factory: &DefaultListableBeanFactory, processors: &[(Arc<dyn BeanPostProcessor>, Option<i32>)]) {
    for (processor, _) in processors {
        factory.add_bean_post_processor(Arc::clone(processor));
    }
}

/// 在后置处理器注册期间创建的 bean 拿不到全部处理器，记录一条日志
struct BeanPostProcessorChecker {
    factory: Weak<DefaultListableBeanFactory>,
    target_count: usize,
}

impl BeanPostProcessorChecker {
    fn new(factory: &Arc<DefaultListableBeanFactory>, target_count: usize) -> Self {
        Self {
            factory: Arc::downgrade(factory),
            target_count,
        }
    }

    fn is_infrastructure(factory: &DefaultListableBeanFactory, bean_name: &str) -> bool {
        factory.contains_bean_definition(bean_name)
            && factory
                .get_merged_bean_definition(bean_name)
                .map_or(false, |mbd| mbd.definition().role == Role::Infrastructure)
    }
}

impl BeanPostProcessor for BeanPostProcessorChecker {
    fn post_process_after_initialization(&self, bean: BeanObject, bean_name: &str) -> BeansResult<Option<BeanObject>> {
        let Some(factory) = self.factory.upgrade() else {
            return Ok(Some(bean));
        };
        if bean.as_bean_post_processor().is_none()
            && !Self::is_infrastructure(&factory, bean_name)
            && factory.get_bean_post_processor_count() < self.target_count
        {
            tracing::info!(
                "Bean '{}' of type [{}] is not eligible for getting processed by all BeanPostProcessors \
                 (for example: not eligible for auto-proxying)",
                bean_name,
                bean.class_name()
            );
        }
        Ok(Some(bean))
    }
}
