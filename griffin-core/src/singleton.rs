//! 单例注册表
//!
//! 每个单例名称对应一个状态：
//!
//! ```text
//! (无) -> Factory -> Promoting -> Early -> Finished
//!    \___________________________________/
//! ```
//!
//! `Factory` 保存产生早期引用的回调；循环依赖真正请求该 bean 时，回调在锁外
//! 被取出执行且只执行一次，结果进入 `Early`。创建完成后进入 `Finished`。
//! 所有状态由一把注册表锁保护。单例的创建过程由一把可重入的创建锁串行化：
//! 同一线程内的嵌套创建（包括循环引用）可以重入，其他线程在创建锁上等待，
//! 因此两个线程各自从循环的一端开始创建时不会互相等待。只有持有创建锁的线程
//! 可以拿到早期引用。

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::thread::{self, ThreadId};

use parking_lot::{Mutex, ReentrantMutex};

use crate::error::{BeansError, BeansResult};
use crate::object::BeanObject;

/// 产生早期引用的回调
pub type EarlyReferenceFactory = Box<dyn FnOnce() -> BeansResult<BeanObject> + Send>;

/// 注册到注册表中的销毁回调
pub trait DisposableCallback: Send + Sync {
    fn destroy(&self);
}

enum SingletonSlot {
    Factory(EarlyReferenceFactory),
    Promoting,
    Early(BeanObject),
    Finished(BeanObject),
}

#[derive(Default)]
struct SingletonTable {
    slots: HashMap<String, SingletonSlot>,
    /// 已注册单例的顺序
    registered: Vec<String>,
    in_creation: HashMap<String, ThreadId>,
    in_creation_check_exclusions: HashSet<String>,
    destruction_in_progress: bool,
    disposable: Vec<(String, Arc<dyn DisposableCallback>)>,
    /// 外层 bean -> 内部 bean
    contained: HashMap<String, Vec<String>>,
    /// bean -> 依赖它的 bean
    dependents: HashMap<String, Vec<String>>,
    /// bean -> 它依赖的 bean
    dependencies: HashMap<String, Vec<String>>,
}

impl SingletonTable {
    fn finish(&mut self, name: &str, object: BeanObject) {
        self.slots.insert(name.to_string(), SingletonSlot::Finished(object));
        if !self.registered.iter().any(|n| n == name) {
            self.registered.push(name.to_string());
        }
    }

    fn remove(&mut self, name: &str) {
        self.slots.remove(name);
        self.registered.retain(|n| n != name);
    }
}

/// 三级单例缓存以及依赖关系、销毁回调
#[derive(Default)]
pub struct SingletonRegistry {
    table: Mutex<SingletonTable>,
    /// 单例创建锁，同一线程可重入
    creation_lock: ReentrantMutex<()>,
}

/// 离开作用域时清除"正在创建"标记
struct CreationGuard<'a> {
    registry: &'a SingletonRegistry,
    name: &'a str,
    tracked: bool,
}

impl Drop for CreationGuard<'_> {
    fn drop(&mut self) {
        if self.tracked {
            self.registry.table.lock().in_creation.remove(self.name);
        }
    }
}

impl SingletonRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册外部创建的单例，名称已被占用时报错
    pub fn register_singleton(&self, name: &str, object: BeanObject) -> BeansResult<()> {
        let mut table = self.table.lock();
        if let Some(SingletonSlot::Finished(existing)) = table.slots.get(name) {
            return Err(BeansError::illegal_state(format!(
                "Could not register object [{:?}] under bean name '{}': there is already object [{:?}] bound",
                object, name, existing
            )));
        }
        table.finish(name, object);
        Ok(())
    }

    pub fn add_singleton(&self, name: &str, object: BeanObject) {
        self.table.lock().finish(name, object);
    }

    /// 注册早期引用回调；单例已完成时忽略
    pub fn add_singleton_factory(&self, name: &str, factory: EarlyReferenceFactory) {
        let mut table = self.table.lock();
        if matches!(table.slots.get(name), Some(SingletonSlot::Finished(_))) {
            return;
        }
        table.slots.insert(name.to_string(), SingletonSlot::Factory(factory));
        if !table.registered.iter().any(|n| n == name) {
            table.registered.push(name.to_string());
        }
    }

    /// 查找单例
    ///
    /// 完成的单例和已经产生的早期引用总是可见；`allow_early_reference` 为真且当前线程
    /// 正在创建该单例时，会执行早期引用回调（至多一次）。
    pub fn get_singleton(&self, name: &str, allow_early_reference: bool) -> BeansResult<Option<BeanObject>> {
        let mut table = self.table.lock();
        let factory = match table.slots.get(name) {
            None | Some(SingletonSlot::Promoting) => return Ok(None),
            Some(SingletonSlot::Finished(object)) | Some(SingletonSlot::Early(object)) => {
                return Ok(Some(object.clone()))
            }
            Some(SingletonSlot::Factory(_)) => {
                let owned_by_current = table.in_creation.get(name) == Some(&thread::current().id());
                if !allow_early_reference || !owned_by_current {
                    return Ok(None);
                }
                match table.slots.insert(name.to_string(), SingletonSlot::Promoting) {
                    Some(SingletonSlot::Factory(factory)) => factory,
                    _ => return Ok(None),
                }
            }
        };
        drop(table);

        tracing::trace!("Creating early reference for singleton bean '{}'", name);
        let result = factory();

        let mut table = self.table.lock();
        match result {
            Ok(early) => {
                if matches!(table.slots.get(name), Some(SingletonSlot::Promoting)) {
                    table.slots.insert(name.to_string(), SingletonSlot::Early(early.clone()));
                }
                Ok(Some(early))
            }
            Err(e) => {
                if matches!(table.slots.get(name), Some(SingletonSlot::Promoting)) {
                    table.slots.remove(name);
                }
                Err(e)
            }
        }
    }

    /// 返回已完成的单例，不存在时在当前线程调用 `create` 创建
    ///
    /// 同一线程重入同一名称说明存在无法解决的循环依赖；其他线程正在创建单例时，
    /// 在创建锁上等待它完成整个创建过程。
    pub fn get_or_create<F>(&self, name: &str, create: F) -> BeansResult<BeanObject>
    where
        F: FnOnce() -> BeansResult<BeanObject>,
    {
        if let Some(SingletonSlot::Finished(object)) = self.table.lock().slots.get(name) {
            return Ok(object.clone());
        }

        let _creating = self.creation_lock.lock();
        let tracked;
        {
            let mut table = self.table.lock();
            if let Some(SingletonSlot::Finished(object)) = table.slots.get(name) {
                return Ok(object.clone());
            }
            if table.destruction_in_progress {
                return Err(BeansError::creation(
                    name,
                    "Singleton bean creation not allowed while singletons of this factory are in destruction",
                ));
            }
            // 持有创建锁时，正在创建的名称都属于当前线程
            if table.in_creation.contains_key(name) {
                return Err(BeansError::CurrentlyInCreation {
                    bean_name: name.to_string(),
                });
            }
            tracked = !table.in_creation_check_exclusions.contains(name);
            if tracked {
                table.in_creation.insert(name.to_string(), thread::current().id());
            }
        }

        tracing::trace!("Creating shared instance of singleton bean '{}'", name);
        let guard = CreationGuard {
            registry: self,
            name,
            tracked,
        };
        let result = create();

        let outcome = {
            let mut table = self.table.lock();
            match result {
                Ok(object) => {
                    table.finish(name, object.clone());
                    Ok(object)
                }
                // 创建期间可能已经以其他方式注册
                Err(e) => match table.slots.get(name) {
                    Some(SingletonSlot::Finished(object)) => Ok(object.clone()),
                    _ => Err(e),
                },
            }
        };
        drop(guard);
        outcome
    }

    pub fn contains_singleton(&self, name: &str) -> bool {
        matches!(self.table.lock().slots.get(name), Some(SingletonSlot::Finished(_)))
    }

    pub fn remove_singleton(&self, name: &str) {
        self.table.lock().remove(name);
    }

    pub fn singleton_names(&self) -> Vec<String> {
        let table = self.table.lock();
        table
            .registered
            .iter()
            .filter(|name| matches!(table.slots.get(name.as_str()), Some(SingletonSlot::Finished(_))))
            .cloned()
            .collect()
    }

    pub fn singleton_count(&self) -> usize {
        self.singleton_names().len()
    }

    /// 任意线程是否正在创建该单例
    pub fn is_currently_in_creation(&self, name: &str) -> bool {
        self.table.lock().in_creation.contains_key(name)
    }

    pub fn set_currently_in_creation(&self, name: &str, in_creation: bool) {
        let mut table = self.table.lock();
        if in_creation {
            table.in_creation_check_exclusions.remove(name);
        } else {
            table.in_creation_check_exclusions.insert(name.to_string());
        }
    }

    pub fn register_disposable_bean(&self, name: &str, callback: Arc<dyn DisposableCallback>) {
        let mut table = self.table.lock();
        table.disposable.retain(|(n, _)| n != name);
        table.disposable.push((name.to_string(), callback));
    }

    pub fn has_disposable_bean(&self, name: &str) -> bool {
        self.table.lock().disposable.iter().any(|(n, _)| n == name)
    }

    /// 内部 bean 随外层 bean 一起销毁
    pub fn register_contained_bean(&self, contained: &str, containing: &str) {
        {
            let mut table = self.table.lock();
            let entry = table.contained.entry(containing.to_string()).or_default();
            if entry.iter().any(|n| n == contained) {
                return;
            }
            entry.push(contained.to_string());
        }
        self.register_dependent_bean(contained, containing);
    }

    /// 记录 `dependent` 依赖 `bean_name`：销毁 `bean_name` 前先销毁 `dependent`
    pub fn register_dependent_bean(&self, bean_name: &str, dependent: &str) {
        let mut table = self.table.lock();
        let dependents = table.dependents.entry(bean_name.to_string()).or_default();
        if dependents.iter().any(|n| n == dependent) {
            return;
        }
        dependents.push(dependent.to_string());
        let dependencies = table.dependencies.entry(dependent.to_string()).or_default();
        if !dependencies.iter().any(|n| n == bean_name) {
            dependencies.push(bean_name.to_string());
        }
    }

    /// `dependent` 是否直接或间接依赖 `bean_name`
    pub fn is_dependent(&self, bean_name: &str, dependent: &str) -> bool {
        let table = self.table.lock();
        let mut seen = HashSet::new();
        Self::is_dependent_in(&table, bean_name, dependent, &mut seen)
    }

    fn is_dependent_in(table: &SingletonTable, bean_name: &str, dependent: &str, seen: &mut HashSet<String>) -> bool {
        if !seen.insert(bean_name.to_string()) {
            return false;
        }
        let Some(dependents) = table.dependents.get(bean_name) else {
            return false;
        };
        if dependents.iter().any(|n| n == dependent) {
            return true;
        }
        dependents
            .iter()
            .any(|transitive| Self::is_dependent_in(table, transitive, dependent, seen))
    }

    pub fn has_dependent_bean(&self, bean_name: &str) -> bool {
        self.table
            .lock()
            .dependents
            .get(bean_name)
            .is_some_and(|d| !d.is_empty())
    }

    pub fn dependent_beans(&self, bean_name: &str) -> Vec<String> {
        self.table.lock().dependents.get(bean_name).cloned().unwrap_or_default()
    }

    pub fn dependencies_for_bean(&self, bean_name: &str) -> Vec<String> {
        self.table.lock().dependencies.get(bean_name).cloned().unwrap_or_default()
    }

    /// 按注册顺序的逆序销毁所有单例
    pub fn destroy_singletons(&self) {
        let names: Vec<String> = {
            let mut table = self.table.lock();
            table.destruction_in_progress = true;
            table.disposable.iter().rev().map(|(n, _)| n.clone()).collect()
        };
        tracing::debug!("Destroying singletons: {:?}", names);
        for name in names {
            self.destroy_singleton(&name);
        }

        let mut table = self.table.lock();
        table.contained.clear();
        table.dependents.clear();
        table.dependencies.clear();
        table.slots.clear();
        table.registered.clear();
        table.destruction_in_progress = false;
    }

    /// 移除单例并执行它的销毁回调（先销毁依赖它的 bean）
    pub fn destroy_singleton(&self, name: &str) {
        let disposable = {
            let mut table = self.table.lock();
            table.remove(name);
            let position = table.disposable.iter().position(|(n, _)| n == name);
            position.map(|p| table.disposable.remove(p).1)
        };
        self.destroy_bean(name, disposable);
    }

    fn destroy_bean(&self, name: &str, disposable: Option<Arc<dyn DisposableCallback>>) {
        let dependents = self.table.lock().dependents.remove(name).unwrap_or_default();
        if !dependents.is_empty() {
            tracing::trace!("Retrieved dependent beans for bean '{}': {:?}", name, dependents);
        }
        for dependent in dependents {
            self.destroy_singleton(&dependent);
        }

        if let Some(disposable) = disposable {
            disposable.destroy();
        }

        let contained = self.table.lock().contained.remove(name).unwrap_or_default();
        for inner in contained {
            self.destroy_singleton(&inner);
        }

        let mut table = self.table.lock();
        table.dependents.retain(|_, dependents| {
            dependents.retain(|d| d != name);
            !dependents.is_empty()
        });
        table.dependencies.remove(name);
    }
}
