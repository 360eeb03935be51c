//! 自定义作用域
//!
//! `singleton` 和 `prototype` 由容器直接处理；其他作用域按名称注册 [`Scope`] 实现，
//! 容器把创建回调交给作用域，由作用域决定复用还是新建。

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::BeansResult;
use crate::object::BeanObject;

/// 作用域创建对象时调用的工厂
pub type ObjectFactory<'a> = &'a mut dyn FnMut() -> BeansResult<BeanObject>;

/// 自定义作用域
pub trait Scope: Send + Sync {
    /// 返回作用域中的对象，不存在时用 `factory` 创建
    ///
    /// 作用域当前不可用时返回错误，容器会包装成 `ScopeInactive`。
    fn get(&self, name: &str, factory: ObjectFactory<'_>) -> anyhow::Result<BeanObject>;

    fn remove(&self, name: &str) -> Option<BeanObject>;

    /// 作用域结束时需要执行的销毁回调
    fn register_destruction_callback(&self, name: &str, callback: Box<dyn FnOnce() + Send>);

    fn conversation_id(&self) -> Option<String> {
        None
    }
}

static NEXT_SCOPE_ID: AtomicUsize = AtomicUsize::new(0);

thread_local! {
    /// (作用域实例, bean 名称) -> 对象
    static THREAD_SCOPE: RefCell<HashMap<(usize, String), BeanObject>> = RefCell::new(HashMap::new());
}

/// 每个线程一份实例
///
/// 每个 `ThreadScope` 实例有独立的对象表，注册到不同工厂的实例互不可见。
/// 不支持销毁回调：线程结束时对象随线程本地存储一起释放。
#[derive(Debug)]
pub struct ThreadScope {
    id: usize,
}

impl ThreadScope {
    pub fn new() -> Self {
        Self {
            id: NEXT_SCOPE_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    fn key(&self, name: &str) -> (usize, String) {
        (self.id, name.to_string())
    }
}

impl Default for ThreadScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Scope for ThreadScope {
    fn get(&self, name: &str, factory: ObjectFactory<'_>) -> anyhow::Result<BeanObject> {
        let key = self.key(name);
        if let Some(existing) = THREAD_SCOPE.with(|scope| scope.borrow().get(&key).cloned()) {
            return Ok(existing);
        }
        // 创建过程可能再次进入作用域，不能持有借用
        let created = factory()?;
        THREAD_SCOPE.with(|scope| {
            scope.borrow_mut().insert(key, created.clone());
        });
        Ok(created)
    }

    fn remove(&self, name: &str) -> Option<BeanObject> {
        let key = self.key(name);
        THREAD_SCOPE.with(|scope| scope.borrow_mut().remove(&key))
    }

    fn register_destruction_callback(&self, name: &str, _callback: Box<dyn FnOnce() + Send>) {
        tracing::warn!(
            "ThreadScope does not support destruction callbacks; consider a custom scope for '{}'",
            name
        );
    }

    fn conversation_id(&self) -> Option<String> {
        Some(format!("{:?}", std::thread::current().id()))
    }
}
