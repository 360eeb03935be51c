use std::any::Any;
use std::sync::{Arc, OnceLock};
use std::time::SystemTime;

use parking_lot::RwLock;

use crate::class::BeanClass;

/// 事件 trait - 所有事件都必须实现此 trait
///
/// 类似 Spring 的 ApplicationEvent
pub trait Event: Any + Send + Sync {
    /// 获取事件名称
    fn event_name(&self) -> &str;

    /// 获取事件时间戳
    fn timestamp(&self) -> SystemTime;

    /// 获取事件源（可选）
    /// 返回触发此事件的对象
    fn source(&self) -> Option<Arc<dyn Any + Send + Sync>> {
        None
    }

    /// 转换为 Any 引用，用于类型转换
    fn as_any(&self) -> &dyn Any;
}

/// 上下文刷新完成事件
///
/// 所有非懒加载单例创建完成后发布
#[derive(Debug, Clone)]
pub struct ContextRefreshedEvent {
    /// 上下文名称
    pub context_name: String,
    /// 刷新后容器中的单例数量
    pub singleton_count: usize,
    pub timestamp: SystemTime,
}

impl ContextRefreshedEvent {
    pub fn new(context_name: impl Into<String>, singleton_count: usize) -> Self {
        Self {
            context_name: context_name.into(),
            singleton_count,
            timestamp: SystemTime::now(),
        }
    }
}

impl Event for ContextRefreshedEvent {
    fn event_name(&self) -> &str {
        "ContextRefreshedEvent"
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 上下文关闭事件
///
/// 在销毁单例之前发布，监听器仍然可以访问 bean
#[derive(Debug, Clone)]
pub struct ContextClosedEvent {
    pub context_name: String,
    pub timestamp: SystemTime,
}

impl ContextClosedEvent {
    pub fn new(context_name: impl Into<String>) -> Self {
        Self {
            context_name: context_name.into(),
            timestamp: SystemTime::now(),
        }
    }
}

impl Event for ContextClosedEvent {
    fn event_name(&self) -> &str {
        "ContextClosedEvent"
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 应用启动完成事件
///
/// 由 [`GriffinApplication`](crate::app::GriffinApplication) 在上下文刷新之后发布
#[derive(Debug, Clone)]
pub struct ApplicationStartedEvent {
    /// 应用名称
    pub app_name: String,
    /// 启动耗时（毫秒）
    pub startup_time_ms: u128,
    /// 事件时间戳
    pub timestamp: SystemTime,
}

impl ApplicationStartedEvent {
    pub fn new(app_name: impl Into<String>, startup_time_ms: u128) -> Self {
        Self {
            app_name: app_name.into(),
            startup_time_ms,
            timestamp: SystemTime::now(),
        }
    }
}

impl Event for ApplicationStartedEvent {
    fn event_name(&self) -> &str {
        "ApplicationStartedEvent"
    }

    fn timestamp(&self) -> SystemTime {
        self.timestamp
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// 事件监听器 trait
///
/// 类似 Spring 的 ApplicationListener。作为 bean 注册时需要在 `BeanClass` 上声明
/// `application_listener()`，上下文会自动把它加入多播器。
pub trait ApplicationListener: Send + Sync {
    /// 处理事件
    fn on_event(&self, event: Arc<dyn Event>) -> anyhow::Result<()>;

    /// 获取监听器名称（用于日志）
    fn listener_name(&self) -> &str {
        "AnonymousListener"
    }

    /// 是否支持该事件（默认支持所有事件）
    fn supports_event(&self, event: &dyn Event) -> bool {
        let _ = event;
        true
    }
}

/// 类型化事件监听器 trait
///
/// 提供类型安全的事件处理
pub trait TypedEventListener<E: Event>: Send + Sync {
    /// 处理特定类型的事件
    fn on_event(&self, event: &E) -> anyhow::Result<()>;

    /// 获取监听器名称（用于日志）
    fn listener_name(&self) -> &str {
        "AnonymousTypedListener"
    }
}

/// 类型化事件监听器适配器
///
/// 将 TypedEventListener<E> 适配为 ApplicationListener
pub struct TypedEventListenerAdapter<E: Event + 'static, L: TypedEventListener<E>> {
    listener: Arc<L>,
    _phantom: std::marker::PhantomData<fn(&E)>,
}

impl<E: Event + 'static, L: TypedEventListener<E>> TypedEventListenerAdapter<E, L> {
    pub fn new(listener: Arc<L>) -> Self {
        Self {
            listener,
            _phantom: std::marker::PhantomData,
        }
    }
}

impl<E: Event + 'static, L: TypedEventListener<E> + 'static> ApplicationListener for TypedEventListenerAdapter<E, L> {
    fn on_event(&self, event: Arc<dyn Event>) -> anyhow::Result<()> {
        match event.as_any().downcast_ref::<E>() {
            Some(typed_event) => self.listener.on_event(typed_event),
            None => Ok(()),
        }
    }

    fn listener_name(&self) -> &str {
        self.listener.listener_name()
    }

    fn supports_event(&self, event: &dyn Event) -> bool {
        event.as_any().is::<E>()
    }
}

/// 错误处理器类型
///
/// 处理监听器返回的错误和 panic
pub type ErrorHandler = Arc<dyn Fn(&dyn ApplicationListener, Arc<dyn Event>, &anyhow::Error) + Send + Sync>;

/// 事件多播器 trait
///
/// 类似 Spring 的 ApplicationEventMulticaster
/// 负责将事件传播到所有注册的监听器
pub trait ApplicationEventMulticaster: Send + Sync {
    /// 添加监听器，同一个监听器不会重复添加
    fn add_listener(&self, listener: Arc<dyn ApplicationListener>);

    /// 移除指定的监听器实例
    fn remove_listener(&self, listener: &Arc<dyn ApplicationListener>);

    /// 按名称移除监听器
    fn remove_listener_by_name(&self, listener_name: &str);

    /// 移除所有监听器
    fn remove_all_listeners(&self);

    /// 广播事件到所有支持该事件的监听器
    fn multicast_event(&self, event: Arc<dyn Event>);

    /// 获取监听器数量
    fn listener_count(&self) -> usize;
}

/// 事件发布接口，由 [`ApplicationContext`](crate::context::ApplicationContext) 实现
pub trait ApplicationEventPublisher: Send + Sync {
    fn publish_event(&self, event: Arc<dyn Event>);
}

/// 简单事件多播器实现
///
/// 默认同步执行；异步模式下每个监听器在 tokio 运行时上独立执行
pub struct SimpleApplicationEventMulticaster {
    /// 事件监听器列表
    listeners: RwLock<Vec<Arc<dyn ApplicationListener>>>,
    /// 错误处理器
    error_handler: RwLock<Option<ErrorHandler>>,
    /// 是否异步执行（如果为 true，会spawn到runtime）
    async_mode: bool,
}

/// 多播器的类型描述，用于注册到容器中
pub fn multicaster_class() -> Arc<BeanClass> {
    static CLASS: OnceLock<Arc<BeanClass>> = OnceLock::new();
    Arc::clone(CLASS.get_or_init(|| {
        BeanClass::builder::<SimpleApplicationEventMulticaster>("SimpleApplicationEventMulticaster").build()
    }))
}

fn same_listener(a: &Arc<dyn ApplicationListener>, b: &Arc<dyn ApplicationListener>) -> bool {
    std::ptr::eq(Arc::as_ptr(a) as *const (), Arc::as_ptr(b) as *const ())
}

impl SimpleApplicationEventMulticaster {
    /// 创建同步模式的多播器
    pub fn new() -> Self {
        Self {
            listeners: RwLock::new(Vec::new()),
            error_handler: RwLock::new(None),
            async_mode: false,
        }
    }

    /// 创建异步模式的多播器
    pub fn new_async() -> Self {
        Self {
            async_mode: true,
            ..Self::new()
        }
    }

    pub fn is_async(&self) -> bool {
        self.async_mode
    }

    /// 设置错误处理器
    pub fn set_error_handler<F>(&self, handler: F)
    where
        F: Fn(&dyn ApplicationListener, Arc<dyn Event>, &anyhow::Error) + Send + Sync + 'static,
    {
        *self.error_handler.write() = Some(Arc::new(handler));
    }

    /// 移除错误处理器
    pub fn remove_error_handler(&self) {
        *self.error_handler.write() = None;
    }

    /// 调用单个监听器
    ///
    /// 没有错误处理器时：错误记录日志；同步模式下 panic 继续向上传播
    fn invoke_listener(
        listener: &Arc<dyn ApplicationListener>,
        event: Arc<dyn Event>,
        error_handler: Option<&ErrorHandler>,
        propagate_panic: bool,
    ) {
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| listener.on_event(Arc::clone(&event))));
        let err = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => e,
            Err(panic) => {
                if error_handler.is_none() && propagate_panic {
                    tracing::error!(
                        "Listener '{}' panicked while handling event '{}'",
                        listener.listener_name(),
                        event.event_name()
                    );
                    std::panic::resume_unwind(panic);
                }
                anyhow::anyhow!("Listener panicked: {}", panic_message(panic.as_ref()))
            }
        };
        match error_handler {
            Some(handler) => handler(listener.as_ref(), event, &err),
            None => tracing::error!(
                "Listener '{}' failed while handling event '{}': {:#}",
                listener.listener_name(),
                event.event_name(),
                err
            ),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

impl Default for SimpleApplicationEventMulticaster {
    fn default() -> Self {
        Self::new()
    }
}

impl ApplicationEventMulticaster for SimpleApplicationEventMulticaster {
    fn add_listener(&self, listener: Arc<dyn ApplicationListener>) {
        let mut listeners = self.listeners.write();
        if listeners.iter().any(|l| same_listener(l, &listener)) {
            return;
        }
        tracing::debug!("Added event listener: {}", listener.listener_name());
        listeners.push(listener);
    }

    fn remove_listener(&self, listener: &Arc<dyn ApplicationListener>) {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|l| !same_listener(l, listener));
        if listeners.len() != before {
            tracing::debug!("Removed event listener: {}", listener.listener_name());
        }
    }

    fn remove_listener_by_name(&self, listener_name: &str) {
        let mut listeners = self.listeners.write();
        listeners.retain(|l| l.listener_name() != listener_name);
        tracing::debug!("Removed event listener: {}", listener_name);
    }

    fn remove_all_listeners(&self) {
        self.listeners.write().clear();
        tracing::debug!("Removed all event listeners");
    }

    fn multicast_event(&self, event: Arc<dyn Event>) {
        // 克隆监听器列表，避免监听器回调时持锁
        let listeners: Vec<_> = self
            .listeners
            .read()
            .iter()
            .filter(|l| l.supports_event(event.as_ref()))
            .map(Arc::clone)
            .collect();

        tracing::debug!(
            "Multicasting event: {} to {} listener(s) (async_mode: {})",
            event.event_name(),
            listeners.len(),
            self.async_mode
        );

        let error_handler = self.error_handler.read().clone();

        if !self.async_mode {
            for listener in &listeners {
                Self::invoke_listener(listener, Arc::clone(&event), error_handler.as_ref(), true);
            }
            return;
        }

        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            // 没有runtime，降级为同步执行
            tracing::warn!("No tokio runtime available, falling back to sync execution");
            for listener in &listeners {
                Self::invoke_listener(listener, Arc::clone(&event), error_handler.as_ref(), false);
            }
            return;
        };
        for listener in listeners {
            let event = Arc::clone(&event);
            let error_handler = error_handler.clone();
            handle.spawn(async move {
                Self::invoke_listener(&listener, event, error_handler.as_ref(), false);
            });
        }
    }

    fn listener_count(&self) -> usize {
        self.listeners.read().len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Default)]
    struct Recording {
        seen: Mutex<Vec<String>>,
    }

    impl ApplicationListener for Recording {
        fn on_event(&self, event: Arc<dyn Event>) -> anyhow::Result<()> {
            self.seen.lock().push(event.event_name().to_string());
            Ok(())
        }

        fn listener_name(&self) -> &str {
            "recording"
        }
    }

    struct ClosedOnly {
        closed: Mutex<usize>,
    }

    impl TypedEventListener<ContextClosedEvent> for ClosedOnly {
        fn on_event(&self, _event: &ContextClosedEvent) -> anyhow::Result<()> {
            *self.closed.lock() += 1;
            Ok(())
        }
    }

    struct Failing;

    impl ApplicationListener for Failing {
        fn on_event(&self, _event: Arc<dyn Event>) -> anyhow::Result<()> {
            anyhow::bail!("listener failed")
        }
    }

    struct Panicking;

    impl ApplicationListener for Panicking {
        fn on_event(&self, _event: Arc<dyn Event>) -> anyhow::Result<()> {
            panic!("listener panicked")
        }
    }

    #[test]
    fn test_sync_multicast_and_typed_filter() {
        let multicaster = SimpleApplicationEventMulticaster::new();
        let recording = Arc::new(Recording::default());
        let typed = Arc::new(ClosedOnly { closed: Mutex::new(0) });
        let recording_listener: Arc<dyn ApplicationListener> = recording.clone();
        multicaster.add_listener(Arc::clone(&recording_listener));
        multicaster.add_listener(Arc::clone(&recording_listener));
        multicaster.add_listener(Arc::new(TypedEventListenerAdapter::new(typed.clone())));
        assert_eq!(multicaster.listener_count(), 2);

        multicaster.multicast_event(Arc::new(ContextRefreshedEvent::new("test", 0)));
        multicaster.multicast_event(Arc::new(ContextClosedEvent::new("test")));

        assert_eq!(*recording.seen.lock(), vec!["ContextRefreshedEvent", "ContextClosedEvent"]);
        assert_eq!(*typed.closed.lock(), 1);

        multicaster.remove_listener(&recording_listener);
        assert_eq!(multicaster.listener_count(), 1);
    }

    #[test]
    fn test_error_handler_receives_errors_and_panics() {
        let multicaster = SimpleApplicationEventMulticaster::new();
        let errors = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&errors);
        multicaster.set_error_handler(move |_, _, err| sink.lock().push(err.to_string()));
        multicaster.add_listener(Arc::new(Failing));
        multicaster.add_listener(Arc::new(Panicking));

        multicaster.multicast_event(Arc::new(ContextClosedEvent::new("test")));

        let errors = errors.lock();
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0], "listener failed");
        assert!(errors[1].contains("listener panicked"));
    }

    #[test]
    fn test_sync_panic_without_handler_propagates() {
        let multicaster = SimpleApplicationEventMulticaster::new();
        multicaster.add_listener(Arc::new(Panicking));
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            multicaster.multicast_event(Arc::new(ContextClosedEvent::new("test")));
        }));
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_async_mode_isolates_panics() {
        let multicaster = SimpleApplicationEventMulticaster::new_async();
        let recording = Arc::new(Recording::default());
        multicaster.add_listener(Arc::new(Panicking));
        multicaster.add_listener(recording.clone());

        multicaster.multicast_event(Arc::new(ContextRefreshedEvent::new("test", 0)));

        for _ in 0..50 {
            if !recording.seen.lock().is_empty() {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(*recording.seen.lock(), vec!["ContextRefreshedEvent"]);
    }
}
