//! Bean 生命周期回调接口
//!
//! 类似 Spring 的 `*Aware`、`InitializingBean`、`DisposableBean`、`FactoryBean`。
//! 实现了这些 trait 的类型需要在 [`BeanClass`](crate::class::BeanClass) 构建时声明对应能力，
//! 容器才能在运行时把实例向上转型。

use std::sync::Arc;

use crate::bean_factory::DefaultListableBeanFactory;
use crate::class::BeanClass;
use crate::object::BeanObject;

/// 最高优先级
pub const HIGHEST_PRECEDENCE: i32 = i32::MIN;

/// 最低优先级，未声明顺序的组件按此处理
pub const LOWEST_PRECEDENCE: i32 = i32::MAX;

/// 获知自己在容器中的名称
pub trait BeanNameAware: Send + Sync {
    fn set_bean_name(&self, name: &str);
}

/// 获得所属 Bean 工厂的引用
pub trait BeanFactoryAware: Send + Sync {
    fn set_bean_factory(&self, factory: Arc<DefaultListableBeanFactory>) -> anyhow::Result<()>;
}

/// 所有属性设置完成后回调
pub trait InitializingBean: Send + Sync {
    fn after_properties_set(&self) -> anyhow::Result<()>;
}

/// 容器销毁 bean 时回调
pub trait DisposableBean: Send + Sync {
    fn destroy(&self) -> anyhow::Result<()>;
}

/// 工厂 bean：容器对外暴露的是 `get_object` 的结果，`&name` 取工厂本身
pub trait FactoryBean: Send + Sync {
    fn get_object(&self) -> anyhow::Result<Option<BeanObject>>;

    fn object_type(&self) -> Option<Arc<BeanClass>>;

    fn is_singleton(&self) -> bool {
        true
    }

    /// 预实例化阶段是否立即取出产品对象
    fn is_eager_init(&self) -> bool {
        false
    }
}

/// 全部非懒加载单例实例化完成后回调
pub trait SmartInitializingSingleton: Send + Sync {
    fn after_singletons_instantiated(&self) -> anyhow::Result<()>;
}

/// 排序：值越小越先执行
pub trait Ordered: Send + Sync {
    fn order(&self) -> i32;
}

/// 按顺序值稳定排序，`None` 视为最低优先级
pub fn sort_by_order<T>(items: &mut [(T, Option<i32>)]) {
    items.sort_by_key(|(_, order)| order.unwrap_or(LOWEST_PRECEDENCE));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_by_order_is_stable() {
        let mut items = vec![("c", None), ("a", Some(1)), ("b", Some(1)), ("first", Some(HIGHEST_PRECEDENCE))];
        sort_by_order(&mut items);

        let names: Vec<_> = items.iter().map(|(n, _)| *n).collect();
        assert_eq!(names, vec!["first", "a", "b", "c"]);
    }

    #[test]
    fn test_missing_order_equals_lowest_precedence() {
        let mut items = vec![("none", None), ("lowest", Some(LOWEST_PRECEDENCE))];
        sort_by_order(&mut items);
        assert_eq!(items[0].0, "none");
    }
}
