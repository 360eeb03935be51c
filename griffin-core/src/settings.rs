//! 容器行为开关
//!
//! 可以从 TOML 的 `[griffin.beans]` 表或者 [`Environment`] 中读取，未配置的项
//! 使用默认值。

use serde::{Deserialize, Serialize};

use crate::config::Environment;
use crate::constants::SETTINGS_PREFIX;

/// 容器设置
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ContainerSettings {
    /// 同名定义是否可以覆盖
    pub allow_bean_definition_overriding: bool,

    /// 是否通过早期引用解决单例之间的循环引用
    pub allow_circular_references: bool,

    /// 早期引用已被注入、最终对象却被包装时是否仍然放行
    pub allow_raw_injection_despite_wrapping: bool,

    /// 是否缓存合并后的定义
    pub cache_bean_metadata: bool,

    /// 注册后置处理器重扫的最大轮数
    pub max_registry_post_processor_passes: usize,
}

impl Default for ContainerSettings {
    fn default() -> Self {
        Self {
            allow_bean_definition_overriding: true,
            allow_circular_references: true,
            allow_raw_injection_despite_wrapping: false,
            cache_bean_metadata: true,
            max_registry_post_processor_passes: 64,
        }
    }
}

impl ContainerSettings {
    /// 从 TOML 文本读取 `[griffin.beans]` 表，表不存在时返回默认值
    pub fn from_toml_str(content: &str) -> anyhow::Result<Self> {
        let root: toml::Value = toml::from_str(content)?;
        let table = SETTINGS_PREFIX
            .split('.')
            .try_fold(&root, |value, key| value.get(key));
        match table {
            Some(table) => Ok(table.clone().try_into()?),
            None => Ok(Self::default()),
        }
    }

    /// 从环境中读取 `griffin.beans.*` 键
    pub fn from_environment(env: &Environment) -> Self {
        let defaults = Self::default();
        let key = |name: &str| format!("{}.{}", SETTINGS_PREFIX, name);
        Self {
            allow_bean_definition_overriding: env.get_bool_or(
                &key("allow-bean-definition-overriding"),
                defaults.allow_bean_definition_overriding,
            ),
            allow_circular_references: env
                .get_bool_or(&key("allow-circular-references"), defaults.allow_circular_references),
            allow_raw_injection_despite_wrapping: env.get_bool_or(
                &key("allow-raw-injection-despite-wrapping"),
                defaults.allow_raw_injection_despite_wrapping,
            ),
            cache_bean_metadata: env.get_bool_or(&key("cache-bean-metadata"), defaults.cache_bean_metadata),
            max_registry_post_processor_passes: env
                .get_i64(&key("max-registry-post-processor-passes"))
                .and_then(|v| usize::try_from(v).ok())
                .unwrap_or(defaults.max_registry_post_processor_passes),
        }
    }
}
