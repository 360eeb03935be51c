//! 配置环境
//!
//! [`Environment`] 按优先级查询多个 [`PropertySource`]，支持 profile 和
//! `${key:default}` 占位符（可嵌套）。

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;

use anyhow::Context;
use parking_lot::RwLock;
use thiserror::Error;

/// 占位符前缀
pub const PLACEHOLDER_PREFIX: &str = "${";

/// 占位符后缀
pub const PLACEHOLDER_SUFFIX: &str = "}";

/// 占位符中键与默认值之间的分隔符
pub const VALUE_SEPARATOR: char = ':';

/// 配置值类型
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Array(Vec<ConfigValue>),
    Object(HashMap<String, ConfigValue>),
}

impl ConfigValue {
    /// 转换为字符串
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ConfigValue::String(s) => Some(s.as_str()),
            _ => None,
        }
    }

    /// 转换为整数
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ConfigValue::Int(i) => Some(*i),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 转换为浮点数
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ConfigValue::Float(f) => Some(*f),
            ConfigValue::Int(i) => Some(*i as f64),
            ConfigValue::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// 转换为布尔值
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ConfigValue::Bool(b) => Some(*b),
            ConfigValue::String(s) => match s.trim().to_lowercase().as_str() {
                "true" | "yes" | "on" | "1" => Some(true),
                "false" | "no" | "off" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        }
    }

    /// 标量值的文本形式，数组和表返回 `None`
    pub fn to_text(&self) -> Option<String> {
        match self {
            ConfigValue::String(s) => Some(s.clone()),
            ConfigValue::Int(i) => Some(i.to_string()),
            ConfigValue::Float(f) => Some(f.to_string()),
            ConfigValue::Bool(b) => Some(b.to_string()),
            ConfigValue::Array(_) | ConfigValue::Object(_) => None,
        }
    }
}

impl fmt::Display for ConfigValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigValue::Array(items) => {
                let parts: Vec<String> = items.iter().map(ToString::to_string).collect();
                write!(f, "[{}]", parts.join(", "))
            }
            ConfigValue::Object(map) => write!(f, "{{{} entries}}", map.len()),
            scalar => f.write_str(&scalar.to_text().unwrap_or_default()),
        }
    }
}

/// 占位符解析错误
#[derive(Debug, Error, PartialEq, Eq)]
pub enum PlaceholderError {
    #[error("Could not resolve placeholder '{key}' in value \"{value}\"")]
    Unresolvable { key: String, value: String },

    #[error("Circular placeholder reference '{key}' in property definitions")]
    Circular { key: String },
}

/// 配置源 trait
pub trait PropertySource: Send + Sync {
    /// 获取配置源名称
    fn name(&self) -> &str;

    /// 获取配置值
    fn get(&self, key: &str) -> Option<ConfigValue>;

    /// 获取所有配置键
    fn keys(&self) -> Vec<String>;

    /// 配置源优先级（数字越大优先级越高）
    fn priority(&self) -> i32 {
        0
    }
}

/// Environment - 配置管理器
///
/// 类似 Spring Boot 的 Environment，提供统一的配置访问接口
pub struct Environment {
    /// 配置源列表（按优先级排序）
    sources: RwLock<Vec<Box<dyn PropertySource>>>,

    /// 当前激活的 profile
    active_profiles: RwLock<Vec<String>>,

    /// 没有激活任何 profile 时生效
    default_profiles: RwLock<Vec<String>>,

    /// 无法解析的占位符是否原样保留
    ignore_unresolvable_placeholders: RwLock<bool>,
}

impl fmt::Debug for Environment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sources: Vec<String> = self.sources.read().iter().map(|s| s.name().to_string()).collect();
        f.debug_struct("Environment")
            .field("active_profiles", &*self.active_profiles.read())
            .field("sources", &sources)
            .finish()
    }
}

impl Environment {
    /// 创建新的环境
    pub fn new() -> Self {
        Self {
            sources: RwLock::new(Vec::new()),
            active_profiles: RwLock::new(Vec::new()),
            default_profiles: RwLock::new(vec!["default".to_string()]),
            ignore_unresolvable_placeholders: RwLock::new(false),
        }
    }

    /// 添加配置源，同优先级时先添加的先查询
    pub fn add_property_source(&self, source: Box<dyn PropertySource>) {
        let mut sources = self.sources.write();
        tracing::debug!("Adding property source '{}' with priority {}", source.name(), source.priority());
        sources.push(source);
        sources.sort_by(|a, b| b.priority().cmp(&a.priority()));
    }

    /// 按名称移除配置源
    pub fn remove_property_source(&self, name: &str) -> bool {
        let mut sources = self.sources.write();
        let before = sources.len();
        sources.retain(|s| s.name() != name);
        before != sources.len()
    }

    /// 已添加配置源的名称，按查询顺序
    pub fn property_source_names(&self) -> Vec<String> {
        self.sources.read().iter().map(|s| s.name().to_string()).collect()
    }

    /// 获取配置值
    pub fn get(&self, key: &str) -> Option<ConfigValue> {
        let sources = self.sources.read();
        for source in sources.iter() {
            if let Some(value) = source.get(key) {
                tracing::trace!("Config '{}' found in source '{}'", key, source.name());
                return Some(value);
            }
        }
        tracing::trace!("Config '{}' not found in any source", key);
        None
    }

    pub fn contains_property(&self, key: &str) -> bool {
        self.get(key).is_some()
    }

    /// 获取字符串配置，标量值会转成文本，其中的占位符会被解析
    pub fn get_string(&self, key: &str) -> Option<String> {
        let raw = self.get(key)?.to_text()?;
        match self.resolve_placeholders(&raw) {
            Ok(resolved) => Some(resolved),
            Err(e) => {
                tracing::warn!("Failed to resolve placeholders in config '{}': {}", key, e);
                Some(raw)
            }
        }
    }

    /// 获取字符串配置（带默认值）
    pub fn get_string_or(&self, key: &str, default: &str) -> String {
        self.get_string(key).unwrap_or_else(|| default.to_string())
    }

    /// 获取必需的字符串配置
    pub fn get_required_string(&self, key: &str) -> anyhow::Result<String> {
        self.get_string(key)
            .with_context(|| format!("Required key '{}' not found", key))
    }

    /// 获取整数配置
    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(|v| v.as_i64())
    }

    /// 获取整数配置（带默认值）
    pub fn get_i64_or(&self, key: &str, default: i64) -> i64 {
        self.get_i64(key).unwrap_or(default)
    }

    /// 获取浮点数配置
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(|v| v.as_f64())
    }

    /// 获取浮点数配置（带默认值）
    pub fn get_f64_or(&self, key: &str, default: f64) -> f64 {
        self.get_f64(key).unwrap_or(default)
    }

    /// 获取布尔值配置
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// 获取布尔值配置（带默认值）
    pub fn get_bool_or(&self, key: &str, default: bool) -> bool {
        self.get_bool(key).unwrap_or(default)
    }

    /// 获取字符串数组配置
    /// 支持两种格式:
    /// 1. TOML数组: key = ["a", "b", "c"]
    /// 2. 逗号分隔字符串: key = "a, b, c"
    pub fn get_string_array(&self, key: &str) -> Option<Vec<String>> {
        match self.get(key)? {
            ConfigValue::Array(arr) => Some(arr.iter().filter_map(ConfigValue::to_text).collect()),
            ConfigValue::String(s) => Some(
                s.split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
            ),
            _ => None,
        }
    }

    /// 设置激活的 profile
    pub fn set_active_profiles(&self, profiles: Vec<String>) {
        tracing::debug!("Activating profiles {:?}", profiles);
        *self.active_profiles.write() = profiles;
    }

    pub fn add_active_profile(&self, profile: impl Into<String>) {
        let profile = profile.into();
        let mut active = self.active_profiles.write();
        if !active.contains(&profile) {
            active.push(profile);
        }
    }

    /// 获取激活的 profile
    pub fn get_active_profiles(&self) -> Vec<String> {
        self.active_profiles.read().clone()
    }

    pub fn set_default_profiles(&self, profiles: Vec<String>) {
        *self.default_profiles.write() = profiles;
    }

    pub fn get_default_profiles(&self) -> Vec<String> {
        self.default_profiles.read().clone()
    }

    /// 检查 profile 是否生效
    ///
    /// `!name` 表示未激活时生效；没有激活任何 profile 时默认 profile 生效。
    pub fn accepts_profiles(&self, profile: &str) -> bool {
        if let Some(negated) = profile.strip_prefix('!') {
            return !self.is_profile_active(negated);
        }
        self.is_profile_active(profile)
    }

    fn is_profile_active(&self, profile: &str) -> bool {
        let active = self.active_profiles.read();
        if active.is_empty() {
            return self.default_profiles.read().iter().any(|p| p == profile);
        }
        active.iter().any(|p| p == profile)
    }

    /// 无法解析的占位符是否原样保留（默认报错）
    pub fn set_ignore_unresolvable_placeholders(&self, ignore: bool) {
        *self.ignore_unresolvable_placeholders.write() = ignore;
    }

    /// 解析文本中的 `${key:default}` 占位符
    pub fn resolve_placeholders(&self, text: &str) -> Result<String, PlaceholderError> {
        let ignore = *self.ignore_unresolvable_placeholders.read();
        let lookup = |key: &str| self.get(key).and_then(|v| v.to_text());
        parse_string_value(text, &lookup, ignore, &mut HashSet::new())
    }

    /// 与 [`resolve_placeholders`](Self::resolve_placeholders) 相同，但无法解析时总是报错
    pub fn resolve_required_placeholders(&self, text: &str) -> Result<String, PlaceholderError> {
        let lookup = |key: &str| self.get(key).and_then(|v| v.to_text());
        parse_string_value(text, &lookup, false, &mut HashSet::new())
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

/// 找到与 `start` 处前缀匹配的后缀位置，跳过嵌套的占位符
fn find_placeholder_end(text: &str, start: usize) -> Option<usize> {
    let mut index = start + PLACEHOLDER_PREFIX.len();
    let mut depth = 0usize;
    while index < text.len() {
        let rest = &text[index..];
        if rest.starts_with(PLACEHOLDER_SUFFIX) {
            if depth == 0 {
                return Some(index);
            }
            depth -= 1;
            index += PLACEHOLDER_SUFFIX.len();
        } else if rest.starts_with(PLACEHOLDER_PREFIX) {
            depth += 1;
            index += PLACEHOLDER_PREFIX.len();
        } else {
            index += rest.chars().next().map_or(1, char::len_utf8);
        }
    }
    None
}

fn parse_string_value(
    text: &str,
    lookup: &dyn Fn(&str) -> Option<String>,
    ignore_unresolvable: bool,
    visiting: &mut HashSet<String>,
) -> Result<String, PlaceholderError> {
    let mut result = text.to_string();
    let mut start = result.find(PLACEHOLDER_PREFIX);

    while let Some(begin) = start {
        let Some(end) = find_placeholder_end(&result, begin) else {
            break;
        };
        let inner = result[begin + PLACEHOLDER_PREFIX.len()..end].to_string();
        if !visiting.insert(inner.clone()) {
            return Err(PlaceholderError::Circular { key: inner });
        }
        // 键本身也可能包含占位符
        let key_expr = parse_string_value(&inner, lookup, ignore_unresolvable, visiting)?;

        let mut value = lookup(&key_expr);
        if value.is_none() {
            if let Some((key, default)) = key_expr.split_once(VALUE_SEPARATOR) {
                value = lookup(key).or_else(|| Some(default.to_string()));
            }
        }

        match value {
            Some(value) => {
                // 值里还可能有占位符
                let value = parse_string_value(&value, lookup, ignore_unresolvable, visiting)?;
                result.replace_range(begin..end + PLACEHOLDER_SUFFIX.len(), &value);
                start = result[begin + value.len()..]
                    .find(PLACEHOLDER_PREFIX)
                    .map(|i| i + begin + value.len());
            }
            None if ignore_unresolvable => {
                let next = end + PLACEHOLDER_SUFFIX.len();
                start = result[next..].find(PLACEHOLDER_PREFIX).map(|i| i + next);
            }
            None => {
                return Err(PlaceholderError::Unresolvable {
                    key: key_expr,
                    value: text.to_string(),
                })
            }
        }
        visiting.remove(&inner);
    }
    Ok(result)
}

// ========== Property Sources ==========

/// 环境变量配置源
pub struct EnvironmentPropertySource {
    prefix: String,
    priority: i32,
}

impl EnvironmentPropertySource {
    /// 创建环境变量配置源
    ///
    /// # 参数
    /// * `prefix` - 环境变量前缀，例如 "APP_"
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            priority: 100, // 环境变量优先级较高
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// 将环境变量名转换为配置键
    /// 例如: APP_DATABASE_URL -> database.url
    fn env_to_key(&self, env_key: &str) -> String {
        let stripped = env_key.strip_prefix(&self.prefix).unwrap_or(env_key);
        stripped.to_lowercase().replace('_', ".")
    }

    /// 将配置键转换为环境变量名
    /// 例如: database.url -> APP_DATABASE_URL，griffin.beans.cache-bean-metadata -> APP_GRIFFIN_BEANS_CACHE_BEAN_METADATA
    fn key_to_env(&self, key: &str) -> String {
        format!("{}{}", self.prefix, key.replace(['.', '-'], "_").to_uppercase())
    }
}

impl PropertySource for EnvironmentPropertySource {
    fn name(&self) -> &str {
        "environment"
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        std::env::var(self.key_to_env(key)).ok().map(ConfigValue::String)
    }

    fn keys(&self) -> Vec<String> {
        std::env::vars()
            .filter(|(k, _)| k.starts_with(&self.prefix))
            .map(|(k, _)| self.env_to_key(&k))
            .collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// TOML 文件配置源
pub struct TomlPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl TomlPropertySource {
    /// 从文件加载 TOML 配置
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content =
            fs::read_to_string(path).with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::parse(&content, path.to_string_lossy().to_string())
    }

    /// 从字符串解析 TOML 配置
    pub fn parse(content: &str, name: impl Into<String>) -> anyhow::Result<Self> {
        let name = name.into();
        let value: toml::Value =
            toml::from_str(content).with_context(|| format!("Failed to parse TOML in '{}'", name))?;

        let mut properties = HashMap::new();
        Self::flatten_toml(&value, String::new(), &mut properties);

        Ok(Self {
            name,
            properties,
            priority: 0, // 文件配置优先级最低
        })
    }

    /// 展平 TOML 结构
    /// 例如: { database: { url: "xxx" } } -> { "database.url": "xxx" }
    fn flatten_toml(value: &toml::Value, prefix: String, result: &mut HashMap<String, ConfigValue>) {
        match value {
            toml::Value::Table(table) => {
                for (key, val) in table {
                    let new_prefix = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{}.{}", prefix, key)
                    };
                    Self::flatten_toml(val, new_prefix, result);
                }
            }
            other => {
                result.insert(prefix, Self::toml_value_to_config(other));
            }
        }
    }

    /// 转换 TOML 值为 ConfigValue
    fn toml_value_to_config(value: &toml::Value) -> ConfigValue {
        match value {
            toml::Value::String(s) => ConfigValue::String(s.clone()),
            toml::Value::Integer(i) => ConfigValue::Int(*i),
            toml::Value::Float(f) => ConfigValue::Float(*f),
            toml::Value::Boolean(b) => ConfigValue::Bool(*b),
            toml::Value::Array(arr) => ConfigValue::Array(arr.iter().map(Self::toml_value_to_config).collect()),
            toml::Value::Table(table) => ConfigValue::Object(
                table
                    .iter()
                    .map(|(k, v)| (k.clone(), Self::toml_value_to_config(v)))
                    .collect(),
            ),
            toml::Value::Datetime(dt) => ConfigValue::String(dt.to_string()),
        }
    }

    /// 设置优先级
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for TomlPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

/// 内存配置源（用于测试或运行时配置）
pub struct MapPropertySource {
    name: String,
    properties: HashMap<String, ConfigValue>,
    priority: i32,
}

impl MapPropertySource {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: HashMap::new(),
            priority: 50,
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: ConfigValue) -> Self {
        self.properties.insert(key.into(), value);
        self
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

impl PropertySource for MapPropertySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &str) -> Option<ConfigValue> {
        self.properties.get(key).cloned()
    }

    fn keys(&self) -> Vec<String> {
        self.properties.keys().cloned().collect()
    }

    fn priority(&self) -> i32 {
        self.priority
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env_with(pairs: &[(&str, &str)]) -> Environment {
        let source = pairs.iter().fold(MapPropertySource::new("test"), |source, (k, v)| {
            source.with_property(*k, ConfigValue::String(v.to_string()))
        });
        let env = Environment::new();
        env.add_property_source(Box::new(source));
        env
    }

    #[test]
    fn test_sources_queried_by_priority() {
        let env = Environment::new();
        env.add_property_source(Box::new(
            MapPropertySource::new("low")
                .with_priority(1)
                .with_property("server.port", ConfigValue::Int(8080)),
        ));
        env.add_property_source(Box::new(
            MapPropertySource::new("high")
                .with_priority(10)
                .with_property("server.port", ConfigValue::Int(9090)),
        ));

        assert_eq!(env.get_i64("server.port"), Some(9090));
        assert_eq!(env.property_source_names(), vec!["high", "low"]);
        assert!(env.remove_property_source("high"));
        assert_eq!(env.get_string("server.port").as_deref(), Some("8080"));
    }

    #[test]
    fn test_toml_is_flattened() {
        let source = TomlPropertySource::parse(
            r#"
            [database]
            url = "postgres://localhost"
            pool = { size = 4 }
            tags = ["a", "b"]
            "#,
            "inline",
        )
        .unwrap();

        assert_eq!(source.get("database.url"), Some(ConfigValue::String("postgres://localhost".into())));
        assert_eq!(source.get("database.pool.size"), Some(ConfigValue::Int(4)));

        let env = Environment::new();
        env.add_property_source(Box::new(source));
        assert_eq!(env.get_string_array("database.tags"), Some(vec!["a".to_string(), "b".to_string()]));
    }

    #[test]
    fn test_nested_placeholders_with_defaults() {
        let env = env_with(&[("app.name", "griffin"), ("greeting", "hello ${app.name}"), ("which", "name")]);

        assert_eq!(env.resolve_placeholders("${greeting}!").unwrap(), "hello griffin!");
        assert_eq!(env.resolve_placeholders("${app.${which}}").unwrap(), "griffin");
        assert_eq!(env.resolve_placeholders("${missing:fallback}").unwrap(), "fallback");
        assert_eq!(env.resolve_placeholders("${missing:}").unwrap(), "");
        assert_eq!(env.resolve_placeholders("port ${port:${default.port:80}}").unwrap(), "port 80");
        assert_eq!(env.get_string("greeting").as_deref(), Some("hello griffin"));
    }

    #[test]
    fn test_unresolvable_and_circular_placeholders() {
        let env = env_with(&[("a", "${b}"), ("b", "${a}")]);

        assert_eq!(
            env.resolve_placeholders("x ${nope}"),
            Err(PlaceholderError::Unresolvable {
                key: "nope".into(),
                value: "x ${nope}".into()
            })
        );
        assert!(matches!(env.resolve_placeholders("${a}"), Err(PlaceholderError::Circular { .. })));

        env.set_ignore_unresolvable_placeholders(true);
        assert_eq!(env.resolve_placeholders("x ${nope} y").unwrap(), "x ${nope} y");
        assert!(env.resolve_required_placeholders("${nope}").is_err());
    }

    #[test]
    fn test_profiles() {
        let env = Environment::new();
        assert!(env.accepts_profiles("default"));
        assert!(env.accepts_profiles("!dev"));

        env.set_active_profiles(vec!["dev".to_string()]);
        env.add_active_profile("local");
        env.add_active_profile("dev");
        assert_eq!(env.get_active_profiles(), vec!["dev", "local"]);
        assert!(env.accepts_profiles("dev"));
        assert!(!env.accepts_profiles("default"));
        assert!(!env.accepts_profiles("!local"));
    }

    #[test]
    fn test_value_conversions() {
        assert_eq!(ConfigValue::String(" 42 ".into()).as_i64(), Some(42));
        assert_eq!(ConfigValue::String("on".into()).as_bool(), Some(true));
        assert_eq!(ConfigValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(ConfigValue::Bool(true).to_string(), "true");
        assert_eq!(ConfigValue::Array(vec![ConfigValue::Int(1), ConfigValue::Int(2)]).to_string(), "[1, 2]");
    }
}
