use std::path::Path;
use std::sync::Arc;
use std::time::Instant;

use crate::config::{Environment, EnvironmentPropertySource, TomlPropertySource};
use crate::context::{ApplicationContext, ApplicationContextBuilder};
use crate::event::{ApplicationEventPublisher, ApplicationStartedEvent};
use crate::logging::LoggingConfig;

/// 配置中指定激活 profile 的键
pub const ACTIVE_PROFILES_KEY: &str = "griffin.profiles.active";

type Initializer = Box<dyn Fn(&Arc<ApplicationContext>) -> anyhow::Result<()> + Send + Sync>;
type Customizer = Box<dyn FnOnce(ApplicationContextBuilder) -> ApplicationContextBuilder + Send>;

/// Griffin 应用程序
///
/// 提供便捷的应用启动方式：加载配置、初始化日志、刷新上下文
pub struct GriffinApplication {
    /// 应用名称
    name: String,

    /// 配置文件路径
    config_files: Vec<String>,

    /// 环境变量前缀
    env_prefix: String,

    /// 激活的 profiles
    profiles: Vec<String>,

    /// 是否显示 banner
    show_banner: bool,

    /// 日志配置，`None` 表示不初始化日志
    logging_config: Option<LoggingConfig>,

    component_scan: bool,
    async_events: bool,

    customizers: Vec<Customizer>,

    /// 自定义初始化函数，在刷新之前执行
    initializers: Vec<Initializer>,
}

impl GriffinApplication {
    /// 创建新的应用
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            config_files: vec!["application.toml".to_string()],
            env_prefix: "APP_".to_string(),
            profiles: Vec::new(),
            show_banner: true,
            logging_config: Some(LoggingConfig::default()),
            component_scan: true,
            async_events: false,
            customizers: Vec::new(),
            initializers: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// 设置配置文件路径
    pub fn config_file(mut self, path: impl Into<String>) -> Self {
        self.config_files = vec![path.into()];
        self
    }

    /// 添加多个配置文件
    pub fn config_files(mut self, paths: Vec<String>) -> Self {
        self.config_files = paths;
        self
    }

    /// 设置环境变量前缀
    pub fn env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env_prefix = prefix.into();
        self
    }

    /// 设置激活的 profiles
    pub fn profiles(mut self, profiles: Vec<String>) -> Self {
        self.profiles = profiles;
        self
    }

    /// 设置是否显示 banner
    pub fn banner(mut self, show: bool) -> Self {
        self.show_banner = show;
        self
    }

    /// 设置日志配置
    ///
    /// 环境变量和配置文件中的 `logging.*` 会覆盖这里的设置
    pub fn logging(mut self, config: LoggingConfig) -> Self {
        self.logging_config = Some(config);
        self
    }

    /// 不初始化全局日志，由调用者自行安装 subscriber
    pub fn without_logging(mut self) -> Self {
        self.logging_config = None;
        self
    }

    pub fn component_scan(mut self, enabled: bool) -> Self {
        self.component_scan = enabled;
        self
    }

    pub fn async_events(mut self, enabled: bool) -> Self {
        self.async_events = enabled;
        self
    }

    /// 在构建上下文之前调整构建器，例如注册定义或监听器
    pub fn configure<F>(mut self, f: F) -> Self
    where
        F: FnOnce(ApplicationContextBuilder) -> ApplicationContextBuilder + Send + 'static,
    {
        self.customizers.push(Box::new(f));
        self
    }

    /// 添加初始化器
    pub fn initializer<F>(mut self, f: F) -> Self
    where
        F: Fn(&Arc<ApplicationContext>) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.initializers.push(Box::new(f));
        self
    }

    /// 运行应用，返回刷新完成的上下文
    pub async fn run(self) -> anyhow::Result<Arc<ApplicationContext>> {
        // 记录启动开始时间
        let start_time = Instant::now();

        let environment = Arc::new(Environment::new());
        let loaded = self.load_environment(&environment);

        if let Some(config) = &self.logging_config {
            config.clone().merge_env().merge_environment(&environment).init()?;
        }

        // 显示 banner
        if self.show_banner {
            self.print_banner();
        }

        tracing::info!("Starting {} application", self.name);
        for (file, priority) in &loaded {
            tracing::info!("Loaded configuration from: {} (priority: {})", file, priority);
        }
        let active_profiles = environment.get_active_profiles();
        if active_profiles.is_empty() {
            tracing::info!("No active profiles set, falling back to default profiles: {:?}", environment.get_default_profiles());
        } else {
            tracing::info!("Active profiles: {:?}", active_profiles);
        }

        let mut builder = ApplicationContext::builder()
            .display_name(self.name.clone())
            .environment(Arc::clone(&environment))
            .async_events(self.async_events)
            .component_scan(self.component_scan)
            .resolve_placeholders(true);
        for customizer in self.customizers {
            builder = customizer(builder);
        }
        let context = builder.build()?;
        tracing::debug!("ApplicationContext created");

        for initializer in &self.initializers {
            initializer(&context)?;
        }

        context.refresh()?;

        let elapsed_ms = start_time.elapsed().as_millis();
        tracing::info!("Started {} in {}ms", self.name, elapsed_ms);
        context.publish_event(Arc::new(ApplicationStartedEvent::new(self.name.clone(), elapsed_ms)));

        Ok(context)
    }

    /// 运行应用并等待 Ctrl+C，收到信号后关闭上下文
    pub async fn run_until_shutdown(self) -> anyhow::Result<()> {
        let context = self.run().await?;
        tracing::info!("Application running, press Ctrl+C to stop");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown signal received");
        context.close();
        Ok(())
    }

    /// 便捷方法：使用默认配置运行
    pub async fn run_with_defaults(name: impl Into<String>) -> anyhow::Result<Arc<ApplicationContext>> {
        Self::new(name).run().await
    }

    /// 加载配置文件和环境变量，返回加载成功的文件及其优先级
    ///
    /// 加载顺序（优先级从低到高）：
    /// 1. application.toml (default)
    /// 2. application-{profile}.toml (profile specific)
    /// 3. 带前缀的环境变量
    fn load_environment(&self, environment: &Environment) -> Vec<(String, i32)> {
        let mut loaded = Vec::new();
        for base_config in &self.config_files {
            if try_load_config_file(environment, base_config, 0) {
                loaded.push((base_config.clone(), 0));
            }
        }

        environment.add_property_source(Box::new(EnvironmentPropertySource::new(&self.env_prefix)));

        // 优先级：代码设置 > 环境变量 > 配置文件
        let mut active_profiles = self.profiles.clone();
        if active_profiles.is_empty() {
            if let Ok(profiles) = std::env::var(format!("{}PROFILES_ACTIVE", self.env_prefix)) {
                active_profiles = split_profiles(&profiles);
            }
        }
        if active_profiles.is_empty() {
            if let Some(profiles) = environment.get_string_array(ACTIVE_PROFILES_KEY) {
                active_profiles = profiles.iter().flat_map(|p| split_profiles(p)).collect();
            }
        }
        environment.set_active_profiles(active_profiles.clone());

        for (index, profile) in active_profiles.iter().enumerate() {
            for base_config in &self.config_files {
                let profile_config = profile_config_path(base_config, profile);
                let priority = 10 + index as i32;
                if try_load_config_file(environment, &profile_config, priority) {
                    loaded.push((profile_config, priority));
                }
            }
        }
        loaded
    }

    /// 打印 banner
    fn print_banner(&self) {
        println!();
        println!(r"   ____       _  __  __ _       ");
        println!(r"  / ___|_ __ (_)/ _|/ _(_)_ __  ");
        println!(r" | |  _| '__|| | |_| |_| | '_ \ ");
        println!(r" | |_| | |   | |  _|  _| | | | |");
        println!(r"  \____|_|   |_|_| |_| |_|_| |_|");
        println!();
        println!("  :: Griffin ::        (v{})", env!("CARGO_PKG_VERSION"));
        println!();
    }
}

impl Default for GriffinApplication {
    fn default() -> Self {
        Self::new("GriffinApplication")
    }
}

fn split_profiles(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

/// 获取 profile 配置文件路径
///
/// 例如：application.toml -> application-dev.toml
fn profile_config_path(base_path: &str, profile: &str) -> String {
    match base_path.rfind('.') {
        Some(dot_pos) => {
            let (name, ext) = base_path.split_at(dot_pos);
            format!("{}-{}{}", name, profile, ext)
        }
        None => format!("{}-{}", base_path, profile),
    }
}

/// 文件存在且解析成功时加入 Environment
fn try_load_config_file(environment: &Environment, config_file: &str, priority: i32) -> bool {
    if !Path::new(config_file).exists() {
        tracing::debug!("Configuration file not found: {}", config_file);
        return false;
    }
    match TomlPropertySource::from_file(config_file) {
        Ok(source) => {
            environment.add_property_source(Box::new(source.with_priority(priority)));
            true
        }
        Err(e) => {
            tracing::warn!("Failed to load {}: {:#}", config_file, e);
            false
        }
    }
}
