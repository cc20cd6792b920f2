use crate::error::TplError;
use serde::Deserialize;
use std::path::Path;

/// moban.toml 配置
#[derive(Debug, Default, Deserialize)]
pub struct MobanConfig {
    #[serde(default)]
    pub engine: EngineConfig,
}

#[derive(Debug, Deserialize)]
pub struct EngineConfig {
    #[serde(default = "default_templates_dir")]
    pub templates_dir: String,
    #[serde(default = "default_cache_dir")]
    pub cache_dir: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
    #[serde(default = "default_context_id")]
    pub context_id: String,
    /// 每次取单元时按清单 mtime 检查过期并自动重编译
    #[serde(default = "default_true")]
    pub auto_reload: bool,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl MobanConfig {
    pub fn load(root: &Path) -> Result<Self, TplError> {
        let config_path = root.join("moban.toml");
        let content = std::fs::read_to_string(&config_path)
            .map_err(|e| TplError::Loader(format!("读取 moban.toml 失败：{e}")))?;
        toml::from_str(&content).map_err(|e| TplError::Loader(format!("解析 moban.toml 失败：{e}")))
    }

    /// 配置文件缺失时退回默认值
    pub fn load_or_default(root: &Path) -> Self {
        Self::load(root).unwrap_or_default()
    }
}

// 默认值函数
fn default_templates_dir() -> String { "templates".into() }
fn default_cache_dir() -> String { ".moban-cache".into() }
fn default_namespace() -> String { "default".into() }
fn default_context_id() -> String { "default".into() }
fn default_true() -> bool { true }
fn default_log_level() -> String { "info".into() }

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            templates_dir: default_templates_dir(),
            cache_dir: default_cache_dir(),
            namespace: default_namespace(),
            context_id: default_context_id(),
            auto_reload: true,
            log_level: default_log_level(),
        }
    }
}
