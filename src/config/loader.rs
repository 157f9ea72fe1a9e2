//! Configuration Loader
//!
//! 实现多源配置加载与合并逻辑
//!
//! 优先级（从高到低）：
//! 1. 环境变量
//! 2. 配置文件（voxkit.toml）
//! 3. 默认值

use config::{Config, ConfigError as ConfigCrateError, Environment, File};
use std::path::Path;
use thiserror::Error;

use super::types::AppConfig;

/// 配置加载错误
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    LoadError(String),

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}

impl From<ConfigCrateError> for ConfigError {
    fn from(err: ConfigCrateError) -> Self {
        ConfigError::LoadError(err.to_string())
    }
}

/// 配置文件搜索路径
const CONFIG_FILE_NAMES: &[&str] = &["voxkit", "voxkit.local"];

/// 加载应用配置
///
/// 按优先级从高到低合并配置：
/// 1. 环境变量（前缀 `VOXKIT_`，层级分隔符 `__`）
/// 2. 配置文件（voxkit.toml 或 voxkit.local.toml）
/// 3. 默认值
///
/// # 环境变量示例
/// - `VOXKIT_MODEL__DEFAULT_REPO=Qwen/Qwen3-TTS-1.7B`
/// - `VOXKIT_MEMORY__HEADROOM=2.0`
/// - `VOXKIT_AUDIO__SAMPLE_RATE=24000`
pub fn load_config() -> Result<AppConfig, ConfigError> {
    load_config_from_path(None)
}

/// 从指定路径加载配置
///
/// # 参数
/// - `config_path` - 可选的配置文件路径，如果为 None 则使用默认搜索路径
pub fn load_config_from_path(config_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    let mut builder = Config::builder();

    // 1. 首先设置默认值（最低优先级）
    builder = builder
        .set_default("model.default_repo", "Qwen/Qwen3-TTS-0.6B")?
        .set_default("model.engine", "qwen3-tts")?
        .set_default("model.estimated_bytes", 3_u64 * 1024 * 1024 * 1024)?
        .set_default("memory.headroom", 1.5)?
        .set_default("memory.enforce", false)?
        .set_default("audio.sample_rate", 24000)?
        .set_default("audition.default_count", 5)?
        .set_default("audition.base_seed", 0)?
        .set_default("log.level", "info")?
        .set_default("log.json", false)?;

    // 2. 添加配置文件（如果存在）
    if let Some(path) = config_path {
        builder = builder.add_source(File::from(path).required(true));
    } else {
        // 搜索默认配置文件
        for name in CONFIG_FILE_NAMES {
            builder = builder.add_source(File::with_name(name).required(false));
        }
    }

    // 3. 添加环境变量（最高优先级）
    // 前缀: VOXKIT_
    // 层级分隔符: __ (双下划线)
    // 例如: VOXKIT_MODEL__DEFAULT_REPO=Qwen/Qwen3-TTS-1.7B
    builder = builder.add_source(
        Environment::with_prefix("VOXKIT")
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true),
    );

    // 4. 构建配置
    let config = builder.build()?;

    // 5. 反序列化为 AppConfig
    let app_config: AppConfig = config.try_deserialize().map_err(|e| {
        ConfigError::ParseError(format!("Failed to deserialize config: {}", e))
    })?;

    // 6. 验证配置
    app_config
        .validate()
        .map_err(|e| ConfigError::ValidationError(e.to_string()))?;

    Ok(app_config)
}

/// 打印配置信息（用于启动时日志）
pub fn print_config(config: &AppConfig) {
    tracing::info!("=== Voxkit Configuration ===");
    tracing::info!("Default Model: {}", config.model.default_repo);
    tracing::info!("Engine: {}", config.model.engine);
    tracing::info!("Estimated Model Bytes: {}", config.model.estimated_bytes);
    tracing::info!("Memory Headroom: {}", config.memory.headroom);
    tracing::info!("Memory Enforce: {}", config.memory.enforce);
    tracing::info!("Sample Rate: {} Hz", config.audio.sample_rate);
    tracing::info!("Audition Count: {}", config.audition.default_count);
    tracing::info!("Log Level: {}", config.log.level);
    tracing::info!("============================");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_loads_and_validates() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.model.default_repo, "Qwen/Qwen3-TTS-0.6B");
        assert_eq!(config.model.engine, "qwen3-tts");
    }

    #[test]
    fn test_load_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxkit.toml");
        std::fs::write(
            &path,
            r#"
[model]
default_repo = "Qwen/Qwen3-TTS-1.7B"

[memory]
headroom = 2.0

[audition]
default_count = 3
"#,
        )
        .unwrap();

        let config = load_config_from_path(Some(&path)).unwrap();
        assert_eq!(config.model.default_repo, "Qwen/Qwen3-TTS-1.7B");
        assert_eq!(config.memory.headroom, 2.0);
        assert_eq!(config.audition.default_count, 3);
        // 未覆盖的字段保持默认
        assert_eq!(config.audio.sample_rate, 24000);
    }

    #[test]
    fn test_invalid_file_value_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("voxkit.toml");
        std::fs::write(&path, "[memory]\nheadroom = 0.2\n").unwrap();

        let err = load_config_from_path(Some(&path)).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }
}
