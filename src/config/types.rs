//! Configuration Types
//!
//! 定义所有配置结构体

use serde::Deserialize;

/// 应用主配置
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// 模型配置
    #[serde(default)]
    pub model: ModelConfig,

    /// 内存配置
    #[serde(default)]
    pub memory: MemoryConfig,

    /// 音频配置
    #[serde(default)]
    pub audio: AudioConfig,

    /// 试听配置
    #[serde(default)]
    pub audition: AuditionConfig,

    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            model: ModelConfig::default(),
            memory: MemoryConfig::default(),
            audio: AudioConfig::default(),
            audition: AuditionConfig::default(),
            log: LogConfig::default(),
        }
    }
}

impl AppConfig {
    /// 校验配置取值
    pub fn validate(&self) -> Result<(), &'static str> {
        if self.audio.sample_rate == 0 {
            return Err("采样率必须大于 0");
        }
        if self.memory.headroom < 1.0 {
            return Err("内存安全系数不能小于 1.0");
        }
        if self.audition.default_count == 0 || self.audition.default_count > 16 {
            return Err("候选数量必须在 1 到 16 之间");
        }
        Ok(())
    }
}

/// 模型配置
#[derive(Debug, Clone, Deserialize)]
pub struct ModelConfig {
    /// 默认模型仓库标识
    #[serde(default = "default_model_repo")]
    pub default_repo: String,

    /// 引擎名（档案路径与索引使用）
    #[serde(default = "default_engine")]
    pub engine: String,

    /// 常驻内存估算（字节），用于加载前的内存检查
    #[serde(default = "default_estimated_bytes")]
    pub estimated_bytes: u64,
}

fn default_model_repo() -> String {
    "Qwen/Qwen3-TTS-0.6B".to_string()
}

fn default_engine() -> String {
    "qwen3-tts".to_string()
}

fn default_estimated_bytes() -> u64 {
    3 * 1024 * 1024 * 1024 // 0.6B 规格约 3GB
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_repo: default_model_repo(),
            engine: default_engine(),
            estimated_bytes: default_estimated_bytes(),
        }
    }
}

/// 内存配置
#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// 预估值的安全系数
    #[serde(default = "default_headroom")]
    pub headroom: f64,

    /// 是否启用硬门槛（默认仅告警）
    #[serde(default)]
    pub enforce: bool,
}

fn default_headroom() -> f64 {
    1.5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            headroom: default_headroom(),
            enforce: false,
        }
    }
}

/// 音频配置
#[derive(Debug, Clone, Deserialize)]
pub struct AudioConfig {
    /// 采样率（Hz）
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
}

fn default_sample_rate() -> u32 {
    24000
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: default_sample_rate(),
        }
    }
}

/// 试听配置
#[derive(Debug, Clone, Deserialize)]
pub struct AuditionConfig {
    /// 默认候选数量
    #[serde(default = "default_candidate_count")]
    pub default_count: usize,

    /// 默认基准种子
    #[serde(default = "default_base_seed")]
    pub base_seed: u64,
}

fn default_candidate_count() -> usize {
    5
}

fn default_base_seed() -> u64 {
    0
}

impl Default for AuditionConfig {
    fn default() -> Self {
        Self {
            default_count: default_candidate_count(),
            base_seed: default_base_seed(),
        }
    }
}

/// 日志配置
#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
    /// 日志级别: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// 是否输出 JSON 格式
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.audio.sample_rate, 24000);
        assert_eq!(config.memory.headroom, 1.5);
        assert_eq!(config.audition.default_count, 5);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = AppConfig::default();
        config.audio.sample_rate = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.memory.headroom = 0.5;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.audition.default_count = 17;
        assert!(config.validate().is_err());
    }
}
