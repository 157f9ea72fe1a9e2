//! Voxkit - 音色资源管理核心
//!
//! TTS 音色设计系统的资源管理子系统，负责驻留模型生命周期、
//! clone prompt 缓存、候选音频并发生成与两种二进制格式的读写。
//!
//! 领域层 (domain/):
//! - SampleBuffer: 单声道浮点采样缓冲（与推理模型的交换形式）
//! - VoiceId / VoiceProfile: 音色标识与描述
//!
//! 应用层 (application/):
//! - Ports: 推理模型端口（SpeechModelPort、ModelLoaderPort）
//! - Services: 候选音频编排（CandidateOrchestrator）、音色锁定（VoiceLockService）
//!
//! 基础设施层 (infrastructure/):
//! - Codec: RIFF/WAVE PCM16 容器编解码
//! - Archive: .vox 音色档案（manifest + 命名二进制条目）
//! - Memory: 驻留模型管理（ModelResourceManager）、clone prompt 二级缓存

pub mod application;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::{load_config, AppConfig};
