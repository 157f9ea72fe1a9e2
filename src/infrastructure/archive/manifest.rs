//! Vox Manifest - 音色档案清单
//!
//! 档案内 `manifest.json` 的结构定义。带版本号，向后兼容读取。

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::VoiceProfile;

/// 当前清单格式版本
pub const FORMAT_VERSION: &str = "2.0";
/// 可读取的最低主版本
pub const MIN_MAJOR_VERSION: u32 = 1;

/// 档案内清单条目路径
pub const MANIFEST_PATH: &str = "manifest.json";
/// 样例音频固定路径
pub const SAMPLE_AUDIO_PATH: &str = "sample.wav";
/// 旧版（无索引）clone prompt 固定路径
pub const LEGACY_PROMPT_PATH: &str = "clone_prompt.bin";
/// 参考音频目录前缀
pub const REFERENCE_AUDIO_DIR: &str = "ref";

/// 旧版档案回退使用的默认 embedding key
pub const DEFAULT_EMBEDDING_KEY: &str = "default";

/// 音色来源信息
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provenance {
    /// 产生方式（如 "voice-design"、"voice-clone"）
    pub method: String,
    /// 产生该音色的引擎
    pub engine: String,
}

/// 参考音频条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReferenceAudioEntry {
    /// 档案内文件名（位于 ref/ 下）
    pub file: String,
    /// 转写文本
    pub transcript: String,
}

/// Embedding 索引行
///
/// 语义 key（模型规格 slug）到档案内路径的映射，
/// 读取方按 key 枚举而不必猜测路径。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmbeddingEntry {
    /// 模型仓库标识
    pub model: String,
    /// 引擎名
    pub engine: String,
    /// 档案内相对路径
    pub path: String,
    /// 负载格式（如 "clone-prompt-v1"）
    pub format: String,
    /// 描述
    #[serde(default)]
    pub description: String,
}

/// 音色档案清单
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoxManifest {
    /// 格式版本（语义版本字符串）
    pub format_version: String,
    /// 档案唯一标识
    pub id: Uuid,
    /// 创建时间
    pub created_at: DateTime<Utc>,
    /// 音色信息
    pub voice: VoiceProfile,
    /// 来源信息
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance: Option<Provenance>,
    /// 参考音频列表
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub reference_audio: Vec<ReferenceAudioEntry>,
    /// embedding 索引: 模型规格 slug -> 条目
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub embeddings: BTreeMap<String, EmbeddingEntry>,
}

impl VoxManifest {
    pub fn new(voice: VoiceProfile, provenance: Option<Provenance>) -> Self {
        Self {
            format_version: FORMAT_VERSION.to_string(),
            id: Uuid::new_v4(),
            created_at: Utc::now(),
            voice,
            provenance,
            reference_audio: Vec::new(),
            embeddings: BTreeMap::new(),
        }
    }

    /// 解析主版本号
    ///
    /// "2.0" -> 2；无法解析时返回 None。
    pub fn major_version(&self) -> Option<u32> {
        self.format_version
            .split('.')
            .next()
            .and_then(|major| major.parse().ok())
    }

    /// clone prompt 的模型范围路径
    ///
    /// 形如 `embeddings/<engine>/<size-slug>/clone-prompt.bin`，
    /// 不同模型规格的 prompt 互不冲突。
    pub fn prompt_path(engine: &str, size_slug: &str) -> String {
        format!("embeddings/{}/{}/clone-prompt.bin", engine, size_slug)
    }

    /// 参考音频的档案内路径
    pub fn reference_path(file: &str) -> String {
        format!("{}/{}", REFERENCE_AUDIO_DIR, file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_manifest() -> VoxManifest {
        VoxManifest::new(
            VoiceProfile::new("旁白", "沉稳的中年男声", "zh"),
            Some(Provenance {
                method: "voice-design".to_string(),
                engine: "qwen3-tts".to_string(),
            }),
        )
    }

    #[test]
    fn test_json_roundtrip_preserves_fields() {
        let mut manifest = test_manifest();
        manifest.embeddings.insert(
            "qwen3-tts-0-6b".to_string(),
            EmbeddingEntry {
                model: "Qwen/Qwen3-TTS-0.6B".to_string(),
                engine: "qwen3-tts".to_string(),
                path: VoxManifest::prompt_path("qwen3-tts", "qwen3-tts-0-6b"),
                format: "clone-prompt-v1".to_string(),
                description: String::new(),
            },
        );
        manifest.reference_audio.push(ReferenceAudioEntry {
            file: "sample01.wav".to_string(),
            transcript: "你好，世界。".to_string(),
        });

        let json = serde_json::to_string_pretty(&manifest).unwrap();
        let parsed: VoxManifest = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, manifest);
    }

    #[test]
    fn test_major_version() {
        let mut manifest = test_manifest();
        assert_eq!(manifest.major_version(), Some(2));
        manifest.format_version = "1.3".to_string();
        assert_eq!(manifest.major_version(), Some(1));
        manifest.format_version = "garbage".to_string();
        assert_eq!(manifest.major_version(), None);
    }

    /// 旧版清单（无 embeddings / reference_audio 字段）仍可解析
    #[test]
    fn test_legacy_manifest_parses() {
        let json = format!(
            r#"{{
                "format_version": "1.0",
                "id": "{}",
                "created_at": "2025-01-01T00:00:00Z",
                "voice": {{ "name": "n", "description": "d", "language": "en" }}
            }}"#,
            Uuid::new_v4()
        );
        let parsed: VoxManifest = serde_json::from_str(&json).unwrap();
        assert!(parsed.embeddings.is_empty());
        assert!(parsed.reference_audio.is_empty());
        assert!(parsed.provenance.is_none());
    }

    #[test]
    fn test_prompt_path_is_model_scoped() {
        assert_eq!(
            VoxManifest::prompt_path("qwen3-tts", "qwen3-tts-0-6b"),
            "embeddings/qwen3-tts/qwen3-tts-0-6b/clone-prompt.bin"
        );
    }
}
