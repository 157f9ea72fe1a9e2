//! Voice - 音色标识与描述值对象

use serde::{Deserialize, Serialize};

/// 音色唯一标识
///
/// 稳定的字符串 key，作用于缓存条目与档案命名。
/// 不变量: 非空，长度不超过 128 字符。
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoiceId(String);

impl VoiceId {
    pub fn new(id: impl Into<String>) -> Result<Self, &'static str> {
        let id = id.into();
        if id.is_empty() {
            return Err("音色标识不能为空");
        }
        if id.len() > 128 {
            return Err("音色标识长度不能超过128字符");
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for VoiceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 音色描述
///
/// 档案 manifest 中的 voice 块。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceProfile {
    /// 音色名称
    pub name: String,
    /// 自然语言描述（如 "低沉温暖的男声，略带沙哑"）
    pub description: String,
    /// 语言代码（如 "zh"、"en"）
    pub language: String,
}

impl VoiceProfile {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        language: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            language: language.into(),
        }
    }
}

/// 从模型仓库 ID 派生规格 slug
///
/// 取仓库路径的最后一段，小写化并把非字母数字字符折叠为 `-`，
/// 用作档案中按模型规格区分的 embedding key。
/// 例: "Qwen/Qwen3-TTS-0.6B" -> "qwen3-tts-0-6b"
pub fn model_size_slug(repo_id: &str) -> String {
    let last = repo_id.rsplit('/').next().unwrap_or(repo_id);
    let mut slug = String::with_capacity(last.len());
    let mut prev_dash = false;
    for ch in last.chars() {
        if ch.is_ascii_alphanumeric() {
            slug.extend(ch.to_lowercase());
            prev_dash = false;
        } else if !prev_dash && !slug.is_empty() {
            slug.push('-');
            prev_dash = true;
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
