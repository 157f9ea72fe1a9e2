//! Speech Model Port - 推理模型抽象
//!
//! 定义语音生成模型的抽象接口，具体实现（张量运算、解码）在本 crate 之外。
//! 接口一次性覆盖生成、clone prompt 提取与 prompt (反)序列化，
//! 调用方无需对模型做任何运行时类型判断。

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::SampleBuffer;

/// 模型错误
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("Model load failed: {repo_id}: {reason}")]
    LoadFailed { repo_id: String, reason: String },

    #[error("Generation failed: {0}")]
    Generation(String),

    #[error("Prompt serialization failed: {0}")]
    PromptSerialization(String),

    #[error("Unsupported prompt payload: {0}")]
    UnsupportedPrompt(String),
}

/// 生成参数
#[derive(Debug, Clone)]
pub struct GenerationParams {
    /// 随机种子（None 表示由实现自行选择）
    pub seed: Option<u64>,
    /// 采样温度 (0.0 - 2.0，须大于 0)
    pub temperature: f32,
    /// top-k 采样
    pub top_k: u32,
    /// top-p 核采样 (0.0 - 1.0]
    pub top_p: f32,
    /// 最大生成 token 数
    pub max_new_tokens: usize,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            seed: None,
            temperature: 0.9,
            top_k: 50,
            top_p: 0.95,
            max_new_tokens: 2048,
        }
    }
}

impl GenerationParams {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(self.temperature > 0.0 && self.temperature <= 2.0) {
            return Err("温度必须在 (0.0, 2.0] 之间");
        }
        if !(self.top_p > 0.0 && self.top_p <= 1.0) {
            return Err("top_p 必须在 (0.0, 1.0] 之间");
        }
        if self.max_new_tokens == 0 {
            return Err("max_new_tokens 必须大于 0");
        }
        Ok(())
    }

    /// 派生固定种子的参数副本
    pub fn with_seed(&self, seed: u64) -> Self {
        let mut params = self.clone();
        params.seed = Some(seed);
        params
    }
}

/// 生成请求
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    /// 要合成的文本
    pub text: String,
    /// 音色的自然语言描述
    pub voice_description: String,
    /// 参考音频（克隆路径使用）
    pub reference_audio: Option<SampleBuffer>,
    /// 参考音频的转写文本
    pub reference_text: Option<String>,
    /// 语言代码
    pub language: String,
    /// 生成参数
    pub params: GenerationParams,
}

/// 不透明的 clone prompt 句柄
///
/// 模型相关的说话人表征（embedding / reference code），对调用方不透明。
/// 具体模型实现通过 `downcast_ref` 取回自己的负载类型。
#[derive(Clone)]
pub struct PromptHandle {
    inner: Arc<dyn Any + Send + Sync>,
}

impl PromptHandle {
    pub fn new<T: Any + Send + Sync>(payload: T) -> Self {
        Self {
            inner: Arc::new(payload),
        }
    }

    pub fn downcast_ref<T: Any + Send + Sync>(&self) -> Option<&T> {
        self.inner.downcast_ref::<T>()
    }
}

impl std::fmt::Debug for PromptHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptHandle").finish_non_exhaustive()
    }
}

/// Speech Model Port
///
/// 驻留推理模型的抽象接口。句柄由 ModelResourceManager 独占持有，
/// 生成与 prompt 提取是仅有的长耗时（秒级）操作。
#[async_trait]
pub trait SpeechModelPort: Send + Sync {
    /// 模型仓库标识
    fn repo_id(&self) -> &str;

    /// 按音色描述（可选参考音频）合成
    async fn generate(&self, request: GenerateRequest) -> Result<SampleBuffer, ModelError>;

    /// 从参考音频提取 clone prompt
    async fn create_clone_prompt(
        &self,
        reference_audio: &SampleBuffer,
        reference_text: &str,
        language: &str,
    ) -> Result<PromptHandle, ModelError>;

    /// 将 clone prompt 序列化为持久化字节
    fn serialize_prompt(&self, prompt: &PromptHandle) -> Result<Vec<u8>, ModelError>;

    /// 从持久化字节还原 clone prompt
    fn deserialize_prompt(&self, bytes: &[u8]) -> Result<PromptHandle, ModelError>;

    /// 用已有 clone prompt 合成
    async fn generate_with_prompt(
        &self,
        text: &str,
        prompt: &PromptHandle,
        language: &str,
    ) -> Result<SampleBuffer, ModelError>;
}

/// Model Loader Port
///
/// 外部模型加载器的抽象接口。加载是重操作，
/// 由 ModelResourceManager 串行化调用。
#[async_trait]
pub trait ModelLoaderPort: Send + Sync {
    /// 加载指定仓库的模型
    async fn load(&self, repo_id: &str) -> Result<Arc<dyn SpeechModelPort>, ModelError>;

    /// 估算模型占用的常驻内存（字节），用于加载前的内存检查
    fn estimated_bytes(&self, repo_id: &str) -> u64;
}
