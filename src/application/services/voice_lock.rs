//! Voice Lock Service - 音色锁定
//!
//! 把参考音频固化为可跨进程复用的音色：
//! 参考 WAV -> 解码 -> 提取 clone prompt -> 序列化 ->
//! 写入两级缓存 -> 写入 .vox 档案（模型范围条目 + 参考音频条目）。

use std::sync::Arc;

use thiserror::Error;

use crate::application::ports::ModelError;
use crate::domain::{model_size_slug, VoiceId};
use crate::infrastructure::archive::VoxArchive;
use crate::infrastructure::codec::{self, CodecError};
use crate::infrastructure::memory::{
    CacheError, ClonePromptCache, ModelResourceManager, PromptMetadata, ResourceError,
};

/// clone prompt 负载格式标记
pub const PROMPT_FORMAT: &str = "clone-prompt-v1";

/// 锁定错误
#[derive(Debug, Error)]
pub enum LockError {
    #[error("Reference audio rejected: {0}")]
    Codec(#[from] CodecError),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    #[error(transparent)]
    Cache(#[from] CacheError),
}

/// 锁定请求
#[derive(Debug, Clone)]
pub struct LockRequest {
    /// 音色标识
    pub voice_id: VoiceId,
    /// 模型仓库标识
    pub repo_id: String,
    /// 引擎名（档案路径与索引使用）
    pub engine: String,
    /// 参考音频（WAV 字节）
    pub reference_wav: Vec<u8>,
    /// 参考音频文件名（写入档案 ref/ 目录）
    pub reference_file: String,
    /// 参考音频转写
    pub reference_text: String,
    /// 语言代码
    pub language: String,
}

/// 锁定结果
#[derive(Debug, Clone)]
pub struct LockOutcome {
    /// 档案中的 embedding key（模型规格 slug）
    pub embedding_key: String,
    /// 序列化 prompt 的内容指纹
    pub content_hash: String,
    /// 序列化 prompt 的字节数
    pub prompt_size: usize,
}

/// 音色锁定服务
pub struct VoiceLockService {
    models: Arc<ModelResourceManager>,
    cache: Arc<ClonePromptCache>,
}

impl VoiceLockService {
    pub fn new(models: Arc<ModelResourceManager>, cache: Arc<ClonePromptCache>) -> Self {
        Self { models, cache }
    }

    /// 锁定音色并更新档案
    ///
    /// 档案更新遵循读-改-写约定：只增改本音色的条目，
    /// 其余条目与索引行保持不变。失败时不清退既有缓存条目。
    pub async fn lock_voice(
        &self,
        request: LockRequest,
        archive: &mut VoxArchive,
    ) -> Result<LockOutcome, LockError> {
        let decoded = codec::decode(&request.reference_wav)?;
        let reference = decoded.into_buffer();

        let model = self.models.load(&request.repo_id).await?;

        tracing::info!(
            voice_id = %request.voice_id,
            repo_id = %request.repo_id,
            reference_ms = reference.duration_ms(),
            "Locking voice"
        );

        let prompt = model
            .create_clone_prompt(&reference, &request.reference_text, &request.language)
            .await?;
        let bytes = model.serialize_prompt(&prompt)?;

        let metadata = PromptMetadata::new(
            request.repo_id.clone(),
            request.engine.clone(),
            PROMPT_FORMAT,
            &bytes,
        );
        let content_hash = metadata.content_hash.clone();
        let prompt_size = bytes.len();

        // 先持久形式后派生形式，两级各放一份
        self.cache
            .store_serialized(&request.voice_id, bytes.clone(), metadata);
        self.cache.store(&request.voice_id, prompt);

        let embedding_key = model_size_slug(&request.repo_id);
        archive.set_clone_prompt(
            &embedding_key,
            &request.repo_id,
            &request.engine,
            PROMPT_FORMAT,
            "",
            bytes,
        );
        archive.add_reference_audio(
            &request.reference_file,
            request.reference_wav,
            &request.reference_text,
        );

        tracing::info!(
            voice_id = %request.voice_id,
            embedding_key = %embedding_key,
            prompt_size = prompt_size,
            "Voice locked"
        );

        Ok(LockOutcome {
            embedding_key,
            content_hash,
            prompt_size,
        })
    }

    /// 用已锁定的音色合成文本，返回 WAV 字节
    ///
    /// L2 命中直接使用句柄；未命中时从 L1 字节重建一次并回填 L2，
    /// 同一音色的后续调用不再付反序列化代价。两级皆空视作
    /// 音色未锁定（预期内的未命中，不是缺陷）。
    pub async fn speak(
        &self,
        voice_id: &VoiceId,
        repo_id: &str,
        text: &str,
        language: &str,
    ) -> Result<Vec<u8>, LockError> {
        let model = self.models.load(repo_id).await?;

        let prompt = match self.cache.get(voice_id) {
            Some(handle) => handle,
            None => {
                let (bytes, metadata) = self.cache.require_serialized(voice_id)?;
                if metadata.model_repo != repo_id {
                    tracing::warn!(
                        voice_id = %voice_id,
                        cached_model = %metadata.model_repo,
                        requested_model = %repo_id,
                        "Clone prompt was produced by a different model"
                    );
                }
                tracing::debug!(voice_id = %voice_id, "Rebuilding clone prompt from serialized bytes");
                let handle = model.deserialize_prompt(&bytes)?;
                self.cache.store(voice_id, handle.clone());
                handle
            }
        };

        let buffer = model.generate_with_prompt(text, &prompt, language).await?;
        Ok(codec::encode(&buffer))
    }
}
