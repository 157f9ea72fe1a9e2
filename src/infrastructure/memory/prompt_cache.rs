//! Clone Prompt Cache - 二级缓存
//!
//! 按音色标识组织的两级缓存：
//! - L1: 序列化字节（权威形式，可持久化到 .vox 档案）
//! - L2: 反序列化句柄（派生形式，可随时从 L1 重建）
//!
//! 反序列化开销远大于一次查找，同一音色的重复生成
//! 只在首次使用（或显式失效后）付一次反序列化代价。

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use thiserror::Error;

use crate::application::ports::PromptHandle;
use crate::domain::VoiceId;

/// 缓存错误
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Voice not found in cache: {0}")]
    VoiceNotFound(String),
}

/// L1 条目的元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptMetadata {
    /// 产生该 prompt 的模型仓库
    pub model_repo: String,
    /// 引擎名
    pub engine: String,
    /// 负载格式
    pub format: String,
    /// 序列化字节的 MD5 指纹
    pub content_hash: String,
    /// 存入时间
    pub created_at: DateTime<Utc>,
}

impl PromptMetadata {
    pub fn new(
        model_repo: impl Into<String>,
        engine: impl Into<String>,
        format: impl Into<String>,
        bytes: &[u8],
    ) -> Self {
        Self {
            model_repo: model_repo.into(),
            engine: engine.into(),
            format: format.into(),
            content_hash: content_hash(bytes),
            created_at: Utc::now(),
        }
    }
}

/// 序列化字节的内容指纹
pub fn content_hash(bytes: &[u8]) -> String {
    format!("{:x}", md5::compute(bytes))
}

#[derive(Default)]
struct CacheSlot {
    /// L1: 序列化字节 + 元数据
    serialized: Option<(Vec<u8>, PromptMetadata)>,
    /// L2: 反序列化句柄
    handle: Option<PromptHandle>,
}

/// 缓存统计
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub total_entries: usize,
    pub hit_count: u64,
    pub miss_count: u64,
}

/// Clone prompt 二级缓存
///
/// 条目只因显式清除而失效，不做容量淘汰（prompt 数量与音色数同阶）。
pub struct ClonePromptCache {
    slots: DashMap<String, CacheSlot>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
}

impl ClonePromptCache {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
        }
    }

    /// L2 查找
    ///
    /// 只报告命中/未命中，从不自动反序列化。
    pub fn get(&self, id: &VoiceId) -> Option<PromptHandle> {
        let handle = self
            .slots
            .get(id.as_str())
            .and_then(|slot| slot.handle.clone());
        match handle {
            Some(handle) => {
                self.hit_count.fetch_add(1, Ordering::Relaxed);
                Some(handle)
            }
            None => {
                self.miss_count.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// 存入 L2 句柄
    pub fn store(&self, id: &VoiceId, handle: PromptHandle) {
        self.slots
            .entry(id.as_str().to_string())
            .or_default()
            .handle = Some(handle);
        tracing::debug!(voice_id = %id, "Clone prompt handle cached");
    }

    /// 存入 L1 序列化字节
    pub fn store_serialized(&self, id: &VoiceId, bytes: Vec<u8>, metadata: PromptMetadata) {
        let size = bytes.len();
        self.slots
            .entry(id.as_str().to_string())
            .or_default()
            .serialized = Some((bytes, metadata));
        tracing::debug!(voice_id = %id, size_bytes = size, "Serialized clone prompt cached");
    }

    /// L1 读取
    pub fn serialized(&self, id: &VoiceId) -> Option<(Vec<u8>, PromptMetadata)> {
        self.slots
            .get(id.as_str())
            .and_then(|slot| slot.serialized.clone())
    }

    /// L1 读取，缺失视作错误（调用方要求必须存在时使用）
    pub fn require_serialized(&self, id: &VoiceId) -> Result<(Vec<u8>, PromptMetadata), CacheError> {
        self.serialized(id)
            .ok_or_else(|| CacheError::VoiceNotFound(id.to_string()))
    }

    /// 删除单个音色的两级条目
    pub fn remove(&self, id: &VoiceId) {
        self.slots.remove(id.as_str());
    }

    /// 清空两级缓存
    pub fn clear(&self) {
        let count = self.slots.len();
        self.slots.clear();
        tracing::info!(evicted = count, "Clone prompt cache cleared");
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            total_entries: self.slots.len(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }
}

impl Default for ClonePromptCache {
    fn default() -> Self {
        Self::new()
    }
}
