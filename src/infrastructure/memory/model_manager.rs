//! Model Resource Manager - 驻留模型管理
//!
//! 围绕单个重量级推理模型句柄的 single-flight 缓存。
//! 模型持有大块设备驻留张量，所有加载/卸载经由同一把锁串行化，
//! 避免并发请求同时加载两个模型撑爆设备内存。

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::Mutex;

use super::sysmem;
use crate::application::ports::{ModelLoaderPort, SpeechModelPort};
use crate::config::MemoryConfig;

/// 内存预估的默认安全系数
pub const DEFAULT_HEADROOM: f64 = 1.5;

/// 资源管理错误
#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("Model unavailable: {repo_id}: {reason}")]
    ModelUnavailable { repo_id: String, reason: String },

    #[error("Insufficient memory: available {available} bytes, required {required} bytes")]
    InsufficientMemory { available: u64, required: u64 },
}

/// 驻留中的模型
struct ResidentModel {
    repo_id: String,
    model: Arc<dyn SpeechModelPort>,
}

/// 驻留模型管理器
///
/// 任意时刻至多一个存活句柄。锁跨越整个加载过程，
/// 并发的不同仓库加载严格排队：先到者先加载，后到者观察到切换。
pub struct ModelResourceManager {
    loader: Arc<dyn ModelLoaderPort>,
    resident: Mutex<Option<ResidentModel>>,
    headroom: f64,
    enforce_memory: bool,
}

impl ModelResourceManager {
    pub fn new(loader: Arc<dyn ModelLoaderPort>) -> Self {
        Self::with_headroom(loader, DEFAULT_HEADROOM)
    }

    pub fn with_headroom(loader: Arc<dyn ModelLoaderPort>, headroom: f64) -> Self {
        Self {
            loader,
            resident: Mutex::new(None),
            headroom,
            enforce_memory: false,
        }
    }

    pub fn from_config(loader: Arc<dyn ModelLoaderPort>, config: &MemoryConfig) -> Self {
        Self {
            loader,
            resident: Mutex::new(None),
            headroom: config.headroom,
            enforce_memory: config.enforce,
        }
    }

    pub fn arc(self) -> Arc<Self> {
        Arc::new(self)
    }

    /// 加载（或复用）指定仓库的模型
    ///
    /// 同仓库重复调用只发生一次底层加载，返回同一句柄；
    /// 切换仓库先卸载当前句柄再加载。加载失败不留陈旧句柄。
    pub async fn load(&self, repo_id: &str) -> Result<Arc<dyn SpeechModelPort>, ResourceError> {
        let mut resident = self.resident.lock().await;

        if let Some(current) = resident.as_ref() {
            if current.repo_id == repo_id {
                tracing::debug!(repo_id = %repo_id, "Model already resident");
                return Ok(current.model.clone());
            }
        }

        if let Some(previous) = resident.take() {
            tracing::info!(
                from = %previous.repo_id,
                to = %repo_id,
                "Unloading resident model before switch"
            );
            drop(previous);
        }

        let required = self.loader.estimated_bytes(repo_id);
        if self.enforce_memory {
            self.validate_memory(required)?;
        } else {
            self.check_memory(required);
        }

        tracing::info!(repo_id = %repo_id, "Loading model");
        match self.loader.load(repo_id).await {
            Ok(model) => {
                *resident = Some(ResidentModel {
                    repo_id: repo_id.to_string(),
                    model: model.clone(),
                });
                tracing::info!(repo_id = %repo_id, "Model resident");
                Ok(model)
            }
            Err(e) => {
                // resident 已置空，失败不留陈旧句柄
                tracing::error!(repo_id = %repo_id, error = %e, "Model load failed");
                Err(ResourceError::ModelUnavailable {
                    repo_id: repo_id.to_string(),
                    reason: e.to_string(),
                })
            }
        }
    }

    /// 卸载驻留模型（幂等）
    pub async fn unload(&self) {
        let mut resident = self.resident.lock().await;
        if let Some(previous) = resident.take() {
            tracing::info!(repo_id = %previous.repo_id, "Model unloaded");
        }
    }

    /// 当前驻留的仓库标识
    pub async fn current_repo(&self) -> Option<String> {
        self.resident.lock().await.as_ref().map(|r| r.repo_id.clone())
    }

    pub async fn is_loaded(&self) -> bool {
        self.resident.lock().await.is_some()
    }

    /// 内存预检（仅告警，不阻止）
    ///
    /// 预估值乘以安全系数后与可回收内存比较。可回收类别
    /// （inactive、purgeable 等）对操作系统按需可得，
    /// 看似"不可用"并不代表真的不可用，因此默认只告警。
    pub fn check_memory(&self, required_bytes: u64) -> bool {
        let needed = (required_bytes as f64 * self.headroom) as u64;
        let available = sysmem::reclaimable_bytes();
        if available < needed {
            tracing::warn!(
                required = required_bytes,
                with_headroom = needed,
                available = available,
                "Memory check failed, proceeding anyway"
            );
            false
        } else {
            true
        }
    }

    /// 内存硬门槛（需要硬性保障的调用方使用）
    pub fn validate_memory(&self, required_bytes: u64) -> Result<(), ResourceError> {
        let needed = (required_bytes as f64 * self.headroom) as u64;
        let available = sysmem::reclaimable_bytes();
        if available < needed {
            return Err(ResourceError::InsufficientMemory {
                available,
                required: needed,
            });
        }
        Ok(())
    }
}
