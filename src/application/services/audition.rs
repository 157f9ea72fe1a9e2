//! Candidate Orchestrator - 候选音频编排
//!
//! 音色设计试听：从同一音色描述并发生成 N 个独立种子的候选样本，
//! 无论完成顺序如何，结果按输入序返回。全有或全无：
//! 任一任务失败即中止其余在途任务，不返回部分结果。

use std::sync::Arc;

use thiserror::Error;
use tokio::task::JoinSet;

use crate::application::ports::{GenerateRequest, GenerationParams};
use crate::infrastructure::codec;
use crate::infrastructure::memory::{ModelResourceManager, ResourceError};

/// 编排错误
#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Resource(#[from] ResourceError),

    #[error("Generation failed for candidate {index}: {reason}")]
    GenerationFailed { index: usize, reason: String },

    #[error("Candidate task failed: {0}")]
    TaskFailure(String),
}

/// 候选生成请求
#[derive(Debug, Clone)]
pub struct CandidateRequest {
    /// 模型仓库标识
    pub repo_id: String,
    /// 试听文本
    pub text: String,
    /// 音色的自然语言描述
    pub voice_description: String,
    /// 语言代码
    pub language: String,
    /// 候选数量（预期不超过 10，每个任务都是重操作）
    pub count: usize,
    /// 基准种子，第 i 个候选使用 base_seed + i
    pub base_seed: u64,
    /// 共享生成参数
    pub params: GenerationParams,
}

/// 一个候选样本
#[derive(Debug, Clone)]
pub struct Candidate {
    /// 输入序索引
    pub index: usize,
    /// 本候选使用的种子
    pub seed: u64,
    /// WAV 编码的音频
    pub wav: Vec<u8>,
    /// 时长（毫秒）
    pub duration_ms: u64,
    /// 采样率
    pub sample_rate: u32,
}

/// 候选编排器
pub struct CandidateOrchestrator {
    models: Arc<ModelResourceManager>,
}

impl CandidateOrchestrator {
    pub fn new(models: Arc<ModelResourceManager>) -> Self {
        Self { models }
    }

    /// 并发生成 N 个候选，按输入序返回
    ///
    /// 模型在扇出之外解析一次（加载是 single-flight 的重操作），
    /// 共享参数组装一次，每个任务携带自己的原始索引与种子。
    pub async fn generate(
        &self,
        request: CandidateRequest,
    ) -> Result<Vec<Candidate>, OrchestratorError> {
        request
            .params
            .validate()
            .map_err(|e| OrchestratorError::InvalidRequest(e.to_string()))?;
        if request.count == 0 {
            return Ok(Vec::new());
        }

        let model = self.models.load(&request.repo_id).await?;

        tracing::info!(
            repo_id = %request.repo_id,
            count = request.count,
            base_seed = request.base_seed,
            "Generating candidates"
        );

        let mut tasks = JoinSet::new();
        for index in 0..request.count {
            let model = model.clone();
            let seed = request.base_seed + index as u64;
            let generate_request = GenerateRequest {
                text: request.text.clone(),
                voice_description: request.voice_description.clone(),
                reference_audio: None,
                reference_text: None,
                language: request.language.clone(),
                params: request.params.with_seed(seed),
            };
            tasks.spawn(async move {
                let result = model.generate(generate_request).await;
                (index, seed, result)
            });
        }

        let mut completed = Vec::with_capacity(request.count);
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, seed, Ok(buffer))) => {
                    tracing::debug!(index = index, seed = seed, "Candidate ready");
                    completed.push((index, seed, buffer));
                }
                Ok((index, _, Err(e))) => {
                    // 首个失败即中止其余在途任务，限制资源占用
                    tasks.abort_all();
                    tracing::error!(index = index, error = %e, "Candidate generation failed");
                    return Err(OrchestratorError::GenerationFailed {
                        index,
                        reason: e.to_string(),
                    });
                }
                Err(join_error) if join_error.is_cancelled() => continue,
                Err(join_error) => {
                    tasks.abort_all();
                    return Err(OrchestratorError::TaskFailure(join_error.to_string()));
                }
            }
        }

        // 完成顺序无约束，按原始索引恢复输入序
        completed.sort_by_key(|(index, _, _)| *index);
        Ok(completed
            .into_iter()
            .map(|(index, seed, buffer)| Candidate {
                index,
                seed,
                duration_ms: buffer.duration_ms(),
                sample_rate: buffer.sample_rate(),
                wav: codec::encode(&buffer),
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;

    use crate::application::ports::{
        ModelError, ModelLoaderPort, PromptHandle, SpeechModelPort,
    };
    use crate::domain::SampleBuffer;

    const BASE_SEED: u64 = 100;

    /// 按种子定制行为的试听假模型：
    /// - 完成顺序与索引相反（索引越小延迟越长）
    /// - 样本首值编码种子，便于核对结果归位
    struct AuditionModel {
        fail_index: Option<usize>,
        completed: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl SpeechModelPort for AuditionModel {
        fn repo_id(&self) -> &str {
            "repo/audition"
        }

        async fn generate(&self, request: GenerateRequest) -> Result<SampleBuffer, ModelError> {
            let seed = request.params.seed.expect("orchestrator must pin the seed");
            let index = (seed - BASE_SEED) as usize;

            if self.fail_index == Some(index) {
                return Err(ModelError::Generation(format!("candidate {} exploded", index)));
            }

            // 逆序完成：索引 0 最慢
            tokio::time::sleep(Duration::from_millis(20 * (5 - index as u64))).await;
            self.completed.fetch_add(1, Ordering::SeqCst);
            Ok(SampleBuffer::with_default_rate(vec![
                codec::pcm16_to_f32(seed as i16),
            ]))
        }

        async fn create_clone_prompt(
            &self,
            _reference_audio: &SampleBuffer,
            _reference_text: &str,
            _language: &str,
        ) -> Result<PromptHandle, ModelError> {
            Ok(PromptHandle::new(()))
        }

        fn serialize_prompt(&self, _prompt: &PromptHandle) -> Result<Vec<u8>, ModelError> {
            Ok(Vec::new())
        }

        fn deserialize_prompt(&self, _bytes: &[u8]) -> Result<PromptHandle, ModelError> {
            Ok(PromptHandle::new(()))
        }

        async fn generate_with_prompt(
            &self,
            _text: &str,
            _prompt: &PromptHandle,
            _language: &str,
        ) -> Result<SampleBuffer, ModelError> {
            Ok(SampleBuffer::with_default_rate(Vec::new()))
        }
    }

    struct AuditionLoader {
        fail_index: Option<usize>,
        completed: Arc<AtomicUsize>,
        load_count: AtomicUsize,
    }

    #[async_trait]
    impl ModelLoaderPort for AuditionLoader {
        async fn load(&self, _repo_id: &str) -> Result<Arc<dyn SpeechModelPort>, ModelError> {
            self.load_count.fetch_add(1, Ordering::SeqCst);
            Ok(Arc::new(AuditionModel {
                fail_index: self.fail_index,
                completed: self.completed.clone(),
            }))
        }

        fn estimated_bytes(&self, _repo_id: &str) -> u64 {
            0
        }
    }

    fn orchestrator(fail_index: Option<usize>) -> (CandidateOrchestrator, Arc<AtomicUsize>, Arc<AuditionLoader>) {
        let completed = Arc::new(AtomicUsize::new(0));
        let loader = Arc::new(AuditionLoader {
            fail_index,
            completed: completed.clone(),
            load_count: AtomicUsize::new(0),
        });
        let models = ModelResourceManager::new(loader.clone()).arc();
        (CandidateOrchestrator::new(models), completed, loader)
    }

    fn request(count: usize) -> CandidateRequest {
        CandidateRequest {
            repo_id: "repo/audition".to_string(),
            text: "请听这段试音。".to_string(),
            voice_description: "清亮的年轻女声".to_string(),
            language: "zh".to_string(),
            count,
            base_seed: BASE_SEED,
            params: GenerationParams::default(),
        }
    }

    /// 逆序完成的 5 个任务仍按索引 0..5 返回
    #[tokio::test]
    async fn test_results_ordered_by_index() {
        let (orchestrator, _, loader) = orchestrator(None);

        let candidates = orchestrator.generate(request(5)).await.unwrap();

        assert_eq!(candidates.len(), 5);
        for (i, candidate) in candidates.iter().enumerate() {
            assert_eq!(candidate.index, i);
            assert_eq!(candidate.seed, BASE_SEED + i as u64);
            // 音频首样本编码了种子：核对内容确实属于该索引
            let decoded = codec::decode(&candidate.wav).unwrap();
            assert_eq!(
                codec::f32_to_pcm16(decoded.samples[0]),
                (BASE_SEED + i as u64) as i16
            );
        }

        // 模型在扇出之外只解析一次
        assert_eq!(loader.load_count.load(Ordering::SeqCst), 1);
    }

    /// 索引 3 失败：错误携带索引，无部分结果，兄弟任务被中止
    #[tokio::test]
    async fn test_first_failure_aborts_run() {
        let (orchestrator, completed, _) = orchestrator(Some(3));

        let result = tokio::time::timeout(
            Duration::from_secs(5),
            orchestrator.generate(request(5)),
        )
        .await
        .expect("eager abort must not wait for slow siblings");

        match result.unwrap_err() {
            OrchestratorError::GenerationFailed { index, reason } => {
                assert_eq!(index, 3);
                assert!(reason.contains("candidate 3"));
            }
            other => panic!("unexpected error: {:?}", other),
        }

        // 失败的任务（索引 3）不 sleep 立即返回，慢任务全部被中止
        assert_eq!(completed.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_zero_count_returns_empty() {
        let (orchestrator, _, loader) = orchestrator(None);
        let candidates = orchestrator.generate(request(0)).await.unwrap();
        assert!(candidates.is_empty());
        // 空请求不触发模型加载
        assert_eq!(loader.load_count.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_invalid_params_rejected() {
        let (orchestrator, _, _) = orchestrator(None);
        let mut bad = request(3);
        bad.params.temperature = 0.0;
        assert!(matches!(
            orchestrator.generate(bad).await.unwrap_err(),
            OrchestratorError::InvalidRequest(_)
        ));
    }
}
