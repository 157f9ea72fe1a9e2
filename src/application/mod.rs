//! 应用层 - 用例编排
//!
//! 包含：
//! - ports: 推理模型端口定义（SpeechModelPort、ModelLoaderPort）
//! - services: 候选音频编排与音色锁定服务

pub mod ports;
pub mod services;

pub use services::{
    Candidate, CandidateOrchestrator, CandidateRequest, LockError, LockOutcome, LockRequest,
    OrchestratorError, VoiceLockService,
};
