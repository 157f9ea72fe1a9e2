//! Application Services - 用例服务
//!
//! - audition: 候选音频并发编排
//! - voice_lock: 音色锁定流水线

mod audition;
mod voice_lock;

pub use audition::{Candidate, CandidateOrchestrator, CandidateRequest, OrchestratorError};
pub use voice_lock::{LockError, LockOutcome, LockRequest, VoiceLockService, PROMPT_FORMAT};
