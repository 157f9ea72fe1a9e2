//! Domain Layer - 领域层
//!
//! 与 I/O 无关的值对象:
//! - audio: SampleBuffer 采样缓冲
//! - voice: VoiceId / VoiceProfile 音色标识

pub mod audio;
pub mod voice;

pub use audio::{SampleBuffer, DEFAULT_SAMPLE_RATE};
pub use voice::{model_size_slug, VoiceId, VoiceProfile};
