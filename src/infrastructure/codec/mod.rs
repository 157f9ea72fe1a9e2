//! Audio Codec - PCM 音频容器编解码

pub mod wav;

pub use wav::{decode, encode, encode_frames, f32_to_pcm16, pcm16_to_f32, CodecError, DecodedWav};
