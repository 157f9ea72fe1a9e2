//! WAV Codec - RIFF/WAVE PCM16 容器编解码
//!
//! 持久化格式约定：44 字节头（`fmt ` + `data` chunk）+ 小端 PCM16 样本，
//! chunk 按偶数字节对齐。解码按声明的 chunk 长度逐块扫描，
//! 不使用硬编码偏移。

use thiserror::Error;

use crate::domain::SampleBuffer;

/// 头部固定长度（RIFF + fmt + data 描述符）
const HEADER_LEN: usize = 44;
/// fmt chunk 的 PCM 编码标记
const FORMAT_PCM: u16 = 1;

/// 容器格式错误
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("WAV data too short: {len} bytes, need at least {HEADER_LEN}")]
    TooShort { len: usize },

    #[error("Bad magic at offset {offset}: expected {expected:?}, found {found:?}")]
    BadMagic {
        offset: usize,
        expected: &'static str,
        found: String,
    },

    #[error("Missing required chunk: {0:?}")]
    MissingChunk(&'static str),

    #[error("Malformed container: {0}")]
    Malformed(String),

    #[error("Unsupported format: {0}")]
    Unsupported(String),

    #[error("Declared data length {declared} exceeds remaining buffer {available}")]
    TruncatedData { declared: usize, available: usize },
}

/// 解码结果
#[derive(Debug, Clone)]
pub struct DecodedWav {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
    pub channels: u16,
}

impl DecodedWav {
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    pub fn into_buffer(self) -> SampleBuffer {
        SampleBuffer::new(self.samples, self.sample_rate)
    }
}

/// 浮点样本转 PCM16
///
/// 非有限值归零；clamp 到 [-1, 1]；按 32768 缩放后截断并饱和。
/// 32768 缩放保证 PCM16 -> f32 -> PCM16 逐值还原。
pub fn f32_to_pcm16(sample: f32) -> i16 {
    if !sample.is_finite() {
        return 0;
    }
    let scaled = (sample.clamp(-1.0, 1.0) * 32768.0).trunc();
    scaled.clamp(i16::MIN as f32, i16::MAX as f32) as i16
}

/// PCM16 转浮点样本
pub fn pcm16_to_f32(sample: i16) -> f32 {
    sample as f32 / 32768.0
}

/// 编码为 WAV 字节
///
/// 输出恰好 44 字节头 + 2N 字节小端 PCM16。
pub fn encode(buffer: &SampleBuffer) -> Vec<u8> {
    encode_pcm16(
        buffer.samples().iter().map(|&s| f32_to_pcm16(s)),
        buffer.len(),
        buffer.sample_rate(),
    )
}

/// 从多维模型输出编码（先展平为一维）
pub fn encode_frames(frames: Vec<Vec<f32>>, sample_rate: u32) -> Vec<u8> {
    encode(&SampleBuffer::from_frames(frames, sample_rate))
}

fn encode_pcm16(samples: impl Iterator<Item = i16>, count: usize, sample_rate: u32) -> Vec<u8> {
    let bits_per_sample: u16 = 16;
    let num_channels: u16 = 1;
    let byte_rate = sample_rate * num_channels as u32 * (bits_per_sample / 8) as u32;
    let block_align = num_channels * (bits_per_sample / 8);

    let data_size = count * 2;
    let file_size = HEADER_LEN - 8 + data_size;

    let mut wav = Vec::with_capacity(HEADER_LEN + data_size);

    // RIFF header
    wav.extend_from_slice(b"RIFF");
    wav.extend_from_slice(&(file_size as u32).to_le_bytes());
    wav.extend_from_slice(b"WAVE");

    // fmt chunk
    wav.extend_from_slice(b"fmt ");
    wav.extend_from_slice(&16u32.to_le_bytes());
    wav.extend_from_slice(&FORMAT_PCM.to_le_bytes());
    wav.extend_from_slice(&num_channels.to_le_bytes());
    wav.extend_from_slice(&sample_rate.to_le_bytes());
    wav.extend_from_slice(&byte_rate.to_le_bytes());
    wav.extend_from_slice(&block_align.to_le_bytes());
    wav.extend_from_slice(&bits_per_sample.to_le_bytes());

    // data chunk
    wav.extend_from_slice(b"data");
    wav.extend_from_slice(&(data_size as u32).to_le_bytes());
    for sample in samples {
        wav.extend_from_slice(&sample.to_le_bytes());
    }

    wav
}

#[derive(Debug)]
struct FmtChunk {
    audio_format: u16,
    num_channels: u16,
    sample_rate: u32,
    bits_per_sample: u16,
}

/// 解码 WAV 字节
///
/// 逐块扫描：按每个 chunk 声明的长度前进，奇数长度补一字节对齐；
/// 未知 chunk 跳过。任何结构问题带偏移与期望/实际值上下文报错。
pub fn decode(data: &[u8]) -> Result<DecodedWav, CodecError> {
    if data.len() < HEADER_LEN {
        return Err(CodecError::TooShort { len: data.len() });
    }

    if &data[0..4] != b"RIFF" {
        return Err(CodecError::BadMagic {
            offset: 0,
            expected: "RIFF",
            found: String::from_utf8_lossy(&data[0..4]).into_owned(),
        });
    }
    if &data[8..12] != b"WAVE" {
        return Err(CodecError::BadMagic {
            offset: 8,
            expected: "WAVE",
            found: String::from_utf8_lossy(&data[8..12]).into_owned(),
        });
    }

    let mut pos = 12;
    let mut fmt: Option<FmtChunk> = None;
    let mut data_range: Option<(usize, usize)> = None;

    while pos + 8 <= data.len() {
        let chunk_id = &data[pos..pos + 4];
        let chunk_size =
            u32::from_le_bytes([data[pos + 4], data[pos + 5], data[pos + 6], data[pos + 7]])
                as usize;
        let body_start = pos + 8;

        match chunk_id {
            b"fmt " => {
                if chunk_size < 16 {
                    return Err(CodecError::Malformed(format!(
                        "fmt chunk at offset {} declares {} bytes, need at least 16",
                        pos, chunk_size
                    )));
                }
                if body_start + 16 > data.len() {
                    return Err(CodecError::TruncatedData {
                        declared: chunk_size,
                        available: data.len() - body_start,
                    });
                }
                let f = &data[body_start..body_start + 16];
                fmt = Some(FmtChunk {
                    audio_format: u16::from_le_bytes([f[0], f[1]]),
                    num_channels: u16::from_le_bytes([f[2], f[3]]),
                    sample_rate: u32::from_le_bytes([f[4], f[5], f[6], f[7]]),
                    bits_per_sample: u16::from_le_bytes([f[14], f[15]]),
                });
            }
            b"data" => {
                let available = data.len() - body_start;
                if chunk_size > available {
                    return Err(CodecError::TruncatedData {
                        declared: chunk_size,
                        available,
                    });
                }
                data_range = Some((body_start, chunk_size));
                break;
            }
            _ => {}
        }

        // 前进到下一 chunk，奇数长度补齐
        pos = body_start + chunk_size + (chunk_size & 1);
    }

    let fmt = fmt.ok_or(CodecError::MissingChunk("fmt "))?;
    let (data_start, data_size) = data_range.ok_or(CodecError::MissingChunk("data"))?;

    if fmt.audio_format != FORMAT_PCM {
        return Err(CodecError::Unsupported(format!(
            "audio format tag {}, only PCM ({}) supported",
            fmt.audio_format, FORMAT_PCM
        )));
    }
    if fmt.bits_per_sample != 16 {
        return Err(CodecError::Unsupported(format!(
            "{} bits per sample, only 16 supported",
            fmt.bits_per_sample
        )));
    }
    if fmt.num_channels != 1 {
        return Err(CodecError::Unsupported(format!(
            "{} channels, only mono supported",
            fmt.num_channels
        )));
    }
    if data_size % 2 != 0 {
        return Err(CodecError::Malformed(format!(
            "data chunk size {} is not a whole number of 16-bit samples",
            data_size
        )));
    }

    let samples = data[data_start..data_start + data_size]
        .chunks_exact(2)
        .map(|pair| pcm16_to_f32(i16::from_le_bytes([pair[0], pair[1]])))
        .collect();

    Ok(DecodedWav {
        samples,
        sample_rate: fmt.sample_rate,
        channels: fmt.num_channels,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_from_pcm16(values: &[i16], rate: u32) -> SampleBuffer {
        SampleBuffer::new(values.iter().map(|&v| pcm16_to_f32(v)).collect(), rate)
    }

    fn decode_pcm16(wav: &[u8]) -> Vec<i16> {
        decode(wav)
            .unwrap()
            .samples
            .iter()
            .map(|&s| f32_to_pcm16(s))
            .collect()
    }

    #[test]
    fn test_roundtrip_pcm16_exact() {
        let values: Vec<i16> = vec![0, 1, -1, 100, -100, 12345, -12345, i16::MAX, i16::MIN];
        let wav = encode(&buffer_from_pcm16(&values, 24000));
        assert_eq!(wav.len(), 44 + values.len() * 2);

        let decoded = decode(&wav).unwrap();
        assert_eq!(decoded.sample_rate, 24000);
        assert_eq!(decoded.channels, 1);
        assert_eq!(decode_pcm16(&wav), values);
    }

    #[test]
    fn test_float_quantization_error_bound() {
        let original = vec![0.5f32, -0.25, 0.123456, -0.999, 0.001];
        let wav = encode(&SampleBuffer::new(original.clone(), 24000));
        let decoded = decode(&wav).unwrap();
        for (a, b) in original.iter().zip(decoded.samples.iter()) {
            assert!((a - b).abs() <= 1.0 / 32768.0, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_clamping() {
        assert_eq!(f32_to_pcm16(2.0), i16::MAX);
        assert_eq!(f32_to_pcm16(-2.0), i16::MIN);
        assert_eq!(f32_to_pcm16(1.0), i16::MAX);
        assert_eq!(f32_to_pcm16(-1.0), i16::MIN);
        assert_eq!(f32_to_pcm16(f32::NAN), 0);
        assert_eq!(f32_to_pcm16(f32::INFINITY), 0);
        assert_eq!(f32_to_pcm16(f32::NEG_INFINITY), 0);
        assert_eq!(f32_to_pcm16(0.0), 0);
    }

    #[test]
    fn test_encode_frames_flattens() {
        let wav = encode_frames(vec![vec![0.0, 0.5], vec![-0.5]], 16000);
        let decoded = decode(&wav).unwrap();
        assert_eq!(decoded.samples.len(), 3);
        assert_eq!(decoded.sample_rate, 16000);
    }

    #[test]
    fn test_too_short() {
        let err = decode(&[0u8; 20]).unwrap_err();
        assert!(matches!(err, CodecError::TooShort { len: 20 }));
    }

    #[test]
    fn test_bad_magic() {
        let mut wav = encode(&buffer_from_pcm16(&[1, 2, 3], 24000));
        wav[0..4].copy_from_slice(b"JUNK");
        let err = decode(&wav).unwrap_err();
        assert!(matches!(err, CodecError::BadMagic { offset: 0, .. }));

        let mut wav = encode(&buffer_from_pcm16(&[1, 2, 3], 24000));
        wav[8..12].copy_from_slice(b"AIFF");
        let err = decode(&wav).unwrap_err();
        assert!(matches!(err, CodecError::BadMagic { offset: 8, .. }));
    }

    /// 在 fmt 与 data 之间插入未知 chunk（奇数长度，验证对齐补齐）
    #[test]
    fn test_extra_unknown_chunks_are_skipped() {
        let values: Vec<i16> = vec![7, -7, 42];
        let wav = encode(&buffer_from_pcm16(&values, 24000));

        let mut patched = Vec::new();
        patched.extend_from_slice(&wav[..36]); // RIFF 头 + fmt chunk
        patched.extend_from_slice(b"LIST");
        patched.extend_from_slice(&5u32.to_le_bytes());
        patched.extend_from_slice(&[0xAA; 5]);
        patched.push(0); // 对齐填充
        patched.extend_from_slice(b"junk");
        patched.extend_from_slice(&4u32.to_le_bytes());
        patched.extend_from_slice(&[0xBB; 4]);
        patched.extend_from_slice(&wav[36..]); // data chunk
        let riff_size = (patched.len() - 8) as u32;
        patched[4..8].copy_from_slice(&riff_size.to_le_bytes());

        assert_eq!(decode_pcm16(&patched), values);
    }

    #[test]
    fn test_declared_data_exceeds_buffer() {
        let mut wav = encode(&buffer_from_pcm16(&[1, 2, 3, 4], 24000));
        // data chunk 的长度字段在偏移 40
        wav[40..44].copy_from_slice(&1000u32.to_le_bytes());
        let err = decode(&wav).unwrap_err();
        assert!(matches!(
            err,
            CodecError::TruncatedData {
                declared: 1000,
                available: 8
            }
        ));
    }

    #[test]
    fn test_missing_chunks() {
        let wav = encode(&buffer_from_pcm16(&[1], 24000));

        // 抹掉 fmt 标识，使其成为未知 chunk
        let mut no_fmt = wav.clone();
        no_fmt[12..16].copy_from_slice(b"xxxx");
        assert!(matches!(
            decode(&no_fmt).unwrap_err(),
            CodecError::MissingChunk("fmt ")
        ));

        // 抹掉 data 标识
        let mut no_data = wav;
        no_data[36..40].copy_from_slice(b"xxxx");
        assert!(matches!(
            decode(&no_data).unwrap_err(),
            CodecError::MissingChunk("data")
        ));
    }

    #[test]
    fn test_unsupported_formats() {
        let wav = encode(&buffer_from_pcm16(&[1, 2], 24000));

        // 双声道
        let mut stereo = wav.clone();
        stereo[22..24].copy_from_slice(&2u16.to_le_bytes());
        assert!(matches!(
            decode(&stereo).unwrap_err(),
            CodecError::Unsupported(_)
        ));

        // 8 位样本
        let mut eight_bit = wav.clone();
        eight_bit[34..36].copy_from_slice(&8u16.to_le_bytes());
        assert!(matches!(
            decode(&eight_bit).unwrap_err(),
            CodecError::Unsupported(_)
        ));

        // 非 PCM 编码
        let mut float_fmt = wav;
        float_fmt[20..22].copy_from_slice(&3u16.to_le_bytes());
        assert!(matches!(
            decode(&float_fmt).unwrap_err(),
            CodecError::Unsupported(_)
        ));
    }
}
