//! Audio - 采样缓冲值对象

/// 默认采样率 (Hz)
pub const DEFAULT_SAMPLE_RATE: u32 = 24000;

/// 单声道采样缓冲
///
/// 与推理模型之间的交换形式：浮点样本，取值范围 [-1.0, 1.0]。
/// 持久化形式为 PCM16，转换由 codec 负责。
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBuffer {
    samples: Vec<f32>,
    sample_rate: u32,
}

impl SampleBuffer {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    /// 按默认采样率构造
    pub fn with_default_rate(samples: Vec<f32>) -> Self {
        Self::new(samples, DEFAULT_SAMPLE_RATE)
    }

    /// 从多维输出（逐帧）展平为一维缓冲
    ///
    /// 模型可能按批次/分块返回样本，按行优先顺序拼接。
    pub fn from_frames(frames: Vec<Vec<f32>>, sample_rate: u32) -> Self {
        let total: usize = frames.iter().map(|f| f.len()).sum();
        let mut samples = Vec::with_capacity(total);
        for frame in frames {
            samples.extend(frame);
        }
        Self::new(samples, sample_rate)
    }

    pub fn samples(&self) -> &[f32] {
        &self.samples
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// 时长（毫秒）
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / self.sample_rate as u64
    }

    pub fn into_samples(self) -> Vec<f32> {
        self.samples
    }
}
