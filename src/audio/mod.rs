pub mod resampler;
pub mod wav;

pub use resampler::{resample, AudioResampler, TARGET_SAMPLE_RATE};
pub use wav::{encode_wav, read_wav};

/// Mono waveform normalized to [-1.0, 1.0]
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioClip {
    pub fn new(samples: Vec<f32>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
        }
    }

    pub fn duration_secs(&self) -> f32 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f32 / self.sample_rate as f32
    }

    /// This clip at `target_rate`, borrowing when no conversion is needed
    pub fn to_rate(&self, target_rate: u32) -> Result<std::borrow::Cow<'_, AudioClip>, String> {
        if self.sample_rate == target_rate {
            return Ok(std::borrow::Cow::Borrowed(self));
        }
        let samples = resample(&self.samples, self.sample_rate, target_rate)?;
        Ok(std::borrow::Cow::Owned(AudioClip::new(samples, target_rate)))
    }
}
