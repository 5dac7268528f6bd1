use rubato::{FftFixedIn, Resampler};
use tracing::debug;

/// Sample rate the audio model expects
pub const TARGET_SAMPLE_RATE: u32 = 16000;

/// Input chunk size fed to the FFT resampler
const CHUNK_FRAMES: usize = 1024;

/// Whole-clip mono resampler built on rubato's fixed-input FFT resampler
pub struct AudioResampler {
    resampler: FftFixedIn<f32>,
    input_buffer: Vec<Vec<f32>>,
    output_buffer: Vec<Vec<f32>>,
    source_rate: u32,
    target_rate: u32,
}

impl AudioResampler {
    pub fn new(source_rate: u32, target_rate: u32) -> Result<Self, String> {
        debug!(
            "Creating resampler: {} Hz -> {} Hz (ratio: {:.4})",
            source_rate,
            target_rate,
            target_rate as f64 / source_rate as f64
        );

        let resampler = FftFixedIn::new(
            source_rate as usize,
            target_rate as usize,
            CHUNK_FRAMES,
            2, // sub_chunks for quality
            1, // mono
        )
        .map_err(|e| format!("Failed to create resampler: {}", e))?;

        let input_buffer = vec![vec![0.0f32; CHUNK_FRAMES]; 1];
        let output_buffer = resampler.output_buffer_allocate(true);

        Ok(Self {
            resampler,
            input_buffer,
            output_buffer,
            source_rate,
            target_rate,
        })
    }

    /// Number of output samples a clip of `input_len` samples maps to
    pub fn expected_len(&self, input_len: usize) -> usize {
        let num = input_len as u64 * self.target_rate as u64;
        num.div_ceil(self.source_rate as u64) as usize
    }

    fn process_chunk(&mut self, chunk: &[f32], out: &mut Vec<f32>) -> Result<(), String> {
        self.input_buffer[0][..chunk.len()].copy_from_slice(chunk);
        self.input_buffer[0][chunk.len()..].fill(0.0);

        let (_, output_frames) = self
            .resampler
            .process_into_buffer(&self.input_buffer, &mut self.output_buffer, None)
            .map_err(|e| format!("Resampling failed: {}", e))?;

        out.extend_from_slice(&self.output_buffer[0][..output_frames]);
        Ok(())
    }

    /// Resample a complete clip, compensating for the resampler's delay so the
    /// output is aligned with the input and exactly `expected_len` long.
    pub fn process_clip(&mut self, samples: &[f32]) -> Result<Vec<f32>, String> {
        self.resampler.reset();

        let delay = self.resampler.output_delay();
        let wanted = self.expected_len(samples.len());
        let mut out = Vec::with_capacity(wanted + delay + CHUNK_FRAMES);

        for chunk in samples.chunks(CHUNK_FRAMES) {
            self.process_chunk(chunk, &mut out)?;
        }
        // Flush with silence until the delayed tail has come out
        while out.len() < delay + wanted {
            self.process_chunk(&[], &mut out)?;
        }

        Ok(out[delay..delay + wanted].to_vec())
    }
}

/// Resample `samples` from `source_rate` to `target_rate`; a no-op copy when equal
pub fn resample(samples: &[f32], source_rate: u32, target_rate: u32) -> Result<Vec<f32>, String> {
    if source_rate == target_rate || samples.is_empty() {
        return Ok(samples.to_vec());
    }
    AudioResampler::new(source_rate, target_rate)?.process_clip(samples)
}
