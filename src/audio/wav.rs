use std::io::Cursor;
use std::path::Path;

use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use tracing::debug;

use super::AudioClip;
use crate::error::{EvalError, Result};

fn audio_error(path: &Path, message: impl Into<String>) -> EvalError {
    EvalError::Audio {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Average interleaved frames down to one channel
pub fn downmix_to_mono(samples: &[f32], channels: u16) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks(channels as usize)
        .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
        .collect()
}

/// Decode a WAV file into a mono clip normalized to [-1.0, 1.0]
pub fn read_wav(path: &Path) -> Result<AudioClip> {
    let reader = WavReader::open(path).map_err(|e| audio_error(path, e.to_string()))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .into_samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| audio_error(path, e.to_string()))?,
        SampleFormat::Int => {
            let max_val = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .into_samples::<i32>()
                .map(|s| s.map(|v| v as f32 / max_val))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| audio_error(path, e.to_string()))?
        }
    };

    debug!(
        "Read {:?}: {} Hz, {} channels, {} bits, {} samples",
        path,
        spec.sample_rate,
        spec.channels,
        spec.bits_per_sample,
        samples.len()
    );

    Ok(AudioClip::new(
        downmix_to_mono(&samples, spec.channels),
        spec.sample_rate,
    ))
}

/// Encode a clip as 16-bit mono PCM WAV bytes
pub fn encode_wav(clip: &AudioClip) -> std::result::Result<Vec<u8>, String> {
    let spec = WavSpec {
        channels: 1,
        sample_rate: clip.sample_rate,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer =
            WavWriter::new(&mut cursor, spec).map_err(|e| format!("WAV write error: {}", e))?;
        for &sample in &clip.samples {
            let clamped = sample.clamp(-1.0, 1.0);
            writer
                .write_sample((clamped * 32767.0) as i16)
                .map_err(|e| format!("WAV write error: {}", e))?;
        }
        writer
            .finalize()
            .map_err(|e| format!("WAV write error: {}", e))?;
    }
    Ok(cursor.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_i16_wav(path: &Path, channels: u16, sample_rate: u32, samples: &[i16]) {
        let spec = WavSpec {
            channels,
            sample_rate,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let mut writer = WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_downmix() {
        assert_eq!(downmix_to_mono(&[1.0, 0.0, 0.5, 0.5], 2), vec![0.5, 0.5]);
        assert_eq!(downmix_to_mono(&[0.25, 0.75], 1), vec![0.25, 0.75]);
    }

    #[test]
    fn test_read_stereo_int_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        write_i16_wav(&path, 2, 16000, &[16384, 0, -16384, -16384]);

        let clip = read_wav(&path).unwrap();
        assert_eq!(clip.sample_rate, 16000);
        assert_eq!(clip.samples.len(), 2);
        assert!((clip.samples[0] - 0.25).abs() < 1e-6);
        assert!((clip.samples[1] + 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_read_missing_file() {
        let err = read_wav(Path::new("/definitely/not/here.wav")).unwrap_err();
        assert!(matches!(err, EvalError::Audio { .. }));
    }

    #[test]
    fn test_encode_wav_round_trip_clamps() {
        let clip = AudioClip::new(vec![0.0, 0.5, -0.5, 2.0], 16000);
        let bytes = encode_wav(&clip).unwrap();
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(&bytes[8..12], b"WAVE");

        let reader = WavReader::new(Cursor::new(bytes)).unwrap();
        assert_eq!(reader.spec().sample_rate, 16000);
        let decoded: Vec<i16> = reader.into_samples::<i16>().map(|s| s.unwrap()).collect();
        // out-of-range input is clamped
        assert_eq!(decoded, vec![0, 16383, -16383, 32767]);
    }
}
