//! Evaluation dataset: a JSONL manifest of audio clips with reference labels
//!
//! Each manifest line describes one subject:
//!
//! ```json
//! {"id": "s-001", "audio": "clips/s-001.wav", "dx": "MCI", "age": 72, "lang": "en", "sex": "F"}
//! ```
//!
//! `audio` is resolved relative to the manifest's directory. Keys other than
//! the ones above are preserved and copied into the per-prompt artifacts.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::audio::{read_wav, AudioClip};
use crate::error::{EvalError, Result};
use crate::labels::Label;

/// Manifest file looked up when the dataset path is a directory
pub const MANIFEST_FILE: &str = "metadata.jsonl";

/// Artifact columns the evaluator fills in; manifest values for them are dropped
const RESERVED_COLUMNS: &[&str] = &["prompt", "response", "dx_pred"];

/// Optional subject attributes used by prompt placeholders
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    pub age: Option<u32>,
    pub lang: Option<String>,
    pub sex: Option<String>,
}

/// One subject's data point
#[derive(Debug, Clone)]
pub struct Sample {
    pub id: String,
    pub audio: AudioClip,
    pub dx: Label,
    pub demographics: Demographics,
    /// Remaining manifest columns, carried through to artifacts
    pub extra: Map<String, Value>,
}

#[derive(Debug, Deserialize)]
struct ManifestRow {
    audio: PathBuf,
    dx: String,
    #[serde(default)]
    id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_age")]
    age: Option<u32>,
    #[serde(default)]
    lang: Option<String>,
    #[serde(default)]
    sex: Option<String>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

/// Accepts `72` as well as `72.0`; fractional or negative ages are rejected.
fn deserialize_age<'de, D>(deserializer: D) -> std::result::Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<f64>::deserialize(deserializer)?;
    match value {
        None => Ok(None),
        Some(v) if v >= 0.0 && v.fract() == 0.0 && v <= u32::MAX as f64 => Ok(Some(v as u32)),
        Some(v) => Err(serde::de::Error::custom(format!(
            "age must be a non-negative whole number, got {}",
            v
        ))),
    }
}

/// Samples in manifest order. Read-only for the duration of a run.
#[derive(Debug, Clone, Default)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn new(samples: Vec<Sample>) -> Self {
        Self { samples }
    }

    /// Resolve the manifest location for a dataset path
    pub fn manifest_path(path: &Path) -> PathBuf {
        if path.is_dir() {
            path.join(MANIFEST_FILE)
        } else {
            path.to_path_buf()
        }
    }

    /// Load the manifest and decode every clip, resampled to `sample_rate`
    pub fn load(path: &Path, sample_rate: u32) -> Result<Self> {
        let manifest = Self::manifest_path(path);
        if !manifest.is_file() {
            return Err(EvalError::Configuration(format!(
                "Dataset manifest not found: {:?}",
                manifest
            )));
        }
        let base_dir = manifest
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_default();

        let file = std::fs::File::open(&manifest).map_err(|e| {
            EvalError::Configuration(format!("Cannot open dataset manifest {:?}: {}", manifest, e))
        })?;

        let mut samples = Vec::new();
        for (line_idx, line) in BufReader::new(file).lines().enumerate() {
            let line = line.map_err(|e| EvalError::io(&manifest, e))?;
            if line.trim().is_empty() {
                continue;
            }
            let line_no = line_idx + 1;
            let row: ManifestRow = serde_json::from_str(&line).map_err(|e| {
                EvalError::Dataset(format!("{:?} line {}: {}", manifest, line_no, e))
            })?;
            samples.push(Self::load_sample(row, line_no, &base_dir, sample_rate)?);
        }

        if samples.is_empty() {
            return Err(EvalError::Dataset(format!(
                "Dataset manifest {:?} has no samples",
                manifest
            )));
        }

        info!("Loaded {} samples from {:?}", samples.len(), manifest);
        Ok(Self { samples })
    }

    fn load_sample(
        row: ManifestRow,
        line_no: usize,
        base_dir: &Path,
        sample_rate: u32,
    ) -> Result<Sample> {
        let id = row.id.unwrap_or_else(|| format!("row-{}", line_no));

        let dx = Label::parse_reference(&row.dx).ok_or_else(|| {
            EvalError::Dataset(format!(
                "Sample {}: unsupported reference label '{}'",
                id, row.dx
            ))
        })?;

        let audio_path = if row.audio.is_absolute() {
            row.audio
        } else {
            base_dir.join(&row.audio)
        };
        let clip = read_wav(&audio_path)?;
        let audio = clip
            .to_rate(sample_rate)
            .map_err(|message| EvalError::Audio {
                path: audio_path.clone(),
                message,
            })?
            .into_owned();

        debug!(
            "Sample {}: dx={}, {:.2}s of audio",
            id,
            dx,
            audio.duration_secs()
        );

        let mut extra = row.extra;
        for key in RESERVED_COLUMNS {
            if extra.remove(*key).is_some() {
                warn!(
                    "Sample {}: dropping manifest column '{}' (written by the evaluator)",
                    id, key
                );
            }
        }

        Ok(Sample {
            id,
            audio,
            dx,
            demographics: Demographics {
                age: row.age,
                lang: row.lang,
                sex: row.sex,
            },
            extra,
        })
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A sample's outcome under one prompt, as persisted in the per-prompt
/// artifact. Holds no audio.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionRecord {
    pub id: String,
    pub dx: Label,
    #[serde(flatten)]
    pub demographics: Demographics,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    pub prompt: String,
    pub response: String,
    pub dx_pred: Label,
}

impl PredictionRecord {
    pub fn new(sample: &Sample, prompt: String, response: String, dx_pred: Label) -> Self {
        Self {
            id: sample.id.clone(),
            dx: sample.dx,
            demographics: sample.demographics.clone(),
            extra: sample.extra.clone(),
            prompt,
            response,
            dx_pred,
        }
    }
}
