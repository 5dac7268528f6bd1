use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::metrics::SchemaMode;

/// Manifest describing one evaluation run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    pub run_id: Uuid,
    pub model: String,
    pub server_url: String,
    pub schema: SchemaMode,
    pub dataset_path: PathBuf,
    pub prompts_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,

    // Stats
    pub prompt_count: usize,
    pub sample_count: usize,
    pub inference_calls: usize,
    pub results_file: Option<PathBuf>,
}

impl RunRecord {
    pub fn new(
        model: String,
        server_url: String,
        schema: SchemaMode,
        dataset_path: PathBuf,
        prompts_path: PathBuf,
    ) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            model,
            server_url,
            schema,
            dataset_path,
            prompts_path,
            started_at: Utc::now(),
            ended_at: None,
            prompt_count: 0,
            sample_count: 0,
            inference_calls: 0,
            results_file: None,
        }
    }

    pub fn set_inputs(&mut self, prompt_count: usize, sample_count: usize) {
        self.prompt_count = prompt_count;
        self.sample_count = sample_count;
    }

    pub fn finalize(&mut self, results_file: PathBuf) {
        self.inference_calls = self.prompt_count * self.sample_count;
        self.results_file = Some(results_file);
        self.ended_at = Some(Utc::now());
    }

    pub fn duration_secs(&self) -> Option<f64> {
        self.ended_at
            .map(|end| (end - self.started_at).num_milliseconds() as f64 / 1000.0)
    }
}
