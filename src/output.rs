//! On-disk outputs of a run: per-prompt artifacts, the result table and the
//! run manifest.
//!
//! ```text
//! <output_dir>/
//!   results.csv
//!   run.json
//!   pred_dataset/
//!     data_prompt_0.jsonl
//!     data_prompt_1.jsonl
//! ```

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::dataset::PredictionRecord;
use crate::error::{EvalError, Result};
use crate::eval::{ArtifactSink, RunRecord, SummaryRow};
use crate::metrics::SchemaMode;

pub const RESULTS_FILE: &str = "results.csv";
pub const RUN_FILE: &str = "run.json";
pub const PREDICTIONS_DIR: &str = "pred_dataset";

/// Create `dir` (and parents) if it does not exist yet
pub fn ensure_dir(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        debug!("Directory {:?} already exists", dir);
        return Ok(());
    }
    std::fs::create_dir_all(dir).map_err(|e| EvalError::io(dir, e))?;
    info!("Created directory {:?}", dir);
    Ok(())
}

/// Paths of every file a run writes
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
}

impl OutputLayout {
    /// Create the output and artifact directories
    pub fn create(root: &Path) -> Result<Self> {
        let layout = Self {
            root: root.to_path_buf(),
        };
        ensure_dir(&layout.root)?;
        ensure_dir(&layout.predictions_dir())?;
        Ok(layout)
    }

    pub fn results_file(&self) -> PathBuf {
        self.root.join(RESULTS_FILE)
    }

    pub fn run_file(&self) -> PathBuf {
        self.root.join(RUN_FILE)
    }

    pub fn predictions_dir(&self) -> PathBuf {
        self.root.join(PREDICTIONS_DIR)
    }

    pub fn prompt_artifact(&self, prompt_index: usize) -> PathBuf {
        self.predictions_dir()
            .join(format!("data_prompt_{}.jsonl", prompt_index))
    }
}

/// Writes each prompt's records as JSON lines under `pred_dataset/`
#[derive(Debug, Clone)]
pub struct JsonlArtifactWriter {
    layout: OutputLayout,
}

impl JsonlArtifactWriter {
    pub fn new(layout: OutputLayout) -> Self {
        Self { layout }
    }
}

impl ArtifactSink for JsonlArtifactWriter {
    fn persist(&mut self, prompt_index: usize, records: &[PredictionRecord]) -> Result<()> {
        let path = self.layout.prompt_artifact(prompt_index);
        let file = File::create(&path).map_err(|e| EvalError::io(&path, e))?;
        let mut writer = BufWriter::new(file);

        for record in records {
            serde_json::to_writer(&mut writer, record)
                .map_err(|e| EvalError::io(&path, e.into()))?;
            writer.write_all(b"\n").map_err(|e| EvalError::io(&path, e))?;
        }
        writer.flush().map_err(|e| EvalError::io(&path, e))?;

        debug!("Wrote {} records to {:?}", records.len(), path);
        Ok(())
    }
}

/// Quote a CSV field when it contains a delimiter, quote or line break
pub fn csv_field(value: &str) -> String {
    if value.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", value.replace('"', "\"\""))
    } else {
        value.to_string()
    }
}

fn csv_line(fields: impl IntoIterator<Item = String>) -> String {
    fields
        .into_iter()
        .map(|f| csv_field(&f))
        .collect::<Vec<_>>()
        .join(",")
}

/// Render the result table: one row per prompt, columns fixed by `mode`
pub fn render_results_csv(mode: SchemaMode, rows: &[SummaryRow]) -> Result<String> {
    let mut header = vec!["prompt_index".to_string(), "prompt".to_string()];
    header.extend(mode.columns());

    let mut out = csv_line(header);
    out.push('\n');

    for row in rows {
        if row.summary.mode() != mode {
            return Err(EvalError::Aggregation(format!(
                "Row for prompt {} has schema {}, expected {}",
                row.prompt_index,
                row.summary.mode(),
                mode
            )));
        }
        let mut fields = vec![row.prompt_index.to_string(), row.prompt.clone()];
        fields.extend(row.summary.values());
        out.push_str(&csv_line(fields));
        out.push('\n');
    }
    Ok(out)
}

pub fn write_results_csv(path: &Path, mode: SchemaMode, rows: &[SummaryRow]) -> Result<()> {
    let content = render_results_csv(mode, rows)?;
    std::fs::write(path, content).map_err(|e| EvalError::io(path, e))?;
    info!("Wrote {} result rows to {:?}", rows.len(), path);
    Ok(())
}

pub fn write_run_record(path: &Path, record: &RunRecord) -> Result<()> {
    let content =
        serde_json::to_string_pretty(record).map_err(|e| EvalError::io(path, e.into()))?;
    std::fs::write(path, content).map_err(|e| EvalError::io(path, e))
}
