use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::audio::TARGET_SAMPLE_RATE;
use crate::inference::{ClientSettings, DEFAULT_SYSTEM_PROMPT};
use crate::metrics::SchemaMode;

/// Run configuration, loaded from a JSON file and overridden from the CLI
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub schema_version: u32,

    // Inputs and outputs
    pub dataset_path: Option<PathBuf>,
    pub prompts_path: Option<PathBuf>,
    pub output_dir: PathBuf,

    pub model: ModelConfig,

    // Class schema: n_classes = 2 with ci_nc selects CI/NC instead of MCI/NC
    pub n_classes: u32,
    pub ci_nc: bool,

    /// Echo raw responses to the log
    pub debug: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            schema_version: 1,
            dataset_path: None,
            prompts_path: None,
            output_dir: PathBuf::from("results"),
            model: ModelConfig::default(),
            n_classes: 2,
            ci_nc: false,
            debug: false,
        }
    }
}

/// Inference server and generation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    pub server_url: String,
    pub api_key: Option<String>,
    pub model: String,
    /// Model id requested when quantization is enabled
    pub quantized_model: Option<String>,
    pub quantize: bool,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    pub sample_rate: u32,
    pub request_timeout_secs: Option<u64>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            server_url: "http://localhost:8000".to_string(),
            api_key: None,
            model: "Qwen/Qwen2-Audio-7B-Instruct".to_string(),
            quantized_model: None,
            quantize: false,
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: 1024,
            temperature: None,
            sample_rate: TARGET_SAMPLE_RATE,
            request_timeout_secs: None,
        }
    }
}

impl ModelConfig {
    /// Model id to request. Quantization is applied by the server; the toggle
    /// only switches to the quantized variant when one is configured.
    pub fn model_id(&self) -> &str {
        match (&self.quantized_model, self.quantize) {
            (Some(quantized), true) => quantized,
            _ => &self.model,
        }
    }

    pub fn client_settings(&self) -> ClientSettings {
        ClientSettings {
            base_url: self.server_url.clone(),
            api_key: self.api_key.clone(),
            model: self.model_id().to_string(),
            system_prompt: self.system_prompt.clone(),
            max_tokens: self.max_tokens,
            temperature: self.temperature,
            sample_rate: self.sample_rate,
            request_timeout: self.request_timeout_secs.map(Duration::from_secs),
        }
    }
}

impl Config {
    /// Load config from file, or create default
    pub fn load(path: &Path) -> Result<Self> {
        if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {:?}", path))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Failed to parse config file {:?}", path))
        } else {
            Ok(Self::default())
        }
    }

    /// Save config to file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }
        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content).context("Failed to write config file")
    }

    /// Get the default config directory
    pub fn default_config_dir() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;
        Ok(home.join(".audio-dx-eval"))
    }

    /// Get the default config file path
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.json"))
    }

    pub fn schema_mode(&self) -> SchemaMode {
        SchemaMode::from_config(self.n_classes, self.ci_nc)
    }

    /// Dataset path, required before a run
    pub fn dataset_path(&self) -> Result<&Path> {
        self.dataset_path
            .as_deref()
            .context("No dataset path configured (use --dataset)")
    }

    /// Prompts file path, required before a run
    pub fn prompts_path(&self) -> Result<&Path> {
        self.prompts_path
            .as_deref()
            .context("No prompts file configured (use --prompts)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.schema_version, 1);
        assert_eq!(config.n_classes, 2);
        assert_eq!(config.model.max_tokens, 1024);
        assert_eq!(config.model.sample_rate, 16000);
        assert_eq!(config.schema_mode(), SchemaMode::TwoClassMciNc);
    }

    #[test]
    fn test_model_id_quantization() {
        let mut model = ModelConfig::default();
        assert_eq!(model.model_id(), "Qwen/Qwen2-Audio-7B-Instruct");

        model.quantize = true;
        assert_eq!(model.model_id(), "Qwen/Qwen2-Audio-7B-Instruct");

        model.quantized_model = Some("qwen2-audio-int8".to_string());
        assert_eq!(model.model_id(), "qwen2-audio-int8");
        assert_eq!(model.client_settings().model, "qwen2-audio-int8");

        model.quantize = false;
        assert_eq!(model.model_id(), "Qwen/Qwen2-Audio-7B-Instruct");
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: Config =
            serde_json::from_str(r#"{"n_classes": 3, "model": {"max_tokens": 64}}"#).unwrap();
        assert_eq!(config.schema_mode(), SchemaMode::ThreeClass);
        assert_eq!(config.model.max_tokens, 64);
        assert_eq!(config.model.server_url, "http://localhost:8000");
        assert_eq!(config.output_dir, PathBuf::from("results"));
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.ci_nc = true;
        config.dataset_path = Some(PathBuf::from("/data/ds"));
        config.model.request_timeout_secs = Some(600);
        config.save(&path).unwrap();

        let loaded = Config::load(&path).unwrap();
        assert_eq!(loaded.schema_mode(), SchemaMode::TwoClassCiNc);
        assert_eq!(loaded.dataset_path.as_deref(), Some(Path::new("/data/ds")));
        assert_eq!(
            loaded.model.client_settings().request_timeout,
            Some(Duration::from_secs(600))
        );
    }

    #[test]
    fn test_load_missing_file_gives_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(&dir.path().join("absent.json")).unwrap();
        assert!(config.dataset_path.is_none());
        assert!(config.dataset_path().is_err());
    }
}
