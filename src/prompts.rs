//! Prompt templates and per-sample placeholder resolution

use std::path::Path;

use tracing::{debug, info};

use crate::dataset::Demographics;
use crate::error::{EvalError, Result};

pub const AGE_MARKER: &str = "[AGE]";
pub const LANGUAGE_MARKER: &str = "[LANGUAGE]";
pub const GENDER_MARKER: &str = "[GENDER]";

/// A prompt line; `index` is its line number and fixes its output row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    pub index: usize,
    pub text: String,
}

impl PromptTemplate {
    pub fn new(index: usize, text: impl Into<String>) -> Self {
        Self {
            index,
            text: text.into(),
        }
    }

    /// Substitute placeholders for one sample.
    ///
    /// Only markers present in the template are looked up. A present marker
    /// with missing or out-of-domain data is a [`EvalError::MissingField`].
    pub fn resolve(&self, sample_id: &str, demographics: &Demographics) -> Result<String> {
        // presence comes from the template; substituted values are never rescanned
        let has_age = self.text.contains(AGE_MARKER);
        let has_language = self.text.contains(LANGUAGE_MARKER);
        let has_gender = self.text.contains(GENDER_MARKER);

        let mut resolved = self.text.clone();

        if has_age {
            let age = demographics.age.ok_or_else(|| EvalError::MissingField {
                sample: sample_id.to_string(),
                marker: AGE_MARKER,
                field: "age",
                reason: "it is missing".to_string(),
            })?;
            resolved = resolved.replace(AGE_MARKER, &age.to_string());
        }

        if has_language {
            let lang = demographics.lang.as_deref().ok_or_else(|| EvalError::MissingField {
                sample: sample_id.to_string(),
                marker: LANGUAGE_MARKER,
                field: "lang",
                reason: "it is missing".to_string(),
            })?;
            resolved = resolved.replace(LANGUAGE_MARKER, lang);
        }

        if has_gender {
            let sex = demographics.sex.as_deref().ok_or_else(|| EvalError::MissingField {
                sample: sample_id.to_string(),
                marker: GENDER_MARKER,
                field: "sex",
                reason: "it is missing".to_string(),
            })?;
            let gender = gender_word(sex).ok_or_else(|| EvalError::MissingField {
                sample: sample_id.to_string(),
                marker: GENDER_MARKER,
                field: "sex",
                reason: format!("value '{}' is not one of M/F", sex),
            })?;
            resolved = resolved.replace(GENDER_MARKER, gender);
        }

        Ok(resolved)
    }
}

fn gender_word(sex: &str) -> Option<&'static str> {
    match sex {
        "M" => Some("male"),
        "F" => Some("female"),
        _ => None,
    }
}

/// Parse newline-delimited prompts; line order is prompt order
pub fn parse_prompts(content: &str) -> Vec<PromptTemplate> {
    content
        .lines()
        .enumerate()
        .map(|(index, line)| PromptTemplate::new(index, line))
        .collect()
}

/// Load the prompt file. An empty file is a configuration error.
pub fn load_prompts(path: &Path) -> Result<Vec<PromptTemplate>> {
    let content = std::fs::read_to_string(path).map_err(|e| {
        EvalError::Configuration(format!("Cannot read prompts file {:?}: {}", path, e))
    })?;

    let prompts = parse_prompts(&content);
    if prompts.is_empty() {
        return Err(EvalError::Configuration(format!(
            "Prompts file {:?} contains no prompts",
            path
        )));
    }

    for prompt in &prompts {
        debug!("Prompt {}: {}", prompt.index, prompt.text);
    }
    info!("Loaded {} prompts from {:?}", prompts.len(), path);
    Ok(prompts)
}
