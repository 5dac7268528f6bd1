//! Zero-shot evaluation of audio-conditioned chat models as diagnostic classifiers.
//!
//! Each prompt template is run over every sample of a dataset; responses are
//! decoded to labels and scored, producing one metrics row per prompt.

pub mod audio;
pub mod config;
pub mod dataset;
pub mod error;
pub mod eval;
pub mod inference;
pub mod labels;
pub mod metrics;
pub mod output;
pub mod prompts;


pub use error::{EvalError, Result};
