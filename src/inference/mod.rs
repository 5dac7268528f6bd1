//! Inference boundary: "generate text given audio + prompt".
//!
//! The evaluator only depends on [`Invoker`]. Chat templating, model loading,
//! device placement and quantization all live on the other side of it.

pub mod chat_client;

pub use chat_client::{ChatAudioClient, ClientSettings, DEFAULT_SYSTEM_PROMPT};

use crate::audio::AudioClip;
use crate::error::Result;

/// Synchronous single-request text generation conditioned on audio
pub trait Invoker {
    fn generate(&self, audio: &AudioClip, prompt: &str) -> Result<String>;
}

impl<T: Invoker + ?Sized> Invoker for &T {
    fn generate(&self, audio: &AudioClip, prompt: &str) -> Result<String> {
        (**self).generate(audio, prompt)
    }
}

impl<T: Invoker + ?Sized> Invoker for Box<T> {
    fn generate(&self, audio: &AudioClip, prompt: &str) -> Result<String> {
        (**self).generate(audio, prompt)
    }
}
