//! OpenAI-compatible chat client for audio-language models
//!
//! Sends one chat completion per call: a system message followed by a user
//! message carrying the clip as a base64 `input_audio` WAV part and the
//! resolved prompt as a text part. The server applies the model's chat
//! template. Requests are not retried; a failure ends the run.

use std::time::Duration;

use base64::Engine;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};

use super::Invoker;
use crate::audio::{encode_wav, AudioClip};
use crate::error::{EvalError, Result};

pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant.";

/// Connection and generation settings for [`ChatAudioClient`]
#[derive(Debug, Clone)]
pub struct ClientSettings {
    pub base_url: String,
    pub api_key: Option<String>,
    /// Model id sent with every request
    pub model: String,
    pub system_prompt: String,
    pub max_tokens: u32,
    pub temperature: Option<f32>,
    /// Rate the audio is converted to before encoding
    pub sample_rate: u32,
    /// `None` waits indefinitely
    pub request_timeout: Option<Duration>,
}

#[derive(Debug, Clone, Serialize)]
struct InputAudio {
    data: String,
    format: &'static str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart {
    InputAudio { input_audio: InputAudio },
    Text { text: String },
}

#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, Serialize)]
struct ChatMessage {
    role: &'static str,
    content: MessageContent,
}

#[derive(Debug, Clone, Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    stream: bool,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
struct ChatChoice {
    message: ResponseMessage,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ModelInfo {
    id: String,
}

#[derive(Debug, Clone, Deserialize)]
struct ModelsResponse {
    data: Vec<ModelInfo>,
}

/// Blocking client; drives async reqwest on a private current-thread runtime
pub struct ChatAudioClient {
    client: reqwest::Client,
    runtime: tokio::runtime::Runtime,
    base_url: String,
    settings: ClientSettings,
}

/// Validate and normalize a server URL
fn validate_base_url(base_url: &str) -> Result<String> {
    let cleaned_url = base_url.trim_end_matches('/');

    let parsed = reqwest::Url::parse(cleaned_url).map_err(|e| {
        EvalError::Configuration(format!("Invalid server URL '{}': {}", cleaned_url, e))
    })?;

    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(EvalError::Configuration(format!(
            "Server URL must use http or https scheme, got: {}",
            parsed.scheme()
        )));
    }

    if !parsed.username().is_empty() || parsed.password().is_some() {
        return Err(EvalError::Configuration(
            "Server URL must not contain credentials".to_string(),
        ));
    }

    Ok(cleaned_url.to_string())
}

impl ChatAudioClient {
    pub fn new(settings: ClientSettings) -> Result<Self> {
        let base_url = validate_base_url(&settings.base_url)?;

        let mut builder = reqwest::Client::builder().connect_timeout(Duration::from_secs(30));
        if let Some(timeout) = settings.request_timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().map_err(|e| {
            EvalError::Configuration(format!("Failed to create HTTP client: {}", e))
        })?;

        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| {
                EvalError::Configuration(format!("Failed to create tokio runtime: {}", e))
            })?;

        info!("ChatAudioClient created for {} with model {}", base_url, settings.model);

        Ok(Self {
            client,
            runtime,
            base_url,
            settings,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn model(&self) -> &str {
        &self.settings.model
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(key) = self.settings.api_key.as_deref().filter(|k| !k.is_empty()) {
            if let Ok(value) = HeaderValue::from_str(&format!("Bearer {}", key)) {
                headers.insert(AUTHORIZATION, value);
            }
        }
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers
    }

    fn build_request(&self, audio: &AudioClip, prompt: &str) -> Result<ChatCompletionRequest> {
        let clip = audio
            .to_rate(self.settings.sample_rate)
            .map_err(EvalError::Inference)?;
        let wav_bytes = encode_wav(&clip).map_err(EvalError::Inference)?;
        let data = base64::engine::general_purpose::STANDARD.encode(wav_bytes);

        let mut messages = Vec::with_capacity(2);
        if !self.settings.system_prompt.is_empty() {
            messages.push(ChatMessage {
                role: "system",
                content: MessageContent::Text(self.settings.system_prompt.clone()),
            });
        }
        messages.push(ChatMessage {
            role: "user",
            content: MessageContent::Parts(vec![
                ContentPart::InputAudio {
                    input_audio: InputAudio {
                        data,
                        format: "wav",
                    },
                },
                ContentPart::Text {
                    text: prompt.to_string(),
                },
            ]),
        });

        Ok(ChatCompletionRequest {
            model: self.settings.model.clone(),
            messages,
            stream: false,
            max_tokens: self.settings.max_tokens,
            temperature: self.settings.temperature,
        })
    }

    async fn generate_async(&self, request: &ChatCompletionRequest) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let response = self
            .client
            .post(&url)
            .headers(self.headers())
            .json(request)
            .send()
            .await
            .map_err(|e| EvalError::Inference(format!("Failed to reach {}: {}", url, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("Chat completion failed: {} - {}", status, body);
            return Err(EvalError::Inference(format!(
                "Server returned error: {} - {}",
                status, body
            )));
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| EvalError::Inference(format!("Failed to parse response: {}", e)))?;

        extract_text(parsed)
    }

    async fn list_models_async(&self) -> Result<Vec<String>> {
        let url = format!("{}/v1/models", self.base_url);
        debug!("Listing models from {}", url);

        let response = self
            .client
            .get(&url)
            .headers(self.headers())
            .send()
            .await
            .map_err(|e| {
                EvalError::Configuration(format!("Failed to reach inference server: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(EvalError::Configuration(format!(
                "Inference server returned error status: {}",
                response.status()
            )));
        }

        let models: ModelsResponse = response.json().await.map_err(|e| {
            EvalError::Configuration(format!("Failed to parse models response: {}", e))
        })?;
        Ok(models.data.into_iter().map(|m| m.id).collect())
    }

    /// Models served by the endpoint, for a preflight check before the run
    pub fn list_models(&self) -> Result<Vec<String>> {
        self.runtime.block_on(self.list_models_async())
    }
}

fn extract_text(response: ChatCompletionResponse) -> Result<String> {
    let choice = response
        .choices
        .into_iter()
        .next()
        .ok_or_else(|| EvalError::Inference("No response choices returned".to_string()))?;
    Ok(choice.message.content.unwrap_or_default())
}

impl Invoker for ChatAudioClient {
    fn generate(&self, audio: &AudioClip, prompt: &str) -> Result<String> {
        let start = std::time::Instant::now();
        let request = self.build_request(audio, prompt)?;
        let text = self.runtime.block_on(self.generate_async(&request))?;
        debug!(
            "Generated {} chars for {:.2}s of audio in {:?}",
            text.len(),
            audio.duration_secs(),
            start.elapsed()
        );
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(url: &str) -> ClientSettings {
        ClientSettings {
            base_url: url.to_string(),
            api_key: None,
            model: "Qwen/Qwen2-Audio-7B-Instruct".to_string(),
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            max_tokens: 1024,
            temperature: None,
            sample_rate: 16000,
            request_timeout: None,
        }
    }

    #[test]
    fn test_client_new_trims_trailing_slash() {
        let client = ChatAudioClient::new(settings("http://localhost:8000/")).unwrap();
        assert_eq!(client.base_url(), "http://localhost:8000");
        assert_eq!(client.model(), "Qwen/Qwen2-Audio-7B-Instruct");
    }

    #[test]
    fn test_client_new_invalid_url() {
        assert!(ChatAudioClient::new(settings("not-a-valid-url")).is_err());
        assert!(ChatAudioClient::new(settings("ftp://localhost:8000")).is_err());
        assert!(ChatAudioClient::new(settings("http://user:pw@localhost:8000")).is_err());
    }

    #[test]
    fn test_request_shape() {
        let client = ChatAudioClient::new(settings("http://localhost:8000")).unwrap();
        let clip = AudioClip::new(vec![0.0; 160], 16000);
        let request = client.build_request(&clip, "Is this MCI or NC?").unwrap();
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["model"], "Qwen/Qwen2-Audio-7B-Instruct");
        assert_eq!(json["max_tokens"], 1024);
        assert_eq!(json["stream"], false);
        assert!(json.get("temperature").is_none());

        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], DEFAULT_SYSTEM_PROMPT);

        let parts = &json["messages"][1]["content"];
        assert_eq!(parts[0]["type"], "input_audio");
        assert_eq!(parts[0]["input_audio"]["format"], "wav");
        assert_eq!(parts[1]["type"], "text");
        assert_eq!(parts[1]["text"], "Is this MCI or NC?");

        let wav = base64::engine::general_purpose::STANDARD
            .decode(parts[0]["input_audio"]["data"].as_str().unwrap())
            .unwrap();
        assert_eq!(&wav[0..4], b"RIFF");
    }

    #[test]
    fn test_empty_system_prompt_is_omitted() {
        let mut s = settings("http://localhost:8000");
        s.system_prompt = String::new();
        let client = ChatAudioClient::new(s).unwrap();
        let request = client
            .build_request(&AudioClip::new(vec![0.0; 16], 16000), "p")
            .unwrap();
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, "user");
    }

    #[test]
    fn test_headers_with_api_key() {
        let mut s = settings("http://localhost:8000");
        s.api_key = Some("secret".to_string());
        let client = ChatAudioClient::new(s).unwrap();
        assert_eq!(client.headers()[AUTHORIZATION], "Bearer secret");
    }

    #[test]
    fn test_extract_text() {
        let response: ChatCompletionResponse = serde_json::from_str(
            r#"{"choices": [{"message": {"role": "assistant", "content": "The speaker shows MCI."}, "finish_reason": "stop"}], "model": "m"}"#,
        )
        .unwrap();
        assert_eq!(extract_text(response).unwrap(), "The speaker shows MCI.");

        let null_content: ChatCompletionResponse =
            serde_json::from_str(r#"{"choices": [{"message": {"content": null}}]}"#).unwrap();
        assert_eq!(extract_text(null_content).unwrap(), "");

        let empty: ChatCompletionResponse = serde_json::from_str(r#"{"choices": []}"#).unwrap();
        assert!(matches!(extract_text(empty), Err(EvalError::Inference(_))));
    }

    #[test]
    fn test_models_response_parse() {
        let models: ModelsResponse =
            serde_json::from_str(r#"{"object": "list", "data": [{"id": "a"}, {"id": "b"}]}"#)
                .unwrap();
        let ids: Vec<_> = models.data.into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
