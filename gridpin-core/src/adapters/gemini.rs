//! Gemini API client
//!
//! Backs both collaborator ports: text generation for financial insights
//! and text-to-speech for spoken prompts. Every request is bounded by the
//! configured timeout; failures never touch the ledger.

use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::config::AdvisorSettings;
use crate::domain::result::{Error as DomainError, Result as DomainResult};
use crate::domain::speech::parse_sample_rate;
use crate::domain::SpeechClip;
use crate::ports::{AdviceProvider, SpeechProvider};

// =============================================================================
// API Request/Response Models
// =============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateRequest<'a> {
    contents: Vec<RequestContent<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    model: Option<&'a str>,
}

#[derive(Debug, Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Debug, Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_modalities: Vec<&'a str>,
    speech_config: SpeechConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SpeechConfig<'a> {
    voice_config: VoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VoiceConfig<'a> {
    prebuilt_voice_config: PrebuiltVoiceConfig<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PrebuiltVoiceConfig<'a> {
    voice_name: &'a str,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

// =============================================================================
// Gemini HTTP Client
// =============================================================================

/// Gemini API client
#[derive(Debug)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
    tts_model: String,
    voice: String,
    timeout: Duration,
}

impl GeminiClient {
    /// Create a client from advisor settings
    ///
    /// The API key may be absent; calls then fail with a configuration
    /// error instead of failing at startup.
    pub fn new(settings: &AdvisorSettings) -> Result<Self> {
        let parsed = Url::parse(&settings.base_url).context("Invalid advisor base URL")?;
        if parsed.scheme() != "https" && parsed.scheme() != "http" {
            anyhow::bail!("Advisor base URL must use http or https");
        }

        let client = Client::builder()
            .timeout(settings.timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: settings.base_url.trim_end_matches('/').to_string(),
            api_key: settings.api_key.clone(),
            model: settings.model.clone(),
            tts_model: settings.tts_model.clone(),
            voice: settings.voice.clone(),
            timeout: settings.timeout,
        })
    }

    fn api_key(&self) -> DomainResult<&str> {
        self.api_key
            .as_deref()
            .ok_or_else(|| DomainError::Config("GEMINI_API_KEY is not set".to_string()))
    }

    /// Generate text for a prompt
    pub fn generate(&self, api_key: &str, prompt: &str) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: prompt }],
            }],
            generation_config: None,
            model: None,
        };
        let response = self.post(api_key, &self.model, &request)?;

        response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.text))
            .filter(|t| !t.trim().is_empty())
            .context("Gemini response contained no text")
    }

    /// Synthesize speech for a line of text
    pub fn speech(&self, api_key: &str, text: &str) -> Result<SpeechClip> {
        let prompt = format!("Say clearly: {}", text);
        let request = GenerateRequest {
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: &prompt }],
            }],
            generation_config: Some(GenerationConfig {
                response_modalities: vec!["AUDIO"],
                speech_config: SpeechConfig {
                    voice_config: VoiceConfig {
                        prebuilt_voice_config: PrebuiltVoiceConfig { voice_name: &self.voice },
                    },
                },
            }),
            model: Some(&self.tts_model),
        };
        let response = self.post(api_key, &self.tts_model, &request)?;

        let inline = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content.parts.into_iter().find_map(|p| p.inline_data))
            .context("Invalid TTS response: no audio data")?;

        let pcm = base64::engine::general_purpose::STANDARD
            .decode(inline.data.as_bytes())
            .context("Invalid TTS response: audio is not base64")?;
        let sample_rate = parse_sample_rate(&inline.mime_type)?;

        Ok(SpeechClip::new(pcm, sample_rate))
    }

    fn post(&self, api_key: &str, model: &str, body: &GenerateRequest<'_>) -> Result<GenerateResponse> {
        let url = format!("{}/models/{}:generateContent", self.base_url, model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .json(body)
            .send()
            .map_err(|e| self.map_request_error(e))?;

        self.check_response_status(&response)?;

        response.json().context("Failed to parse Gemini response")
    }

    fn map_request_error(&self, error: reqwest::Error) -> anyhow::Error {
        if error.is_timeout() {
            anyhow::anyhow!("Connection timed out after {} seconds", self.timeout.as_secs())
        } else if error.is_connect() {
            anyhow::anyhow!("Unable to connect to Gemini servers")
        } else {
            anyhow::anyhow!("Gemini request failed: {}", error)
        }
    }

    fn check_response_status(&self, response: &reqwest::blocking::Response) -> Result<()> {
        match response.status().as_u16() {
            200 => Ok(()),
            400 => anyhow::bail!("Gemini rejected the request (HTTP 400)"),
            401 | 403 => anyhow::bail!("Gemini authentication failed. Check GEMINI_API_KEY."),
            429 => anyhow::bail!("Gemini rate limit exceeded. Try again later."),
            status => anyhow::bail!("Gemini API error: HTTP {}", status),
        }
    }
}

impl AdviceProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn generate_text(&self, prompt: &str) -> DomainResult<String> {
        let key = self.api_key()?;
        self.generate(key, prompt)
            .map_err(|e| DomainError::collaborator(e.to_string()))
    }
}

impl SpeechProvider for GeminiClient {
    fn name(&self) -> &str {
        "gemini"
    }

    fn synthesize(&self, text: &str) -> DomainResult<SpeechClip> {
        let key = self.api_key()?;
        self.speech(key, text)
            .map_err(|e| DomainError::collaborator(e.to_string()))
    }
}
