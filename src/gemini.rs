use std::sync::Arc;

use base64::{engine::general_purpose::STANDARD, Engine as _};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::{debug, error, info};

use crate::config::Config;
use crate::error::{AdapterError, Stage};
use crate::message::{ImageRef, ImageSource, SendRequest};

pub const SYSTEM_INSTRUCTION: &str = "You are an AI Study Helper designed for school and college students. Your job is to provide clear, short, and exam-oriented study material.

TASKS:
Generate clean, simple, student-friendly notes
Summarize long chapters
Give perfect 2–3 line answers
Solve basic maths problems with steps
Provide exam-focused explanations

OUTPUT RULES:
Always write in simple language
No complicated vocabulary
Keep answers short, clear, and accurate
For summary → 8-12 lines
For short answers → 2-3 lines
For notes → bullet points
For maths → step-by-step solution
Never add unnecessary extra paragraphs

FEATURES:
You can produce:
Chapter notes
Definitions
Formulas
Short summaries
2-3 line board-exam answers
Step-by-step maths solutions
Examples for hard topics

TONE:
Friendly
Helpful
Teacher-like
Very easy to understand";

/// Model names and the reasoning budget used for thinking mode
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelSettings {
    pub fast_model: String,
    pub pro_model: String,
    pub thinking_budget: u32,
}

impl Default for ModelSettings {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for ModelSettings {
    fn from(config: &Config) -> Self {
        Self {
            fast_model: config.fast_model.clone(),
            pro_model: config.pro_model.clone(),
            thinking_budget: config.thinking_budget,
        }
    }
}

/// Which model to call and with what reasoning budget
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GenerationPlan {
    pub model: String,
    pub thinking_budget: Option<u32>,
    pub stage: Stage,
}

/// Image requests always go to the fast model without a thinking budget,
/// whatever the thinking-mode flag says. Text requests use the pro model
/// with the budget only when thinking mode is on.
pub fn plan_request(request: &SendRequest, settings: &ModelSettings) -> GenerationPlan {
    if request.image.is_some() {
        return GenerationPlan {
            model: settings.fast_model.clone(),
            thinking_budget: None,
            stage: Stage::ImageAnalysis,
        };
    }

    if request.thinking_mode {
        GenerationPlan {
            model: settings.pro_model.clone(),
            thinking_budget: Some(settings.thinking_budget),
            stage: Stage::TextGeneration,
        }
    } else {
        GenerationPlan {
            model: settings.fast_model.clone(),
            thinking_budget: None,
            stage: Stage::TextGeneration,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    pub mime_type: String,
    pub data: String,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
enum Part {
    InlineData(InlineData),
    Text(String),
}

#[derive(Serialize, Debug)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
struct SystemInstruction {
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig {
    thinking_budget: u32,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    thinking_config: ThinkingConfig,
}

#[derive(Serialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    system_instruction: SystemInstruction,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    fn new(plan: &GenerationPlan, prompt: &str, image: Option<InlineData>) -> Self {
        let mut parts = Vec::with_capacity(2);
        let has_image = image.is_some();
        if let Some(inline) = image {
            parts.push(Part::InlineData(inline));
        }
        // An image may be sent without a caption; the API rejects empty text parts
        if !(has_image && prompt.trim().is_empty()) {
            parts.push(Part::Text(prompt.to_string()));
        }

        Self {
            contents: vec![Content { role: "user", parts }],
            system_instruction: SystemInstruction {
                parts: vec![Part::Text(SYSTEM_INSTRUCTION.to_string())],
            },
            generation_config: plan.thinking_budget.map(|thinking_budget| GenerationConfig {
                thinking_config: ThinkingConfig { thinking_budget },
            }),
        }
    }
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(Deserialize, Debug)]
struct ResponsePart {
    text: Option<String>,
    #[serde(default)]
    thought: bool,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    block_reason: Option<String>,
}

impl GenerateContentResponse {
    /// Joined answer text of the first candidate, skipping thought summaries
    fn into_text(self, stage: Stage) -> Result<String, AdapterError> {
        if self.candidates.is_empty() {
            if let Some(reason) = self.prompt_feedback.and_then(|f| f.block_reason) {
                return Err(AdapterError::Blocked { stage, reason });
            }
        }

        Ok(self
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter(|p| !p.thought)
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default())
    }
}

#[derive(Deserialize)]
struct ApiErrorEnvelope {
    error: ApiErrorBody,
}

#[derive(Deserialize)]
struct ApiErrorBody {
    message: String,
}

fn api_error_message(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiErrorEnvelope>(body) {
        Ok(envelope) => format!("Gemini API error {}: {}", status, envelope.error.message),
        Err(_) if body.trim().is_empty() => format!("Gemini API error {}", status),
        Err(_) => format!("Gemini API error {}: {}", status, body.trim()),
    }
}

/// Drop everything up to the first comma of a `data:` URL
pub fn strip_data_url_prefix(url: &str) -> &str {
    match url.split_once(',') {
        Some((_, payload)) => payload,
        None => url,
    }
}

/// Read an attached image fully and return it as base64 inline data
pub async fn encode_image(image: &ImageRef) -> Result<InlineData, AdapterError> {
    let data = match &image.source {
        ImageSource::File(path) => {
            let bytes = tokio::fs::read(path)
                .await
                .map_err(|source| AdapterError::ImageRead {
                    path: path.clone(),
                    source,
                })?;
            STANDARD.encode(bytes)
        }
        ImageSource::DataUrl(url) => {
            let payload = strip_data_url_prefix(url.trim());
            STANDARD
                .decode(payload)
                .map_err(|e| AdapterError::InvalidImage(e.to_string()))?;
            payload.to_string()
        }
    };

    Ok(InlineData {
        mime_type: image.mime_type.clone(),
        data,
    })
}

#[derive(Clone)]
pub struct GeminiClient {
    client: Client,
    api_key: Option<String>,
    base_url: String,
    settings: ModelSettings,
    slot: Arc<Semaphore>,
}

impl GeminiClient {
    pub fn new(api_key: Option<String>, base_url: &str, settings: ModelSettings) -> Self {
        Self {
            client: Client::new(),
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
            settings,
            slot: Arc::new(Semaphore::new(1)),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.resolve_api_key(),
            &config.api_base_url,
            ModelSettings::from(config),
        )
    }

    pub fn has_credential(&self) -> bool {
        self.api_key.is_some()
    }

    pub fn settings(&self) -> &ModelSettings {
        &self.settings
    }

    /// Send one request and return the answer text.
    ///
    /// Only one call may be in flight per client (clones share the slot);
    /// an overlapping call fails with [`AdapterError::Busy`].
    pub async fn generate(&self, request: SendRequest) -> Result<String, AdapterError> {
        let _permit = self.slot.try_acquire().map_err(|_| AdapterError::Busy)?;

        let api_key = self.api_key.as_deref().ok_or(AdapterError::MissingCredential)?;
        let plan = plan_request(&request, &self.settings);

        let inline = match &request.image {
            Some(image) => Some(encode_image(image).await?),
            None => None,
        };
        let body = GenerateContentRequest::new(&plan, &request.prompt, inline);

        info!(
            model = %plan.model,
            thinking_budget = ?plan.thinking_budget,
            has_image = request.image.is_some(),
            "sending generateContent request"
        );

        let result = self.post(api_key, &plan, &body).await;
        match &result {
            Ok(text) => debug!(chars = text.chars().count(), "received answer"),
            Err(e) => error!(model = %plan.model, "Gemini request failed: {}", e),
        }
        result
    }

    async fn post(
        &self,
        api_key: &str,
        plan: &GenerationPlan,
        body: &GenerateContentRequest,
    ) -> Result<String, AdapterError> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, plan.model);

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| AdapterError::transport(plan.stage, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(AdapterError::transport(plan.stage, api_error_message(status, &text)));
        }

        let parsed: GenerateContentResponse = response
            .json()
            .await
            .map_err(|e| AdapterError::transport(plan.stage, e))?;
        parsed.into_text(plan.stage)
    }
}
