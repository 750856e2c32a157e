//! services/api/src/adapters/gemini.rs
//!
//! This module contains the adapter for the multimodal classifier. It talks to
//! Gemini through its OpenAI-compatible endpoint and implements the `AiGateway`
//! port from the `core` crate. Replies are returned raw; decoding and validation
//! happen in the core.

use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::chat::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContentPart,
        CreateChatCompletionRequestArgs,
        CreateChatCompletionResponse, ImageDetail, ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use tracing::debug;
use trip_mate_core::ports::{AiGateway, PortError, PortResult};

const VISION_INSTRUCTIONS: &str = r#"You help a group keep track of travel spending and memories.
Look at the photo and answer with a single raw JSON object, no markdown.

Rules:
- Receipt, bill or priced menu: "type": "expense", "category" is "food", "stay" or "transport" depending on context (otherwise "other"), "name" is the merchant or service, "amount" is the grand total as an integer.
- Food without a price: "type": "memory", "category": "food", a short "name", and a cheerful one-line "description" with an emoji.
- Scenery or people: "type": "memory", "category": "scenery", a short "name", and a warm one-line "description" with an emoji.

Schema:
{"type": "expense" | "memory", "category": "food" | "stay" | "transport" | "scenery" | "other", "name": string, "amount": number (0 unless expense), "description": string}"#;

const SUMMARY_INSTRUCTIONS: &str = "You comment on a group's travel spending. Be funny and brief \
(at most 150 words), use a few emoji, and end with one concrete tip for saving money.";

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `AiGateway` using an OpenAI-compatible chat endpoint.
#[derive(Clone)]
pub struct GeminiAdapter {
    client: Client<OpenAIConfig>,
    vision_model: String,
    summary_model: String,
}

impl GeminiAdapter {
    /// Creates a new `GeminiAdapter`.
    pub fn new(client: Client<OpenAIConfig>, vision_model: String, summary_model: String) -> Self {
        Self {
            client,
            vision_model,
            summary_model,
        }
    }

    /// A client pointed at `api_base` with `api_key`.
    pub fn client_for(api_base: &str, api_key: &str) -> Client<OpenAIConfig> {
        Client::with_config(
            OpenAIConfig::new()
                .with_api_base(api_base)
                .with_api_key(api_key),
        )
    }
}

fn first_text(response: CreateChatCompletionResponse, what: &str) -> PortResult<String> {
    // Extract the text content from the first choice in the response.
    match response.choices.into_iter().next() {
        Some(choice) => choice.message.content.ok_or_else(|| {
            PortError::ClassificationFailed(format!("{} response contained no text content.", what))
        }),
        None => Err(PortError::ClassificationFailed(format!(
            "{} returned no choices in its response.",
            what
        ))),
    }
}

//=========================================================================================
// `AiGateway` Trait Implementation
//=========================================================================================

#[async_trait]
impl AiGateway for GeminiAdapter {
    async fn analyze_image_raw(&self, base64_data: &str, mime_type: &str) -> PortResult<String> {
        let data_url = format!("data:{};base64,{}", mime_type, base64_data);
        let content: Vec<ChatCompletionRequestUserMessageContentPart> = vec![
            ChatCompletionRequestMessageContentPartTextArgs::default()
                .text("Classify this photo.")
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestMessageContentPartImageArgs::default()
                .image_url(
                    ImageUrlArgs::default()
                        .url(data_url)
                        .detail(ImageDetail::Auto)
                        .build()
                        .map_err(|e| PortError::Unexpected(e.to_string()))?,
                )
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(VISION_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.vision_model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::ClassificationFailed(e.to_string()))?;

        let text = first_text(response, "Vision model")?;
        debug!(mime_type, reply_len = text.len(), "vision model replied");
        Ok(text)
    }

    async fn summarize_expenses(&self, expenses_json: &str) -> PortResult<String> {
        let messages = vec![
            ChatCompletionRequestSystemMessageArgs::default()
                .content(SUMMARY_INSTRUCTIONS)
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
            ChatCompletionRequestUserMessageArgs::default()
                .content(format!("EXPENSES: {}", expenses_json))
                .build()
                .map_err(|e| PortError::Unexpected(e.to_string()))?
                .into(),
        ];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.summary_model)
            .messages(messages)
            .n(1)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let response = self
            .client
            .chat()
            .create(request)
            .await
            .map_err(|e: OpenAIError| PortError::ClassificationFailed(e.to_string()))?;

        first_text(response, "Summary model")
    }
}
