//! services/api/src/adapters/ocr_llm.rs
//!
//! This module contains the adapter for an OpenAI-compatible vision model
//! (e.g. DeepSeek-OCR served by vLLM). It implements the `OcrService` port
//! from the `core` crate: one chat completion per rendered page.

use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionRequestMessageContentPartImageArgs,
        ChatCompletionRequestMessageContentPartTextArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequest,
        CreateChatCompletionRequestArgs, ImageDetail, ImageUrlArgs,
    },
    Client,
};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine;
use slide_search_core::domain::PageImage;
use slide_search_core::ports::{OcrService, PortError, PortResult};
use tracing::debug;

const MAX_OUTPUT_TOKENS: u32 = 4096;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `OcrService` using an OpenAI-compatible vision model.
#[derive(Clone)]
pub struct OpenAiOcrAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    prompt: String,
    timeout: Duration,
}

impl OpenAiOcrAdapter {
    /// Creates a new `OpenAiOcrAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, prompt: String, timeout: Duration) -> Self {
        Self {
            client,
            model,
            prompt,
            timeout,
        }
    }

    fn build_request(&self, page: &PageImage) -> PortResult<CreateChatCompletionRequest> {
        let image = ChatCompletionRequestMessageContentPartImageArgs::default()
            .image_url(
                ImageUrlArgs::default()
                    .url(png_data_url(&page.png_data))
                    .detail(ImageDetail::High)
                    .build()
                    .map_err(|e| PortError::Unexpected(e.to_string()))?,
            )
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;
        let prompt = ChatCompletionRequestMessageContentPartTextArgs::default()
            .text(self.prompt.as_str())
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let message = ChatCompletionRequestUserMessageArgs::default()
            .content(vec![
                ChatCompletionRequestUserMessageContentPart::ImageUrl(image),
                ChatCompletionRequestUserMessageContentPart::Text(prompt),
            ])
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        CreateChatCompletionRequestArgs::default()
            .model(&self.model)
            .messages(vec![message.into()])
            .max_tokens(MAX_OUTPUT_TOKENS)
            .temperature(0.0)
            .build()
            .map_err(|e| PortError::Unexpected(e.to_string()))
    }
}

/// Inlines PNG bytes as a base64 `data:` URL.
pub fn png_data_url(png: &[u8]) -> String {
    format!("data:image/png;base64,{}", BASE64_STANDARD.encode(png))
}

//=========================================================================================
// `OcrService` Trait Implementation
//=========================================================================================

#[async_trait]
impl OcrService for OpenAiOcrAdapter {
    /// Transcribes one page. Exceeding the timeout is reported as `PortError::Timeout`.
    async fn ocr(&self, page: &PageImage) -> PortResult<String> {
        let request = self.build_request(page)?;

        let response = tokio::time::timeout(self.timeout, self.client.chat().create(request))
            .await
            .map_err(|_| {
                PortError::Timeout(format!(
                    "OCR of page {} exceeded {:?}",
                    page.page_index + 1,
                    self.timeout
                ))
            })?
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let text = response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| PortError::Unexpected("OCR response contained no text".to_string()))?;

        debug!(page = page.page_index + 1, chars = text.len(), "page transcribed");
        Ok(text.trim().to_string())
    }
}
