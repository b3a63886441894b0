use crate::openai::OpenAIClientTrait;
use anyhow::Result;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionRequestMessage, CreateChatCompletionRequestArgs,
    CreateChatCompletionResponse,
};
use async_openai::Client;
use async_trait::async_trait;
use std::sync::Arc;

// Generation parameters used for every System B request.
const TEMPERATURE: f32 = 0.7;
const MAX_COMPLETION_TOKENS: u32 = 2000;

// A real implementation of the OpenAI client
pub struct RealOpenAIClient {
    client: Client<OpenAIConfig>,
}

impl RealOpenAIClient {
    pub fn new(client: Client<OpenAIConfig>) -> Self {
        Self { client }
    }
}

/// Builds a client from the configured credential. The base URL override
/// is optional and mainly useful for proxies and compatible endpoints.
pub fn create_openai_client(
    api_key: String,
    api_base: Option<String>,
) -> Arc<dyn OpenAIClientTrait> {
    let mut config = OpenAIConfig::new().with_api_key(api_key);
    if let Some(api_base) = api_base {
        config = config.with_api_base(api_base);
    }

    Arc::new(RealOpenAIClient::new(Client::with_config(config)))
}

#[async_trait]
impl OpenAIClientTrait for RealOpenAIClient {
    async fn chat_completion(
        &self,
        model: String,
        messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<CreateChatCompletionResponse, anyhow::Error> {
        // Create the OpenAI request
        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(messages)
            .temperature(TEMPERATURE)
            .max_completion_tokens(MAX_COMPLETION_TOKENS)
            .build()?;

        // Send the request to OpenAI
        let response = self.client.chat().create(request).await?;

        Ok(response)
    }
}
