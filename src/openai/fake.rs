use anyhow::Result;
use async_openai::types::{
    ChatChoice, ChatCompletionRequestMessage, ChatCompletionResponseMessage,
    CompletionUsage, CreateChatCompletionResponse, FinishReason, Role,
};
use async_trait::async_trait;
use std::sync::Mutex;
use std::time::Duration;

use crate::openai::{ModelRequest, OpenAIClientTrait};

enum FakeReply {
    Content {
        content: Option<String>,
        delay: Option<Duration>,
    },
    Error(String),
}

/// A fake implementation of the OpenAI client for testing
///
/// This fake client allows tests to control exactly what responses are
/// returned, without making any real API calls. It provides a builder
/// pattern for configuration and tracks requests for verification in tests.
///
/// # Example
///
/// ```
/// use tutorbench::openai::{response_content, OpenAIClientTrait};
/// use tutorbench::openai::fake::FakeOpenAIClient;
/// use async_openai::types::{ChatCompletionRequestMessage, ChatCompletionRequestUserMessageArgs};
///
/// #[tokio::main]
/// async fn main() -> anyhow::Result<()> {
///     let client = FakeOpenAIClient::new()
///         .with_response("First response");
///
///     let user_msg = ChatCompletionRequestUserMessageArgs::default()
///         .content("Hello")
///         .build()?;
///     let messages = vec![ChatCompletionRequestMessage::User(user_msg)];
///
///     let response = client.chat_completion("gpt-4o".to_string(), messages).await?;
///     assert_eq!(response_content(&response), "First response");
///     Ok(())
/// }
/// ```
pub struct FakeOpenAIClient {
    replies: Mutex<Vec<FakeReply>>,
    // Track requests for verification in tests
    pub requests: Mutex<Vec<ModelRequest>>,
}

impl Default for FakeOpenAIClient {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeOpenAIClient {
    pub fn new() -> Self {
        Self {
            replies: Mutex::new(vec![]),
            requests: Mutex::new(vec![]),
        }
    }

    /// Add a response to be returned by the fake client
    pub fn with_response(self, response: &str) -> Self {
        self.replies.lock().unwrap().push(FakeReply::Content {
            content: Some(response.to_string()),
            delay: None,
        });
        self
    }

    /// Add a response that is only returned after the given delay. Useful
    /// for forcing out-of-order completion in concurrency tests.
    pub fn with_delayed_response(self, response: &str, delay: Duration) -> Self {
        self.replies.lock().unwrap().push(FakeReply::Content {
            content: Some(response.to_string()),
            delay: Some(delay),
        });
        self
    }

    /// Configure the client to return a response with None content
    pub fn with_none_content_response(self) -> Self {
        self.replies.lock().unwrap().push(FakeReply::Content {
            content: None,
            delay: None,
        });
        self
    }

    /// Configure the client to fail one call with the given error message
    pub fn with_error(self, message: &str) -> Self {
        self.replies
            .lock()
            .unwrap()
            .push(FakeReply::Error(message.to_string()));
        self
    }

    /// Add multiple responses to be returned by the fake client in sequence
    pub fn with_responses(self, responses: Vec<&str>) -> Self {
        {
            let mut replies = self.replies.lock().unwrap();
            for response in responses {
                replies.push(FakeReply::Content {
                    content: Some(response.to_string()),
                    delay: None,
                });
            }
        }
        self
    }
}

#[async_trait]
impl OpenAIClientTrait for FakeOpenAIClient {
    #[allow(deprecated)]
    async fn chat_completion(
        &self,
        model: String,
        _messages: Vec<ChatCompletionRequestMessage>,
    ) -> Result<CreateChatCompletionResponse, anyhow::Error> {
        // Store the request for later verification
        self.requests.lock().unwrap().push(ModelRequest {
            model_name: model.clone(),
        });

        let reply = {
            let mut replies = self.replies.lock().unwrap();
            if replies.is_empty() {
                FakeReply::Content {
                    content: Some("Fake default response".to_string()),
                    delay: None,
                }
            } else {
                replies.remove(0)
            }
        };

        let content_option = match reply {
            FakeReply::Content { content, delay } => {
                if let Some(delay) = delay {
                    tokio::time::sleep(delay).await;
                }
                content
            }
            FakeReply::Error(message) => {
                return Err(anyhow::anyhow!(message))
            }
        };

        // Create the response message
        let message = ChatCompletionResponseMessage {
            role: Role::Assistant,
            content: content_option,
            #[allow(deprecated)]
            function_call: None,
            tool_calls: None,
            #[allow(deprecated)]
            refusal: None,
            audio: None,
        };

        let chat_choice = ChatChoice {
            index: 0,
            message,
            finish_reason: Some(FinishReason::Stop),
            logprobs: None,
        };

        let usage = CompletionUsage {
            prompt_tokens: 0,
            completion_tokens: 0,
            total_tokens: 0,
            prompt_tokens_details: None,
            completion_tokens_details: None,
        };

        Ok(CreateChatCompletionResponse {
            id: "fake_id".to_string(),
            object: "chat.completion".to_string(),
            created: 0,
            model: model.clone(),
            system_fingerprint: Some("fake-fingerprint".to_string()),
            service_tier: None,
            choices: vec![chat_choice],
            usage: Some(usage),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::openai::response_content;
    use async_openai::types::ChatCompletionRequestSystemMessageArgs;

    #[tokio::test]
    async fn test_fake_openai_client_responses() -> Result<(), anyhow::Error> {
        let client = FakeOpenAIClient::new()
            .with_response("First response")
            .with_response("Second response");

        let system_msg = ChatCompletionRequestSystemMessageArgs::default()
            .content("You are helpful")
            .build()?;

        let response1 = client
            .chat_completion(
                "gpt-4o".to_string(),
                vec![ChatCompletionRequestMessage::System(system_msg)],
            )
            .await
            .unwrap();
        assert_eq!(response_content(&response1), "First response");

        let response2 = client
            .chat_completion("gpt-4o".to_string(), vec![])
            .await
            .unwrap();
        assert_eq!(response_content(&response2), "Second response");

        // Exhausted scripts fall back to the default response
        let response3 = client
            .chat_completion("gpt-4o".to_string(), vec![])
            .await
            .unwrap();
        assert_eq!(response_content(&response3), "Fake default response");

        Ok(())
    }

    #[tokio::test]
    async fn test_scripted_error_is_returned() {
        let client = FakeOpenAIClient::new().with_error("rate limited");

        let result = client.chat_completion("gpt-4o".to_string(), vec![]).await;
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("rate limited"));
    }

    #[tokio::test]
    async fn test_request_tracking() {
        let client = FakeOpenAIClient::new().with_response("Test response");

        let _ = client
            .chat_completion("gpt-4o".to_string(), vec![])
            .await
            .unwrap();

        let requests = client.requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].model_name, "gpt-4o");
    }

    #[tokio::test]
    async fn test_delayed_response_waits_before_returning() {
        let client = FakeOpenAIClient::new()
            .with_delayed_response("Slow response", Duration::from_millis(50));

        let started = std::time::Instant::now();
        let response = client
            .chat_completion("gpt-4o".to_string(), vec![])
            .await
            .unwrap();

        assert!(started.elapsed() >= Duration::from_millis(50));
        assert_eq!(response_content(&response), "Slow response");
    }

    #[tokio::test]
    async fn test_none_content_response() {
        let client = FakeOpenAIClient::new().with_none_content_response();

        let response = client
            .chat_completion("gpt-4o".to_string(), vec![])
            .await
            .unwrap();

        assert_eq!(response.choices[0].message.content, None);
        assert_eq!(response_content(&response), "");
    }
}
