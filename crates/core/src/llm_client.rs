use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
        ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestUserMessageArgs,
        CreateChatCompletionRequestArgs, CreateChatCompletionResponse,
    },
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ProviderError, ProviderErrorKind};
use crate::pricing::TokenUsage;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of the running conversation sent to the provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A successful, non-streamed completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completion {
    pub content: String,
    pub usage: TokenUsage,
}

/// A chat-completion provider: one request in, one answer out.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Sends the full message list to `model` and waits for the answer.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<Completion, ProviderError>;
}

/// An implementation of `LLMClient` for any OpenAI-compatible API.
pub struct OpenAICompatibleClient {
    client: Client<OpenAIConfig>,
}

impl OpenAICompatibleClient {
    /// Creates a new client for an OpenAI-compatible service.
    ///
    /// # Arguments
    ///
    /// * `config` - The configuration for the OpenAI client, including API key,
    ///   organization and base URL.
    pub fn new(config: OpenAIConfig) -> Self {
        Self {
            client: Client::with_config(config),
        }
    }
}

#[async_trait]
impl LLMClient for OpenAICompatibleClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<Completion, ProviderError> {
        let request_messages = messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, _>>()
            .map_err(classify)?;

        let request = CreateChatCompletionRequestArgs::default()
            .model(model)
            .messages(request_messages)
            .build()
            .map_err(classify)?;

        let response: CreateChatCompletionResponse =
            self.client.chat().create(request).await.map_err(classify)?;
        debug!(model = %model, id = %response.id, "Chat completion received");

        let content = response
            .choices
            .first()
            .ok_or_else(|| ProviderError::malformed("No response choice from LLM"))?
            .message
            .content
            .clone()
            .ok_or_else(|| ProviderError::malformed("No content in LLM response"))?;
        let usage = response
            .usage
            .ok_or_else(|| ProviderError::malformed("No usage in LLM response"))?;

        Ok(Completion {
            content,
            usage: TokenUsage {
                total_tokens: usage.total_tokens,
                prompt_tokens: usage.prompt_tokens,
                completion_tokens: usage.completion_tokens,
            },
        })
    }
}

fn to_request_message(message: &ChatMessage) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let content = message.content.clone();
    Ok(match message.role {
        Role::System => ChatCompletionRequestSystemMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        Role::User => ChatCompletionRequestUserMessageArgs::default()
            .content(content)
            .build()?
            .into(),
        Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
            .content(content)
            .build()?
            .into(),
    })
}

/// Maps an `async-openai` failure onto a provider error category.
fn classify(err: OpenAIError) -> ProviderError {
    let kind = match &err {
        OpenAIError::Reqwest(e) => match e.status() {
            Some(status) if status.as_u16() == 401 || status.as_u16() == 403 => {
                ProviderErrorKind::Authentication
            }
            Some(status) if status.as_u16() == 429 => ProviderErrorKind::RateLimit,
            Some(status) if status.is_server_error() => ProviderErrorKind::Server,
            _ => ProviderErrorKind::Network,
        },
        OpenAIError::ApiError(api) => {
            let kind = api.r#type.as_deref().unwrap_or_default();
            let message = api.message.to_lowercase();
            if kind.contains("auth") || message.contains("api key") {
                ProviderErrorKind::Authentication
            } else if kind.contains("rate_limit")
                || kind.contains("insufficient_quota")
                || message.contains("rate limit")
            {
                ProviderErrorKind::RateLimit
            } else if kind.contains("server") {
                ProviderErrorKind::Server
            } else {
                ProviderErrorKind::Other
            }
        }
        OpenAIError::JSONDeserialize(..) => ProviderErrorKind::MalformedResponse,
        _ => ProviderErrorKind::Other,
    };
    ProviderError::new(kind, err.to_string())
}

/// A credential-free `LLMClient` for local development.
///
/// Replies are deterministic and token counts are whitespace-separated word
/// counts, which keeps cost accounting exercised without a real provider.
pub struct OfflineClient;

#[async_trait]
impl LLMClient for OfflineClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        model: &str,
    ) -> Result<Completion, ProviderError> {
        let question = messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .ok_or_else(|| ProviderError::malformed("No user message to answer"))?;

        let content = format!(
            "[{}] Let's think about this together: {}",
            model,
            question.trim()
        );
        let prompt_tokens: u32 = messages
            .iter()
            .map(|m| m.content.split_whitespace().count() as u32)
            .sum();
        let completion_tokens = content.split_whitespace().count() as u32;

        Ok(Completion {
            content,
            usage: TokenUsage {
                total_tokens: prompt_tokens + completion_tokens,
                prompt_tokens,
                completion_tokens,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_message_serializes_role_lowercase() {
        let json = serde_json::to_value(ChatMessage::system("be helpful")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"role": "system", "content": "be helpful"})
        );
    }

    #[test]
    fn test_request_messages_keep_roles() {
        let messages = [
            ChatMessage::system("s"),
            ChatMessage::user("u"),
            ChatMessage::assistant("a"),
        ];
        let converted: Vec<_> = messages
            .iter()
            .map(|m| to_request_message(m).unwrap())
            .collect();
        assert!(matches!(
            converted[0],
            ChatCompletionRequestMessage::System(_)
        ));
        assert!(matches!(converted[1], ChatCompletionRequestMessage::User(_)));
        assert!(matches!(
            converted[2],
            ChatCompletionRequestMessage::Assistant(_)
        ));
    }

    #[test]
    fn test_classify_invalid_argument_as_other() {
        let err = classify(OpenAIError::InvalidArgument("model is required".to_string()));
        assert_eq!(err.kind, ProviderErrorKind::Other);
        assert!(err.message.contains("model is required"));
    }

    #[tokio::test]
    async fn test_offline_client_answers_last_user_message() {
        let messages = vec![
            ChatMessage::system("You are a helpful assistant."),
            ChatMessage::user("What is a loop?"),
        ];
        let completion = OfflineClient.complete(&messages, "gpt-4").await.unwrap();
        assert!(completion.content.contains("What is a loop?"));
        assert_eq!(completion.usage.prompt_tokens, 9);
        assert_eq!(
            completion.usage.total_tokens,
            completion.usage.prompt_tokens + completion.usage.completion_tokens
        );
    }

    #[tokio::test]
    async fn test_offline_client_needs_a_user_message() {
        let err = OfflineClient
            .complete(&[ChatMessage::system("s")], "gpt-4")
            .await
            .unwrap_err();
        assert_eq!(err.kind, ProviderErrorKind::MalformedResponse);
    }
}
