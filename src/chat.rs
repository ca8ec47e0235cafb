//! Hosted chat-completion models.
//!
//! One prompt in, one completion out: no streaming and no retries.
//!
//! - **[`OpenAIChatModel`]**: `POST {base_url}/chat/completions`, sending the
//!   prompt as a single user message.
//! - **[`OllamaChatModel`]**: `POST {url}/api/chat` with `stream: false`.

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;

use crate::config::ChatConfig;
use crate::credentials::ApiKey;
use crate::http;

#[async_trait]
pub trait ChatModel: Send + Sync {
    fn model_name(&self) -> &str;
    /// Generate a completion for `prompt` and return the text verbatim.
    async fn complete(&self, prompt: &str) -> Result<String>;
}

pub struct OpenAIChatModel {
    model: String,
    temperature: f32,
    endpoint: String,
    api_key: ApiKey,
    client: reqwest::Client,
}

impl OpenAIChatModel {
    pub fn new(config: &ChatConfig, api_key: ApiKey) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            endpoint: format!("{}/chat/completions", config.base_url.trim_end_matches('/')),
            api_key,
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatModel for OpenAIChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "temperature": self.temperature,
            "messages": [{"role": "user", "content": prompt}],
        });

        let request = self
            .client
            .post(&self.endpoint)
            .header("Authorization", self.api_key.bearer())
            .json(&body);

        let json = http::send_json(request, "OpenAI chat").await?;
        parse_openai_completion(&json)
    }
}

fn parse_openai_completion(json: &serde_json::Value) -> Result<String> {
    let message = json
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .and_then(|c| c.get("message"))
        .ok_or_else(|| anyhow!("OpenAI chat returned no message choices"))?;

    if let Some(refusal) = message.get("refusal").and_then(|r| r.as_str()) {
        bail!("OpenAI chat refused: {}", refusal);
    }

    Ok(message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or_default()
        .to_string())
}

pub struct OllamaChatModel {
    model: String,
    temperature: f32,
    url: String,
    client: reqwest::Client,
}

impl OllamaChatModel {
    pub fn new(config: &ChatConfig) -> Result<Self> {
        Ok(Self {
            model: config.model.clone(),
            temperature: config.temperature,
            url: config.ollama_url().trim_end_matches('/').to_string(),
            client: http::client(config.timeout_secs)?,
        })
    }
}

#[async_trait]
impl ChatModel for OllamaChatModel {
    fn model_name(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "stream": false,
            "options": {"temperature": self.temperature},
            "messages": [{"role": "user", "content": prompt}],
        });

        let request = self.client.post(format!("{}/api/chat", self.url)).json(&body);
        let json = http::send_json(request, "Ollama chat").await?;

        json.get("message")
            .and_then(|m| m.get("content"))
            .and_then(|c| c.as_str())
            .map(str::to_string)
            .ok_or_else(|| anyhow!("Invalid Ollama chat response: missing message content"))
    }
}

/// Create the configured [`ChatModel`]. `openai` requires a credential.
pub fn create_chat_model(
    config: &ChatConfig,
    api_key: Option<&ApiKey>,
) -> Result<Box<dyn ChatModel>> {
    match config.provider.as_str() {
        "openai" => {
            let key = api_key
                .cloned()
                .ok_or_else(|| anyhow!("The openai chat provider requires an API key"))?;
            Ok(Box::new(OpenAIChatModel::new(config, key)?))
        }
        "ollama" => Ok(Box::new(OllamaChatModel::new(config)?)),
        other => bail!("Unknown chat provider: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_first_choice() {
        let json = serde_json::json!({
            "choices": [
                {"index": 0, "message": {"role": "assistant", "content": "The warranty is 2 years."}}
            ]
        });
        assert_eq!(
            parse_openai_completion(&json).unwrap(),
            "The warranty is 2 years."
        );
    }

    #[test]
    fn test_no_choices_is_error() {
        let json = serde_json::json!({"choices": []});
        assert!(parse_openai_completion(&json).is_err());
    }

    #[test]
    fn test_refusal_is_error() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": null, "refusal": "no"}}]
        });
        let err = parse_openai_completion(&json).unwrap_err();
        assert!(err.to_string().contains("refused"));
    }

    #[test]
    fn test_null_content_is_empty_answer() {
        let json = serde_json::json!({
            "choices": [{"message": {"role": "assistant", "content": null}}]
        });
        assert_eq!(parse_openai_completion(&json).unwrap(), "");
    }

    #[test]
    fn test_openai_requires_key() {
        let err = create_chat_model(&ChatConfig::default(), None).err().unwrap();
        assert!(err.to_string().contains("requires an API key"));
        let key = ApiKey::new("sk-test").unwrap();
        let model = create_chat_model(&ChatConfig::default(), Some(&key)).unwrap();
        assert_eq!(model.model_name(), "gpt-4");
    }
}
