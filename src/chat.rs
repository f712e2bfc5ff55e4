//! Blocking client for an OpenAI-compatible chat backend.
//!
//! One request/response exchange per call; no streaming, no tool use.

use std::time::Duration;

use serde_json::{json, Value};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("chat request failed: {0}")]
    Request(String),

    #[error("unexpected chat response: {0}")]
    Parse(String),
}

pub struct ChatClient {
    agent: ureq::Agent,
    base_url: String,
    model: String,
    api_key: String,
}

impl ChatClient {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(60)) // chat completions can be slow
            .build();
        Self {
            agent,
            base_url: base_url.into(),
            model: model.into(),
            api_key: api_key.into(),
        }
    }

    /// One chat completion: system prompt + user prompt in, assistant text out.
    pub fn complete(&self, system_prompt: &str, user_prompt: &str) -> Result<String, ChatError> {
        let url = completions_url(&self.base_url);
        let payload = json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": user_prompt },
            ],
            "temperature": 0.1,
            "max_tokens": reply_budget(system_prompt, user_prompt),
        });

        let response = self
            .agent
            .post(&url)
            .set("Authorization", &format!("Bearer {}", self.api_key))
            .send_json(payload)
            .map_err(|e| ChatError::Request(e.to_string()))?;

        let body: Value = response
            .into_json()
            .map_err(|e| ChatError::Parse(format!("invalid JSON: {}", e)))?;
        body["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| ChatError::Parse("missing choices[0].message.content".to_string()))
    }
}

fn completions_url(base_url: &str) -> String {
    format!("{}/chat/completions", base_url.trim_end_matches('/'))
}

/// Reply budget scales with prompt size so long questions still get a full
/// answer.
fn reply_budget(system_prompt: &str, user_prompt: &str) -> usize {
    500 + system_prompt.chars().count() + user_prompt.chars().count()
}
