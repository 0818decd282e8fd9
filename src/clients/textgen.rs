//! AI text-generation provider client (assistants-style thread/run API).
//!
//! Submitting a prompt is three calls: create a thread, post the prompt as
//! a message, start a run against the configured assistant. The run is then
//! polled with bounded backoff until it completes or the deadline passes.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::time::{Instant, sleep};
use tracing::debug;

use crate::config::GenerationConfig;

#[derive(Debug, Error)]
pub enum TextGenError {
    #[error("Provider request failed: {0}")]
    Request(String),

    #[error("Provider returned {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Run ended in state {0}")]
    RunFailed(String),

    #[error("Run did not complete within the deadline")]
    Timeout,

    #[error("Unexpected response shape: {0}")]
    BadResponse(String),
}

impl From<reqwest::Error> for TextGenError {
    fn from(err: reqwest::Error) -> Self {
        Self::Request(err.to_string())
    }
}

#[derive(Debug, Deserialize)]
struct ThreadResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct RunResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct MessageList {
    data: Vec<ThreadMessage>,
}

#[derive(Debug, Deserialize)]
struct ThreadMessage {
    content: Vec<MessageContent>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum MessageContent {
    Text { text: MessageText },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct MessageText {
    value: String,
}

pub struct TextGenClient {
    client: Client,
    base_url: String,
    api_key: String,
    assistant_id: String,
    poll_initial: Duration,
    poll_backoff_factor: f64,
    poll_max: Duration,
    poll_deadline: Duration,
}

impl TextGenClient {
    #[must_use]
    pub fn with_shared_client(client: Client, config: &GenerationConfig) -> Self {
        Self {
            client,
            base_url: config.provider_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            assistant_id: config.assistant_id.clone(),
            poll_initial: Duration::from_millis(config.poll_initial_ms),
            poll_backoff_factor: config.poll_backoff_factor,
            poll_max: Duration::from_millis(config.poll_max_ms),
            poll_deadline: Duration::from_secs(config.poll_deadline_seconds),
        }
    }

    /// Runs the prompt and returns the text variations from the assistant's
    /// reply, which is a JSON object of numbered strings.
    pub async fn generate(&self, prompt: &str) -> Result<Vec<String>, TextGenError> {
        let thread: ThreadResponse = self
            .post("/threads", &json!({}))
            .await?;

        let _: serde_json::Value = self
            .post(
                &format!("/threads/{}/messages", thread.id),
                &json!({ "role": "user", "content": prompt }),
            )
            .await?;

        let run: RunResponse = self
            .post(
                &format!("/threads/{}/runs", thread.id),
                &json!({ "assistant_id": self.assistant_id }),
            )
            .await?;

        self.wait_for_run(&thread.id, &run.id).await?;

        let messages: MessageList = self
            .get(&format!("/threads/{}/messages", thread.id))
            .await?;
        let reply = messages
            .data
            .first()
            .and_then(|message| {
                message.content.iter().find_map(|content| match content {
                    MessageContent::Text { text } => Some(text.value.clone()),
                    MessageContent::Other => None,
                })
            })
            .ok_or_else(|| TextGenError::BadResponse("no text content in reply".to_string()))?;

        parse_variations(&reply)
    }

    /// Bounded poll: delay grows by the backoff factor up to a cap, and the
    /// whole wait is abandoned at the deadline.
    async fn wait_for_run(&self, thread_id: &str, run_id: &str) -> Result<(), TextGenError> {
        let deadline = Instant::now() + self.poll_deadline;
        let mut delay = self.poll_initial;

        loop {
            sleep(delay).await;

            let run: RunResponse = self
                .get(&format!("/threads/{thread_id}/runs/{run_id}"))
                .await?;
            debug!(run_id = %run.id, status = %run.status, "Polled run status");

            match run.status.as_str() {
                "completed" => return Ok(()),
                "queued" | "in_progress" => {}
                other => return Err(TextGenError::RunFailed(other.to_string())),
            }

            if Instant::now() >= deadline {
                return Err(TextGenError::Timeout);
            }

            delay = delay
                .mul_f64(self.poll_backoff_factor)
                .min(self.poll_max);
        }
    }

    async fn post<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<T, TextGenError> {
        let response = self
            .client
            .post(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .json(body)
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, TextGenError> {
        let response = self
            .client
            .get(format!("{}{path}", self.base_url))
            .bearer_auth(&self.api_key)
            .header("OpenAI-Beta", "assistants=v2")
            .send()
            .await?;
        Self::decode(response).await
    }

    async fn decode<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, TextGenError> {
        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(TextGenError::Status { status, body });
        }
        Ok(response.json().await?)
    }
}

/// The assistant replies with `{"1": "...", "2": "..."}`; order by the
/// numeric key so variation 10 does not sort before variation 2.
fn parse_variations(reply: &str) -> Result<Vec<String>, TextGenError> {
    let map: BTreeMap<String, String> = serde_json::from_str(reply)
        .map_err(|err| TextGenError::BadResponse(err.to_string()))?;

    let mut numbered: Vec<(u32, String)> = map
        .into_iter()
        .map(|(key, value)| {
            key.parse::<u32>()
                .map(|n| (n, value))
                .map_err(|_| TextGenError::BadResponse(format!("non-numeric key {key:?}")))
        })
        .collect::<Result<_, _>>()?;
    numbered.sort_by_key(|(n, _)| *n);

    Ok(numbered.into_iter().map(|(_, text)| text).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_numbered_variations_in_order() {
        let reply = r#"{"2": "second", "1": "first", "10": "tenth"}"#;
        assert_eq!(
            parse_variations(reply).unwrap(),
            vec!["first", "second", "tenth"]
        );
    }

    #[test]
    fn rejects_non_json_reply() {
        assert!(matches!(
            parse_variations("```json\n{}\n```"),
            Err(TextGenError::BadResponse(_))
        ));
    }

    #[test]
    fn rejects_non_numeric_keys() {
        assert!(matches!(
            parse_variations(r#"{"first": "a"}"#),
            Err(TextGenError::BadResponse(_))
        ));
    }
}
