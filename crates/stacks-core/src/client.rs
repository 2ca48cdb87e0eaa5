use crate::chat_log::ChatEntry;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Body of `POST /ask`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AskRequest {
    pub user_id: String,
    pub question: String,
    pub chat_id: String,
    /// Earlier exchanges of the same session, oldest first
    pub history: Vec<ChatEntry>,
}

#[derive(Deserialize)]
struct AskResponse {
    response: String,
}

/// Anything that can answer a question; the HTTP client in production, a
/// scripted stand-in under test.
#[async_trait]
pub trait AskBackend: Send + Sync {
    async fn ask(&self, request: &AskRequest) -> Result<String>;

    /// Where questions go, for pointing the user at a server that is down
    fn base_url(&self) -> Option<&str> {
        None
    }
}

#[derive(Clone)]
pub struct AskClient {
    client: Client,
    base_url: String,
}

impl AskClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl AskBackend for AskClient {
    async fn ask(&self, request: &AskRequest) -> Result<String> {
        let url = format!("{}/ask", self.base_url);
        debug!(%url, chat_id = %request.chat_id, history = request.history.len(), "sending question");

        let response = self
            .client
            .post(&url)
            .header("Accept", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| anyhow!("Could not reach {}: {}", url, e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            return Err(anyhow!("Ask endpoint error {}: {}", status, text));
        }

        let ask_response: AskResponse = response.json().await?;
        Ok(ask_response.response)
    }

    fn base_url(&self) -> Option<&str> {
        Some(&self.base_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trailing_slash_is_trimmed() {
        let client = AskClient::new("http://localhost:5000/");
        assert_eq!(client.base_url(), Some("http://localhost:5000"));
    }

    #[test]
    fn test_request_wire_format() {
        let request = AskRequest {
            user_id: "u1".to_string(),
            question: "hi".to_string(),
            chat_id: "s1".to_string(),
            history: Vec::new(),
        };
        let value = serde_json::to_value(&request).unwrap();

        assert_eq!(
            value,
            serde_json::json!({"user_id": "u1", "question": "hi", "chat_id": "s1", "history": []})
        );
    }
}
