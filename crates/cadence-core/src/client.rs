//! Chat service client: posts a user message and measures the round trip
//! the scheduler compensates for.

use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use serde_json::json;
use tracing::{error, info};

use crate::config::Config;
use crate::types::ResponsePayload;

/// A reply plus the wall-clock time the request took.
#[derive(Debug, Clone)]
pub struct ChatReply {
    pub payload: ResponsePayload,
    pub backend_latency: Duration,
}

pub struct ChatClient {
    http: reqwest::Client,
    endpoint: String,
    bot_name: String,
    participant_id: Option<String>,
    conversation_id: String,
}

impl ChatClient {
    pub fn new(config: &Config) -> Result<Self> {
        let endpoint = config
            .chat_endpoint
            .clone()
            .context("chat_endpoint is not configured (config.yaml or CADENCE_CHAT_ENDPOINT)")?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            endpoint,
            bot_name: config.bot_name.clone(),
            participant_id: config.participant_id.clone(),
            conversation_id: uuid::Uuid::new_v4().to_string(),
        })
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }

    fn request_body(&self, message: &str) -> serde_json::Value {
        json!({
            "message": message,
            "bot_name": self.bot_name,
            "conversation_id": self.conversation_id,
            "participant_id": self.participant_id,
        })
    }

    /// Send `message`. Errors mean no reply: the caller must not schedule
    /// anything and should turn the typing indicator off.
    pub async fn send(&self, message: &str) -> Result<ChatReply> {
        let body = self.request_body(message);
        let started = Instant::now();

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .context("Chat request failed")?;

        let status = response.status();
        let text = response
            .text()
            .await
            .context("Failed to read chat response")?;
        let backend_latency = started.elapsed();

        if !status.is_success() {
            let detail: String = text.chars().take(200).collect();
            error!("Chat service HTTP {}: {}", status, detail);
            anyhow::bail!("Chat service returned HTTP {}: {}", status, detail);
        }

        let data: serde_json::Value =
            serde_json::from_str(&text).context("Failed to parse chat response")?;
        if let Some(err) = data.get("error").and_then(|v| v.as_str()) {
            anyhow::bail!("Chat service error: {}", err);
        }

        let payload: ResponsePayload =
            serde_json::from_value(data).context("Unexpected chat response shape")?;

        info!(
            "Chat reply in {} ms (conversation {})",
            backend_latency.as_millis(),
            self.conversation_id
        );
        Ok(ChatReply {
            payload,
            backend_latency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_endpoint() {
        let config = Config {
            chat_endpoint: None,
            ..Default::default()
        };
        assert!(ChatClient::new(&config).is_err());
    }

    #[test]
    fn test_request_body() {
        let config = Config {
            chat_endpoint: Some("http://localhost:9/api/chatbot/".into()),
            bot_name: "tutor".into(),
            participant_id: Some("p-1".into()),
            ..Default::default()
        };
        let client = ChatClient::new(&config).unwrap();
        let body = client.request_body("hi there");
        assert_eq!(body["message"], "hi there");
        assert_eq!(body["bot_name"], "tutor");
        assert_eq!(body["participant_id"], "p-1");
        assert_eq!(body["conversation_id"], client.conversation_id());
        assert!(uuid::Uuid::parse_str(client.conversation_id()).is_ok());
    }

    async fn serve(router: axum::Router) -> Config {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Config {
            chat_endpoint: Some(format!("http://{}/chat", addr)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_send_parses_reply() {
        let router = axum::Router::new().route(
            "/chat",
            axum::routing::post(|axum::Json(body): axum::Json<serde_json::Value>| async move {
                axum::Json(json!({"response_chunks": [format!("echo: {}", body["message"].as_str().unwrap_or(""))]}))
            }),
        );
        let client = ChatClient::new(&serve(router).await).unwrap();
        let reply = client.send("hi").await.unwrap();
        assert_eq!(reply.payload.chunks(), vec!["echo: hi".to_string()]);
        assert!(reply.backend_latency > Duration::ZERO);
    }

    #[tokio::test]
    async fn test_send_surfaces_http_status() {
        let router = axum::Router::new().route(
            "/chat",
            axum::routing::post(|| async {
                (axum::http::StatusCode::BAD_GATEWAY, "upstream exploded")
            }),
        );
        let client = ChatClient::new(&serve(router).await).unwrap();
        let err = client.send("hi").await.unwrap_err().to_string();
        assert!(err.contains("502"), "{}", err);
        assert!(err.contains("upstream exploded"), "{}", err);
    }

    #[tokio::test]
    async fn test_send_surfaces_error_field() {
        let router = axum::Router::new().route(
            "/chat",
            axum::routing::post(|| async { axum::Json(json!({"error": "bot not found"})) }),
        );
        let client = ChatClient::new(&serve(router).await).unwrap();
        let err = client.send("hi").await.unwrap_err().to_string();
        assert!(err.contains("bot not found"), "{}", err);
    }
}
