use super::{mention_line, Mention, Notification, Notifier, NotifyError};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use std::time::Duration;

/// Body POSTed to the webhook.
#[derive(Debug, Serialize)]
struct WebhookPayload<'a> {
    channel: &'a str,
    /// Ready-to-send mention markup (`<@id> <@id>`).
    content: String,
    mentions: &'a [Mention],
    notification: &'a Notification,
}

/// Delivers notifications by POSTing JSON to a webhook endpoint.
///
/// The URL usually embeds a token, so it is held as a secret and never logged.
pub struct WebhookNotifier {
    client: reqwest::Client,
    url: SecretString,
    timeout: Duration,
}

impl WebhookNotifier {
    pub fn new(client: reqwest::Client, url: SecretString, timeout: Duration) -> Self {
        Self {
            client,
            url,
            timeout,
        }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    async fn dispatch(
        &self,
        channel: &str,
        mentions: &[Mention],
        notification: &Notification,
    ) -> Result<(), NotifyError> {
        let payload = WebhookPayload {
            channel,
            content: mention_line(mentions),
            mentions,
            notification,
        };
        let body = serde_json::to_vec(&payload)?;

        let request = self
            .client
            .post(self.url.expose_secret())
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .body(body);

        let response = tokio::time::timeout(self.timeout, request.send())
            .await
            .map_err(|_| NotifyError::Timeout)?
            .map_err(|e| NotifyError::Network(e.without_url()))?;

        let status = response.status();
        if status.is_client_error() && status != reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(NotifyError::Rejected(format!("status {}", status.as_u16())));
        }
        if !status.is_success() {
            return Err(NotifyError::HttpStatus(status.as_u16()));
        }

        tracing::debug!(
            title_id = %notification.title_id,
            chapter_id = %notification.chapter_id,
            recipients = mentions.len(),
            "Notification delivered"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn notification() -> Notification {
        Notification {
            title_id: "t1".into(),
            title_name: "Alpha".into(),
            chapter_id: "c11".into(),
            chapter_number: 11.0,
            chapter_label: "11.0".into(),
            released_at: None,
            chapter_url: "https://reader.example.com/chapter/c11".into(),
            cover_url: Some("https://img.example.com/a.jpg".into()),
        }
    }

    fn notifier(server: &MockServer) -> WebhookNotifier {
        WebhookNotifier::new(
            reqwest::Client::new(),
            SecretString::from(format!("{}/hooks/secret-token", server.uri())),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_dispatch_posts_structured_payload() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/hooks/secret-token"))
            .and(header("content-type", "application/json"))
            .and(body_partial_json(serde_json::json!({
                "channel": "updates",
                "content": "<@u1> <@u2>",
                "mentions": ["u1", "u2"],
                "notification": {"title_name": "Alpha", "chapter_label": "11.0"}
            })))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        notifier(&server)
            .dispatch(
                "updates",
                &[Mention::user("u1"), Mention::user("u2")],
                &notification(),
            )
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_server_error_fails_dispatch() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&server)
            .await;

        let result = notifier(&server)
            .dispatch("updates", &[Mention::user("u1")], &notification())
            .await;
        assert!(matches!(result, Err(NotifyError::HttpStatus(502))));
    }

    #[tokio::test]
    async fn test_client_error_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let result = notifier(&server)
            .dispatch("updates", &[Mention::user("u1")], &notification())
            .await;
        assert!(matches!(result, Err(NotifyError::Rejected(_))));
    }
}
