//! Mail delivery backends.

use std::time::Duration;

use async_trait::async_trait;
use tracing::info;

use super::error::{MailError, Result};
use crate::storage::MailTask;

/// Delivers a single mail.
#[async_trait]
pub trait MailSender: Send + Sync {
    async fn send(&self, mail: &MailTask) -> Result<()>;
}

/// Posts mail as JSON to an HTTP mail gateway.
///
/// The body is the task itself (`{"to", "subject", "body"}`); any non-2xx
/// response is a delivery failure.
#[derive(Debug, Clone)]
pub struct HttpMailSender {
    http: reqwest::Client,
    url: String,
    token: Option<String>,
}

impl HttpMailSender {
    pub fn new(url: impl Into<String>, token: Option<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            url: url.into(),
            token,
        })
    }
}

#[async_trait]
impl MailSender for HttpMailSender {
    async fn send(&self, mail: &MailTask) -> Result<()> {
        let mut request = self.http.post(&self.url).json(mail);
        if let Some(token) = &self.token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(());
        }

        let message = response.text().await.unwrap_or_default();
        Err(MailError::Rejected {
            status: status.as_u16(),
            message,
        })
    }
}

/// Writes mail to the log instead of delivering it.
///
/// Used when no mail gateway is configured.
#[derive(Debug, Clone, Default)]
pub struct LogMailSender;

#[async_trait]
impl MailSender for LogMailSender {
    async fn send(&self, mail: &MailTask) -> Result<()> {
        info!(
            to = %mail.to,
            subject = %mail.subject,
            body_len = mail.body.len(),
            "Mail (log delivery)"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    use axum::Json;
    use axum::Router;
    use axum::extract::State;
    use axum::http::{HeaderMap, StatusCode};
    use axum::routing::post;

    type Received = Arc<Mutex<Vec<(Option<String>, MailTask)>>>;

    async fn gateway(status: StatusCode) -> (String, Received) {
        let received: Received = Arc::default();
        let app = Router::new()
            .route(
                "/mail",
                post(
                    move |State(received): State<Received>,
                          headers: HeaderMap,
                          Json(mail): Json<MailTask>| async move {
                        let auth = headers
                            .get("authorization")
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string);
                        received.lock().unwrap().push((auth, mail));
                        (status, "gateway says no")
                    },
                ),
            )
            .with_state(received.clone());

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/mail"), received)
    }

    fn mail() -> MailTask {
        MailTask {
            to: "ola@nav.no".into(),
            subject: "Ny behandling".into(),
            body: "<p>Hei</p>".into(),
        }
    }

    #[tokio::test]
    async fn posts_task_with_bearer_token() {
        let (url, received) = gateway(StatusCode::ACCEPTED).await;
        let sender =
            HttpMailSender::new(url, Some("secret".into()), Duration::from_secs(2)).unwrap();

        sender.send(&mail()).await.unwrap();

        let received = received.lock().unwrap();
        assert_eq!(received.len(), 1);
        assert_eq!(received[0].0.as_deref(), Some("Bearer secret"));
        assert_eq!(received[0].1, mail());
    }

    #[tokio::test]
    async fn non_success_status_is_rejection() {
        let (url, _) = gateway(StatusCode::BAD_GATEWAY).await;
        let sender = HttpMailSender::new(url, None, Duration::from_secs(2)).unwrap();

        let err = sender.send(&mail()).await.unwrap_err();
        assert!(matches!(
            err,
            MailError::Rejected { status: 502, ref message } if message == "gateway says no"
        ));
    }

    #[tokio::test]
    async fn log_sender_always_succeeds() {
        LogMailSender.send(&mail()).await.unwrap();
    }
}
