// ABOUTME: Alert sink that POSTs each event as JSON to an HTTP endpoint.
// ABOUTME: Plain http:// over a fresh HTTP/1 connection per event.

use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::Uri;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;

use super::{AlertSink, Event, NotifyError};

#[derive(Debug, Clone)]
pub struct WebhookSink {
    uri: Uri,
    authority: String,
}

impl WebhookSink {
    pub fn new(url: &str) -> Result<Self, NotifyError> {
        let invalid = |reason: &str| NotifyError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: Uri = url.parse().map_err(|_| invalid("not a valid URI"))?;
        if uri.scheme_str() != Some("http") {
            return Err(invalid("only http:// URLs are supported"));
        }
        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let authority = format!("{host}:{}", uri.port_u16().unwrap_or(80));

        Ok(Self { uri, authority })
    }
}

#[async_trait]
impl AlertSink for WebhookSink {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, event: &Event) -> Result<(), NotifyError> {
        let payload = serde_json::to_vec(event).map_err(|e| NotifyError::Http(e.to_string()))?;

        let stream = TcpStream::connect(&self.authority)
            .await
            .map_err(|source| NotifyError::Connect {
                target: self.authority.clone(),
                source,
            })?;
        let io = TokioIo::new(stream);

        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| NotifyError::Http(format!("HTTP handshake failed: {e}")))?;

        // Spawn connection handler
        tokio::spawn(async move {
            if let Err(e) = conn.await {
                tracing::debug!("webhook connection error: {}", e);
            }
        });

        let path = self
            .uri
            .path_and_query()
            .map(|pq| pq.as_str())
            .unwrap_or("/");
        let host = self.uri.authority().map(|a| a.as_str()).unwrap_or(&self.authority);

        let req = hyper::Request::builder()
            .method("POST")
            .uri(path)
            .header("Host", host)
            .header("Content-Type", "application/json")
            .header("User-Agent", concat!("shipyard/", env!("CARGO_PKG_VERSION")))
            .body(Full::new(Bytes::from(payload)))
            .map_err(|e| NotifyError::Http(format!("failed to build request: {e}")))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| NotifyError::Http(format!("request failed: {e}")))?;

        let status = resp.status();
        // Drain the body so the connection shuts down cleanly.
        let _ = resp.into_body().collect().await;

        if !status.is_success() {
            return Err(NotifyError::Status(status.as_u16()));
        }
        Ok(())
    }
}
