// ABOUTME: HTTP/1 webhook listener turning push notifications into triggers.
// ABOUTME: POST /hook with {revision, branch, metadata}; every tracking environment gets a trigger.

use bytes::Bytes;
use futures::Stream;
use http_body_util::{BodyExt, Full, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use std::collections::HashMap;
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use super::{Trigger, TriggerError};
use crate::config::Config;
use crate::types::{EnvironmentName, Revision};

/// Largest delivery body accepted; bigger ones get 413.
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Branch name to the environments tracking it.
pub type Routes = HashMap<String, Vec<EnvironmentName>>;

/// Body of a webhook delivery.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookPayload {
    pub revision: Revision,
    pub branch: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}

/// Running listener. Stops accepting connections when dropped.
#[derive(Debug)]
pub struct WebhookListener {
    local_addr: SocketAddr,
    task: JoinHandle<()>,
}

impl WebhookListener {
    pub fn routes_from_config(config: &Config) -> Routes {
        let mut routes = Routes::new();
        for env in config.environments.iter() {
            if let Some(branch) = &env.branch {
                routes.entry(branch.clone()).or_default().push(env.name.clone());
            }
        }
        routes
    }

    /// Bind and start serving. Returns the listener and the trigger stream.
    pub async fn bind(
        addr: SocketAddr,
        routes: Routes,
    ) -> Result<(Self, impl Stream<Item = Trigger> + Send + 'static), TriggerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| TriggerError::Bind { addr, source })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| TriggerError::Bind { addr, source })?;

        let (tx, rx) = mpsc::unbounded_channel();
        let routes = Arc::new(routes);
        let task = tokio::spawn(serve(listener, routes, tx));
        tracing::info!(%local_addr, "webhook listener started");

        let stream = futures::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|trigger| (trigger, rx))
        });
        Ok((Self { local_addr, task }, stream))
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }
}

impl Drop for WebhookListener {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve(listener: TcpListener, routes: Arc<Routes>, tx: mpsc::UnboundedSender<Trigger>) {
    loop {
        let (stream, peer) = match listener.accept().await {
            Ok(conn) => conn,
            Err(e) => {
                tracing::warn!("webhook accept failed: {}", e);
                continue;
            }
        };
        let io = TokioIo::new(stream);
        let routes = routes.clone();
        let tx = tx.clone();

        tokio::spawn(async move {
            let service = service_fn(move |req| handle(req, routes.clone(), tx.clone()));
            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                tracing::debug!(%peer, "webhook connection error: {}", e);
            }
        });
    }
}

async fn handle(
    req: Request<Incoming>,
    routes: Arc<Routes>,
    tx: mpsc::UnboundedSender<Trigger>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    if req.uri().path() != "/hook" {
        return Ok(reply(StatusCode::NOT_FOUND, serde_json::json!({ "error": "not found" })));
    }
    if req.method() != Method::POST {
        return Ok(reply(
            StatusCode::METHOD_NOT_ALLOWED,
            serde_json::json!({ "error": "use POST" }),
        ));
    }

    let body = match Limited::new(req.into_body(), MAX_PAYLOAD_BYTES).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) if e.downcast_ref::<LengthLimitError>().is_some() => {
            return Ok(reply(
                StatusCode::PAYLOAD_TOO_LARGE,
                serde_json::json!({ "error": format!("payload exceeds {MAX_PAYLOAD_BYTES} bytes") }),
            ));
        }
        Err(e) => {
            return Ok(reply(
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": format!("failed to read body: {e}") }),
            ));
        }
    };

    match accept(&routes, &body) {
        Ok(triggers) => {
            let accepted = triggers.len();
            for trigger in triggers {
                let _ = tx.send(trigger);
            }
            Ok(reply(StatusCode::ACCEPTED, serde_json::json!({ "accepted": accepted })))
        }
        Err(message) => Ok(reply(StatusCode::BAD_REQUEST, serde_json::json!({ "error": message }))),
    }
}

/// Parse a delivery into one trigger per environment tracking its branch.
pub(crate) fn accept(routes: &Routes, body: &[u8]) -> Result<Vec<Trigger>, String> {
    let payload: WebhookPayload =
        serde_json::from_slice(body).map_err(|e| format!("invalid payload: {e}"))?;

    let Some(environments) = routes.get(&payload.branch) else {
        tracing::debug!(branch = %payload.branch, "webhook for untracked branch");
        return Ok(Vec::new());
    };

    tracing::info!(
        branch = %payload.branch,
        revision = %payload.revision,
        environments = environments.len(),
        "webhook accepted"
    );
    Ok(environments
        .iter()
        .map(|env| Trigger::new(env.clone(), payload.revision.clone()))
        .collect())
}

fn reply(status: StatusCode, body: serde_json::Value) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body.to_string())));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("application/json"),
    );
    response
}
