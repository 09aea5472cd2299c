//! Minimal HTTP surface over the current snapshot and the poll log.
//!
//! Routes:
//! - `GET /` plain status page
//! - `GET /api/snapshot` snapshot as JSON
//! - `GET /view_logs` full poll log as text
//! - `GET /health`

use crate::config::ServerSettings;
use crate::poll_log::PollLog;
use crate::snapshot::{Snapshot, SnapshotCell};
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::service::{make_service_fn, service_fn};
use hyper::{Body, Method, Request, Response, Server, StatusCode};
use serde::Serialize;
use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::{debug, info, warn};

#[derive(Serialize)]
struct SnapshotResponse<'a> {
    #[serde(flatten)]
    snapshot: &'a Snapshot,
    risk: &'static str,
}

/// Serves the status surface.
pub struct StatusServer {
    settings: ServerSettings,
    state: Arc<SnapshotCell>,
    log: Arc<PollLog>,
}

impl StatusServer {
    pub fn new(settings: ServerSettings, state: Arc<SnapshotCell>, log: Arc<PollLog>) -> Self {
        Self {
            settings,
            state,
            log,
        }
    }

    /// Configured listen address.
    pub fn address(&self) -> SocketAddr {
        SocketAddr::new(self.settings.listen_address, self.settings.port)
    }

    /// Bind the listener and return the bound address with the serving future.
    pub fn bind<F>(
        self: Arc<Self>,
        addr: SocketAddr,
        shutdown: F,
    ) -> anyhow::Result<(SocketAddr, impl Future<Output = hyper::Result<()>>)>
    where
        F: Future<Output = ()>,
    {
        let make_svc = make_service_fn(move |_conn| {
            let server = Arc::clone(&self);
            async move {
                Ok::<_, Infallible>(service_fn(move |req| {
                    let server = Arc::clone(&server);
                    async move { Ok::<_, Infallible>(server.route(&req).await) }
                }))
            }
        });

        let server = Server::try_bind(&addr)?.serve(make_svc);
        let local = server.local_addr();
        info!(address = %local, "Status server listening");

        Ok((local, server.with_graceful_shutdown(shutdown)))
    }

    /// Bind the configured address and serve until `shutdown` resolves.
    pub async fn run<F>(self: Arc<Self>, shutdown: F) -> anyhow::Result<()>
    where
        F: Future<Output = ()>,
    {
        let addr = self.address();
        let (_, serving) = self.bind(addr, shutdown)?;
        serving.await?;
        Ok(())
    }

    /// Dispatch a request.
    pub async fn route(&self, req: &Request<Body>) -> Response<Body> {
        debug!(method = %req.method(), path = req.uri().path(), "Request");

        if req.method() != Method::GET {
            return text_response(StatusCode::METHOD_NOT_ALLOWED, "method not allowed\n");
        }

        match req.uri().path() {
            "/" => self.index(),
            "/api/snapshot" => self.snapshot_json(),
            "/view_logs" => self.view_logs().await,
            "/health" => text_response(StatusCode::OK, "ok\n"),
            _ => text_response(StatusCode::NOT_FOUND, "not found\n"),
        }
    }

    fn index(&self) -> Response<Body> {
        let snapshot = self.state.current();
        let page = render_index(&snapshot, &self.settings);
        with_content_type(
            Response::new(Body::from(page)),
            "text/html; charset=utf-8",
        )
    }

    fn snapshot_json(&self) -> Response<Body> {
        let snapshot = self.state.current();
        let body = SnapshotResponse {
            snapshot: &snapshot,
            risk: snapshot.risk_label(),
        };

        match serde_json::to_vec(&body) {
            Ok(json) => with_content_type(Response::new(Body::from(json)), "application/json"),
            Err(e) => {
                warn!(error = %e, "Failed to serialize snapshot");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "serialization failed\n")
            }
        }
    }

    async fn view_logs(&self) -> Response<Body> {
        let log = Arc::clone(&self.log);
        match tokio::task::spawn_blocking(move || log.read_all()).await {
            Ok(Ok(content)) => text_response(StatusCode::OK, content),
            Ok(Err(e)) => {
                warn!(error = %e, "Failed to read poll log");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, format!("{}\n", e))
            }
            Err(e) => {
                warn!(error = %e, "Poll log reader task failed");
                text_response(StatusCode::INTERNAL_SERVER_ERROR, "log read failed\n")
            }
        }
    }
}

fn text_response(status: StatusCode, body: impl Into<Body>) -> Response<Body> {
    let mut response = Response::new(body.into());
    *response.status_mut() = status;
    with_content_type(response, "text/plain; charset=utf-8")
}

fn with_content_type(mut response: Response<Body>, content_type: &'static str) -> Response<Body> {
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

fn render_index(snapshot: &Snapshot, settings: &ServerSettings) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head><meta charset="utf-8"><title>IP Reputation and Blocklist Status</title></head>
<body style="color: {text}; background-color: {background};">
<table>
<tr><th>Current IP</th><th>Reputation Score</th><th>Risk</th><th>AbuseIPDB Status</th><th>Spamhaus Status</th></tr>
<tr><td>{ip}</td><td>{score}</td><td>{risk}</td><td>{abuse}</td><td>{spamhaus}</td></tr>
</table>
<p><a href="/view_logs">View Logs</a> | Last Refresh: {refreshed}</p>
</body>
</html>
"#,
        text = escape_html(&settings.text_color),
        background = escape_html(&settings.background_color),
        ip = escape_html(&snapshot.current_ip_display()),
        score = escape_html(&snapshot.fraud_score_display()),
        risk = snapshot.risk_label(),
        abuse = snapshot.abuseipdb_display(),
        spamhaus = snapshot.spamhaus_display(),
        refreshed = snapshot.last_refresh_display(),
    )
}

fn escape_html(value: &str) -> String {
    let mut escaped = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(c),
        }
    }
    escaped
}
