use crate::util::logging::{debug, error, info, trace, warn};
use crate::util::threading::{ThreadHandle, ThreadRegistry};
use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::header;
use axum::response::{Html, IntoResponse};
use axum::{Router, routing::get};
use hyper::server::conn::http1;
use hyper_util::rt::TokioIo;
use hyper_util::service::TowerToHyperService;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use xpbridge_core::{SessionSnapshot, SnapshotCache};

const EMPTY_PAYLOAD: &str = "{}";

#[derive(Clone)]
struct PullState {
    cache: Arc<SnapshotCache>,
    refresh_secs: u64,
}

fn payload_json(cache: &SnapshotCache) -> String {
    match cache.current() {
        Some(snapshot) => {
            serde_json::to_string(&*snapshot).unwrap_or_else(|_| EMPTY_PAYLOAD.into())
        }
        None => EMPTY_PAYLOAD.into(),
    }
}

async fn update_handler(State(state): State<PullState>) -> impl IntoResponse {
    (
        [
            (header::CONTENT_TYPE, "application/json"),
            (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*"),
        ],
        payload_json(&state.cache),
    )
}

async fn status_handler(State(state): State<PullState>) -> Html<String> {
    let snapshot = state.cache.current();
    let payload = payload_json(&state.cache);
    Html(render_status_page(
        snapshot.as_deref(),
        &payload,
        state.refresh_secs,
    ))
}

fn render_status_page(snapshot: Option<&SessionSnapshot>, payload: &str, refresh_secs: u64) -> String {
    let active = snapshot.is_some_and(|s| s.logged_in);
    let (indicator_class, indicator_text) = if active {
        ("active", "Session active")
    } else {
        ("inactive", "Session inactive")
    };
    let player = snapshot.map(|s| s.player.as_str()).unwrap_or_default();
    let skill = snapshot
        .and_then(|s| s.active_skill)
        .map(|s| s.name())
        .unwrap_or("-");

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
<meta charset="utf-8">
<meta http-equiv="refresh" content="{refresh_secs}">
<title>xpbridge</title>
<style>
body {{ font-family: monospace; background: #1e1e1e; color: #ddd; margin: 2em; }}
.indicator {{ display: inline-block; padding: 0.2em 0.6em; border-radius: 4px; }}
.active {{ background: #2e7d32; }}
.inactive {{ background: #8e2424; }}
pre {{ background: #111; padding: 1em; overflow-x: auto; }}
</style>
</head>
<body>
<h1>xpbridge</h1>
<p><span class="indicator {indicator_class}">{indicator_text}</span></p>
<p>Player: {player}<br>Active skill: {skill}</p>
<p>Pull endpoint: <code>GET /update</code></p>
<pre id="payload">{payload}</pre>
</body>
</html>
"#,
        player = escape_html(player),
        payload = escape_html(payload),
    )
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

fn router(state: PullState) -> Router {
    Router::new()
        .route("/", get(status_handler))
        .route("/update", get(update_handler))
        .with_state(state)
}

/// Serves the cached session snapshot to pull clients.
///
/// The listener is bound before `start` returns, so a taken port surfaces as
/// an error to the caller. `stop` (also run on drop) closes the listener
/// and abandons in-flight connections.
pub struct PullServer {
    local_addr: SocketAddr,
    shutdown_tx: Option<oneshot::Sender<()>>,
    handle: Option<ThreadHandle>,
}

impl PullServer {
    pub fn start(
        addr: SocketAddr,
        cache: Arc<SnapshotCache>,
        threads: &ThreadRegistry,
        refresh_secs: u64,
    ) -> Result<Self> {
        let std_listener = std::net::TcpListener::bind(addr)
            .with_context(|| format!("bind pull server on {addr}"))?;
        std_listener
            .set_nonblocking(true)
            .context("set pull listener non-blocking")?;
        let local_addr = std_listener
            .local_addr()
            .context("read pull listener address")?;

        let rt = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(2)
            .thread_name("pull-server-worker")
            .enable_all()
            .build()
            .context("build pull server runtime")?;

        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
        let app = router(PullState {
            cache,
            refresh_secs,
        });

        let handle = threads
            .spawn("pull-server", move || {
                rt.block_on(async move {
                    let listener = match TcpListener::from_std(std_listener) {
                        Ok(listener) => listener,
                        Err(e) => {
                            error!("Pull server could not adopt listener: {}", e);
                            return;
                        }
                    };
                    info!("Pull server listening on http://{}", local_addr);

                    loop {
                        tokio::select! {
                            _ = &mut shutdown_rx => break,
                            accepted = listener.accept() => match accepted {
                                Ok((stream, peer)) => {
                                    trace!("Pull client connected from {}", peer);
                                    let io = TokioIo::new(stream);
                                    let service = TowerToHyperService::new(app.clone());
                                    tokio::task::spawn(async move {
                                        if let Err(err) = http1::Builder::new()
                                            .serve_connection(io, service)
                                            .await
                                        {
                                            if err.is_incomplete_message() {
                                                debug!("Pull client {} disconnected mid-request", peer);
                                            } else {
                                                debug!("Error serving pull client {}: {:?}", peer, err);
                                            }
                                        }
                                    });
                                }
                                Err(e) => warn!("Pull server accept failed: {}", e),
                            },
                        }
                    }
                    drop(listener);
                    info!("Pull server on {} stopped", local_addr);
                });
                rt.shutdown_background();
            })
            .context("spawn pull server thread")?;

        Ok(Self {
            local_addr,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    /// Safe to call repeatedly; returns once the port is free.
    pub fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                error!("Pull server thread panicked");
            }
        }
    }
}

impl Drop for PullServer {
    fn drop(&mut self) {
        self.stop();
    }
}
