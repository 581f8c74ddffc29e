//! Rate-limited HTTP service.
//!
//! # Architecture
//!
//! ```text
//!   TcpListener ──accept──► task per connection
//!                              │ read head
//!                              │ admit (RateLimiter)  ──deny──► 429
//!                              │ read body (limit)    ──over──► 413
//!                              ▼
//!                            route ──► render ──► response, close
//!
//!   sweeper task: interval tick ──► RateLimiter::sweep
//! ```
//!
//! The HTTP layer is a thin presentation shell; all analysis happens in
//! `rune_seer_core`. Both the accept loop and the sweeper stop when the
//! shutdown channel flips to `true`.

pub mod http;
pub mod render;
pub mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rune_seer_core::config::Config;
use rune_seer_core::ratelimit::RateLimiter;
use tokio::io::{AsyncRead, AsyncWrite, BufReader};
use tokio::net::TcpListener;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, info, warn};

use http::{HttpError, Request};

/// How long a client may take to send its request head and body.
const READ_TIMEOUT: Duration = Duration::from_secs(30);

/// Shared per-server state.
#[derive(Debug)]
pub struct AppState {
    limiter: Arc<RateLimiter>,
    trusted_header: Option<String>,
    max_body: Option<usize>,
}

impl AppState {
    /// Build state from configuration.
    pub fn new(config: &Config) -> Self {
        Self {
            limiter: Arc::new(RateLimiter::new(config.rate_limit)),
            trusted_header: config.trusted_proxy_header().map(str::to_string),
            max_body: config.input_limit(),
        }
    }
}

/// A bound, not yet running, HTTP server.
#[derive(Debug)]
pub struct Server {
    listener: TcpListener,
    state: Arc<AppState>,
    sweep_interval: Duration,
}

impl Server {
    /// Bind to `config.bind`.
    pub async fn bind(config: &Config) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.bind).await?;
        Ok(Self::from_listener(listener, config))
    }

    /// Serve on an already bound listener.
    pub fn from_listener(listener: TcpListener, config: &Config) -> Self {
        Self {
            listener,
            state: Arc::new(AppState::new(config)),
            sweep_interval: config.rate_limit.sweep_interval(),
        }
    }

    /// The bound address (useful with port 0).
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Accept connections until `shutdown` becomes `true`.
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) -> std::io::Result<()> {
        let sweeper = spawn_sweeper(
            Arc::clone(&self.state.limiter),
            self.sweep_interval,
            shutdown.clone(),
        );
        info!(addr = %self.local_addr()?, "listening");

        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => {
                        let state = Arc::clone(&self.state);
                        tokio::spawn(async move {
                            let (reader, mut writer) = stream.into_split();
                            handle_connection(reader, &mut writer, peer, &state).await;
                        });
                    }
                    // accept errors (e.g. EMFILE) are per-connection; keep serving
                    Err(err) => warn!(error = %err, "accept failed"),
                },
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!("shutting down");
        if let Err(err) = sweeper.await {
            warn!(error = %err, "sweeper task failed");
        }
        Ok(())
    }
}

/// Periodically drop idle visitors until `shutdown` becomes `true`.
pub fn spawn_sweeper(
    limiter: Arc<RateLimiter>,
    every: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // the first tick completes immediately
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = limiter.sweep();
                    debug!(removed, tracked = limiter.len(), "sweep tick");
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        debug!("sweeper stopped");
    })
}

/// Serve exactly one request on a connection, then close it.
pub async fn handle_connection<R, W>(reader: R, writer: &mut W, peer: SocketAddr, state: &AppState)
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let response = match tokio::time::timeout(READ_TIMEOUT, respond(reader, peer, state)).await {
        Ok(Some(response)) => response,
        Ok(None) => return,
        Err(_) => {
            debug!(%peer, "request read timed out");
            return;
        }
    };
    if let Err(err) = response.write_to(writer).await {
        debug!(%peer, error = %err, "failed to write response");
    }
}

async fn respond<R>(reader: R, peer: SocketAddr, state: &AppState) -> Option<http::Response>
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let remote = peer.to_string();

    let head = match http::read_head(&mut reader).await {
        Ok(head) => head,
        Err(err) => return rejected(&err, peer),
    };

    if let Some(denied) = routes::admit(
        &state.limiter,
        state.trusted_header.as_deref(),
        &head,
        &remote,
    ) {
        return Some(reply_to(&head, denied));
    }

    let body = match http::read_body(&mut reader, &head, state.max_body).await {
        Ok(body) => body,
        Err(err) => return rejected(&err, peer),
    };

    let request = Request { head, body };
    let response = routes::route(&request);
    debug!(
        %peer,
        method = %request.head.method,
        path = %request.head.path,
        status = response.status.code(),
        "request served"
    );
    Some(reply_to(&request.head, response))
}

fn reply_to(head: &http::Head, response: http::Response) -> http::Response {
    if head.method == "HEAD" {
        response.for_head()
    } else {
        response
    }
}

fn rejected(err: &HttpError, peer: SocketAddr) -> Option<http::Response> {
    debug!(%peer, error = %err, "rejected request");
    err.response()
}
