use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, State};
use axum::response::IntoResponse;
use axum::routing::{any, get, post};
use axum::{Json, Router};
use futures_util::stream::SplitStream;
use futures_util::StreamExt;
use storyrank_providers::GenerationClient;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::{debug, info, warn};

use crate::error::GatewayError;
use crate::orchestrator::{Orchestrator, WorkflowOptions};
use crate::protocol::{HealthResponse, WorkflowRequest};
use crate::sink::{PacedSink, WebSocketSink};
use crate::stories;

pub const DEFAULT_PACING: Duration = Duration::from_millis(600);
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 5 * 1024 * 1024;
pub const DEFAULT_MAX_QUEUED_REQUESTS: usize = 8;

pub(crate) struct AppState {
    pub(crate) orchestrator: Orchestrator,
    pacing: Duration,
    max_queued_requests: usize,
    start_time: Instant,
}

#[derive(Debug, Clone)]
pub struct GatewayOptions {
    /// Pause after every event sent on the control channel
    pub pacing: Duration,
    pub max_upload_bytes: usize,
    /// Requests held behind a running workflow; extras are dropped
    pub max_queued_requests: usize,
    pub workflow: WorkflowOptions,
}

impl Default for GatewayOptions {
    fn default() -> Self {
        Self {
            pacing: DEFAULT_PACING,
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            max_queued_requests: DEFAULT_MAX_QUEUED_REQUESTS,
            workflow: WorkflowOptions::default(),
        }
    }
}

pub struct GatewayServer {
    client: Arc<dyn GenerationClient>,
    options: GatewayOptions,
}

impl GatewayServer {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self {
            client,
            options: GatewayOptions::default(),
        }
    }

    pub fn with_options(mut self, options: GatewayOptions) -> Self {
        self.options = options;
        self
    }

    pub fn router(&self) -> Router {
        let orchestrator =
            Orchestrator::new(self.client.clone()).with_options(self.options.workflow.clone());
        let state = Arc::new(AppState {
            orchestrator,
            pacing: self.options.pacing,
            max_queued_requests: self.options.max_queued_requests,
            start_time: Instant::now(),
        });
        Router::new()
            .route("/api/ws-chat", any(ws_handler))
            .route(
                "/api/generate-user-stories",
                post(stories::generate_user_stories),
            )
            .route(
                "/api/check-user-stories-quality",
                post(stories::check_user_stories_quality),
            )
            .route("/api/upload-csv", post(stories::upload_csv))
            .route("/health", get(health_handler))
            .layer(DefaultBodyLimit::max(self.options.max_upload_bytes))
            .layer(CorsLayer::permissive())
            .with_state(state)
    }

    pub async fn start(&self, host: &str, port: u16) -> Result<(), GatewayError> {
        let app = self.router();
        let addr = format!("{}:{}", host, port);
        let listener = TcpListener::bind(&addr)
            .await
            .map_err(|e| GatewayError::ServerError(e.to_string()))?;

        info!(
            backend = self.client.name(),
            "Gateway listening on http://{} (control channel at /api/ws-chat)",
            addr
        );

        axum::serve(listener, app)
            .await
            .map_err(|e| GatewayError::ServerError(e.to_string()))?;

        Ok(())
    }
}

async fn health_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        uptime_secs: state.start_time.elapsed().as_secs(),
        version: env!("CARGO_PKG_VERSION"),
    })
}

async fn ws_handler(State(state): State<Arc<AppState>>, ws: WebSocketUpgrade) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Wait for the next valid workflow request; `None` once the client is gone.
async fn next_request(receiver: &mut SplitStream<WebSocket>) -> Option<WorkflowRequest> {
    while let Some(msg) = receiver.next().await {
        match msg {
            Ok(Message::Text(text)) => {
                if let Some(request) = WorkflowRequest::decode(text.as_str()) {
                    return Some(request);
                }
            }
            Ok(Message::Close(_)) | Err(_) => return None,
            Ok(_) => {}
        }
    }
    None
}

/// Runs one workflow at a time per connection.
///
/// Requests that arrive during a run are queued up to the configured limit
/// and dropped beyond it. Losing the connection drops the run future, which
/// abandons every call still in flight.
async fn handle_socket(socket: WebSocket, state: Arc<AppState>) {
    let (sender, mut receiver) = socket.split();
    let sink = PacedSink::new(WebSocketSink::new(sender), state.pacing);
    let mut pending: VecDeque<WorkflowRequest> = VecDeque::new();

    info!("Control channel connected");

    loop {
        let request = match pending.pop_front() {
            Some(request) => request,
            None => match next_request(&mut receiver).await {
                Some(request) => request,
                None => break,
            },
        };

        info!(
            prioritization_type = %request.prioritization_type,
            model = %request.model,
            stories = request.stories.len(),
            "Starting workflow run"
        );

        let run = state.orchestrator.run(request, &sink);
        tokio::pin!(run);

        let outcome = loop {
            tokio::select! {
                result = &mut run => break Some(result),
                incoming = receiver.next() => match incoming {
                    Some(Ok(Message::Text(text))) => {
                        let Some(request) = WorkflowRequest::decode(text.as_str()) else {
                            continue;
                        };
                        if pending.len() >= state.max_queued_requests {
                            warn!(
                                limit = state.max_queued_requests,
                                prioritization_type = %request.prioritization_type,
                                "Request queue full, dropping request"
                            );
                        } else {
                            debug!(
                                queued = pending.len() + 1,
                                "Queued request behind running workflow"
                            );
                            pending.push_back(request);
                        }
                    }
                    Some(Ok(Message::Close(_))) | Some(Err(_)) | None => break None,
                    Some(Ok(_)) => {}
                },
            }
        };

        match outcome {
            Some(Ok(())) => {}
            Some(Err(GatewayError::ClientDisconnected)) | None => {
                info!("Client disconnected, abandoning workflow run");
                return;
            }
            Some(Err(e)) => warn!(error = %e, "Workflow run ended early"),
        }
    }

    info!("Control channel closed");
}
