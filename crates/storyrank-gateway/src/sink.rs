//! Ordered, paced delivery of workflow events to one client

use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::{Message, WebSocket};
use futures_util::stream::SplitSink;
use futures_util::SinkExt;
use storyrank_protocol::AgentEvent;
use tokio::sync::Mutex;

use crate::error::GatewayError;

/// Destination for the events of one workflow run.
///
/// `send` takes `&self` so concurrent stages can share one sink; each
/// implementation delivers events one at a time in call order.
#[async_trait]
pub trait EventSink: Send + Sync {
    async fn send(&self, event: AgentEvent) -> Result<(), GatewayError>;
}

/// Sends, then waits `delay` before the next event may go out.
///
/// The first event is never delayed. Concurrent senders queue on the gate, so
/// the pause always separates two consecutive events.
pub struct PacedSink<S> {
    inner: S,
    delay: Duration,
    gate: Mutex<()>,
}

impl<S: EventSink> PacedSink<S> {
    pub fn new(inner: S, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            gate: Mutex::new(()),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: EventSink> EventSink for PacedSink<S> {
    async fn send(&self, event: AgentEvent) -> Result<(), GatewayError> {
        let _turn = self.gate.lock().await;
        self.inner.send(event).await?;
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(())
    }
}

/// Writes events as JSON text frames to a WebSocket
pub struct WebSocketSink {
    sender: Mutex<SplitSink<WebSocket, Message>>,
}

impl WebSocketSink {
    pub fn new(sender: SplitSink<WebSocket, Message>) -> Self {
        Self {
            sender: Mutex::new(sender),
        }
    }
}

#[async_trait]
impl EventSink for WebSocketSink {
    async fn send(&self, event: AgentEvent) -> Result<(), GatewayError> {
        let json = serde_json::to_string(&event)
            .map_err(|e| GatewayError::ServerError(e.to_string()))?;
        self.sender
            .lock()
            .await
            .send(Message::text(json))
            .await
            .map_err(|_| GatewayError::ClientDisconnected)
    }
}
