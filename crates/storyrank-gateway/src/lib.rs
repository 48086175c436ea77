//! Workflow gateway for Storyrank.
//!
//! This crate runs the multi-role prioritization workflow and serves it over
//! a WebSocket control channel, next to the one-shot story generation,
//! quality check and upload endpoints.

pub mod error;
pub mod estimation;
pub mod orchestrator;
pub mod protocol;
pub mod server;
pub mod session;
pub mod sink;
pub mod stories;
pub mod testing;

pub use error::GatewayError;
pub use orchestrator::{Orchestrator, WorkflowOptions};
pub use protocol::WorkflowRequest;
pub use server::{GatewayOptions, GatewayServer};
pub use session::{Stage, WorkflowSession};
pub use sink::{EventSink, PacedSink, WebSocketSink};
