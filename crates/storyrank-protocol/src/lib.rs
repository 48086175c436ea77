//! Storyrank Protocol - Shared types for the prioritization workflow
//!
//! This crate defines the fundamental types used across Storyrank:
//! - Story records and key handling
//! - Prioritization techniques
//! - Role-tagged messages for the generation backends
//! - Tagged events streamed to connected clients

mod events;
mod messages;
mod story;
mod technique;

pub use events::*;
pub use messages::*;
pub use story::*;
pub use technique::*;
