//! HTTP surface for the answer pipeline.
//!
//! ```text
//! POST /chat         → RagResponse JSON
//! POST /chat/stream  → server-sent events: status* token* sources metadata done
//! GET  /health       → {"status":"ok"}
//! ```
//!
//! Requires the `server` feature (enabled by default).

pub mod handlers;
pub mod transport;

pub use handlers::{ApiError, AppState, ChatBody, ModelList, router};
pub use transport::{serve, serve_listener};
