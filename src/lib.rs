//! Parley - continuous spoken conversation practice
//!
//! Two halves talking over HTTP:
//! - A client loop that listens, sends each finalized utterance with the
//!   conversation so far, and speaks the partner's reply
//! - A conversation relay that frames the history for a chat-completion
//!   endpoint and returns its reply
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                   parley talk                        │
//! │  Capture Session → Turn Coordinator → Relay Client   │
//! │        ▲                  │                          │
//! │   mic / stdin        Speech Playback                 │
//! └─────────────────────────┬────────────────────────────┘
//!                           │ POST /chat
//! ┌─────────────────────────▼────────────────────────────┐
//! │                   parley serve                       │
//! │        Conversation Relay → Upstream Model           │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod client;
pub mod config;
pub mod conversation;
pub mod error;
pub mod relay;
pub mod voice;

pub use client::{Control, ConversationLoop, Relay, RelayClient, SessionState, TurnCoordinator};
pub use config::Config;
pub use conversation::{ChatRequest, ChatResponse, Message, Role, Transcript};
pub use error::{Error, Result};
pub use relay::{ConversationRelay, UpstreamClient};
