//! Conversation client
//!
//! Turns recognized speech into relay round trips, one turn at a time.

mod coordinator;
mod relay_client;
mod runtime;

pub use coordinator::{SessionState, TurnCoordinator};
pub use relay_client::{Relay, RelayClient};
pub use runtime::{Control, ConversationLoop};
