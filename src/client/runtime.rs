//! Conversation loop
//!
//! Drives the capture session, the turn coordinator and the relay from a
//! single task. Speech engines are not `Send`, so everything except the
//! relay round trip stays on the task that calls [`ConversationLoop::run`].

use std::future::Future;
use std::sync::Arc;

use futures::future::BoxFuture;
use tokio::sync::mpsc;

use super::coordinator::TurnCoordinator;
use super::relay_client::Relay;
use crate::Result;
use crate::voice::{CaptureSession, Playback, RecognitionEngine, SessionSignal};

/// User controls for a running loop
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Start,
    Stop,
}

/// A continuous conversation with the partner
pub struct ConversationLoop<E> {
    session: CaptureSession<E>,
    coordinator: TurnCoordinator,
    relay: Arc<dyn Relay>,
}

impl<E: RecognitionEngine> ConversationLoop<E> {
    pub fn new(
        session: CaptureSession<E>,
        relay: Arc<dyn Relay>,
        playback: Arc<dyn Playback>,
    ) -> Self {
        Self {
            session,
            coordinator: TurnCoordinator::new(playback),
            relay,
        }
    }

    #[must_use]
    pub const fn coordinator(&self) -> &TurnCoordinator {
        &self.coordinator
    }

    #[must_use]
    pub const fn session(&self) -> &CaptureSession<E> {
        &self.session
    }

    /// Start listening with a clean dedup slate
    pub fn start(&mut self) {
        self.session.reset_dedup();
        self.session.start();
        self.coordinator.start();
        tracing::info!("listening");
    }

    /// Stop listening
    ///
    /// # Errors
    ///
    /// Returns `Error::TurnInFlight` while a reply is pending; capture
    /// keeps running in that case
    pub fn stop(&mut self) -> Result<()> {
        self.coordinator.stop()?;
        self.session.stop();
        tracing::info!("stopped listening");
        Ok(())
    }

    /// Run until shutdown, or until the engine and any pending turn are done
    pub async fn run(
        &mut self,
        mut controls: mpsc::Receiver<Control>,
        shutdown: impl Future<Output = ()>,
    ) {
        tokio::pin!(shutdown);

        let mut pending: Option<BoxFuture<'static, Result<String>>> = None;
        let mut engine_done = false;
        let mut controls_open = true;

        loop {
            if engine_done && pending.is_none() {
                tracing::debug!("recognition input exhausted");
                break;
            }

            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("conversation shutting down");
                    break;
                }

                outcome = async {
                    match pending.as_mut() {
                        Some(turn) => turn.await,
                        None => std::future::pending().await,
                    }
                }, if pending.is_some() => {
                    pending = None;
                    self.coordinator.complete_turn(outcome);
                }

                signal = self.session.next_signal(), if !engine_done => match signal {
                    Some(SessionSignal::Utterance(event)) => {
                        if let Some(history) = self.coordinator.begin_turn(&event.text) {
                            let relay = Arc::clone(&self.relay);
                            pending = Some(Box::pin(async move { relay.send(&history).await }));
                        }
                    }
                    Some(SessionSignal::Halted) => self.coordinator.capture_halted(),
                    None => engine_done = true,
                },

                control = controls.recv(), if controls_open => match control {
                    Some(Control::Start) => self.start(),
                    Some(Control::Stop) => {
                        if let Err(e) = self.stop() {
                            tracing::warn!(error = %e, "stop ignored");
                        }
                    }
                    None => controls_open = false,
                },
            }
        }
    }
}
