//! Conversation loop integration tests
//!
//! Drives the client loop with scripted engines and relays, and end to end
//! through the relay API against a fake upstream.

use std::collections::VecDeque;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::StatusCode;
use parley::voice::{
    CaptureSession, EngineEvent, LineRecognizer, Playback, RecognitionConfig, RecognitionEngine,
    RecognitionResult,
};
use parley::{
    Control, ConversationLoop, Error, Message, Relay, RelayClient, Result, SessionState,
};
use serde_json::json;
use tokio::sync::mpsc;
use tokio_test::{assert_err, assert_ok};

mod common;
use common::{completion, spawn_chat_stub, spawn_relay_api, spawn_upstream};

/// Engine fed by the test through a channel
struct ChannelEngine {
    events: mpsc::UnboundedReceiver<EngineEvent>,
    refuse_starts: Arc<AtomicBool>,
}

impl ChannelEngine {
    fn new(events: mpsc::UnboundedReceiver<EngineEvent>) -> Self {
        Self {
            events,
            refuse_starts: Arc::new(AtomicBool::new(false)),
        }
    }
}

#[async_trait(?Send)]
impl RecognitionEngine for ChannelEngine {
    fn start(&mut self) -> Result<()> {
        if self.refuse_starts.load(Ordering::SeqCst) {
            return Err(Error::Recognition("device busy".to_string()));
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        Ok(())
    }

    async fn next_event(&mut self) -> Option<EngineEvent> {
        self.events.recv().await
    }
}

fn say(events: &mpsc::UnboundedSender<EngineEvent>, text: &str) {
    events
        .send(EngineEvent::Results {
            result_index: 0,
            results: vec![RecognitionResult::finished(text)],
        })
        .unwrap();
}

/// Relay that answers from a script and records every history it gets
struct ScriptedRelay {
    outcomes: Mutex<VecDeque<Result<String>>>,
    histories: Mutex<Vec<Vec<Message>>>,
    delay: Duration,
}

impl ScriptedRelay {
    fn new(outcomes: Vec<Result<String>>, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            outcomes: Mutex::new(outcomes.into()),
            histories: Mutex::new(Vec::new()),
            delay,
        })
    }

    fn histories(&self) -> Vec<Vec<Message>> {
        self.histories.lock().unwrap().clone()
    }

    fn calls(&self) -> usize {
        self.histories.lock().unwrap().len()
    }
}

#[async_trait]
impl Relay for ScriptedRelay {
    async fn send(&self, history: &[Message]) -> Result<String> {
        self.histories.lock().unwrap().push(history.to_vec());
        tokio::time::sleep(self.delay).await;

        let next = self.outcomes.lock().unwrap().pop_front();
        next.unwrap_or_else(|| Err(Error::Relay("no scripted reply".to_string())))
    }
}

#[derive(Default)]
struct RecordingPlayback {
    spoken: Mutex<Vec<String>>,
}

impl RecordingPlayback {
    fn spoken(&self) -> Vec<String> {
        self.spoken.lock().unwrap().clone()
    }
}

impl Playback for RecordingPlayback {
    fn speak(&self, text: &str) {
        self.spoken.lock().unwrap().push(text.to_string());
    }
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !condition() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not met in time");
}

/// Let the loop apply whatever just completed
async fn settle() {
    tokio::time::sleep(Duration::from_millis(50)).await;
}

struct Harness {
    conversation: ConversationLoop<ChannelEngine>,
    events: mpsc::UnboundedSender<EngineEvent>,
    playback: Arc<RecordingPlayback>,
}

fn harness(relay: Arc<ScriptedRelay>) -> Harness {
    let (events, rx) = mpsc::unbounded_channel();
    let playback = Arc::new(RecordingPlayback::default());
    let session = CaptureSession::new(ChannelEngine::new(rx), RecognitionConfig::default());

    let mut conversation = ConversationLoop::new(session, relay, playback.clone());
    conversation.start();

    Harness {
        conversation,
        events,
        playback,
    }
}

/// Run the loop alongside a driver; the loop ends once the driver drops
/// the event sender and any pending turn has finished
async fn drive<F: Future<Output = ()>>(
    conversation: &mut ConversationLoop<ChannelEngine>,
    controls: mpsc::Receiver<Control>,
    driver: F,
) {
    let run = conversation.run(controls, std::future::pending());
    tokio::time::timeout(Duration::from_secs(10), async {
        tokio::join!(run, driver);
    })
    .await
    .expect("conversation did not finish");
}

#[tokio::test]
async fn test_first_turn() {
    let relay = ScriptedRelay::new(vec![Ok("Hi there! How are you?".to_string())], Duration::ZERO);
    let Harness {
        mut conversation,
        events,
        playback,
    } = harness(relay.clone());
    let (_controls, controls_rx) = mpsc::channel(1);

    drive(&mut conversation, controls_rx, async move {
        say(&events, "Hello");
        drop(events);
    })
    .await;

    assert_eq!(relay.histories(), vec![vec![Message::user("Hello")]]);
    assert_eq!(
        conversation.coordinator().transcript().messages(),
        [Message::user("Hello"), Message::bot("Hi there! How are you?")]
    );
    assert_eq!(playback.spoken(), ["Hi there! How are you?"]);
    assert_eq!(conversation.coordinator().state(), SessionState::Listening);
    assert!(conversation.coordinator().last_error().is_none());
}

#[tokio::test]
async fn test_second_turn_carries_full_history() {
    let relay = ScriptedRelay::new(
        vec![
            Ok("Hi there! How are you?".to_string()),
            Ok("Great to hear!".to_string()),
        ],
        Duration::ZERO,
    );
    let Harness {
        mut conversation,
        events,
        playback,
    } = harness(relay.clone());
    let (_controls, controls_rx) = mpsc::channel(1);

    let spoken = playback.clone();
    drive(&mut conversation, controls_rx, async move {
        say(&events, "Hello");
        wait_until(|| spoken.spoken().len() == 1).await;
        say(&events, "Good");
        drop(events);
    })
    .await;

    assert_eq!(
        relay.histories()[1],
        vec![
            Message::user("Hello"),
            Message::bot("Hi there! How are you?"),
            Message::user("Good"),
        ]
    );
    assert_eq!(conversation.coordinator().transcript().len(), 4);
    assert_eq!(
        conversation.coordinator().transcript().last(),
        Some(&Message::bot("Great to hear!"))
    );
}

#[tokio::test]
async fn test_utterances_during_pending_turn_are_dropped() {
    let relay = ScriptedRelay::new(
        vec![Ok("Hi there!".to_string())],
        Duration::from_millis(200),
    );
    let Harness {
        mut conversation,
        events,
        playback: _,
    } = harness(relay.clone());
    let (_controls, controls_rx) = mpsc::channel(1);

    let calls = relay.clone();
    drive(&mut conversation, controls_rx, async move {
        say(&events, "Hello");
        wait_until(|| calls.calls() == 1).await;
        say(&events, "Are you there?");
        say(&events, "Hello?");
        drop(events);
    })
    .await;

    assert_eq!(relay.calls(), 1);
    assert_eq!(
        conversation.coordinator().transcript().messages(),
        [Message::user("Hello"), Message::bot("Hi there!")]
    );
}

#[tokio::test]
async fn test_halt_during_pending_turn_lands_idle() {
    let relay = ScriptedRelay::new(
        vec![Ok("Hi there!".to_string())],
        Duration::from_millis(200),
    );
    let (events, rx) = mpsc::unbounded_channel();
    let engine = ChannelEngine::new(rx);
    let refuse_starts = Arc::clone(&engine.refuse_starts);
    let config = RecognitionConfig {
        max_restart_attempts: 2,
        ..RecognitionConfig::default()
    };
    let playback = Arc::new(RecordingPlayback::default());
    let mut conversation = ConversationLoop::new(
        CaptureSession::new(engine, config),
        relay.clone(),
        playback.clone(),
    );
    conversation.start();
    let (_controls, controls_rx) = mpsc::channel(1);

    let calls = relay.clone();
    drive(&mut conversation, controls_rx, async move {
        say(&events, "Hello");
        wait_until(|| calls.calls() == 1).await;
        refuse_starts.store(true, Ordering::SeqCst);
        events.send(EngineEvent::End).unwrap();
        events.send(EngineEvent::End).unwrap();
        drop(events);
    })
    .await;

    // The pending reply still lands, but the error stays until a restart
    assert_eq!(playback.spoken(), ["Hi there!"]);
    assert_eq!(conversation.coordinator().transcript().len(), 2);
    assert_eq!(conversation.coordinator().state(), SessionState::Idle);
    assert!(
        conversation
            .coordinator()
            .last_error()
            .is_some_and(|e| e.contains("start again"))
    );
    assert!(!conversation.session().is_listening());
}

#[tokio::test]
async fn test_failed_turn_keeps_transcript_consistent() {
    let relay = ScriptedRelay::new(
        vec![
            Err(Error::Relay("502 Bad Gateway".to_string())),
            Ok("I am fine.".to_string()),
        ],
        Duration::ZERO,
    );
    let Harness {
        mut conversation,
        events,
        playback,
    } = harness(relay.clone());
    let (_controls, controls_rx) = mpsc::channel(1);

    let calls = relay.clone();
    drive(&mut conversation, controls_rx, async move {
        say(&events, "Hello");
        wait_until(|| calls.calls() == 1).await;
        settle().await;
        say(&events, "How are you");
        drop(events);
    })
    .await;

    assert_eq!(
        relay.histories()[1],
        vec![Message::user("Hello"), Message::user("How are you")]
    );
    assert_eq!(
        conversation.coordinator().transcript().messages(),
        [
            Message::user("Hello"),
            Message::user("How are you"),
            Message::bot("I am fine."),
        ]
    );
    assert_eq!(playback.spoken(), ["I am fine."]);
    assert!(conversation.coordinator().last_error().is_none());
}

#[tokio::test]
async fn test_failed_turn_reports_error() {
    let relay = ScriptedRelay::new(
        vec![Err(Error::Relay("connection refused".to_string()))],
        Duration::ZERO,
    );
    let Harness {
        mut conversation,
        events,
        playback,
    } = harness(relay);
    let (_controls, controls_rx) = mpsc::channel(1);

    drive(&mut conversation, controls_rx, async move {
        say(&events, "Hello");
        drop(events);
    })
    .await;

    let coordinator = conversation.coordinator();
    assert_eq!(coordinator.transcript().messages(), [Message::user("Hello")]);
    assert!(coordinator.last_error().unwrap().contains("connection refused"));
    assert_eq!(coordinator.state(), SessionState::Listening);
    assert!(playback.spoken().is_empty());
}

#[tokio::test]
async fn test_stop_and_restart_controls() {
    let relay = ScriptedRelay::new(
        vec![Ok("Hi!".to_string()), Ok("Hi again!".to_string())],
        Duration::from_millis(100),
    );
    let Harness {
        mut conversation,
        events,
        playback,
    } = harness(relay.clone());
    let (controls, controls_rx) = mpsc::channel(4);

    let calls = relay.clone();
    let spoken = playback.clone();
    drive(&mut conversation, controls_rx, async move {
        say(&events, "Hello");
        wait_until(|| calls.calls() == 1).await;

        // Refused while the reply is pending
        controls.send(Control::Stop).await.unwrap();
        wait_until(|| spoken.spoken().len() == 1).await;

        controls.send(Control::Stop).await.unwrap();
        settle().await;
        say(&events, "Anyone there?");
        settle().await;

        // Start clears dedup, so the same words count again
        controls.send(Control::Start).await.unwrap();
        settle().await;
        say(&events, "Anyone there?");
        drop(events);
    })
    .await;

    assert_eq!(relay.calls(), 2);
    assert_eq!(
        conversation.coordinator().transcript().messages(),
        [
            Message::user("Hello"),
            Message::bot("Hi!"),
            Message::user("Anyone there?"),
            Message::bot("Hi again!"),
        ]
    );
}

#[tokio::test]
async fn test_relay_client_round_trip() {
    let upstream = spawn_upstream(StatusCode::OK, completion("Hi there! How are you?")).await;
    let url = spawn_relay_api(upstream.relay()).await;
    let client = RelayClient::new(url, Duration::from_secs(5)).unwrap();

    let reply = assert_ok!(client.send(&[Message::user("Hello")]).await);

    assert_eq!(reply, "Hi there! How are you?");
    assert_eq!(
        upstream.requests()[0]["messages"][1],
        json!({ "role": "user", "content": "Hello" })
    );
}

#[tokio::test]
async fn test_relay_client_surfaces_bad_gateway() {
    let upstream = spawn_upstream(StatusCode::OK, json!({ "choices": [] }).to_string()).await;
    let url = spawn_relay_api(upstream.relay()).await;
    let client = RelayClient::new(url, Duration::from_secs(5)).unwrap();

    let err = client.send(&[Message::user("Hello")]).await.unwrap_err();

    assert!(matches!(err, Error::Relay(ref msg) if msg.contains("502")));
}

#[tokio::test]
async fn test_relay_client_rejects_non_json_reply() {
    let url = spawn_chat_stub("not json").await;
    let client = RelayClient::new(url, Duration::from_secs(5)).unwrap();

    let err = assert_err!(client.send(&[Message::user("Hello")]).await);

    assert!(matches!(err, Error::Relay(ref msg) if msg.contains("unreadable reply")));
}

#[tokio::test]
async fn test_relay_client_rejects_reply_without_text() {
    let url = spawn_chat_stub("{}").await;
    let client = RelayClient::new(url, Duration::from_secs(5)).unwrap();

    let err = assert_err!(client.send(&[Message::user("Hello")]).await);

    assert!(matches!(err, Error::Relay(ref msg) if msg.contains("unreadable reply")));
}

#[tokio::test]
async fn test_relay_client_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = RelayClient::new(format!("http://{addr}/chat"), Duration::from_secs(5)).unwrap();
    let err = assert_err!(client.send(&[Message::user("Hello")]).await);

    assert!(matches!(err, Error::Relay(_)));
}

#[tokio::test]
async fn test_typed_conversation_end_to_end() {
    let upstream = spawn_upstream(StatusCode::OK, completion("Hi there! How are you?")).await;
    let url = spawn_relay_api(upstream.relay()).await;
    let relay = Arc::new(RelayClient::new(url, Duration::from_secs(5)).unwrap());
    let playback = Arc::new(RecordingPlayback::default());

    let session = CaptureSession::new(
        LineRecognizer::new(&b"  Hello  \n\n"[..]),
        RecognitionConfig::default(),
    );
    let mut conversation = ConversationLoop::new(session, relay, playback.clone());
    conversation.start();

    let (_controls, controls_rx) = mpsc::channel(1);
    tokio::time::timeout(
        Duration::from_secs(10),
        conversation.run(controls_rx, std::future::pending()),
    )
    .await
    .expect("conversation did not finish");

    assert_eq!(
        conversation.coordinator().transcript().messages(),
        [Message::user("Hello"), Message::bot("Hi there! How are you?")]
    );
    assert_eq!(playback.spoken(), ["Hi there! How are you?"]);
    assert_eq!(upstream.requests().len(), 1);
}
