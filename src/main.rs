use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing_subscriber::EnvFilter;

use parley::api::ApiServerBuilder;
use parley::voice::{
    CaptureSession, ConsoleSpeaker, LineRecognizer, MicrophoneRecognizer, Playback, PlaybackGate,
    RecognitionConfig, RecognitionEngine, Speaker, SpeechToText, TextToSpeech,
};
use parley::{
    Config, Control, ConversationLoop, ConversationRelay, Error, Relay, RelayClient, UpstreamClient,
};

/// Parley - practice spoken conversation with an AI partner
#[derive(Parser)]
#[command(name = "parley", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the conversation relay HTTP server
    Serve {
        /// Port to listen on
        #[arg(long)]
        port: Option<u16>,
    },
    /// Hold a conversation through a running relay
    Talk {
        /// Type utterances on stdin instead of speaking
        #[arg(long)]
        text: bool,

        /// Relay `/chat` URL
        #[arg(long)]
        relay_url: Option<String>,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let filter = match cli.verbose {
        0 => "info,parley=info",
        1 => "info,parley=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

#[allow(clippy::future_not_send)]
async fn run(cli: Cli) -> anyhow::Result<()> {
    let mut config = Config::load();
    tracing::debug!(?config, "loaded configuration");

    match cli.command {
        Command::Serve { port } => {
            if let Some(port) = port {
                config.server.port = port;
            }
            serve(&config).await
        }
        Command::Talk { text, relay_url } => {
            if let Some(url) = relay_url {
                config.client.relay_url = url;
            }
            talk(&config, text).await
        }
    }
}

async fn serve(config: &Config) -> anyhow::Result<()> {
    let upstream = UpstreamClient::new(
        config.upstream_url()?,
        config.upstream.model.clone(),
        config.upstream.timeout,
    )?;

    ApiServerBuilder::new(ConversationRelay::new(upstream), config.server.port)
        .build()
        .run()
        .await?;

    Ok(())
}

#[allow(clippy::future_not_send)]
async fn talk(config: &Config, text_mode: bool) -> anyhow::Result<()> {
    let relay: Arc<dyn Relay> = Arc::new(RelayClient::new(
        config.client.relay_url.clone(),
        config.client.timeout,
    )?);

    let recognition = RecognitionConfig {
        language: config.client.language.clone(),
        max_restart_attempts: config.client.max_restart_attempts,
        ..RecognitionConfig::default()
    };

    tracing::info!(relay = %config.client.relay_url, text_mode, "starting conversation");

    let (controls_tx, controls_rx) = mpsc::channel(8);

    if text_mode {
        // stdin carries utterances, so there is nothing to read controls from
        drop(controls_tx);
        let session = CaptureSession::new(LineRecognizer::stdin(), recognition);
        converse(session, relay, Arc::new(ConsoleSpeaker), config, controls_rx).await;
        return Ok(());
    }

    let stt = SpeechToText::from_config(&config.voice, &config.api_keys, &config.client.language)
        .map_err(|e| Error::RecognitionUnavailable(e.to_string()))?;

    let gate = PlaybackGate::new();
    let mute_gate = config.client.mute_during_playback.then(|| gate.clone());
    let engine = MicrophoneRecognizer::new(stt, mute_gate)?;

    let playback: Arc<dyn Playback> = match TextToSpeech::from_config(&config.voice, &config.api_keys) {
        Ok(tts) => Arc::new(Speaker::new(tts, gate)),
        Err(e) => {
            tracing::info!(reason = %e, "speech output unavailable, printing replies");
            Arc::new(ConsoleSpeaker)
        }
    };

    tokio::spawn(read_controls(controls_tx));
    println!("Type `stop` to pause listening and `start` to resume.");

    let session = CaptureSession::new(engine, recognition);
    converse(session, relay, playback, config, controls_rx).await;
    Ok(())
}

#[allow(clippy::future_not_send)]
async fn converse<E: RecognitionEngine>(
    session: CaptureSession<E>,
    relay: Arc<dyn Relay>,
    playback: Arc<dyn Playback>,
    config: &Config,
    controls: mpsc::Receiver<Control>,
) {
    let mut conversation = ConversationLoop::new(session, relay, Arc::clone(&playback));

    playback.speak(&config.client.greeting);
    conversation.start();
    conversation.run(controls, shutdown_signal()).await;

    let coordinator = conversation.coordinator();
    if let Some(error) = coordinator.last_error() {
        eprintln!("last error: {error}");
    }
    tracing::info!(turns = coordinator.transcript().len(), "conversation ended");
}

/// Map `start` / `stop` lines on stdin to loop controls
async fn read_controls(controls: mpsc::Sender<Control>) {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    while let Ok(Some(line)) = lines.next_line().await {
        let control = match line.trim() {
            "start" => Control::Start,
            "stop" => Control::Stop,
            "" => continue,
            other => {
                eprintln!("unknown command: {other}");
                continue;
            }
        };

        if controls.send(control).await.is_err() {
            break;
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
}
