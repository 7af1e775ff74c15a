mod config;
mod media;

use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::fmt::time::ChronoLocal;

use mentor_realtime::auth::AuthClient;
use mentor_realtime::speech::SpeechPhase;
use mentor_realtime::{Config as ClientConfig, ConnectionState, Session, SessionEvent};

use crate::config::Config;
use crate::media::{ConsoleSink, SyntheticFrameSource, TerminalRecognizer};

#[derive(Parser)]
#[command(about = "Interactive client for the tutoring backend")]
struct Cli {
    /// Ask a single question and exit
    question: Option<String>,
    /// Start with a synthetic screen share active
    #[arg(long)]
    share: bool,
    /// Start with voice mode enabled (type transcripts into the terminal)
    #[arg(long)]
    voice: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env().context("Failed to load application configuration")?;

    tracing_subscriber::fmt()
        .with_max_level(config.log_level)
        .with_timer(ChronoLocal::rfc_3339())
        .init();

    tracing::info!("Configuration loaded. Starting tutoring session...");

    let args = Cli::parse();

    // Log in first when credentials are configured; the token rides along on
    // the connection handshake.
    let mut client_config = ClientConfig::builder().with_endpoint(&config.endpoint);
    if let (Some(email), Some(password)) = (&config.email, &config.password) {
        let auth = AuthClient::new(&config.auth_base_url);
        let token = auth
            .login(email, password)
            .await
            .context("Login failed")?;
        tracing::info!("Logged in as {}", email);
        client_config = client_config.with_token(token);
    }

    let (recognizer, transcript_tx) = TerminalRecognizer::new();
    let sink = ConsoleSink::new();
    let mut session = Session::start(
        client_config.build(),
        Box::new(recognizer),
        Box::new(sink),
    )
    .context("Failed to start session")?;

    // Surface any session-level faults the UI layer would normally display.
    let mut events = session.events().context("Failed to subscribe to events")?;
    let event_log = tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            match event {
                SessionEvent::Closed { reason } => {
                    tracing::warn!("connection closed: {:?}", reason);
                }
                SessionEvent::ReconnectsExhausted { attempts } => {
                    eprintln!("Connection lost after {attempts} attempts; restart to try again.");
                }
                SessionEvent::MediaFault(fault) => {
                    eprintln!("Voice features degraded: {fault}");
                }
                SessionEvent::ScreenShareEnded => {
                    eprintln!("Screen share ended; voice mode was turned off.");
                }
                _ => {}
            }
        }
    });

    // Print revealed text as it grows, giving the typed-out effect in the
    // terminal.
    let mut surface = session.surface();
    let typist = tokio::spawn(async move {
        use std::io::Write;
        let mut shown = String::new();
        while surface.changed().await.is_ok() {
            let current = surface.borrow_and_update().clone();
            match current.strip_prefix(shown.as_str()) {
                Some(suffix) => {
                    print!("{suffix}");
                }
                // the surface was reset by a preempting response
                None => {
                    print!("\n{current}");
                }
            }
            let _ = std::io::stdout().flush();
            shown = current;
        }
    });

    let mut state = session.connection_state();
    tokio::time::timeout(
        Duration::from_secs(10),
        state.wait_for(|s| *s == ConnectionState::Open),
    )
    .await
    .context("Timed out waiting for the connection to open")?
    .context("Connection supervisor stopped")?;
    tracing::info!("Connected to {}", config.endpoint);

    if args.share {
        session.start_screen_share(Box::new(SyntheticFrameSource::new()));
    }
    if args.voice {
        session.enable_voice_mode().await;
    }

    // One-shot mode: ask, let the reveal finish, leave.
    if let Some(question) = args.question {
        session.ask(&question).await.context("Failed to send query")?;
        tokio::time::sleep(Duration::from_secs(3)).await;
        println!();
        session.shutdown().await;
        event_log.abort();
        typist.abort();
        return Ok(());
    }

    println!("Type a question and press enter. Commands: /voice on|off, /share on|off, /quit");
    let phase = session.speech_phase();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line.context("Failed to read stdin")? else {
                    break;
                };
                let line = line.trim().to_string();
                if line.is_empty() {
                    continue;
                }
                match line.as_str() {
                    "/quit" => break,
                    "/voice on" => session.enable_voice_mode().await,
                    "/voice off" => session.disable_voice_mode().await,
                    "/share on" => {
                        session.start_screen_share(Box::new(SyntheticFrameSource::new()));
                    }
                    "/share off" => session.stop_screen_share(),
                    _ => {
                        if *phase.borrow() == SpeechPhase::Listening {
                            // voice mode: the typed line stands in for a
                            // recognized transcript
                            media::send_transcript(&transcript_tx, &line).await;
                        } else if let Err(e) = session.ask(&line).await {
                            eprintln!("Could not send the question: {e}");
                        }
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received Ctrl-C, shutting down...");
                break;
            }
        }
    }

    println!();
    session.shutdown().await;
    event_log.abort();
    typist.abort();
    tracing::info!("Shutting down...");
    Ok(())
}
