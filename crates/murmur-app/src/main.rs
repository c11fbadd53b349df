//! Murmur demo binary - composition root.
//!
//! Wires the dictation coordinator against scripted mock engines and runs
//! one dictation session end to end:
//! 1. Load configuration from TOML
//! 2. Initialize tracing
//! 3. Build the coordinator for the chosen mock environment
//! 4. Start a session, feed transcript fragments, stop
//! 5. Log every event the coordinator publishes

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use murmur_core::config::MurmurConfig;
use murmur_core::events::DictationEvent;
use murmur_dictation::{DictationCoordinator, MockBrowserSpeech, MockNativeBridge};

mod cli;

use cli::{CliArgs, DemoBackend};

/// Log every event the coordinator publishes until the stream closes.
async fn event_logger(mut events: tokio::sync::mpsc::UnboundedReceiver<DictationEvent>) {
    while let Some(event) = events.recv().await {
        match &event {
            DictationEvent::RecordingStarted {
                session_id,
                backend,
                language,
                ..
            } => {
                tracing::info!(
                    session_id = %session_id,
                    backend = %backend,
                    language = %language,
                    "Recording started"
                );
            }
            DictationEvent::TranscriptUpdate { result, .. } => {
                tracing::info!(
                    text = %result.text,
                    is_final = result.is_final,
                    "Transcript update"
                );
            }
            DictationEvent::SessionFailed { error, .. } => {
                tracing::warn!(code = ?error.code, message = %error.message, "Session failed");
            }
            DictationEvent::SessionEnded { session_id, .. } => {
                tracing::info!(session_id = %session_id, "Session ended");
            }
            other => {
                tracing::debug!(event = other.event_name(), "Unhandled dictation event");
            }
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_path = args.resolve_config_path();
    let mut config = MurmurConfig::load_or_default(&config_path);
    if let Some(language) = &args.language {
        config.dictation.language_tag = language.clone();
    }

    // Tracing.
    let log_level = args.resolve_log_level(&config.general.log_level);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    tracing::info!("Starting Murmur v{}", env!("CARGO_PKG_VERSION"));
    tracing::info!(path = %config_path.display(), "Configuration resolved");

    // Mock engine environment for the demo session.
    let native = match args.backend {
        DemoBackend::Native => MockNativeBridge::new(),
        DemoBackend::Browser => MockNativeBridge::new().without_shell(),
    };
    let browser = MockBrowserSpeech::new();

    let coordinator = Arc::new(
        DictationCoordinator::new(native.clone(), browser.clone(), config.dictation.clone())
            .await,
    );
    tracing::info!(
        backend = %coordinator.backend_kind(),
        supported = coordinator.is_supported(),
        "Coordinator ready"
    );

    let events = coordinator
        .subscribe()
        .expect("event stream already taken");
    let logger = tokio::spawn(event_logger(events));

    // One scripted session: start, speak, stop.
    coordinator.start().await?;

    let fragments = [
        "dear diary",
        "dear diary today",
        "dear diary today I spoke instead of typing",
    ];
    for fragment in fragments {
        match args.backend {
            DemoBackend::Native => native.emit_partial(fragment),
            DemoBackend::Browser => browser.emit_result(fragment, false),
        }
        tokio::time::sleep(Duration::from_millis(200)).await;
    }

    coordinator.stop().await?;
    coordinator.shutdown().await;

    // Dropping the coordinator closes the event stream and ends the logger.
    drop(coordinator);
    logger.await?;

    tracing::info!("Demo session complete");
    Ok(())
}
