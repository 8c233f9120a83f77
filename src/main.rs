use anyhow::{Context, Result};
use std::io::BufRead;
use std::sync::Arc;
use std::thread;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use voiceloop::audio::{CpalMicrophone, RodioPlayer};
use voiceloop::integration::{RuntimeCommand, RuntimeHandle, VoiceConfig, VoiceRuntime};
use voiceloop::messages::Role;
use voiceloop::speech::HttpTranscriptionService;
use voiceloop::turn::{SessionSnapshot, TurnController};

fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "voiceloop=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting voiceloop");

    let config = match std::env::args().nth(1) {
        Some(path) => VoiceConfig::from_toml_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        None => VoiceConfig::default(),
    }
    .with_env_overrides();
    config.validate().context("invalid configuration")?;

    info!("Transcription service: {}", config.api_url);

    let service = HttpTranscriptionService::new(config.api_url.clone(), config.request_timeout())
        .context("creating transcription client")?;
    let player = RodioPlayer::new();
    let microphone = CpalMicrophone::new(config.analysis_window);

    let controller = TurnController::new(
        config.turn_config(),
        Box::new(microphone),
        Box::new(player),
        Arc::new(service),
    );
    let (runtime, handle) = VoiceRuntime::new(controller, config.channel_buffer_size);

    spawn_status_printer(handle.clone());
    spawn_command_reader(handle);

    println!("Commands: start | stop | close | quit (empty line toggles recording)");

    // Audio streams must stay on this thread
    runtime.run();

    info!("voiceloop exited");
    Ok(())
}

fn spawn_command_reader(handle: RuntimeHandle) {
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };

            let cmd = match line.trim() {
                "" => {
                    if handle.snapshot().is_recording {
                        RuntimeCommand::Stop
                    } else {
                        RuntimeCommand::Start
                    }
                }
                "start" | "s" => RuntimeCommand::Start,
                "stop" => RuntimeCommand::Stop,
                "close" | "c" => RuntimeCommand::Close,
                "quit" | "q" | "exit" => RuntimeCommand::Shutdown,
                other => {
                    println!("Unknown command: {}", other);
                    continue;
                }
            };

            let shutting_down = cmd == RuntimeCommand::Shutdown;
            if let Err(e) = handle.send_command(cmd) {
                warn!("{}", e);
                break;
            }
            if shutting_down {
                break;
            }
        }

        // stdin closed
        let _ = handle.shutdown();
    });
}

fn spawn_status_printer(handle: RuntimeHandle) {
    let updates = handle.update_receiver();
    thread::spawn(move || {
        let mut printed = 0;
        for snapshot in updates.iter() {
            print_snapshot(&snapshot);

            let messages = handle.conversation().get_all();
            for message in messages.iter().skip(printed) {
                match message.role {
                    Role::User => println!("  you: {}", message.content),
                    Role::Assistant => println!("  assistant: {}", message.content),
                }
            }
            printed = messages.len();
        }
    });
}

fn print_snapshot(snapshot: &SessionSnapshot) {
    let mut line = format!("[{}]", snapshot.title);
    if snapshot.is_recording && snapshot.silence_elapsed_secs > 0 {
        line.push_str(&format!(" silent {}s", snapshot.silence_elapsed_secs));
    }
    if let Some(warning) = &snapshot.silence_warning {
        line.push_str(&format!(" {}", warning));
    }
    if let Some(status) = &snapshot.status_message {
        line.push_str(&format!(" {}", status));
    }
    if let Some(error) = &snapshot.error_message {
        line.push_str(&format!(" error: {}", error));
    }
    println!("{}", line);
}
