// Batch front end: record or load one audio file, transcribe it, summarize
// the transcript, and write both next to the working directory.

use std::io::BufRead;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tracing_subscriber::EnvFilter;

use medscribe::assistant::Assistant;
use medscribe::audio::Recorder;
use medscribe::config;
use medscribe::locale::LocaleStore;
use medscribe::registry::ModelRegistry;
use medscribe::task::{PanelSurface, TaskController, TaskOperation, TaskState};
use medscribe::transcribe::AudioPayload;

const TRANSCRIPT_FILE: &str = "text.txt";
const SUMMARY_FILE: &str = "summary.txt";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let source = match args.next() {
        Some(arg) => arg,
        None => {
            eprintln!("usage: medscribe <audio-file | --record> [keywords...]");
            std::process::exit(2);
        }
    };
    let keywords = args.collect::<Vec<_>>().join(", ");

    let config_dir = config::default_config_dir().unwrap_or_else(|| PathBuf::from(".medscribe"));
    let mut app_config = match config::load_or_create(&config_dir) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load settings: {}", e);
            std::process::exit(1);
        }
    };
    if let Ok(key) = std::env::var("OPENAI_API_KEY") {
        app_config.set_api_key(&key);
    }

    let client = reqwest::Client::new();
    let transcribe_registry = match std::env::var("MEDSCRIBE_TRANSCRIBE_MODELS_URL") {
        Ok(url) => {
            ModelRegistry::fetch(&client, &url, ModelRegistry::fallback_transcription()).await
        }
        Err(_) => ModelRegistry::fallback_transcription(),
    };
    let summary_registry = match std::env::var("MEDSCRIBE_SUMMARY_MODELS_URL") {
        Ok(url) => {
            ModelRegistry::fetch(&client, &url, ModelRegistry::fallback_summarization()).await
        }
        Err(_) => ModelRegistry::fallback_summarization(),
    };

    let assistant = Assistant::new(
        app_config,
        Arc::new(LocaleStore::bundled()),
        &transcribe_registry,
        &summary_registry,
    );
    assistant.set_keywords(&keywords);

    let payload = if source == "--record" {
        record_payload()
    } else {
        let path = PathBuf::from(&source);
        match AudioPayload::from_file(&path) {
            Ok(payload) => payload,
            Err(e) => {
                eprintln!("Failed to read {}: {}", path.display(), e);
                std::process::exit(1);
            }
        }
    };
    assistant.set_audio(Some(payload));

    println!(
        "Transcribing with {}...",
        assistant.transcribe_selection().persist_key()
    );
    run_task(assistant.transcription(), assistant.transcription_panel()).await;
    let transcription = assistant.transcription_text();
    write_output(Path::new(TRANSCRIPT_FILE), &transcription);

    println!(
        "Summarizing with {}...",
        assistant.summary_selection().persist_key()
    );
    run_task(assistant.summarization(), assistant.summary_panel()).await;
    let summary = assistant.summary_panel().snapshot().result_text;
    write_output(Path::new(SUMMARY_FILE), &summary);

    println!("\n{}", summary);
}

/// Capture from the default microphone until the user presses Enter.
fn record_payload() -> AudioPayload {
    let mut recorder = Recorder::new();
    if let Err(e) = recorder.start() {
        eprintln!("Recording failed: {}", e);
        std::process::exit(1);
    }
    println!("Recording... press Enter to stop.");
    let mut line = String::new();
    let _ = std::io::stdin().lock().read_line(&mut line);

    let elapsed = recorder.elapsed_secs();
    let buffer = match recorder.stop() {
        Ok(buffer) => buffer,
        Err(e) => {
            eprintln!("Recording failed: {}", e);
            std::process::exit(1);
        }
    };
    println!("Recorded {:.1}s of audio.", elapsed);

    match AudioPayload::from_buffer(&buffer) {
        Ok(payload) => payload,
        Err(e) => {
            eprintln!("Recording unusable: {}", e);
            std::process::exit(1);
        }
    }
}

/// Drive one task to a terminal state, exiting on validation or failure.
async fn run_task<Op: TaskOperation>(controller: &TaskController<Op>, panel: &Arc<PanelSurface>) {
    controller.start();

    // A start that changed nothing was rejected by a precondition.
    if controller.state() == TaskState::Idle {
        let notice = panel
            .snapshot()
            .status
            .map(|(_, text)| text)
            .unwrap_or_else(|| "preconditions not met".to_string());
        eprintln!("{}", notice);
        std::process::exit(1);
    }

    loop {
        let state = controller.state();
        if state.is_terminal() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    if controller.state() != TaskState::Succeeded {
        let status = panel
            .snapshot()
            .status
            .map(|(_, text)| text)
            .unwrap_or_else(|| "task failed".to_string());
        eprintln!("{}", status);
        std::process::exit(1);
    }
}

fn write_output(path: &Path, content: &str) {
    if let Err(e) = std::fs::write(path, content) {
        tracing::warn!("Could not write {}: {}", path.display(), e);
    }
}
