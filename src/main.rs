//! `cuelight` - line-oriented show console.
//!
//! Reads one command per line from stdin and prints each response as JSON.
//! `sync <playing|paused> <seconds>` feeds the playback clock; everything else
//! goes through the command dispatcher.

use std::path::PathBuf;

use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};

use cuelight::fixtures::FixtureLibrary;
use cuelight::models::commands::CommandResponse;
use cuelight::models::song::SongContext;
use cuelight::session::ShowController;
use cuelight::settings::EngineSettings;

/// Schedule and render lighting cues from text commands
#[derive(Parser, Debug)]
#[command(name = "cuelight")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Args {
    /// Engine settings (JSON object of key/value pairs)
    #[arg(long, value_name = "FILE")]
    settings: Option<PathBuf>,

    /// Song context produced by the analysis pipeline
    #[arg(long, value_name = "FILE")]
    song: Option<PathBuf>,

    /// Fixture capability table
    #[arg(long, value_name = "FILE")]
    fixtures: PathBuf,

    /// Id used for the per-song data directory
    #[arg(long, default_value = "untitled")]
    song_id: String,
}

fn print_response(response: &CommandResponse) {
    match serde_json::to_string(response) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("[console] Failed to serialize response: {}", e),
    }
}

fn sync_command(controller: &ShowController, line: &str) -> CommandResponse {
    let parts: Vec<&str> = line.split_whitespace().collect();
    let (playing, time) = match parts.as_slice() {
        ["sync", state, time] => (*state == "playing", time.parse::<f32>()),
        _ => return CommandResponse::fail("usage: sync <playing|paused> <seconds>"),
    };
    let Ok(time) = time else {
        return CommandResponse::fail(format!("bad time in '{}'", line));
    };
    match controller.sync_playback(playing, time) {
        Ok(snapshot) => CommandResponse::ok(format!("Clock at {:.2}s", snapshot.current_time))
            .with_data(serde_json::json!(snapshot)),
        Err(e) => CommandResponse::fail(e.to_string()),
    }
}

#[tokio::main]
async fn main() -> Result<(), String> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let args = Args::parse();

    let settings = match &args.settings {
        Some(path) => EngineSettings::load(path)?,
        None => EngineSettings::default(),
    };
    let fixtures = FixtureLibrary::load(&args.fixtures)?;
    let song = match &args.song {
        Some(path) => SongContext::load(path)?,
        None => SongContext::default(),
    };

    let controller = ShowController::new(settings, fixtures);
    let (_, mut events) = controller.subscribe();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            log::debug!("[console] event {:?}", event);
        }
    });

    controller
        .load_song(&args.song_id, song)
        .map_err(|e| format!("Failed to load song '{}': {}", args.song_id, e))?;

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| format!("Failed to read stdin: {}", e))?
    {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "quit" || line == "exit" {
            break;
        }
        let response = if line.starts_with("sync ") {
            sync_command(&controller, line)
        } else {
            controller.dispatch(line).await
        };
        print_response(&response);
    }
    Ok(())
}
