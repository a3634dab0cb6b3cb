//! # RadioPad
//!
//! Console FX pad: pick sounds from the store and fire them through the
//! shared player.

mod commands;

use std::sync::Arc;

use anyhow::{Context, Result};
use commands::{Input, HELP};
use radiopad_api::{ApiConfig, SoundsClient};
use radiopad_audio::NativeResource;
use radiopad_core::{PlaybackPhase, PlayerSnapshot, SoundItem};
use radiopad_player::{
    DurationProbe, PlaybackEngine, PlayerConfig, PlayerHandle, PlayerService, TracingSink,
};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

const USAGE: &str = "usage: radiopad [--list] [URL...]";

/// Command-line arguments.
#[derive(Debug, Default)]
struct Args {
    /// Print the store's sounds and exit.
    list: bool,
    /// Ad-hoc sources to play instead of (or in addition to) the store.
    urls: Vec<String>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Option<Self>> {
        let mut parsed = Self::default();
        for arg in args {
            match arg.as_str() {
                "--list" | "-l" => parsed.list = true,
                "--help" | "-h" => return Ok(None),
                flag if flag.starts_with('-') => anyhow::bail!("unknown option {flag}\n{USAGE}"),
                _ => parsed.urls.push(arg),
            }
        }
        Ok(Some(parsed))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "radiopad=info,radiopad_player=debug,radiopad_audio=info".into()
            }),
        )
        .init();

    let Some(args) = Args::parse(std::env::args().skip(1))? else {
        println!("{USAGE}");
        return Ok(());
    };

    info!("Starting RadioPad v{}", env!("CARGO_PKG_VERSION"));

    let config = ApiConfig::from_env();
    info!("Sound store at {}", config.base_url);
    let client = Arc::new(SoundsClient::new(&config)?);

    let sounds = load_sounds(&client, &args).await?;
    print_sounds(&sounds);
    if args.list {
        return Ok(());
    }

    let (media_tx, media_rx) = tokio::sync::mpsc::unbounded_channel();
    let resource = NativeResource::new(media_tx).context("failed to open audio output")?;
    let engine = PlaybackEngine::new(resource, PlayerConfig::default(), Arc::new(TracingSink));
    let probe = Arc::new(DurationProbe::new(SoundsClient::clone(&client)));
    let player = PlayerService::new(engine, media_rx, Arc::clone(&client), client, probe).spawn();

    tokio::spawn(announce_changes(player.clone()));
    println!("{HELP}");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        match Input::parse(&line) {
            Ok(Input::Quit) => break,
            Ok(input) => {
                if let Err(e) = run(&player, &sounds, input) {
                    println!("{e:#}");
                }
            }
            Err(e) => println!("{e:#}"),
        }
    }

    player.shutdown().await;
    info!("Bye");
    Ok(())
}

/// The store's sounds unless only URLs were given, followed by the URLs.
async fn load_sounds(client: &SoundsClient, args: &Args) -> Result<Vec<SoundItem>> {
    let mut sounds = Vec::new();

    if args.list || args.urls.is_empty() {
        match client.list_items().await {
            Ok(items) => sounds = items,
            Err(e) if !args.urls.is_empty() => warn!("Sound store unavailable: {e}"),
            Err(e) => return Err(e).context("failed to load sounds from the store"),
        }
    }

    sounds.extend(args.urls.iter().enumerate().map(|(i, url)| {
        let name = url.rsplit('/').next().unwrap_or(url);
        SoundItem::new(format!("url-{}", i + 1), name).with_source(url.as_str())
    }));
    Ok(sounds)
}

fn print_sounds(sounds: &[SoundItem]) {
    if sounds.is_empty() {
        println!("no sounds");
        return;
    }
    for (i, sound) in sounds.iter().enumerate() {
        let tag = if !sound.is_playable() {
            "  (no file)"
        } else if sound.is_video() {
            "  (video)"
        } else {
            ""
        };
        println!("{:>3}. {}  [{} plays]{tag}", i + 1, sound.name, sound.play_count);
    }
}

fn run(player: &PlayerHandle, sounds: &[SoundItem], input: Input) -> Result<()> {
    let pick = |n: usize| {
        sounds
            .get(n - 1)
            .cloned()
            .with_context(|| format!("no sound {n}, there are {}", sounds.len()))
    };

    match input {
        Input::Play(n) => player.play(pick(n)?)?,
        Input::Toggle(n) => player.toggle(pick(n)?)?,
        Input::Stop => player.stop()?,
        Input::Seek(seconds) => player.seek(seconds)?,
        Input::Volume(percent) => player.set_volume(percent / 100.0)?,
        Input::Status => println!("{}", player.snapshot().status_line()),
        Input::List => print_sounds(sounds),
        Input::Help => println!("{HELP}"),
        Input::Quit => {}
    }
    Ok(())
}

/// Print the status line whenever the sound, phase or duration changes.
async fn announce_changes(player: PlayerHandle) {
    let mut updates = player.subscribe();
    let mut last = Announced::from(&*updates.borrow());

    while updates.changed().await.is_ok() {
        let snapshot = updates.borrow_and_update().clone();
        let now = Announced::from(&snapshot);
        if now != last {
            println!("{}", snapshot.status_line());
            last = now;
        }
    }
}

/// The parts of a snapshot worth announcing.
#[derive(Debug, PartialEq)]
struct Announced {
    sound: Option<String>,
    phase: PlaybackPhase,
    duration: u64,
}

impl From<&PlayerSnapshot> for Announced {
    fn from(snapshot: &PlayerSnapshot) -> Self {
        Self {
            sound: snapshot.current_item.as_ref().map(|s| s.id.to_string()),
            phase: snapshot.phase,
            duration: snapshot.duration_seconds.max(0.0) as u64,
        }
    }
}
