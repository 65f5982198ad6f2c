mod script;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use feed_exposure_core::{
    AppConfig, ExposureEvent, FeedSession, ItemId, ScrollState, SimulatedPlayer,
};
use tracing_subscriber::EnvFilter;

use crate::script::Step;

/// Pixels travelled per simulated scroll tick.
const TICK_PX: f32 = 40.0;

fn main() -> feed_exposure_core::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Simulate {
            config,
            cache,
            script,
            json,
        } => run_simulate(config.as_deref(), cache, &script, json),
        Commands::Config { config } => print_config(config.as_deref()),
    }
}

fn load_config(path: Option<&Path>) -> feed_exposure_core::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::load(path),
        None => Ok(AppConfig::default()),
    }
}

fn print_config(path: Option<&Path>) -> feed_exposure_core::Result<()> {
    let config = load_config(path)?;
    print!("{}", config.to_toml_string()?);
    Ok(())
}

fn run_simulate(
    config: Option<&Path>,
    cache: Option<PathBuf>,
    script: &str,
    json: bool,
) -> feed_exposure_core::Result<()> {
    let mut config = load_config(config)?;
    if cache.is_some() {
        config.feed.cache_path = cache;
    }
    let steps = script::parse(script)?;
    tracing::info!(steps = steps.len(), viewport = config.viewport.height, "starting simulation");

    let reporter = Reporter { json };
    let mut session = FeedSession::new(&config, SimulatedPlayer::new());

    match session.start() {
        Ok(events) => reporter.events(&events),
        Err(err) => tracing::warn!(error = %err, "autoplay failed on start"),
    }
    reporter.playback("start", &session);

    for step in steps {
        tracing::debug!(?step, "running step");
        match step {
            Step::Drag(dy) => scroll(&mut session, &reporter, ScrollState::Dragging, dy)?,
            Step::Fling(dy) => scroll(&mut session, &reporter, ScrollState::Settling, dy)?,
            Step::Idle => {
                if let Err(err) = session.set_scroll_state(ScrollState::Idle) {
                    tracing::warn!(error = %err, "autoplay failed");
                }
                reporter.playback("idle", &session);
                reporter.cards(&session);
            }
            Step::Tap(position) => {
                if let Err(err) = session.tap(position) {
                    tracing::warn!(position, error = %err, "tap failed");
                }
                reporter.playback("tap", &session);
            }
            Step::Pause => {
                session.on_host_pause();
                reporter.playback("pause", &session);
            }
            Step::More => {
                let (added, events) = session.load_more();
                tracing::info!(added, total = session.list().items().len(), "loaded more");
                reporter.events(&events);
            }
            Step::Refresh => {
                match session.refresh() {
                    Ok(events) => reporter.events(&events),
                    Err(err) => tracing::warn!(error = %err, "autoplay failed after refresh"),
                }
                reporter.playback("refresh", &session);
            }
            Step::Remove(position) => match session.remove(position) {
                Some((item, events)) => {
                    tracing::info!(item_id = %item.id, position, "removed card");
                    reporter.events(&events);
                }
                None => tracing::warn!(position, "no card to remove"),
            },
        }
    }

    session.shutdown();
    let player = session.coordinator().player();
    tracing::info!(
        calls = player.calls().len(),
        loads = player.load_count(),
        max_attached = player.max_attached(),
        "simulation finished"
    );
    Ok(())
}

/// Scrolls `dy` pixels in small ticks, reporting events after each tick.
fn scroll(
    session: &mut FeedSession<SimulatedPlayer>,
    reporter: &Reporter,
    state: ScrollState,
    dy: f32,
) -> feed_exposure_core::Result<()> {
    session.set_scroll_state(state)?;

    let mut remaining = dy;
    while remaining.abs() > f32::EPSILON {
        let step = remaining.signum() * remaining.abs().min(TICK_PX);
        remaining -= step;
        reporter.events(&session.scroll_by(step));
    }
    Ok(())
}

struct Reporter {
    json: bool,
}

impl Reporter {
    fn events(&self, events: &[ExposureEvent]) {
        for event in events {
            if self.json {
                match serde_json::to_string(event) {
                    Ok(line) => println!("{line}"),
                    Err(err) => tracing::warn!(error = %err, "failed to encode event"),
                }
            } else {
                println!(
                    "exposure item={:<5} {:<13} ratio={:.2}",
                    event.item_id,
                    format!("{:?}", event.kind),
                    event.visible_ratio
                );
            }
        }
    }

    fn playback(&self, trigger: &str, session: &FeedSession<SimulatedPlayer>) {
        let coordinator = session.coordinator();
        let binding = coordinator.binding();
        if self.json {
            let value = serde_json::json!({
                "playback": trigger,
                "binding": binding,
                "playing": coordinator.is_playing(),
                "media": coordinator.player().media(),
            });
            println!("{value}");
        } else {
            let bound = binding
                .map(|b| format!("item={} {}", b.item_id, b.sink))
                .unwrap_or_else(|| "unbound".to_string());
            let state = if coordinator.is_playing() { "playing" } else { "paused" };
            println!("playback [{trigger}] {bound} {state}");
        }
    }

    fn cards(&self, session: &FeedSession<SimulatedPlayer>) {
        if self.json {
            return;
        }
        let bound = session.coordinator().bound_item().unwrap_or(ItemId::INVALID);
        for card in session.visible_cards() {
            let marker = match card.position.and_then(|p| session.list().items().get(p)) {
                Some(item) if item.id == bound => '>',
                _ => ' ',
            };
            println!("  {marker} #{:<3} {}", card.position.unwrap_or_default(), card.title);
        }
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default)),
        )
        .with_writer(std::io::stderr)
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Feed exposure tracking and playback simulator", long_about = None)]
struct Cli {
    /// Log at debug level unless RUST_LOG says otherwise.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Drive a simulated feed through a scroll script and print what happens.
    Simulate {
        /// TOML configuration file.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// JSON file used as the feed cache, overriding `feed.cache_path`.
        #[arg(long)]
        cache: Option<PathBuf>,
        /// Comma separated steps: drag:<px>, fling:<px>, idle, tap:<pos>,
        /// pause, more, refresh, remove:<pos>.
        #[arg(short, long, default_value = script::DEFAULT_SCRIPT)]
        script: String,
        /// Print events as JSON lines.
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML.
    Config {
        /// TOML configuration file to merge over the defaults.
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}
