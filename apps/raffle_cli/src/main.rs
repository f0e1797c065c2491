use std::{path::PathBuf, process::ExitCode};

use anyhow::{bail, Context, Result};
use clap::Parser;
use raffle_core::{RaffleController, RaffleOptions};
use shared::{
    domain::Participant,
    error::{ErrorCode, RaffleError},
    protocol::{DrawRecord, RaffleEvent},
};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, read_participants_file, Settings};

#[derive(Parser, Debug)]
#[command(name = "raffle", about = "Count down, then draw raffle winners")]
struct Args {
    /// Repeatable; replaces participants from the config file.
    #[arg(long = "participant", value_name = "ID")]
    participants: Vec<String>,
    /// One participant per line.
    #[arg(long)]
    participants_file: Option<PathBuf>,
    #[arg(long)]
    winners: Option<usize>,
    #[arg(long)]
    countdown_ms: Option<u64>,
    #[arg(long)]
    seed: Option<u64>,
    #[arg(long, default_value = "raffle.toml")]
    config: PathBuf,
    /// Print the draw record as JSON instead of a winner list.
    #[arg(long)]
    json: bool,
}

fn resolve_settings(args: &Args, mut settings: Settings) -> Result<Settings> {
    let mut participants: Vec<Participant> = args
        .participants
        .iter()
        .filter_map(|raw| Participant::parse_entry(raw))
        .collect();
    if let Some(path) = &args.participants_file {
        let from_file = read_participants_file(path)
            .with_context(|| format!("failed to load participants from '{}'", path.display()))?;
        participants.extend(from_file);
    }
    if !participants.is_empty() {
        settings.participants = participants;
    }

    if let Some(winners) = args.winners {
        settings.winner_count = winners;
    }
    if let Some(countdown_ms) = args.countdown_ms {
        settings.countdown_ms = countdown_ms;
    }
    if args.seed.is_some() {
        settings.seed = args.seed;
    }

    if settings.participants.is_empty() {
        return Err(RaffleError::NoParticipants.into());
    }
    Ok(settings)
}

fn build_options(settings: Settings) -> RaffleOptions {
    let participant_count = settings.participants.len();
    let mut options = RaffleOptions::new(settings.participants)
        .winner_count(settings.winner_count)
        .countdown_ms(settings.countdown_ms)
        .on_start(move || println!("Drawing from {participant_count} participants..."))
        .on_finish(|winners| info!(count = winners.len(), "winners announced"));
    if let Some(seed) = settings.seed {
        options = options.seed(seed);
    }
    options
}

async fn wait_for_draw(events: &mut broadcast::Receiver<RaffleEvent>) -> Result<DrawRecord> {
    loop {
        match events.recv().await {
            Ok(RaffleEvent::Started { countdown_ms }) => print_remaining(countdown_ms),
            Ok(RaffleEvent::Tick { remaining_ms }) => print_remaining(remaining_ms),
            Ok(RaffleEvent::Finished { record }) => return Ok(record),
            Ok(RaffleEvent::Reset) => bail!("raffle was reset before the draw"),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "countdown display fell behind"),
            Err(RecvError::Closed) => bail!("raffle controller went away before the draw"),
        }
    }
}

fn print_remaining(remaining_ms: u64) {
    if remaining_ms > 0 {
        println!("{}...", remaining_ms.div_ceil(1000));
    }
}

fn print_record(record: &DrawRecord, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(record)?);
        return Ok(());
    }

    println!(
        "Winners ({} of {}):",
        record.winners.len(),
        record.participant_count
    );
    for (place, winner) in record.winners.iter().enumerate() {
        println!("  {}. {winner}", place + 1);
    }
    Ok(())
}

/// sysexits-style status for failures the CLI can classify.
fn exit_status(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<RaffleError>().map(RaffleError::code) {
        Some(ErrorCode::Empty) => 66,
        Some(ErrorCode::Io) => 74,
        Some(ErrorCode::Validation) => 78,
        None => 1,
    }
}

async fn run(args: Args) -> Result<()> {
    let settings = load_settings(&args.config)
        .with_context(|| format!("failed to load settings from '{}'", args.config.display()))?;
    let settings = resolve_settings(&args, settings)?;

    let controller = RaffleController::new(build_options(settings));
    let mut events = controller.subscribe_events();
    controller.start_raffle();

    tokio::select! {
        record = wait_for_draw(&mut events) => print_record(&record?, args.json),
        signal = tokio::signal::ctrl_c() => {
            signal.context("failed to listen for ctrl-c")?;
            controller.dispose();
            warn!("interrupted; draw abandoned");
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match run(Args::parse()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::from(exit_status(&err))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(std::iter::once("raffle").chain(argv.iter().copied()))
            .expect("args")
    }

    #[test]
    fn flags_override_file_settings() {
        let args = parse(&[
            "--participant",
            "ann",
            "--participant",
            "12",
            "--winners",
            "2",
            "--countdown-ms",
            "0",
            "--seed",
            "5",
        ]);
        let file = Settings {
            participants: vec![Participant::from("zed")],
            winner_count: 4,
            ..Settings::default()
        };

        let settings = resolve_settings(&args, file).expect("resolve");
        assert_eq!(
            settings.participants,
            vec![Participant::from("ann"), Participant::from(12_i64)]
        );
        assert_eq!(settings.winner_count, 2);
        assert_eq!(settings.countdown_ms, 0);
        assert_eq!(settings.seed, Some(5));
    }

    #[test]
    fn file_participants_survive_when_no_flags_given() {
        let args = parse(&[]);
        let file = Settings {
            participants: vec![Participant::from("zed")],
            ..Settings::default()
        };
        let settings = resolve_settings(&args, file).expect("resolve");
        assert_eq!(settings.participants, vec![Participant::from("zed")]);
        assert_eq!(settings.winner_count, 1);
        assert_eq!(args.config, PathBuf::from("raffle.toml"));
    }

    #[test]
    fn refuses_to_run_without_participants() {
        let err = resolve_settings(&parse(&[]), Settings::default()).expect_err("empty");
        assert!(matches!(
            err.downcast_ref::<RaffleError>(),
            Some(RaffleError::NoParticipants)
        ));
    }

    #[test]
    fn exit_status_follows_error_code() {
        let empty = resolve_settings(&parse(&[]), Settings::default()).expect_err("empty");
        assert_eq!(exit_status(&empty), 66);

        let args = parse(&["--participants-file", "/nonexistent/raffle/entrants.txt"]);
        let missing = resolve_settings(&args, Settings::default()).expect_err("missing file");
        assert_eq!(exit_status(&missing), 74);

        let invalid = anyhow::Error::from(RaffleError::invalid_settings("raffle.toml", "bad"))
            .context("failed to load settings");
        assert_eq!(exit_status(&invalid), 78);

        assert_eq!(exit_status(&anyhow::anyhow!("ctrl-c listener failed")), 1);
    }

    #[test]
    fn build_options_carries_seed_and_counts() {
        let options = build_options(Settings {
            participants: vec![Participant::from("a"), Participant::from("b")],
            winner_count: 2,
            countdown_ms: 1000,
            seed: Some(3),
        });
        assert_eq!(options.winner_count, 2);
        assert_eq!(options.countdown_ms, 1000);
        assert_eq!(options.seed, Some(3));
        assert!(options.on_start.is_some() && options.on_finish.is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn wait_for_draw_returns_the_record() {
        let controller = RaffleController::new(
            RaffleOptions::new(["a", "b", "c"])
                .winner_count(2)
                .countdown_ms(2000),
        );
        let mut events = controller.subscribe_events();
        controller.start_raffle();

        let record = wait_for_draw(&mut events).await.expect("record");
        assert_eq!(record.winners.len(), 2);
        assert_eq!(record.participant_count, 3);
        assert_eq!(Some(record), controller.last_draw());
    }

    #[tokio::test(start_paused = true)]
    async fn reset_before_draw_is_reported() {
        let controller = RaffleController::new(RaffleOptions::new(["a"]));
        let mut events = controller.subscribe_events();
        controller.start_raffle();
        controller.reset_raffle();

        let err = wait_for_draw(&mut events).await.expect_err("reset");
        assert!(err.to_string().contains("reset"));
    }
}
