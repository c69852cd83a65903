use std::fs::OpenOptions;
use std::sync::Mutex;

use chrono::{Local, TimeDelta};
use clap::Parser;
use directories::BaseDirs;
use tracing_subscriber::EnvFilter;

use nightwake_core::{AlarmDefinition, CoreError, TimeOfDay, WeekdayMask, next_from_list};
use nightwake_stream::NightwakeConfig;
use nightwake_stream::client::{send_command, send_if_running};
use nightwake_stream::config;
use nightwake_stream::daemon::run_daemon;
use nightwake_stream::ipc::{DaemonCommand, DaemonResponse};

use crate::cli::{AlarmAction, Cli, Commands, RadioAction};
use crate::error::{CliError, Result};

mod cli;
mod display;
mod error;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let is_daemon = matches!(cli.command, Commands::Daemon);
    init_logging(is_daemon);

    let mut cfg = config::load()?;

    let use_color = !cli.no_color && display::supports_color();
    if !use_color {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Alarm { action } => match action {
            AlarmAction::Add {
                time,
                days,
                station,
            } => {
                if let Some(index) = station {
                    cfg.stations.get_or_err(index)?;
                }
                let alarm = AlarmDefinition::new(TimeOfDay::parse(&time)?)
                    .with_days(WeekdayMask::parse(&days)?)
                    .with_station(station);
                cfg.alarms.push(alarm);
                save_and_reload(&cfg).await?;
                println!("Alarm #{} saved: {}", cfg.alarms.len() - 1, alarm);
            }
            AlarmAction::List => {
                if cfg.alarms.is_empty() {
                    println!("No alarms configured.");
                } else {
                    let now = Local::now();
                    for (id, alarm) in cfg.alarms.iter().enumerate() {
                        let next = alarm.next_trigger(&now);
                        println!("{}", display::format_alarm(id, alarm, &next, use_color));
                    }
                }
            }
            AlarmAction::Remove { id } => {
                if id >= cfg.alarms.len() {
                    return Err(CoreError::AlarmNotFound(id).into());
                }
                let removed = cfg.alarms.remove(id);
                save_and_reload(&cfg).await?;
                println!("Removed alarm: {}", removed);
            }
            AlarmAction::Next => {
                let now = Local::now();
                match next_from_list(&cfg.alarms, &now) {
                    Some(alarm) => {
                        let trigger = alarm.next_trigger(&now);
                        println!(
                            "Next alarm {} ({})",
                            display::format_trigger(&trigger, &now),
                            alarm
                        );
                    }
                    None => println!("No alarms configured."),
                }
            }
            AlarmAction::Test { station } => {
                let reply = request(DaemonCommand::StartAlarm { station }, &cfg).await?;
                println!("{}", reply);
            }
        },
        Commands::Radio { action } => {
            let cmd = match action {
                RadioAction::Play { station } => {
                    cfg.stations.get_or_err(station)?;
                    DaemonCommand::StartRadio { station }
                }
                RadioAction::Next => DaemonCommand::NextStation,
            };
            let reply = request(cmd, &cfg).await?;
            println!("{}", reply);
        }
        Commands::Stations => {
            if cfg.stations.is_empty() {
                println!("No stations configured.");
            } else {
                for (index, station) in cfg.stations.iter() {
                    println!("{}", display::format_station(index, station, use_color));
                }
            }
        }
        Commands::Stop => match send_if_running(DaemonCommand::Stop, &cfg.timing).await {
            Ok(response) => println!("{}", reply_text(response)?),
            Err(_) => println!("Nothing is playing."),
        },
        Commands::Sleep { duration } => {
            let deadline_epoch_ms = parse_sleep(&duration)?;
            let reply = request(DaemonCommand::SetSleep { deadline_epoch_ms }, &cfg).await?;
            println!("{}", reply);
        }
        Commands::Status => match send_command(DaemonCommand::Status, &cfg.timing).await? {
            DaemonResponse::Status(report) => {
                println!("{}", display::format_status(&report, use_color));
            }
            other => {
                reply_text(other)?;
            }
        },
        Commands::Kill => match send_if_running(DaemonCommand::Kill, &cfg.timing).await {
            Ok(_) => println!("Daemon stopped."),
            Err(_) => println!("Daemon is not running."),
        },
        Commands::Daemon => run_daemon(cfg).await?,
    }

    Ok(())
}

/// Daemon logs go to a file in the cache dir, everything else to stderr
fn init_logging(is_daemon: bool) {
    let default_level = if is_daemon { "info" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| default_level.into());

    let log_file = is_daemon
        .then(|| {
            let dir = BaseDirs::new()?.cache_dir().join("nightwake");
            std::fs::create_dir_all(&dir).ok()?;
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(dir.join("daemon.log"))
                .ok()
        })
        .flatten();

    match log_file {
        Some(file) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(Mutex::new(file))
            .with_ansi(false)
            .init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .init(),
    }
}

/// Send a command, starting the daemon if needed, and return its reply text
async fn request(cmd: DaemonCommand, cfg: &NightwakeConfig) -> Result<String> {
    reply_text(send_command(cmd, &cfg.timing).await?)
}

fn reply_text(response: DaemonResponse) -> Result<String> {
    match response {
        DaemonResponse::Ok(message) => Ok(message),
        DaemonResponse::Error(message) => Err(CliError::Refused(message)),
        DaemonResponse::Pong => Ok("pong".to_string()),
        DaemonResponse::Status(_) => Ok(String::new()),
    }
}

/// Persist the config and let a running daemon pick it up
async fn save_and_reload(cfg: &NightwakeConfig) -> Result<()> {
    config::store(cfg)?;
    if let Err(e) = send_if_running(DaemonCommand::Reload, &cfg.timing).await {
        tracing::debug!("daemon not reloaded: {}", e);
    }
    Ok(())
}

/// Minutes from now as an epoch deadline, or `None` for "off"
fn parse_sleep(input: &str) -> Result<Option<i64>> {
    let input = input.trim();
    if input.eq_ignore_ascii_case("off") {
        return Ok(None);
    }
    let minutes = input
        .parse::<i64>()
        .ok()
        .filter(|m| *m > 0)
        .ok_or_else(|| CliError::InvalidSleep(input.to_string()))?;
    let deadline = Local::now() + TimeDelta::minutes(minutes);
    Ok(Some(deadline.timestamp_millis()))
}
