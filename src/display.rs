//! Terminal output formatting
//!
//! Handles colored output for alarms, stations and daemon status

use chrono::{DateTime, Local, TimeZone};
use colored::*;

use nightwake_core::{AlarmDefinition, RadioStation};
use nightwake_stream::StreamingMode;
use nightwake_stream::ipc::StatusReport;

/// Check if terminal supports colors
pub fn supports_color() -> bool {
    atty::is(atty::Stream::Stdout)
}

/// "today 07:30", "tomorrow 07:30" or "Mon 12 Oct 07:30"
pub fn format_trigger<Tz: TimeZone>(trigger: &DateTime<Tz>, now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let days = trigger
        .date_naive()
        .signed_duration_since(now.date_naive())
        .num_days();
    let time = trigger.format("%H:%M");
    match days {
        0 => format!("today {time}"),
        1 => format!("tomorrow {time}"),
        _ => format!("{}", trigger.format("%a %d %b %H:%M")),
    }
}

/// One line of `alarm list`
pub fn format_alarm(
    id: usize,
    alarm: &AlarmDefinition,
    next: &DateTime<Local>,
    use_color: bool,
) -> String {
    let id_str = if use_color {
        format!("[{}]", id).cyan().to_string()
    } else {
        format!("[{}]", id)
    };
    let when = format!("(next: {})", format_trigger(next, &Local::now()));
    let when = if use_color {
        when.yellow().to_string()
    } else {
        when
    };
    format!("{} {} {}", id_str, alarm, when)
}

/// One line of `stations`
pub fn format_station(index: usize, station: &RadioStation, use_color: bool) -> String {
    let id_str = if use_color {
        format!("[{}]", index).cyan().to_string()
    } else {
        format!("[{}]", index)
    };
    let name = if use_color {
        station.name.bold().to_string()
    } else {
        station.name.clone()
    };
    format!("{} {} {}", id_str, name, station.stream)
}

/// Multi-line status block
pub fn format_status(report: &StatusReport, use_color: bool) -> String {
    let session = &report.session;
    let mode = match session.mode {
        StreamingMode::Inactive if session.fallback_sounding => "local alarm".to_string(),
        mode => mode.to_string(),
    };
    let mode = if !use_color {
        mode
    } else {
        match session.mode {
            StreamingMode::Alarm => mode.red().bold().to_string(),
            StreamingMode::Radio => mode.green().bold().to_string(),
            StreamingMode::Inactive if session.fallback_sounding => mode.red().bold().to_string(),
            StreamingMode::Inactive => mode.normal().to_string(),
        }
    };

    let mut lines = vec![format!("Mode: {}", mode)];

    if let Some(index) = session.station_index {
        let name = session.station_name.as_deref().unwrap_or("(not configured)");
        let state = if session.ready {
            format!("{:.0}%", session.volume * 100.0)
        } else {
            "connecting".to_string()
        };
        lines.push(format!("Station: [{}] {} ({})", index, name, state));
    }

    if let Some(title) = &session.metadata {
        lines.push(format!("Now playing: {}", title));
    }

    let now = Local::now();
    if let Some(at) = session
        .sleep_deadline_epoch_ms
        .and_then(|ms| Local.timestamp_millis_opt(ms).single())
    {
        lines.push(format!("Sleep: {}", format_trigger(&at, &now)));
    }

    match &report.next_alarm {
        Some(next) => {
            let when = Local
                .timestamp_millis_opt(next.trigger_epoch_ms)
                .single()
                .map(|at| format_trigger(&at, &now))
                .unwrap_or_default();
            lines.push(format!("Next alarm: {} ({})", when, next.alarm));
        }
        None => lines.push("Next alarm: none".to_string()),
    }

    lines.join("\n")
}
