use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "nightwake")]
#[command(about = concat!(
    "  .  *   .     .   *     .\n",
    "    _  _ _ ___ _  _ _____      ____ _  _ ____\n",
    "    |\\ | | | _ |__|   |   | | |__| |_/  |___\n",
    "    | \\| | |__] |  |   |   |_|_| |  | | \\_ |___\n",
    "  *    .    .  *    .   .    *\n",
    "~Fall asleep to the radio, wake up to it too~"
))]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(long_version = concat!(
    "v",
    env!("CARGO_PKG_VERSION"),
    "\nCodeName: ",
    env!("CODENAME")
))]
pub struct Cli {
    /// Disable colors
    #[arg(long, global = true)]
    pub no_color: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Manage alarms
    Alarm {
        #[command(subcommand)]
        action: AlarmAction,
    },

    /// Play internet radio
    Radio {
        #[command(subcommand)]
        action: RadioAction,
    },

    /// List favorite stations
    Stations,

    /// Stop the radio, the alarm stream or a sounding local alarm
    Stop,

    /// Stop the radio after a while, or 'off' to cancel
    Sleep {
        /// Minutes until the radio fades out, or 'off'
        #[arg(value_name = "MINUTES|off")]
        duration: String,
    },

    /// Show what is playing and the next alarm
    Status,

    /// Run the background daemon in the foreground
    Daemon,

    /// Shut the daemon down
    Kill,
}

#[derive(Subcommand)]
pub enum AlarmAction {
    /// Add an alarm
    Add {
        /// Time of day, HH:MM
        time: String,
        /// Days to repeat on: 'mon,wed,fri', 'weekdays', 'weekends', 'daily' or 'once'
        #[arg(long, short = 'd', value_name = "DAYS", default_value = "once")]
        days: String,
        /// Station to stream; without one the local alarm sounds
        #[arg(long, short = 's', value_name = "N")]
        station: Option<usize>,
    },

    /// List alarms
    List,

    /// Remove an alarm
    Remove {
        #[arg(value_parser = clap::value_parser!(usize))]
        id: usize,
    },

    /// Show when the next alarm goes off
    Next,

    /// Sound an alarm now
    Test {
        /// Station to stream; without one the local alarm sounds
        #[arg(long, short = 's', value_name = "N")]
        station: Option<usize>,
    },
}

#[derive(Subcommand)]
pub enum RadioAction {
    /// Play a favorite station
    Play {
        #[arg(value_parser = clap::value_parser!(usize))]
        station: usize,
    },

    /// Switch to the next favorite station
    Next,
}
