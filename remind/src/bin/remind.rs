// remind: CLI for managing alerts
//
// Commands:
//   remind new <timespec> <message...> [--repeat] [--id <n>]
//   remind change <id> <timespec> <message...> [--repeat]
//   remind delete <id>
//   remind list [id] [--json]
//   remind status

use anyhow::{Context, Result};
use chrono::Local;
use clap::{Parser, Subcommand};
use crossterm::style::Stylize;
use remind_lib::alerts::{
    config::Config,
    ops::{self, NewAlert},
    record::{AlertId, AlertMode, AlertRecord},
    store::AlertStore,
    timespec::{parse_timestamp, Recurrence},
};
use std::path::PathBuf;

/// Schedule one-shot and recurring alerts.
#[derive(Parser)]
#[command(
    name = "remind",
    version,
    about,
    after_help = TIMESPEC_HELP
)]
struct Cli {
    /// Alert file to use instead of ~/.remind/alerts
    #[arg(short, long, global = true, env = "REMIND_FILE")]
    file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Create a new alert
    New {
        /// When to fire (quote values that contain spaces)
        timespec: Option<String>,
        /// Alert message (put it after `--` if it starts with '-')
        message: Vec<String>,
        /// Treat the timespec as a recurrence expression
        #[arg(short, long)]
        repeat: bool,
        /// Use this id instead of the next free one
        #[arg(long)]
        id: Option<AlertId>,
    },
    /// Replace an alert's time and message, keeping its id
    Change {
        id: AlertId,
        timespec: Option<String>,
        message: Vec<String>,
        #[arg(short, long)]
        repeat: bool,
    },
    /// Delete an alert
    #[command(visible_alias = "rm")]
    Delete { id: AlertId },
    /// List alerts, or show one by id
    #[command(visible_alias = "ls")]
    List {
        id: Option<AlertId>,
        /// Output in JSON format
        #[arg(long)]
        json: bool,
    },
    /// Show whether the daemon is running
    Status,
}

const TIMESPEC_HELP: &str = r#"TIMESPECS:
    One-shot:   "2024-06-01 09:30", "17:45", "tomorrow 08:00", +15m, "in 2 hours"
    Recurring:  "daily 08:00", "weekdays 09:00", "mon,thu 18:30", friday, "1 may 20:00"

EXAMPLES:
    remind new "tomorrow 09:00" call the dentist
    remind new "fri 16:00" write weekly report --repeat
    remind new +10m -- -20% coupon expires
    remind change 3 +30m stretch
    remind list
    remind delete 3"#;

fn main() -> Result<()> {
    remind_lib::logging::init(remind_lib::logging::CLI_FILTER);
    let cli = Cli::parse();

    let mut config = Config::from_env();
    if let Some(file) = cli.file {
        config.alerts_file = file;
    }
    let store = AlertStore::new(&config.alerts_file);

    match cli.command {
        Command::New {
            timespec,
            message,
            repeat,
            id,
        } => {
            let alert = NewAlert {
                timespec: timespec.unwrap_or_default(),
                message: message.join(" "),
                repeat,
                id,
            };
            let id = ops::new_alert(&store, alert, Local::now().naive_local())
                .context("Failed to create alert")?;
            println!("Created alert {}", id);
        }
        Command::Change {
            id,
            timespec,
            message,
            repeat,
        } => {
            let id = ops::change_alert(
                &store,
                id,
                &timespec.unwrap_or_default(),
                &message.join(" "),
                repeat,
                Local::now().naive_local(),
            )
            .with_context(|| format!("Failed to change alert {}", id))?;
            println!("Updated alert {}", id);
        }
        Command::Delete { id } => {
            if ops::delete_alert(&store, id).context("Failed to delete alert")? {
                println!("Deleted alert {}", id);
            } else {
                eprintln!("No alert with id {}", id);
                std::process::exit(1);
            }
        }
        Command::List { id, json } => {
            let records = match id {
                Some(id) => match ops::get_alert(&store, id).context("Failed to read alerts")? {
                    Some(record) => vec![record],
                    None => {
                        eprintln!("No alert with id {}", id);
                        std::process::exit(1);
                    }
                },
                None => ops::list_alerts(&store).context("Failed to read alerts")?,
            };

            if json {
                println!("{}", serde_json::to_string_pretty(&records)?);
            } else {
                print_records(&records);
            }
        }
        Command::Status => print_status(&config, &store)?,
    }

    Ok(())
}

fn describe_when(record: &AlertRecord) -> String {
    match record.mode {
        AlertMode::OneShot => match parse_timestamp(&record.when) {
            Ok(at) => at.format("%a %d %b %Y %H:%M").to_string(),
            Err(_) => format!("{} (invalid)", record.when),
        },
        AlertMode::Recurring => match record.when.parse::<Recurrence>() {
            Ok(recurrence) => recurrence.to_string(),
            Err(_) => format!("{} (invalid)", record.when),
        },
    }
}

fn print_records(records: &[AlertRecord]) {
    if records.is_empty() {
        println!("No alerts");
        return;
    }

    for record in records {
        let mode = match record.mode {
            AlertMode::OneShot => "once  ".cyan(),
            AlertMode::Recurring => "repeat".magenta(),
        };
        println!(
            "{:>4}  {}  {:<28}  {}",
            record.id.to_string().bold(),
            mode,
            describe_when(record),
            record.message
        );
    }
}

fn print_status(config: &Config, store: &AlertStore) -> Result<()> {
    if config.is_daemon_running() {
        let pid = config
            .read_pid()
            .map(|p| p.to_string())
            .unwrap_or_else(|| "?".to_string());
        println!("Daemon: {} (pid {})", "running".green(), pid);
    } else {
        println!("Daemon: {}", "not running".red());
    }

    let records = store.list().context("Failed to read alerts")?;
    let one_shot = records.iter().filter(|r| r.is_one_shot()).count();
    println!("Alert file: {}", store.path().display());
    println!(
        "Alerts: {} ({} one-shot, {} recurring)",
        records.len(),
        one_shot,
        records.len() - one_shot
    );

    let next = records
        .iter()
        .filter(|r| r.is_one_shot())
        .filter_map(|r| parse_timestamp(&r.when).ok().map(|at| (at, r)))
        .min_by_key(|(at, _)| *at);
    if let Some((at, record)) = next {
        println!(
            "Next one-shot: #{} at {} - {}",
            record.id,
            at.format("%Y-%m-%d %H:%M"),
            record.message
        );
    }

    Ok(())
}
