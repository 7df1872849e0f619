use std::fs;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use downwatch_core::{EventKind, Monitor, MonitorEvent, MonitorInfo, MonitorOptions};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

mod control;
mod viewer;

use control::ControlCommand;

#[derive(Debug, Parser)]
#[command(name = "downwatch")]
#[command(about = "Periodic HTTP endpoint availability monitor")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    #[arg(long)]
    url: String,

    #[arg(long)]
    interval_ms: Option<u64>,

    #[arg(long)]
    timeout_ms: Option<u64>,

    #[arg(long)]
    retries: Option<u32>,

    /// Extra request header, e.g. `--header "Cache-Control: no-cache"`. Repeatable.
    #[arg(long = "header", value_name = "NAME: VALUE")]
    headers: Vec<String>,

    /// JSON options file; flags given on the command line win.
    #[arg(long)]
    options: Option<PathBuf>,
}

#[derive(Debug, Subcommand)]
enum Command {
    Once {
        #[arg(long, value_enum, default_value = "json")]
        format: OutputFormat,
    },
    Run {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
        /// Only print these event kinds (comma separated).
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
    },
    Watch {
        #[arg(long, value_enum, default_value = "human")]
        format: OutputFormat,
        #[arg(long, value_delimiter = ',')]
        only: Vec<String>,
    },
    View {
        #[arg(long, default_value_t = 180.0)]
        window_sec: f64,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Human,
    Json,
    Ndjson,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();
    let options = build_options(&cli)?;
    let monitor = Monitor::new(cli.url.clone(), options)?;

    match cli.command {
        Command::Once { format } => {
            if let Some(event) = monitor.check().await {
                print_event(&event, format)?;
            }
            print_infos(&monitor.infos(), format)?;
        }
        Command::Run { format, only } | Command::Watch { format, only } => {
            let only = only
                .iter()
                .map(|name| name.parse::<EventKind>())
                .collect::<Result<Vec<_>, _>>()?;
            stream_loop(&monitor, format, &only).await?;
        }
        Command::View { window_sec } => {
            viewer::run_viewer(&monitor, window_sec).await?;
        }
    }

    Ok(())
}

fn build_options(cli: &Cli) -> Result<MonitorOptions> {
    let mut options = match &cli.options {
        Some(path) => {
            let raw = fs::read_to_string(path)
                .with_context(|| format!("failed to read options file {}", path.display()))?;
            let doc: serde_json::Value = serde_json::from_str(&raw)
                .with_context(|| format!("options file {} is not valid JSON", path.display()))?;
            MonitorOptions::from_value(&doc)?
        }
        None => MonitorOptions::default(),
    };

    if let Some(ms) = cli.interval_ms {
        options = options.with_interval(Duration::from_millis(ms));
    }
    if let Some(ms) = cli.timeout_ms {
        options = options.with_timeout(Duration::from_millis(ms));
    }
    if let Some(retries) = cli.retries {
        options = options.with_retries(retries);
    }
    for header in &cli.headers {
        let Some((name, value)) = header.split_once(':') else {
            bail!("header {header:?} should look like \"Name: value\"");
        };
        options = options.with_header(name.trim(), value.trim());
    }

    Ok(options)
}

async fn stream_loop(monitor: &Monitor, format: OutputFormat, only: &[EventKind]) -> Result<()> {
    let mut events = monitor.subscribe();
    monitor.start()?;
    info!(url = %monitor.infos().url, "watching, type `help` for runtime commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                warn!("received ctrl-c, stopping");
                monitor.stop();
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                if only.is_empty() || only.contains(&event.kind()) {
                    print_event(&event, format)?;
                }
            }
            line = lines.next_line(), if stdin_open => {
                match line {
                    Ok(Some(line)) => {
                        if !apply_control(monitor, &line, format)? {
                            monitor.stop();
                            break;
                        }
                    }
                    Ok(None) => stdin_open = false,
                    Err(err) => {
                        warn!(%err, "stdin closed, runtime commands disabled");
                        stdin_open = false;
                    }
                }
            }
        }
    }

    Ok(())
}

/// Returns `false` when the user asked to quit.
fn apply_control(monitor: &Monitor, line: &str, format: OutputFormat) -> Result<bool> {
    let command = match control::parse_command(line) {
        Ok(Some(command)) => command,
        Ok(None) => return Ok(true),
        Err(err) => {
            error!(%err, "command rejected");
            return Ok(true);
        }
    };

    let applied = match command {
        ControlCommand::Interval(interval) => monitor.set_interval(interval),
        ControlCommand::Url(url) => monitor.set_url(url),
        ControlCommand::Start => monitor.start(),
        ControlCommand::Stop => {
            monitor.stop();
            Ok(())
        }
        ControlCommand::Restart => monitor.restart(),
        ControlCommand::Infos => {
            print_infos(&monitor.infos(), format)?;
            Ok(())
        }
        ControlCommand::Help => {
            println!("{}", control::HELP);
            Ok(())
        }
        ControlCommand::Quit => return Ok(false),
    };

    if let Err(err) = applied {
        error!(%err, "command rejected");
    }
    Ok(true)
}

fn print_event(event: &MonitorEvent, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(event)?),
        OutputFormat::Ndjson => println!("{}", serde_json::to_string(event)?),
        OutputFormat::Human => match event {
            MonitorEvent::Up(up) => println!(
                "[{}] UP      {} {}  ping={}  uptime={}  {}",
                up.ts.format("%Y-%m-%d %H:%M:%S"),
                up.status_code.map_or("-".to_string(), |c| c.to_string()),
                up.status_text.as_deref().unwrap_or(""),
                fmt_ms(up.ping),
                fmt_ms(up.uptime),
                up.url
            ),
            MonitorEvent::Outage(outage) => println!(
                "[{}] OUTAGE  {} {}  last_ping={}  down_for={}ms  {}",
                outage.ts.format("%Y-%m-%d %H:%M:%S"),
                outage.status_code.map_or("-".to_string(), |c| c.to_string()),
                outage.status_text.as_deref().unwrap_or(""),
                fmt_ms(outage.ping),
                outage.unavailability,
                outage.url
            ),
            MonitorEvent::Error(err) => println!("[{}] ERROR   {err}", now()),
            MonitorEvent::Restart => println!("[{}] RESTART", now()),
            MonitorEvent::Stopped { reason } => println!("[{}] STOPPED {reason}", now()),
        },
    }

    Ok(())
}

fn print_infos(infos: &MonitorInfo, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(infos)?),
        OutputFormat::Ndjson => println!("{}", serde_json::to_string(infos)?),
        OutputFormat::Human => {
            println!("=== Monitor ===");
            println!("URL:         {}", infos.url);
            println!(
                "Schedule:    interval={}ms timeout={}ms retries={} running={}",
                infos.interval, infos.timeout, infos.retries, infos.running
            );
            println!(
                "State:       available={} failures={}",
                infos
                    .available
                    .map_or("unknown".to_string(), |a| a.to_string()),
                infos.consecutive_failures
            );
            println!(
                "Metrics:     ping={} uptime={} unavailability={}",
                fmt_ms(infos.ping),
                fmt_ms(infos.uptime),
                fmt_ms(infos.unavailability)
            );
        }
    }

    Ok(())
}

fn fmt_ms(value: Option<u64>) -> String {
    value.map_or("n/a".to_string(), |ms| format!("{ms}ms"))
}

fn now() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M:%S").to_string()
}
