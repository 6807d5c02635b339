//! Line-oriented front end for the emulator supervisor.
//!
//! Reads operator commands from stdin and drives one `EmulatorSupervisor`.
//! The settings file is only ever read, and is re-read on every `start` so
//! edits made between runs take effect.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::io::{AsyncBufReadExt, BufReader};
use xqemu_manager::{
    CommandLine, EmulatorSupervisor, QmpOptions, RetryPolicy, SupervisorOptions, init_logging,
    load_settings,
};
use xqemu_shared::constants::{files, process, qmp};

#[derive(Debug, Parser)]
#[command(name = "xqemu-manager", version, about = "Launch and control the xqemu emulator")]
struct Args {
    /// Settings file (JSON). Missing file means built-in defaults.
    #[arg(long, default_value = files::SETTINGS)]
    settings: PathBuf,

    /// Loopback port for the emulator's QMP listener.
    #[arg(long, default_value_t = qmp::PORT)]
    qmp_port: u16,

    /// Connection attempts before giving up on a freshly started emulator.
    #[arg(long, default_value_t = qmp::CONNECT_ATTEMPTS)]
    connect_attempts: u32,

    /// Pause between connection attempts, in milliseconds.
    #[arg(long, default_value_t = qmp::CONNECT_DELAY.as_millis() as u64)]
    connect_delay_ms: u64,

    /// Also write logs to a daily rolling file in this directory.
    #[arg(long)]
    log_dir: Option<PathBuf>,

    /// Validate the settings, print the emulator command line and exit.
    #[arg(long)]
    print_command: bool,
}

impl Args {
    fn supervisor_options(&self) -> SupervisorOptions {
        SupervisorOptions {
            qmp: QmpOptions {
                port: self.qmp_port,
                retry: RetryPolicy::new(
                    self.connect_attempts,
                    Duration::from_millis(self.connect_delay_ms),
                ),
                ..QmpOptions::default()
            },
            stop_grace_period: process::STOP_GRACE_PERIOD,
        }
    }
}

/// One operator command.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Start,
    Stop,
    Pause,
    Restart,
    Screenshot(PathBuf),
    Status,
    Help,
    Quit,
}

impl Command {
    fn parse(line: &str) -> Option<Result<Self, String>> {
        let mut words = line.split_whitespace();
        let verb = words.next()?;
        let rest: Vec<&str> = words.collect();

        let command = match (verb, rest.as_slice()) {
            ("start", []) => Self::Start,
            ("stop", []) => Self::Stop,
            ("pause", []) => Self::Pause,
            ("restart", []) => Self::Restart,
            ("screenshot", []) => Self::Screenshot(PathBuf::from(files::SCREENSHOT)),
            ("screenshot", [path]) => Self::Screenshot(PathBuf::from(path)),
            ("status", []) => Self::Status,
            ("help", []) => Self::Help,
            ("quit" | "exit", []) => Self::Quit,
            _ => return Some(Err(format!("unrecognised command: {}", line.trim()))),
        };
        Some(Ok(command))
    }
}

const HELP: &str = "\
commands:
  start                 launch the emulator
  stop                  terminate the emulator
  pause                 pause or resume emulation
  restart               reset the emulated machine
  screenshot [path]     save the current frame (default screenshot.ppm)
  status                show emulator status
  quit                  stop the emulator and exit";

async fn run(supervisor: &mut EmulatorSupervisor, settings: &Path, command: Command) -> Result<()> {
    match command {
        Command::Start => {
            let config = load_settings(settings)
                .with_context(|| format!("loading settings from {}", settings.display()))?;
            supervisor.start(&config).await?;
        }
        Command::Stop => supervisor.stop().await,
        Command::Pause => supervisor.toggle_pause().await?,
        Command::Restart => supervisor.restart().await?,
        Command::Screenshot(path) => supervisor.screenshot(&path).await?,
        Command::Status => {
            let alive = supervisor.is_alive();
            match supervisor.pid() {
                Some(pid) => println!("{} (pid {}, alive: {})", supervisor.status(), pid, alive),
                None => println!("{}", supervisor.status()),
            }
        }
        Command::Help => println!("{}", HELP),
        Command::Quit => {}
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let _log_guard = init_logging(args.log_dir.as_deref())?;
    let options = args.supervisor_options();

    if args.print_command {
        let config = load_settings(&args.settings)?
            .validate()
            .context("settings are not launchable")?;
        println!("{}", CommandLine::build(&config, options.qmp.port));
        return Ok(());
    }

    let mut supervisor = EmulatorSupervisor::new(options);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    println!("{}", HELP);

    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Interrupted");
                None
            }
        };
        let Some(line) = line else {
            break;
        };

        let command = match Command::parse(&line) {
            None => continue,
            Some(Ok(command)) => command,
            Some(Err(message)) => {
                eprintln!("{}", message);
                continue;
            }
        };
        if command == Command::Quit {
            break;
        }
        if let Err(e) = run(&mut supervisor, &args.settings, command).await {
            eprintln!("error: {:#}", e);
        }
    }

    supervisor.stop().await;
    Ok(())
}
