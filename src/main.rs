//! Booth kiosk console
//!
//! Runs the show-control core without the touchscreen UI: slides can be
//! browsed, edited and played back from a terminal while the show hardware
//! follows along.
//!
//! # Usage
//!
//! ```bash
//! # Interactive console with hardware
//! messe-stand run --config kiosk.toml
//!
//! # Same, without touching any serial port
//! messe-stand run --no-hardware
//!
//! # List serial ports (requires serial feature)
//! messe-stand ports
//!
//! # Export the current deck
//! messe-stand export backup/slides.toml
//!
//! # Send one raw command to a controller
//! messe-stand send esp32_1 SIGNAL:page_2:1
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use messe_stand::config::KioskConfig;
use messe_stand::content::{ContentStore, SlideFormat, SlideId};
use messe_stand::demo::DemoScheduler;
use messe_stand::events::SlideEvent;
use messe_stand::hardware::{ConnectionStatus, DeviceRegistry, SystemPortOpener};
use messe_stand::presentation::PresentationState;

/// Booth kiosk show control
#[derive(Parser)]
#[command(name = "messe-stand")]
#[command(author = "Prasanna Gautam")]
#[command(version = "0.1.0")]
#[command(about = "Slide playback and show hardware control for the booth kiosk")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (TOML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    debug: bool,

    /// Do not open any serial port
    #[arg(long, global = true)]
    no_hardware: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive console
    Run,

    /// List available serial ports
    #[cfg(feature = "serial")]
    Ports {
        /// Only show ports that look like booth controllers
        #[arg(long)]
        controllers: bool,
    },

    /// Write the current deck to a file (.json or .toml)
    Export {
        /// Output path
        path: PathBuf,
    },

    /// Send one raw command line to a configured device
    Send {
        /// Device key (esp32_1, esp32_2, esp32_3, dispatcher)
        device: String,

        /// Command to send, e.g. SIGNAL:page_1:1
        command: String,
    },
}

fn main() {
    if let Err(e) = try_main() {
        eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
        std::process::exit(1);
    }
}

fn try_main() -> Result<()> {
    let cli = Cli::parse();
    let config = KioskConfig::load_or_default(cli.config.as_deref())?;

    let level = if cli.debug {
        "debug"
    } else {
        config.logging.level.as_str()
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Commands::Run => run_console(&config, cli.no_hardware),
        #[cfg(feature = "serial")]
        Commands::Ports { controllers } => print_ports(controllers),
        Commands::Export { path } => export(&config, &path),
        Commands::Send { device, command } => send(&config, &device, &command),
    }
}

/// Slide file from the configuration, or the built-in deck
fn open_store(config: &KioskConfig) -> ContentStore {
    let path = &config.content.slides_file;
    if !path.exists() {
        log::info!("No slide file at {}, using default deck", path.display());
        return ContentStore::with_default_deck();
    }

    let store = ContentStore::new();
    match store.load_from_file(path, SlideFormat::from_path(path)) {
        Ok(_) => store,
        Err(e) => {
            eprintln!(
                "{} Could not load {}: {}; using default deck",
                "[WARN]".yellow().bold(),
                path.display(),
                e
            );
            ContentStore::with_default_deck()
        }
    }
}

fn export(config: &KioskConfig, path: &Path) -> Result<()> {
    let store = open_store(config);
    let format = SlideFormat::from_path(path);
    store
        .save_to_file(path, format)
        .with_context(|| format!("Failed to export slides to {}", path.display()))?;

    println!(
        "{} Exported {} slides to {} ({})",
        "[OK]".green().bold(),
        store.count(),
        path.display().to_string().white(),
        format
    );
    Ok(())
}

fn send(config: &KioskConfig, key: &str, command: &str) -> Result<()> {
    let registry = DeviceRegistry::from_config(&config.hardware, Arc::new(SystemPortOpener));
    let device = registry.get(key).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown device: {}. Known devices: {}",
            key,
            registry.keys().join(", ")
        )
    })?;

    let conn = device.connection();
    conn.connect()
        .with_context(|| format!("Failed to connect {}", conn.name()))?;
    registry.send_raw(key, command)?;
    println!(
        "{} Sent to {} ({}): {}",
        "[OK]".green().bold(),
        conn.name(),
        conn.port(),
        command.cyan()
    );
    conn.disconnect();
    Ok(())
}

#[cfg(feature = "serial")]
fn print_ports(controllers_only: bool) -> Result<()> {
    use messe_stand::hardware::port::{bridge_name, detect_controller_ports, list_ports};

    let ports = if controllers_only {
        detect_controller_ports()?
    } else {
        list_ports()?
    };
    if ports.is_empty() {
        println!("{}", "No serial ports found".yellow());
        return Ok(());
    }

    println!("{}", "=".repeat(60));
    println!("{}", "Available Serial Ports".cyan().bold());
    println!("{}", "=".repeat(60));

    for port in &ports {
        let marker = if port.is_controller() {
            "[CONTROLLER]".green().bold()
        } else {
            "".normal()
        };
        println!("\n  {} {}", port.path.white().bold(), marker);
        println!("    Type: {}", port.port_type);
        if let Some(ref m) = port.manufacturer {
            println!("    Manufacturer: {}", m);
        }
        if let Some(ref p) = port.product {
            println!("    Product: {}", p);
        }
        if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            let bridge = bridge_name(vid).unwrap_or("unknown bridge");
            println!("    VID:PID: {:04x}:{:04x} ({})", vid, pid, bridge);
        }
    }

    println!("\n{}", "=".repeat(60));
    Ok(())
}

/// A line typed at the console prompt
#[derive(Debug, PartialEq)]
enum ConsoleCommand {
    Status,
    Devices,
    Next,
    Prev,
    Goto(SlideId),
    Start(Option<SlideId>),
    Stop,
    Loop(bool),
    Duration(u64),
    Show(SlideId),
    Edit {
        id: SlideId,
        title: String,
        body: String,
    },
    Save(Option<PathBuf>),
    Load(Option<PathBuf>),
    Inbound,
    Help,
    Quit,
}

impl ConsoleCommand {
    fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };

        let command = match word.to_lowercase().as_str() {
            "status" => Self::Status,
            "devices" => Self::Devices,
            "next" | "n" => Self::Next,
            "prev" | "p" => Self::Prev,
            "goto" | "g" => Self::Goto(parse_slide(rest)?),
            "start" => Self::Start(if rest.is_empty() {
                None
            } else {
                Some(parse_slide(rest)?)
            }),
            "stop" | "pause" => Self::Stop,
            "loop" => match rest {
                "on" => Self::Loop(true),
                "off" => Self::Loop(false),
                _ => anyhow::bail!("usage: loop on|off"),
            },
            "duration" => Self::Duration(
                rest.parse()
                    .with_context(|| format!("invalid duration: {:?}", rest))?,
            ),
            "show" => Self::Show(parse_slide(rest)?),
            "edit" => {
                let (id, text) = rest
                    .split_once(char::is_whitespace)
                    .ok_or_else(|| anyhow::anyhow!("usage: edit <n> <title> | <body>"))?;
                let (title, body) = text.split_once('|').unwrap_or((text, ""));
                Self::Edit {
                    id: parse_slide(id)?,
                    title: title.trim().to_string(),
                    body: body.trim().replace("\\n", "\n"),
                }
            }
            "save" => Self::Save(optional_path(rest)),
            "load" => Self::Load(optional_path(rest)),
            "inbound" => Self::Inbound,
            "help" | "?" => Self::Help,
            "q" | "quit" | "exit" => Self::Quit,
            other => anyhow::bail!("unknown command: {:?} (try 'help')", other),
        };
        Ok(command)
    }
}

fn parse_slide(text: &str) -> Result<SlideId> {
    let id: SlideId = text
        .trim()
        .parse()
        .with_context(|| format!("invalid slide number: {:?}", text))?;
    if id == 0 {
        anyhow::bail!("slide numbers start at 1");
    }
    Ok(id)
}

fn optional_path(text: &str) -> Option<PathBuf> {
    Some(text).filter(|t| !t.is_empty()).map(PathBuf::from)
}

struct Kiosk {
    store: Arc<ContentStore>,
    registry: Arc<DeviceRegistry>,
    demo: DemoScheduler,
    presentation: Arc<PresentationState>,
    slides_file: PathBuf,
}

impl Kiosk {
    fn assemble(config: &KioskConfig) -> Self {
        let store = Arc::new(open_store(config));
        let registry = Arc::new(DeviceRegistry::from_config(
            &config.hardware,
            Arc::new(SystemPortOpener),
        ));
        let demo = DemoScheduler::new(Arc::clone(&store), Arc::clone(&registry), &config.demo);
        let presentation = Arc::new(PresentationState::new(Arc::clone(&store)));
        PresentationState::attach(&presentation);

        // Playback drives the shared current-slide pointer.
        let view = Arc::clone(&presentation);
        let titles = Arc::clone(&store);
        demo.subscribe(move |event: &SlideEvent| {
            let id = event.id();
            view.set_current(id);
            let title = titles.get(id).map(|s| s.title).unwrap_or_default();
            println!("{} Slide {}: {}", ">>".cyan().bold(), id, title.white().bold());
            Ok(())
        });

        Self {
            store,
            registry,
            demo,
            presentation,
            slides_file: config.content.slides_file.clone(),
        }
    }

    /// Execute one command; returns false when the console should exit
    fn execute(&self, command: ConsoleCommand) -> Result<bool> {
        match command {
            ConsoleCommand::Status => self.print_status(),
            ConsoleCommand::Devices => self.print_devices(),
            ConsoleCommand::Next => report(self.demo.advance(), "No more slides"),
            ConsoleCommand::Prev => report(self.demo.retreat(), "No slides"),
            ConsoleCommand::Goto(id) => report(
                self.demo.goto(id),
                &format!("Slide {} out of range (1-{})", id, self.store.count()),
            ),
            ConsoleCommand::Start(from) => {
                let from = from.unwrap_or_else(|| self.presentation.current());
                report(self.demo.start(from, None), "Demo not started")
            }
            ConsoleCommand::Stop => report(self.demo.stop(), "Demo not running"),
            ConsoleCommand::Loop(enabled) => self.demo.set_loop(enabled),
            ConsoleCommand::Duration(seconds) => self.demo.set_duration(seconds),
            ConsoleCommand::Show(id) => self.print_slide(id),
            ConsoleCommand::Edit { id, title, body } => {
                match self.presentation.update(id, &title, &body) {
                    Some(_) => println!("{} Slide {} updated", "[OK]".green().bold(), id),
                    None => report(false, &format!("Slide {} not updated", id)),
                }
            }
            ConsoleCommand::Save(path) => {
                let path = path.unwrap_or_else(|| self.slides_file.clone());
                self.store
                    .save_to_file(&path, SlideFormat::from_path(&path))
                    .with_context(|| format!("Failed to save slides to {}", path.display()))?;
                println!("{} Saved {} slides to {}", "[OK]".green().bold(), self.store.count(), path.display());
            }
            ConsoleCommand::Load(path) => {
                let path = path.unwrap_or_else(|| self.slides_file.clone());
                let count = self
                    .store
                    .load_from_file(&path, SlideFormat::from_path(&path))
                    .with_context(|| format!("Failed to load slides from {}", path.display()))?;
                println!("{} Loaded {} slides from {}", "[OK]".green().bold(), count, path.display());
            }
            ConsoleCommand::Inbound => {
                let messages = self.registry.drain_inbound();
                if messages.is_empty() {
                    println!("{}", "No messages".dimmed());
                }
                for msg in messages {
                    println!(
                        "[{}] {}: {}",
                        msg.timestamp.format("%H:%M:%S%.3f").to_string().dimmed(),
                        msg.source.cyan(),
                        msg.data
                    );
                }
            }
            ConsoleCommand::Help => print_help(),
            ConsoleCommand::Quit => return Ok(false),
        }
        Ok(true)
    }

    fn print_status(&self) {
        let status = self.demo.status();
        let state = if status.running {
            "running".green().bold()
        } else {
            "stopped".yellow()
        };
        println!(
            "Demo {} | slide {}/{} | {}s per slide | loop {}",
            state,
            status.current_slide,
            status.total_slides,
            status.slide_duration,
            if status.loop_enabled { "on" } else { "off" }
        );
    }

    fn print_devices(&self) {
        for (key, status) in self.registry.get_status_summary() {
            let label = match status {
                ConnectionStatus::Connected => status.to_string().green(),
                ConnectionStatus::Disconnected => status.to_string().dimmed(),
                ConnectionStatus::Error => status.to_string().red(),
            };
            let port = self
                .registry
                .get(&key)
                .map(|d| d.connection().port().to_string())
                .unwrap_or_default();
            println!("  {:<12} {:<14} {}", key, label, port.dimmed());
        }
    }

    fn print_slide(&self, id: SlideId) {
        match self.presentation.get(id) {
            Some(slide) => {
                println!("{}", "=".repeat(60));
                println!("{}", format!("Slide {}: {}", slide.id, slide.title).cyan().bold());
                println!("{}", "=".repeat(60));
                for line in slide.body.lines().map(str::trim).filter(|l| !l.is_empty()) {
                    println!("  - {}", line);
                }
                println!(
                    "{}",
                    format!("last modified {}", slide.last_modified.format("%Y-%m-%d %H:%M:%S")).dimmed()
                );
            }
            None => println!("{}", format!("Slide {} not found", id).yellow()),
        }
    }

    fn shutdown(&self) {
        self.demo.stop();
        self.registry.disconnect_all();
    }
}

fn report(ok: bool, failure: &str) {
    if !ok {
        println!("{}", failure.yellow());
    }
}

fn print_help() {
    println!("{}", "Commands:".white().bold());
    let rows = [
        ("status", "demo state"),
        ("devices", "hardware connection status"),
        ("next | prev", "step one slide"),
        ("goto <n>", "jump to slide n"),
        ("start [n]", "start the demo (at slide n)"),
        ("stop", "stop the demo"),
        ("loop on|off", "wrap around at the end of the deck"),
        ("duration <s>", "seconds per slide"),
        ("show <n>", "print a slide"),
        ("edit <n> <title> | <body>", "edit a slide (\\n starts a new line)"),
        ("save [path]", "write the deck"),
        ("load [path]", "replace the deck from a file"),
        ("inbound", "messages received from devices"),
        ("q", "quit"),
    ];
    for (command, what) in rows {
        println!("  {:<28} {}", command.cyan(), what);
    }
}

fn run_console(config: &KioskConfig, no_hardware: bool) -> Result<()> {
    let kiosk = Kiosk::assemble(config);

    if no_hardware {
        println!("{} Hardware disabled", "[*]".cyan().bold());
    } else {
        let results = kiosk.registry.connect_all();
        for (key, ok) in &results {
            let mark = if *ok { "[OK]".green().bold() } else { "[--]".red().bold() };
            println!("{} {}", mark, key);
        }
    }

    println!(
        "{} {} slides loaded. Type {} for commands.",
        "[*]".cyan().bold(),
        kiosk.store.count(),
        "help".cyan()
    );

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();
    loop {
        print!("{} ", ">".bold());
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(line) => line.context("Failed to read console input")?,
            None => break,
        };
        if line.trim().is_empty() {
            continue;
        }

        let keep_going = match ConsoleCommand::parse(&line) {
            Ok(command) => kiosk.execute(command).unwrap_or_else(|e| {
                eprintln!("{} {:#}", "[ERROR]".red().bold(), e);
                true
            }),
            Err(e) => {
                eprintln!("{} {}", "[ERROR]".red().bold(), e);
                true
            }
        };
        if !keep_going {
            break;
        }
    }

    kiosk.shutdown();
    println!("{}", "Goodbye".dimmed());
    Ok(())
}
