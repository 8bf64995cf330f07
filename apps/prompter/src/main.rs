use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use clap::{Args, Parser};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

use prompter_core::config::Config;
use prompter_core::console::{self, ConsoleInput};
use prompter_core::render::RenderedScript;
use prompter_core::script::{InMemoryScripts, Script};
use prompter_core::session::{Outbound, Surface, SurfaceHandle, SurfaceKind, spawn_surface};
use prompter_core::telemetry::{self, logging::{self, LogConfig, LogLevel}};
use prompter_core::transport::websocket::{WebSocketConfig, WebSocketTransport};
use prompter_core::transport::Transport;

#[derive(Parser, Debug)]
#[command(
    name = "prompter",
    about = "Headless teleprompter surface: follows and drives a shared script position",
    version
)]
struct Cli {
    #[arg(long, env = "PROMPTER_SERVER_URL", help = "WebSocket URL of the relay server")]
    server_url: Option<String>,

    #[arg(long, env = "PROMPTER_ROOM", help = "Room to join on the relay server")]
    room: Option<String>,

    #[arg(long, value_enum, default_value_t = SurfaceKind::Viewer, help = "Which surface to act as")]
    surface: SurfaceKind,

    #[arg(
        long = "script",
        value_name = "[ID=]PATH",
        help = "Script file to make available; the id defaults to the file stem"
    )]
    scripts: Vec<String>,

    #[arg(long, default_value_t = 720.0, help = "Viewport height in pixels")]
    viewport_height: f64,

    #[command(flatten)]
    timing: TimingArgs,

    #[command(flatten)]
    logging: LoggingArgs,
}

#[derive(Args, Debug, Clone)]
struct TimingArgs {
    #[arg(long, env = "PROMPTER_SCROLL_DEBOUNCE_MS", value_name = "MS")]
    scroll_debounce_ms: Option<u64>,

    #[arg(long, env = "PROMPTER_RESIZE_DEBOUNCE_MS", value_name = "MS")]
    resize_debounce_ms: Option<u64>,

    #[arg(long, env = "PROMPTER_CHECKPOINT_INTERVAL_MS", value_name = "MS")]
    checkpoint_interval_ms: Option<u64>,

    #[arg(long, env = "PROMPTER_RECONNECT_DELAY_MS", value_name = "MS")]
    reconnect_delay_ms: Option<u64>,
}

#[derive(Args, Debug, Clone)]
struct LoggingArgs {
    #[arg(
        long = "log-level",
        value_enum,
        env = "PROMPTER_LOG_LEVEL",
        default_value_t = LogLevel::Info,
        help = "Minimum log level (error, warn, info, debug, trace)"
    )]
    level: LogLevel,

    #[arg(
        long = "log-file",
        value_name = "PATH",
        env = "PROMPTER_LOG_FILE",
        help = "Write logs to the specified file instead of stderr"
    )]
    file: Option<PathBuf>,
}

impl LoggingArgs {
    fn to_config(&self) -> LogConfig {
        LogConfig {
            level: self.level,
            file: self.file.clone(),
        }
    }
}

impl Cli {
    fn config(&self) -> Config {
        let mut config = Config::from_env();
        if let Some(url) = &self.server_url {
            config.server_url = url.clone();
        }
        if let Some(room) = self.room.as_ref().filter(|room| !room.trim().is_empty()) {
            config.room = room.clone();
        }
        let millis = |value: Option<u64>, current: Duration| value.map(Duration::from_millis).unwrap_or(current);
        let sync = &mut config.sync;
        sync.scroll_debounce = millis(self.timing.scroll_debounce_ms, sync.scroll_debounce);
        sync.resize_debounce = millis(self.timing.resize_debounce_ms, sync.resize_debounce);
        sync.checkpoint_interval = millis(self.timing.checkpoint_interval_ms, sync.checkpoint_interval);
        sync.reconnect_delay = millis(self.timing.reconnect_delay_ms, sync.reconnect_delay);
        config
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(&cli.logging.to_config()).context("initializing logging")?;
    let config = cli.config();

    let scripts = InMemoryScripts::new();
    for entry in &cli.scripts {
        let script = load_script(entry)?;
        info!(target = "prompter.surface", script_id = %script.id, "script available");
        scripts.insert(script);
    }

    let ws_config = WebSocketConfig::new(config.server_url.clone(), config.room.clone(), cli.surface);
    let transport: Arc<dyn Transport> = Arc::new(
        WebSocketTransport::connect(ws_config)
            .await
            .with_context(|| format!("connecting to {}", config.server_url))?,
    );

    let surface = Surface::new(
        cli.surface,
        RenderedScript::new(cli.viewport_height),
        Arc::new(scripts),
        Outbound::for_role(cli.surface.role(), Arc::clone(&transport)),
        config.sync.clone(),
    );
    let handle = spawn_surface(surface, transport);
    eprintln!("{}", console::HELP);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => match line.context("reading stdin")? {
                Some(line) => {
                    if !dispatch(&handle, &line).await {
                        break;
                    }
                }
                None => {
                    // Stdin closed; keep following until interrupted.
                    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
                    break;
                }
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    handle.shutdown().await;
    telemetry::log_summary();
    Ok(())
}

/// Returns false when the user asked to quit.
async fn dispatch(handle: &SurfaceHandle, line: &str) -> bool {
    let input = match console::parse_line(line) {
        Ok(Some(input)) => input,
        Ok(None) => return true,
        Err(err) => {
            eprintln!("{err}\n{}", console::HELP);
            return true;
        }
    };
    match input {
        ConsoleInput::Control(command) => {
            if let Err(err) = handle.command(command).await {
                warn!(target = "prompter.surface", error = %err, "command rejected");
            }
        }
        ConsoleInput::Scroll(offset) => handle.scroll(offset),
        ConsoleInput::Resize(height) => handle.resize(height),
        ConsoleInput::Rollback => match handle.rollback().await {
            Ok(resolution) => info!(target = "prompter.surface", scroll = resolution.target, "rolled back"),
            Err(err) => warn!(target = "prompter.surface", error = %err, "rollback rejected"),
        },
        ConsoleInput::Search(text) => match handle.search(text).await {
            Ok(resolution) => info!(target = "prompter.surface", scroll = resolution.target, "search hit"),
            Err(err) => warn!(target = "prompter.surface", error = %err, "search failed"),
        },
        ConsoleInput::Status => match handle.status().await {
            Ok(status) => println!("{status:#?}"),
            Err(err) => warn!(target = "prompter.surface", error = %err, "status unavailable"),
        },
        ConsoleInput::Quit => return false,
    }
    true
}

fn load_script(entry: &str) -> Result<Script> {
    let (id, path) = match entry.split_once('=') {
        Some((id, path)) => (id.to_string(), PathBuf::from(path)),
        None => {
            let path = PathBuf::from(entry);
            let id = file_stem(&path).ok_or_else(|| anyhow!("cannot derive a script id from {entry}"))?;
            (id, path)
        }
    };
    let text = std::fs::read_to_string(&path)
        .with_context(|| format!("reading script {}", path.display()))?;
    Ok(Script::new(id, text))
}

fn file_stem(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .filter(|stem| !stem.is_empty())
        .map(str::to_string)
}
