use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use contest_sweep::session::{self, CommandRunner, SweepRequest};
use contest_sweep::{mcp, ws_server};
use shared::{HitPolicy, SweepConfig, SweepMode};
use std::path::{Path, PathBuf};

const DEFAULT_CONFIG_PATH: &str = "contest-sweep.toml";

#[derive(Parser)]
#[command(name = "contest-sweep")]
#[command(about = "Recover contest rating history from hover-only profile charts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the WebSocket bridge daemon (for browser extension connection)
    Server {
        #[arg(long, default_value = "9225")]
        port: u16,
    },
    /// Run the MCP protocol server with an in-process bridge
    Mcp {
        #[arg(long, default_value = "9225")]
        ws_port: u16,

        #[arg(long, short)]
        config: Option<PathBuf>,
    },
    /// Sweep a profile through a running bridge daemon and print its contest history
    Sweep {
        #[arg(long, short)]
        username: String,

        /// Open this platform's single-chart view, e.g. "leetcode"
        #[arg(long, short)]
        platform: Option<String>,

        #[arg(long, short)]
        config: Option<PathBuf>,

        /// Bridge daemon port (default: from config)
        #[arg(long)]
        ws_port: Option<u16>,

        #[arg(long)]
        x_steps: Option<u32>,

        #[arg(long)]
        y_sweep_pixels: Option<u32>,

        #[arg(long)]
        y_sweep_step: Option<u32>,

        #[arg(long)]
        probe_delay_ms: Option<u64>,

        /// Drive each probe from here instead of in the page
        #[arg(long)]
        stepwise: bool,

        /// Keep every hit in a column's Y fan
        #[arg(long)]
        all_hits: bool,

        /// Sweep the displayed chart only, without switching tabs
        #[arg(long)]
        current: bool,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Server { port } => {
            ws_server::run_server_daemon(port).await;
        }
        Commands::Mcp { ws_port, config } => match load_config(config.as_deref()) {
            Ok(config) => mcp::run_mcp_server(ws_port, config).await,
            Err(e) => {
                eprintln!("Error: {:#}", e);
                std::process::exit(2);
            }
        },
        Commands::Sweep {
            username,
            platform,
            config,
            ws_port,
            x_steps,
            y_sweep_pixels,
            y_sweep_step,
            probe_delay_ms,
            stepwise,
            all_hits,
            current,
        } => {
            let overrides = SweepOverrides {
                ws_port,
                x_steps,
                y_sweep_pixels,
                y_sweep_step,
                probe_delay_ms,
                stepwise,
                all_hits,
            };
            let request = SweepRequest {
                username,
                platform,
                current,
            };

            match run_sweep(config.as_deref(), overrides, request).await {
                Ok(()) => std::process::exit(0),
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    std::process::exit(2);
                }
            }
        }
    }
}

struct SweepOverrides {
    ws_port: Option<u16>,
    x_steps: Option<u32>,
    y_sweep_pixels: Option<u32>,
    y_sweep_step: Option<u32>,
    probe_delay_ms: Option<u64>,
    stepwise: bool,
    all_hits: bool,
}

impl SweepOverrides {
    fn apply(self, config: &mut SweepConfig) {
        if let Some(port) = self.ws_port {
            config.bridge.port = port;
        }
        if let Some(x_steps) = self.x_steps {
            config.sweep.x_steps = x_steps;
        }
        if let Some(pixels) = self.y_sweep_pixels {
            config.sweep.y_sweep_pixels = pixels;
        }
        if let Some(step) = self.y_sweep_step {
            config.sweep.y_sweep_step = step;
        }
        if let Some(delay) = self.probe_delay_ms {
            config.sweep.probe_delay_ms = delay;
        }
        if self.stepwise {
            config.sweep.mode = SweepMode::Stepwise;
        }
        if self.all_hits {
            config.sweep.hit_policy = HitPolicy::AllInFan;
        }
    }
}

fn load_config(path: Option<&Path>) -> Result<SweepConfig> {
    session::load_config(path.unwrap_or(Path::new(DEFAULT_CONFIG_PATH)))
}

async fn run_sweep(config_path: Option<&Path>, overrides: SweepOverrides, request: SweepRequest) -> Result<()> {
    let mut config = load_config(config_path)?;
    overrides.apply(&mut config);
    config.validate().map_err(anyhow::Error::msg)?;

    let runner = CommandRunner::Remote(ws_server::RemoteBridge::connect(config.bridge.port).await?);
    let history = session::run_sweep(&runner, &config, &request).await?;

    let json = serde_json::to_string_pretty(&history).context("Failed to encode contest history")?;
    println!("{}", json);

    if let CommandRunner::Remote(bridge) = runner {
        bridge.close().await.ok();
    }
    Ok(())
}
