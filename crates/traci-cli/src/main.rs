//! Command-line client for a running traffic simulation.
//!
//! Connects to the simulator's control port, issues one command and prints
//! the typed result.
//!
//! # Usage
//!
//! ```bash
//! # Current simulation time in ms
//! traci time
//!
//! # Vehicles that departed in the last step
//! traci vehicles departed --ids
//!
//! # Network bounding box as JSON
//! traci --format json boundary
//!
//! # Driving distance between two points
//! traci distance 0 0 120.5 80 --driving
//!
//! # Planar coordinates to lon/lat
//! traci convert-geo 250.0 310.0
//!
//! # Any registered command by name
//! traci list
//! traci get convert_2d_geo --target edge_7 12.5 1 true
//!
//! # Talk to a simulator elsewhere
//! traci --host sim.local --port 8813 save-state /tmp/state.xml
//! ```

mod params;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;
use traci_core::client::{ClientError, SimClient};
use traci_core::command::CommandDescriptor;
use traci_core::config::ClientConfig;
use traci_core::protocol::DecodedValue;
use traci_core::simulation;
use traci_core::value::Position2D;

/// Query and control a running traffic simulation.
#[derive(Parser)]
#[command(name = "traci")]
#[command(about = "Send one command to a running traffic simulation")]
#[command(version)]
struct Cli {
    /// Simulator host (defaults to the config file, then 127.0.0.1)
    #[arg(long, env = "TRACI_HOST")]
    host: Option<String>,

    /// Simulator control port
    #[arg(short, long, env = "TRACI_PORT")]
    port: Option<u16>,

    /// Response timeout in milliseconds
    #[arg(short = 't', long, env = "TRACI_TIMEOUT")]
    timeout: Option<u64>,

    /// Output format: text or json
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,

    /// Write logs to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
enum Counter {
    Loaded,
    Departed,
    Arrived,
    StartingTeleport,
    EndingTeleport,
    ParkingStarting,
    ParkingEnding,
    StopStarting,
    StopEnding,
}

impl Counter {
    fn prefix(self) -> &'static str {
        match self {
            Counter::Loaded => "loaded",
            Counter::Departed => "departed",
            Counter::Arrived => "arrived",
            Counter::StartingTeleport => "starting_teleport",
            Counter::EndingTeleport => "ending_teleport",
            Counter::ParkingStarting => "parking_starting",
            Counter::ParkingEnding => "parking_ending",
            Counter::StopStarting => "stop_starting",
            Counter::StopEnding => "stop_ending",
        }
    }
}

#[derive(Subcommand)]
enum Command {
    /// List every command the client knows, with its parameter types
    List,

    /// Run any registered command by name
    Get {
        /// Command name (see `traci list`)
        name: String,
        /// Target object id, for commands that address one
        #[arg(long, default_value = "")]
        target: String,
        /// Parameters, one per declared type
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,
    },

    /// Current simulation time in ms
    Time,

    /// Simulation step length in ms
    DeltaT,

    /// Vehicle counters for the last step
    Vehicles {
        /// Which counter to read
        counter: Counter,
        /// Print the vehicle ids instead of the count
        #[arg(long)]
        ids: bool,
    },

    /// Minimum number of vehicles still expected in the network
    MinExpected,

    /// Bounding box of the road network
    Boundary,

    /// Distance between two points
    Distance {
        #[arg(allow_hyphen_values = true)]
        x1: f64,
        #[arg(allow_hyphen_values = true)]
        y1: f64,
        #[arg(allow_hyphen_values = true)]
        x2: f64,
        #[arg(allow_hyphen_values = true)]
        y2: f64,
        /// Points are lon/lat
        #[arg(long)]
        geo: bool,
        /// Measure along the roads instead of air distance
        #[arg(long)]
        driving: bool,
    },

    /// Convert between planar and lon/lat coordinates
    ConvertGeo {
        #[arg(allow_hyphen_values = true)]
        x: f64,
        #[arg(allow_hyphen_values = true)]
        y: f64,
        /// Input is lon/lat; output is planar
        #[arg(long)]
        from_geo: bool,
    },

    /// Convert a road position to coordinates
    Convert2d {
        /// Edge id
        edge: String,
        /// Offset along the edge
        pos: f64,
        /// Lane index
        #[arg(default_value = "0")]
        lane: u8,
    },

    /// Save the simulation state on the simulator host
    SaveState {
        /// File name on the simulator host
        file: String,
    },

    /// Drop vehicles waiting to be inserted
    ClearPending {
        /// Route id; all routes when omitted
        #[arg(default_value = "")]
        route: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Keep the appender guard alive until exit.
    let _guard = match init_logging(cli.log_file.as_deref()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Error: cannot open log file: {}", e);
            return ExitCode::from(2);
        }
    };

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn init_logging(
    log_file: Option<&std::path::Path>,
) -> std::io::Result<Option<tracing_appender::non_blocking::WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    match log_file {
        Some(path) => {
            let dir = path
                .parent()
                .filter(|p| !p.as_os_str().is_empty())
                .unwrap_or_else(|| std::path::Path::new("."));
            std::fs::create_dir_all(dir)?;
            let name = path.file_name().ok_or_else(|| {
                std::io::Error::new(std::io::ErrorKind::InvalidInput, "log path has no file name")
            })?;
            let appender = tracing_appender::rolling::never(dir, name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(writer)
                .with_ansi(false)
                .init();
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(std::io::stderr)
                .init();
            Ok(None)
        }
    }
}

#[derive(Debug)]
enum CliError {
    Connection(String),
    Simulator(String),
    Protocol(String),
    Usage(String),
}

impl CliError {
    fn exit_code(&self) -> ExitCode {
        match self {
            CliError::Simulator(_) => ExitCode::from(1),
            CliError::Connection(_) => ExitCode::from(2),
            CliError::Protocol(_) => ExitCode::from(3),
            CliError::Usage(_) => ExitCode::from(4),
        }
    }
}

impl std::fmt::Display for CliError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CliError::Connection(msg) => write!(f, "Connection error: {}", msg),
            CliError::Simulator(msg) => write!(f, "Simulator error: {}", msg),
            CliError::Protocol(msg) => write!(f, "Protocol error: {}", msg),
            CliError::Usage(msg) => write!(f, "Invalid command: {}", msg),
        }
    }
}

impl From<ClientError> for CliError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Status { .. } => CliError::Simulator(err.to_string()),
            ClientError::Encoding(_) | ClientError::Protocol(_) | ClientError::TypeMismatch { .. } => {
                CliError::Protocol(err.to_string())
            }
            ClientError::NotConnected
            | ClientError::ConnectionFailed(_)
            | ClientError::Io(_)
            | ClientError::Busy
            | ClientError::Closed
            | ClientError::Timeout
            | ClientError::AbandonedWrite => CliError::Connection(err.to_string()),
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    if let Command::List = cli.command {
        list_commands(cli.format);
        return Ok(());
    }

    let cmd = descriptor(&cli.command)?;

    let mut config = ClientConfig::load();
    if let Some(host) = &cli.host {
        config.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.port = port;
    }
    if let Some(timeout) = cli.timeout {
        config.read_timeout_ms = timeout;
    }

    debug!(host = %config.host, port = config.port, command = cmd.name(), "running command");

    let mut client = SimClient::connect_with(&config).await.map_err(|e| {
        CliError::Connection(format!("cannot reach {}:{}: {}", config.host, config.port, e))
    })?;
    let result = client.execute(&cmd).await;
    client.close();

    print_result(&result?, cli.format)
}

fn descriptor(command: &Command) -> Result<CommandDescriptor, CliError> {
    let cmd = match command {
        Command::List => return Err(CliError::Usage("list does not send a command".into())),
        Command::Get { name, target, args } => {
            let template = simulation::registry()
                .get(name)
                .ok_or_else(|| CliError::Usage(format!("unknown command: {name}")))?;
            let args = params::parse_params(template.parameters(), args).map_err(CliError::Usage)?;
            template
                .build(target, args)
                .map_err(|e| CliError::Usage(e.to_string()))?
        }
        Command::Time => simulation::current_time(),
        Command::DeltaT => simulation::delta_t(),
        Command::Vehicles { counter, ids } => {
            let name = format!("{}_{}", counter.prefix(), if *ids { "ids" } else { "number" });
            traci_core::build_command(&name, "", vec![]).map_err(|e| CliError::Usage(e.to_string()))?
        }
        Command::MinExpected => simulation::min_expected_number(),
        Command::Boundary => simulation::net_boundary(),
        Command::Distance {
            x1,
            y1,
            x2,
            y2,
            geo,
            driving,
        } => simulation::distance_2d(Position2D::new(*x1, *y1), Position2D::new(*x2, *y2), *geo, *driving),
        Command::ConvertGeo { x, y, from_geo } => simulation::convert_geo(*x, *y, *from_geo),
        Command::Convert2d { edge, pos, lane } => {
            simulation::convert_2d(edge, *pos, *lane, false).map_err(|e| CliError::Usage(e.to_string()))?
        }
        Command::SaveState { file } => simulation::save_state(file),
        Command::ClearPending { route } => simulation::clear_pending(route),
    };
    Ok(cmd)
}

fn list_commands(format: OutputFormat) {
    let registry = simulation::registry();
    match format {
        OutputFormat::Json => {
            let entries: Vec<serde_json::Value> = registry
                .templates()
                .map(|t| {
                    serde_json::json!({
                        "name": t.name(),
                        "target": t.takes_target(),
                        "parameters": t.parameters(),
                        "returns": t.response().map(|(_, tag)| tag),
                    })
                })
                .collect();
            println!("{}", serde_json::Value::Array(entries));
        }
        OutputFormat::Text => {
            for t in registry.templates() {
                let params: Vec<String> = t.parameters().iter().map(|p| p.to_string()).collect();
                let target = if t.takes_target() { "<target> " } else { "" };
                let returns = t
                    .response()
                    .map(|(_, tag)| tag.to_string())
                    .unwrap_or_else(|| "ack".to_string());
                println!("{:<26} {}[{}] -> {}", t.name(), target, params.join(", "), returns);
            }
        }
    }
}

fn print_result(result: &DecodedValue, format: OutputFormat) -> Result<(), CliError> {
    match format {
        OutputFormat::Json => {
            let json = match result {
                DecodedValue::Ack => serde_json::json!({ "ack": true }),
                DecodedValue::Value(value) => {
                    serde_json::to_value(value).map_err(|e| CliError::Protocol(e.to_string()))?
                }
            };
            println!("{}", json);
        }
        OutputFormat::Text => match result {
            DecodedValue::Ack => println!("OK"),
            DecodedValue::Value(value) => println!("{}", value),
        },
    }
    Ok(())
}
