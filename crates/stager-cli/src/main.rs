mod commands;

use clap::{Parser, Subcommand};
use commands::{ClientArgs, EXIT_CONFIG_ERROR, EXIT_FAILURE};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(
    name = "stager",
    version,
    about = "Drive one step of a staging run against the Staging Coordinator"
)]
struct Cli {
    /// Coordinator base URL.
    #[arg(long, env = "STAGER_URL", global = true)]
    url: Option<String>,

    /// Staging root; the package and rebuilt archive live here.
    #[arg(long, global = true)]
    root: Option<PathBuf>,

    /// Discard stdout and stderr of executed commands.
    #[arg(short, long, default_value_t = false, global = true)]
    quiet: bool,

    /// Enable verbose (debug) logging output.
    #[arg(short, long, default_value_t = false, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Download the package archive.
    Download,
    /// Unpack the downloaded package into <root>/<location>.
    Extract { location: String },
    /// Run a shell command (after --).
    Exec {
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },
    /// Run a shell command inside an extracted app directory (after --).
    ExecApp {
        #[arg(long)]
        location: String,
        #[arg(required = true, last = true)]
        command: Vec<String>,
    },
    /// Archive the app directory and upload it.
    Upload {
        #[arg(long)]
        location: String,
    },
    /// Upload, then report done.
    Complete {
        #[arg(long)]
        location: String,
    },
    /// Ask the coordinator to snapshot the staging filesystem.
    Snapshot,
    /// Report success.
    Done,
    /// Ask the coordinator to relaunch staging.
    Relaunch,
    /// Report failure.
    Fail { message: Option<String> },
    /// Print the package metadata as JSON.
    Meta,
    /// Edit package environment variables.
    Env {
        #[command(subcommand)]
        action: EnvAction,
    },
    /// Edit what the package provides.
    Provides {
        #[command(subcommand)]
        action: ResourceAction,
    },
    /// Edit package dependencies.
    Deps {
        #[command(subcommand)]
        action: ResourceAction,
    },
    /// Edit package templates.
    Templates {
        #[command(subcommand)]
        action: TemplateAction,
    },
    /// Show or set the start command.
    StartCommand {
        #[arg(long)]
        set: Option<String>,
    },
    /// Show or set the start path.
    StartPath {
        #[arg(long)]
        set: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
pub enum EnvAction {
    Add { key: String, value: String },
    Remove { key: String },
}

#[derive(Debug, Subcommand)]
pub enum ResourceAction {
    Add {
        #[arg(value_name = "TYPE")]
        kind: String,
        name: String,
    },
    Remove {
        #[arg(value_name = "TYPE")]
        kind: String,
        name: String,
    },
}

#[derive(Debug, Subcommand)]
pub enum TemplateAction {
    Add {
        path: String,
        #[arg(long)]
        left: Option<String>,
        #[arg(long)]
        right: Option<String>,
    },
    Remove {
        path: String,
        #[arg(long)]
        left: Option<String>,
        #[arg(long)]
        right: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_env("STAGER_LOG")
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    let args = ClientArgs {
        url: cli.url.as_deref(),
        root: cli.root.as_deref(),
        quiet: cli.quiet,
    };
    let mut client = match args.build() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::from(EXIT_CONFIG_ERROR);
        }
    };

    tracing::debug!("command: {:?}", cli.command);
    let result = match cli.command {
        Commands::Download => commands::package::download(&client),
        Commands::Extract { location } => commands::package::extract(&mut client, &location),
        Commands::Exec { command } => commands::package::exec(&client, &command),
        Commands::ExecApp { location, command } => {
            commands::package::exec_app(&mut client, &location, &command)
        }
        Commands::Upload { location } => commands::package::upload(&mut client, &location),
        Commands::Complete { location } => commands::package::complete(&mut client, &location),
        Commands::Snapshot => commands::outcome::snapshot(&client),
        Commands::Done => commands::outcome::done(&client),
        Commands::Relaunch => commands::outcome::relaunch(&client),
        Commands::Fail { message } => commands::outcome::fail(&client, message.as_deref()),
        Commands::Meta => commands::metadata::show(&client),
        Commands::Env { action } => commands::metadata::env(&client, &action),
        Commands::Provides { action } => commands::metadata::provides(&client, &action),
        Commands::Deps { action } => commands::metadata::deps(&client, &action),
        Commands::Templates { action } => commands::metadata::templates(&client, &action),
        Commands::StartCommand { set } => {
            commands::metadata::start_command(&client, set.as_deref())
        }
        Commands::StartPath { set } => commands::metadata::start_path(&client, set.as_deref()),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(msg) => {
            eprintln!("error: {msg}");
            ExitCode::from(EXIT_FAILURE)
        }
    }
}
