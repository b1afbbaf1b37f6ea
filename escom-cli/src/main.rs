//! escom CLI - Serial terminal for embedded Forth systems.
//!
//! ## Features
//!
//! - Interactive terminal with echo filtering
//! - Conditional, recursive source upload (`#include` / `#require`)
//! - MCU resource files and `\res` constant export
//! - Interactive serial port selection
//! - Shell completion generation
//! - Environment variable and config file support

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::{Shell, generate};
use console::style;
use env_logger::Env;
use escom::{LinkTiming, SearchPath, TargetProfile};
use log::debug;
use std::env;
use std::io;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};

mod commands;
mod config;
mod serial;
mod shell;

use config::{Config, DEFAULT_BAUD, parse_baud};
use serial::SerialOptions;

/// Set by the Ctrl+C handler.
static INTERRUPTED: AtomicBool = AtomicBool::new(false);

/// Whether Ctrl+C was pressed since the handler was installed.
pub(crate) fn was_interrupted() -> bool {
    INTERRUPTED.load(Ordering::Relaxed)
}

fn install_interrupt_handler() {
    if let Err(e) = ctrlc::set_handler(|| INTERRUPTED.store(true, Ordering::Relaxed)) {
        debug!("Could not install Ctrl+C handler: {e}");
    }
}

/// Error classes with their own exit code.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    /// Bad invocation or missing setup (exit code 2).
    #[error("{0}")]
    Usage(String),
    /// The operator backed out of a prompt (exit code 130).
    #[error("{0}")]
    Cancelled(String),
}

/// escom - Serial terminal for embedded Forth systems.
///
/// Without a subcommand escom opens an interactive terminal.
///
/// Environment variables:
///   ESCOM_PORT              - Default serial port
///   ESCOM_BAUD              - Default baud rate (default: 9600)
///   ESCOM_TARGET            - Target system (stm8ef, mecrisp)
///   ESCOM_PATH              - Search path for source files
///   ESCOM_NON_INTERACTIVE   - Non-interactive mode (disable prompts)
#[derive(Parser)]
#[command(name = "escom")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Serial port to use (auto-detected if not specified).
    #[arg(short, long, global = true, env = "ESCOM_PORT")]
    port: Option<String>,

    /// Baud rate (9600, 14400, 19200, 38400, 56000, 57600, 115200 or 128000).
    #[arg(short, long, global = true, env = "ESCOM_BAUD", value_parser = parse_baud)]
    baud: Option<u32>,

    /// Forth system on the target.
    #[arg(short, long, global = true, env = "ESCOM_TARGET", ignore_case = true)]
    target: Option<Target>,

    /// Search path for source and resource files, separated by `;`.
    #[arg(
        short,
        long = "search-path",
        global = true,
        env = "ESCOM_PATH",
        value_name = "DIRS"
    )]
    search_path: Option<String>,

    /// Verbose output level (-v, -vv, -vvv for increasing detail).
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode (errors only).
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Non-interactive mode (fail instead of prompting).
    #[arg(long, global = true, env = "ESCOM_NON_INTERACTIVE")]
    non_interactive: bool,

    /// Path to a configuration file.
    #[arg(long = "config", global = true, value_name = "PATH")]
    config_path: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Supported target systems.
#[derive(Clone, Copy, Debug, ValueEnum)]
enum Target {
    /// STM8 eForth (default).
    Stm8ef,
    /// Mecrisp Forth.
    Mecrisp,
}

impl From<Target> for TargetProfile {
    fn from(target: Target) -> Self {
        match target {
            Target::Stm8ef => TargetProfile::Stm8ef,
            Target::Mecrisp => TargetProfile::Mecrisp,
        }
    }
}

/// Available commands.
#[derive(Subcommand)]
enum Commands {
    /// Upload a source file and exit.
    Upload {
        /// Source file, looked up through the search path.
        file: String,

        /// Skip the upload if the target already knows a word named like the file.
        #[arg(long)]
        require: bool,
    },

    /// List available serial ports.
    ListPorts {
        /// Output port list as JSON to stdout.
        #[arg(long)]
        json: bool,
    },

    /// Generate shell completion scripts.
    Completions {
        /// Shell type for completions.
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Options after merging command line, environment and config files.
#[derive(Debug, Clone)]
pub(crate) struct Settings {
    /// Serial port, if given anywhere.
    pub port: Option<String>,
    /// Baud rate.
    pub baud: u32,
    /// Target system.
    pub target: TargetProfile,
    /// Search path.
    pub search: SearchPath,
    /// Link timing.
    pub timing: LinkTiming,
    /// Never prompt.
    pub non_interactive: bool,
}

impl Settings {
    fn resolve(cli: &Cli, config: &Config) -> Self {
        Self {
            port: cli
                .port
                .clone()
                .or_else(|| config.connection.serial.clone()),
            baud: cli
                .baud
                .or_else(|| config.baud())
                .unwrap_or(DEFAULT_BAUD),
            target: cli
                .target
                .map(TargetProfile::from)
                .or_else(|| config.target())
                .unwrap_or_default(),
            search: cli
                .search_path
                .as_deref()
                .map(SearchPath::parse)
                .or_else(|| config.search_path())
                .unwrap_or_default(),
            timing: config.timing(),
            non_interactive: cli.non_interactive,
        }
    }

    /// Options for port selection.
    pub(crate) fn serial_options(&self) -> SerialOptions {
        SerialOptions {
            port: self.port.clone(),
            non_interactive: self.non_interactive,
        }
    }
}

fn init_logging(verbose: u8, quiet: bool) {
    let log_level = if quiet {
        "error"
    } else {
        match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        }
    };
    env_logger::Builder::from_env(Env::default().default_filter_or(log_level))
        .format_target(verbose >= 2)
        .format_timestamp(if verbose >= 2 {
            Some(env_logger::TimestampPrecision::Millis)
        } else {
            None
        })
        .init();
}

fn exit_code(err: &anyhow::Error) -> i32 {
    match err.downcast_ref::<CliError>() {
        Some(CliError::Usage(_)) => 2,
        Some(CliError::Cancelled(_)) => 130,
        None => 1,
    }
}

fn main() {
    // --- NO_COLOR and TTY detection ---
    let stderr_is_tty = console::Term::stderr().is_term();
    if env::var_os("NO_COLOR").is_some() || !stderr_is_tty {
        console::set_colors_enabled(false);
        console::set_colors_enabled_stderr(false);
    }

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    debug!(
        "escom v{} (verbose level: {})",
        env!("CARGO_PKG_VERSION"),
        cli.verbose
    );

    if let Err(err) = run(&cli) {
        eprintln!("{} {err:#}", style("Error:").red().bold());
        std::process::exit(exit_code(&err));
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config = if let Some(ref path) = cli.config_path {
        Config::load_from_path(path)
    } else {
        Config::load()
    };
    let settings = Settings::resolve(cli, &config);
    debug!("{settings:?}");

    match &cli.command {
        None => {
            install_interrupt_handler();
            commands::terminal::cmd_terminal(&settings)
        },
        Some(Commands::Upload { file, require }) => {
            commands::upload::cmd_upload(&settings, file, *require)
        },
        Some(Commands::ListPorts { json }) => commands::ports::cmd_list_ports(*json),
        Some(Commands::Completions { shell }) => {
            cmd_completions(*shell);
            Ok(())
        },
    }
}

/// Generate shell completions.
fn cmd_completions(shell: Shell) {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(shell, &mut cmd, name, &mut io::stdout());
}
