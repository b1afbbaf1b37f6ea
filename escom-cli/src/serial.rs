//! Interactive serial port selection.
//!
//! Used when no port is given on the command line, in the environment or in
//! a configuration file:
//! - ports behind a recognised USB-serial bridge are preferred
//! - a single candidate is used directly (unknown ones are confirmed first)
//! - several candidates are offered in a dialoguer menu
//! - non-interactive mode never prompts

use {
    crate::CliError,
    anyhow::{Context, Result},
    console::style,
    dialoguer::{Confirm, Error as DialoguerError, Select, theme::ColorfulTheme},
    escom::{NativePortEnumerator, PortEnumerator, PortInfo, UsbBridge, candidate_ports},
    log::{debug, info},
    std::io::IsTerminal,
};

/// Options for serial port selection.
#[derive(Debug, Clone, Default)]
pub struct SerialOptions {
    /// Port from the command line, environment or configuration.
    pub port: Option<String>,
    /// Non-interactive mode (fail instead of prompting).
    pub non_interactive: bool,
}

fn usage_err(message: &str) -> anyhow::Error {
    CliError::Usage(message.to_string()).into()
}

/// Pick the serial port to open.
pub fn select_serial_port(options: &SerialOptions) -> Result<String> {
    if let Some(port) = &options.port {
        debug!("Using configured port: {port}");
        return Ok(port.clone());
    }

    let ports = NativePortEnumerator::list_ports().context("Failed to enumerate serial ports")?;
    let candidates = candidate_ports(&ports);

    if options.non_interactive {
        return select_non_interactive_port(&candidates);
    }

    match candidates.as_slice() {
        [] => Err(usage_err("No serial ports found, use --port to name one")),
        [port] if UsbBridge::of(port).is_known() => {
            info!(
                "Auto-selected port: {} [{}]",
                port.name,
                UsbBridge::of(port).name()
            );
            Ok(port.name.clone())
        },
        [port] => {
            ensure_interactive_terminal()?;
            confirm_single_port(port)
        },
        _ => {
            ensure_interactive_terminal()?;
            select_port_interactive(&candidates)
        },
    }
}

fn select_non_interactive_port(candidates: &[&PortInfo]) -> Result<String> {
    match candidates {
        [port] => Ok(port.name.clone()),
        [] => Err(usage_err("No serial ports found, use --port to name one")),
        _ => Err(usage_err("Several serial ports found, use --port to pick one")),
    }
}

fn ensure_interactive_terminal() -> Result<()> {
    if std::io::stdin().is_terminal() && std::io::stderr().is_terminal() {
        Ok(())
    } else {
        Err(usage_err("Port selection needs a terminal, use --port in scripts"))
    }
}

fn map_prompt_error(err: DialoguerError) -> anyhow::Error {
    match err {
        DialoguerError::IO(io_err) => {
            if io_err.kind() == std::io::ErrorKind::Interrupted {
                CliError::Cancelled("Port selection cancelled".to_string()).into()
            } else {
                usage_err("Port selection prompt failed")
            }
        },
    }
}

/// One-line description of a port for menus.
fn port_label(port: &PortInfo) -> String {
    let bridge = UsbBridge::of(port);
    let device_info = if bridge.is_known() {
        format!(" [{}]", style(bridge.name()).yellow())
    } else if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
        format!(" ({vid:04X}:{pid:04X})")
    } else {
        String::new()
    };
    let product = port
        .product
        .as_ref()
        .map(|p| format!(" - {}", style(p).dim()))
        .unwrap_or_default();

    format!("{}{device_info}{product}", port.name)
}

/// Interactive port selection.
fn select_port_interactive(ports: &[&PortInfo]) -> Result<String> {
    eprintln!(
        "{} {} serial ports found",
        style("ℹ").blue(),
        ports.len()
    );

    // Truncate labels to fit terminal width to prevent wrapping in narrow
    // terminals.
    let term_width = console::Term::stderr()
        .size()
        .1 as usize;
    let max_item_width = term_width.saturating_sub(4);
    let labels: Vec<String> = ports
        .iter()
        .map(|p| console::truncate_str(&port_label(p), max_item_width, "\u{2026}").into_owned())
        .collect();

    let selection = Select::with_theme(&ColorfulTheme::default())
        .with_prompt("Select the serial port of your board")
        .items(&labels)
        .default(0)
        .interact_opt()
        .map_err(map_prompt_error)?;

    match selection {
        Some(index) => ports
            .get(index)
            .map(|p| p.name.clone())
            .ok_or_else(|| anyhow::anyhow!("Invalid port index: {index}")),
        None => Err(CliError::Cancelled("Port selection cancelled".to_string()).into()),
    }
}

/// Confirm use of a single unrecognized port.
fn confirm_single_port(port: &PortInfo) -> Result<String> {
    let confirmed = Confirm::with_theme(&ColorfulTheme::default())
        .with_prompt(format!("Use {}?", port_label(port)))
        .default(true)
        .interact_opt()
        .map_err(map_prompt_error)?
        .unwrap_or(false);

    if confirmed {
        Ok(port.name.clone())
    } else {
        Err(CliError::Cancelled("Port selection cancelled".to_string()).into())
    }
}
