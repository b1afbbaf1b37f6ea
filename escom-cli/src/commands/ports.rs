//! List ports command.

use anyhow::Result;
use console::style;
use escom::{NativePortEnumerator, PortEnumerator, PortInfo, UsbBridge, candidate_ports};
use log::debug;

fn port_json(port: &PortInfo) -> serde_json::Value {
    let bridge = UsbBridge::of(port);
    serde_json::json!({
        "name": port.name,
        "bridge": bridge.name(),
        "known": bridge.is_known(),
        "vid": port.vid,
        "pid": port.pid,
        "product": port.product,
    })
}

/// List ports command implementation.
pub(crate) fn cmd_list_ports(json: bool) -> Result<()> {
    let ports = NativePortEnumerator::list_ports().unwrap_or_else(|e| {
        debug!("Failed to enumerate serial ports: {e}");
        Vec::new()
    });

    if json {
        let list: Vec<serde_json::Value> = ports
            .iter()
            .map(port_json)
            .collect();
        println!("{}", serde_json::to_string_pretty(&list)?);
        return Ok(());
    }

    eprintln!("{}", style("Available serial ports:").bold().underlined());

    if ports.is_empty() {
        eprintln!("  {}", style("No serial ports found").dim());
        return Ok(());
    }

    for port in &ports {
        let bridge = UsbBridge::of(port);
        let device_type = if bridge.is_known() {
            format!(" [{}]", style(bridge.name()).yellow())
        } else {
            String::new()
        };
        let vid_pid = if let (Some(vid), Some(pid)) = (port.vid, port.pid) {
            format!(" ({vid:04X}:{pid:04X})")
        } else {
            String::new()
        };
        let product = port
            .product
            .as_deref()
            .map(|p| format!(" - {}", style(p).dim()))
            .unwrap_or_default();

        eprintln!(
            "  {} {}{device_type}{vid_pid}{product}",
            style("•").green(),
            style(&port.name).cyan()
        );
    }

    if let [only] = candidate_ports(&ports).as_slice() {
        eprintln!(
            "\n{} Would auto-select {}",
            style("→").green().bold(),
            style(&only.name).cyan().bold()
        );
    }

    Ok(())
}
