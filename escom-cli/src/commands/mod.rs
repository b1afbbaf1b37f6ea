//! Command implementations for the escom CLI.

pub mod ports;
pub mod terminal;
pub mod upload;

use anyhow::{Context, Result};
use console::style;
use escom::{Link, NativePort, ReplyKind, SerialConfig, UploadEvent, Uploader};
use log::info;

use crate::Settings;

const SEPARATOR: &str = "===============================";

/// Print a separator line.
pub(crate) fn print_sep() {
    println!("{SEPARATOR}{SEPARATOR}{SEPARATOR}");
}

/// Print an error that does not end the session.
pub(crate) fn print_error(message: &str) {
    eprintln!("{} {message}", style("Error:").red().bold());
}

/// Open the serial port and wrap it in an uploader.
pub(crate) fn open_uploader(port_name: &str, settings: &Settings) -> Result<Uploader<NativePort>> {
    let config =
        SerialConfig::new(port_name, settings.baud).with_timeout(settings.timing.idle_timeout);
    let port = NativePort::open(&config)
        .with_context(|| format!("Unable to open serial port {port_name}"))?;
    info!("Opened {port_name} at {} baud", settings.baud);

    let link = Link::new(port, settings.target, settings.timing);
    Ok(Uploader::new(link, settings.search.clone()))
}

/// Render upload progress on the console.
pub(crate) fn print_upload_event(event: &UploadEvent) {
    match event {
        UploadEvent::Opened(task) => {
            print_sep();
            println!(
                "{}",
                style(format!("Uploading {}", task.path.display())).yellow()
            );
            println!();
        },
        UploadEvent::Skipped { name } => {
            println!("{}", style(format!("{name} already loaded")).dim());
        },
        UploadEvent::Blank => println!(),
        UploadEvent::Comment(text) => println!("{}", style(text).yellow()),
        UploadEvent::Resource(line) => {
            let rest = line
                .strip_prefix("\\res")
                .unwrap_or(line);
            println!("{}{rest}", style("\\res").green());
        },
        UploadEvent::SymbolsLoaded { path, count } => {
            println!(
                "{}",
                style(format!("{count} symbols from {}", path.display())).dim()
            );
        },
        UploadEvent::Exported { name, value } => {
            println!("{}", style(format!("${value:X} CONSTANT {name}")).dim());
        },
        UploadEvent::Directive { reply, .. } => println!("{}", style(reply).green()),
        UploadEvent::Reply { text, kind } => match kind {
            ReplyKind::Error => println!("{}", style(text).red()),
            _ => println!("{text}"),
        },
        UploadEvent::Warning(message) => {
            eprintln!("{} {message}", style("Warning:").yellow().bold());
        },
        UploadEvent::Closed(path) => {
            println!();
            println!(
                "{}",
                style(format!("Closing {}", path.display())).yellow()
            );
            print_sep();
        },
    }
}
