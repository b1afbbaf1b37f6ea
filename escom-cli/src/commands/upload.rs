//! One-shot upload command.

use anyhow::{Context, Result};
use log::debug;

use super::{open_uploader, print_upload_event};
use crate::Settings;
use crate::serial::select_serial_port;

/// Open the port, wake the target and upload one file.
pub(crate) fn cmd_upload(settings: &Settings, file: &str, require: bool) -> Result<()> {
    let port_name = select_serial_port(&settings.serial_options())?;
    let mut uploader = open_uploader(&port_name, settings)?;

    // a bare line gets the target to a fresh prompt
    let link = uploader.link_mut();
    let sent = link.write_line("")?;
    let reply = link.read_reply(&sent)?;
    let rest = link.drain()?;
    debug!(
        "Target greeting: {:?}{:?}",
        String::from_utf8_lossy(reply.raw()),
        String::from_utf8_lossy(&rest)
    );

    uploader
        .include_file(file, require, &mut print_upload_event)
        .with_context(|| format!("Upload of {file} failed"))
}
