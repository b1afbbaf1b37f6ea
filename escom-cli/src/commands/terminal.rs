//! Interactive terminal.
//!
//! - Reader thread: console lines → channel
//! - Main thread: device output → console, channel → device or `#` commands
//! - A line starting with `\` or Ctrl+C ends the session

use anyhow::Result;
use console::style;
use escom::{EchoTracker, NativePort, Uploader, drain_utf8_lossy};
use log::{debug, info};
use std::env;
use std::fs;
use std::io::{self, BufRead as _, IsTerminal as _, Write as _};
use std::path::Path;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;

use super::{open_uploader, print_error, print_sep, print_upload_event};
use crate::serial::select_serial_port;
use crate::shell::{ShellCommand, list_dir};
use crate::{Settings, was_interrupted};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

struct Session {
    uploader: Uploader<NativePort>,
    echo: EchoTracker,
    pending: Vec<u8>,
}

/// Run the interactive terminal until the operator quits.
pub(crate) fn cmd_terminal(settings: &Settings) -> Result<()> {
    clear_screen();
    let port_name = select_serial_port(&settings.serial_options())?;
    print_banner(settings, &port_name);

    let mut uploader = open_uploader(&port_name, settings)?;
    uploader.link_mut().write_line("")?;

    let mut session = Session {
        uploader,
        echo: EchoTracker::new(),
        pending: Vec::new(),
    };
    let console = spawn_console_reader();

    loop {
        if was_interrupted() {
            info!("Interrupted, closing {port_name}");
            break;
        }
        if session.show_device_output()? {
            continue;
        }
        match console.try_recv() {
            Ok(line) => {
                if session.handle_line(&line)? == Flow::Quit {
                    break;
                }
            },
            Err(TryRecvError::Empty) => {},
            Err(TryRecvError::Disconnected) => {
                debug!("Console closed");
                while session.show_device_output()? {}
                break;
            },
        }
    }

    println!();
    Ok(())
}

fn clear_screen() {
    use crossterm::cursor::MoveTo;
    use crossterm::terminal::{Clear, ClearType};

    if io::stdout().is_terminal() {
        let _ = crossterm::execute!(io::stdout(), Clear(ClearType::All), MoveTo(0, 0));
    }
}

fn print_banner(settings: &Settings, port_name: &str) {
    println!(
        "{}",
        style(format!(
            "escom-{} : Serial Terminal for Embedded Forth Systems.",
            env!("CARGO_PKG_VERSION")
        ))
        .yellow()
    );
    println!();
    println!("Active options:");
    println!("-p (PORT    ) - {port_name}");
    println!("-b (BAUDRATE) - {}", settings.baud);
    println!("-t (TARGET  ) - {}", settings.target);
    println!("-s (PATH    ) - {}", settings.search);
    println!(
        "{}",
        style("#ls #cd #cat #include #require are local commands, a line starting with \\ quits")
            .dim()
    );
    print_sep();
}

/// Forward console lines over a channel so the main loop never blocks on stdin.
fn spawn_console_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        for line in io::stdin().lock().lines() {
            match line {
                Ok(line) => {
                    if tx.send(line).is_err() {
                        break;
                    }
                },
                Err(e) => {
                    debug!("Console read failed: {e}");
                    break;
                },
            }
        }
    });
    rx
}

fn show_file(name: &str) {
    match fs::read_to_string(name) {
        Ok(text) => {
            print_sep();
            print!("{text}");
            println!();
            print_sep();
        },
        Err(e) => print_error(&format!("Unable to open {name}: {e}")),
    }
}

impl Session {
    /// Print whatever the target sent. Returns whether anything arrived.
    fn show_device_output(&mut self) -> Result<bool> {
        let chunk = self
            .uploader
            .link_mut()
            .poll()?;
        if chunk.is_empty() {
            return Ok(false);
        }
        let fresh = self.echo.filter(&chunk);
        self.pending.extend_from_slice(fresh);
        let text = drain_utf8_lossy(&mut self.pending);
        print!("{text}");
        io::stdout().flush().ok();
        Ok(true)
    }

    fn send(&mut self, line: &str) -> Result<()> {
        let sent = self
            .uploader
            .link_mut()
            .write_line(line)?;
        self.echo.expect(&sent);
        Ok(())
    }

    fn handle_line(&mut self, line: &str) -> Result<Flow> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.starts_with('\\') {
            return Ok(Flow::Quit);
        }
        match ShellCommand::parse(line) {
            Some(command) => {
                self.run_command(command)?;
                // fresh prompt after every local command
                self.send("")?;
            },
            None => self.send(line)?,
        }
        Ok(Flow::Continue)
    }

    fn run_command(&mut self, command: ShellCommand<'_>) -> Result<()> {
        match command {
            ShellCommand::List(dir) => {
                let dir = dir.unwrap_or(".");
                match list_dir(Path::new(dir)) {
                    Ok(names) => {
                        for name in names {
                            println!("{name}");
                        }
                    },
                    Err(e) => print_error(&format!("Path not found: [{dir}]: {e}")),
                }
            },
            ShellCommand::ChangeDir(Some(dir)) => {
                if let Err(e) = env::set_current_dir(dir) {
                    print_error(&format!("Directory does not exist: {dir}: {e}"));
                }
            },
            ShellCommand::ChangeDir(None) => print_error("Directory missing"),
            ShellCommand::Include(Some(file)) => self.upload(file, false)?,
            ShellCommand::Require(Some(file)) => self.upload(file, true)?,
            ShellCommand::Cat(Some(file)) => show_file(file),
            ShellCommand::Include(None) | ShellCommand::Require(None) | ShellCommand::Cat(None) => {
                print_error("Filename missing");
            },
            ShellCommand::Unknown(name) => print_error(&format!("Unknown command #{name}")),
        }
        Ok(())
    }

    /// Upload a file; only a broken link ends the session.
    fn upload(&mut self, file: &str, conditional: bool) -> Result<()> {
        self.echo.expect(&[]);
        match self
            .uploader
            .include_file(file, conditional, &mut print_upload_event)
        {
            Ok(()) => Ok(()),
            Err(e) if e.is_transport() => Err(e.into()),
            Err(e) => {
                print_error(&format!("{e}, upload aborted"));
                Ok(())
            },
        }
    }
}
