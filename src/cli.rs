//! Console interaction: banner, port listing and the output-port prompt

use anyhow::Result;
use colored::*;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use tracing::{info, warn};

use crate::error::CompanionError;
use crate::output::{OutputTargets, PortInfo};
use crate::platform;

/// User's answer to the "port not found" prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryChoice {
    Retry,
    Quit,
}

/// Interpret a line typed at the retry prompt: empty retries, anything else quits
pub fn parse_retry_answer(line: &str) -> RetryChoice {
    if line.trim().is_empty() {
        RetryChoice::Retry
    } else {
        RetryChoice::Quit
    }
}

pub fn print_banner() {
    println!(
        "\n{}",
        format!("---- OSC MIDI Companion v{} ----", env!("CARGO_PKG_VERSION"))
            .bold()
            .cyan()
    );
    println!("{}", "- Press Ctrl+C at any time to quit -".dimmed());
}

/// Print output ports, marking the one matching `pattern`
pub fn print_ports(ports: &[PortInfo], pattern: Option<&str>) {
    println!("\n{}", "=== Available MIDI Output Ports ===".bold().cyan());

    if ports.is_empty() {
        println!("  {}", "No output ports found".dimmed());
        println!();
        return;
    }

    let names: Vec<String> = ports.iter().map(|p| p.name.clone()).collect();
    let selected = pattern.and_then(|p| crate::output::find_port_index(&names, p));

    for (i, port) in ports.iter().enumerate() {
        let marker = if port.is_virtual {
            "[VIRTUAL]".yellow()
        } else {
            "[PHYSICAL]".green()
        };
        if Some(i) == selected {
            println!("  {} {} {}", marker, port.name.bright_white(), "<- target".bright_green());
        } else {
            println!("  {} {}", marker, port.name);
        }
    }
    println!();
}

/// Print how to get the expected virtual port on this platform
pub fn print_setup_instructions(pattern: &str) {
    println!("{} {}", "Port not found:".red().bold(), pattern);
    for line in platform::setup_instructions() {
        println!("  {}", line);
    }
}

/// Open the driver installer, where the platform has one
fn open_setup_download() {
    let Some(url) = platform::setup_download_url() else {
        return;
    };

    info!("Opening {}", url);
    if let Err(e) = platform::open_url(url) {
        warn!("Could not open {}: {}", url, e);
    }
}

/// Ask whether to look for the port again
pub fn prompt_retry() -> Result<RetryChoice> {
    let mut rl = DefaultEditor::new()?;

    match rl.readline("Press Enter to check again, or type q to quit> ") {
        Ok(line) => Ok(parse_retry_answer(&line)),
        Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => Ok(RetryChoice::Quit),
        Err(e) => Err(e.into()),
    }
}

/// Open the output port matching `pattern`, asking the user to retry while it
/// is missing. Returns `None` when the user gives up.
pub fn wait_for_output<T, F>(targets: &T, pattern: &str, mut ask: F) -> Result<Option<T::Output>>
where
    T: OutputTargets,
    F: FnMut() -> Result<RetryChoice>,
{
    loop {
        for port in targets.list()? {
            info!("Found MIDI device: {}", port.name);
        }

        match targets.open(pattern) {
            Ok(output) => return Ok(Some(output)),
            Err(CompanionError::PortNotFound(_)) => {
                print_setup_instructions(pattern);
                if ask()? == RetryChoice::Quit {
                    open_setup_download();
                    return Ok(None);
                }
            }
            Err(e) => return Err(e.into()),
        }
    }
}
