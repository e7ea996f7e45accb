//! MIDI output side of the bridge
//!
//! [`OutputEmitter`] is the boundary the translator talks to. Sending never
//! reports failure back to the caller: if the device cannot take the event,
//! it is logged and lost.

use midir::{MidiOutput as MidirOutput, MidiOutputConnection};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info, trace, warn};

use crate::error::{CompanionError, Result};
use crate::midi::{format_hex, ControlEvent};
use crate::platform;

/// Client name registered with the MIDI subsystem
const CLIENT_NAME: &str = "OSC-MIDI-Companion";

/// Receives fully resolved control events
pub trait OutputEmitter: Send + Sync {
    /// Output name for logs
    fn name(&self) -> &str;

    /// Forward the event to the device. Must not block for long.
    fn send(&self, event: &ControlEvent);
}

/// Information about a MIDI output port
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    pub index: usize,
    pub name: String,
    pub is_virtual: bool,
}

/// Capability to enumerate and open output targets
pub trait OutputTargets {
    type Output: OutputEmitter;

    /// List available output ports
    fn list(&self) -> Result<Vec<PortInfo>>;

    /// Open the first port whose name contains `pattern` (case-insensitive)
    fn open(&self, pattern: &str) -> Result<Self::Output>;
}

/// Index of the first name containing `pattern`, ignoring case
pub fn find_port_index(names: &[String], pattern: &str) -> Option<usize> {
    let pattern = pattern.to_lowercase();
    names
        .iter()
        .position(|name| name.to_lowercase().contains(&pattern))
}

/// An open midir output connection
pub struct MidiOutput {
    port_name: String,
    connection: Mutex<MidiOutputConnection>,
    sent: AtomicU64,
}

impl MidiOutput {
    fn new(port_name: String, connection: MidiOutputConnection) -> Self {
        Self {
            port_name,
            connection: Mutex::new(connection),
            sent: AtomicU64::new(0),
        }
    }

    /// Create a virtual output port other applications can connect to
    #[cfg(unix)]
    pub fn create_virtual(port_name: &str) -> Result<Self> {
        use midir::os::unix::VirtualOutput;

        let midi_out = MidirOutput::new(CLIENT_NAME)?;
        let connection = midi_out.create_virtual(port_name)?;
        info!("Created virtual MIDI output port: {}", port_name);

        Ok(Self::new(port_name.to_string(), connection))
    }

    /// Create a virtual output port other applications can connect to
    #[cfg(not(unix))]
    pub fn create_virtual(_port_name: &str) -> Result<Self> {
        Err(CompanionError::VirtualPortUnsupported)
    }

    /// Number of events written so far
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }

    /// Close the connection
    pub fn close(self) {
        let sent = self.sent_count();
        self.connection.into_inner().close();
        info!("Closed MIDI output '{}' ({} events sent)", self.port_name, sent);
    }
}

impl OutputEmitter for MidiOutput {
    fn name(&self) -> &str {
        &self.port_name
    }

    fn send(&self, event: &ControlEvent) {
        let data = event.encode();

        match self.connection.lock().send(&data) {
            Ok(()) => {
                self.sent.fetch_add(1, Ordering::Relaxed);
                trace!("Sent: {} | {}", format_hex(&data), event);
            }
            Err(e) => warn!("MIDI send to '{}' failed: {}", self.port_name, e),
        }
    }
}

/// Output ports provided by midir
#[derive(Debug, Default, Clone, Copy)]
pub struct MidirTargets;

impl OutputTargets for MidirTargets {
    type Output = MidiOutput;

    fn list(&self) -> Result<Vec<PortInfo>> {
        let midi_out = MidirOutput::new(CLIENT_NAME)?;

        let mut port_infos = Vec::new();
        for (index, port) in midi_out.ports().iter().enumerate() {
            if let Ok(name) = midi_out.port_name(port) {
                port_infos.push(PortInfo {
                    index,
                    is_virtual: platform::is_virtual_port_name(&name),
                    name,
                });
            }
        }

        Ok(port_infos)
    }

    fn open(&self, pattern: &str) -> Result<MidiOutput> {
        let midi_out = MidirOutput::new(CLIENT_NAME)?;

        let ports = midi_out.ports();
        let names: Vec<String> = ports
            .iter()
            .map(|port| midi_out.port_name(port).unwrap_or_default())
            .collect();
        debug!("Found {} MIDI output ports", names.len());

        let index = find_port_index(&names, pattern)
            .ok_or_else(|| CompanionError::PortNotFound(pattern.to_string()))?;
        let port_name = names[index].clone();

        info!("Found MIDI output port: {}. Using as target.", port_name);
        let connection = midi_out.connect(&ports[index], CLIENT_NAME)?;

        Ok(MidiOutput::new(port_name, connection))
    }
}

/// Logs events instead of sending them (dry-run mode)
pub struct ConsoleOutput {
    name: String,
    sent: AtomicU64,
}

impl ConsoleOutput {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sent: AtomicU64::new(0),
        }
    }

    /// Number of events logged so far
    pub fn sent_count(&self) -> u64 {
        self.sent.load(Ordering::Relaxed)
    }
}

impl OutputEmitter for ConsoleOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn send(&self, event: &ControlEvent) {
        let count = self.sent.fetch_add(1, Ordering::Relaxed) + 1;
        info!(
            "[{}] {} | {} [event #{}]",
            self.name,
            event,
            format_hex(&event.encode()),
            count
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_find_port_is_case_insensitive_substring() {
        let ports = names(&["Microsoft GS Wavetable Synth", "LoopBe Internal MIDI 0"]);

        assert_eq!(find_port_index(&ports, "loopbe internal midi"), Some(1));
        assert_eq!(find_port_index(&ports, "Wavetable"), Some(0));
        assert_eq!(find_port_index(&ports, "IAC Driver Bus 1"), None);
    }

    #[test]
    fn test_find_port_prefers_first_match() {
        let ports = names(&["IAC Driver Bus 1", "IAC Driver Bus 10"]);

        assert_eq!(find_port_index(&ports, "IAC Driver Bus 1"), Some(0));
    }

    #[test]
    fn test_console_output_counts_events() {
        let output = ConsoleOutput::new("dry-run");

        output.send(&ControlEvent::NoteOn {
            channel: 0,
            note: 60,
            velocity: 127,
        });
        output.send(&ControlEvent::PitchBend {
            channel: 4,
            value: 8192,
        });

        assert_eq!(output.name(), "dry-run");
        assert_eq!(output.sent_count(), 2);
    }

    #[test]
    fn test_listed_ports_can_be_found_by_name() {
        // No MIDI backend in the environment: nothing to check
        let Ok(ports) = MidirTargets.list() else { return };

        let names: Vec<String> = ports.iter().map(|p| p.name.clone()).collect();
        for port in &ports {
            let found = find_port_index(&names, &port.name.to_uppercase())
                .expect("listed port should match its own name");
            assert!(names[found].to_lowercase().contains(&port.name.to_lowercase()));
        }
    }
}
