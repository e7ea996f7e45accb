//! MIDI control events
//!
//! The resolved output side of the bridge: a channel voice message ready to
//! be written to the output port.

use std::fmt;

/// Largest 7-bit data value
pub const MAX_DATA_7BIT: u8 = 127;

/// Largest 14-bit pitch bend value
pub const MAX_PITCH_BEND: u16 = 16383;

/// Channel volume controller
pub const CC_CHANNEL_VOLUME: u8 = 7;

/// Resolved output instruction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlEvent {
    /// Note On: channel (0-15), note (0-127), velocity (0-127)
    NoteOn { channel: u8, note: u8, velocity: u8 },

    /// Note Off: channel (0-15), note (0-127), velocity (0-127)
    NoteOff { channel: u8, note: u8, velocity: u8 },

    /// Control Change: channel (0-15), cc (0-127), value (0-127)
    ControlChange { channel: u8, cc: u8, value: u8 },

    /// Pitch Bend: channel (0-15), value (0-16383, 14-bit)
    PitchBend { channel: u8, value: u16 },
}

impl ControlEvent {
    /// Encode the event to raw MIDI bytes
    pub fn encode(&self) -> [u8; 3] {
        match *self {
            ControlEvent::NoteOn { channel, note, velocity } => {
                [0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            ControlEvent::NoteOff { channel, note, velocity } => {
                [0x80 | (channel & 0x0F), note & 0x7F, velocity & 0x7F]
            }
            ControlEvent::ControlChange { channel, cc, value } => {
                [0xB0 | (channel & 0x0F), cc & 0x7F, value & 0x7F]
            }
            ControlEvent::PitchBend { channel, value } => {
                let value = value.min(MAX_PITCH_BEND);
                let lsb = (value & 0x7F) as u8;
                let msb = ((value >> 7) & 0x7F) as u8;
                [0xE0 | (channel & 0x0F), lsb, msb]
            }
        }
    }
}

impl fmt::Display for ControlEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {
            ControlEvent::NoteOn { channel, note, velocity } => {
                write!(f, "NoteOn ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            ControlEvent::NoteOff { channel, note, velocity } => {
                write!(f, "NoteOff ch:{} n:{} v:{}", channel + 1, note, velocity)
            }
            ControlEvent::ControlChange { channel, cc, value } => {
                write!(f, "CC ch:{} cc:{} v:{}", channel + 1, cc, value)
            }
            ControlEvent::PitchBend { channel, value } => {
                write!(f, "PitchBend ch:{} v:{}", channel + 1, value)
            }
        }
    }
}

/// MIDI value conversion utilities
pub mod convert {
    use super::MAX_PITCH_BEND;

    /// Scale a 7-bit value into the pitch bend range (value * 128), clamped to 14 bits
    pub fn pitch_bend_from_7bit(value_7bit: u8) -> u16 {
        ((value_7bit as u16) << 7).min(MAX_PITCH_BEND)
    }
}

/// Format MIDI bytes as hex string for debugging
pub fn format_hex(data: &[u8]) -> String {
    data.iter()
        .map(|b| format!("{:02X}", b))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_note_on() {
        let event = ControlEvent::NoteOn {
            channel: 0,
            note: 60,
            velocity: 100,
        };

        assert_eq!(event.encode(), [0x90, 60, 100]);
    }

    #[test]
    fn test_encode_note_off() {
        let event = ControlEvent::NoteOff {
            channel: 3,
            note: 64,
            velocity: 0,
        };

        assert_eq!(event.encode(), [0x83, 64, 0]);
    }

    #[test]
    fn test_encode_control_change() {
        let event = ControlEvent::ControlChange {
            channel: 2,
            cc: 7,
            value: 100,
        };

        assert_eq!(event.encode(), [0xB2, 7, 100]);
    }

    #[test]
    fn test_encode_pitch_bend_center() {
        let event = ControlEvent::PitchBend {
            channel: 4,
            value: 8192,
        };

        assert_eq!(event.encode(), [0xE4, 0x00, 0x40]);
    }

    #[test]
    fn test_encode_pitch_bend_clamps_to_14bit() {
        let event = ControlEvent::PitchBend {
            channel: 0,
            value: u16::MAX,
        };

        assert_eq!(event.encode(), [0xE0, 0x7F, 0x7F]);
    }

    #[test]
    fn test_pitch_bend_from_7bit() {
        assert_eq!(convert::pitch_bend_from_7bit(0), 0);
        assert_eq!(convert::pitch_bend_from_7bit(64), 8192);
        assert_eq!(convert::pitch_bend_from_7bit(127), 16256);
    }

    #[test]
    fn test_display_uses_one_based_channel() {
        let event = ControlEvent::ControlChange {
            channel: 0,
            cc: 7,
            value: 32,
        };

        assert_eq!(event.to_string(), "CC ch:1 cc:7 v:32");
    }

    #[test]
    fn test_format_hex() {
        assert_eq!(format_hex(&[0xB0, 0x07, 0x20]), "B0 07 20");
    }
}
