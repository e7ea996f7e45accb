//! Inbound OSC control messages
//!
//! Every control message the remote app sends has the shape
//! `/<app>/<scope>/<topic>` with exactly three arguments
//! `(float value, int channel, int number)`.

use rosc::{OscMessage, OscType};
use std::fmt;
use thiserror::Error;

/// Number of `/`-separated address segments
pub const ADDRESS_PARTS: usize = 3;

/// Number of payload elements
pub const DATA_PARTS: usize = 3;

/// Message intent, taken from the last address segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Connect,
    Disconnect,
    NoteOn,
    NoteOff,
    Parameter,
    Volume,
}

impl Topic {
    /// Exact lowercase match; anything else is not a known topic
    pub fn parse(segment: &str) -> Option<Self> {
        match segment {
            "connect" => Some(Topic::Connect),
            "disconnect" => Some(Topic::Disconnect),
            "noteon" => Some(Topic::NoteOn),
            "noteoff" => Some(Topic::NoteOff),
            "parameter" => Some(Topic::Parameter),
            "volume" => Some(Topic::Volume),
            _ => None,
        }
    }

    /// Whether this topic is subject to rate limiting
    pub fn is_continuous(&self) -> bool {
        matches!(self, Topic::Parameter | Topic::Volume)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Topic::Connect => "connect",
            Topic::Disconnect => "disconnect",
            Topic::NoteOn => "noteon",
            Topic::NoteOff => "noteoff",
            Topic::Parameter => "parameter",
            Topic::Volume => "volume",
        };
        f.write_str(name)
    }
}

/// Why an inbound message could not be interpreted
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MalformedMessage {
    #[error("expected 3 address parts and 3 arguments, got {address_parts} and {data_parts}")]
    Shape {
        address_parts: usize,
        data_parts: usize,
    },

    #[error("argument {index} has unsupported type {kind}")]
    ArgumentType { index: usize, kind: &'static str },
}

/// A control message with a validated shape
#[derive(Debug, Clone, PartialEq)]
pub struct InboundMessage {
    pub segments: [String; ADDRESS_PARTS],
    /// Normalised value, nominally 0.0-1.0
    pub value: f32,
    /// 1-based channel as sent by the remote
    pub channel: i32,
    /// Note or parameter number
    pub number: i32,
}

impl InboundMessage {
    /// Validate the shape of an OSC message and extract its payload
    pub fn from_osc(msg: &OscMessage) -> Result<Self, MalformedMessage> {
        let parts: Vec<&str> = msg.addr.trim_start_matches('/').split('/').collect();

        if parts.len() != ADDRESS_PARTS
            || msg.args.len() != DATA_PARTS
            || parts.iter().any(|part| part.is_empty())
        {
            return Err(MalformedMessage::Shape {
                address_parts: parts.len(),
                data_parts: msg.args.len(),
            });
        }

        let value = arg_as_f32(&msg.args[0]).ok_or(MalformedMessage::ArgumentType {
            index: 0,
            kind: type_name(&msg.args[0]),
        })?;
        let channel = arg_as_i32(&msg.args[1]).ok_or(MalformedMessage::ArgumentType {
            index: 1,
            kind: type_name(&msg.args[1]),
        })?;
        let number = arg_as_i32(&msg.args[2]).ok_or(MalformedMessage::ArgumentType {
            index: 2,
            kind: type_name(&msg.args[2]),
        })?;

        Ok(Self {
            segments: [
                parts[0].to_string(),
                parts[1].to_string(),
                parts[2].to_string(),
            ],
            value,
            channel,
            number,
        })
    }

    /// The raw topic segment
    pub fn topic_name(&self) -> &str {
        &self.segments[ADDRESS_PARTS - 1]
    }

    pub fn topic(&self) -> Option<Topic> {
        Topic::parse(self.topic_name())
    }

    /// Address in its `/a/b/c` form
    pub fn address(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

fn arg_as_f32(arg: &OscType) -> Option<f32> {
    match *arg {
        OscType::Float(f) => Some(f),
        OscType::Double(d) => Some(d as f32),
        OscType::Int(i) => Some(i as f32),
        OscType::Long(l) => Some(l as f32),
        _ => None,
    }
}

fn arg_as_i32(arg: &OscType) -> Option<i32> {
    match *arg {
        OscType::Int(i) => Some(i),
        OscType::Long(l) => Some(l.clamp(i32::MIN as i64, i32::MAX as i64) as i32),
        // `as` saturates, NaN becomes 0
        OscType::Float(f) => Some(f as i32),
        OscType::Double(d) => Some(d as i32),
        _ => None,
    }
}

fn type_name(arg: &OscType) -> &'static str {
    match arg {
        OscType::Int(_) => "int",
        OscType::Float(_) => "float",
        OscType::String(_) => "string",
        OscType::Blob(_) => "blob",
        OscType::Long(_) => "long",
        OscType::Double(_) => "double",
        OscType::Bool(_) => "bool",
        OscType::Nil => "nil",
        _ => "other",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn osc(addr: &str, args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: addr.to_string(),
            args,
        }
    }

    #[test]
    fn test_parses_well_formed_message() {
        let msg = osc(
            "/virtuoso/remote/noteon",
            vec![OscType::Float(1.0), OscType::Int(1), OscType::Int(60)],
        );
        let inbound = InboundMessage::from_osc(&msg).unwrap();

        assert_eq!(inbound.topic(), Some(Topic::NoteOn));
        assert_eq!(inbound.topic_name(), "noteon");
        assert_eq!(inbound.value, 1.0);
        assert_eq!(inbound.channel, 1);
        assert_eq!(inbound.number, 60);
        assert_eq!(inbound.address(), "/virtuoso/remote/noteon");
    }

    #[test]
    fn test_rejects_wrong_address_arity() {
        let msg = osc(
            "/x/noteon",
            vec![OscType::Float(1.0), OscType::Int(1), OscType::Int(60)],
        );

        assert_eq!(
            InboundMessage::from_osc(&msg),
            Err(MalformedMessage::Shape {
                address_parts: 2,
                data_parts: 3
            })
        );
    }

    #[test]
    fn test_rejects_wrong_payload_arity() {
        let msg = osc("/x/y/noteon", vec![OscType::Float(1.0), OscType::Int(1)]);

        assert!(matches!(
            InboundMessage::from_osc(&msg),
            Err(MalformedMessage::Shape { data_parts: 2, .. })
        ));
    }

    #[test]
    fn test_rejects_empty_segment() {
        let msg = osc(
            "/x//noteon",
            vec![OscType::Float(1.0), OscType::Int(1), OscType::Int(60)],
        );

        assert!(InboundMessage::from_osc(&msg).is_err());
    }

    #[test]
    fn test_rejects_non_numeric_argument() {
        let msg = osc(
            "/x/y/parameter",
            vec![
                OscType::Float(0.5),
                OscType::String("one".to_string()),
                OscType::Int(60),
            ],
        );

        assert_eq!(
            InboundMessage::from_osc(&msg),
            Err(MalformedMessage::ArgumentType {
                index: 1,
                kind: "string"
            })
        );
    }

    #[test]
    fn test_accepts_wide_numeric_types() {
        let msg = osc(
            "/x/y/volume",
            vec![OscType::Double(0.25), OscType::Long(2), OscType::Float(99.7)],
        );
        let inbound = InboundMessage::from_osc(&msg).unwrap();

        assert_eq!(inbound.value, 0.25);
        assert_eq!(inbound.channel, 2);
        assert_eq!(inbound.number, 99);
    }

    #[test]
    fn test_unknown_topic_is_not_an_error() {
        let msg = osc(
            "/x/y/sysex",
            vec![OscType::Float(0.0), OscType::Int(1), OscType::Int(1)],
        );
        let inbound = InboundMessage::from_osc(&msg).unwrap();

        assert_eq!(inbound.topic(), None);
        assert_eq!(inbound.topic_name(), "sysex");
    }

    #[test]
    fn test_topic_match_is_case_sensitive() {
        assert_eq!(Topic::parse("NoteOn"), None);
        assert_eq!(Topic::parse("noteon"), Some(Topic::NoteOn));
        assert!(Topic::Volume.is_continuous());
        assert!(!Topic::NoteOff.is_continuous());
    }
}
