//! OSC → MIDI translation
//!
//! The translator classifies each inbound message by topic, resolves its
//! numeric fields into MIDI ranges, applies the configured parameter
//! transforms and hands the result to the output.
//!
//! All state that survives between messages lives here: the rate window and
//! the one-shot malformed-message warning. Callers that receive messages on
//! several threads must serialize calls (see [`crate::server`]).

use rosc::OscMessage;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::config::{AppConfig, ParameterTransforms, Settings, PITCH_WHEEL_PARAMETER};
use crate::message::{InboundMessage, Topic};
use crate::midi::{convert, ControlEvent, CC_CHANNEL_VOLUME, MAX_DATA_7BIT};
use crate::output::OutputEmitter;
use crate::rate_limiter::{RateLimiter, RateSnapshot};
use crate::session::{self, SessionEvent};

/// What happened to an inbound message
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    /// An event was handed to the output
    Emitted(ControlEvent),
    /// Dropped by the rate limiter
    RateLimited(Topic),
    /// Handshake notification, nothing sent
    Session(SessionEvent),
    /// Wrong address or payload shape, dropped
    Malformed,
    /// Well-formed but unknown topic, ignored
    Unsupported(String),
}

/// Scale a normalised float to a 7-bit value: `clamp(round(f * 128), 0, 127)`
pub fn resolve_value(value: f32) -> u8 {
    // NaN casts to 0
    (value * 128.0).round().clamp(0.0, MAX_DATA_7BIT as f32) as u8
}

/// Convert the remote's 1-based channel to a 0-based MIDI channel
pub fn resolve_channel(channel: i32) -> u8 {
    channel.saturating_sub(1).clamp(0, 15) as u8
}

/// Clamp a note/controller number to `0..=max`
pub fn resolve_number(number: i32, max: u8) -> u8 {
    number.clamp(0, max as i32) as u8
}

/// Parameter number: an exact 128 is the pitch wheel, anything else clamps to `0..=127`
pub fn resolve_parameter_number(number: i32) -> u8 {
    if number == PITCH_WHEEL_PARAMETER as i32 {
        PITCH_WHEEL_PARAMETER
    } else {
        resolve_number(number, MAX_DATA_7BIT)
    }
}

/// Mirror a 7-bit value: `127 - value`
pub fn invert(value: u8) -> u8 {
    MAX_DATA_7BIT - value.min(MAX_DATA_7BIT)
}

/// Message classifier and transformer
pub struct Translator {
    settings: Settings,
    transforms: ParameterTransforms,
    limiter: RateLimiter,
    output: Arc<dyn OutputEmitter>,
    warned_malformed: bool,
    malformed_count: u64,
}

impl Translator {
    /// Build a translator from the loaded configuration
    pub fn new(config: &AppConfig, output: Arc<dyn OutputEmitter>) -> Self {
        let limiter = RateLimiter::new(
            config.settings.max_parameter_message_rate,
            config.settings.verbose_logging,
        );
        Self::with_limiter(
            config.settings.clone(),
            config.parameter_transforms(),
            limiter,
            output,
        )
    }

    /// Build a translator around an explicit limiter (deterministic tests)
    pub fn with_limiter(
        settings: Settings,
        transforms: ParameterTransforms,
        limiter: RateLimiter,
        output: Arc<dyn OutputEmitter>,
    ) -> Self {
        Self {
            settings,
            transforms,
            limiter,
            output,
            warned_malformed: false,
            malformed_count: 0,
        }
    }

    /// Handle one OSC message received now
    pub fn handle(&mut self, msg: &OscMessage) -> Outcome {
        self.handle_at(msg, Instant::now())
    }

    /// Handle one OSC message received at `now`
    pub fn handle_at(&mut self, msg: &OscMessage, now: Instant) -> Outcome {
        match InboundMessage::from_osc(msg) {
            Ok(inbound) => self.dispatch(&inbound, now),
            Err(e) => {
                self.malformed_count += 1;
                if !self.warned_malformed {
                    self.warned_malformed = true;
                    warn!(
                        "Received message with incorrect format at '{}' ({}). \
                         Make sure you have the latest version of the companion. \
                         Further malformed messages will be ignored silently.",
                        msg.addr, e
                    );
                }
                Outcome::Malformed
            }
        }
    }

    fn dispatch(&mut self, inbound: &InboundMessage, now: Instant) -> Outcome {
        let topic = match inbound.topic() {
            Some(topic) => topic,
            None => {
                if self.settings.verbose_logging {
                    info!("Message not implemented: {}", inbound.address());
                }
                return Outcome::Unsupported(inbound.topic_name().to_string());
            }
        };

        match topic {
            Topic::Connect => Outcome::Session(session::handle_connect(inbound.channel)),
            Topic::Disconnect => Outcome::Session(session::handle_disconnect()),
            Topic::NoteOn | Topic::NoteOff | Topic::Parameter | Topic::Volume => {
                if topic.is_continuous() && self.limiter.should_drop_at(now) {
                    return Outcome::RateLimited(topic);
                }

                let event = self.resolve(topic, inbound);
                if self.settings.verbose_logging {
                    info!("{} -> {}", inbound.address(), event);
                } else {
                    debug!("{} -> {}", inbound.address(), event);
                }

                self.output.send(&event);
                Outcome::Emitted(event)
            }
        }
    }

    /// Resolve a control topic into an output event
    fn resolve(&self, topic: Topic, inbound: &InboundMessage) -> ControlEvent {
        let value = resolve_value(inbound.value);
        let channel = resolve_channel(inbound.channel);

        match topic {
            Topic::NoteOn => ControlEvent::NoteOn {
                channel,
                note: resolve_number(inbound.number, MAX_DATA_7BIT),
                velocity: value,
            },
            Topic::NoteOff => ControlEvent::NoteOff {
                channel,
                note: resolve_number(inbound.number, MAX_DATA_7BIT),
                velocity: 0,
            },
            Topic::Volume => ControlEvent::ControlChange {
                channel,
                cc: CC_CHANNEL_VOLUME,
                value,
            },
            _ => {
                let mut number = resolve_parameter_number(inbound.number);
                if self.settings.remap_parameters {
                    number = self.transforms.remap(number);
                }

                let value = if self.transforms.is_inverted(number) {
                    invert(value)
                } else {
                    value
                };

                if number == PITCH_WHEEL_PARAMETER {
                    ControlEvent::PitchBend {
                        channel,
                        value: convert::pitch_bend_from_7bit(value),
                    }
                } else {
                    ControlEvent::ControlChange {
                        channel,
                        cc: number,
                        value,
                    }
                }
            }
        }
    }

    /// Number of malformed-message warnings logged (0 or 1 per run)
    pub fn malformed_warnings(&self) -> u32 {
        self.warned_malformed as u32
    }

    /// Number of malformed messages seen, warned or not
    pub fn malformed_count(&self) -> u64 {
        self.malformed_count
    }

    pub fn rate_snapshot(&self) -> RateSnapshot {
        self.limiter.snapshot()
    }

    pub fn output_name(&self) -> &str {
        self.output.name()
    }
}
