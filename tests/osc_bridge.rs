//! End-to-end tests: OSC datagrams in, control events out

use anyhow::Result;
use parking_lot::Mutex;
use rosc::{encoder, OscBundle, OscMessage, OscPacket, OscTime, OscType};
use std::net::{Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::UdpSocket;

use osc_midi_companion::config::AppConfig;
use osc_midi_companion::midi::ControlEvent;
use osc_midi_companion::output::OutputEmitter;
use osc_midi_companion::server::{OscServer, ServerHandle};
use osc_midi_companion::translator::Translator;

#[derive(Default)]
struct RecordingOutput {
    events: Mutex<Vec<ControlEvent>>,
}

impl OutputEmitter for RecordingOutput {
    fn name(&self) -> &str {
        "recording"
    }

    fn send(&self, event: &ControlEvent) {
        self.events.lock().push(*event);
    }
}

fn control(topic: &str, value: f32, channel: i32, number: i32) -> OscPacket {
    OscPacket::Message(OscMessage {
        addr: format!("/virtuoso/remote/{}", topic),
        args: vec![
            OscType::Float(value),
            OscType::Int(channel),
            OscType::Int(number),
        ],
    })
}

fn encode(packet: &OscPacket) -> Result<Vec<u8>> {
    encoder::encode(packet).map_err(|e| anyhow::anyhow!("Failed to encode OSC: {:?}", e))
}

async fn wait_for_events(output: &RecordingOutput, count: usize) -> Vec<ControlEvent> {
    for _ in 0..100 {
        if output.events.lock().len() >= count {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    output.events.lock().clone()
}

async fn start(config: &AppConfig) -> Result<(SocketAddr, Arc<RecordingOutput>, ServerHandle)> {
    let output = Arc::new(RecordingOutput::default());
    let translator = Arc::new(Mutex::new(Translator::new(config, output.clone())));

    let server = OscServer::bind_addr(SocketAddr::from((Ipv4Addr::LOCALHOST, 0))).await?;
    let addr = server.local_addr()?;

    Ok((addr, output, server.spawn(translator)))
}

#[tokio::test]
async fn test_datagrams_become_midi_events() -> Result<()> {
    let config = AppConfig::from_yaml_str("settings:\n  max_parameter_message_rate: 0\n")?;
    let (addr, output, server) = start(&config).await?;

    let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;
    for packet in [
        control("noteon", 1.0, 1, 60),
        control("parameter", 0.5, 5, 128),
        control("volume", 0.25, 2, 99),
    ] {
        client.send_to(&encode(&packet)?, addr).await?;
    }

    let events = wait_for_events(&output, 3).await;
    assert_eq!(
        events,
        vec![
            ControlEvent::NoteOn {
                channel: 0,
                note: 60,
                velocity: 127
            },
            ControlEvent::PitchBend {
                channel: 4,
                value: 8192
            },
            ControlEvent::ControlChange {
                channel: 1,
                cc: 7,
                value: 32
            },
        ]
    );

    let stats = server.stop().await;
    assert_eq!(stats.datagrams, 3);
    assert_eq!(stats.emitted, 3);
    Ok(())
}

#[tokio::test]
async fn test_bundles_garbage_and_malformed_messages() -> Result<()> {
    let config = AppConfig::from_yaml_str(
        r#"
settings:
  max_parameter_message_rate: 0
  remap_parameters: true
parameter_remapping:
  1: 74
invert_parameters: "74"
"#,
    )?;
    let (addr, output, server) = start(&config).await?;
    let client = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await?;

    // Undecodable bytes are skipped
    client.send_to(b"not osc at all", addr).await?;

    // Wrong shape, dropped without output
    let malformed = OscPacket::Message(OscMessage {
        addr: "/noteon".to_string(),
        args: vec![OscType::Float(1.0)],
    });
    client.send_to(&encode(&malformed)?, addr).await?;

    let bundle = OscPacket::Bundle(OscBundle {
        timetag: OscTime::from((0, 1)),
        content: vec![
            control("connect", 0.0, 0, 0),
            control("parameter", 0.0, 1, 1),
            control("noteoff", 0.9, 2, 61),
        ],
    });
    client.send_to(&encode(&bundle)?, addr).await?;

    let events = wait_for_events(&output, 2).await;
    assert_eq!(
        events,
        vec![
            ControlEvent::ControlChange {
                channel: 0,
                cc: 74,
                value: 127
            },
            ControlEvent::NoteOff {
                channel: 1,
                note: 61,
                velocity: 0
            },
        ]
    );

    let stats = server.stop().await;
    assert_eq!(stats.datagrams, 3);
    assert_eq!(stats.decode_errors, 1);
    assert_eq!(stats.messages, 4);
    assert_eq!(stats.emitted, 2);
    Ok(())
}
