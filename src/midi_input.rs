//! MIDI input: forwards port events to the engine over a channel.

use crossbeam_channel::Sender;
use failure::{err_msg, Error};
use log::{info, warn};
use midir::{Ignore, MidiInput, MidiInputConnection};

const CLIENT_NAME: &str = "crosswave";

/// One short MIDI message. Sysex and other long messages are dropped
/// at the port.
#[derive(Copy, Clone, Debug)]
pub struct MidiEvent {
    pub data: [u8; 3],
    pub len: usize,
}

impl MidiEvent {
    pub fn from_bytes(msg: &[u8]) -> Option<MidiEvent> {
        if msg.is_empty() || msg.len() > 3 {
            return None;
        }
        let mut data = [0u8; 3];
        data[..msg.len()].copy_from_slice(msg);
        Some(MidiEvent {
            data,
            len: msg.len(),
        })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.data[..self.len]
    }
}

pub struct MidiInputHandler {
    connection: MidiInputConnection<()>,
}

impl MidiInputHandler {
    pub fn list_ports() -> Result<Vec<String>, Error> {
        let input = MidiInput::new(CLIENT_NAME)?;
        let mut names = Vec::new();
        for port in input.ports().iter() {
            names.push(input.port_name(port)?);
        }
        Ok(names)
    }

    /// Connects to the port at `index` and pushes events into
    /// `sender`. Events arriving while the channel is full are
    /// dropped.
    pub fn connect(index: usize, sender: Sender<MidiEvent>) -> Result<MidiInputHandler, Error> {
        let mut input = MidiInput::new(CLIENT_NAME)?;
        input.ignore(Ignore::None);

        let ports = input.ports();
        let port = ports
            .get(index)
            .ok_or_else(|| err_msg(format!("no MIDI input port {}", index)))?;
        info!("connecting to MIDI port \"{}\"", input.port_name(port)?);

        let connection = input
            .connect(
                port,
                CLIENT_NAME,
                move |_timestamp, msg, _| {
                    if let Some(ev) = MidiEvent::from_bytes(msg) {
                        if sender.try_send(ev).is_err() {
                            warn!("MIDI event dropped, engine queue full");
                        }
                    }
                },
                (),
            )
            .map_err(|e| err_msg(format!("MIDI connect failed: {}", e)))?;

        Ok(MidiInputHandler { connection })
    }

    pub fn close(self) {
        self.connection.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_round_trip() {
        let ev = MidiEvent::from_bytes(&[0x90, 60, 100]).unwrap();
        assert_eq!(ev.bytes(), &[0x90, 60, 100]);
        let ev = MidiEvent::from_bytes(&[0xc0, 5]).unwrap();
        assert_eq!(ev.bytes(), &[0xc0, 5]);
    }

    #[test]
    fn long_and_empty_messages_are_dropped() {
        assert!(MidiEvent::from_bytes(&[]).is_none());
        assert!(MidiEvent::from_bytes(&[0xf0, 1, 2, 3, 0xf7]).is_none());
    }
}
