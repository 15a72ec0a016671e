//! Hardware and virtual MIDI outputs through midir.

use super::{Endpoint, MidiSink, Transport};
use crate::error::{PortUnavailable, TransportError};

use log::debug;
use midir::{MidiOutput, MidiOutputConnection};

const BACKEND: &str = "midi";

/// Enumerates and opens the system's MIDI output ports.
#[derive(Debug, Clone)]
pub struct MidiTransport {
    client_name: String,
}

impl Default for MidiTransport {
    fn default() -> Self {
        Self::new("syxsend")
    }
}

impl MidiTransport {
    /// `client_name` is how this program shows up in the MIDI subsystem.
    pub fn new(client_name: &str) -> Self {
        Self {
            client_name: client_name.to_owned(),
        }
    }

    fn output(&self) -> Result<MidiOutput, PortUnavailable> {
        MidiOutput::new(&self.client_name).map_err(|e| {
            PortUnavailable::Backend(format!("failed to create MIDI output: {}", e))
        })
    }
}

impl Transport for MidiTransport {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn list_endpoints(&self) -> Result<Vec<Endpoint>, PortUnavailable> {
        let midi_out = self.output()?;
        Ok(midi_out
            .ports()
            .iter()
            .enumerate()
            .map(|(index, port)| Endpoint {
                index,
                name: midi_out
                    .port_name(port)
                    .unwrap_or_else(|_| "Unknown".to_string()),
            })
            .collect())
    }

    fn open(&mut self, endpoint: &Endpoint) -> Result<Box<dyn MidiSink>, PortUnavailable> {
        let midi_out = self.output()?;
        let ports = midi_out.ports();

        // The port list may have changed since it was shown; insist on the
        // same name at the same position.
        let port = ports
            .get(endpoint.index)
            .filter(|p| midi_out.port_name(p).ok().as_deref() == Some(endpoint.name.as_str()))
            .ok_or_else(|| PortUnavailable::Open {
                endpoint: endpoint.name.clone(),
                reason: "port disappeared".to_owned(),
            })?
            .clone();

        let connection = midi_out
            .connect(&port, &format!("{}-out", self.client_name))
            .map_err(|e| PortUnavailable::Open {
                endpoint: endpoint.name.clone(),
                reason: e.to_string(),
            })?;

        debug!("MIDI output connected to {}", endpoint.name);
        Ok(Box::new(MidiConnection {
            connection: Some(connection),
        }))
    }
}

/// A connected midir output port.
struct MidiConnection {
    connection: Option<MidiOutputConnection>,
}

impl MidiSink for MidiConnection {
    fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        let connection = self
            .connection
            .as_mut()
            .ok_or_else(|| TransportError::new(BACKEND, "connection already closed"))?;

        connection
            .send(message)
            .map_err(|e| TransportError::new(BACKEND, e.to_string()))
    }

    fn close(&mut self) {
        if let Some(connection) = self.connection.take() {
            connection.close();
        }
    }
}

impl Drop for MidiConnection {
    fn drop(&mut self) {
        self.close();
    }
}
