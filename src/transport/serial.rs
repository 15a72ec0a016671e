//! Raw MIDI bytes over a serial device, e.g. a DIN-MIDI UART adapter or a
//! microcontroller bridging USB-serial to its MIDI input.

use super::{Endpoint, MidiSink, Transport};
use crate::error::{PortUnavailable, TransportError};

use log::debug;
use serial2::SerialPort;

use std::{path::PathBuf, time::Duration};

const BACKEND: &str = "serial";

/// The MIDI 1.0 DIN baud rate.
pub const MIDI_BAUD: u32 = 31250;

/// Opens serial devices at a fixed baud rate.
#[derive(Debug, Clone)]
pub struct SerialTransport {
    baud: u32,
}

impl Default for SerialTransport {
    fn default() -> Self {
        Self::new(MIDI_BAUD)
    }
}

impl SerialTransport {
    /// A transport opening every device at `baud`.
    pub fn new(baud: u32) -> Self {
        Self { baud }
    }
}

impl Transport for SerialTransport {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn list_endpoints(&self) -> Result<Vec<Endpoint>, PortUnavailable> {
        let ports: Vec<PathBuf> = SerialPort::available_ports()
            .map_err(|e| PortUnavailable::Backend(format!("failed to list serial ports: {}", e)))?;

        Ok(ports
            .into_iter()
            .enumerate()
            .map(|(index, path)| Endpoint {
                index,
                name: path.to_string_lossy().into_owned(),
            })
            .collect())
    }

    fn open(&mut self, endpoint: &Endpoint) -> Result<Box<dyn MidiSink>, PortUnavailable> {
        let port = SerialPort::open(&endpoint.name, self.baud).map_err(|e| PortUnavailable::Open {
            endpoint: endpoint.name.clone(),
            reason: e.to_string(),
        })?;

        debug!("Serial port {} open at {} baud", endpoint.name, self.baud);
        Ok(Box::new(SerialSink {
            port: Some(port),
            baud: self.baud,
            timeout: None,
        }))
    }
}

/// Time the line needs for `len` bytes at `baud` (ten bits per byte on the
/// wire), doubled, plus a fixed margin for the driver.
fn write_timeout(len: usize, baud: u32) -> Duration {
    let bits = len as u64 * 10;
    let wire = Duration::from_micros(bits * 1_000_000 / u64::from(baud.max(1)));
    wire * 2 + Duration::from_millis(100)
}

/// An open serial device.
///
/// The write timeout is stretched to cover each whole message, so a slow
/// line does not cut a long frame short. A write the OS aborts for another
/// reason may still have put part of the message on the wire; there is no
/// way to take those bytes back.
struct SerialSink {
    port: Option<SerialPort>,
    baud: u32,
    timeout: Option<Duration>,
}

impl MidiSink for SerialSink {
    fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| TransportError::new(BACKEND, "port already closed"))?;

        let timeout = write_timeout(message.len(), self.baud);
        if self.timeout != Some(timeout) {
            port.set_write_timeout(timeout)
                .map_err(|e| TransportError::new(BACKEND, e.to_string()))?;
            self.timeout = Some(timeout);
        }

        port.write_all(message)
            .and_then(|_| port.flush())
            .map_err(|e| TransportError::new(BACKEND, e.to_string()))
    }

    fn close(&mut self) {
        // Dropping the handle closes the device.
        self.port.take();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timeout_covers_the_whole_frame() {
        // 8195 bytes at 31250 baud take 2.6224 s on the wire.
        let timeout = write_timeout(8195, MIDI_BAUD);
        assert_eq!(timeout, Duration::from_micros(2_622_400 * 2) + Duration::from_millis(100));
        assert!(write_timeout(1, MIDI_BAUD) >= Duration::from_millis(100));
        assert!(write_timeout(10, 0) > Duration::ZERO);
    }
}
