//! Writes every message to a `.syx` file instead of a device. Handy for
//! offline export, for dry runs and for feeding a librarian tool.

use super::{Endpoint, MidiSink, Transport};
use crate::error::{PortUnavailable, TransportError};

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::PathBuf,
};

const BACKEND: &str = "syx-file";

/// A transport with a single pseudo-endpoint: the output file.
#[derive(Debug, Clone)]
pub struct SyxFileTransport {
    path: PathBuf,
}

impl SyxFileTransport {
    /// Targets `path`, which is created or truncated on open.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl Transport for SyxFileTransport {
    fn backend_name(&self) -> &'static str {
        BACKEND
    }

    fn list_endpoints(&self) -> Result<Vec<Endpoint>, PortUnavailable> {
        Ok(vec![Endpoint {
            index: 0,
            name: self.path.to_string_lossy().into_owned(),
        }])
    }

    fn open(&mut self, endpoint: &Endpoint) -> Result<Box<dyn MidiSink>, PortUnavailable> {
        let file = File::create(&self.path).map_err(|e| PortUnavailable::Open {
            endpoint: endpoint.name.clone(),
            reason: e.to_string(),
        })?;

        Ok(Box::new(SyxFileSink {
            writer: Some(BufWriter::new(file)),
        }))
    }
}

struct SyxFileSink {
    writer: Option<BufWriter<File>>,
}

impl MidiSink for SyxFileSink {
    fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
        self.writer
            .as_mut()
            .ok_or_else(|| TransportError::new(BACKEND, "file already closed"))?
            .write_all(message)
            .map_err(|e| TransportError::new(BACKEND, e.to_string()))
    }

    fn close(&mut self) {
        if let Some(mut writer) = self.writer.take() {
            if let Err(e) = writer.flush() {
                log::warn!("Failed to flush .syx file: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::{EndpointSelector, SinkGuard};

    #[test]
    fn writes_messages_back_to_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dump.syx");
        let mut transport = SyxFileTransport::new(&path);

        {
            let mut guard = SinkGuard::open(&mut transport, &EndpointSelector::First).unwrap();
            guard.send(&[0xF0, 0x7D, 0x01, 0xF7]).unwrap();
            guard.send(&[0xF0, 0x7D, 0x02, 0xF7]).unwrap();
        }

        let written = std::fs::read(&path).unwrap();
        assert_eq!(written, vec![0xF0, 0x7D, 0x01, 0xF7, 0xF0, 0x7D, 0x02, 0xF7]);
    }

    #[test]
    fn unwritable_path_is_port_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let mut transport = SyxFileTransport::new(dir.path().join("missing").join("x.syx"));
        assert!(matches!(
            SinkGuard::open(&mut transport, &EndpointSelector::First),
            Err(PortUnavailable::Open { .. })
        ));
    }
}
