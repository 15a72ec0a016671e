//! The seam between the transfer logic and whatever actually moves bytes.
//!
//! A [`Transport`] lists endpoints and opens one, handing back a
//! [`MidiSink`]. Each [`MidiSink::send`] call is one message at the driver
//! boundary and is assumed atomic: a reported failure means nothing was
//! accepted. [`SinkGuard`] owns an open sink and closes it exactly once on
//! every exit path.

mod midi;
mod serial;
mod syx_file;

pub use midi::MidiTransport;
pub use serial::{SerialTransport, MIDI_BAUD};
pub use syx_file::SyxFileTransport;

use crate::error::{PortUnavailable, TransportError};

use log::info;
use serde::{Deserialize, Serialize};

use std::{
    convert::Infallible,
    fmt,
    ops::{Deref, DerefMut},
    str::FromStr,
};

/// One output endpoint as reported by a backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    /// Position in the backend's listing
    pub index: usize,
    /// Human readable name (port name or device path)
    pub name: String,
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.index, self.name)
    }
}

/// Which endpoint to open.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum EndpointSelector {
    /// The first endpoint listed
    #[default]
    First,
    /// By position in the listing
    Index(usize),
    /// First endpoint whose name contains this text, ignoring case
    Name(String),
}

impl FromStr for EndpointSelector {
    type Err = Infallible;

    /// Digits select by index, anything else by name.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Ok(match s.parse::<usize>() {
            Ok(index) => EndpointSelector::Index(index),
            Err(_) => EndpointSelector::Name(s.to_owned()),
        })
    }
}

impl fmt::Display for EndpointSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EndpointSelector::First => write!(f, "first"),
            EndpointSelector::Index(index) => write!(f, "#{}", index),
            EndpointSelector::Name(name) => write!(f, "{}", name),
        }
    }
}

impl EndpointSelector {
    /// Picks the matching endpoint out of a listing.
    pub fn resolve(&self, endpoints: &[Endpoint]) -> Result<Endpoint, PortUnavailable> {
        if endpoints.is_empty() {
            return Err(PortUnavailable::NoEndpoints);
        }

        let found = match self {
            EndpointSelector::First => endpoints.first(),
            EndpointSelector::Index(index) => endpoints.iter().find(|e| e.index == *index),
            EndpointSelector::Name(name) => {
                let needle = name.to_lowercase();
                endpoints
                    .iter()
                    .find(|e| e.name.to_lowercase().contains(&needle))
            }
        };

        found
            .cloned()
            .ok_or_else(|| PortUnavailable::NoMatch(self.to_string()))
    }
}

/// An open, exclusively owned output endpoint.
pub trait MidiSink {
    /// Sends one message. The caller decides the granularity: a whole frame,
    /// a chunk frame or a single byte all go through here.
    fn send(&mut self, message: &[u8]) -> Result<(), TransportError>;

    /// Releases the endpoint. Calling it again is a no-op.
    fn close(&mut self);
}

/// A backend able to enumerate and open output endpoints.
pub trait Transport {
    /// Short backend name used in logs and errors.
    fn backend_name(&self) -> &'static str;

    /// Lists the available endpoints, possibly none.
    fn list_endpoints(&self) -> Result<Vec<Endpoint>, PortUnavailable>;

    /// Opens `endpoint` for output.
    fn open(&mut self, endpoint: &Endpoint) -> Result<Box<dyn MidiSink>, PortUnavailable>;
}

/// Scoped ownership of an open sink: dropping the guard closes the endpoint,
/// whether the job succeeded, failed, was cancelled or panicked.
pub struct SinkGuard {
    sink: Box<dyn MidiSink>,
    endpoint: Endpoint,
}

impl SinkGuard {
    /// Resolves `selector` against the transport's listing and opens it.
    pub fn open(
        transport: &mut dyn Transport,
        selector: &EndpointSelector,
    ) -> Result<Self, PortUnavailable> {
        let endpoints = transport.list_endpoints()?;
        let endpoint = selector.resolve(&endpoints)?;
        let sink = transport.open(&endpoint)?;
        info!(
            "Opened {} endpoint '{}'",
            transport.backend_name(),
            endpoint.name
        );
        Ok(Self { sink, endpoint })
    }

    /// The endpoint this guard holds.
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

impl Deref for SinkGuard {
    type Target = dyn MidiSink;

    fn deref(&self) -> &Self::Target {
        self.sink.as_ref()
    }
}

impl DerefMut for SinkGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.sink.as_mut()
    }
}

impl Drop for SinkGuard {
    fn drop(&mut self) {
        self.sink.close();
        info!("Closed endpoint '{}'", self.endpoint.name);
    }
}

/// Scripted in-memory transport for exercising the strategy selector.
#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use std::sync::{Arc, Mutex};

    type Reject = Box<dyn FnMut(&[u8]) -> bool + Send>;

    /// What the mock saw, shared with the test after the sink is gone.
    #[derive(Debug, Default)]
    pub struct MockLog {
        /// Messages the sink accepted, in order
        pub accepted: Vec<Vec<u8>>,
        /// Messages the sink refused, in order
        pub rejected: Vec<Vec<u8>>,
        /// How many times `close` actually released the endpoint
        pub closes: usize,
        /// How many sinks were opened
        pub opens: usize,
        /// How many times the endpoints were listed
        pub lists: usize,
    }

    impl MockLog {
        /// Concatenation of every accepted byte.
        pub fn wire(&self) -> Vec<u8> {
            self.accepted.concat()
        }
    }

    pub struct MockSink {
        log: Arc<Mutex<MockLog>>,
        reject: Reject,
        open: bool,
    }

    impl MockSink {
        pub fn new(log: Arc<Mutex<MockLog>>, reject: Reject) -> Self {
            log.lock().unwrap().opens += 1;
            Self {
                log,
                reject,
                open: true,
            }
        }
    }

    impl MidiSink for MockSink {
        fn send(&mut self, message: &[u8]) -> Result<(), TransportError> {
            let mut log = self.log.lock().unwrap();
            if !self.open {
                return Err(TransportError::new("mock", "endpoint closed"));
            }
            if (self.reject)(message) {
                log.rejected.push(message.to_vec());
                Err(TransportError::new(
                    "mock",
                    format!("rejected {} byte message", message.len()),
                ))
            } else {
                log.accepted.push(message.to_vec());
                Ok(())
            }
        }

        fn close(&mut self) {
            if self.open {
                self.open = false;
                self.log.lock().unwrap().closes += 1;
            }
        }
    }

    pub struct MockTransport {
        pub endpoints: Vec<String>,
        pub log: Arc<Mutex<MockLog>>,
        pub refuse_open: bool,
        reject: Option<Reject>,
    }

    impl MockTransport {
        /// A transport with one endpoint whose sink refuses messages for
        /// which `reject` returns true.
        pub fn new(reject: impl FnMut(&[u8]) -> bool + Send + 'static) -> Self {
            Self {
                endpoints: vec!["Mock Synth".to_owned()],
                log: Arc::new(Mutex::new(MockLog::default())),
                refuse_open: false,
                reject: Some(Box::new(reject)),
            }
        }

        /// A transport whose sink accepts everything.
        pub fn accepting() -> Self {
            Self::new(|_| false)
        }
    }

    impl Transport for MockTransport {
        fn backend_name(&self) -> &'static str {
            "mock"
        }

        fn list_endpoints(&self) -> Result<Vec<Endpoint>, PortUnavailable> {
            self.log.lock().unwrap().lists += 1;
            Ok(self
                .endpoints
                .iter()
                .enumerate()
                .map(|(index, name)| Endpoint {
                    index,
                    name: name.clone(),
                })
                .collect())
        }

        fn open(&mut self, endpoint: &Endpoint) -> Result<Box<dyn MidiSink>, PortUnavailable> {
            if self.refuse_open {
                return Err(PortUnavailable::Open {
                    endpoint: endpoint.name.clone(),
                    reason: "busy".to_owned(),
                });
            }
            let reject = self.reject.take().unwrap_or_else(|| Box::new(|_: &[u8]| false));
            Ok(Box::new(MockSink::new(self.log.clone(), reject)))
        }
    }
}
