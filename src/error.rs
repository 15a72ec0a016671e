//! The error kinds a transfer can run into, from reading the source file to
//! the last byte handed to the MIDI driver.
//!
//! Only [`TransportError`]s are recoverable: the strategy selector in
//! [`crate::transmission`] swallows them and escalates to the next strategy.
//! Everything else aborts the job before or instead of transmission.

use crate::{gui::SelectorError, transmission::TransmissionFailure};

use std::{borrow::Cow, error::Error, fmt, io, path::PathBuf};

/// Problems with the input file. Always raised before any endpoint is opened.
#[derive(Debug)]
pub enum InputError {
    /// The file is missing or unreadable.
    Io {
        /// Path we tried to read
        path: PathBuf,
        /// What the OS said
        source: io::Error,
    },

    /// The text file holds no `0x...` literal at all.
    NoHexLiterals {
        /// Path of the scanned file
        path: PathBuf,
    },

    /// The WAV file is not mono.
    WavChannels {
        /// Channel count found in the header
        channels: u16,
    },

    /// The WAV file does not store 4-byte samples.
    WavSampleWidth {
        /// Bits per sample found in the header
        bits: u16,
    },

    /// The WAV file stores IEEE floats rather than integer PCM.
    WavSampleFormat,

    /// hound could not parse the container or a sample.
    Wav(hound::Error),

    /// The source produced zero values, so there is nothing to frame.
    EmptyPayload,
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        use InputError as IE;
        let msg = match self {
            IE::Io { path, source } => {
                Cow::from(format!("cannot read '{}': {}", path.display(), source))
            }
            IE::NoHexLiterals { path } => {
                Cow::from(format!("no hex literals found in '{}'", path.display()))
            }
            IE::WavChannels { channels } => Cow::from(format!(
                "WAV file must be mono, found {} channels",
                channels
            )),
            IE::WavSampleWidth { bits } => Cow::from(format!(
                "WAV file must use 32-bit samples, found {} bits",
                bits
            )),
            IE::WavSampleFormat => Cow::from("WAV file must hold integer PCM, not float"),
            IE::Wav(error) => Cow::from(format!("wav error: {}", error)),
            IE::EmptyPayload => Cow::from("nothing to send, the payload is empty"),
        };

        write!(f, "{}", msg)
    }
}

impl Error for InputError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            InputError::Io { source, .. } => Some(source),
            InputError::Wav(error) => Some(error),
            _ => None,
        }
    }
}

impl From<hound::Error> for InputError {
    fn from(value: hound::Error) -> Self {
        Self::Wav(value)
    }
}

/// A configuration *file* that could not be loaded. Out-of-range values are
/// not errors, they are replaced by defaults in [`crate::config`].
#[derive(Debug)]
pub enum ConfigError {
    /// Reading or writing the file failed.
    Io(io::Error),

    /// The RON text did not parse.
    Ron(ron::de::SpannedError),

    /// Serializing the config failed.
    Serialize(ron::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigError::Io(error) => write!(f, "config io error: {}", error),
            ConfigError::Ron(error) => write!(f, "config parse error: {}", error),
            ConfigError::Serialize(error) => write!(f, "config serialize error: {}", error),
        }
    }
}

impl Error for ConfigError {}

/// A single send (or close) rejected by the driver or OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportError {
    backend: &'static str,
    message: String,
}

impl TransportError {
    /// Wraps a backend failure description.
    pub fn new(backend: &'static str, message: impl Into<String>) -> Self {
        Self {
            backend,
            message: message.into(),
        }
    }

    /// Name of the backend that failed, e.g. `"midi"`.
    pub fn backend(&self) -> &'static str {
        self.backend
    }

    /// The driver's description of the failure.
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for TransportError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{} send failed: {}", self.backend, self.message)
    }
}

impl Error for TransportError {}

/// The endpoint could not be found or opened. The job never starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PortUnavailable {
    /// The backend reports no output endpoints.
    NoEndpoints,

    /// The selector did not match any listed endpoint.
    NoMatch(String),

    /// The endpoint exists but refused the connection.
    Open {
        /// Endpoint name
        endpoint: String,
        /// Driver message
        reason: String,
    },

    /// The backend itself could not be initialised.
    Backend(String),
}

impl fmt::Display for PortUnavailable {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            PortUnavailable::NoEndpoints => write!(f, "no output endpoints available"),
            PortUnavailable::NoMatch(selector) => {
                write!(f, "no output endpoint matches '{}'", selector)
            }
            PortUnavailable::Open { endpoint, reason } => {
                write!(f, "failed to open '{}': {}", endpoint, reason)
            }
            PortUnavailable::Backend(reason) => write!(f, "backend unavailable: {}", reason),
        }
    }
}

impl Error for PortUnavailable {}

/// The user interrupted the job during a send or a pacing delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "cancelled by user")
    }
}

impl Error for Cancelled {}

/// Everything [`crate::pipeline::run`] can fail with.
#[derive(Debug)]
pub enum SysexError {
    /// See [`InputError`]
    Input(InputError),
    /// See [`ConfigError`]
    Config(ConfigError),
    /// See [`PortUnavailable`]
    PortUnavailable(PortUnavailable),
    /// Every strategy failed; see [`TransmissionFailure`]
    Transmission(TransmissionFailure),
    /// The endpoint selector UI failed
    Selector(SelectorError),
    /// See [`Cancelled`]
    Cancelled,
}

impl fmt::Display for SysexError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            SysexError::Input(error) => write!(f, "input error: {}", error),
            SysexError::Config(error) => write!(f, "{}", error),
            SysexError::PortUnavailable(error) => write!(f, "port unavailable: {}", error),
            SysexError::Transmission(failure) => write!(f, "{}", failure),
            SysexError::Selector(error) => write!(f, "{}", error),
            SysexError::Cancelled => write!(f, "{}", Cancelled),
        }
    }
}

impl Error for SysexError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            SysexError::Input(error) => Some(error),
            SysexError::Config(error) => Some(error),
            SysexError::PortUnavailable(error) => Some(error),
            SysexError::Transmission(failure) => Some(failure),
            SysexError::Selector(error) => Some(error),
            SysexError::Cancelled => None,
        }
    }
}

impl From<InputError> for SysexError {
    fn from(value: InputError) -> Self {
        Self::Input(value)
    }
}

impl From<ConfigError> for SysexError {
    fn from(value: ConfigError) -> Self {
        Self::Config(value)
    }
}

impl From<PortUnavailable> for SysexError {
    fn from(value: PortUnavailable) -> Self {
        Self::PortUnavailable(value)
    }
}

impl From<TransmissionFailure> for SysexError {
    fn from(value: TransmissionFailure) -> Self {
        Self::Transmission(value)
    }
}

impl From<SelectorError> for SysexError {
    fn from(value: SelectorError) -> Self {
        Self::Selector(value)
    }
}

impl From<Cancelled> for SysexError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}
