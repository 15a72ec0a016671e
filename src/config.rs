//! Transfer configuration: loaded from a RON file, overridden from the
//! command line, then sanitised into [`TransferSettings`].
//!
//! Out-of-range values never abort a transfer. They are replaced by the
//! documented default and a warning is logged.
//!
//! ```text
//! (
//!     manufacturer_id: 0x7D,
//!     mode: Fallback,
//!     chunk_size: Some(1024),
//!     endpoint: Name("Freetribe"),
//!     backend: Midi,
//! )
//! ```

use crate::{
    chunk_planner::{CHUNK_CEILING, CHUNK_FLOOR},
    encoder::QUINTET_LEN,
    error::ConfigError,
    pacing::PacingPolicy,
    transmission::{ChunkPolicy, TransferMode},
    transport::{EndpointSelector, MIDI_BAUD},
    value_source::ValueSource,
};

use log::warn;
use serde::{Deserialize, Serialize};

use std::{
    fs,
    ops::RangeInclusive,
    path::{Path, PathBuf},
    time::Duration,
};

/// Manufacturer ID used when none (or garbage) is given. `0x7D` is the MIDI
/// "non-commercial / educational use" ID.
pub const DEFAULT_MANUFACTURER_ID: u8 = 0x7D;

/// Chunk bounds and default for the fallback mode.
pub const FALLBACK_CHUNK_RANGE: RangeInclusive<usize> = CHUNK_FLOOR..=CHUNK_CEILING;
/// Default chunk size for the fallback mode.
pub const FALLBACK_CHUNK_DEFAULT: usize = 1024;

/// Chunk bounds for the chunked-only mode.
pub const CHUNKED_CHUNK_RANGE: RangeInclusive<usize> = 32..=4096;
/// Default chunk size for the chunked-only mode.
pub const CHUNKED_CHUNK_DEFAULT: usize = 256;

/// Samples per frame bounds for WAV sources.
pub const SAMPLES_PER_CHUNK_RANGE: RangeInclusive<usize> = 1..=1024;
/// Default samples per frame for WAV sources (640 payload bytes).
pub const SAMPLES_PER_CHUNK_DEFAULT: usize = 128;

const FALLBACK_CHUNK_DELAY_MS: u64 = 50;
const CHUNKED_CHUNK_DELAY_MS: u64 = 200;
const BYTE_DELAY_MS: u64 = 1;
const SETTLE_MS: u64 = 500;

/// Where the bytes go.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Backend {
    /// A MIDI output port
    #[default]
    Midi,
    /// A serial device carrying raw MIDI bytes
    Serial {
        /// Line speed
        baud: u32,
    },
    /// A `.syx` file
    SyxFile {
        /// Output path
        path: PathBuf,
    },
}

impl Backend {
    /// A serial backend at the DIN-MIDI rate.
    pub fn serial() -> Self {
        Backend::Serial { baud: MIDI_BAUD }
    }
}

/// Everything the user can configure, as written in the config file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// 7-bit manufacturer ID placed after `F0`
    pub manufacturer_id: u8,
    /// Strategy list for hex sources; WAV sources always stream chunks
    pub mode: TransferMode,
    /// Payload bytes per frame; `None` picks the mode's default
    pub chunk_size: Option<usize>,
    /// Samples per frame for WAV sources
    pub samples_per_chunk: usize,
    /// Pause after each chunk frame; `None` picks the mode's default
    pub chunk_delay_ms: Option<u64>,
    /// Pause after each byte of the byte-wise strategy
    pub byte_delay_ms: u64,
    /// Pause after a successful job before the endpoint is closed
    pub settle_ms: u64,
    /// Which endpoint to open
    pub endpoint: EndpointSelector,
    /// Which backend to open it on
    pub backend: Backend,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            manufacturer_id: DEFAULT_MANUFACTURER_ID,
            mode: TransferMode::Fallback,
            chunk_size: None,
            samples_per_chunk: SAMPLES_PER_CHUNK_DEFAULT,
            chunk_delay_ms: None,
            byte_delay_ms: BYTE_DELAY_MS,
            settle_ms: SETTLE_MS,
            endpoint: EndpointSelector::First,
            backend: Backend::Midi,
        }
    }
}

/// Validated, ready-to-use settings for one job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferSettings {
    /// Masked manufacturer ID
    pub manufacturer_id: u8,
    /// Strategy list
    pub mode: TransferMode,
    /// Chunk sizing for the chunked strategy
    pub chunk_policy: ChunkPolicy,
    /// Inter-send delays
    pub pacing: PacingPolicy,
    /// Pause before closing after success
    pub settle: Duration,
    /// Endpoint to open
    pub endpoint: EndpointSelector,
    /// Backend to open it on
    pub backend: Backend,
}

impl TransferConfig {
    /// Loads a RON config. Missing fields take their defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(ConfigError::Io)?;
        ron::from_str(&text).map_err(ConfigError::Ron)
    }

    /// Writes the config as pretty RON.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(ConfigError::Serialize)?;
        fs::write(path, text).map_err(ConfigError::Io)
    }

    /// Resolves the settings for a job reading from `source`, substituting
    /// defaults for anything out of range.
    pub fn settings_for(&self, source: &ValueSource) -> TransferSettings {
        let manufacturer_id = mask_manufacturer_id(self.manufacturer_id);

        let (mode, chunk_policy) = match source {
            ValueSource::Wav(_) => {
                if let Some(size) = self.chunk_size {
                    warn!(
                        "Chunk size {} ignored for WAV input, frames hold samples per chunk",
                        size
                    );
                }
                let samples = bounded(
                    "samples per chunk",
                    self.samples_per_chunk,
                    &SAMPLES_PER_CHUNK_RANGE,
                    SAMPLES_PER_CHUNK_DEFAULT,
                );
                let bytes = (samples * QUINTET_LEN).min(CHUNK_CEILING);
                (TransferMode::Chunked, ChunkPolicy::Fixed(bytes))
            }
            ValueSource::HexText(_) => match self.mode {
                TransferMode::Fallback => (
                    TransferMode::Fallback,
                    ChunkPolicy::Adaptive(self.chunk_size_or_default(
                        &FALLBACK_CHUNK_RANGE,
                        FALLBACK_CHUNK_DEFAULT,
                    )),
                ),
                TransferMode::Chunked => (
                    TransferMode::Chunked,
                    ChunkPolicy::Fixed(
                        self.chunk_size_or_default(&CHUNKED_CHUNK_RANGE, CHUNKED_CHUNK_DEFAULT),
                    ),
                ),
            },
        };

        let chunk_delay_ms = self.chunk_delay_ms.unwrap_or(match mode {
            TransferMode::Fallback => FALLBACK_CHUNK_DELAY_MS,
            TransferMode::Chunked => CHUNKED_CHUNK_DELAY_MS,
        });

        TransferSettings {
            manufacturer_id,
            mode,
            chunk_policy,
            pacing: PacingPolicy {
                chunk_delay: Duration::from_millis(chunk_delay_ms),
                byte_delay: Duration::from_millis(self.byte_delay_ms),
            },
            settle: Duration::from_millis(self.settle_ms),
            endpoint: self.endpoint.clone(),
            backend: self.backend.clone(),
        }
    }

    fn chunk_size_or_default(&self, range: &RangeInclusive<usize>, default: usize) -> usize {
        match self.chunk_size {
            Some(size) => bounded("chunk size", size, range, default),
            None => default,
        }
    }
}

fn bounded(what: &str, value: usize, range: &RangeInclusive<usize>, default: usize) -> usize {
    if range.contains(&value) {
        value
    } else {
        warn!(
            "Invalid {} {} (must be {}-{}), using {}",
            what,
            value,
            range.start(),
            range.end(),
            default
        );
        default
    }
}

fn mask_manufacturer_id(id: u8) -> u8 {
    if id > 0x7F {
        warn!(
            "Manufacturer ID {:#04X} is wider than 7 bits, sending {:#04X}",
            id,
            id & 0x7F
        );
    }
    id & 0x7F
}

/// Parses a manufacturer ID typed as hex (`"7D"`, `"0x7D"`), keeping only
/// the low 7 bits. `None` if the text is not hex at all.
pub fn parse_manufacturer_id(text: &str) -> Option<u8> {
    let text = text.trim();
    let digits = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))
        .unwrap_or(text);
    u64::from_str_radix(digits, 16)
        .ok()
        .map(|v| (v & 0x7F) as u8)
}

/// Like [`parse_manufacturer_id`] but falls back to
/// [`DEFAULT_MANUFACTURER_ID`] with a warning.
pub fn manufacturer_id_or_default(text: &str) -> u8 {
    parse_manufacturer_id(text).unwrap_or_else(|| {
        warn!(
            "Invalid manufacturer ID '{}', using {:#04X}",
            text, DEFAULT_MANUFACTURER_ID
        );
        DEFAULT_MANUFACTURER_ID
    })
}
