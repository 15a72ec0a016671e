//! Produces the ordered [`RawValue`]s a job sends, either from `0x...`
//! literals in a text file or from the samples of a mono 32-bit WAV file.

use crate::{encoder::RawValue, error::InputError};

use hound::{SampleFormat, WavReader};
use log::{debug, info};
use nom::{
    bytes::complete::tag, character::complete::hex_digit1, combinator::map,
    sequence::preceded, IResult,
};

use std::{
    fs,
    io::Read,
    path::{Path, PathBuf},
};

/// Where the values of a job come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValueSource {
    /// Free-form text holding `0x` literals, e.g. a C array initialiser.
    HexText(PathBuf),
    /// A mono WAV file with 32-bit integer samples.
    Wav(PathBuf),
}

impl ValueSource {
    /// Reads the file and returns its values in file order.
    pub fn load(&self) -> Result<Vec<RawValue>, InputError> {
        match self {
            ValueSource::HexText(path) => read_hex_file(path),
            ValueSource::Wav(path) => {
                read_wav_mono32(path).map(|s| s.into_iter().map(|x| x as RawValue).collect())
            }
        }
    }

    /// Guesses the kind from the extension: `.wav` (any case) is a WAV
    /// file, everything else is hex text.
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        let is_wav = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("wav"))
            .unwrap_or(false);
        if is_wav {
            ValueSource::Wav(path.to_path_buf())
        } else {
            ValueSource::HexText(path.to_path_buf())
        }
    }

    /// Path of the underlying file.
    pub fn path(&self) -> &Path {
        match self {
            ValueSource::HexText(path) | ValueSource::Wav(path) => path,
        }
    }
}

/// Folds a run of hex digits into a `u32`, keeping only the low 32 bits of
/// over-long literals.
fn fold_hex(digits: &str) -> RawValue {
    digits
        .chars()
        .filter_map(|c| c.to_digit(16))
        .fold(0, |acc, d| (acc << 4) | d)
}

fn parse_hex_literal(s: &str) -> IResult<&str, RawValue> {
    map(preceded(tag("0x"), hex_digit1), fold_hex)(s)
}

/// Finds every `0x` literal in `text`, left to right, without overlap.
pub fn scan_hex_literals(text: &str) -> Vec<RawValue> {
    let mut values = Vec::new();
    let mut rest = text;

    while !rest.is_empty() {
        match parse_hex_literal(rest) {
            Ok((remaining, value)) => {
                values.push(value);
                rest = remaining;
            }
            Err(_) => {
                let step = rest.chars().next().map_or(1, char::len_utf8);
                rest = &rest[step..];
            }
        }
    }

    values
}

/// Reads a text file and scans it with [`scan_hex_literals`]. A file with no
/// literals is an [`InputError::NoHexLiterals`].
pub fn read_hex_file(path: impl AsRef<Path>) -> Result<Vec<RawValue>, InputError> {
    let path = path.as_ref();
    let raw = fs::read(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let values = scan_hex_literals(&String::from_utf8_lossy(&raw));
    if values.is_empty() {
        return Err(InputError::NoHexLiterals {
            path: path.to_path_buf(),
        });
    }

    info!("Found {} hex values in {}", values.len(), path.display());
    Ok(values)
}

/// Opens a WAV file and returns its samples, see [`read_wav_samples`].
pub fn read_wav_mono32(path: impl AsRef<Path>) -> Result<Vec<i32>, InputError> {
    let path = path.as_ref();
    let file = fs::File::open(path).map_err(|source| InputError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let samples = read_wav_samples(std::io::BufReader::new(file))?;
    info!("Loaded {} samples from {}", samples.len(), path.display());
    Ok(samples)
}

/// Checks that the stream is mono 32-bit integer PCM and returns its samples
/// exactly as stored.
pub fn read_wav_samples(reader: impl Read) -> Result<Vec<i32>, InputError> {
    let mut reader = WavReader::new(reader)?;
    let spec = reader.spec();
    debug!("WAV spec: {:?}", spec);

    if spec.channels != 1 {
        return Err(InputError::WavChannels {
            channels: spec.channels,
        });
    }
    if spec.bits_per_sample != 32 {
        return Err(InputError::WavSampleWidth {
            bits: spec.bits_per_sample,
        });
    }
    if spec.sample_format != SampleFormat::Int {
        return Err(InputError::WavSampleFormat);
    }

    reader
        .samples::<i32>()
        .collect::<Result<Vec<i32>, hound::Error>>()
        .map_err(InputError::Wav)
}
