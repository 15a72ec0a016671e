// Commandline argument parser using clap for syxsend

use crate::{
    config::{manufacturer_id_or_default, Backend, TransferConfig},
    transmission::TransferMode,
    transport::EndpointSelector,
    value_source::ValueSource,
};

use clap::{Args, Parser, Subcommand};

use std::path::PathBuf;

/// Sends 32-bit values to a MIDI device as 7-bit SysEx
#[derive(Debug, Parser, Clone)]
#[clap(version, about)]
pub struct SyxArgs {
    #[command(subcommand, long_about)]
    /// What to send, or what to look at
    pub command: CommandTask,

    /// RON config file; command line flags override it
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Manufacturer ID in hex, e.g. 7D or 0x7D
    #[arg(short = 'm', long = "manufacturer", global = true)]
    pub manufacturer: Option<String>,

    /// Payload bytes per SysEx frame for the chunked strategy
    #[arg(long = "chunk-size", global = true)]
    pub chunk_size: Option<usize>,

    /// Milliseconds to wait after each chunk frame
    #[arg(long = "chunk-delay", global = true)]
    pub chunk_delay: Option<u64>,

    /// Milliseconds to wait after each byte of a byte-wise send
    #[arg(long = "byte-delay", global = true)]
    pub byte_delay: Option<u64>,

    /// Output endpoint, by index or by (partial) name
    #[arg(short = 'p', long = "port", global = true)]
    pub port: Option<EndpointSelector>,

    /// Send over a serial device at this baud rate instead of a MIDI port
    #[arg(long = "serial", global = true, conflicts_with = "out")]
    pub serial: Option<u32>,

    /// Write the messages to a .syx file instead of a device
    #[arg(short = 'o', long = "out", global = true)]
    pub out: Option<PathBuf>,
}

/// The task to perform
#[derive(Debug, Subcommand, Clone)]
pub enum CommandTask {
    /// Send the 0x-prefixed hex values found in a text file
    #[command(about)]
    Hex(HexCommand),

    /// Stream the samples of a mono 32-bit WAV file
    #[command(about)]
    Wav(WavCommand),

    /// List the available output endpoints
    #[command(about)]
    List,

    /// Parse and encode a file without sending anything
    #[command(about)]
    Inspect(InspectCommand),
}

/// Arguments of `hex`
#[derive(Debug, Args, Clone)]
pub struct HexCommand {
    /// Text file holding the values
    pub file: PathBuf,

    /// Only use paced chunk frames, never a single large message
    #[arg(long)]
    pub chunked: bool,
}

/// Arguments of `wav`
#[derive(Debug, Args, Clone)]
pub struct WavCommand {
    /// Mono, 32-bit integer WAV file
    pub file: PathBuf,

    /// Samples per SysEx frame
    #[arg(short = 'n', long = "samples-per-chunk")]
    pub samples_per_chunk: Option<usize>,
}

/// Arguments of `inspect`
#[derive(Debug, Args, Clone)]
pub struct InspectCommand {
    /// A .wav file or a hex text file
    pub file: PathBuf,
}

impl SyxArgs {
    /// Writes every flag that was given over the matching config field.
    pub fn apply(&self, config: &mut TransferConfig) {
        if let Some(text) = &self.manufacturer {
            config.manufacturer_id = manufacturer_id_or_default(text);
        }
        if let Some(size) = self.chunk_size {
            config.chunk_size = Some(size);
        }
        if let Some(ms) = self.chunk_delay {
            config.chunk_delay_ms = Some(ms);
        }
        if let Some(ms) = self.byte_delay {
            config.byte_delay_ms = ms;
        }
        if let Some(port) = &self.port {
            config.endpoint = port.clone();
        }
        if let Some(baud) = self.serial {
            config.backend = Backend::Serial { baud };
        }
        if let Some(path) = &self.out {
            config.backend = Backend::SyxFile { path: path.clone() };
        }

        match &self.command {
            CommandTask::Hex(hex) if hex.chunked => config.mode = TransferMode::Chunked,
            CommandTask::Wav(WavCommand {
                samples_per_chunk: Some(n),
                ..
            }) => config.samples_per_chunk = *n,
            _ => {}
        }
    }

    /// The file the command reads from, if it reads one.
    pub fn source(&self) -> Option<ValueSource> {
        match &self.command {
            CommandTask::Hex(hex) => Some(ValueSource::HexText(hex.file.clone())),
            CommandTask::Wav(wav) => Some(ValueSource::Wav(wav.file.clone())),
            CommandTask::Inspect(inspect) => Some(ValueSource::from_path(&inspect.file)),
            CommandTask::List => None,
        }
    }
}
