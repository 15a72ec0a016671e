//! Delivers a payload through an ordered list of strategies, escalating only
//! when the current one fails.
//!
//! ```text
//! NotStarted -> AttemptingMonolithic -> AttemptingChunked -> AttemptingBytewise
//!                      |                       |                     |
//!                      +-------> Succeeded <---+---------------------+
//!                                              Failed (last strategy errored)
//! ```
//!
//! Each strategy starts from byte zero; progress from a failed attempt is
//! discarded, never resumed. This relies on [`MidiSink::send`] being atomic.

use crate::{
    chunk_planner::{self, SysexFrame},
    encoder::PayloadBuffer,
    error::{Cancelled, InputError, SysexError, TransportError},
    pacing::Pacer,
    transport::MidiSink,
};

use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use std::{error::Error, fmt};

/// Bytes between progress lines in the byte-wise strategy.
const BYTEWISE_PROGRESS_EVERY: usize = 100;

/// One way of pushing the payload through the sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// The whole payload as a single SysEx message
    Monolithic,
    /// Independent SysEx frames of bounded size, paced
    Chunked,
    /// The monolithic message one byte per send, paced
    Bytewise,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Strategy::Monolithic => "monolithic",
            Strategy::Chunked => "chunked",
            Strategy::Bytewise => "byte-wise",
        };
        write!(f, "{}", name)
    }
}

/// Which strategies a job may use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum TransferMode {
    /// Monolithic first, then chunked, then byte-wise
    #[default]
    Fallback,
    /// Chunked frames only; used for sample streams
    Chunked,
}

impl TransferMode {
    /// The strategies of this mode, in escalation order.
    pub fn strategies(&self) -> &'static [Strategy] {
        match self {
            TransferMode::Fallback => &[Strategy::Monolithic, Strategy::Chunked, Strategy::Bytewise],
            TransferMode::Chunked => &[Strategy::Chunked],
        }
    }
}

/// How big the chunked strategy cuts its frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkPolicy {
    /// Exactly this many payload bytes per frame
    Fixed(usize),
    /// Scale with the payload, see [`chunk_planner::fallback_chunk_size`]
    Adaptive(usize),
}

impl ChunkPolicy {
    /// Payload bytes per frame for a payload of `payload_len` bytes.
    pub fn chunk_size(&self, payload_len: usize) -> usize {
        match *self {
            ChunkPolicy::Fixed(size) => size.max(1),
            ChunkPolicy::Adaptive(configured) => {
                chunk_planner::fallback_chunk_size(configured, payload_len)
            }
        }
    }
}

/// Where a job is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Created, nothing sent
    NotStarted,
    /// Sending the single big frame
    AttemptingMonolithic,
    /// Sending chunk frames
    AttemptingChunked,
    /// Sending single bytes
    AttemptingBytewise,
    /// Delivered
    Succeeded,
    /// Gave up
    Failed,
}

impl From<Strategy> for JobState {
    fn from(strategy: Strategy) -> Self {
        match strategy {
            Strategy::Monolithic => JobState::AttemptingMonolithic,
            Strategy::Chunked => JobState::AttemptingChunked,
            Strategy::Bytewise => JobState::AttemptingBytewise,
        }
    }
}

/// The outcome of one strategy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttemptRecord {
    /// Strategy tried
    pub strategy: Strategy,
    /// Frames (or single bytes, for byte-wise) accepted before it ended
    pub units_sent: usize,
    /// Bytes accepted by the sink, framing included
    pub bytes_sent: usize,
    /// `None` if the strategy delivered everything
    pub error: Option<TransportError>,
}

/// What a successful job reports back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmissionReport {
    /// Strategy that delivered the payload
    pub strategy: Strategy,
    /// Every attempt, in order, the successful one last
    pub attempts: Vec<AttemptRecord>,
    /// Frames delivered by the successful strategy
    pub frames_sent: usize,
    /// Bytes delivered by the successful strategy, framing included
    pub bytes_sent: usize,
}

/// Every strategy of the mode failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransmissionFailure {
    /// Every attempt, in order
    pub attempts: Vec<AttemptRecord>,
    /// The error that ended the last attempt
    pub last_error: TransportError,
}

impl TransmissionFailure {
    /// The strategy that failed last.
    pub fn last_strategy(&self) -> Option<Strategy> {
        self.attempts.last().map(|a| a.strategy)
    }
}

impl fmt::Display for TransmissionFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tried: Vec<String> = self.attempts.iter().map(|a| a.strategy.to_string()).collect();
        write!(f, "transmission failed after trying {}", tried.join(", "))?;
        if let Some(strategy) = self.last_strategy() {
            write!(f, "; {} strategy: {}", strategy, self.last_error)?;
        }
        Ok(())
    }
}

impl Error for TransmissionFailure {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        Some(&self.last_error)
    }
}

/// Why a single attempt stopped early.
enum AttemptError {
    Transport(TransportError),
    Cancelled,
}

impl From<TransportError> for AttemptError {
    fn from(value: TransportError) -> Self {
        Self::Transport(value)
    }
}

impl From<Cancelled> for AttemptError {
    fn from(_: Cancelled) -> Self {
        Self::Cancelled
    }
}

/// A single payload on its way to one endpoint.
#[derive(Debug)]
pub struct TransmissionJob {
    payload: PayloadBuffer,
    manufacturer_id: u8,
    mode: TransferMode,
    chunk_policy: ChunkPolicy,
    state: JobState,
    bytes_sent: usize,
    frames_sent: usize,
    attempts: Vec<AttemptRecord>,
}

impl TransmissionJob {
    /// Prepares a job. The manufacturer ID is masked to 7 bits.
    pub fn new(
        payload: PayloadBuffer,
        manufacturer_id: u8,
        mode: TransferMode,
        chunk_policy: ChunkPolicy,
    ) -> Self {
        Self {
            payload,
            manufacturer_id: manufacturer_id & 0x7F,
            mode,
            chunk_policy,
            state: JobState::NotStarted,
            bytes_sent: 0,
            frames_sent: 0,
            attempts: Vec::new(),
        }
    }

    /// Current state.
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Bytes accepted by the sink in the current (or last) attempt.
    pub fn bytes_sent(&self) -> usize {
        self.bytes_sent
    }

    /// Frames accepted by the sink in the current (or last) attempt.
    pub fn frames_sent(&self) -> usize {
        self.frames_sent
    }

    /// Attempts made so far.
    pub fn attempts(&self) -> &[AttemptRecord] {
        &self.attempts
    }

    /// The payload being sent.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Runs every strategy of the mode in order until one succeeds.
    ///
    /// Transport errors never leave this function except inside the
    /// [`TransmissionFailure`] raised once the last strategy has failed.
    /// Cancellation stops the job immediately without escalating. An empty
    /// payload is refused with [`InputError::EmptyPayload`] before anything
    /// is sent.
    pub fn run(
        &mut self,
        sink: &mut dyn MidiSink,
        pacer: &Pacer,
    ) -> Result<TransmissionReport, SysexError> {
        if self.payload.is_empty() {
            self.state = JobState::Failed;
            return Err(InputError::EmptyPayload.into());
        }

        let mut last_error = None;

        for &strategy in self.mode.strategies() {
            self.state = strategy.into();
            self.bytes_sent = 0;
            self.frames_sent = 0;
            info!("Attempting {} send of {} payload bytes", strategy, self.payload.len());

            let outcome = match pacer.check() {
                Ok(()) => self.attempt(strategy, sink, pacer),
                Err(cancelled) => Err(cancelled.into()),
            };

            match outcome {
                Ok(()) => {
                    self.record(strategy, None);
                    self.state = JobState::Succeeded;
                    info!(
                        "SysEx delivered ({} strategy, {} frames, {} bytes)",
                        strategy, self.frames_sent, self.bytes_sent
                    );
                    return Ok(TransmissionReport {
                        strategy,
                        attempts: self.attempts.clone(),
                        frames_sent: self.frames_sent,
                        bytes_sent: self.bytes_sent,
                    });
                }
                Err(AttemptError::Transport(error)) => {
                    warn!("{} send failed: {}", strategy, error);
                    self.record(strategy, Some(error.clone()));
                    last_error = Some(error);
                }
                Err(AttemptError::Cancelled) => {
                    warn!(
                        "Cancelled during {} send after {} bytes",
                        strategy, self.bytes_sent
                    );
                    self.state = JobState::Failed;
                    return Err(SysexError::Cancelled);
                }
            }
        }

        self.state = JobState::Failed;
        let last_error = last_error
            .unwrap_or_else(|| TransportError::new("none", "no strategy was attempted"));
        Err(TransmissionFailure {
            attempts: self.attempts.clone(),
            last_error,
        }
        .into())
    }

    fn record(&mut self, strategy: Strategy, error: Option<TransportError>) {
        self.attempts.push(AttemptRecord {
            strategy,
            units_sent: self.frames_sent,
            bytes_sent: self.bytes_sent,
            error,
        });
    }

    fn attempt(
        &mut self,
        strategy: Strategy,
        sink: &mut dyn MidiSink,
        pacer: &Pacer,
    ) -> Result<(), AttemptError> {
        match strategy {
            Strategy::Monolithic => self.send_monolithic(sink),
            Strategy::Chunked => self.send_chunked(sink, pacer),
            Strategy::Bytewise => self.send_bytewise(sink, pacer),
        }
    }

    fn full_frame(&self) -> SysexFrame {
        SysexFrame::new(self.manufacturer_id, &self.payload)
    }

    fn send_monolithic(&mut self, sink: &mut dyn MidiSink) -> Result<(), AttemptError> {
        let frame = self.full_frame();
        debug!(
            "First bytes: {:02X?}",
            &frame.as_bytes()[..frame.len().min(16)]
        );

        sink.send(frame.as_bytes())?;
        self.frames_sent = 1;
        self.bytes_sent = frame.len();
        Ok(())
    }

    fn send_chunked(&mut self, sink: &mut dyn MidiSink, pacer: &Pacer) -> Result<(), AttemptError> {
        let chunk_size = self.chunk_policy.chunk_size(self.payload.len());
        let frames = chunk_planner::plan(&self.payload, self.manufacturer_id, chunk_size);
        let total_frames = frames.len();
        let total_payload = self.payload.len();
        info!(
            "Sending {} frames of up to {} payload bytes",
            total_frames, chunk_size
        );

        let mut payload_sent = 0;
        for (i, frame) in frames.iter().enumerate() {
            pacer.check()?;
            sink.send(frame.as_bytes())?;

            self.frames_sent += 1;
            self.bytes_sent += frame.len();
            payload_sent += frame.payload().len();
            info!(
                "Progress: {:.1}% (frame {}/{}, {}/{} payload bytes)",
                percent(payload_sent, total_payload),
                i + 1,
                total_frames,
                payload_sent,
                total_payload
            );

            pacer.after_unit(Strategy::Chunked)?;
        }
        Ok(())
    }

    fn send_bytewise(&mut self, sink: &mut dyn MidiSink, pacer: &Pacer) -> Result<(), AttemptError> {
        let frame = self.full_frame();
        let total = frame.len();

        for (i, &byte) in frame.as_bytes().iter().enumerate() {
            pacer.check()?;
            sink.send(&[byte])?;
            self.bytes_sent += 1;

            if i % BYTEWISE_PROGRESS_EVERY == 0 || i + 1 == total {
                info!(
                    "Progress: {:.1}% ({}/{} bytes)",
                    percent(i + 1, total),
                    i + 1,
                    total
                );
            }

            pacer.after_unit(Strategy::Bytewise)?;
        }
        self.frames_sent = 1;
        Ok(())
    }
}

fn percent(done: usize, total: usize) -> f64 {
    if total == 0 {
        100.0
    } else {
        done as f64 * 100.0 / total as f64
    }
}
