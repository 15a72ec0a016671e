//! Inter-send delays that keep the receiver's input buffer from overflowing.
//!
//! There is no acknowledgement protocol, so pacing is purely time based: no
//! delay around a monolithic send, a long pause between chunked frames and a
//! very short one between single bytes.

use crate::{error::Cancelled, interrupt::CancelToken, transmission::Strategy};

use spin_sleep::SpinSleeper;

use std::time::Duration;

/// Longest uninterrupted sleep; cancellation is checked at least this often.
const SLICE: Duration = Duration::from_millis(10);

/// How long to wait after each unit, per strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    /// Pause after every frame of the chunked strategy.
    pub chunk_delay: Duration,
    /// Pause after every byte of the byte-wise strategy.
    pub byte_delay: Duration,
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self {
            chunk_delay: Duration::from_millis(50),
            byte_delay: Duration::from_millis(1),
        }
    }
}

impl PacingPolicy {
    /// Delay after one unit sent under `strategy`.
    pub fn delay_for(&self, strategy: Strategy) -> Duration {
        match strategy {
            Strategy::Monolithic => Duration::ZERO,
            Strategy::Chunked => self.chunk_delay,
            Strategy::Bytewise => self.byte_delay,
        }
    }
}

/// Sleeps according to a [`PacingPolicy`], giving up early on cancellation.
#[derive(Debug, Clone)]
pub struct Pacer {
    policy: PacingPolicy,
    cancel: CancelToken,
    sleeper: SpinSleeper,
}

impl Pacer {
    /// Builds a pacer observing `cancel`.
    pub fn new(policy: PacingPolicy, cancel: CancelToken) -> Self {
        Self {
            policy,
            cancel,
            sleeper: SpinSleeper::default(),
        }
    }

    /// The policy in use.
    pub fn policy(&self) -> &PacingPolicy {
        &self.policy
    }

    /// Fails fast if the job was cancelled.
    pub fn check(&self) -> Result<(), Cancelled> {
        if self.cancel.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Waits out the delay that follows one unit of `strategy`.
    pub fn after_unit(&self, strategy: Strategy) -> Result<(), Cancelled> {
        self.pause(self.policy.delay_for(strategy))
    }

    /// Sleeps for `duration` in short slices, checking for cancellation
    /// before and between them.
    pub fn pause(&self, duration: Duration) -> Result<(), Cancelled> {
        self.check()?;
        let mut remaining = duration;
        while !remaining.is_zero() {
            let slice = remaining.min(SLICE);
            self.sleeper.sleep(slice);
            remaining -= slice;
            self.check()?;
        }
        Ok(())
    }
}
