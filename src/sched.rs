//! Scheduler contract
//!
//! The lifecycle engine never sleeps on its own; it submits jobs to an
//! external scheduler and reacts when they fire. Jobs carry the target
//! server's SSID by value and are re-resolved against the active server
//! list at fire time, so a job outliving its server is harmless.

use std::time::Duration;

use crate::error::Result;
use crate::server::Ssid;

const _: () = assert!(usize::BITS > 16, "job argument packing needs more than 16 bits");

/// Handle to a scheduled job, used for cancellation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SchedHandle(pub u64);

/// Backoff policy applied by the scheduler to retryable jobs
///
/// The engine only carries this value through; computing retry delays is
/// entirely the scheduler's business.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBackoff {
    /// Delay before the first retry
    pub initial: Duration,
    /// Multiplier applied to the delay after each failed attempt
    pub multiplier: u32,
    /// Upper bound on the retry delay
    pub cap: Duration,
}

impl Default for RetryBackoff {
    fn default() -> Self {
        Self {
            initial: Duration::from_secs(1),
            multiplier: 2,
            cap: Duration::from_secs(120),
        }
    }
}

/// Argument of an Update job: target SSID plus the reconnect hint
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateArgs {
    /// Server the job operates on
    pub ssid: Ssid,
    /// Whether the job should force a transport reconnect first
    pub reconnect_required: bool,
}

const RECONNECT_REQUIRED_FLAG: usize = 1 << 16;

impl UpdateArgs {
    /// Pack into a machine word: SSID in the low 16 bits, reconnect hint
    /// in bit 16. Lets schedulers with a word-sized argument slot carry
    /// the job without allocation.
    pub fn encode(self) -> usize {
        let mut value = usize::from(self.ssid.0);
        if self.reconnect_required {
            value |= RECONNECT_REQUIRED_FLAG;
        }
        value
    }

    /// Recover the SSID and reconnect hint from a packed word.
    pub fn decode(value: usize) -> Self {
        Self {
            ssid: Ssid((value & usize::from(u16::MAX)) as u16),
            reconnect_required: value & RECONNECT_REQUIRED_FLAG != 0,
        }
    }
}

/// A job the engine asks the scheduler to run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Job {
    /// Refresh the connection and send Update (or Re-Register) for one server
    Update(UpdateArgs),
    /// Perform a forced Re-Register for one server
    Reregister(Ssid),
}

/// Deferred-job scheduler consumed by the lifecycle engine
///
/// Implementations deliver each job back through
/// [`Client::run_job`](crate::Client::run_job). A retryable job whose run
/// returns an error is re-delivered under the given [`RetryBackoff`].
pub trait Scheduler {
    /// Schedule a job to run immediately
    fn schedule_now(&mut self, job: Job) -> Result<SchedHandle>;

    /// Schedule a job after `delay`, retried with `backoff` on failure
    fn schedule_retryable(
        &mut self,
        delay: Duration,
        backoff: RetryBackoff,
        job: Job,
    ) -> Result<SchedHandle>;

    /// Cancel a scheduled job and clear the handle; safe on `None`
    fn cancel(&mut self, handle: &mut Option<SchedHandle>);
}
