//! Early-stopping protocol
//!
//! After every response, the crawler hands the raw payload to a
//! [`StoppingChain`]. Each [`Stopper`] in the chain either has no opinion
//! ([`Verdict::Continue`]) or asks for the traversal to end
//! ([`Verdict::Stop`]). The first stop wins; later stoppers are not consulted.
//!
//! Stoppers may keep counters across responses. Those counters belong to a
//! single traversal run: the crawler takes a [`StoppingChain::fresh`] copy of
//! its configured chain at the start of every run.

mod stoppers;

pub use stoppers::{FailurePatienceStopper, PublicationTimeRangeStopper, TooManyRequestsStopper};

use crate::config::{publication_bounds, StoppingConfig};
use crate::ConfigError;
use serde_json::Value;
use std::fmt;

/// Request to end the current traversal run
///
/// This is not an error: the run terminates cleanly and returns whatever it
/// accepted before the signal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StopSignal {
    reason: String,
}

impl StopSignal {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    /// Human-readable reason for stopping
    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl fmt::Display for StopSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.reason)
    }
}

/// Outcome of inspecting one response
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Continue,
    Stop(StopSignal),
}

impl Verdict {
    pub fn stop(reason: impl Into<String>) -> Self {
        Self::Stop(StopSignal::new(reason))
    }

    pub fn is_stop(&self) -> bool {
        matches!(self, Self::Stop(_))
    }
}

/// The available stopping observers
#[derive(Debug, Clone)]
pub enum Stopper {
    TooManyRequests(TooManyRequestsStopper),
    FailurePatience(FailurePatienceStopper),
    PublicationTimeRange(PublicationTimeRangeStopper),
}

impl Stopper {
    /// Inspects a raw response payload
    pub fn after_response(&mut self, payload: &Value) -> Verdict {
        match self {
            Self::TooManyRequests(s) => s.after_response(payload),
            Self::FailurePatience(s) => s.after_response(payload),
            Self::PublicationTimeRange(s) => s.after_response(payload),
        }
    }

    /// Clears any per-run state
    pub fn reset(&mut self) {
        match self {
            Self::FailurePatience(s) => s.reset(),
            Self::TooManyRequests(_) | Self::PublicationTimeRange(_) => {}
        }
    }

    /// Short name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Self::TooManyRequests(_) => "too-many-requests",
            Self::FailurePatience(_) => "failure-patience",
            Self::PublicationTimeRange(_) => "publication-time-range",
        }
    }
}

impl From<TooManyRequestsStopper> for Stopper {
    fn from(s: TooManyRequestsStopper) -> Self {
        Self::TooManyRequests(s)
    }
}

impl From<FailurePatienceStopper> for Stopper {
    fn from(s: FailurePatienceStopper) -> Self {
        Self::FailurePatience(s)
    }
}

impl From<PublicationTimeRangeStopper> for Stopper {
    fn from(s: PublicationTimeRangeStopper) -> Self {
        Self::PublicationTimeRange(s)
    }
}

/// Ordered chain of stoppers
#[derive(Debug, Clone, Default)]
pub struct StoppingChain {
    stoppers: Vec<Stopper>,
}

impl StoppingChain {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds the standard chain: rate limiting, failure patience, then the
    /// publication time range when either bound is configured
    pub fn from_config(config: &StoppingConfig) -> Result<Self, ConfigError> {
        let (since, until) = publication_bounds(config)?;

        let mut chain = Self::new()
            .with(TooManyRequestsStopper::new())
            .with(FailurePatienceStopper::new(config.failure_patience));

        if since.is_some() || until.is_some() {
            chain.push(PublicationTimeRangeStopper::new(since, until));
        }

        Ok(chain)
    }

    /// Appends a stopper to the end of the chain
    pub fn with(mut self, stopper: impl Into<Stopper>) -> Self {
        self.stoppers.push(stopper.into());
        self
    }

    pub fn push(&mut self, stopper: impl Into<Stopper>) {
        self.stoppers.push(stopper.into());
    }

    pub fn len(&self) -> usize {
        self.stoppers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stoppers.is_empty()
    }

    /// A copy of this chain with all per-run state cleared
    pub fn fresh(&self) -> Self {
        let mut chain = self.clone();
        chain.stoppers.iter_mut().for_each(Stopper::reset);
        chain
    }

    /// Runs the payload through every stopper in order, stopping at the first
    /// [`Verdict::Stop`]
    pub fn after_response(&mut self, payload: &Value) -> Verdict {
        for stopper in &mut self.stoppers {
            let verdict = stopper.after_response(payload);
            if verdict.is_stop() {
                tracing::debug!("Stopper '{}' requested a stop", stopper.name());
                return verdict;
            }
        }
        Verdict::Continue
    }
}
