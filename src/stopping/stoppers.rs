use crate::normalize::parse_timestamp;
use crate::payload::{self, CODE_RATE_LIMITED};
use crate::stopping::Verdict;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::Value;

/// Stops when the catalog reports it is throttling us (`code == 1005`)
#[derive(Debug, Clone, Default)]
pub struct TooManyRequestsStopper;

impl TooManyRequestsStopper {
    pub const DEFAULT_MESSAGE: &'static str = "Too many requests.";

    pub fn new() -> Self {
        Self
    }

    pub fn after_response(&mut self, payload: &Value) -> Verdict {
        if payload::status_code(payload) != Some(CODE_RATE_LIMITED) {
            return Verdict::Continue;
        }
        Verdict::stop(payload::message(payload).unwrap_or(Self::DEFAULT_MESSAGE))
    }
}

/// Stops after `patience` consecutive responses carrying an error code
#[derive(Debug, Clone)]
pub struct FailurePatienceStopper {
    patience: u32,
    consecutive_failures: u32,
}

impl FailurePatienceStopper {
    pub const DEFAULT_PATIENCE: u32 = 100;

    pub fn new(patience: u32) -> Self {
        Self {
            patience,
            consecutive_failures: 0,
        }
    }

    pub fn patience(&self) -> u32 {
        self.patience
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn after_response(&mut self, payload: &Value) -> Verdict {
        if payload::has_error_code(payload) {
            self.increment()
        } else {
            self.reset();
            Verdict::Continue
        }
    }

    /// Records one more consecutive failure
    pub fn increment(&mut self) -> Verdict {
        // Frozen once the threshold is hit
        if self.consecutive_failures < self.patience {
            self.consecutive_failures += 1;
        }
        if self.consecutive_failures >= self.patience {
            return Verdict::stop(format!(
                "Stopped after {} consecutive failures",
                self.patience
            ));
        }
        Verdict::Continue
    }

    pub fn reset(&mut self) {
        self.consecutive_failures = 0;
    }
}

impl Default for FailurePatienceStopper {
    fn default() -> Self {
        Self::new(Self::DEFAULT_PATIENCE)
    }
}

/// Stops when a video's publication date leaves `[start, end)`
///
/// Responses without `video.publish_date` carry no opinion.
#[derive(Debug, Clone, Default)]
pub struct PublicationTimeRangeStopper {
    start: Option<DateTime<Utc>>,
    end: Option<DateTime<Utc>>,
}

impl PublicationTimeRangeStopper {
    const DATE_PATH: [&'static str; 2] = ["video", "publish_date"];

    pub fn new(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> Self {
        Self { start, end }
    }

    pub fn start(&self) -> Option<DateTime<Utc>> {
        self.start
    }

    pub fn end(&self) -> Option<DateTime<Utc>> {
        self.end
    }

    pub fn after_response(&mut self, payload: &Value) -> Verdict {
        let raw = match payload::get_nested(payload, &Self::DATE_PATH).and_then(Value::as_str) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Verdict::Continue,
        };

        let published = match parse_timestamp(raw) {
            Ok(published) => published,
            Err(e) => {
                tracing::warn!("Ignoring unparsable publish date: {}", e);
                return Verdict::Continue;
            }
        };

        if let Some(start) = self.start {
            if published < start {
                return Verdict::stop(format!(
                    "Publish date is prior to start datetime: {} < {}",
                    iso(published),
                    iso(start)
                ));
            }
        }

        if let Some(end) = self.end {
            if published >= end {
                return Verdict::stop(format!(
                    "Publish date is subsequent to end datetime: {} >= {}",
                    iso(published),
                    iso(end)
                ));
            }
        }

        Verdict::Continue
    }
}

fn iso(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Secs, true)
}
