//! Record normalization
//!
//! Raw catalog payloads are shaped into [`VideoRecord`]s by a
//! [`RecordTransform`]. The crawler is generic over the transform, so callers
//! that want untouched payloads can use [`RawPayload`] instead of
//! [`VideoNormalizer`].

use crate::NormalizeError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::Value;

/// Remote operation selected by the `data` request parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resource {
    /// Paginated search results
    Search,
    /// Direct lookup of a single video by id
    VideoById,
}

impl Resource {
    /// Wire value of the `data` parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Search => "xyz.Videos.searchVideos",
            Self::VideoById => "xyz.Videos.getVideoById",
        }
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A normalized catalog video
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VideoRecord {
    pub id: String,
    /// Publication calendar date (`YYYY-MM-DD`, UTC)
    pub published_on: String,
    /// Publication timestamp (ISO-8601, UTC)
    pub published_at: String,
    pub title: String,
    pub duration: Value,
    pub views: u64,
    pub rating: f64,
    pub ratings: u64,
    pub thumbs: Vec<String>,
    pub tags: Vec<String>,
    pub url: String,
}

/// Shapes one raw video payload into an output record
pub trait RecordTransform: Send + Sync {
    type Output: Send;

    fn transform(&self, video: &Value, resource: Resource) -> Result<Self::Output, NormalizeError>;
}

/// Flattens raw payloads into [`VideoRecord`]s
#[derive(Debug, Clone, Copy, Default)]
pub struct VideoNormalizer;

impl RecordTransform for VideoNormalizer {
    type Output = VideoRecord;

    fn transform(&self, video: &Value, resource: Resource) -> Result<VideoRecord, NormalizeError> {
        let published = parse_timestamp(require_str(video, "publish_date")?)?;

        let thumbs = require(video, "thumbs")?
            .as_array()
            .ok_or_else(|| invalid("thumbs", "expected an array"))?
            .iter()
            .map(|thumb| {
                thumb
                    .get("src")
                    .map(scalar_to_string)
                    .ok_or_else(|| NormalizeError::MissingField("thumbs[].src".to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let tags = require(video, "tags")?;
        let tags = match resource {
            Resource::Search => search_tags(tags)?,
            Resource::VideoById => lookup_tags(tags)?,
        };

        Ok(VideoRecord {
            id: scalar_to_string(require(video, "video_id")?),
            published_on: published.format("%Y-%m-%d").to_string(),
            published_at: published.to_rfc3339_opts(SecondsFormat::Secs, true),
            title: scalar_to_string(require(video, "title")?),
            duration: require(video, "duration")?.clone(),
            views: require_u64(video, "views")?,
            rating: require_f64(video, "rating")?,
            ratings: require_u64(video, "ratings")?,
            thumbs,
            tags,
            url: scalar_to_string(require(video, "url")?),
        })
    }
}

/// Passes payloads through unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct RawPayload;

impl RecordTransform for RawPayload {
    type Output = Value;

    fn transform(&self, video: &Value, _resource: Resource) -> Result<Value, NormalizeError> {
        Ok(video.clone())
    }
}

/// Normalizes a tag: lower-cased with spaces replaced by hyphens
pub fn normalize_tag(tag: &str) -> String {
    tag.to_lowercase().replace(' ', "-")
}

/// Tags of a search result: `[{"tag_name": "..."}, ...]`
pub fn search_tags(tags: &Value) -> Result<Vec<String>, NormalizeError> {
    tags.as_array()
        .ok_or_else(|| invalid("tags", "expected an array"))?
        .iter()
        .map(|tag| {
            tag.get("tag_name")
                .and_then(Value::as_str)
                .map(normalize_tag)
                .ok_or_else(|| NormalizeError::MissingField("tags[].tag_name".to_string()))
        })
        .collect()
}

/// Tags of a direct lookup: `["...", ...]`
pub fn lookup_tags(tags: &Value) -> Result<Vec<String>, NormalizeError> {
    tags.as_array()
        .ok_or_else(|| invalid("tags", "expected an array"))?
        .iter()
        .map(|tag| {
            tag.as_str()
                .map(normalize_tag)
                .ok_or_else(|| invalid("tags", "expected an array of strings"))
        })
        .collect()
}

/// Parses a catalog timestamp as UTC
///
/// Accepts RFC 3339 (`2023-02-03T12:00:00Z`, any offset), a naive
/// `2023-02-03 12:00:00` / `2023-02-03T12:00:00` date-time taken as UTC, or a
/// bare `2023-02-03` date at midnight UTC.
pub fn parse_timestamp(s: &str) -> Result<DateTime<Utc>, NormalizeError> {
    let s = s.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, format) {
            return Ok(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
        .ok_or_else(|| NormalizeError::InvalidTimestamp(s.to_string()))
}

fn require<'a>(video: &'a Value, field: &str) -> Result<&'a Value, NormalizeError> {
    match video.get(field) {
        None | Some(Value::Null) => Err(NormalizeError::MissingField(field.to_string())),
        Some(value) => Ok(value),
    }
}

fn require_str<'a>(video: &'a Value, field: &str) -> Result<&'a str, NormalizeError> {
    require(video, field)?
        .as_str()
        .ok_or_else(|| invalid(field, "expected a string"))
}

fn require_u64(video: &Value, field: &str) -> Result<u64, NormalizeError> {
    let value = require(video, field)?;
    let parsed = match value {
        Value::Number(n) => n.as_u64().or_else(|| n.as_f64().and_then(integral_u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(field, &format!("expected a non-negative integer, got {}", value)))
}

/// Converts a float holding a whole, in-range, non-negative value
fn integral_u64(f: f64) -> Option<u64> {
    // 2^64 is exactly representable; anything at or above it does not fit
    if f >= 0.0 && f.fract() == 0.0 && f < 18_446_744_073_709_551_616.0 {
        Some(f as u64)
    } else {
        None
    }
}

fn require_f64(video: &Value, field: &str) -> Result<f64, NormalizeError> {
    let value = require(video, field)?;
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    };
    parsed.ok_or_else(|| invalid(field, &format!("expected a number, got {}", value)))
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn invalid(field: &str, message: &str) -> NormalizeError {
    NormalizeError::InvalidField {
        field: field.to_string(),
        message: message.to_string(),
    }
}
