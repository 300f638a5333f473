//! Shared fixtures for the integration tests

use serde_json::{json, Value};

/// A complete lookup record for the video with numeric value `id`
pub fn video_json(id: u64, publish_date: &str) -> Value {
    json!({
        "video_id": format!("{}1", id),
        "publish_date": publish_date,
        "title": format!("Video {}", id),
        "duration": "00:01:30",
        "views": "1200",
        "rating": "4.5",
        "ratings": 12,
        "thumbs": [
            {"src": format!("https://img.test/{}/1.jpg", id)},
            {"src": format!("https://img.test/{}/2.jpg", id)}
        ],
        "tags": ["Funny Cats", "pets"],
        "url": format!("https://catalog.test/watch/{}", id)
    })
}

/// A successful lookup payload
pub fn found(id: u64) -> Value {
    json!({"video": video_json(id, "2023-03-01 10:00:00")})
}

/// The catalog's "not found" payload
pub fn not_found() -> Value {
    json!({"code": 2002, "message": "No video with this ID."})
}
