//! Video id encoding and id sequence generation
//!
//! Catalog ids are digit strings whose last digit is a fixed marker ("1").
//! Successive videos differ by one in the value that precedes the marker, so
//! traversals step through ids ten at a time:
//!
//! ```
//! use catalog_crawler::ids::{VideoId, VideoIdSequence};
//!
//! let seed: VideoId = "1231".parse().unwrap();
//! let ids: Vec<String> = VideoIdSequence::ascending(seed, Some(3))
//!     .map(|id| id.to_string())
//!     .collect();
//! assert_eq!(ids, ["1231", "1241", "1251"]);
//! ```

mod sequence;
mod video_id;

pub use sequence::{Direction, VideoIdSequence};
pub use video_id::{VideoId, ID_MARKER};
