use crate::ids::VideoId;

/// Traversal direction of a [`VideoIdSequence`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Starts at the seed (included) and increments
    Ascending,
    /// Starts one below the seed (seed excluded) and decrements
    Descending,
}

/// Lazy, monotonic sequence of video ids derived from a seed
///
/// The sequence is an [`Iterator`]; it ends after `limit` ids when a limit is
/// set, and otherwise only when the id space is exhausted (a descending
/// sequence never goes below numeric value zero). To restart a traversal,
/// build a new sequence from the same seed.
///
/// # Example
///
/// ```
/// use catalog_crawler::ids::{VideoId, VideoIdSequence};
///
/// let seed = VideoId::from_numeric(123);
/// let values: Vec<u64> = VideoIdSequence::descending(seed, Some(3))
///     .map(|id| id.numeric_value())
///     .collect();
/// assert_eq!(values, [122, 121, 120]);
/// ```
#[derive(Debug, Clone)]
pub struct VideoIdSequence {
    seed: VideoId,
    limit: Option<usize>,
    direction: Direction,
    count: usize,
    done: bool,
}

impl VideoIdSequence {
    /// Creates a sequence walking in `direction` from `seed`
    pub fn new(seed: VideoId, limit: Option<usize>, direction: Direction) -> Self {
        Self {
            seed,
            limit,
            direction,
            count: 0,
            done: false,
        }
    }

    /// Ascending sequence: `seed, seed + 1, seed + 2, ...`
    pub fn ascending(seed: VideoId, limit: Option<usize>) -> Self {
        Self::new(seed, limit, Direction::Ascending)
    }

    /// Descending sequence: `seed - 1, seed - 2, ...`
    pub fn descending(seed: VideoId, limit: Option<usize>) -> Self {
        Self::new(seed, limit, Direction::Descending)
    }

    pub fn seed(&self) -> VideoId {
        self.seed
    }

    pub fn limit(&self) -> Option<usize> {
        self.limit
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    /// Number of ids produced so far
    pub fn produced(&self) -> usize {
        self.count
    }
}

impl Iterator for VideoIdSequence {
    type Item = VideoId;

    fn next(&mut self) -> Option<VideoId> {
        if self.done {
            return None;
        }
        if let Some(limit) = self.limit {
            if self.count >= limit {
                self.done = true;
                return None;
            }
        }

        let step = self.count as i128;
        let delta = match self.direction {
            Direction::Ascending => step,
            Direction::Descending => -(step + 1),
        };

        match self.seed.offset(delta) {
            Some(id) => {
                self.count += 1;
                Some(id)
            }
            None => {
                tracing::debug!(
                    "Id sequence from {} exhausted the id space after {} ids",
                    self.seed,
                    self.count
                );
                self.done = true;
                None
            }
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        if self.done {
            return (0, Some(0));
        }
        let space = match self.direction {
            Direction::Ascending => None,
            Direction::Descending => {
                usize::try_from(self.seed.numeric_value()).ok().map(|n| n.saturating_sub(self.count))
            }
        };
        let remaining_limit = self.limit.map(|l| l.saturating_sub(self.count));
        let upper = match (remaining_limit, space) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (Some(a), None) => Some(a),
            (None, b) => b,
        };
        (0, upper)
    }
}
