use std::fmt;

/// Track state enumeration for the tentative → confirmed → dropped lifecycle.
///
/// A single enum keeps "confirmed" and "invalid" mutually exclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TrackState {
    /// Candidate awaiting enough consecutive associations
    #[default]
    Tentative,
    /// Trusted target
    Confirmed,
    /// Too many consecutive misses, due for removal
    Invalid,
}

/// Stable identity of a track.
///
/// Allocated by the owning `FrameTracker`; a promoted track keeps the id of the
/// tentative track it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TrackId(pub u64);

impl fmt::Display for TrackId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}
