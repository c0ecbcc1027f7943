#![doc = r#"
Picking one track out of a [`MidiSource`].

A selector is parsed once at the pipeline boundary: text made of digits is
an index, anything else is a case-insensitive name. Resolution is a pure
lookup over the source's track list.
"#]

use std::str::FromStr;

use thiserror::Error;

use crate::source::{MidiSource, Track};

/// A track identifier: either a zero-based index or a name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TrackSelector {
    /// Zero-based position in the file's track list.
    ByIndex(usize),
    /// Track name, matched case-insensitively against `TrackName` meta events.
    ByName(String),
}

impl TrackSelector {
    /// Interpret user text as a selector.
    ///
    /// Digits-only text selects by index (`"0"` is the first track, and
    /// `"007"` the eighth); everything else selects by name.
    pub fn parse(text: &str) -> Self {
        if !text.is_empty() && text.bytes().all(|b| b.is_ascii_digit()) {
            // An index too large for usize is still out of range for any
            // real file; saturate instead of falling back to a name.
            Self::ByIndex(text.parse().unwrap_or(usize::MAX))
        } else {
            Self::ByName(text.to_owned())
        }
    }

    /// Look the selector up in `source`'s track list.
    pub fn resolve<'src>(&self, source: &'src MidiSource) -> Result<&'src Track, TrackError> {
        let tracks = source.tracks();
        match self {
            Self::ByIndex(index) => tracks.get(*index).ok_or(TrackError::OutOfRange {
                index: *index,
                track_count: tracks.len(),
            }),
            Self::ByName(name) => tracks
                .iter()
                .find(|track| {
                    track
                        .name()
                        .is_some_and(|candidate| candidate.eq_ignore_ascii_case(name))
                })
                .ok_or_else(|| TrackError::Unknown {
                    name: name.clone(),
                    available: tracks
                        .iter()
                        .filter_map(|track| track.name().map(str::to_owned))
                        .collect(),
                }),
        }
    }
}

impl Default for TrackSelector {
    /// The first track of the file.
    fn default() -> Self {
        Self::ByIndex(0)
    }
}

impl FromStr for TrackSelector {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self::parse(s))
    }
}

/// A selector that does not match exactly one track of the file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackError {
    /// The numeric index is outside the file's track list.
    #[error("track index {index} is out of range for a file with {track_count} track(s)")]
    OutOfRange {
        /// The requested zero-based index.
        index: usize,
        /// How many tracks the file actually has.
        track_count: usize,
    },
    /// No track carries the requested name.
    #[error("no track named {name:?}; named tracks in this file: [{}]", .available.join(", "))]
    Unknown {
        /// The requested name.
        name: String,
        /// Every track name present in the file, in file order.
        available: Vec<String>,
    },
}
