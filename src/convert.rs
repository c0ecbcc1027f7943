#![doc = r#"
The conversion pipeline.

[`convert`] strings the pieces together: validate the divisor and break
parameters, resolve the track, encode it, render the hex text. Every step
is a single attempt; the first failure aborts the whole conversion and is
surfaced to the caller unchanged.
"#]

use thiserror::Error;
use tracing::debug;

use crate::encode::{ArcadeSongEncoder, EncodeError, SongEncoder};
use crate::render::{self, OutputFormat};
use crate::source::MidiSource;
use crate::track::{TrackError, TrackSelector};

/// A validated timing divisor, always finite and greater than zero.
///
/// The divisor trades precision for capacity: values above 1 compress the
/// song so longer pieces fit the 255-measure ceiling, values below 1
/// stretch it for finer timing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Divisor(f64);

impl Divisor {
    /// Validates a raw divisor.
    pub fn new(value: f64) -> Result<Self, ParamError> {
        if value.is_finite() && value > 0.0 {
            Ok(Self(value))
        } else {
            Err(ParamError::Divisor(value))
        }
    }

    /// The raw value.
    pub const fn get(&self) -> f64 {
        self.0
    }
}

impl Default for Divisor {
    /// No division.
    fn default() -> Self {
        Self(1.0)
    }
}

/// A validated line-break interval for the hex renderer.
///
/// Zero means no breaking; any positive N breaks the output before every
/// Nth hex pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CharBreak(usize);

impl CharBreak {
    /// No line breaking.
    pub const NONE: Self = Self(0);

    /// Validates a raw break interval.
    pub fn new(value: i64) -> Result<Self, ParamError> {
        usize::try_from(value)
            .map(Self)
            .map_err(|_| ParamError::CharBreak(value))
    }

    /// The raw interval.
    pub const fn get(&self) -> usize {
        self.0
    }

    /// True when breaking is disabled.
    pub const fn is_none(&self) -> bool {
        self.0 == 0
    }

    /// True when a break belongs immediately before the pair at `pair_index`.
    ///
    /// Fires at index 0 too: broken output opens with a fresh line.
    pub const fn breaks_before(&self, pair_index: usize) -> bool {
        self.0 != 0 && pair_index % self.0 == 0
    }
}

/// A conversion parameter that fails validation.
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum ParamError {
    /// The divisor must be greater than 0.
    #[error("divisor must be greater than 0, not {0}")]
    Divisor(f64),
    /// The break interval must be at least 0.
    #[error("break must be greater than or equal to 0, not {0}")]
    CharBreak(i64),
}

/// Any failure along the conversion pipeline.
#[derive(Debug, Error)]
pub enum ConvertError {
    /// A parameter failed validation; nothing was encoded.
    #[error(transparent)]
    Param(#[from] ParamError),
    /// The track selector did not resolve.
    #[error(transparent)]
    Track(#[from] TrackError),
    /// The encoder could not fit the song into the format.
    #[error(transparent)]
    Encode(#[from] EncodeError),
}

/// Converts one track of `source` into the rendered song text using the
/// default [`ArcadeSongEncoder`].
///
/// `divisor` defaults to 1.0 upstream and must be greater than zero;
/// `char_break` defaults to 0 and must not be negative. See
/// [`TrackSelector`] for how `track` picks a track.
pub fn convert(
    source: &MidiSource,
    output: OutputFormat,
    track: &TrackSelector,
    divisor: f64,
    char_break: i64,
) -> Result<String, ConvertError> {
    convert_with(&ArcadeSongEncoder, source, output, track, divisor, char_break)
}

/// [`convert`], with a caller-supplied encoder.
pub fn convert_with(
    encoder: &dyn SongEncoder,
    source: &MidiSource,
    output: OutputFormat,
    track: &TrackSelector,
    divisor: f64,
    char_break: i64,
) -> Result<String, ConvertError> {
    let divisor = Divisor::new(divisor)?;
    let char_break = CharBreak::new(char_break)?;

    let resolved = track.resolve(source)?;
    let bytes = encoder.encode(source, resolved, divisor)?;
    debug!("generated {} bytes, converting to text", bytes.len());

    let text = match output {
        OutputFormat::ArcadeHexString => render::hex_string(&bytes, char_break),
    };
    debug!("hex string result is {} characters long", text.len());
    Ok(text)
}
