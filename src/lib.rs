#![doc = r#"
Convert a single track of a MIDI file into a MakeCode Arcade song.

The pipeline reads like the data flow: a [`MidiSource`](source::MidiSource)
is parsed from raw bytes, a [`TrackSelector`](track::TrackSelector) picks one
of its tracks by index or name, a [`SongEncoder`](encode::SongEncoder) turns
that track into the engine's binary song layout, and the result is rendered
as a backtick-delimited hex literal ready to paste into an Arcade project.

```no_run
use midi2arcade::prelude::*;

# fn main() -> Result<(), Box<dyn std::error::Error>> {
let bytes = std::fs::read("song.mid")?;
let source = MidiSource::from_bytes(&bytes)?;

let text = convert(
    &source,
    OutputFormat::ArcadeHexString,
    &TrackSelector::parse("drums"),
    1.0,
    0,
)?;
println!("{text}");
# Ok(())
# }
```
"#]

pub mod convert;
pub mod encode;
pub mod render;
pub mod source;
pub mod track;

#[doc = r#"
Re-exports everything needed for a conversion.
"#]
pub mod prelude {
    pub use crate::convert::{CharBreak, ConvertError, Divisor, ParamError, convert, convert_with};
    pub use crate::encode::{ArcadeSongEncoder, EncodeError, SongEncoder};
    pub use crate::render::OutputFormat;
    pub use crate::source::{MidiSource, NoteEvent, SourceError, Track};
    pub use crate::track::{TrackError, TrackSelector};
}
