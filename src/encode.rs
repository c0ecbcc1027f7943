#![doc = r#"
Turning a resolved track into the engine's binary song layout.

The song format is a fixed little-endian blob with a 255-measure ceiling:

```text
header:
    u8   format version (0)
    u16  tempo in beats per minute
    u8   song ticks per beat (8)
    u8   beats per measure
    u8   measure count, 1-255
    u8   track count (1)
track:
    u8   track id (0)
    u8   flags (bit 0: percussion track)
    u16  note-event count
note event, repeated:
    u16  start tick
    u16  end tick (always past the start)
    u8   note count
    u8 * note count   MIDI key numbers, ascending
```

Quantization maps a note's beat position onto song ticks, scaled down by
the divisor; notes sharing a (start, end) span merge into one event with
several keys. A song that cannot fit the ceiling is rejected, never
truncated.
"#]

use std::collections::BTreeMap;

use thiserror::Error;

use crate::convert::Divisor;
use crate::source::{MidiSource, Track};

/// The format's measure ceiling.
pub const MAX_MEASURES: u8 = 255;

/// Song tick resolution per beat.
const TICKS_PER_BEAT: u8 = 8;

/// Layout revision written into the header.
const FORMAT_VERSION: u8 = 0;

/// MIDI channel reserved for percussion.
const DRUM_CHANNEL: u8 = 9;

/// The track cannot be represented within the song format's limits.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EncodeError {
    /// The scaled song is longer than [`MAX_MEASURES`].
    #[error(
        "song spans {required} measures but the format holds at most {max}; \
         raise the divisor to fit"
    )]
    Capacity {
        /// Measures the scaled song would need.
        required: u32,
        /// The format's ceiling.
        max: u8,
    },
    /// A quantized note lands past the wire format's tick fields.
    #[error("note at song tick {tick} exceeds the format's tick range ({max})")]
    TickRange {
        /// The offending song tick.
        tick: u32,
        /// Largest representable song tick.
        max: u16,
    },
    /// More distinct note events than the wire format can count.
    #[error("track produces {events} note events but the format holds at most {max}")]
    TooManyEvents {
        /// Note events after grouping.
        events: usize,
        /// The format's ceiling.
        max: u16,
    },
}

/// Encodes a resolved track into song bytes.
///
/// Implementations must be deterministic and must fail rather than truncate
/// when the song exceeds a format limit.
pub trait SongEncoder {
    /// Produce the binary song for `track`, scaling time by `divisor`.
    fn encode(
        &self,
        source: &MidiSource,
        track: &Track,
        divisor: Divisor,
    ) -> Result<Vec<u8>, EncodeError>;
}

/// The default encoder, producing the layout described in the module docs.
#[derive(Debug, Clone, Copy, Default)]
pub struct ArcadeSongEncoder;

impl SongEncoder for ArcadeSongEncoder {
    fn encode(
        &self,
        source: &MidiSource,
        track: &Track,
        divisor: Divisor,
    ) -> Result<Vec<u8>, EncodeError> {
        let scale = TICKS_PER_BEAT as f64 / divisor.get();

        // Group simultaneous notes by their quantized (start, end) span.
        let mut spans: BTreeMap<(u32, u32), Vec<u8>> = BTreeMap::new();
        let mut last_end = 0u32;
        for note in track.notes() {
            let start = (source.beats_at(note.start_tick) * scale).round() as u32;
            let mut end = (source.beats_at(note.end_tick) * scale).round() as u32;
            if end <= start {
                end = start + 1;
            }
            last_end = last_end.max(end);
            let keys = spans.entry((start, end)).or_default();
            if let Err(slot) = keys.binary_search(&note.key) {
                keys.insert(slot, note.key);
            }
        }

        let ticks_per_measure = TICKS_PER_BEAT as u32 * source.beats_per_measure() as u32;
        let measures = last_end.div_ceil(ticks_per_measure).max(1);
        if measures > MAX_MEASURES as u32 {
            return Err(EncodeError::Capacity {
                required: measures,
                max: MAX_MEASURES,
            });
        }
        if last_end > u16::MAX as u32 {
            return Err(EncodeError::TickRange {
                tick: last_end,
                max: u16::MAX,
            });
        }
        let event_count =
            u16::try_from(spans.len()).map_err(|_| EncodeError::TooManyEvents {
                events: spans.len(),
                max: u16::MAX,
            })?;

        let tempo = source.tempo_bpm().round().clamp(1.0, u16::MAX as f64) as u16;
        let drums = !track.notes().is_empty()
            && track.notes().iter().all(|note| note.channel == DRUM_CHANNEL);

        let mut out = Vec::with_capacity(12 + spans.len() * 6);
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&tempo.to_le_bytes());
        out.push(TICKS_PER_BEAT);
        out.push(source.beats_per_measure());
        out.push(measures as u8);
        out.push(1);
        out.push(0);
        out.push(u8::from(drums));
        out.extend_from_slice(&event_count.to_le_bytes());
        for ((start, end), keys) in spans {
            out.extend_from_slice(&(start as u16).to_le_bytes());
            out.extend_from_slice(&(end as u16).to_le_bytes());
            out.push(keys.len() as u8);
            out.extend_from_slice(&keys);
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::source::{NoteEvent, TickScale};

    fn note(start_tick: u32, end_tick: u32, key: u8) -> NoteEvent {
        NoteEvent {
            start_tick,
            end_tick,
            key,
            velocity: 100,
            channel: 0,
        }
    }

    fn source_with(notes: Vec<NoteEvent>) -> MidiSource {
        let end_tick = notes.iter().map(|n| n.end_tick).max().unwrap_or(0);
        MidiSource {
            tracks: vec![Track {
                index: 0,
                name: None,
                notes,
                end_tick,
            }],
            scale: TickScale::Metrical {
                ticks_per_beat: 480.0,
            },
            us_per_beat: 500_000,
            beats_per_measure: 4,
            duration_secs: 0.0,
        }
    }

    fn encode(source: &MidiSource, divisor: f64) -> Result<Vec<u8>, EncodeError> {
        ArcadeSongEncoder.encode(
            source,
            &source.tracks()[0],
            Divisor::new(divisor).unwrap(),
        )
    }

    #[test]
    fn two_beats_encode_to_known_bytes() {
        let source = source_with(vec![note(0, 480, 60), note(480, 960, 64)]);
        let bytes = encode(&source, 1.0).unwrap();
        assert_eq!(
            bytes,
            vec![
                0, // version
                120, 0, // tempo
                8,   // ticks per beat
                4,   // beats per measure
                1,   // measures
                1,   // track count
                0,   // track id
                0,   // flags
                2, 0, // note-event count
                0, 0, 8, 0, 1, 60, // beat one
                8, 0, 16, 0, 1, 64, // beat two
            ]
        );
    }

    #[test]
    fn simultaneous_notes_merge_into_one_event() {
        let source = source_with(vec![
            note(0, 480, 64),
            note(0, 480, 60),
            note(0, 480, 60), // duplicate key
        ]);
        let bytes = encode(&source, 1.0).unwrap();
        // One event: span (0, 8) with keys 60, 64 ascending.
        assert_eq!(&bytes[9..], &[1, 0, 0, 0, 8, 0, 2, 60, 64]);
    }

    #[test]
    fn zero_length_notes_last_one_tick() {
        let source = source_with(vec![note(0, 0, 60)]);
        let bytes = encode(&source, 1.0).unwrap();
        assert_eq!(&bytes[9..], &[1, 0, 0, 0, 1, 0, 1, 60]);
    }

    #[test]
    fn empty_track_is_one_silent_measure() {
        let source = source_with(vec![]);
        let bytes = encode(&source, 1.0).unwrap();
        assert_eq!(bytes[5], 1); // measures
        assert_eq!(&bytes[9..], &[0, 0]); // no note events
    }

    #[test]
    fn divisor_scales_the_measure_count() {
        // 64 beats = 16 measures at divisor 1.
        let source = source_with(vec![note(0, 480 * 64, 60)]);
        assert_eq!(encode(&source, 1.0).unwrap()[5], 16);
        assert_eq!(encode(&source, 2.0).unwrap()[5], 8);
        assert_eq!(encode(&source, 0.5).unwrap()[5], 32);
    }

    #[test]
    fn over_long_songs_are_rejected_not_truncated() {
        // 4096 beats = 1024 measures at divisor 1.
        let source = source_with(vec![note(0, 480 * 4096, 60)]);
        let err = encode(&source, 1.0).unwrap_err();
        assert_eq!(
            err,
            EncodeError::Capacity {
                required: 1024,
                max: 255
            }
        );
        // A large enough divisor brings the same song into range.
        assert_eq!(encode(&source, 8.0).unwrap()[5], 128);
    }

    #[test]
    fn percussion_tracks_set_the_drum_flag() {
        let mut drum = note(0, 480, 36);
        drum.channel = 9;
        let source = source_with(vec![drum]);
        let bytes = encode(&source, 1.0).unwrap();
        assert_eq!(bytes[8], 1);
    }

    #[test]
    fn encoding_is_deterministic() {
        let source = source_with(vec![note(0, 480, 60), note(240, 720, 67)]);
        assert_eq!(encode(&source, 1.0).unwrap(), encode(&source, 1.0).unwrap());
    }
}
