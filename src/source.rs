#![doc = r#"
An owned, note-level view of a parsed MIDI file.

[`MidiSource`] flattens the event stream that [`midly`] produces into one
[`Track`] per MIDI track chunk, each holding absolute-tick [`NoteEvent`]s.
Delta times are accumulated while parsing, `NoteOn` events with velocity 0
are treated as `NoteOff` (running-status shorthand many files use), and a
note that never receives its `NoteOff` is closed at the track's end.

The source is read-only once built: the conversion pipeline borrows tracks
out of it and never mutates it.
"#]

use std::collections::HashMap;

use midly::{MetaMessage, MidiMessage, Smf, Timing, TrackEventKind};
use thiserror::Error;

/// Default tempo when the file carries no tempo event, in µs per beat (120 BPM).
const DEFAULT_US_PER_BEAT: u32 = 500_000;

/// Default time signature numerator when the file carries none.
const DEFAULT_BEATS_PER_MEASURE: u8 = 4;

/// Errors produced while parsing raw bytes into a [`MidiSource`].
#[derive(Debug, Error)]
pub enum SourceError {
    /// The bytes are not a well-formed standard MIDI file.
    #[error("malformed MIDI data: {0}")]
    Malformed(#[from] midly::Error),
}

/// A single note: where it starts, where it ends, and what it sounds like.
///
/// Ticks are absolute from the start of the track, in the file's own tick
/// unit (resolution comes from the header, see [`MidiSource::beats_at`]).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NoteEvent {
    /// Absolute tick at which the note sounds.
    pub start_tick: u32,
    /// Absolute tick at which the note is released. Never before `start_tick`.
    pub end_tick: u32,
    /// MIDI key number, 0-127.
    pub key: u8,
    /// Attack velocity, 1-127.
    pub velocity: u8,
    /// MIDI channel, 0-15. Channel 9 is percussion by convention.
    pub channel: u8,
}

/// One track of the file: an optional name and its notes in onset order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Track {
    pub(crate) index: usize,
    pub(crate) name: Option<String>,
    pub(crate) notes: Vec<NoteEvent>,
    pub(crate) end_tick: u32,
}

impl Track {
    /// Position of this track in the file, zero-based.
    pub fn index(&self) -> usize {
        self.index
    }

    /// The track's name from its `TrackName` meta event, if it has one.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Notes sorted by onset tick, then key.
    pub fn notes(&self) -> &[NoteEvent] {
        &self.notes
    }

    /// Absolute tick of the last event in the track.
    pub fn end_tick(&self) -> u32 {
        self.end_tick
    }
}

/// How the file's ticks relate to musical time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum TickScale {
    /// Delta times count fractions of a beat.
    Metrical { ticks_per_beat: f64 },
    /// Delta times count fractions of a wall-clock second (SMPTE).
    Timecode { ticks_per_second: f64 },
}

#[doc = r#"
A parsed MIDI file, reduced to what the song encoder needs.

Exposes the ordered track list, the total duration, and the timing facts
the encoder quantizes against: the first tempo (120 BPM when absent), the
first time signature numerator (4 when absent), and the header's tick
resolution.
"#]
#[derive(Debug, Clone, PartialEq)]
pub struct MidiSource {
    pub(crate) tracks: Vec<Track>,
    pub(crate) scale: TickScale,
    pub(crate) us_per_beat: u32,
    pub(crate) beats_per_measure: u8,
    pub(crate) duration_secs: f64,
}

impl MidiSource {
    /// Parse a standard MIDI file from raw bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, SourceError> {
        let smf = Smf::parse(bytes)?;

        let scale = match smf.header.timing {
            Timing::Metrical(tpqn) => TickScale::Metrical {
                ticks_per_beat: tpqn.as_int() as f64,
            },
            Timing::Timecode(fps, ticks_per_frame) => TickScale::Timecode {
                ticks_per_second: fps.as_f32() as f64 * ticks_per_frame as f64,
            },
        };

        let mut tracks = Vec::with_capacity(smf.tracks.len());
        let mut tempo_changes: Vec<(u32, u32)> = Vec::new();
        let mut beats_per_measure = None;

        for (index, events) in smf.tracks.iter().enumerate() {
            let mut track = TrackBuilder::new(index);

            for event in events {
                track.tick += event.delta.as_int();
                match event.kind {
                    TrackEventKind::Midi { channel, message } => {
                        track.handle_message(channel.as_int(), message);
                    }
                    TrackEventKind::Meta(MetaMessage::TrackName(raw)) => {
                        if track.name.is_none() {
                            let name = String::from_utf8_lossy(raw).trim().to_owned();
                            if !name.is_empty() {
                                track.name = Some(name);
                            }
                        }
                    }
                    TrackEventKind::Meta(MetaMessage::Tempo(us_per_beat)) => {
                        tempo_changes.push((track.tick, us_per_beat.as_int()));
                    }
                    TrackEventKind::Meta(MetaMessage::TimeSignature(numerator, ..)) => {
                        if beats_per_measure.is_none() && numerator > 0 {
                            // Caps the numerator so song ticks stay within the
                            // format's u16 note-event fields.
                            beats_per_measure = Some(numerator.min(32));
                        }
                    }
                    _ => {}
                }
            }

            tracks.push(track.finish());
        }

        tempo_changes.sort_by_key(|&(tick, _)| tick);
        let us_per_beat = tempo_changes
            .first()
            .map(|&(_, tempo)| tempo)
            .unwrap_or(DEFAULT_US_PER_BEAT);

        let last_tick = tracks.iter().map(Track::end_tick).max().unwrap_or(0);
        let duration_secs = duration_secs(&scale, &tempo_changes, last_tick);

        Ok(Self {
            tracks,
            scale,
            us_per_beat,
            beats_per_measure: beats_per_measure.unwrap_or(DEFAULT_BEATS_PER_MEASURE),
            duration_secs,
        })
    }

    /// The file's tracks, in file order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    /// Total duration of the file in seconds, accounting for tempo changes.
    pub fn duration_secs(&self) -> f64 {
        self.duration_secs
    }

    /// The governing tempo in beats per minute (the file's first tempo event,
    /// or 120 when there is none).
    pub fn tempo_bpm(&self) -> f64 {
        60_000_000.0 / self.us_per_beat as f64
    }

    /// Beats per measure from the file's first time signature, or 4.
    pub fn beats_per_measure(&self) -> u8 {
        self.beats_per_measure
    }

    /// Converts an absolute tick into a beat position.
    ///
    /// For SMPTE-timed files the ticks measure wall-clock time, so the beat
    /// position runs through seconds at the governing tempo.
    pub fn beats_at(&self, tick: u32) -> f64 {
        match self.scale {
            TickScale::Metrical { ticks_per_beat } => tick as f64 / ticks_per_beat,
            TickScale::Timecode { ticks_per_second } => {
                let secs = tick as f64 / ticks_per_second;
                secs * 1_000_000.0 / self.us_per_beat as f64
            }
        }
    }
}

/// Accumulates one track's events while walking its delta times.
struct TrackBuilder {
    index: usize,
    tick: u32,
    name: Option<String>,
    notes: Vec<NoteEvent>,
    open: HashMap<(u8, u8), Vec<(u32, u8)>>,
}

impl TrackBuilder {
    fn new(index: usize) -> Self {
        Self {
            index,
            tick: 0,
            name: None,
            notes: Vec::new(),
            open: HashMap::new(),
        }
    }

    fn handle_message(&mut self, channel: u8, message: MidiMessage) {
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                self.open
                    .entry((channel, key.as_int()))
                    .or_default()
                    .push((self.tick, vel.as_int()));
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                self.close(channel, key.as_int(), self.tick);
            }
            _ => {}
        }
    }

    fn close(&mut self, channel: u8, key: u8, end_tick: u32) {
        let Some(stack) = self.open.get_mut(&(channel, key)) else {
            return;
        };
        let Some((start_tick, velocity)) = stack.pop() else {
            return;
        };
        self.notes.push(NoteEvent {
            start_tick,
            end_tick,
            key,
            velocity,
            channel,
        });
    }

    fn finish(mut self) -> Track {
        // Notes still sounding at end-of-track are released there.
        let open = std::mem::take(&mut self.open);
        for ((channel, key), stack) in open {
            for (start_tick, velocity) in stack {
                self.notes.push(NoteEvent {
                    start_tick,
                    end_tick: self.tick,
                    key,
                    velocity,
                    channel,
                });
            }
        }
        self.notes
            .sort_by_key(|note| (note.start_tick, note.key, note.channel));
        Track {
            index: self.index,
            name: self.name,
            notes: self.notes,
            end_tick: self.tick,
        }
    }
}

/// Walks the tempo map to turn the last tick into seconds.
fn duration_secs(scale: &TickScale, tempo_changes: &[(u32, u32)], last_tick: u32) -> f64 {
    let ticks_per_beat = match *scale {
        TickScale::Timecode { ticks_per_second } => {
            return last_tick as f64 / ticks_per_second;
        }
        TickScale::Metrical { ticks_per_beat } => ticks_per_beat,
    };

    let mut secs = 0.0;
    let mut at_tick = 0u32;
    let mut us_per_beat = DEFAULT_US_PER_BEAT as f64;
    for &(tick, tempo) in tempo_changes {
        if tick >= last_tick {
            break;
        }
        if tick > at_tick {
            secs += (tick - at_tick) as f64 / ticks_per_beat * us_per_beat / 1_000_000.0;
            at_tick = tick;
        }
        us_per_beat = tempo as f64;
    }
    secs + (last_tick - at_tick) as f64 / ticks_per_beat * us_per_beat / 1_000_000.0
}
