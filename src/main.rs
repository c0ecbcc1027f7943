use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{Level, debug};

use midi2arcade::prelude::*;

#[derive(Parser, Debug)]
#[command(
    name = "midi2arcade",
    version,
    about = "Convert a MIDI file to the MakeCode Arcade song format"
)]
struct Args {
    /// Input MIDI file.
    #[arg(short, long)]
    input: PathBuf,

    /// Output text file path; prints to standard output when absent.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Track to convert: a zero-based index or a track name.
    /// Defaults to the first track in the file.
    #[arg(short, long)]
    track: Option<TrackSelector>,

    /// Divide the number of measures used. A higher value fits a longer
    /// song into the maximum of 255 measures, with less precision.
    /// Must be greater than 0.
    #[arg(short, long, default_value_t = 1.0)]
    divisor: f64,

    /// Break the hex string after this many byte pairs.
    /// 0 keeps everything on one line.
    #[arg(short = 'b', long = "break", default_value_t = 0)]
    char_break: i64,

    /// Include debug messages.
    #[arg(long)]
    debug: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = if args.debug { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_writer(std::io::stderr)
        .init();
    debug!("received arguments: {args:?}");

    let bytes = fs::read(&args.input)
        .with_context(|| format!("reading {}", args.input.display()))?;
    let source = MidiSource::from_bytes(&bytes)
        .with_context(|| format!("parsing {}", args.input.display()))?;
    debug!("MIDI is {:.1}s long", source.duration_secs());

    let track = args.track.unwrap_or_default();
    let result = convert(
        &source,
        OutputFormat::ArcadeHexString,
        &track,
        args.divisor,
        args.char_break,
    )?;

    match &args.output {
        None => {
            debug!("no output path provided, printing to standard output");
            println!("{result}");
        }
        Some(path) => {
            debug!("writing to {}", path.display());
            write_atomic(path, &result)
                .with_context(|| format!("writing {}", path.display()))?;
        }
    }
    Ok(())
}

/// Writes through a temp file in the target's directory so the destination
/// is never left half-written.
fn write_atomic(path: &Path, text: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(text.as_bytes())?;
    file.persist(path)?;
    Ok(())
}
