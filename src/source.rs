//! Recorded sample streams: plain text/CSV captures and audio containers.

use crate::error::{Error, Result};
use log::{debug, info};
use std::fs::File;
use std::io::{self, Write};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as DecodeError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::default::{get_codecs, get_probe};

/// One sample period as reported by the acquisition side.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceEvent {
    Sample(f64),
    /// Electrodes detached; no sample was taken this period.
    LeadsOff,
}

#[derive(Debug, Clone)]
pub struct Recording {
    pub events: Vec<SourceEvent>,
    /// Rate stored in the container, when the format carries one.
    pub sample_rate: Option<f64>,
}

const TEXT_EXTENSIONS: &[&str] = &["txt", "csv", "dat", "log"];

pub fn load<P: AsRef<Path>>(path: P, column: usize) -> Result<Recording> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some(e) if !TEXT_EXTENSIONS.contains(&e) => {
            let (samples, rate) = load_audio(path)?;
            Ok(Recording {
                events: samples.into_iter().map(SourceEvent::Sample).collect(),
                sample_rate: Some(rate as f64),
            })
        }
        _ => {
            info!("Reading samples from {}", path.display());
            let text = std::fs::read_to_string(path)?;
            let events = parse_text(&text, column)?;
            info!("Read {} sample periods", events.len());
            Ok(Recording {
                events,
                sample_rate: None,
            })
        }
    }
}

/// Parses one sample period per line. `#` starts a comment, `!` or `leads-off` marks a
/// detached period, and comma/semicolon/whitespace separated rows are read at `column`.
pub fn parse_text(text: &str, column: usize) -> Result<Vec<SourceEvent>> {
    let mut events = Vec::new();
    for (n, raw) in text.lines().enumerate() {
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }
        if line == "!" || line.eq_ignore_ascii_case("leads-off") {
            events.push(SourceEvent::LeadsOff);
            continue;
        }

        let field = line
            .split(|c: char| c == ',' || c == ';' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .nth(column)
            .ok_or_else(|| Error::Parse {
                line: n + 1,
                message: format!("no column {}", column),
            })?;
        if field == "!" {
            events.push(SourceEvent::LeadsOff);
            continue;
        }
        let value = field.parse::<f64>().map_err(|e| Error::Parse {
            line: n + 1,
            message: format!("'{}': {}", field, e),
        })?;
        events.push(SourceEvent::Sample(value));
    }
    Ok(events)
}

pub fn load_audio<P: AsRef<Path>>(path: P) -> Result<(Vec<f64>, u32)> {
    let path = path.as_ref();
    info!("Decoding samples from {}", path.display());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }
    let stream = MediaSourceStream::new(Box::new(File::open(path)?), Default::default());
    let mut reader = get_probe()
        .format(&hint, stream, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|e| Error::Decode(format!("unrecognised container: {}", e)))?
        .format;

    let (track_id, params) = reader
        .default_track()
        .filter(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .map(|t| (t.id, t.codec_params.clone()))
        .ok_or_else(|| Error::Decode("no decodable track".to_string()))?;
    let sample_rate = params
        .sample_rate
        .ok_or_else(|| Error::Decode("track has no sample rate".to_string()))?;
    let mut decoder = get_codecs()
        .make(&params, &DecoderOptions::default())
        .map_err(|e| Error::Decode(e.to_string()))?;

    let mut lead = Vec::new();
    loop {
        let packet = match reader.next_packet() {
            Ok(packet) => packet,
            Err(DecodeError::IoError(e)) if e.kind() == io::ErrorKind::UnexpectedEof => break,
            // a single-lead capture has nothing to resume after a stream change
            Err(DecodeError::ResetRequired) => break,
            Err(e) => return Err(Error::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(DecodeError::DecodeError(msg)) => {
                debug!("Skipping corrupt packet: {}", msg);
                continue;
            }
            Err(e) => return Err(Error::Decode(e.to_string())),
        };
        if decoded.frames() == 0 {
            continue;
        }
        let spec = *decoded.spec();
        let mut buf = SampleBuffer::<f64>::new(decoded.capacity() as u64, spec);
        buf.copy_interleaved_ref(decoded);
        lead.extend(mix_to_mono(buf.samples(), spec.channels.count()));
    }

    info!("Decoded {} samples at {}Hz", lead.len(), sample_rate);
    Ok((lead, sample_rate))
}

fn mix_to_mono(interleaved: &[f64], channels: usize) -> Vec<f64> {
    if channels <= 1 {
        return interleaved.to_vec();
    }
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f64>() / channels as f64)
        .collect()
}

/// Baseline of zero with an impulse every `period` samples, starting at sample 0.
pub fn impulse_train(len: usize, period: usize, amplitude: f64) -> Vec<f64> {
    (0..len)
        .map(|i| if period > 0 && i % period == 0 { amplitude } else { 0.0 })
        .collect()
}

pub fn write_text<P: AsRef<Path>>(path: P, samples: &[f64]) -> Result<()> {
    let path = path.as_ref();
    let mut out = io::BufWriter::new(File::create(path)?);
    for sample in samples {
        writeln!(out, "{}", sample)?;
    }
    out.flush()?;
    info!("Wrote {} samples to {}", samples.len(), path.display());
    Ok(())
}
