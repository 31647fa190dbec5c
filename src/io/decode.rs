//! File decoding: compressed/lossless audio on disk to mono `f32` PCM.
//!
//! A non-panicking `Result`-returning API over `symphonia`. Channel
//! downmixing generalizes a simple stereo average to N channels; anything
//! beyond two channels is averaged across all planes rather than rejected.
//!
//! Does not resample: [`crate::spectrogram`] contracts that the caller
//! hands it PCM already at `Config::sample_rate`.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::{AudioBufferRef, Signal};
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;

use crate::error::{Error, Result};

/// A decoded mono PCM buffer and the sample rate it was decoded at.
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode `path` into mono PCM, downmixing multichannel sources by
/// averaging all channels per frame.
pub fn decode_file<P: AsRef<Path>>(path: P) -> Result<DecodedAudio> {
    let file = File::open(path)?;
    let source = MediaSourceStream::new(Box::new(file), Default::default());

    let probed = symphonia::default::get_probe()
        .format(
            &Hint::new(),
            source,
            &FormatOptions::default(),
            &MetadataOptions::default(),
        )
        .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;
    let mut format = probed.format;

    let track = format
        .tracks()
        .first()
        .ok_or_else(|| Error::IoError(std::io::Error::other("no decodable track found")))?;
    let track_id = track.id;
    let codec_params = track.codec_params.clone();
    let sample_rate = codec_params
        .sample_rate
        .ok_or_else(|| Error::IoError(std::io::Error::other("track has no sample rate")))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&codec_params, &DecoderOptions::default())
        .map_err(|e| Error::IoError(std::io::Error::other(e.to_string())))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(_)) => break,
            Err(e) => return Err(Error::IoError(std::io::Error::other(e.to_string()))),
        };
        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(Error::IoError(std::io::Error::other(e.to_string()))),
        };

        append_downmixed(&decoded, &mut samples);
    }

    Ok(DecodedAudio { samples, sample_rate })
}

fn append_downmixed(decoded: &AudioBufferRef, out: &mut Vec<f32>) {
    match decoded {
        AudioBufferRef::F32(buf) => downmix(buf.planes().planes(), buf.frames(), out),
        AudioBufferRef::S32(buf) => {
            let planes: Vec<Vec<f32>> = buf
                .planes()
                .planes()
                .iter()
                .map(|p| p.iter().map(|&s| s as f32 / i32::MAX as f32).collect())
                .collect();
            let refs: Vec<&[f32]> = planes.iter().map(|p| p.as_slice()).collect();
            downmix(&refs, buf.frames(), out);
        }
        AudioBufferRef::S16(buf) => {
            let planes: Vec<Vec<f32>> = buf
                .planes()
                .planes()
                .iter()
                .map(|p| p.iter().map(|&s| s as f32 / i16::MAX as f32).collect())
                .collect();
            let refs: Vec<&[f32]> = planes.iter().map(|p| p.as_slice()).collect();
            downmix(&refs, buf.frames(), out);
        }
        _ => {
            // other sample formats are rare, skip
        }
    }
}

fn downmix(planes: &[&[f32]], frames: usize, out: &mut Vec<f32>) {
    if planes.is_empty() {
        return;
    }
    let n = planes.len() as f32;
    out.reserve(frames);
    for i in 0..frames {
        let sum: f32 = planes.iter().map(|p| p[i]).sum();
        out.push(sum / n);
    }
}
