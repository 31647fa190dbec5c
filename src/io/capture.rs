//! Microphone capture and playback, generalized only enough to live
//! outside a binary-specific module. Device/stream setup failures are
//! treated as unrecoverable (`expect`) rather than propagated, there is
//! no fallback for "no input device" short of plugging one in.

use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

use audio_gate::NoiseGate;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SupportedStreamConfig;
use hound::{SampleFormat, WavSpec, WavWriter};
use log::{info, warn};

use crate::error::Result;

/// Record from the default input device for `duration`, returning the raw
/// samples (not yet downmixed or resampled) and the device config used.
pub fn record_audio(duration: Duration) -> (Vec<f32>, SupportedStreamConfig) {
    let host = cpal::default_host();
    let device = host
        .default_input_device()
        .expect("no input device found");
    let config = device
        .default_input_config()
        .expect("no supported input config");

    // gate applied downstream once the caller downmixes to mono
    let _gate = NoiseGate::new(
        -36.0,
        -54.0,
        config.sample_rate().0 as f32,
        config.channels(),
        150.0,
        25.0,
        150.0,
    );

    let recorded = Arc::new(Mutex::new(Vec::new()));
    let recorded_clone = recorded.clone();
    let err_fn = |err| warn!("input stream error: {err}");

    let stream = match config.sample_format() {
        cpal::SampleFormat::F32 => device
            .build_input_stream(
                &config.clone().into(),
                move |data: &[f32], _: &_| {
                    recorded_clone.lock().unwrap().extend_from_slice(data);
                },
                err_fn,
                None,
            )
            .expect("failed to build input stream"),
        cpal::SampleFormat::I16 => device
            .build_input_stream(
                &config.clone().into(),
                move |data: &[i16], _: &_| {
                    let mut samples = recorded_clone.lock().unwrap();
                    samples.extend(data.iter().map(|&s| s as f32 / i16::MAX as f32));
                },
                err_fn,
                None,
            )
            .expect("failed to build input stream"),
        other => panic!("unsupported input sample format: {other:?}"),
    };

    stream.play().expect("failed to start input stream");
    info!("recording for {:.1}s", duration.as_secs_f32());
    thread::sleep(duration);
    drop(stream);

    let samples = recorded.lock().unwrap().clone();
    (samples, config)
}

/// Play `samples` back through the default output device, blocking until
/// playback finishes.
pub fn play_recording(samples: Vec<f32>, config: &cpal::StreamConfig) {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .expect("no output device available");

    let duration_secs =
        samples.len() as f32 / (config.sample_rate.0 as f32 * config.channels as f32);
    let mut samples_iter = samples.into_iter();

    let stream = device
        .build_output_stream(
            config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                for sample in data.iter_mut() {
                    *sample = samples_iter.next().unwrap_or(0.0);
                }
            },
            |err| warn!("output stream error: {err}"),
            None,
        )
        .expect("failed to build output stream");

    stream.play().expect("failed to start output stream");
    info!("playing back {:.2}s", duration_secs);
    thread::sleep(Duration::from_secs_f32(duration_secs + 1.0));
}

/// Linear resampling between two sample rates.
pub fn resample_linear(samples: &[f32], from_rate: u32, to_rate: u32) -> Vec<f32> {
    if from_rate == to_rate {
        return samples.to_vec();
    }
    let ratio = from_rate as f64 / to_rate as f64;
    let new_len = (samples.len() as f64 / ratio) as usize;
    let mut resampled = Vec::with_capacity(new_len);

    for i in 0..new_len {
        let in_idx_float = i as f64 * ratio;
        let in_idx_int = in_idx_float.floor() as usize;
        let frac = in_idx_float.fract() as f32;

        if in_idx_int + 1 < samples.len() {
            let p1 = samples[in_idx_int];
            let p2 = samples[in_idx_int + 1];
            resampled.push(p1 + frac * (p2 - p1));
        } else if in_idx_int < samples.len() {
            resampled.push(samples[in_idx_int]);
        } else {
            break;
        }
    }
    resampled
}

/// Save `samples` as a 16-bit PCM WAV file.
pub fn save_as_wav(samples: &[f32], config: &SupportedStreamConfig, path: &str) -> Result<()> {
    let wav_spec = WavSpec {
        channels: config.channels(),
        sample_rate: config.sample_rate().0,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    };

    let mut writer = WavWriter::create(path, wav_spec)
        .map_err(|e| crate::error::Error::IoError(std::io::Error::other(e.to_string())))?;
    for &sample in samples {
        let amplitude = i16::MAX as f32;
        writer
            .write_sample((sample * amplitude) as i16)
            .map_err(|e| crate::error::Error::IoError(std::io::Error::other(e.to_string())))?;
    }
    writer
        .finalize()
        .map_err(|e| crate::error::Error::IoError(std::io::Error::other(e.to_string())))?;
    Ok(())
}
