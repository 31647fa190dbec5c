//! End-to-end scenarios over the public `enroll`/`identify` surface,
//! exercised against synthetic signals so results are reproducible without
//! shipping audio fixtures.

use std::time::Duration;

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use sabi_fp::index::OpenMode;
use sabi_fp::matcher::CancellationToken;
use sabi_fp::{enroll, identify, open_index, Config, Error, TrackId};

fn chirp(config: &Config, seconds: f32, f_start: f32, f_end: f32) -> Vec<f32> {
    let len = (config.sample_rate as f32 * seconds) as usize;
    let k = (f_end - f_start) / seconds;
    (0..len)
        .map(|i| {
            let t = i as f32 / config.sample_rate as f32;
            let phase = 2.0 * std::f32::consts::PI * (f_start * t + 0.5 * k * t * t);
            phase.sin()
        })
        .collect()
}

fn white_noise(config: &Config, seconds: f32, seed: u64) -> Vec<f32> {
    let len = (config.sample_rate as f32 * seconds) as usize;
    let mut rng = StdRng::seed_from_u64(seed);
    (0..len).map(|_| rng.random_range(-1.0f32..1.0)).collect()
}

#[test]
fn sine_sweep_full_clip_query_matches_at_zero_offset() {
    let config = Config::default();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idx.bin");
    let mut store = open_index(&path, OpenMode::Append, &config).unwrap();

    let track = chirp(&config, 6.0, 200.0, 4000.0);
    enroll(TrackId(1), &track, &mut store, &config).unwrap();

    let outcome = identify(
        &track,
        &store,
        5,
        Duration::from_secs(5),
        &CancellationToken::new(),
        &config,
    )
    .unwrap();

    assert!(!outcome.partial);
    assert!(outcome.confident);
    assert_eq!(outcome.candidates[0].track_id, TrackId(1));
    assert_eq!(outcome.candidates[0].delta, 0);
}

#[test]
fn sine_sweep_partial_snippet_query_recovers_nonzero_offset() {
    let config = Config::default();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idx.bin");
    let mut store = open_index(&path, OpenMode::Append, &config).unwrap();

    let track = chirp(&config, 10.0, 200.0, 4000.0);
    enroll(TrackId(1), &track, &mut store, &config).unwrap();

    let start_frame = 3;
    let start_sample = start_frame * config.hop;
    let snippet_len = config.sample_rate as usize * 3;
    let snippet = &track[start_sample..start_sample + snippet_len];

    let outcome = identify(
        snippet,
        &store,
        5,
        Duration::from_secs(5),
        &CancellationToken::new(),
        &config,
    )
    .unwrap();

    assert!(outcome.confident);
    assert_eq!(outcome.candidates[0].track_id, TrackId(1));
    assert_eq!(outcome.candidates[0].delta, start_frame as i64);
}

#[test]
fn two_noise_tracks_are_distinguished_with_a_score_gap() {
    let config = Config::default();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idx.bin");
    let mut store = open_index(&path, OpenMode::Append, &config).unwrap();

    let track_a = white_noise(&config, 5.0, 1);
    let track_b = white_noise(&config, 5.0, 2);
    enroll(TrackId(1), &track_a, &mut store, &config).unwrap();
    enroll(TrackId(2), &track_b, &mut store, &config).unwrap();

    let outcome = identify(
        &track_a,
        &store,
        5,
        Duration::from_secs(5),
        &CancellationToken::new(),
        &config,
    )
    .unwrap();

    assert!(outcome.confident);
    assert_eq!(outcome.candidates[0].track_id, TrackId(1));
    let runner_up = outcome.candidates.get(1).map(|c| c.score).unwrap_or(0);
    assert!(outcome.candidates[0].score as f32 >= config.alpha * runner_up as f32);
}

#[test]
fn noisy_mix_of_the_query_still_matches() {
    let config = Config::default();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idx.bin");
    let mut store = open_index(&path, OpenMode::Append, &config).unwrap();

    let track = chirp(&config, 6.0, 200.0, 4000.0);
    enroll(TrackId(1), &track, &mut store, &config).unwrap();

    let noise = white_noise(&config, 6.0, 99);
    let mixed: Vec<f32> = track
        .iter()
        .zip(noise.iter())
        .map(|(&s, &n)| s + 0.1 * n)
        .collect();

    let outcome = identify(
        &mixed,
        &store,
        5,
        Duration::from_secs(5),
        &CancellationToken::new(),
        &config,
    )
    .unwrap();

    assert_eq!(outcome.candidates[0].track_id, TrackId(1));
    assert_eq!(outcome.candidates[0].delta, 0);
}

#[test]
fn reopening_an_index_with_different_parameters_is_refused() {
    let config = Config::default();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idx.bin");

    {
        let mut store = open_index(&path, OpenMode::Append, &config).unwrap();
        let track = chirp(&config, 3.0, 200.0, 2000.0);
        enroll(TrackId(1), &track, &mut store, &config).unwrap();
    }

    let mut other = Config::default();
    other.fan_out = config.fan_out + 1;
    let result = open_index(&path, OpenMode::Read, &other);
    assert!(matches!(result, Err(Error::ParamDigestMismatch)));
}

#[test]
fn a_truncated_index_file_is_reported_as_corrupt() {
    let config = Config::default();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("idx.bin");

    {
        let mut store = open_index(&path, OpenMode::Append, &config).unwrap();
        let track = chirp(&config, 3.0, 200.0, 2000.0);
        enroll(TrackId(1), &track, &mut store, &config).unwrap();
    }

    let len = std::fs::metadata(&path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(len.saturating_sub(10)).unwrap();
    drop(file);

    let result = open_index(&path, OpenMode::Read, &config);
    assert!(matches!(result, Err(Error::CorruptIndex(_))));
}
