use std::f32::consts::PI;

use num_complex::Complex;
use rustfft::FftPlanner;

use crate::error::EngineError;

// Fingerprint frame parameters. These are part of the fingerprint contract:
// changing any of them invalidates every stored posting.
pub const SAMPLE_RATE: u32 = 22050;
pub const N_FFT: usize = 2048;
pub const HOP_LENGTH: usize = 512;
pub const N_MELS: usize = 128;

/// Floor of the dB-scaled spectrogram, relative to the matrix maximum.
pub const DB_FLOOR: f32 = -80.0;

const POWER_AMIN: f32 = 1e-10;

fn hann_window(length: usize) -> Vec<f32> {
    (0..length)
        .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / (length - 1) as f32).cos()))
        .collect()
}

fn hz_to_mel(hz: f32) -> f32 {
    2595.0 * (1.0 + hz / 700.0).log10()
}

fn mel_to_hz(mel: f32) -> f32 {
    700.0 * (10.0_f32.powf(mel / 2595.0) - 1.0)
}

/// One triangular mel filter: the first FFT bin it covers plus its weights.
struct MelFilter {
    first_bin: usize,
    weights: Vec<f32>,
}

/// Builds N_MELS triangular filters covering [0, SAMPLE_RATE/2].
fn mel_filter_bank() -> Vec<MelFilter> {
    let n_bins = N_FFT / 2 + 1;
    let max_mel = hz_to_mel(SAMPLE_RATE as f32 / 2.0);
    let bin_hz = SAMPLE_RATE as f32 / N_FFT as f32;

    // N_MELS + 2 edge frequencies, equally spaced on the mel scale.
    let edges: Vec<f32> = (0..N_MELS + 2)
        .map(|i| mel_to_hz(max_mel * i as f32 / (N_MELS + 1) as f32))
        .collect();

    let mut bank = Vec::with_capacity(N_MELS);
    for m in 0..N_MELS {
        let (lower, center, upper) = (edges[m], edges[m + 1], edges[m + 2]);
        let first_bin = (lower / bin_hz).ceil() as usize;
        let last_bin = ((upper / bin_hz).floor() as usize).min(n_bins - 1);

        let mut weights = Vec::new();
        for k in first_bin..=last_bin {
            let f = k as f32 * bin_hz;
            let rising = if center > lower { (f - lower) / (center - lower) } else { 0.0 };
            let falling = if upper > center { (upper - f) / (upper - center) } else { 0.0 };
            weights.push(rising.min(falling).max(0.0));
        }
        bank.push(MelFilter { first_bin, weights });
    }
    bank
}

/// Computes the mel-power spectrogram of mono PCM at SAMPLE_RATE, in dB
/// relative to the matrix maximum, clipped at DB_FLOOR.
///
/// Output shape is N_MELS rows by T frames with
/// `T = 1 + (len - N_FFT) / HOP_LENGTH` (zero frames for inputs shorter
/// than one window). Deterministic for identical input, and silence maps to
/// the floor value rather than NaN.
pub fn mel_spectrogram(samples: &[f32]) -> Result<Vec<Vec<f32>>, EngineError> {
    if samples.is_empty() {
        return Err(EngineError::Dsp("empty PCM input".into()));
    }

    let n_frames = if samples.len() < N_FFT {
        0
    } else {
        1 + (samples.len() - N_FFT) / HOP_LENGTH
    };
    if n_frames == 0 {
        return Ok(vec![Vec::new(); N_MELS]);
    }

    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(N_FFT);
    let window = hann_window(N_FFT);
    let bank = mel_filter_bank();
    let n_bins = N_FFT / 2 + 1;

    let mut mel_power = vec![vec![0.0f32; n_frames]; N_MELS];
    let mut buffer = vec![Complex::new(0.0f32, 0.0f32); N_FFT];
    let mut power = vec![0.0f32; n_bins];

    for t in 0..n_frames {
        let start = t * HOP_LENGTH;
        for (j, slot) in buffer.iter_mut().enumerate() {
            *slot = Complex::new(samples[start + j] * window[j], 0.0);
        }
        fft.process(&mut buffer);

        for (k, slot) in power.iter_mut().enumerate() {
            *slot = buffer[k].norm_sqr();
        }

        for (m, filter) in bank.iter().enumerate() {
            let mut acc = 0.0f32;
            for (i, &w) in filter.weights.iter().enumerate() {
                acc += w * power[filter.first_bin + i];
            }
            mel_power[m][t] = acc;
        }
    }

    Ok(power_to_db(mel_power))
}

/// Converts mel power to dB referenced to the matrix maximum. An all-zero
/// matrix (silence) maps to DB_FLOOR everywhere.
fn power_to_db(mut mel_power: Vec<Vec<f32>>) -> Vec<Vec<f32>> {
    let max_power = mel_power
        .iter()
        .flat_map(|row| row.iter().copied())
        .fold(0.0f32, f32::max);

    if max_power <= POWER_AMIN {
        for row in mel_power.iter_mut() {
            for v in row.iter_mut() {
                *v = DB_FLOOR;
            }
        }
        return mel_power;
    }

    for row in mel_power.iter_mut() {
        for v in row.iter_mut() {
            *v = (10.0 * (v.max(POWER_AMIN) / max_power).log10()).max(DB_FLOOR);
        }
    }
    mel_power
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_count() {
        let samples = vec![0.1f32; N_FFT + 5 * HOP_LENGTH];
        let spec = mel_spectrogram(&samples).unwrap();
        assert_eq!(spec.len(), N_MELS);
        assert_eq!(spec[0].len(), 6);
    }

    #[test]
    fn test_short_input_yields_zero_frames() {
        let samples = vec![0.5f32; N_FFT - 1];
        let spec = mel_spectrogram(&samples).unwrap();
        assert_eq!(spec.len(), N_MELS);
        assert!(spec.iter().all(|row| row.is_empty()));
    }

    #[test]
    fn test_empty_input_is_an_error() {
        assert!(mel_spectrogram(&[]).is_err());
    }

    #[test]
    fn test_silence_maps_to_floor_without_nans() {
        let samples = vec![0.0f32; SAMPLE_RATE as usize];
        let spec = mel_spectrogram(&samples).unwrap();
        for row in &spec {
            for &v in row {
                assert!(v.is_finite());
                assert_eq!(v, DB_FLOOR);
            }
        }
    }

    #[test]
    fn test_tone_is_referenced_to_matrix_max() {
        let sr = SAMPLE_RATE as f32;
        let samples: Vec<f32> = (0..SAMPLE_RATE)
            .map(|i| (2.0 * PI * 440.0 * i as f32 / sr).sin())
            .collect();
        let spec = mel_spectrogram(&samples).unwrap();

        let mut max = f32::NEG_INFINITY;
        for row in &spec {
            for &v in row {
                assert!(v.is_finite());
                assert!(v <= 0.0 && v >= DB_FLOOR);
                max = max.max(v);
            }
        }
        assert_eq!(max, 0.0);
    }

    #[test]
    fn test_determinism() {
        let sr = SAMPLE_RATE as f32;
        let samples: Vec<f32> = (0..SAMPLE_RATE)
            .map(|i| (2.0 * PI * 523.25 * i as f32 / sr).sin())
            .collect();
        let a = mel_spectrogram(&samples).unwrap();
        let b = mel_spectrogram(&samples).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_filter_bank_covers_every_filter() {
        let bank = mel_filter_bank();
        assert_eq!(bank.len(), N_MELS);
        for filter in &bank {
            assert!(filter.first_bin + filter.weights.len() <= N_FFT / 2 + 1);
            assert!(filter.weights.iter().any(|&w| w > 0.0));
        }
    }
}
