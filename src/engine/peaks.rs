use crate::engine::spectrogram::{DB_FLOOR, HOP_LENGTH, SAMPLE_RATE};
use crate::models::Peak;

/// Fixed mel-bin bands; one candidate peak per band per frame.
const FREQ_BANDS: [(usize, usize); 5] = [(0, 10), (10, 20), (20, 40), (40, 80), (80, 128)];

/// Minimum band-maximum level, in the dB-normalised space (0 at the floor,
/// 1 at the matrix maximum).
const PEAK_THRESHOLD: f32 = 0.1;

/// Rescales a dB value into [0, 1] with 0 at DB_FLOOR and 1 at the matrix
/// maximum.
fn normalise_db(v: f32) -> f32 {
    (v - DB_FLOOR) / -DB_FLOOR
}

/// Extracts the constellation map from a dB-scaled mel spectrogram
/// (N_MELS rows by T frames).
///
/// For every frame and band, the band maximum qualifies as a peak when it
/// clears PEAK_THRESHOLD and neither temporal neighbour in the same bin
/// exceeds it. The result is strictly ordered by (time, frequency).
pub fn find_peaks(spectrogram: &[Vec<f32>]) -> Vec<Peak> {
    if spectrogram.is_empty() {
        return Vec::new();
    }
    let n_frames = spectrogram[0].len();

    let mut peaks = Vec::new();
    for t in 0..n_frames {
        for &(band_start, band_end) in FREQ_BANDS.iter() {
            let band_end = band_end.min(spectrogram.len());
            if band_start >= band_end {
                continue;
            }

            // Band argmax; first bin wins ties.
            let mut max_bin = band_start;
            let mut max_value = normalise_db(spectrogram[band_start][t]);
            for k in band_start + 1..band_end {
                let v = normalise_db(spectrogram[k][t]);
                if v > max_value {
                    max_bin = k;
                    max_value = v;
                }
            }

            if max_value <= PEAK_THRESHOLD {
                continue;
            }

            // Temporal local-maximality; missing neighbours pass.
            let row = &spectrogram[max_bin];
            let is_peak = [-1i64, 1].iter().all(|&off| {
                let u = t as i64 + off;
                if u < 0 || u >= n_frames as i64 {
                    true
                } else {
                    normalise_db(row[u as usize]) <= max_value
                }
            });

            if is_peak {
                peaks.push(Peak {
                    time: t as f64 * HOP_LENGTH as f64 / SAMPLE_RATE as f64,
                    freq_bin: max_bin,
                    magnitude: max_value,
                });
            }
        }
    }

    peaks.sort_by(|a, b| {
        a.time
            .total_cmp(&b.time)
            .then_with(|| a.freq_bin.cmp(&b.freq_bin))
    });
    peaks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spectrogram::N_MELS;

    fn floor_matrix(frames: usize) -> Vec<Vec<f32>> {
        vec![vec![DB_FLOOR; frames]; N_MELS]
    }

    #[test]
    fn test_floor_matrix_has_no_peaks() {
        assert!(find_peaks(&floor_matrix(20)).is_empty());
    }

    #[test]
    fn test_single_hot_bin_is_a_peak() {
        let mut spec = floor_matrix(9);
        spec[33][4] = 0.0;
        let peaks = find_peaks(&spec);
        assert_eq!(peaks.len(), 1);
        assert_eq!(peaks[0].freq_bin, 33);
        let expected_time = 4.0 * HOP_LENGTH as f64 / SAMPLE_RATE as f64;
        assert!((peaks[0].time - expected_time).abs() < 1e-12);
        assert!((peaks[0].magnitude - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_threshold_rejects_weak_maxima() {
        let mut spec = floor_matrix(9);
        // -75 dB normalises to 0.0625, below the 0.1 threshold.
        spec[33][4] = -75.0;
        assert!(find_peaks(&spec).is_empty());
    }

    #[test]
    fn test_louder_temporal_neighbour_suppresses() {
        let mut spec = floor_matrix(9);
        spec[33][4] = -10.0;
        spec[33][5] = -5.0;
        let peaks = find_peaks(&spec);
        // Frame 4 is suppressed by frame 5; frame 5 survives.
        assert_eq!(peaks.len(), 1);
        let hop_s = HOP_LENGTH as f64 / SAMPLE_RATE as f64;
        assert!((peaks[0].time - 5.0 * hop_s).abs() < 1e-12);
    }

    #[test]
    fn test_equal_temporal_neighbours_both_qualify() {
        let mut spec = floor_matrix(9);
        spec[33][4] = -10.0;
        spec[33][5] = -10.0;
        assert_eq!(find_peaks(&spec).len(), 2);
    }

    #[test]
    fn test_edge_frames_qualify() {
        let mut spec = floor_matrix(3);
        spec[5][0] = 0.0;
        spec[90][2] = -3.0;
        assert_eq!(find_peaks(&spec).len(), 2);
    }

    #[test]
    fn test_one_peak_per_band_per_frame() {
        let mut spec = floor_matrix(3);
        // Two hot bins in the same band at frame 1: only the louder emits.
        spec[41][1] = -2.0;
        spec[43][1] = -1.0;
        // A hot bin in another band at the same frame.
        spec[100][1] = -4.0;
        let peaks = find_peaks(&spec);
        assert_eq!(peaks.len(), 2);
        assert_eq!(peaks[0].freq_bin, 43);
        assert_eq!(peaks[1].freq_bin, 100);
    }

    #[test]
    fn test_strict_time_frequency_ordering() {
        let mut spec = floor_matrix(40);
        for (t, bin) in [(2usize, 85usize), (2, 15), (7, 50), (12, 3), (30, 127)] {
            spec[bin][t] = -5.0;
        }
        let peaks = find_peaks(&spec);
        assert_eq!(peaks.len(), 5);
        for pair in peaks.windows(2) {
            assert!(
                pair[0].time < pair[1].time
                    || (pair[0].time == pair[1].time && pair[0].freq_bin < pair[1].freq_bin)
            );
        }
    }
}
