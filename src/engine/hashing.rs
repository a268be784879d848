use crate::models::{FingerprintHash, Peak};

/// Target zone bounds: an anchor pairs only with peaks between MIN and MAX
/// seconds ahead of it.
pub const MIN_TIME_DELTA: f64 = 0.1;
pub const MAX_TIME_DELTA: f64 = 2.0;

/// Maximum number of target peaks paired with each anchor.
pub const FANOUT: usize = 5;

/// Generates combinatorial hashes from a time-ordered constellation.
///
/// For each anchor, the scan collects the first FANOUT peaks inside the
/// target zone; peaks nearer than MIN_TIME_DELTA are skipped, and the scan
/// stops at the first peak beyond MAX_TIME_DELTA (the list is sorted by
/// time). Each pair yields a 12-hex-char MD5 token keyed on the two
/// frequency bins and the millisecond delta, paired with the anchor time.
pub fn generate_hashes(peaks: &[Peak]) -> Vec<FingerprintHash> {
    let mut hashes = Vec::new();

    for (i, anchor) in peaks.iter().enumerate() {
        let mut found = 0;
        for target in &peaks[i + 1..] {
            let time_delta = target.time - anchor.time;
            if time_delta < MIN_TIME_DELTA {
                continue;
            }
            if time_delta > MAX_TIME_DELTA {
                break;
            }

            hashes.push(FingerprintHash {
                token: hash_token(anchor.freq_bin, target.freq_bin, time_delta),
                time_offset: anchor.time,
            });

            found += 1;
            if found >= FANOUT {
                break;
            }
        }
    }

    hashes
}

/// First 12 hex chars of MD5("{f_anchor}_{f_target}_{delta_ms}"), with the
/// delta truncated to whole milliseconds.
fn hash_token(anchor_freq: usize, target_freq: usize, time_delta: f64) -> String {
    let key = format!("{}_{}_{}", anchor_freq, target_freq, (time_delta * 1000.0) as i64);
    let digest = format!("{:x}", md5::compute(key.as_bytes()));
    digest[..12].to_string()
}
