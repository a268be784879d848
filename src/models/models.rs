use serde::{Deserialize, Serialize};

/// A catalog entry as stored in the songs table.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SongRecord {
    pub id: i64,
    pub filename: String,
    pub title: Option<String>,
    pub artist: Option<String>,
    pub duration: Option<f64>,
    pub created_at: Option<String>,
}

/// A constellation point: one spectral maximum in one analysis frame.
/// Derived from the spectrogram, never persisted.
#[derive(Debug, Clone, Copy)]
pub struct Peak {
    pub time: f64,
    pub freq_bin: usize,
    pub magnitude: f32,
}

/// One fingerprint: a 12-hex-char token plus the anchor's absolute time
/// in the source recording.
#[derive(Debug, Clone)]
pub struct FingerprintHash {
    pub token: String,
    pub time_offset: f64,
}

/// A posting returned by the index, joined with its song metadata and the
/// query anchor time the token was probed with.
#[derive(Debug, Clone)]
pub struct HashHit {
    pub query_time: f64,
    pub stored_time: f64,
    pub song: SongRecord,
}

/// A ranked candidate produced by the matcher.
#[derive(Debug, Clone, Serialize)]
pub struct MatchCandidate {
    pub song: SongRecord,
    pub confidence: f64,
    pub coherent_matches: usize,
    pub total_matches: usize,
    pub song_offset: f64,
}

/// Counts reported after fingerprinting a query clip.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct QueryStats {
    pub peaks_found: usize,
    pub hashes_generated: usize,
}

/// Result of enrolling one recording.
#[derive(Debug, Clone)]
pub struct EnrollReport {
    pub song_id: i64,
    pub duration: f64,
    pub peaks_found: usize,
    pub hashes_generated: usize,
}

/// Result of an identification run. An empty candidate list is a
/// successful "no match", not a failure.
#[derive(Debug, Clone)]
pub struct IdentifyReport {
    pub query_stats: QueryStats,
    pub matches: Vec<MatchCandidate>,
}
