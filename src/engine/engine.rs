use std::path::Path;

use slog::{info, Logger};

use crate::audio;
use crate::db::IndexStore;
use crate::engine::{find_peaks, generate_hashes, matcher, mel_spectrogram, SAMPLE_RATE};
use crate::error::EngineError;
use crate::models::{EnrollReport, FingerprintHash, IdentifyReport, Peak, QueryStats};
use crate::utils;

/// The constellation and hash set extracted from one clip.
pub struct AudioFingerprint {
    pub peaks: Vec<Peak>,
    pub hashes: Vec<FingerprintHash>,
}

/// The recognition service: owns the index store and runs the enroll and
/// identify pipelines. Constructed once at startup and shared; holds no
/// other state between requests.
pub struct Fingerprinter {
    store: IndexStore,
    logger: Logger,
}

impl Fingerprinter {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self, EngineError> {
        let store = IndexStore::open(db_path)?;
        Ok(Fingerprinter { store, logger: utils::get_logger() })
    }

    pub fn store(&self) -> &IndexStore {
        &self.store
    }

    /// Runs the DSP pipeline: spectrogram, constellation, hashes.
    pub fn fingerprint_pcm(&self, samples: &[f32]) -> Result<AudioFingerprint, EngineError> {
        let spectrogram = mel_spectrogram(samples)?;
        let peaks = find_peaks(&spectrogram);
        let hashes = generate_hashes(&peaks);
        info!(self.logger, "fingerprinted clip";
            "frames" => spectrogram.first().map_or(0, |row| row.len()),
            "peaks" => peaks.len(),
            "hashes" => hashes.len());
        Ok(AudioFingerprint { peaks, hashes })
    }

    /// Fingerprints PCM and writes it into the catalog under `filename`.
    pub fn enroll_pcm(
        &self,
        samples: &[f32],
        filename: &str,
        title: &str,
        artist: &str,
    ) -> Result<EnrollReport, EngineError> {
        let duration = samples.len() as f64 / SAMPLE_RATE as f64;
        let fingerprint = self.fingerprint_pcm(samples)?;
        let song_id =
            self.store
                .enroll(filename, title, artist, duration, &fingerprint.hashes)?;
        info!(self.logger, "enrolled song";
            "song_id" => song_id, "filename" => filename, "hashes" => fingerprint.hashes.len());
        Ok(EnrollReport {
            song_id,
            duration,
            peaks_found: fingerprint.peaks.len(),
            hashes_generated: fingerprint.hashes.len(),
        })
    }

    /// Fingerprints PCM and ranks it against the catalog. An empty match
    /// list is a successful "no match".
    pub fn identify_pcm(&self, samples: &[f32]) -> Result<IdentifyReport, EngineError> {
        let fingerprint = self.fingerprint_pcm(samples)?;
        let query_stats = QueryStats {
            peaks_found: fingerprint.peaks.len(),
            hashes_generated: fingerprint.hashes.len(),
        };

        let matches = if fingerprint.hashes.is_empty() {
            Vec::new()
        } else {
            let hits = self.store.lookup(&fingerprint.hashes)?;
            matcher::rank(hits, fingerprint.hashes.len())
        };
        info!(self.logger, "identification ranked"; "candidates" => matches.len());

        Ok(IdentifyReport { query_stats, matches })
    }

    /// Decode-then-enroll pipeline for a file on disk. `filename` is the
    /// catalog key (the upload's original name, not the temp path).
    pub fn enroll_file(
        &self,
        path: &Path,
        filename: &str,
        title: &str,
        artist: &str,
    ) -> Result<EnrollReport, EngineError> {
        let pcm = audio::decode_file(path)?;
        self.enroll_pcm(&pcm, filename, title, artist)
    }

    /// Decode-then-identify pipeline for a file on disk.
    pub fn identify_file(&self, path: &Path) -> Result<IdentifyReport, EngineError> {
        let pcm = audio::decode_file(path)?;
        self.identify_pcm(&pcm)
    }
}
