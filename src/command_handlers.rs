use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use colored::Colorize;
use walkdir::WalkDir;

use crate::api;
use crate::audio;
use crate::engine::Fingerprinter;

/// Starts the HTTP facade and blocks until shutdown.
pub async fn serve(engine: Arc<Fingerprinter>, host: &str, port: u16) -> anyhow::Result<()> {
    println!("Starting API server on http://{}:{}", host, port);
    api::start_server(engine, host, port)
        .await
        .context("API server failed")
}

/// Enrolls one file, or every supported audio file under a directory.
pub fn enroll(engine: &Fingerprinter, path: &str, title: &str, artist: &str) -> anyhow::Result<()> {
    let root = Path::new(path);
    if !root.exists() {
        anyhow::bail!("path does not exist: {}", path);
    }

    if root.is_dir() {
        let mut enrolled = 0usize;
        for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
            if !entry.file_type().is_file() {
                continue;
            }
            let ext = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .unwrap_or("");
            if !audio::is_supported_extension(ext) {
                continue;
            }
            match enroll_one(engine, entry.path(), title, artist) {
                Ok(()) => enrolled += 1,
                Err(e) => println!("{}", format!("Error enrolling {}: {}", entry.path().display(), e).yellow()),
            }
        }
        println!("Enrolled {} file(s) from {}", enrolled, path);
        return Ok(());
    }

    enroll_one(engine, root, title, artist)
}

fn enroll_one(engine: &Fingerprinter, path: &Path, title: &str, artist: &str) -> anyhow::Result<()> {
    let filename = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or("unknown")
        .to_string();

    let report = engine.enroll_file(path, &filename, title, artist)?;
    println!(
        "{}",
        format!(
            "Enrolled \"{}\" as song {} ({:.1}s, {} peaks, {} hashes)",
            filename, report.song_id, report.duration, report.peaks_found, report.hashes_generated
        )
        .green()
    );
    Ok(())
}

/// Identifies a clip and prints the ranked candidates.
pub fn identify(engine: &Fingerprinter, path: &str) -> anyhow::Result<()> {
    let result = engine
        .identify_file(Path::new(path))
        .with_context(|| format!("failed to identify {}", path))?;

    println!(
        "Query: {} peaks, {} hashes",
        result.query_stats.peaks_found, result.query_stats.hashes_generated
    );

    if result.matches.is_empty() {
        println!("\nNo match found.");
        return Ok(());
    }

    let (msg, top_matches) = if result.matches.len() >= 20 {
        ("Top 20 matches:", &result.matches[..20])
    } else {
        ("Matches:", &result.matches[..])
    };

    println!("{}", msg);
    for m in top_matches {
        println!(
            "\t- {} by {}, confidence: {:.1}%, offset: {:.1}s ({}/{} coherent)",
            m.song.title.as_deref().unwrap_or("Unknown"),
            m.song.artist.as_deref().unwrap_or("Unknown"),
            m.confidence,
            m.song_offset,
            m.coherent_matches,
            m.total_matches,
        );
    }

    let top = &result.matches[0];
    println!(
        "\n{}",
        format!(
            "Final prediction: {} by {}, confidence: {:.1}%",
            top.song.title.as_deref().unwrap_or("Unknown"),
            top.song.artist.as_deref().unwrap_or("Unknown"),
            top.confidence
        )
        .green()
    );
    Ok(())
}

/// Prints catalog counters.
pub fn stats(engine: &Fingerprinter) -> anyhow::Result<()> {
    let counts = engine.store().counts()?;
    println!("Songs:                 {}", counts.total_songs);
    println!("Fingerprints:          {}", counts.total_fingerprints);
    println!("Avg fingerprints/song: {:.1}", counts.avg_fingerprints_per_song);
    Ok(())
}

/// Drops and recreates the catalog.
pub fn reset(engine: &Fingerprinter) -> anyhow::Result<()> {
    engine.store().reset()?;
    println!("{}", "Database reset successfully".green());
    Ok(())
}
