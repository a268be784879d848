use std::path::{Path, PathBuf};
use std::process::Command;

use crate::engine::SAMPLE_RATE;
use crate::error::EngineError;

/// Converts a compressed container to mono 16-bit PCM WAV at SAMPLE_RATE
/// via ffmpeg, writing the result into `out_dir`. Returns the output path.
pub fn convert_to_wav(input: &Path, out_dir: &Path) -> Result<PathBuf, EngineError> {
    if !input.exists() {
        return Err(EngineError::Decode(format!(
            "input file does not exist: {}",
            input.display()
        )));
    }

    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("converted");
    let output = out_dir.join(format!("{}.wav", stem));

    let ffmpeg_output = Command::new("ffmpeg")
        .arg("-y")
        .arg("-i")
        .arg(input)
        .arg("-c:a")
        .arg("pcm_s16le")
        .arg("-ar")
        .arg(SAMPLE_RATE.to_string())
        .arg("-ac")
        .arg("1")
        .arg(&output)
        .output()
        .map_err(|e| EngineError::Decode(format!("failed to run ffmpeg: {}", e)))?;

    if !ffmpeg_output.status.success() {
        return Err(EngineError::Decode(format!(
            "ffmpeg conversion failed ({}): {}",
            ffmpeg_output.status,
            String::from_utf8_lossy(&ffmpeg_output.stderr)
        )));
    }

    if !output.exists() || std::fs::metadata(&output)?.len() == 0 {
        return Err(EngineError::Decode(
            "ffmpeg did not produce a valid output file".into(),
        ));
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_input_is_a_decode_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = convert_to_wav(Path::new("missing.mp3"), dir.path()).unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }
}
