use std::path::Path;

use hound::SampleFormat;

use crate::audio::convert::convert_to_wav;
use crate::engine::SAMPLE_RATE;
use crate::error::EngineError;

/// Container extensions the decoder accepts.
pub const SUPPORTED_EXTENSIONS: [&str; 4] = ["wav", "mp3", "m4a", "flac"];

pub fn is_supported_extension(ext: &str) -> bool {
    SUPPORTED_EXTENSIONS.contains(&ext.to_lowercase().as_str())
}

/// Decodes an audio file into mono PCM at SAMPLE_RATE.
///
/// WAV containers are read natively; the other supported containers are
/// converted through ffmpeg first. Anything else is rejected before any
/// decoding work.
pub fn decode_file(path: &Path) -> Result<Vec<f32>, EngineError> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    if !is_supported_extension(&ext) {
        return Err(EngineError::UnsupportedFormat(ext));
    }

    if ext == "wav" {
        read_wav(path)
    } else {
        let tmp_dir = tempfile::tempdir()?;
        let wav_path = convert_to_wav(path, tmp_dir.path())?;
        read_wav(&wav_path)
    }
}

/// Reads a WAV file, downmixes to mono, and resamples to SAMPLE_RATE.
fn read_wav(path: &Path) -> Result<Vec<f32>, EngineError> {
    let mut reader = hound::WavReader::open(path)
        .map_err(|e| EngineError::Decode(format!("{}: {}", path.display(), e)))?;
    let spec = reader.spec();

    let samples: Vec<f32> = match spec.sample_format {
        SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<Result<_, _>>()
            .map_err(|e| EngineError::Decode(e.to_string()))?,
        SampleFormat::Int => {
            let scale = 1.0 / (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 * scale))
                .collect::<Result<_, _>>()
                .map_err(|e| EngineError::Decode(e.to_string()))?
        }
    };

    let mono = downmix_to_mono(&samples, spec.channels as usize);
    Ok(resample_linear(&mono, spec.sample_rate, SAMPLE_RATE))
}

/// Averages interleaved channels into one.
fn downmix_to_mono(samples: &[f32], channels: usize) -> Vec<f32> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

/// Linear-interpolation resampler.
pub fn resample_linear(input: &[f32], src_rate: u32, dst_rate: u32) -> Vec<f32> {
    if src_rate == dst_rate || input.is_empty() {
        return input.to_vec();
    }

    let out_len = (input.len() as u64 * dst_rate as u64 / src_rate as u64) as usize;
    let step = src_rate as f64 / dst_rate as f64;
    let mut output = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let pos = i as f64 * step;
        let i0 = pos as usize;
        let i1 = (i0 + 1).min(input.len() - 1);
        let frac = (pos - i0 as f64) as f32;
        output.push(input[i0] * (1.0 - frac) + input[i1] * frac);
    }
    output
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_wav(path: &Path, spec: hound::WavSpec, samples: &[i16]) {
        let mut writer = hound::WavWriter::create(path, spec).unwrap();
        for &s in samples {
            writer.write_sample(s).unwrap();
        }
        writer.finalize().unwrap();
    }

    #[test]
    fn test_unsupported_extension_is_rejected() {
        let err = decode_file(Path::new("clip.ogg")).unwrap_err();
        assert!(matches!(err, EngineError::UnsupportedFormat(ref e) if e == "ogg"));
        assert!(matches!(
            decode_file(Path::new("noext")).unwrap_err(),
            EngineError::UnsupportedFormat(_)
        ));
    }

    #[test]
    fn test_missing_wav_is_a_decode_error() {
        let err = decode_file(Path::new("does-not-exist.wav")).unwrap_err();
        assert!(matches!(err, EngineError::Decode(_)));
    }

    #[test]
    fn test_wav_roundtrip_at_target_rate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let samples: Vec<i16> = (0..SAMPLE_RATE).map(|i| ((i % 100) as i16 - 50) * 200).collect();
        write_wav(&path, spec, &samples);

        let pcm = decode_file(&path).unwrap();
        assert_eq!(pcm.len(), samples.len());
        assert!((pcm[0] - samples[0] as f32 / 32768.0).abs() < 1e-6);
        assert!(pcm.iter().all(|v| v.abs() <= 1.0));
    }

    #[test]
    fn test_stereo_is_downmixed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stereo.wav");
        let spec = hound::WavSpec {
            channels: 2,
            sample_rate: SAMPLE_RATE,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        // L = 12000, R = -12000 everywhere: the downmix cancels.
        let samples: Vec<i16> = (0..2000).map(|i| if i % 2 == 0 { 12000 } else { -12000 }).collect();
        write_wav(&path, spec, &samples);

        let pcm = decode_file(&path).unwrap();
        assert_eq!(pcm.len(), 1000);
        assert!(pcm.iter().all(|&v| v.abs() < 1e-6));
    }

    #[test]
    fn test_high_rate_wav_is_resampled() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hi.wav");
        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: 44100,
            bits_per_sample: 16,
            sample_format: SampleFormat::Int,
        };
        let samples = vec![8000i16; 44100];
        write_wav(&path, spec, &samples);

        let pcm = decode_file(&path).unwrap();
        assert_eq!(pcm.len(), SAMPLE_RATE as usize);
        let expected = 8000.0 / 32768.0;
        assert!(pcm.iter().all(|&v| (v - expected).abs() < 1e-4));
    }

    #[test]
    fn test_resample_identity_and_ratio() {
        let input: Vec<f32> = (0..100).map(|i| i as f32).collect();
        assert_eq!(resample_linear(&input, 22050, 22050), input);

        let half = resample_linear(&input, 100, 50);
        assert_eq!(half.len(), 50);
        assert!((half[10] - 20.0).abs() < 1e-6);

        let doubled = resample_linear(&input, 50, 100);
        assert_eq!(doubled.len(), 200);
        assert!((doubled[11] - 5.5).abs() < 1e-6);
    }
}
