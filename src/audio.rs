//! Audio artifact duration inspection
//!
//! The playback queue schedules its advance by the reported duration of the
//! current artifact, so every resolved file passes through here. WAV files
//! are measured exactly from the header; MP3 files (cloud-engine output,
//! pre-shipped prompts) are estimated from the file size at a nominal
//! bitrate. No decoding beyond this takes place.

use crate::{Result, SpeakdError};
use log::debug;
use std::fs;
use std::path::Path;

/// Nominal bitrate used to estimate MP3 duration from file size
const MP3_ESTIMATE_BITRATE: u64 = 128_000;

/// Inspect an audio file and report its duration in seconds
pub fn duration_of(path: &Path) -> Result<f64> {
    let bytes = fs::read(path)
        .map_err(|e| SpeakdError::Playback(format!("Cannot read {}: {}", path.display(), e)))?;

    if let Some(seconds) = wav_duration(&bytes) {
        debug!("WAV duration of {}: {:.2}s", path.display(), seconds);
        return Ok(seconds);
    }

    // Not a RIFF file - assume MP3 and estimate from size
    let seconds = (bytes.len() as u64 * 8) as f64 / MP3_ESTIMATE_BITRATE as f64;
    debug!(
        "Estimated duration of {}: {:.2}s ({} bytes)",
        path.display(),
        seconds,
        bytes.len()
    );
    Ok(seconds)
}

/// Walk the RIFF chunks of a WAV file and compute the duration from the
/// format block and the data chunk size. Returns `None` for non-WAV input
/// or a malformed header.
fn wav_duration(bytes: &[u8]) -> Option<f64> {
    if bytes.len() < 12 || &bytes[0..4] != b"RIFF" || &bytes[8..12] != b"WAVE" {
        return None;
    }

    let mut idx = 12;
    let mut byte_rate: Option<u32> = None;
    let mut data_len: Option<usize> = None;

    while idx + 8 <= bytes.len() {
        let chunk_id = &bytes[idx..idx + 4];
        let size = u32::from_le_bytes([
            bytes[idx + 4],
            bytes[idx + 5],
            bytes[idx + 6],
            bytes[idx + 7],
        ]) as usize;

        match chunk_id {
            b"fmt " => {
                // byte rate lives at offset 8 of the fmt chunk
                if idx + 20 <= bytes.len() {
                    byte_rate = Some(u32::from_le_bytes([
                        bytes[idx + 16],
                        bytes[idx + 17],
                        bytes[idx + 18],
                        bytes[idx + 19],
                    ]));
                }
            }
            b"data" => {
                data_len = Some(size);
            }
            _ => {}
        }

        // Chunks are word-aligned
        idx += 8 + size + (size & 1);
    }

    match (byte_rate, data_len) {
        (Some(rate), Some(len)) if rate > 0 => Some(len as f64 / rate as f64),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal PCM WAV header around `data_len` bytes of audio
    fn wav_bytes(sample_rate: u32, data_len: u32) -> Vec<u8> {
        let byte_rate = sample_rate * 2; // mono, 16-bit
        let mut out = Vec::new();
        out.extend_from_slice(b"RIFF");
        out.extend_from_slice(&(36 + data_len).to_le_bytes());
        out.extend_from_slice(b"WAVE");
        out.extend_from_slice(b"fmt ");
        out.extend_from_slice(&16u32.to_le_bytes());
        out.extend_from_slice(&1u16.to_le_bytes()); // PCM
        out.extend_from_slice(&1u16.to_le_bytes()); // mono
        out.extend_from_slice(&sample_rate.to_le_bytes());
        out.extend_from_slice(&byte_rate.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes()); // block align
        out.extend_from_slice(&16u16.to_le_bytes()); // bits per sample
        out.extend_from_slice(b"data");
        out.extend_from_slice(&data_len.to_le_bytes());
        out.extend(std::iter::repeat(0u8).take(data_len as usize));
        out
    }

    #[test]
    fn test_wav_duration_from_header() {
        // 16000 Hz mono 16-bit, one second of samples
        let bytes = wav_bytes(16_000, 32_000);
        let d = wav_duration(&bytes).unwrap();
        assert!((d - 1.0).abs() < 0.001);
    }

    #[test]
    fn test_half_second_wav() {
        let bytes = wav_bytes(16_000, 16_000);
        let d = wav_duration(&bytes).unwrap();
        assert!((d - 0.5).abs() < 0.001);
    }

    #[test]
    fn test_non_wav_is_rejected() {
        assert!(wav_duration(b"ID3\x04rest of an mp3").is_none());
        assert!(wav_duration(b"").is_none());
    }

    #[test]
    fn test_mp3_estimate() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.mp3");
        // 16000 bytes at 128 kbit/s is one second
        std::fs::write(&path, vec![0u8; 16_000]).unwrap();
        let d = duration_of(&path).unwrap();
        assert!((d - 1.0).abs() < 0.001);
    }
}
