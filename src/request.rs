//! Inbound command decoding
//!
//! Commands arrive as a single string that may embed a language code and/or
//! a volume using `;` as delimiter: `text`, `en;text`, `7;text`,
//! `7;en;text` or `en;7;text`. A field is treated as a volume exactly when
//! reparsing it as a non-negative integer and formatting it back reproduces
//! the field unchanged. This heuristic is a fixed wire convention shared with
//! other command producers; changing it is a protocol break.
//!
//! The same decoder feeds both the playback queue and the pre-cache worker
//! so the two channels can never diverge on the same raw command.

use crate::{Result, SpeakdError};
use log::warn;
use std::time::Instant;

/// One decoded utterance awaiting or undergoing playback
#[derive(Debug, Clone)]
pub struct Request {
    /// Text to synthesize, or an audio file reference when it begins with `/`
    pub text: String,

    /// Optional language code override (e.g. "en", "de")
    pub language: Option<String>,

    /// Optional playback volume override (0-100)
    pub volume: Option<u8>,

    /// When this request was created, drives duplicate suppression
    pub enqueued: Instant,
}

impl Request {
    /// A leading `/` marks a reference to an existing audio resource
    /// rather than text to synthesize
    pub fn is_file_ref(&self) -> bool {
        self.text.starts_with('/')
    }
}

/// True when `field` is a valid non-negative integer literal: parsing and
/// formatting back must reproduce it exactly, so "07" or "+7" are not
/// volumes, they are (odd) language codes.
fn is_integer_literal(field: &str) -> bool {
    match field.parse::<u32>() {
        Ok(n) => n.to_string() == field,
        Err(_) => false,
    }
}

/// Parse a volume field, clamping to 0-100. Returns `None` with a warning
/// when the field does not round-trip as an integer.
fn parse_volume(field: &str) -> Option<u8> {
    if is_integer_literal(field) {
        let n: u32 = field.parse().ok()?;
        Some(n.min(100) as u8)
    } else {
        warn!("Ignoring non-integer volume field: {}", field);
        None
    }
}

/// Decode a raw command into a normalized request
///
/// Rejects commands whose resulting text is empty; no request is created
/// for them.
pub fn decode(raw: &str) -> Result<Request> {
    let mut language = None;
    let mut volume = None;

    let text = if raw.contains(';') {
        // At most 3 fields; anything past the third is dropped, matching
        // the wire convention of the upstream command producers.
        let fields: Vec<&str> = raw.splitn(4, ';').collect();
        match fields.len() {
            2 => {
                // language;text or volume;text
                if is_integer_literal(fields[0]) {
                    volume = parse_volume(fields[0]);
                } else {
                    language = Some(fields[0].to_string());
                }
                fields[1]
            }
            _ => {
                // language;volume;text or volume;language;text,
                // disambiguated solely by which field is an integer
                if is_integer_literal(fields[0]) {
                    volume = parse_volume(fields[0]);
                    language = Some(fields[1].to_string());
                } else {
                    language = Some(fields[0].to_string());
                    volume = parse_volume(fields[1]);
                }
                fields[2]
            }
        }
    } else {
        raw
    };

    if text.is_empty() {
        return Err(SpeakdError::Decode("empty text".to_string()));
    }

    Ok(Request {
        text: text.to_string(),
        language,
        volume,
        enqueued: Instant::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_passes_through() {
        let req = decode("Hello world").unwrap();
        assert_eq!(req.text, "Hello world");
        assert_eq!(req.language, None);
        assert_eq!(req.volume, None);
    }

    #[test]
    fn test_volume_and_text() {
        let req = decode("7;Hello").unwrap();
        assert_eq!(req.volume, Some(7));
        assert_eq!(req.language, None);
        assert_eq!(req.text, "Hello");
    }

    #[test]
    fn test_language_and_text() {
        let req = decode("en;Hello").unwrap();
        assert_eq!(req.language.as_deref(), Some("en"));
        assert_eq!(req.volume, None);
        assert_eq!(req.text, "Hello");
    }

    #[test]
    fn test_volume_language_text() {
        let req = decode("7;en;Hello").unwrap();
        assert_eq!(req.volume, Some(7));
        assert_eq!(req.language.as_deref(), Some("en"));
        assert_eq!(req.text, "Hello");
    }

    #[test]
    fn test_language_volume_text() {
        let req = decode("en;7;Hello").unwrap();
        assert_eq!(req.language.as_deref(), Some("en"));
        assert_eq!(req.volume, Some(7));
        assert_eq!(req.text, "Hello");
    }

    #[test]
    fn test_leading_zero_is_not_a_volume() {
        // "07" does not round-trip through integer formatting
        let req = decode("07;Hello").unwrap();
        assert_eq!(req.language.as_deref(), Some("07"));
        assert_eq!(req.volume, None);
    }

    #[test]
    fn test_non_integer_volume_field_is_dropped() {
        let req = decode("en;loud;Hello").unwrap();
        assert_eq!(req.language.as_deref(), Some("en"));
        assert_eq!(req.volume, None);
        assert_eq!(req.text, "Hello");
    }

    #[test]
    fn test_volume_clamped_to_100() {
        let req = decode("250;Hello").unwrap();
        assert_eq!(req.volume, Some(100));
    }

    #[test]
    fn test_empty_text_rejected() {
        assert!(decode("").is_err());
        assert!(decode("en;").is_err());
        assert!(decode("7;en;").is_err());
    }

    #[test]
    fn test_file_reference() {
        let req = decode("/media/door-bell.mp3").unwrap();
        assert!(req.is_file_ref());
        assert_eq!(req.text, "/media/door-bell.mp3");
    }

    #[test]
    fn test_file_reference_with_volume() {
        let req = decode("30;/media/door-bell.mp3").unwrap();
        assert!(req.is_file_ref());
        assert_eq!(req.volume, Some(30));
    }
}
