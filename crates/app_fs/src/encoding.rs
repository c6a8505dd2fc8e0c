//! Legacy filename decoding for archive entries
//!
//! ZIP archives written by older tools store entry names in the creator's
//! locale code page instead of UTF-8. Names are decoded here before they enter
//! the entry tree, so the rest of the crate only ever sees `String`s.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// Locale preference used when a name is not valid UTF-8
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodingHint {
    /// Shift_JIS
    Japanese,
    /// GBK / GB18030
    ChineseSimplified,
    /// Big5
    ChineseTraditional,
    /// EUC-KR
    Korean,
    None,
}

impl EncodingHint {
    fn tld(self) -> Option<&'static [u8]> {
        match self {
            EncodingHint::Japanese => Some(b"jp"),
            EncodingHint::ChineseSimplified => Some(b"cn"),
            EncodingHint::ChineseTraditional => Some(b"tw"),
            EncodingHint::Korean => Some(b"kr"),
            EncodingHint::None => None,
        }
    }

    /// Encoding to assume when detection falls back to windows-1252
    fn fallback(self) -> Option<&'static Encoding> {
        match self {
            EncodingHint::Japanese => Some(encoding_rs::SHIFT_JIS),
            EncodingHint::ChineseSimplified => Some(encoding_rs::GBK),
            EncodingHint::ChineseTraditional => Some(encoding_rs::BIG5),
            EncodingHint::Korean => Some(encoding_rs::EUC_KR),
            EncodingHint::None => None,
        }
    }
}

/// Detect the most likely encoding of a byte sequence
pub fn detect_encoding(bytes: &[u8], hint: EncodingHint) -> &'static Encoding {
    if std::str::from_utf8(bytes).is_ok() {
        return encoding_rs::UTF_8;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    let detected = detector.guess(hint.tld(), true);

    match hint.fallback() {
        Some(fallback) if detected == encoding_rs::WINDOWS_1252 => fallback,
        _ => detected,
    }
}

/// Decode bytes to a UTF-8 string.
///
/// Returns the decoded string and whether replacement characters were needed.
pub fn decode_bytes(bytes: &[u8], hint: EncodingHint) -> (String, bool) {
    if let Ok(s) = std::str::from_utf8(bytes) {
        return (s.to_string(), false);
    }

    let encoding = detect_encoding(bytes, hint);
    let (result, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!("Lossy entry name decode with {}", encoding.name());
    }
    (result.into_owned(), had_errors)
}

/// Locale hint from `LANG`
pub fn system_encoding_hint() -> EncodingHint {
    std::env::var("LANG")
        .map(|lang| hint_for_locale(&lang))
        .unwrap_or(EncodingHint::None)
}

fn hint_for_locale(lang: &str) -> EncodingHint {
    let lang = lang.to_lowercase().replace('-', "_");
    if lang.starts_with("ja") {
        EncodingHint::Japanese
    } else if lang.starts_with("zh_tw") || lang.starts_with("zh_hk") {
        EncodingHint::ChineseTraditional
    } else if lang.starts_with("zh") {
        EncodingHint::ChineseSimplified
    } else if lang.starts_with("ko") {
        EncodingHint::Korean
    } else {
        EncodingHint::None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_utf8_passthrough() {
        let (decoded, had_errors) = decode_bytes("photos/été.jpg".as_bytes(), EncodingHint::None);
        assert_eq!(decoded, "photos/été.jpg");
        assert!(!had_errors);
    }

    #[test]
    fn test_shift_jis_name() {
        // "テスト" in Shift_JIS
        let bytes = [0x83, 0x65, 0x83, 0x58, 0x83, 0x67];
        let (decoded, _) = decode_bytes(&bytes, EncodingHint::Japanese);
        assert_eq!(decoded, "テスト");
    }

    #[test]
    fn test_locale_hint() {
        assert_eq!(hint_for_locale("ja_JP.UTF-8"), EncodingHint::Japanese);
        assert_eq!(hint_for_locale("zh-TW"), EncodingHint::ChineseTraditional);
        assert_eq!(hint_for_locale("zh_CN.UTF-8"), EncodingHint::ChineseSimplified);
        assert_eq!(hint_for_locale("en_US.UTF-8"), EncodingHint::None);
    }
}
