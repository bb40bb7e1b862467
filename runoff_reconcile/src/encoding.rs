// Decoding of the raw electoral bytes.

use std::fmt::Display;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextEncoding {
    Utf8,
    Windows1252,
    Latin1,
}

impl Display for TextEncoding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TextEncoding::Utf8 => "utf-8",
            TextEncoding::Windows1252 => "windows-1252",
            TextEncoding::Latin1 => "iso-8859-1",
        };
        write!(f, "{}", s)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct Decoded {
    pub text: String,
    /// The encoding that was accepted, or None when the lossy fallback was used.
    pub encoding: Option<TextEncoding>,
    pub degraded: bool,
    pub bad_chars: usize,
}

const UTF8_BOM: &[u8] = &[0xEF, 0xBB, 0xBF];

// Windows-1252 code points for 0x80..=0x9F. None marks the five undefined bytes.
const CP1252_HIGH: [Option<char>; 32] = [
    Some('\u{20AC}'),
    None,
    Some('\u{201A}'),
    Some('\u{0192}'),
    Some('\u{201E}'),
    Some('\u{2026}'),
    Some('\u{2020}'),
    Some('\u{2021}'),
    Some('\u{02C6}'),
    Some('\u{2030}'),
    Some('\u{0160}'),
    Some('\u{2039}'),
    Some('\u{0152}'),
    None,
    Some('\u{017D}'),
    None,
    None,
    Some('\u{2018}'),
    Some('\u{2019}'),
    Some('\u{201C}'),
    Some('\u{201D}'),
    Some('\u{2022}'),
    Some('\u{2013}'),
    Some('\u{2014}'),
    Some('\u{02DC}'),
    Some('\u{2122}'),
    Some('\u{0161}'),
    Some('\u{203A}'),
    Some('\u{0153}'),
    None,
    Some('\u{017E}'),
    Some('\u{0178}'),
];

// Returns the decoded text and the number of characters that could not be
// represented faithfully.
fn decode_with(bytes: &[u8], encoding: TextEncoding) -> (String, usize) {
    match encoding {
        TextEncoding::Utf8 => {
            let text = String::from_utf8_lossy(bytes).into_owned();
            let bad = text.chars().filter(|c| *c == '\u{FFFD}').count();
            (text, bad)
        }
        TextEncoding::Windows1252 => {
            let mut bad = 0;
            let text = bytes
                .iter()
                .map(|b| match *b {
                    0x80..=0x9F => match CP1252_HIGH[(*b - 0x80) as usize] {
                        Some(c) => c,
                        None => {
                            bad += 1;
                            '\u{FFFD}'
                        }
                    },
                    _ => *b as char,
                })
                .collect();
            (text, bad)
        }
        TextEncoding::Latin1 => {
            let bad = bytes.iter().filter(|b| (0x80..=0x9F).contains(*b)).count();
            (bytes.iter().map(|b| *b as char).collect(), bad)
        }
    }
}

/// Tries the candidates in order and keeps the first whose share of bad
/// characters stays within `max_bad_ratio`. Falls back to a lossy UTF-8
/// decoding flagged as degraded.
pub fn decode(bytes: &[u8], candidates: &[TextEncoding], max_bad_ratio: f64) -> Decoded {
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(bytes);
    for enc in candidates.iter() {
        let (text, bad) = decode_with(body, *enc);
        let total = text.chars().count().max(1);
        let ratio = bad as f64 / total as f64;
        debug!("decode: {} gave {} bad chars out of {}", enc, bad, total);
        if ratio <= max_bad_ratio {
            return Decoded {
                text,
                encoding: Some(*enc),
                degraded: false,
                bad_chars: bad,
            };
        }
    }
    let (text, bad) = decode_with(body, TextEncoding::Utf8);
    warn!(
        "decode: no candidate encoding accepted, lossy decoding with {} replacement chars",
        bad
    );
    Decoded {
        text,
        encoding: None,
        degraded: true,
        bad_chars: bad,
    }
}
