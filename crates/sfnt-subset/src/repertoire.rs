//! Character repertoire to subset a font to.

use std::collections::BTreeSet;

use crate::ConfigError;

/// Ordered sequence of characters that a subsetted font must be able to render.
///
/// A repertoire can be constructed from plain chars, or decoded from the `\uXXXX` escape syntax
/// accepted by the command-line tool.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Repertoire {
    chars: Vec<char>,
}

impl FromIterator<char> for Repertoire {
    fn from_iter<I: IntoIterator<Item = char>>(iter: I) -> Self {
        Self {
            chars: iter.into_iter().collect(),
        }
    }
}

impl From<&str> for Repertoire {
    fn from(s: &str) -> Self {
        s.chars().collect()
    }
}

impl Repertoire {
    const ESCAPE: &'static str = "\\u";
    const MAX_HEX_DIGITS: usize = 6;

    /// Decodes a repertoire from a string consisting of `\u` escapes, each followed by 1 to 6 hex digits
    /// (e.g., `\u41\u42` or `\uD83D\uDE00`). A pair of escaped UTF-16 surrogates is combined
    /// into a single char.
    ///
    /// # Errors
    ///
    /// Returns an error if the string contains text outside escapes, escapes without hex digits,
    /// invalid code points, or unpaired surrogates.
    pub fn from_escaped(escaped: &str) -> Result<Self, ConfigError> {
        if !escaped.is_empty() && !escaped.starts_with(Self::ESCAPE) {
            return Err(malformed(0, "text outside of `\\u` escapes"));
        }

        let mut chars = vec![];
        // Position and value of the preceding high surrogate
        let mut high_surrogate = None;
        let mut position = 0;
        for part in escaped.split(Self::ESCAPE).skip(1) {
            let code = Self::parse_code(part, position)?;
            match (high_surrogate.take(), code) {
                (Some((_, high)), 0x_dc00..=0x_dfff) => {
                    let code = 0x_1_0000_u32 + ((high - 0x_d800) << 10) + (code - 0x_dc00);
                    // `unwrap()` is safe: the combined code point is in the supplementary planes
                    chars.push(char::from_u32(code).unwrap());
                }
                (Some((high_position, _)), _) => {
                    return Err(malformed(high_position, "unpaired high surrogate"));
                }
                (None, 0x_d800..=0x_dbff) => {
                    high_surrogate = Some((position, code));
                }
                (None, 0x_dc00..=0x_dfff) => {
                    return Err(malformed(position, "unpaired low surrogate"));
                }
                (None, _) => {
                    let ch = char::from_u32(code)
                        .ok_or_else(|| malformed(position, "invalid Unicode code point"))?;
                    chars.push(ch);
                }
            }
            position += Self::ESCAPE.len() + part.len();
        }

        if let Some((high_position, _)) = high_surrogate {
            return Err(malformed(high_position, "unpaired high surrogate"));
        }
        Ok(Self { chars })
    }

    fn parse_code(hex_digits: &str, position: usize) -> Result<u32, ConfigError> {
        let is_valid = (1..=Self::MAX_HEX_DIGITS).contains(&hex_digits.len())
            && hex_digits.bytes().all(|byte| byte.is_ascii_hexdigit());
        if !is_valid {
            return Err(malformed(position, "expected 1 to 6 hex digits after `\\u`"));
        }
        u32::from_str_radix(hex_digits, 16)
            .map_err(|_| malformed(position, "expected 1 to 6 hex digits after `\\u`"))
    }

    /// Returns chars in this repertoire in the original order (possibly with duplicates).
    pub fn chars(&self) -> &[char] {
        &self.chars
    }

    /// Returns the number of chars in this repertoire.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Checks whether this repertoire is empty.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    /// Returns distinct chars in this repertoire in the ascending order.
    pub fn distinct_chars(&self) -> BTreeSet<char> {
        self.chars.iter().copied().collect()
    }
}

fn malformed(position: usize, reason: &'static str) -> ConfigError {
    ConfigError::MalformedEscape { position, reason }
}

#[cfg(test)]
mod tests {
    use test_casing::test_casing;

    use super::*;

    #[test]
    fn decoding_escapes() {
        let repertoire = Repertoire::from_escaped("\\u0041\\u42\\u00c4\\u20").unwrap();
        assert_eq!(repertoire.chars(), ['A', 'B', 'Ä', ' ']);

        let repertoire = Repertoire::from_escaped("\\u1F600\\u10FFFF").unwrap();
        assert_eq!(repertoire.chars(), ['😀', '\u{10ffff}']);

        let repertoire = Repertoire::from_escaped("").unwrap();
        assert!(repertoire.is_empty());
    }

    #[test]
    fn combining_surrogate_pairs() {
        let repertoire = Repertoire::from_escaped("\\uD83D\\uDE00\\u41").unwrap();
        assert_eq!(repertoire.chars(), ['😀', 'A']);
    }

    #[test]
    fn distinct_chars_are_sorted() {
        let repertoire = Repertoire::from("CABBA");
        assert_eq!(repertoire.len(), 5);
        let distinct: Vec<_> = repertoire.distinct_chars().into_iter().collect();
        assert_eq!(distinct, ['A', 'B', 'C']);
    }

    #[test_casing(8, [
        ("A\\u41", 0, "outside"),
        ("\\u", 0, "hex digits"),
        ("\\u41\\u", 4, "hex digits"),
        ("\\u41 ", 0, "hex digits"),
        ("\\u1234567", 0, "hex digits"),
        ("\\u110000", 0, "code point"),
        ("\\uD83D\\u41", 0, "high surrogate"),
        ("\\u41\\uDE00", 4, "low surrogate"),
    ])]
    fn malformed_escapes(escaped: &str, expected_position: usize, expected_reason: &str) {
        let err = Repertoire::from_escaped(escaped).unwrap_err();
        let ConfigError::MalformedEscape { position, reason } = err else {
            panic!("unexpected error: {err:?}");
        };
        assert_eq!(position, expected_position);
        assert!(reason.contains(expected_reason), "{reason}");
    }

    #[test]
    fn trailing_high_surrogate() {
        let err = Repertoire::from_escaped("\\u41\\uD83D").unwrap_err();
        assert_eq!(
            err,
            ConfigError::MalformedEscape {
                position: 4,
                reason: "unpaired high surrogate"
            }
        );
    }
}
