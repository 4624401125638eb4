//! Text normalization for accent-insensitive matching

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Lower-case `s` and strip diacritical marks ("José" -> "jose")
pub fn normalize(s: &str) -> String {
    s.nfd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Substring test on an already normalized needle
pub fn contains_normalized(haystack: &str, normalized_needle: &str) -> bool {
    normalize(haystack).contains(normalized_needle)
}
