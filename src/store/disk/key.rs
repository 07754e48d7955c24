//! Mapping between cache keys and filenames.
//!
//! Bytes outside `[A-Za-z0-9._-]` are written as `%XX` (uppercase hex), as is
//! a leading `.`, so every non-empty key becomes exactly one plain filename:
//! no separators, no `.`/`..`, no hidden files. Decoding is the exact inverse.
//!
//! ```text
//!   "avatar.png"        -> "avatar.png"
//!   "users/42"          -> "users%2F42"
//!   "..\\x"             -> "%2E.%5Cx"
//!   "100%"              -> "100%25"
//! ```

use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};

/// Everything except `[A-Za-z0-9._-]`.
const ESCAPED: &AsciiSet = &NON_ALPHANUMERIC.remove(b'.').remove(b'_').remove(b'-');

/// Returns the filename for `key`, or `None` for the empty key.
pub fn encode_key(key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }
    Some(match key.strip_prefix('.') {
        Some(rest) => format!("%2E{}", utf8_percent_encode(rest, ESCAPED)),
        None => utf8_percent_encode(key, ESCAPED).to_string(),
    })
}

/// Recovers the key from a filename produced by [`encode_key`].
///
/// Returns `None` for names this module would never produce.
pub fn decode_key(name: &str) -> Option<String> {
    let key = percent_decode_str(name).decode_utf8().ok()?.into_owned();
    // Only canonical encodings map back; stray `%`, lowercase hex and
    // unescaped bytes all fail the re-encode.
    (encode_key(&key)? == name).then_some(key)
}
