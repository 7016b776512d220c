use lazy_static::lazy_static;
use regex::Regex;

use crate::error::SlugError;

/// Longest slug Discord accepts comfortably as a channel name.
pub const MAX_SLUG_LEN: usize = 90;

lazy_static! {
    /// Everything that may not appear in a Discord channel slug.
    static ref DISALLOWED_CHARS: Regex = Regex::new(r"[^a-z0-9_-]").unwrap();
}

const SEPARATORS: &[char] = &['-', '_'];

/// Turn a display name into a Discord channel slug.
///
/// The name is trimmed and lowercased, spaces become hyphens, anything outside
/// `[a-z0-9-_]` is dropped, and separators are trimmed from both ends. The
/// result is cut to [`MAX_SLUG_LEN`] characters.
pub fn slugify(name: &str) -> Result<String, SlugError> {
    let base = name.trim().to_lowercase().replace(' ', "-");
    let cleaned = DISALLOWED_CHARS.replace_all(&base, "");
    let sanitized = cleaned.trim_matches(SEPARATORS);
    if sanitized.is_empty() {
        return Err(SlugError::Empty);
    }
    // Only ASCII survives the filter, so byte slicing is safe.
    let truncated = &sanitized[..sanitized.len().min(MAX_SLUG_LEN)];
    Ok(truncated.trim_end_matches(SEPARATORS).to_string())
}

/// The form the channel creator compares against existing channel names.
pub fn normalize_channel_name(name: &str) -> String {
    name.trim().to_lowercase().replace(' ', "-")
}
