//! Text normalization helpers shared by the filters.

use strsim::hamming;

/// Lowercase and collapse runs of whitespace to single spaces.
pub fn normalize_text(text: &str) -> String {
    text.to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Normalize a DOI for exact comparison.
pub fn normalize_doi(doi: &str) -> String {
    doi.trim().to_lowercase()
}

/// True when `a` and `b` are identical or one edit apart.
///
/// One edit is a single substitution, insertion or deletion, counted in
/// characters. Callers normalize first.
pub fn within_single_edit(a: &str, b: &str) -> bool {
    if a == b {
        return true;
    }

    let len_a = a.chars().count();
    let len_b = b.chars().count();

    if len_a == len_b {
        return matches!(hamming(a, b), Ok(distance) if distance <= 1);
    }

    let (shorter, longer) = match len_a.abs_diff(len_b) {
        1 if len_a < len_b => (a, b),
        1 => (b, a),
        _ => return false,
    };

    one_insertion_apart(shorter, longer)
}

/// `longer` is `shorter` with exactly one character inserted somewhere.
fn one_insertion_apart(shorter: &str, longer: &str) -> bool {
    let mut short_chars = shorter.chars().peekable();
    let mut skipped = false;

    for c in longer.chars() {
        match short_chars.peek() {
            Some(&s) if s == c => {
                short_chars.next();
            }
            _ if !skipped => skipped = true,
            _ => return false,
        }
    }

    short_chars.next().is_none()
}

/// First `max_chars` characters of `text`, with `...` appended when cut.
pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => format!("{}...", &text[..byte_index]),
        None => text.to_string(),
    }
}

/// First `max_chars` characters of `text`, without a marker.
pub fn char_prefix(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((byte_index, _)) => &text[..byte_index],
        None => text,
    }
}
