//! Artist credit normalization.
//!
//! Chart pages credit collaborations in many shapes ("A Featuring B", "A & B",
//! "A, B & C", "A x B: Producer") and the markup stripping upstream sometimes
//! glues words together ("Billie EilishFeaturing Khalid"). Everything here
//! reduces such a credit to the primary artist so that the same artist always
//! maps to the same row.

use lazy_static::lazy_static;
use regex::Regex;

/// Canonical separator every collaboration marker is rewritten to.
const SEPARATOR: &str = " & ";

lazy_static! {
    static ref COLON_SUFFIX: Regex = Regex::new(r":.*$").unwrap();
    // Capitalised keywords glued onto the preceding word, e.g. "BeyoncéFeaturing"
    static ref GLUED_BEFORE_KEYWORD: Regex =
        Regex::new(r"([^\s&,/])(Featuring|Feat|With|And)").unwrap();
    static ref GLUED_AFTER_KEYWORD: Regex =
        Regex::new(r"\b(Featuring|Feat|With|And)(\p{Lu})").unwrap();
    static ref KEYWORD_SEPARATOR: Regex =
        Regex::new(r"(?i)\b(?:featuring|feat|with)\b\.?").unwrap();
    static ref SYMBOL_SEPARATOR: Regex = Regex::new(r"[&,/]").unwrap();
    static ref PADDED_AMPERSANDS: Regex = Regex::new(r"\s*&[\s&]*").unwrap();
    static ref WHITESPACE_RUN: Regex = Regex::new(r"\s+").unwrap();
}

/// Reduces a raw chart credit to its primary artist.
///
/// Total and idempotent: `normalize_artist(&normalize_artist(x)) ==
/// normalize_artist(x)`. An empty input comes back unchanged and a credit made
/// only of a colon suffix yields an empty string.
pub fn normalize_artist(raw: &str) -> String {
    if raw.is_empty() {
        return String::new();
    }

    let truncated = COLON_SUFFIX.replace(raw.trim(), "");
    let unglued = unglue_keywords(&truncated);
    let separated = KEYWORD_SEPARATOR.replace_all(&unglued, SEPARATOR);
    let separated = SYMBOL_SEPARATOR.replace_all(&separated, SEPARATOR);
    let collapsed = PADDED_AMPERSANDS.replace_all(&separated, SEPARATOR);
    let collapsed = WHITESPACE_RUN.replace_all(&collapsed, " ");

    collapsed
        .trim()
        .split(SEPARATOR.trim())
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

/// Inserts a space where a collaboration keyword was glued onto its
/// neighbour. Glue that doesn't involve a keyword is kept as is, so
/// camel-cased names like "MoneyBagg" survive.
///
/// Repeats until stable, since one repair can expose the next ("AndAnd").
fn unglue_keywords(s: &str) -> String {
    let mut current = s.to_string();
    loop {
        let before = GLUED_BEFORE_KEYWORD.replace_all(&current, "$1 $2");
        let next = GLUED_AFTER_KEYWORD
            .replace_all(&before, "$1 $2")
            .into_owned();
        if next == current {
            return current;
        }
        current = next;
    }
}
