// src/matching/name.rs
use once_cell::sync::Lazy;
use regex::Regex;
use strsim::jaro_winkler;

// Prefixes stripped during normalization. Articles first, then honorifics,
// one of each at most; order matters ("The DJ Example" loses both).
const LEADING_ARTICLES: [&str; 2] = ["the ", "a "];
const LEADING_HONORIFICS: [&str; 2] = ["dj ", "lil "];

static NON_ALNUM_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^a-z0-9 ]+").expect("invalid non-alnum regex"));
static WHITESPACE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\s+").expect("invalid whitespace regex"));

/// Fold common accented Latin characters to their ASCII base so "Björk" and
/// "Bjork" compare equal. Characters outside the table pass through and are
/// dropped later by the non-alphanumeric pass.
fn fold_to_ascii(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'à' | 'á' | 'â' | 'ã' | 'ä' | 'å' | 'ā' | 'ă' | 'ą' => 'a',
            'ç' | 'ć' | 'č' => 'c',
            'ď' | 'đ' => 'd',
            'è' | 'é' | 'ê' | 'ë' | 'ē' | 'ė' | 'ę' | 'ě' => 'e',
            'ì' | 'í' | 'î' | 'ï' | 'ī' | 'į' => 'i',
            'ł' => 'l',
            'ñ' | 'ń' | 'ň' => 'n',
            'ò' | 'ó' | 'ô' | 'õ' | 'ö' | 'ø' | 'ō' | 'ő' => 'o',
            'ř' => 'r',
            'ś' | 'š' => 's',
            'ť' => 't',
            'ù' | 'ú' | 'û' | 'ü' | 'ū' | 'ů' | 'ű' => 'u',
            'ý' | 'ÿ' => 'y',
            'ź' | 'ż' | 'ž' => 'z',
            'ß' => 's',
            'æ' => 'a',
            'œ' => 'o',
            other => other,
        })
        .collect()
}

fn strip_leading_prefix(name: &str, prefixes: &[&str]) -> String {
    for prefix in prefixes {
        if let Some(rest) = name.strip_prefix(prefix) {
            return rest.to_string();
        }
    }
    name.to_string()
}

/// Canonicalize an artist display name for comparison: lowercase, fold
/// diacritics, drop a leading article and honorific, strip punctuation,
/// collapse whitespace. Deterministic and total; empty in, empty out.
pub fn normalize_artist_name(raw: &str) -> String {
    let lowered = fold_to_ascii(&raw.to_lowercase());
    let trimmed = lowered.trim();
    let without_article = strip_leading_prefix(trimmed, &LEADING_ARTICLES);
    let without_honorific = strip_leading_prefix(&without_article, &LEADING_HONORIFICS);
    let alnum = NON_ALNUM_RE.replace_all(&without_honorific, "");
    let collapsed = WHITESPACE_RE.replace_all(&alnum, " ");
    collapsed.trim().to_string()
}

/// Jaro-Winkler similarity in [0, 1]. Either side empty scores 0; identical
/// non-empty strings score 1.
pub fn jaro_winkler_similarity(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    jaro_winkler(a, b)
}

/// Similarity between two raw artist names after normalization. Returns 0
/// when both names normalize to empty.
pub fn artist_name_similarity(a: &str, b: &str) -> f64 {
    jaro_winkler_similarity(&normalize_artist_name(a), &normalize_artist_name(b))
}
