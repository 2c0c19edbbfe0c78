//! Name similarity scoring
//!
//! `score = 100 × (0.80 × token-set Jaccard + 0.20 × sequence ratio)`, computed over
//! normalized strings. Token overlap dominates so reordered or abbreviated names
//! still match; the character term separates spellings that share a token set.

use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

const TOKEN_WEIGHT: f64 = 0.80;
const SEQUENCE_WEIGHT: f64 = 0.20;

fn non_alphanumeric() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"[^\p{Alphabetic}\p{N}]+").expect("valid pattern"))
}

/// Normalize a name for comparison (NFC, lowercase, `&` as "and", punctuation runs collapsed)
pub fn normalize(name: &str) -> String {
    let composed: String = name.nfc().collect();
    let lowered = composed.to_lowercase().replace('&', " and ");
    non_alphanumeric()
        .replace_all(&lowered, " ")
        .trim()
        .to_string()
}

/// Similarity between two raw names, in [0, 100].
pub fn score(query: &str, candidate: &str) -> f64 {
    score_normalized(&normalize(query), &normalize(candidate))
}

/// Same as [`score`] for strings that already went through [`normalize`].
pub fn score_normalized(query: &str, candidate: &str) -> f64 {
    if query.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let jaccard = token_jaccard(query, candidate);
    let ratio = sequence_ratio(query, candidate);

    (100.0 * (TOKEN_WEIGHT * jaccard + SEQUENCE_WEIGHT * ratio)).clamp(0.0, 100.0)
}

/// Intersection over union of the whitespace-split token sets
pub fn token_jaccard(a: &str, b: &str) -> f64 {
    let a_tokens: HashSet<&str> = a.split_whitespace().collect();
    let b_tokens: HashSet<&str> = b.split_whitespace().collect();

    let union = a_tokens.union(&b_tokens).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = a_tokens.intersection(&b_tokens).count();

    intersection as f64 / union as f64
}

/// Ratcliff/Obershelp ratio: `2 × matched characters / total characters`.
///
/// The pair is put in a canonical order first so the ratio is symmetric.
pub fn sequence_ratio(a: &str, b: &str) -> f64 {
    let (a, b) = if a <= b { (a, b) } else { (b, a) };
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    2.0 * matching_characters(&a, &b) as f64 / total as f64
}

// Sum of the sizes of the recursively found longest common blocks
fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut pending = vec![(0, a.len(), 0, b.len())];

    while let Some((a_lo, a_hi, b_lo, b_hi)) = pending.pop() {
        let (i, j, size) = longest_match(a, b, a_lo, a_hi, b_lo, b_hi);
        if size == 0 {
            continue;
        }
        matched += size;

        if a_lo < i && b_lo < j {
            pending.push((a_lo, i, b_lo, j));
        }
        if i + size < a_hi && j + size < b_hi {
            pending.push((i + size, a_hi, j + size, b_hi));
        }
    }

    matched
}

// Longest common block inside the window; earliest in `a`, then earliest in `b`, wins ties
fn longest_match(
    a: &[char],
    b: &[char],
    a_lo: usize,
    a_hi: usize,
    b_lo: usize,
    b_hi: usize,
) -> (usize, usize, usize) {
    let width = b_hi - b_lo;
    let mut previous = vec![0usize; width + 1];
    let mut current = vec![0usize; width + 1];
    let (mut best_i, mut best_j, mut best_size) = (a_lo, b_lo, 0);

    for i in a_lo..a_hi {
        for j in b_lo..b_hi {
            let k = j - b_lo;
            current[k + 1] = if a[i] == b[j] { previous[k] + 1 } else { 0 };

            if current[k + 1] > best_size {
                best_size = current[k + 1];
                best_i = i + 1 - best_size;
                best_j = j + 1 - best_size;
            }
        }
        std::mem::swap(&mut previous, &mut current);
    }

    (best_i, best_j, best_size)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_normalization() {
        assert_eq!(normalize("John O'Brien, Jr."), "john o brien jr");
        assert_eq!(normalize("ACME   Corp."), "acme corp");
        assert_eq!(normalize("Smith & Wesson"), "smith and wesson");
        assert_eq!(normalize("AT&T"), "at and t");
        assert_eq!(normalize("  --  "), "");
    }

    #[test]
    fn test_normalization_composes_diacritics() {
        // "e" + combining acute vs precomposed "é"
        assert_eq!(normalize("Jose\u{301}"), normalize("Jos\u{e9}"));
        assert_eq!(normalize("MÜLLER GmbH"), "müller gmbh");
    }

    #[test]
    fn test_exact_match_scores_ceiling() {
        assert_eq!(score("Bank Melli Iran", "BANK MELLI IRAN"), 100.0);
        assert_eq!(score("Bank Melli Iran", "bank-melli, iran."), 100.0);
    }

    #[test]
    fn test_empty_scores_zero() {
        assert_eq!(score("", "Acme"), 0.0);
        assert_eq!(score("Acme", "!!!"), 0.0);
        assert_eq!(score("", ""), 0.0);
    }

    #[test]
    fn test_reordered_tokens() {
        let reordered = score("Iran Melli Bank", "Bank Melli Iran");
        // full token overlap; only the character term drops
        assert!(reordered >= 80.0 && reordered < 100.0);
    }

    #[test]
    fn test_acme_corporation() {
        // tokens {acme, corp} vs {acme, corporation} => 1/3
        // "acme corp" is a 9 char block of 9 + 16 => 18/25
        let expected = 100.0 * (0.8 * (1.0 / 3.0) + 0.2 * (18.0 / 25.0));
        assert!((score("Acme Corporation", "Acme Corp") - expected).abs() < 1e-9);
    }

    #[test]
    fn test_sequence_ratio() {
        assert_eq!(sequence_ratio("abcd", "abcd"), 1.0);
        assert_eq!(sequence_ratio("abcd", "wxyz"), 0.0);
        // blocks "ab" and "d"
        assert!((sequence_ratio("abxd", "abd") - 6.0 / 7.0).abs() < 1e-12);
        assert_eq!(sequence_ratio("", ""), 1.0);
    }

    #[test]
    fn test_sequence_ratio_symmetric() {
        let pairs = [("kitten", "sitting"), ("saturday", "sunday"), ("abab", "baba")];
        for (a, b) in pairs {
            assert_eq!(sequence_ratio(a, b), sequence_ratio(b, a));
        }
    }

    #[test]
    fn test_token_jaccard() {
        assert_eq!(token_jaccard("a b c", "a b c"), 1.0);
        assert_eq!(token_jaccard("a b", "c d"), 0.0);
        assert_eq!(token_jaccard("a a b", "a b"), 1.0);
    }
}
