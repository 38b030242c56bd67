//! Item name canonicalization
//!
//! `normalize` is the only canonical form used for catalog lookup, storage
//! and learning.

use once_cell::sync::Lazy;
use regex::Regex;

/// Latvian letters folded to their unaccented base (lowercase only;
/// input is lowercased first)
const DIACRITIC_FOLDS: &[(char, char)] = &[
    ('ā', 'a'),
    ('ē', 'e'),
    ('ī', 'i'),
    ('ō', 'o'),
    ('ū', 'u'),
    ('č', 'c'),
    ('ģ', 'g'),
    ('ķ', 'k'),
    ('ļ', 'l'),
    ('ņ', 'n'),
    ('š', 's'),
    ('ž', 'z'),
];

fn fold(c: char) -> char {
    DIACRITIC_FOLDS
        .iter()
        .find(|(accented, _)| *accented == c)
        .map(|(_, base)| *base)
        .unwrap_or(c)
}

/// Whitespace and Unicode punctuation (general category P), except `%`
///
/// `%` stays because it distinguishes products ("piens 2.5%"). Symbols such
/// as `+` and `$` are not punctuation and are kept too.
static SEPARATORS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[\s\p{P}--%]+").expect("separator pattern is valid")
});

/// Canonicalize a raw item name
///
/// Lowercases, folds diacritics, turns punctuation into spaces, collapses
/// whitespace and trims.
pub fn normalize(raw: &str) -> String {
    let folded: String = raw.chars().flat_map(char::to_lowercase).map(fold).collect();
    SEPARATORS.replace_all(&folded, " ").trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lowercases_and_folds() {
        assert_eq!(normalize("Kartupeļi"), "kartupeli");
        assert_eq!(normalize("ŠOKOLĀDE"), "sokolade");
        assert_eq!(normalize("Žāvēta Ģurķu Ķimene"), "zaveta gurku kimene");
    }

    #[test]
    fn test_punctuation_becomes_space() {
        assert_eq!(normalize("piens, 2.5%"), "piens 2 5%");
        assert_eq!(normalize("pilngraudu-maize"), "pilngraudu maize");
        assert_eq!(normalize("„Laima” šokolāde"), "laima sokolade");
    }

    #[test]
    fn test_any_unicode_punctuation_separates() {
        // U+2010 and U+2011 hyphens, U+201A low quote, U+2018 closing quote
        assert_eq!(normalize("pilngraudu\u{2010}maize"), "pilngraudu maize");
        assert_eq!(normalize("pilngraudu\u{2011}maize"), "pilngraudu maize");
        assert_eq!(normalize("\u{201A}Laima\u{2018} šokolāde"), "laima sokolade");
        assert_eq!(normalize("siers (rīvēts) / 200g"), "siers rivets 200g");
    }

    #[test]
    fn test_percent_and_symbols_kept() {
        assert_eq!(normalize("Piens 2.5%"), "piens 2 5%");
        assert_ne!(normalize("piens 2.5%"), normalize("piens 2.5"));
        assert_eq!(normalize("C+ vitamīns"), "c+ vitamins");
        assert_eq!(normalize("$ dolāru cepumi"), "$ dolaru cepumi");
    }

    #[test]
    fn test_collapses_and_trims_whitespace() {
        assert_eq!(normalize("  maltā   gaļa \t"), "malta gala");
        assert_eq!(normalize(""), "");
        assert_eq!(normalize(" .,- "), "");
    }

    #[test]
    fn test_idempotent() {
        for s in ["Grieķu Jogurts", "  Dorblū   siers. ", "ābolu-sula", "x", "piens, 2.5% ‚A‘"] {
            let once = normalize(s);
            assert_eq!(normalize(&once), once, "not idempotent for {:?}", s);
        }
    }

    #[test]
    fn test_diacritic_invariant() {
        assert_eq!(normalize("vīns"), normalize("vins"));
        assert_eq!(normalize("Ābolu sula"), normalize("abolu sula"));
        assert_eq!(normalize("biezpiena sieriņš"), normalize("biezpiena sierins"));
    }
}
