use anyhow::{Result, bail};
use std::collections::{BTreeMap, HashMap};

use crate::config::Config;

/// Code points below this pass through unchanged (original 7-bit policy).
pub const ASCII_THRESHOLD: u32 = 128;
/// Code points below this pass through unchanged (current policy).
pub const EXTENDED_THRESHOLD: u32 = 255;

/// Built-in character substitutions, latest revision.
///
/// Revisions only ever add entries. The first two rows are the original table.
const BUILTIN_SUBSTITUTIONS: &[(char, &str)] = &[
    ('’', "'"),
    ('φ', "phi"),
    // Typographic quotes and primes
    ('‘', "'"),
    ('‚', "'"),
    ('‛', "'"),
    ('“', "\""),
    ('”', "\""),
    ('„', "\""),
    ('‟', "\""),
    ('′', "'"),
    ('″', "\""),
    ('‹', "<"),
    ('›', ">"),
    // Dashes, bullets, ellipsis, spaces
    ('‐', "-"),
    ('‑', "-"),
    ('‒', "-"),
    ('–', "-"),
    ('—', "-"),
    ('―', "-"),
    ('…', "..."),
    ('•', "*"),
    ('\u{00a0}', " "),
    ('\u{2009}', " "),
    ('\u{200b}', ""),
    ('\u{feff}', ""),
    ('×', "x"),
    // Symbols
    ('✨', "star"),
    ('★', "star"),
    ('☆', "star"),
    ('❤', "heart"),
    ('♥', "heart"),
    ('→', "->"),
    ('←', "<-"),
    ('≈', "~"),
    ('≤', "<="),
    ('≥', ">="),
    ('™', "(TM)"),
    ('€', "EUR"),
    // Greek
    ('α', "alpha"),
    ('β', "beta"),
    ('γ', "gamma"),
    ('δ', "delta"),
    ('λ', "lambda"),
    ('μ', "mu"),
    ('π', "pi"),
    ('σ', "sigma"),
    ('ω', "omega"),
    // CJK punctuation
    ('\u{3000}', " "),
    ('、', ","),
    ('。', "."),
    ('・', "*"),
    ('「', "["),
    ('」', "]"),
    ('『', "["),
    ('』', "]"),
    ('【', "["),
    ('】', "]"),
    ('《', "<"),
    ('》', ">"),
    ('〜', "~"),
    // Fullwidth forms
    ('！', "!"),
    ('＂', "\""),
    ('＃', "#"),
    ('％', "%"),
    ('＆', "&"),
    ('＇', "'"),
    ('（', "("),
    ('）', ")"),
    ('＊', "*"),
    ('＋', "+"),
    ('，', ","),
    ('－', "-"),
    ('．', "."),
    ('／', "/"),
    ('：', ":"),
    ('；', ";"),
    ('＜', "<"),
    ('＝', "="),
    ('＞', ">"),
    ('？', "?"),
    ('＠', "@"),
    ('［', "["),
    ('］', "]"),
    ('＿', "_"),
    ('｛', "{"),
    ('｜', "|"),
    ('｝', "}"),
    ('～', "~"),
    // Latin letters outside Latin-1
    ('ā', "a"),
    ('ă', "a"),
    ('ą', "a"),
    ('ć', "c"),
    ('č', "c"),
    ('ď', "d"),
    ('ē', "e"),
    ('ę', "e"),
    ('ě', "e"),
    ('ğ', "g"),
    ('ī', "i"),
    ('ı', "i"),
    ('ł', "l"),
    ('Ł', "L"),
    ('ń', "n"),
    ('ň', "n"),
    ('ō', "o"),
    ('ő', "o"),
    ('œ', "oe"),
    ('Œ', "OE"),
    ('ř', "r"),
    ('ś', "s"),
    ('ş', "s"),
    ('š', "s"),
    ('Š', "S"),
    ('ť', "t"),
    ('ū', "u"),
    ('ů', "u"),
    ('ű', "u"),
    ('ź', "z"),
    ('ż', "z"),
    ('ž', "z"),
    ('Ž', "Z"),
];

/// Immutable character-to-ASCII substitution table.
#[derive(Debug, Clone, PartialEq)]
pub struct SubstitutionTable {
    entries: HashMap<char, String>,
}

impl SubstitutionTable {
    /// An empty table. Every character falls through to the threshold check.
    pub fn empty() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// The latest built-in revision.
    pub fn builtin() -> Self {
        Self::from_pairs(BUILTIN_SUBSTITUTIONS.iter().map(|&(c, r)| (c, r.to_string())))
    }

    pub fn from_pairs(pairs: impl IntoIterator<Item = (char, String)>) -> Self {
        Self {
            entries: pairs.into_iter().collect(),
        }
    }

    /// Return a copy of this table with `extra` layered on top.
    ///
    /// Keys in `extra` must be exactly one character.
    pub fn extended_with(&self, extra: &BTreeMap<String, String>) -> Result<Self> {
        let mut entries = self.entries.clone();
        for (key, replacement) in extra {
            let mut chars = key.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => {
                    entries.insert(c, replacement.clone());
                }
                _ => bail!("Substitution key {key:?} must be exactly one character"),
            }
        }
        Ok(Self { entries })
    }

    pub fn get(&self, c: char) -> Option<&str> {
        self.entries.get(&c).map(String::as_str)
    }

    pub fn contains(&self, c: char) -> bool {
        self.entries.contains_key(&c)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for SubstitutionTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Output of [`Transliterator::clean`].
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Cleaned {
    pub text: String,
    /// Characters that were neither in the table nor below the threshold,
    /// in the order they appeared.
    pub unusual: Vec<char>,
}

/// Maps arbitrary text onto an ASCII-safe (or Latin-1-safe) approximation.
///
/// # Example
///
/// ```rust
/// use png_param_cleaner::transliterate::Transliterator;
///
/// let t = Transliterator::default();
/// let cleaned = t.clean("café ✨ 😀");
/// assert_eq!(cleaned.text, "café star U1f600");
/// assert_eq!(cleaned.unusual, vec!['😀']);
/// ```
#[derive(Debug, Clone)]
pub struct Transliterator {
    table: SubstitutionTable,
    threshold: u32,
}

impl Transliterator {
    pub fn new(table: SubstitutionTable, threshold: u32) -> Self {
        Self { table, threshold }
    }

    /// Build from config: built-in table plus `extra_substitutions`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let table = SubstitutionTable::builtin().extended_with(&config.extra_substitutions)?;
        log::debug!(
            "Substitution table: {} entries, threshold {}",
            table.len(),
            config.threshold
        );
        Ok(Self::new(table, config.threshold))
    }

    pub fn table(&self) -> &SubstitutionTable {
        &self.table
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Transliterate `input` left to right.
    ///
    /// Table lookup comes first, so a mapped character is replaced even when it
    /// is below the threshold. Unmapped characters at or above the threshold
    /// become `U` + lowercase hex (at least four digits).
    pub fn clean(&self, input: &str) -> Cleaned {
        let mut cleaned = Cleaned {
            text: String::with_capacity(input.len()),
            unusual: Vec::new(),
        };

        for c in input.chars() {
            if let Some(replacement) = self.table.get(c) {
                cleaned.text.push_str(replacement);
            } else if (c as u32) < self.threshold {
                cleaned.text.push(c);
            } else {
                cleaned.text.push_str(&escape(c));
                cleaned.unusual.push(c);
            }
        }

        cleaned
    }
}

impl Default for Transliterator {
    fn default() -> Self {
        Self::new(SubstitutionTable::builtin(), EXTENDED_THRESHOLD)
    }
}

/// Escape token for a character: `U` + lowercase hex code point, zero-padded to 4.
pub fn escape(c: char) -> String {
    format!("U{:04x}", c as u32)
}

/// Recover the character from an escape token produced by [`escape`].
pub fn parse_escape(token: &str) -> Option<char> {
    let hex = token.strip_prefix('U')?;
    if hex.len() < 4 || !hex.bytes().all(|b| b.is_ascii_digit() || (b'a'..=b'f').contains(&b)) {
        return None;
    }
    u32::from_str_radix(hex, 16).ok().and_then(char::from_u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ascii_only() -> Transliterator {
        Transliterator::new(SubstitutionTable::empty(), ASCII_THRESHOLD)
    }

    // ── pass-through ─────────────────────────────────────────────────

    #[test]
    fn plain_ascii_is_unchanged() {
        let t = Transliterator::default();
        let input = "masterpiece, best quality, (1girl:1.2), <lora:x:0.8>\nSteps: 20";
        let cleaned = t.clean(input);
        assert_eq!(cleaned.text, input);
        assert!(cleaned.unusual.is_empty());
    }

    #[test]
    fn latin1_passes_under_extended_threshold() {
        let t = Transliterator::default();
        assert_eq!(t.clean("naïve café Straße").text, "naïve café Straße");
    }

    #[test]
    fn latin1_is_escaped_under_ascii_threshold() {
        let cleaned = ascii_only().clean("café");
        assert_eq!(cleaned.text, "cafU00e9");
        assert_eq!(cleaned.unusual, vec!['é']);
    }

    #[test]
    fn threshold_is_exclusive() {
        let t = Transliterator::default();
        assert_eq!(t.clean("\u{fe}").text, "\u{fe}");
        assert_eq!(t.clean("ÿ").text, "U00ff");
    }

    #[test]
    fn empty_input() {
        assert_eq!(Transliterator::default().clean(""), Cleaned::default());
    }

    // ── table ────────────────────────────────────────────────────────

    #[test]
    fn original_table_entries_survive() {
        let t = Transliterator::default();
        assert_eq!(t.clean("it’s φ").text, "it's phi");
    }

    #[test]
    fn table_wins_over_threshold() {
        let t = Transliterator::default();
        // U+00D7 and U+00A0 are below 255 but mapped.
        assert_eq!(t.clean("512×768\u{a0}px").text, "512x768 px");
    }

    #[test]
    fn table_can_map_ascii() {
        let table = SubstitutionTable::from_pairs([('a', "4".to_string())]);
        let t = Transliterator::new(table, ASCII_THRESHOLD);
        assert_eq!(t.clean("banana").text, "b4n4n4");
    }

    #[test]
    fn cjk_and_fullwidth_punctuation() {
        let t = Transliterator::default();
        assert_eq!(t.clean("「猫」（cat）！").text, "[U732b](cat)!");
    }

    #[test]
    fn zero_width_removed() {
        let t = Transliterator::default();
        assert_eq!(t.clean("a\u{200b}b").text, "ab");
    }

    #[test]
    fn no_table_key_survives() {
        let t = Transliterator::default();
        let input: String = BUILTIN_SUBSTITUTIONS.iter().map(|&(c, _)| c).collect();
        let cleaned = t.clean(&input);
        for &(c, _) in BUILTIN_SUBSTITUTIONS {
            assert!(!cleaned.text.contains(c), "{c:?} survived");
        }
        assert!(cleaned.unusual.is_empty());
    }

    #[test]
    fn builtin_replacements_are_ascii() {
        for &(c, r) in BUILTIN_SUBSTITUTIONS {
            assert!(r.is_ascii(), "replacement for {c:?} is not ASCII");
        }
    }

    // ── escapes ──────────────────────────────────────────────────────

    #[test]
    fn escape_pads_to_four_digits() {
        assert_eq!(escape('ÿ'), "U00ff");
        assert_eq!(escape('猫'), "U732b");
        assert_eq!(escape('😀'), "U1f600");
    }

    #[test]
    fn escape_is_recoverable() {
        let t = Transliterator::default();
        for c in ['猫', '😀', '\u{10ffff}', 'Ω'] {
            let cleaned = t.clean(&c.to_string());
            assert_eq!(parse_escape(&cleaned.text), Some(c));
        }
    }

    #[test]
    fn parse_escape_rejects_garbage() {
        assert_eq!(parse_escape("u1f600"), None);
        assert_eq!(parse_escape("U1F600"), None);
        assert_eq!(parse_escape("Uff"), None);
        assert_eq!(parse_escape("Uzzzz"), None);
        assert_eq!(parse_escape("Ud800"), None);
    }

    #[test]
    fn unusual_recorded_in_order() {
        let cleaned = Transliterator::default().clean("😀 a 猫 😀");
        assert_eq!(cleaned.unusual, vec!['😀', '猫', '😀']);
        assert_eq!(cleaned.text, "U1f600 a U732b U1f600");
    }

    #[test]
    fn end_to_end_example() {
        assert_eq!(Transliterator::default().clean("café ✨").text, "café star");
    }

    // ── config ───────────────────────────────────────────────────────

    #[test]
    fn config_extras_layer_on_builtin() {
        let mut config = Config::default();
        config.extra_substitutions.insert("猫".into(), "cat".into());
        config.extra_substitutions.insert("’".into(), "`".into());
        let t = Transliterator::from_config(&config).unwrap();
        assert_eq!(t.clean("猫’φ").text, "cat`phi");
        assert_eq!(t.table().len(), SubstitutionTable::builtin().len() + 1);
    }

    #[test]
    fn config_rejects_multichar_key() {
        let mut config = Config::default();
        config.extra_substitutions.insert("ab".into(), "x".into());
        assert!(Transliterator::from_config(&config).is_err());

        let mut config = Config::default();
        config.extra_substitutions.insert(String::new(), "x".into());
        assert!(Transliterator::from_config(&config).is_err());
    }

    #[test]
    fn config_threshold_is_used() {
        let config = Config {
            threshold: ASCII_THRESHOLD,
            ..Config::default()
        };
        let t = Transliterator::from_config(&config).unwrap();
        assert_eq!(t.clean("é").text, "U00e9");
    }
}
