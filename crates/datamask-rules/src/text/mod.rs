//! String rules.

use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;
use sha2::{Digest, Sha256};

use crate::errors::RuleError;
use crate::rule::{MaskRule, SeededRule};
use crate::seed::{SeedProvider, rng_for};

pub const DEFAULT_REPLACEMENT: &str = "***";
pub const DEFAULT_MASK_CHAR: char = '*';

static EMAIL: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"^(?P<user>[^@\s]+)@(?P<domain>[^@\s]+\.[^@\s]+)$").ok());

/// Replaces the whole value with a fixed replacement.
#[derive(Debug, Clone)]
pub struct Redact {
    replacement: String,
}

impl Default for Redact {
    fn default() -> Self {
        Self::with_replacement(DEFAULT_REPLACEMENT)
    }
}

impl Redact {
    pub fn with_replacement(replacement: impl Into<String>) -> Self {
        Self {
            replacement: replacement.into(),
        }
    }
}

impl MaskRule<String> for Redact {
    fn id(&self) -> &'static str {
        "text.redact"
    }

    fn apply(&self, _input: String) -> Result<String, RuleError> {
        Ok(self.replacement.clone())
    }
}

/// Keeps the first `keep_start` and last `keep_end` characters and masks the
/// rest. Values too short to keep anything are masked entirely.
#[derive(Debug, Clone)]
pub struct MaskChars {
    keep_start: usize,
    keep_end: usize,
    mask_char: char,
}

impl MaskChars {
    pub fn new(keep_start: usize, keep_end: usize, mask_char: char) -> Self {
        Self {
            keep_start,
            keep_end,
            mask_char,
        }
    }
}

impl MaskRule<String> for MaskChars {
    fn id(&self) -> &'static str {
        "text.mask"
    }

    fn apply(&self, input: String) -> Result<String, RuleError> {
        let chars: Vec<char> = input.chars().collect();
        if chars.len() <= self.keep_start + self.keep_end {
            return Ok(chars.iter().map(|_| self.mask_char).collect());
        }
        let tail_start = chars.len() - self.keep_end;
        Ok(chars
            .iter()
            .enumerate()
            .map(|(index, ch)| {
                if index < self.keep_start || index >= tail_start {
                    *ch
                } else {
                    self.mask_char
                }
            })
            .collect())
    }
}

/// Masks while keeping the recognizable layout of emails and Brazilian
/// CPF/CNPJ numbers; anything else keeps only its first and last character.
#[derive(Debug, Clone)]
pub struct FormatPreserving {
    mask_char: char,
}

impl Default for FormatPreserving {
    fn default() -> Self {
        Self::new(DEFAULT_MASK_CHAR)
    }
}

impl FormatPreserving {
    pub fn new(mask_char: char) -> Self {
        Self { mask_char }
    }
}

impl MaskRule<String> for FormatPreserving {
    fn id(&self) -> &'static str {
        "text.format_preserving"
    }

    fn apply(&self, input: String) -> Result<String, RuleError> {
        Ok(format_preserving(&input, self.mask_char))
    }
}

fn format_preserving(value: &str, mask_char: char) -> String {
    if let Some(captures) = EMAIL.as_ref().and_then(|re| re.captures(value)) {
        let user = mask_keep_edges(&captures["user"], mask_char);
        return format!("{user}@{}", &captures["domain"]);
    }

    let digits: String = value.chars().filter(|ch| ch.is_ascii_digit()).collect();
    if digits.len() == 11 {
        let last = &digits[digits.len() - 2..];
        return format!(
            "{mask}{mask}{mask}.{mask}{mask}{mask}.{mask}{mask}{mask}-{last}",
            mask = mask_char
        );
    }
    if digits.len() == 14 {
        let last = &digits[digits.len() - 2..];
        return format!(
            "{mask}{mask}.{mask}{mask}{mask}.{mask}{mask}{mask}/{mask}{mask}{mask}{mask}-{last}",
            mask = mask_char
        );
    }

    mask_keep_edges(value, mask_char)
}

fn mask_keep_edges(value: &str, mask_char: char) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 2 {
        return chars.iter().map(|_| mask_char).collect();
    }
    let mut out = String::with_capacity(chars.len());
    out.push(chars[0]);
    for _ in 1..(chars.len() - 1) {
        out.push(mask_char);
    }
    out.push(chars[chars.len() - 1]);
    out
}

/// SHA-256 of `salt + value`, hex encoded, optionally cut to `length` chars.
#[derive(Debug, Clone, Default)]
pub struct HashText {
    salt: String,
    length: Option<usize>,
}

impl HashText {
    pub fn new(salt: impl Into<String>, length: Option<usize>) -> Self {
        Self {
            salt: salt.into(),
            length,
        }
    }
}

impl MaskRule<String> for HashText {
    fn id(&self) -> &'static str {
        "text.hash"
    }

    fn apply(&self, input: String) -> Result<String, RuleError> {
        let mut hasher = Sha256::new();
        hasher.update(self.salt.as_bytes());
        hasher.update(input.as_bytes());
        let mut digest = hex::encode(hasher.finalize());
        if let Some(length) = self.length {
            digest.truncate(length);
        }
        Ok(digest)
    }
}

/// Keeps at most `max_len` characters.
#[derive(Debug, Clone)]
pub struct Truncate {
    max_len: usize,
}

impl Truncate {
    pub fn new(max_len: usize) -> Self {
        Self { max_len }
    }
}

impl MaskRule<String> for Truncate {
    fn id(&self) -> &'static str {
        "text.truncate"
    }

    fn apply(&self, input: String) -> Result<String, RuleError> {
        Ok(input.chars().take(self.max_len).collect())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaseMode {
    Upper,
    Lower,
    Title,
}

impl CaseMode {
    pub fn parse(mode: &str) -> Option<Self> {
        match mode {
            "upper" => Some(CaseMode::Upper),
            "lower" => Some(CaseMode::Lower),
            "title" => Some(CaseMode::Title),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Casing {
    mode: CaseMode,
}

impl Casing {
    pub fn new(mode: CaseMode) -> Self {
        Self { mode }
    }
}

impl MaskRule<String> for Casing {
    fn id(&self) -> &'static str {
        "text.casing"
    }

    fn apply(&self, input: String) -> Result<String, RuleError> {
        Ok(match self.mode {
            CaseMode::Upper => input.to_uppercase(),
            CaseMode::Lower => input.to_lowercase(),
            CaseMode::Title => to_title_case(&input),
        })
    }
}

fn to_title_case(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut next_upper = true;
    for ch in value.chars() {
        if ch.is_whitespace() {
            next_upper = true;
            out.push(ch);
        } else if next_upper {
            out.extend(ch.to_uppercase());
            next_upper = false;
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

/// Replaces every match of `pattern` with `replacement` (`$1`-style group
/// references allowed).
#[derive(Debug, Clone)]
pub struct RegexReplace {
    pattern: Regex,
    replacement: String,
}

impl RegexReplace {
    pub fn new(pattern: &str, replacement: impl Into<String>) -> Result<Self, RuleError> {
        let pattern = Regex::new(pattern)
            .map_err(|err| RuleError::InvalidArgument(format!("invalid pattern: {err}")))?;
        Ok(Self {
            pattern,
            replacement: replacement.into(),
        })
    }
}

impl MaskRule<String> for RegexReplace {
    fn id(&self) -> &'static str {
        "text.regex_replace"
    }

    fn apply(&self, input: String) -> Result<String, RuleError> {
        Ok(self
            .pattern
            .replace_all(&input, self.replacement.as_str())
            .into_owned())
    }
}

const LOWER: &[u8] = b"abcdefghijklmnopqrstuvwxyz";
const UPPER: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ";
const DIGITS: &[u8] = b"0123456789";

/// Replaces ASCII letters and digits with random ones of the same class,
/// keeping punctuation, whitespace and length.
#[derive(Debug, Clone, Default)]
pub struct Scramble {
    seed: Option<SeedProvider<String>>,
}

impl Scramble {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed(mut self, provider: SeedProvider<String>) -> Self {
        self.seed = Some(provider);
        self
    }
}

impl MaskRule<String> for Scramble {
    fn id(&self) -> &'static str {
        "text.scramble"
    }

    fn apply(&self, input: String) -> Result<String, RuleError> {
        let mut rng = rng_for(self.seed.as_ref(), &input);
        Ok(input
            .chars()
            .map(|ch| {
                let class = if ch.is_ascii_lowercase() {
                    LOWER
                } else if ch.is_ascii_uppercase() {
                    UPPER
                } else if ch.is_ascii_digit() {
                    DIGITS
                } else {
                    return ch;
                };
                char::from(class[rng.random_range(0..class.len())])
            })
            .collect())
    }

    fn as_seeded(&self) -> Option<&dyn SeededRule<String>> {
        Some(self)
    }

    fn as_seeded_mut(&mut self) -> Option<&mut dyn SeededRule<String>> {
        Some(self)
    }
}

impl SeededRule<String> for Scramble {
    fn seed_provider(&self) -> Option<&SeedProvider<String>> {
        self.seed.as_ref()
    }

    fn set_seed_provider(&mut self, provider: Option<SeedProvider<String>>) {
        self.seed = provider;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(rule: &impl MaskRule<String>, value: &str) -> String {
        rule.apply(value.to_string()).expect("rule applies")
    }

    #[test]
    fn mask_chars_keeps_edges() {
        let rule = MaskChars::new(2, 2, '#');
        assert_eq!(apply(&rule, "4111222233334444"), "41############44");
        assert_eq!(apply(&rule, "abc"), "###");
    }

    #[test]
    fn format_preserving_handles_email_and_documents() {
        let rule = FormatPreserving::default();
        assert_eq!(apply(&rule, "maria@example.com"), "m***a@example.com");
        assert_eq!(apply(&rule, "123.456.789-09"), "***.***.***-09");
        assert_eq!(apply(&rule, "12.345.678/0001-95"), "**.***.***/****-95");
        assert_eq!(apply(&rule, "Ana"), "A*a");
    }

    #[test]
    fn hash_is_salted_and_truncated() {
        let plain = HashText::default();
        let salted = HashText::new("pepper", Some(12));
        assert_eq!(apply(&plain, "abc").len(), 64);
        assert_eq!(apply(&salted, "abc").len(), 12);
        assert_ne!(&apply(&plain, "abc")[..12], apply(&salted, "abc"));
    }

    #[test]
    fn truncate_counts_characters() {
        assert_eq!(apply(&Truncate::new(2), "ção"), "çã");
    }

    #[test]
    fn casing_modes() {
        assert_eq!(apply(&Casing::new(CaseMode::Title), "ana MARIA"), "Ana Maria");
        assert_eq!(CaseMode::parse("shout"), None);
    }

    #[test]
    fn regex_replace_masks_matches() {
        let rule = RegexReplace::new(r"\d{4}", "####").expect("pattern");
        assert_eq!(apply(&rule, "card 1234 5678"), "card #### ####");
        assert!(RegexReplace::new("(", "x").is_err());
    }

    #[test]
    fn scramble_keeps_shape() {
        let rule = Scramble::new().with_seed(SeedProvider::fixed(3));
        let out = apply(&rule, "Ab-12 z");
        assert_eq!(out.len(), 7);
        let chars: Vec<char> = out.chars().collect();
        assert!(chars[0].is_ascii_uppercase());
        assert!(chars[1].is_ascii_lowercase());
        assert_eq!(chars[2], '-');
        assert!(chars[3].is_ascii_digit() && chars[4].is_ascii_digit());
        assert_eq!(chars[5], ' ');
        assert_eq!(out, apply(&rule, "Ab-12 z"));
    }
}
