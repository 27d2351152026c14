//! Tokenization and stem classification.
//!
//! Turning raw record text into canonical stems happens in two stages. A
//! [`Tokenizer`] splits text into byte-range tokens with one compiled regex
//! (words and numbers, `#`/`@`-prefixed tokens, URL-like runs, punctuation
//! runs). A [`Classifier`] then decides, per token, whether to drop it, pass
//! it through, or stem it with the Porter2 English stemmer.
//!
//! Both are plain values built once at startup and passed by reference to
//! whoever needs them; there is no lazily-initialized global state.
//!
//! [`casefold`] is the comparison form used everywhere: NFKD decomposition,
//! combining marks stripped, then lowercased. It serves double duty as the
//! classifier's normalization step and as the display fold when the report
//! merges spelling variants.

use std::collections::HashSet;
use std::ops::Range;

use anyhow::{Context, Result};
use regex::Regex;
use rust_stemmers::{Algorithm, Stemmer};
use unicode_normalization::UnicodeNormalization;
use unicode_normalization::char::is_combining_mark;

/// Byte limit above which a token is treated as noise and never stemmed.
/// 30 bytes is at least 7 codepoints, or 30 English letters.
pub const MAX_TOKEN_BYTES: usize = 30;

/// Token grammar, most specific alternatives first: URL-ish runs, hashtags
/// and mentions, word/number runs (internal `.` and apostrophes allowed, so
/// `1.3`, `twitter.com` and `don't` each stay one token), punctuation runs.
const TOKEN_PATTERN: &str = r"(?x)
      https?://\S+
    | www\.\S+
    | [\#@][\p{L}\p{N}_]+
    | [\p{L}\p{N}][\p{L}\p{M}\p{N}]*(?: [.'’] [\p{L}\p{M}\p{N}]+ )*
    | [^\p{L}\p{N}\s]+
";

/// English stopwords, matched against the casefolded token.
const STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "your", "yours",
    "yourself", "yourselves", "he", "him", "his", "himself", "she", "her", "hers", "herself",
    "it", "its", "itself", "they", "them", "their", "theirs", "themselves", "what", "which",
    "who", "whom", "this", "that", "these", "those", "am", "is", "are", "was", "were", "be",
    "been", "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an",
    "the", "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by",
    "for", "with", "about", "against", "between", "into", "through", "during", "before",
    "after", "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over",
    "under", "again", "further", "then", "once", "here", "there", "when", "where", "why",
    "how", "all", "any", "both", "each", "few", "more", "most", "other", "some", "such",
    "no", "nor", "not", "only", "own", "same", "so", "than", "too", "very", "can", "will",
    "just", "should", "now",
];

/// Fold `text` to its comparison form: NFKD, strip combining marks, lowercase.
pub fn casefold(text: &str) -> String {
    text.nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase)
        .collect()
}

/// Splits text into byte-range tokens using a fixed lexical grammar.
pub struct Tokenizer {
    re: Regex,
}

impl Tokenizer {
    pub fn new() -> Result<Self> {
        let re = Regex::new(TOKEN_PATTERN).context("compiling token pattern")?;
        Ok(Self { re })
    }

    /// Byte ranges of every token in `text`, in order.
    pub fn tokenize(&self, text: &str) -> Vec<Range<usize>> {
        self.re.find_iter(text).map(|m| m.range()).collect()
    }
}

/// Decides, per raw token, whether to drop, pass through, or stem.
pub struct Classifier {
    stemmer: Stemmer,
    stopwords: HashSet<&'static str>,
}

impl Classifier {
    pub fn new() -> Self {
        Self {
            stemmer: Stemmer::create(Algorithm::English),
            stopwords: STOPWORDS.iter().copied().collect(),
        }
    }

    /// Canonical stem for a raw token, or `None` to drop it.
    ///
    /// Decision order: overlong tokens and URL-ish tokens go first (before any
    /// Unicode work); then the token is casefolded and classified. Hashtags
    /// and mentions pass through unstemmed; pure punctuation and stopwords
    /// drop; all-ASCII-lowercase words get Porter2; everything else (numbers,
    /// non-Latin scripts, mixed content) passes through folded but unstemmed.
    pub fn stem(&self, raw: &str) -> Option<String> {
        if raw.len() > MAX_TOKEN_BYTES {
            return None;
        }
        if is_url_or_just_dots(raw) {
            return None;
        }

        let folded = casefold(raw);
        if folded.is_empty() {
            return None;
        }
        if self.stopwords.contains(folded.as_str()) {
            return None;
        }

        let first = folded.chars().next()?;
        if first == '#' || first == '@' {
            return Some(folded);
        }
        if !first.is_alphanumeric() {
            return None;
        }
        if folded.bytes().all(|b| b.is_ascii_lowercase()) {
            return Some(self.stemmer.stem(&folded).into_owned());
        }
        Some(folded)
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new()
    }
}

/// True when the token contains a `.` and is not a plain decimal number.
/// Catches URLs and ellipses; `1.3` is exempt.
fn is_url_or_just_dots(token: &str) -> bool {
    let mut has_dot = false;
    let mut has_digit = false;
    let mut has_other = false;

    for b in token.bytes() {
        match b {
            b'.' => has_dot = true,
            b'0'..=b'9' => has_digit = true,
            _ => has_other = true,
        }
    }

    has_dot && (has_other || !has_digit)
}
