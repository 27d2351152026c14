//! Shared data model for the biogram n-gram miner.
//!
//! The central lifetime rule of the whole pipeline lives here: every piece of
//! original record text is copied once into a run-wide [`TextArena`], and all
//! later structures ([`Bio`], [`Ngram`], the per-pass spelling trackers) refer
//! back to it through plain `(offset, length)` [`Span`]s. Nothing outside the
//! arena owns text, so nothing can outlive it by accident.
//!
//! A [`Bio`] is one record's contribution to the mining run: its two cohort
//! flags plus the positional sequence of surviving stems. `Bio::ngrams(order)`
//! yields the deduplicated order-N windows the pass engine consumes.

use std::fmt;

/// Maximum record text length, counted in codepoints of the source platform's
/// NFC form. Texts are UTF-8, so the byte bound is four times that.
pub const MAX_TEXT_CODEPOINTS: usize = 160;
/// Byte bound derived from [`MAX_TEXT_CODEPOINTS`].
pub const MAX_TEXT_BYTES: usize = MAX_TEXT_CODEPOINTS * 4;

/// Highest n-gram order the engine will run.
pub const MAX_ORDER: usize = 10;

/// A parsed input record. Transient: the pipeline consumes it immediately
/// after parsing and only the text (via the arena) and flags survive.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Record {
    pub id: u64,
    pub flag_a: bool,
    pub flag_b: bool,
    pub text: Vec<u8>,
}

/// An `(offset, length)` reference into the run's [`TextArena`].
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub struct Span {
    pub start: usize,
    pub len: u32,
}

impl Span {
    pub fn end(self) -> usize {
        self.start + self.len as usize
    }
}

/// Owns every record text for the duration of the run.
///
/// Appended-only; spans handed out by [`TextArena::push`] stay valid until the
/// arena is dropped, which in practice is the end of the process.
#[derive(Debug, Default)]
pub struct TextArena {
    buf: String,
}

impl TextArena {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy `text` into the arena and return the span covering it.
    pub fn push(&mut self, text: &str) -> Span {
        let start = self.buf.len();
        self.buf.push_str(text);
        Span {
            start,
            len: text.len() as u32,
        }
    }

    /// Resolve a span back to its text.
    ///
    /// # Panics
    /// Panics if the span was not produced against this arena (out of bounds
    /// or splitting a UTF-8 sequence).
    pub fn text(&self, span: Span) -> &str {
        &self.buf[span.start..span.end()]
    }

    /// Total bytes held.
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// One surviving stem plus the span of the raw token that produced it.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Unigram {
    pub stem: String,
    pub span: Span,
}

/// An order-N window over a Bio's stems.
///
/// Identity is the stems joined by single spaces; two n-grams with the same
/// identity may still have different original spans. The span runs from the
/// start of the first composing token to the end of the last, so it can
/// include bytes of tokens that were dropped in between.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Ngram {
    identity: String,
    span: Span,
}

impl Ngram {
    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn into_identity(self) -> String {
        self.identity
    }

    /// Identity of the (N-1)-length prefix, or `None` for unigrams.
    pub fn prefix(&self) -> Option<&str> {
        self.identity
            .rfind(' ')
            .map(|split| &self.identity[..split])
    }

    pub fn span(&self) -> Span {
        self.span
    }
}

impl fmt::Display for Ngram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity)
    }
}

/// One record's flags plus its surviving stems, in text order.
///
/// Bios for the whole corpus are held in memory between the first and last
/// pass: tokenizing and stemming once and reusing the result across passes is
/// several times cheaper than redoing it per order.
#[derive(Clone, Debug)]
pub struct Bio {
    pub flag_a: bool,
    pub flag_b: bool,
    unigrams: Vec<Unigram>,
}

impl Bio {
    /// `unigrams` must already be filtered down to nonempty stems, in the
    /// order they appeared in the text.
    pub fn new(flag_a: bool, flag_b: bool, unigrams: Vec<Unigram>) -> Self {
        debug_assert!(unigrams.iter().all(|u| !u.stem.is_empty()));
        Self {
            flag_a,
            flag_b,
            unigrams,
        }
    }

    pub fn unigram_count(&self) -> usize {
        self.unigrams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.unigrams.is_empty()
    }

    /// All order-N windows, sorted by identity and deduplicated.
    ///
    /// Duplicated identities within one Bio count once per pass; the sort is
    /// stable, so the first-seen original span wins. Returns an empty vec when
    /// the text has fewer than `order` stems.
    pub fn ngrams(&self, order: usize) -> Vec<Ngram> {
        assert!(order >= 1, "n-gram order must be at least 1");
        if self.unigrams.len() < order {
            return Vec::new();
        }

        let mut out = Vec::with_capacity(self.unigrams.len() - order + 1);
        for window in self.unigrams.windows(order) {
            let mut identity =
                String::with_capacity(window.iter().map(|u| u.stem.len() + 1).sum::<usize>() - 1);
            for (i, unigram) in window.iter().enumerate() {
                if i > 0 {
                    identity.push(' ');
                }
                identity.push_str(&unigram.stem);
            }

            let first = &window[0];
            let last = &window[window.len() - 1];
            let span = Span {
                start: first.span.start,
                len: (last.span.end() - first.span.start) as u32,
            };
            out.push(Ngram { identity, span });
        }

        out.sort_by(|a, b| a.identity.cmp(&b.identity));
        out.dedup_by(|next, kept| next.identity == kept.identity);
        out
    }
}
