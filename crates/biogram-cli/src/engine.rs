//! One mining pass: scan every Bio's order-N n-grams into a frequency table,
//! pruning candidates whose (N-1)-prefix did not survive the previous pass.
//!
//! The pruning rule is the Apriori principle applied to ordered sequences:
//! support (`n_total`) is anti-monotonic under prefix extension, so an n-gram
//! whose prefix fell below the threshold cannot reach it either and is skipped
//! without ever being counted. This is what keeps order-10 mining over tens of
//! millions of records tractable.

use std::hash::BuildHasher;

use hashbrown::{DefaultHashBuilder, HashMap, HashSet};
use tracing::info;

use biogram_types::{Bio, Span, TextArena};

/// A spelling variant of one n-gram identity: where the raw text lives, its
/// fingerprint, and how many times this exact spelling occurred.
#[derive(Clone, Copy, Debug)]
pub struct SpellingCount {
    pub span: Span,
    pub hash: u64,
    pub n: u32,
}

/// Distinct original spellings for one n-gram identity, with counts.
///
/// A sorted vector, not a hash map: entries are ordered by (hash, length,
/// bytes), so lookup is a binary search and equality almost never has to touch
/// the actual bytes. Insertion is linear in the variant count, which stays
/// small per identity; the payoff is roughly half the memory of a map at
/// corpus scale.
#[derive(Clone, Debug, Default)]
pub struct OriginalTexts {
    entries: Vec<SpellingCount>,
}

impl OriginalTexts {
    /// Bump the count for this spelling, inserting it if absent.
    fn increment(&mut self, arena: &TextArena, span: Span, hash: u64) {
        let bytes = arena.text(span).as_bytes();
        let result = self.entries.binary_search_by(|e| {
            e.hash
                .cmp(&hash)
                .then(e.span.len.cmp(&span.len))
                .then_with(|| arena.text(e.span).as_bytes().cmp(bytes))
        });
        match result {
            Ok(i) => self.entries[i].n += 1,
            Err(i) => self.entries.insert(i, SpellingCount { span, hash, n: 1 }),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SpellingCount> {
        self.entries.iter()
    }
}

/// Per-identity counts for one pass.
#[derive(Clone, Debug, Default)]
pub struct NgramInfo {
    pub n_a: u64,
    pub n_b: u64,
    pub n_both: u64,
    pub originals: OriginalTexts,
}

impl NgramInfo {
    /// Distinct records that contributed either flag. For flag-A-only counts,
    /// use `n_a - n_both`.
    pub fn n_total(&self) -> u64 {
        self.n_a + self.n_b - self.n_both
    }

    pub fn n_variants(&self) -> usize {
        self.originals.len()
    }
}

/// Frequency table for n-grams of one order.
pub struct NgramPass {
    order: usize,
    prefixes: Option<HashSet<String>>,
    table: HashMap<String, NgramInfo>,
    hasher: DefaultHashBuilder,
}

impl NgramPass {
    /// `prefixes` is the promoted set from the previous pass; pass `None` for
    /// order 1, where every candidate is counted.
    pub fn new(order: usize, prefixes: Option<HashSet<String>>) -> Self {
        assert!(order >= 1, "pass order must be at least 1");
        assert!(
            order == 1 || prefixes.is_some(),
            "orders above 1 need a promoted prefix set"
        );
        Self {
            order,
            prefixes,
            table: HashMap::new(),
            hasher: DefaultHashBuilder::default(),
        }
    }

    pub fn order(&self) -> usize {
        self.order
    }

    /// Tally every surviving order-N n-gram of every Bio.
    pub fn scan(&mut self, bios: &[Bio], arena: &TextArena) {
        for (i, bio) in bios.iter().enumerate() {
            if (i + 1) % 1_000_000 == 0 {
                info!("pass {}: {}M records scanned", self.order, (i + 1) / 1_000_000);
            }

            for ngram in bio.ngrams(self.order) {
                if let Some(prefixes) = &self.prefixes {
                    let keep = ngram.prefix().is_some_and(|p| prefixes.contains(p));
                    if !keep {
                        continue;
                    }
                }

                let span = ngram.span();
                let hash = self.hasher.hash_one(arena.text(span).as_bytes());
                let info = self.table.entry(ngram.into_identity()).or_default();
                if bio.flag_a {
                    info.n_a += 1;
                }
                if bio.flag_b {
                    info.n_b += 1;
                }
                if bio.flag_a && bio.flag_b {
                    info.n_both += 1;
                }
                info.originals.increment(arena, span, hash);
            }
        }
    }

    /// Identities with enough support to seed the next pass.
    pub fn promoted(&self, min_count: u64) -> HashSet<String> {
        self.table
            .iter()
            .filter(|(_, info)| info.n_total() >= min_count)
            .map(|(identity, _)| identity.clone())
            .collect()
    }

    pub fn table(&self) -> &HashMap<String, NgramInfo> {
        &self.table
    }
}
