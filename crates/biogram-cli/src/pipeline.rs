//! End-to-end run: parse the record stream into Bios once, then mine passes
//! of increasing order, promoting surviving prefixes between passes.
//!
//! The whole corpus of Bios (and the arena backing their spans) stays in
//! memory from the first pass to the last. Tokenizing and stemming are by far
//! the most expensive per-record work, so doing them once and reusing the
//! result across every pass is the deliberate trade: memory proportional to
//! corpus size, in exchange for not re-running the normalizer K times.

use std::io::Write;
use std::str;

use anyhow::{Context, Result};
use hashbrown::HashSet;
use tracing::{info, warn};

use biogram_csv::{ByteSource, ReadError, RecordReader};
use biogram_stem::{Classifier, Tokenizer};
use biogram_types::{Bio, Span, TextArena, Unigram};

use crate::engine::NgramPass;
use crate::report;

/// What to do when a record fails to parse. The input format has no recovery
/// guarantees, so skipping is best-effort resynchronization at the next
/// newline; I/O errors abort regardless.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BadRecordPolicy {
    Abort,
    Skip,
}

/// Corpus-level tallies gathered while reading.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct CorpusStats {
    pub n_records: u64,
    pub n_a: u64,
    pub n_b: u64,
    pub n_both: u64,
    pub n_a_with_text: u64,
    pub n_b_with_text: u64,
    pub n_both_with_text: u64,
    pub n_skipped: u64,
}

impl CorpusStats {
    pub fn n_distinct(&self) -> u64 {
        self.n_a + self.n_b - self.n_both
    }

    pub fn n_distinct_with_text(&self) -> u64 {
        self.n_a_with_text + self.n_b_with_text - self.n_both_with_text
    }
}

/// Everything the pass engine needs, built in one sweep over the input.
pub struct Corpus {
    pub arena: TextArena,
    pub bios: Vec<Bio>,
    pub stats: CorpusStats,
}

/// Parse, tokenize, and stem the whole stream into a [`Corpus`].
///
/// Record text must be valid UTF-8; a violation is fatal to the run (there is
/// no per-record recovery below the parser). Malformed rows follow `policy`.
pub fn read_corpus<S: ByteSource>(
    reader: &mut RecordReader<S>,
    tokenizer: &Tokenizer,
    classifier: &Classifier,
    policy: BadRecordPolicy,
) -> Result<Corpus> {
    let mut arena = TextArena::new();
    let mut bios = Vec::new();
    let mut stats = CorpusStats::default();

    loop {
        let record = match reader.next_record() {
            Ok(Some(record)) => record,
            Ok(None) => break,
            Err(err @ ReadError::Io(_)) => {
                return Err(err).context("reading input");
            }
            Err(err) => match policy {
                BadRecordPolicy::Abort => {
                    return Err(err).context("malformed input record");
                }
                BadRecordPolicy::Skip => {
                    warn!("skipping malformed record: {err}");
                    stats.n_skipped += 1;
                    if !reader.skip_record().context("resyncing input")? {
                        break;
                    }
                    continue;
                }
            },
        };

        stats.n_records += 1;
        if record.flag_a {
            stats.n_a += 1;
        }
        if record.flag_b {
            stats.n_b += 1;
        }
        if record.flag_a && record.flag_b {
            stats.n_both += 1;
        }

        if record.text.is_empty() {
            continue;
        }

        if record.flag_a {
            stats.n_a_with_text += 1;
        }
        if record.flag_b {
            stats.n_b_with_text += 1;
        }
        if record.flag_a && record.flag_b {
            stats.n_both_with_text += 1;
        }

        let text = str::from_utf8(&record.text)
            .with_context(|| format!("record {}: text is not valid UTF-8", record.id))?;
        let base = arena.push(text);

        let mut unigrams = Vec::new();
        for range in tokenizer.tokenize(text) {
            if let Some(stem) = classifier.stem(&text[range.clone()]) {
                unigrams.push(Unigram {
                    stem,
                    span: Span {
                        start: base.start + range.start,
                        len: (range.end - range.start) as u32,
                    },
                });
            }
        }

        bios.push(Bio::new(record.flag_a, record.flag_b, unigrams));
        if bios.len() % 500_000 == 0 {
            info!("read {} records with text...", bios.len());
        }
    }

    info!(
        "corpus: {} records, {} flagged ({} with text), {} skipped; flag A {}, flag B {}, both {}",
        stats.n_records,
        stats.n_distinct(),
        stats.n_distinct_with_text(),
        stats.n_skipped,
        stats.n_a,
        stats.n_b,
        stats.n_both,
    );

    Ok(Corpus { arena, bios, stats })
}

/// Run passes 1..=`max_order`, dumping each pass's report section before the
/// next pass starts. The promoted set lives exactly one pass.
pub fn run_passes<W: Write>(
    corpus: &Corpus,
    max_order: usize,
    min_count: u64,
    out: &mut W,
) -> Result<()> {
    let mut promoted: Option<HashSet<String>> = None;

    for order in 1..=max_order {
        info!(
            "pass {order}: scanning {} records (min count {min_count})",
            corpus.bios.len()
        );
        let mut pass = NgramPass::new(order, promoted.take());
        pass.scan(&corpus.bios, &corpus.arena);
        info!("pass {order}: {} distinct n-grams", pass.table().len());

        let written = report::write_report(out, &pass, &corpus.arena, min_count)
            .with_context(|| format!("writing pass {order} report"))?;
        info!("pass {order}: {written} n-grams reported");

        if order < max_order {
            let next = pass.promoted(min_count);
            info!("pass {order}: promoted {} prefixes", next.len());
            promoted = Some(next);
        }
    }

    Ok(())
}
