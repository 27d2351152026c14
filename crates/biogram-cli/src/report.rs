//! Turns a finished pass into the flat textual report.
//!
//! Per surviving n-gram:
//!
//! ```text
//! <n_a>\t<n_b>\t<n_both>\t<n_variants>\n
//! <count>\t<spelling>\n      (repeated, descending by count)
//! ```
//!
//! Spelling variants are folded for display only: variants whose casefolded
//! forms are equal are merged, and the spelling that was most frequent before
//! folding represents the merged group. Identity comparison is never affected.

use std::cmp::Ordering;
use std::io::{self, Write};

use biogram_stem::casefold;
use biogram_types::TextArena;

use crate::engine::{NgramInfo, NgramPass};

struct FoldedVariant {
    original: String,
    folded: String,
    n: u64,
}

impl FoldedVariant {
    /// Most-common first; equal counts order by folded form.
    fn cmp_for_output(&self, other: &Self) -> Ordering {
        other
            .n
            .cmp(&self.n)
            .then_with(|| self.folded.cmp(&other.folded))
    }
}

/// Write every surviving n-gram block of `pass`, identities in sorted order so
/// the report is deterministic.
pub fn write_report<W: Write>(
    out: &mut W,
    pass: &NgramPass,
    arena: &TextArena,
    min_count: u64,
) -> io::Result<usize> {
    let mut identities: Vec<&String> = pass.table().keys().collect();
    identities.sort();

    let mut written = 0usize;
    for identity in identities {
        if write_ngram_block(out, &pass.table()[identity], arena, min_count)? {
            written += 1;
        }
    }
    Ok(written)
}

/// Write one n-gram's header and spelling lines. Returns whether anything was
/// written: blocks below `min_count` support, or whose best merged variant is
/// below `min_count`, are skipped entirely.
pub fn write_ngram_block<W: Write>(
    out: &mut W,
    info: &NgramInfo,
    arena: &TextArena,
    min_count: u64,
) -> io::Result<bool> {
    if info.n_total() < min_count {
        return Ok(false);
    }

    // Variants with characters that would break line-oriented output are
    // dropped from the listing but still counted in n_variants.
    let mut variants: Vec<FoldedVariant> = info
        .originals
        .iter()
        .filter_map(|entry| {
            let text = arena.text(entry.span);
            if text.contains('\n') || text.contains('\t') {
                return None;
            }
            Some(FoldedVariant {
                original: text.to_string(),
                folded: casefold(text),
                n: u64::from(entry.n),
            })
        })
        .collect();

    // Sort by raw count before merging so that the most common original
    // spelling becomes the representative of its folded group (e.g. "LGBT"
    // wins over "lgbt" when it occurred more often).
    variants.sort_by(FoldedVariant::cmp_for_output);

    let mut merged: Vec<FoldedVariant> = Vec::with_capacity(variants.len());
    for variant in variants {
        match merged.iter_mut().find(|m| m.folded == variant.folded) {
            Some(existing) => existing.n += variant.n,
            None => merged.push(variant),
        }
    }

    merged.sort_by(FoldedVariant::cmp_for_output);

    if merged.first().is_none_or(|top| top.n < min_count) {
        return Ok(false);
    }

    writeln!(
        out,
        "{}\t{}\t{}\t{}",
        info.n_a,
        info.n_b,
        info.n_both,
        info.n_variants()
    )?;
    for variant in &merged {
        if variant.n < min_count {
            break;
        }
        writeln!(out, "{}\t{}", variant.n, variant.original)?;
    }

    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::NgramPass;
    use biogram_types::{Bio, TextArena, Unigram};

    fn bio_of(arena: &mut TextArena, flag_a: bool, flag_b: bool, word: &str) -> Bio {
        let span = arena.push(word);
        Bio::new(
            flag_a,
            flag_b,
            vec![Unigram {
                stem: word.to_ascii_lowercase(),
                span,
            }],
        )
    }

    fn scan(records: &[(bool, bool, &str)]) -> (NgramPass, TextArena) {
        let mut arena = TextArena::new();
        let bios: Vec<Bio> = records
            .iter()
            .map(|&(a, b, w)| bio_of(&mut arena, a, b, w))
            .collect();
        let mut pass = NgramPass::new(1, None);
        pass.scan(&bios, &arena);
        (pass, arena)
    }

    fn render(pass: &NgramPass, arena: &TextArena, min_count: u64) -> String {
        let mut out = Vec::new();
        write_report(&mut out, pass, arena, min_count).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn merges_folded_variants_and_keeps_dominant_spelling() {
        let (pass, arena) = scan(&[
            (true, false, "LGBT"),
            (true, false, "LGBT"),
            (false, true, "lgbt"),
        ]);
        let report = render(&pass, &arena, 1);
        // Header: n_a=2, n_b=1, n_both=0, 2 raw variants; one merged line
        // representing both spellings, fronted by the more common "LGBT".
        assert_eq!(report, "2\t1\t0\t2\n3\tLGBT\n");
    }

    #[test]
    fn skips_blocks_below_min_count() {
        let (pass, arena) = scan(&[(true, false, "rare")]);
        assert_eq!(render(&pass, &arena, 2), "");
    }

    #[test]
    fn stops_listing_below_min_count_but_header_counts_all() {
        let (pass, arena) = scan(&[
            (true, false, "word"),
            (true, false, "word"),
            (false, true, "Word!"),
        ]);
        let report = render(&pass, &arena, 2);
        // The helper lowercases raw words into stems, so "Word!" is its own
        // identity with n_total 1 and is skipped; "word" prints one line.
        assert_eq!(report, "2\t0\t0\t1\n2\tword\n");
    }

    #[test]
    fn control_characters_hide_variants_but_count_them() {
        let mut arena = TextArena::new();
        let bios = vec![
            bio_of(&mut arena, true, false, "ok"),
            // Same stem, but the raw spelling embeds a tab.
            {
                let span = arena.push("o\tk");
                Bio::new(
                    true,
                    false,
                    vec![Unigram {
                        stem: "ok".to_string(),
                        span,
                    }],
                )
            },
        ];
        let mut pass = NgramPass::new(1, None);
        pass.scan(&bios, &arena);

        let report = render(&pass, &arena, 1);
        // n_variants counts both spellings; only the clean one is listed.
        assert_eq!(report, "2\t0\t0\t2\n1\tok\n");
    }

    #[test]
    fn ties_order_by_folded_form() {
        let (pass, arena) = scan(&[
            (true, false, "zzz"),
            (true, false, "zzz"),
            (true, false, "aaa"),
            (true, false, "aaa"),
        ]);
        let report = render(&pass, &arena, 1);
        let blocks: Vec<&str> = report.lines().collect();
        // Identities dump in sorted order: "aaa" block then "zzz" block.
        assert_eq!(blocks, vec!["2\t0\t0\t1", "2\taaa", "2\t0\t0\t1", "2\tzzz"]);
    }
}
