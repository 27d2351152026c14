pub mod engine;
pub mod pipeline;
pub mod report;

pub use engine::{NgramInfo, NgramPass, OriginalTexts};
pub use pipeline::{BadRecordPolicy, Corpus, CorpusStats, read_corpus, run_passes};
