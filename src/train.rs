//! Parallel skip-gram training with negative sampling.
//!
//! Each worker scans its own byte range of the corpus (`file_size / threads`
//! bytes from `id * file_size / threads`) for the configured number of epochs
//! and applies SGD updates straight into the shared matrices. There are no
//! locks anywhere on this path. Workers share the matrices, a word counter
//! and the learning rate, and they race on all three (Hogwild!). Lost
//! updates are accepted noise, so results are not reproducible across runs
//! with more than one thread.

use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;
use std::time::Instant;

use log::{debug, info};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::config::Config;
use crate::embeddings::{Embeddings, Real};
use crate::error::{Error, Result};
use crate::exp_table::ExpTable;
use crate::features::{FeatureMode, Features, split_annotation};
use crate::reader::{EOS, WordReader};
use crate::unigram::UnigramTable;
use crate::vocab::Vocab;

/// Words a worker processes between updates of the shared progress.
pub const REPORT_INTERVAL: u64 = 10_000;

/// The learning rate never drops below this fraction of its starting value.
pub const MIN_ALPHA_FRACTION: f32 = 1e-4;

/// Words processed so far by all workers, and the learning rate derived
/// from it.
pub struct Progress {
    words_processed: AtomicU64,
    alpha: Real,
    starting_alpha: f32,
    total: u64,
    start: Instant,
}

impl Progress {
    pub fn new(starting_alpha: f32, epochs: usize, train_words: u64) -> Self {
        Progress {
            words_processed: AtomicU64::new(0),
            alpha: Real::new(starting_alpha),
            starting_alpha,
            total: epochs as u64 * train_words + 1,
            start: Instant::now(),
        }
    }

    pub fn alpha(&self) -> f32 {
        self.alpha.get()
    }

    pub fn words_processed(&self) -> u64 {
        self.words_processed.load(Ordering::Relaxed)
    }

    /// Fraction of the planned `epochs * train_words` processed so far.
    pub fn fraction_done(&self) -> f32 {
        self.words_processed() as f32 / self.total as f32
    }

    /// Adds a worker's words to the shared count and lowers the learning rate
    /// to match. Racing workers may publish rates out of order; taking the
    /// minimum keeps the schedule from ever going back up.
    pub fn advance(&self, words: u64) {
        let done = self.words_processed.fetch_add(words, Ordering::Relaxed) + words;
        let rate = self.starting_alpha * (1.0 - done as f32 / self.total as f32);
        self.alpha
            .lower_to(rate.max(self.starting_alpha * MIN_ALPHA_FRACTION));
    }
}

/// Everything the workers share. Built once, then borrowed by every thread.
pub struct Trainer<'a> {
    config: &'a Config,
    vocab: &'a Vocab,
    features: Option<&'a Features>,
    embeddings: &'a Embeddings,
    word_table: Option<UnigramTable>,
    feature_table: Option<UnigramTable>,
    exp_table: ExpTable,
    progress: Progress,
    file_size: u64,
}

impl<'a> Trainer<'a> {
    /// Builds the negative-sampling tables (only when `negative > 0`).
    /// `embeddings` must hold a row for every word followed by a row for
    /// every feature.
    pub fn new(
        config: &'a Config,
        vocab: &'a Vocab,
        features: Option<&'a Features>,
        embeddings: &'a Embeddings,
        file_size: u64,
    ) -> Result<Self> {
        config.validate()?;
        config.validate_corpus(vocab)?;
        if config.feature_mode != FeatureMode::None && features.is_none() {
            return Err(Error::config("feature mode enabled without features"));
        }

        let rows = vocab.len() + features.map_or(0, Features::len);
        if embeddings.rows() != rows || embeddings.dims() != config.dims {
            return Err(Error::config(format!(
                "embedding matrices are {}x{}, expected {rows}x{}",
                embeddings.rows(),
                embeddings.dims(),
                config.dims
            )));
        }

        let (word_table, feature_table) = if config.negative > 0 {
            let words = UnigramTable::from_vocab(vocab, config.table_size)?;
            let feats = features
                .map(|f| UnigramTable::from_vocab(f.vocab(), config.table_size))
                .transpose()?;
            (Some(words), feats)
        } else {
            (None, None)
        };

        Ok(Trainer {
            config,
            vocab,
            features,
            embeddings,
            word_table,
            feature_table,
            exp_table: ExpTable::new(),
            progress: Progress::new(config.alpha, config.epochs, vocab.train_words()),
            file_size,
        })
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Runs all workers to completion. Every worker is joined before the
    /// first error, if any, is returned.
    pub fn train(&self) -> Result<()> {
        info!(
            "Starting training using file {} ({} threads, {} epochs)",
            self.config.train_file.display(),
            self.config.num_threads,
            self.config.epochs
        );
        let start = Instant::now();

        let results = thread::scope(|s| {
            let handles = (0..self.config.num_threads)
                .map(|id| s.spawn(move || self.train_thread(id)))
                .collect::<Vec<_>>();

            handles
                .into_iter()
                .enumerate()
                .map(|(id, handle)| match handle.join() {
                    Ok(result) => result,
                    Err(_) => Err(Error::WorkerPanic(id)),
                })
                .collect::<Vec<_>>()
        });
        results.into_iter().collect::<Result<Vec<()>>>()?;

        info!(
            "Training finished: {} words in {:.1}s, final alpha {:.6}",
            self.progress.words_processed(),
            start.elapsed().as_secs_f64(),
            self.progress.alpha()
        );
        Ok(())
    }

    /// Maps a corpus token to its word id and, for annotated corpora, its
    /// feature id.
    fn resolve(&self, token: &str) -> Result<(Option<usize>, Option<usize>)> {
        match (self.config.feature_mode, self.features) {
            (FeatureMode::Sequential, Some(features)) if token != EOS => {
                let (word, tag) = split_annotation(token)?;
                Ok((self.vocab.lookup(word), features.lookup(tag)))
            }
            _ => Ok((self.vocab.lookup(token), None)),
        }
    }

    fn report(&self, id: usize, words: u64) {
        self.progress.advance(words);
        if id == 0 {
            let done = self.progress.words_processed();
            debug!(
                "Alpha: {:.6}  Progress: {:.2}%  Words/thread/sec: {:.2}k",
                self.progress.alpha(),
                self.progress.fraction_done() * 100.0,
                done as f64
                    / self.config.num_threads as f64
                    / (self.progress.start.elapsed().as_secs_f64() + 1e-9)
                    / 1000.0
            );
        }
    }

    fn train_thread(&self, id: usize) -> Result<()> {
        let cfg = self.config;
        let window = cfg.window;
        let train_words = self.vocab.train_words();
        let words_per_thread = train_words / cfg.num_threads as u64;
        let sample_k = cfg.sample * train_words as f32;
        let start = self.file_size / cfg.num_threads as u64 * id as u64;

        let mut rng = StdRng::seed_from_u64(id as u64);
        let mut reader = WordReader::open(&cfg.train_file, "training data")?;
        reader.seek_to(start)?;

        let mut neu1e = vec![0.0f32; cfg.dims];
        let mut sen: Vec<usize> = Vec::with_capacity(cfg.max_sentence_len);
        let mut sen_features: Vec<Option<usize>> = Vec::with_capacity(cfg.max_sentence_len);
        let mut sentence_position = 0;
        let mut word_count: u64 = 0;
        let mut last_word_count: u64 = 0;
        let mut epochs_left = cfg.epochs;

        loop {
            if word_count - last_word_count > REPORT_INTERVAL {
                self.report(id, word_count - last_word_count);
                last_word_count = word_count;
            }

            let mut at_end = false;
            if sen.is_empty() {
                loop {
                    let Some(token) = reader.read_word()? else {
                        at_end = true;
                        break;
                    };
                    let (word, feature) = self.resolve(&token)?;
                    let Some(word) = word else {
                        continue;
                    };
                    word_count += 1;
                    if word == 0 {
                        break;
                    }

                    if cfg.sample > 0.0
                        && keep_probability(self.vocab.count(word), sample_k) < rng.random::<f32>()
                    {
                        continue;
                    }
                    sen.push(word);
                    sen_features.push(feature);
                    if sen.len() >= cfg.max_sentence_len {
                        break;
                    }
                }
                sentence_position = 0;
            }

            if at_end || word_count > words_per_thread {
                self.report(id, word_count - last_word_count);
                epochs_left -= 1;
                if epochs_left == 0 {
                    break;
                }
                word_count = 0;
                last_word_count = 0;
                sen.clear();
                sen_features.clear();
                reader.seek_to(start)?;
                continue;
            }

            // blank line, or every word subsampled away
            if sen.is_empty() {
                continue;
            }

            let center = sen[sentence_position];

            let b = rng.random_range(0..window);
            for a in b..(window * 2 + 1 - b) {
                if a == window {
                    continue;
                }
                let Some(c) = (sentence_position + a).checked_sub(window) else {
                    continue;
                };
                if c >= sen.len() {
                    continue;
                }
                let l1 = self.embeddings.input_row(sen[c]);
                neu1e.fill(0.0);
                self.negative_sampling(l1, center, self.word_table.as_ref(), 0, &mut rng, &mut neu1e);
                apply(l1, &neu1e);
            }

            self.predict_features(center, sen_features[sentence_position], &mut rng, &mut neu1e);

            sentence_position += 1;
            if sentence_position >= sen.len() {
                sen.clear();
                sen_features.clear();
            }
        }

        Ok(())
    }

    /// Trains the center word's input vector to also predict its features.
    fn predict_features(
        &self,
        center: usize,
        tagged: Option<usize>,
        rng: &mut StdRng,
        neu1e: &mut [f32],
    ) {
        let Some(features) = self.features else {
            return;
        };
        let offset = self.vocab.len();
        let table = self.feature_table.as_ref();
        let l1 = self.embeddings.input_row(center);

        match self.config.feature_mode {
            FeatureMode::None => {}
            FeatureMode::Sequential => {
                if let Some(feature) = tagged {
                    neu1e.fill(0.0);
                    self.negative_sampling(l1, offset + feature, table, offset, rng, neu1e);
                    apply(l1, neu1e);
                }
            }
            FeatureMode::Knowledge => {
                let linked = features.features_of(center);
                if !linked.is_empty() {
                    neu1e.fill(0.0);
                    for &feature in linked {
                        self.negative_sampling(
                            l1,
                            offset + feature as usize,
                            table,
                            offset,
                            rng,
                            neu1e,
                        );
                    }
                    apply(l1, neu1e);
                }
            }
        }
    }

    /// One positive update towards output row `target` and `negative`
    /// updates towards rows drawn from `table` (shifted by `offset`), all
    /// against input vector `l1`. A draw equal to `target` is skipped.
    /// Output rows are updated immediately; the error for `l1` accumulates
    /// in `neu1e`. The step size is the shared learning rate as it stands
    /// now, whichever worker last lowered it.
    fn negative_sampling(
        &self,
        l1: &[Real],
        target: usize,
        table: Option<&UnigramTable>,
        offset: usize,
        rng: &mut StdRng,
        neu1e: &mut [f32],
    ) {
        let alpha = self.progress.alpha();
        for d in 0..=self.config.negative {
            let (row, label) = if d == 0 {
                (target, 1.0)
            } else {
                let Some(table) = table else {
                    break;
                };
                let row = offset + table.sample(rng);
                if row == target {
                    continue;
                }
                (row, 0.0)
            };

            let l2 = self.embeddings.output_row(row);
            let f: f32 = l1.iter().zip(l2).map(|(x, y)| x.get() * y.get()).sum();
            let g = (label - self.exp_table.apply(f)) * alpha;
            for (e, y) in neu1e.iter_mut().zip(l2) {
                *e += g * y.get();
            }
            for (y, x) in l2.iter().zip(l1) {
                y.add(g * x.get());
            }
        }
    }
}

/// Chance of keeping one occurrence of a word seen `count` times, where
/// `sample_k` is the sample threshold times the corpus size. At or above 1
/// for words rarer than the threshold.
#[inline]
pub(crate) fn keep_probability(count: u64, sample_k: f32) -> f32 {
    let f = count as f32;
    ((f / sample_k).sqrt() + 1.0) * sample_k / f
}

/// Adds an accumulated error into a shared row.
#[inline]
fn apply(row: &[Real], delta: &[f32]) {
    for (x, d) in row.iter().zip(delta) {
        x.add(*d);
    }
}
