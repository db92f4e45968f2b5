use std::collections::{HashMap, HashSet};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, info, trace};

use crate::error::{Error, Result};
use crate::reader::{EOS, WordReader};

/// Live entries allowed while scanning a corpus before `reduce` kicks in
/// (0.7 of a 30M hash table in the classic tool).
pub const DEFAULT_MAX_VOCAB: usize = 21_000_000;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct VocabEntry {
    pub word: String,
    pub count: u64,
}

/// Mutable, word-keyed vocabulary used while counting. Ids are not stable
/// until [`VocabBuilder::build`] freezes it into a [`Vocab`].
pub struct VocabBuilder {
    entries: Vec<VocabEntry>,
    index: HashMap<String, usize>,
    train_words: u64,
    min_reduce: u64,
    max_size: usize,
    sentinel: bool,
}

impl Default for VocabBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl VocabBuilder {
    /// A builder whose first entry is the sentence-boundary sentinel.
    pub fn new() -> Self {
        let mut builder = Self::without_sentinel();
        builder.sentinel = true;
        builder.index.insert(EOS.to_string(), 0);
        builder.entries.push(VocabEntry {
            word: EOS.to_string(),
            count: 0,
        });
        builder
    }

    /// A builder for symbol tables that have no sentinel, such as features.
    pub fn without_sentinel() -> Self {
        VocabBuilder {
            entries: Vec::with_capacity(1000),
            index: HashMap::new(),
            train_words: 0,
            min_reduce: 2,
            max_size: DEFAULT_MAX_VOCAB,
            sentinel: false,
        }
    }

    pub fn with_max_size(mut self, max_size: usize) -> Self {
        self.max_size = max_size;
        self
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Running total of counted tokens, less whatever `reduce` discarded.
    pub fn train_words(&self) -> u64 {
        self.train_words
    }

    pub fn count(&self, word: &str) -> Option<u64> {
        self.index.get(word).map(|&i| self.entries[i].count)
    }

    pub fn add_word(&mut self, word: &str) {
        self.add_count(word, 1);
    }

    /// Adds `n` occurrences of `word`, creating the entry on first sight.
    pub fn add_count(&mut self, word: &str, n: u64) {
        match self.index.get(word) {
            Some(&i) => self.entries[i].count += n,
            None => {
                self.index.insert(word.to_string(), self.entries.len());
                self.entries.push(VocabEntry {
                    word: word.to_string(),
                    count: n,
                });
            }
        }
        self.train_words += n;

        if self.entries.len() > self.max_size {
            self.reduce();
        }
    }

    /// Drops every entry below the current reduce floor, then raises the floor,
    /// so that repeated calls prune progressively harder.
    pub fn reduce(&mut self) {
        let floor = self.min_reduce;
        let keep_first = self.sentinel;
        let before = self.entries.len();
        let mut removed = 0;
        let mut pos = 0;
        self.entries.retain(|e| {
            let keep = (keep_first && pos == 0) || e.count >= floor;
            if !keep {
                removed += e.count;
            }
            pos += 1;
            keep
        });
        self.train_words -= removed;
        self.reindex();
        self.min_reduce += 1;
        debug!(
            "reduced vocabulary from {before} to {} entries (floor {floor})",
            self.entries.len()
        );
    }

    fn reindex(&mut self) {
        self.index.clear();
        for (i, e) in self.entries.iter().enumerate() {
            self.index.insert(e.word.clone(), i);
        }
    }

    /// Freezes the builder: drops entries below `min_count` (the sentinel is
    /// exempt), sorts by descending count with ties broken by descending
    /// word, and assigns ids in that order with the sentinel at 0.
    pub fn build(self, min_count: u64) -> Vocab {
        let mut entries = self.entries;
        let sentinel = if self.sentinel {
            Some(entries.remove(0))
        } else {
            None
        };

        entries.retain(|e| e.count >= min_count);
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| b.word.cmp(&a.word)));

        let has_sentinel = sentinel.is_some();
        if let Some(s) = sentinel {
            entries.insert(0, s);
        }
        Vocab::from_entries(entries, has_sentinel)
    }
}

/// Frozen, id-indexed vocabulary. Read-only once training starts.
#[derive(Clone, Debug)]
pub struct Vocab {
    entries: Vec<VocabEntry>,
    index: HashMap<String, usize>,
    train_words: u64,
    has_sentinel: bool,
}

impl Vocab {
    fn from_entries(entries: Vec<VocabEntry>, has_sentinel: bool) -> Self {
        let index = entries
            .iter()
            .enumerate()
            .map(|(i, e)| (e.word.clone(), i))
            .collect();
        let train_words = entries.iter().map(|e| e.count).sum();
        Vocab {
            entries,
            index,
            train_words,
            has_sentinel,
        }
    }

    /// Counts every token of the corpus at `path`.
    pub fn learn_from_corpus(path: &Path, min_count: u64) -> Result<Vocab> {
        let reader = WordReader::open(path, "training data")?;
        Vocab::learn_from_words(reader, min_count)
    }

    pub fn learn_from_words<I>(words: I, min_count: u64) -> Result<Vocab>
    where
        I: IntoIterator<Item = io::Result<String>>,
    {
        let mut builder = VocabBuilder::new();
        for word in words {
            builder.add_word(&word?);
            if builder.train_words() % 100_000 == 0 {
                trace!("{}K words counted", builder.train_words() / 1000);
            }
        }
        let vocab = builder.build(min_count);
        vocab.log_summary();
        Ok(vocab)
    }

    /// Reads a `word count` file such as one written by [`Vocab::save`].
    /// A word listed twice is a syntax error.
    pub fn read_from_file(path: &Path, min_count: u64) -> Result<Vocab> {
        let file = File::open(path).map_err(|e| Error::open("vocabulary", path, e))?;
        let mut builder = VocabBuilder::new();
        let mut seen = HashSet::new();

        for (line_num, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            let fields: Vec<&str> = line.split_whitespace().collect();
            if fields.is_empty() {
                continue;
            }
            if fields.len() != 2 {
                return Err(Error::VocabSyntax {
                    line: line_num + 1,
                    reason: format!("expected 'word count', found {} fields", fields.len()),
                });
            }
            let count = fields[1].parse::<u64>().map_err(|e| Error::VocabSyntax {
                line: line_num + 1,
                reason: format!("bad count '{}': {e}", fields[1]),
            })?;
            if !seen.insert(fields[0].to_string()) {
                return Err(Error::VocabSyntax {
                    line: line_num + 1,
                    reason: format!("'{}' is listed more than once", fields[0]),
                });
            }
            builder.add_count(fields[0], count);
        }

        let vocab = builder.build(min_count);
        vocab.log_summary();
        Ok(vocab)
    }

    /// Writes `word count` lines in id order.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).map_err(|e| Error::open("vocabulary output", path, e))?;
        let mut fo = BufWriter::new(file);
        for e in &self.entries {
            writeln!(fo, "{} {}", e.word, e.count)?;
        }
        fo.flush()?;
        Ok(())
    }

    fn log_summary(&self) {
        info!("Vocab size: {}", self.len());
        info!("Words in train file: {}", self.train_words);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn has_sentinel(&self) -> bool {
        self.has_sentinel
    }

    /// Id of the first entry that is not the sentinel.
    pub fn first_word_id(&self) -> usize {
        usize::from(self.has_sentinel)
    }

    /// Number of entries other than the sentinel.
    pub fn num_words(&self) -> usize {
        self.len() - self.first_word_id()
    }

    /// Sum of all surviving counts.
    pub fn train_words(&self) -> u64 {
        self.train_words
    }

    pub fn lookup(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    pub fn word(&self, id: usize) -> &str {
        &self.entries[id].word
    }

    pub fn count(&self, id: usize) -> u64 {
        self.entries[id].count
    }

    pub fn entries(&self) -> &[VocabEntry] {
        &self.entries
    }

    /// Entries in id order.
    pub fn iter(&self) -> impl Iterator<Item = &VocabEntry> {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn learn(text: &str, min_count: u64) -> Vocab {
        Vocab::learn_from_words(WordReader::new(Cursor::new(text.as_bytes().to_vec())), min_count)
            .unwrap()
    }

    fn pairs(vocab: &Vocab) -> Vec<(&str, u64)> {
        vocab.iter().map(|e| (e.word.as_str(), e.count)).collect()
    }

    #[test]
    fn counts_sorts_and_breaks_ties() {
        let vocab = learn("the quick fox the lazy fox\n", 1);
        assert_eq!(
            pairs(&vocab),
            vec![("</s>", 1), ("the", 2), ("fox", 2), ("quick", 1), ("lazy", 1)]
        );
        assert_eq!(vocab.lookup("fox"), Some(2));
        assert_eq!(vocab.lookup("cat"), None);
        assert_eq!(vocab.train_words(), 7);
    }

    #[test]
    fn sort_is_deterministic() {
        let text = "b a c d a b c d e f e f g\nh g\n";
        let first = pairs(&learn(text, 1))
            .into_iter()
            .map(|(w, c)| (w.to_string(), c))
            .collect::<Vec<_>>();
        for _ in 0..5 {
            let again = learn(text, 1);
            let again = pairs(&again)
                .into_iter()
                .map(|(w, c)| (w.to_string(), c))
                .collect::<Vec<_>>();
            assert_eq!(first, again);
        }
    }

    #[test]
    fn sentinel_stays_at_zero_even_when_rare() {
        let vocab = learn("a a a a b b b c c\n", 1);
        assert_eq!(vocab.word(0), EOS);
        assert_eq!(vocab.count(0), 1);
        assert_eq!(vocab.word(1), "a");
    }

    #[test]
    fn min_count_filter_and_conservation() {
        let vocab = learn("a a a b b c\nd\n", 2);
        assert_eq!(pairs(&vocab), vec![("</s>", 2), ("a", 3), ("b", 2)]);
        let sum: u64 = vocab.iter().map(|e| e.count).sum();
        assert_eq!(vocab.train_words(), sum);
        assert_eq!(vocab.num_words(), 2);
    }

    #[test]
    fn empty_corpus_leaves_only_sentinel() {
        let vocab = learn("", 1);
        assert_eq!(pairs(&vocab), vec![("</s>", 0)]);
        assert_eq!(vocab.train_words(), 0);
    }

    #[test]
    fn min_count_above_everything_leaves_only_sentinel() {
        let vocab = learn("x y z\n", 10);
        assert_eq!(vocab.len(), 1);
        assert_eq!(vocab.word(0), EOS);
    }

    #[test]
    fn reduce_raises_floor_each_time() {
        let mut builder = VocabBuilder::new();
        for w in ["a", "a", "a", "b", "b", "c"] {
            builder.add_word(w);
        }
        builder.reduce();
        assert_eq!(builder.count("c"), None);
        assert_eq!(builder.count("b"), Some(2));
        assert_eq!(builder.count(EOS), Some(0));
        assert_eq!(builder.train_words(), 5);

        builder.reduce();
        assert_eq!(builder.count("b"), None);
        assert_eq!(builder.count("a"), Some(3));
        assert_eq!(builder.train_words(), 3);
    }

    #[test]
    fn size_cap_triggers_reduce() {
        let mut builder = VocabBuilder::new().with_max_size(3);
        for w in ["a", "a", "b", "c"] {
            builder.add_word(w);
        }
        // adding "c" made four entries; singletons b and c are gone
        assert_eq!(builder.len(), 2);
        assert_eq!(builder.count("a"), Some(2));
    }

    #[test]
    fn save_then_read_round_trips() {
        let vocab = learn("one two two three three three\nfour four four four\n", 1);
        let file = tempfile::NamedTempFile::new().unwrap();
        vocab.save(file.path()).unwrap();
        let back = Vocab::read_from_file(file.path(), 1).unwrap();
        assert_eq!(pairs(&vocab), pairs(&back));
        assert_eq!(vocab.train_words(), back.train_words());
    }

    #[test]
    fn read_inserts_missing_sentinel() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cat 4\n\ndog 9").unwrap();
        let vocab = Vocab::read_from_file(file.path(), 1).unwrap();
        assert_eq!(pairs(&vocab), vec![("</s>", 0), ("dog", 9), ("cat", 4)]);
    }

    #[test]
    fn read_rejects_repeated_words() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "</s> 3\ncat 4\ndog 2\ncat 1").unwrap();
        match Vocab::read_from_file(file.path(), 1) {
            Err(Error::VocabSyntax { line, reason }) => {
                assert_eq!(line, 4);
                assert!(reason.contains("cat"));
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn read_rejects_bad_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cat 4\ndog\n").unwrap();
        match Vocab::read_from_file(file.path(), 1) {
            Err(Error::VocabSyntax { line, .. }) => assert_eq!(line, 2),
            other => panic!("unexpected result {other:?}"),
        }

        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cat many").unwrap();
        assert!(matches!(
            Vocab::read_from_file(file.path(), 1),
            Err(Error::VocabSyntax { line: 1, .. })
        ));
    }

    #[test]
    fn missing_files_are_open_errors() {
        let err = Vocab::read_from_file(Path::new("/nonexistent/vocab.txt"), 1).unwrap_err();
        assert!(matches!(err, Error::Open { role: "vocabulary", .. }));
        let err = Vocab::learn_from_corpus(Path::new("/nonexistent/corpus.txt"), 1).unwrap_err();
        assert!(matches!(err, Error::Open { .. }));
    }

    #[test]
    fn builder_without_sentinel() {
        let mut builder = VocabBuilder::without_sentinel();
        builder.add_count("NN", 3);
        builder.add_count("VB", 5);
        let vocab = builder.build(1);
        assert!(!vocab.has_sentinel());
        assert_eq!(vocab.first_word_id(), 0);
        assert_eq!(vocab.word(0), "VB");
        assert_eq!(vocab.train_words(), 8);
    }
}
