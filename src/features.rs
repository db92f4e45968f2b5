//! Auxiliary feature tokens (part-of-speech tags, senses, ...) that a word's
//! input vector is additionally trained to predict.
//!
//! Two sources are supported. In [`FeatureMode::Sequential`] every corpus
//! token carries its own tag, written `word(TAG)`; the tag `NULL` marks an
//! untagged occurrence. In [`FeatureMode::Knowledge`] a side file lists one
//! feature per line followed by its member words, and every occurrence of a
//! member predicts all features it belongs to.
//!
//! Feature ids are local to the feature vocabulary. In the embedding matrices
//! feature rows follow the word rows.

use std::path::Path;

use log::{info, warn};

use crate::error::{Error, Result};
use crate::reader::{EOS, WordReader};
use crate::vocab::{Vocab, VocabBuilder};

/// Tag meaning "this occurrence has no feature".
pub const NULL_FEATURE: &str = "NULL";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FeatureMode {
    #[default]
    None,
    Sequential,
    Knowledge,
}

impl TryFrom<u8> for FeatureMode {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        match code {
            0 => Ok(FeatureMode::None),
            1 => Ok(FeatureMode::Sequential),
            2 => Ok(FeatureMode::Knowledge),
            n => Err(Error::config(format!("unknown feature mode {n}"))),
        }
    }
}

/// Splits `word(TAG)` at the last `(`. Anything else is malformed.
pub fn split_annotation(token: &str) -> Result<(&str, &str)> {
    let malformed = || Error::MalformedAnnotation(token.to_string());
    let open = token.rfind('(').ok_or_else(malformed)?;
    let inner = token[open + 1..].strip_suffix(')').ok_or_else(malformed)?;
    let word = &token[..open];
    if word.is_empty() || inner.is_empty() {
        return Err(malformed());
    }
    Ok((word, inner))
}

/// Counts words and tags of an annotated corpus, returning the word and the
/// feature vocabularies.
pub fn learn_tagged_corpus(path: &Path, min_count: u64) -> Result<(Vocab, Vocab)> {
    let reader = WordReader::open(path, "training data")?;
    let mut words = VocabBuilder::new();
    let mut tags = VocabBuilder::without_sentinel();

    for token in reader {
        let token = token?;
        if token == EOS {
            words.add_word(EOS);
            continue;
        }
        let (word, tag) = split_annotation(&token)?;
        words.add_word(word);
        if tag != NULL_FEATURE {
            tags.add_word(tag);
        }
    }

    let words = words.build(min_count);
    let tags = tags.build(min_count);
    info!("Vocab size: {}", words.len());
    info!("Words in train file: {}", words.train_words());
    info!("Features: {}", tags.len());
    Ok((words, tags))
}

/// Word id to feature ids, stored as offsets into one flat array.
#[derive(Debug)]
pub struct FeatureLinks {
    offsets: Vec<usize>,
    features: Vec<u32>,
}

impl FeatureLinks {
    fn from_lists(lists: Vec<Vec<u32>>) -> Self {
        let mut offsets = Vec::with_capacity(lists.len() + 1);
        let mut features = Vec::new();
        offsets.push(0);
        for list in lists {
            features.extend(list);
            offsets.push(features.len());
        }
        FeatureLinks { offsets, features }
    }

    pub fn features_of(&self, word: usize) -> &[u32] {
        match (self.offsets.get(word), self.offsets.get(word + 1)) {
            (Some(&start), Some(&end)) => &self.features[start..end],
            _ => &[],
        }
    }

    /// Total number of word-feature links.
    pub fn len(&self) -> usize {
        self.features.len()
    }

    pub fn is_empty(&self) -> bool {
        self.features.is_empty()
    }
}

/// The feature vocabulary plus, in knowledge mode, the word-to-feature table.
pub struct Features {
    vocab: Vocab,
    links: Option<FeatureLinks>,
}

impl Features {
    /// Features of an annotated corpus. Links are carried by the corpus itself.
    pub fn sequential(vocab: Vocab) -> Result<Self> {
        Self::checked(Features { vocab, links: None })
    }

    /// Reads a knowledge file of `FEATURE member member ...` lines.
    ///
    /// A feature's count is the sum of its members' counts; a line naming
    /// fewer than two known words counts zero and is pruned by `min_count`.
    pub fn from_knowledge_file(path: &Path, words: &Vocab, min_count: u64) -> Result<Self> {
        let mut groups: Vec<Vec<String>> = Vec::new();
        let mut current: Vec<String> = Vec::new();
        for token in WordReader::open(path, "knowledge")? {
            let token = token?;
            if token == EOS {
                if !current.is_empty() {
                    groups.push(std::mem::take(&mut current));
                }
            } else {
                current.push(token);
            }
        }
        if !current.is_empty() {
            groups.push(current);
        }

        let members = |group: &[String]| -> Vec<usize> {
            group[1..]
                .iter()
                .filter_map(|w| words.lookup(w))
                .filter(|&id| id != 0)
                .collect()
        };

        let mut builder = VocabBuilder::without_sentinel();
        for group in &groups {
            let known = members(group);
            let count = if known.len() >= 2 {
                known.iter().map(|&id| words.count(id)).sum()
            } else {
                0
            };
            builder.add_count(&group[0], count);
        }
        let vocab = builder.build(min_count);

        let mut lists: Vec<Vec<u32>> = vec![Vec::new(); words.len()];
        for group in &groups {
            let Some(feature) = vocab.lookup(&group[0]) else {
                continue;
            };
            for id in members(group) {
                let list = &mut lists[id];
                if !list.contains(&(feature as u32)) {
                    list.push(feature as u32);
                }
            }
        }
        let links = FeatureLinks::from_lists(lists);

        info!(
            "Features: {} ({} word links from {} lines)",
            vocab.len(),
            links.len(),
            groups.len()
        );
        Self::checked(Features {
            vocab,
            links: Some(links),
        })
    }

    fn checked(features: Features) -> Result<Self> {
        if features.vocab.train_words() == 0 {
            return Err(Error::config("feature mode enabled but no usable features found"));
        }
        if features.links.as_ref().is_some_and(|l| l.is_empty()) {
            warn!("no vocabulary word is linked to any feature");
        }
        Ok(features)
    }

    pub fn vocab(&self) -> &Vocab {
        &self.vocab
    }

    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }

    /// Feature id of a tag, if known. `NULL` is never known.
    pub fn lookup(&self, tag: &str) -> Option<usize> {
        self.vocab.lookup(tag)
    }

    /// Knowledge-mode features of a word; empty in sequential mode.
    pub fn features_of(&self, word: usize) -> &[u32] {
        self.links
            .as_ref()
            .map_or(&[][..], |links| links.features_of(word))
    }
}
