use std::path::PathBuf;

use crate::error::{Error, Result};
use crate::features::FeatureMode;
use crate::unigram::DEFAULT_TABLE_SIZE;
use crate::vocab::Vocab;

/// Everything the vocabulary, training and writing stages need, owned by the
/// caller and passed down by reference.
#[derive(Debug, Clone)]
pub struct Config {
    pub train_file: PathBuf,
    /// No vectors are trained when this is `None`; only the vocabulary is built.
    pub output_file: Option<PathBuf>,
    /// Also dump the output (context) matrix, features included.
    pub context_file: Option<PathBuf>,
    pub save_vocab_file: Option<PathBuf>,
    pub read_vocab_file: Option<PathBuf>,
    pub knowledge_file: Option<PathBuf>,
    pub feature_mode: FeatureMode,
    pub binary: bool,

    pub dims: usize,
    pub window: usize,
    pub sample: f32,
    pub negative: usize,
    pub num_threads: usize,
    pub epochs: usize,
    pub min_count: u64,
    pub alpha: f32,
    pub table_size: usize,
    pub max_sentence_len: usize,
    /// Seed for the input-matrix initialisation. Worker `i` always uses seed `i`.
    pub seed: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            train_file: PathBuf::new(),
            output_file: None,
            context_file: None,
            save_vocab_file: None,
            read_vocab_file: None,
            knowledge_file: None,
            feature_mode: FeatureMode::None,
            binary: false,
            dims: 100,
            window: 5,
            sample: 1e-3,
            negative: 5,
            num_threads: 12,
            epochs: 5,
            min_count: 5,
            alpha: 0.025,
            table_size: DEFAULT_TABLE_SIZE,
            max_sentence_len: 1000,
            seed: 0,
        }
    }
}

impl Config {
    /// Checks the hyperparameters before any file is touched.
    pub fn validate(&self) -> Result<()> {
        if self.dims == 0 {
            return Err(Error::config("embedding dimension must be positive"));
        }
        if self.num_threads == 0 {
            return Err(Error::config("thread count must be positive"));
        }
        if self.epochs == 0 {
            return Err(Error::config("epoch count must be positive"));
        }
        if self.window == 0 {
            return Err(Error::config("window must be positive"));
        }
        if !(self.alpha > 0.0 && self.alpha.is_finite()) {
            return Err(Error::config(format!("learning rate {} must be positive", self.alpha)));
        }
        if !(self.sample >= 0.0 && self.sample.is_finite()) {
            return Err(Error::config(format!("sample threshold {} must not be negative", self.sample)));
        }
        if self.table_size == 0 {
            return Err(Error::config("unigram table size must be positive"));
        }
        if self.max_sentence_len == 0 {
            return Err(Error::config("maximum sentence length must be positive"));
        }
        if self.feature_mode == FeatureMode::Knowledge && self.knowledge_file.is_none() {
            return Err(Error::config("knowledge feature mode needs a knowledge file"));
        }
        Ok(())
    }

    /// Checks what can only be known once the vocabulary exists: training
    /// over zero words would divide by zero in the learning-rate schedule and
    /// the subsampling formula.
    pub fn validate_corpus(&self, vocab: &Vocab) -> Result<()> {
        if vocab.train_words() == 0 {
            return Err(Error::config("training corpus contains no words"));
        }
        if vocab.num_words() == 0 {
            return Err(Error::config(format!(
                "no word occurs at least {} times; nothing to train",
                self.min_count
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        Config::default().validate().unwrap();
    }

    #[test]
    fn rejects_degenerate_settings() {
        let cases: Vec<Box<dyn Fn(&mut Config)>> = vec![
            Box::new(|c| c.dims = 0),
            Box::new(|c| c.num_threads = 0),
            Box::new(|c| c.epochs = 0),
            Box::new(|c| c.window = 0),
            Box::new(|c| c.alpha = 0.0),
            Box::new(|c| c.alpha = f32::NAN),
            Box::new(|c| c.sample = -1.0),
            Box::new(|c| c.table_size = 0),
            Box::new(|c| c.feature_mode = FeatureMode::Knowledge),
        ];
        for tweak in cases {
            let mut config = Config::default();
            tweak(&mut config);
            assert!(matches!(config.validate(), Err(Error::Config(_))), "{config:?}");
        }
    }
}
