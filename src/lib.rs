//! Skip-gram word embeddings with negative sampling, trained lock-free by
//! several threads at once, optionally guided by auxiliary feature tokens.
//!
//! [`train_model`] runs a whole session from a [`Config`]; the modules below
//! expose each stage on its own.

pub mod config;
pub mod embeddings;
pub mod error;
pub mod exp_table;
pub mod features;
pub mod logging;
pub mod model;
pub mod reader;
pub mod train;
pub mod unigram;
pub mod vocab;
pub mod word_vectors;
pub mod writer;

pub use config::Config;
pub use error::{Error, Result};
pub use features::FeatureMode;
pub use model::train_model;
pub use vocab::Vocab;
pub use word_vectors::WordVectors;
