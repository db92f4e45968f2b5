use std::io;
use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// A required file could not be opened or created.
    #[error("cannot open {role} file '{}': {source}", path.display())]
    Open {
        role: &'static str,
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("vocabulary file syntax error on line {line}: {reason}")]
    VocabSyntax { line: usize, reason: String },

    #[error("malformed feature annotation '{0}', expected word(FEATURE)")]
    MalformedAnnotation(String),

    #[error("malformed vectors file: {0}")]
    VectorsFormat(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("cannot allocate {0} floats for the embedding matrices")]
    Allocation(usize),

    #[error("worker thread {0} panicked")]
    WorkerPanic(usize),
}

impl Error {
    pub(crate) fn open(role: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Error::Open {
            role,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}
