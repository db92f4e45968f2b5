use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use log::info;

use crate::error::{Error, Result};

/// Writes an embedding matrix in the word2vec layout: a `rows dims` header,
/// then one line per row holding the label and its values, either as text or
/// as raw native-endian `f32`s.
pub struct EmbeddingWriter<W: Write> {
    out: W,
    binary: bool,
}

impl EmbeddingWriter<BufWriter<File>> {
    /// Creates the file right away so a bad path fails before training starts.
    pub fn create(path: &Path, binary: bool) -> Result<Self> {
        let file = File::create(path).map_err(|e| Error::open("output", path, e))?;
        Ok(EmbeddingWriter::new(BufWriter::new(file), binary))
    }
}

impl<W: Write> EmbeddingWriter<W> {
    pub fn new(out: W, binary: bool) -> Self {
        EmbeddingWriter { out, binary }
    }

    /// Writes one row per label from the front of `values`, which must hold
    /// at least `labels.len() * dims` floats.
    pub fn write<S: AsRef<str>>(mut self, labels: &[S], dims: usize, values: &[f32]) -> Result<W> {
        if dims == 0 || values.len() < labels.len() * dims {
            return Err(Error::config(format!(
                "{} labels need {} values, got {}",
                labels.len(),
                labels.len() * dims,
                values.len()
            )));
        }

        writeln!(self.out, "{} {}", labels.len(), dims)?;
        for (label, row) in labels.iter().zip(values.chunks_exact(dims)) {
            write!(self.out, "{}", label.as_ref())?;
            if self.binary {
                self.out.write_all(b" ")?;
                self.out.write_all(bytemuck::cast_slice(row))?;
            } else {
                for v in row {
                    write!(self.out, " {v}")?;
                }
            }
            writeln!(self.out)?;
        }
        self.out.flush()?;

        info!("Wrote {} vectors of dimension {dims}", labels.len());
        Ok(self.out)
    }
}
