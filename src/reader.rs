use std::fs::File;
use std::io::{self, BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use crate::error::{Error, Result};

/// The sentence-boundary token produced for every newline.
pub const EOS: &str = "</s>";

/// Longer words are truncated to this many bytes.
pub const MAX_WORD_LEN: usize = 100;

#[inline]
fn is_delimiter(ch: u8) -> bool {
    ch <= b' ' || ch == 127
}

/// Tokenizer over a byte stream. Any control byte, space or DEL separates
/// words, and each `\n` is reported as an [`EOS`] token.
pub struct WordReader<R> {
    inner: R,
    // A newline ended the previous word and still has to be reported.
    pending_eos: bool,
}

impl WordReader<BufReader<File>> {
    /// Opens `path` for word reading; `role` names the file in the error.
    pub fn open(path: &Path, role: &'static str) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::open(role, path, e))?;
        Ok(WordReader::new(BufReader::new(file)))
    }
}

impl<R: BufRead> WordReader<R> {
    pub fn new(inner: R) -> Self {
        WordReader {
            inner,
            pending_eos: false,
        }
    }

    /// Reads the next word. `Ok(None)` signals end of input.
    pub fn read_word(&mut self) -> io::Result<Option<String>> {
        if self.pending_eos {
            self.pending_eos = false;
            return Ok(Some(EOS.to_string()));
        }

        let mut word: Vec<u8> = Vec::new();
        loop {
            let (used, done) = {
                let buf = self.inner.fill_buf()?;
                if buf.is_empty() {
                    break;
                }
                let mut used = 0;
                let mut done = false;
                for &ch in buf {
                    used += 1;
                    if is_delimiter(ch) {
                        if ch == b'\n' {
                            if word.is_empty() {
                                word.extend_from_slice(EOS.as_bytes());
                            } else {
                                self.pending_eos = true;
                            }
                            done = true;
                            break;
                        }
                        if !word.is_empty() {
                            done = true;
                            break;
                        }
                        continue;
                    }
                    if word.len() < MAX_WORD_LEN {
                        word.push(ch);
                    }
                }
                (used, done)
            };
            self.inner.consume(used);
            if done {
                break;
            }
        }

        if word.is_empty() {
            Ok(None)
        } else {
            Ok(Some(String::from_utf8_lossy(&word).into_owned()))
        }
    }
}

impl<R: BufRead + Seek> WordReader<R> {
    /// Repositions the reader at an absolute byte offset.
    pub fn seek_to(&mut self, offset: u64) -> io::Result<()> {
        self.pending_eos = false;
        self.inner.seek(SeekFrom::Start(offset))?;
        Ok(())
    }
}

impl<R: BufRead> Iterator for WordReader<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_word().transpose()
    }
}
