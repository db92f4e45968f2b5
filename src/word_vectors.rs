use byteorder::{NativeEndian, ReadBytesExt};
use rayon::prelude::*;
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::io::{BufRead, Cursor};
use std::path::Path;

use crate::error::{Error, Result};

// Trained vectors held in one contiguous array, rows normalised to unit
// length so a dot product is the cosine similarity.
pub struct WordVectors {
    words: Vec<String>,               // index to word
    word_map: HashMap<String, usize>, // word to index
    vectors: Vec<f32>,
    dims: usize,
}

fn format_error(msg: impl Into<String>) -> Error {
    Error::VectorsFormat(msg.into())
}

fn by_score_desc(a: &(usize, f32), b: &(usize, f32)) -> Ordering {
    b.1.partial_cmp(&a.1).unwrap_or(Ordering::Equal)
}

impl WordVectors {
    pub fn get_word(&self, idx: usize) -> &str {
        &self.words[idx]
    }

    pub fn get_index(&self, word: &str) -> Option<usize> {
        self.word_map.get(word).copied()
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn dims(&self) -> usize {
        self.dims
    }

    pub fn get_vector(&self, idx: usize) -> &[f32] {
        &self.vectors[idx * self.dims..(idx + 1) * self.dims]
    }

    /// Loads a `rows dims` headed dump in either the text or the binary
    /// layout, telling them apart by whether the body parses as text.
    pub fn from_file(path: &Path) -> Result<WordVectors> {
        let data = fs::read(path).map_err(|e| Error::open("vectors", path, e))?;
        Self::from_bytes(&data)
    }

    pub fn from_bytes(data: &[u8]) -> Result<WordVectors> {
        let header_end = data
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(|| format_error("missing header line"))?;
        let header = String::from_utf8_lossy(&data[..header_end]);
        let mut fields = header.split_whitespace().map(str::parse::<usize>);
        let (Some(Ok(rows)), Some(Ok(dims)), None) = (fields.next(), fields.next(), fields.next())
        else {
            return Err(format_error(format!("bad header '{header}'")));
        };
        if dims == 0 {
            return Err(format_error("zero dimensions"));
        }
        let values = rows
            .checked_mul(dims)
            .ok_or_else(|| format_error(format!("header '{header}' is too large")))?;

        let body = &data[header_end + 1..];
        let (words, mut vectors) = match parse_text(body, rows, dims, values) {
            Some(parsed) => parsed,
            None => parse_binary(body, rows, dims, values)?,
        };

        const EPS: f32 = 1e-8;
        for row in vectors.chunks_exact_mut(dims) {
            let norm = row.iter().map(|x| x * x).sum::<f32>().sqrt();
            if norm > EPS {
                row.iter_mut().for_each(|e| *e /= norm);
            }
        }

        let word_map = words
            .iter()
            .enumerate()
            .map(|(i, w)| (w.clone(), i))
            .collect();

        Ok(WordVectors {
            words,
            word_map,
            vectors,
            dims,
        })
    }

    /// Ranks every row by dot product with `target`, skipping `exclude`,
    /// and returns the best `n`.
    fn rank(&self, target: &[f32], exclude: &HashSet<usize>, n: usize) -> Vec<(usize, f32)> {
        let mut scores: Vec<(usize, f32)> = self
            .vectors
            .par_chunks_exact(self.dims)
            .enumerate()
            .filter(|(i, _)| !exclude.contains(i))
            .map(|(i, v_slice)| {
                let score = v_slice.iter().zip(target).map(|(v, t)| v * t).sum::<f32>();
                (i, score)
            })
            .collect();

        if n < scores.len() {
            scores.select_nth_unstable_by(n, by_score_desc);
            scores.truncate(n);
        }
        scores.sort_by(by_score_desc);
        scores
    }

    /// The `n` words closest to `b - a + c`, none of the three included.
    pub fn analogy(&self, a: &str, b: &str, c: &str, n: usize) -> Option<Vec<(usize, f32)>> {
        let (a_idx, b_idx, c_idx) = (self.get_index(a)?, self.get_index(b)?, self.get_index(c)?);

        let (va, vb, vc) = (
            self.get_vector(a_idx),
            self.get_vector(b_idx),
            self.get_vector(c_idx),
        );
        let target: Vec<f32> = (0..self.dims).map(|i| vb[i] - va[i] + vc[i]).collect();

        let exclude = HashSet::from([a_idx, b_idx, c_idx]);
        Some(self.rank(&target, &exclude, n))
    }

    /// The `n` words closest to the normalised sum of `words`. Unknown words
    /// are ignored; `None` if none is known.
    pub fn nearest_to_sum(&self, words: &[&str], n: usize) -> Option<Vec<(usize, f32)>> {
        let indices: Vec<usize> = words.iter().filter_map(|w| self.get_index(w)).collect();
        if indices.is_empty() {
            return None;
        }

        let mut target = vec![0.0f32; self.dims];
        for &idx in &indices {
            for (t, v) in target.iter_mut().zip(self.get_vector(idx)) {
                *t += v;
            }
        }
        let magnitude = target.iter().map(|x| x * x).sum::<f32>().sqrt();
        if magnitude == 0.0 {
            return None;
        }
        target.iter_mut().for_each(|e| *e /= magnitude);

        // indices might have duplicates
        let exclude: HashSet<usize> = indices.into_iter().collect();
        Some(self.rank(&target, &exclude, n))
    }
}

// Allocation is bounded by the body size, never by the header alone.
fn parse_text(
    body: &[u8],
    rows: usize,
    dims: usize,
    values: usize,
) -> Option<(Vec<String>, Vec<f32>)> {
    let text = std::str::from_utf8(body).ok()?;
    let mut words = Vec::with_capacity(rows.min(body.len()));
    let mut vectors = Vec::with_capacity(values.min(body.len()));

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        let mut parts = line.split_whitespace();
        let word = parts.next()?;
        let start = vectors.len();
        for part in parts {
            vectors.push(part.parse::<f32>().ok()?);
        }
        if vectors.len() - start != dims {
            return None;
        }
        words.push(word.to_string());
    }
    (words.len() == rows).then_some((words, vectors))
}

fn parse_binary(
    body: &[u8],
    rows: usize,
    dims: usize,
    values: usize,
) -> Result<(Vec<String>, Vec<f32>)> {
    if values.saturating_mul(size_of::<f32>()) > body.len() {
        return Err(format_error(format!(
            "{rows}x{dims} floats cannot fit in {} bytes",
            body.len()
        )));
    }
    let mut cur = Cursor::new(body);
    let mut words = Vec::with_capacity(rows);
    let mut vectors = vec![0.0f32; values];

    for row in vectors.chunks_exact_mut(dims) {
        let mut word = Vec::new();
        cur.read_until(b' ', &mut word)?;
        if word.pop() != Some(b' ') {
            return Err(format_error(format!(
                "truncated after {} of {rows} rows",
                words.len()
            )));
        }
        words.push(String::from_utf8_lossy(word.trim_ascii_start()).into_owned());
        cur.read_f32_into::<NativeEndian>(row)
            .map_err(|_| format_error(format!("row {} is short of {dims} values", words.len())))?;
    }
    Ok((words, vectors))
}
