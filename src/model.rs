use std::fs::File;

use log::info;

use crate::config::Config;
use crate::embeddings::Embeddings;
use crate::error::{Error, Result};
use crate::features::{FeatureMode, Features, learn_tagged_corpus};
use crate::train::Trainer;
use crate::vocab::Vocab;
use crate::writer::EmbeddingWriter;

/// Runs a full session: vocabulary, optional features, training and output.
///
/// Output files are created before anything is read, so an unwritable path
/// fails fast. Without an output file only the vocabulary stage runs.
pub fn train_model(config: &Config) -> Result<()> {
    config.validate()?;

    let file_size = File::open(&config.train_file)
        .and_then(|f| f.metadata())
        .map_err(|e| Error::open("training data", &config.train_file, e))?
        .len();

    let output = config
        .output_file
        .as_deref()
        .map(|path| EmbeddingWriter::create(path, config.binary))
        .transpose()?;
    let context = match &output {
        Some(_) => config
            .context_file
            .as_deref()
            .map(|path| EmbeddingWriter::create(path, config.binary))
            .transpose()?,
        None => None,
    };

    // tags are counted together with the words in sequential mode
    let (learned, tags) = match config.feature_mode {
        FeatureMode::Sequential => {
            let (words, tags) = learn_tagged_corpus(&config.train_file, config.min_count)?;
            (Some(words), Some(tags))
        }
        _ => (None, None),
    };
    let vocab = match (&config.read_vocab_file, learned) {
        (Some(path), _) => Vocab::read_from_file(path, config.min_count)?,
        (None, Some(words)) => words,
        (None, None) => Vocab::learn_from_corpus(&config.train_file, config.min_count)?,
    };
    if let Some(path) = &config.save_vocab_file {
        vocab.save(path)?;
        info!("Saved vocabulary to {}", path.display());
    }

    let features = match config.feature_mode {
        FeatureMode::None => None,
        FeatureMode::Sequential => tags.map(Features::sequential).transpose()?,
        FeatureMode::Knowledge => {
            let path = config
                .knowledge_file
                .as_deref()
                .ok_or_else(|| Error::config("knowledge feature mode needs a knowledge file"))?;
            Some(Features::from_knowledge_file(path, &vocab, config.min_count)?)
        }
    };

    let Some(output) = output else {
        info!("No output file given, stopping after the vocabulary");
        return Ok(());
    };

    config.validate_corpus(&vocab)?;
    let rows = vocab.len() + features.as_ref().map_or(0, Features::len);
    let embeddings = Embeddings::new(rows, config.dims, config.seed)?;

    Trainer::new(config, &vocab, features.as_ref(), &embeddings, file_size)?.train()?;

    let mut labels: Vec<&str> = vocab.iter().map(|e| e.word.as_str()).collect();
    output.write(&labels, config.dims, &embeddings.input_snapshot())?;

    if let Some(context) = context {
        if let Some(features) = &features {
            labels.extend(features.vocab().iter().map(|e| e.word.as_str()));
        }
        context.write(&labels, config.dims, &embeddings.output_snapshot())?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reader::EOS;
    use crate::word_vectors::WordVectors;
    use std::io::Write;
    use std::path::{Path, PathBuf};

    fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    fn small_config(train: PathBuf, output: Option<PathBuf>) -> Config {
        Config {
            train_file: train,
            output_file: output,
            dims: 4,
            window: 1,
            negative: 0,
            num_threads: 1,
            epochs: 1,
            min_count: 1,
            table_size: 1000,
            ..Config::default()
        }
    }

    #[test]
    fn writes_one_row_per_vocabulary_entry() {
        let dir = tempfile::tempdir().unwrap();
        let train = write_file(dir.path(), "corpus.txt", "the quick fox the lazy fox\n");
        let out = dir.path().join("vectors.txt");
        train_model(&small_config(train, Some(out.clone()))).unwrap();

        let text = std::fs::read_to_string(&out).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("5 4"));
        let words: Vec<&str> = lines
            .map(|l| {
                let fields: Vec<&str> = l.split(' ').collect();
                assert_eq!(fields.len(), 5);
                assert!(fields[1..].iter().all(|v| v.parse::<f32>().unwrap().is_finite()));
                fields[0]
            })
            .collect();
        assert_eq!(words, [EOS, "the", "fox", "quick", "lazy"]);
    }

    #[test]
    fn binary_output_loads_back() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = "a b c a b c d\nd c b a\n".repeat(20);
        let train = write_file(dir.path(), "corpus.txt", &corpus);
        let out = dir.path().join("vectors.bin");
        let ctx = dir.path().join("context.bin");
        let config = Config {
            binary: true,
            negative: 2,
            window: 2,
            num_threads: 2,
            epochs: 3,
            context_file: Some(ctx.clone()),
            ..small_config(train, Some(out.clone()))
        };
        train_model(&config).unwrap();

        let wv = WordVectors::from_file(&out).unwrap();
        assert_eq!(wv.len(), 5);
        assert_eq!(wv.dims(), 4);
        assert!(wv.get_index("a").is_some());
        assert_eq!(WordVectors::from_file(&ctx).unwrap().len(), 5);
    }

    #[test]
    fn vocabulary_only_run() {
        let dir = tempfile::tempdir().unwrap();
        let train = write_file(dir.path(), "corpus.txt", "x y x\n");
        let saved = dir.path().join("vocab.txt");
        let config = Config {
            save_vocab_file: Some(saved.clone()),
            ..small_config(train, None)
        };
        train_model(&config).unwrap();
        assert_eq!(std::fs::read_to_string(saved).unwrap(), "</s> 1\nx 2\ny 1\n");
    }

    #[test]
    fn read_vocabulary_replaces_counting() {
        let dir = tempfile::tempdir().unwrap();
        let train = write_file(dir.path(), "corpus.txt", "x y z x\n");
        let vocab = write_file(dir.path(), "vocab.txt", "</s> 1\nx 2\ny 1\n");
        let out = dir.path().join("vectors.txt");
        let config = Config {
            read_vocab_file: Some(vocab),
            ..small_config(train, Some(out.clone()))
        };
        train_model(&config).unwrap();
        let wv = WordVectors::from_file(&out).unwrap();
        assert_eq!(wv.len(), 3);
        assert!(wv.get_index("z").is_none());
    }

    #[test]
    fn empty_corpus_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let train = write_file(dir.path(), "corpus.txt", "");
        let out = dir.path().join("vectors.txt");
        assert!(matches!(
            train_model(&small_config(train, Some(out))),
            Err(Error::Config(_))
        ));
    }

    #[test]
    fn min_count_above_every_word_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let train = write_file(dir.path(), "corpus.txt", "a b c\n");
        let out = dir.path().join("vectors.txt");
        let config = Config {
            min_count: 10,
            ..small_config(train, Some(out))
        };
        assert!(matches!(train_model(&config), Err(Error::Config(_))));
    }

    #[test]
    fn missing_inputs_and_outputs_are_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("missing.txt");
        assert!(matches!(
            train_model(&small_config(missing, None)),
            Err(Error::Open { role: "training data", .. })
        ));

        let train = write_file(dir.path(), "corpus.txt", "a b\n");
        let bad_out = dir.path().join("no/such/dir/vectors.txt");
        assert!(matches!(
            train_model(&small_config(train, Some(bad_out))),
            Err(Error::Open { role: "output", .. })
        ));
    }

    #[test]
    fn sequential_features_extend_the_context_dump() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = "dogs(NN) bark(VB)\ncats(NN) purr(VB) softly(NULL)\n".repeat(5);
        let train = write_file(dir.path(), "corpus.txt", &corpus);
        let out = dir.path().join("vectors.txt");
        let ctx = dir.path().join("context.txt");
        let config = Config {
            feature_mode: FeatureMode::Sequential,
            negative: 1,
            context_file: Some(ctx.clone()),
            ..small_config(train, Some(out.clone()))
        };
        train_model(&config).unwrap();

        let words = WordVectors::from_file(&out).unwrap();
        assert_eq!(words.len(), 6);
        assert!(words.get_index("dogs").is_some());
        let context = WordVectors::from_file(&ctx).unwrap();
        assert_eq!(context.len(), 8);
        assert!(context.get_index("NN").is_some());
        assert!(context.get_index("VB").is_some());
    }

    #[test]
    fn knowledge_features_train() {
        let dir = tempfile::tempdir().unwrap();
        let train = write_file(dir.path(), "corpus.txt", &"red green blue sky sea\n".repeat(4));
        let kn = write_file(dir.path(), "kn.txt", "COLOUR red green blue\nNATURE sky sea\n");
        let out = dir.path().join("vectors.txt");
        let ctx = dir.path().join("context.txt");
        let config = Config {
            feature_mode: FeatureMode::Knowledge,
            knowledge_file: Some(kn),
            negative: 1,
            context_file: Some(ctx.clone()),
            ..small_config(train, Some(out.clone()))
        };
        train_model(&config).unwrap();

        assert_eq!(WordVectors::from_file(&out).unwrap().len(), 6);
        let context = WordVectors::from_file(&ctx).unwrap();
        assert!(context.get_index("COLOUR").is_some());
        assert!(context.get_index("NATURE").is_some());
    }
}
