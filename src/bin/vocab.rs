use anyhow::Context;
use clap::Parser;
use hwe_rs::features::learn_tagged_corpus;
use hwe_rs::{Vocab, logging};
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Extract vocabulary from text corpus", long_about = None)]
struct Args {
    /// Minimum count threshold for words to be included in vocabulary
    #[arg(short, long, default_value_t = 5)]
    min_count: u64,

    /// Corpus tokens are annotated as word(FEATURE); also list the features
    #[arg(long)]
    tagged: bool,

    /// Write the vocabulary here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,

    #[arg(short, long, default_value_t = 1)]
    verbose: u8,

    /// Input corpus
    #[arg(value_name = "FILE")]
    input: PathBuf,
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(args.verbose);

    let (vocab, tags) = if args.tagged {
        let (words, tags) = learn_tagged_corpus(&args.input, args.min_count)?;
        (words, Some(tags))
    } else {
        (Vocab::learn_from_corpus(&args.input, args.min_count)?, None)
    };

    if let Some(path) = &args.output {
        vocab
            .save(path)
            .with_context(|| format!("saving vocabulary to {}", path.display()))?;
        return Ok(());
    }

    let mut out = BufWriter::new(io::stdout().lock());
    for e in vocab.iter() {
        writeln!(out, "{}\t{}", e.word, e.count)?;
    }
    if let Some(tags) = tags {
        writeln!(out)?;
        for e in tags.iter() {
            writeln!(out, "{}\t{}", e.word, e.count)?;
        }
    }
    out.flush()?;

    Ok(())
}
