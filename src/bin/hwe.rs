use anyhow::Context;
use clap::Parser;
use hwe_rs::{Config, FeatureMode, logging, train_model};
use std::path::PathBuf;

/// Command-line arguments parsed by Clap.
#[derive(Parser, Debug)]
#[clap(author, version, about = "Train skip-gram word vectors with negative sampling", long_about = None)]
struct Cli {
    /// Text corpus to train on
    #[clap(long, value_parser, required = true)]
    train: PathBuf,
    /// Where to write the word vectors; without it only the vocabulary is built
    #[clap(long, value_parser)]
    output: Option<PathBuf>,
    #[clap(long, value_parser, default_value_t = 100)]
    size: usize,
    #[clap(long, value_parser, default_value_t = 5)]
    window: usize,
    /// Subsampling threshold for frequent words; 0 disables it
    #[clap(long, value_parser, default_value_t = 1e-3)]
    sample: f32,
    #[clap(long, value_parser, default_value_t = 5)]
    negative: usize,
    #[clap(long, value_parser, default_value_t = 12)]
    threads: usize,
    #[clap(long, value_parser, default_value_t = 5)]
    iter: usize,
    #[clap(long, value_parser, default_value_t = 5)]
    min_count: u64,
    #[clap(long, value_parser, default_value_t = 0.025)]
    alpha: f32,
    #[clap(long, value_parser, default_value_t = 0, help = "0: text, 1: binary")]
    binary: u8,
    #[clap(long, value_parser)]
    save_vocab: Option<PathBuf>,
    #[clap(long, value_parser)]
    read_vocab: Option<PathBuf>,
    #[clap(
        long,
        value_parser,
        default_value_t = 0,
        help = "0: no features, 1: word(FEATURE) tokens, 2: knowledge file"
    )]
    fmode: u8,
    /// Lines of `FEATURE word word ...`, used with --fmode 2
    #[clap(long, value_parser)]
    knfile: Option<PathBuf>,
    /// Also write the context vectors, feature rows included
    #[clap(long, value_parser)]
    save_context: Option<PathBuf>,
    #[clap(long, value_parser, default_value_t = hwe_rs::unigram::DEFAULT_TABLE_SIZE)]
    table_size: usize,
    #[clap(long, value_parser, default_value_t = 0)]
    seed: u64,
    #[clap(short, long, value_parser, default_value_t = 2)]
    verbose: u8,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    let config = Config {
        train_file: cli.train,
        output_file: cli.output,
        context_file: cli.save_context,
        save_vocab_file: cli.save_vocab,
        read_vocab_file: cli.read_vocab,
        knowledge_file: cli.knfile,
        feature_mode: FeatureMode::try_from(cli.fmode)?,
        binary: cli.binary != 0,
        dims: cli.size,
        window: cli.window,
        sample: cli.sample,
        negative: cli.negative,
        num_threads: cli.threads,
        epochs: cli.iter,
        min_count: cli.min_count,
        alpha: cli.alpha,
        table_size: cli.table_size,
        seed: cli.seed,
        ..Config::default()
    };

    train_model(&config).with_context(|| format!("training on {}", config.train_file.display()))
}
