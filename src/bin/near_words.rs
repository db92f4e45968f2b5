use clap::Parser;
use hwe_rs::{WordVectors, logging};
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about = "Rank the words nearest to a word or phrase", long_about = None)]
struct Args {
    /// Vectors written by hwe, text or binary
    #[arg(value_name = "VECTORS", default_value = "vectors.txt")]
    vectors: PathBuf,

    /// Number of words to list
    #[arg(short = 'n', long, default_value_t = 30)]
    top_n: usize,

    /// Treat three words `a b c` as the analogy a : b :: c : ?
    #[arg(long)]
    analogy: bool,
}

fn get_input() -> io::Result<Option<String>> {
    let mut s = String::new();
    if io::stdin().read_line(&mut s)? == 0 {
        return Ok(None);
    }
    Ok(Some(s.trim().to_string()))
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logging::init(0);
    let word_vectors = WordVectors::from_file(&args.vectors)?;
    println!(
        "Loaded {} vectors of dimension {}",
        word_vectors.len(),
        word_vectors.dims()
    );

    println!("Near Words Tool - Type 'EXIT' to quit\n");
    loop {
        if args.analogy {
            print!("\nEnter three words (a b c for a : b :: c : ?): ");
        } else {
            print!("\nEnter 1 or more words: ");
        }
        io::stdout().flush()?;
        let Some(s) = get_input()? else {
            break;
        };
        if s == "EXIT" {
            println!("Goodbye!");
            break;
        }
        let words: Vec<&str> = s.split_whitespace().collect();
        if words.is_empty() {
            println!("No words were input. Try again");
            continue;
        }

        let oov_words: Vec<&str> = words
            .iter()
            .filter(|&&w| word_vectors.get_index(w).is_none())
            .copied()
            .collect();
        if !oov_words.is_empty() {
            for word in &oov_words {
                println!("'{word}' is out of vocabulary");
            }
            continue;
        }

        let ranked = match (args.analogy, words.as_slice()) {
            (true, &[a, b, c]) => word_vectors.analogy(a, b, c, args.top_n),
            (true, _) => {
                println!("An analogy needs exactly three words");
                continue;
            }
            (false, _) => word_vectors.nearest_to_sum(&words, args.top_n),
        };
        let Some(topn) = ranked else {
            println!("No near words!");
            continue;
        };

        println!("\nNearest words to '{}':", words.join(" + "));
        println!("{:>4} {:>10} Word", "Rank", "Score");
        println!("{}", "-".repeat(30));
        for (i, (idx, score)) in topn.iter().enumerate() {
            println!("{:4}: {:10.6} {}", i + 1, score, word_vectors.get_word(*idx));
        }
    }

    Ok(())
}
