use clap::{Parser, ValueEnum};
use searchy::{ColorChoice, Grep, SearchError};
use std::io::IsTerminal;

#[derive(Parser)]
#[command(name = "searchy")]
#[command(
    about = "Parallel chunk-oriented text search with grep-compatible output",
    long_about = "searchy - parallel, chunk-oriented text search\n\n\
    Reads the input as ordered, line-aligned chunks, searches them across \n\
    worker threads, and prints results strictly in file order.\n\n\
    Examples:\n\
      searchy Sherlock big.log\n\
      searchy -n -b 'She[r ]lock' big.log\n\
      searchy -c -j 8 error big.log.gz\n\
      cat big.log | searchy -i -o sherlock"
)]
#[command(version)]
struct Cli {
    /// Search pattern
    #[arg(value_name = "PATTERN")]
    pattern: String,

    /// Input file, stdin if '-' or omitted
    #[arg(value_name = "PATH", default_value = "-")]
    path: String,

    /// Print only a count of matching lines
    #[arg(short = 'c', long)]
    count: bool,

    /// Print line numbers with output lines
    #[arg(short = 'n', long)]
    line_number: bool,

    /// Print the byte offset with output lines
    #[arg(short = 'b', long)]
    byte_offset: bool,

    /// Show only the matching parts of lines
    #[arg(short = 'o', long)]
    only_matching: bool,

    /// Ignore case distinctions in pattern and data
    #[arg(short = 'i', long)]
    ignore_case: bool,

    /// PATTERN is a fixed string (force no regex)
    #[arg(short = 'F', long)]
    fixed_strings: bool,

    /// Print the file path before matching content
    #[arg(short = 'H', long)]
    with_filename: bool,

    /// Number of worker threads (default: half the hardware threads)
    #[arg(short = 'j', long, default_value_t = 0)]
    threads: usize,

    /// Number of concurrent reader threads
    #[arg(long, default_value_t = 1)]
    max_readers: usize,

    /// Minimum size in bytes of a single chunk (chunks extend to the next newline)
    #[arg(short = 's', long, default_value_t = searchy::DEFAULT_BLOCK_SIZE)]
    chunk_size: usize,

    /// Do not use mmap; read the data instead
    #[arg(long)]
    no_mmap: bool,

    /// When to color output
    #[arg(long, value_enum, default_value = "auto")]
    color: ColorArg,
}

#[derive(ValueEnum, Clone, Copy)]
enum ColorArg {
    Auto,
    Always,
    Never,
}

fn main() {
    std::process::exit(run());
}

/// Exit codes follow the grep contract: 0 at least one match, 1 no
/// match, 2 error.
fn run() -> i32 {
    let cli = Cli::parse();

    let color = match cli.color {
        ColorArg::Always => ColorChoice::On,
        ColorArg::Never => ColorChoice::Off,
        ColorArg::Auto => {
            if std::io::stdout().is_terminal() {
                ColorChoice::On
            } else {
                ColorChoice::Off
            }
        }
    };

    let grep = match Grep::builder(cli.pattern, cli.path)
        .count(cli.count)
        .line_number(cli.line_number)
        .byte_offset(cli.byte_offset)
        .only_matching(cli.only_matching)
        .ignore_case(cli.ignore_case)
        .fixed_string(cli.fixed_strings)
        .print_file_path(cli.with_filename)
        .worker_threads(cli.threads)
        .reader_threads(cli.max_readers)
        .chunk_size(cli.chunk_size)
        .use_mmap(!cli.no_mmap)
        .color(color)
        .build()
    {
        Ok(grep) => grep,
        Err(err) => {
            eprintln!("searchy: {}", err);
            return 2;
        }
    };

    match grep.write_to(std::io::stdout()) {
        Ok((matched, _)) => {
            if matched > 0 {
                0
            } else {
                1
            }
        }
        Err(SearchError::Cancelled) => 2,
        Err(err) => {
            eprintln!("searchy: {}", err);
            2
        }
    }
}
