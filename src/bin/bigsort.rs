use std::path::PathBuf;
use std::process;
use std::sync::OnceLock;

use clap::{Parser, Subcommand};

use bigsort::common::{CancelToken, parse_size};
use bigsort::generate::{GenerateOptions, generate_file};
use bigsort::sort::{SortOptions, SortOutcome, sort_file};

#[derive(Parser)]
#[command(name = "bigsort", about = "Sort really big line-oriented files")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sort the specified file
    Sort {
        /// Name of the input file
        #[arg(short = 'f', long = "file", default_value = "test.txt")]
        file: PathBuf,

        /// Name of the output file
        #[arg(short = 'o', long = "out", default_value = "result.txt")]
        out: PathBuf,

        /// Size of one chunk; bigger values are recommended for bigger inputs
        #[arg(short = 'c', long = "chunk", value_name = "SIZE", default_value = "1G")]
        chunk: String,

        /// Use DIR for temporary runs instead of the output directory
        #[arg(short = 'T', long = "temp-dir", value_name = "DIR")]
        temp_dir: Option<PathBuf>,
    },

    /// Generate a new test file
    Generate {
        /// Size of the target file
        #[arg(value_name = "SIZE", default_value = "1G")]
        size: String,

        /// Name of the target file
        #[arg(short = 'f', long = "file", default_value = "test.txt")]
        file: PathBuf,

        /// Maximum size of one line
        #[arg(short = 'l', long = "line-size", default_value_t = 256)]
        line_size: usize,
    },
}

static CANCEL: OnceLock<CancelToken> = OnceLock::new();

#[cfg(unix)]
extern "C" fn handle_sigint(_: libc::c_int) {
    // Only touches an atomic; safe in signal context.
    if let Some(token) = CANCEL.get() {
        token.cancel();
    }
}

fn install_sigint(token: CancelToken) {
    let _ = CANCEL.set(token);
    #[cfg(unix)]
    unsafe {
        let handler = handle_sigint as extern "C" fn(libc::c_int);
        libc::signal(libc::SIGINT, handler as libc::sighandler_t);
    }
}

fn parse_size_or_exit(s: &str, what: &str) -> usize {
    parse_size(s).unwrap_or_else(|e| {
        eprintln!("bigsort: invalid {}: {}", what, e);
        process::exit(2);
    })
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let cancel = CancelToken::new();
    install_sigint(cancel.clone());

    match cli.command {
        Command::Sort {
            file,
            out,
            chunk,
            temp_dir,
        } => {
            let opts = SortOptions {
                input: file,
                output: out,
                chunk_size: parse_size_or_exit(&chunk, "chunk size"),
                scratch_dir: temp_dir,
            };
            match sort_file(&opts, &cancel) {
                Ok(SortOutcome::Completed { lines }) => {
                    println!("sorted {} lines into {}", lines, opts.output.display());
                }
                Ok(SortOutcome::Cancelled) => {
                    eprintln!("bigsort: cancelled");
                    process::exit(130);
                }
                Err(e) => {
                    eprintln!("bigsort: {}", e);
                    process::exit(2);
                }
            }
        }
        Command::Generate {
            size,
            file,
            line_size,
        } => {
            let opts = GenerateOptions {
                output: file,
                target_size: parse_size_or_exit(&size, "file size") as u64,
                max_line_size: line_size,
            };
            match generate_file(&opts, &cancel) {
                Ok(generated) => {
                    println!(
                        "generated {} lines ({} bytes) into {}",
                        generated.lines,
                        generated.bytes,
                        opts.output.display()
                    );
                    if cancel.is_cancelled() {
                        process::exit(130);
                    }
                }
                Err(e) => {
                    eprintln!("bigsort: {}", e);
                    process::exit(2);
                }
            }
        }
    }
}
